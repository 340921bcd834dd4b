//! Command line definition and its merge with the Tailorfile.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use tailor_apply::CompareOptions;
use tailor_template::{TemplateOptions, COMBINED_PARAMS};

use crate::tailorfile::Tailorfile;

#[derive(Parser, Debug)]
#[command(name = "tailor", version, about = "Keep OpenShift resources in sync with local templates")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Log operations (info level)
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    /// Log details (debug level)
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub debug: bool,
    /// Apply without asking
    #[arg(long = "non-interactive", global = true, action = ArgAction::SetTrue)]
    pub non_interactive: bool,
    /// Namespace to work in (default: current project)
    #[arg(short = 'n', long, global = true)]
    pub namespace: Option<String>,
    /// Label selector, e.g. app=foo
    #[arg(short = 'l', long, global = true)]
    pub selector: Option<String>,
    /// Kinds, kind/name or k=v tokens to exclude
    #[arg(long, global = true)]
    pub exclude: Vec<String>,
    /// Directory holding templates (repeatable)
    #[arg(short = 't', long = "template-dir", global = true)]
    pub template_dir: Vec<PathBuf>,
    /// Directory holding parameter files
    #[arg(short = 'p', long = "param-dir", global = true)]
    pub param_dir: Option<PathBuf>,
    /// Directory holding the public keys (*.key) of all recipients
    #[arg(long = "public-key-dir", global = true)]
    pub public_key_dir: Option<PathBuf>,
    /// Private key used to decrypt parameter files
    #[arg(long = "private-key", global = true)]
    pub private_key: Option<PathBuf>,
    /// Passphrase of the private key
    #[arg(long, global = true, env = "TAILOR_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,
    /// oc binary to use
    #[arg(long = "oc-binary", global = true)]
    pub oc_binary: Option<String>,
    /// Tailorfile with default options
    #[arg(short = 'f', long = "file", global = true)]
    pub file: Option<PathBuf>,
    /// Allow deleting everything when the templates yield no resources
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub force: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version of tailor and oc
    Version,
    /// Show drift between templates and the cluster
    #[command(alias = "diff")]
    Status(CompareArgs),
    /// Update the cluster to match the templates
    #[command(alias = "update")]
    Apply {
        #[command(flatten)]
        compare: CompareArgs,
        /// Check that no drift remains afterwards
        #[arg(long, action = ArgAction::SetTrue)]
        verify: bool,
    },
    /// Export current resources as a template
    Export {
        /// Resource kinds (dc,svc) or kind/name
        resource: Option<String>,
        /// Name of the exported template
        #[arg(long = "template-name", default_value = "tailor-export")]
        template_name: String,
    },
    /// Manage encrypted parameter files
    #[command(subcommand)]
    Secrets(SecretsCommand),
}

#[derive(Subcommand, Debug)]
pub enum SecretsCommand {
    /// Edit an encrypted parameter file in $EDITOR
    Edit { file: PathBuf },
    /// Encrypt files again for the current set of public keys
    ReEncrypt { file: Option<PathBuf> },
    /// Print the cleartext of an encrypted parameter file
    Reveal { file: PathBuf },
    /// Create a key pair for EMAIL
    GenerateKey {
        email: String,
        /// Name on the key
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct CompareArgs {
    /// Resource kinds (dc,svc) or kind/name
    pub resource: Option<String>,
    /// KEY=VALUE template parameter (repeatable)
    #[arg(long)]
    pub param: Vec<String>,
    /// Parameter file (repeatable)
    #[arg(long = "param-file")]
    pub param_file: Vec<PathBuf>,
    /// Labels to set on all processed resources
    #[arg(long)]
    pub labels: Option<String>,
    /// path, kind:path or kind:name:path to keep as found in the cluster (repeatable)
    #[arg(long)]
    pub preserve: Vec<String>,
    #[arg(long = "preserve-immutable-fields", action = ArgAction::SetTrue)]
    pub preserve_immutable_fields: bool,
    #[arg(long = "ignore-unknown-parameters", action = ArgAction::SetTrue)]
    pub ignore_unknown_parameters: bool,
    /// Never delete resources
    #[arg(long = "upsert-only", action = ArgAction::SetTrue)]
    pub upsert_only: bool,
    /// Delete and recreate resources whose immutable fields changed
    #[arg(long = "allow-recreate", action = ArgAction::SetTrue)]
    pub allow_recreate: bool,
    /// Show the contents of Secret diffs
    #[arg(long = "reveal-secrets", action = ArgAction::SetTrue)]
    pub reveal_secrets: bool,
}

/// Command line and Tailorfile merged. Command line values win; list
/// values come from the Tailorfile only when none were given.
#[derive(Debug, Clone)]
pub struct Options {
    pub verbose: bool,
    pub debug: bool,
    pub non_interactive: bool,
    pub namespace: String,
    pub selector: String,
    pub exclude: Vec<String>,
    pub template_dirs: Vec<PathBuf>,
    pub param_dir: PathBuf,
    pub public_key_dir: PathBuf,
    pub private_key: PathBuf,
    pub passphrase: Option<String>,
    pub oc_binary: String,
    pub force: bool,
    pub verify: bool,
    pub resource: String,
    pub params: Vec<String>,
    pub param_files: Vec<PathBuf>,
    pub labels: String,
    pub preserve: Vec<String>,
    pub preserve_immutable_fields: bool,
    pub ignore_unknown_parameters: bool,
    pub upsert_only: bool,
    pub allow_recreate: bool,
    pub reveal_secrets: bool,
}

impl Options {
    pub fn merge(global: &GlobalArgs, compare: &CompareArgs, verify: bool, tf: &Tailorfile) -> Result<Self> {
        let string = |cli: &Option<String>, key: &str| cli.clone().or_else(|| tf.string(key).map(str::to_string));
        let path = |cli: &Option<PathBuf>, key: &str, default: &str| {
            cli.clone().or_else(|| tf.string(key).map(PathBuf::from)).unwrap_or_else(|| PathBuf::from(default))
        };
        let list = |cli: &[String], key: &str| if cli.is_empty() { tf.list(key) } else { cli.to_vec() };
        let paths = |cli: &[PathBuf], key: &str| {
            if cli.is_empty() {
                tf.list(key).into_iter().map(PathBuf::from).collect()
            } else {
                cli.to_vec()
            }
        };

        let mut template_dirs: Vec<PathBuf> = paths(&global.template_dir, "template-dir");
        if template_dirs.is_empty() {
            template_dirs.push(PathBuf::from("."));
        }

        Ok(Self {
            verbose: global.verbose || tf.flag("verbose")?,
            debug: global.debug || tf.flag("debug")?,
            non_interactive: global.non_interactive || tf.flag("non-interactive")?,
            namespace: string(&global.namespace, "namespace").unwrap_or_default(),
            selector: string(&global.selector, "selector").unwrap_or_default(),
            exclude: list(&global.exclude, "exclude"),
            template_dirs,
            param_dir: path(&global.param_dir, "param-dir", "."),
            public_key_dir: path(&global.public_key_dir, "public-key-dir", "."),
            private_key: path(&global.private_key, "private-key", "private.key"),
            passphrase: string(&global.passphrase, "passphrase").filter(|p| !p.is_empty()),
            oc_binary: string(&global.oc_binary, "oc-binary").unwrap_or_else(|| "oc".to_string()),
            force: global.force || tf.flag("force")?,
            verify: verify || tf.flag("verify")?,
            resource: string(&compare.resource, "resource").unwrap_or_default(),
            params: list(&compare.param, "param"),
            param_files: paths(&compare.param_file, "param-file"),
            labels: string(&compare.labels, "labels").unwrap_or_default(),
            preserve: list(&compare.preserve, "preserve"),
            preserve_immutable_fields: compare.preserve_immutable_fields || tf.flag("preserve-immutable-fields")?,
            ignore_unknown_parameters: compare.ignore_unknown_parameters || tf.flag("ignore-unknown-parameters")?,
            upsert_only: compare.upsert_only || tf.flag("upsert-only")?,
            allow_recreate: compare.allow_recreate || tf.flag("allow-recreate")?,
            reveal_secrets: compare.reveal_secrets || tf.flag("reveal-secrets")?,
        })
    }

    pub fn compare_options(&self) -> CompareOptions {
        CompareOptions {
            upsert_only: self.upsert_only,
            allow_recreate: self.allow_recreate,
            preserve: self.preserve.clone(),
            preserve_immutable_fields: self.preserve_immutable_fields,
        }
    }

    pub fn template_options(&self, template_dir: PathBuf) -> TemplateOptions {
        TemplateOptions {
            template_dir,
            param_dir: self.param_dir.clone(),
            param_files: self.param_files.clone(),
            params: self.params.clone(),
            labels: self.labels.clone(),
            namespace: self.namespace.clone(),
            ignore_unknown_parameters: self.ignore_unknown_parameters,
            scratch: PathBuf::from(COMBINED_PARAMS),
        }
    }
}
