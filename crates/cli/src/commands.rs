use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use tailor_apply::{apply_changeset, Change, Changeset};
use tailor_cluster::{ClusterClient, OcClient};
use tailor_core::export::export_as_template;
use tailor_core::{ResourceFilter, ResourceList};
use tailor_params::{generate_key, GpgCrypter, ParamStore};
use tailor_template::TemplateProcessor;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::options::{Options, SecretsCommand};
use crate::{prompt, render};

/// Exit status of `status` when drift was found.
pub const DRIFT: u8 = 3;

pub async fn version(opts: &Options) -> Result<ExitCode> {
    println!("tailor {}", env!("CARGO_PKG_VERSION"));
    match OcClient::new(&opts.oc_binary, "").version().await {
        Ok(v) => {
            println!("oc client: {}", if v.client.is_empty() { "unknown" } else { &v.client });
            println!("OpenShift server: {}", if v.server.is_empty() { "unknown" } else { &v.server });
        }
        Err(e) => warn!(error = %e, "cannot determine oc version"),
    }
    Ok(ExitCode::SUCCESS)
}

/// Check the session and resolve the namespace, then return a client bound to it.
pub async fn connect(opts: &mut Options) -> Result<OcClient> {
    let probe = OcClient::new(&opts.oc_binary, "");
    if !probe.check_logged_in().await? {
        bail!("you need to log in with 'oc login' first");
    }
    if opts.namespace.is_empty() {
        opts.namespace = probe.current_project().await.context("cannot determine current project")?;
    } else if !probe.check_project_exists(&opts.namespace).await? {
        bail!("no project '{}' found", opts.namespace);
    }
    info!(namespace = %opts.namespace, "connected");
    Ok(OcClient::new(&opts.oc_binary, &opts.namespace))
}

fn crypter(opts: &Options) -> GpgCrypter {
    GpgCrypter::new(&opts.public_key_dir, &opts.private_key, opts.passphrase.clone())
}

/// Process the templates, export the namespace and compare both.
pub async fn compute(client: &dyn ClusterClient, opts: &Options) -> Result<Changeset> {
    let filter = ResourceFilter::new(&opts.resource, &opts.selector, &opts.exclude.join(","))?;
    let store = opts.private_key.is_file().then(|| ParamStore::new(crypter(opts)));

    let mut rendered = Vec::new();
    for dir in &opts.template_dirs {
        let processor = TemplateProcessor::new(client, store.as_ref(), opts.template_options(dir.clone()));
        let docs = processor.process_all().await.with_context(|| format!("processing templates in {}", dir.display()))?;
        rendered.extend(docs);
    }
    let desired = ResourceList::from_templates(filter.clone(), &rendered)?;

    let exported = client.export(&filter.export_kinds(), &opts.selector).await?;
    let current = ResourceList::from_export(filter, &exported)?;
    debug!(desired = desired.len(), current = current.len(), "states loaded");

    if desired.is_empty() && !current.is_empty() && !opts.upsert_only && !opts.force {
        bail!(
            "no resources found in the templates but {} exist in the cluster; use --force to delete them all",
            current.len()
        );
    }
    Ok(Changeset::new(&current, &desired, &opts.compare_options())?)
}

pub async fn status(opts: &mut Options) -> Result<ExitCode> {
    let client = connect(opts).await?;
    let cs = compute(&client, opts).await?;
    render::status(&cs, opts.verbose, opts.reveal_secrets, &mut io::stdout().lock())?;
    Ok(if cs.is_blank() { ExitCode::SUCCESS } else { ExitCode::from(DRIFT) })
}

pub async fn apply(opts: &mut Options) -> Result<ExitCode> {
    let client = connect(opts).await?;
    let cs = compute(&client, opts).await?;
    render::status(&cs, opts.verbose, opts.reveal_secrets, &mut io::stdout().lock())?;
    if cs.is_blank() {
        println!("No changes to apply.");
        return Ok(ExitCode::SUCCESS);
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut select = false;
    if !opts.non_interactive {
        let answer = prompt::ask(
            &mut input,
            &mut io::stdout().lock(),
            "Apply all changes? (y=yes/n=no/s=select)",
            &["y", "n", "s"],
        )?;
        match answer.as_str() {
            "n" => {
                println!("No changes applied.");
                return Ok(ExitCode::SUCCESS);
            }
            "s" => select = true,
            _ => {}
        }
    }

    let mut confirm = |c: &Change| {
        if !select {
            return true;
        }
        let question = format!("Apply change to {}? (y=yes/n=no)", c.item_name());
        match prompt::ask(&mut input, &mut io::stdout().lock(), &question, &["y", "n"]) {
            Ok(answer) => answer == "y",
            Err(e) => {
                warn!(error = %e, "cannot read answer, skipping change");
                false
            }
        }
    };
    let report = apply_changeset(&client, &cs, &opts.selector, &mut confirm).await?;
    println!(
        "Applied: {} created, {} updated, {} deleted, {} skipped.",
        report.created, report.updated, report.deleted, report.skipped
    );

    if opts.verify {
        let after = compute(&client, opts).await?;
        if !after.is_blank() {
            render::status(&after, opts.verbose, opts.reveal_secrets, &mut io::stdout().lock())?;
            bail!("verification failed: drift remains after apply ({})", render::summary(&after));
        }
        println!("Verification succeeded.");
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn export(opts: &mut Options, template_name: &str) -> Result<ExitCode> {
    let client = connect(opts).await?;
    let filter = ResourceFilter::new(&opts.resource, &opts.selector, &opts.exclude.join(","))?;
    let raw = client.export(&filter.export_kinds(), &opts.selector).await?;
    let list = ResourceList::from_export(filter, &raw)?;
    info!(items = list.len(), "exporting");
    let mut out = io::stdout().lock();
    write!(out, "{}", export_as_template(&list, template_name, &opts.namespace)?)?;
    Ok(ExitCode::SUCCESS)
}

pub fn secrets(opts: &Options, command: SecretsCommand) -> Result<ExitCode> {
    match command {
        SecretsCommand::Edit { file } => {
            let editor = std::env::var("EDITOR").ok().filter(|e| !e.trim().is_empty()).unwrap_or_else(|| "vim".to_string());
            ParamStore::new(crypter(opts)).edit(&file, &editor)?;
        }
        SecretsCommand::ReEncrypt { file } => {
            let files = match file {
                Some(f) => vec![f],
                None => encrypted_files(&opts.param_dir)
                    .with_context(|| format!("cannot list {}", opts.param_dir.display()))?,
            };
            if files.is_empty() {
                println!("No encrypted parameter files in {}.", opts.param_dir.display());
            }
            let store = ParamStore::new(crypter(opts));
            for f in files {
                store.re_encrypt_file(&f)?;
                println!("Re-encrypted {}.", f.display());
            }
        }
        SecretsCommand::Reveal { file } => {
            print!("{}", ParamStore::new(crypter(opts)).reveal_file(&file)?);
        }
        SecretsCommand::GenerateKey { email, name } => {
            if opts.private_key.exists() {
                bail!("{} already exists; refusing to overwrite it", opts.private_key.display());
            }
            let name = name.unwrap_or_else(|| email.split('@').next().unwrap_or(&email).to_string());
            let public = opts.public_key_dir.join(format!("{}.key", email));
            generate_key("gpg", &name, &email, opts.passphrase.as_deref(), &public, &opts.private_key)?;
            println!("Public key written to {}.", public.display());
            println!("Private key written to {}.", opts.private_key.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Every `*.enc` file below `dir`, sorted.
pub fn encrypted_files(dir: &Path) -> walkdir::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && entry.path().extension().map_or(false, |ext| ext == "enc") {
            out.push(entry.into_path());
        }
    }
    out.sort();
    Ok(out)
}
