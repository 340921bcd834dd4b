//! PGP primitives. [`GpgCrypter`] drives the `gpg` binary against a
//! throwaway keyring so the user's own keyring is never touched.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use once_cell::unsync::OnceCell;
use tailor_core::{Error, Result};
use tempfile::TempDir;
use tracing::debug;

/// Encrypts to a set of recipients and decrypts with one private key.
pub trait Crypter {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

pub struct GpgCrypter {
    binary: String,
    public_key_dir: PathBuf,
    private_key: PathBuf,
    passphrase: Option<String>,
    home: OnceCell<TempDir>,
    secret_imported: OnceCell<()>,
}

impl GpgCrypter {
    pub fn new(public_key_dir: impl Into<PathBuf>, private_key: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        Self {
            binary: "gpg".to_string(),
            public_key_dir: public_key_dir.into(),
            private_key: private_key.into(),
            passphrase: passphrase.filter(|p| !p.is_empty()),
            home: OnceCell::new(),
            secret_imported: OnceCell::new(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Every `*.key` file in the public key directory, sorted by name.
    pub fn public_keys(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.public_key_dir).map_err(|e| {
            Error::KeyMaterial(format!("cannot read public key dir {}: {}", self.public_key_dir.display(), e))
        })?;
        let mut keys: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext == "key"))
            .collect();
        keys.sort();
        if keys.is_empty() {
            return Err(Error::KeyMaterial(format!("no public keys (*.key) in {}", self.public_key_dir.display())));
        }
        Ok(keys)
    }

    fn home(&self) -> Result<&Path> {
        let dir = self.home.get_or_try_init(|| {
            tempfile::Builder::new().prefix("tailor-gnupg").tempdir().map_err(|e| Error::io(std::env::temp_dir(), e))
        })?;
        Ok(dir.path())
    }

    fn passphrase_args(&self) -> Result<Vec<OsString>> {
        let mut args: Vec<OsString> = vec!["--pinentry-mode".into(), "loopback".into()];
        if let Some(pass) = &self.passphrase {
            let file = self.home()?.join("passphrase");
            write_private(&file, pass.as_bytes())?;
            args.push("--passphrase-file".into());
            args.push(file.into_os_string());
        } else {
            args.push("--passphrase".into());
            args.push("".into());
        }
        Ok(args)
    }

    fn import_secret_key(&self) -> Result<()> {
        self.secret_imported
            .get_or_try_init(|| {
                if !self.private_key.is_file() {
                    return Err(Error::KeyMaterial(format!("private key {} not found", self.private_key.display())));
                }
                let mut args = self.passphrase_args()?;
                args.push("--import".into());
                args.push(self.private_key.clone().into_os_string());
                run_gpg(&self.binary, self.home()?, &args, &[])
                    .map_err(|stderr| Error::KeyMaterial(format!("cannot import {}: {}", self.private_key.display(), stderr)))?;
                debug!(key = %self.private_key.display(), "imported private key");
                Ok(())
            })
            .map(|_| ())
    }
}

impl Crypter for GpgCrypter {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut args: Vec<OsString> = vec!["--trust-model".into(), "always".into(), "--encrypt".into()];
        for key in self.public_keys()? {
            args.push("--recipient-file".into());
            args.push(key.into_os_string());
        }
        args.push("--output".into());
        args.push("-".into());
        run_gpg(&self.binary, self.home()?, &args, plaintext)
            .map_err(|stderr| Error::KeyMaterial(format!("encryption failed: {}", stderr)))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.import_secret_key()?;
        let mut args = self.passphrase_args()?;
        args.push("--decrypt".into());
        run_gpg(&self.binary, self.home()?, &args, ciphertext).map_err(|stderr| {
            let lower = stderr.to_lowercase();
            if lower.contains("bad passphrase") || lower.contains("no secret key") {
                Error::KeyMaterial(stderr)
            } else {
                Error::ParamsInvalid(format!("decryption failed: {}", stderr))
            }
        })
    }
}

/// Generate a key pair for `name <email>` and write both halves, ASCII-armored.
pub fn generate_key(
    binary: &str,
    name: &str,
    email: &str,
    passphrase: Option<&str>,
    public_out: &Path,
    private_out: &Path,
) -> Result<()> {
    let home = tempfile::Builder::new().prefix("tailor-gnupg").tempdir().map_err(|e| Error::io(std::env::temp_dir(), e))?;
    let pass = os_args(&["--pinentry-mode", "loopback", "--passphrase", passphrase.unwrap_or("")]);
    let user_id = format!("{} <{}>", name, email);

    let mut generate = pass.clone();
    generate.extend(os_args(&["--quick-generate-key", &user_id, "rsa4096", "default", "never"]));
    run_gpg(binary, home.path(), &generate, &[]).map_err(|e| Error::KeyMaterial(format!("key generation failed: {}", e)))?;

    let public = run_gpg(binary, home.path(), &os_args(&["--armor", "--export", email]), &[])
        .map_err(|e| Error::KeyMaterial(format!("public key export failed: {}", e)))?;
    let mut export_secret = pass;
    export_secret.extend(os_args(&["--armor", "--export-secret-keys", email]));
    let private = run_gpg(binary, home.path(), &export_secret, &[])
        .map_err(|e| Error::KeyMaterial(format!("private key export failed: {}", e)))?;

    std::fs::write(public_out, public).map_err(|e| Error::io(public_out, e))?;
    write_private(private_out, &private)?;
    Ok(())
}

fn os_args(args: &[&str]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

/// Run gpg in batch mode against `home`, feeding `stdin`. Returns stdout,
/// or stderr as the error.
fn run_gpg(binary: &str, home: &Path, args: &[OsString], stdin: &[u8]) -> std::result::Result<Vec<u8>, String> {
    let mut child = Command::new(binary)
        .arg("--batch")
        .arg("--yes")
        .arg("--quiet")
        .arg("--no-tty")
        .arg("--homedir")
        .arg(home)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to execute {}: {}", binary, e))?;
    let mut pipe = child.stdin.take().ok_or_else(|| "gpg stdin unavailable".to_string())?;
    // Feed stdin from another thread so a full stdout pipe cannot stall us.
    let output = std::thread::scope(|s| {
        s.spawn(move || {
            if let Err(e) = feed(&mut pipe, stdin) {
                debug!(error = %e, "writing gpg input failed");
            }
        });
        child.wait_with_output()
    })
    .map_err(|e| format!("gpg did not finish: {}", e))?;
    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
    }
}

/// Write `input` to a child's stdin. A child that exits without reading all
/// of it closes the pipe; its own exit status reports the failure.
fn feed(pipe: &mut impl Write, input: &[u8]) -> std::io::Result<()> {
    match pipe.write_all(input) {
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

pub(crate) fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut opts = std::fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut f = opts.open(path).map_err(|e| Error::io(path, e))?;
    f.write_all(contents).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing(std::io::ErrorKind);

    impl Write for Failing {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(self.0))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn feed_ignores_only_a_closed_pipe() {
        assert!(feed(&mut Failing(std::io::ErrorKind::BrokenPipe), b"KEY=v").is_ok());
        let err = feed(&mut Failing(std::io::ErrorKind::PermissionDenied), b"KEY=v").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::PermissionDenied);
        let mut sink = Vec::new();
        feed(&mut sink, b"KEY=v").unwrap();
        assert_eq!(sink, b"KEY=v");
    }

    #[test]
    fn public_keys_are_collected_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b@example.com.key"), "b").unwrap();
        std::fs::write(dir.path().join("a@example.com.key"), "a").unwrap();
        std::fs::write(dir.path().join("README.md"), "x").unwrap();
        let c = GpgCrypter::new(dir.path(), dir.path().join("private.key"), None);
        let keys = c.public_keys().unwrap();
        let names: Vec<_> = keys.iter().map(|k| k.file_name().unwrap().to_string_lossy().to_string()).collect();
        assert_eq!(names, vec!["a@example.com.key", "b@example.com.key"]);
    }

    #[test]
    fn empty_public_key_dir_is_key_material_error() {
        let dir = tempfile::tempdir().unwrap();
        let c = GpgCrypter::new(dir.path(), dir.path().join("private.key"), None);
        assert!(matches!(c.public_keys(), Err(Error::KeyMaterial(_))));
    }

    #[test]
    fn missing_private_key_fails_before_running_gpg() {
        let dir = tempfile::tempdir().unwrap();
        let c = GpgCrypter::new(dir.path(), dir.path().join("missing.key"), Some("pw".into())).with_binary("/nonexistent/gpg");
        assert!(matches!(c.decrypt(b"x"), Err(Error::KeyMaterial(m)) if m.contains("not found")));
    }

    #[cfg(unix)]
    #[test]
    fn private_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("private.key");
        write_private(&p, b"secret").unwrap();
        assert_eq!(std::fs::metadata(&p).unwrap().permissions().mode() & 0o777, 0o600);
    }
}
