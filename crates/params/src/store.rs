//! Encrypted parameter files: decrypt, edit and reseal `.enc` files.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tailor_core::{Error, Result};
use tracing::{debug, info};

use crate::crypt::Crypter;
use crate::file::{split_suffix, Line, ParamFile, ENC_SUFFIX, STRING_SUFFIX};
use crate::scratch::ScratchFile;

/// Scratch file the editor works on, relative to the working directory.
pub const EDIT_SCRATCH: &str = ".ENV.DEC";

/// Reads and writes encrypted parameter files through a [`Crypter`].
pub struct ParamStore {
    crypter: Box<dyn Crypter>,
}

impl ParamStore {
    pub fn new(crypter: impl Crypter + 'static) -> Self {
        Self { crypter: Box::new(crypter) }
    }

    /// Cleartext form: `KEY.ENC=<ciphertext>` becomes `KEY=<cleartext>`.
    pub fn decrypt(&self, contents: &str) -> Result<String> {
        self.transform(contents, false)
    }

    /// Editable form: like [`decrypt`](Self::decrypt) but the `.ENC`
    /// suffix is kept so secrets stay marked.
    pub fn encode(&self, contents: &str) -> Result<String> {
        self.transform(contents, true)
    }

    fn transform(&self, contents: &str, keep_suffix: bool) -> Result<String> {
        let file = ParamFile::parse(contents)?;
        let mut out = ParamFile::default();
        for line in file.lines {
            match line {
                Line::Param { key, value } => match split_suffix(&key) {
                    (base, Some(ENC_SUFFIX)) => {
                        let clear = self.open(&key, &value)?;
                        let key = if keep_suffix { key.clone() } else { base.to_string() };
                        out.push_param(key, clear);
                    }
                    _ => out.push_param(key, value),
                },
                other => out.lines.push(other),
            }
        }
        Ok(out.to_string())
    }

    /// Encrypt `cleartext`, reusing ciphertexts from `previous` whose
    /// cleartext did not change.
    ///
    /// Keys ending in `.ENC` or `.STRING` are secret, as is a bare key that
    /// was encrypted in `previous`. `.STRING` values are base64-encoded
    /// before encryption.
    pub fn encrypt(&self, cleartext: &str, previous: &str) -> Result<String> {
        let previous = self.previous_secrets(previous)?;
        let file = ParamFile::parse(cleartext)?;
        let mut out = ParamFile::default();
        let mut reused = 0usize;
        let mut sealed = 0usize;
        for line in file.lines {
            let (key, value) = match line {
                Line::Param { key, value } => (key, value),
                other => {
                    out.lines.push(other);
                    continue;
                }
            };
            let (base, suffix) = split_suffix(&key);
            let plaintext = match suffix {
                Some(STRING_SUFFIX) => STANDARD.encode(value.as_bytes()),
                Some(_) => value.clone(),
                None if previous.contains_key(base) => value.clone(),
                None => {
                    out.push_param(key.clone(), value);
                    continue;
                }
            };
            let cipher = match previous.get(base) {
                Some((cipher, clear)) if *clear == plaintext => {
                    reused += 1;
                    cipher.clone()
                }
                _ => {
                    sealed += 1;
                    STANDARD.encode(self.crypter.encrypt(plaintext.as_bytes())?)
                }
            };
            out.push_param(format!("{}{}", base, ENC_SUFFIX), cipher);
        }
        debug!(reused, sealed, "encrypted parameter file");
        Ok(out.to_string())
    }

    /// Decrypt then encrypt from scratch, so every ciphertext is replaced.
    pub fn re_encrypt(&self, contents: &str) -> Result<String> {
        let encoded = self.encode(contents)?;
        self.encrypt(&encoded, "")
    }

    pub fn reveal_file(&self, path: &Path) -> Result<String> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        self.decrypt(&contents)
    }

    pub fn re_encrypt_file(&self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let fresh = self.re_encrypt(&contents)?;
        std::fs::write(path, fresh).map_err(|e| Error::io(path, e))?;
        info!(file = %path.display(), "re-encrypted");
        Ok(())
    }

    /// Open `path` in `editor` using the [`EDIT_SCRATCH`] file in the
    /// working directory.
    pub fn edit(&self, path: &Path, editor: &str) -> Result<()> {
        self.edit_with_scratch(path, editor, Path::new(EDIT_SCRATCH))
    }

    /// Write the editable form to `scratch`, run `editor` on it and
    /// encrypt the result back into `path`. A missing `path` starts empty.
    /// `scratch` is removed on every exit path.
    pub fn edit_with_scratch(&self, path: &Path, editor: &str, scratch: &Path) -> Result<()> {
        let original = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(Error::io(path, e)),
        };
        let encoded = self.encode(&original)?;
        let scratch = ScratchFile::create(scratch, encoded.as_bytes())?;

        let mut words = editor.split_whitespace();
        let program = words.next().ok_or_else(|| Error::external("editor", "no editor configured"))?;
        let status = Command::new(program)
            .args(words)
            .arg(scratch.path())
            .status()
            .map_err(|e| Error::external("editor", format!("failed to execute {}: {}", program, e)))?;
        if !status.success() {
            return Err(Error::external("editor", format!("{} exited with {}", program, status)));
        }

        let edited = std::fs::read_to_string(scratch.path()).map_err(|e| Error::io(scratch.path(), e))?;
        let sealed = self.encrypt(&edited, &original)?;
        std::fs::write(path, sealed).map_err(|e| Error::io(path, e))?;
        info!(file = %path.display(), "saved");
        Ok(())
    }

    /// Bare key to (ciphertext, cleartext) for every `.ENC` record.
    fn previous_secrets(&self, previous: &str) -> Result<HashMap<String, (String, String)>> {
        let mut map = HashMap::new();
        for (key, value) in ParamFile::parse(previous)?.params() {
            if let (base, Some(ENC_SUFFIX)) = split_suffix(key) {
                let clear = self.open(key, value)?;
                map.insert(base.to_string(), (value.to_string(), clear));
            }
        }
        Ok(map)
    }

    fn open(&self, key: &str, value: &str) -> Result<String> {
        let cipher = STANDARD
            .decode(value.trim())
            .map_err(|e| Error::ParamsInvalid(format!("{}: value is not base64: {}", key, e)))?;
        let clear = self.crypter.decrypt(&cipher)?;
        String::from_utf8(clear).map_err(|_| Error::ParamsInvalid(format!("{}: decrypted value is not UTF-8", key)))
    }
}
