//! Parameter file model: newline-terminated `KEY=VALUE` records.
//!
//! Blank lines and `#` comments are kept verbatim so re-encrypting a file
//! leaves its layout alone.

use std::fmt;

use tailor_core::{Error, Result};

pub const ENC_SUFFIX: &str = ".ENC";
pub const STRING_SUFFIX: &str = ".STRING";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Param { key: String, value: String },
    Other(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamFile {
    pub lines: Vec<Line>,
}

impl ParamFile {
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = Vec::new();
        for (n, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                lines.push(Line::Other(line.to_string()));
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    lines.push(Line::Param { key: key.trim().to_string(), value: value.to_string() })
                }
                _ => return Err(Error::ParamsInvalid(format!("line {}: expected KEY=VALUE, got '{}'", n + 1, line))),
            }
        }
        Ok(Self { lines })
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|l| match l {
            Line::Param { key, value } => Some((key.as_str(), value.as_str())),
            Line::Other(_) => None,
        })
    }

    pub fn push_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.lines.push(Line::Param { key: key.into(), value: value.into() });
    }
}

impl fmt::Display for ParamFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            match line {
                Line::Param { key, value } => writeln!(f, "{}={}", key, value)?,
                Line::Other(raw) => writeln!(f, "{}", raw)?,
            }
        }
        Ok(())
    }
}

/// Split `KEY.ENC` / `KEY.STRING` into the bare key and its suffix.
pub fn split_suffix(key: &str) -> (&str, Option<&'static str>) {
    for suffix in [ENC_SUFFIX, STRING_SUFFIX] {
        if let Some(base) = key.strip_suffix(suffix) {
            return (base, Some(suffix));
        }
    }
    (key, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_renders_losslessly() {
        let text = "# db\nUSER=app\n\nPASSWORD.ENC=abc==\nURL=http://x?a=b\n";
        let f = ParamFile::parse(text).unwrap();
        assert_eq!(f.params().collect::<Vec<_>>(), vec![("USER", "app"), ("PASSWORD.ENC", "abc=="), ("URL", "http://x?a=b")]);
        assert_eq!(f.to_string(), text);
    }

    #[test]
    fn missing_newline_is_normalized() {
        assert_eq!(ParamFile::parse("A=1").unwrap().to_string(), "A=1\n");
    }

    #[test]
    fn lines_without_equals_are_rejected() {
        let err = ParamFile::parse("A=1\nbroken\n").unwrap_err();
        assert!(matches!(err, Error::ParamsInvalid(ref m) if m.contains("line 2")));
        assert!(ParamFile::parse("=value\n").is_err());
    }

    #[test]
    fn suffixes_are_split() {
        assert_eq!(split_suffix("PW.ENC"), ("PW", Some(ENC_SUFFIX)));
        assert_eq!(split_suffix("PW.STRING"), ("PW", Some(STRING_SUFFIX)));
        assert_eq!(split_suffix("PW"), ("PW", None));
    }
}
