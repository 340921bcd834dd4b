//! Interactive confirmation prompts.

use std::io::{self, BufRead, Write};

/// Ask until one of `choices` is answered. End of input counts as `n`.
pub fn ask(input: &mut dyn BufRead, out: &mut dyn Write, question: &str, choices: &[&str]) -> io::Result<String> {
    loop {
        write!(out, "{} ", question)?;
        out.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            return Ok("n".to_string());
        }
        let answer = line.trim().to_ascii_lowercase();
        if choices.contains(&answer.as_str()) {
            return Ok(answer);
        }
        writeln!(out, "Please answer one of: {}", choices.join(", "))?;
    }
}
