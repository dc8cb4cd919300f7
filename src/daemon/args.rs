//! Shared `--flag value` parsing for the command socket's `args` string.
//!
//! Each command (`open`, `run`, `attach`, ...) carries its own raw `args`
//! string rather than a structured object; every handler uses this common
//! shlex-split + flag-scan so the parsing convention stays uniform across
//! the dispatch table.

use std::collections::HashMap;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct ParsedArgs {
    pub positional: Vec<String>,
    pub flags: HashMap<String, String>,
}

impl ParsedArgs {
    pub fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }

    pub fn positional(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }
}

/// Splits `input` shell-style, then scans for `--name value` pairs
/// (`--name=value` is also accepted); anything else is positional.
pub fn parse(input: &str) -> Result<ParsedArgs> {
    let tokens = shlex::split(input).ok_or_else(|| Error::InvalidRequest(format!("could not parse args: {input}")))?;

    let mut parsed = ParsedArgs::default();
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        if let Some(flag) = token.strip_prefix("--") {
            if let Some((name, value)) = flag.split_once('=') {
                parsed.flags.insert(name.to_string(), value.to_string());
            } else {
                let value = iter
                    .next()
                    .ok_or_else(|| Error::InvalidRequest(format!("flag --{flag} expects a value")))?;
                parsed.flags.insert(flag.to_string(), value);
            }
        } else {
            parsed.positional.push(token);
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positional_and_flag_pairs() {
        let args = parse("9229 --type node --target abc").unwrap();
        assert_eq!(args.positional(0), Some("9229"));
        assert_eq!(args.flag("type"), Some("node"));
        assert_eq!(args.flag("target"), Some("abc"));
    }

    #[test]
    fn parses_equals_form() {
        let args = parse("--type=page").unwrap();
        assert_eq!(args.flag("type"), Some("page"));
    }

    #[test]
    fn missing_flag_value_is_an_error() {
        assert!(parse("--type").is_err());
    }
}
