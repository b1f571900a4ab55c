//! Transport arguments carried in the SOCKS username/password fields
//!
//! Format: `key=value` pairs separated by `;`. A backslash escapes the
//! character that follows it.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Parsed transport arguments. A key may repeat; every value is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    values: BTreeMap<String, Vec<String>>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an argument string; the empty string yields no arguments.
    pub fn parse(s: &str) -> Result<Self> {
        let mut args = Args::new();
        if s.is_empty() {
            return Ok(args);
        }

        let mut chars = s.chars().peekable();
        loop {
            let (key, delim) = read_until(&mut chars, &['=', ';'])?;
            if delim != Some('=') {
                return Err(Error::Protocol(format!("no equals sign in {:?}", key)));
            }
            let (value, delim) = read_until(&mut chars, &[';'])?;
            if key.is_empty() {
                return Err(Error::Protocol(format!("empty key in {:?}", s)));
            }
            args.add(key, value);

            if delim.is_none() {
                break;
            }
        }

        Ok(args)
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    /// First value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Read an unescaped token up to one of `delims`, consuming the delimiter.
fn read_until<I>(chars: &mut std::iter::Peekable<I>, delims: &[char]) -> Result<(String, Option<char>)>
where
    I: Iterator<Item = char>,
{
    let mut token = String::new();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(escaped) => token.push(escaped),
                None => return Err(Error::Protocol("terminal backslash".into())),
            }
        } else if delims.contains(&c) {
            return Ok((token, Some(c)));
        } else {
            token.push(c);
        }
    }
    Ok((token, None))
}

fn escape(s: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for c in s.chars() {
        if matches!(c, '=' | ';' | '\\') {
            write!(f, "\\")?;
        }
        write!(f, "{}", c)?;
    }
    Ok(())
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, values) in &self.values {
            for value in values {
                if !first {
                    write!(f, ";")?;
                }
                first = false;
                escape(key, f)?;
                write!(f, "=")?;
                escape(value, f)?;
            }
        }
        Ok(())
    }
}
