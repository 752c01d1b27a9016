use std::fmt;

use serde::{Deserialize, Serialize};

/// A literal stored in the constant table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Const {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Const {
    pub fn parse(s: &str) -> Option<Const> {
        let s = s.trim();
        match s {
            "None" => return Some(Const::None),
            "True" => return Some(Const::Bool(true)),
            "False" => return Some(Const::Bool(false)),
            _ => {}
        }
        if let Some(text) = parse_quoted(s) {
            return Some(Const::Str(text));
        }
        if let Some(v) = parse_int(s) {
            return Some(Const::Int(v));
        }
        if s.chars().any(|c| c.is_ascii_digit()) {
            if let Ok(v) = s.parse::<f64>() {
                return Some(Const::Float(v));
            }
        }
        None
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Const::None => write!(f, "None"),
            Const::Bool(true) => write!(f, "True"),
            Const::Bool(false) => write!(f, "False"),
            Const::Int(v) => write!(f, "{}", v),
            Const::Float(v) => write!(f, "{:?}", v),
            Const::Str(s) => {
                write!(f, "'")?;
                for c in s.chars() {
                    match c {
                        '\\' => write!(f, "\\\\")?,
                        '\'' => write!(f, "\\'")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        ';' => write!(f, "\\x3b")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                write!(f, "'")
            }
        }
    }
}

/// Integer with optional sign and `0x`/`0o`/`0b` prefix.
pub fn parse_int(s: &str) -> Option<i64> {
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if body.is_empty() {
        return None;
    }
    let (radix, digits) = match body.get(..2) {
        Some("0x") | Some("0X") => (16, &body[2..]),
        Some("0o") | Some("0O") => (8, &body[2..]),
        Some("0b") | Some("0B") => (2, &body[2..]),
        _ => (10, body),
    };
    let digits = digits.replace('_', "");
    if digits.is_empty() || digits.starts_with('+') || digits.starts_with('-') {
        return None;
    }
    let v = i64::from_str_radix(&digits, radix).ok()?;
    Some(if neg { -v } else { v })
}

fn parse_quoted(s: &str) -> Option<String> {
    let quote = s.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let inner = s.strip_prefix(quote)?.strip_suffix(quote)?;

    let mut out = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == quote {
            return None;
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            other => out.push(other),
        }
    }
    Some(out)
}
