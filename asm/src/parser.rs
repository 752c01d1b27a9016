use crate::error::Error;
use crate::value::parse_int;

// ----------------------------------------------------------------------------
// Statement

/// One code line: `[label:]* [MNEMONIC [operand]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    pub labels: Vec<String>,
    pub code: Option<Code>,
}

impl Stmt {
    pub fn parse(line: usize, text: &str) -> Result<Stmt, Error> {
        let mut labels = vec![];
        let mut rest = text.trim();

        // main: loop: NOP
        while let Some((head, tail)) = rest.split_once(':') {
            let head = head.trim();
            if !is_ident(head) {
                break;
            }
            labels.push(head.to_string());
            rest = tail.trim();
        }

        if rest.is_empty() {
            return Ok(Stmt { labels, code: None });
        }

        let code = Code::parse(line, rest)?;
        Ok(Stmt {
            labels,
            code: Some(code),
        })
    }
}

// ----------------------------------------------------------------------------
// Code

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub mnemonic: String,
    pub operand: Option<Operand>,
}

impl Code {
    fn parse(line: usize, text: &str) -> Result<Code, Error> {
        let words: Vec<&str> = text.split_whitespace().collect();
        match words.as_slice() {
            [mnemonic] => Ok(Code {
                mnemonic: mnemonic.to_string(),
                operand: None,
            }),
            [mnemonic, operand] => Ok(Code {
                mnemonic: mnemonic.to_string(),
                operand: Some(Operand::parse(operand)),
            }),
            [_, _, extra, ..] => Err(Error::MalformedOperand(
                line,
                format!("unexpected token `{}`", extra),
            )),
            [] => Err(Error::MalformedOperand(line, "empty statement".to_string())),
        }
    }
}

// ----------------------------------------------------------------------------
// Operand token

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal(i64),
    Symbol(String),
}

impl Operand {
    pub fn parse(s: &str) -> Operand {
        match parse_int(s) {
            Some(v) => Operand::Literal(v),
            None => Operand::Symbol(s.to_string()),
        }
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '.')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}
