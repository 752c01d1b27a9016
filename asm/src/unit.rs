use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::lnotab;
use crate::value::Const;

/// An assembled code unit: the byte stream plus every table the VM needs to
/// run it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeUnit {
    pub argcount: usize,
    pub nlocals: usize,
    pub stacksize: u32,
    pub flags: u32,
    pub code: Vec<u8>,
    pub consts: Vec<Const>,
    pub names: Vec<String>,
    pub varnames: Vec<String>,
    pub freevars: Vec<String>,
    pub cellvars: Vec<String>,
    pub first_line: usize,
    pub lnotab: Vec<u8>,
    /// label -> byte offset, in definition order
    #[serde(default)]
    pub symbols: IndexMap<String, u32>,
    /// Documentation text that preceded the listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl CodeUnit {
    /// Source line of the instruction at byte `offset`.
    pub fn line_for(&self, offset: u32) -> usize {
        lnotab::lookup(&self.lnotab, self.first_line, offset)
    }

    /// Local names that are not parameters.
    pub fn locals(&self) -> &[String] {
        self.varnames.get(self.argcount..).unwrap_or(&[])
    }

    pub fn label(&self, name: &str) -> Option<u32> {
        self.symbols.get(name).copied()
    }
}
