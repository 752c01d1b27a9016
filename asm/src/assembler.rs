use arch::isa::InstructionSet;

use crate::encoder::Encoder;
use crate::error::Error;
use crate::lnotab;
use crate::source::Source;
use crate::tables::{ReservedSlot, Tables};
use crate::unit::CodeUnit;
use crate::value::parse_int;
use crate::widen::widen;

/// Assembly settings for one code unit.
///
/// ```ignore
/// let unit = Assembler::default()
///     .params(&["n"])
///     .assemble(".stacksize 2\n.consts\n4\n.code\nLOAD_FAST n\nLOAD_CONST 1\nBINARY_ADD\nRETURN_VALUE")?;
/// ```
#[derive(Debug, Clone)]
pub struct Assembler<'a> {
    isa: &'a InstructionSet,
    params: Vec<String>,
    reserved: ReservedSlot,
    first_line: usize,
}

impl Default for Assembler<'static> {
    fn default() -> Self {
        Assembler::new(InstructionSet::cpython37())
    }
}

impl<'a> Assembler<'a> {
    pub fn new(isa: &'a InstructionSet) -> Self {
        Assembler {
            isa,
            params: vec![],
            reserved: ReservedSlot::default(),
            first_line: 0,
        }
    }

    /// Parameter names; they occupy the first local slots.
    pub fn params<S: AsRef<str>>(mut self, params: &[S]) -> Self {
        self.params = params.iter().map(|p| p.as_ref().to_string()).collect();
        self
    }

    pub fn reserved(mut self, reserved: ReservedSlot) -> Self {
        self.reserved = reserved;
        self
    }

    /// Line number of the line before the listing. With the default of 0,
    /// `line_for` gives 1-based file lines.
    pub fn first_line(mut self, first_line: usize) -> Self {
        self.first_line = first_line;
        self
    }

    pub fn isa(&self) -> &'a InstructionSet {
        self.isa
    }

    pub fn assemble(&self, text: &str) -> Result<CodeUnit, Error> {
        self.assemble_source(&Source::parse(text))
    }

    pub fn assemble_source(&self, source: &Source) -> Result<CodeUnit, Error> {
        let stacksize = stacksize(source)?;
        let tables = Tables::build(source, self.params.as_slice(), self.reserved)?;
        let code = source.require("code")?;

        // Pass 1: symbolic operands to indices
        let encoded = Encoder::new(self.isa, &tables).encode(code)?;

        // Pass 2: layout and widening prefixes
        let widened = widen(self.isa, &encoded.instructions)?;
        let mut symbols = encoded.symbols;
        symbols.relocate(&widened.offsets);

        // Pass 3: line table
        let lnotab = lnotab::encode(&widened.lines, source.header_lines() + 1);

        Ok(CodeUnit {
            argcount: tables.argcount,
            nlocals: tables.varnames.len(),
            stacksize,
            flags: tables.flags,
            code: widened.code,
            consts: tables.consts.values().to_vec(),
            names: tables.names,
            varnames: tables.varnames,
            freevars: tables.freevars,
            cellvars: tables.cellvars,
            first_line: self.first_line,
            lnotab,
            symbols: symbols.offsets(),
            doc: source.doc().map(|d| d.to_string()),
        })
    }
}

fn stacksize(source: &Source) -> Result<u32, Error> {
    let entry = &source.require("stacksize")?[0];
    parse_int(&entry.text)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| {
            Error::MalformedOperand(
                entry.line,
                format!("stack size must be a non-negative integer, found `{}`", entry.text),
            )
        })
}
