use arch::isa::{InstructionSet, OperandClass};

use crate::error::Error;
use crate::label::SymbolTable;
use crate::parser::{Operand, Stmt};
use crate::source::Entry;
use crate::tables::Tables;
use crate::widen::MAX_UNITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Absolute,
    Relative,
}

/// Operand of an encoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    None,
    Value(u32),
    /// Jump to the instruction at this index; the byte value depends on layout.
    Jump(JumpKind, usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub line: usize,
    pub opcode: u8,
    pub arg: Arg,
    /// Lines of widening prefixes written in the listing before this instruction.
    pub prefixes: Vec<usize>,
}

impl Instruction {
    pub fn new(line: usize, opcode: u8, arg: Arg) -> Self {
        Instruction {
            line,
            opcode,
            arg,
            prefixes: vec![],
        }
    }
}

/// Result of pass 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub instructions: Vec<Instruction>,
    pub symbols: SymbolTable,
}

/// Jump operand waiting for its label.
struct Pending {
    index: usize,
    line: usize,
    kind: JumpKind,
    label: String,
}

pub struct Encoder<'a> {
    isa: &'a InstructionSet,
    tables: &'a Tables,
}

impl<'a> Encoder<'a> {
    pub fn new(isa: &'a InstructionSet, tables: &'a Tables) -> Self {
        Encoder { isa, tables }
    }

    pub fn encode(&self, entries: &[Entry]) -> Result<Encoded, Error> {
        let mut instructions: Vec<Instruction> = vec![];
        let mut symbols = SymbolTable::new();
        let mut jumps: Vec<Pending> = vec![];
        // (line, digit) of prefixes not yet attached to an instruction
        let mut prefixes: Vec<(usize, u32)> = vec![];
        let mut offset: u32 = 0;

        for entry in entries {
            let stmt = Stmt::parse(entry.line, &entry.text)?;
            let chain_start = offset - 2 * prefixes.len() as u32;
            for label in &stmt.labels {
                symbols.define(label, entry.line, instructions.len(), chain_start)?;
            }

            let Some(code) = stmt.code else {
                continue;
            };
            let opcode = self
                .isa
                .opcode(&code.mnemonic)
                .ok_or_else(|| Error::UnknownMnemonic(entry.line, code.mnemonic.clone()))?;
            let class = self.isa.classify(opcode)?;
            offset += 2;

            if self.isa.is_extended_arg(opcode) {
                let digit = match code.operand {
                    Some(Operand::Literal(v)) if (0..=0xFF).contains(&v) => v as u32,
                    Some(Operand::Literal(v)) => return Err(Error::OperandOutOfRange(entry.line, v)),
                    Some(Operand::Symbol(s)) => {
                        return Err(Error::MalformedOperand(
                            entry.line,
                            format!("widening prefix takes an integer, found `{}`", s),
                        ))
                    }
                    None => return Err(missing(entry.line, &code.mnemonic)),
                };
                if prefixes.len() as u32 + 1 >= MAX_UNITS {
                    return Err(Error::MalformedOperand(
                        entry.line,
                        format!("at most {} widening prefixes per instruction", MAX_UNITS - 1),
                    ));
                }
                prefixes.push((entry.line, digit));
                continue;
            }

            let high = high_digits(&prefixes, entry.line)?;
            let arg = match (class, code.operand) {
                (OperandClass::None, None) if prefixes.is_empty() => Arg::None,
                (OperandClass::None, None) => Arg::Value(widen_literal(high, 0, entry.line)?),
                (OperandClass::None, Some(_)) => {
                    return Err(Error::MalformedOperand(
                        entry.line,
                        format!("`{}` takes no operand", code.mnemonic),
                    ))
                }
                (_, None) => return Err(missing(entry.line, &code.mnemonic)),
                (_, Some(Operand::Literal(v))) => Arg::Value(widen_literal(high, v, entry.line)?),
                (class, Some(Operand::Symbol(name))) => {
                    match self.resolve(class, &name, entry.line)? {
                        Some(value) => Arg::Value(value),
                        None => {
                            let kind = match class {
                                OperandClass::AbsoluteJump => JumpKind::Absolute,
                                _ => JumpKind::Relative,
                            };
                            jumps.push(Pending {
                                index: instructions.len(),
                                line: entry.line,
                                kind,
                                label: name,
                            });
                            // placeholder until every label is known
                            Arg::None
                        }
                    }
                }
            };

            instructions.push(Instruction {
                line: entry.line,
                opcode,
                arg,
                prefixes: prefixes.drain(..).map(|(line, _)| line).collect(),
            });
        }

        if let Some((line, _)) = prefixes.last() {
            return Err(Error::MalformedOperand(
                *line,
                "widening prefix without a following instruction".to_string(),
            ));
        }

        // Forward references are resolvable only now.
        for jump in jumps {
            let binding = symbols
                .get(&jump.label)
                .ok_or_else(|| Error::UndefinedLabel(jump.line, jump.label.clone()))?;
            instructions[jump.index].arg = Arg::Jump(jump.kind, binding.index);
        }

        Ok(Encoded {
            instructions,
            symbols,
        })
    }

    /// Resolve a symbolic operand. Jumps return `None` and are resolved
    /// after the whole listing has been read.
    fn resolve(&self, class: OperandClass, name: &str, line: usize) -> Result<Option<u32>, Error> {
        let undefined = || Error::UndefinedSymbol(line, name.to_string());
        let idx = match class {
            OperandClass::AbsoluteJump | OperandClass::RelativeJump => return Ok(None),
            OperandClass::Local => self.tables.local(name).ok_or_else(undefined)?,
            OperandClass::Name => self.tables.name(name).ok_or_else(undefined)?,
            OperandClass::FreeOrCell => self.tables.free_or_cell(name).ok_or_else(undefined)?,
            OperandClass::Const => self
                .tables
                .constant(name)
                .ok_or_else(|| Error::UndefinedConstant(line, name.to_string()))?,
            OperandClass::Literal | OperandClass::None => {
                return Err(Error::MalformedOperand(
                    line,
                    format!("expected an integer, found `{}`", name),
                ))
            }
        };
        u32::try_from(idx)
            .map(Some)
            .map_err(|_| Error::OperandOutOfRange(line, idx as i64))
    }
}

fn missing(line: usize, mnemonic: &str) -> Error {
    Error::MalformedOperand(line, format!("`{}` requires an operand", mnemonic))
}

/// Value carried by written prefixes, most significant digit first.
fn high_digits(prefixes: &[(usize, u32)], line: usize) -> Result<u64, Error> {
    let mut high: u64 = 0;
    for (_, digit) in prefixes {
        high = (high << 8) | *digit as u64;
        if high > u32::MAX as u64 {
            return Err(Error::OperandOutOfRange(line, high as i64));
        }
    }
    Ok(high)
}

/// Fold written prefix digits into a literal: `high * 256 + literal`.
fn widen_literal(high: u64, literal: i64, line: usize) -> Result<u32, Error> {
    if literal < 0 {
        return Err(Error::OperandOutOfRange(line, literal));
    }
    let full = (high << 8) as i128 + literal as i128;
    u32::try_from(full).map_err(|_| Error::OperandOutOfRange(line, full as i64))
}
