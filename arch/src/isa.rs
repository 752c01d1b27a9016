use std::collections::HashMap;

use bimap::BiMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use strum::{Display, IntoEnumIterator};
use thiserror::Error;

use crate::op::{Opcode, HAVE_ARGUMENT};

/// Which resolution rule an opcode's operand follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum OperandClass {
    None,
    Literal,
    AbsoluteJump,
    RelativeJump,
    Local,
    Name,
    Const,
    FreeOrCell,
}

impl OperandClass {
    pub fn is_jump(&self) -> bool {
        matches!(self, OperandClass::AbsoluteJump | OperandClass::RelativeJump)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IsaError {
    #[error("Unknown opcode: {0}")]
    UnknownOpcode(u8),

    #[error("Mnemonic registered twice: `{0}`")]
    DuplicateMnemonic(String),

    #[error("Opcode registered twice: {0}")]
    DuplicateOpcode(u8),
}

/// Immutable opcode metadata handed to the assembler.
///
/// Mnemonics are stored uppercase; lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct InstructionSet {
    ops: BiMap<String, u8>,
    classes: HashMap<u8, OperandClass>,
    have_argument: u8,
    extended_arg: u8,
}

static CPYTHON37: Lazy<InstructionSet> = Lazy::new(|| {
    let mut ops = BiMap::new();
    let mut classes = HashMap::new();
    for op in Opcode::iter() {
        ops.insert(op.name().to_string(), u8::from(op));
        classes.insert(u8::from(op), op.class());
    }
    InstructionSet {
        ops,
        classes,
        have_argument: HAVE_ARGUMENT,
        extended_arg: Opcode::EXTENDED_ARG.into(),
    }
});

impl InstructionSet {
    /// The default machine, built once from [`Opcode`].
    pub fn cpython37() -> &'static InstructionSet {
        &CPYTHON37
    }

    /// Start an instruction set for a synthetic machine. The widening prefix
    /// is registered immediately as a literal-operand opcode.
    pub fn builder(have_argument: u8, extended_arg: &str, extended_arg_code: u8) -> Builder {
        let mut ops = BiMap::new();
        ops.insert(extended_arg.to_ascii_uppercase(), extended_arg_code);
        let mut classes = HashMap::new();
        classes.insert(extended_arg_code, OperandClass::Literal);
        Builder {
            set: InstructionSet {
                ops,
                classes,
                have_argument,
                extended_arg: extended_arg_code,
            },
        }
    }

    pub fn opcode(&self, mnemonic: &str) -> Option<u8> {
        self.ops.get_by_left(&mnemonic.to_ascii_uppercase()).copied()
    }

    pub fn mnemonic(&self, opcode: u8) -> Option<&str> {
        self.ops.get_by_right(&opcode).map(|s| s.as_str())
    }

    pub fn classify(&self, opcode: u8) -> Result<OperandClass, IsaError> {
        let class = self
            .classes
            .get(&opcode)
            .copied()
            .ok_or(IsaError::UnknownOpcode(opcode))?;
        if self.has_argument(opcode) {
            Ok(class)
        } else {
            Ok(OperandClass::None)
        }
    }

    pub fn has_argument(&self, opcode: u8) -> bool {
        opcode >= self.have_argument
    }

    pub fn extended_arg(&self) -> u8 {
        self.extended_arg
    }

    pub fn is_extended_arg(&self, opcode: u8) -> bool {
        opcode == self.extended_arg
    }
}

pub struct Builder {
    set: InstructionSet,
}

impl Builder {
    pub fn op(mut self, mnemonic: &str, opcode: u8, class: OperandClass) -> Result<Self, IsaError> {
        let mnemonic = mnemonic.to_ascii_uppercase();
        if self.set.ops.contains_left(&mnemonic) {
            return Err(IsaError::DuplicateMnemonic(mnemonic));
        }
        if self.set.ops.contains_right(&opcode) {
            return Err(IsaError::DuplicateOpcode(opcode));
        }
        self.set.ops.insert(mnemonic, opcode);
        self.set.classes.insert(opcode, class);
        Ok(self)
    }

    pub fn build(self) -> InstructionSet {
        self.set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let isa = InstructionSet::cpython37();
        assert_eq!(isa.opcode("load_fast"), Some(124));
        assert_eq!(isa.mnemonic(83), Some("RETURN_VALUE"));
        assert_eq!(isa.extended_arg(), 144);
        assert_eq!(isa.classify(113), Ok(OperandClass::AbsoluteJump));
        assert_eq!(isa.classify(23), Ok(OperandClass::None));
        assert_eq!(isa.classify(0), Err(IsaError::UnknownOpcode(0)));
        assert_eq!(isa.opcode("HOGE"), None);
    }

    #[test]
    fn test_synthetic_set() {
        let isa = InstructionSet::builder(10, "wide", 15)
            .op("halt", 0, OperandClass::None)
            .and_then(|b| b.op("jmp", 10, OperandClass::AbsoluteJump))
            .and_then(|b| b.op("push", 11, OperandClass::Const))
            .map(Builder::build)
            .unwrap();
        assert_eq!(isa.opcode("WIDE"), Some(15));
        assert_eq!(isa.classify(10), Ok(OperandClass::AbsoluteJump));
        assert_eq!(isa.classify(0), Ok(OperandClass::None));
        assert!(isa.is_extended_arg(15));
    }

    #[test]
    fn test_duplicates() {
        let dup = InstructionSet::builder(10, "wide", 15).op("wide", 3, OperandClass::None);
        assert_eq!(dup.err(), Some(IsaError::DuplicateMnemonic("WIDE".to_string())));
        let dup = InstructionSet::builder(10, "wide", 15).op("other", 15, OperandClass::None);
        assert_eq!(dup.err(), Some(IsaError::DuplicateOpcode(15)));
    }
}
