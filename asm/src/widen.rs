//! Immediate widening.
//!
//! Operands are one byte wide. Larger values are split across a chain of
//! widening prefixes, most significant digit first, placed directly before
//! the instruction. A prefix moves every later offset, which can push a jump
//! operand past 255 in turn, so the layout is computed to a fixed point
//! before any byte is written:
//!
//! 1. every instruction starts at its written width (prefixes + 1)
//! 2. offsets are recomputed from the widths, every operand is evaluated
//!    against them and any instruction whose operand no longer fits grows
//! 3. repeat until nothing grows, then emit the buffer in one pass
//!
//! Widths only ever grow and are bounded by [`MAX_UNITS`], so the loop ends.

use arch::isa::InstructionSet;

use crate::encoder::{Arg, Instruction, JumpKind};
use crate::error::Error;

/// Width of one instruction unit in bytes.
pub const UNIT: u32 = 2;

/// Widest instruction: three prefixes carry the high bytes of a 32-bit operand.
pub const MAX_UNITS: u32 = 4;

/// Final byte stream of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Widened {
    pub code: Vec<u8>,
    /// Source line per emitted instruction; `None` for synthesized prefixes.
    pub lines: Vec<Option<usize>>,
    /// Offset of every instruction's prefix chain, plus the end of the code.
    pub offsets: Vec<u32>,
}

/// Instruction units needed to carry `value`.
pub fn units(value: u32) -> u32 {
    match value {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => MAX_UNITS,
    }
}

pub fn widen(isa: &InstructionSet, instructions: &[Instruction]) -> Result<Widened, Error> {
    let (widths, offsets) = relax(instructions)?;

    let total = offsets.last().copied().unwrap_or(0) as usize;
    let mut code = Vec::with_capacity(total);
    let mut lines = Vec::with_capacity(total / UNIT as usize);

    for (idx, inst) in instructions.iter().enumerate() {
        let value = operand(inst, idx, &offsets, &widths)?;
        let width = widths[idx];
        let synthesized = (width - 1) as usize - inst.prefixes.len();

        for (n, digit) in (1..width).rev().enumerate() {
            code.push(isa.extended_arg());
            code.push(value.checked_shr(8 * digit).unwrap_or(0) as u8);
            lines.push(n.checked_sub(synthesized).map(|written| inst.prefixes[written]));
        }
        code.push(inst.opcode);
        code.push(value as u8);
        lines.push(Some(inst.line));
    }

    Ok(Widened {
        code,
        lines,
        offsets,
    })
}

/// Grow widths until every operand fits. Returns the widths and the offsets
/// derived from them.
fn relax(instructions: &[Instruction]) -> Result<(Vec<u32>, Vec<u32>), Error> {
    let mut widths: Vec<u32> = instructions
        .iter()
        .map(|inst| inst.prefixes.len() as u32 + 1)
        .collect();

    loop {
        let offsets = layout(&widths);
        let mut grown = false;
        for (idx, inst) in instructions.iter().enumerate() {
            let need = units(operand(inst, idx, &offsets, &widths)?);
            if need > widths[idx] {
                widths[idx] = need;
                grown = true;
            }
        }
        if !grown {
            return Ok((widths, offsets));
        }
    }
}

fn layout(widths: &[u32]) -> Vec<u32> {
    let mut offsets = Vec::with_capacity(widths.len() + 1);
    let mut pos = 0;
    offsets.push(pos);
    for width in widths {
        pos += width * UNIT;
        offsets.push(pos);
    }
    offsets
}

/// Full operand value of `inst` under the given layout.
fn operand(inst: &Instruction, idx: usize, offsets: &[u32], widths: &[u32]) -> Result<u32, Error> {
    match inst.arg {
        Arg::None => Ok(0),
        Arg::Value(v) => Ok(v),
        Arg::Jump(JumpKind::Absolute, target) => Ok(offsets[target]),
        Arg::Jump(JumpKind::Relative, target) => {
            // relative to the first byte after the jump itself
            let next = offsets[idx] + widths[idx] * UNIT;
            let delta = offsets[target] as i64 - next as i64;
            u32::try_from(delta).map_err(|_| Error::OperandOutOfRange(inst.line, delta))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOP: u8 = 9;
    const LOAD_CONST: u8 = 100;
    const JUMP_FORWARD: u8 = 110;
    const JUMP_ABSOLUTE: u8 = 113;
    const RETURN_VALUE: u8 = 83;
    const EXT: u8 = 144;

    fn widen(instructions: &[Instruction]) -> Widened {
        super::widen(InstructionSet::cpython37(), instructions).unwrap()
    }

    fn inst(opcode: u8, arg: Arg) -> Instruction {
        Instruction::new(0, opcode, arg)
    }

    /// Decode a prefixed operand back, most significant digit first.
    fn full_value(code: &[u8], at: usize) -> u32 {
        let mut value = code[at + 1] as u32;
        let mut pos = at;
        let mut shift = 8;
        while pos >= 2 && code[pos - 2] == EXT {
            value |= (code[pos - 1] as u32) << shift;
            shift += 8;
            pos -= 2;
        }
        value
    }

    #[test]
    fn test_small_operands_unchanged() {
        let out = widen(&[
            inst(LOAD_CONST, Arg::Value(1)),
            inst(NOP, Arg::None),
            inst(JUMP_ABSOLUTE, Arg::Jump(JumpKind::Absolute, 1)),
            inst(RETURN_VALUE, Arg::None),
        ]);
        assert_eq!(out.code, vec![LOAD_CONST, 1, NOP, 0, JUMP_ABSOLUTE, 2, RETURN_VALUE, 0]);
        assert_eq!(out.offsets, vec![0, 2, 4, 6, 8]);
        assert!(out.lines.iter().all(|l| l.is_some()));
    }

    macro_rules! test_value {
        ($($name:ident: $value:expr => $bytes:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    let out = widen(&[inst(LOAD_CONST, Arg::Value($value))]);
                    assert_eq!(out.code, $bytes);
                    let at = out.code.len() - 2;
                    assert_eq!(out.code[at + 1] as u32, $value % 256);
                    assert_eq!(full_value(&out.code, at), $value);
                }
            )*
        }
    }

    test_value! {
        test_value_255: 255 => vec![LOAD_CONST, 255],
        test_value_256: 256 => vec![EXT, 1, LOAD_CONST, 0],
        test_value_300: 300 => vec![EXT, 1, LOAD_CONST, 44],
        test_value_70000: 70000 => vec![EXT, 0x01, EXT, 0x11, LOAD_CONST, 0x70],
        test_value_max: 0xFFFF_FFFF => vec![EXT, 0xFF, EXT, 0xFF, EXT, 0xFF, LOAD_CONST, 0xFF],
    }

    #[test]
    fn test_written_prefix_absorbs_digit() {
        let mut folded = Instruction::new(1, LOAD_CONST, Arg::Value(556));
        folded.prefixes = vec![0];
        let out = widen(&[folded]);
        assert_eq!(out.code, vec![EXT, 2, LOAD_CONST, 44]);
        assert_eq!(out.lines, vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_written_prefix_keeps_width() {
        let mut narrow = Instruction::new(1, LOAD_CONST, Arg::Value(3));
        narrow.prefixes = vec![0];
        let out = widen(&[narrow]);
        assert_eq!(out.code, vec![EXT, 0, LOAD_CONST, 3]);
    }

    #[test]
    fn test_digits_past_operand_are_zero() {
        let mut long = Instruction::new(4, LOAD_CONST, Arg::Value(1));
        long.prefixes = vec![0, 1, 2, 3];
        let out = widen(&[long]);
        assert_eq!(out.code, vec![EXT, 0, EXT, 0, EXT, 0, EXT, 0, LOAD_CONST, 1]);
    }

    #[test]
    fn test_synthesized_prefix_has_no_line() {
        let out = widen(&[Instruction::new(7, LOAD_CONST, Arg::Value(300))]);
        assert_eq!(out.lines, vec![None, Some(7)]);
    }

    #[test]
    fn test_absolute_target_after_widening() {
        let out = widen(&[
            inst(NOP, Arg::None),
            inst(LOAD_CONST, Arg::Value(300)),
            inst(NOP, Arg::None),
            inst(JUMP_ABSOLUTE, Arg::Jump(JumpKind::Absolute, 2)),
        ]);
        assert_eq!(out.offsets, vec![0, 2, 6, 8, 10]);
        assert_eq!(&out.code[8..], &[JUMP_ABSOLUTE, 6]);
    }

    #[test]
    fn test_relative_jump_after_widened_instruction() {
        let out = widen(&[
            inst(LOAD_CONST, Arg::Value(300)),
            inst(JUMP_FORWARD, Arg::Jump(JumpKind::Relative, 3)),
            inst(NOP, Arg::None),
            inst(RETURN_VALUE, Arg::None),
        ]);
        assert_eq!(&out.code[4..6], &[JUMP_FORWARD, 2]);
        assert_eq!(out.offsets[3], 8);
    }

    #[test]
    fn test_relative_jump_over_widened_instruction() {
        let out = widen(&[
            inst(JUMP_FORWARD, Arg::Jump(JumpKind::Relative, 2)),
            inst(LOAD_CONST, Arg::Value(300)),
            inst(RETURN_VALUE, Arg::None),
        ]);
        assert_eq!(&out.code[..2], &[JUMP_FORWARD, 4]);
        assert_eq!(out.offsets[2], 6);
    }

    #[test]
    fn test_widening_cascades_into_jump() {
        // the jump fits until the constant grows, then must grow itself
        let mut program = vec![inst(JUMP_ABSOLUTE, Arg::Jump(JumpKind::Absolute, 127))];
        program.extend((0..125).map(|_| inst(NOP, Arg::None)));
        program.push(inst(LOAD_CONST, Arg::Value(300)));
        program.push(inst(NOP, Arg::None));
        assert_eq!(program.len(), 128);

        let out = widen(&program);
        assert_eq!(&out.code[..4], &[EXT, 1, JUMP_ABSOLUTE, 2]);
        assert_eq!(out.offsets[127], 258);
        assert_eq!(out.code.len(), 260);
        assert_eq!(&out.code[258..], &[NOP, 0]);
    }

    #[test]
    fn test_backward_relative_rejected() {
        let program = vec![
            Instruction::new(0, NOP, Arg::None),
            Instruction::new(1, JUMP_FORWARD, Arg::Jump(JumpKind::Relative, 0)),
        ];
        assert_eq!(
            super::widen(InstructionSet::cpython37(), &program),
            Err(Error::OperandOutOfRange(1, -4))
        );
    }
}
