use std::collections::BTreeSet;
use std::fmt::Write;

use arch::flags::{flag_names, CodeFlag};
use arch::isa::{InstructionSet, OperandClass};

use crate::error::Error;
use crate::source::HEADER_MARKER;
use crate::tables::free_or_cell_name;
use crate::unit::CodeUnit;
use crate::widen::UNIT;

/// One instruction as the VM sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub offset: u32,
    pub opcode: u8,
    pub mnemonic: String,
    pub class: OperandClass,
    /// Operand including the digits of any preceding prefixes.
    pub arg: Option<u32>,
    /// Jump destination for jumps, `arg` otherwise.
    pub argval: Option<u32>,
    pub argrepr: String,
    pub is_jump_target: bool,
}

/// Walk the byte stream, accumulating widening prefixes into the following
/// instruction's operand.
pub fn decode(unit: &CodeUnit, isa: &InstructionSet) -> Result<Vec<Decoded>, Error> {
    if unit.code.len() % 2 != 0 {
        return Err(Error::MalformedCode(format!(
            "code length {} is not a multiple of {}",
            unit.code.len(),
            UNIT
        )));
    }

    let mut decoded = vec![];
    let mut extended: u32 = 0;
    for (idx, pair) in unit.code.chunks_exact(2).enumerate() {
        let offset = idx as u32 * UNIT;
        let opcode = pair[0];
        let mnemonic = isa
            .mnemonic(opcode)
            .ok_or(Error::UnknownOpcode(offset, opcode))?;
        let class = isa.classify(opcode)?;

        let arg = if isa.has_argument(opcode) {
            let arg = pair[1] as u32 | extended;
            extended = if isa.is_extended_arg(opcode) { arg << 8 } else { 0 };
            Some(arg)
        } else {
            extended = 0;
            None
        };

        let argval = match (class, arg) {
            (OperandClass::RelativeJump, Some(arg)) => (offset + UNIT).checked_add(arg),
            (_, arg) => arg,
        };
        let argrepr = match (isa.is_extended_arg(opcode), argval) {
            (false, Some(value)) => repr(unit, class, value),
            _ => String::new(),
        };

        decoded.push(Decoded {
            offset,
            opcode,
            mnemonic: mnemonic.to_string(),
            class,
            arg,
            argval,
            argrepr,
            is_jump_target: false,
        });
    }

    let targets = jump_targets(&decoded);
    for inst in &mut decoded {
        inst.is_jump_target = targets.contains(&inst.offset);
    }
    Ok(decoded)
}

fn repr(unit: &CodeUnit, class: OperandClass, value: u32) -> String {
    let idx = value as usize;
    match class {
        OperandClass::Local => unit.varnames.get(idx).cloned().unwrap_or_default(),
        OperandClass::Name => unit.names.get(idx).cloned().unwrap_or_default(),
        OperandClass::Const => unit
            .consts
            .get(idx)
            .map(|c| c.to_string())
            .unwrap_or_default(),
        OperandClass::FreeOrCell => free_or_cell_name(&unit.cellvars, &unit.freevars, idx)
            .unwrap_or_default()
            .to_string(),
        OperandClass::AbsoluteJump | OperandClass::RelativeJump => format!("to {}", value),
        OperandClass::Literal | OperandClass::None => String::new(),
    }
}

fn jump_targets(decoded: &[Decoded]) -> BTreeSet<u32> {
    decoded
        .iter()
        .filter(|inst| inst.class.is_jump())
        .filter_map(|inst| inst.argval)
        .collect()
}

/// Render a unit back into listing text that assembles to the same bytes.
pub fn disassemble(unit: &CodeUnit, isa: &InstructionSet) -> Result<String, Error> {
    let decoded = decode(unit, isa)?;
    let end = unit.code.len() as u32;
    // A label binds to the start of a prefix chain, so targets inside a
    // chain stay literal.
    let mut chain_starts = BTreeSet::from([end]);
    let mut in_chain = false;
    for inst in &decoded {
        if !in_chain {
            chain_starts.insert(inst.offset);
        }
        in_chain = isa.is_extended_arg(inst.opcode);
    }
    let targets: BTreeSet<u32> = jump_targets(&decoded)
        .intersection(&chain_starts)
        .copied()
        .collect();

    let mut out = String::new();
    if let Some(doc) = &unit.doc {
        writeln!(out, "{}", doc).ok();
        writeln!(out, "{}", HEADER_MARKER).ok();
    }

    writeln!(out, ".stacksize {}", unit.stacksize).ok();
    if unit.flags != 0 {
        let mut flags: Vec<String> = flag_names(unit.flags)
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        let known = CodeFlag::all_bits();
        if unit.flags & !known != 0 {
            flags.push(format!("0x{:x}", unit.flags & !known));
        }
        writeln!(out, ".flags {}", flags.join(", ")).ok();
    }
    let lists = [
        ("locals", unit.locals()),
        ("names", unit.names.as_slice()),
        ("freevars", unit.freevars.as_slice()),
        ("cellvars", unit.cellvars.as_slice()),
    ];
    for (name, list) in lists {
        if !list.is_empty() {
            writeln!(out, ".{} {}", name, list.join(", ")).ok();
        }
    }
    if unit.consts.len() > 1 {
        writeln!(out, ".consts").ok();
        for value in &unit.consts[1..] {
            writeln!(out, "    {}", value).ok();
        }
    }

    writeln!(out, ".code").ok();
    for inst in &decoded {
        if targets.contains(&inst.offset) {
            writeln!(out, "  t{}:", inst.offset).ok();
        }
        let line = match (inst.arg, inst.argval) {
            (Some(_), Some(target)) if inst.class.is_jump() && targets.contains(&target) => {
                format!("{:<25} t{}", inst.mnemonic, target)
            }
            (Some(arg), _) if inst.argrepr.is_empty() => {
                format!("{:<25} {}", inst.mnemonic, arg % 256)
            }
            (Some(arg), _) => format!("{:<25} {} ; ({})", inst.mnemonic, arg % 256, inst.argrepr),
            (None, _) => inst.mnemonic.clone(),
        };
        writeln!(out, "    {}", line).ok();
    }
    if targets.contains(&end) {
        writeln!(out, "  t{}:", end).ok();
    }
    Ok(out)
}
