use arch::isa::{InstructionSet, OperandClass};
use color_print::cformat;
use indexmap::IndexMap;

use crate::disasm::decode;
use crate::error::Error;
use crate::unit::CodeUnit;

const RULE: &str = "-------------+-----------------------------------------------------";

/// Colored listing: offset, bytes, source line, instruction.
pub fn dump(unit: &CodeUnit, isa: &InstructionSet) -> Result<Vec<String>, Error> {
    let mut labels: IndexMap<u32, Vec<&str>> = IndexMap::new();
    for (name, offset) in &unit.symbols {
        labels.entry(*offset).or_default().push(name);
    }

    let mut out = vec![RULE.to_string()];
    for inst in decode(unit, isa)? {
        for name in labels.get(&inst.offset).into_iter().flatten() {
            out.push(format!("{:13}| {}", "", cformat!("<g>{}:</>", name)));
        }

        let low = inst.arg.map(|a| a & 0xFF).unwrap_or(0);
        let operand = match (inst.class, inst.argval) {
            (_, None) => String::new(),
            (class, Some(target)) if class.is_jump() => cformat!("<g>{}</> <dim>({})</>", target, inst.argrepr),
            (OperandClass::Literal, Some(value)) => cformat!("<c>{}</>", value),
            (_, Some(value)) if inst.argrepr.is_empty() => cformat!("<c>{}</>", value),
            (_, Some(value)) => cformat!("<c>{}</> <dim>({})</>", value, inst.argrepr),
        };
        out.push(format!(
            "[{:04X}] {:02X} {:02X} | {:>4}: {} {}",
            inst.offset,
            inst.opcode,
            low,
            unit.line_for(inst.offset),
            cformat!("<y>{:<20}</>", inst.mnemonic),
            operand
        ));
    }
    for name in labels.get(&(unit.code.len() as u32)).into_iter().flatten() {
        out.push(format!("{:13}| {}", "", cformat!("<g>{}:</>", name)));
    }
    out.push(RULE.to_string());
    Ok(out)
}

pub fn print_dump(unit: &CodeUnit, isa: &InstructionSet) -> Result<(), Error> {
    for line in dump(unit, isa)? {
        println!("{}", line);
    }
    Ok(())
}
