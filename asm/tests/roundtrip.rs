use arch::isa::InstructionSet;
use stackasm::disasm::disassemble;
use stackasm::tables::ReservedSlot;
use stackasm::{Assembler, CodeUnit};

const FIB: &str = "Iterative fibonacci
:::asm
.stacksize 3
.locals a, b, idx
.flags optimized, newlocals, nofree
.names range
.consts
  zero = 0
  one = 1
  label = 'fib\\x3b iterative'
.code
  LOAD_CONST               zero
  STORE_FAST               a
  LOAD_CONST               one
  STORE_FAST               b
  SETUP_LOOP               done
  LOAD_GLOBAL              range
  LOAD_FAST                n
  CALL_FUNCTION            1
  GET_ITER
next:
  FOR_ITER                 exhausted
  STORE_FAST               idx
  LOAD_FAST                b
  LOAD_FAST                a
  LOAD_FAST                b
  BINARY_ADD
  ROT_TWO
  STORE_FAST               a
  STORE_FAST               b
  JUMP_ABSOLUTE            next
exhausted:
  POP_BLOCK
done:
  LOAD_FAST                a
  RETURN_VALUE
";

fn reassemble(unit: &CodeUnit, reserved: ReservedSlot) -> CodeUnit {
    let listing = disassemble(unit, InstructionSet::cpython37()).unwrap();
    Assembler::default()
        .params(&unit.varnames[..unit.argcount])
        .reserved(reserved)
        .assemble(&listing)
        .unwrap()
}

#[test]
fn test_disassemble_reassemble() {
    let unit = Assembler::default().params(&["n"]).assemble(FIB).unwrap();
    let again = reassemble(&unit, ReservedSlot::None);
    assert_eq!(again.code, unit.code);
    assert_eq!(again.consts, unit.consts);
    assert_eq!(again.varnames, unit.varnames);
    assert_eq!(again.names, unit.names);
    assert_eq!(again.flags, unit.flags);
    assert_eq!(again.stacksize, unit.stacksize);
    assert_eq!(again.doc, unit.doc);
}

#[test]
fn test_doc_slot_survives() {
    let unit = Assembler::default()
        .params(&["n"])
        .reserved(ReservedSlot::Doc)
        .assemble(FIB)
        .unwrap();
    let again = reassemble(&unit, ReservedSlot::Doc);
    assert_eq!(again.code, unit.code);
    assert_eq!(again.consts, unit.consts);
}

#[test]
fn test_listing_shape() {
    let unit = Assembler::default().params(&["n"]).assemble(FIB).unwrap();
    let listing = disassemble(&unit, InstructionSet::cpython37()).unwrap();
    let lines: Vec<&str> = listing.lines().map(|l| l.trim()).collect();
    assert_eq!(&lines[..3], &["Iterative fibonacci", ":::asm", ".stacksize 3"]);
    assert!(lines.contains(&".flags optimized, newlocals, nofree"));
    assert!(lines.contains(&".locals a, b, idx"));
    assert!(lines.contains(&"'fib\\x3b iterative'"));
    assert!(lines.contains(&"t18:"));
    assert!(lines.iter().any(|l| l.starts_with("FOR_ITER") && l.ends_with("t38")));
    assert!(lines.iter().any(|l| l.starts_with("LOAD_GLOBAL") && l.ends_with("; (range)")));
}

#[test]
fn test_widened_reassemble() {
    let mut listing = String::from(".stacksize 1\n.code\nSETUP_LOOP end\nLOAD_CONST 300\n");
    listing.push_str(&"NOP\n".repeat(300));
    listing.push_str("JUMP_ABSOLUTE end\nend: RETURN_VALUE\n");
    let unit = Assembler::default().assemble(&listing).unwrap();
    let again = reassemble(&unit, ReservedSlot::None);
    assert_eq!(again.code, unit.code);
    assert_eq!(again.label("end"), None);
    assert_eq!(again.label(&format!("t{}", unit.label("end").unwrap())), unit.label("end"));
}

#[test]
fn test_literal_jump_kept() {
    let unit = Assembler::default()
        .assemble(".stacksize 1\n.code\nJUMP_ABSOLUTE 3\nNOP\nRETURN_VALUE")
        .unwrap();
    assert_eq!(unit.code, vec![113, 3, 9, 0, 83, 0]);
    assert_eq!(reassemble(&unit, ReservedSlot::None).code, unit.code);
}

#[test]
fn test_jump_into_prefix_chain_kept() {
    let unit = Assembler::default()
        .assemble(".stacksize 1\n.code\nJUMP_ABSOLUTE 6\nNOP\nEXTENDED_ARG 1\nLOAD_CONST 44\nRETURN_VALUE")
        .unwrap();
    assert_eq!(unit.code, vec![113, 6, 9, 0, 144, 1, 100, 44, 83, 0]);
    let listing = disassemble(&unit, InstructionSet::cpython37()).unwrap();
    assert!(!listing.contains("t6:"));
    assert_eq!(reassemble(&unit, ReservedSlot::None).code, unit.code);
}

#[test]
fn test_jump_to_prefix_chain_labelled() {
    let unit = Assembler::default()
        .assemble(".stacksize 1\n.code\nJUMP_ABSOLUTE 4\nNOP\nEXTENDED_ARG 1\nLOAD_CONST 44\nRETURN_VALUE")
        .unwrap();
    let listing = disassemble(&unit, InstructionSet::cpython37()).unwrap();
    assert!(listing.contains("t4:"));
    assert_eq!(reassemble(&unit, ReservedSlot::None).code, unit.code);
}

#[test]
fn test_yaml_unit() {
    let unit = Assembler::default().params(&["n"]).assemble(FIB).unwrap();
    let yaml = serde_yaml::to_string(&unit).unwrap();
    let back: CodeUnit = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(back, unit);
    assert_eq!(back.line_for(0), unit.line_for(0));
}
