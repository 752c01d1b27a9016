pub mod assembler;
pub mod disasm;
pub mod dump;
pub mod encoder;
pub mod error;
pub mod label;
pub mod lnotab;
pub mod parser;
pub mod source;
pub mod tables;
pub mod unit;
pub mod value;
pub mod widen;

pub use assembler::Assembler;
pub use error::Error;
pub use unit::CodeUnit;
