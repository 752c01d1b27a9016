pub mod flags;
pub mod isa;
pub mod op;
