use arch::isa::IsaError;
use color_print::cprintln;
use thiserror::Error;

/// Assembly failure. The `usize` carried by most variants is the 0-based
/// line index within the listing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Unknown mnemonic: `{1}`")]
    UnknownMnemonic(usize, String),

    #[error("Undefined label: `{1}`")]
    UndefinedLabel(usize, String),

    #[error("Re-defined label: `{1}`")]
    DuplicateLabel(usize, String),

    #[error("Undefined symbol: `{1}`")]
    UndefinedSymbol(usize, String),

    #[error("Undefined constant: `{1}`")]
    UndefinedConstant(usize, String),

    #[error("Malformed operand: {1}")]
    MalformedOperand(usize, String),

    #[error("Missing section: `.{0}`")]
    MissingSection(String),

    #[error("Cannot parse `{1}` as constant")]
    InvalidConstant(usize, String),

    #[error("Unknown flag: `{1}`")]
    InvalidFlag(usize, String),

    #[error("Operand out of range: {1}")]
    OperandOutOfRange(usize, i64),

    #[error("Malformed code: {0}")]
    MalformedCode(String),

    #[error("Unknown opcode 0x{1:02X} at offset {0}")]
    UnknownOpcode(u32, u8),

    #[error(transparent)]
    Isa(#[from] IsaError),
}

impl Error {
    /// Listing line the error points at, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::UnknownMnemonic(line, _)
            | Error::UndefinedLabel(line, _)
            | Error::DuplicateLabel(line, _)
            | Error::UndefinedSymbol(line, _)
            | Error::UndefinedConstant(line, _)
            | Error::MalformedOperand(line, _)
            | Error::InvalidConstant(line, _)
            | Error::InvalidFlag(line, _)
            | Error::OperandOutOfRange(line, _) => Some(*line),
            Error::MissingSection(_)
            | Error::MalformedCode(_)
            | Error::UnknownOpcode(..)
            | Error::Isa(_) => None,
        }
    }

    /// Print error with diagnostic information showing file location and line content.
    /// `offset` is the number of file lines preceding the listing.
    pub fn print_diag(&self, file: &str, lines: &[&str], offset: usize) {
        cprintln!("<red,bold>error</>: {}", self);

        let Some(line_idx) = self.line() else {
            cprintln!("     <blue>--></> <underline>{}</>", file);
            return;
        };

        // line_idx is 0-based, display as 1-based
        let line_idx = offset + line_idx;
        let line_num = line_idx + 1;
        cprintln!("     <blue>--></> <underline>{}:{}</>", file, line_num);
        cprintln!("      <blue>|</>");

        let line_content = lines.get(line_idx).copied().unwrap_or("");

        cprintln!(" <blue>{:>4} |</> {}", line_num, line_content);
        cprintln!("      <blue>|</>");
    }
}
