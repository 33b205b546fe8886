//! Error types for the assembler and the simulator.
//!
//! Assembly-time errors ([AssemblerError]) carry a byte-offset span into the
//! source text; [AssemblerError::verbose] renders the offending line with a
//! marker. Run-time errors ([SimulatorError]) are returned by
//! [Simulator::step](crate::emulator::Simulator::step) and are always fatal to
//! the current run.

use std::error;
use std::fmt;
use std::ops::Range;

/// A half-open byte range into the original source text.
pub type Span = Range<usize>;

/// Converts a byte offset into a 1-based line and column pair.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;

    for (index, ch) in source.char_indices() {
        if index >= offset {
            break;
        }

        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    (line, column)
}

/// The reason an assembly failed.
///
/// Every variant corresponds to one diagnostic the assembler can emit, with
/// the values needed to render it kept as structured fields rather than
/// preformatted text.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblerErrorKind {
    // Lexical errors.
    /// A number with a `B` suffix contained digits other than 0 and 1.
    InvalidBinary,
    /// A number without a radix suffix contained non-decimal digits.
    InvalidDecimal,
    /// A string contained a character outside the 8-bit character set.
    OnlyAscii,
    /// A character with no meaning in the language.
    UnexpectedCharacter(char),
    /// A string was still open at the end of its line.
    UnterminatedString,

    // Syntax errors.
    /// Consecutive unary signs, as in `--1`.
    AmbiguousUnary,
    ExpectedAddressAfterOrg,
    /// A numeric expression was expected and nothing usable was found.
    ExpectedArgument,
    ExpectedEndOfStatement,
    /// Something other than an instruction at the start of a statement.
    ExpectedInstruction { got: String },
    ExpectedInstructionAfterLabel { got: String },
    ExpectedLabelAfterOffset,
    /// A literal token had to follow an expression, e.g. `]` after `[addr`.
    ExpectedLiteralAfterExpression { expected: &'static str },
    /// A literal token had to follow another, e.g. `PTR` after `BYTE`.
    ExpectedLiteralAfterLiteral {
        expected: &'static str,
        after: String,
    },
    IndirectAddressingMustBeBx,
    ConstantMustHaveALabel,
    ConstantMustHaveOneValue,
    UnclosedParenthesis,
    /// An identifier in statement position. Carries a "did you mean"
    /// suggestion when a known mnemonic or directive is close enough.
    UnexpectedIdentifier { suggestion: Option<String> },

    // Semantic errors.
    AddressHasCode { address: u16 },
    AddressOutOfRange { address: i64 },
    CannotAcceptStrings { directive: &'static str },
    CannotBeUnassigned { directive: &'static str },
    CircularReference,
    DestinationCannotBeImmediate,
    DoubleMemoryAccess,
    DuplicatedLabel { label: String },
    EmptyProgram,
    EndMustBeLastStatement,
    ExpectsAx,
    ExpectsDx,
    ExpectsImmediate,
    ExpectsLabel,
    ExpectsNoOperands,
    ExpectsOneOperand,
    ExpectsTwoOperands,
    ExpectsWordRegister,
    InstructionOutOfRange { address: i64 },
    InvalidInterrupt { value: i64 },
    IoAddressOutOfRange { address: i64 },
    LabelNotFound { label: String },
    LabelShouldBeANumber { label: String },
    LabelShouldBeAnInstruction { label: String },
    LabelShouldBeWritable { label: String },
    MissingOrg,
    MustHaveOneOrMoreValues { directive: &'static str },
    OccupiedAddress { address: u16 },
    OffsetOnlyWithDataDirective,
    SizeMismatch { src: u8, out: u8 },
    UnknownSize,
    ValueOutOfRange { value: i64, size: u8 },
}

impl fmt::Display for AssemblerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use AssemblerErrorKind::*;

        match self {
            InvalidBinary => write!(f, "invalid binary number, it should only contain 0s and 1s"),
            InvalidDecimal => write!(f, "invalid decimal number, it should only contain digits"),
            OnlyAscii => write!(f, "only 8-bit characters are supported in strings"),
            UnexpectedCharacter(ch) => write!(f, "unexpected character {:?}", ch),
            UnterminatedString => write!(f, "unterminated string"),

            AmbiguousUnary => write!(
                f,
                "ambiguous unary expression, use parentheses to disambiguate"
            ),
            ExpectedAddressAfterOrg => write!(f, "expected an address after ORG"),
            ExpectedArgument => write!(f, "expected an argument"),
            ExpectedEndOfStatement => write!(f, "expected end of statement"),
            ExpectedInstruction { got } => write!(f, "expected an instruction, got {}", got),
            ExpectedInstructionAfterLabel { got } => {
                write!(f, "expected an instruction after the label, got {}", got)
            }
            ExpectedLabelAfterOffset => write!(f, "expected a label after OFFSET"),
            ExpectedLiteralAfterExpression { expected } => {
                write!(f, "expected \"{}\" after the expression", expected)
            }
            ExpectedLiteralAfterLiteral { expected, after } => {
                write!(f, "expected \"{}\" after \"{}\"", expected, after)
            }
            IndirectAddressingMustBeBx => write!(
                f,
                "the only register supported for indirect addressing is BX"
            ),
            ConstantMustHaveALabel => write!(f, "EQU must have a label"),
            ConstantMustHaveOneValue => write!(f, "EQU must have exactly one value"),
            UnclosedParenthesis => write!(f, "unclosed parenthesis"),
            UnexpectedIdentifier { suggestion } => {
                write!(f, "unexpected identifier")?;
                match suggestion {
                    Some(name) => write!(f, ", did you mean {}?", name),
                    None => write!(f, ", you may have forgotten a colon to make it a label"),
                }
            }

            AddressHasCode { address } => write!(
                f,
                "memory address {:04X}h has instructions, it cannot be used as a data address",
                address
            ),
            AddressOutOfRange { address } => write!(
                f,
                "memory address {} is out of range (the maximum address is 3FFFh)",
                address
            ),
            CannotAcceptStrings { directive } => write!(f, "{} cannot accept strings", directive),
            CannotBeUnassigned { directive } => write!(f, "{} cannot be unassigned", directive),
            CircularReference => write!(f, "circular reference detected"),
            DestinationCannotBeImmediate => {
                write!(f, "the destination cannot be an immediate value")
            }
            DoubleMemoryAccess => write!(
                f,
                "cannot access a memory location twice in the same instruction"
            ),
            DuplicatedLabel { label } => write!(f, "duplicated label \"{}\"", label),
            EmptyProgram => write!(
                f,
                "empty program, the program must have at least an END statement"
            ),
            EndMustBeLastStatement => write!(f, "END must be the last statement"),
            ExpectsAx => write!(f, "this operand should be AX or AL"),
            ExpectsDx => write!(f, "the only valid register here is DX"),
            ExpectsImmediate => write!(f, "this operand should be immediate"),
            ExpectsLabel => write!(f, "this operand should be a label"),
            ExpectsNoOperands => write!(f, "this instruction expects no operands"),
            ExpectsOneOperand => write!(f, "this instruction expects one operand"),
            ExpectsTwoOperands => write!(f, "this instruction expects two operands"),
            ExpectsWordRegister => {
                write!(f, "this instruction expects a 16-bit register as its operand")
            }
            InstructionOutOfRange { address } => write!(
                f,
                "this would be placed at address {}, which is outside the memory (the maximum address is 3FFFh)",
                address
            ),
            InvalidInterrupt { value } => write!(f, "invalid interrupt number {}", value),
            IoAddressOutOfRange { address } => write!(
                f,
                "I/O address {} is out of range (the maximum I/O address is FFh)",
                address
            ),
            LabelNotFound { label } => write!(f, "label \"{}\" has not been defined", label),
            LabelShouldBeANumber { label } => write!(
                f,
                "label {} should point to an EQU declaration or an instruction, maybe you meant OFFSET {}",
                label, label
            ),
            LabelShouldBeAnInstruction { label } => {
                write!(f, "label {} should point to an instruction", label)
            }
            LabelShouldBeWritable { label } => write!(
                f,
                "label {} does not point to a writable memory address, it should point to a DB or DW declaration",
                label
            ),
            MissingOrg => write!(
                f,
                "no ORG before this statement, cannot determine its location in memory"
            ),
            MustHaveOneOrMoreValues { directive } => {
                write!(f, "{} must have at least one value", directive)
            }
            OccupiedAddress { address } => write!(
                f,
                "this would be placed at address {:04X}h, which is already occupied",
                address
            ),
            OffsetOnlyWithDataDirective => {
                write!(f, "OFFSET can only be used with data directives")
            }
            SizeMismatch { src, out } => write!(
                f,
                "the source ({}-bit) and the destination ({}-bit) must be the same size",
                src, out
            ),
            UnknownSize => write!(
                f,
                "addressing memory with an immediate operand requires a BYTE PTR or WORD PTR qualifier"
            ),
            ValueOutOfRange { value, size } => write!(
                f,
                "the number {} cannot be represented with {} bits",
                value, size
            ),
        }
    }
}

/// An assembly-time diagnostic: a reason plus, when known, the source span it
/// refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblerError {
    pub kind: AssemblerErrorKind,
    pub span: Option<Span>,
}

impl AssemblerError {
    pub fn new(kind: AssemblerErrorKind) -> AssemblerError {
        AssemblerError { kind, span: None }
    }

    /// Attaches the source span the diagnostic refers to.
    pub fn at(mut self, span: Span) -> AssemblerError {
        self.span = Some(span);
        self
    }

    /// Renders the error together with the offending source line and a marker
    /// under the exact span.
    ///
    /// # Parameters
    /// - `source`: the original source text or an exact copy of it.
    pub fn verbose(&self, source: &str) -> String {
        let span = match &self.span {
            Some(span) => span,
            None => return self.to_string(),
        };

        let (line, column) = line_col(source, span.start);
        let text = source.lines().nth(line - 1).unwrap_or("");

        let line_len = text.chars().count();
        let width = span.end.saturating_sub(span.start).max(1);
        let width = width.min(line_len.saturating_sub(column - 1).max(1));

        format!(
            "{} at line {} col {}\n  {}\n  {}{}",
            self.kind,
            line,
            column,
            text,
            " ".repeat(column - 1),
            "^".repeat(width),
        )
    }
}

impl fmt::Display for AssemblerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.span {
            Some(span) => write!(f, "{} at offset {}", self.kind, span.start),
            None => self.kind.fmt(f),
        }
    }
}

impl error::Error for AssemblerError {}

/// A fatal condition raised while executing a loaded program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatorError {
    /// A data access landed outside the 16 KiB memory.
    AddressOutOfRange { address: u32 },
    /// A data access landed on an address occupied by instructions.
    AddressHasInstruction { address: u16 },
    /// A push would move SP below the bottom of memory.
    StackOverflow,
    /// A pop would move SP past the top of memory.
    StackUnderflow,
    /// An I/O access hit a port with no device behind it.
    IoMemoryNotImplemented { port: u16 },
    /// A hardware interrupt resolved to one of the reserved vectors.
    ReservedInterrupt { vector: u8 },
    /// `step` was called before any program was loaded.
    NoProgramLoaded,
    /// IP does not point at the start of any encoded instruction.
    NoInstruction { address: u16 },
}

impl fmt::Display for SimulatorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use SimulatorError::*;

        match self {
            AddressOutOfRange { address } => write!(
                f,
                "memory address {:04X}h is out of range (the maximum address is 3FFFh)",
                address
            ),
            AddressHasInstruction { address } => write!(
                f,
                "memory address {:04X}h holds instructions and cannot be accessed as data",
                address
            ),
            StackOverflow => write!(f, "stack overflow"),
            StackUnderflow => write!(f, "stack underflow"),
            IoMemoryNotImplemented { port } => {
                write!(f, "no device is connected to I/O address {:02X}h", port)
            }
            ReservedInterrupt { vector } => {
                write!(f, "interrupt vector {} is reserved for the system", vector)
            }
            NoProgramLoaded => write!(f, "no program has been loaded"),
            NoInstruction { address } => write!(
                f,
                "no instruction at address {:04X}h, execution has left the program",
                address
            ),
        }
    }
}

impl error::Error for SimulatorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_counts_from_one() {
        let source = "first\nsecond\nthird";

        assert_eq!(line_col(source, 0), (1, 1));
        assert_eq!(line_col(source, 4), (1, 5));
        assert_eq!(line_col(source, 6), (2, 1));
        assert_eq!(line_col(source, 14), (3, 2));
    }

    #[test]
    fn verbose_marks_the_offending_span() {
        let source = "ORG 2000h\nMOV AX, CX extra\nEND";
        let error = AssemblerError::new(AssemblerErrorKind::ExpectedEndOfStatement).at(21..26);

        let rendered = error.verbose(source);

        assert!(rendered.contains("line 2 col 12"));
        assert!(rendered.contains("MOV AX, CX extra"));
        assert!(rendered.contains("^^^^^"));
    }

    #[test]
    fn display_without_span_is_just_the_message() {
        let error = AssemblerError::new(AssemblerErrorKind::EmptyProgram);

        assert_eq!(
            error.to_string(),
            "empty program, the program must have at least an END statement"
        );
    }
}
