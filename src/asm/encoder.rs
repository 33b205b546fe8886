//! The back half of the assembler: operand validation, address layout and
//! final encoding.
//!
//! Statements pass through three phases. Validation classifies every operand
//! combination and rejects the impossible ones while expressions are still
//! unevaluated, which fixes the byte length of each statement. Layout then
//! walks the statements in source order, assigning addresses from the current
//! `ORG` pointer and claiming bytes in the store. Only after every label has
//! an address can the last phase evaluate expressions and emit machine code.
//!
//! Each phase reports all its errors before the caller moves on, so a program
//! with three bad operands gets three diagnostics in one run.

use crate::asm::ast::{
    DataDirective, DataValue, Expression, ExpressionKind, Operand, OperandKind, Statement,
};
use crate::asm::store::{GlobalStore, LabelKind};
use crate::error::{AssemblerError, AssemblerErrorKind, Span};
use crate::instruction::{
    BinaryOp, IoOp, JumpOp, Mnemonic, OperandSize, Register, StackOp, UnaryOp, ZeroaryOp,
};
use crate::program::{
    BinaryOperands, InstructionKind, Port, Program, ProgramData, ProgramInstruction, Symbol,
    UnaryOperand,
};
use crate::MEMORY_SIZE;

/// A statement that passed validation but still carries unevaluated
/// expressions.
#[derive(Debug, PartialEq)]
pub enum Pending {
    Origin { address: u32 },
    Data(PendingData),
    Instruction(PendingInstruction),
}

#[derive(Debug, PartialEq)]
pub struct PendingData {
    label: Option<String>,
    size: OperandSize,
    values: Vec<PendingValue>,
    address: u16,
    span: Span,
}

#[derive(Debug, PartialEq)]
enum PendingValue {
    /// One character of a string literal, already a byte.
    Byte(u8),
    Unassigned,
    Expr(Expression),
}

impl PendingData {
    fn byte_length(&self) -> u32 {
        self.values.len() as u32 * u32::from(self.size.bytes())
    }
}

#[derive(Debug, PartialEq)]
pub struct PendingInstruction {
    label: Option<String>,
    kind: PendingKind,
    address: u16,
    span: Span,
}

#[derive(Debug, PartialEq)]
enum PendingKind {
    Binary {
        op: BinaryOp,
        size: OperandSize,
        operands: PendingBinary,
    },
    Unary {
        op: UnaryOp,
        size: OperandSize,
        operand: PendingUnary,
    },
    Stack {
        op: StackOp,
        register: Register,
    },
    Jump {
        op: JumpOp,
        target: String,
        target_span: Span,
    },
    Io {
        op: IoOp,
        size: OperandSize,
        port: PendingPort,
    },
    Int {
        vector: Expression,
    },
    Zeroary {
        op: ZeroaryOp,
    },
}

#[derive(Debug, PartialEq)]
enum PendingBinary {
    RegReg { dest: Register, src: Register },
    RegDir { dest: Register, addr: Expression },
    RegInd { dest: Register },
    RegImm { dest: Register, value: Expression },
    DirReg { addr: Expression, src: Register },
    IndReg { src: Register },
    DirImm { addr: Expression, value: Expression },
    IndImm { value: Expression },
}

#[derive(Debug, PartialEq)]
enum PendingUnary {
    Register(Register),
    Direct(Expression),
    Indirect,
}

#[derive(Debug, PartialEq)]
enum PendingPort {
    Fixed(Expression),
    Variable,
}

impl PendingKind {
    /// Byte length of the statement, known before any expression is
    /// evaluated. Must agree with the length the encoded instruction
    /// reports.
    fn length(&self) -> u32 {
        let length = match self {
            PendingKind::Binary { size, operands, .. } => match operands {
                PendingBinary::RegReg { .. } => 3,
                PendingBinary::RegDir { .. } | PendingBinary::DirReg { .. } => 4,
                PendingBinary::RegInd { .. } | PendingBinary::IndReg { .. } => 2,
                PendingBinary::RegImm { .. } => 2 + size.bytes(),
                PendingBinary::DirImm { .. } => 3 + size.bytes(),
                PendingBinary::IndImm { .. } => 1 + size.bytes(),
            },
            PendingKind::Unary { operand, .. } => match operand {
                PendingUnary::Register(_) => 2,
                PendingUnary::Direct(_) => 3,
                PendingUnary::Indirect => 1,
            },
            PendingKind::Stack { .. } => 2,
            PendingKind::Jump { .. } => 3,
            PendingKind::Io { port, .. } => match port {
                PendingPort::Fixed(_) => 2,
                PendingPort::Variable => 1,
            },
            PendingKind::Int { .. } => 2,
            PendingKind::Zeroary { .. } => 1,
        };

        u32::from(length)
    }
}

/// Checks every operand against its mnemonic and the label kinds collected
/// by the store. Returns the statements in a form whose byte lengths are
/// known, or every validation error found.
pub fn validate(
    statements: &[Statement],
    store: &GlobalStore,
) -> Result<Vec<Pending>, Vec<AssemblerError>> {
    let mut pending = Vec::with_capacity(statements.len());
    let mut errors = Vec::new();

    for statement in statements {
        match validate_statement(statement, store) {
            Ok(Some(entry)) => pending.push(entry),
            Ok(None) => {}
            Err(error) => errors.push(error),
        }
    }

    if errors.is_empty() {
        Ok(pending)
    } else {
        Err(errors)
    }
}

fn validate_statement(
    statement: &Statement,
    store: &GlobalStore,
) -> Result<Option<Pending>, AssemblerError> {
    match statement {
        Statement::Origin { address, .. } => Ok(Some(Pending::Origin { address: *address })),
        Statement::End { .. } => Ok(None),
        // Constants live in the store and occupy no memory.
        Statement::Data {
            directive: DataDirective::Equ,
            ..
        } => Ok(None),
        Statement::Data {
            label,
            directive,
            values,
            span,
            ..
        } => {
            let size = match directive {
                DataDirective::Db => OperandSize::Byte,
                DataDirective::Dw => OperandSize::Word,
                DataDirective::Equ => return Ok(None),
            };

            validate_data(label, size, directive.name(), values, span)
                .map(|data| Some(Pending::Data(data)))
        }
        Statement::Instruction {
            label,
            mnemonic,
            operands,
            span,
            ..
        } => {
            let kind = validate_operands(*mnemonic, operands, span, store)?;

            Ok(Some(Pending::Instruction(PendingInstruction {
                label: label.clone(),
                kind,
                address: 0,
                span: span.clone(),
            })))
        }
    }
}

fn validate_data(
    label: &Option<String>,
    size: OperandSize,
    directive: &'static str,
    values: &[DataValue],
    span: &Span,
) -> Result<PendingData, AssemblerError> {
    if values.is_empty() {
        return Err(
            AssemblerError::new(AssemblerErrorKind::MustHaveOneOrMoreValues { directive })
                .at(span.clone()),
        );
    }

    let mut pending = Vec::with_capacity(values.len());

    for value in values {
        match value {
            DataValue::String { value, span } => {
                if size == OperandSize::Word {
                    return Err(
                        AssemblerError::new(AssemblerErrorKind::CannotAcceptStrings { directive })
                            .at(span.clone()),
                    );
                }

                pending.extend(value.chars().map(|character| PendingValue::Byte(character as u8)));
            }
            DataValue::Unassigned { .. } => pending.push(PendingValue::Unassigned),
            DataValue::Expr(expr) => pending.push(PendingValue::Expr(expr.clone())),
        }
    }

    Ok(PendingData {
        label: label.clone(),
        size,
        values: pending,
        address: 0,
        span: span.clone(),
    })
}

fn validate_operands(
    mnemonic: Mnemonic,
    operands: &[Operand],
    span: &Span,
    store: &GlobalStore,
) -> Result<PendingKind, AssemblerError> {
    if let Some(op) = BinaryOp::from_mnemonic(mnemonic) {
        validate_binary(op, operands, span, store)
    } else if let Some(op) = UnaryOp::from_mnemonic(mnemonic) {
        validate_unary(op, operands, span, store)
    } else if let Some(op) = StackOp::from_mnemonic(mnemonic) {
        validate_stack(op, operands, span)
    } else if let Some(op) = JumpOp::from_mnemonic(mnemonic) {
        validate_jump(op, operands, span, store)
    } else if let Some(op) = IoOp::from_mnemonic(mnemonic) {
        validate_io(op, operands, span)
    } else if let Some(op) = ZeroaryOp::from_mnemonic(mnemonic) {
        validate_zeroary(op, operands, span)
    } else {
        // INT is the only mnemonic left once every group has passed.
        validate_int(operands, span)
    }
}

fn validate_binary(
    op: BinaryOp,
    operands: &[Operand],
    span: &Span,
    store: &GlobalStore,
) -> Result<PendingKind, AssemblerError> {
    let (dest, src) = match operands {
        [dest, src] => (dest, src),
        _ => {
            return Err(
                AssemblerError::new(AssemblerErrorKind::ExpectsTwoOperands).at(span.clone()),
            )
        }
    };

    match &dest.kind {
        OperandKind::Register(register) => binary_to_register(op, *register, src, span, store),
        OperandKind::Indirect { size } => binary_to_memory(op, None, *size, dest, src, span, store),
        OperandKind::Direct { size, expr } => {
            binary_to_memory(op, Some(expr.clone()), *size, dest, src, span, store)
        }
        OperandKind::Expr(expr) => {
            let name = match expr.as_bare_label() {
                Some(name) => name,
                None => {
                    return Err(
                        AssemblerError::new(AssemblerErrorKind::DestinationCannotBeImmediate)
                            .at(dest.span.clone()),
                    )
                }
            };

            match store.label_kind(name) {
                Some(LabelKind::Data(size)) => binary_to_memory(
                    op,
                    Some(label_address_expr(name, &expr.span)),
                    Some(size),
                    dest,
                    src,
                    span,
                    store,
                ),
                Some(_) => Err(AssemblerError::new(
                    AssemblerErrorKind::LabelShouldBeWritable {
                        label: name.to_string(),
                    },
                )
                .at(dest.span.clone())),
                None => Err(AssemblerError::new(AssemblerErrorKind::LabelNotFound {
                    label: name.to_string(),
                })
                .at(dest.span.clone())),
            }
        }
    }
}

/// Binary instruction whose destination is a register.
fn binary_to_register(
    op: BinaryOp,
    dest: Register,
    src: &Operand,
    span: &Span,
    store: &GlobalStore,
) -> Result<PendingKind, AssemblerError> {
    let size = dest.size();

    let operands = match &src.kind {
        OperandKind::Register(src_reg) => {
            if src_reg.size() != size {
                return Err(size_mismatch(src_reg.size(), size, span));
            }

            PendingBinary::RegReg {
                dest,
                src: *src_reg,
            }
        }
        OperandKind::Indirect { size: explicit } => {
            check_pointer_size(*explicit, size, span)?;
            PendingBinary::RegInd { dest }
        }
        OperandKind::Direct {
            size: explicit,
            expr,
        } => {
            check_pointer_size(*explicit, size, span)?;
            PendingBinary::RegDir {
                dest,
                addr: expr.clone(),
            }
        }
        OperandKind::Expr(expr) => match data_label(expr, store) {
            // A bare data label reads that label's memory cell.
            Some((name, data_size)) => {
                if data_size != size {
                    return Err(size_mismatch(data_size, size, span));
                }

                PendingBinary::RegDir {
                    dest,
                    addr: label_address_expr(name, &expr.span),
                }
            }
            None => PendingBinary::RegImm {
                dest,
                value: expr.clone(),
            },
        },
    };

    Ok(PendingKind::Binary { op, size, operands })
}

/// Binary instruction whose destination is memory, either `[BX]` (when
/// `addr` is None) or a direct address.
fn binary_to_memory(
    op: BinaryOp,
    addr: Option<Expression>,
    dest_size: Option<OperandSize>,
    dest: &Operand,
    src: &Operand,
    span: &Span,
    store: &GlobalStore,
) -> Result<PendingKind, AssemblerError> {
    match &src.kind {
        OperandKind::Register(src_reg) => {
            if let Some(size) = dest_size {
                if size != src_reg.size() {
                    return Err(size_mismatch(src_reg.size(), size, span));
                }
            }

            let src = *src_reg;
            let operands = match addr {
                Some(addr) => PendingBinary::DirReg { addr, src },
                None => PendingBinary::IndReg { src },
            };

            Ok(PendingKind::Binary {
                op,
                size: src.size(),
                operands,
            })
        }
        OperandKind::Expr(expr) => {
            if data_label(expr, store).is_some() {
                return Err(
                    AssemblerError::new(AssemblerErrorKind::DoubleMemoryAccess).at(span.clone()),
                );
            }

            // With no register anywhere, nothing fixes the operand size
            // unless the destination spelled it out.
            let size = match dest_size {
                Some(size) => size,
                None => {
                    return Err(
                        AssemblerError::new(AssemblerErrorKind::UnknownSize).at(dest.span.clone()),
                    )
                }
            };

            let value = expr.clone();
            let operands = match addr {
                Some(addr) => PendingBinary::DirImm { addr, value },
                None => PendingBinary::IndImm { value },
            };

            Ok(PendingKind::Binary { op, size, operands })
        }
        OperandKind::Indirect { .. } | OperandKind::Direct { .. } => {
            Err(AssemblerError::new(AssemblerErrorKind::DoubleMemoryAccess).at(span.clone()))
        }
    }
}

fn validate_unary(
    op: UnaryOp,
    operands: &[Operand],
    span: &Span,
    store: &GlobalStore,
) -> Result<PendingKind, AssemblerError> {
    let operand = match operands {
        [operand] => operand,
        _ => {
            return Err(AssemblerError::new(AssemblerErrorKind::ExpectsOneOperand).at(span.clone()))
        }
    };

    let (pending, size) = match &operand.kind {
        OperandKind::Register(register) => (PendingUnary::Register(*register), register.size()),
        OperandKind::Indirect { size } => match size {
            Some(size) => (PendingUnary::Indirect, *size),
            None => {
                return Err(
                    AssemblerError::new(AssemblerErrorKind::UnknownSize).at(operand.span.clone()),
                )
            }
        },
        OperandKind::Direct { size, expr } => match size {
            Some(size) => (PendingUnary::Direct(expr.clone()), *size),
            None => {
                return Err(
                    AssemblerError::new(AssemblerErrorKind::UnknownSize).at(operand.span.clone()),
                )
            }
        },
        OperandKind::Expr(expr) => {
            let name = match expr.as_bare_label() {
                Some(name) => name,
                None => {
                    return Err(
                        AssemblerError::new(AssemblerErrorKind::DestinationCannotBeImmediate)
                            .at(operand.span.clone()),
                    )
                }
            };

            match store.label_kind(name) {
                Some(LabelKind::Data(size)) => (
                    PendingUnary::Direct(label_address_expr(name, &expr.span)),
                    size,
                ),
                Some(_) => {
                    return Err(AssemblerError::new(
                        AssemblerErrorKind::LabelShouldBeWritable {
                            label: name.to_string(),
                        },
                    )
                    .at(operand.span.clone()))
                }
                None => {
                    return Err(AssemblerError::new(AssemblerErrorKind::LabelNotFound {
                        label: name.to_string(),
                    })
                    .at(operand.span.clone()))
                }
            }
        }
    };

    Ok(PendingKind::Unary {
        op,
        size,
        operand: pending,
    })
}

fn validate_stack(
    op: StackOp,
    operands: &[Operand],
    span: &Span,
) -> Result<PendingKind, AssemblerError> {
    let operand = match operands {
        [operand] => operand,
        _ => {
            return Err(AssemblerError::new(AssemblerErrorKind::ExpectsOneOperand).at(span.clone()))
        }
    };

    match &operand.kind {
        OperandKind::Register(register) if register.is_word() => {
            Ok(PendingKind::Stack {
                op,
                register: *register,
            })
        }
        _ => Err(
            AssemblerError::new(AssemblerErrorKind::ExpectsWordRegister).at(operand.span.clone()),
        ),
    }
}

fn validate_jump(
    op: JumpOp,
    operands: &[Operand],
    span: &Span,
    store: &GlobalStore,
) -> Result<PendingKind, AssemblerError> {
    let operand = match operands {
        [operand] => operand,
        _ => {
            return Err(AssemblerError::new(AssemblerErrorKind::ExpectsOneOperand).at(span.clone()))
        }
    };

    let name = match &operand.kind {
        OperandKind::Expr(expr) => match expr.as_bare_label() {
            Some(name) => name,
            None => {
                return Err(
                    AssemblerError::new(AssemblerErrorKind::ExpectsLabel).at(operand.span.clone()),
                )
            }
        },
        _ => {
            return Err(
                AssemblerError::new(AssemblerErrorKind::ExpectsLabel).at(operand.span.clone()),
            )
        }
    };

    match store.label_kind(name) {
        Some(LabelKind::Instruction) => Ok(PendingKind::Jump {
            op,
            target: name.to_string(),
            target_span: operand.span.clone(),
        }),
        Some(_) => Err(AssemblerError::new(
            AssemblerErrorKind::LabelShouldBeAnInstruction {
                label: name.to_string(),
            },
        )
        .at(operand.span.clone())),
        None => Err(AssemblerError::new(AssemblerErrorKind::LabelNotFound {
            label: name.to_string(),
        })
        .at(operand.span.clone())),
    }
}

fn validate_io(
    op: IoOp,
    operands: &[Operand],
    span: &Span,
) -> Result<PendingKind, AssemblerError> {
    let (dest, src) = match operands {
        [dest, src] => (dest, src),
        _ => {
            return Err(
                AssemblerError::new(AssemblerErrorKind::ExpectsTwoOperands).at(span.clone()),
            )
        }
    };

    // IN reads the port into the accumulator, OUT writes it out.
    let (accumulator, port) = match op {
        IoOp::In => (dest, src),
        IoOp::Out => (src, dest),
    };

    let size = match &accumulator.kind {
        OperandKind::Register(Register::AL) => OperandSize::Byte,
        OperandKind::Register(Register::AX) => OperandSize::Word,
        _ => {
            return Err(
                AssemblerError::new(AssemblerErrorKind::ExpectsAx).at(accumulator.span.clone()),
            )
        }
    };

    let port = match &port.kind {
        OperandKind::Register(Register::DX) => PendingPort::Variable,
        OperandKind::Register(_) => {
            return Err(AssemblerError::new(AssemblerErrorKind::ExpectsDx).at(port.span.clone()))
        }
        OperandKind::Expr(expr) => PendingPort::Fixed(expr.clone()),
        _ => {
            return Err(
                AssemblerError::new(AssemblerErrorKind::ExpectsImmediate).at(port.span.clone()),
            )
        }
    };

    Ok(PendingKind::Io { op, size, port })
}

fn validate_int(operands: &[Operand], span: &Span) -> Result<PendingKind, AssemblerError> {
    let operand = match operands {
        [operand] => operand,
        _ => {
            return Err(AssemblerError::new(AssemblerErrorKind::ExpectsOneOperand).at(span.clone()))
        }
    };

    match &operand.kind {
        OperandKind::Expr(expr) => Ok(PendingKind::Int {
            vector: expr.clone(),
        }),
        _ => Err(
            AssemblerError::new(AssemblerErrorKind::ExpectsImmediate).at(operand.span.clone()),
        ),
    }
}

fn validate_zeroary(
    op: ZeroaryOp,
    operands: &[Operand],
    span: &Span,
) -> Result<PendingKind, AssemblerError> {
    if operands.is_empty() {
        Ok(PendingKind::Zeroary { op })
    } else {
        Err(AssemblerError::new(AssemblerErrorKind::ExpectsNoOperands).at(span.clone()))
    }
}

fn size_mismatch(src: OperandSize, out: OperandSize, span: &Span) -> AssemblerError {
    AssemblerError::new(AssemblerErrorKind::SizeMismatch {
        src: src.bits(),
        out: out.bits(),
    })
    .at(span.clone())
}

fn check_pointer_size(
    explicit: Option<OperandSize>,
    register: OperandSize,
    span: &Span,
) -> Result<(), AssemblerError> {
    if let Some(explicit) = explicit {
        if explicit != register {
            return Err(size_mismatch(explicit, register, span));
        }
    }

    Ok(())
}

/// A bare reference to a `DB` or `DW` label, with the directive's cell size.
fn data_label<'a>(expr: &'a Expression, store: &GlobalStore) -> Option<(&'a str, OperandSize)> {
    let name = expr.as_bare_label()?;

    match store.label_kind(name) {
        Some(LabelKind::Data(size)) => Some((name, size)),
        _ => None,
    }
}

/// The address a data label names, as an expression evaluated after layout.
fn label_address_expr(name: &str, span: &Span) -> Expression {
    Expression {
        kind: ExpressionKind::Label {
            name: name.to_string(),
            offset: true,
        },
        span: span.clone(),
    }
}

/// Assigns every statement its start address, claiming the bytes it covers.
///
/// The pointer starts unset and follows `ORG` directives and statement
/// lengths from there. A statement that fails keeps the pointer where it
/// was, so one bad statement does not spuriously break the placement of an
/// unrelated `ORG` block further down.
pub fn compute_addresses(pending: &mut [Pending], store: &mut GlobalStore) -> Vec<AssemblerError> {
    let mut errors = Vec::new();
    let mut pointer: Option<u32> = None;

    for entry in pending.iter_mut() {
        match entry {
            Pending::Origin { address } => pointer = Some(*address),
            Pending::Data(data) => {
                match place(&mut pointer, data.byte_length(), false, &data.span, store) {
                    Ok(address) => {
                        data.address = address;
                        if let Some(name) = &data.label {
                            store.set_label_address(name, address);
                        }
                    }
                    Err(error) => errors.push(error),
                }
            }
            Pending::Instruction(instruction) => {
                match place(
                    &mut pointer,
                    instruction.kind.length(),
                    true,
                    &instruction.span,
                    store,
                ) {
                    Ok(address) => {
                        instruction.address = address;
                        if let Some(name) = &instruction.label {
                            store.set_label_address(name, address);
                        }
                    }
                    Err(error) => errors.push(error),
                }
            }
        }
    }

    errors
}

fn place(
    pointer: &mut Option<u32>,
    length: u32,
    is_code: bool,
    span: &Span,
    store: &mut GlobalStore,
) -> Result<u16, AssemblerError> {
    let start = match *pointer {
        Some(start) => start,
        None => return Err(AssemblerError::new(AssemblerErrorKind::MissingOrg).at(span.clone())),
    };

    for offset in 0..length {
        let address = start + offset;

        if address >= MEMORY_SIZE as u32 {
            return Err(AssemblerError::new(AssemblerErrorKind::InstructionOutOfRange {
                address: i64::from(start),
            })
            .at(span.clone()));
        }

        let address = address as u16;

        if !store.reserve(address) {
            return Err(
                AssemblerError::new(AssemblerErrorKind::OccupiedAddress { address })
                    .at(span.clone()),
            );
        }

        if is_code {
            store.reserve_code(address);
        }
    }

    *pointer = Some(start + length);
    Ok(start as u16)
}

/// Evaluates the remaining expressions and emits the final data cells and
/// machine instructions.
pub fn encode(
    pending: Vec<Pending>,
    store: &mut GlobalStore,
) -> Result<(Vec<ProgramData>, Vec<ProgramInstruction>), Vec<AssemblerError>> {
    let mut data = Vec::new();
    let mut instructions = Vec::new();
    let mut errors = Vec::new();

    for entry in pending {
        match entry {
            Pending::Origin { .. } => {}
            Pending::Data(entry) => match encode_data(entry, store) {
                Ok(item) => data.push(item),
                Err(error) => errors.push(error),
            },
            Pending::Instruction(entry) => match encode_instruction(entry, store) {
                Ok(item) => instructions.push(item),
                Err(error) => errors.push(error),
            },
        }
    }

    if errors.is_empty() {
        Ok((data, instructions))
    } else {
        Err(errors)
    }
}

fn encode_data(pending: PendingData, store: &mut GlobalStore) -> Result<ProgramData, AssemblerError> {
    let mut values = Vec::with_capacity(pending.values.len());

    for value in pending.values {
        match value {
            PendingValue::Byte(byte) => values.push(Some(u16::from(byte))),
            PendingValue::Unassigned => values.push(None),
            PendingValue::Expr(expr) => {
                let raw = store.evaluate(&expr)?;

                if !pending.size.fits(raw) {
                    return Err(AssemblerError::new(AssemblerErrorKind::ValueOutOfRange {
                        value: raw,
                        size: pending.size.bits(),
                    })
                    .at(expr.span));
                }

                values.push(Some(truncate(raw, pending.size)));
            }
        }
    }

    Ok(ProgramData {
        address: pending.address,
        size: pending.size,
        values,
    })
}

fn encode_instruction(
    pending: PendingInstruction,
    store: &mut GlobalStore,
) -> Result<ProgramInstruction, AssemblerError> {
    let kind = match pending.kind {
        PendingKind::Binary { op, size, operands } => {
            let operands = match operands {
                PendingBinary::RegReg { dest, src } => BinaryOperands::RegReg { dest, src },
                PendingBinary::RegDir { dest, addr } => BinaryOperands::RegDir {
                    dest,
                    addr: memory_address(&addr, store)?,
                },
                PendingBinary::RegInd { dest } => BinaryOperands::RegInd { dest },
                PendingBinary::RegImm { dest, value } => BinaryOperands::RegImm {
                    dest,
                    value: immediate(&value, size, store)?,
                },
                PendingBinary::DirReg { addr, src } => BinaryOperands::DirReg {
                    addr: memory_address(&addr, store)?,
                    src,
                },
                PendingBinary::IndReg { src } => BinaryOperands::IndReg { src },
                PendingBinary::DirImm { addr, value } => BinaryOperands::DirImm {
                    addr: memory_address(&addr, store)?,
                    value: immediate(&value, size, store)?,
                },
                PendingBinary::IndImm { value } => BinaryOperands::IndImm {
                    value: immediate(&value, size, store)?,
                },
            };

            InstructionKind::Binary { op, size, operands }
        }
        PendingKind::Unary { op, size, operand } => InstructionKind::Unary {
            op,
            size,
            operand: match operand {
                PendingUnary::Register(register) => UnaryOperand::Register(register),
                PendingUnary::Direct(expr) => UnaryOperand::Direct(memory_address(&expr, store)?),
                PendingUnary::Indirect => UnaryOperand::Indirect,
            },
        },
        PendingKind::Stack { op, register } => InstructionKind::Stack { op, register },
        PendingKind::Jump {
            op,
            target,
            target_span,
        } => match store.label_address(&target) {
            Some(address) => InstructionKind::Jump {
                op,
                target: address,
            },
            None => {
                return Err(AssemblerError::new(AssemblerErrorKind::LabelNotFound {
                    label: target,
                })
                .at(target_span))
            }
        },
        PendingKind::Io { op, size, port } => InstructionKind::Io {
            op,
            size,
            port: match port {
                PendingPort::Fixed(expr) => {
                    let value = store.evaluate(&expr)?;

                    if !(0..=0xFF).contains(&value) {
                        return Err(AssemblerError::new(
                            AssemblerErrorKind::IoAddressOutOfRange { address: value },
                        )
                        .at(expr.span));
                    }

                    Port::Fixed(value as u8)
                }
                PendingPort::Variable => Port::Variable,
            },
        },
        PendingKind::Int { vector } => {
            let value = store.evaluate(&vector)?;

            match value {
                0 | 3 | 6 | 7 => InstructionKind::Int { vector: value as u8 },
                _ => {
                    return Err(
                        AssemblerError::new(AssemblerErrorKind::InvalidInterrupt { value })
                            .at(vector.span),
                    )
                }
            }
        }
        PendingKind::Zeroary { op } => InstructionKind::Zeroary { op },
    };

    Ok(ProgramInstruction::new(pending.address, kind))
}

/// Evaluates a direct operand address and checks it points at plain memory.
fn memory_address(expr: &Expression, store: &mut GlobalStore) -> Result<u16, AssemblerError> {
    let value = store.evaluate(expr)?;

    if value < 0 || value >= MEMORY_SIZE as i64 {
        return Err(
            AssemblerError::new(AssemblerErrorKind::AddressOutOfRange { address: value })
                .at(expr.span.clone()),
        );
    }

    let address = value as u16;

    if store.address_is_code(address) {
        return Err(
            AssemblerError::new(AssemblerErrorKind::AddressHasCode { address })
                .at(expr.span.clone()),
        );
    }

    Ok(address)
}

/// Evaluates an immediate and checks it fits the operand size, signed or
/// unsigned.
fn immediate(
    expr: &Expression,
    size: OperandSize,
    store: &mut GlobalStore,
) -> Result<u16, AssemblerError> {
    let value = store.evaluate(expr)?;

    if !size.fits(value) {
        return Err(AssemblerError::new(AssemblerErrorKind::ValueOutOfRange {
            value,
            size: size.bits(),
        })
        .at(expr.span.clone()));
    }

    Ok(truncate(value, size))
}

fn truncate(value: i64, size: OperandSize) -> u16 {
    (value as u16) & size.mask()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::lexer::scan;
    use crate::asm::parser::parse;

    fn build(source: &str) -> (Vec<ProgramData>, Vec<ProgramInstruction>) {
        let statements = parse(scan(source).unwrap()).unwrap();
        let mut store = GlobalStore::new();
        assert_eq!(store.load_statements(&statements), vec![]);

        let mut pending = validate(&statements, &store).unwrap();
        assert_eq!(compute_addresses(&mut pending, &mut store), vec![]);

        encode(pending, &mut store).unwrap()
    }

    fn first_error(source: &str) -> AssemblerError {
        let statements = parse(scan(source).unwrap()).unwrap();
        let mut store = GlobalStore::new();

        let mut errors = store.load_statements(&statements);
        if errors.is_empty() {
            let mut pending = match validate(&statements, &store) {
                Ok(pending) => pending,
                Err(errors) => return errors.into_iter().next().unwrap(),
            };

            errors = compute_addresses(&mut pending, &mut store);
            if errors.is_empty() {
                errors = match encode(pending, &mut store) {
                    Ok(_) => panic!("assembled without errors: {:?}", source),
                    Err(errors) => errors,
                };
            }
        }

        errors.into_iter().next().unwrap()
    }

    #[test]
    fn register_to_register_move() {
        let (_, instructions) = build("org 2000h\nmov ax, bx\nend");

        assert_eq!(instructions[0].address, 0x2000);
        assert_eq!(instructions[0].to_bytes(), vec![0x01, 0x80, 0x81]);
    }

    #[test]
    fn statements_are_laid_out_consecutively() {
        let (data, instructions) =
            build("org 1000h\nx db 1, 2\ny dw 3\norg 2000h\nmov ax, bx\nhlt\nend");

        assert_eq!(data[0].address, 0x1000);
        assert_eq!(data[1].address, 0x1002);
        assert_eq!(instructions[0].address, 0x2000);
        assert_eq!(instructions[1].address, 0x2003);
    }

    #[test]
    fn bare_data_label_reads_its_cell() {
        let (_, instructions) = build("org 1000h\nx db 2\norg 2000h\nmov al, x\nend");

        // MOV reg, dir with the label's address.
        assert_eq!(instructions[0].to_bytes(), vec![0x02, 0x00, 0x00, 0x10]);
    }

    #[test]
    fn constants_become_immediates() {
        let (_, instructions) = build("n equ 5\norg 2000h\nmov al, n\nend");

        assert_eq!(instructions[0].to_bytes(), vec![0x06, 0x00, 0x05]);
    }

    #[test]
    fn labels_may_be_used_before_their_definition() {
        let (_, instructions) = build("org 2000h\nmov al, x\nhlt\norg 1000h\nx db 5\nend");

        assert_eq!(
            instructions[0].kind,
            InstructionKind::Binary {
                op: BinaryOp::Mov,
                size: OperandSize::Byte,
                operands: BinaryOperands::RegDir {
                    dest: Register::AL,
                    addr: 0x1000,
                },
            }
        );
    }

    #[test]
    fn memory_destination_with_immediate_source() {
        let (_, instructions) = build("org 1000h\nx dw 0\norg 2000h\nmov x, 0ABCDh\nend");

        assert_eq!(
            instructions[0].to_bytes(),
            vec![0x0D, 0x00, 0x10, 0xCD, 0xAB]
        );
    }

    #[test]
    fn jumps_encode_the_target_address() {
        let (_, instructions) = build("org 2000h\nstart: jmp start\nend");

        assert_eq!(instructions[0].to_bytes(), vec![0xE0, 0x00, 0x20]);
    }

    #[test]
    fn io_ports_are_fixed_or_variable() {
        let (_, instructions) = build("org 2000h\nin al, 30h\nout dx, ax\nend");

        assert_eq!(instructions[0].to_bytes(), vec![0xD0, 0x30]);
        assert_eq!(instructions[1].to_bytes(), vec![0xDD]);
    }

    #[test]
    fn strings_decompose_into_bytes() {
        let (data, _) = build("org 1000h\nmsg db \"Hi\", 33\nend");

        assert_eq!(data[0].values, vec![Some(0x48), Some(0x69), Some(33)]);
        assert_eq!(data[0].byte_length(), 3);
    }

    #[test]
    fn unassigned_cells_reserve_space_without_a_value() {
        let (data, _) = build("org 1000h\nx dw ?, 7\nend");

        assert_eq!(data[0].values, vec![None, Some(7)]);
        assert_eq!(data[0].byte_length(), 4);
    }

    #[test]
    fn declared_lengths_match_encoded_bytes() {
        let (_, instructions) = build(
            "org 1000h\nx db 1\nw dw 2\norg 2000h\nstart: mov ax, bx\nmov cl, x\nmov w, 7\n\
             add al, 3\nneg byte ptr [bx]\ninc w\npush dx\npushf\njnz start\ncall start\n\
             int 7\nin al, 30h\nout dx, ax\nhlt\nend",
        );

        assert_eq!(instructions.len(), 14);
        for instruction in &instructions {
            assert_eq!(
                instruction.to_bytes().len(),
                usize::from(instruction.length())
            );
        }
    }

    #[test]
    fn layout_requires_an_origin() {
        assert_eq!(
            first_error("mov ax, bx\nend").kind,
            AssemblerErrorKind::MissingOrg
        );
    }

    #[test]
    fn two_statements_cannot_share_an_address() {
        assert_eq!(
            first_error("org 2000h\nhlt\norg 2000h\nnop\nend").kind,
            AssemblerErrorKind::OccupiedAddress { address: 0x2000 }
        );
    }

    #[test]
    fn code_cannot_run_past_the_end_of_memory() {
        assert_eq!(
            first_error("org 3FFFh\nmov ax, bx\nend").kind,
            AssemblerErrorKind::InstructionOutOfRange { address: 0x3FFF }
        );
    }

    #[test]
    fn sizes_must_agree() {
        assert_eq!(
            first_error("org 2000h\nmov ax, bl\nend").kind,
            AssemblerErrorKind::SizeMismatch { src: 8, out: 16 }
        );
        assert_eq!(
            first_error("org 2000h\nmov byte ptr [bx], ax\nend").kind,
            AssemblerErrorKind::SizeMismatch { src: 16, out: 8 }
        );
        assert_eq!(
            first_error("org 1000h\nw dw 0\norg 2000h\nmov al, w\nend").kind,
            AssemblerErrorKind::SizeMismatch { src: 16, out: 8 }
        );
    }

    #[test]
    fn both_operands_in_memory_is_rejected() {
        assert_eq!(
            first_error("org 1000h\nx db 1\ny db 2\norg 2000h\nmov x, y\nend").kind,
            AssemblerErrorKind::DoubleMemoryAccess
        );
        assert_eq!(
            first_error("org 2000h\nmov [bx], [bx]\nend").kind,
            AssemblerErrorKind::DoubleMemoryAccess
        );
    }

    #[test]
    fn memory_immediate_needs_an_explicit_size() {
        assert_eq!(
            first_error("org 2000h\nmov [bx], 1\nend").kind,
            AssemblerErrorKind::UnknownSize
        );
        assert_eq!(
            first_error("org 2000h\ninc [bx]\nend").kind,
            AssemblerErrorKind::UnknownSize
        );
    }

    #[test]
    fn destinations_must_be_writable() {
        assert_eq!(
            first_error("org 2000h\nfoo: hlt\nmov foo, al\nend").kind,
            AssemblerErrorKind::LabelShouldBeWritable {
                label: "FOO".to_string(),
            }
        );
        assert_eq!(
            first_error("org 2000h\nmov 3, al\nend").kind,
            AssemblerErrorKind::DestinationCannotBeImmediate
        );
    }

    #[test]
    fn values_must_fit_the_directive_size() {
        assert_eq!(
            first_error("org 1000h\nx db 256\nend").kind,
            AssemblerErrorKind::ValueOutOfRange {
                value: 256,
                size: 8,
            }
        );
        assert_eq!(
            first_error("org 1000h\nx db -129\nend").kind,
            AssemblerErrorKind::ValueOutOfRange {
                value: -129,
                size: 8,
            }
        );
    }

    #[test]
    fn words_cannot_hold_strings() {
        assert_eq!(
            first_error("org 1000h\nx dw \"hi\"\nend").kind,
            AssemblerErrorKind::CannotAcceptStrings { directive: "DW" }
        );
    }

    #[test]
    fn jumps_require_an_instruction_label() {
        assert_eq!(
            first_error("org 1000h\nx db 1\norg 2000h\njmp x\nend").kind,
            AssemblerErrorKind::LabelShouldBeAnInstruction {
                label: "X".to_string(),
            }
        );
        assert_eq!(
            first_error("org 2000h\njmp nowhere\nend").kind,
            AssemblerErrorKind::LabelNotFound {
                label: "NOWHERE".to_string(),
            }
        );
        assert_eq!(
            first_error("org 2000h\njmp 2000h\nend").kind,
            AssemblerErrorKind::ExpectsLabel
        );
    }

    #[test]
    fn interrupt_vectors_are_checked() {
        let (_, instructions) = build("org 2000h\nint 7\nend");
        assert_eq!(instructions[0].to_bytes(), vec![0xFA, 7]);

        assert_eq!(
            first_error("org 2000h\nint 2\nend").kind,
            AssemblerErrorKind::InvalidInterrupt { value: 2 }
        );
    }

    #[test]
    fn io_operand_shapes_are_checked() {
        assert_eq!(
            first_error("org 2000h\nin bl, 30h\nend").kind,
            AssemblerErrorKind::ExpectsAx
        );
        assert_eq!(
            first_error("org 2000h\nout cx, ax\nend").kind,
            AssemblerErrorKind::ExpectsDx
        );
        assert_eq!(
            first_error("org 2000h\nin al, 100h\nend").kind,
            AssemblerErrorKind::IoAddressOutOfRange { address: 0x100 }
        );
    }

    #[test]
    fn stack_instructions_take_word_registers() {
        let (_, instructions) = build("org 2000h\npush bx\npop bx\nend");
        assert_eq!(instructions[0].to_bytes(), vec![0xC0, 0x81]);
        assert_eq!(instructions[1].to_bytes(), vec![0xC1, 0x81]);

        assert_eq!(
            first_error("org 2000h\npush bl\nend").kind,
            AssemblerErrorKind::ExpectsWordRegister
        );
    }

    #[test]
    fn direct_operands_cannot_point_into_code() {
        assert_eq!(
            first_error("org 2000h\nmov al, [2000h]\nend").kind,
            AssemblerErrorKind::AddressHasCode { address: 0x2000 }
        );
        assert_eq!(
            first_error("org 2000h\nmov al, [4000h]\nend").kind,
            AssemblerErrorKind::AddressOutOfRange { address: 0x4000 }
        );
    }

    #[test]
    fn operand_counts_are_checked() {
        assert_eq!(
            first_error("org 2000h\nmov ax\nend").kind,
            AssemblerErrorKind::ExpectsTwoOperands
        );
        assert_eq!(
            first_error("org 2000h\nneg\nend").kind,
            AssemblerErrorKind::ExpectsOneOperand
        );
        assert_eq!(
            first_error("org 2000h\nhlt ax\nend").kind,
            AssemblerErrorKind::ExpectsNoOperands
        );
    }
}
