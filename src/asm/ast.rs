//! The statement tree produced by the parser.
//!
//! Everything here is purely syntactic. Labels are not resolved, expressions
//! are not evaluated and no sizes have been checked; that happens when the
//! statements are loaded into the [`GlobalStore`](crate::asm::store::GlobalStore)
//! and validated.

use crate::error::Span;
use crate::instruction::{Mnemonic, OperandSize, Register};

/// An assemble-time numeric expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Number(u32),
    /// A reference to a label. With `offset` set it reads `OFFSET name` and
    /// resolves to the address of a data directive instead of its value.
    Label {
        name: String,
        offset: bool,
    },
    Unary {
        negative: bool,
        inner: Box<Expression>,
    },
    Binary {
        operator: Operator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

/// Binary operator in a numeric expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
}

impl Expression {
    /// The label name if this is exactly a plain label reference, written
    /// without `OFFSET` and without any arithmetic around it.
    pub fn as_bare_label(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::Label { name, offset: false } => Some(name),
            _ => None,
        }
    }
}

/// One operand of an instruction statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub kind: OperandKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperandKind {
    Register(Register),
    /// `[BX]`, optionally qualified as `BYTE PTR [BX]` or `WORD PTR [BX]`.
    Indirect { size: Option<OperandSize> },
    /// `[expr]`, optionally qualified with a size.
    Direct {
        size: Option<OperandSize>,
        expr: Expression,
    },
    /// A bare expression: an immediate value or an unadorned label.
    Expr(Expression),
}

/// One value of a `DB`, `DW` or `EQU` directive.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    String { value: String, span: Span },
    /// A `?` placeholder that reserves space without initializing it.
    Unassigned { span: Span },
    Expr(Expression),
}

impl DataValue {
    pub fn span(&self) -> Span {
        match self {
            DataValue::String { span, .. } => span.clone(),
            DataValue::Unassigned { span } => span.clone(),
            DataValue::Expr(expr) => expr.span.clone(),
        }
    }
}

/// The directive keyword of a data statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDirective {
    Db,
    Dw,
    Equ,
}

impl DataDirective {
    pub fn name(self) -> &'static str {
        match self {
            DataDirective::Db => "DB",
            DataDirective::Dw => "DW",
            DataDirective::Equ => "EQU",
        }
    }

    /// Cell size of the directive. `EQU` reserves no memory and has none.
    pub fn size(self) -> Option<OperandSize> {
        match self {
            DataDirective::Db => Some(OperandSize::Byte),
            DataDirective::Dw => Some(OperandSize::Word),
            DataDirective::Equ => None,
        }
    }
}

/// One statement, that is, one meaningful line of the program.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `ORG address`, moving the location pointer.
    Origin { address: u32, span: Span },

    /// The mandatory final `END`.
    End { span: Span },

    /// A `DB`, `DW` or `EQU` line, optionally labelled.
    Data {
        label: Option<String>,
        label_span: Option<Span>,
        directive: DataDirective,
        values: Vec<DataValue>,
        span: Span,
    },

    /// An instruction, optionally labelled.
    Instruction {
        label: Option<String>,
        label_span: Option<Span>,
        mnemonic: Mnemonic,
        operands: Vec<Operand>,
        span: Span,
    },
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Origin { span, .. }
            | Statement::End { span }
            | Statement::Data { span, .. }
            | Statement::Instruction { span, .. } => span.clone(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Statement::Data { label, .. } | Statement::Instruction { label, .. } => {
                label.as_deref()
            }
            _ => None,
        }
    }
}
