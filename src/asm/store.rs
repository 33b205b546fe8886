//! The global store: every label and constant of the program, plus the
//! memory occupancy maps built during address layout.
//!
//! Assembly is single pass over the source but two pass over the statements.
//! The statements are loaded first so that every label's kind is known before
//! any operand is validated; an operand like `MOV AL, x` encodes differently
//! depending on whether `x` is a constant or a data directive. Addresses are
//! assigned later, and only then can expressions be evaluated.
//!
//! Constants are evaluated lazily and memoized. A constant being evaluated is
//! marked as in flight, so a definition that reaches back to itself surfaces
//! as a diagnostic instead of unbounded recursion.

use std::collections::{HashMap, HashSet};
use std::mem;

use crate::asm::ast::{DataDirective, DataValue, Expression, ExpressionKind, Operator, Statement};
use crate::error::{AssemblerError, AssemblerErrorKind, Span};
use crate::instruction::OperandSize;

/// What a label points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    /// A code label in front of an instruction.
    Instruction,
    /// A label in front of a `DB` or `DW` directive, with the cell size.
    Data(OperandSize),
    /// An `EQU` constant.
    Constant,
}

struct LabelInfo {
    kind: LabelKind,
    address: Option<u16>,
}

enum ConstantState {
    NotProcessed(Expression),
    Processing,
    Processed(i64),
}

struct ConstantEntry {
    /// Span of the whole `EQU` statement, where reference cycles are
    /// reported.
    definition: Span,
    state: ConstantState,
}

#[derive(Default)]
pub struct GlobalStore {
    labels: HashMap<String, LabelInfo>,
    constants: HashMap<String, ConstantEntry>,
    occupied: HashSet<u16>,
    code: HashSet<u16>,
}

impl GlobalStore {
    pub fn new() -> GlobalStore {
        GlobalStore::default()
    }

    /// Registers every label with its kind and every constant with its
    /// expression. Addresses are not known yet and stay unset.
    ///
    /// Returns all the problems found; the caller decides whether to go on.
    pub fn load_statements(&mut self, statements: &[Statement]) -> Vec<AssemblerError> {
        let mut errors = Vec::new();

        for statement in statements {
            match statement {
                Statement::Data {
                    label,
                    label_span,
                    directive: DataDirective::Equ,
                    values,
                    span,
                } => {
                    let name = match label {
                        Some(name) => name,
                        None => {
                            errors.push(
                                AssemblerError::new(AssemblerErrorKind::ConstantMustHaveALabel)
                                    .at(span.clone()),
                            );
                            continue;
                        }
                    };

                    if let Some(error) = self.check_duplicate(name, label_span) {
                        errors.push(error);
                        continue;
                    }

                    if values.len() != 1 {
                        errors.push(
                            AssemblerError::new(AssemblerErrorKind::ConstantMustHaveOneValue)
                                .at(span.clone()),
                        );
                        continue;
                    }

                    let expr = match &values[0] {
                        DataValue::Expr(expr) => expr.clone(),
                        DataValue::String { span, .. } => {
                            errors.push(
                                AssemblerError::new(AssemblerErrorKind::CannotAcceptStrings {
                                    directive: "EQU",
                                })
                                .at(span.clone()),
                            );
                            continue;
                        }
                        DataValue::Unassigned { span } => {
                            errors.push(
                                AssemblerError::new(AssemblerErrorKind::CannotBeUnassigned {
                                    directive: "EQU",
                                })
                                .at(span.clone()),
                            );
                            continue;
                        }
                    };

                    self.labels.insert(
                        name.clone(),
                        LabelInfo {
                            kind: LabelKind::Constant,
                            address: None,
                        },
                    );
                    self.constants.insert(
                        name.clone(),
                        ConstantEntry {
                            definition: span.clone(),
                            state: ConstantState::NotProcessed(expr),
                        },
                    );
                }

                Statement::Data {
                    label: Some(name),
                    label_span,
                    directive,
                    ..
                } => {
                    if let Some(error) = self.check_duplicate(name, label_span) {
                        errors.push(error);
                        continue;
                    }

                    let size = match directive {
                        DataDirective::Db => OperandSize::Byte,
                        DataDirective::Dw => OperandSize::Word,
                        DataDirective::Equ => continue,
                    };

                    self.labels.insert(
                        name.clone(),
                        LabelInfo {
                            kind: LabelKind::Data(size),
                            address: None,
                        },
                    );
                }

                Statement::Instruction {
                    label: Some(name),
                    label_span,
                    ..
                } => {
                    if let Some(error) = self.check_duplicate(name, label_span) {
                        errors.push(error);
                        continue;
                    }

                    self.labels.insert(
                        name.clone(),
                        LabelInfo {
                            kind: LabelKind::Instruction,
                            address: None,
                        },
                    );
                }

                _ => {}
            }
        }

        errors
    }

    fn check_duplicate(&self, name: &str, label_span: &Option<Span>) -> Option<AssemblerError> {
        if !self.labels.contains_key(name) {
            return None;
        }

        let error = AssemblerError::new(AssemblerErrorKind::DuplicatedLabel {
            label: name.to_string(),
        });

        Some(match label_span {
            Some(span) => error.at(span.clone()),
            None => error,
        })
    }

    pub fn label_kind(&self, name: &str) -> Option<LabelKind> {
        self.labels.get(name).map(|info| info.kind)
    }

    pub fn label_address(&self, name: &str) -> Option<u16> {
        self.labels.get(name).and_then(|info| info.address)
    }

    /// Records where a labelled statement ended up in memory.
    pub fn set_label_address(&mut self, name: &str, address: u16) {
        if let Some(info) = self.labels.get_mut(name) {
            info.address = Some(address);
        }
    }

    /// Claims one byte of memory. Returns false when that byte was already
    /// claimed by an earlier statement.
    pub fn reserve(&mut self, address: u16) -> bool {
        self.occupied.insert(address)
    }

    /// Additionally marks a byte as holding code, which data operands may
    /// not address.
    pub fn reserve_code(&mut self, address: u16) {
        self.code.insert(address);
    }

    pub fn address_is_code(&self, address: u16) -> bool {
        self.code.contains(&address)
    }

    /// Evaluates an assemble-time expression to a plain number.
    ///
    /// Requires addresses to have been assigned already whenever the
    /// expression mentions an instruction or data label.
    pub fn evaluate(&mut self, expr: &Expression) -> Result<i64, AssemblerError> {
        match &expr.kind {
            ExpressionKind::Number(value) => Ok(i64::from(*value)),
            ExpressionKind::Label { name, offset } => self.label_value(name, *offset, &expr.span),
            ExpressionKind::Unary { negative, inner } => {
                let value = self.evaluate(inner)?;
                Ok(if *negative { value.wrapping_neg() } else { value })
            }
            ExpressionKind::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;

                Ok(match operator {
                    Operator::Add => left.wrapping_add(right),
                    Operator::Subtract => left.wrapping_sub(right),
                    Operator::Multiply => left.wrapping_mul(right),
                })
            }
        }
    }

    fn label_value(&mut self, name: &str, offset: bool, span: &Span) -> Result<i64, AssemblerError> {
        let (kind, address) = match self.labels.get(name) {
            Some(info) => (info.kind, info.address),
            None => {
                return Err(AssemblerError::new(AssemblerErrorKind::LabelNotFound {
                    label: name.to_string(),
                })
                .at(span.clone()))
            }
        };

        if offset {
            return match kind {
                LabelKind::Data(_) => address_of(name, address, span),
                _ => Err(
                    AssemblerError::new(AssemblerErrorKind::OffsetOnlyWithDataDirective)
                        .at(span.clone()),
                ),
            };
        }

        match kind {
            LabelKind::Constant => self.constant_value(name, span),
            LabelKind::Instruction => address_of(name, address, span),
            LabelKind::Data(_) => Err(AssemblerError::new(
                AssemblerErrorKind::LabelShouldBeANumber {
                    label: name.to_string(),
                },
            )
            .at(span.clone())),
        }
    }

    /// The value of an `EQU` constant, evaluating and memoizing it on first
    /// use.
    pub fn constant_value(&mut self, name: &str, span: &Span) -> Result<i64, AssemblerError> {
        let (definition, state) = match self.constants.get_mut(name) {
            Some(entry) => (
                entry.definition.clone(),
                mem::replace(&mut entry.state, ConstantState::Processing),
            ),
            None => {
                return Err(AssemblerError::new(AssemblerErrorKind::LabelNotFound {
                    label: name.to_string(),
                })
                .at(span.clone()))
            }
        };

        match state {
            ConstantState::Processed(value) => {
                self.set_constant_state(name, ConstantState::Processed(value));
                Ok(value)
            }
            // Meeting a constant that is already in flight means its own
            // definition led back here.
            ConstantState::Processing => {
                Err(AssemblerError::new(AssemblerErrorKind::CircularReference).at(definition))
            }
            ConstantState::NotProcessed(expr) => {
                let value = self.evaluate(&expr)?;
                self.set_constant_state(name, ConstantState::Processed(value));
                Ok(value)
            }
        }
    }

    fn set_constant_state(&mut self, name: &str, state: ConstantState) {
        if let Some(entry) = self.constants.get_mut(name) {
            entry.state = state;
        }
    }
}

fn address_of(name: &str, address: Option<u16>, span: &Span) -> Result<i64, AssemblerError> {
    match address {
        Some(address) => Ok(i64::from(address)),
        None => Err(AssemblerError::new(AssemblerErrorKind::LabelNotFound {
            label: name.to_string(),
        })
        .at(span.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::lexer::scan;
    use crate::asm::parser::parse;

    fn load(source: &str) -> (GlobalStore, Vec<AssemblerError>) {
        let statements = parse(scan(source).unwrap()).unwrap();
        let mut store = GlobalStore::new();
        let errors = store.load_statements(&statements);
        (store, errors)
    }

    fn expr(source: &str) -> Expression {
        let statements = parse(scan(&format!("db {}", source)).unwrap()).unwrap();
        match statements.into_iter().next() {
            Some(Statement::Data { mut values, .. }) => match values.remove(0) {
                DataValue::Expr(expr) => expr,
                other => panic!("not an expression: {:?}", other),
            },
            other => panic!("not a data directive: {:?}", other),
        }
    }

    #[test]
    fn labels_get_their_kinds() {
        let (store, errors) = load("x db 1\ny dw 2\nn equ 3\nfoo: hlt\nend");

        assert!(errors.is_empty());
        assert_eq!(
            store.label_kind("X"),
            Some(LabelKind::Data(OperandSize::Byte))
        );
        assert_eq!(
            store.label_kind("Y"),
            Some(LabelKind::Data(OperandSize::Word))
        );
        assert_eq!(store.label_kind("N"), Some(LabelKind::Constant));
        assert_eq!(store.label_kind("FOO"), Some(LabelKind::Instruction));
        assert_eq!(store.label_kind("BAR"), None);
    }

    #[test]
    fn duplicates_keep_the_first_definition() {
        let (store, errors) = load("x db 1\nx dw 2");

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].kind,
            AssemblerErrorKind::DuplicatedLabel {
                label: "X".to_string(),
            }
        );
        assert_eq!(
            store.label_kind("X"),
            Some(LabelKind::Data(OperandSize::Byte))
        );
    }

    #[test]
    fn equ_shape_is_checked() {
        assert_eq!(
            load("equ 1").1[0].kind,
            AssemblerErrorKind::ConstantMustHaveALabel
        );
        assert_eq!(
            load("n equ 1, 2").1[0].kind,
            AssemblerErrorKind::ConstantMustHaveOneValue
        );
        assert_eq!(
            load("n equ \"a\"").1[0].kind,
            AssemblerErrorKind::CannotAcceptStrings { directive: "EQU" }
        );
        assert_eq!(
            load("n equ ?").1[0].kind,
            AssemblerErrorKind::CannotBeUnassigned { directive: "EQU" }
        );
    }

    #[test]
    fn constants_may_reference_each_other() {
        let (mut store, errors) = load("a equ b + 1\nb equ 2");

        assert!(errors.is_empty());
        assert_eq!(store.evaluate(&expr("a * 10")), Ok(30));
        // Memoized on second use.
        assert_eq!(store.evaluate(&expr("a")), Ok(3));
    }

    #[test]
    fn reference_cycles_are_reported() {
        let (mut store, _) = load("a equ b\nb equ a");
        assert_eq!(
            store.evaluate(&expr("a")).unwrap_err().kind,
            AssemblerErrorKind::CircularReference
        );

        let (mut store, _) = load("x equ x + 1");
        assert_eq!(
            store.evaluate(&expr("x")).unwrap_err().kind,
            AssemblerErrorKind::CircularReference
        );
    }

    #[test]
    fn label_kinds_constrain_expressions() {
        let (mut store, _) = load("x db 1\nfoo: hlt\nn equ 2");
        store.set_label_address("X", 0x1000);
        store.set_label_address("FOO", 0x2000);

        assert_eq!(store.evaluate(&expr("offset x")), Ok(0x1000));
        assert_eq!(store.evaluate(&expr("foo")), Ok(0x2000));
        assert_eq!(store.evaluate(&expr("n")), Ok(2));

        assert_eq!(
            store.evaluate(&expr("x")).unwrap_err().kind,
            AssemblerErrorKind::LabelShouldBeANumber {
                label: "X".to_string(),
            }
        );
        assert_eq!(
            store.evaluate(&expr("offset n")).unwrap_err().kind,
            AssemblerErrorKind::OffsetOnlyWithDataDirective
        );
        assert_eq!(
            store.evaluate(&expr("missing")).unwrap_err().kind,
            AssemblerErrorKind::LabelNotFound {
                label: "MISSING".to_string(),
            }
        );
    }

    #[test]
    fn negation_and_precedence() {
        let (mut store, _) = load("");

        assert_eq!(store.evaluate(&expr("-(4 + 2) * 3")), Ok(-18));
        assert_eq!(store.evaluate(&expr("10 - 2 * 3")), Ok(4));
    }

    #[test]
    fn bytes_can_only_be_claimed_once() {
        let mut store = GlobalStore::new();

        assert!(store.reserve(0x2000));
        assert!(!store.reserve(0x2000));
        assert!(store.reserve(0x2001));

        store.reserve_code(0x2000);
        assert!(store.address_is_code(0x2000));
        assert!(!store.address_is_code(0x2001));
    }
}
