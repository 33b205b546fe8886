//! A recursive descent parser over scanned tokens.
//!
//! Each line is one statement: an origin change, the final `END`, a data
//! directive or an instruction. Data directives and instructions carry comma
//! separated values or operands, and inside those live numeric expressions
//! with the usual precedence of `*` over `+` and `-`.
//!
//! Parsing stops at the first syntax error. The deeper checks, arity and
//! sizes and label kinds, belong to the validation stage.

use edit_distance::edit_distance;

use crate::asm::ast::{
    DataDirective, DataValue, Expression, ExpressionKind, Operand, OperandKind, Operator,
    Statement,
};
use crate::asm::token::{ScannedToken, TokenKind};
use crate::error::{AssemblerError, AssemblerErrorKind, Span};
use crate::instruction::{Mnemonic, OperandSize, Register};

/// Parses a whole token stream, as produced by
/// [`scan`](crate::asm::lexer::scan), into statements.
pub fn parse(tokens: Vec<ScannedToken>) -> Result<Vec<Statement>, AssemblerError> {
    Parser::new(tokens).run()
}

struct Parser {
    tokens: Vec<ScannedToken>,
    current: usize,
}

impl Parser {
    fn new(tokens: Vec<ScannedToken>) -> Parser {
        Parser { tokens, current: 0 }
    }

    fn run(&mut self) -> Result<Vec<Statement>, AssemblerError> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            if self.match_token(&TokenKind::Eol).is_some() {
                continue;
            }

            statements.push(self.statement()?);
        }

        Ok(statements)
    }

    fn statement(&mut self) -> Result<Statement, AssemblerError> {
        if let Some(statement) = self.origin_change()? {
            return Ok(statement);
        }
        if let Some(statement) = self.end_statement()? {
            return Ok(statement);
        }
        if let Some(statement) = self.data_directive()? {
            return Ok(statement);
        }
        if let Some(statement) = self.instruction()? {
            return Ok(statement);
        }

        let token = self.peek();
        Err(AssemblerError::new(AssemblerErrorKind::ExpectedInstruction {
            got: token.kind.to_string(),
        })
        .at(token.span.clone()))
    }

    fn origin_change(&mut self) -> Result<Option<Statement>, AssemblerError> {
        let org_span = match self.match_token(&TokenKind::Org) {
            Some(span) => span,
            None => return Ok(None),
        };

        let (address, address_span) = match self.match_number() {
            Some(number) => number,
            None => {
                return Err(
                    AssemblerError::new(AssemblerErrorKind::ExpectedAddressAfterOrg)
                        .at(self.peek().span.clone()),
                )
            }
        };

        self.end_of_statement()?;

        Ok(Some(Statement::Origin {
            address,
            span: org_span.start..address_span.end,
        }))
    }

    fn end_statement(&mut self) -> Result<Option<Statement>, AssemblerError> {
        let end_span = match self.match_token(&TokenKind::End) {
            Some(span) => span,
            None => return Ok(None),
        };

        while !self.is_at_end() {
            if self.match_token(&TokenKind::Eol).is_some() {
                continue;
            }

            return Err(
                AssemblerError::new(AssemblerErrorKind::EndMustBeLastStatement).at(end_span),
            );
        }

        Ok(Some(Statement::End { span: end_span }))
    }

    fn data_directive(&mut self) -> Result<Option<Statement>, AssemblerError> {
        // Both matches are tried before deciding, so a lone label and a lone
        // directive are told apart here.
        let label = self.match_identifier();
        let directive = self.match_directive();

        if let Some((name, label_span)) = &label {
            if directive.is_none() {
                return Err(AssemblerError::new(AssemblerErrorKind::UnexpectedIdentifier {
                    suggestion: suggest_statement_keyword(name),
                })
                .at(label_span.clone()));
            }
        }

        let (directive, directive_span) = match directive {
            Some(directive) => directive,
            None => return Ok(None),
        };

        let mut values = vec![self.data_value()?];
        while self.match_token(&TokenKind::Comma).is_some() {
            values.push(self.data_value()?);
        }

        self.end_of_statement()?;

        let start = label
            .as_ref()
            .map(|(_, span)| span.start)
            .unwrap_or(directive_span.start);
        let end = values
            .last()
            .map(|value| value.span().end)
            .unwrap_or(directive_span.end);
        let (label, label_span) = split_label(label);

        Ok(Some(Statement::Data {
            label,
            label_span,
            directive,
            values,
            span: start..end,
        }))
    }

    fn data_value(&mut self) -> Result<DataValue, AssemblerError> {
        if let Some((value, span)) = self.match_string() {
            return Ok(DataValue::String { value, span });
        }

        if let Some(span) = self.match_token(&TokenKind::QuestionMark) {
            return Ok(DataValue::Unassigned { span });
        }

        Ok(DataValue::Expr(self.number_expression()?))
    }

    fn instruction(&mut self) -> Result<Option<Statement>, AssemblerError> {
        let label = self.match_label();

        // The label may sit on its own line, above the instruction.
        while self.match_token(&TokenKind::Eol).is_some() {}

        let mnemonic = self.match_mnemonic();

        if label.is_some() && mnemonic.is_none() {
            let token = self.peek();
            return Err(
                AssemblerError::new(AssemblerErrorKind::ExpectedInstructionAfterLabel {
                    got: token.kind.to_string(),
                })
                .at(token.span.clone()),
            );
        }

        let (mnemonic, mnemonic_span) = match mnemonic {
            Some(mnemonic) => mnemonic,
            None => return Ok(None),
        };

        let start = label
            .as_ref()
            .map(|(_, span)| span.start)
            .unwrap_or(mnemonic_span.start);
        let (label, label_span) = split_label(label);

        if self.is_at_end_of_statement() {
            return Ok(Some(Statement::Instruction {
                label,
                label_span,
                mnemonic,
                operands: Vec::new(),
                span: start..mnemonic_span.end,
            }));
        }

        let mut operands = vec![self.operand()?];
        while self.match_token(&TokenKind::Comma).is_some() {
            operands.push(self.operand()?);
        }

        self.end_of_statement()?;

        let end = operands
            .last()
            .map(|operand| operand.span.end)
            .unwrap_or(mnemonic_span.end);

        Ok(Some(Statement::Instruction {
            label,
            label_span,
            mnemonic,
            operands,
            span: start..end,
        }))
    }

    fn operand(&mut self) -> Result<Operand, AssemblerError> {
        if let Some((register, span)) = self.match_register() {
            return Ok(Operand {
                kind: OperandKind::Register(register),
                span,
            });
        }

        let size = self.match_size();
        if let Some((size, _)) = &size {
            if self.match_token(&TokenKind::Ptr).is_none() {
                let after = match size {
                    OperandSize::Byte => "BYTE",
                    OperandSize::Word => "WORD",
                };
                return Err(
                    AssemblerError::new(AssemblerErrorKind::ExpectedLiteralAfterLiteral {
                        expected: "PTR",
                        after: after.to_string(),
                    })
                    .at(self.peek().span.clone()),
                );
            }
        }

        if let Some(bracket_span) = self.match_token(&TokenKind::LeftBracket) {
            let start = size
                .as_ref()
                .map(|(_, span)| span.start)
                .unwrap_or(bracket_span.start);
            let size = size.map(|(size, _)| size);

            if self.check_register() {
                if self
                    .match_token(&TokenKind::Register(Register::BX))
                    .is_none()
                {
                    return Err(
                        AssemblerError::new(AssemblerErrorKind::IndirectAddressingMustBeBx)
                            .at(self.peek().span.clone()),
                    );
                }

                let close = match self.match_token(&TokenKind::RightBracket) {
                    Some(span) => span,
                    None => {
                        return Err(AssemblerError::new(
                            AssemblerErrorKind::ExpectedLiteralAfterLiteral {
                                expected: "]",
                                after: "BX".to_string(),
                            },
                        )
                        .at(self.peek().span.clone()))
                    }
                };

                return Ok(Operand {
                    kind: OperandKind::Indirect { size },
                    span: start..close.end,
                });
            }

            let expr = self.number_expression()?;
            let close = match self.match_token(&TokenKind::RightBracket) {
                Some(span) => span,
                None => {
                    return Err(AssemblerError::new(
                        AssemblerErrorKind::ExpectedLiteralAfterExpression { expected: "]" },
                    )
                    .at(self.peek().span.clone()))
                }
            };

            return Ok(Operand {
                kind: OperandKind::Direct { size, expr },
                span: start..close.end,
            });
        }

        if size.is_some() {
            // A size qualifier with nothing behind it.
            return Err(
                AssemblerError::new(AssemblerErrorKind::ExpectedLiteralAfterLiteral {
                    expected: "[",
                    after: "PTR".to_string(),
                })
                .at(self.peek().span.clone()),
            );
        }

        let expr = self.number_expression()?;
        let span = expr.span.clone();
        Ok(Operand {
            kind: OperandKind::Expr(expr),
            span,
        })
    }

    // Numeric expressions, lowest precedence first.

    fn number_expression(&mut self) -> Result<Expression, AssemblerError> {
        self.term()
    }

    fn term(&mut self) -> Result<Expression, AssemblerError> {
        let mut expression = self.factor()?;

        while let Some(operator) = self.match_term_operator() {
            let right = self.factor()?;
            let span = expression.span.start..right.span.end;
            expression = Expression {
                kind: ExpressionKind::Binary {
                    operator,
                    left: Box::new(expression),
                    right: Box::new(right),
                },
                span,
            };
        }

        Ok(expression)
    }

    fn factor(&mut self) -> Result<Expression, AssemblerError> {
        let mut expression = self.unary()?;

        while self.match_token(&TokenKind::Star).is_some() {
            let right = self.unary()?;
            let span = expression.span.start..right.span.end;
            expression = Expression {
                kind: ExpressionKind::Binary {
                    operator: Operator::Multiply,
                    left: Box::new(expression),
                    right: Box::new(right),
                },
                span,
            };
        }

        Ok(expression)
    }

    fn unary(&mut self) -> Result<Expression, AssemblerError> {
        if let Some((negative, operator_span)) = self.match_sign() {
            // Forbid stacked signs like `--1`, which read like a typo.
            if self.check_sign() {
                return Err(AssemblerError::new(AssemblerErrorKind::AmbiguousUnary)
                    .at(self.peek().span.clone()));
            }

            let inner = self.unary()?;
            let span = operator_span.start..inner.span.end;
            return Ok(Expression {
                kind: ExpressionKind::Unary {
                    negative,
                    inner: Box::new(inner),
                },
                span,
            });
        }

        self.primary()
    }

    fn primary(&mut self) -> Result<Expression, AssemblerError> {
        if let Some((value, span)) = self.match_number() {
            return Ok(Expression {
                kind: ExpressionKind::Number(value),
                span,
            });
        }

        if self.match_token(&TokenKind::LeftParen).is_some() {
            let expression = self.number_expression()?;
            if self.match_token(&TokenKind::RightParen).is_none() {
                return Err(AssemblerError::new(AssemblerErrorKind::UnclosedParenthesis)
                    .at(self.peek().span.clone()));
            }
            return Ok(expression);
        }

        let offset_span = self.match_token(&TokenKind::Offset);
        let identifier = self.match_identifier();

        if offset_span.is_some() && identifier.is_none() {
            return Err(AssemblerError::new(AssemblerErrorKind::ExpectedLabelAfterOffset)
                .at(self.peek().span.clone()));
        }

        let (name, name_span) = match identifier {
            Some(identifier) => identifier,
            None => {
                return Err(AssemblerError::new(AssemblerErrorKind::ExpectedArgument)
                    .at(self.peek().span.clone()))
            }
        };

        let offset = offset_span.is_some();
        let start = offset_span
            .map(|span| span.start)
            .unwrap_or(name_span.start);

        Ok(Expression {
            kind: ExpressionKind::Label { name, offset },
            span: start..name_span.end,
        })
    }

    // Token stream helpers.

    fn peek(&self) -> &ScannedToken {
        &self.tokens[self.current]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn is_at_end_of_statement(&self) -> bool {
        self.check(&TokenKind::Eol) || self.is_at_end()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == *kind
    }

    fn advance_span(&mut self) -> Span {
        let span = self.tokens[self.current].span.clone();
        if self.current + 1 < self.tokens.len() {
            self.current += 1;
        }
        span
    }

    fn match_token(&mut self, kind: &TokenKind) -> Option<Span> {
        if self.check(kind) {
            Some(self.advance_span())
        } else {
            None
        }
    }

    fn match_number(&mut self) -> Option<(u32, Span)> {
        let value = match self.peek().kind {
            TokenKind::Number(value) => value,
            _ => return None,
        };

        Some((value, self.advance_span()))
    }

    fn match_string(&mut self) -> Option<(String, Span)> {
        let value = match &self.peek().kind {
            TokenKind::String(value) => value.clone(),
            _ => return None,
        };

        Some((value, self.advance_span()))
    }

    fn match_identifier(&mut self) -> Option<(String, Span)> {
        let name = match &self.peek().kind {
            TokenKind::Identifier(name) => name.clone(),
            _ => return None,
        };

        Some((name, self.advance_span()))
    }

    fn match_label(&mut self) -> Option<(String, Span)> {
        let name = match &self.peek().kind {
            TokenKind::Label(name) => name.clone(),
            _ => return None,
        };

        Some((name, self.advance_span()))
    }

    fn match_mnemonic(&mut self) -> Option<(Mnemonic, Span)> {
        let mnemonic = match self.peek().kind {
            TokenKind::Mnemonic(mnemonic) => mnemonic,
            _ => return None,
        };

        Some((mnemonic, self.advance_span()))
    }

    fn match_register(&mut self) -> Option<(Register, Span)> {
        let register = match self.peek().kind {
            TokenKind::Register(register) => register,
            _ => return None,
        };

        Some((register, self.advance_span()))
    }

    fn check_register(&self) -> bool {
        match self.peek().kind {
            TokenKind::Register(_) => true,
            _ => false,
        }
    }

    fn match_directive(&mut self) -> Option<(DataDirective, Span)> {
        let directive = match self.peek().kind {
            TokenKind::Db => DataDirective::Db,
            TokenKind::Dw => DataDirective::Dw,
            TokenKind::Equ => DataDirective::Equ,
            _ => return None,
        };

        Some((directive, self.advance_span()))
    }

    fn match_size(&mut self) -> Option<(OperandSize, Span)> {
        let size = match self.peek().kind {
            TokenKind::Byte => OperandSize::Byte,
            TokenKind::Word => OperandSize::Word,
            _ => return None,
        };

        Some((size, self.advance_span()))
    }

    fn match_sign(&mut self) -> Option<(bool, Span)> {
        let negative = match self.peek().kind {
            TokenKind::Plus => false,
            TokenKind::Minus => true,
            _ => return None,
        };

        Some((negative, self.advance_span()))
    }

    fn check_sign(&self) -> bool {
        match self.peek().kind {
            TokenKind::Plus | TokenKind::Minus => true,
            _ => false,
        }
    }

    fn match_term_operator(&mut self) -> Option<Operator> {
        let operator = match self.peek().kind {
            TokenKind::Plus => Operator::Add,
            TokenKind::Minus => Operator::Subtract,
            _ => return None,
        };

        self.advance_span();
        Some(operator)
    }

    fn end_of_statement(&mut self) -> Result<(), AssemblerError> {
        if self.is_at_end() {
            return Ok(());
        }
        if self.match_token(&TokenKind::Eol).is_some() {
            return Ok(());
        }

        Err(AssemblerError::new(AssemblerErrorKind::ExpectedEndOfStatement)
            .at(self.peek().span.clone()))
    }
}

fn split_label(label: Option<(String, Span)>) -> (Option<String>, Option<Span>) {
    match label {
        Some((name, span)) => (Some(name), Some(span)),
        None => (None, None),
    }
}

/// Finds the reserved word closest to a stray identifier, for a "did you
/// mean" hint. Anything further than two edits away is not worth suggesting.
fn suggest_statement_keyword(name: &str) -> Option<String> {
    let mut best: Option<(usize, &str)> = None;

    let candidates = Mnemonic::ALL
        .iter()
        .map(|mnemonic| mnemonic.name())
        .chain(["DB", "DW", "EQU", "ORG", "END"].iter().copied());

    for candidate in candidates {
        let distance = edit_distance(name, candidate);
        match best {
            Some((shortest, _)) if shortest <= distance => {}
            _ => best = Some((distance, candidate)),
        }
    }

    best.filter(|(distance, _)| *distance <= 2)
        .map(|(_, candidate)| candidate.to_string())
}
