//! Assembling source text into executable programs.
//!
//! The assembler runs in phases: scanning, parsing, label collection,
//! operand validation, address layout and encoding. Scanning and parsing
//! stop at the first problem; every later phase checks all statements and
//! reports its errors together, so a listing with three bad operands gets
//! three diagnostics in one run.

mod ast;
mod encoder;
mod lexer;
pub mod metadata;
mod parser;
mod store;
mod token;

use slog::{debug, o, trace, Discard, Logger};

use crate::asm::ast::{DataDirective, Statement};
use crate::asm::store::GlobalStore;
use crate::error::{AssemblerError, AssemblerErrorKind};
use crate::program::{Program, Symbol};

/// Assembles a source file into a [`Program`] ready to load into memory.
///
/// On failure, returns every error of the phase that failed.
pub fn assemble(source: &str) -> Result<Program, Vec<AssemblerError>> {
    assemble_with_logger(source, None)
}

/// Like [`assemble`], with progress reported to `logger`.
pub fn assemble_with_logger<L>(source: &str, logger: L) -> Result<Program, Vec<AssemblerError>>
where
    L: Into<Option<Logger>>,
{
    let logger = logger
        .into()
        .unwrap_or(Logger::root(Discard, o!()))
        .new(o!("stage" => "assembly"));

    let tokens = lexer::scan(source).map_err(|error| vec![error])?;
    trace!(logger, "scanned source"; "tokens" => tokens.len());

    let statements = parser::parse(tokens).map_err(|error| vec![error])?;
    trace!(logger, "parsed statements"; "statements" => statements.len());

    match statements.last() {
        Some(Statement::End { .. }) => {}
        Some(other) => {
            return Err(vec![AssemblerError::new(
                AssemblerErrorKind::EndMustBeLastStatement,
            )
            .at(other.span().clone())])
        }
        None => {
            return Err(vec![AssemblerError::new(AssemblerErrorKind::EmptyProgram)]);
        }
    }

    let mut store = GlobalStore::new();

    let errors = store.load_statements(&statements);
    if !errors.is_empty() {
        return Err(errors);
    }
    trace!(logger, "collected labels");

    let mut pending = encoder::validate(&statements, &store)?;
    trace!(logger, "validated operands"; "pending" => pending.len());

    let errors = encoder::compute_addresses(&mut pending, &mut store);
    if !errors.is_empty() {
        return Err(errors);
    }
    trace!(logger, "assigned addresses");

    let (data, instructions) = encoder::encode(pending, &mut store)?;
    let symbols = collect_symbols(&statements, &mut store)?;

    debug!(
        logger,
        "assembly finished";
        "data" => data.len(),
        "instructions" => instructions.len(),
        "symbols" => symbols.len()
    );

    Ok(Program::new(data, instructions, symbols))
}

/// Builds the symbol listing in source order. Constants that were never
/// referenced by an operand get evaluated here, so a broken definition is
/// an error even when unused.
fn collect_symbols(
    statements: &[Statement],
    store: &mut GlobalStore,
) -> Result<Vec<Symbol>, Vec<AssemblerError>> {
    let mut symbols = Vec::new();
    let mut errors = Vec::new();

    for statement in statements {
        let name = match statement.label() {
            Some(name) => name,
            None => continue,
        };

        match statement {
            Statement::Data {
                directive: DataDirective::Equ,
                span,
                ..
            } => match store.constant_value(name, span) {
                Ok(value) => symbols.push(Symbol::Constant {
                    name: name.to_string(),
                    value,
                }),
                Err(error) => errors.push(error),
            },
            Statement::Data { directive, .. } => {
                if let (Some(address), Some(size)) = (store.label_address(name), directive.size()) {
                    symbols.push(Symbol::Data {
                        name: name.to_string(),
                        address,
                        size,
                    });
                }
            }
            Statement::Instruction { .. } => {
                if let Some(address) = store.label_address(name) {
                    symbols.push(Symbol::Instruction {
                        name: name.to_string(),
                        address,
                    });
                }
            }
            _ => {}
        }
    }

    if errors.is_empty() {
        Ok(symbols)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::OperandSize;

    #[test]
    fn empty_source_is_rejected() {
        let errors = assemble("").unwrap_err();
        assert_eq!(errors[0].kind, AssemblerErrorKind::EmptyProgram);
        assert_eq!(errors[0].span, None);

        let errors = assemble("; a comment\n\n").unwrap_err();
        assert_eq!(errors[0].kind, AssemblerErrorKind::EmptyProgram);
    }

    #[test]
    fn programs_must_close_with_end() {
        let errors = assemble("org 2000h\nhlt").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, AssemblerErrorKind::EndMustBeLastStatement);
    }

    #[test]
    fn scan_and_parse_errors_arrive_alone() {
        let errors = assemble("org 2000h\nmov ax, @\nend").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, AssemblerErrorKind::UnexpectedCharacter('@'));
    }

    #[test]
    fn each_bad_statement_gets_its_own_error() {
        let errors = assemble("org 2000h\nmov ax, bl\nmov cl, dx\nadd ax, bl\nend").unwrap_err();

        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .all(|error| error.kind == AssemblerErrorKind::SizeMismatch { src: 8, out: 16 }
                || error.kind == AssemblerErrorKind::SizeMismatch { src: 16, out: 8 }));
    }

    #[test]
    fn symbols_list_every_label_in_source_order() {
        let program = assemble("n equ 5\norg 1000h\nx db 1\norg 2000h\nstart: hlt\nend").unwrap();

        assert_eq!(
            program.symbols,
            vec![
                Symbol::Constant {
                    name: "N".to_string(),
                    value: 5,
                },
                Symbol::Data {
                    name: "X".to_string(),
                    address: 0x1000,
                    size: OperandSize::Byte,
                },
                Symbol::Instruction {
                    name: "START".to_string(),
                    address: 0x2000,
                },
            ]
        );
    }

    #[test]
    fn unused_but_broken_constants_still_fail() {
        let errors = assemble("a equ a\norg 2000h\nhlt\nend").unwrap_err();
        assert_eq!(errors[0].kind, AssemblerErrorKind::CircularReference);
    }

    #[test]
    fn a_full_program_assembles() {
        let program = assemble(
            "org 1000h\nmsg db \"ok\"\norg 2000h\nmov bx, offset msg\nmov al, 2\nhlt\nend",
        )
        .unwrap();

        assert_eq!(program.data.len(), 1);
        assert_eq!(program.instructions.len(), 3);
        assert!(program.instruction_at(0x2000).is_some());
        assert!(program.instruction_at(0x2001).is_none());
    }
}
