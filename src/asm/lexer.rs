//! The scanner: raw tokens in, classified and spanned tokens out.
//!
//! Scanning stops at the first lexical error. Raw error tokens carry no
//! reason of their own, so the scanner looks back at the source text to
//! decide which diagnostic to raise.

use std::collections::HashMap;

use lazy_static::lazy_static;
use logos::Logos;

use crate::asm::token::{RawToken, ScannedToken, TokenKind};
use crate::error::{AssemblerError, AssemblerErrorKind, Span};

lazy_static! {
    static ref KEYWORDS: HashMap<&'static str, TokenKind> = {
        let mut keywords = HashMap::new();
        keywords.insert("DB", TokenKind::Db);
        keywords.insert("DW", TokenKind::Dw);
        keywords.insert("EQU", TokenKind::Equ);
        keywords.insert("OFFSET", TokenKind::Offset);
        keywords.insert("ORG", TokenKind::Org);
        keywords.insert("BYTE", TokenKind::Byte);
        keywords.insert("WORD", TokenKind::Word);
        keywords.insert("PTR", TokenKind::Ptr);
        keywords.insert("END", TokenKind::End);
        keywords
    };
}

/// Looks up a directive or qualifier keyword. `name` must already be
/// uppercased.
pub fn is_keyword(name: &str) -> Option<TokenKind> {
    KEYWORDS.get(name).cloned()
}

/// Tokenizes a whole source file.
///
/// The returned stream always ends with a single [`TokenKind::Eof`] token
/// whose span is empty and sits past the last byte of the source.
pub fn scan(source: &str) -> Result<Vec<ScannedToken>, AssemblerError> {
    let mut tokens = Vec::new();
    let mut lexer = RawToken::lexer(source);

    while let Some(token) = lexer.next() {
        let span = lexer.span();

        let kind = match token {
            RawToken::Error => return Err(classify_error(source, span)),
            RawToken::Eol => TokenKind::Eol,
            RawToken::LeftParen => TokenKind::LeftParen,
            RawToken::RightParen => TokenKind::RightParen,
            RawToken::LeftBracket => TokenKind::LeftBracket,
            RawToken::RightBracket => TokenKind::RightBracket,
            RawToken::Comma => TokenKind::Comma,
            RawToken::QuestionMark => TokenKind::QuestionMark,
            RawToken::Plus => TokenKind::Plus,
            RawToken::Minus => TokenKind::Minus,
            RawToken::Star => TokenKind::Star,
            RawToken::Number(value) => TokenKind::Number(value),
            RawToken::String(inner) => TokenKind::String(inner.to_string()),
            RawToken::Identifier(name) => TokenKind::classify(name),
            RawToken::Label(name) => match TokenKind::classify(name) {
                TokenKind::Identifier(upper) => TokenKind::Label(upper),
                _ => {
                    // A reserved word cannot be a label, so the colon itself
                    // is the foreign element.
                    let colon = span.end - 1..span.end;
                    return Err(
                        AssemblerError::new(AssemblerErrorKind::UnexpectedCharacter(':'))
                            .at(colon),
                    );
                }
            },
        };

        tokens.push(ScannedToken::new(kind, span));
    }

    let end = source.len();
    tokens.push(ScannedToken::new(TokenKind::Eof, end..end));

    Ok(tokens)
}

/// Derives the diagnostic for a raw error token from the source text at its
/// position.
fn classify_error(source: &str, span: Span) -> AssemblerError {
    let rest = &source[span.start..];

    if rest.starts_with('"') {
        return classify_string_error(source, span.start);
    }

    if rest.starts_with(|ch: char| ch.is_ascii_digit()) {
        // The raw token covers the whole literal; only the radix check of
        // its suffix can have failed.
        let slice = &source[span.clone()];
        let kind = if slice.ends_with('b') || slice.ends_with('B') {
            AssemblerErrorKind::InvalidBinary
        } else {
            AssemblerErrorKind::InvalidDecimal
        };
        return AssemblerError::new(kind).at(span);
    }

    let ch = rest.chars().next().unwrap_or(' ');
    AssemblerError::new(AssemblerErrorKind::UnexpectedCharacter(ch))
        .at(span.start..span.start + ch.len_utf8())
}

/// Walks a broken string literal that starts at `start`. The first character
/// outside the 8-bit range wins over a missing closing quote.
fn classify_string_error(source: &str, start: usize) -> AssemblerError {
    for (offset, ch) in source[start + 1..].char_indices() {
        let position = start + 1 + offset;

        match ch {
            '"' => break,
            '\n' => {
                return AssemblerError::new(AssemblerErrorKind::UnterminatedString)
                    .at(start..position)
            }
            _ if ch as u32 > 255 => {
                return AssemblerError::new(AssemblerErrorKind::OnlyAscii)
                    .at(position..position + ch.len_utf8())
            }
            _ => {}
        }
    }

    AssemblerError::new(AssemblerErrorKind::UnterminatedString).at(start..source.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Mnemonic, Register};

    fn kinds(source: &str) -> Vec<TokenKind> {
        scan(source)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    fn error(source: &str) -> AssemblerError {
        scan(source).unwrap_err()
    }

    #[test]
    fn a_simple_statement() {
        assert_eq!(
            kinds("mov ax, 5"),
            vec![
                TokenKind::Mnemonic(Mnemonic::Mov),
                TokenKind::Register(Register::AX),
                TokenKind::Comma,
                TokenKind::Number(5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn identifiers_are_uppercased() {
        assert_eq!(
            kinds("valor db 24"),
            vec![
                TokenKind::Identifier("VALOR".to_string()),
                TokenKind::Db,
                TokenKind::Number(24),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_win_over_identifiers() {
        assert_eq!(
            kinds("org offset end"),
            vec![
                TokenKind::Org,
                TokenKind::Offset,
                TokenKind::End,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn labels_are_split_from_their_colon() {
        assert_eq!(
            kinds("loop: hlt"),
            vec![
                TokenKind::Label("LOOP".to_string()),
                TokenKind::Mnemonic(Mnemonic::Hlt),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn reserved_words_cannot_be_labels() {
        let error = error("mov: hlt");

        assert_eq!(
            error.kind,
            AssemblerErrorKind::UnexpectedCharacter(':')
        );
        assert_eq!(error.span, Some(3..4));
    }

    #[test]
    fn the_quirky_hex_spelling() {
        // Without the leading digit the literal is just a name.
        assert_eq!(
            kinds("0FFh FFh"),
            vec![
                TokenKind::Number(0xFF),
                TokenKind::Identifier("FFH".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn broken_number_literals() {
        assert_eq!(error("10210b").kind, AssemblerErrorKind::InvalidBinary);
        assert_eq!(error("10210b").span, Some(0..6));
        assert_eq!(error("12f").kind, AssemblerErrorKind::InvalidDecimal);
    }

    #[test]
    fn oversized_literals_saturate_instead_of_failing() {
        assert_eq!(
            kinds("123456789ABCDEF123456789h"),
            vec![TokenKind::Number(u32::MAX), TokenKind::Eof]
        );
    }

    #[test]
    fn string_handling() {
        assert_eq!(
            kinds("db \"ab, cd\""),
            vec![
                TokenKind::Db,
                TokenKind::String("ab, cd".to_string()),
                TokenKind::Eof,
            ]
        );

        assert_eq!(error("db \"ab").kind, AssemblerErrorKind::UnterminatedString);
        assert_eq!(error("db \"ab\nend").span, Some(3..6));
        assert_eq!(error("db \"a€b\"").kind, AssemblerErrorKind::OnlyAscii);
        // The bad character is reported even if the quote is never closed.
        assert_eq!(error("db \"a€b").kind, AssemblerErrorKind::OnlyAscii);
    }

    #[test]
    fn the_first_error_stops_the_scan() {
        assert_eq!(error("12f\n@").kind, AssemblerErrorKind::InvalidDecimal);
    }

    #[test]
    fn unexpected_characters() {
        assert_eq!(error("#").kind, AssemblerErrorKind::UnexpectedCharacter('#'));
        assert_eq!(error("mov ax, &5").span, Some(8..9));
    }

    #[test]
    fn eof_is_always_appended() {
        let tokens = scan("").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
        assert_eq!(tokens[0].span, 0..0);
    }
}
