//! Token definitions for the assembly language.
//!
//! [`RawToken`] is the raw [logos] layer. The scanner in
//! [`lexer`](crate::asm::lexer) turns it into [`ScannedToken`]s, classifying
//! identifiers into keywords and attaching source spans.

use logos::{Lexer, Logos};

use std::fmt;

use crate::asm::lexer::is_keyword;
use crate::instruction::{Mnemonic, Register};

/// Raw tokens as matched directly over the source text.
///
/// Spaces, tabs and comments are skipped; newlines are significant and become
/// [`RawToken::Eol`]. Anything unmatchable surfaces as [`RawToken::Error`] and
/// is turned into a diagnostic by the scanner.
#[derive(Logos, Debug, PartialEq, Clone)]
pub enum RawToken<'a> {
    #[error]
    #[regex(r"[ \t\r]+", logos::skip)]
    #[regex(r";[^\n]*", logos::skip)]
    Error,

    #[token("\n")]
    Eol,

    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    #[token("[")]
    LeftBracket,

    #[token("]")]
    RightBracket,

    #[token(",")]
    Comma,

    #[token("?")]
    QuestionMark,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    /// A number in decimal, binary (`B` suffix) or hexadecimal (`H` suffix).
    ///
    /// The pattern is wider than any single radix so that the whole literal
    /// always forms one token; the callback decides its radix from the suffix
    /// and rejects digits that do not belong to it.
    #[regex(r"[0-9][0-9a-fA-F]*[hH]?", number_callback)]
    Number(u32),

    /// A string literal without its quotes. May not span lines.
    #[regex("\"[^\"\n]*\"", string_callback)]
    String(&'a str),

    /// An identifier, still unclassified. The scanner decides whether it is a
    /// keyword, a register, a mnemonic or a user-defined name.
    #[regex("[a-zA-Z_][a-zA-Z0-9_]*", Lexer::slice)]
    Identifier(&'a str),

    /// A label definition. The name is kept without the trailing colon.
    #[regex("[a-zA-Z_][a-zA-Z0-9_]*:", label_callback)]
    Label(&'a str),
}

fn number_callback<'a>(lex: &mut Lexer<'a, RawToken<'a>>) -> Result<u32, ()> {
    let slice = lex.slice();

    let (digits, radix) = if slice.ends_with('h') || slice.ends_with('H') {
        (&slice[..slice.len() - 1], 16)
    } else if slice.ends_with('b') || slice.ends_with('B') {
        let digits = &slice[..slice.len() - 1];
        if !digits.bytes().all(|byte| byte == b'0' || byte == b'1') {
            return Err(());
        }
        (digits, 2)
    } else {
        if !slice.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(());
        }
        (slice, 10)
    };

    // The digits are already known to be valid for the radix, so the only
    // possible failure is overflow. Saturate and let the range checks on the
    // consuming side report it.
    Ok(u64::from_str_radix(digits, radix)
        .map(|value| value.min(u64::from(u32::MAX)) as u32)
        .unwrap_or(u32::MAX))
}

fn string_callback<'a>(lex: &mut Lexer<'a, RawToken<'a>>) -> Result<&'a str, ()> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];

    if inner.chars().any(|ch| ch as u32 > 255) {
        return Err(());
    }

    Ok(inner)
}

fn label_callback<'a>(lex: &mut Lexer<'a, RawToken<'a>>) -> &'a str {
    let slice = lex.slice();
    &slice[..slice.len() - 1]
}

/// A classified token. This is the vocabulary the parser works with.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Eol,
    Eof,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    QuestionMark,
    Plus,
    Minus,
    Star,
    Number(u32),
    String(String),
    /// A user-defined name, uppercased.
    Identifier(String),
    /// A label definition, uppercased, without the colon.
    Label(String),
    Mnemonic(Mnemonic),
    Register(Register),
    Db,
    Dw,
    Equ,
    Offset,
    Org,
    Byte,
    Word,
    Ptr,
    End,
}

impl TokenKind {
    /// Classifies an identifier: keywords first, then registers and
    /// mnemonics, and only then a user-defined name.
    pub fn classify(identifier: &str) -> TokenKind {
        let upper = identifier.to_uppercase();

        if let Some(keyword) = is_keyword(&upper) {
            return keyword;
        }

        if let Ok(register) = upper.parse() {
            return TokenKind::Register(register);
        }

        if let Ok(mnemonic) = upper.parse() {
            return TokenKind::Mnemonic(mnemonic);
        }

        TokenKind::Identifier(upper)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::Eol => write!(f, "the end of the line"),
            TokenKind::Eof => write!(f, "the end of the program"),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::LeftBracket => write!(f, "["),
            TokenKind::RightBracket => write!(f, "]"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::QuestionMark => write!(f, "?"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Number(value) => write!(f, "{}", value),
            TokenKind::String(value) => write!(f, "\"{}\"", value),
            TokenKind::Identifier(name) => write!(f, "{}", name),
            TokenKind::Label(name) => write!(f, "{}:", name),
            TokenKind::Mnemonic(mnemonic) => write!(f, "{}", mnemonic),
            TokenKind::Register(register) => write!(f, "{}", register),
            TokenKind::Db => write!(f, "DB"),
            TokenKind::Dw => write!(f, "DW"),
            TokenKind::Equ => write!(f, "EQU"),
            TokenKind::Offset => write!(f, "OFFSET"),
            TokenKind::Org => write!(f, "ORG"),
            TokenKind::Byte => write!(f, "BYTE"),
            TokenKind::Word => write!(f, "WORD"),
            TokenKind::Ptr => write!(f, "PTR"),
            TokenKind::End => write!(f, "END"),
        }
    }
}

/// A classified token together with the byte span it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedToken {
    pub kind: TokenKind,
    pub span: crate::error::Span,
}

impl ScannedToken {
    pub fn new(kind: TokenKind, span: crate::error::Span) -> ScannedToken {
        ScannedToken { kind, span }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radix_suffixes() {
        let mut lexer = RawToken::lexer("128 1010b 0F7h 20H");

        assert_eq!(lexer.next(), Some(RawToken::Number(128)));
        assert_eq!(lexer.next(), Some(RawToken::Number(0b1010)));
        assert_eq!(lexer.next(), Some(RawToken::Number(0xF7)));
        assert_eq!(lexer.next(), Some(RawToken::Number(0x20)));
        assert_eq!(lexer.next(), None);
    }

    #[test]
    fn hex_literals_need_a_leading_digit() {
        let mut lexer = RawToken::lexer("FFh 0FFh");

        assert_eq!(lexer.next(), Some(RawToken::Identifier("FFh")));
        assert_eq!(lexer.next(), Some(RawToken::Number(0xFF)));
    }

    #[test]
    fn stray_digits_poison_the_whole_literal() {
        let mut lexer = RawToken::lexer("12f");
        assert_eq!(lexer.next(), Some(RawToken::Error));

        let mut lexer = RawToken::lexer("10210b");
        assert_eq!(lexer.next(), Some(RawToken::Error));
    }

    #[test]
    fn labels_keep_their_name_only() {
        let mut lexer = RawToken::lexer("loop: nop");

        assert_eq!(lexer.next(), Some(RawToken::Label("loop")));
        assert_eq!(lexer.next(), Some(RawToken::Identifier("nop")));
    }

    #[test]
    fn comments_are_skipped_but_newlines_are_not() {
        let mut lexer = RawToken::lexer("hlt ; stop here\nhlt");

        assert_eq!(lexer.next(), Some(RawToken::Identifier("hlt")));
        assert_eq!(lexer.next(), Some(RawToken::Eol));
        assert_eq!(lexer.next(), Some(RawToken::Identifier("hlt")));
        assert_eq!(lexer.next(), None);
    }
}
