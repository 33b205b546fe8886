//! Source file metadata carried in `;;` comments.
//!
//! A line of the form `;; key = value` is an ordinary comment to the
//! assembler, but tools can read it to learn things the program wants from
//! its environment, such as which device configuration to attach. Keys are
//! case insensitive and a key repeated later in the file replaces the
//! earlier value.

use std::collections::HashMap;

use nom::{
    bytes::complete::{tag, take_while, take_while1},
    character::complete::char,
    combinator::rest,
    sequence::{delimited, pair, preceded, separated_pair},
    IResult,
};

type Result<'a, T> = IResult<&'a str, T>;

/// Value of one metadata key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Bool(bool),
    Null,
    Text(String),
}

impl MetadataValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

fn sp(input: &str) -> Result<&str> {
    take_while(|c| c == ' ' || c == '\t')(input)
}

fn key(input: &str) -> Result<&str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-')(input)
}

fn metadata_line(input: &str) -> Result<(&str, &str)> {
    preceded(
        pair(tag(";;"), sp),
        separated_pair(key, delimited(sp, char('='), sp), rest),
    )(input)
}

fn classify(raw: &str) -> MetadataValue {
    let trimmed = raw.trim();

    match trimmed.to_ascii_lowercase().as_str() {
        "yes" | "true" => MetadataValue::Bool(true),
        "no" | "false" => MetadataValue::Bool(false),
        "" | "null" => MetadataValue::Null,
        _ => MetadataValue::Text(trimmed.to_string()),
    }
}

/// Collects every metadata line of a source file.
pub fn extract(source: &str) -> HashMap<String, MetadataValue> {
    let mut metadata = HashMap::new();

    for line in source.lines() {
        if let Ok((_, (key, raw))) = metadata_line(line.trim_start()) {
            metadata.insert(key.to_ascii_lowercase(), classify(raw));
        }
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_and_values_are_extracted() {
        let metadata = extract(";; devices = handshake\n;; author = someone\norg 2000h\nend");

        assert_eq!(
            metadata.get("devices"),
            Some(&MetadataValue::Text("handshake".to_string()))
        );
        assert_eq!(
            metadata.get("author"),
            Some(&MetadataValue::Text("someone".to_string()))
        );
        assert_eq!(metadata.len(), 2);
    }

    #[test]
    fn booleans_and_null_are_recognized() {
        let metadata = extract(";; a = yes\n;; b = False\n;; c =\n;; d = null");

        assert_eq!(metadata.get("a"), Some(&MetadataValue::Bool(true)));
        assert_eq!(metadata.get("b"), Some(&MetadataValue::Bool(false)));
        assert_eq!(metadata.get("c"), Some(&MetadataValue::Null));
        assert_eq!(metadata.get("d"), Some(&MetadataValue::Null));
    }

    #[test]
    fn later_lines_replace_earlier_ones() {
        let metadata = extract(";; devices = pio\n;; devices = handshake");

        assert_eq!(
            metadata.get("devices"),
            Some(&MetadataValue::Text("handshake".to_string()))
        );
    }

    #[test]
    fn ordinary_comments_are_not_metadata() {
        let metadata = extract("; devices = pio\nmov ax, bx ;; devices = pio\n;; note without equals");

        assert!(metadata.is_empty());
    }

    #[test]
    fn keys_are_case_insensitive() {
        let metadata = extract(";; Devices = pio");

        assert_eq!(
            metadata.get("devices"),
            Some(&MetadataValue::Text("pio".to_string()))
        );
    }
}
