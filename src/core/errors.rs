//! TSDL error types - rich, position-tracked parse and semantic errors.
//!
//! `ParseError` is the single error type the public API returns. It carries
//! the offending byte offset and a copy of the source text so that `Display`
//! can render an instructional snippet the way a hand-rolled recursive-
//! descent parser's diagnostics usually do.

use crate::core::hint_engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The semantic category of a parse failure.
///
/// Kept as data (not just a message) so callers - and tests - can match on
/// *why* a parse failed rather than grep the message text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParseErrorKind {
    SyntaxError(String),
    UnresolvedAlias(String),
    UnresolvedStruct(String),
    UnresolvedVariant(String),
    MissingRequired(String),
    InvalidByteOrder(String),
    InvalidBase(String),
    InvalidEncoding(String),
    InvalidClockMap,
    InvalidUuid(String),
    InvalidBoolean(String),
    DuplicateClock(String),
    DuplicateStream(u64),
    DuplicateEvent { stream_id: u64, detail: String },
    DuplicateEnumLabel(String),
    InvalidEnumRange { low: i64, high: i64 },
    UnknownStream(u64),
    NoClocks,
    NoStreams,
    NotAStruct(String),
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::SyntaxError(detail) => write!(f, "syntax error: {detail}"),
            ParseErrorKind::UnresolvedAlias(name) => write!(f, "unresolved alias `{name}`"),
            ParseErrorKind::UnresolvedStruct(name) => write!(f, "unresolved struct `{name}`"),
            ParseErrorKind::UnresolvedVariant(name) => write!(f, "unresolved variant `{name}`"),
            ParseErrorKind::MissingRequired(what) => write!(f, "missing required value `{what}`"),
            ParseErrorKind::InvalidByteOrder(v) => write!(f, "invalid byte_order `{v}`"),
            ParseErrorKind::InvalidBase(v) => write!(f, "invalid base `{v}`"),
            ParseErrorKind::InvalidEncoding(v) => write!(f, "invalid encoding `{v}`"),
            ParseErrorKind::InvalidClockMap => {
                write!(f, "invalid clock map: first path component must be `clock`")
            }
            ParseErrorKind::InvalidUuid(v) => write!(f, "invalid uuid `{v}`"),
            ParseErrorKind::InvalidBoolean(v) => write!(f, "invalid boolean `{v}`"),
            ParseErrorKind::DuplicateClock(name) => write!(f, "duplicate clock `{name}`"),
            ParseErrorKind::DuplicateStream(id) => write!(f, "duplicate stream id {id}"),
            ParseErrorKind::DuplicateEvent { stream_id, detail } => {
                write!(f, "duplicate event ({detail}) in stream {stream_id}")
            }
            ParseErrorKind::DuplicateEnumLabel(label) => {
                write!(f, "duplicate enum label `{label}`")
            }
            ParseErrorKind::InvalidEnumRange { low, high } => {
                write!(f, "invalid enum range: low {low} > high {high}")
            }
            ParseErrorKind::UnknownStream(id) => write!(f, "event refers to unknown stream {id}"),
            ParseErrorKind::NoClocks => write!(f, "document has no clocks"),
            ParseErrorKind::NoStreams => write!(f, "document has no streams"),
            ParseErrorKind::NotAStruct(field) => {
                write!(f, "`{field}` must be a structure type")
            }
        }
    }
}

/// A rich parse/semantic error with position tracking and an instructional hint.
///
/// Mirrors the shape of a hand-rolled recursive-descent parser's error type:
/// message, byte offset, a copy of the source for context rendering, and an
/// optional beginner-friendly hint produced by [`hint_engine`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub pos: usize,
    pub text: String,
    pub hint: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, pos: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let message = kind.to_string();
        let hint = hint_engine::get_hint(&kind);
        ParseError {
            kind,
            message,
            pos,
            text,
            hint,
        }
    }

    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// Render the error with a line/column pointer and hint, the way a
    /// diagnostic-friendly parser reports failures to a terminal.
    fn format_error(&self) -> String {
        if self.text.is_empty() {
            return format!("{} at position {}", self.message, self.pos);
        }

        let lines: Vec<&str> = self.text.lines().collect();
        let mut current_pos = 0;
        let mut line_num = 1;
        let mut line_text = "";
        let mut col = self.pos;
        let mut found = false;

        for (i, line) in lines.iter().enumerate() {
            let line_len = line.len() + 1;
            if current_pos + line_len > self.pos {
                line_num = i + 1;
                line_text = line;
                col = self.pos - current_pos;
                found = true;
                break;
            }
            current_pos += line_len;
        }

        if !found {
            if let Some(last) = lines.last() {
                line_num = lines.len();
                line_text = last;
                col = last.len();
            } else {
                line_text = &self.text;
                col = self.pos;
            }
        }

        let mut parts = vec![
            format!("TSDL parse error: {}", self.message),
            String::new(),
            format!("> {line_num} | {line_text}"),
            format!(">   | {}^", " ".repeat(col)),
        ];

        if let Some(ref hint) = self.hint {
            parts.push(String::new());
            parts.push(format!("Hint: {hint}"));
        }

        parts.join("\n")
    }

    pub fn to_formatted_string(&self) -> String {
        self.format_error()
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_error())
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_line_and_caret() {
        let err = ParseError::new(
            ParseErrorKind::SyntaxError("expected `;`".to_string()),
            6,
            "trace { }\nstream {};",
        );
        let formatted = err.to_formatted_string();
        assert!(formatted.contains("TSDL parse error"));
        assert!(formatted.contains("trace { }"));
        assert!(formatted.contains('^'));
    }

    #[test]
    fn missing_required_mentions_field() {
        let err = ParseError::new(
            ParseErrorKind::MissingRequired("size".into()),
            0,
            "integer {}",
        );
        assert!(err.message.contains("size"));
    }
}
