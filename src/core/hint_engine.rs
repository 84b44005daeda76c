//! Context-aware instructional hints for TSDL parse errors.
//!
//! Maps a [`ParseErrorKind`](crate::core::errors::ParseErrorKind) to a short
//! hint string explaining how to fix it. Kept deliberately small: only the
//! mistakes that are ambiguous from the bare error message get a hint.

use crate::core::errors::ParseErrorKind;

pub fn get_hint(kind: &ParseErrorKind) -> Option<String> {
    match kind {
        ParseErrorKind::MissingRequired(field) => Some(format!(
            "This declaration is missing its required `{field}` assignment."
        )),
        ParseErrorKind::InvalidByteOrder(_) => Some(
            "Valid byte_order values are: native, le, be, network (network is an alias for be)."
                .to_string(),
        ),
        ParseErrorKind::InvalidBase(_) => Some(
            "Valid base values are 2, 8, 10, 16, or one of their names (bin, oct, dec, hex, ...)."
                .to_string(),
        ),
        ParseErrorKind::InvalidEncoding(_) => {
            Some("Valid encoding values are: none, UTF8, ASCII.".to_string())
        }
        ParseErrorKind::InvalidClockMap => Some(
            "A `map` path must start with `clock`, e.g. `map = clock.monotonic.value;`."
                .to_string(),
        ),
        ParseErrorKind::InvalidUuid(_) => {
            Some("A uuid must be a quoted string in canonical 8-4-4-4-12 hex form.".to_string())
        }
        ParseErrorKind::InvalidBoolean(_) => {
            Some("Valid boolean values are: true, false, 1, 0.".to_string())
        }
        ParseErrorKind::UnresolvedAlias(name) => Some(format!(
            "No `typealias ... := {name};` is visible from this scope; check spelling and nesting."
        )),
        ParseErrorKind::UnresolvedStruct(name) => Some(format!(
            "No `struct {name} {{ ... }}` is visible from this scope."
        )),
        ParseErrorKind::UnresolvedVariant(name) => Some(format!(
            "No `variant {name} ...` is visible from this scope."
        )),
        ParseErrorKind::InvalidEnumRange { .. } => {
            Some("An enumerator range's low bound must not exceed its high bound.".to_string())
        }
        ParseErrorKind::UnknownStream(id) => Some(format!(
            "No `stream {{ id = {id}; ... }}` was declared before this event."
        )),
        ParseErrorKind::NoClocks => {
            Some("Declare at least one `clock {{ name = ...; freq = ...; }}` block.".to_string())
        }
        ParseErrorKind::NoStreams => Some("Declare at least one `stream {}` block.".to_string()),
        ParseErrorKind::NotAStruct(field) => Some(format!(
            "`{field}` must be assigned a `struct {{ ... }}` type, not a scalar or other constructor."
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_hint_names_field() {
        let hint = get_hint(&ParseErrorKind::MissingRequired("freq".into())).unwrap();
        assert!(hint.contains("freq"));
    }

    #[test]
    fn syntax_error_has_no_hint() {
        assert!(get_hint(&ParseErrorKind::SyntaxError("expected `;`".into())).is_none());
    }
}
