//! Pass 2: document materialization.
//!
//! Walks the scope-resolved tree from [`crate::core::resolver`] and attaches
//! concrete semantics to every `key = value;` pair: defaults, alias tables
//! (`byte_order`, `base`, `encoding`), enumerator auto-increment, and the
//! finalization invariants (at least one clock, at least one stream, no
//! duplicate names/ids, every event's `stream_id` names a declared stream).
//!
//! Every dispatch here is a `match` on `(parent, key)` - there is no
//! "unknown key falls through to the previous branch" behavior the way a
//! chain of `if`s can accidentally produce.

use indexmap::IndexMap;
use log::{debug, trace};
use uuid::Uuid;

use crate::core::ast::{Assignment, EnumeratorKind};
use crate::core::document::*;
use crate::core::errors::{ParseError, ParseErrorKind};
use crate::core::expr::Expr;
use crate::core::resolver::{
    ResolvedScopeBlock, ResolvedScopeEntry, ResolvedTopLevel, ResolvedType,
};

pub fn materialize(resolved: &ResolvedTopLevel) -> Result<Doc, ParseError> {
    let mut trace: Option<Trace> = None;
    let mut env: Option<Env> = None;
    let mut clocks: IndexMap<String, Clock> = IndexMap::new();
    let mut streams: IndexMap<u64, Stream> = IndexMap::new();
    let mut pending_events: Vec<Event> = Vec::new();

    for block in &resolved.blocks {
        match block {
            ResolvedScopeBlock::Trace(entries) => {
                trace = Some(materialize_trace(entries)?);
            }
            ResolvedScopeBlock::Env(entries) => {
                env = Some(materialize_env(entries));
            }
            ResolvedScopeBlock::Clock(entries) => {
                let clock = materialize_clock(entries)?;
                if clocks.contains_key(&clock.name) {
                    return Err(err(ParseErrorKind::DuplicateClock(clock.name.clone())));
                }
                clocks.insert(clock.name.clone(), clock);
            }
            ResolvedScopeBlock::Stream(entries) => {
                let stream = materialize_stream(entries)?;
                if streams.contains_key(&stream.id) {
                    return Err(err(ParseErrorKind::DuplicateStream(stream.id)));
                }
                streams.insert(stream.id, stream);
            }
            ResolvedScopeBlock::Event(entries) => {
                pending_events.push(materialize_event(entries)?);
            }
        }
    }

    for event in pending_events {
        let stream = streams
            .get_mut(&event.stream_id)
            .ok_or_else(|| err(ParseErrorKind::UnknownStream(event.stream_id)))?;
        if stream.events.contains_key(&event.id) {
            return Err(err(ParseErrorKind::DuplicateEvent {
                stream_id: event.stream_id,
                detail: format!("id {}", event.id),
            }));
        }
        if stream.by_name.contains_key(&event.name) {
            return Err(err(ParseErrorKind::DuplicateEvent {
                stream_id: event.stream_id,
                detail: format!("name {}", event.name),
            }));
        }
        stream.by_name.insert(event.name.clone(), event.id);
        stream.events.insert(event.id, event);
    }

    if clocks.is_empty() {
        return Err(err(ParseErrorKind::NoClocks));
    }
    if streams.is_empty() {
        return Err(err(ParseErrorKind::NoStreams));
    }

    debug!(
        "materialized document: {} clock(s), {} stream(s)",
        clocks.len(),
        streams.len()
    );
    Ok(Doc {
        trace,
        env,
        clocks,
        streams,
    })
}

fn err(kind: ParseErrorKind) -> ParseError {
    ParseError::new(kind, 0, String::new())
}

/// A type assignment (`dotted.path := type;`) keyed by its joined path, e.g.
/// `"packet.header"` or `"fields"`.
struct TypeAssign<'a> {
    path: &'a [String],
    type_node: &'a ResolvedType,
}

fn split<'a>(
    entries: &'a [ResolvedScopeEntry],
) -> (Vec<&'a Assignment>, Vec<TypeAssign<'a>>) {
    let mut assignments = Vec::new();
    let mut types = Vec::new();
    for entry in entries {
        match entry {
            ResolvedScopeEntry::Assignment(a) => assignments.push(a),
            ResolvedScopeEntry::TypeAssign { path, type_node } => {
                types.push(TypeAssign { path, type_node })
            }
        }
    }
    (assignments, types)
}

fn find<'a>(assignments: &[&'a Assignment], key: &str) -> Option<&'a Expr> {
    assignments
        .iter()
        .find(|a| a.key == key)
        .map(|a| &a.value)
}

/// Look up a type assignment by its dotted key, e.g. `find_type(&types,
/// &["packet", "header"])` matches `packet.header := ...;`.
fn find_type<'a>(types: &[TypeAssign<'a>], key: &[&str]) -> Option<&'a ResolvedType> {
    types
        .iter()
        .find(|t| t.path.len() == key.len() && t.path.iter().map(String::as_str).eq(key.iter().copied()))
        .map(|t| t.type_node)
}

fn missing(key: &str) -> ParseError {
    err(ParseErrorKind::MissingRequired(key.to_string()))
}

fn expr_as_u32(expr: &Expr, key: &str) -> Result<u32, ParseError> {
    expr.as_const_integer()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| missing(key))
}

fn expr_as_i64(expr: &Expr, key: &str) -> Result<i64, ParseError> {
    expr.as_const_integer().ok_or_else(|| missing(key))
}

fn expr_as_u64(expr: &Expr, key: &str) -> Result<u64, ParseError> {
    expr.as_const_integer()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| missing(key))
}

fn expr_as_word(expr: &Expr) -> Option<String> {
    expr.as_ident()
        .map(|s| s.to_string())
        .or_else(|| expr.as_str_literal().map(|s| s.to_string()))
}

fn expr_as_bool(expr: &Expr, key: &str) -> Result<bool, ParseError> {
    if let Some(n) = expr.as_const_integer() {
        return Ok(n != 0);
    }
    match expr_as_word(expr).as_deref() {
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(err(ParseErrorKind::InvalidBoolean(other.to_string()))),
        None => Err(missing(key)),
    }
}

fn interpret_byte_order(expr: &Expr) -> Result<ByteOrder, ParseError> {
    let word = expr_as_word(expr).ok_or_else(|| missing("byte_order"))?;
    match word.as_str() {
        "native" => Ok(ByteOrder::Native),
        "le" | "little_endian" => Ok(ByteOrder::LittleEndian),
        "be" | "big_endian" | "network" => Ok(ByteOrder::BigEndian),
        other => Err(err(ParseErrorKind::InvalidByteOrder(other.to_string()))),
    }
}

fn interpret_base(expr: &Expr) -> Result<Base, ParseError> {
    if let Some(n) = expr.as_const_integer() {
        return match n {
            2 => Ok(Base::Binary),
            8 => Ok(Base::Octal),
            10 => Ok(Base::Decimal),
            16 => Ok(Base::Hexadecimal),
            other => Err(err(ParseErrorKind::InvalidBase(other.to_string()))),
        };
    }
    let word = expr_as_word(expr).ok_or_else(|| missing("base"))?;
    match word.as_str() {
        "decimal" | "dec" | "d" | "i" | "u" => Ok(Base::Decimal),
        "hexadecimal" | "hex" | "x" | "X" | "p" => Ok(Base::Hexadecimal),
        "octal" | "oct" | "o" => Ok(Base::Octal),
        "binary" | "bin" | "b" => Ok(Base::Binary),
        other => Err(err(ParseErrorKind::InvalidBase(other.to_string()))),
    }
}

fn interpret_encoding(expr: &Expr) -> Result<Encoding, ParseError> {
    let word = expr_as_word(expr).ok_or_else(|| missing("encoding"))?;
    match word.as_str() {
        "none" | "None" => Ok(Encoding::None),
        "UTF8" | "utf8" => Ok(Encoding::Utf8),
        "ASCII" | "ascii" => Ok(Encoding::Ascii),
        other => Err(err(ParseErrorKind::InvalidEncoding(other.to_string()))),
    }
}

fn interpret_uuid(expr: &Expr) -> Result<Uuid, ParseError> {
    let text = expr.as_str_literal().ok_or_else(|| missing("uuid"))?;
    Uuid::parse_str(text).map_err(|_| err(ParseErrorKind::InvalidUuid(text.to_string())))
}

/// `map = clock.<name>.<field>;` - the first path component must be the
/// literal `clock`.
fn interpret_clock_map(expr: &Expr) -> Result<Vec<String>, ParseError> {
    let path = expr
        .as_dotted_path()
        .ok_or_else(|| err(ParseErrorKind::InvalidClockMap))?;
    if path.first().map(String::as_str) != Some("clock") {
        return Err(err(ParseErrorKind::InvalidClockMap));
    }
    Ok(path)
}

fn materialize_type(rt: &ResolvedType) -> Result<Type, ParseError> {
    match rt {
        ResolvedType::Integer(assignments) => {
            let refs: Vec<&Assignment> = assignments.iter().collect();
            let size = find(&refs, "size")
                .ok_or_else(|| missing("size"))
                .and_then(|e| expr_as_u32(e, "size"))?;
            let align = match find(&refs, "align") {
                Some(e) => expr_as_u32(e, "align")?,
                None => {
                    if size % 8 == 0 {
                        8
                    } else {
                        1
                    }
                }
            };
            let signed = match find(&refs, "signed") {
                Some(e) => expr_as_bool(e, "signed")?,
                None => false,
            };
            let byte_order = match find(&refs, "byte_order") {
                Some(e) => interpret_byte_order(e)?,
                None => ByteOrder::Native,
            };
            let base = match find(&refs, "base") {
                Some(e) => interpret_base(e)?,
                None => Base::Decimal,
            };
            let encoding = match find(&refs, "encoding") {
                Some(e) => interpret_encoding(e)?,
                None => Encoding::None,
            };
            let map = match find(&refs, "map") {
                Some(e) => Some(interpret_clock_map(e)?),
                None => None,
            };
            trace!("materialized integer: size={size} align={align} signed={signed}");
            Ok(Type::Integer(IntegerType {
                size,
                align,
                signed,
                byte_order,
                base,
                encoding,
                map,
            }))
        }
        ResolvedType::FloatingPoint(assignments) => {
            let refs: Vec<&Assignment> = assignments.iter().collect();
            let exp_dig = find(&refs, "exp_dig")
                .ok_or_else(|| missing("exp_dig"))
                .and_then(|e| expr_as_u32(e, "exp_dig"))?;
            let mant_dig = find(&refs, "mant_dig")
                .ok_or_else(|| missing("mant_dig"))
                .and_then(|e| expr_as_u32(e, "mant_dig"))?;
            let align = match find(&refs, "align") {
                Some(e) => expr_as_u32(e, "align")?,
                None => 1,
            };
            let byte_order = match find(&refs, "byte_order") {
                Some(e) => interpret_byte_order(e)?,
                None => ByteOrder::Native,
            };
            Ok(Type::FloatingPoint(FloatingPointType {
                exp_dig,
                mant_dig,
                align,
                byte_order,
            }))
        }
        ResolvedType::String(assignments) => {
            let refs: Vec<&Assignment> = assignments.iter().collect();
            let encoding = match find(&refs, "encoding") {
                Some(e) => interpret_encoding(e)?,
                None => Encoding::None,
            };
            Ok(Type::String(StringType { encoding }))
        }
        ResolvedType::Enum(e) => {
            let base = materialize_type(&e.base)?;
            let mut enumerators = Vec::new();
            let mut cur = 0i64;
            let mut seen = std::collections::HashSet::new();
            for node in &e.enumerators {
                if !seen.insert(node.label.clone()) {
                    return Err(err(ParseErrorKind::DuplicateEnumLabel(node.label.clone())));
                }
                let (low, high) = match node.kind {
                    EnumeratorKind::Bare => {
                        let v = cur;
                        cur += 1;
                        (v, v)
                    }
                    EnumeratorKind::Value(n) => {
                        cur = n + 1;
                        (n, n)
                    }
                    EnumeratorKind::Range(low, high) => {
                        if low > high {
                            return Err(err(ParseErrorKind::InvalidEnumRange { low, high }));
                        }
                        cur = high + 1;
                        (low, high)
                    }
                };
                enumerators.push(Enumerator {
                    label: node.label.clone(),
                    low,
                    high,
                });
            }
            Ok(Type::Enum(EnumType {
                base: Box::new(base),
                enumerators,
            }))
        }
        ResolvedType::Struct(s) => {
            let mut fields = Vec::new();
            for f in &s.fields {
                fields.push(Field {
                    name: f.name.clone(),
                    type_node: materialize_type(&f.type_node)?,
                });
            }
            Ok(Type::Struct(StructType {
                name: s.name.clone(),
                fields,
                align: s.align,
            }))
        }
        ResolvedType::Variant(v) => {
            let tag = v
                .tag
                .clone()
                .ok_or_else(|| missing("tag"))?;
            let mut options = Vec::new();
            for f in &v.fields {
                options.push(Field {
                    name: f.name.clone(),
                    type_node: materialize_type(&f.type_node)?,
                });
            }
            Ok(Type::Variant(VariantType {
                name: v.name.clone(),
                tag,
                options,
            }))
        }
        ResolvedType::Array { base, size } => Ok(Type::Array {
            base: Box::new(materialize_type(base)?),
            size: *size,
        }),
        ResolvedType::Sequence { base, length_path } => Ok(Type::Sequence {
            base: Box::new(materialize_type(base)?),
            length_path: length_path.clone(),
        }),
    }
}

fn materialize_trace(entries: &[ResolvedScopeEntry]) -> Result<Trace, ParseError> {
    let (assignments, types) = split(entries);
    let major = find(&assignments, "major")
        .ok_or_else(|| missing("major"))
        .and_then(|e| expr_as_u32(e, "major"))?;
    let minor = find(&assignments, "minor")
        .ok_or_else(|| missing("minor"))
        .and_then(|e| expr_as_u32(e, "minor"))?;
    let uuid = match find(&assignments, "uuid") {
        Some(e) => Some(interpret_uuid(e)?),
        None => None,
    };
    let byte_order = match find(&assignments, "byte_order") {
        Some(e) => interpret_byte_order(e)?,
        None => ByteOrder::Native,
    };
    let packet_header = match find_type(&types, &["packet", "header"]) {
        Some(t) => Some(materialize_struct_field(t, "packet.header")?),
        None => None,
    };
    debug!("materialized trace {major}.{minor}");
    Ok(Trace {
        major,
        minor,
        uuid,
        byte_order,
        packet_header,
    })
}

fn materialize_env(entries: &[ResolvedScopeEntry]) -> Env {
    let mut out = IndexMap::new();
    for entry in entries {
        if let ResolvedScopeEntry::Assignment(a) = entry {
            let value = match a.value.as_const_integer() {
                Some(n) => EnvValue::Int(n),
                None => EnvValue::Str(
                    expr_as_word(&a.value).unwrap_or_default(),
                ),
            };
            out.insert(a.key.clone(), value);
        }
    }
    Env { entries: out }
}

fn materialize_clock(entries: &[ResolvedScopeEntry]) -> Result<Clock, ParseError> {
    let (assignments, _types) = split(entries);
    let name = find(&assignments, "name")
        .ok_or_else(|| missing("name"))
        .and_then(|e| expr_as_word(e).ok_or_else(|| missing("name")))?;
    let uuid = match find(&assignments, "uuid") {
        Some(e) => Some(interpret_uuid(e)?),
        None => None,
    };
    let description = find(&assignments, "description").and_then(expr_as_word);
    let freq = find(&assignments, "freq")
        .ok_or_else(|| missing("freq"))
        .and_then(|e| expr_as_u64(e, "freq"))?;
    let precision = match find(&assignments, "precision") {
        Some(e) => Some(expr_as_u64(e, "precision")?),
        None => None,
    };
    let offset_s = match find(&assignments, "offset_s") {
        Some(e) => Some(expr_as_i64(e, "offset_s")?),
        None => None,
    };
    let offset = match find(&assignments, "offset") {
        Some(e) => Some(expr_as_i64(e, "offset")?),
        None => None,
    };
    let absolute = match find(&assignments, "absolute") {
        Some(e) => expr_as_bool(e, "absolute")?,
        None => false,
    };
    Ok(Clock {
        name,
        uuid,
        description,
        freq,
        precision,
        offset_s,
        offset,
        absolute,
    })
}

/// Materializes a type assignment that must name a structure (the four
/// packet/event header/context slots), rejecting any other type
/// constructor.
fn materialize_struct_field(rt: &ResolvedType, field: &str) -> Result<Type, ParseError> {
    let materialized = materialize_type(rt)?;
    match materialized {
        Type::Struct(_) => Ok(materialized),
        _ => Err(err(ParseErrorKind::NotAStruct(field.to_string()))),
    }
}

fn materialize_stream(entries: &[ResolvedScopeEntry]) -> Result<Stream, ParseError> {
    let (assignments, types) = split(entries);
    let id = match find(&assignments, "id") {
        Some(e) => expr_as_u64(e, "id")?,
        None => 0,
    };
    let packet_context = match find_type(&types, &["packet", "context"]) {
        Some(t) => Some(materialize_struct_field(t, "packet.context")?),
        None => None,
    };
    let event_header = match find_type(&types, &["event", "header"]) {
        Some(t) => Some(materialize_struct_field(t, "event.header")?),
        None => None,
    };
    let event_context = match find_type(&types, &["event", "context"]) {
        Some(t) => Some(materialize_struct_field(t, "event.context")?),
        None => None,
    };
    debug!("materialized stream id={id}");
    Ok(Stream {
        id,
        packet_context,
        event_header,
        event_context,
        events: IndexMap::new(),
        by_name: std::collections::HashMap::new(),
    })
}

fn materialize_event(entries: &[ResolvedScopeEntry]) -> Result<Event, ParseError> {
    let (assignments, types) = split(entries);
    let id = find(&assignments, "id")
        .ok_or_else(|| missing("id"))
        .and_then(|e| expr_as_u64(e, "id"))?;
    let name = find(&assignments, "name")
        .ok_or_else(|| missing("name"))
        .and_then(|e| expr_as_word(e).ok_or_else(|| missing("name")))?;
    let stream_id = match find(&assignments, "stream_id") {
        Some(e) => expr_as_u64(e, "stream_id")?,
        None => 0,
    };
    let loglevel = match find(&assignments, "loglevel") {
        Some(e) => Some(expr_as_i64(e, "loglevel")?),
        None => None,
    };
    let context = match find_type(&types, &["context"]) {
        Some(t) => Some(materialize_type(t)?),
        None => None,
    };
    let event_fields = match find_type(&types, &["fields"]) {
        Some(t) => Some(materialize_type(t)?),
        None => None,
    };
    debug!("materialized event {name} (id={id}, stream_id={stream_id})");
    Ok(Event {
        id,
        name,
        stream_id,
        loglevel,
        context,
        fields: event_fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::get_ast;
    use crate::core::resolver::resolve;

    fn build(src: &str) -> Result<Doc, ParseError> {
        let ast = get_ast(src).unwrap();
        let resolved = resolve(&ast, src).unwrap();
        materialize(&resolved)
    }

    const MINIMAL_PREFIX: &str = r#"
        trace { major = 1; minor = 8; byte_order = le; };
        clock { name = mono; freq = 1000000000; };
        stream { id = 0; };
    "#;

    #[test]
    fn minimal_document_materializes() {
        let doc = build(MINIMAL_PREFIX).unwrap();
        assert_eq!(doc.trace.as_ref().unwrap().major, 1);
        assert_eq!(doc.clocks.len(), 1);
        assert_eq!(doc.streams.len(), 1);
    }

    #[test]
    fn trace_is_optional() {
        let src = r#"
            clock { name = mono; freq = 1000000000; };
            stream { id = 0; };
        "#;
        let doc = build(src).unwrap();
        assert!(doc.trace.is_none());
        assert!(doc.env.is_none());
    }

    #[test]
    fn trace_byte_order_defaults_to_native() {
        let src = r#"
            trace { major = 1; minor = 0; };
            clock { name = mono; freq = 1000000000; };
            stream { id = 0; };
        "#;
        let doc = build(src).unwrap();
        assert_eq!(doc.trace.unwrap().byte_order, ByteOrder::Native);
    }

    #[test]
    fn missing_clock_is_an_error() {
        let src = r#"
            trace { major = 1; minor = 8; byte_order = le; };
            stream { id = 0; };
        "#;
        let err = build(src).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::NoClocks));
    }

    #[test]
    fn event_referencing_unknown_stream_is_an_error() {
        let src = format!(
            "{MINIMAL_PREFIX}\nevent {{ id = 0; name = foo; stream_id = 99; }};"
        );
        let err = build(&src).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnknownStream(99)));
    }

    #[test]
    fn event_attaches_to_its_stream() {
        let src = format!("{MINIMAL_PREFIX}\nevent {{ id = 0; name = foo; stream_id = 0; }};");
        let doc = build(&src).unwrap();
        assert!(doc.streams[&0].event_by_name("foo").is_some());
        assert!(doc.streams[&0].event_by_id(0).is_some());
    }

    #[test]
    fn integer_align_defaults_from_size() {
        let src = format!(
            "{MINIMAL_PREFIX}\ntrace {{ major = 1; minor = 8; byte_order = le; \
             packet.header := struct {{ integer {{ size = 32; }} magic; }}; }};"
        );
        let ast = get_ast(&src).unwrap();
        let resolved = resolve(&ast, &src).unwrap();
        let doc = materialize(&resolved).unwrap();
        match doc.trace.unwrap().packet_header {
            Some(Type::Struct(s)) => match &s.fields[0].type_node {
                Type::Integer(i) => assert_eq!(i.align, 8),
                _ => panic!("expected an integer field"),
            },
            _ => panic!("expected a struct packet_header"),
        }
    }

    #[test]
    fn non_struct_packet_header_is_rejected() {
        let src = format!(
            "{MINIMAL_PREFIX}\ntrace {{ major = 1; minor = 8; byte_order = le; \
             packet.header := integer {{ size = 32; }}; }};"
        );
        let ast = get_ast(&src).unwrap();
        let resolved = resolve(&ast, &src).unwrap();
        let err = materialize(&resolved).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::NotAStruct(ref f) if f == "packet.header"));
    }

    #[test]
    fn enum_auto_increment_and_range_sequencing() {
        let src = format!(
            "typealias enum : integer {{ size = 8; }} {{ A, B = 5, C, D = 10...12, E }} := color;\n\
             {MINIMAL_PREFIX}"
        );
        let ast = get_ast(&src).unwrap();
        let resolved = resolve(&ast, &src).unwrap();
        let doc = materialize(&resolved).unwrap();
        assert_eq!(doc.clocks.len(), 1);
    }
}
