//! The typed document model: what [`crate::core::materializer`] produces and
//! what [`crate::parse`] hands back to callers.
//!
//! Unlike the resolver's `ResolvedType` tree, `Type` carries fully
//! interpreted semantics (concrete byte order, concrete enumerator ranges,
//! concrete struct field lists) rather than raw `key = value;` pairs.
//! Structs and Variants both have value semantics here - sharing by `Rc`
//! identity is a resolver-only concern (invariant: "two references to the
//! same named struct observe the same fields; two references to the same
//! named variant do not share tag state").

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    Native,
    LittleEndian,
    BigEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Base {
    Binary,
    Octal,
    Decimal,
    Hexadecimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    None,
    Utf8,
    Ascii,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegerType {
    pub size: u32,
    pub align: u32,
    pub signed: bool,
    pub byte_order: ByteOrder,
    pub base: Base,
    pub encoding: Encoding,
    /// A `map = clock.xxx;` path, if present; the first component must be
    /// the literal `clock`, otherwise materialization rejects it with
    /// `InvalidClockMap`.
    pub map: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatingPointType {
    pub exp_dig: u32,
    pub mant_dig: u32,
    pub align: u32,
    pub byte_order: ByteOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringType {
    pub encoding: Encoding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enumerator {
    pub label: String,
    pub low: i64,
    pub high: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumType {
    pub base: Box<Type>,
    pub enumerators: Vec<Enumerator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub type_node: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructType {
    pub name: Option<String>,
    pub fields: Vec<Field>,
    /// Power-of-two bit alignment from a `struct { ... } align(N)` trailer.
    pub align: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantType {
    pub name: Option<String>,
    /// Dotted path (relative to the event/stream scope) selecting the
    /// integer or enum field whose value picks the active option.
    pub tag: Vec<String>,
    pub options: Vec<Field>,
}

/// The closed set of TSDL type constructors. Deliberately a flat `enum`
/// rather than a trait-object hierarchy: every case the materializer can
/// produce is known up front, so a `match` is the idiomatic dispatch here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Type {
    Integer(IntegerType),
    FloatingPoint(FloatingPointType),
    String(StringType),
    Enum(EnumType),
    Struct(StructType),
    Variant(VariantType),
    Array { base: Box<Type>, size: i64 },
    Sequence { base: Box<Type>, length_path: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub major: u32,
    pub minor: u32,
    pub uuid: Option<Uuid>,
    pub byte_order: ByteOrder,
    pub packet_header: Option<Type>,
}

impl Trace {
    pub fn new(major: u32, minor: u32) -> Self {
        Trace {
            major,
            minor,
            uuid: None,
            byte_order: ByteOrder::Native,
            packet_header: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Env {
    pub entries: IndexMap<String, EnvValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clock {
    pub name: String,
    pub uuid: Option<Uuid>,
    pub description: Option<String>,
    pub freq: u64,
    /// `None` when absent - left unset rather than assigned a numeric
    /// default a caller could mistake for an explicit value.
    pub precision: Option<u64>,
    pub offset_s: Option<i64>,
    pub offset: Option<i64>,
    pub absolute: bool,
}

/// A stream's events, indexed for O(1) lookup by either id or name.
/// `events` is the canonical insertion-ordered store; `by_name` is a
/// secondary index into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Stream {
    pub id: u64,
    pub packet_context: Option<Type>,
    pub event_header: Option<Type>,
    pub event_context: Option<Type>,
    pub events: IndexMap<u64, Event>,
    pub by_name: HashMap<String, u64>,
}

impl Stream {
    pub fn event_by_id(&self, id: u64) -> Option<&Event> {
        self.events.get(&id)
    }

    pub fn event_by_name(&self, name: &str) -> Option<&Event> {
        let id = self.by_name.get(name)?;
        self.events.get(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub name: String,
    pub stream_id: u64,
    pub loglevel: Option<i64>,
    pub context: Option<Type>,
    pub fields: Option<Type>,
}

/// The fully resolved, fully interpreted TSDL document.
///
/// `trace` and `env` are both optional - a document with no `trace { ... }`
/// or `env { ... }` block simply carries `None` rather than a synthesized
/// zero value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Doc {
    pub trace: Option<Trace>,
    pub env: Option<Env>,
    pub clocks: IndexMap<String, Clock>,
    pub streams: IndexMap<u64, Stream>,
}
