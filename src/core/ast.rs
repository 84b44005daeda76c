//! Syntax tree produced by [`crate::core::parser`] - grammar-recognition
//! output, before any scope resolution or semantic interpretation has
//! happened. Every `key = value;` pair, in any block, is represented
//! uniformly as an [`Assignment`]; the materializer is the only place that
//! attaches meaning to a given key.

use crate::core::expr::Expr;

/// A single `key = value;` pair, generic over whatever block it appears in.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub key: String,
    pub value: Expr,
}

/// A type as written in the grammar, before alias/struct/variant resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeNode {
    Integer(Vec<Assignment>),
    FloatingPoint(Vec<Assignment>),
    String(Vec<Assignment>),
    Enum(EnumNode),
    /// `struct { ... }` - a full inline body.
    StructFull(StructBody),
    /// `struct name` - a reference to a previously declared named struct.
    StructRef(String),
    /// `variant { ... }` - a full inline body, with an optional tag path.
    VariantFull {
        tag: Option<Vec<String>>,
        body: StructBody,
    },
    /// `variant name` - a reference to a previously declared named variant,
    /// with an optional tag path.
    VariantRef { name: String, tag: Option<Vec<String>> },
    /// A bare identifier that must resolve through a `typealias`.
    AliasRef(String),
    /// `base_type decl[N]` - N a constant integer.
    Array { base: Box<TypeNode>, size: i64 },
    /// `base_type decl[path.to.length]` - a dotted-path length reference.
    Sequence {
        base: Box<TypeNode>,
        length_path: Vec<String>,
    },
}

/// The enumerator list of an `enum [Name] : <int-type> { ... }` type. The
/// optional name (`[Name]`) has no separate reference form in TSDL's
/// grammar - unlike `struct`/`variant`, there is no `enum Name` lookup - so
/// it is accepted syntactically and discarded rather than tracked here.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumNode {
    pub base: Box<TypeNode>,
    pub enumerators: Vec<EnumeratorNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumeratorNode {
    pub label: String,
    pub kind: EnumeratorKind,
}

/// How an enumerator's value was written, before auto-increment resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumeratorKind {
    /// Bare `LABEL,` - value assigned by the running auto-increment counter.
    Bare,
    /// `LABEL = N,`
    Value(i64),
    /// `LABEL = LOW...HIGH,`
    Range(i64, i64),
}

/// One field declaration inside a struct/variant body: `type ident[...];`
/// or the identifier-led alias form `some alias name ident[...];`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub type_node: TypeNode,
    pub name: String,
}

/// A member of a struct or variant body: a field, a nested `typealias`
/// declaration, or a nested named `struct`/`variant` declaration, all
/// scoped to that body.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Field(FieldNode),
    TypeAlias(TypeAliasNode),
    Struct(StructBody),
    Variant { tag: Option<Vec<String>>, body: StructBody },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructBody {
    /// `struct name { ... }` bodies carry their name for later lookup by
    /// `struct name` references; anonymous/inline bodies leave this `None`.
    pub name: Option<String>,
    pub entries: Vec<Entry>,
    /// `struct { ... } align(N)` - a power-of-two bit alignment trailer.
    pub align: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasNode {
    pub type_node: TypeNode,
    pub alias: String,
}

/// A top-scope block: `trace { ... }`, `env { ... }`, `clock { ... }`,
/// `stream { ... }`, or `event { ... }`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeBlock {
    Trace(Vec<ScopeEntry>),
    Env(Vec<ScopeEntry>),
    Clock(Vec<ScopeEntry>),
    Stream(Vec<ScopeEntry>),
    Event(Vec<ScopeEntry>),
}

/// An entry inside a top-scope block: a value assignment (`key = unary;`), a
/// type assignment (`dotted.path := type;` - e.g. `packet.header :=
/// struct { ... };`), a nested `typealias`, or a nested named
/// `struct`/`variant` declaration scoped to this block.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeEntry {
    Assignment(Assignment),
    TypeAssign { path: Vec<String>, type_node: TypeNode },
    TypeAlias(TypeAliasNode),
    Struct(StructBody),
    Variant { tag: Option<Vec<String>>, body: StructBody },
}

/// A single top-level item: a scope block, a standalone `typealias`, or a
/// standalone named `struct`/`variant` declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum TopItem {
    Scope(ScopeBlock),
    TypeAlias(TypeAliasNode),
    Struct(StructBody),
    Variant { tag: Option<Vec<String>>, body: StructBody },
}

/// The whole parsed document: an ordered list of top-level items.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopLevel {
    pub items: Vec<TopItem>,
}
