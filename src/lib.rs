//! TSDL metadata parser: grammar recognizer, scope resolver, and document
//! materializer for the Trace Stream Description Language used by
//! CTF (Common Trace Format) metadata streams.
//!
//! # Modules
//!
//! - `core`: lexer, expression grammar, AST, parser, resolver, materializer,
//!   document model, and error types.

pub mod core;

pub use core::document::{
    Base, ByteOrder, Clock, Doc, Encoding, Env, EnvValue, Event, EnumType, Enumerator, Field,
    FloatingPointType, IntegerType, Stream, StringType, StructType, Trace, Type, VariantType,
};
pub use core::errors::{ParseError, ParseErrorKind};

/// Parse, resolve, and materialize a TSDL metadata source string into a
/// fully interpreted [`Doc`].
pub fn parse(source: &str) -> Result<Doc, ParseError> {
    let ast = core::parser::get_ast(source)?;
    let resolved = core::resolver::resolve(&ast, source)?;
    core::materializer::materialize(&resolved)
}

/// Run grammar recognition only, without scope resolution or
/// materialization. Useful for tooling that only needs the raw syntax tree.
pub fn get_ast(source: &str) -> Result<core::ast::TopLevel, ParseError> {
    core::parser::get_ast(source)
}
