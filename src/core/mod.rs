//! Core module containing the TSDL grammar, scope resolver, and document
//! materializer.
//!
//! Pipeline: [`lexer`] + [`expr`] feed [`parser`], which produces an
//! [`ast::TopLevel`]; [`resolver`] resolves every alias/struct/variant
//! reference against a lexically-scoped symbol table; [`materializer`]
//! interprets the resolved tree's value assignments into the typed
//! [`document`] model.

pub mod ast;
pub mod document;
pub mod errors;
pub mod expr;
pub mod hint_engine;
pub mod lexer;
pub mod materializer;
pub mod parser;
pub mod resolver;
