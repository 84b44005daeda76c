//! Pass 1: lexically-scoped symbol resolution.
//!
//! Walks the syntax tree produced by [`crate::core::parser`] and resolves
//! every `typealias`, `struct name`, and `variant name` reference against a
//! stack of scope frames (innermost-wins lookup). Struct bodies are shared
//! by `Rc` identity when referenced more than once; variant bodies are deep
//! cloned at each reference point so that per-reference tag overrides never
//! leak between uses of the same named variant.

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, trace};

use crate::core::ast::*;
use crate::core::errors::{ParseError, ParseErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedType {
    Integer(Vec<Assignment>),
    FloatingPoint(Vec<Assignment>),
    String(Vec<Assignment>),
    Enum(ResolvedEnum),
    Struct(Rc<ResolvedStruct>),
    Variant(ResolvedVariant),
    Array {
        base: Box<ResolvedType>,
        size: i64,
    },
    Sequence {
        base: Box<ResolvedType>,
        length_path: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEnum {
    pub base: Box<ResolvedType>,
    pub enumerators: Vec<EnumeratorNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub name: String,
    pub type_node: ResolvedType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStruct {
    pub name: Option<String>,
    pub fields: Vec<ResolvedField>,
    pub align: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVariant {
    pub tag: Option<Vec<String>>,
    pub name: Option<String>,
    pub fields: Vec<ResolvedField>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedScopeEntry {
    Assignment(Assignment),
    /// A materialized `dotted.path := type;` type assignment - `path` keeps
    /// its dotted components (e.g. `["packet", "header"]`) so the
    /// materializer can match it against its key table.
    TypeAssign {
        path: Vec<String>,
        type_node: ResolvedType,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedScopeBlock {
    Trace(Vec<ResolvedScopeEntry>),
    Env(Vec<ResolvedScopeEntry>),
    Clock(Vec<ResolvedScopeEntry>),
    Stream(Vec<ResolvedScopeEntry>),
    Event(Vec<ResolvedScopeEntry>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedTopLevel {
    pub blocks: Vec<ResolvedScopeBlock>,
}

#[derive(Debug, Default)]
struct Frame {
    aliases: HashMap<String, ResolvedType>,
    structs: HashMap<String, Rc<ResolvedStruct>>,
    variants: HashMap<String, ResolvedVariant>,
}

/// The symbol-frame stack. A fresh frame is pushed for every struct body,
/// variant body, and top-scope block; it is popped via [`ScopeGuard`] even
/// if resolution fails partway through, keeping the stack balanced.
pub struct Resolver {
    frames: Vec<Frame>,
}

/// RAII guard popping a [`Resolver`] frame on drop, so a `?`-propagated
/// error part-way through a body still leaves the frame stack balanced.
struct ScopeGuard<'a> {
    resolver: &'a mut Resolver,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.resolver.frames.pop();
        trace!("popped scope frame (depth {})", self.resolver.frames.len());
    }
}

impl Resolver {
    pub fn new() -> Self {
        Resolver {
            frames: vec![Frame::default()],
        }
    }

    fn push_frame(&mut self) -> ScopeGuard<'_> {
        self.frames.push(Frame::default());
        trace!("pushed scope frame (depth {})", self.frames.len());
        ScopeGuard { resolver: self }
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("root frame is never popped")
    }

    fn lookup_alias(&self, name: &str) -> Option<ResolvedType> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.aliases.get(name).cloned())
    }

    fn lookup_struct(&self, name: &str) -> Option<Rc<ResolvedStruct>> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.structs.get(name).cloned())
    }

    fn lookup_variant(&self, name: &str) -> Option<ResolvedVariant> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.variants.get(name).cloned())
    }

    fn err(&self, kind: ParseErrorKind, source: &str) -> ParseError {
        ParseError::new(kind, 0, source.to_string())
    }

    fn resolve_type(&mut self, node: &TypeNode, source: &str) -> Result<ResolvedType, ParseError> {
        match node {
            TypeNode::Integer(a) => Ok(ResolvedType::Integer(a.clone())),
            TypeNode::FloatingPoint(a) => Ok(ResolvedType::FloatingPoint(a.clone())),
            TypeNode::String(a) => Ok(ResolvedType::String(a.clone())),
            TypeNode::Enum(e) => {
                let base = Box::new(self.resolve_type(&e.base, source)?);
                Ok(ResolvedType::Enum(ResolvedEnum {
                    base,
                    enumerators: e.enumerators.clone(),
                }))
            }
            TypeNode::AliasRef(name) => {
                let resolved = self
                    .lookup_alias(name)
                    .ok_or_else(|| self.err(ParseErrorKind::UnresolvedAlias(name.clone()), source))?;
                debug!("resolved alias reference '{name}'");
                Ok(resolved)
            }
            TypeNode::StructRef(name) => {
                let s = self
                    .lookup_struct(name)
                    .ok_or_else(|| self.err(ParseErrorKind::UnresolvedStruct(name.clone()), source))?;
                debug!("resolved struct reference '{name}' (shared by Rc identity)");
                Ok(ResolvedType::Struct(s))
            }
            TypeNode::StructFull(body) => {
                let resolved = self.resolve_struct_body(body, source)?;
                let rc = Rc::new(resolved);
                if let Some(name) = &rc.name {
                    self.current_frame_mut().structs.insert(name.clone(), rc.clone());
                }
                Ok(ResolvedType::Struct(rc))
            }
            TypeNode::VariantRef { name, tag } => {
                let mut v = self
                    .lookup_variant(name)
                    .ok_or_else(|| self.err(ParseErrorKind::UnresolvedVariant(name.clone()), source))?;
                // Deep-cloned above via `.clone()` on the lookup, so a tag
                // override here never leaks into other references to the
                // same named variant.
                if tag.is_some() {
                    v.tag = tag.clone();
                }
                debug!("resolved variant reference '{name}' (deep-cloned, tag override: {})", tag.is_some());
                Ok(ResolvedType::Variant(v))
            }
            TypeNode::VariantFull { tag, body } => {
                let resolved = self.resolve_variant_body(tag.clone(), body, source)?;
                if let Some(name) = &resolved.name {
                    self.current_frame_mut()
                        .variants
                        .insert(name.clone(), resolved.clone());
                }
                Ok(ResolvedType::Variant(resolved))
            }
            TypeNode::Array { base, size } => Ok(ResolvedType::Array {
                base: Box::new(self.resolve_type(base, source)?),
                size: *size,
            }),
            TypeNode::Sequence { base, length_path } => Ok(ResolvedType::Sequence {
                base: Box::new(self.resolve_type(base, source)?),
                length_path: length_path.clone(),
            }),
        }
    }

    fn resolve_struct_body(
        &mut self,
        body: &StructBody,
        source: &str,
    ) -> Result<ResolvedStruct, ParseError> {
        let mut fields = Vec::new();
        {
            let guard = self.push_frame();
            let resolver = &mut *guard.resolver;
            for entry in &body.entries {
                match entry {
                    Entry::TypeAlias(alias) => {
                        let resolved = resolver.resolve_type(&alias.type_node, source)?;
                        resolver.current_frame_mut().aliases.insert(alias.alias.clone(), resolved);
                    }
                    Entry::Struct(nested) => {
                        let resolved = resolver.resolve_struct_body(nested, source)?;
                        let rc = Rc::new(resolved);
                        if let Some(name) = &rc.name {
                            resolver.current_frame_mut().structs.insert(name.clone(), rc);
                        }
                    }
                    Entry::Variant { tag, body: nested } => {
                        let resolved = resolver.resolve_variant_body(tag.clone(), nested, source)?;
                        if let Some(name) = &resolved.name {
                            resolver
                                .current_frame_mut()
                                .variants
                                .insert(name.clone(), resolved);
                        }
                    }
                    Entry::Field(field) => {
                        let type_node = resolver.resolve_type(&field.type_node, source)?;
                        fields.push(ResolvedField {
                            name: field.name.clone(),
                            type_node,
                        });
                    }
                }
            }
        }
        Ok(ResolvedStruct {
            name: body.name.clone(),
            fields,
            align: body.align,
        })
    }

    fn resolve_variant_body(
        &mut self,
        tag: Option<Vec<String>>,
        body: &StructBody,
        source: &str,
    ) -> Result<ResolvedVariant, ParseError> {
        let mut fields = Vec::new();
        {
            let guard = self.push_frame();
            let resolver = &mut *guard.resolver;
            for entry in &body.entries {
                match entry {
                    Entry::TypeAlias(alias) => {
                        let resolved = resolver.resolve_type(&alias.type_node, source)?;
                        resolver.current_frame_mut().aliases.insert(alias.alias.clone(), resolved);
                    }
                    Entry::Struct(nested) => {
                        let resolved = resolver.resolve_struct_body(nested, source)?;
                        let rc = Rc::new(resolved);
                        if let Some(name) = &rc.name {
                            resolver.current_frame_mut().structs.insert(name.clone(), rc);
                        }
                    }
                    Entry::Variant { tag, body: nested } => {
                        let resolved = resolver.resolve_variant_body(tag.clone(), nested, source)?;
                        if let Some(name) = &resolved.name {
                            resolver
                                .current_frame_mut()
                                .variants
                                .insert(name.clone(), resolved);
                        }
                    }
                    Entry::Field(field) => {
                        let type_node = resolver.resolve_type(&field.type_node, source)?;
                        fields.push(ResolvedField {
                            name: field.name.clone(),
                            type_node,
                        });
                    }
                }
            }
        }
        Ok(ResolvedVariant {
            tag,
            name: body.name.clone(),
            fields,
        })
    }

    fn resolve_scope_block(
        &mut self,
        block: &ScopeBlock,
        source: &str,
    ) -> Result<ResolvedScopeBlock, ParseError> {
        let entries = match block {
            ScopeBlock::Trace(e)
            | ScopeBlock::Env(e)
            | ScopeBlock::Clock(e)
            | ScopeBlock::Stream(e)
            | ScopeBlock::Event(e) => e,
        };
        let mut out = Vec::new();
        {
            let guard = self.push_frame();
            let resolver = &mut *guard.resolver;
            for entry in entries {
                match entry {
                    ScopeEntry::Assignment(a) => out.push(ResolvedScopeEntry::Assignment(a.clone())),
                    ScopeEntry::TypeAlias(alias) => {
                        let resolved = resolver.resolve_type(&alias.type_node, source)?;
                        resolver.current_frame_mut().aliases.insert(alias.alias.clone(), resolved);
                    }
                    ScopeEntry::Struct(body) => {
                        let resolved = resolver.resolve_struct_body(body, source)?;
                        let rc = Rc::new(resolved);
                        if let Some(name) = &rc.name {
                            resolver.current_frame_mut().structs.insert(name.clone(), rc);
                        }
                    }
                    ScopeEntry::Variant { tag, body } => {
                        let resolved = resolver.resolve_variant_body(tag.clone(), body, source)?;
                        if let Some(name) = &resolved.name {
                            resolver
                                .current_frame_mut()
                                .variants
                                .insert(name.clone(), resolved);
                        }
                    }
                    ScopeEntry::TypeAssign { path, type_node } => {
                        let type_node = resolver.resolve_type(type_node, source)?;
                        out.push(ResolvedScopeEntry::TypeAssign {
                            path: path.clone(),
                            type_node,
                        });
                    }
                }
            }
        }
        Ok(match block {
            ScopeBlock::Trace(_) => ResolvedScopeBlock::Trace(out),
            ScopeBlock::Env(_) => ResolvedScopeBlock::Env(out),
            ScopeBlock::Clock(_) => ResolvedScopeBlock::Clock(out),
            ScopeBlock::Stream(_) => ResolvedScopeBlock::Stream(out),
            ScopeBlock::Event(_) => ResolvedScopeBlock::Event(out),
        })
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a whole parsed document: top-level `typealias`/`struct`/`variant`
/// declarations populate the root frame as they're encountered (in source
/// order - a later block can use an earlier one, not vice versa) while
/// `trace`/`env`/`clock`/`stream`/`event` blocks each get their own nested
/// frame.
pub fn resolve(top: &TopLevel, source: &str) -> Result<ResolvedTopLevel, ParseError> {
    let mut resolver = Resolver::new();
    let mut blocks = Vec::new();
    for item in &top.items {
        match item {
            TopItem::TypeAlias(node) => {
                let resolved = resolver.resolve_type(&node.type_node, source)?;
                resolver.current_frame_mut().aliases.insert(node.alias.clone(), resolved);
            }
            TopItem::Struct(body) => {
                let resolved = resolver.resolve_struct_body(body, source)?;
                let rc = Rc::new(resolved);
                if let Some(name) = &rc.name {
                    resolver.current_frame_mut().structs.insert(name.clone(), rc);
                }
            }
            TopItem::Variant { tag, body } => {
                let resolved = resolver.resolve_variant_body(tag.clone(), body, source)?;
                if let Some(name) = &resolved.name {
                    resolver.current_frame_mut().variants.insert(name.clone(), resolved);
                }
            }
            TopItem::Scope(block) => {
                blocks.push(resolver.resolve_scope_block(block, source)?);
            }
        }
    }
    Ok(ResolvedTopLevel { blocks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::get_ast;

    #[test]
    fn resolves_typealias_reference() {
        let src = "typealias integer { size = 32; } := u32;\ntrace { integer_field_size = 1; };";
        let ast = get_ast(src).unwrap();
        let resolved = resolve(&ast, src).unwrap();
        assert_eq!(resolved.blocks.len(), 1);
    }

    #[test]
    fn unresolved_alias_is_an_error() {
        let src = "struct s { unknown_alias x; };";
        let ast = get_ast(src).unwrap();
        let err = resolve(&ast, src).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnresolvedAlias(_)));
    }

    #[test]
    fn struct_reference_shares_rc_identity() {
        let src = "struct shared { integer { size = 8; } a; };\ntrace { x := struct shared; };";
        let ast = get_ast(src).unwrap();
        let resolved = resolve(&ast, src).unwrap();
        match &resolved.blocks[0] {
            ResolvedScopeBlock::Trace(entries) => match &entries[0] {
                ResolvedScopeEntry::TypeAssign { type_node, .. } => {
                    assert!(matches!(type_node, ResolvedType::Struct(_)));
                }
                _ => panic!("expected type assignment"),
            },
            _ => panic!("expected trace block"),
        }
    }

    #[test]
    fn variant_reference_is_deep_cloned_not_shared() {
        let src = "variant v { integer { size = 8; } a; };\n\
                    trace { first := variant v <x>; };\n\
                    env { second := variant v <y>; };";
        let ast = get_ast(src).unwrap();
        let resolved = resolve(&ast, src).unwrap();
        let tag_of = |block: &ResolvedScopeBlock| match block {
            ResolvedScopeBlock::Trace(entries) | ResolvedScopeBlock::Env(entries) => {
                match &entries[0] {
                    ResolvedScopeEntry::TypeAssign { type_node, .. } => match type_node {
                        ResolvedType::Variant(v) => v.tag.clone(),
                        _ => panic!("expected variant"),
                    },
                    _ => panic!("expected type assignment"),
                }
            }
            _ => panic!("expected trace/env block"),
        };
        let first_tag = tag_of(&resolved.blocks[0]);
        let second_tag = tag_of(&resolved.blocks[1]);
        assert_eq!(first_tag, Some(vec!["x".to_string()]));
        assert_eq!(second_tag, Some(vec!["y".to_string()]));
    }
}
