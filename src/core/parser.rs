//! Recursive-descent grammar recognizer: turns a TSDL source string into a
//! [`TopLevel`] syntax tree. This pass does no scope resolution - a bare
//! alias, struct, or variant reference is recorded as-is and resolved later
//! by [`crate::core::resolver`].

use crate::core::ast::*;
use crate::core::errors::ParseError;
use crate::core::expr::{parse_expr, Expr};
use crate::core::lexer::Cursor;

pub fn get_ast(source: &str) -> Result<TopLevel, ParseError> {
    let mut cur = Cursor::new(source);
    let mut items = Vec::new();
    loop {
        cur.skip_trivia();
        if cur.eof() {
            break;
        }
        items.push(parse_top_item(&mut cur)?);
    }
    Ok(TopLevel { items })
}

fn parse_top_item(cur: &mut Cursor<'_>) -> Result<TopItem, ParseError> {
    if cur.consume_keyword("trace") {
        return Ok(TopItem::Scope(ScopeBlock::Trace(parse_scope_body(cur)?)));
    }
    if cur.consume_keyword("env") {
        return Ok(TopItem::Scope(ScopeBlock::Env(parse_scope_body(cur)?)));
    }
    if cur.consume_keyword("clock") {
        return Ok(TopItem::Scope(ScopeBlock::Clock(parse_scope_body(cur)?)));
    }
    if cur.consume_keyword("stream") {
        return Ok(TopItem::Scope(ScopeBlock::Stream(parse_scope_body(cur)?)));
    }
    if cur.consume_keyword("event") {
        return Ok(TopItem::Scope(ScopeBlock::Event(parse_scope_body(cur)?)));
    }
    if cur.peek_keyword("typealias") {
        return Ok(TopItem::TypeAlias(parse_typealias(cur)?));
    }
    if cur.consume_keyword("struct") {
        let type_node = parse_struct_type(cur)?;
        cur.skip_trivia();
        cur.expect_char(';')?;
        return match type_node {
            TypeNode::StructFull(body) => Ok(TopItem::Struct(body)),
            _ => Err(cur.syntax_err("top-level `struct` declaration needs a body")),
        };
    }
    if cur.consume_keyword("variant") {
        let type_node = parse_variant_type(cur)?;
        cur.skip_trivia();
        cur.expect_char(';')?;
        return match type_node {
            TypeNode::VariantFull { tag, body } => Ok(TopItem::Variant { tag, body }),
            _ => Err(cur.syntax_err("top-level `variant` declaration needs a body")),
        };
    }
    Err(cur.syntax_err("expected trace/env/clock/stream/event/typealias/struct/variant"))
}

/// Parses the body of a `trace`/`env`/`clock`/`stream`/`event` scope: a
/// sequence of value assignments (`key = unary;`), type assignments
/// (`dotted.path := type;`), nested `typealias`es, and nested named
/// `struct`/`variant` declarations.
fn parse_scope_body(cur: &mut Cursor<'_>) -> Result<Vec<ScopeEntry>, ParseError> {
    cur.skip_trivia();
    cur.expect_char('{')?;
    let mut out = Vec::new();
    loop {
        cur.skip_trivia();
        if cur.peek() == Some('}') || cur.eof() {
            break;
        }
        if cur.peek_keyword("typealias") {
            out.push(ScopeEntry::TypeAlias(parse_typealias(cur)?));
            continue;
        }
        if cur.consume_keyword("struct") {
            let type_node = parse_struct_type(cur)?;
            cur.skip_trivia();
            cur.expect_char(';')?;
            match type_node {
                TypeNode::StructFull(body) => out.push(ScopeEntry::Struct(body)),
                _ => return Err(cur.syntax_err("nested `struct` declaration needs a body")),
            }
            continue;
        }
        if cur.consume_keyword("variant") {
            let type_node = parse_variant_type(cur)?;
            cur.skip_trivia();
            cur.expect_char(';')?;
            match type_node {
                TypeNode::VariantFull { tag, body } => out.push(ScopeEntry::Variant { tag, body }),
                _ => return Err(cur.syntax_err("nested `variant` declaration needs a body")),
            }
            continue;
        }

        let path = parse_dotted_key(cur)?;
        cur.skip_trivia();
        if cur.consume_str(":=") {
            let type_node = parse_type_node(cur)?;
            cur.skip_trivia();
            cur.expect_char(';')?;
            out.push(ScopeEntry::TypeAssign { path, type_node });
        } else if path.len() == 1 && cur.peek() == Some('=') && cur.peek_at(1) != Some('=') {
            cur.advance();
            let value = parse_expr(cur)?;
            cur.skip_trivia();
            cur.expect_char(';')?;
            out.push(ScopeEntry::Assignment(Assignment {
                key: path.into_iter().next().expect("len checked above"),
                value,
            }));
        } else {
            return Err(cur.syntax_err("expected `key = value;` or `path := type;`"));
        }
    }
    cur.expect_char('}')?;
    cur.skip_trivia();
    cur.consume_str(";");
    Ok(out)
}

/// `identifier ('.' identifier)*` - the left-hand side of a value or type
/// assignment inside a scope body (e.g. `freq`, `packet.header`).
fn parse_dotted_key(cur: &mut Cursor<'_>) -> Result<Vec<String>, ParseError> {
    let mut path = vec![cur.expect_identifier()?];
    loop {
        cur.skip_trivia();
        if cur.peek() == Some('.') {
            cur.advance();
            path.push(cur.expect_identifier()?);
        } else {
            break;
        }
    }
    Ok(path)
}

fn parse_typealias(cur: &mut Cursor<'_>) -> Result<TypeAliasNode, ParseError> {
    cur.consume_keyword("typealias");
    let type_node = parse_type_node(cur)?;
    cur.skip_trivia();
    if !cur.consume_str(":=") {
        return Err(cur.syntax_err("expected `:=` in typealias declaration"));
    }
    let alias = cur.expect_identifier()?;
    cur.skip_trivia();
    cur.expect_char(';')?;
    Ok(TypeAliasNode { type_node, alias })
}

fn parse_type_node(cur: &mut Cursor<'_>) -> Result<TypeNode, ParseError> {
    if cur.consume_keyword("integer") {
        cur.skip_trivia();
        cur.expect_char('{')?;
        let assignments = parse_assignments(cur, '}')?;
        cur.expect_char('}')?;
        return Ok(TypeNode::Integer(assignments));
    }
    if cur.consume_keyword("floating_point") {
        cur.skip_trivia();
        cur.expect_char('{')?;
        let assignments = parse_assignments(cur, '}')?;
        cur.expect_char('}')?;
        return Ok(TypeNode::FloatingPoint(assignments));
    }
    if cur.consume_keyword("string") {
        cur.skip_trivia();
        if cur.peek() == Some('{') {
            cur.advance();
            let assignments = parse_assignments(cur, '}')?;
            cur.expect_char('}')?;
            return Ok(TypeNode::String(assignments));
        }
        return Ok(TypeNode::String(Vec::new()));
    }
    if cur.consume_keyword("enum") {
        return parse_enum(cur);
    }
    if cur.consume_keyword("struct") {
        return parse_struct_type(cur);
    }
    if cur.consume_keyword("variant") {
        return parse_variant_type(cur);
    }
    if let Some(id) = cur.try_identifier() {
        return Ok(TypeNode::AliasRef(id));
    }
    Err(cur.syntax_err("expected a type"))
}

fn parse_assignments(cur: &mut Cursor<'_>, closing: char) -> Result<Vec<Assignment>, ParseError> {
    let mut out = Vec::new();
    loop {
        cur.skip_trivia();
        if cur.peek() == Some(closing) || cur.eof() {
            break;
        }
        let key = cur.expect_identifier()?;
        cur.skip_trivia();
        cur.expect_char('=')?;
        let value = parse_expr(cur)?;
        cur.skip_trivia();
        cur.expect_char(';')?;
        out.push(Assignment { key, value });
    }
    Ok(out)
}

/// `enum [Name] : <int-type-name> { enumerators }`. `Name` has no reference
/// form elsewhere in the grammar, so it's consumed and discarded; `:` and
/// the underlying integer type are mandatory.
fn parse_enum(cur: &mut Cursor<'_>) -> Result<TypeNode, ParseError> {
    cur.skip_trivia();
    if cur.peek_is_identifier() {
        cur.expect_identifier()?;
    }
    cur.skip_trivia();
    cur.expect_char(':')?;
    cur.skip_trivia();
    let base = Box::new(parse_type_node(cur)?);
    cur.skip_trivia();
    cur.expect_char('{')?;
    let mut enumerators = Vec::new();
    loop {
        cur.skip_trivia();
        if cur.peek() == Some('}') || cur.eof() {
            break;
        }
        let label = cur.expect_identifier()?;
        cur.skip_trivia();
        let kind = if cur.consume_str("=") {
            let low = cur
                .try_signed_number()
                .ok_or_else(|| cur.syntax_err("expected an enumerator value"))?;
            cur.skip_trivia();
            if cur.consume_str("...") {
                cur.skip_trivia();
                let high = cur
                    .try_signed_number()
                    .ok_or_else(|| cur.syntax_err("expected the range's high bound"))?;
                EnumeratorKind::Range(low, high)
            } else {
                EnumeratorKind::Value(low)
            }
        } else {
            EnumeratorKind::Bare
        };
        enumerators.push(EnumeratorNode { label, kind });
        cur.skip_trivia();
        if cur.peek() == Some(',') {
            cur.advance();
        } else {
            break;
        }
    }
    cur.skip_trivia();
    cur.expect_char('}')?;
    Ok(TypeNode::Enum(EnumNode { base, enumerators }))
}

fn parse_struct_type(cur: &mut Cursor<'_>) -> Result<TypeNode, ParseError> {
    cur.skip_trivia();
    let name = if cur.peek_is_identifier() {
        Some(cur.expect_identifier()?)
    } else {
        None
    };
    cur.skip_trivia();
    if cur.peek() != Some('{') {
        let name = name.ok_or_else(|| cur.syntax_err("expected a struct name or body"))?;
        return Ok(TypeNode::StructRef(name));
    }
    cur.advance();
    let entries = parse_struct_entries(cur)?;
    cur.expect_char('}')?;
    let align = parse_optional_align(cur)?;
    Ok(TypeNode::StructFull(StructBody { name, entries, align }))
}

/// Optional `align(N)` trailer following a struct body.
fn parse_optional_align(cur: &mut Cursor<'_>) -> Result<Option<u32>, ParseError> {
    cur.skip_trivia();
    if !cur.consume_keyword("align") {
        return Ok(None);
    }
    cur.skip_trivia();
    cur.expect_char('(')?;
    let n = cur
        .try_const_integer()
        .ok_or_else(|| cur.syntax_err("expected an alignment integer"))?;
    cur.skip_trivia();
    cur.expect_char(')')?;
    let n = u32::try_from(n).map_err(|_| cur.syntax_err("alignment must be non-negative"))?;
    Ok(Some(n))
}

fn parse_variant_type(cur: &mut Cursor<'_>) -> Result<TypeNode, ParseError> {
    cur.skip_trivia();
    let name = if cur.peek_is_identifier() {
        Some(cur.expect_identifier()?)
    } else {
        None
    };
    cur.skip_trivia();
    let tag = if cur.peek() == Some('<') {
        cur.advance();
        let expr = parse_expr(cur)?;
        cur.skip_trivia();
        cur.expect_char('>')?;
        Some(
            expr.as_dotted_path()
                .ok_or_else(|| cur.syntax_err("variant tag must be a dotted path"))?,
        )
    } else {
        None
    };
    cur.skip_trivia();
    if cur.peek() != Some('{') {
        let name = name.ok_or_else(|| cur.syntax_err("expected a variant name or body"))?;
        return Ok(TypeNode::VariantRef { name, tag });
    }
    cur.advance();
    let entries = parse_struct_entries(cur)?;
    cur.expect_char('}')?;
    Ok(TypeNode::VariantFull {
        tag,
        body: StructBody { name, entries, align: None },
    })
}

fn parse_struct_entries(cur: &mut Cursor<'_>) -> Result<Vec<Entry>, ParseError> {
    let mut out = Vec::new();
    loop {
        cur.skip_trivia();
        if cur.peek() == Some('}') || cur.eof() {
            break;
        }
        if cur.peek_keyword("typealias") {
            out.push(Entry::TypeAlias(parse_typealias(cur)?));
            continue;
        }
        // `struct`/`variant` leads both a nested declaration (`struct Name {
        // ... };`, terminated right after the body) and a type-led field
        // (`struct Name x;`, `struct { ... } x;` - the body is just this
        // field's type). Parse the type node first, then decide from
        // whether a field name follows.
        if cur.peek_keyword("struct") {
            cur.consume_keyword("struct");
            let type_node = parse_struct_type(cur)?;
            cur.skip_trivia();
            if cur.peek() == Some(';') {
                cur.advance();
                match type_node {
                    TypeNode::StructFull(body) => out.push(Entry::Struct(body)),
                    _ => return Err(cur.syntax_err("nested `struct` declaration needs a body")),
                }
                continue;
            }
            let name = cur.expect_identifier()?;
            out.push(Entry::Field(finish_field(cur, type_node, name)?));
            continue;
        }
        if cur.peek_keyword("variant") {
            cur.consume_keyword("variant");
            let type_node = parse_variant_type(cur)?;
            cur.skip_trivia();
            if cur.peek() == Some(';') {
                cur.advance();
                match type_node {
                    TypeNode::VariantFull { tag, body } => out.push(Entry::Variant { tag, body }),
                    _ => return Err(cur.syntax_err("nested `variant` declaration needs a body")),
                }
                continue;
            }
            let name = cur.expect_identifier()?;
            out.push(Entry::Field(finish_field(cur, type_node, name)?));
            continue;
        }
        out.push(Entry::Field(parse_field(cur)?));
    }
    Ok(out)
}

/// Parses one field declaration, disambiguating the type-led form
/// (`integer { ... } x;`, `enum color x;`) from the identifier-led form
/// where a multi-token alias name precedes the field name (`unsigned long
/// x;` reads as alias "unsigned long", field "x"). The caller handles
/// `struct`/`variant`-led entries itself, since those can also be bodyless
/// nested declarations rather than fields.
fn parse_field(cur: &mut Cursor<'_>) -> Result<FieldNode, ParseError> {
    cur.skip_trivia();
    let is_typed_lead = cur.peek_keyword("enum")
        || cur.peek_keyword("integer")
        || cur.peek_keyword("floating_point")
        || cur.peek_keyword("string");

    if is_typed_lead {
        let type_node = parse_type_node(cur)?;
        let name = cur.expect_identifier()?;
        return finish_field(cur, type_node, name);
    }

    let mut idents = vec![cur.expect_identifier()?];
    loop {
        cur.skip_trivia();
        if cur.peek_is_identifier() {
            idents.push(cur.expect_identifier()?);
        } else {
            break;
        }
    }
    let name = idents
        .pop()
        .expect("at least one identifier was collected");
    let alias = idents.join(" ");
    finish_field(cur, TypeNode::AliasRef(alias), name)
}

enum Subscript {
    Expr(Expr),
}

fn finish_field(
    cur: &mut Cursor<'_>,
    base_type: TypeNode,
    name: String,
) -> Result<FieldNode, ParseError> {
    let mut subs = Vec::new();
    loop {
        cur.skip_trivia();
        if cur.peek() == Some('[') {
            cur.advance();
            let inner = parse_expr(cur)?;
            cur.skip_trivia();
            cur.expect_char(']')?;
            subs.push(Subscript::Expr(inner));
        } else {
            break;
        }
    }
    cur.skip_trivia();
    cur.expect_char(';')?;

    // First-read subscript is outermost: fold from the last one read inward
    // so it ends up wrapping everything else.
    let mut type_node = base_type;
    for Subscript::Expr(inner) in subs.into_iter().rev() {
        type_node = match inner.as_const_integer() {
            Some(size) => TypeNode::Array {
                base: Box::new(type_node),
                size,
            },
            None => {
                let path = inner.as_dotted_path().ok_or_else(|| {
                    cur.syntax_err("array/sequence subscript must be a constant integer or a dotted path")
                })?;
                TypeNode::Sequence {
                    base: Box::new(type_node),
                    length_path: path,
                }
            }
        };
    }

    Ok(FieldNode { type_node, name })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_integer_typealias() {
        let ast = get_ast("typealias integer { size = 32; align = 8; signed = false; } := uint32_t;").unwrap();
        assert_eq!(ast.items.len(), 1);
        match &ast.items[0] {
            TopItem::TypeAlias(node) => {
                assert_eq!(node.alias, "uint32_t");
                assert!(matches!(node.type_node, TypeNode::Integer(_)));
            }
            _ => panic!("expected typealias"),
        }
    }

    #[test]
    fn parses_struct_with_identifier_led_field() {
        let ast = get_ast("struct header { uint32_t magic; };").unwrap();
        match &ast.items[0] {
            TopItem::Struct(body) => {
                assert_eq!(body.name.as_deref(), Some("header"));
                assert_eq!(body.entries.len(), 1);
                match &body.entries[0] {
                    Entry::Field(f) => {
                        assert_eq!(f.name, "magic");
                        assert_eq!(f.type_node, TypeNode::AliasRef("uint32_t".to_string()));
                    }
                    _ => panic!("expected field"),
                }
            }
            _ => panic!("expected struct"),
        }
    }

    #[test]
    fn parses_array_and_sequence_subscripts() {
        let ast = get_ast("struct s { uint8_t fixed[4]; uint8_t var[len]; };").unwrap();
        match &ast.items[0] {
            TopItem::Struct(body) => {
                let fixed = match &body.entries[0] {
                    Entry::Field(f) => &f.type_node,
                    _ => panic!(),
                };
                assert!(matches!(fixed, TypeNode::Array { size: 4, .. }));
                let var = match &body.entries[1] {
                    Entry::Field(f) => &f.type_node,
                    _ => panic!(),
                };
                match var {
                    TypeNode::Sequence { length_path, .. } => {
                        assert_eq!(length_path, &vec!["len".to_string()])
                    }
                    _ => panic!("expected sequence"),
                }
            }
            _ => panic!("expected struct"),
        }
    }

    #[test]
    fn parses_enum_with_auto_increment_and_range() {
        let ast = get_ast("typealias enum : integer { size = 8; } { A, B = 5, C = 7...10, D } := color;").unwrap();
        match &ast.items[0] {
            TopItem::TypeAlias(node) => match &node.type_node {
                TypeNode::Enum(e) => {
                    assert_eq!(e.enumerators.len(), 4);
                    assert_eq!(e.enumerators[0].kind, EnumeratorKind::Bare);
                    assert_eq!(e.enumerators[1].kind, EnumeratorKind::Value(5));
                    assert_eq!(e.enumerators[2].kind, EnumeratorKind::Range(7, 10));
                }
                _ => panic!("expected enum"),
            },
            _ => panic!("expected typealias"),
        }
    }

    #[test]
    fn parses_named_enum_with_discarded_name() {
        let ast = get_ast(
            "typealias enum color : integer { size = 8; } { RED, GREEN } := palette;",
        )
        .unwrap();
        match &ast.items[0] {
            TopItem::TypeAlias(node) => match &node.type_node {
                TypeNode::Enum(e) => assert_eq!(e.enumerators.len(), 2),
                _ => panic!("expected enum"),
            },
            _ => panic!("expected typealias"),
        }
    }

    #[test]
    fn enum_without_base_is_a_syntax_error() {
        let err = get_ast("typealias enum { A, B } := bad;").unwrap_err();
        assert!(matches!(err.kind, crate::core::errors::ParseErrorKind::SyntaxError(_)));
    }

    #[test]
    fn parses_trace_block_with_assignments() {
        let ast = get_ast(r#"trace { major = 1; minor = 8; byte_order = le; };"#).unwrap();
        match &ast.items[0] {
            TopItem::Scope(ScopeBlock::Trace(entries)) => {
                assert_eq!(entries.len(), 3);
            }
            _ => panic!("expected trace scope"),
        }
    }

    #[test]
    fn parses_variant_with_tag() {
        let ast = get_ast("variant v <event.header.id> { integer { size = 32; } a; };").unwrap();
        match &ast.items[0] {
            TopItem::Variant { tag, body } => {
                assert_eq!(
                    tag,
                    &Some(vec!["event".to_string(), "header".to_string(), "id".to_string()])
                );
                assert_eq!(body.name.as_deref(), Some("v"));
            }
            _ => panic!("expected variant"),
        }
    }

    #[test]
    fn parses_nested_struct_declaration_inside_struct_body() {
        let ast = get_ast(
            "struct outer { struct inner { integer { size = 8; } a; }; inner b; };",
        )
        .unwrap();
        match &ast.items[0] {
            TopItem::Struct(body) => {
                assert_eq!(body.entries.len(), 2);
                match &body.entries[0] {
                    Entry::Struct(inner) => assert_eq!(inner.name.as_deref(), Some("inner")),
                    _ => panic!("expected nested struct declaration"),
                }
                match &body.entries[1] {
                    Entry::Field(f) => assert_eq!(f.name, "b"),
                    _ => panic!("expected field"),
                }
            }
            _ => panic!("expected struct"),
        }
    }

    #[test]
    fn nested_struct_reference_field_still_parses_as_a_field() {
        let ast = get_ast(
            "struct outer { struct inner { integer { size = 8; } a; }; struct inner b; };",
        )
        .unwrap();
        match &ast.items[0] {
            TopItem::Struct(body) => {
                assert_eq!(body.entries.len(), 2);
                match &body.entries[1] {
                    Entry::Field(f) => {
                        assert_eq!(f.name, "b");
                        assert_eq!(f.type_node, TypeNode::StructRef("inner".to_string()));
                    }
                    _ => panic!("expected field"),
                }
            }
            _ => panic!("expected struct"),
        }
    }
}
