//! Expression grammar: the small postfix-chain language used wherever TSDL
//! allows a dotted path or a bare literal as a value (declarator subscripts,
//! `map = clock.x.value;`, enum label values, key=value assignments).

use crate::core::lexer::Cursor;
use crate::core::errors::ParseError;

/// A single link in a postfix chain: `.ident`, `->ident`, or `[expr]`.
#[derive(Debug, Clone, PartialEq)]
pub enum PostfixOp {
    Dot(String),
    /// `->` is grammatically and semantically identical to `.` in TSDL
    /// (spec glossary: "`->` is accepted as a synonym for `.`").
    Arrow(String),
    Index(Box<Expr>),
}

/// An expression as it appears on the right-hand side of `=` or inside `[ ]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    Number(i64),
    Str(String),
    /// `(expr)`
    Paren(Box<Expr>),
    /// A primary expression followed by zero or more postfix operators.
    Postfix(Box<Expr>, Vec<PostfixOp>),
}

impl Expr {
    /// Flatten a dotted-path expression (`a.b.c`, `a->b->c`, or a mix) into
    /// its component identifiers. Returns `None` if the expression contains
    /// anything other than an identifier followed by dot/arrow links to
    /// further identifiers (no subscripts, no literals).
    pub fn as_dotted_path(&self) -> Option<Vec<String>> {
        match self {
            Expr::Ident(name) => Some(vec![name.clone()]),
            Expr::Postfix(base, ops) => {
                let mut path = base.as_dotted_path()?;
                for op in ops {
                    match op {
                        PostfixOp::Dot(name) | PostfixOp::Arrow(name) => path.push(name.clone()),
                        PostfixOp::Index(_) => return None,
                    }
                }
                Some(path)
            }
            _ => None,
        }
    }

    /// An expression that resolves to a plain integer constant, e.g. a
    /// literal number or a parenthesized one.
    pub fn as_const_integer(&self) -> Option<i64> {
        match self {
            Expr::Number(n) => Some(*n),
            Expr::Paren(inner) => inner.as_const_integer(),
            _ => None,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn as_str_literal(&self) -> Option<&str> {
        match self {
            Expr::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Parse a `UnaryExpr` / `PostfixExpr` (the grammar never nests arithmetic
/// beyond a postfix chain - TSDL has no operators of its own besides `.`/`->`
/// and subscript `[ ]`).
pub fn parse_expr(cur: &mut Cursor<'_>) -> Result<Expr, ParseError> {
    let primary = parse_primary(cur)?;
    let mut ops = Vec::new();
    loop {
        cur.skip_trivia();
        if cur.consume_str(".") {
            let name = cur.expect_identifier()?;
            ops.push(PostfixOp::Dot(name));
        } else if cur.consume_str("->") {
            let name = cur.expect_identifier()?;
            ops.push(PostfixOp::Arrow(name));
        } else if cur.peek() == Some('[') {
            cur.advance();
            let inner = parse_expr(cur)?;
            cur.expect_char(']')?;
            ops.push(PostfixOp::Index(Box::new(inner)));
        } else {
            break;
        }
    }
    if ops.is_empty() {
        Ok(primary)
    } else {
        Ok(Expr::Postfix(Box::new(primary), ops))
    }
}

fn parse_primary(cur: &mut Cursor<'_>) -> Result<Expr, ParseError> {
    cur.skip_trivia();
    if cur.peek() == Some('(') {
        cur.advance();
        let inner = parse_expr(cur)?;
        cur.expect_char(')')?;
        return Ok(Expr::Paren(Box::new(inner)));
    }
    if let Some(s) = cur.try_literal_string()? {
        return Ok(Expr::Str(s));
    }
    if let Some(n) = cur.try_signed_number() {
        return Ok(Expr::Number(n));
    }
    if let Some(id) = cur.try_identifier() {
        return Ok(Expr::Ident(id));
    }
    Err(cur.syntax_err("expected an expression"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_path_with_dot() {
        let mut cur = Cursor::new("clock.monotonic.value");
        let expr = parse_expr(&mut cur).unwrap();
        assert_eq!(
            expr.as_dotted_path(),
            Some(vec![
                "clock".to_string(),
                "monotonic".to_string(),
                "value".to_string()
            ])
        );
    }

    #[test]
    fn arrow_is_equivalent_to_dot() {
        let mut cur = Cursor::new("clock->monotonic->value");
        let expr = parse_expr(&mut cur).unwrap();
        assert_eq!(
            expr.as_dotted_path(),
            Some(vec![
                "clock".to_string(),
                "monotonic".to_string(),
                "value".to_string()
            ])
        );
    }

    #[test]
    fn subscript_breaks_dotted_path() {
        let mut cur = Cursor::new("foo[4]");
        let expr = parse_expr(&mut cur).unwrap();
        assert_eq!(expr.as_dotted_path(), None);
    }

    #[test]
    fn number_literal() {
        let mut cur = Cursor::new("42");
        let expr = parse_expr(&mut cur).unwrap();
        assert_eq!(expr.as_const_integer(), Some(42));
    }
}
