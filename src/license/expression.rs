//! SPDX license expressions: parsing, rendering and the "satisfies one of a
//! disjunction" check used to decide whether a license is green.

use std::fmt;

use thiserror::Error;

use crate::license::spdx;

/// Marker npm uses for packages that grant no license at all.
pub const UNLICENSED: &str = "UNLICENSED";

#[derive(Debug, Error, PartialEq)]
pub enum ExpressionError {
    #[error("empty license expression")]
    Empty,
    #[error("unexpected token {0:?} in license expression")]
    UnexpectedToken(String),
    #[error("unbalanced parentheses in license expression")]
    UnbalancedParens,
    #[error("missing exception after WITH")]
    MissingException,
    #[error("unknown license identifier {0:?}")]
    UnknownLicense(String),
}

/// A parsed license expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    License(String),
    With { license: String, exception: String },
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
}

impl Expression {
    /// Rewrite every identifier with `f`, failing if any rewrite fails.
    pub fn try_map_ids<F>(self, f: &mut F) -> Option<Expression>
    where
        F: FnMut(&str) -> Option<String>,
    {
        Some(match self {
            Expression::License(id) => Expression::License(f(&id)?),
            Expression::With { license, exception } => Expression::With {
                license: f(&license)?,
                exception: spdx::canonical_exception(&exception)
                    .map(str::to_string)
                    .unwrap_or(exception),
            },
            Expression::And(a, b) => Expression::And(
                Box::new((*a).try_map_ids(f)?),
                Box::new((*b).try_map_ids(f)?),
            ),
            Expression::Or(a, b) => Expression::Or(
                Box::new((*a).try_map_ids(f)?),
                Box::new((*b).try_map_ids(f)?),
            ),
        })
    }

    /// Whether the expression contains any operator.
    pub fn is_compound(&self) -> bool {
        !matches!(self, Expression::License(_))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::License(id) => write!(f, "{}", id),
            Expression::With { license, exception } => write!(f, "{} WITH {}", license, exception),
            Expression::Or(a, b) => write!(f, "{} OR {}", a, b),
            Expression::And(a, b) => {
                for (i, side) in [a, b].into_iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    if matches!(**side, Expression::Or(..)) {
                        write!(f, "({})", side)?;
                    } else {
                        write!(f, "{}", side)?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
enum Token {
    Id(String),
    And,
    Or,
    With,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '(' {
            tokens.push(Token::LParen);
            chars.next();
        } else if c == ')' {
            tokens.push(Token::RParen);
            chars.next();
        } else {
            let mut s = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '(' || c == ')' {
                    break;
                }
                s.push(c);
                chars.next();
            }
            let token = match s.to_ascii_uppercase().as_str() {
                "AND" => Token::And,
                "OR" => Token::Or,
                "WITH" => Token::With,
                _ => Token::Id(s),
            };
            tokens.push(token);
        }
    }
    tokens
}

/// Recursive descent parser. `AND` binds tighter than `OR`:
///
/// ```text
/// or_expr  := and_expr ( "OR" and_expr )*
/// and_expr := atom ( "AND" atom )*
/// atom     := "(" or_expr ")" | id ( "WITH" id )?
/// ```
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn parse_or(&mut self) -> Result<Expression, ExpressionError> {
        let mut result = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.consume();
            let rhs = self.parse_and()?;
            result = Expression::Or(Box::new(result), Box::new(rhs));
        }
        Ok(result)
    }

    fn parse_and(&mut self) -> Result<Expression, ExpressionError> {
        let mut result = self.parse_atom()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.consume();
            let rhs = self.parse_atom()?;
            result = Expression::And(Box::new(result), Box::new(rhs));
        }
        Ok(result)
    }

    fn parse_atom(&mut self) -> Result<Expression, ExpressionError> {
        match self.consume() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.consume() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ExpressionError::UnbalancedParens),
                }
            }
            Some(Token::Id(license)) => {
                if !matches!(self.peek(), Some(Token::With)) {
                    return Ok(Expression::License(license));
                }
                self.consume();
                match self.consume() {
                    Some(Token::Id(exception)) => Ok(Expression::With { license, exception }),
                    _ => Err(ExpressionError::MissingException),
                }
            }
            Some(Token::RParen) => Err(ExpressionError::UnbalancedParens),
            Some(other) => Err(ExpressionError::UnexpectedToken(format!("{:?}", other))),
            None => Err(ExpressionError::Empty),
        }
    }
}

/// Parse a license expression without checking that its identifiers exist.
pub fn parse(expr: &str) -> Result<Expression, ExpressionError> {
    let tokens = tokenize(expr);
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expression = parser.parse_or()?;
    match parser.consume() {
        None => Ok(expression),
        Some(Token::RParen) => Err(ExpressionError::UnbalancedParens),
        Some(Token::Id(id)) => Err(ExpressionError::UnexpectedToken(id)),
        Some(other) => Err(ExpressionError::UnexpectedToken(format!("{:?}", other))),
    }
}

/// Whether `candidate` is acceptable when any one of `allowed` is acceptable.
///
/// `OR` needs one acceptable side, `AND` needs both, and a `WITH` exception is
/// judged by its base license. Fails when the candidate names an identifier
/// that is not a known SPDX license.
pub fn satisfies(candidate: &Expression, allowed: &[String]) -> Result<bool, ExpressionError> {
    match candidate {
        Expression::License(id) | Expression::With { license: id, .. } => {
            satisfies_id(id, allowed)
        }
        Expression::Or(a, b) => Ok(satisfies(a, allowed)? || satisfies(b, allowed)?),
        Expression::And(a, b) => Ok(satisfies(a, allowed)? && satisfies(b, allowed)?),
    }
}

fn satisfies_id(id: &str, allowed: &[String]) -> Result<bool, ExpressionError> {
    if id == UNLICENSED {
        return Ok(allowed.iter().any(|a| a == UNLICENSED));
    }
    if !spdx::is_known_id(id) {
        return Err(ExpressionError::UnknownLicense(id.to_string()));
    }
    let candidate = LicenseReq::new(id);
    Ok(allowed
        .iter()
        .any(|a| candidate.compatible_with(&LicenseReq::new(a))))
}

/// A single identifier split into family, version and range marker,
/// e.g. `GPL-2.0-or-later` -> (`GPL`, `2.0`, or later).
#[derive(Debug)]
struct LicenseReq<'a> {
    base: &'a str,
    family: &'a str,
    version: Option<Vec<u32>>,
    or_later: bool,
}

impl<'a> LicenseReq<'a> {
    fn new(id: &'a str) -> Self {
        let (base, or_later) = if let Some(base) = id.strip_suffix('+') {
            (base, true)
        } else if let Some(base) = id.strip_suffix("-or-later") {
            (base, true)
        } else {
            (id.strip_suffix("-only").unwrap_or(id), false)
        };

        let (family, version) = match base.rsplit_once('-') {
            Some((family, version)) if version.starts_with(|c: char| c.is_ascii_digit()) => {
                (family, parse_version(version))
            }
            _ => (base, None),
        };

        LicenseReq {
            base,
            family,
            version,
            or_later,
        }
    }

    fn compatible_with(&self, allowed: &LicenseReq<'_>) -> bool {
        if self.base == allowed.base {
            return true;
        }
        if self.family != allowed.family {
            return false;
        }
        match (&self.version, &allowed.version) {
            (Some(mine), Some(theirs)) => {
                (allowed.or_later && mine >= theirs) || (self.or_later && theirs >= mine)
            }
            _ => false,
        }
    }
}

fn parse_version(v: &str) -> Option<Vec<u32>> {
    let parts: Option<Vec<u32>> = v.split('.').map(|p| p.parse().ok()).collect();
    parts.filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_precedence() {
        let expr = parse("MIT OR GPL-3.0 AND BSD-3-Clause").unwrap();
        assert_eq!(
            expr,
            Expression::Or(
                Box::new(Expression::License("MIT".into())),
                Box::new(Expression::And(
                    Box::new(Expression::License("GPL-3.0".into())),
                    Box::new(Expression::License("BSD-3-Clause".into())),
                )),
            )
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse(""), Err(ExpressionError::Empty));
        assert_eq!(parse("(MIT OR ISC"), Err(ExpressionError::UnbalancedParens));
        assert_eq!(parse("MIT OR"), Err(ExpressionError::Empty));
        assert_eq!(parse("GPL-2.0 WITH"), Err(ExpressionError::MissingException));
        assert!(matches!(
            parse("MIT ISC"),
            Err(ExpressionError::UnexpectedToken(_))
        ));
    }

    #[test]
    fn test_display_keeps_grouping() {
        let expr = parse("(MIT OR ISC) AND Apache-2.0").unwrap();
        assert_eq!(expr.to_string(), "(MIT OR ISC) AND Apache-2.0");
        let expr = parse("(MIT OR ISC)").unwrap();
        assert_eq!(expr.to_string(), "MIT OR ISC");
    }

    #[test]
    fn test_or_needs_one_side() {
        let allowed = allow(&["MIT"]);
        assert!(satisfies(&parse("MIT OR GPL-3.0").unwrap(), &allowed).unwrap());
        assert!(!satisfies(&parse("GPL-2.0 OR GPL-3.0").unwrap(), &allowed).unwrap());
    }

    #[test]
    fn test_and_needs_both_sides() {
        let allowed = allow(&["MIT", "ISC"]);
        assert!(satisfies(&parse("MIT AND ISC").unwrap(), &allowed).unwrap());
        assert!(!satisfies(&parse("MIT AND GPL-3.0").unwrap(), &allowed).unwrap());
        assert!(satisfies(&parse("(MIT OR GPL-3.0) AND ISC").unwrap(), &allowed).unwrap());
    }

    #[test]
    fn test_with_exception_uses_base_license() {
        let allowed = allow(&["GPL-2.0"]);
        let expr = parse("GPL-2.0 WITH Classpath-exception-2.0").unwrap();
        assert!(satisfies(&expr, &allowed).unwrap());
    }

    #[test]
    fn test_version_ranges() {
        assert!(satisfies(&parse("GPL-3.0").unwrap(), &allow(&["GPL-2.0+"])).unwrap());
        assert!(satisfies(&parse("GPL-2.0+").unwrap(), &allow(&["GPL-3.0"])).unwrap());
        assert!(satisfies(&parse("GPL-2.0-only").unwrap(), &allow(&["GPL-2.0"])).unwrap());
        assert!(!satisfies(&parse("GPL-2.0").unwrap(), &allow(&["GPL-3.0-or-later"])).unwrap());
        assert!(!satisfies(&parse("LGPL-3.0").unwrap(), &allow(&["GPL-2.0+"])).unwrap());
    }

    #[test]
    fn test_unknown_identifier_is_an_error() {
        let result = satisfies(&parse("EVIL").unwrap(), &allow(&["MIT"]));
        assert_eq!(result, Err(ExpressionError::UnknownLicense("EVIL".into())));
    }

    #[test]
    fn test_unlicensed_only_matches_itself() {
        let expr = Expression::License(UNLICENSED.into());
        assert!(!satisfies(&expr, &allow(&["MIT"])).unwrap());
        assert!(satisfies(&expr, &allow(&["MIT", UNLICENSED])).unwrap());
    }
}
