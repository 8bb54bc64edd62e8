//! Default `$filter` grammar: the OData boolean subset.
//!
//! Grammar, loosest first: `or`, `and`, then comparisons
//! (`eq ne gt ge lt le`) over a property and a literal, parenthesized
//! groups, and function calls such as `substringof('x', field)`. Literals
//! are single-quoted strings (`''` escapes a quote), numbers, `true`,
//! `false`, `null` and `datetime'...'`.

use crate::errors::QueryError;
use crate::query::filter::{CompareOp, FilterExpr, FilterGrammar, Operand};
use crate::query::types::MAX_FILTER_DEPTH;
use crate::utils::time::parse_datetime;
use bson::Bson;

/// The crate's stock [`FilterGrammar`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ODataGrammar;

impl FilterGrammar for ODataGrammar {
    fn parse_filter(&self, input: &str) -> Result<FilterExpr, QueryError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or(0)?;
        match parser.peek() {
            None => Ok(expr),
            Some(tok) => Err(invalid(format!("unexpected trailing {}", tok.describe()))),
        }
    }
}

fn invalid(msg: impl Into<String>) -> QueryError {
    QueryError::InvalidFilterExpression(msg.into())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(String),
    DateTime(String),
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("`{s}`"),
            Token::Str(_) => "string literal".into(),
            Token::Num(n) => format!("`{n}`"),
            Token::DateTime(_) => "datetime literal".into(),
            Token::LParen => "`(`".into(),
            Token::RParen => "`)`".into(),
            Token::Comma => "`,`".into(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            b'\'' => {
                let (s, next) = lex_quoted(input, i)?;
                tokens.push(Token::Str(s));
                i = next;
            }
            b'-' | b'0'..=b'9' => {
                let (n, next) = lex_number(input, i)?;
                tokens.push(Token::Num(n));
                i = next;
            }
            _ if is_ident_start(c) => {
                let start = i;
                i += 1;
                while i < bytes.len() && is_ident_part(bytes[i]) {
                    i += 1;
                }
                let word = &input[start..i];
                if word == "datetime" && i < bytes.len() && bytes[i] == b'\'' {
                    let (s, next) = lex_quoted(input, i)?;
                    tokens.push(Token::DateTime(s));
                    i = next;
                } else {
                    tokens.push(Token::Ident(word.to_string()));
                }
            }
            _ => {
                return Err(invalid(format!(
                    "unexpected character `{}` at offset {i}",
                    &input[i..].chars().next().unwrap_or('?')
                )));
            }
        }
    }
    Ok(tokens)
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$'
}

fn is_ident_part(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'_' | b'$' | b'.' | b'/')
}

/// Lexes a `'...'` literal starting at the opening quote; `''` inside is an
/// escaped quote. Returns the unescaped text and the offset past the close.
fn lex_quoted(input: &str, start: usize) -> Result<(String, usize), QueryError> {
    let bytes = input.as_bytes();
    let mut out = String::new();
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                out.push('\'');
                i += 2;
            } else {
                return Ok((out, i + 1));
            }
        } else {
            let ch = input[i..].chars().next().unwrap_or('\u{fffd}');
            out.push(ch);
            i += ch.len_utf8();
        }
    }
    Err(invalid("unterminated string literal"))
}

fn lex_number(input: &str, start: usize) -> Result<(String, usize), QueryError> {
    let bytes = input.as_bytes();
    let mut i = start;
    if bytes[i] == b'-' {
        i += 1;
        if i >= bytes.len() || !bytes[i].is_ascii_digit() {
            return Err(invalid(format!("stray `-` at offset {start}")));
        }
    }
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    Ok((input[start..i].to_string(), i))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_ahead(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<(), QueryError> {
        match self.bump() {
            Some(tok) if tok == *expected => Ok(()),
            Some(tok) => {
                Err(invalid(format!("expected {}, found {}", expected.describe(), tok.describe())))
            }
            None => Err(invalid(format!("expected {}, found end of input", expected.describe()))),
        }
    }

    fn at_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s == word)
    }

    fn parse_or(&mut self, depth: usize) -> Result<FilterExpr, QueryError> {
        let mut expr = self.parse_and(depth)?;
        while self.at_keyword("or") {
            self.bump();
            let right = self.parse_and(depth)?;
            expr = FilterExpr::Or(Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn parse_and(&mut self, depth: usize) -> Result<FilterExpr, QueryError> {
        let mut expr = self.parse_term(depth)?;
        while self.at_keyword("and") {
            self.bump();
            let right = self.parse_term(depth)?;
            expr = FilterExpr::And(Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn parse_term(&mut self, depth: usize) -> Result<FilterExpr, QueryError> {
        if depth > MAX_FILTER_DEPTH {
            return Err(invalid("filter nesting too deep"));
        }
        match self.peek() {
            Some(Token::LParen) => {
                self.bump();
                let expr = self.parse_or(depth + 1)?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Ident(_)) if matches!(self.peek_ahead(), Some(Token::LParen)) => {
                self.parse_call()
            }
            Some(_) => self.parse_comparison(),
            None => Err(invalid("empty filter expression")),
        }
    }

    fn parse_call(&mut self) -> Result<FilterExpr, QueryError> {
        let Some(Token::Ident(function)) = self.bump() else {
            return Err(invalid("expected a function name"));
        };
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if !matches!(self.peek(), Some(Token::RParen)) {
            loop {
                args.push(self.parse_operand()?);
                if matches!(self.peek(), Some(Token::Comma)) {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        Ok(FilterExpr::Call { function, args })
    }

    fn parse_comparison(&mut self) -> Result<FilterExpr, QueryError> {
        let left = self.parse_operand()?;
        let op = match self.bump() {
            Some(Token::Ident(word)) => match word.as_str() {
                "eq" => CompareOp::Eq,
                "ne" => CompareOp::Ne,
                "gt" => CompareOp::Gt,
                "ge" => CompareOp::Ge,
                "lt" => CompareOp::Lt,
                "le" => CompareOp::Le,
                other => return Err(invalid(format!("expected a comparison operator, found `{other}`"))),
            },
            Some(tok) => {
                return Err(invalid(format!("expected a comparison operator, found {}", tok.describe())));
            }
            None => return Err(invalid("expected a comparison operator, found end of input")),
        };
        let right = self.parse_operand()?;
        Ok(FilterExpr::Compare { op, left, right })
    }

    fn parse_operand(&mut self) -> Result<Operand, QueryError> {
        match self.bump() {
            Some(Token::Str(s)) => Ok(Operand::Literal(Bson::String(s))),
            Some(Token::Num(raw)) => Ok(Operand::Literal(parse_number(&raw)?)),
            Some(Token::DateTime(s)) => match parse_datetime(&s) {
                Some(dt) => Ok(Operand::Literal(Bson::DateTime(dt))),
                None => Err(invalid(format!("invalid datetime literal `{s}`"))),
            },
            Some(Token::Ident(word)) => Ok(match word.as_str() {
                "true" => Operand::Literal(Bson::Boolean(true)),
                "false" => Operand::Literal(Bson::Boolean(false)),
                "null" => Operand::Literal(Bson::Null),
                _ => Operand::Property(word),
            }),
            Some(tok) => Err(invalid(format!("expected an operand, found {}", tok.describe()))),
            None => Err(invalid("expected an operand, found end of input")),
        }
    }
}

fn parse_number(raw: &str) -> Result<Bson, QueryError> {
    if raw.contains('.') {
        raw.parse::<f64>()
            .map(Bson::Double)
            .map_err(|_| invalid(format!("invalid number `{raw}`")))
    } else if let Ok(v) = raw.parse::<i64>() {
        Ok(Bson::Int64(v))
    } else {
        raw.parse::<f64>()
            .map(Bson::Double)
            .map_err(|_| invalid(format!("invalid number `{raw}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<FilterExpr, QueryError> {
        ODataGrammar.parse_filter(input)
    }

    #[test]
    fn simple_equality() {
        let expr = parse("name eq 'Nick'").unwrap();
        assert_eq!(
            expr,
            FilterExpr::Compare {
                op: CompareOp::Eq,
                left: Operand::Property("name".into()),
                right: Operand::Literal(Bson::String("Nick".into())),
            }
        );
    }

    #[test]
    fn quoted_escape() {
        let expr = parse("name eq 'O''Brien'").unwrap();
        let FilterExpr::Compare { right: Operand::Literal(Bson::String(s)), .. } = expr else {
            panic!("expected string literal");
        };
        assert_eq!(s, "O'Brien");
    }

    #[test]
    fn precedence_or_under_and() {
        // a eq 1 or b eq 2 and c eq 3  ==  a eq 1 or (b eq 2 and c eq 3)
        let expr = parse("a eq 1 or b eq 2 and c eq 3").unwrap();
        assert!(matches!(expr, FilterExpr::Or(_, _)));
        let FilterExpr::Or(_, right) = expr else { unreachable!() };
        assert!(matches!(*right, FilterExpr::And(_, _)));
    }

    #[test]
    fn parens_group() {
        let expr = parse("(a eq 1 or b eq 2) and c eq 3").unwrap();
        assert!(matches!(expr, FilterExpr::And(_, _)));
    }

    #[test]
    fn numbers_and_booleans() {
        let expr = parse("age ge 21").unwrap();
        let FilterExpr::Compare { right: Operand::Literal(v), .. } = expr else { unreachable!() };
        assert_eq!(v, Bson::Int64(21));
        let expr = parse("score lt -1.5").unwrap();
        let FilterExpr::Compare { right: Operand::Literal(v), .. } = expr else { unreachable!() };
        assert_eq!(v, Bson::Double(-1.5));
        let expr = parse("active eq true").unwrap();
        let FilterExpr::Compare { right: Operand::Literal(v), .. } = expr else { unreachable!() };
        assert_eq!(v, Bson::Boolean(true));
    }

    #[test]
    fn datetime_literal() {
        let expr = parse("created ge datetime'2016-01-01T00:00:00Z'").unwrap();
        let FilterExpr::Compare { right: Operand::Literal(Bson::DateTime(dt)), .. } = expr else {
            panic!("expected datetime literal");
        };
        assert_eq!(dt.timestamp_millis(), 1_451_606_400_000);
    }

    #[test]
    fn function_call_args() {
        let expr = parse("substringof('nick', name)").unwrap();
        let FilterExpr::Call { function, args } = expr else { panic!("expected call") };
        assert_eq!(function, "substringof");
        assert_eq!(args.len(), 2);
        assert_eq!(args[0], Operand::Literal(Bson::String("nick".into())));
        assert_eq!(args[1], Operand::Property("name".into()));
    }

    #[test]
    fn slash_paths_lex_as_one_property() {
        let expr = parse("field1/field2 eq 'a'").unwrap();
        let FilterExpr::Compare { left: Operand::Property(name), .. } = expr else {
            unreachable!()
        };
        assert_eq!(name, "field1/field2");
    }

    #[test]
    fn malformed_inputs() {
        assert!(parse("").is_err());
        assert!(parse("name eq").is_err());
        assert!(parse("name 'a'").is_err());
        assert!(parse("name eq 'unterminated").is_err());
        assert!(parse("(a eq 1").is_err());
        assert!(parse("a eq 1 b eq 2").is_err());
        assert!(parse("name eq datetime'junk'").is_err());
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let mut input = String::new();
        for _ in 0..64 {
            input.push('(');
        }
        input.push_str("a eq 1");
        for _ in 0..64 {
            input.push(')');
        }
        assert!(parse(&input).is_err());
    }
}
