//! Text to [`Expr`] parser.
//!
//! Tokens are recognised with nom combinators; a small recursive-descent pass then builds
//! the tree with the usual precedence (`+ -` < `* /` < unary minus < `^`/`**`, power is
//! right associative). Implicit multiplication is inserted between adjacent operands
//! (`2x`, `2(x+1)`, `(x+1)(x-1)`, `x sin(x)`), and a function name followed by an operand
//! without parentheses is applied to it (`sin x`).
use crate::symbolic::symbolic_engine::{Expr, Func, NamedConst};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit1},
    combinator::{map, map_res, opt, recognize},
    multi::many0,
    sequence::pair,
};
use std::str::FromStr;
use thiserror::Error;

/// Diagnostic for input the parser cannot turn into an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("empty input: enter an expression to integrate")]
    Empty,
    #[error("unbalanced parentheses at position {0}")]
    UnbalancedParentheses(usize),
    #[error("unknown token '{token}' at position {position}")]
    UnknownToken { token: char, position: usize },
    #[error("unknown function name '{0}'")]
    UnknownFunction(String),
    #[error("unexpected {found} at position {position}")]
    Unexpected { found: String, position: usize },
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("invalid variable name '{0}'")]
    InvalidVariable(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Ident(name) => format!("name '{}'", name),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Caret => "'^'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Comma => "','".to_string(),
        }
    }

    fn ends_operand(&self) -> bool {
        matches!(self, Token::Number(_) | Token::Ident(_) | Token::RParen)
    }

    fn starts_operand(&self) -> bool {
        matches!(self, Token::Number(_) | Token::Ident(_) | Token::LParen)
    }
}

/// Unsigned decimal literal: `3`, `3.`, `3.25`, `.5`. No exponent part, so `2e` stays `2*e`.
fn number(input: &str) -> IResult<&str, Token> {
    // digit0 leaves a misplaced remainder at the end of input, which breaks recognize
    let digits = recognize(alt((
        recognize(pair(digit1, opt(pair(char('.'), opt(digit1))))),
        recognize(pair(char('.'), digit1)),
    )));
    map_res(digits, |s: &str| s.parse::<f64>().map(Token::Number)).parse(input)
}

fn identifier(input: &str) -> IResult<&str, Token> {
    let name = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));
    map(name, |s: &str| Token::Ident(s.to_string())).parse(input)
}

fn unicode_symbol(input: &str) -> IResult<&str, Token> {
    alt((
        map(char('π'), |_| Token::Ident("pi".to_string())),
        map(char('∞'), |_| Token::Ident("oo".to_string())),
        map(char('√'), |_| Token::Ident("sqrt".to_string())),
        map(char('θ'), |_| Token::Ident("theta".to_string())),
    ))
    .parse(input)
}

fn operator(input: &str) -> IResult<&str, Token> {
    alt((
        map(tag("**"), |_| Token::Caret),
        map(char('^'), |_| Token::Caret),
        map(char('*'), |_| Token::Star),
        map(char('·'), |_| Token::Star),
        map(char('/'), |_| Token::Slash),
        map(char('+'), |_| Token::Plus),
        map(char('-'), |_| Token::Minus),
        map(char('('), |_| Token::LParen),
        map(char(')'), |_| Token::RParen),
        map(char(','), |_| Token::Comma),
    ))
    .parse(input)
}

fn token(input: &str) -> IResult<&str, Token> {
    alt((number, identifier, unicode_symbol, operator)).parse(input)
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let mut tokens = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        let position = text.len() - rest.len();
        match token(rest) {
            Ok((remaining, tok)) => {
                tokens.push((tok, position));
                rest = remaining.trim_start();
            }
            Err(_) => {
                let token = rest.chars().next().unwrap_or(' ');
                return Err(ParseError::UnknownToken { token, position });
            }
        }
    }
    Ok(tokens)
}

fn check_balance(tokens: &[(Token, usize)]) -> Result<(), ParseError> {
    let mut open = Vec::new();
    for (tok, pos) in tokens {
        match tok {
            Token::LParen => open.push(*pos),
            Token::RParen => {
                if open.pop().is_none() {
                    return Err(ParseError::UnbalancedParentheses(*pos));
                }
            }
            _ => {}
        }
    }
    match open.pop() {
        Some(pos) => Err(ParseError::UnbalancedParentheses(pos)),
        None => Ok(()),
    }
}

fn constant_by_name(name: &str) -> Option<NamedConst> {
    match name {
        "pi" | "Pi" | "PI" => Some(NamedConst::Pi),
        "e" | "E" => Some(NamedConst::E),
        "oo" | "inf" | "infinity" => Some(NamedConst::Infinity),
        _ => None,
    }
}

fn is_function_name(name: &str) -> bool {
    Func::from_str(name).is_ok() || name == "sqrt" || name == "polylog"
}

/// A name directly followed by `(` is a call unless it is a single letter or a constant.
fn is_call_site(name: &str) -> bool {
    is_function_name(name) || (name.chars().count() > 1 && constant_by_name(name).is_none())
}

fn insert_implicit_multiplication(tokens: Vec<(Token, usize)>) -> Vec<(Token, usize)> {
    let mut out: Vec<(Token, usize)> = Vec::with_capacity(tokens.len());
    for (tok, pos) in tokens {
        let needs_star = match out.last() {
            Some((prev, _)) => {
                let call = matches!((prev, &tok), (Token::Ident(name), Token::LParen) if is_call_site(name));
                let application = matches!(prev, Token::Ident(name) if is_function_name(name));
                prev.ends_operand() && tok.starts_operand() && !call && !application
            }
            None => false,
        };
        if needs_star {
            out.push((Token::Star, pos));
        }
        out.push((tok, pos));
    }
    out
}

struct ExprParser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<(Token, usize)> {
        let next = self.tokens.get(self.pos).cloned();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn unexpected(tok: &Token, position: usize) -> ParseError {
        ParseError::Unexpected {
            found: tok.describe(),
            position,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        match self.advance() {
            Some((tok, _)) if tok == expected => Ok(()),
            Some((tok, pos)) => Err(Self::unexpected(&tok, pos)),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn parse_sum(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_product()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    let rhs = self.parse_product()?;
                    lhs = lhs + rhs;
                }
                Some(Token::Minus) => {
                    self.advance();
                    let rhs = self.parse_product()?;
                    lhs = lhs - rhs;
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn parse_product(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    let rhs = self.parse_unary()?;
                    lhs = lhs * rhs;
                }
                Some(Token::Slash) => {
                    self.advance();
                    let rhs = self.parse_unary()?;
                    lhs = lhs / rhs;
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(match operand {
                    Expr::Const(c) => Expr::Const(-c),
                    other => -other,
                })
            }
            Some(Token::Plus) => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(base.pow(exponent));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let (tok, position) = self.advance().ok_or(ParseError::UnexpectedEnd)?;
        match tok {
            Token::Number(n) => Ok(Expr::Const(n)),
            Token::LParen => {
                let inner = self.parse_sum()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                let followed_by_paren = matches!(self.peek(), Some(Token::LParen));
                if followed_by_paren && is_call_site(&name) {
                    let args = self.parse_arguments()?;
                    return build_call(&name, args);
                }
                if let Some(c) = constant_by_name(&name) {
                    return Ok(Expr::Named(c));
                }
                if is_function_name(&name) {
                    let arg = self.parse_unary()?;
                    return build_call(&name, vec![arg]);
                }
                Ok(Expr::Var(name))
            }
            other => Err(Self::unexpected(&other, position)),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(Token::LParen)?;
        let mut args = vec![self.parse_sum()?];
        loop {
            match self.advance() {
                Some((Token::Comma, _)) => args.push(self.parse_sum()?),
                Some((Token::RParen, _)) => return Ok(args),
                Some((tok, pos)) => return Err(Self::unexpected(&tok, pos)),
                None => return Err(ParseError::UnexpectedEnd),
            }
        }
    }
}

fn build_call(name: &str, mut args: Vec<Expr>) -> Result<Expr, ParseError> {
    let expected = if name == "polylog" { 2 } else { 1 };
    if !is_function_name(name) {
        return Err(ParseError::UnknownFunction(name.to_string()));
    }
    if args.len() != expected {
        return Err(ParseError::Arity {
            name: name.to_string(),
            expected,
            found: args.len(),
        });
    }
    let first = args.remove(0);
    match name {
        "sqrt" => Ok(first.sqrt()),
        "polylog" => Ok(Expr::Polylog(first.boxed(), args.remove(0).boxed())),
        _ => Func::from_str(name)
            .map(|f| first.apply(f))
            .map_err(|_| ParseError::UnknownFunction(name.to_string())),
    }
}

/// Checks that a caller-supplied variable name is a plain identifier.
pub fn validate_variable_name(name: &str) -> Result<(), ParseError> {
    match identifier(name) {
        Ok(("", _)) if constant_by_name(name).is_none() && !is_function_name(name) => Ok(()),
        _ => Err(ParseError::InvalidVariable(name.to_string())),
    }
}

impl Expr {
    /// Parses text such as `2x*exp(x^2)` or `sqrt(1 - x**2)`.
    pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
        if input.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        let tokens = tokenize(input)?;
        check_balance(&tokens)?;
        let tokens = insert_implicit_multiplication(tokens);
        let mut parser = ExprParser { tokens, pos: 0 };
        let expr = parser.parse_sum()?;
        match parser.advance() {
            None => Ok(expr),
            Some((tok, pos)) => Err(ExprParser::unexpected(&tok, pos)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::Var("x".to_string())
    }

    #[test]
    fn test_power_operators_are_equivalent() {
        let a = Expr::parse_expression("x^2").unwrap();
        let b = Expr::parse_expression("x**2").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, x().powf(2.0));
    }

    #[test]
    fn test_implicit_multiplication() {
        assert_eq!(
            Expr::parse_expression("2x").unwrap(),
            Expr::parse_expression("2*x").unwrap()
        );
        assert_eq!(
            Expr::parse_expression("2(x+1)").unwrap(),
            Expr::Const(2.0) * (x() + Expr::Const(1.0))
        );
        assert_eq!(
            Expr::parse_expression("x sin(x)").unwrap(),
            x() * x().sin()
        );
        assert_eq!(
            Expr::parse_expression("(x+1)(x-1)").unwrap(),
            (x() + Expr::Const(1.0)) * (x() - Expr::Const(1.0))
        );
    }

    #[test]
    fn test_precedence_and_unary_minus() {
        let e = Expr::parse_expression("-x^2 + 3*x/2").unwrap();
        let expected = -(x().powf(2.0)) + Expr::Const(3.0) * x() / Expr::Const(2.0);
        assert_eq!(e, expected);
        let e = Expr::parse_expression("2^-1").unwrap();
        assert_eq!(e, Expr::Const(2.0).powf(-1.0));
        let e = Expr::parse_expression("x^2^3").unwrap();
        assert_eq!(e, x().pow(Expr::Const(2.0).powf(3.0)));
    }

    #[test]
    fn test_functions_constants_and_aliases() {
        let e = Expr::parse_expression("ln(x) + log(x)").unwrap();
        assert_eq!(e, x().ln() + x().ln());
        let e = Expr::parse_expression("sqrt(1 - x**2)").unwrap();
        assert_eq!(e, (Expr::Const(1.0) - x().powf(2.0)).sqrt());
        let e = Expr::parse_expression("2*pi + E").unwrap();
        assert_eq!(
            e,
            Expr::Const(2.0) * Expr::Named(NamedConst::Pi) + Expr::Named(NamedConst::E)
        );
        let e = Expr::parse_expression("π").unwrap();
        assert_eq!(e, Expr::Named(NamedConst::Pi));
        let e = Expr::parse_expression("sin x").unwrap();
        assert_eq!(e, x().sin());
        let e = Expr::parse_expression("polylog(2, x)").unwrap();
        assert_eq!(e, Expr::Polylog(Expr::Const(2.0).boxed(), x().boxed()));
        let e = Expr::parse_expression("sin(2*theta)").unwrap();
        assert!(e.contains_variable("theta"));
    }

    #[test]
    fn test_decimal_literals() {
        assert_eq!(Expr::parse_expression("3.25").unwrap(), Expr::Const(3.25));
        assert_eq!(Expr::parse_expression("x^2.5").unwrap(), x().powf(2.5));
        assert_eq!(
            Expr::parse_expression("x*0.5").unwrap(),
            x() * Expr::Const(0.5)
        );
        assert_eq!(
            Expr::parse_expression("2*0.5").unwrap(),
            Expr::Const(2.0) * Expr::Const(0.5)
        );
        assert_eq!(Expr::parse_expression("3.").unwrap(), Expr::Const(3.0));
        assert_eq!(Expr::parse_expression(".5").unwrap(), Expr::Const(0.5));
        assert_eq!(
            Expr::parse_expression("1.5x").unwrap(),
            Expr::Const(1.5) * x()
        );
        assert_eq!(
            Expr::parse_expression("x-1").unwrap(),
            x() - Expr::Const(1.0)
        );
        assert_eq!(
            Expr::parse_expression("2e").unwrap(),
            Expr::Const(2.0) * Expr::Named(NamedConst::E)
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Expr::parse_expression("   "), Err(ParseError::Empty));
        assert_eq!(
            Expr::parse_expression("(x+1"),
            Err(ParseError::UnbalancedParentheses(0))
        );
        assert_eq!(
            Expr::parse_expression("x+1)"),
            Err(ParseError::UnbalancedParentheses(3))
        );
        assert_eq!(
            Expr::parse_expression("x $ 2"),
            Err(ParseError::UnknownToken {
                token: '$',
                position: 2
            })
        );
        assert_eq!(
            Expr::parse_expression("foo(x)"),
            Err(ParseError::UnknownFunction("foo".to_string()))
        );
        assert!(matches!(
            Expr::parse_expression("x + * 2"),
            Err(ParseError::Unexpected { .. })
        ));
        assert_eq!(Expr::parse_expression("x +"), Err(ParseError::UnexpectedEnd));
        assert!(matches!(
            Expr::parse_expression("sin(x, 2)"),
            Err(ParseError::Arity { .. })
        ));
    }

    #[test]
    fn test_display_round_trip() {
        for text in [
            "x**3/3",
            "2*x*exp(x**2)",
            "(x - 1)*exp(x)",
            "sqrt(1 - x**2)",
            "-(x + 1)/(2*x)",
            "atan(x)/2 + log(x**2 + 1)",
        ] {
            let e = Expr::parse_expression(text).unwrap();
            let again = Expr::parse_expression(&e.to_string()).unwrap();
            assert_eq!(e, again, "round trip of {}", text);
        }
    }

    #[test]
    fn test_validate_variable_name() {
        assert!(validate_variable_name("x").is_ok());
        assert!(validate_variable_name("theta").is_ok());
        assert!(validate_variable_name("2x").is_err());
        assert!(validate_variable_name("x y").is_err());
        assert!(validate_variable_name("sin").is_err());
        assert!(validate_variable_name("pi").is_err());
    }
}
