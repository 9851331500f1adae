//! Parser for variable expressions.
//!
//! Supports:
//! - Numbers (integers, floats, scientific notation)
//! - Bare identifiers, resolved against the evaluation scope
//! - Arithmetic operators (+, -, *, /, ^) with unary +/-
//! - Comparisons (<, <=, >, >=, ==, !=) and the conditional `c ? a : b`
//! - Parentheses and function calls with any number of arguments

use std::collections::BTreeSet;
use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

/// Deepest recursion the parser accepts. Each parenthesis, call argument or
/// conditional branch costs two levels, unary signs and `^` one each.
pub const MAX_NESTING: usize = 128;

/// Parse error with location info
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Reference to a scope entry or a built-in constant.
    Name(String),
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOperator {
    Neg,
    Plus,
}

impl Expr {
    /// Every name the expression reads, excluding function names.
    pub fn names(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Name(name) => {
                out.insert(name.as_str());
            }
            Expr::Unary { operand, .. } => operand.collect_names(out),
            Expr::Binary { left, right, .. } => {
                left.collect_names(out);
                right.collect_names(out);
            }
            Expr::Call { args, .. } => args.iter().for_each(|a| a.collect_names(out)),
            Expr::Conditional { condition, then, otherwise } => {
                condition.collect_names(out);
                then.collect_names(out);
                otherwise.collect_names(out);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
    Question,
    Colon,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    Eof,
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    position: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            position: 0,
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace();
        let pos = self.position;

        let c = match self.chars.peek() {
            None => return Ok(Token::Eof),
            Some(&c) => c,
        };

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            '?' => Some(Token::Question),
            ':' => Some(Token::Colon),
            _ => None,
        };
        if let Some(tok) = single {
            self.advance();
            return Ok(tok);
        }

        match c {
            '<' | '>' | '=' | '!' => {
                self.advance();
                let followed_by_eq = self.chars.peek() == Some(&'=');
                if followed_by_eq {
                    self.advance();
                }
                match (c, followed_by_eq) {
                    ('<', false) => Ok(Token::Lt),
                    ('<', true) => Ok(Token::Le),
                    ('>', false) => Ok(Token::Gt),
                    ('>', true) => Ok(Token::Ge),
                    ('=', true) => Ok(Token::EqEq),
                    ('!', true) => Ok(Token::NotEq),
                    _ => Err(ParseError {
                        message: format!("Unexpected character: '{}'", c),
                        position: pos,
                    }),
                }
            }
            c if c.is_ascii_digit() || c == '.' => self.read_number(),
            c if c.is_alphabetic() || c == '_' => Ok(Token::Identifier(self.read_identifier())),
            _ => Err(ParseError {
                message: format!("Unexpected character: '{}'", c),
                position: pos,
            }),
        }
    }

    fn advance(&mut self) -> Option<char> {
        self.position += 1;
        self.chars.next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_digits(&mut self, buf: &mut String) {
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                buf.push(c);
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, ParseError> {
        let pos = self.position;
        let mut num_str = String::new();

        self.read_digits(&mut num_str);
        if self.chars.peek() == Some(&'.') {
            num_str.push('.');
            self.advance();
            self.read_digits(&mut num_str);
        }

        // Scientific notation (1e10, 1.5e-3)
        if let Some(&c) = self.chars.peek() {
            if c == 'e' || c == 'E' {
                num_str.push(c);
                self.advance();
                if let Some(&sign) = self.chars.peek() {
                    if sign == '+' || sign == '-' {
                        num_str.push(sign);
                        self.advance();
                    }
                }
                self.read_digits(&mut num_str);
            }
        }

        num_str.parse::<f64>().map(Token::Number).map_err(|_| ParseError {
            message: format!("Invalid number: '{}'", num_str),
            position: pos,
        })
    }

    fn read_identifier(&mut self) -> String {
        let mut name = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        name
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Self { lexer, current, depth: 0 })
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, ParseError> {
        Err(ParseError {
            message: message.into(),
            position: self.lexer.position,
        })
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), ParseError> {
        if self.current != token {
            return self.error(format!("Expected {}", what));
        }
        self.advance()
    }

    /// Runs `f` one nesting level deeper, failing past [`MAX_NESTING`].
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, ParseError>) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return self.error(format!("Expression nested deeper than {} levels", MAX_NESTING));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_conditional()?;
        if self.current != Token::Eof {
            return self.error(format!("Unexpected token after expression: {:?}", self.current));
        }
        Ok(expr)
    }

    // Conditional: comparison ('?' conditional ':' conditional)?
    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::parse_conditional_inner)
    }

    fn parse_conditional_inner(&mut self) -> Result<Expr, ParseError> {
        let condition = self.parse_comparison()?;
        if self.current != Token::Question {
            return Ok(condition);
        }
        self.advance()?;
        let then = self.parse_conditional()?;
        self.expect(Token::Colon, "':' in conditional")?;
        let otherwise = self.parse_conditional()?;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    // Comparison: additive (cmp additive)*
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match &self.current {
                Token::Lt => BinaryOperator::Lt,
                Token::Le => BinaryOperator::Le,
                Token::Gt => BinaryOperator::Gt,
                Token::Ge => BinaryOperator::Ge,
                Token::EqEq => BinaryOperator::Eq,
                Token::NotEq => BinaryOperator::Ne,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_additive()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    // Additive: term (('+' | '-') term)*
    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match &self.current {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    // Multiplicative: unary (('*' | '/') unary)*
    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match &self.current {
                Token::Star => BinaryOperator::Mul,
                Token::Slash => BinaryOperator::Div,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    // Unary: ('-' | '+') unary | power
    // Binds looser than '^', so -2^2 == -(2^2).
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::parse_unary_inner)
    }

    fn parse_unary_inner(&mut self) -> Result<Expr, ParseError> {
        let op = match self.current {
            Token::Minus => UnaryOperator::Neg,
            Token::Plus => UnaryOperator::Plus,
            _ => return self.parse_power(),
        };
        self.advance()?;
        let operand = self.parse_unary()?;
        Ok(Expr::Unary { op, operand: Box::new(operand) })
    }

    // Power: primary ('^' unary)?  (right associative)
    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        if self.current != Token::Caret {
            return Ok(base);
        }
        self.advance()?;
        let exp = self.parse_unary()?;
        Ok(Expr::Binary { op: BinaryOperator::Pow, left: Box::new(base), right: Box::new(exp) })
    }

    // Primary: number | name | name '(' args ')' | '(' expr ')'
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match &self.current {
            Token::Number(n) => {
                let val = *n;
                self.advance()?;
                Ok(Expr::Number(val))
            }
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance()?;
                if self.current != Token::LParen {
                    return Ok(Expr::Name(name));
                }
                self.advance()?;
                let mut args = Vec::new();
                if self.current != Token::RParen {
                    loop {
                        args.push(self.parse_conditional()?);
                        if self.current == Token::Comma {
                            self.advance()?;
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RParen, "')' after function arguments")?;
                Ok(Expr::Call { name, args })
            }
            Token::LParen => {
                self.advance()?;
                let expr = self.parse_conditional()?;
                self.expect(Token::RParen, "')'")?;
                Ok(expr)
            }
            _ => self.error(format!("Unexpected token: {:?}", self.current)),
        }
    }
}

/// Parse an expression string into an AST
pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError {
            message: "Empty expression".to_string(),
            position: 0,
        });
    }
    let mut parser = Parser::new(input)?;
    parser.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Number(n))
    }

    fn nested_parens(n: usize) -> String {
        format!("{}1{}", "(".repeat(n), ")".repeat(n))
    }

    #[rstest]
    #[case(1)]
    #[case(40)]
    fn test_moderate_nesting_parses(#[case] n: usize) {
        assert_eq!(parse_expression(&nested_parens(n)).unwrap(), Expr::Number(1.0));
    }

    #[rstest]
    #[case(100)]
    #[case(300)]
    #[case(20_000)]
    fn test_deep_nesting_is_a_parse_error(#[case] n: usize) {
        let err = parse_expression(&nested_parens(n)).unwrap_err();
        assert!(err.message.contains("nested deeper"), "{}", err);
    }

    #[test]
    fn test_deep_unary_chain_is_a_parse_error() {
        let input = format!("{}1", "-".repeat(10_000));
        assert!(parse_expression(&input).is_err());
    }

    #[test]
    fn test_parse_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOperator::Add,
                left: num(1.0),
                right: Box::new(Expr::Binary { op: BinaryOperator::Mul, left: num(2.0), right: num(3.0) }),
            }
        );
    }

    #[test]
    fn test_unary_minus_binds_looser_than_power() {
        let expr = parse_expression("-2 ^ 2").unwrap();
        assert_eq!(
            expr,
            Expr::Unary {
                op: UnaryOperator::Neg,
                operand: Box::new(Expr::Binary { op: BinaryOperator::Pow, left: num(2.0), right: num(2.0) }),
            }
        );
    }

    #[test]
    fn test_parse_call_with_arguments() {
        let expr = parse_expression("max(a, b * 2, 3)").unwrap();
        match expr {
            Expr::Call { name, args } => {
                assert_eq!(name, "max");
                assert_eq!(args.len(), 3);
            }
            other => panic!("Expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_conditional() {
        let expr = parse_expression("a > 0 ? a : 0").unwrap();
        assert!(matches!(expr, Expr::Conditional { .. }));
    }

    #[test]
    fn test_names_exclude_functions() {
        let expr = parse_expression("sum(n_in, n_out) * rate_1 + n_in").unwrap();
        let names: Vec<&str> = expr.names().into_iter().collect();
        assert_eq!(names, vec!["n_in", "n_out", "rate_1"]);
    }

    #[test]
    fn test_scientific_notation() {
        assert_eq!(parse_expression("1.5e-3").unwrap(), Expr::Number(0.0015));
    }

    #[rstest]
    #[case("")]
    #[case("1 $ 2")]
    #[case("(1 + 2")]
    #[case("max(1,")]
    #[case("a ? b")]
    #[case("1 = 2")]
    #[case("2 3")]
    fn test_parse_errors(#[case] input: &str) {
        assert!(parse_expression(input).is_err(), "expected error for {:?}", input);
    }
}
