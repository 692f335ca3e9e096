//! Expression parser
//!
//! A recursive descent parser for the sandboxed expression language with
//! proper operator precedence.

use crate::ast::{BinaryOperator, Expr, ReferenceExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::refs::RefForm;

/// Parse expression text (without any leading `=`) into an AST
///
/// # Example
/// ```rust
/// use calcgrid_formula::parse_expression;
///
/// let ast = parse_expression("1 + 2").unwrap();
/// let ast = parse_expression("value(id(1, 2)) * 2").unwrap();
/// let ast = parse_expression("{name: 'x', items: [1, 2]}").unwrap();
/// ```
pub fn parse_expression(text: &str) -> FormulaResult<Expr> {
    let mut parser = ExprParser::new(text);
    let expr = parser.parse_expression()?;

    if !matches!(parser.current_token(), Token::Eof) {
        return Err(FormulaError::Parse(format!(
            "Unexpected {:?} after expression",
            parser.current_token()
        )));
    }

    Ok(expr)
}

/// Deepest nesting the parser accepts
///
/// Every bracket, unary operator, postfix access and chained binary operator
/// adds a level. Deeper input is rejected with a parse error instead of
/// exhausting the stack while parsing or evaluating it.
pub const MAX_NESTING: usize = 100;

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),
    Identifier(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqualEqual,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    AndAnd,
    OrOr,
    Question,
    Colon,
    Comma,
    Dot,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,

    // Lexical error, reported when the parser reaches it
    Invalid(String),

    // End of input
    Eof,
}

/// Expression parser
struct ExprParser<'a> {
    input: &'a str,
    pos: usize,
    current_token: Option<Token>,
    depth: usize,
}

impl<'a> ExprParser<'a> {
    fn new(input: &'a str) -> Self {
        let mut parser = Self {
            input,
            pos: 0,
            current_token: None,
            depth: 0,
        };
        parser.advance_token();
        parser
    }

    // === Token scanning ===

    fn advance_token(&mut self) {
        self.skip_whitespace();
        self.current_token = Some(self.scan_token());
    }

    fn scan_token(&mut self) -> Token {
        self.skip_whitespace();

        let Some(c) = self.peek_char() else {
            return Token::Eof;
        };

        // Single-character tokens
        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '%' => Some(Token::Percent),
            '?' => Some(Token::Question),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '[' => Some(Token::LeftBracket),
            ']' => Some(Token::RightBracket),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return token;
        }

        // One- or two-character operators
        match c {
            '=' => {
                self.advance();
                return if self.eat('=') {
                    Token::EqualEqual
                } else {
                    Token::Invalid("'=' is not an operator, use '=='".into())
                };
            }
            '!' => {
                self.advance();
                return if self.eat('=') {
                    Token::NotEqual
                } else {
                    Token::Bang
                };
            }
            '<' => {
                self.advance();
                return if self.eat('=') {
                    Token::LessEqual
                } else {
                    Token::LessThan
                };
            }
            '>' => {
                self.advance();
                return if self.eat('=') {
                    Token::GreaterEqual
                } else {
                    Token::GreaterThan
                };
            }
            '&' => {
                self.advance();
                return if self.eat('&') {
                    Token::AndAnd
                } else {
                    Token::Invalid("expected '&&'".into())
                };
            }
            '|' => {
                self.advance();
                return if self.eat('|') {
                    Token::OrOr
                } else {
                    Token::Invalid("expected '||'".into())
                };
            }
            _ => {}
        }

        // String literal
        if c == '"' || c == '\'' {
            return self.scan_string(c);
        }

        // Number
        if c.is_ascii_digit()
            || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        if c == '.' {
            self.advance();
            return Token::Dot;
        }

        // Identifier
        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            return self.scan_identifier();
        }

        self.advance();
        Token::Invalid(format!("unexpected character '{}'", c))
    }

    fn scan_string(&mut self, quote: char) -> Token {
        self.advance(); // Skip opening quote

        let mut s = String::new();
        while let Some(c) = self.peek_char() {
            self.advance();
            if c == quote {
                return Token::String(s);
            }
            if c == '\\' {
                let Some(escaped) = self.peek_char() else {
                    break;
                };
                self.advance();
                s.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            } else {
                s.push(c);
            }
        }

        Token::Invalid("unterminated string literal".into())
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part
        if self.peek_char() == Some('.')
            && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit())
        {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            let mark = self.pos;
            self.advance();
            if self.peek_char().map_or(false, |c| c == '+' || c == '-') {
                self.advance();
            }
            if !self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.pos = mark;
            }
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let num_str = &self.input[start..self.pos];
        match num_str.parse::<f64>() {
            Ok(n) => Token::Number(n),
            Err(_) => Token::Invalid(format!("invalid number '{}'", num_str)),
        }
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        {
            self.advance();
        }
        Token::Identifier(self.input[start..self.pos].to_string())
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn current_token(&self) -> &Token {
        self.current_token.as_ref().unwrap_or(&Token::Eof)
    }

    fn consume(&mut self) -> Token {
        let token = self.current_token.take().unwrap_or(Token::Eof);
        self.advance_token();
        token
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume();
            Ok(())
        } else {
            Err(self.unexpected(&format!("{:?}", expected)))
        }
    }

    fn unexpected(&self, wanted: &str) -> FormulaError {
        match self.current_token() {
            Token::Invalid(message) => FormulaError::Parse(message.clone()),
            Token::Eof => FormulaError::Parse(format!("Expected {}, got end of input", wanted)),
            other => FormulaError::Parse(format!("Expected {}, got {:?}", wanted, other)),
        }
    }

    fn enter(&mut self) -> FormulaResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(FormulaError::Parse(format!(
                "Expression nested deeper than {} levels",
                MAX_NESTING
            )));
        }
        Ok(())
    }

    fn leave(&mut self, levels: usize) {
        self.depth = self.depth.saturating_sub(levels);
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Conditional: ? :
    // 2. Logical or: ||
    // 3. Logical and: &&
    // 4. Equality: ==, !=
    // 5. Comparison: <, <=, >, >=
    // 6. Additive: +, -
    // 7. Multiplicative: *, /, %
    // 8. Unary: -, +, !
    // 9. Postfix: [index], .member
    // 10. Primary: literals, names, calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<Expr> {
        self.enter()?;
        let expr = self.parse_conditional()?;
        self.leave(1);
        Ok(expr)
    }

    fn parse_conditional(&mut self) -> FormulaResult<Expr> {
        let condition = self.parse_or()?;

        if matches!(self.current_token(), Token::Question) {
            self.consume();
            let then = self.parse_expression()?;
            self.expect(&Token::Colon)?;
            let otherwise = self.parse_expression()?; // Right associative
            return Ok(Expr::Conditional {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }

        Ok(condition)
    }

    fn parse_or(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_and()?;
        let mut levels = 0;

        while matches!(self.current_token(), Token::OrOr) {
            self.consume();
            self.enter()?;
            levels += 1;
            let right = self.parse_and()?;
            left = binary(BinaryOperator::Or, left, right);
        }

        self.leave(levels);
        Ok(left)
    }

    fn parse_and(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_equality()?;
        let mut levels = 0;

        while matches!(self.current_token(), Token::AndAnd) {
            self.consume();
            self.enter()?;
            levels += 1;
            let right = self.parse_equality()?;
            left = binary(BinaryOperator::And, left, right);
        }

        self.leave(levels);
        Ok(left)
    }

    fn parse_equality(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_comparison()?;
        let mut levels = 0;

        loop {
            let op = match self.current_token() {
                Token::EqualEqual => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                _ => break,
            };

            self.consume();
            self.enter()?;
            levels += 1;
            let right = self.parse_comparison()?;
            left = binary(op, left, right);
        }

        self.leave(levels);
        Ok(left)
    }

    fn parse_comparison(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_additive()?;
        let mut levels = 0;

        loop {
            let op = match self.current_token() {
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume();
            self.enter()?;
            levels += 1;
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }

        self.leave(levels);
        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        let mut levels = 0;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            self.enter()?;
            levels += 1;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }

        self.leave(levels);
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_unary()?;
        let mut levels = 0;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Percent => BinaryOperator::Remainder,
                _ => break,
            };

            self.consume();
            self.enter()?;
            levels += 1;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }

        self.leave(levels);
        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<Expr> {
        let op = match self.current_token() {
            Token::Minus => UnaryOperator::Negate,
            Token::Plus => UnaryOperator::Plus,
            Token::Bang => UnaryOperator::Not,
            _ => return self.parse_postfix(),
        };

        self.consume();
        self.enter()?;
        let operand = self.parse_unary()?;
        self.leave(1);
        Ok(Expr::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> FormulaResult<Expr> {
        let mut expr = self.parse_primary()?;
        let mut levels = 0;

        loop {
            match self.current_token() {
                Token::LeftBracket | Token::Dot => {
                    self.enter()?;
                    levels += 1;
                }
                _ => {}
            }

            match self.current_token() {
                Token::LeftBracket => {
                    self.consume();
                    let index = self.parse_expression()?;
                    self.expect(&Token::RightBracket)?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Token::Dot => {
                    self.consume();
                    let name = match self.consume() {
                        Token::Identifier(name) => name,
                        other => {
                            return Err(FormulaError::Parse(format!(
                                "Expected member name after '.', got {:?}",
                                other
                            )))
                        }
                    };
                    expr = Expr::Member {
                        target: Box::new(expr),
                        name,
                    };
                }
                _ => break,
            }
        }

        self.leave(levels);
        Ok(expr)
    }

    fn parse_primary(&mut self) -> FormulaResult<Expr> {
        match self.current_token().clone() {
            Token::Number(n) => {
                self.consume();
                Ok(Expr::Number(n))
            }

            Token::String(s) => {
                self.consume();
                Ok(Expr::String(s))
            }

            Token::LeftParen => {
                self.consume();
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::LeftBracket => self.parse_list(),

            Token::LeftBrace => self.parse_object(),

            Token::Identifier(name) => {
                self.consume();
                match name.as_str() {
                    "true" => return Ok(Expr::Bool(true)),
                    "false" => return Ok(Expr::Bool(false)),
                    "null" => return Ok(Expr::Null),
                    _ => {}
                }
                // Check if it's a call
                if matches!(self.current_token(), Token::LeftParen) {
                    self.parse_call(name)
                } else {
                    Ok(Expr::Name(name))
                }
            }

            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_list(&mut self) -> FormulaResult<Expr> {
        self.expect(&Token::LeftBracket)?;
        let items = self.parse_separated(&Token::RightBracket, |p| p.parse_expression())?;
        Ok(Expr::List(items))
    }

    fn parse_object(&mut self) -> FormulaResult<Expr> {
        self.expect(&Token::LeftBrace)?;
        let fields = self.parse_separated(&Token::RightBrace, |p| {
            let key = match p.consume() {
                Token::Identifier(key) | Token::String(key) => key,
                Token::Invalid(message) => return Err(FormulaError::Parse(message)),
                other => {
                    return Err(FormulaError::Parse(format!(
                        "Expected object key, got {:?}",
                        other
                    )))
                }
            };
            p.expect(&Token::Colon)?;
            let value = p.parse_expression()?;
            Ok((key, value))
        })?;
        Ok(Expr::Object(fields))
    }

    fn parse_call(&mut self, name: String) -> FormulaResult<Expr> {
        self.expect(&Token::LeftParen)?;
        let mut args = self.parse_separated(&Token::RightParen, |p| p.parse_expression())?;

        let Some(form) = RefForm::from_name(&name) else {
            return Ok(Expr::Call { name, args });
        };

        if !(2..=3).contains(&args.len()) {
            return Err(FormulaError::Parse(format!(
                "{}() takes a row, a column and an optional sheet, got {} arguments",
                name,
                args.len()
            )));
        }

        let sheet = if args.len() == 3 {
            args.pop().map(Box::new)
        } else {
            None
        };
        let col = args.pop().map(Box::new);
        let row = args.pop().map(Box::new);
        match (row, col) {
            (Some(row), Some(col)) => Ok(Expr::Reference(ReferenceExpr {
                form,
                row,
                col,
                sheet,
            })),
            _ => Err(FormulaError::Parse(format!("{}() is missing coordinates", name))),
        }
    }

    /// Parse `item, item, ...` up to and including `close`
    fn parse_separated<T>(
        &mut self,
        close: &Token,
        mut item: impl FnMut(&mut Self) -> FormulaResult<T>,
    ) -> FormulaResult<Vec<T>> {
        let mut items = Vec::new();

        if self.current_token() != close {
            items.push(item(self)?);

            while matches!(self.current_token(), Token::Comma) {
                self.consume();
                // Trailing comma
                if self.current_token() == close {
                    break;
                }
                items.push(item(self)?);
            }
        }

        self.expect(close)?;
        Ok(items)
    }
}

fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
