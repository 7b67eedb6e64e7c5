// Filter expression parser - converts tokens to a node tree

use super::lexer::Lexer;
use super::token::Token;
use crate::expression::{BinaryOperator, Node, UnaryOperator};
use anyhow::{bail, Result};

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(input: &str) -> Self {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize();
        Parser {
            tokens,
            position: 0,
        }
    }

    /// Parse a complete filter expression
    pub fn parse(&mut self) -> Result<Node> {
        if self.match_token(&Token::Eof) {
            bail!("Empty filter expression");
        }
        let node = self.parse_expression()?;
        if !self.match_token(&Token::Eof) {
            bail!("Unexpected token: {:?}", self.current_token());
        }
        Ok(node)
    }

    /// Parse expression
    fn parse_expression(&mut self) -> Result<Node> {
        self.parse_or()
    }

    /// Parse OR expression
    fn parse_or(&mut self) -> Result<Node> {
        let mut left = self.parse_and()?;

        while self.match_token(&Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Node::or(left, right);
        }

        Ok(left)
    }

    /// Parse AND expression
    fn parse_and(&mut self) -> Result<Node> {
        let mut left = self.parse_not()?;

        while self.match_token(&Token::And) {
            self.advance();
            let right = self.parse_not()?;
            left = Node::and(left, right);
        }

        Ok(left)
    }

    /// Parse NOT expression
    fn parse_not(&mut self) -> Result<Node> {
        if self.match_token(&Token::Not) {
            self.advance();
            let operand = self.parse_not()?;
            Ok(Node::not_expr(operand))
        } else {
            self.parse_comparison()
        }
    }

    /// Parse comparison expression
    fn parse_comparison(&mut self) -> Result<Node> {
        let left = self.parse_addition()?;

        // `not like` / `not in`
        let negated = self.match_token(&Token::Not)
            && matches!(self.peek_token(), Token::Like | Token::In);
        if negated {
            self.advance();
        }

        if self.match_token(&Token::In) {
            self.advance();
            self.expect_token(Token::LeftParen)?;
            let list = self.parse_expression_list()?;
            self.expect_token(Token::RightParen)?;
            let op = if negated {
                BinaryOperator::NotIn
            } else {
                BinaryOperator::In
            };
            return Ok(Node::binary_op(op, left, Node::list(list)));
        }

        if self.match_token(&Token::Like) {
            self.advance();
            let pattern = self.parse_addition()?;
            let op = if negated {
                BinaryOperator::NotLike
            } else {
                BinaryOperator::Like
            };
            return Ok(Node::binary_op(op, left, pattern));
        }

        let op = match self.current_token() {
            Token::Equal => Some(BinaryOperator::Eq),
            Token::NotEqual => Some(BinaryOperator::Ne),
            Token::Less => Some(BinaryOperator::Lt),
            Token::Greater => Some(BinaryOperator::Gt),
            Token::LessEqual => Some(BinaryOperator::Le),
            Token::GreaterEqual => Some(BinaryOperator::Ge),
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            let right = self.parse_addition()?;
            Ok(Node::binary_op(op, left, right))
        } else {
            Ok(left)
        }
    }

    /// Parse addition/subtraction expression
    fn parse_addition(&mut self) -> Result<Node> {
        let mut left = self.parse_multiplication()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();

            let right = self.parse_multiplication()?;
            left = Node::binary_op(op, left, right);
        }

        Ok(left)
    }

    /// Parse multiplication/division expression
    fn parse_multiplication(&mut self) -> Result<Node> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Mul,
                Token::Slash => BinaryOperator::Div,
                _ => break,
            };
            self.advance();

            let right = self.parse_unary()?;
            left = Node::binary_op(op, left, right);
        }

        Ok(left)
    }

    /// Parse unary expression
    fn parse_unary(&mut self) -> Result<Node> {
        match self.current_token() {
            Token::Minus => {
                self.advance();
                // negative durations stay relative time offsets
                if let Token::Duration(seconds) = self.current_token() {
                    self.advance();
                    return Ok(Node::unsure_int(-seconds));
                }
                let operand = self.parse_unary()?;
                Ok(Node::unary_op(UnaryOperator::Minus, operand))
            }
            Token::Plus => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    /// Parse primary expression
    fn parse_primary(&mut self) -> Result<Node> {
        match self.current_token() {
            Token::Number(n) => {
                self.advance();
                // Try to parse as integer first, then float
                if let Ok(i) = n.parse::<i64>() {
                    Ok(Node::int(i))
                } else if let Ok(f) = n.parse::<f64>() {
                    Ok(Node::float(f))
                } else {
                    bail!("Invalid number: {}", n)
                }
            }
            Token::Duration(seconds) => {
                self.advance();
                Ok(Node::unsure_int(seconds))
            }
            Token::String(s) => {
                self.advance();
                Ok(Node::string(s))
            }
            Token::True => {
                self.advance();
                Ok(Node::boolean(true))
            }
            Token::False => {
                self.advance();
                Ok(Node::boolean(false))
            }
            Token::Identifier(name) => {
                self.advance();

                if self.match_token(&Token::LeftParen) {
                    self.advance();
                    let args = if self.match_token(&Token::RightParen) {
                        vec![]
                    } else {
                        self.parse_expression_list()?
                    };
                    self.expect_token(Token::RightParen)?;
                    Ok(Node::function(name, args))
                } else {
                    Ok(Node::attribute(name))
                }
            }
            Token::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_token(Token::RightParen)?;
                Ok(expr)
            }
            Token::Illegal(c) => bail!("Illegal character: {}", c),
            token => bail!("Unexpected token: {:?}", token),
        }
    }

    /// Parse list of expressions
    fn parse_expression_list(&mut self) -> Result<Vec<Node>> {
        let mut expressions = vec![];

        loop {
            expressions.push(self.parse_expression()?);
            if !self.match_token(&Token::Comma) {
                break;
            }
            self.advance();
        }

        Ok(expressions)
    }

    // Helper methods

    /// Get current token
    fn current_token(&self) -> Token {
        self.tokens
            .get(self.position)
            .cloned()
            .unwrap_or(Token::Eof)
    }

    fn peek_token(&self) -> Token {
        self.tokens
            .get(self.position + 1)
            .cloned()
            .unwrap_or(Token::Eof)
    }

    /// Advance to next token
    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    /// Check if current token matches
    fn match_token(&self, token: &Token) -> bool {
        self.current_token() == *token
    }

    /// Expect a specific token
    fn expect_token(&mut self, token: Token) -> Result<()> {
        if self.current_token() == token {
            self.advance();
            Ok(())
        } else {
            bail!("Expected {:?}, found {:?}", token, self.current_token())
        }
    }
}
