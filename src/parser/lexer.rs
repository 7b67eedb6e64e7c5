// Filter expression lexer - tokenizes filter strings

use super::token::Token;
use crate::config::unit_seconds;

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let input: Vec<char> = input.chars().collect();
        let current_char = input.first().copied();
        Lexer {
            input,
            position: 0,
            current_char,
        }
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let Some(ch) = self.current_char else {
            return Token::Eof;
        };

        match ch {
            '+' => {
                self.advance();
                Token::Plus
            }
            '-' => {
                self.advance();
                Token::Minus
            }
            '*' => {
                self.advance();
                Token::Star
            }
            '/' => {
                self.advance();
                Token::Slash
            }
            '=' => {
                self.advance();
                // `==` is accepted as a synonym
                if self.current_char == Some('=') {
                    self.advance();
                }
                Token::Equal
            }
            '<' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::LessEqual
                } else if self.current_char == Some('>') {
                    self.advance();
                    Token::NotEqual
                } else {
                    Token::Less
                }
            }
            '>' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::GreaterEqual
                } else {
                    Token::Greater
                }
            }
            '!' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::NotEqual
                } else {
                    Token::Illegal('!')
                }
            }
            '(' => {
                self.advance();
                Token::LeftParen
            }
            ')' => {
                self.advance();
                Token::RightParen
            }
            ',' => {
                self.advance();
                Token::Comma
            }
            '\'' => self.read_string(),
            c if c.is_alphabetic() || c == '_' => self.read_identifier(),
            c if c.is_ascii_digit() => self.read_number(),
            c => {
                self.advance();
                Token::Illegal(c)
            }
        }
    }

    /// Advance to the next character
    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    /// Peek at the next character without advancing
    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    /// Skip whitespace characters
    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> Token {
        let mut identifier = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                identifier.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Token::keyword_from_str(&identifier).unwrap_or(Token::Identifier(identifier))
    }

    /// Read a string literal, `''` escapes a quote
    fn read_string(&mut self) -> Token {
        self.advance(); // Skip opening quote
        let mut string = String::new();

        while let Some(ch) = self.current_char {
            if ch == '\'' {
                if self.peek() == Some('\'') {
                    string.push('\'');
                    self.advance();
                    self.advance();
                } else {
                    self.advance(); // Skip closing quote
                    break;
                }
            } else {
                string.push(ch);
                self.advance();
            }
        }

        Token::String(string)
    }

    /// Read a number (integer or float), or a duration such as `5m`
    fn read_number(&mut self) -> Token {
        let mut number = String::new();
        let mut has_dot = false;

        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.' && !has_dot && self.peek().map_or(false, |c| c.is_ascii_digit()) {
                has_dot = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // a unit suffix makes it a duration unless more word characters follow
        if let Some(unit) = self.current_char.and_then(unit_seconds) {
            let standalone = self
                .peek()
                .map_or(true, |c| !(c.is_alphanumeric() || c == '_'));
            if standalone {
                if let Ok(value) = number.parse::<f64>() {
                    let seconds = value * unit as f64;
                    if seconds.is_finite() && seconds < i64::MAX as f64 {
                        self.advance();
                        return Token::Duration(seconds as i64);
                    }
                    // out of range: keep the suffix so the parser rejects the literal
                    if let Some(suffix) = self.current_char {
                        number.push(suffix);
                        self.advance();
                    }
                }
            }
        }

        Token::Number(number)
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token();
            if token == Token::Eof {
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }

        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_tokens() {
        let mut lexer = Lexer::new("exit_code = 0 and enabled");
        assert_eq!(lexer.next_token(), Token::Identifier("exit_code".to_string()));
        assert_eq!(lexer.next_token(), Token::Equal);
        assert_eq!(lexer.next_token(), Token::Number("0".to_string()));
        assert_eq!(lexer.next_token(), Token::And);
        assert_eq!(lexer.next_token(), Token::Identifier("enabled".to_string()));
        assert_eq!(lexer.next_token(), Token::Eof);
    }

    #[test]
    fn test_operators() {
        let mut lexer = Lexer::new("+ - * / = == < > <= >= <> != eq ne lt gt le ge");
        assert_eq!(lexer.next_token(), Token::Plus);
        assert_eq!(lexer.next_token(), Token::Minus);
        assert_eq!(lexer.next_token(), Token::Star);
        assert_eq!(lexer.next_token(), Token::Slash);
        assert_eq!(lexer.next_token(), Token::Equal);
        assert_eq!(lexer.next_token(), Token::Equal);
        assert_eq!(lexer.next_token(), Token::Less);
        assert_eq!(lexer.next_token(), Token::Greater);
        assert_eq!(lexer.next_token(), Token::LessEqual);
        assert_eq!(lexer.next_token(), Token::GreaterEqual);
        assert_eq!(lexer.next_token(), Token::NotEqual);
        assert_eq!(lexer.next_token(), Token::NotEqual);
        assert_eq!(lexer.next_token(), Token::Equal);
        assert_eq!(lexer.next_token(), Token::NotEqual);
        assert_eq!(lexer.next_token(), Token::Less);
        assert_eq!(lexer.next_token(), Token::Greater);
        assert_eq!(lexer.next_token(), Token::LessEqual);
        assert_eq!(lexer.next_token(), Token::GreaterEqual);
    }

    #[test]
    fn test_string_literals() {
        let mut lexer = Lexer::new("'has not run' 'it''s' 'räksmörgås'");
        assert_eq!(lexer.next_token(), Token::String("has not run".to_string()));
        assert_eq!(lexer.next_token(), Token::String("it's".to_string()));
        assert_eq!(lexer.next_token(), Token::String("räksmörgås".to_string()));
    }

    #[test]
    fn test_numbers_and_durations() {
        let mut lexer = Lexer::new("123 0.5 5m 2d 1w 30s 3dx");
        assert_eq!(lexer.next_token(), Token::Number("123".to_string()));
        assert_eq!(lexer.next_token(), Token::Number("0.5".to_string()));
        assert_eq!(lexer.next_token(), Token::Duration(300));
        assert_eq!(lexer.next_token(), Token::Duration(172_800));
        assert_eq!(lexer.next_token(), Token::Duration(604_800));
        assert_eq!(lexer.next_token(), Token::Duration(30));
        assert_eq!(lexer.next_token(), Token::Number("3".to_string()));
        assert_eq!(lexer.next_token(), Token::Identifier("dx".to_string()));
    }

    #[test]
    fn test_oversized_duration_is_not_clamped() {
        let mut lexer = Lexer::new("99999999999999w 3");
        assert_eq!(
            lexer.next_token(),
            Token::Number("99999999999999w".to_string())
        );
        assert_eq!(lexer.next_token(), Token::Number("3".to_string()));
    }

    #[test]
    fn test_illegal_characters() {
        let mut lexer = Lexer::new("a ! b #");
        let tokens = lexer.tokenize();
        assert_eq!(tokens[1], Token::Illegal('!'));
        assert_eq!(tokens[3], Token::Illegal('#'));
        assert_eq!(tokens[4], Token::Eof);
    }

    #[test]
    fn test_full_filter() {
        let mut lexer =
            Lexer::new("task_status not in ('ready', 'running') or most_recent_run_time < -2d");
        let tokens = lexer.tokenize();

        assert_eq!(tokens[0], Token::Identifier("task_status".to_string()));
        assert_eq!(tokens[1], Token::Not);
        assert_eq!(tokens[2], Token::In);
        assert_eq!(tokens[3], Token::LeftParen);
        assert_eq!(tokens[4], Token::String("ready".to_string()));
        assert_eq!(tokens[5], Token::Comma);
        assert_eq!(tokens[6], Token::String("running".to_string()));
        assert_eq!(tokens[7], Token::RightParen);
        assert_eq!(tokens[8], Token::Or);
        assert_eq!(tokens[9], Token::Identifier("most_recent_run_time".to_string()));
        assert_eq!(tokens[10], Token::Less);
        assert_eq!(tokens[11], Token::Minus);
        assert_eq!(tokens[12], Token::Duration(172_800));
        assert_eq!(tokens[13], Token::Eof);
    }
}
