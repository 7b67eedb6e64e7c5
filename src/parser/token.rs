// Filter expression tokens

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Identifier(String),
    Number(String),
    String(String),
    /// Duration literal already scaled to seconds, e.g. `5m` -> 300
    Duration(i64),

    // Keywords
    And,
    Or,
    Not,
    Like,
    In,
    True,
    False,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,

    // Special
    Illegal(char),
    Eof,
}

impl Token {
    /// Convert a word to a keyword or word-operator token if it matches.
    ///
    /// Matching is case-insensitive; `eq`, `ne`, `lt`, `gt`, `le` and `ge`
    /// are spelled-out comparison operators.
    pub fn keyword_from_str(s: &str) -> Option<Token> {
        match s.to_lowercase().as_str() {
            "and" => Some(Token::And),
            "or" => Some(Token::Or),
            "not" => Some(Token::Not),
            "like" => Some(Token::Like),
            "in" => Some(Token::In),
            "true" => Some(Token::True),
            "false" => Some(Token::False),
            "eq" => Some(Token::Equal),
            "ne" => Some(Token::NotEqual),
            "lt" => Some(Token::Less),
            "gt" => Some(Token::Greater),
            "le" => Some(Token::LessEqual),
            "ge" => Some(Token::GreaterEqual),
            _ => None,
        }
    }
}
