use crate::error::{Error, Result};
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Keywords
    Match,
    Where,
    Create,
    Set,
    Delete,
    Detach,
    Return,
    Distinct,
    Order,
    By,
    Asc,
    Desc,
    Skip,
    Limit,
    As,
    And,
    Or,
    Xor,
    Not,
    In,
    Is,
    Starts,
    Ends,
    With,
    Contains,

    // Symbols
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Colon,
    Semicolon,
    Comma,
    Dot,
    Pipe,
    RangeDots,

    // Relationships
    LeftArrow,
    RightArrow,
    Dash,

    // Operators
    Equals,
    RegexMatch,
    NotEquals,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Plus,
    Asterisk,
    Divide,
    Modulo,

    // Literals
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,

    // Identifiers
    Identifier(String),
    Parameter(String), // $param

    Eof,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenType::Match => "MATCH",
            TokenType::Where => "WHERE",
            TokenType::Create => "CREATE",
            TokenType::Set => "SET",
            TokenType::Delete => "DELETE",
            TokenType::Detach => "DETACH",
            TokenType::Return => "RETURN",
            TokenType::Distinct => "DISTINCT",
            TokenType::Order => "ORDER",
            TokenType::By => "BY",
            TokenType::Asc => "ASC",
            TokenType::Desc => "DESC",
            TokenType::Skip => "SKIP",
            TokenType::Limit => "LIMIT",
            TokenType::As => "AS",
            TokenType::And => "AND",
            TokenType::Or => "OR",
            TokenType::Xor => "XOR",
            TokenType::Not => "NOT",
            TokenType::In => "IN",
            TokenType::Is => "IS",
            TokenType::Starts => "STARTS",
            TokenType::Ends => "ENDS",
            TokenType::With => "WITH",
            TokenType::Contains => "CONTAINS",
            TokenType::LeftParen => "'('",
            TokenType::RightParen => "')'",
            TokenType::LeftBracket => "'['",
            TokenType::RightBracket => "']'",
            TokenType::LeftBrace => "'{'",
            TokenType::RightBrace => "'}'",
            TokenType::Colon => "':'",
            TokenType::Semicolon => "';'",
            TokenType::Comma => "','",
            TokenType::Dot => "'.'",
            TokenType::Pipe => "'|'",
            TokenType::RangeDots => "'..'",
            TokenType::LeftArrow => "'<-'",
            TokenType::RightArrow => "'->'",
            TokenType::Dash => "'-'",
            TokenType::Equals => "'='",
            TokenType::RegexMatch => "'=~'",
            TokenType::NotEquals => "'<>'",
            TokenType::LessThan => "'<'",
            TokenType::LessEqual => "'<='",
            TokenType::GreaterThan => "'>'",
            TokenType::GreaterEqual => "'>='",
            TokenType::Plus => "'+'",
            TokenType::Asterisk => "'*'",
            TokenType::Divide => "'/'",
            TokenType::Modulo => "'%'",
            TokenType::String(s) => return write!(f, "string '{s}'"),
            TokenType::Integer(i) => return write!(f, "integer {i}"),
            TokenType::Float(x) => return write!(f, "number {x}"),
            TokenType::Boolean(b) => return write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            TokenType::Null => "NULL",
            TokenType::Identifier(name) => return write!(f, "identifier '{name}'"),
            TokenType::Parameter(name) => return write!(f, "parameter ${name}"),
            TokenType::Eof => "end of input",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    /// Character offset of the first character of the token.
    pub position: usize,
    pub line: usize,
    pub column: usize,
    /// Source spelling of keyword and identifier words.
    pub word: Option<String>,
}

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    position: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        tokens.push(Token {
            token_type: TokenType::Eof,
            position: self.position,
            line: self.line,
            column: self.column,
            word: None,
        });
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            self.skip_whitespace();
            if !self.skip_comment()? {
                break;
            }
        }

        let start = (self.position, self.line, self.column);
        let Some(char) = self.advance() else {
            return Ok(None);
        };

        let mut word = None;
        let token_type = match char {
            '\'' | '"' => self.read_string(char, start)?,
            '`' => self.read_quoted_identifier(start)?,
            '$' => self.read_parameter(start)?,
            c if c.is_ascii_digit() => self.read_number(c, start)?,
            c if c.is_alphabetic() || c == '_' => {
                let text = self.read_word(c);
                let token_type = keyword_or_identifier(&text);
                word = Some(text);
                token_type
            }
            '(' => TokenType::LeftParen,
            ')' => TokenType::RightParen,
            '[' => TokenType::LeftBracket,
            ']' => TokenType::RightBracket,
            '{' => TokenType::LeftBrace,
            '}' => TokenType::RightBrace,
            ':' => TokenType::Colon,
            ';' => TokenType::Semicolon,
            ',' => TokenType::Comma,
            '|' => TokenType::Pipe,
            '.' => {
                if self.eat('.') {
                    TokenType::RangeDots
                } else {
                    TokenType::Dot
                }
            }
            '-' => {
                if self.eat('>') {
                    TokenType::RightArrow
                } else {
                    TokenType::Dash
                }
            }
            '<' => {
                if self.eat('-') {
                    TokenType::LeftArrow
                } else if self.eat('=') {
                    TokenType::LessEqual
                } else if self.eat('>') {
                    TokenType::NotEquals
                } else {
                    TokenType::LessThan
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::GreaterThan
                }
            }
            '=' => {
                if self.eat('~') {
                    TokenType::RegexMatch
                } else {
                    TokenType::Equals
                }
            }
            '!' => {
                if self.eat('=') {
                    TokenType::NotEquals
                } else {
                    return Err(syntax_error("unexpected character '!'", start));
                }
            }
            '+' => TokenType::Plus,
            '*' => TokenType::Asterisk,
            '/' => TokenType::Divide,
            '%' => TokenType::Modulo,
            other => {
                return Err(syntax_error(
                    format!("unexpected character '{other}'"),
                    start,
                ));
            }
        };

        Ok(Some(Token {
            token_type,
            position: start.0,
            line: start.1,
            column: start.2,
            word,
        }))
    }

    fn advance(&mut self) -> Option<char> {
        let char = self.chars.next();
        if let Some(c) = char {
            self.position += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        char
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&char) = self.chars.peek() {
            if char.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Skips one `//` or `/* */` comment. Returns whether anything was skipped.
    fn skip_comment(&mut self) -> Result<bool> {
        if self.chars.peek() != Some(&'/') {
            return Ok(false);
        }
        let mut lookahead = self.chars.clone();
        lookahead.next();
        match lookahead.peek() {
            Some('/') => {
                while let Some(&char) = self.chars.peek() {
                    if char == '\n' {
                        break;
                    }
                    self.advance();
                }
                Ok(true)
            }
            Some('*') => {
                let start = (self.position, self.line, self.column);
                self.advance();
                self.advance();
                loop {
                    match self.advance() {
                        Some('*') if self.eat('/') => return Ok(true),
                        Some(_) => {}
                        None => return Err(syntax_error("unterminated comment", start)),
                    }
                }
            }
            _ => Ok(false),
        }
    }

    fn read_string(&mut self, quote: char, start: (usize, usize, usize)) -> Result<TokenType> {
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return Err(syntax_error("unterminated string literal", start)),
                Some(c) if c == quote => break,
                Some('\\') => {
                    let escaped = match self.advance() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some(c @ ('\\' | '\'' | '"')) => c,
                        Some(c) => {
                            value.push('\\');
                            c
                        }
                        None => return Err(syntax_error("unterminated string literal", start)),
                    };
                    value.push(escaped);
                }
                Some(c) => value.push(c),
            }
        }
        Ok(TokenType::String(value))
    }

    fn read_quoted_identifier(&mut self, start: (usize, usize, usize)) -> Result<TokenType> {
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return Err(syntax_error("unterminated quoted identifier", start)),
                Some('`') => break,
                Some(c) => value.push(c),
            }
        }
        if value.is_empty() {
            return Err(syntax_error("empty quoted identifier", start));
        }
        Ok(TokenType::Identifier(value))
    }

    fn read_number(&mut self, first: char, start: (usize, usize, usize)) -> Result<TokenType> {
        let mut value = String::new();
        value.push(first);
        let mut has_dot = false;
        while let Some(&char) = self.chars.peek() {
            if char.is_ascii_digit() {
                value.push(char);
                self.advance();
            } else if char == '.' && !has_dot {
                // `1..3` is a range, `2.5` is a float
                let mut lookahead = self.chars.clone();
                lookahead.next();
                if !lookahead.peek().is_some_and(|c| c.is_ascii_digit()) {
                    break;
                }
                has_dot = true;
                value.push(char);
                self.advance();
            } else {
                break;
            }
        }
        if self.chars.peek().is_some_and(|c| c.is_alphabetic() || *c == '_') {
            return Err(syntax_error(format!("invalid number '{value}...'"), start));
        }
        if has_dot {
            value
                .parse::<f64>()
                .map(TokenType::Float)
                .map_err(|_| syntax_error(format!("invalid number '{value}'"), start))
        } else {
            value
                .parse::<i64>()
                .map(TokenType::Integer)
                .map_err(|_| syntax_error(format!("integer literal '{value}' out of range"), start))
        }
    }

    fn read_parameter(&mut self, start: (usize, usize, usize)) -> Result<TokenType> {
        let mut value = String::new();
        while let Some(&char) = self.chars.peek() {
            if char.is_alphanumeric() || char == '_' {
                value.push(char);
                self.advance();
            } else {
                break;
            }
        }
        if value.is_empty() {
            return Err(syntax_error("expected parameter name after '$'", start));
        }
        Ok(TokenType::Parameter(value))
    }

    fn read_word(&mut self, first: char) -> String {
        let mut value = String::new();
        value.push(first);
        while let Some(&char) = self.chars.peek() {
            if char.is_alphanumeric() || char == '_' {
                value.push(char);
                self.advance();
            } else {
                break;
            }
        }
        value
    }
}

fn keyword_or_identifier(value: &str) -> TokenType {
    match value.to_uppercase().as_str() {
        "MATCH" => TokenType::Match,
        "WHERE" => TokenType::Where,
        "CREATE" => TokenType::Create,
        "SET" => TokenType::Set,
        "DELETE" => TokenType::Delete,
        "DETACH" => TokenType::Detach,
        "RETURN" => TokenType::Return,
        "DISTINCT" => TokenType::Distinct,
        "ORDER" => TokenType::Order,
        "BY" => TokenType::By,
        "ASC" | "ASCENDING" => TokenType::Asc,
        "DESC" | "DESCENDING" => TokenType::Desc,
        "SKIP" => TokenType::Skip,
        "LIMIT" => TokenType::Limit,
        "AS" => TokenType::As,
        "AND" => TokenType::And,
        "OR" => TokenType::Or,
        "XOR" => TokenType::Xor,
        "NOT" => TokenType::Not,
        "IN" => TokenType::In,
        "IS" => TokenType::Is,
        "STARTS" => TokenType::Starts,
        "ENDS" => TokenType::Ends,
        "WITH" => TokenType::With,
        "CONTAINS" => TokenType::Contains,
        "TRUE" => TokenType::Boolean(true),
        "FALSE" => TokenType::Boolean(false),
        "NULL" => TokenType::Null,
        _ => TokenType::Identifier(value.to_string()),
    }
}

fn syntax_error(message: impl Into<String>, at: (usize, usize, usize)) -> Error {
    Error::Syntax {
        message: message.into(),
        position: at.0,
        line: at.1,
        column: at.2,
    }
}
