//! Lexer for query string syntax
//!
//! Splits a query string into operator, grouping and word tokens, each
//! tagged with its character position in the input.

use crate::error::ParseError;

/// Token types for query string parsing
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// An unquoted word. May carry a trailing `*`.
    Word(String),
    /// A double-quoted string with escapes resolved
    Quoted(String),

    And,
    Or,
    Not,
    /// TO keyword for ranges
    To,
    /// Colon separator (field:value)
    Colon,

    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,

    /// End of input
    Eof,
}

impl Token {
    /// Whether the token can begin an operand
    pub fn starts_operand(&self) -> bool {
        matches!(
            self,
            Token::Word(_) | Token::Quoted(_) | Token::LeftParen | Token::Not | Token::To
        )
    }
}

/// A token with its source text and starting character position
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub text: String,
    pub position: usize,
}

/// Lexer for tokenizing query strings
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    /// Create a new lexer for the given input string
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Result<Spanned, ParseError> {
        self.skip_whitespace();

        let start = self.position;
        if self.is_eof() {
            return Ok(self.spanned(Token::Eof, start));
        }

        let token = match self.current_char() {
            ':' => {
                self.advance();
                Token::Colon
            }
            '(' => {
                self.advance();
                Token::LeftParen
            }
            ')' => {
                self.advance();
                Token::RightParen
            }
            '[' => {
                self.advance();
                Token::LeftBracket
            }
            ']' => {
                self.advance();
                Token::RightBracket
            }
            '"' => {
                self.advance();
                self.read_quoted_string(start)?
            }
            _ => self.read_word(),
        };

        Ok(self.spanned(token, start))
    }

    /// Check if the lexer has reached the end of input
    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn spanned(&self, token: Token, start: usize) -> Spanned {
        Spanned {
            token,
            text: self.input[start..self.position].iter().collect(),
            position: start,
        }
    }

    fn read_word(&mut self) -> Token {
        let mut word = String::new();

        while !self.is_eof() && Self::is_word_char(self.current_char()) {
            word.push(self.current_char());
            self.advance();
        }

        // Operator keywords are ASCII and case-insensitive
        match word.to_ascii_uppercase().as_str() {
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            "TO" => Token::To,
            _ => Token::Word(word),
        }
    }

    fn read_quoted_string(&mut self, start: usize) -> Result<Token, ParseError> {
        let mut s = String::new();

        while !self.is_eof() {
            let ch = self.current_char();
            self.advance();
            match ch {
                '"' => return Ok(Token::Quoted(s)),
                '\\' if !self.is_eof() => {
                    s.push(self.current_char());
                    self.advance();
                }
                _ => s.push(ch),
            }
        }

        Err(ParseError::Syntax {
            token: "\"".to_string(),
            position: start,
            message: "unterminated quoted string".to_string(),
        })
    }

    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    /// Anything but whitespace and the structural characters
    fn is_word_char(ch: char) -> bool {
        !ch.is_whitespace() && !matches!(ch, ':' | '(' | ')' | '[' | ']' | '"')
    }
}
