//! Single-pass scanner turning source text into the token sequence
//! consumed by the parser.

use crate::error::CompileError;
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    Identifier,
    IntLiteral,
    BoolLiteral,
    StringLiteral,
}

/// One lexical unit with its 1-based source position. Immutable after
/// lexing; `value` holds the lexeme (for string literals, without quotes).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            TokenKind::StringLiteral => write!(f, "\"{}\"", self.value),
            _ => f.write_str(&self.value),
        }
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
}

impl Lexer {
    fn new(source: &str) -> Lexer {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).cloned()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn token(&self, kind: TokenKind, value: String, line: u32, col: u32) -> Token {
        Token {
            kind,
            value,
            line,
            col,
        }
    }

    fn string_literal(&mut self, line: u32, col: u32) -> Result<Token, CompileError> {
        let mut literal = String::new();

        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\n') | None => {
                    return Err(CompileError::UnterminatedString {
                        line: self.line,
                        col: self.col,
                    })
                }
                Some(ch) => {
                    literal.push(ch);
                    self.advance();
                }
            }
        }

        Ok(self.token(TokenKind::StringLiteral, literal, line, col))
    }

    fn int_literal(&mut self, first: char, line: u32, col: u32) -> Result<Token, CompileError> {
        let mut literal = String::new();
        literal.push(first);

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                literal.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // The literal must be delimited; 12ab is an error, not two tokens.
        if let Some(ch) = self.peek() {
            if !ch.is_ascii_whitespace() && ch != '(' && ch != ')' {
                return Err(CompileError::UnexpectedChar {
                    ch,
                    line: self.line,
                    col: self.col,
                });
            }
        }

        Ok(self.token(TokenKind::IntLiteral, literal, line, col))
    }

    fn identifier(&mut self, first: char, line: u32, col: u32) -> Token {
        let mut lexeme = String::new();
        lexeme.push(first);

        while let Some(ch) = self.peek() {
            if ch.is_ascii_whitespace() || ch == '(' || ch == ')' {
                break;
            }
            lexeme.push(ch);
            self.advance();
        }

        let kind = if lexeme == "true" || lexeme == "false" {
            TokenKind::BoolLiteral
        } else {
            TokenKind::Identifier
        };

        self.token(kind, lexeme, line, col)
    }

    fn lex(mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        let mut nest_level = 0i64;

        loop {
            self.skip_whitespace();

            let (line, col) = (self.line, self.col);
            let ch = match self.advance() {
                Some(ch) => ch,
                None => break,
            };

            match ch {
                '(' => {
                    nest_level += 1;
                    tokens.push(self.token(TokenKind::LeftParen, String::from("("), line, col));
                }
                ')' => {
                    nest_level -= 1;
                    if nest_level < 0 {
                        return Err(CompileError::UnexpectedClosingParen { line, col });
                    }
                    tokens.push(self.token(TokenKind::RightParen, String::from(")"), line, col));
                }
                '"' => tokens.push(self.string_literal(line, col)?),
                ch if ch.is_ascii_digit() => tokens.push(self.int_literal(ch, line, col)?),
                ch => tokens.push(self.identifier(ch, line, col)),
            }
        }

        if nest_level != 0 {
            return Err(CompileError::UnbalancedParens);
        }

        Ok(tokens)
    }
}

pub fn lex(source: &str) -> Result<Vec<Token>, CompileError> {
    Lexer::new(source).lex()
}
