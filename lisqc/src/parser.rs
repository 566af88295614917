//! Recursive-descent parser over the token sequence, with one token of
//! lookahead.

use crate::ast::{Ast, LetVar, MathOp};
use crate::error::CompileError;
use crate::lexer::{Token, TokenKind};

fn unexpected_token(token: &Token, expected: &str) -> CompileError {
    CompileError::UnexpectedToken {
        found: token.to_string(),
        expected: expected.to_string(),
        line: token.line,
        col: token.col,
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn unexpected_eof(&self) -> CompileError {
        match self.tokens.last() {
            Some(token) => CompileError::UnexpectedEof {
                line: token.line,
                col: token.col + token.value.len() as u32,
            },
            None => CompileError::UnexpectedEof { line: 1, col: 1 },
        }
    }

    fn peek(&self) -> Result<&Token, CompileError> {
        self.tokens.get(self.pos).ok_or_else(|| self.unexpected_eof())
    }

    fn next(&mut self) -> Result<Token, CompileError> {
        let token = self.peek()?.clone();
        self.pos += 1;
        Ok(token)
    }

    /// Consumes the closing parenthesis ending the current form.
    fn end_token(&mut self) -> Result<Token, CompileError> {
        let token = self.next()?;
        if token.kind != TokenKind::RightParen {
            return Err(unexpected_token(&token, ")"));
        }
        Ok(token)
    }

    fn parse_int(token: &Token) -> Result<u32, CompileError> {
        token
            .value
            .parse()
            .map_err(|_| CompileError::IntOutOfRange {
                literal: token.value.clone(),
                line: token.line,
                col: token.col,
            })
    }

    fn parse_let_vars(&mut self) -> Result<Vec<LetVar>, CompileError> {
        let mut vars = Vec::new();

        let token = self.next()?;
        if token.kind != TokenKind::LeftParen {
            return Err(unexpected_token(&token, "("));
        }

        loop {
            let token = self.next()?;
            match token.kind {
                TokenKind::RightParen => break,
                TokenKind::LeftParen => {
                    let identifier = self.next()?;
                    if identifier.kind != TokenKind::Identifier {
                        return Err(unexpected_token(
                            &identifier,
                            "an identifier for the variable",
                        ));
                    }
                    let value = self.parse_node(false)?;
                    self.end_token()?;

                    vars.push(LetVar {
                        identifier: identifier.value,
                        value,
                    });
                }
                _ => {
                    return Err(unexpected_token(
                        &token,
                        "( for new variable or ) for closing let block",
                    ))
                }
            }
        }

        Ok(vars)
    }

    fn parse_let(&mut self, start: Token) -> Result<Ast, CompileError> {
        // (let ((name expr) ...) body_expr ...)
        let vars = self.parse_let_vars()?;
        let mut body = Vec::new();
        while self.peek()?.kind != TokenKind::RightParen {
            body.push(self.parse_node(false)?);
        }
        let end = self.next()?;

        Ok(Ast::Let {
            start,
            end,
            vars,
            body,
        })
    }

    fn parse_set(&mut self, start: Token, pointer: bool) -> Result<Ast, CompileError> {
        // (set identifier expr) | (set_ptr identifier expr)
        let identifier = self.next()?;
        if identifier.kind != TokenKind::Identifier {
            return Err(unexpected_token(&identifier, "an identifier"));
        }
        let value = Box::new(self.parse_node(false)?);
        let end = self.end_token()?;

        Ok(if pointer {
            Ast::SetPtr {
                start,
                end,
                identifier: identifier.value,
                value,
            }
        } else {
            Ast::Set {
                start,
                end,
                identifier: identifier.value,
                value,
            }
        })
    }

    fn parse_loop(&mut self, start: Token) -> Result<Ast, CompileError> {
        // (loop while expr do body_expr ...)
        let loop_op = self.next()?;
        if loop_op.kind != TokenKind::Identifier || loop_op.value != "while" {
            return Err(unexpected_token(&loop_op, "while"));
        }

        let condition = Box::new(self.parse_node(false)?);

        let do_token = self.next()?;
        if do_token.kind != TokenKind::Identifier || do_token.value != "do" {
            return Err(unexpected_token(&do_token, "do"));
        }

        let mut body = Vec::new();
        while self.peek()?.kind != TokenKind::RightParen {
            body.push(self.parse_node(false)?);
        }
        let end = self.next()?;

        Ok(Ast::LoopWhile {
            start,
            end,
            condition,
            body,
        })
    }

    fn parse_if(&mut self, start: Token) -> Result<Ast, CompileError> {
        // (if expr true_expr [false_expr])
        let condition = Box::new(self.parse_node(false)?);
        let then_expr = Box::new(self.parse_node(false)?);

        let else_expr = if self.peek()?.kind != TokenKind::RightParen {
            Some(Box::new(self.parse_node(false)?))
        } else {
            None
        };
        let end = self.next()?;

        Ok(Ast::If {
            start,
            end,
            condition,
            then_expr,
            else_expr,
        })
    }

    fn parse_defun(
        &mut self,
        start: Token,
        keyword: Token,
        is_global: bool,
    ) -> Result<Ast, CompileError> {
        // (defun identifier (param ...) body_expr ...)
        if !is_global {
            return Err(CompileError::GlobalOnly {
                construct: "function definition",
                line: keyword.line,
                col: keyword.col,
            });
        }

        let identifier = self.next()?;
        if identifier.kind != TokenKind::Identifier {
            return Err(unexpected_token(&identifier, "a function identifier"));
        }

        let params_start = self.next()?;
        if params_start.kind != TokenKind::LeftParen {
            return Err(unexpected_token(&params_start, "("));
        }

        let mut params = Vec::new();
        while self.peek()?.kind != TokenKind::RightParen {
            let param = self.next()?;
            if param.kind != TokenKind::Identifier {
                return Err(unexpected_token(&param, "a parameter identifier"));
            }
            params.push(param.value);
        }
        self.next()?; // Consume param closing parenthesis

        let mut body = Vec::new();
        while self.peek()?.kind != TokenKind::RightParen {
            body.push(self.parse_node(false)?);
        }
        let end = self.next()?;

        Ok(Ast::Func {
            start,
            end,
            identifier: identifier.value,
            params,
            body,
        })
    }

    fn parse_alloc_str(
        &mut self,
        start: Token,
        keyword: Token,
        is_global: bool,
    ) -> Result<Ast, CompileError> {
        // (alloc_str identifier size)
        if !is_global {
            return Err(CompileError::GlobalOnly {
                construct: "string allocation",
                line: keyword.line,
                col: keyword.col,
            });
        }

        let identifier = self.next()?;
        if identifier.kind != TokenKind::Identifier {
            return Err(unexpected_token(&identifier, "an identifier"));
        }
        let size = self.next()?;
        if size.kind != TokenKind::IntLiteral {
            return Err(unexpected_token(&size, "an integer"));
        }
        let size_value = Parser::parse_int(&size)?;
        let end = self.end_token()?;

        Ok(Ast::StrAlloc {
            start,
            end,
            identifier: identifier.value,
            size: size_value,
        })
    }

    fn parse_load_by_ptr(&mut self, start: Token) -> Result<Ast, CompileError> {
        // (@ identifier)
        let identifier = self.next()?;
        if identifier.kind != TokenKind::Identifier {
            return Err(unexpected_token(&identifier, "an identifier"));
        }
        let end = self.end_token()?;

        Ok(Ast::LoadByPtrId {
            start,
            end,
            identifier: identifier.value,
        })
    }

    fn parse_keywords(
        &mut self,
        start: Token,
        keyword: Token,
        is_global: bool,
    ) -> Result<Ast, CompileError> {
        match keyword.value.as_str() {
            "let" => self.parse_let(start),
            "set" => self.parse_set(start, false),
            "set_ptr" => self.parse_set(start, true),
            "get_char" => {
                let end = self.end_token()?;
                Ok(Ast::GetChar { start, end })
            }
            "put_char" => {
                let value = Box::new(self.parse_node(false)?);
                let end = self.end_token()?;
                Ok(Ast::PutChar { start, end, value })
            }
            "loop" => self.parse_loop(start),
            "if" => self.parse_if(start),
            "defun" => self.parse_defun(start, keyword, is_global),
            "alloc_str" => self.parse_alloc_str(start, keyword, is_global),
            "@" => self.parse_load_by_ptr(start),
            symbol => {
                if let Some(op) = MathOp::from_symbol(symbol) {
                    // (op left_operand right_operand)
                    let left = Box::new(self.parse_node(false)?);
                    let right = Box::new(self.parse_node(false)?);
                    let end = self.end_token()?;
                    Ok(Ast::Math {
                        start,
                        end,
                        op,
                        left,
                        right,
                    })
                } else {
                    // Everything else is assumed to be a function call
                    let mut args = Vec::new();
                    while self.peek()?.kind != TokenKind::RightParen {
                        args.push(self.parse_node(false)?);
                    }
                    let end = self.next()?;
                    Ok(Ast::FuncCall {
                        start,
                        end,
                        identifier: keyword.value,
                        args,
                    })
                }
            }
        }
    }

    fn parse_multi_expr(&mut self, start: Token) -> Result<Ast, CompileError> {
        let mut exprs = Vec::new();
        while self.peek()?.kind != TokenKind::RightParen {
            exprs.push(self.parse_node(false)?);
        }
        let end = self.next()?;

        Ok(Ast::MultiExpr { start, end, exprs })
    }

    fn parse_node(&mut self, is_global: bool) -> Result<Ast, CompileError> {
        let token = self.next()?;

        match token.kind {
            TokenKind::LeftParen => {
                let next_kind = self.peek()?.kind;
                match next_kind {
                    TokenKind::Identifier => {
                        let keyword = self.next()?;
                        self.parse_keywords(token, keyword, is_global)
                    }
                    TokenKind::LeftParen => self.parse_multi_expr(token),
                    _ => {
                        let found = self.peek()?.clone();
                        Err(unexpected_token(&found, "a keyword or a nested form"))
                    }
                }
            }
            TokenKind::BoolLiteral => {
                let value = if token.value == "true" { 1 } else { 0 };
                Ok(Ast::IntLiteral { token, value })
            }
            TokenKind::IntLiteral => {
                let value = Parser::parse_int(&token)?;
                Ok(Ast::IntLiteral { token, value })
            }
            TokenKind::StringLiteral => {
                let value = token.value.clone();
                Ok(Ast::StringLiteral { token, value })
            }
            TokenKind::Identifier => {
                let identifier = token.value.clone();
                Ok(Ast::LoadById { token, identifier })
            }
            TokenKind::RightParen => Err(unexpected_token(&token, "an expression")),
        }
    }
}

/// Parses the whole token sequence as a list of top-level nodes.
pub fn parse(tokens: Vec<Token>) -> Result<Vec<Ast>, CompileError> {
    let mut parser = Parser { tokens, pos: 0 };
    let mut nodes = Vec::new();

    while !parser.is_eof() {
        nodes.push(parser.parse_node(true)?);
    }

    Ok(nodes)
}
