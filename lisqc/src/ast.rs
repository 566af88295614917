//! The abstract syntax tree produced by the parser.
//!
//! One tagged enum covers every form; the code generator pattern-matches on
//! it directly. Each node keeps the tokens delimiting it in the source so
//! later stages can point diagnostics at the right place.

use crate::lexer::Token;

/// Binary operators of the surface language. The first six lower to ALU
/// instructions, the comparisons lower to a compare-and-branch sequence.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MathOp {
    Add,
    Sub,
    And,
    Or,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl MathOp {
    /// Maps a keyword lexeme to the operator it spells, if any.
    pub fn from_symbol(symbol: &str) -> Option<MathOp> {
        match symbol {
            "+" => Some(MathOp::Add),
            "-" => Some(MathOp::Sub),
            "&" => Some(MathOp::And),
            "|" => Some(MathOp::Or),
            "<<" => Some(MathOp::Shl),
            ">>" => Some(MathOp::Shr),
            "<" => Some(MathOp::Lt),
            "<=" => Some(MathOp::Le),
            ">" => Some(MathOp::Gt),
            ">=" => Some(MathOp::Ge),
            "=" => Some(MathOp::Eq),
            "!=" => Some(MathOp::Ne),
            _ => None,
        }
    }

    pub fn is_comparison(self) -> bool {
        match self {
            MathOp::Lt | MathOp::Le | MathOp::Gt | MathOp::Ge | MathOp::Eq | MathOp::Ne => true,
            _ => false,
        }
    }
}

/// One `(identifier value)` binding of a `let` form.
#[derive(Clone, Debug)]
pub struct LetVar {
    pub identifier: String,
    pub value: Ast,
}

#[derive(Clone, Debug)]
pub enum Ast {
    Let {
        start: Token,
        end: Token,
        vars: Vec<LetVar>,
        body: Vec<Ast>,
    },
    Set {
        start: Token,
        end: Token,
        identifier: String,
        value: Box<Ast>,
    },
    SetPtr {
        start: Token,
        end: Token,
        identifier: String,
        value: Box<Ast>,
    },
    LoopWhile {
        start: Token,
        end: Token,
        condition: Box<Ast>,
        body: Vec<Ast>,
    },
    If {
        start: Token,
        end: Token,
        condition: Box<Ast>,
        then_expr: Box<Ast>,
        else_expr: Option<Box<Ast>>,
    },
    Math {
        start: Token,
        end: Token,
        op: MathOp,
        left: Box<Ast>,
        right: Box<Ast>,
    },
    GetChar {
        start: Token,
        end: Token,
    },
    PutChar {
        start: Token,
        end: Token,
        value: Box<Ast>,
    },
    IntLiteral {
        token: Token,
        value: u32,
    },
    StringLiteral {
        token: Token,
        value: String,
    },
    LoadById {
        token: Token,
        identifier: String,
    },
    LoadByPtrId {
        start: Token,
        end: Token,
        identifier: String,
    },
    Func {
        start: Token,
        end: Token,
        identifier: String,
        params: Vec<String>,
        body: Vec<Ast>,
    },
    FuncCall {
        start: Token,
        end: Token,
        identifier: String,
        args: Vec<Ast>,
    },
    StrAlloc {
        start: Token,
        end: Token,
        identifier: String,
        size: u32,
    },
    MultiExpr {
        start: Token,
        end: Token,
        exprs: Vec<Ast>,
    },
}

impl Ast {
    /// Whether the node is a global declaration rather than executable code.
    pub fn is_global_decl(&self) -> bool {
        match self {
            Ast::Func { .. } | Ast::StrAlloc { .. } => true,
            _ => false,
        }
    }
}
