//! Token definitions for MiniC.

use std::fmt;

/// A single lexical token. Carries no source position: see the crate-level
/// Non-goal on diagnostic source tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    // Keywords
    KwInt,
    KwVoid,
    KwIf,
    KwElse,
    KwWhile,
    KwBreak,
    KwContinue,
    KwReturn,
    KwConst,

    // Literals and identifiers
    Ident(String),
    IntLit(i32),

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Assign,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
    AndAnd,
    OrOr,
    Not,

    Eof,
}

impl Token {
    /// Maps an identifier-shaped word to its keyword token, if any.
    pub fn keyword(word: &str) -> Option<Token> {
        Some(match word {
            "int" => Token::KwInt,
            "void" => Token::KwVoid,
            "if" => Token::KwIf,
            "else" => Token::KwElse,
            "while" => Token::KwWhile,
            "break" => Token::KwBreak,
            "continue" => Token::KwContinue,
            "return" => Token::KwReturn,
            "const" => Token::KwConst,
            _ => return None,
        })
    }

    /// The fixed quoted spelling used in "expected '...'" diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Token::KwInt => "int",
            Token::KwVoid => "void",
            Token::KwIf => "if",
            Token::KwElse => "else",
            Token::KwWhile => "while",
            Token::KwBreak => "break",
            Token::KwContinue => "continue",
            Token::KwReturn => "return",
            Token::KwConst => "const",
            Token::Ident(_) => "identifier",
            Token::IntLit(_) => "integer literal",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Comma => ",",
            Token::Semi => ";",
            Token::Assign => "=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::EqEq => "==",
            Token::Ne => "!=",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Not => "!",
            Token::Eof => "end of input",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}
