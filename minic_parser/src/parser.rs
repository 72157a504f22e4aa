//! Recursive-descent parser: one token of lookahead, no backtracking.
//!
//! Tokens are pre-lexed into a `Vec` and walked with an index cursor via
//! `expect`/`check`/`bump` helpers. There is no error-recovery
//! re-synchronization: the first malformed construct aborts with one of
//! the fixed diagnostics in `CompileError`, and compilation stops there.

use crate::ast::*;
use minic_common::{CompileError, CompileResult};
use minic_lexer::{Lexer, Token};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Lexes the whole input up front; MiniC programs are small enough that
    /// streaming tokenization buys nothing.
    pub fn new(source: &str) -> CompileResult<Self> {
        let tokens = Lexer::new(source).tokenize()?;
        log::debug!("lex done: {} tokens", tokens.len());
        Ok(Self { tokens, pos: 0 })
    }

    pub fn parse_program(mut self) -> CompileResult<Program> {
        let mut globals = Vec::new();
        while !self.check(&Token::Eof) {
            globals.push(self.parse_global()?);
        }
        log::debug!("parse done: {} top-level declarations", globals.len());
        Ok(Program { globals })
    }

    // --- token cursor helpers ---

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn check(&self, tok: &Token) -> bool {
        self.peek() == tok
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, tok: &Token) -> CompileResult<()> {
        if self.check(tok) {
            self.bump();
            Ok(())
        } else {
            Err(CompileError::Expected(tok.describe()))
        }
    }

    fn expect_ident(&mut self) -> CompileResult<String> {
        match self.bump() {
            Token::Ident(name) => Ok(name),
            _ => Err(CompileError::Expected("identifier")),
        }
    }

    // --- top level ---

    fn parse_type(&mut self) -> CompileResult<Type> {
        match self.bump() {
            Token::KwInt => Ok(Type::Int),
            Token::KwVoid => Ok(Type::Void),
            _ => Err(CompileError::Expected("type")),
        }
    }

    fn parse_global(&mut self) -> CompileResult<Global> {
        let is_const = if self.check(&Token::KwConst) {
            self.bump();
            true
        } else {
            false
        };
        let ty = self.parse_type()?;
        let name = self.expect_ident()?;

        if !is_const && self.check(&Token::LParen) {
            return Ok(Global::Func(self.parse_func_rest(ty, name)?));
        }

        let decl = self.parse_var_decl_rest(is_const, ty, name)?;
        self.expect(&Token::Semi)?;
        Ok(Global::VarDecl(decl))
    }

    fn parse_func_rest(&mut self, rettype: Type, name: String) -> CompileResult<Func> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let arg_ty = self.parse_type()?;
                let arg_name = self.expect_ident()?;
                args.push((arg_ty, arg_name));
                if self.check(&Token::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        let body = self.parse_block()?;
        Ok(Func {
            rettype,
            name,
            args,
            body,
        })
    }

    /// Parses the `name [= init] (, name [= init])*` tail of a declaration,
    /// given the first name has already been consumed.
    fn parse_var_decl_rest(
        &mut self,
        is_const: bool,
        ty: Type,
        first_name: String,
    ) -> CompileResult<VarDecl> {
        let mut defs = vec![self.parse_one_def(first_name)?];
        while self.check(&Token::Comma) {
            self.bump();
            let name = self.expect_ident()?;
            defs.push(self.parse_one_def(name)?);
        }
        Ok(VarDecl {
            is_const,
            ty,
            defs,
        })
    }

    fn parse_one_def(&mut self, name: String) -> CompileResult<VarDef> {
        let init = if self.check(&Token::Assign) {
            self.bump();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(VarDef { name, init })
    }

    // --- statements ---

    fn parse_block(&mut self) -> CompileResult<Block> {
        self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&Token::RBrace)?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> CompileResult<Stmt> {
        match self.peek() {
            Token::Semi => {
                self.bump();
                Ok(Stmt::Empty)
            }
            Token::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            Token::KwIf => self.parse_if(),
            Token::KwWhile => self.parse_while(),
            Token::KwBreak => {
                self.bump();
                self.expect(&Token::Semi)?;
                Ok(Stmt::Break)
            }
            Token::KwContinue => {
                self.bump();
                self.expect(&Token::Semi)?;
                Ok(Stmt::Continue)
            }
            Token::KwReturn => {
                self.bump();
                if self.check(&Token::Semi) {
                    self.bump();
                    Ok(Stmt::Return(None))
                } else {
                    let expr = self.parse_expr()?;
                    self.expect(&Token::Semi)?;
                    Ok(Stmt::Return(Some(expr)))
                }
            }
            Token::KwInt | Token::KwVoid | Token::KwConst => {
                let is_const = if self.check(&Token::KwConst) {
                    self.bump();
                    true
                } else {
                    false
                };
                let ty = self.parse_type()?;
                let name = self.expect_ident()?;
                let decl = self.parse_var_decl_rest(is_const, ty, name)?;
                self.expect(&Token::Semi)?;
                Ok(Stmt::VarDecl(decl))
            }
            Token::Ident(_) if self.is_assignment_ahead() => {
                let name = self.expect_ident()?;
                self.expect(&Token::Assign)?;
                let expr = self.parse_expr()?;
                self.expect(&Token::Semi)?;
                Ok(Stmt::Assign(name, expr))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&Token::Semi)?;
                Ok(Stmt::ExprStmt(expr))
            }
        }
    }

    fn is_assignment_ahead(&self) -> bool {
        matches!(self.peek(), Token::Ident(_)) && self.tokens.get(self.pos + 1) == Some(&Token::Assign)
    }

    fn parse_if(&mut self) -> CompileResult<Stmt> {
        self.expect(&Token::KwIf)?;
        self.expect(&Token::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        let then_branch = self.parse_stmt()?;
        if self.check(&Token::KwElse) {
            self.bump();
            let else_branch = self.parse_stmt()?;
            Ok(Stmt::IfElse(
                cond,
                Box::new(then_branch),
                Box::new(else_branch),
            ))
        } else {
            Ok(Stmt::If(cond, Box::new(then_branch)))
        }
    }

    fn parse_while(&mut self) -> CompileResult<Stmt> {
        self.expect(&Token::KwWhile)?;
        self.expect(&Token::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        let body = self.parse_stmt()?;
        Ok(Stmt::While(cond, Box::new(body)))
    }

    // --- expressions, lowest to highest precedence ---

    fn parse_expr(&mut self) -> CompileResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.check(&Token::OrOr) {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.check(&Token::AndAnd) {
            self.bump();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinOp::Eq,
                Token::Ne => BinOp::Neq,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinOp::Lt,
                Token::Le => BinOp::LtEq,
                Token::Gt => BinOp::Gt,
                Token::Ge => BinOp::GtEq,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Plus,
                Token::Minus => BinOp::Minus,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> CompileResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mult,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> CompileResult<Expr> {
        let op = match self.peek() {
            Token::Plus => UnOp::Pos,
            Token::Minus => UnOp::Neg,
            Token::Not => UnOp::Not,
            _ => return self.parse_postfix(),
        };
        self.bump();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_postfix(&mut self) -> CompileResult<Expr> {
        match self.bump() {
            Token::IntLit(n) => Ok(Expr::Number(n)),
            Token::Ident(name) => {
                if self.check(&Token::LParen) {
                    self.bump();
                    let mut args = Vec::new();
                    if !self.check(&Token::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.check(&Token::Comma) {
                                self.bump();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(&Token::RParen)?;
                    Ok(Expr::FuncCall(name, args))
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            _ => Err(CompileError::Expected("expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Program {
        Parser::new(src).unwrap().parse_program().expect("parse should succeed")
    }

    #[test]
    fn parses_minimal_main() {
        let program = parse("int main(){return 0;}");
        assert_eq!(program.globals.len(), 1);
        match &program.globals[0] {
            Global::Func(f) => {
                assert_eq!(f.name, "main");
                assert_eq!(f.rettype, Type::Int);
                assert_eq!(f.body, vec![Stmt::Return(Some(Expr::Number(0)))]);
            }
            _ => panic!("expected a function"),
        }
    }

    #[test]
    fn parses_operator_precedence() {
        let program = parse("int main(){return 1+2*3<4&&5==5;}");
        let Global::Func(f) = &program.globals[0] else {
            panic!("expected function")
        };
        match &f.body[0] {
            Stmt::Return(Some(Expr::Binary(BinOp::And, lhs, rhs))) => {
                assert!(matches!(**lhs, Expr::Binary(BinOp::Lt, _, _)));
                assert!(matches!(**rhs, Expr::Binary(BinOp::Eq, _, _)));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn parses_while_with_break_and_continue() {
        let program = parse(
            "int main(){while(1){if(1) break; else continue;} return 0;}",
        );
        let Global::Func(f) = &program.globals[0] else {
            panic!("expected function")
        };
        assert!(matches!(f.body[0], Stmt::While(_, _)));
    }

    #[test]
    fn parses_multi_def_var_decl() {
        let program = parse("int main(){int x=0,y,z=1; return x+y+z;}");
        let Global::Func(f) = &program.globals[0] else {
            panic!("expected function")
        };
        match &f.body[0] {
            Stmt::VarDecl(decl) => assert_eq!(decl.defs.len(), 3),
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn parses_function_call_arguments() {
        let program = parse("int main(){return putint(getint()+1);}");
        let Global::Func(f) = &program.globals[0] else {
            panic!("expected function")
        };
        match &f.body[0] {
            Stmt::Return(Some(Expr::FuncCall(name, args))) => {
                assert_eq!(name, "putint");
                assert_eq!(args.len(), 1);
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn missing_semicolon_is_an_error() {
        let err = Parser::new("int main(){return 0}")
            .unwrap()
            .parse_program()
            .unwrap_err();
        assert_eq!(err, CompileError::Expected(";"));
    }
}
