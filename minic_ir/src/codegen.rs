//! Lowers a MiniC AST to a naive, memory-based IR: every local variable
//! is an `alloca` with explicit `load`/`store` around every use.
//! `mem2reg` cleans this up afterwards.
//!
//! Uses a single-pass `Codegen` (a scope stack plus a loop-context stack,
//! one function lowered top to bottom). Function parameters bind as
//! `CONST` symbols, so `x = x + 1` on a parameter is rejected the same
//! way assigning to a named constant is - MiniC parameters are not
//! reassignable through the `Assign` statement.

use std::collections::HashMap;

use minic_common::{CompileError, CompileResult};
use minic_parser::ast;

use crate::ir::{BinOp, BlockRef, Function, GlobalDef, Instr, Operand, Program, Terminator, Ty};

/// Signature for one of the four implicitly-declared library functions.
const BUILTINS: &[(&str, Ty, &[Ty])] = &[
    ("getch", Ty::I32, &[]),
    ("putch", Ty::Void, &[Ty::I32]),
    ("getint", Ty::I32, &[]),
    ("putint", Ty::Void, &[Ty::I32]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolKind {
    Const,
    Var,
    Func,
}

#[derive(Debug, Clone)]
struct Symbol {
    kind: SymbolKind,
    ty: Ty,
    argc: usize,
    binding: Operand,
}

type Scope = HashMap<String, Symbol>;

struct LoopCtx {
    loop_begin: BlockRef,
    breaks: Vec<BlockRef>,
}

/// A lowered expression result: its IR type and the operand holding it.
struct Typed {
    ty: Ty,
    operand: Operand,
}

pub struct Codegen {
    scopes: Vec<Scope>,
    loops: Vec<LoopCtx>,
    globals: Vec<GlobalDef>,
    used_builtins: Vec<&'static str>,
}

impl Codegen {
    pub fn new() -> Self {
        Codegen {
            scopes: vec![Scope::new()],
            loops: Vec::new(),
            globals: Vec::new(),
            used_builtins: Vec::new(),
        }
    }

    pub fn compile(program: &ast::Program) -> CompileResult<Program> {
        let mut gen = Codegen::new();
        for global in &program.globals {
            match global {
                ast::Global::Func(f) => gen.add_func(f)?,
                ast::Global::VarDecl(decl) => gen.add_global_var_decl(decl)?,
            }
        }
        let program = gen.finish();
        log::debug!("codegen done: {} globals", program.globals.len());
        Ok(program)
    }

    fn finish(self) -> Program {
        let mut globals = Vec::new();
        for name in &self.used_builtins {
            let (_, rettype, args) = BUILTINS.iter().find(|(n, ..)| n == name).unwrap();
            globals.push(GlobalDef::FuncDecl {
                rettype: *rettype,
                name: name.to_string(),
                arg_types: args.to_vec(),
            });
        }
        globals.extend(self.globals);
        Program { globals }
    }

    // --- scope helpers ---

    fn scope(&mut self) -> &mut Scope {
        self.scopes.last_mut().unwrap()
    }

    fn declare(&mut self, name: &str, sym: Symbol, on_dup: CompileError) -> CompileResult<()> {
        if self.scope().contains_key(name) {
            return Err(on_dup);
        }
        self.scope().insert(name.to_string(), sym);
        Ok(())
    }

    fn lookup(&mut self, name: &str) -> CompileResult<Symbol> {
        for scope in self.scopes.iter().rev() {
            if let Some(sym) = scope.get(name) {
                return Ok(sym.clone());
            }
        }
        if let Some(&(builtin_name, rettype, args)) = BUILTINS.iter().find(|(n, ..)| *n == name) {
            if !self.used_builtins.contains(&builtin_name) {
                self.used_builtins.push(builtin_name);
            }
            let sym = Symbol {
                kind: SymbolKind::Func,
                ty: rettype,
                argc: args.len(),
                binding: Operand::Global(builtin_name.to_string()),
            };
            self.scopes[0].insert(builtin_name.to_string(), sym.clone());
            return Ok(sym);
        }
        Err(CompileError::SymbolNotFound)
    }

    // --- functions ---

    fn add_func(&mut self, func: &ast::Func) -> CompileResult<()> {
        let rettype = ir_type(func.rettype);
        let mut scope = Scope::new();
        let mut arg_types = Vec::new();
        for (i, (ty, name)) in func.args.iter().enumerate() {
            if *ty != ast::Type::Int {
                return Err(CompileError::UnsupportedArgumentType);
            }
            if scope.contains_key(name) {
                return Err(CompileError::DuplicateArgumentName);
            }
            scope.insert(
                name.clone(),
                Symbol {
                    kind: SymbolKind::Const,
                    ty: Ty::I32,
                    argc: 0,
                    binding: Operand::Arg(i),
                },
            );
            arg_types.push(Ty::I32);
        }

        self.declare(
            &func.name,
            Symbol {
                kind: SymbolKind::Func,
                ty: rettype,
                argc: arg_types.len(),
                binding: Operand::Global(func.name.clone()),
            },
            CompileError::DuplicateFunctionName,
        )?;

        let mut ir_func = Function::new(rettype, func.name.clone(), arg_types);
        let entry = ir_func.new_block();
        self.scopes.push(scope);

        let mut fc = FuncCtx {
            gen: self,
            func: &mut ir_func,
            current: entry,
        };
        for stmt in &func.body {
            fc.add_stmt(stmt)?;
        }
        let current = fc.current;

        self.scopes.pop();

        if ir_func.blocks[current].body.is_empty()
            && ir_func.blocks[current].phis.is_empty()
            && ir_func.blocks[current].terminator == Terminator::Unset
            && current == ir_func.blocks.len() - 1
        {
            ir_func.blocks.pop();
        }

        self.globals.push(GlobalDef::Func(ir_func));
        Ok(())
    }

    fn add_global_var_decl(&mut self, decl: &ast::VarDecl) -> CompileResult<()> {
        if decl.ty == ast::Type::Void {
            return Err(CompileError::VariablesCantBeVoid);
        }
        if decl.is_const {
            for def in &decl.defs {
                let value = self.eval_const_def(def)?;
                self.declare(
                    &def.name,
                    Symbol {
                        kind: SymbolKind::Const,
                        ty: Ty::I32,
                        argc: 0,
                        binding: Operand::Const(value),
                    },
                    CompileError::RedeclaredConstant,
                )?;
            }
        } else {
            for def in &decl.defs {
                let value = match &def.init {
                    Some(e) => self.eval_constexpr(e)?,
                    None => 0,
                };
                self.globals.push(GlobalDef::GlobalVar {
                    name: def.name.clone(),
                    ty: Ty::I32,
                    value,
                });
                self.declare(
                    &def.name,
                    Symbol {
                        kind: SymbolKind::Var,
                        ty: Ty::I32,
                        argc: 0,
                        binding: Operand::Global(def.name.clone()),
                    },
                    CompileError::RedeclaredVariable,
                )?;
            }
        }
        Ok(())
    }

    fn eval_const_def(&mut self, def: &ast::VarDef) -> CompileResult<i32> {
        match &def.init {
            Some(e) => self.eval_constexpr(e),
            None => Err(CompileError::ConstantNotInitialized),
        }
    }

    /// Native 32-bit constant folding: `Binary`, `Unary`, `Number`, and
    /// `CONST`-bound `Ident`s. `FuncCall` and any non-`CONST` identifier
    /// (including function parameters, which are `CONST`-kinded but bound
    /// to an `Arg` operand rather than a literal) are rejected.
    fn eval_constexpr(&mut self, expr: &ast::Expr) -> CompileResult<i32> {
        match expr {
            ast::Expr::Number(n) => Ok(*n),
            ast::Expr::Ident(name) => {
                let sym = self.lookup(name)?;
                match sym.kind {
                    SymbolKind::Const => match sym.binding {
                        Operand::Const(v) => Ok(v),
                        _ => Err(CompileError::ConstantNotConstexpr),
                    },
                    SymbolKind::Var => Err(CompileError::ConstantNotConstexpr),
                    SymbolKind::Func => Err(CompileError::FunctionUsedAsVariable),
                }
            }
            ast::Expr::FuncCall(..) => Err(CompileError::ConstantNotConstexpr),
            ast::Expr::Unary(op, operand) => {
                let v = self.eval_constexpr(operand)?;
                Ok(match op {
                    ast::UnOp::Pos => v,
                    ast::UnOp::Neg => v.wrapping_neg(),
                    ast::UnOp::Not => (v == 0) as i32,
                })
            }
            ast::Expr::Binary(op, lhs, rhs) => {
                let l = self.eval_constexpr(lhs)?;
                let r = self.eval_constexpr(rhs)?;
                Ok(eval_const_binop(*op, l, r))
            }
        }
    }
}

impl Default for Codegen {
    fn default() -> Self {
        Codegen::new()
    }
}

fn eval_const_binop(op: ast::BinOp, l: i32, r: i32) -> i32 {
    match op {
        ast::BinOp::Plus => l.wrapping_add(r),
        ast::BinOp::Minus => l.wrapping_sub(r),
        ast::BinOp::Mult => l.wrapping_mul(r),
        ast::BinOp::Div => l.checked_div(r).unwrap_or(0),
        ast::BinOp::Mod => l.checked_rem(r).unwrap_or(0),
        ast::BinOp::Lt => (l < r) as i32,
        ast::BinOp::LtEq => (l <= r) as i32,
        ast::BinOp::Gt => (l > r) as i32,
        ast::BinOp::GtEq => (l >= r) as i32,
        ast::BinOp::Eq => (l == r) as i32,
        ast::BinOp::Neq => (l != r) as i32,
        ast::BinOp::And => ((l != 0) && (r != 0)) as i32,
        ast::BinOp::Or => ((l != 0) || (r != 0)) as i32,
    }
}

fn ir_type(ty: ast::Type) -> Ty {
    match ty {
        ast::Type::Int => Ty::I32,
        ast::Type::Void => Ty::Void,
    }
}

/// Per-function lowering state: the IR function under construction plus the
/// "current block" cursor codegen threads through statement lowering.
struct FuncCtx<'a> {
    gen: &'a mut Codegen,
    func: &'a mut Function,
    current: BlockRef,
}

impl<'a> FuncCtx<'a> {
    /// Opens a fresh, unterminated block and makes it current.
    fn open_block(&mut self) -> BlockRef {
        let b = self.func.new_block();
        self.current = b;
        b
    }

    /// Terminates `self.current` and immediately opens a fresh current
    /// block - the "terminate, then open a fresh block" idiom used by
    /// every control-flow-ending statement (return/break/continue).
    fn terminate_current(&mut self, term: Terminator) {
        self.func.set_terminator(self.current, term);
        self.open_block();
    }

    fn cast(&mut self, typed: Typed, target: Ty) -> CompileResult<Operand> {
        if typed.ty == target {
            return Ok(typed.operand);
        }
        match (typed.ty, target) {
            (Ty::I1, Ty::I32) => Ok(self.func.emit(
                self.current,
                Instr::Zext { from: Ty::I1, value: typed.operand, to: Ty::I32 },
            )),
            (Ty::I32, Ty::I1) => Ok(self.func.emit(
                self.current,
                Instr::Binary {
                    op: BinOp::IcmpNe,
                    ty: Ty::I32,
                    lhs: typed.operand,
                    rhs: Operand::Const(0),
                },
            )),
            _ => Err(CompileError::UnsupportedCast),
        }
    }

    fn add_expr(&mut self, expr: &ast::Expr) -> CompileResult<Typed> {
        match expr {
            ast::Expr::Number(n) => Ok(Typed { ty: Ty::I32, operand: Operand::Const(*n) }),
            ast::Expr::Ident(name) => {
                let sym = self.gen.lookup(name)?;
                match sym.kind {
                    SymbolKind::Const => Ok(Typed { ty: sym.ty, operand: sym.binding }),
                    SymbolKind::Var => {
                        let operand = self.func.emit(
                            self.current,
                            Instr::Load { ty: sym.ty, ptr: sym.binding },
                        );
                        Ok(Typed { ty: sym.ty, operand })
                    }
                    SymbolKind::Func => Err(CompileError::FunctionUsedAsVariable),
                }
            }
            ast::Expr::FuncCall(name, args) => {
                let sym = self.gen.lookup(name)?;
                if sym.kind != SymbolKind::Func {
                    return Err(CompileError::VariableUsedAsFunction);
                }
                if sym.argc != args.len() {
                    return Err(CompileError::MismatchedArgumentCount);
                }
                let mut ir_args = Vec::with_capacity(args.len());
                for arg in args {
                    let typed = self.add_expr(arg)?;
                    let casted = self.cast(typed, Ty::I32)?;
                    ir_args.push((Ty::I32, casted));
                }
                let callee = match &sym.binding {
                    Operand::Global(name) => name.clone(),
                    _ => unreachable!("FUNC symbols always bind to Operand::Global"),
                };
                let id = self.func.append(
                    self.current,
                    Instr::Call { ty: sym.ty, callee, args: ir_args },
                );
                if matches!(sym.ty, Ty::Void) {
                    Ok(Typed { ty: Ty::Void, operand: Operand::Const(0) })
                } else {
                    Ok(Typed { ty: sym.ty, operand: Operand::Instr(id) })
                }
            }
            ast::Expr::Unary(ast::UnOp::Pos, operand) => {
                let typed = self.add_expr(operand)?;
                let casted = self.cast(typed, Ty::I32)?;
                Ok(Typed { ty: Ty::I32, operand: casted })
            }
            ast::Expr::Unary(ast::UnOp::Neg, operand) => {
                let typed = self.add_expr(operand)?;
                let casted = self.cast(typed, Ty::I32)?;
                let result = self.func.emit(
                    self.current,
                    Instr::Binary {
                        op: BinOp::Sub,
                        ty: Ty::I32,
                        lhs: Operand::Const(0),
                        rhs: casted,
                    },
                );
                Ok(Typed { ty: Ty::I32, operand: result })
            }
            ast::Expr::Unary(ast::UnOp::Not, operand) => {
                let typed = self.add_expr(operand)?;
                let ty = typed.ty;
                let result = self.func.emit(
                    self.current,
                    Instr::Binary {
                        op: BinOp::IcmpEq,
                        ty,
                        lhs: typed.operand,
                        rhs: Operand::Const(0),
                    },
                );
                Ok(Typed { ty: Ty::I1, operand: result })
            }
            ast::Expr::Binary(op, lhs, rhs) => {
                let (ir_op, operand_ty, result_ty) = binop_mapping(*op);
                let lhs = self.add_expr(lhs)?;
                let lhs = self.cast(lhs, operand_ty)?;
                let rhs = self.add_expr(rhs)?;
                let rhs = self.cast(rhs, operand_ty)?;
                let result = self.func.emit(
                    self.current,
                    Instr::Binary { op: ir_op, ty: operand_ty, lhs, rhs },
                );
                Ok(Typed { ty: result_ty, operand: result })
            }
        }
    }

    fn add_stmt(&mut self, stmt: &ast::Stmt) -> CompileResult<()> {
        match stmt {
            ast::Stmt::Empty => Ok(()),
            ast::Stmt::Block(body) => {
                self.gen.scopes.push(Scope::new());
                for s in body {
                    self.add_stmt(s)?;
                }
                self.gen.scopes.pop();
                Ok(())
            }
            ast::Stmt::Assign(name, expr) => {
                let sym = self.gen.lookup(name)?;
                if sym.kind != SymbolKind::Var {
                    return Err(CompileError::CantAssignToConstantOrFunction);
                }
                let typed = self.add_expr(expr)?;
                let casted = self.cast(typed, sym.ty)?;
                self.func.append(
                    self.current,
                    Instr::Store { ty: sym.ty, value: casted, ptr: sym.binding },
                );
                Ok(())
            }
            ast::Stmt::Return(None) => {
                if self.func.rettype != Ty::Void {
                    return Err(CompileError::ReturnWithoutValueFromIntFunction);
                }
                self.terminate_current(Terminator::Ret { ty: Ty::Void, value: None });
                Ok(())
            }
            ast::Stmt::Return(Some(expr)) => {
                if self.func.rettype != Ty::I32 {
                    return Err(CompileError::ReturnValueFromVoidFunction);
                }
                let typed = self.add_expr(expr)?;
                let casted = self.cast(typed, Ty::I32)?;
                self.terminate_current(Terminator::Ret {
                    ty: Ty::I32,
                    value: Some(casted),
                });
                Ok(())
            }
            ast::Stmt::Break => {
                match self.gen.loops.last() {
                    None => return Err(CompileError::LoopControlOutsideLoop),
                    Some(_) => {}
                }
                let here = self.current;
                self.gen.loops.last_mut().unwrap().breaks.push(here);
                self.open_block();
                Ok(())
            }
            ast::Stmt::Continue => {
                let loop_begin = match self.gen.loops.last() {
                    None => return Err(CompileError::LoopControlOutsideLoop),
                    Some(ctx) => ctx.loop_begin,
                };
                self.terminate_current(Terminator::Br { dest: loop_begin });
                Ok(())
            }
            ast::Stmt::ExprStmt(expr) => {
                self.add_expr(expr)?;
                Ok(())
            }
            ast::Stmt::VarDecl(decl) => self.add_local_var_decl(decl),
            ast::Stmt::If(cond, then_branch) => {
                let typed = self.add_expr(cond)?;
                let cond_i1 = self.cast(typed, Ty::I1)?;
                let cond_end = self.current;

                let body_begin = self.open_block();
                self.add_stmt(then_branch)?;
                let body_end = self.current;

                let after = self.open_block();

                self.func.set_terminator(
                    cond_end,
                    Terminator::BrCond { cond: cond_i1, iftrue: body_begin, iffalse: after },
                );
                self.func.set_terminator(body_end, Terminator::Br { dest: after });
                Ok(())
            }
            ast::Stmt::IfElse(cond, then_branch, else_branch) => {
                let typed = self.add_expr(cond)?;
                let cond_i1 = self.cast(typed, Ty::I1)?;
                let cond_end = self.current;

                let true_begin = self.open_block();
                self.add_stmt(then_branch)?;
                let true_end = self.current;

                let false_begin = self.open_block();
                self.add_stmt(else_branch)?;
                let false_end = self.current;

                let after = self.open_block();

                self.func.set_terminator(
                    cond_end,
                    Terminator::BrCond { cond: cond_i1, iftrue: true_begin, iffalse: false_begin },
                );
                self.func.set_terminator(true_end, Terminator::Br { dest: after });
                self.func.set_terminator(false_end, Terminator::Br { dest: after });
                Ok(())
            }
            ast::Stmt::While(cond, body) => {
                let before = self.current;
                let cond_begin = self.open_block();
                self.func.set_terminator(before, Terminator::Br { dest: cond_begin });

                let typed = self.add_expr(cond)?;
                let cond_i1 = self.cast(typed, Ty::I1)?;
                let cond_end = self.current;

                let body_begin = self.open_block();
                self.gen.loops.push(LoopCtx { loop_begin: cond_begin, breaks: Vec::new() });
                self.add_stmt(body)?;
                let body_end = self.current;
                let loop_ctx = self.gen.loops.pop().unwrap();

                let after = self.open_block();

                self.func.set_terminator(
                    cond_end,
                    Terminator::BrCond { cond: cond_i1, iftrue: body_begin, iffalse: after },
                );
                self.func.set_terminator(body_end, Terminator::Br { dest: cond_begin });
                for break_block in loop_ctx.breaks {
                    self.func.set_terminator(break_block, Terminator::Br { dest: after });
                }
                Ok(())
            }
        }
    }

    fn add_local_var_decl(&mut self, decl: &ast::VarDecl) -> CompileResult<()> {
        if decl.ty == ast::Type::Void {
            return Err(CompileError::VariablesCantBeVoid);
        }
        if decl.is_const {
            for def in &decl.defs {
                let value = match &def.init {
                    Some(e) => self.gen.eval_constexpr(e)?,
                    None => return Err(CompileError::ConstantNotInitialized),
                };
                self.gen.declare(
                    &def.name,
                    Symbol {
                        kind: SymbolKind::Const,
                        ty: Ty::I32,
                        argc: 0,
                        binding: Operand::Const(value),
                    },
                    CompileError::RedeclaredConstant,
                )?;
            }
            return Ok(());
        }
        for def in &decl.defs {
            let ptr = self.func.emit(self.current, Instr::Alloca { ty: Ty::I32 });
            self.gen.declare(
                &def.name,
                Symbol { kind: SymbolKind::Var, ty: Ty::I32, argc: 0, binding: ptr.clone() },
                CompileError::RedeclaredVariable,
            )?;
            if let Some(init) = &def.init {
                let typed = self.add_expr(init)?;
                let casted = self.cast(typed, Ty::I32)?;
                self.func.append(
                    self.current,
                    Instr::Store { ty: Ty::I32, value: casted, ptr },
                );
            }
        }
        Ok(())
    }
}

fn binop_mapping(op: ast::BinOp) -> (BinOp, Ty, Ty) {
    match op {
        ast::BinOp::Plus => (BinOp::Add, Ty::I32, Ty::I32),
        ast::BinOp::Minus => (BinOp::Sub, Ty::I32, Ty::I32),
        ast::BinOp::Mult => (BinOp::Mul, Ty::I32, Ty::I32),
        ast::BinOp::Div => (BinOp::SDiv, Ty::I32, Ty::I32),
        ast::BinOp::Mod => (BinOp::SRem, Ty::I32, Ty::I32),
        ast::BinOp::Lt => (BinOp::IcmpSlt, Ty::I32, Ty::I1),
        ast::BinOp::LtEq => (BinOp::IcmpSle, Ty::I32, Ty::I1),
        ast::BinOp::Gt => (BinOp::IcmpSgt, Ty::I32, Ty::I1),
        ast::BinOp::GtEq => (BinOp::IcmpSge, Ty::I32, Ty::I1),
        ast::BinOp::Eq => (BinOp::IcmpEq, Ty::I32, Ty::I1),
        ast::BinOp::Neq => (BinOp::IcmpNe, Ty::I32, Ty::I1),
        ast::BinOp::And => (BinOp::And, Ty::I1, Ty::I1),
        ast::BinOp::Or => (BinOp::Or, Ty::I1, Ty::I1),
    }
}
