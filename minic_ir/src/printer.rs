//! Vreg numbering and the LLVM-IR-flavored textual printer.
//!
//! Rendering happens in two passes per function: first every block and
//! every result-producing instruction is assigned a sequential vreg
//! number (arguments keep their positional numbers, so the counter starts
//! at `argc`), then the function is walked again to emit text using that
//! numbering.

use std::collections::HashMap;
use std::fmt::Write as _;

use minic_common::{CompileError, CompileResult};

use crate::ir::{BlockRef, Function, GlobalDef, Instr, InstrRef, Operand, Program, Terminator, Ty};

struct Numbering {
    block_labels: Vec<u32>,
    instr_vregs: HashMap<InstrRef, u32>,
}

/// Walks a function in block order, numbering each block's label and then
/// each of its result-producing instructions (phis first, then body).
fn number_function(func: &Function) -> Numbering {
    let mut counter = func.arg_types.len() as u32;
    let mut block_labels = vec![0u32; func.blocks.len()];
    let mut instr_vregs = HashMap::new();

    for (b, block) in func.blocks.iter().enumerate() {
        block_labels[b] = counter;
        counter += 1;
        for id in block.all_instrs() {
            if func.result_type(id).is_some() {
                instr_vregs.insert(id, counter);
                counter += 1;
            }
        }
    }

    Numbering { block_labels, instr_vregs }
}

fn ty_str(ty: Ty) -> &'static str {
    match ty {
        Ty::Void => "void",
        Ty::I1 => "i1",
        Ty::I32 => "i32",
        Ty::Ptr => "ptr",
        Ty::Label => "label",
    }
}

fn render_operand(op: &Operand, n: &Numbering) -> String {
    match op {
        Operand::Const(v) => v.to_string(),
        Operand::Instr(id) => format!("%{}", n.instr_vregs[id]),
        Operand::Arg(i) => format!("%{}", i),
        Operand::Global(name) => format!("@{}", name),
    }
}

fn render_label(block: BlockRef, n: &Numbering) -> String {
    format!("%{}", n.block_labels[block])
}

/// Renders a whole compiled program as LLVM-compatible IR text.
pub fn render(program: &Program) -> CompileResult<String> {
    let mut out = String::new();
    for (i, global) in program.globals.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        render_global(&mut out, global)?;
    }
    Ok(out)
}

fn render_global(out: &mut String, global: &GlobalDef) -> CompileResult<()> {
    match global {
        GlobalDef::FuncDecl { rettype, name, arg_types } => {
            let args = arg_types.iter().map(|t| ty_str(*t)).collect::<Vec<_>>().join(", ");
            let _ = writeln!(out, "declare {} @{}({})", ty_str(*rettype), name, args);
            Ok(())
        }
        GlobalDef::GlobalVar { name, ty, value } => {
            let _ = writeln!(out, "@{} = dso_local global {} {}", name, ty_str(*ty), value);
            Ok(())
        }
        GlobalDef::Func(func) => render_function(out, func),
    }
}

fn render_function(out: &mut String, func: &Function) -> CompileResult<()> {
    let n = number_function(func);

    let args = func
        .arg_types
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{} %{}", ty_str(*t), i))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "define dso_local {} @{}({}) {{", ty_str(func.rettype), func.name, args);

    for (b, block) in func.blocks.iter().enumerate() {
        if b > 0 {
            let _ = writeln!(out, "{}:", n.block_labels[b]);
        }
        for id in block.all_instrs() {
            render_instr(out, id, &func.instrs[id], &n)?;
        }
        render_terminator(out, &block.terminator, &n)?;
    }

    out.push_str("}\n");
    Ok(())
}

fn render_instr(out: &mut String, id: InstrRef, instr: &Instr, n: &Numbering) -> CompileResult<()> {
    let result = n.instr_vregs.get(&id).map(|v| format!("%{} = ", v)).unwrap_or_default();
    match instr {
        Instr::Binary { op, ty, lhs, rhs } => {
            let _ = writeln!(
                out,
                "    {}{} {} {}, {}",
                result,
                op.mnemonic(),
                ty_str(*ty),
                render_operand(lhs, n),
                render_operand(rhs, n)
            );
        }
        Instr::Alloca { ty } => {
            let _ = writeln!(out, "    {}alloca {}", result, ty_str(*ty));
        }
        Instr::Store { ty, value, ptr } => {
            let _ = writeln!(
                out,
                "    store {} {}, ptr {}",
                ty_str(*ty),
                render_operand(value, n),
                render_operand(ptr, n)
            );
        }
        Instr::Load { ty, ptr } => {
            let _ = writeln!(out, "    {}load {}, ptr {}", result, ty_str(*ty), render_operand(ptr, n));
        }
        Instr::Call { ty, callee, args } => {
            let rendered_args = args
                .iter()
                .map(|(t, a)| format!("{} {}", ty_str(*t), render_operand(a, n)))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "    {}call {} @{}({})", result, ty_str(*ty), callee, rendered_args);
        }
        Instr::Zext { from, value, to } => {
            let _ = writeln!(
                out,
                "    {}zext {} {} to {}",
                result,
                ty_str(*from),
                render_operand(value, n),
                ty_str(*to)
            );
        }
        Instr::Phi { ty, sources } => {
            let rendered_sources = sources
                .iter()
                .map(|(v, b)| format!("[{}, {}]", render_operand(v, n), render_label(*b, n)))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "    {}phi {} {}", result, ty_str(*ty), rendered_sources);
        }
    }
    Ok(())
}

fn render_terminator(out: &mut String, term: &Terminator, n: &Numbering) -> CompileResult<()> {
    match term {
        Terminator::Unset => return Err(CompileError::BlockNotTerminated),
        Terminator::Ret { ty, value } => match (ty, value) {
            (Ty::Void, _) => {
                let _ = writeln!(out, "    ret void");
            }
            (_, Some(v)) => {
                let _ = writeln!(out, "    ret {} {}", ty_str(*ty), render_operand(v, n));
            }
            (_, None) => return Err(CompileError::BlockNotTerminated),
        },
        Terminator::Br { dest } => {
            let _ = writeln!(out, "    br label {}", render_label(*dest, n));
        }
        Terminator::BrCond { cond, iftrue, iffalse } => {
            let _ = writeln!(
                out,
                "    br i1 {}, label {}, label {}",
                render_operand(cond, n),
                render_label(*iftrue, n),
                render_label(*iffalse, n)
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::Codegen;
    use crate::mem2reg;
    use minic_parser::Parser;

    fn compile(src: &str) -> Program {
        let ast = Parser::new(src).unwrap().parse_program().unwrap();
        let mut program = Codegen::compile(&ast).unwrap();
        mem2reg::run(&mut program);
        program
    }

    #[test]
    fn renders_minimal_function() {
        let program = compile("int main() { return 0; }");
        let text = render(&program).unwrap();
        assert!(text.contains("define dso_local i32 @main() {"));
        assert!(text.contains("ret i32 0"));
    }

    #[test]
    fn renders_builtin_declarations_before_definitions() {
        let program = compile("int main() { putint(getint()); return 0; }");
        let text = render(&program).unwrap();
        let decl_pos = text.find("declare i32 @getint()").unwrap();
        let define_pos = text.find("define dso_local i32 @main").unwrap();
        assert!(decl_pos < define_pos);
        assert!(text.contains("declare void @putint(i32)"));
    }

    #[test]
    fn renders_phi_with_two_sources() {
        let program = compile(
            "int main() { int x; if (1) { x = 1; } else { x = 2; } return x; }",
        );
        let text = render(&program).unwrap();
        assert!(text.contains("= phi i32 ["));
    }
}
