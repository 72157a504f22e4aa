//! A small interpreter for the IR, used only to test that mem2reg and
//! constant folding preserve program semantics. Nothing in the surrounding
//! toolchain needs this at compile time; it exists purely as a test
//! oracle, so it is deliberately minimal: no instruction scheduling, no
//! undefined-behavior detection, just a direct walk of the CFG evaluating
//! one instruction at a time against an explicit vreg store.

use std::collections::HashMap;

use crate::ir::{BinOp, BlockRef, Function, GlobalDef, Instr, InstrRef, Operand, Program, Terminator, Ty};

/// The four implicitly-declared library functions, backed by explicit
/// input/output queues instead of a real stdio stream.
#[derive(Debug, Default)]
pub struct Io {
    pub input: Vec<i32>,
    pub output: Vec<i32>,
}

impl Io {
    fn getint(&mut self) -> i32 {
        if self.input.is_empty() {
            0
        } else {
            self.input.remove(0)
        }
    }

    fn putint(&mut self, v: i32) {
        self.output.push(v);
    }
}

/// Interprets `program`'s `entry` function with the given argument values
/// and I/O queues, returning its i32 return value (0 for a void function).
pub fn run(program: &Program, entry: &str, args: &[i32], io: &mut Io) -> i32 {
    let func = program
        .globals
        .iter()
        .find_map(|g| match g {
            GlobalDef::Func(f) if f.name == entry => Some(f),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no function named {entry}"));
    let mut globals: HashMap<String, i32> = program
        .globals
        .iter()
        .filter_map(|g| match g {
            GlobalDef::GlobalVar { name, value, .. } => Some((name.clone(), *value)),
            _ => None,
        })
        .collect();
    call(program, func, args, &mut globals, io)
}

fn call(program: &Program, func: &Function, args: &[i32], globals: &mut HashMap<String, i32>, io: &mut Io) -> i32 {
    let mut values: HashMap<InstrRef, i32> = HashMap::new();
    let mut memory: HashMap<InstrRef, i32> = HashMap::new();
    let mut block: BlockRef = 0;
    let mut prev_block: BlockRef = 0;

    loop {
        let b = &func.blocks[block];

        for &phi_id in &b.phis {
            if let Instr::Phi { sources, .. } = &func.instrs[phi_id] {
                let (value, _) = sources
                    .iter()
                    .find(|(_, from)| *from == prev_block)
                    .unwrap_or_else(|| panic!("phi in block {block} has no source for predecessor {prev_block}"));
                values.insert(phi_id, eval_operand(value, args, &values));
            }
        }

        for &id in &b.body {
            let result = eval_instr(program, &func.instrs[id], args, &values, &mut memory, globals, io);
            if let Some(v) = result {
                values.insert(id, v);
            }
        }

        match &b.terminator {
            Terminator::Ret { value, .. } => {
                return match value {
                    Some(op) => eval_operand(op, args, &values),
                    None => 0,
                };
            }
            Terminator::Br { dest } => {
                prev_block = block;
                block = *dest;
            }
            Terminator::BrCond { cond, iftrue, iffalse } => {
                let c = eval_operand(cond, args, &values);
                prev_block = block;
                block = if c != 0 { *iftrue } else { *iffalse };
            }
            Terminator::Unset => panic!("block {block} has no terminator"),
        }
    }
}

fn eval_operand(op: &Operand, args: &[i32], values: &HashMap<InstrRef, i32>) -> i32 {
    match op {
        Operand::Const(v) => *v,
        Operand::Arg(i) => args[*i],
        Operand::Instr(id) => values[id],
        Operand::Global(_) => panic!("global-valued operand is not a scalar int"),
    }
}

/// Where a pointer operand resolves to: a local `alloca` (keyed by its
/// defining instruction id) or a named global variable.
enum Address {
    Local(InstrRef),
    Global(String),
}

fn resolve_ptr(op: &Operand) -> Address {
    match op {
        Operand::Instr(id) => Address::Local(*id),
        Operand::Global(name) => Address::Global(name.clone()),
        _ => panic!("pointer operand must reference an alloca or a global"),
    }
}

fn eval_instr(
    program: &Program,
    instr: &Instr,
    args: &[i32],
    values: &HashMap<InstrRef, i32>,
    memory: &mut HashMap<InstrRef, i32>,
    globals: &mut HashMap<String, i32>,
    io: &mut Io,
) -> Option<i32> {
    match instr {
        Instr::Binary { op, lhs, rhs, .. } => {
            let l = eval_operand(lhs, args, values);
            let r = eval_operand(rhs, args, values);
            Some(eval_binop(*op, l, r))
        }
        Instr::Alloca { .. } => None,
        Instr::Store { value, ptr, .. } => {
            let v = eval_operand(value, args, values);
            match resolve_ptr(ptr) {
                Address::Local(id) => {
                    memory.insert(id, v);
                }
                Address::Global(name) => {
                    globals.insert(name, v);
                }
            }
            None
        }
        Instr::Load { ptr, .. } => Some(match resolve_ptr(ptr) {
            Address::Local(id) => *memory.get(&id).unwrap_or(&0),
            Address::Global(name) => *globals.get(&name).unwrap_or(&0),
        }),
        Instr::Call { callee, args: call_args, ty } => {
            let arg_values: Vec<i32> = call_args.iter().map(|(_, a)| eval_operand(a, args, values)).collect();
            let result = match callee.as_str() {
                "getint" => io.getint(),
                "getch" => io.getch(),
                "putint" => {
                    io.putint(arg_values[0]);
                    0
                }
                "putch" => {
                    io.putch(arg_values[0]);
                    0
                }
                name => {
                    let func = program
                        .globals
                        .iter()
                        .find_map(|g| match g {
                            GlobalDef::Func(f) if f.name == name => Some(f),
                            _ => None,
                        })
                        .unwrap_or_else(|| panic!("call to undefined function {name}"));
                    call(program, func, &arg_values, globals, io)
                }
            };
            if matches!(ty, Ty::Void) {
                None
            } else {
                Some(result)
            }
        }
        Instr::Zext { value, .. } => Some(eval_operand(value, args, values)),
        Instr::Phi { .. } => None, // phis are seeded before the body loop runs
    }
}

fn eval_binop(op: BinOp, l: i32, r: i32) -> i32 {
    match op {
        BinOp::Add => l.wrapping_add(r),
        BinOp::Sub => l.wrapping_sub(r),
        BinOp::Mul => l.wrapping_mul(r),
        BinOp::SDiv => l.checked_div(r).unwrap_or(0),
        BinOp::SRem => l.checked_rem(r).unwrap_or(0),
        BinOp::IcmpSlt => (l < r) as i32,
        BinOp::IcmpSle => (l <= r) as i32,
        BinOp::IcmpSgt => (l > r) as i32,
        BinOp::IcmpSge => (l >= r) as i32,
        BinOp::IcmpEq => (l == r) as i32,
        BinOp::IcmpNe => (l != r) as i32,
        BinOp::And => ((l != 0) && (r != 0)) as i32,
        BinOp::Or => ((l != 0) || (r != 0)) as i32,
    }
}

impl Io {
    fn getch(&mut self) -> i32 {
        self.getint()
    }

    fn putch(&mut self, v: i32) {
        self.putint(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::Codegen;
    use crate::mem2reg;
    use minic_parser::Parser;

    fn compile(src: &str) -> Program {
        let ast = Parser::new(src).unwrap().parse_program().unwrap();
        Codegen::compile(&ast).unwrap()
    }

    #[test]
    fn mem2reg_preserves_semantics_for_while_loop() {
        let src = "int main(){int x=0; int i=0; while(i<10){x=x+i; i=i+1;} return x;}";
        let naive = compile(src);
        let mut optimized = naive.clone();
        mem2reg::run(&mut optimized);

        let mut io = Io::default();
        let naive_result = run(&naive, "main", &[], &mut io);
        let mut io2 = Io::default();
        let optimized_result = run(&optimized, "main", &[], &mut io2);

        assert_eq!(naive_result, 45);
        assert_eq!(optimized_result, 45);
    }

    #[test]
    fn mem2reg_preserves_semantics_for_if_else() {
        let src = "int f(int a, int b){ if (a < b) return a; else return b; }int main(){return f(3,9)+f(9,3);}";
        let program_naive = compile(src);
        let mut program_opt = program_naive.clone();
        mem2reg::run(&mut program_opt);

        let mut io = Io::default();
        assert_eq!(run(&program_naive, "main", &[], &mut io), 12);
        let mut io2 = Io::default();
        assert_eq!(run(&program_opt, "main", &[], &mut io2), 12);
    }

    #[test]
    fn function_calls_and_recursion_evaluate_correctly() {
        let src = "int fib(int n){ if (n < 2) return n; return fib(n-1)+fib(n-2); } int main(){ return fib(10); }";
        let mut program = compile(src);
        mem2reg::run(&mut program);
        let mut io = Io::default();
        assert_eq!(run(&program, "main", &[], &mut io), 55);
    }
}
