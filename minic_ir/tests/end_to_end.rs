//! End-to-end pipeline tests: source text through the lexer, parser,
//! code generator, mem2reg, interpreter, and printer together.

use minic_ir::{interp, printer, Codegen};
use minic_ir::mem2reg;
use minic_parser::Parser;
use pretty_assertions::assert_eq;

fn compile_and_optimize(src: &str) -> minic_ir::Program {
    let ast = Parser::new(src).unwrap().parse_program().unwrap();
    let mut program = Codegen::compile(&ast).unwrap();
    mem2reg::run(&mut program);
    program
}

#[test]
fn s1_minimal_main() {
    let program = compile_and_optimize("int main(){return 0;}");
    let text = printer::render(&program).unwrap();
    assert!(text.contains("define dso_local i32 @main() {"));
    assert!(text.contains("ret i32 0"));
    assert!(!text.contains("alloca"));
}

#[test]
fn s2_straight_line_arithmetic_folds_away_memory_traffic() {
    let program = compile_and_optimize("int main(){int x=1; x=x+2; return x;}");
    let text = printer::render(&program).unwrap();
    assert!(!text.contains("alloca"));
    assert!(!text.contains("load"));
    let mut io = interp::Io::default();
    assert_eq!(interp::run(&program, "main", &[], &mut io), 3);
}

#[test]
fn s3_while_loop_gets_two_header_phis_and_sums_to_45() {
    let program = compile_and_optimize(
        "int main(){int x=0; int i=0; while(i<10){x=x+i; i=i+1;} return x;}",
    );
    let text = printer::render(&program).unwrap();
    assert_eq!(text.matches("= phi i32").count(), 2);
    let mut io = interp::Io::default();
    assert_eq!(interp::run(&program, "main", &[], &mut io), 45);
}

#[test]
fn s4_if_else_returns_each_parameter_with_no_alloca() {
    let program = compile_and_optimize("int f(int a,int b){ if(a<b) return a; else return b; }");
    let text = printer::render(&program).unwrap();
    assert!(!text.contains("alloca"));
    assert!(text.contains("ret i32 %0"));
    assert!(text.contains("ret i32 %1"));
}

#[test]
fn s5_implicit_builtins_are_declared_and_wired_up() {
    let program = compile_and_optimize("int main(){putint(getint()+1); return 0;}");
    let text = printer::render(&program).unwrap();
    let getint_decl = text.find("declare i32 @getint()").unwrap();
    let putint_decl = text.find("declare void @putint(i32)").unwrap();
    let main_def = text.find("define dso_local i32 @main").unwrap();
    assert!(getint_decl < main_def);
    assert!(putint_decl < main_def);
    assert!(text.contains("call i32 @getint()"));
    assert!(text.contains("call void @putint(i32"));

    let mut io = interp::Io { input: vec![41], output: Vec::new() };
    interp::run(&program, "main", &[], &mut io);
    assert_eq!(io.output, vec![42]);
}

#[test]
fn s6_constant_folds_without_any_global_storage() {
    let program = compile_and_optimize("const int K = 2*3+1; int main(){return K;}");
    let text = printer::render(&program).unwrap();
    assert!(!text.contains("@K"));
    assert!(!text.contains("alloca"));
    let mut io = interp::Io::default();
    assert_eq!(interp::run(&program, "main", &[], &mut io), 7);
}

#[test]
fn recursive_calls_interpret_correctly_after_promotion() {
    let program = compile_and_optimize(
        "int fact(int n){ if (n <= 1) return 1; return n*fact(n-1); } int main(){ return fact(5); }",
    );
    let mut io = interp::Io::default();
    assert_eq!(interp::run(&program, "main", &[], &mut io), 120);
}

#[test]
fn global_variable_round_trips_through_the_printer() {
    let program = compile_and_optimize("int counter = 5; int main(){ return counter; }");
    let text = printer::render(&program).unwrap();
    assert!(text.contains("@counter = dso_local global i32 5"));
}
