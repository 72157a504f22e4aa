//! The `minic` binary: a single-shot, flag-free filter. Reads a whole
//! program from stdin, runs it through lexing, parsing, codegen, and
//! mem2reg, and writes the rendered IR to stdout. Diagnostics go to stdout
//! too (see `run`'s doc comment) - `RUST_LOG` is the only way to see
//! anything on stderr.

use std::io::{self, Read};
use std::process::ExitCode;

use minic_common::CompileResult;
use minic_ir::{mem2reg, printer, Codegen};
use minic_parser::Parser;

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let mut source = String::new();
    if io::stdin().read_to_string(&mut source).is_err() {
        println!("unexpected end of input");
        return ExitCode::FAILURE;
    }

    match run(&source) {
        Ok(text) => {
            print!("{text}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Runs the full pipeline over `source`, returning the rendered IR text.
/// On any stage's failure the error's `Display` text is the one line the
/// CLI contract requires; callers print it to stdout, not stderr.
fn run(source: &str) -> CompileResult<String> {
    let ast = Parser::new(source)?.parse_program()?;
    let mut program = Codegen::compile(&ast)?;
    mem2reg::run(&mut program);
    let text = printer::render(&program)?;
    log::debug!("printer done: {} bytes", text.len());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_program_renders_ir_text() {
        let text = run("int main(){return 0;}").unwrap();
        assert!(text.contains("define dso_local i32 @main() {"));
        assert!(text.contains("ret i32 0"));
    }

    #[test]
    fn parse_error_renders_fixed_message() {
        let err = run("int main() { return 0 }").unwrap_err();
        assert_eq!(err.to_string(), "expected ';'");
    }

    #[test]
    fn name_resolution_error_renders_fixed_message() {
        let err = run("int main(){ return undefined_name; }").unwrap_err();
        assert_eq!(err.to_string(), "can't find symbol");
    }
}
