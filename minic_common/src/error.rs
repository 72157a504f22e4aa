//! The single error type shared by every compiler stage.
//!
//! Every stage returns `CompileResult<T>`; `main` needs exactly one match
//! arm to turn an `Err` into the one-line diagnostic the CLI contract
//! requires. No source position is carried - messages are fixed strings,
//! not located ones.

use thiserror::Error;

/// Result alias used throughout the lexer, parser, and codegen stages.
pub type CompileResult<T> = Result<T, CompileError>;

/// A compiler diagnostic. `Display` renders exactly the fixed message text
/// the CLI prints verbatim to stdout on failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    // --- lex/parse errors ---
    #[error("expected '{0}'")]
    Expected(&'static str),
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("invalid integer literal")]
    InvalidIntLiteral,
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    // --- name resolution ---
    #[error("can't find symbol")]
    SymbolNotFound,
    #[error("duplicate argument name")]
    DuplicateArgumentName,
    #[error("duplicate function name")]
    DuplicateFunctionName,
    #[error("redeclared variable")]
    RedeclaredVariable,
    #[error("redeclared constant")]
    RedeclaredConstant,

    // --- type/use errors ---
    #[error("variables can't be void")]
    VariablesCantBeVoid,
    #[error("unsupported argument type")]
    UnsupportedArgumentType,
    #[error("function used as a variable")]
    FunctionUsedAsVariable,
    #[error("variable used as a function")]
    VariableUsedAsFunction,
    #[error("can't assign to constant or function")]
    CantAssignToConstantOrFunction,
    #[error("mismatched number of arguments")]
    MismatchedArgumentCount,
    #[error("unsupported cast")]
    UnsupportedCast,
    #[error("can't return a value from a function with rettype void")]
    ReturnValueFromVoidFunction,
    #[error("can't return without a value from a function with rettype int")]
    ReturnWithoutValueFromIntFunction,

    // --- constant-expression errors ---
    #[error("constant must be initialized")]
    ConstantNotInitialized,
    #[error("constant must be initialized with a constant expression")]
    ConstantNotConstexpr,

    // --- control-flow errors ---
    #[error("break or continue used outside loop")]
    LoopControlOutsideLoop,

    // --- internal invariants (bugs if tripped) ---
    #[error("block not terminated!")]
    BlockNotTerminated,
    #[error("not a binary/unary operator!")]
    NotAnOperator,
}
