//! The SSA intermediate representation: types, operands, instructions,
//! blocks, functions, and the whole-program container.
//!
//! Instructions live in a single per-function arena (`Function::instrs`);
//! an `InstrRef` is a stable index into that arena, valid for the lifetime
//! of the function even across the deletions mem2reg performs (deleting an
//! instruction only drops its id from a block's instruction list - the
//! arena slot itself is never reused or freed, so no live `Operand::Instr`
//! can ever dangle). Blocks are likewise addressed by a stable index into
//! `Function::blocks`, a vector that only ever grows.

/// A value or pointer type in the IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    Void,
    I1,
    I32,
    Ptr,
    Label,
}

/// Stable handle to an instruction's arena slot. Doubles as "the SSA value
/// this instruction defines" when the instruction has a result.
pub type InstrRef = usize;

/// Stable handle to a block within its owning function.
pub type BlockRef = usize;

/// An operand to an instruction or terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// An immediate integer (also used to mean "the boolean `false`/`0`"
    /// for I1 operands produced by constant folding).
    Const(i32),
    /// A reference to the value produced by another instruction.
    Instr(InstrRef),
    /// The `index`th parameter of the enclosing function.
    Arg(usize),
    /// The address of a global variable or function symbol.
    Global(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    SRem,
    IcmpSlt,
    IcmpSle,
    IcmpSgt,
    IcmpSge,
    IcmpEq,
    IcmpNe,
    And,
    Or,
}

impl BinOp {
    /// The LLVM-text mnemonic used by the printer.
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::SRem => "srem",
            BinOp::IcmpSlt => "icmp slt",
            BinOp::IcmpSle => "icmp sle",
            BinOp::IcmpSgt => "icmp sgt",
            BinOp::IcmpSge => "icmp sge",
            BinOp::IcmpEq => "icmp eq",
            BinOp::IcmpNe => "icmp ne",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }

    pub fn is_icmp(self) -> bool {
        matches!(
            self,
            BinOp::IcmpSlt
                | BinOp::IcmpSle
                | BinOp::IcmpSgt
                | BinOp::IcmpSge
                | BinOp::IcmpEq
                | BinOp::IcmpNe
        )
    }
}

/// A non-terminator instruction. Variants that produce a value are the ones
/// `Function::result_type` returns `Some` for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    Binary {
        op: BinOp,
        ty: Ty,
        lhs: Operand,
        rhs: Operand,
    },
    Alloca {
        ty: Ty,
    },
    Store {
        ty: Ty,
        value: Operand,
        ptr: Operand,
    },
    Load {
        ty: Ty,
        ptr: Operand,
    },
    Call {
        ty: Ty,
        callee: String,
        args: Vec<(Ty, Operand)>,
    },
    Zext {
        from: Ty,
        value: Operand,
        to: Ty,
    },
    Phi {
        ty: Ty,
        sources: Vec<(Operand, BlockRef)>,
    },
}

impl Instr {
    /// The type of the value this instruction produces, or `None` if it has
    /// no result (a `Store`, or a void `Call`).
    pub fn result_type(&self) -> Option<Ty> {
        match self {
            Instr::Binary { op, ty, .. } => Some(if op.is_icmp() { Ty::I1 } else { *ty }),
            Instr::Alloca { .. } => Some(Ty::Ptr),
            Instr::Store { .. } => None,
            Instr::Load { ty, .. } => Some(*ty),
            Instr::Call { ty, .. } => {
                if matches!(ty, Ty::Void) {
                    None
                } else {
                    Some(*ty)
                }
            }
            Instr::Zext { to, .. } => Some(*to),
            Instr::Phi { ty, .. } => Some(*ty),
        }
    }

    /// `true` for an `Alloca I32` (the only shape mem2reg ever promotes).
    pub fn is_i32_alloca(&self) -> bool {
        matches!(self, Instr::Alloca { ty: Ty::I32 })
    }
}

/// A block terminator. `Unset` exists only transiently during codegen; a
/// well-formed function has no `Unset` terminator once emission completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    Unset,
    Ret { ty: Ty, value: Option<Operand> },
    Br { dest: BlockRef },
    BrCond { cond: Operand, iftrue: BlockRef, iffalse: BlockRef },
}

impl Terminator {
    /// The blocks control flow can transfer to from here.
    pub fn successors(&self) -> Vec<BlockRef> {
        match self {
            Terminator::Unset | Terminator::Ret { .. } => Vec::new(),
            Terminator::Br { dest } => vec![*dest],
            Terminator::BrCond { iftrue, iffalse, .. } => vec![*iftrue, *iffalse],
        }
    }
}

/// A basic block: phis, then straight-line instructions, then one
/// terminator. `label` is unset (`0`) until the printer's vreg-numbering
/// pass assigns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub phis: Vec<InstrRef>,
    pub body: Vec<InstrRef>,
    pub terminator: Terminator,
    pub label: u32,
}

impl Block {
    fn new() -> Self {
        Block {
            phis: Vec::new(),
            body: Vec::new(),
            terminator: Terminator::Unset,
            label: 0,
        }
    }

    /// All instruction refs in print order: phis first, then the body.
    pub fn all_instrs(&self) -> impl Iterator<Item = InstrRef> + '_ {
        self.phis.iter().copied().chain(self.body.iter().copied())
    }
}

/// A function body: its instruction arena plus an ordered list of blocks,
/// the first of which is the entry block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub rettype: Ty,
    pub name: String,
    pub arg_types: Vec<Ty>,
    pub blocks: Vec<Block>,
    pub instrs: Vec<Instr>,
}

impl Function {
    pub fn new(rettype: Ty, name: String, arg_types: Vec<Ty>) -> Self {
        Function {
            rettype,
            name,
            arg_types,
            blocks: Vec::new(),
            instrs: Vec::new(),
        }
    }

    /// Appends a fresh, unterminated block. The returned handle is stable.
    pub fn new_block(&mut self) -> BlockRef {
        self.blocks.push(Block::new());
        self.blocks.len() - 1
    }

    /// Appends a non-phi instruction to `block`'s body and returns its
    /// stable arena id.
    pub fn append(&mut self, block: BlockRef, instr: Instr) -> InstrRef {
        let id = self.instrs.len();
        self.instrs.push(instr);
        self.blocks[block].body.push(id);
        id
    }

    /// Same as `append`, but also wraps the new id as an `Operand::Instr`
    /// for the common case where the caller immediately uses the result.
    pub fn emit(&mut self, block: BlockRef, instr: Instr) -> Operand {
        Operand::Instr(self.append(block, instr))
    }

    /// Inserts a phi at the head of `block`. Used only by mem2reg.
    pub fn prepend_phi(&mut self, block: BlockRef, ty: Ty) -> InstrRef {
        let id = self.instrs.len();
        self.instrs.push(Instr::Phi { ty, sources: Vec::new() });
        self.blocks[block].phis.push(id);
        id
    }

    pub fn set_terminator(&mut self, block: BlockRef, term: Terminator) {
        self.blocks[block].terminator = term;
    }

    pub fn result_type(&self, instr: InstrRef) -> Option<Ty> {
        self.instrs[instr].result_type()
    }
}

/// A global definition: a defined function, an external declaration, or a
/// global scalar variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalDef {
    Func(Function),
    FuncDecl {
        rettype: Ty,
        name: String,
        arg_types: Vec<Ty>,
    },
    GlobalVar {
        name: String,
        ty: Ty,
        value: i32,
    },
}

/// A whole compiled program: an ordered sequence of global definitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    pub globals: Vec<GlobalDef>,
}
