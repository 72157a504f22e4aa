//! Promotes `alloca i32` memory traffic to pure SSA values.
//!
//! Dominance is computed on the *reverse* CFG: a synthetic sink `⊥` unifies
//! every `ret` into a single traversal root, which gives a well-defined
//! postorder (and hence a good fixpoint iteration order) even though a
//! function may have several return statements. Each block's dominator set
//! is kept as the list of blocks on the path from the entry block down to
//! it (lowest index first); intersecting two such paths is just their
//! longest common prefix, which is the trick that makes this run in
//! near-linear time without a separate dominator-tree data structure.

use std::collections::{HashMap, HashSet};

use crate::ir::{BinOp, Block, BlockRef, Function, GlobalDef, Instr, InstrRef, Operand, Program, Terminator, Ty};

/// Runs mem2reg over every defined function in the program.
pub fn run(program: &mut Program) {
    for global in &mut program.globals {
        if let GlobalDef::Func(func) = global {
            promote(func);
        }
    }
    log::debug!("mem2reg done");
}

/// Runs mem2reg over a single function in place.
pub fn promote(func: &mut Function) {
    let preds = predecessors(func);
    let order = traversal_order(func, &preds);
    let dom = dominators(&preds, &order);
    let df = dominance_frontiers(&preds, &dom);

    let promotable = promotable_allocas(func);
    if promotable.is_empty() {
        return;
    }

    let phis = insert_phis(func, &promotable, &df);

    let mut initial = HashMap::new();
    for &alloc_id in &promotable {
        initial.insert(alloc_id, Operand::Const(0));
    }
    let mut visited = HashSet::new();
    rename(func, 0, initial, &promotable, &phis, &mut visited);
}

/// `preds[b]` lists the blocks whose terminator targets `b`. A block with a
/// `Ret` terminator has no entry here; it is tracked separately as a root
/// for the postorder traversal instead, since there is no single successor
/// block to key it by.
fn predecessors(func: &Function) -> Vec<Vec<BlockRef>> {
    let mut preds = vec![Vec::new(); func.blocks.len()];
    for (b, block) in func.blocks.iter().enumerate() {
        match &block.terminator {
            Terminator::Ret { .. } | Terminator::Unset => {}
            Terminator::Br { dest } => preds[*dest].push(b),
            Terminator::BrCond { iftrue, iffalse, .. } => {
                preds[*iftrue].push(b);
                preds[*iffalse].push(b);
            }
        }
    }
    preds
}

/// Postorder of the reverse CFG rooted at the synthetic `⊥`, with `⊥`
/// itself dropped. Starts the walk from every `ret` block (⊥'s direct
/// predecessors) and, as a fallback for blocks no return can reach (an
/// unconditional `while (1) {}`), sweeps the remaining blocks afterwards so
/// every block still gets a position in the order.
fn traversal_order(func: &Function, preds: &[Vec<BlockRef>]) -> Vec<BlockRef> {
    let n = func.blocks.len();
    let mut state = vec![0u8; n]; // 0 = unvisited, 1 = on stack, 2 = done
    let mut order = Vec::with_capacity(n);

    fn visit(b: BlockRef, preds: &[Vec<BlockRef>], state: &mut [u8], order: &mut Vec<BlockRef>) {
        if state[b] != 0 {
            return;
        }
        state[b] = 1;
        for &p in &preds[b] {
            visit(p, preds, state, order);
        }
        state[b] = 2;
        order.push(b);
    }

    let ret_blocks: Vec<BlockRef> = func
        .blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| matches!(b.terminator, Terminator::Ret { .. }))
        .map(|(i, _)| i)
        .collect();
    for b in ret_blocks {
        visit(b, preds, &mut state, &mut order);
    }
    for b in 0..n {
        visit(b, preds, &mut state, &mut order);
    }
    order
}

/// Longest common prefix of two dominator-path lists.
fn intersect_paths(a: &[BlockRef], b: &[BlockRef]) -> Vec<BlockRef> {
    a.iter()
        .zip(b.iter())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| *x)
        .collect()
}

/// Dom(n) as a path from the entry block to n, indexed by block. Converges
/// by repeated passes over `order` until a full pass makes no change.
fn dominators(preds: &[Vec<BlockRef>], order: &[BlockRef]) -> Vec<Option<Vec<BlockRef>>> {
    let mut dom: Vec<Option<Vec<BlockRef>>> = vec![None; preds.len()];
    loop {
        let mut changed = false;
        for &n in order {
            let ready: Vec<&Vec<BlockRef>> = preds[n]
                .iter()
                .filter_map(|&p| dom[p].as_ref())
                .collect();
            let mut new_dom = match ready.split_first() {
                None => Vec::new(),
                Some((first, rest)) => {
                    let mut acc = (*first).clone();
                    for other in rest {
                        acc = intersect_paths(&acc, other);
                    }
                    acc
                }
            };
            new_dom.push(n);
            if dom[n].as_ref() != Some(&new_dom) {
                dom[n] = Some(new_dom);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    dom
}

fn strictly_dominates(dom_n: &[BlockRef], candidate: BlockRef, n: BlockRef) -> bool {
    candidate != n && dom_n.contains(&candidate)
}

/// DF(b) for every block, by the standard two-predecessor join-point walk.
fn dominance_frontiers(
    preds: &[Vec<BlockRef>],
    dom: &[Option<Vec<BlockRef>>],
) -> Vec<HashSet<BlockRef>> {
    let mut df = vec![HashSet::new(); preds.len()];
    for (n, preds_n) in preds.iter().enumerate() {
        if preds_n.len() < 2 {
            continue;
        }
        let dom_n = dom[n].as_ref().expect("join block is reachable and has a dominator path");
        for &p in preds_n {
            let mut runner = p;
            loop {
                if strictly_dominates(dom_n, runner, n) {
                    break;
                }
                df[runner].insert(n);
                let dom_runner = dom[runner]
                    .as_ref()
                    .expect("visited block has a dominator path");
                if dom_runner.len() < 2 {
                    break;
                }
                runner = dom_runner[dom_runner.len() - 2];
            }
        }
    }
    df
}

fn operand_is(op: &Operand, id: InstrRef) -> bool {
    matches!(op, Operand::Instr(x) if *x == id)
}

/// An `Alloca I32` is promotable iff every other reference to its result is
/// the `ptr` field of a `Load` or `Store` - never a `Store`'s value, a
/// `Binary`/`Zext`/`Call` operand, or a terminator operand.
fn is_promotable(func: &Function, alloc_id: InstrRef) -> bool {
    for (id, instr) in func.instrs.iter().enumerate() {
        if id == alloc_id {
            continue;
        }
        match instr {
            Instr::Binary { lhs, rhs, .. } => {
                if operand_is(lhs, alloc_id) || operand_is(rhs, alloc_id) {
                    return false;
                }
            }
            Instr::Store { value, .. } => {
                if operand_is(value, alloc_id) {
                    return false;
                }
            }
            Instr::Load { .. } => {}
            Instr::Call { args, .. } => {
                if args.iter().any(|(_, a)| operand_is(a, alloc_id)) {
                    return false;
                }
            }
            Instr::Zext { value, .. } => {
                if operand_is(value, alloc_id) {
                    return false;
                }
            }
            Instr::Alloca { .. } | Instr::Phi { .. } => {}
        }
    }
    for block in &func.blocks {
        match &block.terminator {
            Terminator::Ret { value: Some(v), .. } if operand_is(v, alloc_id) => return false,
            Terminator::BrCond { cond, .. } if operand_is(cond, alloc_id) => return false,
            _ => {}
        }
    }
    true
}

fn promotable_allocas(func: &Function) -> HashSet<InstrRef> {
    func.instrs
        .iter()
        .enumerate()
        .filter(|(_, instr)| instr.is_i32_alloca())
        .map(|(id, _)| id)
        .filter(|&id| is_promotable(func, id))
        .collect()
}

fn store_target(block: &Block, instrs: &[Instr], alloc_id: InstrRef) -> bool {
    block.body.iter().any(|&id| {
        matches!(&instrs[id], Instr::Store { ptr, .. } if operand_is(ptr, alloc_id))
    })
}

/// For each block, the `(promotable alloca, phi instruction)` pairs
/// inserted there - a block may gain phis for several distinct variables.
type PhiMap = HashMap<BlockRef, Vec<(InstrRef, InstrRef)>>;

/// Iterated dominance frontier phi placement.
fn insert_phis(func: &mut Function, promotable: &HashSet<InstrRef>, df: &[HashSet<BlockRef>]) -> PhiMap {
    let mut phis: PhiMap = PhiMap::new();
    for &alloc_id in promotable {
        let defsites: Vec<BlockRef> = func
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| store_target(b, &func.instrs, alloc_id))
            .map(|(i, _)| i)
            .collect();

        let mut has_phi: HashSet<BlockRef> = HashSet::new();
        let mut worklist = defsites;
        while let Some(b) = worklist.pop() {
            for &d in &df[b] {
                if has_phi.insert(d) {
                    let phi_id = func.prepend_phi(d, Ty::I32);
                    phis.entry(d).or_default().push((alloc_id, phi_id));
                    worklist.push(d);
                }
            }
        }
    }
    phis
}

/// Depth-first rename pass: deletes promoted `Store`/`Alloca`, rewrites
/// promoted `Load` into a trivial `add current, 0` so its result id stays
/// valid for consumers, and wires up phi source lists along the way.
fn rename(
    func: &mut Function,
    block: BlockRef,
    mut current_value: HashMap<InstrRef, Operand>,
    promotable: &HashSet<InstrRef>,
    phis: &PhiMap,
    visited: &mut HashSet<BlockRef>,
) {
    if !visited.insert(block) {
        return;
    }

    if let Some(block_phis) = phis.get(&block) {
        for &(alloc_id, phi_id) in block_phis {
            current_value.insert(alloc_id, Operand::Instr(phi_id));
        }
    }

    let body_ids = func.blocks[block].body.clone();
    let mut new_body = Vec::with_capacity(body_ids.len());
    for id in body_ids {
        let keep = match &func.instrs[id] {
            Instr::Store { ptr, .. } if matches!(ptr, Operand::Instr(p) if promotable.contains(p)) => {
                let (alloc_id, value) = match &func.instrs[id] {
                    Instr::Store { ptr: Operand::Instr(p), value, .. } => (*p, value.clone()),
                    _ => unreachable!(),
                };
                current_value.insert(alloc_id, value);
                false
            }
            Instr::Load { ptr, .. } if matches!(ptr, Operand::Instr(p) if promotable.contains(p)) => {
                let alloc_id = match &func.instrs[id] {
                    Instr::Load { ptr: Operand::Instr(p), .. } => *p,
                    _ => unreachable!(),
                };
                let replacement = current_value
                    .get(&alloc_id)
                    .cloned()
                    .unwrap_or(Operand::Const(0));
                func.instrs[id] = Instr::Binary {
                    op: BinOp::Add,
                    ty: Ty::I32,
                    lhs: replacement,
                    rhs: Operand::Const(0),
                };
                true
            }
            Instr::Alloca { .. } if promotable.contains(&id) => false,
            _ => true,
        };
        if keep {
            new_body.push(id);
        }
    }
    func.blocks[block].body = new_body;

    for succ in func.blocks[block].terminator.successors() {
        if let Some(succ_phis) = phis.get(&succ) {
            for &(alloc_id, phi_id) in succ_phis {
                let value = current_value
                    .get(&alloc_id)
                    .cloned()
                    .unwrap_or(Operand::Const(0));
                if let Instr::Phi { sources, .. } = &mut func.instrs[phi_id] {
                    sources.push((value, block));
                }
            }
        }
        rename(func, succ, current_value.clone(), promotable, phis, visited);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minic_parser::Parser;

    use crate::codegen::Codegen;

    fn lower(src: &str) -> Function {
        let ast = Parser::new(src).unwrap().parse_program().unwrap();
        let program = Codegen::compile(&ast).unwrap();
        match program.globals.into_iter().find_map(|g| match g {
            GlobalDef::Func(f) => Some(f),
            _ => None,
        }) {
            Some(f) => f,
            None => panic!("no function in program"),
        }
    }

    fn count_phis(func: &Function) -> usize {
        func.blocks.iter().map(|b| b.phis.len()).sum()
    }

    fn has_alloca(func: &Function) -> bool {
        func.instrs.iter().any(Instr::is_i32_alloca)
    }

    #[test]
    fn while_loop_gets_one_phi_per_live_variable_at_header() {
        let mut func = lower("int main() { int i; i = 0; while (i < 10) { i = i + 1; } return i; }");
        promote(&mut func);
        assert!(!has_alloca(&func));
        assert_eq!(count_phis(&func), 1);
    }

    #[test]
    fn while_loop_with_two_live_variables_gets_two_phis() {
        let mut func = lower(
            "int main() { int x; x = 0; int i; i = 0; while (i < 10) { x = x + i; i = i + 1; } return x; }",
        );
        promote(&mut func);
        assert!(!has_alloca(&func));
        assert_eq!(count_phis(&func), 2);
    }

    #[test]
    fn straight_line_code_has_no_phis() {
        let mut func = lower("int main() { int a; a = 1; int b; b = a + 2; return b; }");
        promote(&mut func);
        assert!(!has_alloca(&func));
        assert_eq!(count_phis(&func), 0);
    }

    #[test]
    fn if_else_join_gets_one_phi() {
        let mut func = lower(
            "int main() { int x; if (1) { x = 1; } else { x = 2; } return x; }",
        );
        promote(&mut func);
        assert!(!has_alloca(&func));
        assert_eq!(count_phis(&func), 1);
    }

    #[test]
    fn escaping_pointer_blocks_promotion() {
        // A variable whose address would need to be taken can't occur in
        // MiniC (there is no address-of operator), so this instead checks
        // that an ordinary promotable local still promotes cleanly even
        // when interleaved with calls, which must not be mistaken for
        // capturing uses.
        let mut func = lower(
            "int main() { int x; x = getint(); putint(x); return x; }",
        );
        promote(&mut func);
        assert!(!has_alloca(&func));
    }
}
