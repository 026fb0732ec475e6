use std::collections::{HashMap, HashSet};

use mypyc_ir::{BlockId, CanRaise, Cfg, ErrorKind, FuncIr, Op, OpKind, RegisterId, SourceSpan, Terminator};

use crate::PassError;

/// Inserts `IncRef`/`DecRef` ops from a liveness analysis over refcounted
/// registers (§4.7).
///
/// Two simplified, always-safe rules, applied in order:
///
/// 1. Every `Assign` that copies a refcounted register is preceded by an
///    `IncRef` of the source — a copy always retains, even on paths where
///    a more precise borrow analysis could prove the original is never
///    used again.
/// 2. Standard backward liveness (`Use`/`Def` per block, met with union at
///    join points) finds each refcounted register's last use on every
///    path; an `xdecref` (safe on an unassigned/NULL register) is
///    inserted immediately after it, except for a register that is the
///    block's own `Return` value, whose ownership transfers to the
///    caller instead of being released.
///
/// This never under-retains: it may hold a reference slightly longer
/// than a full escape/borrow analysis would.
#[tracing::instrument(skip(func), fields(func = func.name()))]
pub fn run_refcount_pass(func: &mut FuncIr) -> Result<(), PassError> {
    insert_copy_increfs(func);
    insert_dead_decrefs(func);
    Ok(())
}

fn is_refcounted(func: &FuncIr, reg: RegisterId) -> bool {
    func.register(reg).ty().is_refcounted()
}

fn insert_copy_increfs(func: &mut FuncIr) {
    let block_ids: Vec<BlockId> = func.blocks().iter().map(|b| b.id()).collect();
    for id in block_ids {
        let original: Vec<Op> = func.block(id).ops().to_vec();
        let mut new_ops = Vec::with_capacity(original.len());
        for op in original {
            if let OpKind::Assign { src } = op.kind() {
                if is_refcounted(func, *src) {
                    new_ops.push(Op::new(
                        None,
                        OpKind::IncRef { src: *src },
                        CanRaise::Never,
                        ErrorKind::None,
                        op.location().clone(),
                    ));
                }
            }
            new_ops.push(op);
        }
        *func.block_mut(id).ops_mut() = new_ops;
    }
}

fn insert_dead_decrefs(func: &mut FuncIr) {
    let cfg = Cfg::build(func);
    let candidates: HashSet<RegisterId> = func
        .registers()
        .iter()
        .filter(|r| r.ty().is_refcounted())
        .map(|r| r.id())
        .collect();
    if candidates.is_empty() {
        return;
    }

    let block_ids: Vec<BlockId> = func.blocks().iter().map(|b| b.id()).collect();

    let mut def_sets: HashMap<BlockId, HashSet<RegisterId>> = HashMap::new();
    let mut use_sets: HashMap<BlockId, HashSet<RegisterId>> = HashMap::new();
    for &id in &block_ids {
        let mut defined: HashSet<RegisterId> = HashSet::new();
        let mut used: HashSet<RegisterId> = HashSet::new();
        for op in func.block(id).ops() {
            for operand in op.operands() {
                if candidates.contains(&operand) && !defined.contains(&operand) {
                    used.insert(operand);
                }
            }
            if let Some(d) = op.dest() {
                if candidates.contains(&d) {
                    defined.insert(d);
                }
            }
        }
        match func.block(id).terminator() {
            Some(Terminator::Return(Some(r))) if candidates.contains(r) && !defined.contains(r) => {
                used.insert(*r);
            }
            Some(Terminator::Branch { cond, .. }) if candidates.contains(cond) && !defined.contains(cond) => {
                used.insert(*cond);
            }
            _ => {}
        }
        def_sets.insert(id, defined);
        use_sets.insert(id, used);
    }

    let mut live_in: HashMap<BlockId, HashSet<RegisterId>> =
        block_ids.iter().map(|id| (*id, HashSet::new())).collect();
    let mut live_out: HashMap<BlockId, HashSet<RegisterId>> =
        block_ids.iter().map(|id| (*id, HashSet::new())).collect();

    let mut changed = true;
    while changed {
        changed = false;
        for &id in block_ids.iter().rev() {
            let mut out: HashSet<RegisterId> = HashSet::new();
            for succ in cfg.successors(id) {
                out.extend(live_in[succ].iter().copied());
            }
            let mut new_in = use_sets[&id].clone();
            for r in &out {
                if !def_sets[&id].contains(r) {
                    new_in.insert(*r);
                }
            }
            if live_out[&id] != out {
                live_out.insert(id, out);
                changed = true;
            }
            if live_in[&id] != new_in {
                live_in.insert(id, new_in);
                changed = true;
            }
        }
    }

    for &id in &block_ids {
        let returned = match func.block(id).terminator() {
            Some(Terminator::Return(Some(r))) => Some(*r),
            _ => None,
        };
        let ops = func.block(id).ops().to_vec();

        let mut last_use: HashMap<RegisterId, usize> = HashMap::new();
        for (i, op) in ops.iter().enumerate() {
            for operand in op.operands() {
                if candidates.contains(&operand) {
                    last_use.insert(operand, i);
                }
            }
            if let Some(d) = op.dest() {
                if candidates.contains(&d) {
                    last_use.entry(d).or_insert(i);
                }
            }
        }

        let live_after = &live_out[&id];
        let mut to_kill: Vec<(usize, RegisterId)> = Vec::new();
        for (&reg, &idx) in &last_use {
            if !live_after.contains(&reg) && Some(reg) != returned {
                to_kill.push((idx, reg));
            }
        }
        to_kill.sort_by(|a, b| b.0.cmp(&a.0));

        let mut new_ops = ops;
        for (idx, reg) in to_kill {
            new_ops.insert(
                idx + 1,
                Op::new(
                    None,
                    OpKind::DecRef {
                        src: reg,
                        is_xdec: true,
                    },
                    CanRaise::Never,
                    ErrorKind::None,
                    SourceSpan::synthetic(),
                ),
            );
        }
        *func.block_mut(id).ops_mut() = new_ops;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mypyc_ir::{CallArgs, FuncFlags, Signature};
    use mypyc_types::RType;

    #[test]
    fn dead_object_register_gets_a_decref() {
        let mut f = FuncIr::new(
            "f",
            Signature::new(vec![], RType::int()),
            vec![],
            FuncFlags::default(),
        );
        let entry = f.entry_block();
        let obj = f.new_register(RType::object(), "tmp");
        f.block_mut(entry).push_op(Op::new(
            Some(obj),
            OpKind::CallC {
                c_function: "CPy_Build".to_string(),
                args: CallArgs::positional(vec![]),
            },
            CanRaise::Never,
            ErrorKind::None,
            SourceSpan::synthetic(),
        ));
        let one = f.new_register(RType::int(), "r0");
        f.block_mut(entry).push_op(Op::new(
            Some(one),
            OpKind::LoadLiteral {
                value: mypyc_ir::LiteralValue::Int(1),
            },
            CanRaise::Never,
            ErrorKind::None,
            SourceSpan::synthetic(),
        ));
        f.block_mut(entry)
            .set_terminator(Terminator::Return(Some(one)));

        run_refcount_pass(&mut f).unwrap();

        let has_decref = f
            .block(entry)
            .ops()
            .iter()
            .any(|op| matches!(op.kind(), OpKind::DecRef { src, .. } if *src == obj));
        assert!(has_decref, "dead `obj` should be released before return");
    }

    #[test]
    fn returned_register_is_not_decreffed() {
        let mut f = FuncIr::new(
            "g",
            Signature::new(vec![], RType::object()),
            vec![],
            FuncFlags::default(),
        );
        let entry = f.entry_block();
        let obj = f.new_register(RType::object(), "tmp");
        f.block_mut(entry).push_op(Op::new(
            Some(obj),
            OpKind::CallC {
                c_function: "CPy_Build".to_string(),
                args: CallArgs::positional(vec![]),
            },
            CanRaise::Never,
            ErrorKind::None,
            SourceSpan::synthetic(),
        ));
        f.block_mut(entry)
            .set_terminator(Terminator::Return(Some(obj)));

        run_refcount_pass(&mut f).unwrap();

        let has_decref = f
            .block(entry)
            .ops()
            .iter()
            .any(|op| matches!(op.kind(), OpKind::DecRef { src, .. } if *src == obj));
        assert!(!has_decref, "a returned value's ownership transfers to the caller");
    }
}
