use std::collections::HashMap;

use mypyc_ir::{
    BlockId, CanRaise, Cfg, ErrorKind, FuncIr, Op, OpKind, RegisterId, SourceSpan,
    StandardErrorKind, Terminator,
};
use mypyc_types::RType;

use crate::PassError;

/// Inserts an `IsAssigned` guard before every read of a local that is not
/// definitely assigned on every path reaching it (§4.5).
///
/// A local's register starts the function unassigned (unless it's an
/// argument) and becomes definitely assigned at its first `Assign`. A
/// read reached while the register might still be unassigned is rewritten
/// into a branch: the `IsAssigned` check succeeds and control falls
/// through unchanged, or it fails and a synthesized block raises
/// `UnboundLocalError`. That raising block is left without a terminator —
/// wiring it into the handler table or the function's raise-and-return
/// epilogue is [`crate::run_exception_pass`]'s job, which must run
/// immediately after this one (§5).
#[tracing::instrument(skip(func), fields(func = func.name()))]
pub fn run_uninit_pass(func: &mut FuncIr) -> Result<(), PassError> {
    for local in assigned_locals(func) {
        guard_local(func, local)?;
    }
    Ok(())
}

fn assigned_locals(func: &FuncIr) -> Vec<RegisterId> {
    let mut found = Vec::new();
    for block in func.blocks() {
        for op in block.ops() {
            if let OpKind::Assign { .. } = op.kind() {
                if let Some(dest) = op.dest() {
                    if !func.register(dest).is_argument() && !found.contains(&dest) {
                        found.push(dest);
                    }
                }
            }
        }
    }
    found
}

/// Definite-assignment dataflow for one local: `IN[entry] = false`;
/// `IN[b] = AND` over predecessors' `OUT`; `OUT[b] = IN[b] OR (b assigns
/// the local)`. Re-run to a fixpoint after every inserted guard, since
/// splitting a block changes the CFG the next guard's analysis sees.
fn guard_local(func: &mut FuncIr, local: RegisterId) -> Result<(), PassError> {
    let name = func.register(local).name().to_string();

    loop {
        let cfg = Cfg::build(func);
        let order = cfg.reverse_postorder();
        let entry = func.entry_block();

        let mut has_assign: HashMap<BlockId, bool> = HashMap::new();
        for &id in &order {
            let assigned = func
                .block(id)
                .ops()
                .iter()
                .any(|op| matches!(op.kind(), OpKind::Assign { .. }) && op.dest() == Some(local));
            has_assign.insert(id, assigned);
        }

        let mut entry_in: HashMap<BlockId, bool> = order.iter().map(|id| (*id, false)).collect();
        let mut block_out: HashMap<BlockId, bool> = order
            .iter()
            .map(|id| (*id, has_assign.get(id).copied().unwrap_or(false)))
            .collect();

        let mut changed = true;
        while changed {
            changed = false;
            for &id in &order {
                if id == entry {
                    continue;
                }
                let preds = cfg.predecessors(id);
                let new_in = !preds.is_empty()
                    && preds.iter().all(|p| block_out.get(p).copied().unwrap_or(false));
                if entry_in.get(&id).copied() != Some(new_in) {
                    entry_in.insert(id, new_in);
                    changed = true;
                }
                let new_out = new_in || has_assign.get(&id).copied().unwrap_or(false);
                if block_out.get(&id).copied() != Some(new_out) {
                    block_out.insert(id, new_out);
                    changed = true;
                }
            }
        }

        let mut found: Option<(BlockId, usize)> = None;
        'search: for &id in &order {
            let mut assigned = entry_in.get(&id).copied().unwrap_or(false);
            let ops = func.block(id).ops();
            for (i, op) in ops.iter().enumerate() {
                if op.operands().contains(&local) && !assigned {
                    found = Some((id, i));
                    break 'search;
                }
                if let OpKind::Assign { .. } = op.kind() {
                    if op.dest() == Some(local) {
                        assigned = true;
                    }
                }
            }
            if !assigned {
                let uses_in_terminator = match func.block(id).terminator() {
                    Some(Terminator::Branch { cond, .. }) => *cond == local,
                    Some(Terminator::Return(Some(r))) => *r == local,
                    _ => false,
                };
                if uses_in_terminator {
                    found = Some((id, ops.len()));
                    break 'search;
                }
            }
        }

        let Some((block_id, idx)) = found else {
            return Ok(());
        };
        split_block_for_guard(func, block_id, idx, local, &name);
    }
}

/// Splits `block_id` right before its op at `idx` (or before its
/// terminator, when `idx` is the block's op count), inserting an
/// `IsAssigned` test and a branch to a continuation block (the guarded
/// read, now provably safe) or a fresh failing block.
fn split_block_for_guard(
    func: &mut FuncIr,
    block_id: BlockId,
    idx: usize,
    local: RegisterId,
    name: &str,
) -> BlockId {
    let after_ops: Vec<Op> = func.block_mut(block_id).ops_mut().split_off(idx);
    let terminator = func.block(block_id).terminator().cloned();

    let cont_block = func.new_block();
    for op in after_ops {
        func.block_mut(cont_block).push_op(op);
    }
    if let Some(t) = terminator {
        func.block_mut(cont_block).set_terminator(t);
    }

    let fail_block = func.new_block();
    func.block_mut(fail_block).push_op(Op::new(
        None,
        OpKind::RaiseStandardError {
            kind: StandardErrorKind::UnboundLocalError,
            message: Some(format!("local variable '{name}' referenced before assignment")),
        },
        CanRaise::Must,
        ErrorKind::AlwaysChecked,
        SourceSpan::synthetic(),
    ));

    let flag = func.new_register(RType::bool(), format!("{name}$assigned"));
    func.block_mut(block_id).push_op(Op::new(
        Some(flag),
        OpKind::IsAssigned { local },
        CanRaise::Never,
        ErrorKind::None,
        SourceSpan::synthetic(),
    ));
    func.block_mut(block_id).set_terminator(Terminator::Branch {
        cond: flag,
        then_target: cont_block,
        else_target: fail_block,
        negate: false,
    });

    cont_block
}

#[cfg(test)]
mod tests {
    use super::*;
    use mypyc_ir::{FuncFlags, LiteralValue, Signature};

    /// `def f(flag: bool) -> int: if flag: x = 1; return x` — `x` is read
    /// on a path (flag false) where it was never assigned.
    #[test]
    fn conditionally_assigned_local_gets_a_guard() {
        let mut f = FuncIr::new(
            "f",
            Signature::new(vec![RType::bool()], RType::int()),
            vec!["flag".to_string()],
            FuncFlags::default(),
        );
        let flag_reg = f.arg_registers()[0];
        let x = f.new_register(RType::int(), "x");

        let then_b = f.new_block();
        let join = f.new_block();
        f.block_mut(f.entry_block()).set_terminator(Terminator::Branch {
            cond: flag_reg,
            then_target: then_b,
            else_target: join,
            negate: false,
        });

        let one = f.new_register(RType::int(), "r0");
        f.block_mut(then_b).push_op(Op::new(
            Some(one),
            OpKind::LoadLiteral {
                value: LiteralValue::Int(1),
            },
            CanRaise::Never,
            ErrorKind::None,
            SourceSpan::synthetic(),
        ));
        f.block_mut(then_b).push_op(Op::new(
            Some(x),
            OpKind::Assign { src: one },
            CanRaise::Never,
            ErrorKind::None,
            SourceSpan::synthetic(),
        ));
        f.block_mut(then_b).set_terminator(Terminator::Goto(join));
        f.block_mut(join).set_terminator(Terminator::Return(Some(x)));

        run_uninit_pass(&mut f).unwrap();

        let has_guard = f.blocks().iter().any(|b| {
            b.ops()
                .iter()
                .any(|op| matches!(op.kind(), OpKind::IsAssigned { local } if *local == x))
        });
        assert!(has_guard, "expected an IsAssigned check guarding `x`");

        let has_raise = f.blocks().iter().any(|b| {
            b.ops().iter().any(|op| {
                matches!(
                    op.kind(),
                    OpKind::RaiseStandardError {
                        kind: StandardErrorKind::UnboundLocalError,
                        ..
                    }
                )
            })
        });
        assert!(has_raise, "expected an UnboundLocalError raise block");
    }

    #[test]
    fn always_assigned_local_gets_no_guard() {
        let mut f = FuncIr::new(
            "g",
            Signature::new(vec![], RType::int()),
            vec![],
            FuncFlags::default(),
        );
        let x = f.new_register(RType::int(), "x");
        let one = f.new_register(RType::int(), "r0");
        f.block_mut(f.entry_block()).push_op(Op::new(
            Some(one),
            OpKind::LoadLiteral {
                value: LiteralValue::Int(1),
            },
            CanRaise::Never,
            ErrorKind::None,
            SourceSpan::synthetic(),
        ));
        f.block_mut(f.entry_block()).push_op(Op::new(
            Some(x),
            OpKind::Assign { src: one },
            CanRaise::Never,
            ErrorKind::None,
            SourceSpan::synthetic(),
        ));
        f.block_mut(f.entry_block())
            .set_terminator(Terminator::Return(Some(x)));

        run_uninit_pass(&mut f).unwrap();

        assert_eq!(f.blocks().len(), 1);
    }
}
