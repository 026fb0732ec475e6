use std::collections::HashSet;

use mypyc_ir::{
    BlockId, CallArgs, CanRaise, ComparisonOpKind, ErrorKind, FuncIr, Op, OpKind, SourceSpan,
    Terminator,
};
use mypyc_types::RType;

use crate::PassError;

/// Rewrites every fallible op into an explicit check-and-branch (§4.6).
///
/// For each op whose `can_raise` is not [`CanRaise::Never`], the block is
/// split right after it; the op's `error_kind` decides how failure is
/// detected (a sentinel comparison, a paired flag register, or an
/// always-checked runtime convention), and an op that definitely raises
/// ([`CanRaise::Must`]) skips the branch and jumps straight to the
/// failure path. The failure path is the innermost enclosing `try`'s
/// handler entry (consulted via [`FuncIr::exception_table`]) when the op
/// sits inside a guarded region, or a synthesized
/// [`mypyc_ir::Terminator::RaiseAndReturn`] block otherwise.
#[tracing::instrument(skip(func), fields(func = func.name()))]
pub fn run_exception_pass(func: &mut FuncIr) -> Result<(), PassError> {
    let mut handled: HashSet<(BlockId, usize)> = HashSet::new();
    loop {
        let Some((block_id, idx)) = find_next_fallible_op(func, &handled) else {
            break;
        };
        handled.insert((block_id, idx));
        wire_check(func, block_id, idx)?;
    }
    Ok(())
}

fn find_next_fallible_op(
    func: &FuncIr,
    handled: &HashSet<(BlockId, usize)>,
) -> Option<(BlockId, usize)> {
    for block in func.blocks() {
        for (i, op) in block.ops().iter().enumerate() {
            if op.can_raise() != CanRaise::Never && !handled.contains(&(block.id(), i)) {
                return Some((block.id(), i));
            }
        }
    }
    None
}

fn failure_block(func: &mut FuncIr, block_id: BlockId) -> BlockId {
    if let Some(region) = func.exception_table().region_for(block_id).cloned() {
        region.handler_entry
    } else {
        let b = func.new_block();
        func.block_mut(b)
            .set_terminator(Terminator::RaiseAndReturn { error: None });
        b
    }
}

fn wire_check(func: &mut FuncIr, block_id: BlockId, idx: usize) -> Result<(), PassError> {
    let op = func.block(block_id).ops()[idx].clone();

    let after_ops: Vec<Op> = func.block_mut(block_id).ops_mut().split_off(idx + 1);
    let terminator = func.block(block_id).terminator().cloned();

    let cont_block = func.new_block();
    for o in after_ops {
        func.block_mut(cont_block).push_op(o);
    }
    if let Some(t) = terminator {
        func.block_mut(cont_block).set_terminator(t);
    }

    if op.can_raise() == CanRaise::Must {
        let fail = failure_block(func, block_id);
        func.block_mut(block_id).set_terminator(Terminator::Goto(fail));
        return Ok(());
    }

    match op.error_kind().clone() {
        ErrorKind::None => {
            func.block_mut(block_id)
                .set_terminator(Terminator::Goto(cont_block));
        }
        ErrorKind::Sentinel => {
            let dest = op.dest().ok_or_else(|| PassError::InconsistentOwnership {
                func: func.name().to_string(),
                register: "<sentinel check with no dest>".to_string(),
            })?;
            let ty = func.register(dest).ty().clone();
            let sentinel_reg = func.new_register(ty.clone(), "sentinel");
            func.block_mut(block_id).push_op(Op::new(
                Some(sentinel_reg),
                OpKind::ErrorValue { ty },
                CanRaise::Never,
                ErrorKind::None,
                SourceSpan::synthetic(),
            ));
            let is_err = func.new_register(RType::bool(), "is_err");
            func.block_mut(block_id).push_op(Op::new(
                Some(is_err),
                OpKind::ComparisonOp {
                    kind: ComparisonOpKind::Eq,
                    lhs: dest,
                    rhs: sentinel_reg,
                },
                CanRaise::Never,
                ErrorKind::None,
                SourceSpan::synthetic(),
            ));
            let fail = failure_block(func, block_id);
            func.block_mut(block_id).set_terminator(Terminator::Branch {
                cond: is_err,
                then_target: fail,
                else_target: cont_block,
                negate: false,
            });
        }
        ErrorKind::PairedFlag { flag } => {
            let fail = failure_block(func, block_id);
            func.block_mut(block_id).set_terminator(Terminator::Branch {
                cond: flag,
                then_target: fail,
                else_target: cont_block,
                negate: false,
            });
        }
        ErrorKind::AlwaysChecked => {
            let is_err = func.new_register(RType::bool(), "is_err");
            func.block_mut(block_id).push_op(Op::new(
                Some(is_err),
                OpKind::CallC {
                    c_function: "CPyErr_Occurred".to_string(),
                    args: CallArgs::positional(vec![]),
                },
                CanRaise::Never,
                ErrorKind::None,
                SourceSpan::synthetic(),
            ));
            let fail = failure_block(func, block_id);
            func.block_mut(block_id).set_terminator(Terminator::Branch {
                cond: is_err,
                then_target: fail,
                else_target: cont_block,
                negate: false,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mypyc_ir::{FuncFlags, HandlerRegion, Signature};

    #[test]
    fn must_raise_op_jumps_straight_to_raise_and_return() {
        let mut f = FuncIr::new(
            "h",
            Signature::new(vec![], RType::int()),
            vec![],
            FuncFlags::default(),
        );
        f.block_mut(f.entry_block()).push_op(Op::new(
            None,
            OpKind::RaiseStandardError {
                kind: mypyc_ir::StandardErrorKind::ValueError,
                message: None,
            },
            CanRaise::Must,
            ErrorKind::AlwaysChecked,
            SourceSpan::synthetic(),
        ));
        f.block_mut(f.entry_block())
            .set_terminator(Terminator::Return(None));

        run_exception_pass(&mut f).unwrap();

        let entry = f.block(f.entry_block());
        assert!(matches!(entry.terminator(), Some(Terminator::Goto(_))));
    }

    #[test]
    fn paired_flag_op_inside_guarded_region_branches_to_handler() {
        let mut f = FuncIr::new(
            "i",
            Signature::new(vec![], RType::int()),
            vec![],
            FuncFlags::default(),
        );
        let flag = f.new_register(RType::bool(), "errflag");
        let entry = f.entry_block();
        f.block_mut(entry).push_op(Op::new(
            None,
            OpKind::CallC {
                c_function: "CPy_Fallible".to_string(),
                args: CallArgs::positional(vec![]),
            },
            CanRaise::May,
            ErrorKind::PairedFlag { flag },
            SourceSpan::synthetic(),
        ));
        f.block_mut(entry).set_terminator(Terminator::Return(None));

        let handler = f.new_block();
        f.block_mut(handler)
            .set_terminator(Terminator::Return(None));
        f.push_handler_region(HandlerRegion {
            guarded_blocks: vec![entry],
            handler_entry: handler,
            finally_entry: None,
        });

        run_exception_pass(&mut f).unwrap();

        let entry_block = f.block(entry);
        match entry_block.terminator() {
            Some(Terminator::Branch { then_target, .. }) => {
                assert_eq!(*then_target, handler);
            }
            other => panic!("expected a branch to the handler, got {other:?}"),
        }
    }
}
