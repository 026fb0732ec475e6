use std::collections::HashMap;

use crate::{BlockId, FuncIr};

/// On-demand CFG queries over a [`FuncIr`]'s blocks (§4.2): predecessors,
/// reverse-postorder iteration, and dominators. Computed fresh each time
/// from the function's current blocks rather than cached, since every
/// pass can mutate the CFG (split blocks, add handlers).
pub struct Cfg {
    entry: BlockId,
    successors: HashMap<BlockId, Vec<BlockId>>,
    predecessors: HashMap<BlockId, Vec<BlockId>>,
}

impl Cfg {
    /// Build the CFG view of `func`'s current blocks.
    pub fn build(func: &FuncIr) -> Self {
        let entry = func.entry_block();
        let mut successors = HashMap::new();
        let mut predecessors: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        for block in func.blocks() {
            let succs = block.successors();
            for s in &succs {
                predecessors.entry(*s).or_default().push(block.id());
            }
            successors.insert(block.id(), succs);
        }
        Self {
            entry,
            successors,
            predecessors,
        }
    }

    /// The blocks `block` can transfer control to.
    pub fn successors(&self, block: BlockId) -> &[BlockId] {
        self.successors.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The blocks that can transfer control to `block`.
    pub fn predecessors(&self, block: BlockId) -> &[BlockId] {
        self.predecessors
            .get(&block)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All blocks reachable from the entry, in reverse-postorder (an
    /// order in which every block appears after all its predecessors,
    /// except at loop headers).
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        let mut visited = std::collections::HashSet::new();
        let mut postorder = Vec::new();
        self.dfs_postorder(self.entry, &mut visited, &mut postorder);
        postorder.reverse();
        postorder
    }

    fn dfs_postorder(
        &self,
        block: BlockId,
        visited: &mut std::collections::HashSet<BlockId>,
        out: &mut Vec<BlockId>,
    ) {
        if !visited.insert(block) {
            return;
        }
        for succ in self.successors(block) {
            self.dfs_postorder(*succ, visited, out);
        }
        out.push(block);
    }

    /// The immediate dominator of every reachable block except the
    /// entry, computed with the standard iterative (Cooper/Harvey/Kennedy)
    /// algorithm over the reverse-postorder numbering.
    pub fn immediate_dominators(&self) -> HashMap<BlockId, BlockId> {
        let rpo = self.reverse_postorder();
        let order: HashMap<BlockId, usize> =
            rpo.iter().enumerate().map(|(i, b)| (*b, i)).collect();

        let mut idom: HashMap<BlockId, BlockId> = HashMap::new();
        idom.insert(self.entry, self.entry);

        let mut changed = true;
        while changed {
            changed = false;
            for &block in rpo.iter().skip(1) {
                let preds: Vec<BlockId> = self
                    .predecessors(block)
                    .iter()
                    .copied()
                    .filter(|p| idom.contains_key(p))
                    .collect();
                let Some((&first, rest)) = preds.split_first() else {
                    continue;
                };
                let mut new_idom = first;
                for &p in rest {
                    new_idom = Self::intersect(&idom, &order, new_idom, p);
                }
                if idom.get(&block) != Some(&new_idom) {
                    idom.insert(block, new_idom);
                    changed = true;
                }
            }
        }
        idom.remove(&self.entry);
        idom
    }

    fn intersect(
        idom: &HashMap<BlockId, BlockId>,
        order: &HashMap<BlockId, usize>,
        mut a: BlockId,
        mut b: BlockId,
    ) -> BlockId {
        while a != b {
            while order[&a] > order[&b] {
                a = idom[&a];
            }
            while order[&b] > order[&a] {
                b = idom[&b];
            }
        }
        a
    }

    /// Whether `dominator` dominates `block` (every path from entry to
    /// `block` passes through `dominator`). `block` dominates itself.
    pub fn dominates(&self, dominator: BlockId, block: BlockId) -> bool {
        if dominator == block {
            return true;
        }
        let idoms = self.immediate_dominators();
        let mut cur = block;
        while let Some(&next) = idoms.get(&cur) {
            if next == dominator {
                return true;
            }
            if next == cur {
                break;
            }
            cur = next;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FuncFlags, RegisterId, Signature, Terminator};
    use mypyc_types::RType;

    fn diamond() -> FuncIr {
        // entry -> (then | else) -> join
        let mut f = FuncIr::new(
            "diamond",
            Signature::new(vec![], RType::int()),
            vec![],
            FuncFlags::default(),
        );
        let entry = f.entry_block();
        let then_b = f.new_block();
        let else_b = f.new_block();
        let join = f.new_block();
        f.block_mut(entry).set_terminator(Terminator::Branch {
            cond: RegisterId::from_raw(0),
            then_target: then_b,
            else_target: else_b,
            negate: false,
        });
        f.block_mut(then_b).set_terminator(Terminator::Goto(join));
        f.block_mut(else_b).set_terminator(Terminator::Goto(join));
        f.block_mut(join).set_terminator(Terminator::Return(None));
        f
    }

    #[test]
    fn reverse_postorder_starts_at_entry() {
        let f = diamond();
        let cfg = Cfg::build(&f);
        let rpo = cfg.reverse_postorder();
        assert_eq!(rpo[0], f.entry_block());
        assert_eq!(rpo.len(), 4);
    }

    #[test]
    fn join_block_dominated_by_entry_not_by_either_branch() {
        let f = diamond();
        let cfg = Cfg::build(&f);
        let rpo = cfg.reverse_postorder();
        let join = *rpo.last().unwrap();
        assert!(cfg.dominates(f.entry_block(), join));
        let branches: Vec<BlockId> = rpo[1..3].to_vec();
        for b in branches {
            assert!(!cfg.dominates(b, join));
        }
    }
}
