//! Dominance and post-dominance over a function's control-flow graph
//! (§4.A6.2, §4.A6.3; design note §9).
//!
//! Dominance uses the Cooper-Harvey-Kennedy iterative algorithm,
//! producing a flat `idom` map rather than a dominator tree — the
//! handler-coverage check only ever asks "does A dominate B", which a
//! flat map answers by walking `idom` links, per design note §9.
//! Post-dominance is the small-function bitset fixpoint the same note
//! allows (a sparse representation is left as future work for large
//! functions, which this crate does not need).

use std::collections::HashMap;

pub type BlockId = usize;

/// A function's control-flow graph in the shape both dominance
/// algorithms need: block ids in reverse-postorder, plus predecessor
/// and successor lists indexed by id.
pub struct Cfg {
    pub rpo: Vec<BlockId>,
    pub preds: Vec<Vec<BlockId>>,
    pub succs: Vec<Vec<BlockId>>,
    pub entry: BlockId,
}

/// Cooper-Harvey-Kennedy: "A Simple, Fast Dominance Algorithm".
/// Returns `idom[b]` for every block reachable from `entry`; the entry
/// block is its own idom.
pub fn compute_idom(cfg: &Cfg) -> HashMap<BlockId, BlockId> {
    let rpo_index: HashMap<BlockId, usize> = cfg
        .rpo
        .iter()
        .enumerate()
        .map(|(i, &b)| (b, i))
        .collect();

    let mut idom: HashMap<BlockId, BlockId> = HashMap::new();
    idom.insert(cfg.entry, cfg.entry);

    let mut changed = true;
    while changed {
        changed = false;
        for &b in &cfg.rpo {
            if b == cfg.entry {
                continue;
            }
            let mut new_idom: Option<BlockId> = None;
            for &p in &cfg.preds[b] {
                if !idom.contains_key(&p) {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => p,
                    Some(cur) => intersect(&idom, &rpo_index, cur, p),
                });
            }
            if let Some(ni) = new_idom {
                if idom.get(&b) != Some(&ni) {
                    idom.insert(b, ni);
                    changed = true;
                }
            }
        }
    }
    idom
}

fn intersect(
    idom: &HashMap<BlockId, BlockId>,
    rpo_index: &HashMap<BlockId, usize>,
    a: BlockId,
    b: BlockId,
) -> BlockId {
    let mut finger1 = a;
    let mut finger2 = b;
    while finger1 != finger2 {
        while rpo_index[&finger1] > rpo_index[&finger2] {
            finger1 = idom[&finger1];
        }
        while rpo_index[&finger2] > rpo_index[&finger1] {
            finger2 = idom[&finger2];
        }
    }
    finger1
}

/// `a` dominates `b` iff `b` is reachable and `a` appears on the idom
/// chain from `b` up to the entry (inclusive).
pub fn dominates(idom: &HashMap<BlockId, BlockId>, a: BlockId, b: BlockId) -> bool {
    let mut cur = b;
    loop {
        if cur == a {
            return true;
        }
        match idom.get(&cur) {
            Some(&next) if next != cur => cur = next,
            Some(&next) if next == cur => return cur == a,
            _ => return false,
        }
    }
}

/// Post-dominance: `a` post-dominates `b` iff every path from `b` to
/// any exit block passes through `a`. Computed as an iterative bitset
/// fixpoint over a reversed CFG (design note §9): start with
/// `postdom[exit] = {exit}`, `postdom[other] = universe`, then
/// `postdom[b] = {b} | intersection(postdom[s] for s in succs(b))`
/// until stable.
pub struct PostDom {
    n: usize,
    sets: Vec<Vec<bool>>,
}

impl PostDom {
    pub fn compute(cfg: &Cfg, exits: &[BlockId]) -> Self {
        let n = cfg.preds.len();
        let universe: Vec<bool> = vec![true; n];
        let mut sets: Vec<Vec<bool>> = vec![universe.clone(); n];
        for &e in exits {
            sets[e] = vec![false; n];
            sets[e][e] = true;
        }

        let mut changed = true;
        while changed {
            changed = false;
            // Process in reverse of the forward RPO so successors
            // tend to be computed before predecessors.
            for &b in cfg.rpo.iter().rev() {
                if exits.contains(&b) {
                    continue;
                }
                let succs = &cfg.succs[b];
                if succs.is_empty() {
                    continue;
                }
                let mut new_set = sets[succs[0]].clone();
                for &s in &succs[1..] {
                    for i in 0..n {
                        new_set[i] = new_set[i] && sets[s][i];
                    }
                }
                new_set[b] = true;
                if new_set != sets[b] {
                    sets[b] = new_set;
                    changed = true;
                }
            }
        }

        PostDom { n, sets }
    }

    pub fn post_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a < self.n && b < self.n && self.sets[b][a]
    }
}
