//! Exception-handling analyser (§4.A6): balanced handler-stack
//! dataflow, handler coverage/dominance/reachability, and resume.label
//! post-dominance validity.

use std::collections::{HashMap, HashSet};

use crate::dom::{compute_idom, dominates, Cfg, PostDom};
use crate::ir::Function;
use crate::opcode::Opcode;

/// Dataflow state reaching a block along one explored path (§A6.1).
/// Per design note §9, this is a typed tuple with derived
/// hash/equality rather than the legacy `"<token>|L0;L1;...;"` string
/// encoding — the `Vec<BlockId>` is the active handler stack,
/// innermost handler last; the `bool` is whether a resume token is
/// currently available (true from the point an `eh.entry` has run,
/// within that handler's own region).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EhState {
    has_token: bool,
    stack: Vec<usize>,
}

/// Whether an opcode can fault, i.e. unwind to the innermost handler
/// (§A6.2). Everything is potentially faulting except the control
/// opcodes and the EH bookkeeping opcodes themselves.
fn is_potentially_faulting(opcode: Opcode) -> bool {
    !matches!(
        opcode,
        Opcode::EhPush
            | Opcode::EhPop
            | Opcode::EhEntry
            | Opcode::ResumeSame
            | Opcode::ResumeNext
            | Opcode::ResumeLabel
            | Opcode::Br
            | Opcode::Cbr
            | Opcode::SwitchI32
            | Opcode::Ret
    )
}

/// Runs the full exception-handling analysis for one function.
/// Returns every finding as an `(ErrorCode, message)` pair; the caller
/// ([`crate::pipeline`]) wraps these into [`crate::diagnostic::Diagnostic`]s.
pub fn check_function(function: &Function, cfg: &Cfg) -> Vec<(crate::diagnostic::ErrorCode, String)> {
    use crate::diagnostic::ErrorCode;

    let mut findings = Vec::new();
    let label_to_id: HashMap<&str, usize> = function
        .blocks
        .iter()
        .enumerate()
        .map(|(i, b)| (b.label.as_str(), i))
        .collect();
    let idom = compute_idom(cfg);

    // exits = blocks whose terminator is `ret` (the only blocks a
    // balanced stack is actually evaluated against; `resume.*`
    // terminators transfer control back into ordinary flow and so
    // are not themselves exits for post-dominance purposes).
    let exits: Vec<usize> = function
        .blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| matches!(b.terminator().map(|t| t.opcode), Some(Opcode::Ret)))
        .map(|(i, _)| i)
        .collect();
    let postdom = if exits.is_empty() {
        None
    } else {
        Some(PostDom::compute(cfg, &exits))
    };

    // Every block statically naming a handler via `eh.push`, indexed
    // by the handler's block id (§A6.2 dominance: the push site, not
    // the handler block, is the dominator).
    let mut push_sites: HashMap<usize, Vec<usize>> = HashMap::new();
    for (block_id, block) in function.blocks.iter().enumerate() {
        for instr in &block.instrs {
            if instr.opcode == Opcode::EhPush {
                if let Some(label) = instr.handler.as_deref() {
                    if let Some(&hid) = label_to_id.get(label) {
                        push_sites.entry(hid).or_default().push(block_id);
                    }
                }
            }
        }
    }

    // coverage[H] = blocks with a potentially-faulting instruction
    // while H is the innermost active handler (§A6.2).
    let mut coverage: HashMap<usize, HashSet<usize>> = HashMap::new();
    let mut reached: HashSet<usize> = HashSet::new();

    let start = EhState {
        has_token: false,
        stack: Vec::new(),
    };
    let mut visited: HashSet<(usize, EhState)> = HashSet::new();
    let mut worklist: Vec<(usize, EhState)> = vec![(cfg.entry, start)];

    while let Some((block_id, state)) = worklist.pop() {
        let key = (block_id, state.clone());
        if !visited.insert(key) {
            continue;
        }
        reached.insert(block_id);

        let block = &function.blocks[block_id];
        let mut cur = state;
        for instr in &block.instrs {
            if is_potentially_faulting(instr.opcode) {
                if let Some(&innermost) = cur.stack.last() {
                    coverage.entry(innermost).or_default().insert(block_id);
                }
            }
            match instr.opcode {
                Opcode::EhPush => {
                    let label = instr
                        .handler
                        .as_deref()
                        .expect("eh.push built without a handler label");
                    match label_to_id.get(label) {
                        Some(&hid) => cur.stack.push(hid),
                        None => findings.push((
                            ErrorCode::EhHandlerUnreachable,
                            format!(
                                "block '{}': eh.push references undefined handler block '{}'",
                                block.label, label
                            ),
                        )),
                    }
                }
                Opcode::EhPop => {
                    if cur.stack.pop().is_none() {
                        findings.push((
                            ErrorCode::EhStackUnderflow,
                            format!("block '{}': eh.pop with no active handler", block.label),
                        ));
                    }
                }
                Opcode::EhEntry => {
                    cur.has_token = true;
                }
                Opcode::ResumeSame | Opcode::ResumeNext | Opcode::ResumeLabel => {
                    if !cur.has_token {
                        findings.push((
                            ErrorCode::EhResumeTokenMissing,
                            format!("block '{}': {} outside an active handler", block.label, instr.mnemonic()),
                        ));
                    } else if instr.opcode == Opcode::ResumeLabel {
                        if let (Some(target), Some(pd)) = (instr.targets.first(), &postdom) {
                            if let Some(&target_id) = label_to_id.get(target.label.as_str()) {
                                let handler_id = cur.stack.last().copied();
                                if let Some(hid) = handler_id {
                                    if !pd.post_dominates(target_id, hid) {
                                        findings.push((
                                            ErrorCode::EhResumeLabelInvalidTarget,
                                            format!(
                                                "block '{}': resume.label target '{}' does not post-dominate handler block",
                                                block.label, target.label
                                            ),
                                        ));
                                    }
                                }
                            }
                        }
                    }
                    cur.stack.pop();
                    cur.has_token = false;
                }
                Opcode::Ret => {
                    if !cur.stack.is_empty() {
                        findings.push((
                            ErrorCode::EhStackLeak,
                            format!("block '{}': handler stack non-empty at return", block.label),
                        ));
                    }
                }
                _ => {}
            }
        }

        if let Some(term) = block.terminator() {
            match term.opcode {
                Opcode::TrapErr | Opcode::TrapFromErr => {
                    if let Some(&target) = cur.stack.last() {
                        worklist.push((
                            target,
                            EhState {
                                has_token: true,
                                stack: cur.stack.clone(),
                            },
                        ));
                    }
                }
                Opcode::ResumeSame | Opcode::ResumeNext => {}
                _ => {
                    for target in &term.targets {
                        if let Some(&tid) = label_to_id.get(target.label.as_str()) {
                            worklist.push((tid, cur.clone()));
                        }
                    }
                }
            }
        }
    }

    // Dominance (§A6.2): every block containing an `eh.push L` must
    // dominate every block in L's coverage set.
    for (&handler_id, region) in &coverage {
        let Some(sites) = push_sites.get(&handler_id) else { continue };
        for &site in sites {
            for &b in region {
                if !dominates(&idom, site, b) {
                    findings.push((
                        ErrorCode::EhHandlerNotDominant,
                        format!(
                            "block '{}' (eh.push of handler '{}') does not dominate block '{}' where it may fault",
                            function.blocks[site].label, function.blocks[handler_id].label, function.blocks[b].label
                        ),
                    ));
                }
            }
        }
    }

    // Reachability (§A6.2): every should-be-reachable handler (its
    // coverage set is non-empty) must be reached by the traversal
    // above, which already includes the exception edge from a trap's
    // top-of-stack enqueue.
    let mut unreachable: Vec<&str> = coverage
        .iter()
        .filter(|(_, region)| !region.is_empty())
        .filter(|(&handler_id, _)| !reached.contains(&handler_id))
        .map(|(&handler_id, _)| function.blocks[handler_id].label.as_str())
        .collect();
    unreachable.sort_unstable();
    for label in unreachable {
        findings.push((
            ErrorCode::EhHandlerUnreachable,
            format!("handler block '{label}' is unreachable"),
        ));
    }

    findings
}
