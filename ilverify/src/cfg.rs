//! Control-flow checker (§4.A5): block/label uniqueness, entry-block
//! naming, one terminator per block, and per-terminator successor and
//! branch-argument rules.

use std::collections::HashMap;

use crate::dom::{BlockId, Cfg};
use crate::ir::{BasicBlock, Function};
use crate::opcode::Opcode;
use crate::types::Type;

/// Resolves a function's blocks into the id-indexed [`Cfg`] shape the
/// dominance module needs, and validates the structural rules that
/// have to hold before dominance even makes sense to compute.
pub fn check_and_build_cfg(function: &Function) -> Result<Cfg, String> {
    check_labels_unique(function)?;
    let entry_label = check_entry_block(function)?;
    for block in &function.blocks {
        check_single_terminator(block)?;
        check_terminator_successors(function, block)?;
    }

    let label_to_id: HashMap<&str, BlockId> = function
        .blocks
        .iter()
        .enumerate()
        .map(|(i, b)| (b.label.as_str(), i))
        .collect();
    let n = function.blocks.len();
    let mut succs: Vec<Vec<BlockId>> = vec![Vec::new(); n];
    let mut preds: Vec<Vec<BlockId>> = vec![Vec::new(); n];
    for (i, block) in function.blocks.iter().enumerate() {
        if let Some(term) = block.terminator() {
            for target in &term.targets {
                let &tid = label_to_id
                    .get(target.label.as_str())
                    .expect("branch target resolved during check_terminator_successors");
                succs[i].push(tid);
                preds[tid].push(i);
            }
        }
    }

    let entry = label_to_id[entry_label.as_str()];
    let rpo = reverse_postorder(entry, &succs, n);
    Ok(Cfg {
        rpo,
        preds,
        succs,
        entry,
    })
}

fn reverse_postorder(entry: BlockId, succs: &[Vec<BlockId>], n: usize) -> Vec<BlockId> {
    let mut visited = vec![false; n];
    let mut postorder = Vec::with_capacity(n);
    let mut stack: Vec<(BlockId, usize)> = vec![(entry, 0)];
    visited[entry] = true;
    while let Some((b, i)) = stack.pop() {
        if i < succs[b].len() {
            let next = succs[b][i];
            stack.push((b, i + 1));
            if !visited[next] {
                visited[next] = true;
                stack.push((next, 0));
            }
        } else {
            postorder.push(b);
        }
    }
    postorder.reverse();
    postorder
}

fn check_labels_unique(function: &Function) -> Result<(), String> {
    let mut seen = std::collections::HashSet::new();
    for block in &function.blocks {
        if !seen.insert(block.label.as_str()) {
            return Err(format!(
                "function '{}': duplicate block label '{}'",
                function.name, block.label
            ));
        }
    }
    Ok(())
}

fn check_entry_block(function: &Function) -> Result<String, String> {
    let entries: Vec<&BasicBlock> = function
        .blocks
        .iter()
        .filter(|b| b.label == "entry" || b.label.starts_with("entry_"))
        .collect();
    match entries.as_slice() {
        [] => Err(format!(
            "function '{}': no entry block (expected a block named 'entry')",
            function.name
        )),
        [single] => Ok(single.label.clone()),
        _ => Err(format!(
            "function '{}': more than one entry-named block",
            function.name
        )),
    }
}

fn check_single_terminator(block: &BasicBlock) -> Result<(), String> {
    if block.instrs.is_empty() {
        return Err(format!("block '{}' is empty, has no terminator", block.label));
    }
    let last_index = block.instrs.len() - 1;
    for (i, instr) in block.instrs.iter().enumerate() {
        let is_term = instr.opcode.spec().is_terminator;
        if i == last_index {
            if !is_term {
                return Err(format!(
                    "block '{}' does not end in a terminator instruction",
                    block.label
                ));
            }
        } else if is_term {
            return Err(format!(
                "block '{}' has a terminator instruction before its end ('{}' at position {})",
                block.label,
                instr.mnemonic(),
                i
            ));
        }
    }
    Ok(())
}

fn check_terminator_successors(function: &Function, block: &BasicBlock) -> Result<(), String> {
    let term = block.terminator().expect("checked by check_single_terminator");
    let spec = term.opcode.spec();

    match term.opcode {
        Opcode::Br => {
            if term.targets.len() != 1 {
                return Err(format!(
                    "block '{}': br must have exactly one target, found {}",
                    block.label,
                    term.targets.len()
                ));
            }
        }
        Opcode::Cbr => {
            if term.targets.len() != 2 {
                return Err(format!(
                    "block '{}': cbr must have exactly two targets (then, else), found {}",
                    block.label,
                    term.targets.len()
                ));
            }
        }
        Opcode::SwitchI32 => {
            if term.targets.is_empty() {
                return Err(format!(
                    "block '{}': switch.i32 must have a default target",
                    block.label
                ));
            }
            if term.case_values.len() != term.targets.len() - 1 {
                return Err(format!(
                    "block '{}': switch.i32 case count ({}) does not match non-default target count ({})",
                    block.label,
                    term.case_values.len(),
                    term.targets.len() - 1
                ));
            }
            let mut seen = std::collections::HashSet::new();
            for &v in &term.case_values {
                if !seen.insert(v) {
                    return Err(format!(
                        "block '{}': switch.i32 has duplicate case value {v}",
                        block.label
                    ));
                }
            }
        }
        Opcode::Ret => {
            if !term.targets.is_empty() {
                return Err(format!("block '{}': ret must have no targets", block.label));
            }
            let declared = function.return_type;
            match (&term.operands.first(), declared) {
                (None, Type::Void) => {}
                (None, other) => {
                    return Err(format!(
                        "block '{}': ret with no value in a function returning {}",
                        block.label, other
                    ))
                }
                (Some(_), Type::Void) => {
                    return Err(format!(
                        "block '{}': ret with a value in a function returning void",
                        block.label
                    ))
                }
                (Some(_), _) => {
                    if term.ty != declared {
                        return Err(format!(
                            "block '{}': ret value type {} does not match function return type {}",
                            block.label, term.ty, declared
                        ));
                    }
                }
            }
            return Ok(());
        }
        Opcode::ResumeSame | Opcode::ResumeNext => {
            if !term.targets.is_empty() {
                return Err(format!(
                    "block '{}': {} must have no explicit targets",
                    block.label,
                    term.mnemonic()
                ));
            }
            return Ok(());
        }
        Opcode::ResumeLabel => {
            if term.targets.len() != 1 {
                return Err(format!(
                    "block '{}': resume.label must have exactly one target",
                    block.label
                ));
            }
        }
        _ if spec.is_terminator => {
            // trap.err / trap.from_err: no successors, nothing more to check here.
            if !term.targets.is_empty() {
                return Err(format!(
                    "block '{}': {} must have no targets",
                    block.label,
                    term.mnemonic()
                ));
            }
            return Ok(());
        }
        _ => unreachable!("non-terminator reached check_terminator_successors"),
    }

    for target in &term.targets {
        let target_block = function
            .block(&target.label)
            .ok_or_else(|| format!("block '{}': branch to undefined label '{}'", block.label, target.label))?;
        if target.args.len() != target_block.params.len() {
            return Err(format!(
                "block '{}': branch to '{}' supplies {} argument(s), target expects {}",
                block.label,
                target.label,
                target.args.len(),
                target_block.params.len()
            ));
        }
    }

    Ok(())
}
