//! The module/function/block/instruction data model (§3.1).

use std::collections::HashMap;

use crate::opcode::Opcode;
use crate::types::{Type, Value, ValueId};

/// A top-level unit under verification (§3.1 `Module`).
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub externs: Vec<Extern>,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

/// A declared-but-not-defined function (§3.1 `Extern`).
#[derive(Debug, Clone)]
pub struct Extern {
    pub name: String,
    pub param_types: Vec<Type>,
    pub return_type: Type,
}

/// A module-level constant storage slot (§3.1 `Global`).
#[derive(Debug, Clone)]
pub struct Global {
    pub name: String,
    pub ty: Type,
}

/// A defined function body (§3.1 `Function`).
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub param_types: Vec<Type>,
    pub return_type: Type,
    pub blocks: Vec<BasicBlock>,
}

impl Function {
    pub fn block(&self, label: &str) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.label == label)
    }

    pub fn block_index(&self) -> HashMap<&str, usize> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.label.as_str(), i))
            .collect()
    }

    /// The block verification starts from. Spec §4.A5 requires a single
    /// block named `entry` (or, for multi-entry test fixtures, one
    /// whose label starts with `entry_`); the control-flow checker is
    /// responsible for rejecting modules that violate this, this is
    /// just the lookup used once that's established.
    pub fn entry_block(&self) -> Option<&BasicBlock> {
        self.blocks
            .iter()
            .find(|b| b.label == "entry" || b.label.starts_with("entry_"))
    }
}

/// A single block parameter (SSA phi-equivalent, bound by predecessor
/// branch-argument bundles).
#[derive(Debug, Clone)]
pub struct BlockParam {
    pub id: ValueId,
    pub ty: Type,
    /// Source name, if any. Only checked where the spec requires a
    /// specific name (handler-block `err`/`tok` params, §4.A6);
    /// ordinary block params are name-agnostic.
    pub name: Option<String>,
}

/// A straight-line sequence of instructions ending in one terminator
/// (§3.1 `BasicBlock`).
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub label: String,
    pub params: Vec<BlockParam>,
    pub instrs: Vec<Instr>,
}

impl BasicBlock {
    pub fn terminator(&self) -> Option<&Instr> {
        self.instrs.last()
    }
}

/// A branch target plus the argument bundle bound to the target
/// block's params (§3.1 branch-arg bundle).
#[derive(Debug, Clone)]
pub struct BranchTarget {
    pub label: String,
    pub args: Vec<Value>,
}

/// One instruction (§3.1 `Instr`).
#[derive(Debug, Clone)]
pub struct Instr {
    pub opcode: Opcode,
    /// Present iff the opcode produces a value (`ResultArity::One`) or
    /// chooses to (`ResultArity::Optional`).
    pub result: Option<ValueId>,
    /// The instruction's own declared type — result type for most
    /// opcodes, allocation/cast target type for `alloca`/cast
    /// opcodes, callee return type for `call`/`calli`.
    pub ty: Type,
    pub operands: Vec<Value>,
    /// Branch targets, in schema order (e.g. `cbr`: [then, else];
    /// `switch.i32`: [default, case_0, case_1, ...]).
    pub targets: Vec<BranchTarget>,
    /// `switch.i32` case values, one per non-default target, in the
    /// same order as `targets[1..]`.
    pub case_values: Vec<i64>,
    /// Callee name for `call`; unused otherwise.
    pub callee: Option<String>,
    /// Handler block label for `eh.push`; unused otherwise.
    pub handler: Option<String>,
    /// Source position, best-effort (spec §7 Diagnostic fields).
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl Instr {
    pub fn mnemonic(&self) -> &'static str {
        self.opcode.mnemonic()
    }
}
