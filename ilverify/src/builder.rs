//! Small fluent constructors for assembling test fixtures without
//! hand-writing every struct field (design note §9).

use crate::ir::{BasicBlock, BlockParam, BranchTarget, Function, Instr, Module};
use crate::opcode::Opcode;
use crate::types::{Type, Value, ValueId};

pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        ModuleBuilder {
            module: Module::default(),
        }
    }

    pub fn function(mut self, f: Function) -> Self {
        self.module.functions.push(f);
        self
    }

    pub fn global(mut self, name: &str, ty: Type) -> Self {
        self.module.globals.push(crate::ir::Global {
            name: name.to_string(),
            ty,
        });
        self
    }

    pub fn extern_fn(mut self, name: &str, param_types: Vec<Type>, return_type: Type) -> Self {
        self.module.externs.push(crate::ir::Extern {
            name: name.to_string(),
            param_types,
            return_type,
        });
        self
    }

    pub fn build(self) -> Module {
        self.module
    }
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct FunctionBuilder {
    name: String,
    param_types: Vec<Type>,
    return_type: Type,
    blocks: Vec<BasicBlock>,
}

impl FunctionBuilder {
    pub fn new(name: &str, param_types: Vec<Type>, return_type: Type) -> Self {
        FunctionBuilder {
            name: name.to_string(),
            param_types,
            return_type,
            blocks: Vec::new(),
        }
    }

    pub fn block(mut self, block: BasicBlock) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn build(self) -> Function {
        Function {
            name: self.name,
            param_types: self.param_types,
            return_type: self.return_type,
            blocks: self.blocks,
        }
    }
}

pub struct BlockBuilder {
    label: String,
    params: Vec<BlockParam>,
    instrs: Vec<Instr>,
}

impl BlockBuilder {
    pub fn new(label: &str) -> Self {
        BlockBuilder {
            label: label.to_string(),
            params: Vec::new(),
            instrs: Vec::new(),
        }
    }

    pub fn param(mut self, id: ValueId, ty: Type) -> Self {
        self.params.push(BlockParam { id, ty, name: None });
        self
    }

    /// Like `param`, but records a source name — needed for handler
    /// blocks, whose `err`/`tok` params must be named exactly that.
    pub fn param_named(mut self, id: ValueId, name: &str, ty: Type) -> Self {
        self.params.push(BlockParam {
            id,
            ty,
            name: Some(name.to_string()),
        });
        self
    }

    pub fn instr(mut self, instr: Instr) -> Self {
        self.instrs.push(instr);
        self
    }

    pub fn build(self) -> BasicBlock {
        BasicBlock {
            label: self.label,
            params: self.params,
            instrs: self.instrs,
        }
    }
}

/// Builds an instruction with every field defaulted to its
/// most-common value; `.with_*` calls adjust only what a given test
/// cares about.
pub struct InstrBuilder(Instr);

impl InstrBuilder {
    pub fn new(opcode: Opcode) -> Self {
        InstrBuilder(Instr {
            opcode,
            result: None,
            ty: Type::Void,
            operands: Vec::new(),
            targets: Vec::new(),
            case_values: Vec::new(),
            callee: None,
            handler: None,
            line: None,
            column: None,
        })
    }

    pub fn result(mut self, id: ValueId) -> Self {
        self.0.result = Some(id);
        self
    }

    pub fn ty(mut self, ty: Type) -> Self {
        self.0.ty = ty;
        self
    }

    pub fn operand(mut self, v: Value) -> Self {
        self.0.operands.push(v);
        self
    }

    pub fn operands(mut self, vs: Vec<Value>) -> Self {
        self.0.operands = vs;
        self
    }

    pub fn target(mut self, label: &str, args: Vec<Value>) -> Self {
        self.0.targets.push(BranchTarget {
            label: label.to_string(),
            args,
        });
        self
    }

    pub fn case(mut self, v: i64) -> Self {
        self.0.case_values.push(v);
        self
    }

    pub fn callee(mut self, name: &str) -> Self {
        self.0.callee = Some(name.to_string());
        self
    }

    pub fn handler(mut self, label: &str) -> Self {
        self.0.handler = Some(label.to_string());
        self
    }

    pub fn build(self) -> Instr {
        self.0
    }
}
