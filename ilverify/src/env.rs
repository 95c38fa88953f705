//! `TypeEnv`: the per-function SSA value environment (§4.A2).

use std::collections::HashMap;

use crate::ir::Function;
use crate::types::{Type, Value, ValueId};

/// Tracks the type of every temp defined so far in a function, plus
/// lookup of extern/global types for `GlobalAddr` values. Built fresh
/// per function and threaded block-to-block in program order; the
/// control-flow checker (§4.A5) is what guarantees "program order" is
/// a meaningful notion here (each block visited once, predecessors
/// before successors along the checked path).
pub struct TypeEnv<'m> {
    temps: HashMap<ValueId, Type>,
    globals: &'m HashMap<String, Type>,
}

impl<'m> TypeEnv<'m> {
    pub fn new(globals: &'m HashMap<String, Type>) -> Self {
        TypeEnv {
            temps: HashMap::new(),
            globals,
        }
    }

    /// Resolve a value's type. `Temp` goes through the environment;
    /// everything else is a literal (§3.1).
    pub fn value_type(&self, value: &Value) -> Result<Type, String> {
        match value {
            Value::Temp(id) => self
                .temps
                .get(id)
                .copied()
                .ok_or_else(|| format!("use of undefined value %{id}")),
            Value::GlobalAddr(name) => {
                if self.globals.contains_key(name) {
                    Ok(Type::Ptr)
                } else {
                    Err(format!("reference to undefined global @{name}"))
                }
            }
            other => other
                .literal_type()
                .ok_or_else(|| "value has no static type".to_string()),
        }
    }

    /// Records the result produced by an instruction or block param.
    /// Re-defining an existing id is a caller bug (SSA uniqueness is
    /// enforced earlier, at parse/build time) and panics rather than
    /// silently overwriting the recorded type.
    pub fn record_result(&mut self, id: ValueId, ty: Type) {
        let prior = self.temps.insert(id, ty);
        debug_assert!(prior.is_none(), "SSA value %{id} redefined");
    }

    pub fn add_temp(&mut self, id: ValueId, ty: Type) {
        self.record_result(id, ty);
    }

    pub fn remove_temp(&mut self, id: ValueId) {
        self.temps.remove(&id);
    }

    pub fn is_defined(&self, id: ValueId) -> bool {
        self.temps.contains_key(&id)
    }

    /// §4.A2: every operand referencing a temp must already be
    /// recorded in the environment.
    pub fn ensure_operands_defined(&self, operands: &[Value]) -> Result<(), String> {
        for op in operands {
            if let Value::Temp(id) = op {
                if !self.is_defined(*id) {
                    return Err(format!("use of undefined value %{id}"));
                }
            }
        }
        Ok(())
    }
}

/// Builds the `name -> Type` table `TypeEnv` needs for global lookups,
/// from a module's declared globals.
pub fn global_types(globals: &[crate::ir::Global]) -> HashMap<String, Type> {
    globals.iter().map(|g| (g.name.clone(), g.ty)).collect()
}

/// Seeds a fresh `TypeEnv` with a function's own parameters, bound as
/// temps `0..param_types.len()` in declaration order (the convention
/// the rest of this crate assumes for entry-block params).
pub fn seed_params(env: &mut TypeEnv<'_>, function: &Function) {
    for (i, ty) in function.param_types.iter().enumerate() {
        env.add_temp(i as ValueId, *ty);
    }
}
