//! Structural checkers driven entirely by the opcode schema (§4.A3).

use crate::env::TypeEnv;
use crate::ir::Instr;
use crate::opcode::{OpSpec, ResultArity, TypeClass, VARIADIC};
use crate::types::Type;

/// Checks operand-count bounds against `OpSpec::num_operands_{min,max}`.
pub struct OperandCountChecker;

impl OperandCountChecker {
    pub fn check(instr: &Instr, spec: &OpSpec) -> Result<(), String> {
        let n = instr.operands.len() as u32;
        let (min, max) = (spec.num_operands_min, spec.num_operands_max);
        if min == max {
            if n != min {
                return Err(format!(
                    "{}: invalid operand count: expected {} operand(s), found {}",
                    instr.mnemonic(),
                    min,
                    n
                ));
            }
        } else if max == VARIADIC {
            if n < min {
                return Err(format!(
                    "{}: invalid operand count: expected at least {} operand(s), found {}",
                    instr.mnemonic(),
                    min,
                    n
                ));
            }
        } else if n < min || n > max {
            return Err(format!(
                "{}: invalid operand count: expected between {} and {} operand(s), found {}",
                instr.mnemonic(),
                min,
                max,
                n
            ));
        }
        Ok(())
    }
}

/// Checks each operand's resolved type against its schema type class.
pub struct OperandTypeChecker;

impl OperandTypeChecker {
    pub fn check(instr: &Instr, spec: &OpSpec, env: &TypeEnv<'_>) -> Result<(), String> {
        // Variadic / dynamically-typed opcodes (call, calli, gep's
        // trailing index list) defer all operand typing to their
        // strategy (§4.A4); the schema only fixes arity here.
        if spec.operand_type_classes.is_empty() {
            return Ok(());
        }
        for (i, operand) in instr.operands.iter().enumerate() {
            let class = spec
                .operand_type_classes
                .get(i)
                .copied()
                .unwrap_or(TypeClass::Any);
            if matches!(class, TypeClass::Any | TypeClass::Dynamic) {
                continue;
            }
            let actual = env
                .value_type(operand)
                .map_err(|_| format!("{}: operand {} type is unknown", instr.mnemonic(), i))?;
            let expected = match class {
                TypeClass::InstrType => instr.ty,
                other => other
                    .concrete()
                    .expect("non-dynamic, non-InstrType class must resolve to a concrete type"),
            };
            if actual != expected {
                return Err(format!(
                    "{}: operand {} has type {}, expected {}",
                    instr.mnemonic(),
                    i,
                    actual,
                    expected
                ));
            }
        }
        Ok(())
    }
}

/// Checks an instruction's declared result arity/type against the
/// schema, then records it in the environment on success.
pub struct ResultTypeChecker;

impl ResultTypeChecker {
    pub fn check(instr: &Instr, spec: &OpSpec) -> Result<Option<Type>, String> {
        match (spec.result_arity, instr.result) {
            (ResultArity::None, Some(_)) => Err(format!(
                "{}: instruction must not declare a result",
                instr.mnemonic()
            )),
            (ResultArity::One, None) => Err(format!(
                "{}: instruction must declare a result",
                instr.mnemonic()
            )),
            (ResultArity::None, None) => Ok(None),
            (ResultArity::One, Some(_)) | (ResultArity::Optional, Some(_)) => {
                let ty = match spec.result_type_class {
                    TypeClass::InstrType => instr.ty,
                    TypeClass::Dynamic => instr.ty,
                    other => other.concrete().ok_or_else(|| {
                        format!("{}: result type class has no concrete type", instr.mnemonic())
                    })?,
                };
                Ok(Some(ty))
            }
            (ResultArity::Optional, None) => Ok(None),
        }
    }
}

/// Runs the full structural signature check for one instruction
/// (§4.A3's `verify_opcode_signature`): operand count, operand types,
/// result arity/type, in that order — the order named by the spec's
/// error-message scenarios (count errors are reported before type
/// errors on the same malformed instruction).
pub fn verify_opcode_signature(instr: &Instr, env: &TypeEnv<'_>) -> Result<Option<Type>, String> {
    let spec = instr.opcode.spec();
    OperandCountChecker::check(instr, spec)?;
    OperandTypeChecker::check(instr, spec, env)?;
    ResultTypeChecker::check(instr, spec)
}
