//! Per-opcode semantic strategies (§4.A4): everything the schema-driven
//! structural checkers (§4.A3) can't express because it depends on the
//! specific opcode rather than its declared arity/type classes.

use std::collections::HashMap;

use crate::diagnostic::{Diagnostic, DiagSink};
use crate::env::TypeEnv;
use crate::ir::{BasicBlock, Extern, Function, Instr};
use crate::opcode::Strategy;
use crate::types::{Type, Value};

/// Everything a strategy needs to verify one instruction in place.
/// Grouped the way the teacher groups per-call state into a single
/// struct passed by reference (`Behaviour`, `ParseContext`) rather
/// than as a long parameter list.
pub struct VerifyCtx<'a> {
    pub externs: &'a HashMap<String, &'a Extern>,
    pub functions: &'a HashMap<String, &'a Function>,
    pub function: &'a Function,
    pub block: &'a BasicBlock,
    pub instr: &'a Instr,
    pub diag_sink: &'a mut dyn DiagSink,
}

/// Runs the strategy named by the instruction's opcode. Returns
/// `Ok(())` if the instruction passed (diagnostics may still have been
/// reported as warnings), `Err(())` once a fatal diagnostic was
/// reported or the sink asked to stop.
pub fn run_strategy(ctx: &mut VerifyCtx<'_>, env: &mut TypeEnv<'_>) -> Result<(), ()> {
    let spec = ctx.instr.opcode.spec();
    match spec.strategy {
        Strategy::Default => Ok(()),
        Strategy::Alloca => check_alloca(ctx),
        Strategy::Gep => check_gep(ctx, env),
        Strategy::Load => Ok(()),
        Strategy::Store => check_store(ctx, env),
        Strategy::AddrOf => check_addrof(ctx, env),
        Strategy::ConstStr => check_const_str(ctx),
        Strategy::ConstNull => check_const_null(ctx),
        Strategy::CallDirect => check_call_direct(ctx),
        Strategy::CallIndirect => check_call_indirect(ctx, env),
        Strategy::TrapKind => Ok(()),
        Strategy::TrapErr => check_trap_err(ctx, env),
        Strategy::TrapFromErr => Ok(()),
        Strategy::IdxChk => check_idx_chk(ctx, env),
        Strategy::CastFpToSiRteChk | Strategy::CastFpToUiRteChk => check_fp_cast(ctx, env),
        Strategy::CastSiNarrowChk | Strategy::CastUiNarrowChk => check_int_narrow(ctx, env),
        Strategy::Reject(msg) => reject(ctx, msg),
    }
}

fn fail(ctx: &mut VerifyCtx<'_>, message: String) -> Result<(), ()> {
    ctx.diag_sink.report(Diagnostic::error(message));
    Err(())
}

fn reject(ctx: &mut VerifyCtx<'_>, msg: &'static str) -> Result<(), ()> {
    fail(ctx, format!("{}: {}", ctx.instr.mnemonic(), msg))
}

/// Constant alloca sizes above this many elements are almost always a
/// mistake rather than deliberate; flagged as a warning, not an error.
const HUGE_ALLOCA_THRESHOLD: i64 = 1 << 20;

/// `alloca`: allocation size operand must be a non-negative constant
/// when it is a constant at all (a non-constant size is allowed — the
/// schema already pinned its type to `i64` — but a negative literal
/// size is never valid). A constant size above `HUGE_ALLOCA_THRESHOLD`
/// is accepted but warned on.
fn check_alloca(ctx: &mut VerifyCtx<'_>) -> Result<(), ()> {
    if let Some(Value::ConstInt { val, .. }) = ctx.instr.operands.first() {
        if *val < 0 {
            return fail(
                ctx,
                format!("alloca: negative constant size {val}"),
            );
        }
        if *val > HUGE_ALLOCA_THRESHOLD {
            ctx.diag_sink
                .report(Diagnostic::warning(format!("alloca: huge constant size {val}")));
        }
    }
    Ok(())
}

/// `gep`: first operand is the base pointer, every later operand is an
/// index and must be an integer type.
fn check_gep(ctx: &mut VerifyCtx<'_>, env: &TypeEnv<'_>) -> Result<(), ()> {
    for (i, idx) in ctx.instr.operands.iter().enumerate().skip(1) {
        match env.value_type(idx) {
            Ok(ty) if ty.is_integer() => {}
            Ok(ty) => {
                return fail(
                    ctx,
                    format!("gep: index {i} has non-integer type {ty}"),
                )
            }
            Err(e) => return fail(ctx, format!("gep: {e}")),
        }
    }
    Ok(())
}

/// `store`: the value operand's type must match the pointee type
/// carried on the instruction (`instr.ty`), the same convention
/// `load` uses for its result.
fn check_store(ctx: &mut VerifyCtx<'_>, env: &TypeEnv<'_>) -> Result<(), ()> {
    let value = &ctx.instr.operands[1];
    match env.value_type(value) {
        Ok(ty) if ty == ctx.instr.ty => Ok(()),
        Ok(ty) => fail(
            ctx,
            format!(
                "store: value type {} does not match pointee type {}",
                ty, ctx.instr.ty
            ),
        ),
        Err(e) => fail(ctx, format!("store: {e}")),
    }
}

/// `addrof`: operand must name an existing local (a temp already
/// defined) or global; taking the address of a literal is rejected.
fn check_addrof(ctx: &mut VerifyCtx<'_>, env: &TypeEnv<'_>) -> Result<(), ()> {
    match &ctx.instr.operands[0] {
        Value::Temp(id) if env.is_defined(*id) => Ok(()),
        Value::GlobalAddr(_) => Ok(()),
        other => fail(ctx, format!("addrof: operand {other} is not addressable")),
    }
}

/// `const.str`: the sole operand must itself be a string literal.
fn check_const_str(ctx: &mut VerifyCtx<'_>) -> Result<(), ()> {
    match &ctx.instr.operands[0] {
        Value::ConstStr(_) => Ok(()),
        other => fail(ctx, format!("const.str: operand {other} is not a string literal")),
    }
}

/// `const.null`: declared type must be pointer-class (§4.A4).
fn check_const_null(ctx: &mut VerifyCtx<'_>) -> Result<(), ()> {
    if ctx.instr.ty.is_pointer_class() {
        Ok(())
    } else {
        fail(
            ctx,
            format!("const.null: type {} is not pointer-class", ctx.instr.ty),
        )
    }
}

/// Hard-coded signatures for the fixed set of runtime array helpers
/// (§4.A4), checked before the generic extern/function lookup so a
/// call to one of these names type-checks even without a matching
/// extern declaration in the module.
fn rt_arr_signature(name: &str) -> Option<(&'static [Type], Type)> {
    match name {
        "rt_arr_i32_new" => Some((&[Type::I32], Type::Ptr)),
        "rt_arr_i32_len" => Some((&[Type::Ptr], Type::I32)),
        "rt_arr_i32_get" => Some((&[Type::Ptr, Type::I32], Type::I32)),
        "rt_arr_i32_set" => Some((&[Type::Ptr, Type::I32, Type::I32], Type::Void)),
        "rt_arr_i32_resize" => Some((&[Type::Ptr, Type::I32], Type::Ptr)),
        "rt_arr_i32_retain" => Some((&[Type::Ptr], Type::Void)),
        "rt_arr_i32_release" => Some((&[Type::Ptr], Type::Void)),
        _ => None,
    }
}

/// `call`: callee must be a known function or extern with matching
/// arity and operand types; result type (if any) must match the
/// callee's declared return type. The `rt_arr_i32_*` runtime helpers
/// are checked against their hard-coded signature first, regardless of
/// whether the module also declares a matching extern.
fn check_call_direct(ctx: &mut VerifyCtx<'_>) -> Result<(), ()> {
    let callee = ctx
        .instr
        .callee
        .as_deref()
        .expect("call instruction built without a callee name");
    if let Some((param_types, return_type)) = rt_arr_signature(callee) {
        let operands = ctx.instr.operands.as_slice();
        return check_call_signature(ctx, operands, param_types, return_type);
    }
    let (param_types, return_type): (&[Type], Type) =
        if let Some(f) = ctx.functions.get(callee) {
            (&f.param_types, f.return_type)
        } else if let Some(e) = ctx.externs.get(callee) {
            (&e.param_types, e.return_type)
        } else {
            return fail(ctx, format!("call: undefined callee '{callee}'"));
        };
    let operands = ctx.instr.operands.as_slice();
    check_call_signature(ctx, operands, param_types, return_type)
}

/// `calli`: operand 0 is the callee.
///   - A global address (taking the address of a known function)
///     resolves exactly like a direct call: its signature is looked
///     up and checked against the remaining operands.
///   - Any other (genuinely indirect, e.g. loaded-from-a-vtable)
///     pointer value skips the signature check — interface dispatch
///     has no static callee to resolve — and only confirms every
///     argument operand itself has a known type.
fn check_call_indirect(ctx: &mut VerifyCtx<'_>, env: &TypeEnv<'_>) -> Result<(), ()> {
    let args = &ctx.instr.operands[1..];
    match &ctx.instr.operands[0] {
        Value::GlobalAddr(name) => {
            let name = name.as_str();
            let (param_types, return_type): (&[Type], Type) =
                if let Some(f) = ctx.functions.get(name) {
                    (&f.param_types, f.return_type)
                } else if let Some(e) = ctx.externs.get(name) {
                    (&e.param_types, e.return_type)
                } else {
                    return fail(ctx, format!("calli: undefined callee '{name}'"));
                };
            check_call_signature(ctx, args, param_types, return_type)
        }
        _ => {
            for op in args {
                if let Err(e) = env.value_type(op) {
                    return fail(ctx, format!("calli: {e}"));
                }
            }
            Ok(())
        }
    }
}

fn check_call_signature(
    ctx: &mut VerifyCtx<'_>,
    operands: &[Value],
    param_types: &[Type],
    return_type: Type,
) -> Result<(), ()> {
    if operands.len() != param_types.len() {
        return fail(
            ctx,
            format!(
                "{}: invalid operand count: expected {} operand(s), found {}",
                ctx.instr.mnemonic(),
                param_types.len(),
                operands.len()
            ),
        );
    }
    if ctx.instr.result.is_some() {
        if ctx.instr.ty != return_type {
            return fail(
                ctx,
                format!(
                    "{}: result type {} does not match callee return type {}",
                    ctx.instr.mnemonic(),
                    ctx.instr.ty,
                    return_type
                ),
            );
        }
    }
    Ok(())
}

/// `trap.err`: second operand is a message string, pinned by the
/// schema; nothing further to check beyond what the schema and
/// operand typing already did. Retained as an explicit strategy
/// function (rather than folded into `Default`) because this is
/// also where a future message-format rule would land.
fn check_trap_err(_ctx: &mut VerifyCtx<'_>, _env: &TypeEnv<'_>) -> Result<(), ()> {
    Ok(())
}

/// `idx.chk`: operand 0 is the index, operand 1 is the bound, operand
/// 2 is the value passed through on success; index and bound must be
/// the same integer type, and the passed-through value's type must
/// match the instruction's declared (result) type.
fn check_idx_chk(ctx: &mut VerifyCtx<'_>, env: &TypeEnv<'_>) -> Result<(), ()> {
    let idx_ty = match env.value_type(&ctx.instr.operands[0]) {
        Ok(t) => t,
        Err(e) => return fail(ctx, format!("idx.chk: {e}")),
    };
    if !idx_ty.is_integer() {
        return fail(ctx, format!("idx.chk: index type {idx_ty} is not an integer type"));
    }
    let bound_ty = match env.value_type(&ctx.instr.operands[1]) {
        Ok(t) => t,
        Err(e) => return fail(ctx, format!("idx.chk: {e}")),
    };
    if bound_ty != idx_ty {
        return fail(
            ctx,
            format!("idx.chk: bound type {bound_ty} does not match index type {idx_ty}"),
        );
    }
    let value_ty = match env.value_type(&ctx.instr.operands[2]) {
        Ok(t) => t,
        Err(e) => return fail(ctx, format!("idx.chk: {e}")),
    };
    if value_ty != ctx.instr.ty {
        return fail(
            ctx,
            format!(
                "idx.chk: value type {value_ty} does not match declared type {}",
                ctx.instr.ty
            ),
        );
    }
    Ok(())
}

/// The four `cast.*` strategies: source operand must be a numeric type
/// compatible with the direction of the cast (float for the `fp_to_*`
/// pair, integer for the `*_narrow` pair); the target type is whatever
/// the instruction declares.
fn check_fp_cast(ctx: &mut VerifyCtx<'_>, env: &TypeEnv<'_>) -> Result<(), ()> {
    match env.value_type(&ctx.instr.operands[0]) {
        Ok(Type::F32) | Ok(Type::F64) => Ok(()),
        Ok(ty) => fail(ctx, format!("{}: source type {ty} is not floating-point", ctx.instr.mnemonic())),
        Err(e) => fail(ctx, format!("{}: {e}", ctx.instr.mnemonic())),
    }
}

fn check_int_narrow(ctx: &mut VerifyCtx<'_>, env: &TypeEnv<'_>) -> Result<(), ()> {
    let src = match env.value_type(&ctx.instr.operands[0]) {
        Ok(ty) if ty.is_integer() => ty,
        Ok(ty) => {
            return fail(
                ctx,
                format!("{}: source type {ty} is not an integer type", ctx.instr.mnemonic()),
            )
        }
        Err(e) => return fail(ctx, format!("{}: {e}", ctx.instr.mnemonic())),
    };
    let dst = ctx.instr.ty;
    if !dst.is_integer() {
        return fail(ctx, format!("{}: target type {dst} is not an integer type", ctx.instr.mnemonic()));
    }
    let (src_bits, dst_bits) = (int_width(src), int_width(dst));
    if dst_bits >= src_bits {
        return fail(
            ctx,
            format!(
                "{}: target width {dst_bits} is not narrower than source width {src_bits}",
                ctx.instr.mnemonic()
            ),
        );
    }
    Ok(())
}

fn int_width(ty: Type) -> u32 {
    match ty {
        Type::I1 => 1,
        Type::I16 => 16,
        Type::I32 => 32,
        Type::I64 => 64,
        _ => unreachable!("int_width called on non-integer type"),
    }
}
