//! The verifier pipeline (§4.A7): externs, then globals, then each
//! function's structural/control-flow/exception-handling checks, in
//! that order, with first-failure short-circuit.

use std::collections::HashMap;

use log::{debug, trace};

use crate::cfg::check_and_build_cfg;
use crate::diagnostic::{Diagnostic, DiagSink, FailFastSink};
use crate::eh::check_function;
use crate::env::{global_types, seed_params, TypeEnv};
use crate::ir::{Extern, Function, Module};
use crate::opcode::Opcode;
use crate::strategy::{run_strategy, VerifyCtx};
use crate::structural::verify_opcode_signature;
use crate::types::Type;

/// Verifies a module end to end. Returns `Ok(())` if every check
/// passed (warnings, if any were reported, are simply not surfaced
/// through this signature — callers that want them should drive
/// [`verify_with_sink`] directly with a [`crate::diagnostic::VecSink`]).
pub fn verify(module: &Module) -> Result<(), Diagnostic> {
    let mut sink = FailFastSink::default();
    verify_with_sink(module, &mut sink);
    match sink.first_error() {
        Some(d) => Err(d.clone()),
        None => Ok(()),
    }
}

/// Same checks as [`verify`], but diagnostics are reported through a
/// caller-supplied sink instead of being collapsed to the first error.
pub fn verify_with_sink(module: &Module, sink: &mut dyn DiagSink) {
    if !check_externs(module, sink) {
        return;
    }
    if !check_globals(module, sink) {
        return;
    }

    let externs: HashMap<String, &Extern> =
        module.externs.iter().map(|e| (e.name.clone(), e)).collect();
    let functions: HashMap<String, &Function> =
        module.functions.iter().map(|f| (f.name.clone(), f)).collect();
    let globals = global_types(&module.globals);

    for function in &module.functions {
        trace!("verifying function '{}'", function.name);
        if !check_function_structure(function, &externs, &functions, &globals, sink) {
            return;
        }
        if !check_handler_blocks(function, sink) {
            return;
        }
        let cfg = match check_and_build_cfg(function) {
            Ok(cfg) => cfg,
            Err(e) => {
                sink.report(Diagnostic::error(e));
                return;
            }
        };
        for (code, message) in check_function(function, &cfg) {
            debug!("eh finding in '{}': {:?} {}", function.name, code, message);
            if !sink.report(Diagnostic::error(message).with_code(code)) {
                return;
            }
        }
    }
}

fn check_externs(module: &Module, sink: &mut dyn DiagSink) -> bool {
    let mut seen = std::collections::HashSet::new();
    for e in &module.externs {
        if !seen.insert(e.name.as_str()) {
            if !sink.report(Diagnostic::error(format!("duplicate extern '{}'", e.name))) {
                return false;
            }
        }
    }
    true
}

fn check_globals(module: &Module, sink: &mut dyn DiagSink) -> bool {
    let mut seen = std::collections::HashSet::new();
    for g in &module.globals {
        if !seen.insert(g.name.as_str()) {
            if !sink.report(Diagnostic::error(format!("duplicate global '@{}'", g.name))) {
                return false;
            }
        }
    }
    true
}

fn check_function_structure(
    function: &Function,
    externs: &HashMap<String, &Extern>,
    functions: &HashMap<String, &Function>,
    globals: &HashMap<String, crate::types::Type>,
    sink: &mut dyn DiagSink,
) -> bool {
    // Entry-block param binding: parameters are seeded as temps
    // 0..n before the first block runs (§4.A2).
    let mut env = TypeEnv::new(globals);
    seed_params(&mut env, function);

    // §4.A5's own structural rules (labels, terminators, branch
    // arity) are checked independently by `check_and_build_cfg`,
    // called by the caller right after this returns; here we only
    // need blocks to exist in a walkable order, so a simple
    // declaration-order walk is sufficient for per-instruction typing.
    for block in &function.blocks {
        for param in &block.params {
            env.add_temp(param.id, param.ty);
        }
        for instr in &block.instrs {
            if let Err(e) = env.ensure_operands_defined(&instr.operands) {
                if !sink.report(Diagnostic::error(format!("{}: {e}", instr.mnemonic()))) {
                    return false;
                }
                continue;
            }
            match verify_opcode_signature(instr, &env) {
                Ok(result_ty) => {
                    if let (Some(id), Some(ty)) = (instr.result, result_ty) {
                        env.record_result(id, ty);
                    }
                }
                Err(e) => {
                    // Structural-checker messages already name the
                    // opcode (§4.A3); report them verbatim.
                    if !sink.report(Diagnostic::error(e)) {
                        return false;
                    }
                    continue;
                }
            }

            let mut ctx = VerifyCtx {
                externs,
                functions,
                function,
                block,
                instr,
                diag_sink: sink,
            };
            if run_strategy(&mut ctx, &mut env).is_err() && ctx.diag_sink.has_error() {
                return false;
            }
        }

        if let Some(term) = block.terminator() {
            for target in &term.targets {
                if let Some(target_block) = function.block(&target.label) {
                    for (arg, param) in target.args.iter().zip(&target_block.params) {
                        match env.value_type(arg) {
                            Ok(ty) if ty == param.ty => {}
                            Ok(ty) => {
                                if !sink.report(Diagnostic::error(format!(
                                    "block '{}': branch argument to '{}' has type {}, expected {}",
                                    block.label, target.label, ty, param.ty
                                ))) {
                                    return false;
                                }
                            }
                            Err(e) => {
                                if !sink.report(Diagnostic::error(format!(
                                    "block '{}': branch argument to '{}': {e}",
                                    block.label, target.label
                                ))) {
                                    return false;
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    true
}

/// §4.A6/§4.A7 item 3: every block named as an `eh.push` target must
/// be a validated handler block — params `(%err: Error, %tok:
/// ResumeTok)` named exactly `err`/`tok`, with `eh.entry` as its
/// first instruction.
fn check_handler_blocks(function: &Function, sink: &mut dyn DiagSink) -> bool {
    let block_index = function.block_index();
    let mut referenced: Vec<&str> = Vec::new();
    for block in &function.blocks {
        for instr in &block.instrs {
            if instr.opcode == Opcode::EhPush {
                if let Some(label) = instr.handler.as_deref() {
                    if !referenced.contains(&label) {
                        referenced.push(label);
                    }
                }
            }
        }
    }
    referenced.sort_unstable();

    for label in referenced {
        // An `eh.push` to an undefined label is reported by the
        // balanced-stack dataflow (`eh::check_function`); nothing
        // further to validate here.
        let Some(&block_id) = block_index.get(label) else { continue };
        let block = &function.blocks[block_id];

        let params_ok = block.params.len() == 2
            && block.params[0].name.as_deref() == Some("err")
            && block.params[0].ty == Type::Error
            && block.params[1].name.as_deref() == Some("tok")
            && block.params[1].ty == Type::ResumeTok;
        if !params_ok {
            if !sink.report(Diagnostic::error(format!(
                "block '{label}': handler block must declare parameters (%err: error, %tok: resume_tok) named exactly 'err' and 'tok'"
            ))) {
                return false;
            }
        }

        let entry_first = matches!(block.instrs.first().map(|i| i.opcode), Some(Opcode::EhEntry));
        if !entry_first {
            if !sink.report(Diagnostic::error(format!(
                "block '{label}': handler block must begin with eh.entry"
            ))) {
                return false;
            }
        }
    }
    true
}
