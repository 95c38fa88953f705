//! Structural, type, control-flow and exception-handling verifier for
//! a typed SSA intermediate language.
//!
//! The public surface is [`pipeline::verify`]: feed it a [`ir::Module`]
//! and get back `Ok(())` or the first [`diagnostic::Diagnostic`] that
//! failed. Callers that want every diagnostic, warnings included, can
//! drive [`pipeline::verify_with_sink`] with their own
//! [`diagnostic::DiagSink`].

pub mod builder;
pub mod cfg;
pub mod diagnostic;
pub mod dom;
pub mod eh;
pub mod env;
pub mod ir;
pub mod opcode;
pub mod pipeline;
pub mod strategy;
pub mod structural;
pub mod types;

pub use diagnostic::{Diagnostic, DiagSink, ErrorCode, Severity};
pub use ir::Module;
pub use pipeline::{verify, verify_with_sink};

/// Toggles for warning-vs-error policy a caller can set before
/// verifying (§1: configuration is in-memory only, no file/env
/// reading). Shaped like the teacher's own
/// `AlgoConfig::new(is_client)` constructor pattern.
#[derive(Debug, Clone, Copy)]
pub struct VerifyOptions {
    /// Treat warnings as errors (fail-fast on the first warning too).
    pub warnings_as_errors: bool,
}

impl VerifyOptions {
    pub fn new() -> Self {
        VerifyOptions {
            warnings_as_errors: false,
        }
    }
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) fn init_test_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}
