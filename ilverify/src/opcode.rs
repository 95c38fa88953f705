//! Opcode schema tables (§4.A1).
//!
//! The schema is the single source of truth for structural checking:
//! every rule enforced by [`crate::structural`] is derived from the
//! [`OpSpec`] of the instruction's opcode. No opcode-specific `match`
//! should appear outside this module and [`crate::strategy`].

use std::fmt;

use crate::types::Type;

/// How many results an instruction of this opcode may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultArity {
    None,
    One,
    Optional,
}

/// The expected kind of a result or operand slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Void,
    I1,
    I16,
    I32,
    I64,
    F32,
    F64,
    Ptr,
    Str,
    Error,
    ResumeTok,
    /// Must equal the instruction's own declared type.
    InstrType,
    /// Unconstrained.
    Any,
    /// Deferred to the per-opcode strategy.
    Dynamic,
}

impl TypeClass {
    pub fn concrete(self) -> Option<Type> {
        match self {
            TypeClass::Void => Some(Type::Void),
            TypeClass::I1 => Some(Type::I1),
            TypeClass::I16 => Some(Type::I16),
            TypeClass::I32 => Some(Type::I32),
            TypeClass::I64 => Some(Type::I64),
            TypeClass::F32 => Some(Type::F32),
            TypeClass::F64 => Some(Type::F64),
            TypeClass::Ptr => Some(Type::Ptr),
            TypeClass::Str => Some(Type::Str),
            TypeClass::Error => Some(Type::Error),
            TypeClass::ResumeTok => Some(Type::ResumeTok),
            TypeClass::InstrType | TypeClass::Any | TypeClass::Dynamic => None,
        }
    }
}

/// Sentinel for "variadic" counts (§4.A1).
pub const VARIADIC: u32 = u32::MAX;

/// The per-opcode semantic strategy (§4.A4), dispatched by [`crate::strategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Default,
    Alloca,
    Gep,
    Load,
    Store,
    AddrOf,
    ConstStr,
    ConstNull,
    CallDirect,
    CallIndirect,
    TrapKind,
    TrapErr,
    TrapFromErr,
    IdxChk,
    CastFpToSiRteChk,
    CastFpToUiRteChk,
    CastSiNarrowChk,
    CastUiNarrowChk,
    /// Opcode is deliberately refused; `.1` is the rejection message.
    Reject(&'static str),
}

/// The closed set of opcodes the verifier understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Opcode {
    Iadd,
    Isub,
    Imul,
    IaddOvf,
    IcmpEq,
    Alloca,
    Gep,
    Load,
    Store,
    AddrOf,
    ConstStr,
    ConstNull,
    Call,
    CallIndirect,
    TrapKind,
    TrapErr,
    TrapFromErr,
    IdxChk,
    CastFpToSiRte,
    CastFpToUiRte,
    CastSiNarrow,
    CastUiNarrow,
    Br,
    Cbr,
    SwitchI32,
    Ret,
    EhPush,
    EhPop,
    EhEntry,
    ResumeSame,
    ResumeNext,
    ResumeLabel,
    /// A deliberately-refused legacy opcode, kept only to exercise the
    /// `Reject` strategy path.
    LegacyVaArg,
}

/// Static metadata for one opcode (§4.A1).
pub struct OpSpec {
    pub result_arity: ResultArity,
    pub result_type_class: TypeClass,
    pub num_operands_min: u32,
    pub num_operands_max: u32,
    pub operand_type_classes: &'static [TypeClass],
    pub num_successors: u32,
    pub has_side_effects: bool,
    pub is_terminator: bool,
    pub strategy: Strategy,
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Iadd => "iadd",
            Isub => "isub",
            Imul => "imul",
            IaddOvf => "iadd.ovf",
            IcmpEq => "icmp.eq",
            Alloca => "alloca",
            Gep => "gep",
            Load => "load",
            Store => "store",
            AddrOf => "addrof",
            ConstStr => "const.str",
            ConstNull => "const.null",
            Call => "call",
            CallIndirect => "calli",
            TrapKind => "trap.kind",
            TrapErr => "trap.err",
            TrapFromErr => "trap.from_err",
            IdxChk => "idx.chk",
            CastFpToSiRte => "cast.fp_to_si.rte",
            CastFpToUiRte => "cast.fp_to_ui.rte",
            CastSiNarrow => "cast.si.narrow",
            CastUiNarrow => "cast.ui.narrow",
            Br => "br",
            Cbr => "cbr",
            SwitchI32 => "switch.i32",
            Ret => "ret",
            EhPush => "eh.push",
            EhPop => "eh.pop",
            EhEntry => "eh.entry",
            ResumeSame => "resume.same",
            ResumeNext => "resume.next",
            ResumeLabel => "resume.label",
            LegacyVaArg => "legacy.va_arg",
        }
    }

    pub fn spec(self) -> &'static OpSpec {
        use Opcode::*;
        use ResultArity::*;
        use Strategy::*;
        use TypeClass::*;

        static ARITH2: [TypeClass; 2] = [InstrType, InstrType];
        static NONE: [TypeClass; 0] = [];

        // A `match` returning a `'static` borrow would need one table
        // per branch; using a thread-local-free static array indexed
        // by discriminant keeps this branch-free at the call site
        // while still reading as a table, matching design note §9's
        // array-of-entries recommendation.
        match self {
            Iadd | Isub | Imul => leak(OpSpec {
                result_arity: One,
                result_type_class: InstrType,
                num_operands_min: 2,
                num_operands_max: 2,
                operand_type_classes: &ARITH2,
                num_successors: 0,
                has_side_effects: false,
                is_terminator: false,
                strategy: Default,
            }),
            IaddOvf => leak(OpSpec {
                result_arity: One,
                result_type_class: InstrType,
                num_operands_min: 2,
                num_operands_max: 2,
                operand_type_classes: &ARITH2,
                num_successors: 0,
                has_side_effects: false,
                is_terminator: false,
                strategy: Default,
            }),
            IcmpEq => leak(OpSpec {
                result_arity: One,
                result_type_class: I1,
                num_operands_min: 2,
                num_operands_max: 2,
                operand_type_classes: &ARITH2,
                num_successors: 0,
                has_side_effects: false,
                is_terminator: false,
                strategy: Default,
            }),
            Alloca => leak(OpSpec {
                result_arity: One,
                result_type_class: Ptr,
                num_operands_min: 1,
                num_operands_max: 1,
                operand_type_classes: leak_slice(&[I64]),
                num_successors: 0,
                has_side_effects: true,
                is_terminator: false,
                strategy: Strategy::Alloca,
            }),
            Gep => leak(OpSpec {
                result_arity: One,
                result_type_class: Ptr,
                num_operands_min: 2,
                num_operands_max: VARIADIC,
                operand_type_classes: leak_slice(&[Ptr, Any]),
                num_successors: 0,
                has_side_effects: false,
                is_terminator: false,
                strategy: Strategy::Gep,
            }),
            Load => leak(OpSpec {
                result_arity: One,
                result_type_class: InstrType,
                num_operands_min: 1,
                num_operands_max: 1,
                operand_type_classes: leak_slice(&[Ptr]),
                num_successors: 0,
                has_side_effects: true,
                is_terminator: false,
                strategy: Strategy::Load,
            }),
            Store => leak(OpSpec {
                result_arity: None,
                result_type_class: Void,
                num_operands_min: 2,
                num_operands_max: 2,
                operand_type_classes: leak_slice(&[Ptr, Dynamic]),
                num_successors: 0,
                has_side_effects: true,
                is_terminator: false,
                strategy: Strategy::Store,
            }),
            AddrOf => leak(OpSpec {
                result_arity: One,
                result_type_class: Ptr,
                num_operands_min: 1,
                num_operands_max: 1,
                operand_type_classes: leak_slice(&[Dynamic]),
                num_successors: 0,
                has_side_effects: false,
                is_terminator: false,
                strategy: Strategy::AddrOf,
            }),
            ConstStr => leak(OpSpec {
                result_arity: One,
                result_type_class: Str,
                num_operands_min: 1,
                num_operands_max: 1,
                operand_type_classes: leak_slice(&[Dynamic]),
                num_successors: 0,
                has_side_effects: false,
                is_terminator: false,
                strategy: Strategy::ConstStr,
            }),
            ConstNull => leak(OpSpec {
                result_arity: One,
                result_type_class: InstrType,
                num_operands_min: 0,
                num_operands_max: 0,
                operand_type_classes: &NONE,
                num_successors: 0,
                has_side_effects: false,
                is_terminator: false,
                strategy: Strategy::ConstNull,
            }),
            Call => leak(OpSpec {
                result_arity: Optional,
                result_type_class: Dynamic,
                num_operands_min: 0,
                num_operands_max: VARIADIC,
                operand_type_classes: &[],
                num_successors: 0,
                has_side_effects: true,
                is_terminator: false,
                strategy: Strategy::CallDirect,
            }),
            CallIndirect => leak(OpSpec {
                result_arity: Optional,
                result_type_class: Dynamic,
                num_operands_min: 1,
                num_operands_max: VARIADIC,
                operand_type_classes: &[],
                num_successors: 0,
                has_side_effects: true,
                is_terminator: false,
                strategy: Strategy::CallIndirect,
            }),
            TrapKind => leak(OpSpec {
                result_arity: One,
                result_type_class: I64,
                num_operands_min: 0,
                num_operands_max: 0,
                operand_type_classes: &NONE,
                num_successors: 0,
                has_side_effects: false,
                is_terminator: false,
                strategy: Strategy::TrapKind,
            }),
            TrapErr => leak(OpSpec {
                result_arity: Optional,
                result_type_class: Error,
                num_operands_min: 2,
                num_operands_max: 2,
                operand_type_classes: leak_slice(&[I32, Str]),
                num_successors: 0,
                has_side_effects: true,
                is_terminator: true,
                strategy: Strategy::TrapErr,
            }),
            TrapFromErr => leak(OpSpec {
                result_arity: Optional,
                result_type_class: Error,
                num_operands_min: 1,
                num_operands_max: 1,
                operand_type_classes: leak_slice(&[I32]),
                num_successors: 0,
                has_side_effects: true,
                is_terminator: true,
                strategy: Strategy::TrapFromErr,
            }),
            IdxChk => leak(OpSpec {
                result_arity: Optional,
                result_type_class: InstrType,
                num_operands_min: 3,
                num_operands_max: 3,
                operand_type_classes: leak_slice(&[Dynamic, Dynamic, Dynamic]),
                num_successors: 0,
                has_side_effects: false,
                is_terminator: false,
                strategy: Strategy::IdxChk,
            }),
            CastFpToSiRte => leak(OpSpec {
                result_arity: One,
                result_type_class: InstrType,
                num_operands_min: 1,
                num_operands_max: 1,
                operand_type_classes: leak_slice(&[Dynamic]),
                num_successors: 0,
                has_side_effects: false,
                is_terminator: false,
                strategy: Strategy::CastFpToSiRteChk,
            }),
            CastFpToUiRte => leak(OpSpec {
                result_arity: One,
                result_type_class: InstrType,
                num_operands_min: 1,
                num_operands_max: 1,
                operand_type_classes: leak_slice(&[Dynamic]),
                num_successors: 0,
                has_side_effects: false,
                is_terminator: false,
                strategy: Strategy::CastFpToUiRteChk,
            }),
            CastSiNarrow => leak(OpSpec {
                result_arity: One,
                result_type_class: InstrType,
                num_operands_min: 1,
                num_operands_max: 1,
                operand_type_classes: leak_slice(&[Dynamic]),
                num_successors: 0,
                has_side_effects: false,
                is_terminator: false,
                strategy: Strategy::CastSiNarrowChk,
            }),
            CastUiNarrow => leak(OpSpec {
                result_arity: One,
                result_type_class: InstrType,
                num_operands_min: 1,
                num_operands_max: 1,
                operand_type_classes: leak_slice(&[Dynamic]),
                num_successors: 0,
                has_side_effects: false,
                is_terminator: false,
                strategy: Strategy::CastUiNarrowChk,
            }),
            Br => leak(OpSpec {
                result_arity: None,
                result_type_class: Void,
                num_operands_min: 0,
                num_operands_max: 0,
                operand_type_classes: &NONE,
                num_successors: 1,
                has_side_effects: false,
                is_terminator: true,
                strategy: Default,
            }),
            Cbr => leak(OpSpec {
                result_arity: None,
                result_type_class: Void,
                num_operands_min: 1,
                num_operands_max: 1,
                operand_type_classes: leak_slice(&[I1]),
                num_successors: 2,
                has_side_effects: false,
                is_terminator: true,
                strategy: Default,
            }),
            SwitchI32 => leak(OpSpec {
                result_arity: None,
                result_type_class: Void,
                num_operands_min: 1,
                num_operands_max: 1,
                operand_type_classes: leak_slice(&[I32]),
                num_successors: VARIADIC,
                has_side_effects: false,
                is_terminator: true,
                strategy: Default,
            }),
            Ret => leak(OpSpec {
                result_arity: None,
                result_type_class: Void,
                num_operands_min: 0,
                num_operands_max: 1,
                operand_type_classes: leak_slice(&[InstrType]),
                num_successors: 0,
                has_side_effects: false,
                is_terminator: true,
                strategy: Default,
            }),
            EhPush => leak(OpSpec {
                result_arity: None,
                result_type_class: Void,
                num_operands_min: 0,
                num_operands_max: 0,
                operand_type_classes: &NONE,
                num_successors: 0,
                has_side_effects: false,
                is_terminator: false,
                strategy: Default,
            }),
            EhPop => leak(OpSpec {
                result_arity: None,
                result_type_class: Void,
                num_operands_min: 0,
                num_operands_max: 0,
                operand_type_classes: &NONE,
                num_successors: 0,
                has_side_effects: false,
                is_terminator: false,
                strategy: Default,
            }),
            EhEntry => leak(OpSpec {
                result_arity: One,
                result_type_class: ResumeTok,
                num_operands_min: 0,
                num_operands_max: 0,
                operand_type_classes: &NONE,
                num_successors: 0,
                has_side_effects: false,
                is_terminator: false,
                strategy: Default,
            }),
            ResumeSame | ResumeNext => leak(OpSpec {
                result_arity: None,
                result_type_class: Void,
                num_operands_min: 1,
                num_operands_max: 1,
                operand_type_classes: leak_slice(&[ResumeTok]),
                num_successors: 0,
                has_side_effects: true,
                is_terminator: true,
                strategy: Default,
            }),
            ResumeLabel => leak(OpSpec {
                result_arity: None,
                result_type_class: Void,
                num_operands_min: 1,
                num_operands_max: 1,
                operand_type_classes: leak_slice(&[ResumeTok]),
                num_successors: 1,
                has_side_effects: true,
                is_terminator: true,
                strategy: Default,
            }),
            LegacyVaArg => leak(OpSpec {
                result_arity: Optional,
                result_type_class: Dynamic,
                num_operands_min: 0,
                num_operands_max: VARIADIC,
                operand_type_classes: &[],
                num_successors: 0,
                has_side_effects: true,
                is_terminator: false,
                strategy: Reject("legacy.va_arg is not supported by this verifier"),
            }),
        }
    }
}

// Small helpers so each `OpSpec` literal above can stay inline:
// `leak` hands back a `'static` reference to a one-off struct, and
// `leak_slice` does the same for a fixed-size operand-class array.
// These tables are built once per process and never freed, which is
// fine for a schema that exists for the process lifetime.
fn leak(spec: OpSpec) -> &'static OpSpec {
    Box::leak(Box::new(spec))
}
fn leak_slice(classes: &[TypeClass]) -> &'static [TypeClass] {
    Box::leak(classes.to_vec().into_boxed_slice())
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
