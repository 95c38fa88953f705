//! End-to-end verifier scenarios (§8): one malformed module per
//! invariant, asserting the diagnostic a caller would actually see.

use ilverify::builder::{BlockBuilder, FunctionBuilder, InstrBuilder, ModuleBuilder};
use ilverify::opcode::Opcode;
use ilverify::types::{Type, Value};
use ilverify::{verify, ErrorCode};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn rejects_wrong_operand_count() {
    init();
    let func = FunctionBuilder::new("f", vec![Type::I32, Type::I32], Type::I32)
        .block(
            BlockBuilder::new("entry")
                .instr(
                    InstrBuilder::new(Opcode::Iadd)
                        .result(2)
                        .ty(Type::I32)
                        .operand(Value::Temp(0))
                        .build(),
                )
                .instr(
                    InstrBuilder::new(Opcode::Ret)
                        .ty(Type::I32)
                        .operand(Value::Temp(2))
                        .build(),
                )
                .build(),
        )
        .build();
    let module = ModuleBuilder::new().function(func).build();

    let err = verify(&module).expect_err("expected a verification failure");
    assert!(
        err.message.contains("invalid operand count: expected 2 operand(s), found 1"),
        "unexpected message: {}",
        err.message
    );
}

#[test]
fn rejects_duplicate_block_labels() {
    init();
    let ret = InstrBuilder::new(Opcode::Ret).build();
    let func = FunctionBuilder::new("f", vec![], Type::Void)
        .block(BlockBuilder::new("entry").instr(ret.clone()).build())
        .block(BlockBuilder::new("entry").instr(ret).build())
        .build();
    let module = ModuleBuilder::new().function(func).build();

    let err = verify(&module).expect_err("expected a verification failure");
    assert!(err.message.contains("duplicate block label 'entry'"));
}

#[test]
fn rejects_missing_entry_block() {
    init();
    let func = FunctionBuilder::new("f", vec![], Type::Void)
        .block(BlockBuilder::new("start").instr(InstrBuilder::new(Opcode::Ret).build()).build())
        .build();
    let module = ModuleBuilder::new().function(func).build();

    let err = verify(&module).expect_err("expected a verification failure");
    assert!(err.message.contains("no entry block"));
}

#[test]
fn rejects_branch_argument_arity_mismatch() {
    init();
    let func = FunctionBuilder::new("f", vec![], Type::Void)
        .block(
            BlockBuilder::new("entry")
                .instr(InstrBuilder::new(Opcode::Br).target("next", vec![]).build())
                .build(),
        )
        .block(
            BlockBuilder::new("next")
                .param(0, Type::I32)
                .instr(InstrBuilder::new(Opcode::Ret).build())
                .build(),
        )
        .build();
    let module = ModuleBuilder::new().function(func).build();

    let err = verify(&module).expect_err("expected a verification failure");
    assert!(
        err.message.contains("supplies 0 argument(s), target expects 1"),
        "unexpected message: {}",
        err.message
    );
}

#[test]
fn rejects_unbalanced_handler_stack_on_return() {
    init();
    let func = FunctionBuilder::new("f", vec![], Type::Void)
        .block(
            BlockBuilder::new("entry")
                .instr(InstrBuilder::new(Opcode::EhPush).handler("handler").build())
                .instr(InstrBuilder::new(Opcode::Ret).build())
                .build(),
        )
        .block(
            BlockBuilder::new("handler")
                .param_named(50, "err", Type::Error)
                .param_named(51, "tok", Type::ResumeTok)
                .instr(InstrBuilder::new(Opcode::EhEntry).result(0).build())
                .instr(
                    InstrBuilder::new(Opcode::ResumeSame)
                        .operand(Value::Temp(0))
                        .build(),
                )
                .build(),
        )
        .build();
    let module = ModuleBuilder::new().function(func).build();

    let err = verify(&module).expect_err("expected a verification failure");
    assert_eq!(err.code, Some(ErrorCode::EhStackLeak));
}

#[test]
fn accepts_try_catch_shaped_function_with_trap_only_handler() {
    init();
    // entry pushes "handler" then unwinds straight into it via
    // `trap.from_err`; "handler" is reachable only through that
    // exception edge, never through an ordinary branch.
    let func = FunctionBuilder::new("f", vec![Type::I32], Type::Void)
        .block(
            BlockBuilder::new("entry")
                .instr(InstrBuilder::new(Opcode::EhPush).handler("handler").build())
                .instr(
                    InstrBuilder::new(Opcode::TrapFromErr)
                        .operand(Value::Temp(0))
                        .build(),
                )
                .build(),
        )
        .block(
            BlockBuilder::new("handler")
                .param_named(50, "err", Type::Error)
                .param_named(51, "tok", Type::ResumeTok)
                .instr(InstrBuilder::new(Opcode::EhEntry).result(1).build())
                .instr(
                    InstrBuilder::new(Opcode::ResumeSame)
                        .operand(Value::Temp(1))
                        .build(),
                )
                .build(),
        )
        .build();
    let module = ModuleBuilder::new().function(func).build();

    assert!(verify(&module).is_ok());
}
