use halcyon_ide::config::SandboxConfig;
use halcyon_ide::{Artifact, Console, CrashKind, Sandbox};
use wasm_encoder::{Instruction, MemArg};

use super::{Program, print};

fn run(program: Program) -> (Result<usize, CrashKind>, Vec<String>) {
    run_with(&SandboxConfig::default(), program)
}

fn run_with(config: &SandboxConfig, program: Program) -> (Result<usize, CrashKind>, Vec<String>) {
    let sandbox = Sandbox::new(config);
    let console = Console::new();
    let result = sandbox
        .execute(&Artifact::from(program.build()), &console)
        .map(|summary| summary.lines_written)
        .map_err(|crash| crash.kind());
    (result, console.lines())
}

#[test]
fn test_print_splits_lines_and_skips_empty_ones() {
    let (result, lines) = run(Program::printing("one\n\ntwo\nthree"));
    assert_eq!(result, Ok(3));
    assert_eq!(lines, vec!["one", "two", "three"]);
}

#[test]
fn test_empty_print_writes_nothing() {
    let program = Program::new().start(print(0, 0));
    let (result, lines) = run(program);
    assert_eq!(result, Ok(0));
    assert!(lines.is_empty());
}

#[test]
fn test_invalid_utf8_is_replaced() {
    let program = Program::new().data(0, b"ok \xff\n").start(print(0, 5));
    let (result, lines) = run(program);
    assert_eq!(result, Ok(1));
    assert_eq!(lines, vec!["ok \u{fffd}"]);
}

#[test]
fn test_range_ending_at_memory_end_is_valid() {
    let program = Program::new()
        .data(65532, b"end\n")
        .start(print(65532, 4));
    let (result, lines) = run(program);
    assert_eq!(result, Ok(1));
    assert_eq!(lines, vec!["end"]);
}

#[test]
fn test_range_one_past_memory_end_crashes() {
    let program = Program::new().start(print(65533, 4));
    let (result, _) = run(program);
    assert_eq!(result, Err(CrashKind::MemoryAccess));
}

#[test]
fn test_negative_offset_is_out_of_bounds() {
    let program = Program::new().start(print(-1, 1));
    let (result, _) = run(program);
    assert_eq!(result, Err(CrashKind::MemoryAccess));
}

#[test]
fn test_huge_length_is_out_of_bounds() {
    let program = Program::new().start(print(8, i64::MAX));
    let (result, _) = run(program);
    assert_eq!(result, Err(CrashKind::MemoryAccess));
}

#[test]
fn test_zero_page_memory_gets_one_page() {
    let program = Program::new()
        .memory_pages(0, None)
        .data(0, b"hi\n")
        .start(print(0, 3));
    let (result, lines) = run(program);
    assert_eq!(result, Ok(1));
    assert_eq!(lines, vec!["hi"]);
}

#[test]
fn test_memory_capped_at_zero_pages_fails_to_link() {
    let program = Program::new()
        .memory_pages(0, Some(0))
        .start(print(0, 1));
    let (result, lines) = run(program);
    assert_eq!(result, Err(CrashKind::Link));
    assert!(lines.is_empty());
}

#[test]
fn test_missing_memory_import_fails_to_link() {
    let program = Program::new().without_memory();
    let (result, _) = run(program);
    assert_eq!(result, Err(CrashKind::Link));
}

#[test]
fn test_unknown_import_fails_to_link() {
    let program = Program::new().import_function("read_line");
    let (result, lines) = run(program);
    assert_eq!(result, Err(CrashKind::Link));
    assert!(lines.is_empty());
}

#[test]
fn test_program_without_print_import_runs() {
    let program = Program::new()
        .without_print()
        .start(vec![Instruction::Nop]);
    let (result, _) = run(program);
    assert_eq!(result, Ok(0));
}

#[test]
fn test_garbage_bytes_are_invalid() {
    let sandbox = Sandbox::new(&SandboxConfig::default());
    let crash = sandbox
        .execute(&Artifact::from(b"\0asm but not really".to_vec()), &Console::new())
        .unwrap_err();
    assert_eq!(crash.kind(), CrashKind::InvalidArtifact);
}

#[test]
fn test_custom_namespace() {
    let config = SandboxConfig {
        namespace: "host".to_owned(),
        ..Default::default()
    };
    let (result, lines) = run_with(&config, Program::printing("hi\n").namespace("host"));
    assert_eq!(result, Ok(1));
    assert_eq!(lines, vec!["hi"]);
}

#[test]
fn test_namespace_mismatch_fails_to_link() {
    let (result, _) = run(Program::printing("hi\n").namespace("env"));
    assert_eq!(result, Err(CrashKind::Link));
}

#[test]
fn test_entry_point_is_called_after_start() {
    let config = SandboxConfig {
        entry_point: Some("main".to_owned()),
        ..Default::default()
    };
    let program = Program::new()
        .data(0, b"start\nmain\n")
        .start(print(0, 6))
        .export("main", print(6, 5));
    let (result, lines) = run_with(&config, program);
    assert_eq!(result, Ok(2));
    assert_eq!(lines, vec!["start", "main"]);
}

#[test]
fn test_missing_entry_point() {
    let config = SandboxConfig {
        entry_point: Some("main".to_owned()),
        ..Default::default()
    };
    let (result, lines) = run_with(&config, Program::printing("start\n"));
    assert_eq!(result, Err(CrashKind::MissingEntry));
    // The start function already ran
    assert_eq!(lines, vec!["start"]);
}

#[test]
fn test_entry_point_with_wrong_signature() {
    let config = SandboxConfig {
        entry_point: Some("main".to_owned()),
        ..Default::default()
    };
    let program = Program::new().export_returning_i32("main");
    let (result, _) = run_with(&config, program);
    assert_eq!(result, Err(CrashKind::MissingEntry));
}

#[test]
fn test_trap_in_entry_point() {
    let config = SandboxConfig {
        entry_point: Some("main".to_owned()),
        ..Default::default()
    };
    let program = Program::new().export("main", vec![Instruction::Unreachable]);
    let (result, _) = run_with(&config, program);
    assert_eq!(result, Err(CrashKind::Trap));
}

#[test]
fn test_runs_do_not_share_memory() {
    // Prints "A" and then overwrites it in memory
    let mut body = print(0, 2);
    body.extend([
        Instruction::I32Const(0),
        Instruction::I32Const(i32::from(b'X')),
        Instruction::I32Store8(MemArg {
            offset: 0,
            align: 0,
            memory_index: 0,
        }),
    ]);
    let artifact = Artifact::from(Program::new().data(0, b"A\n").start(body).build());
    let sandbox = Sandbox::new(&SandboxConfig::default());

    for _ in 0..2 {
        let console = Console::new();
        sandbox.execute(&artifact, &console).unwrap();
        assert_eq!(console.lines(), vec!["A"]);
    }
}
