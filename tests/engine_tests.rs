//! Tests for the JIT engine, background compile and symbol prober.

use std::path::{Path, PathBuf};

use inkwell::context::Context;
use inkwell::OptimizationLevel;
use jitprobe::core::{CompileError, EngineState, PipelineConfig, ProbeConfig, ProbeError, WaitStrategy};
use jitprobe::llvm::{load_module, target, JitEngine, Pipeline, SymbolProber};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
    target::initialize_native().unwrap();
}

#[test]
fn test_engine_starts_created() {
    init();
    let context = Context::create();
    let module = load_module(&context, &fixture("fake_sqlite.ll")).unwrap();
    let engine = JitEngine::create(&module, OptimizationLevel::Default).unwrap();

    assert_eq!(engine.state(), EngineState::Created);
    assert_eq!(engine.take_error(), None);

    // Symbols cannot be resolved before the worker finalizes.
    match SymbolProber::new(&engine) {
        Err(ProbeError::NotFinalized { state }) => assert_eq!(state, EngineState::Created),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("prober created before finalization"),
    }
}

#[test]
fn test_module_is_consumed_once() {
    init();
    let context = Context::create();
    let module = load_module(&context, &fixture("fake_sqlite.ll")).unwrap();
    let _engine = JitEngine::create(&module, OptimizationLevel::Default).unwrap();

    assert!(JitEngine::create(&module, OptimizationLevel::Default).is_err());
}

#[test]
fn test_compile_finalizes_and_resolves() {
    init();
    let context = Context::create();
    let module = load_module(&context, &fixture("fake_sqlite.ll")).unwrap();
    let machine = target::host_target_machine(OptimizationLevel::Default).unwrap();
    let engine = JitEngine::create(&module, OptimizationLevel::Default).unwrap();

    let outcome = engine
        .compile(&Pipeline::default(), &machine, WaitStrategy::Join)
        .unwrap();

    assert!(outcome.is_finalized());
    assert_eq!(outcome.polls, None);
    assert_eq!(engine.state(), EngineState::Finalized);

    let report = outcome.worker.unwrap();
    assert_eq!(report.functions_before, 7);
    // @unused_checksum is internal and unreferenced.
    assert!(module.get_function("unused_checksum").is_none());
    assert_eq!(report.declarations_skipped, 2);
    assert_eq!(report.functions_optimized, 4);

    let prober = SymbolProber::new(&engine).unwrap();
    assert!(prober.resolve("sqlite3_open").is_some());
    assert!(prober.resolve("sqlite3_close").is_some());
    assert!(prober.resolve("sqlite3_exec").is_none());

    // Re-checking after finalization never goes backwards.
    for _ in 0..100 {
        assert_eq!(engine.state(), EngineState::Finalized);
    }
}

#[test]
fn test_spin_wait_counts_polls() {
    init();
    let context = Context::create();
    let module = load_module(&context, &fixture("fake_sqlite.ll")).unwrap();
    let machine = target::host_target_machine(OptimizationLevel::Default).unwrap();
    let engine = JitEngine::create(&module, OptimizationLevel::Default).unwrap();

    let outcome = engine
        .compile(&Pipeline::default(), &machine, WaitStrategy::Spin)
        .unwrap();

    assert!(outcome.polls.is_some());
    assert!(outcome.is_finalized());
    assert!(outcome.worker.is_ok());
}

#[test]
fn test_pipeline_failure_still_finalizes() {
    init();
    let context = Context::create();
    let module = load_module(&context, &fixture("fake_sqlite.ll")).unwrap();
    let machine = target::host_target_machine(OptimizationLevel::Default).unwrap();
    let engine = JitEngine::create(&module, OptimizationLevel::Default).unwrap();

    let pipeline = Pipeline::new(PipelineConfig {
        module_passes: Some("no-such-pass".into()),
        ..PipelineConfig::default()
    });
    let outcome = engine
        .compile(&pipeline, &machine, WaitStrategy::Join)
        .unwrap();

    assert!(matches!(outcome.worker, Err(CompileError::Pipeline(_))));
    assert!(outcome.is_finalized());

    let prober = SymbolProber::new(&engine).unwrap();
    assert!(prober.resolve("sqlite3_open").is_some());
}

#[test]
fn test_probe_database_creates_file() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let database = dir.path().join("probe.db");

    let context = Context::create();
    let module = load_module(&context, &fixture("fake_sqlite.ll")).unwrap();
    let machine = target::host_target_machine(OptimizationLevel::Default).unwrap();
    let engine = JitEngine::create(&module, OptimizationLevel::Default).unwrap();
    engine
        .compile(&Pipeline::default(), &machine, WaitStrategy::Join)
        .unwrap();

    let prober = SymbolProber::new(&engine).unwrap();
    let report = prober
        .probe_database(&ProbeConfig {
            database: database.clone(),
            ..ProbeConfig::default()
        })
        .unwrap();

    assert_eq!(report.open_status, 0);
    assert_ne!(report.open_address, 0);
    assert_ne!(report.close_address, 0);
    assert!(database.exists());

    assert_eq!(prober.invoke_i32("foo", 7).unwrap(), 49);
    assert_eq!(prober.invoke_i32("foo", -3).unwrap(), 9);
}

#[test]
fn test_probe_open_failure() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let database = dir.path().join("missing-dir").join("probe.db");

    let context = Context::create();
    let module = load_module(&context, &fixture("fake_sqlite.ll")).unwrap();
    let machine = target::host_target_machine(OptimizationLevel::Default).unwrap();
    let engine = JitEngine::create(&module, OptimizationLevel::Default).unwrap();
    engine
        .compile(&Pipeline::default(), &machine, WaitStrategy::Join)
        .unwrap();

    let err = SymbolProber::new(&engine)
        .unwrap()
        .probe_database(&ProbeConfig {
            database,
            ..ProbeConfig::default()
        })
        .unwrap_err();
    assert!(matches!(err, ProbeError::OpenFailed { status: 14, .. }));
}

#[test]
fn test_missing_symbols_are_typed_errors() {
    init();
    let context = Context::create();
    let module = load_module(&context, &fixture("no_sqlite.ll")).unwrap();
    let machine = target::host_target_machine(OptimizationLevel::Default).unwrap();
    let engine = JitEngine::create(&module, OptimizationLevel::Default).unwrap();
    engine
        .compile(&Pipeline::default(), &machine, WaitStrategy::Join)
        .unwrap();

    let prober = SymbolProber::new(&engine).unwrap();
    let err = prober.probe_database(&ProbeConfig::default()).unwrap_err();
    assert_eq!(
        err,
        ProbeError::SymbolNotFound {
            name: "sqlite3_open".into()
        }
    );
    assert!(matches!(
        prober.invoke_i32("bar", 1),
        Err(ProbeError::SymbolNotFound { .. })
    ));
}

#[cfg(unix)]
#[test]
fn test_probe_database_keeps_raw_path_bytes() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    init();
    let dir = tempfile::tempdir().unwrap();
    let database = dir.path().join(OsStr::from_bytes(b"probe-\xff.db"));

    let context = Context::create();
    let module = load_module(&context, &fixture("fake_sqlite.ll")).unwrap();
    let machine = target::host_target_machine(OptimizationLevel::Default).unwrap();
    let engine = JitEngine::create(&module, OptimizationLevel::Default).unwrap();
    engine
        .compile(&Pipeline::default(), &machine, WaitStrategy::Join)
        .unwrap();

    SymbolProber::new(&engine)
        .unwrap()
        .probe_database(&ProbeConfig {
            database: database.clone(),
            ..ProbeConfig::default()
        })
        .unwrap();

    assert!(database.exists());
    assert!(!dir.path().join("probe-\u{fffd}.db").exists());
}

#[test]
fn test_second_compile_is_rejected() {
    init();
    let context = Context::create();
    let module = load_module(&context, &fixture("fake_sqlite.ll")).unwrap();
    let machine = target::host_target_machine(OptimizationLevel::Default).unwrap();
    let engine = JitEngine::create(&module, OptimizationLevel::Default).unwrap();

    engine
        .compile(&Pipeline::default(), &machine, WaitStrategy::Join)
        .unwrap();
    let err = engine
        .compile(&Pipeline::default(), &machine, WaitStrategy::Join)
        .unwrap_err();

    assert!(matches!(
        err,
        CompileError::AlreadyStarted {
            state: EngineState::Finalized
        }
    ));
    assert_eq!(engine.state(), EngineState::Finalized);
    assert!(SymbolProber::new(&engine)
        .unwrap()
        .resolve("sqlite3_open")
        .is_some());
}
