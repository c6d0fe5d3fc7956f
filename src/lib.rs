//! jitprobe - load, optimize, JIT and probe an LLVM module.
//!
//! The harness loads an LLVM IR module, runs a module/function/module
//! optimization schedule over it on a worker thread, finalizes it with MCJIT
//! and then calls `sqlite3_open`/`sqlite3_close` out of the compiled code.
//!
//! # Primary Usage
//!
//! ```ignore
//! use jitprobe::{Harness, HarnessConfig};
//!
//! let harness = Harness::new(HarnessConfig::new("sqlite3.bc"));
//! let stats = harness.run(&mut std::io::stdout())?;
//! println!("{}", stats);
//! ```
//!
//! # Architecture
//!
//! - [`core`] - configuration, errors, engine state, reports
//! - [`llvm`] - target setup, loader, pipeline, engine, prober
//! - [`harness`] - the stage-by-stage orchestration

pub mod core;
pub mod harness;
pub mod llvm;

pub use self::core::{
    // Configuration
    HarnessConfig, InvokeConfig, OptPreset, PipelineConfig, ProbeConfig, WaitStrategy,
    // Errors
    CompileError, EngineError, HarnessError, HarnessResult, LoadError, PipelineError,
    ProbeError, TargetError,
    // State and reports
    EngineState, StateTracker, CompileOutcome, PipelineReport, ProbeReport, SessionStats,
};
pub use harness::{run_to_string, Harness};
pub use llvm::{JitEngine, Pipeline, SymbolProber};
