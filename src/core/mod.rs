// This module gathers the pieces of jitprobe that do not talk to LLVM directly: the run
// configuration (input path, optimization preset, wait strategy, probe names), the typed
// errors for every stage, the advance-only engine state shared between the orchestrator
// and the compile worker, and the reports and statistics each stage produces.

//! Shared harness infrastructure.
//!
//! # Key Components
//!
//! - `config` - [`HarnessConfig`] and its parts
//! - `error` - one `thiserror` enum per stage plus [`HarnessError`]
//! - `state` - [`EngineState`] and the [`StateTracker`] shared with the worker
//! - `session` - stage reports and [`SessionStats`]

pub mod config;
pub mod error;
pub mod session;
pub mod state;

pub use config::{
    HarnessConfig,
    InvokeConfig,
    OptPreset,
    PipelineConfig,
    ProbeConfig,
    WaitStrategy,
};

pub use error::{
    CompileError,
    EngineError,
    HarnessError,
    HarnessResult,
    LoadError,
    PipelineError,
    ProbeError,
    TargetError,
};

pub use session::{
    format_elapsed,
    CompileOutcome,
    PipelineReport,
    ProbeReport,
    SessionStats,
};

pub use state::{EngineState, InvalidTransition, StateTracker};
