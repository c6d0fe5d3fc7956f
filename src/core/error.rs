// This module defines the error types for jitprobe using the thiserror crate. Each stage of
// the harness has its own enum: LoadError for reading and parsing the input module,
// TargetError for host target setup, PipelineError for running optimization passes,
// EngineError for creating the MCJIT execution engine, CompileError for the worker thread
// that optimizes and finalizes code, and ProbeError for resolving and calling native
// symbols. HarnessError wraps them all so library callers can propagate with `?`, while
// the binary matches on the concrete variant to decide whether a failure aborts, exits
// with an error code, or is only reported.

//! Error types for the jitprobe harness.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to read or parse the input module.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{}: No such file or directory", path.display())]
    Missing { path: PathBuf },

    #[error("{}: {diagnostic}", path.display())]
    Read { path: PathBuf, diagnostic: String },

    #[error("{}: {diagnostic}", path.display())]
    Parse { path: PathBuf, diagnostic: String },
}

impl LoadError {
    /// The path that failed to load.
    pub fn path(&self) -> &std::path::Path {
        match self {
            LoadError::Missing { path }
            | LoadError::Read { path, .. }
            | LoadError::Parse { path, .. } => path,
        }
    }
}

/// Failure to set up the host target.
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("Native target initialization failed: {0}")]
    Initialize(String),

    #[error("No target for triple {triple}: {reason}")]
    UnknownTriple { triple: String, reason: String },

    #[error("Could not create a target machine for {triple}")]
    MachineCreation { triple: String },
}

/// Failure while running an optimization phase.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Pass pipeline '{pipeline}' failed in {phase} phase: {reason}")]
    Passes {
        phase: &'static str,
        pipeline: String,
        reason: String,
    },

    #[error("Module failed verification: {reason}")]
    Verification { reason: String },
}

/// Failure to create the execution engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Execution engine creation failed: {reason}")]
    Creation { reason: String },
}

/// Failure of the background compile.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Error while creating a thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Error while joining with a thread: {reason}")]
    Join { reason: String },

    #[error("Compilation already started, engine is {state}")]
    AlreadyStarted { state: crate::core::EngineState },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Failure to resolve or call a native symbol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Symbol not found: {name}")]
    SymbolNotFound { name: String },

    #[error("Engine is {state}, symbols can only be resolved once finalized")]
    NotFinalized { state: crate::core::EngineState },

    #[error("Invalid symbol or path name {name:?}: contains an interior NUL byte")]
    InvalidName { name: String },

    #[error("Error opening DB {path}: status {status}")]
    OpenFailed { path: String, status: i32 },
}

/// Any error produced by the harness.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("Failed to write status output: {0}")]
    Output(#[from] std::io::Error),
}

impl HarnessError {
    /// Whether the binary must abort the process on this error.
    ///
    /// Module parse failures, worker launch failures and a failed database
    /// open abort; everything else exits with a status code.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HarnessError::Load(_)
                | HarnessError::Compile(CompileError::Spawn(_))
                | HarnessError::Probe(ProbeError::OpenFailed { .. })
        )
    }
}

/// Result type alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;
