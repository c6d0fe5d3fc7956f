//! LLVM-facing stages.
//!
//! Each submodule wraps one step of the harness around inkwell:
//!
//! - [`target`] - native target registration and the host target machine
//! - [`loader`] - reading bitcode or textual IR into a module
//! - [`pipeline`] - the module/function/module optimization schedule
//! - [`engine`] - the MCJIT engine and the background compile
//! - [`probe`] - resolving and calling native symbols
//!
//! # Example
//! ```ignore
//! use inkwell::context::Context;
//! use jitprobe::llvm::{loader, target, JitEngine, Pipeline, SymbolProber};
//! use jitprobe::core::{ProbeConfig, WaitStrategy};
//!
//! let context = Context::create();
//! let module = loader::load_module(&context, "sqlite.bc".as_ref())?;
//! let machine = target::host_target_machine(OptimizationLevel::Default)?;
//! let engine = JitEngine::create(&module, OptimizationLevel::Default)?;
//! engine.compile(&Pipeline::default(), &machine, WaitStrategy::Join)?;
//! SymbolProber::new(&engine)?.probe_database(&ProbeConfig::default())?;
//! ```

pub mod engine;
pub mod loader;
pub mod pipeline;
pub mod probe;
pub mod target;

pub use engine::{JitEngine, WORKER_THREAD_NAME};
pub use loader::{load_module, parse_module};
pub use pipeline::{is_declaration, Pipeline, DEFAULT_PRELUDE};
pub use probe::{CloseFn, OpenFn, SymbolProber, UnaryI32Fn};
