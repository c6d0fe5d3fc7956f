// This module owns the MCJIT execution engine and the asynchronous compile stage. JitEngine
// wraps inkwell's ExecutionEngine together with the module it was created from, the
// advance-only state tracker and the instant the engine was created. compile() runs the
// optimization schedule and code finalization on one named worker thread inside a thread
// scope, so the worker's parameter bundle is reclaimed when the scope ends. It may be
// called once: a second call, or a worker that finds the engine already past Created, is
// rejected before any pass runs. Finalization looks up the first exported definition,
// which makes MCJIT emit and finalize every pending object without running the module's
// static constructors. The orchestrator waits according to the configured WaitStrategy: a
// blocking join, a tight spin over is_finished that counts polls, or a sleeping poll. After
// the join it reads the engine's stored error message through llvm-sys, since inkwell does
// not expose LLVMExecutionEngineGetErrMsg.

//! MCJIT engine and background compilation.

use std::any::Any;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr;
use std::thread::{self, ScopedJoinHandle};
use std::time::Instant;

use inkwell::execution_engine::ExecutionEngine;
use inkwell::module::{Linkage, Module};
use inkwell::targets::TargetMachine;
use inkwell::OptimizationLevel;

use super::pipeline::{is_declaration, Pipeline};
use crate::core::config::WaitStrategy;
use crate::core::error::{CompileError, EngineError};
use crate::core::session::{CompileOutcome, PipelineReport};
use crate::core::state::{EngineState, StateTracker};

/// Name of the compile worker thread.
pub const WORKER_THREAD_NAME: &str = "jitprobe-compile";

/// An MCJIT execution engine plus its lifecycle state.
pub struct JitEngine<'m, 'ctx> {
    engine: ExecutionEngine<'ctx>,
    module: &'m Module<'ctx>,
    state: StateTracker,
    created_at: Instant,
}

impl<'m, 'ctx> JitEngine<'m, 'ctx> {
    /// Hand `module` to a new JIT engine. The engine owns the module from here on
    /// and keeps the borrow for optimization and inspection.
    pub fn create(module: &'m Module<'ctx>, level: OptimizationLevel) -> Result<Self, EngineError> {
        let created_at = Instant::now();
        let engine = module
            .create_jit_execution_engine(level)
            .map_err(|e| EngineError::Creation {
                reason: e.to_string(),
            })?;

        log::info!("Created JIT execution engine ({:?})", level);
        Ok(Self {
            engine,
            module,
            state: StateTracker::new(),
            created_at,
        })
    }

    pub fn execution_engine(&self) -> &ExecutionEngine<'ctx> {
        &self.engine
    }

    /// The module this engine compiles.
    pub fn module(&self) -> &'m Module<'ctx> {
        self.module
    }

    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    /// Take the engine's stored error message, clearing it.
    pub fn take_error(&self) -> Option<String> {
        let mut message: *mut c_char = ptr::null_mut();
        // SAFETY: the engine pointer is valid for the lifetime of `self`, and LLVM
        // only writes `message` when it reports an error.
        let has_error = unsafe {
            llvm_sys::execution_engine::LLVMExecutionEngineGetErrMsg(
                self.engine.as_mut_ptr(),
                &mut message,
            )
        } != 0;

        if !has_error || message.is_null() {
            return None;
        }

        // SAFETY: LLVM returned a NUL-terminated string that we now own.
        let text = unsafe { CStr::from_ptr(message) }
            .to_string_lossy()
            .into_owned();
        unsafe { llvm_sys::core::LLVMDisposeMessage(message) };

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Optimize the engine's module and finalize machine code on a worker
    /// thread, waiting for it according to `wait`.
    ///
    /// Fails with [`CompileError::AlreadyStarted`] unless the engine is still
    /// `Created`, and with [`CompileError::Spawn`] if the worker cannot be
    /// launched. Join failures and optimization failures are carried in
    /// [`CompileOutcome::worker`].
    pub fn compile(
        &self,
        pipeline: &Pipeline,
        machine: &TargetMachine,
        wait: WaitStrategy,
    ) -> Result<CompileOutcome, CompileError> {
        let state = self.state.get();
        if state != EngineState::Created {
            return Err(CompileError::AlreadyStarted { state });
        }

        let job = CompileJob {
            engine: &self.engine,
            module: self.module,
            pipeline,
            machine,
            state: &self.state,
        };

        let (worker, polls) = thread::scope(|scope| {
            let handle = thread::Builder::new()
                .name(WORKER_THREAD_NAME.to_string())
                .spawn_scoped(scope, move || job.run())
                .map_err(CompileError::Spawn)?;

            let polls = wait_for(&handle, wait);
            let worker = match handle.join() {
                Ok(result) => result,
                Err(panic) => Err(CompileError::Join {
                    reason: panic_message(panic.as_ref()),
                }),
            };
            Ok::<_, CompileError>((worker, polls))
        })?;

        let elapsed = self.created_at.elapsed();
        let state = self.state.get();
        if let Err(e) = &worker {
            log::warn!("Compile worker reported: {}", e);
        }
        log::info!("Compilation finished in {:?} ({})", elapsed, state);

        Ok(CompileOutcome {
            elapsed,
            polls,
            worker,
            engine_error: self.take_error(),
            state,
        })
    }
}

/// Everything the worker borrows for one compile.
struct CompileJob<'a, 'ctx> {
    engine: &'a ExecutionEngine<'ctx>,
    module: &'a Module<'ctx>,
    pipeline: &'a Pipeline,
    machine: &'a TargetMachine,
    state: &'a StateTracker,
}

// SAFETY: the LLVM context behind `engine` and `module` is only touched by the
// worker while the job runs. `JitEngine::compile` does nothing but wait until the
// worker is joined, and the join orders the worker's writes before the
// orchestrator's next access.
unsafe impl Send for CompileJob<'_, '_> {}

impl CompileJob<'_, '_> {
    fn run(self) -> Result<PipelineReport, CompileError> {
        self.state
            .advance(EngineState::Running)
            .map_err(|e| CompileError::AlreadyStarted { state: e.from })?;

        let result = self.pipeline.run(self.module, self.machine);
        if let Err(e) = &result {
            log::warn!("Optimization failed, finalizing unoptimized code: {}", e);
        }

        self.finalize();

        if let Err(e) = self.state.advance(EngineState::Finalized) {
            log::warn!("{}", e);
        }
        result.map_err(CompileError::from)
    }

    /// Emit and finalize every pending object. MCJIT finalizes after a
    /// successful function lookup, so one exported definition is enough.
    fn finalize(&self) {
        let exported = self.module.get_functions().find(|function| {
            !is_declaration(function)
                && !matches!(function.get_linkage(), Linkage::Internal | Linkage::Private)
        });

        match exported {
            Some(function) => {
                let name = function.get_name().to_string_lossy().into_owned();
                match self.engine.get_function_address(&name) {
                    Ok(address) => log::debug!("Finalized code, {} at {:#x}", name, address),
                    Err(e) => log::warn!("Lookup of {} did not emit code: {}", name, e),
                }
            }
            None => log::debug!("No exported definitions, nothing to emit"),
        }
    }
}

/// Wait for the worker to finish. Returns the number of unsuccessful checks
/// for polling strategies.
fn wait_for<T>(handle: &ScopedJoinHandle<'_, T>, wait: WaitStrategy) -> Option<u64> {
    match wait {
        WaitStrategy::Join => None,
        WaitStrategy::Spin => {
            let mut polls = 0u64;
            while !handle.is_finished() {
                polls += 1;
                std::hint::spin_loop();
            }
            Some(polls)
        }
        WaitStrategy::Poll(interval) => {
            let mut polls = 0u64;
            while !handle.is_finished() {
                polls += 1;
                thread::sleep(interval);
            }
            Some(polls)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
