//! End-to-end orchestration.
//!
//! `Harness::run` walks the stages in order (load, configure, compile on a
//! worker, report, probe) and writes the human-readable status lines to the
//! given writer. Errors come back typed; the caller decides whether they
//! abort the process (see [`HarnessError::is_fatal`]).

use std::io::Write;

use inkwell::context::Context;

use crate::core::config::HarnessConfig;
use crate::core::error::{HarnessError, HarnessResult, ProbeError};
use crate::core::session::{format_elapsed, SessionStats};
use crate::llvm::engine::JitEngine;
use crate::llvm::loader;
use crate::llvm::pipeline::Pipeline;
use crate::llvm::probe::SymbolProber;
use crate::llvm::target;

/// One configured run of the harness.
pub struct Harness {
    config: HarnessConfig,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Run every stage, writing status lines to `out`.
    pub fn run<W: Write>(&self, out: &mut W) -> HarnessResult<SessionStats> {
        let pipeline = Pipeline::new(self.config.pipeline.clone());
        self.run_with(&pipeline, out)
    }

    fn run_with<W: Write>(&self, pipeline: &Pipeline, out: &mut W) -> HarnessResult<SessionStats> {
        target::initialize_native()?;

        let multithreaded = target::llvm_is_multithreaded();
        writeln!(out, "Is multithreaded: {}", multithreaded)?;
        let mut stats = SessionStats::new(multithreaded);

        let context = Context::create();
        let module = match loader::load_module(&context, &self.config.module_path) {
            Ok(module) => {
                writeln!(out, "Module generated")?;
                module
            }
            Err(e) => {
                log::error!("Could not load {}", e.path().display());
                writeln!(out, "ERROR")?;
                writeln!(out, "{}: {}", self.config.label, e)?;
                out.flush()?;
                return Err(e.into());
            }
        };

        let preset = self.config.pipeline.preset;
        let machine = target::host_target_machine(preset.codegen_level())?;

        writeln!(out, "## Starting optimization and compilation ##\n")?;
        out.flush()?;

        let engine = JitEngine::create(&module, preset.codegen_level())?;
        let outcome = match engine.compile(pipeline, &machine, self.config.wait) {
            Ok(outcome) => outcome,
            Err(e) => {
                writeln!(out, "{}", e)?;
                out.flush()?;
                return Err(e.into());
            }
        };
        stats.record_compile(&outcome);

        if let Err(e) = &outcome.worker {
            writeln!(out, "{}", e)?;
        }
        if !outcome.is_finalized() {
            log::warn!("Engine is {} after the compile worker finished", outcome.state);
        }
        writeln!(out, "## Compilation finished ##")?;
        writeln!(out, "Errors: {}", outcome.engine_error.as_deref().unwrap_or(""))?;
        if let Some(polls) = outcome.polls {
            writeln!(out, "Wait polls = {}", polls)?;
        }
        writeln!(out, "Time elapsed = {} s", format_elapsed(outcome.elapsed))?;

        if self.config.print_ir {
            engine.module().print_to_stderr();
        }

        let prober = SymbolProber::new(&engine)?;
        match prober.probe_database(&self.config.probe) {
            Ok(report) => {
                writeln!(out, "Opened Database Successfully!")?;
                stats.record_probe(report);
            }
            Err(e @ ProbeError::OpenFailed { .. }) => {
                writeln!(out, "Error opening DB")?;
                out.flush()?;
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(invoke) = &self.config.invoke {
            let result = prober.invoke_i32(&invoke.function, invoke.arg)?;
            writeln!(out, "Running {}({}) = {}", invoke.function, invoke.arg, result)?;
            stats.record_invoke(&invoke.function, invoke.arg, result);
        }

        out.flush()?;
        log::debug!("{}", stats);
        Ok(stats)
    }
}

/// Convenience wrapper returning the status text alongside the result.
pub fn run_to_string(config: HarnessConfig) -> (String, Result<SessionStats, HarnessError>) {
    let mut buffer = Vec::new();
    let result = Harness::new(config).run(&mut buffer);
    (String::from_utf8_lossy(&buffer).into_owned(), result)
}
