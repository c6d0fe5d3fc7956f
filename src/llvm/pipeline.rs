// This module implements the optimization schedule applied to a loaded module before it is
// finalized by the JIT. The schedule has three phases run through LLVM's new pass manager
// (Module::run_passes): a whole-module prelude that deletes globally dead code, a
// per-function phase over every function that has a body, and a final whole-module sweep
// using the preset's default pipeline. Two optional rewrites run before the prelude:
// internalizing every definition not named in the export list, so the prelude can delete
// the unused ones, and marking definitions noinline when inlining is disabled. Pass text
// for each phase comes from the preset unless the configuration overrides it. An empty
// override skips that phase.

//! Module/function/module optimization schedule.

use std::time::Instant;

use inkwell::attributes::{Attribute, AttributeLoc};
use inkwell::module::{Linkage, Module};
use inkwell::passes::PassBuilderOptions;
use inkwell::targets::TargetMachine;
use inkwell::values::FunctionValue;

use crate::core::config::PipelineConfig;
use crate::core::error::PipelineError;
use crate::core::session::PipelineReport;

/// Dead-code elimination run before anything else.
pub const DEFAULT_PRELUDE: &str = "globaldce";

/// A configured optimization schedule.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    #[cfg(test)]
    panic_with: Option<&'static str>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            #[cfg(test)]
            panic_with: None,
        }
    }

    /// A schedule that panics as soon as it runs.
    #[cfg(test)]
    pub(crate) fn panicking(message: &'static str) -> Self {
        Self {
            panic_with: Some(message),
            ..Self::default()
        }
    }

    /// Pass text for the whole-module prelude.
    pub fn prelude_pipeline(&self) -> String {
        self.config
            .prelude_passes
            .clone()
            .unwrap_or_else(|| DEFAULT_PRELUDE.to_string())
    }

    /// Pass text for the per-function phase, wrapped in a function adaptor.
    pub fn function_pipeline(&self) -> String {
        let passes = self
            .config
            .function_passes
            .as_deref()
            .unwrap_or_else(|| self.config.preset.function_passes());
        if passes.trim().is_empty() {
            String::new()
        } else {
            format!("function({})", passes)
        }
    }

    /// Pass text for the final whole-module sweep.
    pub fn module_pipeline(&self) -> String {
        self.config
            .module_passes
            .clone()
            .unwrap_or_else(|| self.config.preset.module_pipeline())
    }

    /// Run the full schedule over `module`, mutating it in place.
    pub fn run(
        &self,
        module: &Module<'_>,
        machine: &TargetMachine,
    ) -> Result<PipelineReport, PipelineError> {
        #[cfg(test)]
        if let Some(message) = self.panic_with {
            panic!("{}", message);
        }

        let mut report = PipelineReport {
            functions_before: module.get_functions().count(),
            ..PipelineReport::default()
        };

        if !self.config.exports.is_empty() {
            report.internalized = internalize(module, &self.config.exports);
        }
        if !self.config.inline {
            report.noinline_marked = mark_noinline(module);
        }

        let start = Instant::now();
        self.run_phase("prelude", &self.prelude_pipeline(), module, machine)?;
        report.prelude_time = start.elapsed();
        report.functions_after_prelude = module.get_functions().count();

        let start = Instant::now();
        let (definitions, declarations) = partition_functions(module);
        report.declarations_skipped = declarations;
        if definitions.is_empty() {
            log::debug!("No function bodies, skipping per-function phase");
        } else {
            for function in &definitions {
                log::trace!("Optimizing function {}", function_name(function));
            }
            self.run_phase("function", &self.function_pipeline(), module, machine)?;
            report.functions_optimized = definitions.len();
        }
        report.function_time = start.elapsed();

        let start = Instant::now();
        self.run_phase("module", &self.module_pipeline(), module, machine)?;
        report.module_time = start.elapsed();

        if self.config.verify_each {
            module.verify().map_err(|e| PipelineError::Verification {
                reason: e.to_string(),
            })?;
        }

        log::info!(
            "Optimized module: {} functions, {} removed, {} optimized, {} declarations skipped",
            report.functions_before,
            report.functions_removed(),
            report.functions_optimized,
            report.declarations_skipped
        );
        Ok(report)
    }

    fn run_phase(
        &self,
        phase: &'static str,
        pipeline: &str,
        module: &Module<'_>,
        machine: &TargetMachine,
    ) -> Result<(), PipelineError> {
        if pipeline.trim().is_empty() {
            log::debug!("Empty {} phase, skipping", phase);
            return Ok(());
        }

        log::debug!("Running {} phase: {}", phase, pipeline);
        let options = PassBuilderOptions::create();
        options.set_verify_each(self.config.verify_each);

        module
            .run_passes(pipeline, machine, options)
            .map_err(|e| PipelineError::Passes {
                phase,
                pipeline: pipeline.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

/// A function with no basic blocks is an external declaration.
pub fn is_declaration(function: &FunctionValue<'_>) -> bool {
    function.count_basic_blocks() == 0
}

fn function_name(function: &FunctionValue<'_>) -> String {
    function.get_name().to_string_lossy().into_owned()
}

/// Split the module's functions into definitions and a declaration count.
fn partition_functions<'ctx>(module: &Module<'ctx>) -> (Vec<FunctionValue<'ctx>>, usize) {
    let mut definitions = Vec::new();
    let mut declarations = 0;
    for function in module.get_functions() {
        if is_declaration(&function) {
            log::trace!("Skipping declaration {}", function_name(&function));
            declarations += 1;
        } else {
            definitions.push(function);
        }
    }
    (definitions, declarations)
}

/// Give internal linkage to every definition not named in `exports`.
fn internalize(module: &Module<'_>, exports: &[String]) -> usize {
    let mut count = 0;
    for function in module.get_functions() {
        if is_declaration(&function) {
            continue;
        }
        if matches!(function.get_linkage(), Linkage::Internal | Linkage::Private) {
            continue;
        }
        let name = function_name(&function);
        if exports.iter().any(|export| *export == name) {
            continue;
        }
        log::trace!("Internalizing {}", name);
        function.set_linkage(Linkage::Internal);
        count += 1;
    }
    count
}

/// Add `noinline` to every definition not already forced inline.
fn mark_noinline(module: &Module<'_>) -> usize {
    let context = module.get_context();
    let noinline = Attribute::get_named_enum_kind_id("noinline");
    let alwaysinline = Attribute::get_named_enum_kind_id("alwaysinline");

    let mut count = 0;
    for function in module.get_functions() {
        if is_declaration(&function) {
            continue;
        }
        if function
            .get_enum_attribute(AttributeLoc::Function, alwaysinline)
            .is_some()
        {
            continue;
        }
        if function
            .get_enum_attribute(AttributeLoc::Function, noinline)
            .is_none()
        {
            function.add_attribute(AttributeLoc::Function, context.create_enum_attribute(noinline, 0));
            count += 1;
        }
    }
    count
}
