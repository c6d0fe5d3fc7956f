//! Harness configuration.
//!
//! Input path, optimization preset, wait strategy, symbol names and the
//! database path are all fields here. The binary fills them from the
//! command line; tests build them directly.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use inkwell::OptimizationLevel;

/// Module path baked in by `build.rs` from `BITCODE_FILE`.
pub const DEFAULT_MODULE_PATH: &str = env!("JITPROBE_DEFAULT_MODULE");

/// Label printed in front of load diagnostics.
pub const DEFAULT_LABEL: &str = "jitprobe";

pub const DEFAULT_DATABASE: &str = "example.db";
pub const DEFAULT_OPEN_SYMBOL: &str = "sqlite3_open";
pub const DEFAULT_CLOSE_SYMBOL: &str = "sqlite3_close";

/// Optimization preset, mirroring clang's `-O` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OptPreset {
    O0,
    O1,
    /// Balanced optimization for speed.
    #[default]
    O2,
    O3,
    /// O2 with size reduction.
    Os,
    /// Aggressive size reduction.
    Oz,
}

impl OptPreset {
    /// Code generation level handed to the target machine and JIT.
    pub fn codegen_level(self) -> OptimizationLevel {
        match self {
            OptPreset::O0 => OptimizationLevel::None,
            OptPreset::O1 => OptimizationLevel::Less,
            OptPreset::O2 | OptPreset::Os | OptPreset::Oz => OptimizationLevel::Default,
            OptPreset::O3 => OptimizationLevel::Aggressive,
        }
    }

    /// Per-function passes run over each definition before the final sweep.
    pub fn function_passes(self) -> &'static str {
        match self {
            OptPreset::O0 => "lower-expect",
            _ => "lower-expect,simplifycfg,sroa,early-cse",
        }
    }

    /// Whole-module sweep run after the per-function phase.
    pub fn module_pipeline(self) -> String {
        format!("default<{}>", self)
    }
}

impl fmt::Display for OptPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptPreset::O0 => "O0",
            OptPreset::O1 => "O1",
            OptPreset::O2 => "O2",
            OptPreset::O3 => "O3",
            OptPreset::Os => "Os",
            OptPreset::Oz => "Oz",
        };
        f.write_str(name)
    }
}

/// Pass schedule settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub preset: OptPreset,
    /// When false, definitions are marked `noinline` before optimizing.
    pub inline: bool,
    /// Functions kept external; every other definition is internalized.
    /// Empty disables internalization.
    pub exports: Vec<String>,
    /// Overrides for the three phases. `None` uses the preset.
    pub prelude_passes: Option<String>,
    pub function_passes: Option<String>,
    pub module_passes: Option<String>,
    /// Run the verifier after every pass.
    pub verify_each: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preset: OptPreset::default(),
            inline: true,
            exports: Vec::new(),
            prelude_passes: None,
            function_passes: None,
            module_passes: None,
            verify_each: false,
        }
    }
}

/// How the orchestrator waits for the compile worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitStrategy {
    /// Block on the join handle.
    #[default]
    Join,
    /// Poll `is_finished` in a tight loop, counting polls.
    Spin,
    /// Poll `is_finished`, sleeping between polls.
    Poll(Duration),
}

/// Names and path used by the symbol prober.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub database: PathBuf,
    pub open_symbol: String,
    pub close_symbol: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            open_symbol: DEFAULT_OPEN_SYMBOL.to_string(),
            close_symbol: DEFAULT_CLOSE_SYMBOL.to_string(),
        }
    }
}

/// A single `i32 name(i32)` call made after the database probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeConfig {
    pub function: String,
    pub arg: i32,
}

/// Complete configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub module_path: PathBuf,
    pub label: String,
    pub pipeline: PipelineConfig,
    pub wait: WaitStrategy,
    pub probe: ProbeConfig,
    pub invoke: Option<InvokeConfig>,
    /// Dump the optimized module to stderr after compilation.
    pub print_ir: bool,
}

impl HarnessConfig {
    pub fn new(module_path: impl Into<PathBuf>) -> Self {
        Self {
            module_path: module_path.into(),
            ..Self::default()
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            module_path: PathBuf::from(DEFAULT_MODULE_PATH),
            label: DEFAULT_LABEL.to_string(),
            pipeline: PipelineConfig::default(),
            wait: WaitStrategy::default(),
            probe: ProbeConfig::default(),
            invoke: None,
            print_ir: false,
        }
    }
}
