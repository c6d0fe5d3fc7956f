//! jitprobe command line.
//!
//! Parses arguments into a [`HarnessConfig`], runs the harness against stdout
//! and maps failures onto the process outcome: module parse failures, worker
//! launch failures and a failed database open abort; other errors exit 1.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use jitprobe::core::config::{
    DEFAULT_CLOSE_SYMBOL, DEFAULT_DATABASE, DEFAULT_LABEL, DEFAULT_MODULE_PATH,
    DEFAULT_OPEN_SYMBOL,
};
use jitprobe::llvm::target;
use jitprobe::{
    Harness, HarnessConfig, InvokeConfig, OptPreset, PipelineConfig, ProbeConfig, WaitStrategy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WaitMode {
    /// Block until the worker finishes
    Join,
    /// Busy-wait on the worker, counting polls
    Spin,
    /// Poll the worker, sleeping between checks
    Poll,
}

#[derive(Parser, Debug)]
#[command(
    name = "jitprobe",
    version,
    about = "Optimize and JIT-compile an LLVM module, then call sqlite3_open/sqlite3_close from it."
)]
struct Args {
    /// Input module (bitcode or textual IR)
    #[arg(env = "JITPROBE_MODULE", default_value = DEFAULT_MODULE_PATH)]
    module: PathBuf,

    /// Optimization preset
    #[arg(long, value_enum, ignore_case = true, default_value_t = OptPreset::O2)]
    opt_level: OptPreset,

    /// Keep functions from being inlined
    #[arg(long, action = clap::ArgAction::SetTrue)]
    no_inline: bool,

    /// Keep SYMBOL external and internalize every other definition (repeatable)
    #[arg(long = "export", value_name = "SYMBOL")]
    exports: Vec<String>,

    /// Pass pipeline for the dead-code prelude (empty to skip)
    #[arg(long, value_name = "PASSES")]
    prelude_passes: Option<String>,

    /// Passes run over each function body (empty to skip)
    #[arg(long, value_name = "PASSES")]
    function_passes: Option<String>,

    /// Pass pipeline for the final module sweep (empty to skip)
    #[arg(long, value_name = "PASSES")]
    module_passes: Option<String>,

    /// Verify the module after every pass
    #[arg(long, action = clap::ArgAction::SetTrue)]
    verify_each: bool,

    /// How to wait for the compile worker
    #[arg(long, value_enum, default_value_t = WaitMode::Join)]
    wait: WaitMode,

    /// Sleep between polls with --wait poll
    #[arg(long, value_name = "MS", default_value_t = 1)]
    poll_interval_ms: u64,

    /// Database file opened by the probe
    #[arg(long, value_name = "PATH", default_value = DEFAULT_DATABASE)]
    database: PathBuf,

    /// Symbol called to open the database
    #[arg(long, value_name = "SYMBOL", default_value = DEFAULT_OPEN_SYMBOL)]
    open_symbol: String,

    /// Symbol called to close the database
    #[arg(long, value_name = "SYMBOL", default_value = DEFAULT_CLOSE_SYMBOL)]
    close_symbol: String,

    /// Label printed in front of load diagnostics
    #[arg(long, default_value = DEFAULT_LABEL)]
    label: String,

    /// Call `i32 FUNCTION(i32)` after the database probe
    #[arg(long, value_name = "FUNCTION")]
    invoke: Option<String>,

    /// Argument passed to --invoke
    #[arg(long, value_name = "N", default_value_t = 7, allow_negative_numbers = true)]
    invoke_arg: i32,

    /// Print the optimized module to stderr
    #[arg(long, action = clap::ArgAction::SetTrue)]
    print_ir: bool,
}

impl Args {
    fn into_config(self) -> HarnessConfig {
        let wait = match self.wait {
            WaitMode::Join => WaitStrategy::Join,
            WaitMode::Spin => WaitStrategy::Spin,
            WaitMode::Poll => WaitStrategy::Poll(Duration::from_millis(self.poll_interval_ms)),
        };

        HarnessConfig {
            module_path: self.module,
            label: self.label,
            pipeline: PipelineConfig {
                preset: self.opt_level,
                inline: !self.no_inline,
                exports: self.exports,
                prelude_passes: self.prelude_passes,
                function_passes: self.function_passes,
                module_passes: self.module_passes,
                verify_each: self.verify_each,
            },
            wait,
            probe: ProbeConfig {
                database: self.database,
                open_symbol: self.open_symbol,
                close_symbol: self.close_symbol,
            },
            invoke: self.invoke.map(|function| InvokeConfig {
                function,
                arg: self.invoke_arg,
            }),
            print_ir: self.print_ir,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Args::parse().into_config();
    let label = config.label.clone();
    let harness = Harness::new(config);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = harness.run(&mut out);
    let _ = out.flush();

    match result {
        Ok(_) => target::shutdown(),
        Err(e) if e.is_fatal() => {
            log::error!("{}", e);
            process::abort();
        }
        Err(e) => {
            eprintln!("{}: {}", label, e);
            target::shutdown();
            process::exit(1);
        }
    }
}
