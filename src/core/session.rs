//! Run reports and statistics.
//!
//! Each stage returns a plain report. `SessionStats` collects them for one run
//! and renders the summary logged at the end of the harness.

use std::fmt;
use std::time::Duration;

use super::error::CompileError;
use super::state::EngineState;

/// Format a duration as `<seconds>.<milliseconds>` with three millisecond digits.
pub fn format_elapsed(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

/// What the optimization schedule did to the module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Functions (definitions and declarations) before any pass ran.
    pub functions_before: usize,

    /// Functions left after the dead-code prelude.
    pub functions_after_prelude: usize,

    /// Definitions visited by the per-function phase.
    pub functions_optimized: usize,

    /// External declarations skipped by the per-function phase.
    pub declarations_skipped: usize,

    /// Definitions given internal linkage because they were not exported.
    pub internalized: usize,

    /// Definitions marked `noinline` because inlining was disabled.
    pub noinline_marked: usize,

    /// Wall-clock time per phase.
    pub prelude_time: Duration,
    pub function_time: Duration,
    pub module_time: Duration,
}

impl PipelineReport {
    /// Functions deleted by the prelude.
    pub fn functions_removed(&self) -> usize {
        self.functions_before.saturating_sub(self.functions_after_prelude)
    }
}

/// Result of the asynchronous compile stage.
#[derive(Debug)]
pub struct CompileOutcome {
    /// Time since the execution engine was created.
    pub elapsed: Duration,

    /// Unsuccessful completion checks. `None` when the wait blocked on the join.
    pub polls: Option<u64>,

    /// What the worker returned, or why it could not be joined.
    pub worker: Result<PipelineReport, CompileError>,

    /// The engine's stored error message, if it has one.
    pub engine_error: Option<String>,

    /// Engine state observed after the wait ended.
    pub state: EngineState,
}

impl CompileOutcome {
    pub fn is_finalized(&self) -> bool {
        self.state == EngineState::Finalized
    }
}

/// Resolved addresses and status from the database probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub open_address: usize,
    pub close_address: usize,
    pub open_status: i32,
}

/// Statistics for one harness run.
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Whether LLVM was built with multithreading support.
    pub llvm_multithreaded: bool,

    pub pipeline: Option<PipelineReport>,

    pub compile_elapsed: Option<Duration>,

    pub polls: Option<u64>,

    pub probe: Option<ProbeReport>,

    /// Result of the optional `i32 f(i32)` invocation.
    pub invoke_result: Option<(String, i32, i32)>,
}

impl SessionStats {
    pub fn new(llvm_multithreaded: bool) -> Self {
        Self {
            llvm_multithreaded,
            ..Self::default()
        }
    }

    pub fn record_compile(&mut self, outcome: &CompileOutcome) {
        self.compile_elapsed = Some(outcome.elapsed);
        self.polls = outcome.polls;
        if let Ok(report) = &outcome.worker {
            self.pipeline = Some(report.clone());
        }
    }

    pub fn record_probe(&mut self, report: ProbeReport) {
        self.probe = Some(report);
    }

    pub fn record_invoke(&mut self, function: &str, arg: i32, result: i32) {
        self.invoke_result = Some((function.to_string(), arg, result));
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run Session Statistics:")?;
        writeln!(f, "  LLVM multithreaded: {}", self.llvm_multithreaded)?;

        if let Some(pipeline) = &self.pipeline {
            writeln!(
                f,
                "  Functions: {} loaded, {} removed by prelude",
                pipeline.functions_before,
                pipeline.functions_removed()
            )?;
            writeln!(
                f,
                "  Per-function phase: {} optimized, {} declarations skipped",
                pipeline.functions_optimized, pipeline.declarations_skipped
            )?;
            if pipeline.internalized > 0 {
                writeln!(f, "  Internalized: {}", pipeline.internalized)?;
            }
            if pipeline.noinline_marked > 0 {
                writeln!(f, "  Marked noinline: {}", pipeline.noinline_marked)?;
            }
            writeln!(
                f,
                "  Phase times: prelude {} s, function {} s, module {} s",
                format_elapsed(pipeline.prelude_time),
                format_elapsed(pipeline.function_time),
                format_elapsed(pipeline.module_time)
            )?;
        }

        if let Some(elapsed) = self.compile_elapsed {
            writeln!(f, "  Compile time: {} s", format_elapsed(elapsed))?;
        }
        if let Some(polls) = self.polls {
            writeln!(f, "  Wait polls: {}", polls)?;
        }

        if let Some(probe) = &self.probe {
            writeln!(
                f,
                "  Probe: open @ {:#x}, close @ {:#x}, status {}",
                probe.open_address, probe.close_address, probe.open_status
            )?;
        }
        if let Some((function, arg, result)) = &self.invoke_result {
            writeln!(f, "  Invoked: {}({}) = {}", function, arg, result)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed_pads_milliseconds() {
        assert_eq!(format_elapsed(Duration::from_millis(0)), "0.000");
        assert_eq!(format_elapsed(Duration::from_millis(7)), "0.007");
        assert_eq!(format_elapsed(Duration::from_millis(1042)), "1.042");
        assert_eq!(format_elapsed(Duration::from_millis(12_500)), "12.500");
        // Sub-millisecond remainders are truncated.
        assert_eq!(format_elapsed(Duration::from_micros(2_999)), "0.002");
    }

    #[test]
    fn test_functions_removed() {
        let report = PipelineReport {
            functions_before: 5,
            functions_after_prelude: 3,
            ..PipelineReport::default()
        };
        assert_eq!(report.functions_removed(), 2);
    }

    #[test]
    fn test_record_compile() {
        let mut stats = SessionStats::new(true);
        let outcome = CompileOutcome {
            elapsed: Duration::from_millis(250),
            polls: Some(1234),
            worker: Ok(PipelineReport {
                functions_before: 4,
                functions_after_prelude: 3,
                functions_optimized: 2,
                declarations_skipped: 1,
                ..PipelineReport::default()
            }),
            engine_error: None,
            state: EngineState::Finalized,
        };
        assert!(outcome.is_finalized());

        stats.record_compile(&outcome);
        assert_eq!(stats.polls, Some(1234));
        assert_eq!(stats.pipeline.as_ref().unwrap().functions_optimized, 2);
    }

    #[test]
    fn test_statistics_display() {
        let mut stats = SessionStats::new(true);
        stats.pipeline = Some(PipelineReport {
            functions_before: 6,
            functions_after_prelude: 4,
            functions_optimized: 3,
            declarations_skipped: 1,
            internalized: 2,
            ..PipelineReport::default()
        });
        stats.compile_elapsed = Some(Duration::from_millis(1500));
        stats.polls = Some(42);
        stats.record_probe(ProbeReport {
            open_address: 0x1000,
            close_address: 0x2000,
            open_status: 0,
        });
        stats.record_invoke("foo", 7, 49);

        let output = format!("{}", stats);
        assert!(output.contains("LLVM multithreaded: true"));
        assert!(output.contains("6 loaded, 2 removed by prelude"));
        assert!(output.contains("3 optimized, 1 declarations skipped"));
        assert!(output.contains("Internalized: 2"));
        assert!(!output.contains("Marked noinline"));
        assert!(output.contains("Compile time: 1.500 s"));
        assert!(output.contains("Wait polls: 42"));
        assert!(output.contains("open @ 0x1000, close @ 0x2000, status 0"));
        assert!(output.contains("Invoked: foo(7) = 49"));
    }
}
