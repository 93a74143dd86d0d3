//! Wall-clock versus simulated-cycle progress trace.
//!
//! When enabled, every core appends a line
//!
//! ```text
//! time: <microseconds since start>, cycles: <cycle count>
//! ```
//!
//! to `progress_trace_<core>` in the output directory each time its cycle
//! count has advanced by more than the configured interval since the last
//! line. The file is created on the first line written.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::ProgressTraceParams;
use crate::types::CoreId;

const BASE_OUTPUT_FILENAME: &str = "progress_trace";

/// Process-wide trace settings and start time.
#[derive(Clone, Debug)]
pub struct ProgressTrace {
    interval: u64,
    output_dir: PathBuf,
    start: Instant,
}

impl ProgressTrace {
    /// Returns `None` when tracing is disabled.
    pub fn new(params: &ProgressTraceParams, output_dir: impl AsRef<Path>) -> Option<Self> {
        if !params.enabled {
            return None;
        }
        Some(Self {
            interval: params.interval,
            output_dir: output_dir.as_ref().to_path_buf(),
            start: Instant::now(),
        })
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn file_path(&self, core: CoreId) -> PathBuf {
        self.output_dir.join(format!("{}_{}", BASE_OUTPUT_FILENAME, core))
    }

    /// Per-core tracer, owned by the core's thread.
    pub fn for_core(&self, core: CoreId) -> CoreProgressTrace {
        CoreProgressTrace {
            core,
            interval: self.interval,
            path: self.file_path(core),
            start: self.start,
            counter: 0,
            file: None,
        }
    }
}

#[derive(Debug)]
pub struct CoreProgressTrace {
    core: CoreId,
    interval: u64,
    path: PathBuf,
    start: Instant,
    counter: u64,
    file: Option<BufWriter<File>>,
}

impl CoreProgressTrace {
    pub fn core(&self) -> CoreId {
        self.core
    }

    /// Cycle count at the last line written.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Records progress at `cycles`, writing a line if the interval has
    /// been exceeded.
    ///
    /// # Panics
    ///
    /// Panics if `cycles` is below the last traced cycle count; a core's
    /// cycle count never decreases.
    pub fn trace(&mut self, cycles: u64) -> io::Result<()> {
        assert!(
            self.counter <= cycles,
            "counter({}) > cycles({})",
            self.counter,
            cycles
        );

        if cycles - self.counter > self.interval {
            let elapsed_us = self.start.elapsed().as_micros();
            if self.file.is_none() {
                self.file = Some(BufWriter::new(File::create(&self.path)?));
            }
            if let Some(file) = self.file.as_mut() {
                writeln!(file, "time: {}, cycles: {}", elapsed_us, cycles)?;
            }
            self.counter = cycles;
        }
        Ok(())
    }

    /// Flushes and closes the trace file, if one was opened.
    pub fn close(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("coresim_progress_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_disabled_trace() {
        assert!(ProgressTrace::new(&ProgressTraceParams::default(), ".").is_none());
    }

    #[test]
    fn test_lines_written_past_interval() {
        let dir = temp_dir("lines");
        let trace = ProgressTrace::new(&ProgressTraceParams::enabled(100), &dir).unwrap();
        let mut core = trace.for_core(3);

        core.trace(50).unwrap();
        core.trace(100).unwrap();
        assert_eq!(core.counter(), 0);

        core.trace(101).unwrap();
        core.trace(150).unwrap();
        core.trace(350).unwrap();
        core.close().unwrap();

        let text = std::fs::read_to_string(trace.file_path(3)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("time: "));
        assert!(lines[0].ends_with("cycles: 101"));
        assert!(lines[1].ends_with("cycles: 350"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_no_file_without_progress() {
        let dir = temp_dir("nofile");
        let trace = ProgressTrace::new(&ProgressTraceParams::enabled(10), &dir).unwrap();
        let mut core = trace.for_core(0);
        core.trace(5).unwrap();
        core.close().unwrap();
        assert!(!trace.file_path(0).exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    #[should_panic(expected = "counter(20) > cycles(10)")]
    fn test_cycles_going_back_panics() {
        let dir = temp_dir("back");
        let trace = ProgressTrace::new(&ProgressTraceParams::enabled(1), &dir).unwrap();
        let mut core = trace.for_core(0);
        core.trace(20).unwrap();
        core.trace(10).unwrap();
    }
}
