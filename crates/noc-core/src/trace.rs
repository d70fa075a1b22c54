//! Trace output surface (spec §6's six append-only trace streams).
//!
//! The engine never opens a file: it calls into a `TraceSink`, and a host
//! binary decides whether that means stdout, a file, or (in tests) an
//! in-memory `Vec<String>`. `TraceSink` is deliberately a single
//! `write_line` method — stream identity lives in which sink instance a
//! caller is holding, not in the trait, the same way the original attaches
//! one output stream per `DPRINTF`/file call site rather than routing all
//! of them through one multiplexed channel.

use std::io::Write;

pub trait TraceSink {
    fn write_line(&mut self, line: &str);
}

/// Discards every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn write_line(&mut self, _line: &str) {}
}

/// Keeps every line in memory, for tests and small demo programs.
#[derive(Debug, Default)]
pub struct VecTraceSink {
    pub lines: Vec<String>,
}

impl VecTraceSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TraceSink for VecTraceSink {
    fn write_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

/// Adapts any `std::io::Write` (a file, a socket, stdout) into a
/// `TraceSink`, appending a newline per line and silently dropping write
/// errors — trace output is diagnostic, never load-bearing for the
/// simulation itself.
pub struct WriterTraceSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterTraceSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TraceSink for WriterTraceSink<W> {
    fn write_line(&mut self, line: &str) {
        let _ = writeln!(self.writer, "{line}");
    }
}

/// One named output stream. `task_start_time_vs_id` and
/// `task_start_time_vs_id_iters` are kept distinct per spec §8 of the
/// expanded requirements: the first is bumped on every dispatch, the
/// second additionally carries the completed-iteration count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    TaskStartTimeVsId,
    TaskStartEndTimeVsId,
    TaskStartTimeVsIdIters,
    ThroughputInfo,
    AppDelayRunningInfo,
    NetworkPerformanceInfo,
    TaskWaitingTimeInfo,
}

impl Stream {
    pub const ALL: [Stream; 7] = [
        Stream::TaskStartTimeVsId,
        Stream::TaskStartEndTimeVsId,
        Stream::TaskStartTimeVsIdIters,
        Stream::ThroughputInfo,
        Stream::AppDelayRunningInfo,
        Stream::NetworkPerformanceInfo,
        Stream::TaskWaitingTimeInfo,
    ];

    pub fn file_stem(self) -> &'static str {
        match self {
            Stream::TaskStartTimeVsId => "task_start_time_vs_id",
            Stream::TaskStartEndTimeVsId => "task_start_end_time_vs_id",
            Stream::TaskStartTimeVsIdIters => "task_start_time_vs_id_iters",
            Stream::ThroughputInfo => "throughput_info",
            Stream::AppDelayRunningInfo => "app_delay_running_info",
            Stream::NetworkPerformanceInfo => "network_performance_info",
            Stream::TaskWaitingTimeInfo => "task_waiting_time_info",
        }
    }
}

/// Line formatters for spec §8's seven tab-separated formats. Kept as
/// free functions so callers can format without owning a sink (useful in
/// tests that just want to assert on content).
pub mod format {
    pub fn task_start_time_vs_id(cycle: u64, core_id: u32, task_id: u32) -> String {
        format!("{cycle}\t{core_id}\t{task_id}")
    }

    pub fn task_start_end_time_vs_id(
        app_idx: u32,
        iteration: u64,
        start_cycle: u64,
        end_cycle: u64,
    ) -> String {
        format!("{app_idx}\t{iteration}\t{start_cycle}\t{end_cycle}")
    }

    pub fn task_start_time_vs_id_iters(cycle: u64, core_id: u32, task_id: u32, c_e_times: u64) -> String {
        format!("{cycle}\t{core_id}\t{task_id}\t{c_e_times}")
    }

    pub fn throughput_info(core_id: u32, total_data_bits: u64) -> String {
        format!("{core_id}\t{total_data_bits}")
    }

    pub fn app_delay_running_info(app_idx: u32, completed_iterations: u64) -> String {
        format!("{app_idx}\t{completed_iterations}")
    }

    pub fn network_performance_info(
        vnet: u8,
        network_delay: u64,
        queueing_delay: u64,
        hops: i32,
    ) -> String {
        format!("{vnet}\t{network_delay}\t{queueing_delay}\t{hops}")
    }

    pub fn task_waiting_time_info(core_id: u32, task_id: u32, waiting_time: u64) -> String {
        format!("{core_id}\t{task_id}\t{waiting_time}")
    }
}

/// Bundles one sink per stream so an engine holds a single handle instead
/// of threading seven through its call sites.
pub struct TraceSinks {
    pub task_start_time_vs_id: Box<dyn TraceSink + Send>,
    pub task_start_end_time_vs_id: Box<dyn TraceSink + Send>,
    pub task_start_time_vs_id_iters: Box<dyn TraceSink + Send>,
    pub throughput_info: Box<dyn TraceSink + Send>,
    pub app_delay_running_info: Box<dyn TraceSink + Send>,
    pub network_performance_info: Box<dyn TraceSink + Send>,
    pub task_waiting_time_info: Box<dyn TraceSink + Send>,
}

impl TraceSinks {
    pub fn null() -> Self {
        Self {
            task_start_time_vs_id: Box::new(NullTraceSink),
            task_start_end_time_vs_id: Box::new(NullTraceSink),
            task_start_time_vs_id_iters: Box::new(NullTraceSink),
            throughput_info: Box::new(NullTraceSink),
            app_delay_running_info: Box::new(NullTraceSink),
            network_performance_info: Box::new(NullTraceSink),
            task_waiting_time_info: Box::new(NullTraceSink),
        }
    }
}
