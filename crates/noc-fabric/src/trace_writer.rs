//! File-backed trace sinks (spec §6 "Persisted outputs"): one append-only
//! text file per stream, opened under a run directory.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use noc_core::trace::Stream;
use noc_core::{NocError, NocResult, TraceSinks, WriterTraceSink};

/// Opens one file per [`Stream`] under `dir` (created if missing) and
/// bundles them into a [`TraceSinks`] that writes straight through with
/// no buffering beyond `BufWriter`'s default.
pub fn open_file_sinks(dir: &Path) -> NocResult<TraceSinks> {
    fs::create_dir_all(dir).map_err(|_| {
        NocError::InvariantViolated("failed to create trace output directory")
    })?;

    let mut open = |stream: Stream| -> NocResult<WriterTraceSink<BufWriter<File>>> {
        let path = dir.join(format!("{}.txt", stream.file_stem()));
        let file = File::create(&path)
            .map_err(|_| NocError::InvariantViolated("failed to create trace output file"))?;
        Ok(WriterTraceSink::new(BufWriter::new(file)))
    };

    Ok(TraceSinks {
        task_start_time_vs_id: Box::new(open(Stream::TaskStartTimeVsId)?),
        task_start_end_time_vs_id: Box::new(open(Stream::TaskStartEndTimeVsId)?),
        task_start_time_vs_id_iters: Box::new(open(Stream::TaskStartTimeVsIdIters)?),
        throughput_info: Box::new(open(Stream::ThroughputInfo)?),
        app_delay_running_info: Box::new(open(Stream::AppDelayRunningInfo)?),
        network_performance_info: Box::new(open(Stream::NetworkPerformanceInfo)?),
        task_waiting_time_info: Box::new(open(Stream::TaskWaitingTimeInfo)?),
    })
}
