// src/main.rs
mod cli;
mod recorder;
mod scope;

use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use log::warn;

use crate::recorder::ChannelRecorder;
use crate::scope::{
    render_acquisition_png, AcquisitionSession, AcquisitionSink, ChannelAcquisition,
    ChannelSelection, ChannelTrace, PlotStyle, ScopeError, SerialChannel, SmoothingConfig,
};

/// Glue between the session and its collaborators: writes the CSV for each
/// emitted channel and keeps a trace around for the end-of-session plot.
struct SessionOutput {
    recorder: ChannelRecorder,
    traces: Vec<ChannelTrace>,
}

impl AcquisitionSink for SessionOutput {
    fn emit(&mut self, acquisition: &ChannelAcquisition) -> Result<(), ScopeError> {
        let path = self.recorder.write_channel(acquisition)?;
        println!("Saved {}", path.display());
        self.traces.push(ChannelTrace {
            label: acquisition.source.clone(),
            time: acquisition.record.time.clone(),
            voltage: acquisition.record.raw_voltage.clone(),
            smoothed: acquisition.record.smoothed.clone(),
        });
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = cli::Args::parse();

    let selection = ChannelSelection::parse(args.channels.as_deref());
    let smoothing = args.smooth.then(SmoothingConfig::default);
    let save_dir = args.directory.unwrap_or_else(|| PathBuf::from("."));

    let link = SerialChannel::open(&args.port)?;
    let stamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    println!("{stamp}");

    let mut output = SessionOutput {
        recorder: ChannelRecorder::new(&save_dir, &stamp)?,
        traces: Vec::new(),
    };
    let mut session = AcquisitionSession::new(link, selection, smoothing)?;
    let report = session.run(&mut output)?;
    if !report.skipped.is_empty() {
        warn!(
            "channels skipped due to malformed responses: {:?}",
            report.skipped
        );
    }

    if output.traces.is_empty() {
        warn!("no channel produced data; skipping the plot");
        return Ok(());
    }
    let png = render_acquisition_png(&output.traces, PlotStyle::default())?;
    let plot_path = save_dir.join(format!("{stamp} acquisition.png").replace(':', "-"));
    std::fs::write(&plot_path, png)?;
    println!("Saved {}", plot_path.display());
    Ok(())
}
