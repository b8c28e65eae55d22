// src/recorder.rs
use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::scope::{ChannelAcquisition, ScopeError};

/// Writes one CSV file per acquired channel.
///
/// File layout matches what downstream analysis scripts expect: the raw
/// preamble line first, then a quoted unit header, then one row per sample.
pub struct ChannelRecorder {
    base_dir: PathBuf,
    stamp: String,
}

impl ChannelRecorder {
    /// Creates the output directory if it does not exist yet.
    pub fn new(base_dir: &Path, stamp: &str) -> Result<Self, ScopeError> {
        fs::create_dir_all(base_dir)?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            stamp: stamp.to_string(),
        })
    }

    /// File name is `"<stamp> <source>.csv"` with `:` replaced so it stays
    /// legal on Windows.
    pub fn file_path(&self, source: &str) -> PathBuf {
        let filename = format!("{} {}.csv", self.stamp, source).replace(':', "-");
        self.base_dir.join(filename)
    }

    pub fn write_channel(&self, acquisition: &ChannelAcquisition) -> Result<PathBuf, ScopeError> {
        let path = self.file_path(&acquisition.source);
        let file = File::create(&path)?;
        let mut w = BufWriter::new(file);
        let preamble = &acquisition.preamble;
        let record = &acquisition.record;
        writeln!(w, "{}", preamble.raw)?;
        match &record.smoothed {
            Some(smoothed) => {
                writeln!(
                    w,
                    "\"Time, {}\",\"Voltage, {}\",\"Smoothed Voltage, {}\"",
                    preamble.x_unit, preamble.y_unit, preamble.y_unit
                )?;
                for ((t, v), s) in record
                    .time
                    .iter()
                    .zip(&record.calibrated_voltage)
                    .zip(smoothed)
                {
                    writeln!(w, "{t},{v},{s}")?;
                }
            }
            None => {
                writeln!(
                    w,
                    "\"Time, {}\",\"Voltage, {}\"",
                    preamble.x_unit, preamble.y_unit
                )?;
                for (t, v) in record.time.iter().zip(&record.calibrated_voltage) {
                    writeln!(w, "{t},{v}")?;
                }
            }
        }
        w.flush()?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{ChannelPreamble, WaveformRecord};

    fn acquisition(smoothed: bool) -> ChannelAcquisition {
        ChannelAcquisition {
            source: "CH1".to_string(),
            preamble: ChannelPreamble {
                waveform_id: "Ch1".to_string(),
                x_unit: "s".to_string(),
                x_increment: 1e-6,
                x_zero: 0.0,
                y_unit: "V".to_string(),
                y_multiplier: 0.04,
                y_zero: 0.0,
                y_position: 20.48,
                raw: "2;16;ASC;raw-preamble".to_string(),
            },
            record: WaveformRecord {
                channel: 1,
                time: vec![0.0, 1e-6, 2e-6],
                raw_voltage: vec![4.0, 8.0, 12.0],
                calibrated_voltage: vec![-16.48, -12.48, -8.48],
                smoothed: smoothed.then(|| vec![4.0, 8.0, 12.0]),
            },
        }
    }

    #[test]
    fn writes_preamble_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = ChannelRecorder::new(dir.path(), "2026-08-30 12:00:00").unwrap();
        let path = recorder.write_channel(&acquisition(false)).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "2026-08-30 12-00-00 CH1.csv"
        );
        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "2;16;ASC;raw-preamble");
        assert_eq!(lines[1], "\"Time, s\",\"Voltage, V\"");
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[2], "0,-16.48");
    }

    #[test]
    fn smoothed_column_appears_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = ChannelRecorder::new(dir.path(), "2026-08-30 12:00:00").unwrap();
        let path = recorder.write_channel(&acquisition(true)).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[1], "\"Time, s\",\"Voltage, V\",\"Smoothed Voltage, V\"");
        assert_eq!(lines[2], "0,-16.48,4");
    }

    #[test]
    fn creates_missing_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("runs").join("today");
        let recorder = ChannelRecorder::new(&nested, "stamp").unwrap();
        recorder.write_channel(&acquisition(false)).unwrap();
        assert!(nested.join("stamp CH1.csv").exists());
    }
}
