use crate::scope::error::ScopeError;
use crate::scope::preamble::ChannelPreamble;

/// Calibrated time/voltage series decoded from one `CURVe?` response.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformRecord {
    pub channel: u8,
    /// `i * x_increment + x_zero`, in x-units.
    pub time: Vec<f64>,
    /// Sample codes scaled by the y-multiplier, position offset still in.
    pub raw_voltage: Vec<f64>,
    /// `raw_voltage - y_position`; the series that gets persisted.
    pub calibrated_voltage: Vec<f64>,
    /// Present only when the operator asked for smoothing.
    pub smoothed: Option<Vec<f64>>,
}

impl WaveformRecord {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Rounds to 15 decimal digits so repeated runs over identical response bytes
/// produce identical output files.
pub fn round15(value: f64) -> f64 {
    (value * 1e15).round() / 1e15
}

/// Splits the comma-delimited ASCII curve and applies the preamble's
/// multiply/add/subtract chain. No unit conversion happens here; the
/// preamble's declared units are trusted verbatim for labeling.
pub fn decode_curve(
    channel: u8,
    response: &str,
    preamble: &ChannelPreamble,
) -> Result<WaveformRecord, ScopeError> {
    if response.trim().is_empty() {
        return Err(ScopeError::MalformedCurve {
            channel,
            reason: "empty curve response".to_string(),
        });
    }
    let mut raw_voltage = Vec::new();
    for token in response.split(',') {
        let code: f64 = token.trim().parse().map_err(|_| ScopeError::MalformedCurve {
            channel,
            reason: format!("token {token:?} is not numeric"),
        })?;
        raw_voltage.push(round15(code * preamble.y_multiplier));
    }
    let time = (0..raw_voltage.len())
        .map(|i| round15(i as f64 * preamble.x_increment + preamble.x_zero))
        .collect();
    let calibrated_voltage = raw_voltage
        .iter()
        .map(|&v| round15(v - preamble.y_position))
        .collect();
    Ok(WaveformRecord {
        channel,
        time,
        raw_voltage,
        calibrated_voltage,
        smoothed: None,
    })
}
