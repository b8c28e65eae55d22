use crate::scope::error::ScopeError;

/// Minimum field count of a usable `WFMPre?` response.
pub const PREAMBLE_FIELD_COUNT: usize = 16;

// 0-based positions inside the semicolon-delimited preamble line.
const WFID: usize = 6;
const XINCR: usize = 8;
const XZERO: usize = 10;
const XUNIT: usize = 11;
const YMULT: usize = 12;
const YZERO: usize = 13;
const YOFF: usize = 14;
const YUNIT: usize = 15;

/// Scaling metadata the instrument reports for the currently selected source.
///
/// Re-fetched before every channel's curve read; never reused across channels.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelPreamble {
    pub waveform_id: String,
    pub x_unit: String,
    pub x_increment: f64,
    pub x_zero: f64,
    pub y_unit: String,
    pub y_multiplier: f64,
    pub y_zero: f64,
    /// Display position converted to volts (raw YOFF times the multiplier).
    pub y_position: f64,
    /// The untouched response line, kept for the CSV header row.
    pub raw: String,
}

impl ChannelPreamble {
    /// Splits the `WFMPre?` response and validates all eight required fields.
    /// Fails closed with `MalformedPreamble` instead of indexing past missing
    /// fields or accepting non-numeric scale factors.
    pub fn parse(channel: u8, response: &str) -> Result<Self, ScopeError> {
        let fields: Vec<&str> = response.split(';').collect();
        if fields.len() < PREAMBLE_FIELD_COUNT {
            return Err(ScopeError::MalformedPreamble {
                channel,
                reason: format!(
                    "expected at least {PREAMBLE_FIELD_COUNT} fields, got {}",
                    fields.len()
                ),
                response: response.to_string(),
            });
        }
        let numeric = |idx: usize, name: &str| -> Result<f64, ScopeError> {
            fields[idx].trim().parse::<f64>().map_err(|_| {
                ScopeError::MalformedPreamble {
                    channel,
                    reason: format!("field {name} is not numeric: {:?}", fields[idx]),
                    response: response.to_string(),
                }
            })
        };
        let y_multiplier = numeric(YMULT, "YMULT")?;
        Ok(Self {
            waveform_id: unquote(fields[WFID]),
            x_increment: numeric(XINCR, "XINCR")?,
            x_zero: numeric(XZERO, "XZERO")?,
            x_unit: unquote(fields[XUNIT]),
            y_multiplier,
            y_zero: numeric(YZERO, "YZERO")?,
            y_position: numeric(YOFF, "YOFF")? * y_multiplier,
            y_unit: unquote(fields[YUNIT]),
            raw: response.to_string(),
        })
    }
}

/// The TDS 3034 wraps string fields in double quotes; strip them for labels.
fn unquote(field: &str) -> String {
    field.trim().trim_matches('"').to_string()
}
