// src/scope/mod.rs
// Protocol engine and waveform decode pipeline for the TDS 3034.
pub mod curve;
pub mod error;
pub mod plot;
pub mod preamble;
pub mod selection;
pub mod session;
pub mod smoothing;
pub mod transport;

pub use curve::WaveformRecord;
pub use error::ScopeError;
pub use plot::{render_acquisition_png, ChannelTrace, PlotStyle};
pub use preamble::ChannelPreamble;
pub use selection::ChannelSelection;
pub use session::{AcquisitionSession, AcquisitionSink, ChannelAcquisition, SmoothingConfig};
pub use transport::SerialChannel;
