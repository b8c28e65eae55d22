use log::warn;

use crate::scope::curve::{decode_curve, WaveformRecord};
use crate::scope::error::ScopeError;
use crate::scope::preamble::ChannelPreamble;
use crate::scope::selection::ChannelSelection;
use crate::scope::smoothing;
use crate::scope::transport::CommandChannel;

/// The one instrument this tool talks to. Anything else on the port is
/// refused before any configuration command goes out.
pub const EXPECTED_IDN: &str =
    "TEKTRONIX,TDS 3034,0,CF:91.1CT FV:v3.29 TDS3GM:v1.00 TDS3FFT:v1.00 TDS3TRG:v1.00";

/// Echoed values from the fixed setup sequence, as the instrument accepted
/// them (which may differ from what was requested).
#[derive(Clone, Debug, Default)]
pub struct AcquisitionSetup {
    pub bit_depth: String,
    pub data_width: String,
    pub encoding: String,
    pub horizontal: String,
    pub data_start: String,
    pub data_stop: String,
}

/// Savitzky-Golay settings for the optional smoothing pass.
#[derive(Clone, Copy, Debug)]
pub struct SmoothingConfig {
    pub window: usize,
    pub order: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: smoothing::SMOOTH_WINDOW,
            order: smoothing::SMOOTH_ORDER,
        }
    }
}

/// Everything acquired for one channel, ready for the output sinks.
#[derive(Clone, Debug)]
pub struct ChannelAcquisition {
    /// The instrument's `DATa:SOU?` echo, e.g. `CH1`; used for file naming.
    pub source: String,
    pub preamble: ChannelPreamble,
    pub record: WaveformRecord,
}

/// Receives one finished acquisition per channel (CSV writer, plot collector).
pub trait AcquisitionSink {
    fn emit(&mut self, acquisition: &ChannelAcquisition) -> Result<(), ScopeError>;
}

/// What happened over the whole channel loop.
#[derive(Clone, Debug)]
pub struct SessionReport {
    pub setup: AcquisitionSetup,
    pub acquired: Vec<u8>,
    pub skipped: Vec<u8>,
}

/// One acquisition session: owns the transport for its whole lifetime and
/// drives identification, setup, and the per-channel loop in strict order.
/// The port closes when the session drops, on success and on failure alike.
pub struct AcquisitionSession<C: CommandChannel> {
    link: C,
    selection: ChannelSelection,
    smoothing: Option<SmoothingConfig>,
}

impl<C: CommandChannel> AcquisitionSession<C> {
    /// Smoothing parameters are checked here, before any channel work begins.
    pub fn new(
        link: C,
        selection: ChannelSelection,
        smoothing: Option<SmoothingConfig>,
    ) -> Result<Self, ScopeError> {
        if let Some(cfg) = &smoothing {
            smoothing::validate(cfg.window, cfg.order)?;
        }
        Ok(Self {
            link,
            selection,
            smoothing,
        })
    }

    /// Clears status, then checks `*IDN?` byte-for-byte against the one
    /// supported instrument. A mismatch is fatal and non-retryable.
    pub fn identify(&mut self) -> Result<String, ScopeError> {
        self.link.send("*CLS")?;
        let idn = self.link.query("*IDN?")?;
        println!("Identification: {idn}");
        if idn != EXPECTED_IDN {
            return Err(ScopeError::IdentificationMismatch {
                actual: idn,
                expected: EXPECTED_IDN.to_string(),
            });
        }
        Ok(idn)
    }

    /// The fixed write-then-read-back setup sequence. Echo mismatches are
    /// surfaced as warnings, never treated as fatal: some instruments clamp
    /// or round requested values.
    pub fn configure(&mut self) -> Result<AcquisitionSetup, ScopeError> {
        let bit_depth = self.set_and_confirm("WFMPre:BIT_Nr", "16")?;
        println!("Number of bits per point: {bit_depth}");
        let data_width = self.link.query("DATa:WIDth?")?;
        println!("Data width in bytes: {data_width}");
        let encoding = self.set_and_confirm("WFMPre:ENCdg", "ASC")?;
        println!("Data encoding: {encoding}");
        let horizontal = self.link.query("HORizontal?")?;
        println!("HORizontal settings: {horizontal}");
        let data_start = self.set_and_confirm("DATa:STARt", "1")?;
        println!("Data start: {data_start}");
        let data_stop = self.set_and_confirm("DATa:STOP", "10000")?;
        println!("Data stop: {data_stop}");
        Ok(AcquisitionSetup {
            bit_depth,
            data_width,
            encoding,
            horizontal,
            data_start,
            data_stop,
        })
    }

    fn set_and_confirm(&mut self, command: &str, value: &str) -> Result<String, ScopeError> {
        self.link.send(&format!("{command} {value}"))?;
        let echoed = self.link.query(&format!("{command}?"))?;
        if echoed != value {
            warn!("{command} echoed {echoed:?} after requesting {value:?}");
        }
        Ok(echoed)
    }

    /// Source select (echo-confirmed), then preamble, then curve; the
    /// instrument's waveform state is scoped to the selected source, so this
    /// order is load-bearing.
    fn acquire_channel(&mut self, channel: u8) -> Result<ChannelAcquisition, ScopeError> {
        self.link.send(&format!("DATa:SOU CH{channel}"))?;
        let source = self.link.query("DATa:SOU?")?;
        println!("Data source: {source}");
        let preamble_line = self.link.query("WFMPre?")?;
        let preamble = ChannelPreamble::parse(channel, &preamble_line)?;
        println!("WFID = {}", preamble.waveform_id);
        println!("XUNIT = {}", preamble.x_unit);
        println!("XINCRement = {}", preamble.x_increment);
        println!("XZERO = {}", preamble.x_zero);
        println!("YUNIT = {}", preamble.y_unit);
        println!("YMULTiplier = {}{}", preamble.y_multiplier, preamble.y_unit);
        println!("YZERO (Offset) = {}{}", preamble.y_zero, preamble.y_unit);
        println!("YOFF (Position) = {}{}", preamble.y_position, preamble.y_unit);
        let curve_line = self.link.query("CURVe?")?;
        let mut record = decode_curve(channel, &curve_line, &preamble)?;
        if let Some(cfg) = &self.smoothing {
            // Smoothing runs on the scaled samples before offset removal.
            record.smoothed = Some(smoothing::smooth(&record.raw_voltage, cfg.window, cfg.order)?);
        }
        Ok(ChannelAcquisition {
            source,
            preamble,
            record,
        })
    }

    /// Runs the whole session. A malformed preamble or curve skips that one
    /// channel and the loop continues; transport faults, timeouts, and the
    /// identification check end the session.
    pub fn run(&mut self, sink: &mut dyn AcquisitionSink) -> Result<SessionReport, ScopeError> {
        self.identify()?;
        let setup = self.configure()?;
        let mut acquired = Vec::new();
        let mut skipped = Vec::new();
        let channels = self.selection.channels().to_vec();
        for channel in channels {
            match self.acquire_channel(channel) {
                Ok(acquisition) => {
                    sink.emit(&acquisition)?;
                    acquired.push(channel);
                }
                Err(err) if err.is_channel_level() => {
                    warn!("skipping channel {channel}: {err}");
                    skipped.push(channel);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(SessionReport {
            setup,
            acquired,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::transport::ScriptedChannel;

    const PREAMBLE_CH: &str = "2;16;ASC;RP;MSB;3;\"ChX\";Y;1.0E-6;0;0.0E0;\"s\";4.0E-2;0.0E0;5.12E2;\"V\"";

    struct CollectingSink(Vec<ChannelAcquisition>);

    impl AcquisitionSink for CollectingSink {
        fn emit(&mut self, acquisition: &ChannelAcquisition) -> Result<(), ScopeError> {
            self.0.push(acquisition.clone());
            Ok(())
        }
    }

    fn setup_script<'a>() -> Vec<(&'a str, &'a str)> {
        vec![
            ("*IDN?", EXPECTED_IDN),
            ("WFMPre:BIT_Nr?", "16"),
            ("DATa:WIDth?", "2"),
            ("WFMPre:ENCdg?", "ASC"),
            ("HORizontal?", "MAIn;1.0E-4"),
            ("DATa:STARt?", "1"),
            ("DATa:STOP?", "10000"),
        ]
    }

    fn channel_script(n: u8, preamble: &'static str, curve: &'static str) -> Vec<(String, String)> {
        vec![
            ("DATa:SOU?".to_string(), format!("CH{n}")),
            ("WFMPre?".to_string(), preamble.to_string()),
            ("CURVe?".to_string(), curve.to_string()),
        ]
    }

    fn scripted(channels: &[(u8, &'static str, &'static str)]) -> ScriptedChannel {
        let mut script: Vec<(String, String)> = setup_script()
            .into_iter()
            .map(|(q, r)| (q.to_string(), r.to_string()))
            .collect();
        for &(n, preamble, curve) in channels {
            script.extend(channel_script(n, preamble, curve));
        }
        ScriptedChannel::new(
            script
                .iter()
                .map(|(q, r)| (q.as_str(), r.as_str()))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn happy_path_emits_every_selected_channel() {
        let link = scripted(&[
            (1, PREAMBLE_CH, "100,200,300"),
            (3, PREAMBLE_CH, "0,0,0"),
        ]);
        let selection = ChannelSelection::parse(Some("13"));
        let mut session = AcquisitionSession::new(link, selection, None).unwrap();
        let mut sink = CollectingSink(Vec::new());
        let report = session.run(&mut sink).unwrap();
        assert_eq!(report.acquired, vec![1, 3]);
        assert!(report.skipped.is_empty());
        assert_eq!(report.setup.encoding, "ASC");
        assert_eq!(report.setup.data_stop, "10000");
        assert_eq!(sink.0.len(), 2);
        assert_eq!(sink.0[0].source, "CH1");
        assert_eq!(sink.0[0].record.calibrated_voltage, vec![-16.48, -12.48, -8.48]);
        assert!(sink.0[0].record.smoothed.is_none());
    }

    #[test]
    fn identification_mismatch_stops_before_configuration() {
        let link = ScriptedChannel::new(vec![("*IDN?", "TEKTRONIX,TDS 3034,0,CF:91.1CT FV:v3.30")]);
        let selection = ChannelSelection::parse(None);
        let mut session = AcquisitionSession::new(link, selection, None).unwrap();
        let mut sink = CollectingSink(Vec::new());
        let err = session.run(&mut sink).unwrap_err();
        assert!(matches!(err, ScopeError::IdentificationMismatch { .. }));
        assert!(sink.0.is_empty());
        // Nothing went out past the identification query.
        assert_eq!(session.link.sent(), &["*CLS", "*IDN?"]);
    }

    #[test]
    fn malformed_channel_is_skipped_and_the_rest_survive() {
        // Channel 2 answers with a truncated preamble; 1, 3, 4 stay intact.
        let link = {
            let mut script: Vec<(String, String)> = setup_script()
                .into_iter()
                .map(|(q, r)| (q.to_string(), r.to_string()))
                .collect();
            script.extend(channel_script(1, PREAMBLE_CH, "1,2,3"));
            script.push(("DATa:SOU?".to_string(), "CH2".to_string()));
            script.push(("WFMPre?".to_string(), "2;16;ASC".to_string()));
            script.extend(channel_script(3, PREAMBLE_CH, "4,5,6"));
            script.extend(channel_script(4, PREAMBLE_CH, "7,8,9"));
            ScriptedChannel::new(
                script
                    .iter()
                    .map(|(q, r)| (q.as_str(), r.as_str()))
                    .collect::<Vec<_>>(),
            )
        };
        let selection = ChannelSelection::parse(Some("1234"));
        let mut session = AcquisitionSession::new(link, selection, None).unwrap();
        let mut sink = CollectingSink(Vec::new());
        let report = session.run(&mut sink).unwrap();
        assert_eq!(report.acquired, vec![1, 3, 4]);
        assert_eq!(report.skipped, vec![2]);
        assert_eq!(sink.0.len(), 3);
        assert_eq!(sink.0[1].source, "CH3");
    }

    #[test]
    fn transport_fault_mid_loop_ends_the_session() {
        // The link dies on channel 2's curve query: unlike a malformed
        // response, this is not skippable, and channel 3 is never touched.
        let link = {
            let mut script: Vec<(String, String)> = setup_script()
                .into_iter()
                .map(|(q, r)| (q.to_string(), r.to_string()))
                .collect();
            script.extend(channel_script(1, PREAMBLE_CH, "1,2,3"));
            script.push(("DATa:SOU?".to_string(), "CH2".to_string()));
            script.push(("WFMPre?".to_string(), PREAMBLE_CH.to_string()));
            // No reply scripted for channel 2's CURVe?.
            ScriptedChannel::new(
                script
                    .iter()
                    .map(|(q, r)| (q.as_str(), r.as_str()))
                    .collect::<Vec<_>>(),
            )
        };
        let selection = ChannelSelection::parse(Some("123"));
        let mut session = AcquisitionSession::new(link, selection, None).unwrap();
        let mut sink = CollectingSink(Vec::new());
        let err = session.run(&mut sink).unwrap_err();
        assert!(matches!(err, ScopeError::Transport { .. }));
        assert_eq!(sink.0.len(), 1);
        assert!(!session.link.sent().iter().any(|c| c == "DATa:SOU CH3"));
    }

    #[test]
    fn smoothing_attaches_a_series_of_equal_length() {
        let link = scripted(&[(1, PREAMBLE_CH, "1,1,1,1,1,1,1,1,1,1,1,1")]);
        let selection = ChannelSelection::parse(Some("1"));
        let smoothing = Some(SmoothingConfig::default());
        let mut session = AcquisitionSession::new(link, selection, smoothing).unwrap();
        let mut sink = CollectingSink(Vec::new());
        session.run(&mut sink).unwrap();
        let record = &sink.0[0].record;
        let smoothed = record.smoothed.as_ref().unwrap();
        assert_eq!(smoothed.len(), record.len());
        // A constant series survives the filter unchanged.
        for (s, r) in smoothed.iter().zip(&record.raw_voltage) {
            assert!((s - r).abs() < 1e-9);
        }
    }

    #[test]
    fn bad_smoothing_parameters_fail_at_construction() {
        let link = ScriptedChannel::new(Vec::<(&str, &str)>::new());
        let selection = ChannelSelection::parse(None);
        let err = AcquisitionSession::new(
            link,
            selection,
            Some(SmoothingConfig { window: 4, order: 2 }),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ScopeError::InvalidSmoothingParameters { .. }));
    }
}
