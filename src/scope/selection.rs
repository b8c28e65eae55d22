/// Channels chosen for one acquisition session.
///
/// Always ascending, never repeating, fixed for the whole session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSelection(Vec<u8>);

/// Channels read when the operator does not ask for anything specific.
pub const DEFAULT_SPEC: &str = "12";

impl ChannelSelection {
    /// Scans the specifier for the digits 1-4; every other character is
    /// ignored. A missing, empty, or garbage specifier falls back to the
    /// default selection (channels 1 and 2).
    pub fn parse(spec: Option<&str>) -> Self {
        let spec = spec.unwrap_or(DEFAULT_SPEC);
        let channels: Vec<u8> = (1..=4)
            .filter(|ch| spec.contains(char::from(b'0' + ch)))
            .collect();
        if channels.is_empty() {
            return Self::parse(Some(DEFAULT_SPEC));
        }
        Self(channels)
    }

    pub fn channels(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_specifiers_scan_ascending() {
        assert_eq!(ChannelSelection::parse(Some("134")).channels(), &[1, 3, 4]);
        assert_eq!(ChannelSelection::parse(Some("24")).channels(), &[2, 4]);
        assert_eq!(ChannelSelection::parse(Some("4321")).channels(), &[1, 2, 3, 4]);
    }

    #[test]
    fn repeats_collapse() {
        assert_eq!(ChannelSelection::parse(Some("1131")).channels(), &[1, 3]);
    }

    #[test]
    fn missing_or_garbage_specifier_defaults_to_first_two() {
        assert_eq!(ChannelSelection::parse(None).channels(), &[1, 2]);
        assert_eq!(ChannelSelection::parse(Some("")).channels(), &[1, 2]);
        assert_eq!(ChannelSelection::parse(Some("xyz059")).channels(), &[1, 2]);
    }
}
