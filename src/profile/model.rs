use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the nine bar-graph patterns shown on an 8-bit bank.
///
/// Level `k` lights the first `k` bits (MSB first) and leaves the rest
/// clear, so `0b1111_1000` is level 5.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LightCode(u8);

impl LightCode {
    pub const MAX_LEVEL: u8 = 8;
    pub const ALL_CLEAR: LightCode = LightCode(0);
    pub const ALL_SET: LightCode = LightCode(0xFF);

    /// Levels above 8 saturate.
    pub fn from_level(level: u8) -> Self {
        match level.min(Self::MAX_LEVEL) {
            0 => Self::ALL_CLEAR,
            k => LightCode(0xFFu8 << (Self::MAX_LEVEL - k)),
        }
    }

    pub fn level(self) -> u8 {
        self.0.leading_ones() as u8
    }

    /// Bits in shift order: index 0 is the first bit clocked into the register.
    pub fn shift_order(self) -> impl Iterator<Item = bool> {
        (0..8).map(move |i| self.0 & (0x80 >> i) != 0)
    }
}

impl fmt::Display for LightCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08b}", self.0)
    }
}

impl From<LightCode> for String {
    fn from(code: LightCode) -> Self {
        code.to_string()
    }
}

impl TryFrom<String> for LightCode {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.len() != 8 || !s.bytes().all(|b| b == b'0' || b == b'1') {
            return Err(format!("'{}' is not an 8-bit pattern", s));
        }
        let bits = u8::from_str_radix(&s, 2).map_err(|e| e.to_string())?;
        let code = LightCode(bits);
        if LightCode::from_level(code.level()) != code {
            return Err(format!("'{}' is not a bar-graph level", s));
        }
        Ok(code)
    }
}

/// Cached analysis result for one track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SongProfile {
    pub title: String,
    pub sample_rate: u32,
    /// Estimated tempo in BPM.
    pub tempo: f64,
    /// Track length in seconds.
    pub duration: f64,
    pub beat_timestamps: Vec<f64>,
    /// `chunk_durations[0]` is the time to the first beat.
    pub chunk_durations: Vec<f64>,
    pub band_edges: Vec<f64>,
    /// Chunk peak relative to the track peak, 0.0-1.0.
    pub volumes: Vec<f64>,
    /// `light_codes[chunk][band]`
    pub light_codes: Vec<Vec<LightCode>>,
}

impl SongProfile {
    pub fn chunk_count(&self) -> usize {
        self.light_codes.len()
    }

    pub fn band_count(&self) -> usize {
        self.band_edges.len().saturating_sub(1)
    }

    /// Checks the structural invariants. Used on every cache load.
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate is zero".into());
        }
        if self.band_edges.len() < 2 {
            return Err(format!("{} band edge(s)", self.band_edges.len()));
        }
        if self.chunk_durations.len() != self.beat_timestamps.len() {
            return Err(format!(
                "{} chunk durations for {} beats",
                self.chunk_durations.len(),
                self.beat_timestamps.len()
            ));
        }
        if self.chunk_durations.len() != self.light_codes.len() {
            return Err(format!(
                "{} chunk durations but {} light code rows",
                self.chunk_durations.len(),
                self.light_codes.len()
            ));
        }
        if self.volumes.len() != self.light_codes.len() {
            return Err(format!(
                "{} volumes but {} light code rows",
                self.volumes.len(),
                self.light_codes.len()
            ));
        }
        let bands = self.band_count();
        if let Some(row) = self.light_codes.iter().position(|r| r.len() != bands) {
            return Err(format!("chunk {} does not have {} bands", row, bands));
        }
        if self.beat_timestamps.windows(2).any(|w| w[1] <= w[0]) {
            return Err("beat timestamps are not strictly increasing".into());
        }
        if self.chunk_durations.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err("negative or non-finite chunk duration".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_render_leading_bits() {
        assert_eq!(LightCode::from_level(0).to_string(), "00000000");
        assert_eq!(LightCode::from_level(1).to_string(), "10000000");
        assert_eq!(LightCode::from_level(5).to_string(), "11111000");
        assert_eq!(LightCode::from_level(8).to_string(), "11111111");
        assert_eq!(LightCode::from_level(12), LightCode::ALL_SET);
        for level in 0..=8 {
            assert_eq!(LightCode::from_level(level).level(), level);
        }
    }

    #[test]
    fn shift_order_is_msb_first() {
        let bits: Vec<bool> = LightCode::from_level(2).shift_order().collect();
        assert_eq!(bits, vec![true, true, false, false, false, false, false, false]);
    }

    #[test]
    fn rejects_non_bar_patterns() {
        assert!(LightCode::try_from("10100000".to_string()).is_err());
        assert!(LightCode::try_from("1111".to_string()).is_err());
        assert!(LightCode::try_from("1111100x".to_string()).is_err());
        assert_eq!(
            LightCode::try_from("11100000".to_string()).unwrap(),
            LightCode::from_level(3)
        );
    }

    #[test]
    fn serializes_as_bit_string() {
        let json = serde_json::to_string(&vec![LightCode::from_level(4)]).unwrap();
        assert_eq!(json, r#"["11110000"]"#);
    }

    #[test]
    fn validate_catches_ragged_rows() {
        let mut profile = SongProfile {
            title: "t".into(),
            sample_rate: 22050,
            tempo: 120.0,
            duration: 2.0,
            beat_timestamps: vec![0.5, 1.0],
            chunk_durations: vec![0.5, 0.5],
            band_edges: vec![0.0, 110.0, 410.0],
            volumes: vec![1.0, 0.0],
            light_codes: vec![vec![LightCode::ALL_SET; 2], vec![LightCode::ALL_CLEAR; 2]],
        };
        assert!(profile.validate().is_ok());
        profile.light_codes[1].pop();
        assert!(profile.validate().is_err());
    }
}
