use crate::profile::LightCode;

/// Lower bound of each level above 0. Level 1 starts at 0.05, the rest at
/// multiples of 0.125.
const THRESHOLDS: [f32; 8] = [0.05, 0.125, 0.25, 0.375, 0.5, 0.625, 0.75, 0.875];

/// Map a normalized intensity to a bar-graph level (0-8).
///
/// Values below 0 (and NaN) land on level 0, values above 1 on level 8.
pub fn level(value: f32) -> u8 {
    THRESHOLDS.iter().take_while(|&&t| value >= t).count() as u8
}

pub fn quantize(value: f32) -> LightCode {
    LightCode::from_level(level(value))
}
