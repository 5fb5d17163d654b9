use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::AnalysisError;

/// Beat-tracking primitive. Implementations must be deterministic for a
/// given input.
pub trait BeatTracker: Send + Sync {
    /// Returns `(tempo_bpm, beat_times_in_seconds)`.
    fn track(&self, samples: &[f32], sample_rate: u32) -> (f64, Vec<f64>);
}

/// Beat onsets and the inter-beat chunk durations derived from them.
#[derive(Clone, Debug, PartialEq)]
pub struct BeatGrid {
    pub tempo: f64,
    pub timestamps: Vec<f64>,
    pub durations: Vec<f64>,
}

/// Run the tracker and derive chunk durations.
///
/// Tracker output is sanitized (negative, non-finite and non-increasing
/// times are dropped) before the 2-beat minimum is checked.
pub fn segment(
    samples: &[f32],
    sample_rate: u32,
    tracker: &dyn BeatTracker,
) -> Result<BeatGrid, AnalysisError> {
    if samples.is_empty() || sample_rate == 0 {
        return Err(AnalysisError::EmptyAudio);
    }

    let (tempo, raw) = tracker.track(samples, sample_rate);

    let mut timestamps: Vec<f64> = Vec::with_capacity(raw.len());
    for t in raw {
        if !t.is_finite() || t < 0.0 {
            continue;
        }
        if timestamps.last().map_or(true, |&last| t > last) {
            timestamps.push(t);
        }
    }

    if timestamps.len() < 2 {
        return Err(AnalysisError::NoBeatsDetected {
            found: timestamps.len(),
        });
    }

    let durations = chunk_durations(&timestamps);
    log::info!(
        "Beat grid: {} beats, first at {:.3}s, tempo {:.1} BPM",
        timestamps.len(),
        timestamps[0],
        tempo
    );

    Ok(BeatGrid {
        tempo,
        timestamps,
        durations,
    })
}

/// `[t0, t1 - t0, t2 - t1, ...]`
pub fn chunk_durations(timestamps: &[f64]) -> Vec<f64> {
    let Some(&first) = timestamps.first() else {
        return Vec::new();
    };
    std::iter::once(first)
        .chain(timestamps.windows(2).map(|w| w[1] - w[0]))
        .collect()
}

const FFT_SIZE: usize = 2048;
const HOP_SIZE: usize = 1024;

/// Onset tracker: Hann-windowed spectral flux with a local adaptive
/// threshold, peaks at least 100ms apart.
#[derive(Clone, Debug)]
pub struct SpectralFluxTracker {
    /// Frames either side of the current one used for the local mean.
    pub window: usize,
    pub threshold_scale: f32,
    pub min_gap: f64,
}

impl Default for SpectralFluxTracker {
    fn default() -> Self {
        Self {
            window: 20,
            threshold_scale: 1.5,
            min_gap: 0.1,
        }
    }
}

impl BeatTracker for SpectralFluxTracker {
    fn track(&self, samples: &[f32], sample_rate: u32) -> (f64, Vec<f64>) {
        let flux = flux_curve(samples, sample_rate);
        let beats = self.pick_peaks(&flux);
        (estimate_tempo(&beats), beats)
    }
}

impl SpectralFluxTracker {
    fn pick_peaks(&self, flux_values: &[(f64, f32)]) -> Vec<f64> {
        let mut beat_times: Vec<f64> = Vec::new();

        for i in 0..flux_values.len() {
            let start = i.saturating_sub(self.window);
            let end = (i + self.window + 1).min(flux_values.len());
            let local_mean: f32 = flux_values[start..end].iter().map(|(_, f)| f).sum::<f32>()
                / (end - start) as f32;

            let threshold = local_mean * self.threshold_scale + 0.01;
            let (time, flux) = flux_values[i];
            if flux <= threshold {
                continue;
            }

            let is_peak = (i == 0 || flux >= flux_values[i - 1].1)
                && (i == flux_values.len() - 1 || flux >= flux_values[i + 1].1);
            let far_enough = beat_times
                .last()
                .map_or(true, |&last| time - last > self.min_gap);

            if is_peak && far_enough {
                beat_times.push(time);
            }
        }

        beat_times
    }
}

fn flux_curve(samples: &[f32], sample_rate: u32) -> Vec<(f64, f32)> {
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FFT_SIZE);
    let hann = hann_window(FFT_SIZE);

    let mut prev_magnitudes = vec![0.0f32; FFT_SIZE / 2];
    let mut flux_values = Vec::new();

    let mut pos = 0;
    while pos + FFT_SIZE <= samples.len() {
        let mut buffer: Vec<Complex<f32>> = samples[pos..pos + FFT_SIZE]
            .iter()
            .zip(&hann)
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        fft.process(&mut buffer);

        let magnitudes: Vec<f32> = buffer[..FFT_SIZE / 2].iter().map(|c| c.norm()).collect();
        let flux: f32 = magnitudes
            .iter()
            .zip(&prev_magnitudes)
            .map(|(cur, prev)| (cur - prev).max(0.0))
            .sum();

        flux_values.push((pos as f64 / sample_rate as f64, flux));
        prev_magnitudes = magnitudes;
        pos += HOP_SIZE;
    }

    flux_values
}

/// Median of the inter-beat intervals that fall in 60-200 BPM.
pub fn estimate_tempo(beat_times: &[f64]) -> f64 {
    let mut reasonable: Vec<f64> = beat_times
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|&i| (0.3..=1.0).contains(&i))
        .collect();

    if reasonable.is_empty() {
        return 120.0;
    }

    reasonable.sort_by(|a, b| a.total_cmp(b));
    60.0 / reasonable[reasonable.len() / 2]
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos()))
        .collect()
}
