use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use super::beats::{self, BeatTracker};
use super::decode::AudioData;
use super::quantize::quantize;
use crate::error::AnalysisError;
use crate::profile::{LightCode, SongProfile};

/// Per-chunk analysis output.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkAnalysis {
    pub volume: f32,
    pub codes: Vec<LightCode>,
}

pub fn validate_band_edges(edges: &[f64]) -> Result<(), AnalysisError> {
    if edges.len() < 2 {
        return Err(AnalysisError::InvalidBandConfig(format!(
            "need at least 2 edges, got {}",
            edges.len()
        )));
    }
    if edges.iter().any(|e| !e.is_finite() || *e < 0.0) {
        return Err(AnalysisError::InvalidBandConfig(
            "edges must be finite and non-negative".into(),
        ));
    }
    if let Some(w) = edges.windows(2).find(|w| w[1] <= w[0]) {
        return Err(AnalysisError::InvalidBandConfig(format!(
            "edges must be strictly increasing ({} then {})",
            w[0], w[1]
        )));
    }
    Ok(())
}

/// Full pipeline: beat segmentation, per-chunk spectra, quantization.
pub fn analyze(
    title: &str,
    audio: &AudioData,
    band_edges: &[f64],
    tracker: &dyn BeatTracker,
) -> Result<SongProfile, AnalysisError> {
    validate_band_edges(band_edges)?;
    let grid = beats::segment(&audio.samples, audio.sample_rate, tracker)?;

    log::info!("Analyzing {} chunks of '{}'...", grid.timestamps.len(), title);
    let chunks = analyze_chunks(&audio.samples, audio.sample_rate, &grid.timestamps, band_edges);

    let profile = SongProfile {
        title: title.to_string(),
        sample_rate: audio.sample_rate,
        tempo: grid.tempo,
        duration: audio.duration(),
        beat_timestamps: grid.timestamps,
        chunk_durations: grid.durations,
        band_edges: band_edges.to_vec(),
        volumes: chunks.iter().map(|c| c.volume as f64).collect(),
        light_codes: chunks.into_iter().map(|c| c.codes).collect(),
    };
    debug_assert!(profile.validate().is_ok());
    Ok(profile)
}

/// Analyze chunk `c` over `[timestamps[c], timestamps[c + 1])`.
///
/// The chunk after the last beat has no closing boundary and is not
/// analyzed: it keeps volume 0 and all-clear codes so every beat still has
/// a row.
pub fn analyze_chunks(
    samples: &[f32],
    sample_rate: u32,
    timestamps: &[f64],
    band_edges: &[f64],
) -> Vec<ChunkAnalysis> {
    let bands = band_edges.len().saturating_sub(1);
    if timestamps.is_empty() {
        return Vec::new();
    }

    let track_peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    let bounded = timestamps.len() - 1;

    let pb = ProgressBar::new(bounded as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} chunks")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    let mut chunks: Vec<ChunkAnalysis> = (0..bounded)
        .into_par_iter()
        .map(|c| {
            let chunk = analyze_chunk(
                samples,
                sample_rate,
                timestamps[c],
                timestamps[c + 1],
                band_edges,
                track_peak,
            );
            pb.inc(1);
            chunk
        })
        .collect();
    pb.finish_and_clear();

    chunks.push(ChunkAnalysis {
        volume: 0.0,
        codes: vec![LightCode::ALL_CLEAR; bands],
    });
    chunks
}

fn analyze_chunk(
    samples: &[f32],
    sample_rate: u32,
    start: f64,
    end: f64,
    band_edges: &[f64],
    track_peak: f32,
) -> ChunkAnalysis {
    let n1 = ((start * sample_rate as f64).round() as usize).min(samples.len());
    let n2 = ((end * sample_rate as f64).round() as usize).clamp(n1, samples.len());
    let window = &samples[n1..n2];

    let chunk_peak = window.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    let volume = if track_peak > 0.0 {
        (chunk_peak / track_peak).min(1.0)
    } else {
        0.0
    };

    let spectrum = magnitude_spectrum(window);
    let span = end - start;
    let averages: Vec<f32> = band_edges
        .windows(2)
        .map(|edge| band_average(&spectrum, edge[0] * span, edge[1] * span))
        .collect();

    ChunkAnalysis {
        volume,
        codes: weight_and_quantize(&averages, volume),
    }
}

/// Lower (non-redundant) half of the DFT magnitude spectrum. Bin `k` of a
/// window lasting `T` seconds sits at `k / T` Hz.
fn magnitude_spectrum(window: &[f32]) -> Vec<f32> {
    let n = window.len();
    if n < 2 {
        return Vec::new();
    }

    // Per-call planner (rayon-safe)
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n);
    let mut buffer: Vec<Complex<f32>> = window.iter().map(|&s| Complex::new(s, 0.0)).collect();
    fft.process(&mut buffer);

    buffer[..n / 2].iter().map(|c| c.norm()).collect()
}

/// Mean magnitude over bins `[floor(lo), floor(hi))`, clamped to the
/// spectrum. Empty ranges average to 0.
fn band_average(spectrum: &[f32], lo: f64, hi: f64) -> f32 {
    let lo = (lo.floor() as usize).min(spectrum.len());
    let hi = (hi.floor() as usize).min(spectrum.len());
    if lo >= hi {
        return 0.0;
    }
    spectrum[lo..hi].iter().sum::<f32>() / (hi - lo) as f32
}

/// Normalize band averages to the chunk's strongest band, scale by the
/// chunk volume and quantize. A silent chunk is all-clear.
pub fn weight_and_quantize(averages: &[f32], volume: f32) -> Vec<LightCode> {
    let max = averages.iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return vec![LightCode::ALL_CLEAR; averages.len()];
    }
    averages
        .iter()
        .map(|&avg| quantize(avg / max * volume))
        .collect()
}
