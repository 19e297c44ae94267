//! Live frequency-domain snapshots and band extraction.
//!
//! `SpectrumSource` turns the transport's sample tap into fixed-size byte
//! magnitude snapshots with analyser-style temporal smoothing; with no
//! audio attached every bin reads zero. `FrequencyAnalysis` reduces a
//! snapshot to the scalar bass/mid/treble/average bands that drive the
//! visualization.

use std::f32::consts::PI;

use anyhow::{anyhow, Result};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::params::{BandRanges, SpectrumConfig};
use crate::transport::SampleTap;

/// Hann window function
fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}

/// Produces byte magnitude snapshots of whatever audio currently flows
/// through the attached sample tap.
pub struct SpectrumSource {
    config: SpectrumConfig,
    tap: Option<SampleTap>,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    time_buf: Vec<f32>,
    fft_buf: Vec<Complex<f32>>,
    /// Linear magnitudes smoothed across snapshots
    smoothed: Vec<f32>,
    snapshot: Vec<u8>,
}

impl SpectrumSource {
    pub fn new(config: SpectrumConfig) -> Result<Self> {
        config.validate().map_err(|e| anyhow!(e))?;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.fft_size);
        let window = (0..config.fft_size)
            .map(|i| hann_window(i, config.fft_size))
            .collect();
        let bins = config.bins();

        Ok(Self {
            tap: None,
            fft,
            window,
            time_buf: vec![0.0; config.fft_size],
            fft_buf: vec![Complex::new(0.0, 0.0); config.fft_size],
            smoothed: vec![0.0; bins],
            snapshot: vec![0; bins],
            config,
        })
    }

    /// Attach (or detach) the live sample feed.
    pub fn attach(&mut self, tap: Option<SampleTap>) {
        self.tap = tap;
    }

    pub fn bins(&self) -> usize {
        self.config.bins()
    }

    /// Compute the current snapshot: per-bin magnitudes mapped onto
    /// 0..=255 through the configured dB window.
    ///
    /// With no tap attached the smoothed state decays toward zero, so the
    /// snapshot settles at all-zero rather than erroring.
    pub fn snapshot(&mut self) -> &[u8] {
        self.time_buf.fill(0.0);
        if let Some(tap) = &self.tap {
            tap.latest(&mut self.time_buf);
        }

        for (i, sample) in self.time_buf.iter().enumerate() {
            self.fft_buf[i] = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.fft_buf);

        let tau = self.config.smoothing;
        let half = self.config.fft_size as f32 / 2.0;
        let db_span = self.config.max_decibels - self.config.min_decibels;

        for k in 0..self.config.bins() {
            let magnitude = self.fft_buf[k].norm() / half;
            self.smoothed[k] = tau * self.smoothed[k] + (1.0 - tau) * magnitude;

            let db = 20.0 * (self.smoothed[k] + 1e-12).log10();
            let level = ((db - self.config.min_decibels) / db_span).clamp(0.0, 1.0);
            self.snapshot[k] = (level * 255.0) as u8;
        }

        &self.snapshot
    }
}

/// Aggregated scalar band energies, each normalized to [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrequencyBands {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub average: f32,
}

/// Pure snapshot-to-bands reduction. Band ranges are ratios of the
/// snapshot length, so the same analysis works at any FFT resolution.
pub struct FrequencyAnalysis {
    ranges: BandRanges,
}

impl FrequencyAnalysis {
    pub fn new(ranges: BandRanges) -> Self {
        Self { ranges }
    }

    pub fn sample(&self, spectrum: &[u8]) -> FrequencyBands {
        let bins = spectrum.len();
        FrequencyBands {
            bass: mean(&spectrum[self.ranges.resolve(self.ranges.bass, bins)]),
            mid: mean(&spectrum[self.ranges.resolve(self.ranges.mid, bins)]),
            treble: mean(&spectrum[self.ranges.resolve(self.ranges.treble, bins)]),
            average: mean(spectrum),
        }
    }
}

impl Default for FrequencyAnalysis {
    fn default() -> Self {
        Self::new(BandRanges::default())
    }
}

/// Mean of a byte slice normalized by the magnitude ceiling. Empty slices
/// divide by 1 and yield zero.
fn mean(slice: &[u8]) -> f32 {
    let sum: u32 = slice.iter().map(|&b| b as u32).sum();
    sum as f32 / slice.len().max(1) as f32 / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window_shape() {
        let size = 2048;
        assert!(hann_window(0, size).abs() < 0.01);
        assert!((hann_window(size - 1, size)).abs() < 0.01);
        assert!((hann_window(size / 2, size) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_zero_spectrum_yields_zero_bands() {
        let analysis = FrequencyAnalysis::default();
        let bands = analysis.sample(&[0u8; 1024]);
        assert_eq!(bands, FrequencyBands::default());
    }

    #[test]
    fn test_saturated_bass_range_normalizes_to_one() {
        let analysis = FrequencyAnalysis::default();
        let mut spectrum = [0u8; 1024];
        for bin in spectrum.iter_mut().take(50) {
            *bin = 255;
        }

        let bands = analysis.sample(&spectrum);
        assert!((bands.bass - 1.0).abs() < 1e-6);
        assert_eq!(bands.treble, 0.0);
        assert!((bands.average - 50.0 / 1024.0).abs() < 1e-4);
    }

    #[test]
    fn test_band_ranges_rescale_with_snapshot_size() {
        let analysis = FrequencyAnalysis::default();

        // At 512 bins the bass range is 0..25.
        let mut spectrum = [0u8; 512];
        for bin in spectrum.iter_mut().take(25) {
            *bin = 255;
        }
        let bands = analysis.sample(&spectrum);
        assert!((bands.bass - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_spectrum_is_guarded() {
        let analysis = FrequencyAnalysis::default();
        let bands = analysis.sample(&[]);
        assert_eq!(bands, FrequencyBands::default());
    }

    #[test]
    fn test_detached_source_snapshots_zero() {
        let mut source = SpectrumSource::new(SpectrumConfig::default()).unwrap();
        let snapshot = source.snapshot();
        assert_eq!(snapshot.len(), 1024);
        assert!(snapshot.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_tone_raises_matching_bin() {
        let config = SpectrumConfig::default();
        let fft_size = config.fft_size;
        let mut source = SpectrumSource::new(config).unwrap();

        let tap = SampleTap::new();
        source.attach(Some(tap.clone()));

        // A full-scale sinusoid exactly on bin 64.
        let tone: Vec<f32> = (0..fft_size)
            .map(|i| (2.0 * PI * 64.0 * i as f32 / fft_size as f32).sin())
            .collect();
        tap_feed(&tap, &tone);

        // Several snapshots let the smoothing converge upward.
        let mut peak_bin = 0;
        for _ in 0..40 {
            let snapshot = source.snapshot();
            peak_bin = snapshot
                .iter()
                .enumerate()
                .max_by_key(|(_, &v)| v)
                .map(|(i, _)| i)
                .unwrap();
        }
        assert!((63..=65).contains(&peak_bin), "peak at bin {peak_bin}");
    }

    fn tap_feed(tap: &SampleTap, samples: &[f32]) {
        // Route through a TapSource the way the transport does.
        use crate::transport::TapSource;
        use rodio::buffer::SamplesBuffer;
        let buffer = SamplesBuffer::new(1, 44_100, samples.to_vec());
        let source = TapSource::new(buffer, tap.clone());
        let _: Vec<f32> = source.collect();
    }
}
