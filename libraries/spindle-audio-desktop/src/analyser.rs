//! Frequency spectrum of the audio being played
//!
//! The audio callback pushes a mono mixdown of every output frame into a
//! small ring (`SpectrumTap`); the UI side runs an FFT over the most recent
//! window on demand. Bin magnitudes are mapped from a fixed decibel range to
//! `0..=255`, one byte per bin.

use crate::error::{AudioError, Result};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Magnitude mapped to byte 0
const MIN_DECIBELS: f32 = -100.0;

/// Magnitude mapped to byte 255
const MAX_DECIBELS: f32 = -30.0;

/// Analyser settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// FFT window length in frames; a power of two (default: 128)
    pub fft_size: usize,
}

impl SpectrumConfig {
    /// Number of frequency bins produced
    pub fn bins(&self) -> usize {
        self.fft_size / 2
    }

    /// Check the window length
    pub fn validate(&self) -> Result<()> {
        if self.fft_size < 32 || !self.fft_size.is_power_of_two() {
            return Err(AudioError::InvalidSpectrum(format!(
                "fft_size must be a power of two >= 32, got {}",
                self.fft_size
            )));
        }
        Ok(())
    }
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self { fft_size: 128 }
    }
}

/// Most recent mono samples written by the audio callback
#[derive(Debug)]
pub(crate) struct SpectrumTap {
    recent: Mutex<VecDeque<f32>>,
    capacity: usize,
}

impl SpectrumTap {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append samples without blocking; dropped if the reader holds the lock
    pub(crate) fn push(&self, samples: impl IntoIterator<Item = f32>) {
        let Ok(mut recent) = self.recent.try_lock() else {
            return;
        };
        for sample in samples {
            if recent.len() == self.capacity {
                recent.pop_front();
            }
            recent.push_back(sample);
        }
    }

    /// Copy of the buffered samples, oldest first
    pub(crate) fn snapshot(&self) -> Vec<f32> {
        self.recent
            .lock()
            .map(|recent| recent.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Forget buffered samples
    pub(crate) fn clear(&self) {
        if let Ok(mut recent) = self.recent.lock() {
            recent.clear();
        }
    }
}

/// FFT over the most recent output window
pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl SpectrumAnalyser {
    /// Create an analyser for `config`
    pub fn new(config: &SpectrumConfig) -> Result<Self> {
        config.validate()?;
        let size = config.fft_size;
        let fft = FftPlanner::new().plan_fft_forward(size);
        // Hann window
        let window = (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
            .collect();
        Ok(Self { fft, window })
    }

    /// Window length in frames
    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    /// Byte spectrum of the last `fft_size` samples of `recent`
    ///
    /// Shorter input is zero-padded at the front.
    pub fn analyse(&self, recent: &[f32]) -> Vec<u8> {
        let size = self.fft_size();
        let tail = &recent[recent.len().saturating_sub(size)..];
        let padding = size - tail.len();

        let mut bins: Vec<Complex<f32>> = std::iter::repeat(0.0)
            .take(padding)
            .chain(tail.iter().copied())
            .zip(&self.window)
            .map(|(sample, weight)| Complex::new(sample * weight, 0.0))
            .collect();

        self.fft.process(&mut bins);

        let norm = 1.0 / size as f32;
        bins[..size / 2]
            .iter()
            .map(|bin| to_byte(bin.norm() * norm))
            .collect()
    }
}

impl std::fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &self.fft_size())
            .finish()
    }
}

/// Map a linear magnitude onto `0..=255` over the decibel range
fn to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS) * 255.0;
    scaled.clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate).sin() * 0.9)
            .collect()
    }

    #[test]
    fn default_config_has_64_bins() {
        let config = SpectrumConfig::default();
        assert_eq!(config.bins(), 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_power_of_two() {
        let config = SpectrumConfig { fft_size: 100 };
        assert!(matches!(
            SpectrumAnalyser::new(&config),
            Err(AudioError::InvalidSpectrum(_))
        ));
    }

    #[test]
    fn silence_is_all_zero() {
        let analyser = SpectrumAnalyser::new(&SpectrumConfig::default()).unwrap();
        let spectrum = analyser.analyse(&[0.0; 512]);
        assert_eq!(spectrum.len(), 64);
        assert!(spectrum.iter().all(|&b| b == 0));
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        let analyser = SpectrumAnalyser::new(&SpectrumConfig::default()).unwrap();
        // 128-point FFT at 12.8 kHz: 100 Hz per bin, 1 kHz lands in bin 10
        let spectrum = analyser.analyse(&sine(1_000.0, 12_800.0, 128));

        assert_eq!(spectrum[10], 255);
        // Hann leakage of a bin-centred tone stays in the neighbouring bins
        assert!(spectrum[0] < 50);
        assert!(spectrum[30] < 50);
    }

    #[test]
    fn short_input_is_padded() {
        let analyser = SpectrumAnalyser::new(&SpectrumConfig::default()).unwrap();
        assert_eq!(analyser.analyse(&[0.5; 10]).len(), 64);
        assert_eq!(analyser.analyse(&[]).len(), 64);
    }

    #[test]
    fn tap_keeps_most_recent_samples() {
        let tap = SpectrumTap::new(4);
        tap.push([1.0, 2.0, 3.0]);
        tap.push([4.0, 5.0]);
        assert_eq!(tap.snapshot(), vec![2.0, 3.0, 4.0, 5.0]);

        tap.clear();
        assert!(tap.snapshot().is_empty());
    }
}
