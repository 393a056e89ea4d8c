use crate::audio::config::TempoConfig;
use crate::audio::errors::UnknownTempo;
use crate::audio::types::TempoEstimate;
use rayon::prelude::*;
use rustfft::{FftPlanner, num_complex::Complex, num_traits::Zero};

/// Peak amplitude at or below which a buffer counts as silent.
const SILENCE_THRESHOLD: f32 = 1e-6;

// --- Private Helper Functions ---

fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    let sanitize = |x: f32| if x.is_finite() { x } else { 0.0 };
    if channels <= 1 {
        return samples.iter().copied().map(sanitize).collect();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().copied().map(sanitize).sum::<f32>() / channels as f32)
        .collect()
}

fn peak_amplitude(samples: &[f32]) -> f32 {
    samples
        .par_iter()
        .map(|&x| x.abs())
        .reduce(|| 0.0f32, f32::max)
}

fn normalize_in_place(samples: &mut [f32], max_amplitude: f32) {
    if max_amplitude > SILENCE_THRESHOLD {
        samples.par_iter_mut().for_each(|x| *x /= max_amplitude);
    }
}

fn downsample_in_place(samples: &mut Vec<f32>, factor: usize) {
    if factor <= 1 || samples.is_empty() {
        return;
    }

    let new_len = samples.len() / factor;
    if new_len == 0 {
        samples.clear();
        return;
    }

    for i in 0..new_len {
        samples[i] = samples[i * factor];
    }
    samples.truncate(new_len);
}

/// Onset envelope: summed positive magnitude differences between consecutive
/// Hann-windowed frames, normalized by its mean.
fn compute_spectral_flux(samples: &[f32], frame_size: usize, hop_size: usize) -> Vec<f32> {
    if samples.len() < frame_size {
        log::debug!(
            "BPM: Not enough samples ({}) for frame size ({}) to compute spectral flux.",
            samples.len(),
            frame_size
        );
        return Vec::new();
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(frame_size);
    let num_frames = (samples.len() - frame_size) / hop_size + 1;

    let hann_window: Vec<f32> = (0..frame_size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (frame_size - 1) as f32).cos())
        })
        .collect();

    let spectra: Vec<Vec<f32>> = (0..num_frames)
        .into_par_iter()
        .map(|i| {
            let start = i * hop_size;
            let frame = &samples[start..start + frame_size];

            let mut buffer: Vec<Complex<f32>> = vec![Complex::zero(); frame_size];
            for ((b, &s), &w) in buffer.iter_mut().zip(frame.iter()).zip(hann_window.iter()) {
                *b = Complex { re: s * w, im: 0.0 };
            }

            fft.process(&mut buffer);

            buffer[..frame_size / 2 + 1]
                .iter()
                .map(|c| c.norm())
                .collect()
        })
        .collect();

    let mut flux = vec![0.0; num_frames];
    if num_frames > 1 {
        flux[1..].par_iter_mut().enumerate().for_each(|(idx, f)| {
            let i = idx + 1;
            *f = spectra[i]
                .iter()
                .zip(spectra[i - 1].iter())
                .map(|(&curr, &prev)| (curr - prev).max(0.0))
                .sum();
        });
    }

    // Sequential sum keeps the result bit-identical across thread counts.
    let flux_mean = flux.iter().sum::<f32>() / num_frames as f32;
    if flux_mean > SILENCE_THRESHOLD {
        flux.par_iter_mut().for_each(|f| *f /= flux_mean);
    }

    flux
}

fn fft_autocorrelation(signal: &[f32], max_lag: usize) -> Vec<f32> {
    if signal.is_empty() || max_lag == 0 {
        return Vec::new();
    }

    let n = (signal.len() + max_lag).next_power_of_two();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    let mut buffer: Vec<Complex<f32>> = signal
        .iter()
        .map(|&x| Complex { re: x, im: 0.0 })
        .chain(std::iter::repeat(Complex::zero()).take(n - signal.len()))
        .collect();

    fft.process(&mut buffer);
    buffer.par_iter_mut().for_each(|c| *c = c.norm_sqr().into());
    ifft.process(&mut buffer);

    buffer[..max_lag.min(buffer.len())]
        .iter()
        .map(|c| c.re / n as f32)
        .collect()
}

fn smooth_three_point(values: &[f32]) -> Vec<f32> {
    if values.len() < 3 {
        return values.to_vec();
    }
    let mut smoothed = vec![0.0; values.len()];
    smoothed[0] = values[0];
    smoothed[values.len() - 1] = values[values.len() - 1];
    smoothed[1..values.len() - 1]
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, s)| *s = (values[i] + values[i + 1] + values[i + 2]) / 3.0);
    smoothed
}

/// Lag of maximal correlation in `min_lag..=max_lag`. Equal values resolve to
/// the longer lag, i.e. the slower tempo.
pub(crate) fn select_peak_lag(
    correlation: &[f32],
    min_lag: usize,
    max_lag: usize,
) -> Option<(usize, f32)> {
    let upper = max_lag.min(correlation.len().checked_sub(1)?);
    let mut best: Option<(usize, f32)> = None;
    for lag in min_lag..=upper {
        let value = correlation[lag];
        if !value.is_finite() {
            continue;
        }
        match best {
            Some((_, best_value)) if value < best_value => {}
            _ => best = Some((lag, value)),
        }
    }
    best
}

fn refine_lag(correlation: &[f32], peak: usize) -> f32 {
    if peak == 0 || peak + 1 >= correlation.len() {
        return peak as f32;
    }
    let y_minus_1 = correlation[peak - 1];
    let y_0 = correlation[peak];
    let y_plus_1 = correlation[peak + 1];
    let denominator = y_minus_1 - 2.0 * y_0 + y_plus_1;
    if denominator.abs() > 1e-6 {
        let p = 0.5 * (y_minus_1 - y_plus_1) / denominator;
        peak as f32 + p.clamp(-0.5, 0.5)
    } else {
        peak as f32
    }
}

// --- Public Estimator ---

/// Estimates tempo from PCM by autocorrelating a spectral-flux onset
/// envelope over the lags that map into the configured BPM range.
///
/// Pure and deterministic: the same samples and config always give the same
/// estimate, and a detected BPM always lies within `min_bpm..=max_bpm`.
#[derive(Debug, Clone, Default)]
pub struct TempoEstimator {
    config: TempoConfig,
}

impl TempoEstimator {
    pub fn new(config: TempoConfig) -> Self {
        TempoEstimator { config }
    }

    pub fn config(&self) -> &TempoConfig {
        &self.config
    }

    pub fn estimate_mono(&self, samples: &[f32], sample_rate: f32) -> TempoEstimate {
        self.estimate(samples, 1, sample_rate)
    }

    /// `samples` are interleaved with `channels` channels.
    pub fn estimate(&self, samples: &[f32], channels: usize, sample_rate: f32) -> TempoEstimate {
        match self.analyze(samples, channels, sample_rate) {
            Ok((bpm, confidence)) => {
                log::debug!("BPM: Detected {} BPM (confidence {:.3})", bpm, confidence);
                TempoEstimate::Detected { bpm, confidence }
            }
            Err(reason) => {
                log::debug!("BPM: Tempo unknown: {}", reason);
                TempoEstimate::Unknown(reason)
            }
        }
    }

    fn analyze(
        &self,
        samples: &[f32],
        channels: usize,
        sample_rate: f32,
    ) -> Result<(u32, f32), UnknownTempo> {
        if samples.is_empty() {
            return Err(UnknownTempo::EmptyInput);
        }
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(UnknownTempo::InvalidSampleRate(sample_rate));
        }
        let cfg = &self.config;
        let frame_size = cfg.frame_size.max(2);
        let hop_size = cfg.hop_size.clamp(1, frame_size);
        let downsample_factor = cfg.downsample_factor.max(1);

        let mut processed = downmix_to_mono(samples, channels);
        let max_amplitude = peak_amplitude(&processed);
        if max_amplitude <= SILENCE_THRESHOLD {
            return Err(UnknownTempo::Silent);
        }
        normalize_in_place(&mut processed, max_amplitude);
        downsample_in_place(&mut processed, downsample_factor);

        let effective_sample_rate = sample_rate / downsample_factor as f32;
        let frames_per_second = effective_sample_rate / hop_size as f32;

        let min_lag = (60.0 * frames_per_second / cfg.max_bpm as f32).ceil() as usize;
        let max_lag = (60.0 * frames_per_second / cfg.min_bpm.max(1) as f32).floor() as usize;
        if min_lag == 0 || max_lag <= min_lag {
            return Err(UnknownTempo::InvalidLagRange { min_lag, max_lag });
        }

        // Two full periods of the slowest tempo.
        let required_frames = max_lag * 2;
        let flux = compute_spectral_flux(&processed, frame_size, hop_size);
        if flux.len() < required_frames {
            return Err(UnknownTempo::TooShort {
                flux_frames: flux.len(),
                required_frames,
            });
        }

        let mean = flux.iter().sum::<f32>() / flux.len() as f32;
        let centered: Vec<f32> = flux.iter().map(|f| f - mean).collect();

        let ac = fft_autocorrelation(&centered, max_lag + 2);
        let energy = ac.first().copied().unwrap_or(0.0);
        if !(energy > f32::EPSILON) {
            return Err(UnknownTempo::NoPeriodicity { confidence: 0.0 });
        }
        let normalized: Vec<f32> = ac.iter().map(|v| v / energy).collect();
        let smoothed = smooth_three_point(&normalized);

        let (peak_lag, confidence) = select_peak_lag(&smoothed, min_lag, max_lag)
            .ok_or(UnknownTempo::NoPeriodicity { confidence: 0.0 })?;
        if confidence < cfg.min_confidence {
            return Err(UnknownTempo::NoPeriodicity { confidence });
        }

        let refined_lag = refine_lag(&smoothed, peak_lag);
        let raw_bpm = 60.0 * frames_per_second / refined_lag;
        let bpm = raw_bpm
            .clamp(cfg.min_bpm as f32, cfg.max_bpm as f32)
            .round() as u32;
        Ok((bpm.clamp(cfg.min_bpm, cfg.max_bpm), confidence.min(1.0)))
    }
}

/// Estimates the tempo of a mono buffer with the default 60..200 BPM range.
pub fn estimate_bpm(samples: &[f32], sample_rate: f32) -> TempoEstimate {
    TempoEstimator::default().estimate_mono(samples, sample_rate)
}
