//! Zero-phase Butterworth low-pass filter
//!
//! A single second-order section designed with the bilinear transform
//! (pre-warped cutoff), run forward then backward so the output has no phase
//! lag. Edges are handled the usual way: the signal is extended by odd
//! reflection and both passes start from the filter's steady state for the
//! first sample they see.

use crate::{MocapError, Result};

/// Reflection length used at each edge for long signals.
const DEFAULT_PAD: usize = 9;

/// Second-order low-pass section (`a0` normalized to 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPassFilter {
    b: [f64; 3],
    a: [f64; 2],
}

impl LowPassFilter {
    /// Design a 2nd-order Butterworth low-pass.
    ///
    /// `cutoff_hz` must lie strictly between 0 and the Nyquist frequency.
    pub fn butterworth(cutoff_hz: f64, sample_rate_hz: f64) -> Result<Self> {
        let nyquist = sample_rate_hz / 2.0;
        if !(sample_rate_hz > 0.0 && cutoff_hz > 0.0 && cutoff_hz < nyquist) {
            return Err(MocapError::configuration(format!(
                "Low-pass cutoff {} Hz must be between 0 and the Nyquist frequency {} Hz",
                cutoff_hz, nyquist
            )));
        }

        let k = (std::f64::consts::PI * cutoff_hz / sample_rate_hz).tan();
        let k2 = k * k;
        let sqrt2_k = std::f64::consts::SQRT_2 * k;
        let norm = 1.0 / (1.0 + sqrt2_k + k2);

        let b0 = k2 * norm;
        Ok(Self {
            b: [b0, 2.0 * b0, b0],
            a: [2.0 * (k2 - 1.0) * norm, (1.0 - sqrt2_k + k2) * norm],
        })
    }

    /// Numerator `[b0, b1, b2]`.
    pub fn numerator(&self) -> [f64; 3] {
        self.b
    }

    /// Denominator `[1, a1, a2]`.
    pub fn denominator(&self) -> [f64; 3] {
        [1.0, self.a[0], self.a[1]]
    }

    /// State that makes a constant input of 1.0 produce a constant output.
    fn steady_state(&self) -> [f64; 2] {
        let [b0, b1, b2] = self.b;
        let [a1, a2] = self.a;
        let r0 = b1 - a1 * b0;
        let r1 = b2 - a2 * b0;
        let z0 = (r0 + r1) / (1.0 + a1 + a2);
        [z0, r1 - a2 * z0]
    }

    /// One causal pass (transposed direct form II) from initial state `z`.
    fn run(&self, input: impl Iterator<Item = f64>, mut z: [f64; 2]) -> Vec<f64> {
        let [b0, b1, b2] = self.b;
        let [a1, a2] = self.a;
        input
            .map(|x| {
                let y = b0 * x + z[0];
                z[0] = b1 * x - a1 * y + z[1];
                z[1] = b2 * x - a2 * y;
                y
            })
            .collect()
    }

    /// Forward-backward filtering with odd-reflection padding.
    ///
    /// Output has the same length as `signal`. Signals shorter than two
    /// samples are returned unchanged.
    pub fn filtfilt(&self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        if n < 2 {
            return signal.to_vec();
        }

        let pad = DEFAULT_PAD.min(n - 1);
        let first = signal[0];
        let last = signal[n - 1];

        let mut extended = Vec::with_capacity(n + 2 * pad);
        extended.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
        extended.extend_from_slice(signal);
        extended.extend((n - 1 - pad..n - 1).rev().map(|i| 2.0 * last - signal[i]));

        let zi = self.steady_state();
        let scaled = |v: f64| [zi[0] * v, zi[1] * v];

        let forward = self.run(extended.iter().copied(), scaled(extended[0]));
        let tail = forward[forward.len() - 1];
        let mut backward = self.run(forward.iter().rev().copied(), scaled(tail));
        backward.reverse();

        backward[pad..pad + n].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!((actual - expected).abs() < tolerance, "{} != {} (±{})", actual, expected, tolerance);
    }

    #[test]
    fn coefficients_for_ten_hz_at_120() {
        let filter = LowPassFilter::butterworth(10.0, 120.0).unwrap();
        let b = filter.numerator();
        let a = filter.denominator();
        assert_close(b[0], 0.049_489_956, 1e-8);
        assert_close(b[1], 0.098_979_913, 1e-8);
        assert_close(b[2], 0.049_489_956, 1e-8);
        assert_eq!(a[0], 1.0);
        assert_close(a[1], -1.279_632_425, 1e-8);
        assert_close(a[2], 0.477_592_250, 1e-8);
        // Unity gain at DC.
        assert_close(b.iter().sum::<f64>() / a.iter().sum::<f64>(), 1.0, 1e-12);
    }

    #[test]
    fn cutoff_must_be_below_nyquist() {
        assert!(LowPassFilter::butterworth(60.0, 120.0).is_err());
        assert!(LowPassFilter::butterworth(0.0, 120.0).is_err());
        assert!(LowPassFilter::butterworth(10.0, 0.0).is_err());
        assert!(LowPassFilter::butterworth(59.9, 120.0).is_ok());
    }

    #[test]
    fn constant_signal_is_unchanged() {
        let filter = LowPassFilter::butterworth(10.0, 120.0).unwrap();
        for len in [2, 3, 5, 10, 40] {
            let out = filter.filtfilt(&vec![250.0; len]);
            assert_eq!(out.len(), len);
            for v in out {
                assert_close(v, 250.0, 1e-9);
            }
        }
    }

    #[test]
    fn symmetric_pulse_keeps_its_peak_position() {
        let filter = LowPassFilter::butterworth(10.0, 120.0).unwrap();
        let mut signal = vec![0.0; 41];
        signal[20] = 100.0;
        let out = filter.filtfilt(&signal);

        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 20);
        assert!(out[20] < 100.0);
        assert_close(out[19], out[21], 1e-6);
    }

    #[test]
    fn alternating_signal_is_attenuated() {
        let filter = LowPassFilter::butterworth(10.0, 120.0).unwrap();
        let signal: Vec<f64> = (0..60).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let out = filter.filtfilt(&signal);
        let middle_peak = out[15..45].iter().fold(0.0f64, |m, v| m.max(v.abs()));
        assert!(middle_peak < 0.05, "residual {}", middle_peak);
    }

    #[test]
    fn matches_reference_zero_phase_output() {
        // Butterworth designed from analog prototype poles, steady state
        // from the lfilter_zi linear solve, 9-sample odd padding.
        let filter = LowPassFilter::butterworth(10.0, 120.0).unwrap();
        let signal = [0.0, 5.0, 3.0, 9.0, 12.0, 10.0, 16.0, 21.0, 18.0, 25.0, 30.0, 27.0];
        let expected = [
            -0.018_343_418_5,
            2.670_597_709_5,
            5.336_223_285_2,
            7.982_792_879_7,
            10.618_529_631_7,
            13.258_641_360_3,
            15.903_302_287_7,
            18.500_507_536_7,
            20.977_363_518_5,
            23.271_000_875_8,
            25.338_181_194_5,
            27.235_543_789_4,
        ];
        for (actual, expected) in filter.filtfilt(&signal).into_iter().zip(expected) {
            assert_close(actual, expected, 1e-8);
        }
    }

    #[test]
    fn steady_state_gain_is_squared_butterworth_response() {
        let filter = LowPassFilter::butterworth(10.0, 120.0).unwrap();
        let response = |hz: f64| {
            let ratio = (PI * hz / 120.0).tan() / (PI * 10.0 / 120.0).tan();
            1.0 / (1.0 + ratio.powi(4))
        };

        // 10 Hz and 30 Hz sines both sample their peaks at 120 Hz.
        for hz in [10.0, 30.0] {
            let signal: Vec<f64> =
                (0..480).map(|i| (2.0 * PI * hz * i as f64 / 120.0).sin()).collect();
            let out = filter.filtfilt(&signal);
            let amplitude = out[200..280].iter().fold(0.0f64, |m, v| m.max(v.abs()));
            assert_close(amplitude, response(hz), 1e-9);
        }
        assert_close(response(10.0), 0.5, 1e-12);
    }

    #[test]
    fn trivial_lengths_pass_through() {
        let filter = LowPassFilter::butterworth(10.0, 120.0).unwrap();
        assert!(filter.filtfilt(&[]).is_empty());
        assert_eq!(filter.filtfilt(&[3.5]), vec![3.5]);
    }
}
