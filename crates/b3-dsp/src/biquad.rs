//! Second-order IIR filter (RBJ audio-EQ cookbook), used as a low-pass and a
//! high-pass stage ahead of the actuator scheduler's RMS detector.

use std::f32::consts::PI;

use crate::error::DspError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Lpf,
    Hpf,
}

#[derive(Debug, Clone, Copy)]
struct Coeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

/// A stateful biquad section. Coefficient changes (via the setters) never
/// touch `x`/`y` history, so there is no click when cutoff/Q/gain/rate are
/// retuned live.
pub struct Biquad {
    kind: FilterKind,
    sample_rate: f32,
    cutoff: f32,
    q: f32,
    gain: f32,
    coeffs: Coeffs,
    x: [f32; 2],
    y: [f32; 2],
}

impl Biquad {
    pub fn new(sample_rate: f32, cutoff: f32, q: f32, gain: f32, kind: FilterKind) -> Result<Self, DspError> {
        if sample_rate <= 0.0 {
            tracing::error!(sample_rate, "rejected biquad construction");
            return Err(DspError::InvalidSampleRate(sample_rate));
        }
        let mut f = Self {
            kind,
            sample_rate,
            cutoff: cutoff.clamp(1.0, sample_rate / 2.0 - 1.0),
            q: q.max(1e-6),
            gain,
            coeffs: Coeffs {
                b0: 1.0,
                b1: 0.0,
                b2: 0.0,
                a1: 0.0,
                a2: 0.0,
            },
            x: [0.0, 0.0],
            y: [0.0, 0.0],
        };
        f.update_coeffs();
        Ok(f)
    }

    pub fn set_cutoff(&mut self, cutoff: f32) {
        let clamped = cutoff.clamp(1.0, self.sample_rate / 2.0 - 1.0);
        if clamped == self.cutoff {
            return;
        }
        self.cutoff = clamped;
        self.update_coeffs();
    }

    pub fn set_q(&mut self, q: f32) {
        let q = q.max(1e-6);
        if q == self.q {
            return;
        }
        self.q = q;
        self.update_coeffs();
    }

    pub fn set_gain(&mut self, gain: f32) {
        if gain == self.gain {
            return;
        }
        self.gain = gain;
        self.update_coeffs();
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) -> Result<(), DspError> {
        if sample_rate <= 0.0 {
            tracing::error!(sample_rate, "rejected sample rate change");
            return Err(DspError::InvalidSampleRate(sample_rate));
        }
        if sample_rate == self.sample_rate {
            return Ok(());
        }
        self.sample_rate = sample_rate;
        self.cutoff = self.cutoff.clamp(1.0, sample_rate / 2.0 - 1.0);
        self.update_coeffs();
        Ok(())
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    fn update_coeffs(&mut self) {
        let w0 = 2.0 * PI * self.cutoff / self.sample_rate;
        let alpha = w0.sin() / (2.0 * self.q);
        let cos_w0 = w0.cos();

        let (mut b0, mut b1, mut b2) = match self.kind {
            FilterKind::Lpf => {
                let b0 = (1.0 - cos_w0) / 2.0;
                (b0, 2.0 * b0, b0)
            }
            FilterKind::Hpf => {
                let b0 = (1.0 + cos_w0) / 2.0;
                (b0, -2.0 * b0, b0)
            }
        };

        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        b0 /= a0;
        b1 /= a0;
        b2 /= a0;

        self.coeffs = Coeffs {
            b0,
            b1,
            b2,
            a1: a1 / a0,
            a2: a2 / a0,
        };
    }

    /// Push one sample through the filter, returning the filtered output.
    pub fn update(&mut self, sample: f32) -> f32 {
        let c = self.coeffs;
        let y = c.b0 * sample + c.b1 * self.x[0] + c.b2 * self.x[1]
            - c.a1 * self.y[0]
            - c.a2 * self.y[1];

        self.x[1] = self.x[0];
        self.x[0] = sample;
        self.y[1] = self.y[0];
        self.y[0] = y;

        y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_dc(filter: &mut Biquad, value: f32, iterations: usize) -> f32 {
        let mut last = 0.0;
        for _ in 0..iterations {
            last = filter.update(value);
        }
        last
    }

    #[test]
    fn lpf_converges_to_unity_dc_gain() {
        let mut f = Biquad::new(44_100.0, 500.0, 0.707, 1.0, FilterKind::Lpf).unwrap();
        let out = run_dc(&mut f, 1.0, 2_000);
        assert!((out - 1.0).abs() < 1e-3, "expected ~1.0, got {out}");
    }

    #[test]
    fn hpf_converges_to_zero_dc_gain() {
        let mut f = Biquad::new(44_100.0, 500.0, 0.707, 1.0, FilterKind::Hpf).unwrap();
        let out = run_dc(&mut f, 1.0, 2_000);
        assert!(out.abs() < 1e-3, "expected ~0.0, got {out}");
    }

    #[test]
    fn zero_input_produces_zero_output() {
        let mut f = Biquad::new(44_100.0, 500.0, 0.707, 1.0, FilterKind::Lpf).unwrap();
        for _ in 0..100 {
            assert_eq!(f.update(0.0), 0.0);
        }
    }

    #[test]
    fn setter_no_op_leaves_history_untouched() {
        let mut f = Biquad::new(44_100.0, 500.0, 0.707, 1.0, FilterKind::Lpf).unwrap();
        f.update(1.0);
        let before = f.x;
        f.set_cutoff(500.0); // unchanged value, must be a no-op
        assert_eq!(f.x, before);
    }

    #[test]
    fn setter_preserves_history_across_a_real_change() {
        let mut f = Biquad::new(44_100.0, 500.0, 0.707, 1.0, FilterKind::Lpf).unwrap();
        f.update(1.0);
        f.update(0.5);
        let history_before = (f.x, f.y);
        f.set_cutoff(800.0);
        assert_eq!((f.x, f.y), history_before);
    }

    #[test]
    fn identical_parameters_produce_identical_output() {
        let mut a = Biquad::new(44_100.0, 1_000.0, 0.8, 1.0, FilterKind::Hpf).unwrap();
        let mut b = Biquad::new(44_100.0, 1_000.0, 0.8, 1.0, FilterKind::Hpf).unwrap();
        let input = [0.1, -0.3, 0.9, -0.9, 0.0, 0.25];
        for &s in &input {
            assert_eq!(a.update(s), b.update(s));
        }
    }

    #[test]
    fn zero_or_negative_sample_rate_is_rejected() {
        assert!(Biquad::new(0.0, 500.0, 0.707, 1.0, FilterKind::Lpf).is_err());
        assert!(Biquad::new(-1.0, 500.0, 0.707, 1.0, FilterKind::Lpf).is_err());
    }

    #[test]
    fn set_sample_rate_rejects_non_positive_values_and_leaves_state_untouched() {
        let mut f = Biquad::new(44_100.0, 500.0, 0.707, 1.0, FilterKind::Lpf).unwrap();
        f.update(1.0);
        let before = (f.sample_rate, f.x, f.y);
        assert!(f.set_sample_rate(0.0).is_err());
        assert_eq!((f.sample_rate, f.x, f.y), before);
    }
}
