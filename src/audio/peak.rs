//! Peak envelope follower and the per-buffer peak math used by the audio callback.

use crate::error::ConfigError;

/// One-pole peak-hold/decay filter.
///
/// Jumps to a new peak instantly and otherwise decays multiplicatively,
/// so transients register immediately without frame-to-frame flicker.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakDetector {
    envelope: f32,
    decay: f32,
}

impl PeakDetector {
    pub fn new(decay: f32) -> Result<Self, ConfigError> {
        if !(decay > 0.0 && decay < 1.0) {
            return Err(ConfigError::Decay(decay));
        }
        Ok(Self { envelope: 0.0, decay })
    }

    /// `envelope = max(envelope * decay, instant_peak)`; negative or NaN input counts as silence.
    pub fn update(&mut self, instant_peak: f32) {
        let peak = if instant_peak.is_finite() { instant_peak.max(0.0) } else { 0.0 };
        self.envelope = (self.envelope * self.decay).max(peak);
    }

    pub fn read(&self) -> f32 {
        self.envelope
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

/// Maximum absolute sample value across a buffer of interleaved samples.
///
/// Non-finite samples are ignored.
pub fn buffer_peak<I>(samples: I) -> f32
where
    I: IntoIterator<Item = f32>,
{
    samples
        .into_iter()
        .filter(|s| s.is_finite())
        .fold(0.0_f32, |peak, s| peak.max(s.abs()))
}

/// Apply the sensitivity multiplier and clamp into `[0, 1]`.
pub fn scale_peak(raw_peak: f32, sensitivity: f32) -> f32 {
    let scaled = raw_peak * sensitivity;
    if scaled.is_finite() {
        scaled.clamp(0.0, 1.0)
    } else if scaled > 0.0 {
        1.0
    } else {
        0.0
    }
}

pub const SENSITIVITY_MIN: f32 = 0.2;
pub const SENSITIVITY_MAX: f32 = 5.0;
pub const SENSITIVITY_STEP: f32 = 0.2;

/// User-adjustable multiplier with fixed steps inside a closed range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sensitivity {
    value: f32,
    min: f32,
    max: f32,
    step: f32,
}

impl Sensitivity {
    pub fn new(value: f32, min: f32, max: f32, step: f32) -> Result<Self, ConfigError> {
        if !(min > 0.0 && min <= max && step > 0.0) || !max.is_finite() {
            return Err(ConfigError::SensitivityRange { min, max });
        }
        let value = if value.is_finite() { value } else { 1.0 };
        Ok(Self { value: value.clamp(min, max), min, max, step })
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn increase(&mut self) -> f32 {
        self.set(self.value + self.step)
    }

    pub fn decrease(&mut self) -> f32 {
        self.set(self.value - self.step)
    }

    // Snap to tenths so repeated steps don't accumulate float drift in the display.
    fn set(&mut self, value: f32) -> f32 {
        let snapped = (value * 10.0).round() / 10.0;
        self.value = snapped.clamp(self.min, self.max);
        self.value
    }
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self {
            value: 1.0,
            min: SENSITIVITY_MIN,
            max: SENSITIVITY_MAX,
            step: SENSITIVITY_STEP,
        }
    }
}
