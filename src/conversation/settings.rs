//! Per-session generation settings (the two sidebar sliders)

use serde::Serialize;
use thiserror::Error;

pub const MAX_OUTPUT_TOKENS_DEFAULT: u32 = 1500;
pub const MAX_OUTPUT_TOKENS_MIN: u32 = 500;
pub const MAX_OUTPUT_TOKENS_MAX: u32 = 3000;
pub const MAX_OUTPUT_TOKENS_STEP: u32 = 100;

pub const TEMPERATURE_DEFAULT: f32 = 0.7;
pub const TEMPERATURE_MIN: f32 = 0.0;
pub const TEMPERATURE_MAX: f32 = 1.0;
pub const TEMPERATURE_STEP: f32 = 0.1;

const STEP_TOLERANCE: f32 = 1e-4;

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("max_output_tokens must be between 500 and 3000, got {0}")]
    MaxTokensOutOfRange(u32),
    #[error("max_output_tokens must be a multiple of 100, got {0}")]
    MaxTokensOffStep(u32),
    #[error("temperature must be between 0.0 and 1.0, got {0}")]
    TemperatureOutOfRange(f32),
    #[error("temperature must be a multiple of 0.1, got {0}")]
    TemperatureOffStep(f32),
}

/// Output length and creativity for completion requests
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationSettings {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_output_tokens: MAX_OUTPUT_TOKENS_DEFAULT,
            temperature: TEMPERATURE_DEFAULT,
        }
    }
}

impl GenerationSettings {
    /// Validate slider values, snapping the temperature onto its step grid
    pub fn new(max_output_tokens: u32, temperature: f32) -> Result<Self, SettingsError> {
        if !(MAX_OUTPUT_TOKENS_MIN..=MAX_OUTPUT_TOKENS_MAX).contains(&max_output_tokens) {
            return Err(SettingsError::MaxTokensOutOfRange(max_output_tokens));
        }
        if max_output_tokens % MAX_OUTPUT_TOKENS_STEP != 0 {
            return Err(SettingsError::MaxTokensOffStep(max_output_tokens));
        }

        if !temperature.is_finite() || !(TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&temperature) {
            return Err(SettingsError::TemperatureOutOfRange(temperature));
        }
        let steps = (temperature / TEMPERATURE_STEP).round();
        if (steps * TEMPERATURE_STEP - temperature).abs() > STEP_TOLERANCE {
            return Err(SettingsError::TemperatureOffStep(temperature));
        }

        Ok(Self {
            max_output_tokens,
            temperature: steps / 10.0,
        })
    }
}

/// Slider metadata for the UI
#[derive(Debug, Clone, Serialize)]
pub struct SettingsBounds {
    pub max_output_tokens: SliderBounds<u32>,
    pub temperature: SliderBounds<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SliderBounds<T> {
    pub min: T,
    pub max: T,
    pub step: T,
    pub default: T,
}

impl SettingsBounds {
    pub fn current() -> Self {
        Self {
            max_output_tokens: SliderBounds {
                min: MAX_OUTPUT_TOKENS_MIN,
                max: MAX_OUTPUT_TOKENS_MAX,
                step: MAX_OUTPUT_TOKENS_STEP,
                default: MAX_OUTPUT_TOKENS_DEFAULT,
            },
            temperature: SliderBounds {
                min: TEMPERATURE_MIN,
                max: TEMPERATURE_MAX,
                step: TEMPERATURE_STEP,
                default: TEMPERATURE_DEFAULT,
            },
        }
    }
}
