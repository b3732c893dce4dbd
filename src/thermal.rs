//! Physical approximations derived from air temperature and relative humidity.
//!
//! Both formulas return unrounded values. Rounding is a display concern and
//! happens only in the prediction result.

use serde::Serialize;

use crate::error::ComputationError;

/// Relative humidity bounds, in percent.
pub const HUMIDITY_MIN: f64 = 0.0;
pub const HUMIDITY_MAX: f64 = 100.0;

/// Clamps relative humidity into `[0, 100]`.
pub fn clip_humidity(rh: f64) -> f64 {
    rh.clamp(HUMIDITY_MIN, HUMIDITY_MAX)
}

fn finite(field: &'static str, value: f64) -> Result<f64, ComputationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ComputationError { field, value })
    }
}

/// Wet-bulb temperature (°C) using Stull's empirical approximation.
///
/// Humidity is clipped to `[0, 100]` first. All trigonometric terms are in
/// radians.
///
/// # Errors
///
/// Returns [`ComputationError`] if either input, or the result, is not finite.
pub fn wet_bulb_temp(air_temp: f64, rel_humidity: f64) -> Result<f64, ComputationError> {
    let ta = finite("air_temp", air_temp)?;
    let rh = clip_humidity(finite("rel_humidity", rel_humidity)?);

    let tw = ta * (0.151977 * (rh + 8.313659).sqrt()).atan() + (ta + rh).atan()
        - (rh - 1.67633).atan()
        + 0.00391838 * rh.powf(1.5) * (0.023101 * rh).atan()
        - 4.686035;

    finite("wet_bulb_temp", tw)
}

/// Apparent ("feels-like") temperature (°C) built on [`wet_bulb_temp`].
///
/// The coefficients are part of the persisted model's contract: every trained
/// artifact was fit against exactly this expression.
///
/// # Errors
///
/// Returns [`ComputationError`] if either input, or the result, is not finite.
pub fn apparent_temp(air_temp: f64, rel_humidity: f64) -> Result<f64, ComputationError> {
    let tw = wet_bulb_temp(air_temp, rel_humidity)?;
    let ta = air_temp;

    let hi = -0.2442 + 0.55399 * tw + 0.45535 * ta - 0.0022 * tw.powi(2) + 0.00278 * tw * ta + 3.0;

    finite("apparent_temp", hi)
}

/// Both derived quantities for one (temperature, humidity) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedFeatures {
    pub wet_bulb_temp: f64,
    pub apparent_temp: f64,
}

/// Computes [`DerivedFeatures`] for a single pair.
pub fn derive(air_temp: f64, rel_humidity: f64) -> Result<DerivedFeatures, ComputationError> {
    Ok(DerivedFeatures {
        wet_bulb_temp: wet_bulb_temp(air_temp, rel_humidity)?,
        apparent_temp: apparent_temp(air_temp, rel_humidity)?,
    })
}

/// Rounds to one decimal place for display.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
