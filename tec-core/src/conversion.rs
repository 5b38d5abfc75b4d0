//! Thermistor resistance to temperature, Steinhart–Hart form.

const A: f64 = 1.113e-3;
const B: f64 = 2.43e-4;
const C: f64 = 8.87e-8;
const KELVIN_OFFSET: f64 = 273.15;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum ConversionError {
    #[error("resistance must be positive and finite, got {0} ohm")]
    InvalidResistance(f64),
    #[error("temperature must be above absolute zero and finite, got {0} degC")]
    InvalidTemperature(f64),
}

/// `T = 1 / (a + b ln R + c (ln R)^3) - 273.15`, in degrees Celsius.
pub fn resistance_to_temperature(ohms: f64) -> Result<f64, ConversionError> {
    if !ohms.is_finite() || ohms <= 0.0 {
        return Err(ConversionError::InvalidResistance(ohms));
    }
    let ln_r = ohms.ln();
    let inverse_kelvin = A + B * ln_r + C * ln_r.powi(3);
    let celsius = 1.0 / inverse_kelvin - KELVIN_OFFSET;
    if !celsius.is_finite() {
        return Err(ConversionError::InvalidResistance(ohms));
    }
    Ok(celsius)
}

/// Inverse of [`resistance_to_temperature`].
///
/// `c x^3 + b x - (1/T - a) = 0` with `x = ln R` has a single real root since
/// `b` and `c` are positive; it is taken from Cardano's formula.
pub fn temperature_to_resistance(celsius: f64) -> Result<f64, ConversionError> {
    let kelvin = celsius + KELVIN_OFFSET;
    if !kelvin.is_finite() || kelvin <= 0.0 {
        return Err(ConversionError::InvalidTemperature(celsius));
    }
    let y = 1.0 / kelvin - A;
    let p = B / C;
    let q = -y / C;
    let discriminant = (q / 2.0).powi(2) + (p / 3.0).powi(3);
    let root = discriminant.sqrt();
    let ln_r = (-q / 2.0 + root).cbrt() + (-q / 2.0 - root).cbrt();
    let ohms = ln_r.exp();
    if ohms.is_finite() && ohms > 0.0 {
        Ok(ohms)
    } else {
        Err(ConversionError::InvalidTemperature(celsius))
    }
}
