//! Coefficients of the generative crime rate formula.
//!
//! ```text
//! rate = 2.0 + area*1.5 + (density/2000)*0.5 + night*1.2
//!      + sin((month-1)*pi/6)*0.5 + weekend*0.8 + noise
//! ```
//!
//! The synthetic generator evaluates the whole formula; the engine reuses the
//! individual terms for its factor decomposition.

use std::f64::consts::PI;

/// Constant term.
pub const INTERCEPT: f64 = 2.0;
/// Added per step of the area type code.
pub const AREA_TYPE: f64 = 1.5;
/// Density is divided by this before scaling.
pub const DENSITY_DIVISOR: f64 = 2000.0;
/// Scale applied to the divided density.
pub const DENSITY: f64 = 0.5;
/// Added for night-time.
pub const NIGHT: f64 = 1.2;
/// Amplitude of the seasonal sine.
pub const SEASONAL: f64 = 0.5;
/// Added on Saturday and Sunday.
pub const WEEKEND: f64 = 0.8;
/// Days after this one count as weekend.
pub const LAST_WEEKDAY: i64 = 5;
/// Scale applied to `city_base - 1.0`.
pub const CITY_SCALE: f64 = 0.8;
/// Lower bound of every label and prediction.
pub const MIN_CRIME_RATE: f64 = 0.5;
/// Upper bound of every label and prediction.
pub const MAX_CRIME_RATE: f64 = 8.0;

/// Area type term for an encoded area code.
#[must_use]
pub fn area_type_term(area_code: u8) -> f64 {
    f64::from(area_code) * AREA_TYPE
}

/// Population density term.
#[must_use]
pub fn density_term(population_density: f64) -> f64 {
    (population_density / DENSITY_DIVISOR) * DENSITY
}

/// Time of day term for an encoded time code.
#[must_use]
pub fn time_term(time_code: u8) -> f64 {
    f64::from(time_code) * NIGHT
}

/// Seasonal term. Peaks in April, bottoms out in October.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn seasonal_term(month: i64) -> f64 {
    ((month as f64 - 1.0) * PI / 6.0).sin() * SEASONAL
}

/// Weekend term.
#[must_use]
pub fn weekend_term(day_of_week: i64) -> f64 {
    if day_of_week > LAST_WEEKDAY {
        WEEKEND
    } else {
        0.0
    }
}

/// Shift applied for a city multiplier.
#[must_use]
pub fn city_term(city_base_rate: f64) -> f64 {
    (city_base_rate - 1.0) * CITY_SCALE
}

/// Clamps a rate into [`MIN_CRIME_RATE`]..=[`MAX_CRIME_RATE`].
#[must_use]
pub fn clip_rate(rate: f64) -> f64 {
    rate.clamp(MIN_CRIME_RATE, MAX_CRIME_RATE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn seasonal_term_follows_sine() {
        assert_relative_eq!(seasonal_term(1), 0.0);
        assert_relative_eq!(seasonal_term(4), 0.5, epsilon = 1e-12);
        assert_relative_eq!(seasonal_term(6), 0.25, epsilon = 1e-12);
        assert_relative_eq!(seasonal_term(10), -0.5, epsilon = 1e-12);
    }

    #[test]
    fn seasonal_term_is_total_over_i64() {
        for month in [i64::MIN, -1, 0, 13, i64::MAX] {
            let term = seasonal_term(month);
            assert!(term.is_finite(), "month {month} gave {term}");
            assert!(term.abs() <= SEASONAL, "month {month} gave {term}");
        }
    }

    #[test]
    fn weekend_term_only_for_saturday_and_sunday() {
        for day in 1..=5 {
            assert_relative_eq!(weekend_term(day), 0.0);
        }
        assert_relative_eq!(weekend_term(6), WEEKEND);
        assert_relative_eq!(weekend_term(7), WEEKEND);
    }

    #[test]
    fn clip_rate_bounds() {
        assert_relative_eq!(clip_rate(-3.0), MIN_CRIME_RATE);
        assert_relative_eq!(clip_rate(12.0), MAX_CRIME_RATE);
        assert_relative_eq!(clip_rate(4.2), 4.2);
    }

    #[test]
    fn city_term_is_zero_for_neutral_city() {
        assert_relative_eq!(city_term(1.0), 0.0);
        assert_relative_eq!(city_term(1.8), 0.64, epsilon = 1e-12);
    }
}
