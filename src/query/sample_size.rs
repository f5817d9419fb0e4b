//! Sample size estimation for two-proportion experiments
//!
//! Two-proportion z-test approximation:
//!
//! ```text
//! p1 = baseline
//! p2 = baseline * (1 + mde)
//! pooled = (p1 + p2) / 2
//! se = sqrt(2 * pooled * (1 - pooled))
//! n = ceil(((z_alpha + z_beta) * se / (p2 - p1))^2)
//! ```
//!
//! The defaults (alpha 0.05 two-sided, power 0.8) use the rounded constants
//! 1.96 and 0.84 so results match published calculators exactly.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::{Error, Result};

/// z for a two-sided 95% confidence level.
pub const Z_ALPHA_95: f64 = 1.96;

/// z for 80% power.
pub const Z_BETA_80: f64 = 0.84;

const DEFAULT_ALPHA: f64 = 0.05;
const DEFAULT_POWER: f64 = 0.8;

/// Per-variant sample size with the default power (0.8) and alpha (0.05).
///
/// # Errors
///
/// See [`SampleSizeCalculator::required_sample_size`].
///
/// # Example
///
/// ```rust
/// use conversion_lab::query::required_sample_size;
///
/// // 3% baseline, detect a 25% relative lift
/// assert_eq!(required_sample_size(0.03, 0.25)?, 9091);
/// # Ok::<(), conversion_lab::Error>(())
/// ```
pub fn required_sample_size(baseline: f64, mde: f64) -> Result<u64> {
    SampleSizeCalculator::new().required_sample_size(baseline, mde)
}

/// Experiment-design helper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSizeCalculator {
    power: f64,
    alpha: f64,
}

impl Default for SampleSizeCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSizeCalculator {
    /// Calculator with power 0.8 and alpha 0.05.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            power: DEFAULT_POWER,
            alpha: DEFAULT_ALPHA,
        }
    }

    /// Set the statistical power (1 - beta).
    #[must_use]
    pub const fn power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }

    /// Set the two-sided significance level.
    #[must_use]
    pub const fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// z-score for the configured alpha (two-sided).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if alpha is outside `(0, 1)`.
    pub fn z_alpha(&self) -> Result<f64> {
        check_probability("alpha", self.alpha)?;
        Ok(match self.alpha {
            a if same(a, 0.10) => 1.645,
            a if same(a, 0.05) => Z_ALPHA_95,
            a if same(a, 0.01) => 2.576,
            a => standard_normal_quantile(1.0 - a / 2.0)?,
        })
    }

    /// z-score for the configured power.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if power is outside `(0, 1)`.
    pub fn z_beta(&self) -> Result<f64> {
        check_probability("power", self.power)?;
        Ok(match self.power {
            p if same(p, 0.80) => Z_BETA_80,
            p if same(p, 0.90) => 1.28,
            p if same(p, 0.95) => 1.645,
            p => standard_normal_quantile(p)?,
        })
    }

    /// Per-variant sample size to detect a relative lift `mde` over
    /// `baseline` conversion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `baseline` is outside `(0, 1)`,
    /// `mde` is not positive, the lifted rate reaches 1, or power/alpha are
    /// outside `(0, 1)`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn required_sample_size(&self, baseline: f64, mde: f64) -> Result<u64> {
        check_probability("baseline", baseline)?;
        if !(mde > 0.0 && mde.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "minimum detectable effect must be positive, got {mde}"
            )));
        }

        let p1 = baseline;
        let p2 = baseline * (1.0 + mde);
        if p2 >= 1.0 {
            return Err(Error::InvalidInput(format!(
                "baseline {baseline} lifted by {mde} reaches {p2}, expected < 1"
            )));
        }

        let pooled = (p1 + p2) / 2.0;
        let pooled_se = (2.0 * pooled * (1.0 - pooled)).sqrt();
        let z = self.z_alpha()? + self.z_beta()?;
        let n = (z * pooled_se / (p2 - p1)).powi(2).ceil();
        Ok(n as u64)
    }

    /// Total sample size across `variants` arms.
    ///
    /// # Errors
    ///
    /// See [`Self::required_sample_size`].
    pub fn total_sample_size(&self, baseline: f64, mde: f64, variants: usize) -> Result<u64> {
        let per_variant = self.required_sample_size(baseline, mde)?;
        Ok(per_variant.saturating_mul(variants as u64))
    }
}

fn same(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "{name} must be in (0, 1), got {value}"
        )))
    }
}

fn standard_normal_quantile(p: f64) -> Result<f64> {
    let normal = Normal::new(0.0, 1.0).map_err(|e| Error::Other(e.to_string()))?;
    Ok(normal.inverse_cdf(p))
}
