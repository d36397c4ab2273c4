// ==============================================================================
// stats.rs - Proportion Difference and Fisher's Exact Test
// ==============================================================================
// Description: Case-vs-control frequency difference and two-sided exact test
//              of independence on a 2x2 contingency table
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Table layout:
//                 carriers        non-carriers
//   case       [  a = case_count, b = case_size - case_count         ]
//   control    [  c = sum(ctrl),  d = sum(ctrl_sizes) - sum(ctrl)     ]
//
// Under independence `a` follows a hypergeometric distribution with
// population N = a+b+c+d, successes K = a+c and draws n = a+b. The two-sided
// p-value sums the probability of every table at least as extreme as the
// observed one (pmf <= observed pmf, with a relative tolerance of 1e-7).
// Probabilities are handled as logarithms so large cohorts stay finite.
// ==============================================================================

use statrs::distribution::{Discrete, Hypergeometric};

/// Relative tolerance when comparing table probabilities
const PMF_TOLERANCE: f64 = 1e-7;

/// Errors for tables on which the test is undefined
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("division by zero: {0}")]
    ZeroDivision(String),

    #[error("count {count} exceeds cohort size {size}")]
    CountExceedsSize { count: u64, size: u64 },

    #[error("degenerate contingency table: {0}")]
    Degenerate(String),
}

/// Observed 2x2 table `[[a, b], [c, d]]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContingencyTable {
    pub a: u64,
    pub b: u64,
    pub c: u64,
    pub d: u64,
}

impl ContingencyTable {
    /// Build a table from carrier counts and cohort sizes
    pub fn from_counts(
        case_count: u64,
        case_size: u64,
        control_count: u64,
        control_size: u64,
    ) -> Result<Self, StatsError> {
        if case_count > case_size {
            return Err(StatsError::CountExceedsSize {
                count: case_count,
                size: case_size,
            });
        }
        if control_count > control_size {
            return Err(StatsError::CountExceedsSize {
                count: control_count,
                size: control_size,
            });
        }

        Ok(Self {
            a: case_count,
            b: case_size - case_count,
            c: control_count,
            d: control_size - control_count,
        })
    }

    pub fn total(&self) -> u64 {
        self.a + self.b + self.c + self.d
    }
}

/// Case frequency minus pooled control frequency
pub fn proportional_difference(
    case_count: u64,
    case_size: u64,
    control_count: u64,
    control_size: u64,
) -> Result<f64, StatsError> {
    if case_size == 0 {
        return Err(StatsError::ZeroDivision("case cohort size is zero".to_string()));
    }
    if control_size == 0 {
        return Err(StatsError::ZeroDivision(
            "pooled control cohort size is zero".to_string(),
        ));
    }

    let proportion_case = case_count as f64 / case_size as f64;
    let proportion_control = control_count as f64 / control_size as f64;
    Ok(proportion_case - proportion_control)
}

/// Two-sided Fisher's exact test p-value
pub fn fisher_exact_two_sided(table: &ContingencyTable) -> Result<f64, StatsError> {
    let population = table.total();
    if population == 0 {
        return Err(StatsError::Degenerate("table total is zero".to_string()));
    }

    let successes = table.a + table.c;
    let draws = table.a + table.b;

    let hyper = Hypergeometric::new(population, successes, draws)
        .map_err(|e| StatsError::Degenerate(e.to_string()))?;

    // Support of the hypergeometric: max(0, n + K - N) ..= min(K, n)
    let low = (draws + successes).saturating_sub(population);
    let high = successes.min(draws);

    // Log space: pmf() overflows its f64 binomials past ~1000 samples
    let ln_observed = hyper.ln_pmf(table.a);
    if !ln_observed.is_finite() {
        return Err(StatsError::Degenerate(format!(
            "observed table probability is not finite ({})",
            ln_observed
        )));
    }
    let ln_cutoff = ln_observed + PMF_TOLERANCE.ln_1p();

    // Terms are scaled by the observed probability so none underflow
    let scaled: f64 = (low..=high)
        .map(|x| hyper.ln_pmf(x))
        .filter(|ln_p| *ln_p <= ln_cutoff)
        .map(|ln_p| (ln_p - ln_observed).exp())
        .sum();

    let p_value = (ln_observed + scaled.ln()).exp();
    Ok(p_value.clamp(0.0, 1.0))
}

/// Round half away from zero to `places` decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
