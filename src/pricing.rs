//! Pricing (C7): selects the entering variable from the current reduced
//! costs. Dantzig's rule is the implemented baseline; `PricingRule::Bland`
//! is the anti-cycling fallback the phase driver switches to after a run
//! of degenerate pivots.

use crate::config::{PricingRule, SimplexConfig};
use crate::model::{AT_LOWER, AT_UPPER, ELIMINATED, FIXED, SUPERBASIC};

/// An entering-variable candidate: `var` with bound-direction sign
/// `sigma` (`+1` if increasing from `AT_LOWER`/`SUPERBASIC`-below-zero,
/// `-1` if decreasing from `AT_UPPER`/`SUPERBASIC`-above-zero).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnteringCandidate {
    pub var: usize,
    pub sigma: f64,
    pub reduced_cost: f64,
}

/// Picks the entering variable given reduced costs `d` (indexed by
/// variable) and each non-basic variable's status. Returns `None` when
/// no candidate improves the objective beyond `opt_tol` — i.e. optimal.
pub fn select_entering(
    d: &[f64],
    var_status: &[i64],
    config: &SimplexConfig,
) -> Option<EnteringCandidate> {
    match config.pricing_rule {
        PricingRule::Bland => select_entering_bland(d, var_status, config),
        PricingRule::Dantzig | PricingRule::SteepestEdge => {
            select_entering_dantzig(d, var_status, config)
        }
    }
}

fn candidate_at(j: usize, d: &[f64], var_status: &[i64], opt_tol: f64) -> Option<EnteringCandidate> {
    match var_status[j] {
        AT_LOWER => {
            if d[j] < -opt_tol {
                Some(EnteringCandidate {
                    var: j,
                    sigma: 1.0,
                    reduced_cost: d[j],
                })
            } else {
                None
            }
        }
        AT_UPPER => {
            if d[j] > opt_tol {
                Some(EnteringCandidate {
                    var: j,
                    sigma: -1.0,
                    reduced_cost: d[j],
                })
            } else {
                None
            }
        }
        SUPERBASIC => {
            if d[j].abs() > opt_tol {
                Some(EnteringCandidate {
                    var: j,
                    sigma: if d[j] < 0.0 { 1.0 } else { -1.0 },
                    reduced_cost: d[j],
                })
            } else {
                None
            }
        }
        FIXED | ELIMINATED => None,
        _ => None, // basic
    }
}

/// Highest-priority candidate by `|reduced cost|`, ties broken by
/// smallest variable index.
fn select_entering_dantzig(
    d: &[f64],
    var_status: &[i64],
    config: &SimplexConfig,
) -> Option<EnteringCandidate> {
    let mut best: Option<EnteringCandidate> = None;
    for j in 0..var_status.len() {
        if let Some(candidate) = candidate_at(j, d, var_status, config.opt_tol) {
            let priority = candidate.reduced_cost.abs();
            let replace = match &best {
                None => true,
                Some(current) => priority > current.reduced_cost.abs(),
            };
            if replace {
                best = Some(candidate);
            }
        }
    }
    best
}

/// Smallest-index candidate with an improving reduced cost, guaranteed
/// to prevent cycling at the cost of convergence speed.
fn select_entering_bland(
    d: &[f64],
    var_status: &[i64],
    config: &SimplexConfig,
) -> Option<EnteringCandidate> {
    for j in 0..var_status.len() {
        if let Some(candidate) = candidate_at(j, d, var_status, config.opt_tol) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dantzig_picks_most_negative_reduced_cost_at_lower() {
        let d = vec![-5.0, -1.0, 2.0];
        let var_status = vec![AT_LOWER, AT_LOWER, AT_LOWER];
        let config = SimplexConfig::default();
        let candidate = select_entering(&d, &var_status, &config).unwrap();
        assert_eq!(candidate.var, 0);
        assert_eq!(candidate.sigma, 1.0);
    }

    #[test]
    fn dantzig_ties_break_by_smallest_index() {
        let d = vec![-3.0, -3.0];
        let var_status = vec![AT_LOWER, AT_LOWER];
        let config = SimplexConfig::default();
        let candidate = select_entering(&d, &var_status, &config).unwrap();
        assert_eq!(candidate.var, 0);
    }

    #[test]
    fn returns_none_when_optimal() {
        let d = vec![0.0, 1e-9, -1e-9];
        let var_status = vec![AT_LOWER, AT_LOWER, AT_UPPER];
        let config = SimplexConfig::default();
        assert!(select_entering(&d, &var_status, &config).is_none());
    }

    #[test]
    fn bland_picks_smallest_improving_index_regardless_of_magnitude() {
        let d = vec![-1.0, -100.0];
        let var_status = vec![AT_LOWER, AT_LOWER];
        let mut config = SimplexConfig::default();
        config.pricing_rule = PricingRule::Bland;
        let candidate = select_entering(&d, &var_status, &config).unwrap();
        assert_eq!(candidate.var, 0);
    }

    #[test]
    fn skips_fixed_and_basic_variables() {
        let d = vec![-5.0, -5.0];
        let var_status = vec![FIXED, 0];
        let config = SimplexConfig::default();
        assert!(select_entering(&d, &var_status, &config).is_none());
    }
}
