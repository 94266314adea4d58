//! Immutable configuration passed into [`solve`](crate::phase::solve) at
//! entry. No tolerance or limit is ever read from global state (see
//! spec §5) — everything the solve path needs travels in one
//! `SimplexConfig` value.

/// Rule used to select the entering variable during pricing (§4.7).
///
/// `SteepestEdge` is reserved infrastructure: the variant exists so that
/// callers can select it and get a clear "not yet implemented" error
/// rather than silently falling back to Dantzig, but no weight-tracking
/// state is maintained for it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingRule {
    /// Dantzig's rule: most negative (resp. most positive) reduced cost.
    Dantzig,
    /// Bland's rule: smallest index with an improving reduced cost.
    /// Engaged automatically after a run of degenerate pivots; can also
    /// be requested directly.
    Bland,
    /// Reserved for a future steepest-edge implementation.
    SteepestEdge,
}

/// Tie-break policy when multiple candidates are equally attractive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreak {
    /// Smallest variable/row index wins.
    ByIndex,
}

/// Immutable configuration record for one call to [`solve`](crate::phase::solve).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplexConfig {
    /// Primal feasibility tolerance.
    pub feas_tol: f64,
    /// Dual (reduced-cost) optimality tolerance.
    pub opt_tol: f64,
    /// Minimum magnitude of a pivot element for the pivot to be accepted
    /// without forcing a refactor.
    pub pivot_tol: f64,
    /// Markowitz stability threshold `tau` used during LU factorization,
    /// in `[0.01, 0.1]`.
    pub markowitz_tau: f64,
    /// Absolute value below which an entry is dropped during LU fill-in
    /// or eta construction.
    pub drop_tol: f64,
    /// Maximum number of eta vectors to accumulate before a refactor is
    /// `Required`.
    pub max_eta: usize,
    /// Number of iterations between scheduled refactorizations.
    pub refactor_interval: u64,
    /// Number of consecutive degenerate pivots after which Bland's rule
    /// engages.
    pub degenerate_cycle_threshold: u32,
    /// Hard ceiling on the number of pivots performed.
    pub iter_limit: u64,
    /// Wall-clock ceiling, in seconds. `None` means unbounded.
    pub time_limit_secs: Option<f64>,
    /// Entering-variable selection rule.
    pub pricing_rule: PricingRule,
    /// Tie-break policy.
    pub tie_break: TieBreak,
    /// Whether Phase I (artificial variables) may be used to find an
    /// initial feasible basis. When `false` and the crash basis is
    /// infeasible, `solve` reports `Infeasible` immediately rather than
    /// attempting Phase I.
    pub allow_phase1: bool,
}

impl Default for SimplexConfig {
    fn default() -> Self {
        Self {
            feas_tol: 1e-6,
            opt_tol: 1e-6,
            pivot_tol: 1e-9,
            markowitz_tau: 0.1,
            drop_tol: 1e-20,
            max_eta: 250,
            refactor_interval: 100,
            degenerate_cycle_threshold: 30,
            iter_limit: 10_000,
            time_limit_secs: None,
            pricing_rule: PricingRule::Dantzig,
            tie_break: TieBreak::ByIndex,
            allow_phase1: true,
        }
    }
}

impl SimplexConfig {
    /// Starts from [`Default`] and lets the caller override individual
    /// fields with method-chaining, in the spirit of the teacher's
    /// options structs.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_iter_limit(mut self, limit: u64) -> Self {
        self.iter_limit = limit;
        self
    }

    pub fn with_time_limit_secs(mut self, limit: f64) -> Self {
        self.time_limit_secs = Some(limit);
        self
    }

    pub fn with_pricing_rule(mut self, rule: PricingRule) -> Self {
        self.pricing_rule = rule;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = SimplexConfig::default();
        assert_eq!(config.feas_tol, 1e-6);
        assert_eq!(config.markowitz_tau, 0.1);
        assert_eq!(config.max_eta, 250);
        assert!(config.allow_phase1);
    }

    #[test]
    fn builder_overrides_only_requested_fields() {
        let config = SimplexConfig::new()
            .with_iter_limit(42)
            .with_pricing_rule(PricingRule::Bland);
        assert_eq!(config.iter_limit, 42);
        assert_eq!(config.pricing_rule, PricingRule::Bland);
        assert_eq!(config.feas_tol, SimplexConfig::default().feas_tol);
    }
}
