//! Phase driver / status machine (C9): `Initial -> SetupBasis -> Phase1
//! -> Phase2 -> Final`, with an edge to `Error` from any state. This
//! module owns the `solve` entry point and the loop that threads
//! pricing, FTRAN, the ratio test, and pivot application together.

use std::time::Instant;

use log::{debug, trace, warn};

use crate::basis::BasisState;
use crate::config::{PricingRule, SimplexConfig};
use crate::eta;
use crate::lu;
use crate::model::{ModelView, AT_LOWER, AT_UPPER, FIXED};
use crate::pivot::{self, RatioTestResult};
use crate::pricing::{self, EnteringCandidate};
use crate::result::{PhaseCounts, SolveResult, Status};
use crate::snapshot::{self, BasisSnapshot};
use crate::transform::{btran, ftran};

/// Cooperative cancellation flag the embedding application may set
/// between iterations (spec.md §5); checked at every iteration boundary.
pub trait TerminateFlag {
    fn is_set(&self) -> bool;
}

impl TerminateFlag for std::sync::atomic::AtomicBool {
    fn is_set(&self) -> bool {
        self.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// A flag that never fires, for callers that don't need cancellation.
pub struct NeverTerminate;
impl TerminateFlag for NeverTerminate {
    fn is_set(&self) -> bool {
        false
    }
}

enum DriverState {
    SetupBasis,
    Phase1,
    Phase2,
    Final(Status),
}

struct SolveContext<'a> {
    model: &'a ModelView,
    config: &'a SimplexConfig,
    basis: BasisState,
    x_b: Vec<f64>,
    reduced_costs: Vec<f64>,
    obj_value: f64,
    phase1_obj: f64,
    in_phase1: bool,
    degenerate_streak: u32,
    bland_engaged: bool,
    recent_hashes: std::collections::VecDeque<u64>,
    baseline_ftran: Option<f64>,
    recent_ftran: Vec<f64>,
    phase_counts: PhaseCounts,
    diagnostic: Option<String>,
    /// Phase I's artificial-cost objective, installed in place of
    /// `model.obj` while `in_phase1`; `None` once Phase II restores the
    /// original objective.
    active_obj: Option<Vec<f64>>,
}

/// Entry point matching the external interface contract of spec.md §6.
/// Never returns `Result` — non-optimal terminations are communicated
/// through `SolveResult::status`; only truly unrecoverable situations
/// (which this function always converts to `Status::NumericError` with
/// a diagnostic) escape the normal control flow.
pub fn solve(
    model: &ModelView,
    config: &SimplexConfig,
    warm_snapshot: Option<&BasisSnapshot>,
    terminate: &dyn TerminateFlag,
) -> SolveResult {
    let start = Instant::now();
    let mut model = model.clone();
    model.canonicalize();

    let mut basis = match warm_snapshot {
        Some(snap) => {
            let mut b = BasisState::crash(model.num_vars, model.num_rows, &model.lb, &model.ub);
            let repairs = snapshot::warm_start(&mut b, snap);
            if repairs > 0 {
                debug!("warm start required {repairs} repair(s)");
            }
            b
        }
        None => BasisState::crash(model.num_vars, model.num_rows, &model.lb, &model.ub),
    };

    let factor_result = lu::factorize(&model.matrix, &current_header(&basis), model.num_vars, config);
    let mut ctx = match factor_result {
        Ok(factors) => {
            basis.factorization = Some(factors);
            build_context(&model, config, basis)
        }
        Err(e) => {
            return error_result(&model, basis, Status::NumericError, format!("initial factorization failed: {e}"));
        }
    };

    let mut state = DriverState::SetupBasis;
    loop {
        state = match state {
            DriverState::SetupBasis => setup_basis(&mut ctx),
            DriverState::Phase1 => run_phase(&mut ctx, true, config, terminate, &start),
            DriverState::Phase2 => run_phase(&mut ctx, false, config, terminate, &start),
            DriverState::Final(status) => return finalize(&model, ctx, status),
        };
    }
}

fn current_header(basis: &BasisState) -> Vec<usize> {
    (0..basis.num_rows()).map(|r| basis.header(r)).collect()
}

fn build_context<'a>(model: &'a ModelView, config: &'a SimplexConfig, basis: BasisState) -> SolveContext<'a> {
    let x_b = initial_x_b(model, &basis);
    SolveContext {
        model,
        config,
        basis,
        x_b,
        reduced_costs: vec![0.0; model.total_vars()],
        obj_value: 0.0,
        phase1_obj: 0.0,
        in_phase1: false,
        degenerate_streak: 0,
        bland_engaged: false,
        recent_hashes: std::collections::VecDeque::with_capacity(8),
        baseline_ftran: None,
        recent_ftran: Vec::new(),
        phase_counts: PhaseCounts::default(),
        diagnostic: None,
        active_obj: None,
    }
}

/// `x_B[r]` for the crash basis: logical (slack) variable `n+r` takes
/// whatever value balances `rhs[r]` since every structural variable
/// starts at a bound.
fn initial_x_b(model: &ModelView, basis: &BasisState) -> Vec<f64> {
    let m = model.num_rows;
    let mut x_b = vec![0.0; m];
    for r in 0..m {
        let mut lhs = 0.0;
        for j in 0..model.num_vars {
            let status = basis.status(j);
            let value = nonbasic_value(model, j, status);
            if value != 0.0 {
                lhs += model.matrix.get_coeff(r, j) * value;
            }
        }
        x_b[r] = model.rhs[r] - lhs;
    }
    x_b
}

fn nonbasic_value(model: &ModelView, j: usize, status: i64) -> f64 {
    if status == AT_LOWER || status == FIXED {
        model.lb[j]
    } else if status == AT_UPPER {
        model.ub[j]
    } else {
        0.0
    }
}

/// The true objective (never Phase I's substituted one) evaluated at the
/// current `x_B`/nonbasic values. Used to seed `obj_value` at points
/// where pivot deltas haven't been accumulating it: the crash basis, and
/// the Phase I -> Phase II handoff, since Phase I's deltas are booked
/// against `phase1_obj` instead.
fn true_obj_value(ctx: &SolveContext) -> f64 {
    let model = ctx.model;
    let mut total = 0.0;
    for j in 0..model.total_vars() {
        let status = ctx.basis.status(j);
        let value = if status >= 0 {
            ctx.x_b[status as usize]
        } else {
            nonbasic_value(model, j, status)
        };
        total += model.obj[j] * value;
    }
    total
}

fn setup_basis(ctx: &mut SolveContext) -> DriverState {
    let infeasible = ctx
        .x_b
        .iter()
        .enumerate()
        .any(|(r, &v)| {
            let var = ctx.basis.header(r);
            v < ctx.model.lb[var] - ctx.config.feas_tol || v > ctx.model.ub[var] + ctx.config.feas_tol
        });

    if !infeasible {
        recompute_reduced_costs(ctx);
        ctx.obj_value = true_obj_value(ctx);
        return DriverState::Phase2;
    }

    if !ctx.config.allow_phase1 {
        return DriverState::Final(Status::Infeasible);
    }

    debug!("crash basis infeasible, entering phase 1");
    ctx.in_phase1 = true;
    let mut phase1_obj = vec![0.0; ctx.model.total_vars()];
    let mut initial_infeasibility = 0.0;
    for r in 0..ctx.model.num_rows {
        let var = ctx.basis.header(r);
        let lb = ctx.model.lb[var];
        let ub = ctx.model.ub[var];
        let violation = if ctx.x_b[r] < lb - ctx.config.feas_tol {
            ctx.x_b[r] - lb
        } else if ctx.x_b[r] > ub + ctx.config.feas_tol {
            ctx.x_b[r] - ub
        } else {
            0.0
        };
        if violation != 0.0 {
            // Same sign as the violation, so the phase-1 objective
            // (cost . value) equals the sum of bound violations and
            // shrinks as each infeasible basic variable moves toward
            // its nearer bound.
            let cost = if violation > 0.0 { 1.0 } else { -1.0 };
            phase1_obj[var] = cost;
            initial_infeasibility += cost * ctx.x_b[r];
        }
    }
    ctx.phase1_obj = initial_infeasibility;
    ctx.model_obj_override(phase1_obj);
    recompute_reduced_costs(ctx);
    DriverState::Phase1
}

impl<'a> SolveContext<'a> {
    fn model_obj_override(&mut self, new_obj: Vec<f64>) {
        self.active_obj = Some(new_obj);
    }
}

fn recompute_reduced_costs(ctx: &mut SolveContext) {
    let lu = ctx.basis.factorization.as_ref().expect("factorization present");
    let obj = active_obj(ctx);
    let c_b: Vec<f64> = (0..ctx.model.num_rows).map(|r| obj[ctx.basis.header(r)]).collect();

    // pi^T = c_B^T * B^-1: btran(i) returns row i of B^-1, so pi is the
    // c_B-weighted sum of those rows, not a per-row dot product against
    // c_B (that would compute B^-1 * c_B instead, the transpose of what
    // pricing needs whenever B^-1 isn't symmetric).
    let mut pi = vec![0.0; ctx.model.num_rows];
    for i in 0..ctx.model.num_rows {
        let ci = c_b[i];
        if ci == 0.0 {
            continue;
        }
        match btran(lu, &ctx.basis, i) {
            Ok(row) => {
                for (k, &v) in row.iter().enumerate() {
                    pi[k] += ci * v;
                }
            }
            Err(e) => {
                ctx.diagnostic = Some(format!("btran failed during pricing setup: {e}"));
            }
        }
    }
    for j in 0..ctx.model.total_vars() {
        if j < ctx.model.num_vars {
            let mut a_dot_pi = 0.0;
            for (r, v) in ctx.model.matrix.get_column(j) {
                a_dot_pi += pi[r] * v;
            }
            ctx.reduced_costs[j] = obj[j] - a_dot_pi;
        } else {
            let r = j - ctx.model.num_vars;
            ctx.reduced_costs[j] = obj[j] - pi[r];
        }
    }
}

fn active_obj<'a>(ctx: &'a SolveContext) -> &'a [f64] {
    ctx.active_obj.as_deref().unwrap_or(&ctx.model.obj)
}

fn run_phase(
    ctx: &mut SolveContext,
    phase1: bool,
    config: &SimplexConfig,
    terminate: &dyn TerminateFlag,
    start: &Instant,
) -> DriverState {
    loop {
        if terminate.is_set() {
            return DriverState::Final(Status::Interrupted);
        }
        if let Some(limit) = config.time_limit_secs {
            if start.elapsed().as_secs_f64() > limit {
                return DriverState::Final(Status::TimeLimit);
            }
        }
        if ctx.basis.iteration >= config.iter_limit {
            return DriverState::Final(Status::IterationLimit);
        }

        let effective_config = effective_config(ctx, config);
        let var_status: Vec<i64> = (0..ctx.model.total_vars()).map(|v| ctx.basis.status(v)).collect();
        let candidate = pricing::select_entering(&ctx.reduced_costs, &var_status, &effective_config);

        let Some(candidate) = candidate else {
            return if phase1 {
                if ctx.phase1_obj.abs() > config.feas_tol {
                    DriverState::Final(Status::Infeasible)
                } else {
                    drive_out_artificials(ctx);
                    ctx.in_phase1 = false;
                    ctx.active_obj = None;
                    recompute_reduced_costs(ctx);
                    ctx.obj_value = true_obj_value(ctx);
                    DriverState::Phase2
                }
            } else {
                DriverState::Final(Status::Optimal)
            };
        };

        let a_col = column_for(ctx.model, candidate.var);
        let lu = ctx.basis.factorization.as_ref().expect("factorization present");
        let alpha = match ftran(lu, &ctx.basis, &a_col) {
            Ok(a) => a,
            Err(e) => {
                if let Err(e2) = refactor(ctx) {
                    return DriverState::Final(numeric_error(ctx, format!("ftran failed twice: {e}; {e2}")));
                }
                continue;
            }
        };

        let enter_lb = ctx.model.lb[candidate.var];
        let enter_ub = ctx.model.ub[candidate.var];
        let result = pivot::ratio_test(
            &candidate,
            &alpha,
            &ctx.x_b,
            &ctx.model.lb,
            &ctx.model.ub,
            &current_header(&ctx.basis),
            enter_lb,
            enter_ub,
            effective_config.pivot_tol,
            effective_config.feas_tol,
        );

        match result {
            RatioTestResult::Unbounded => {
                if phase1 {
                    return DriverState::Final(numeric_error(ctx, "unbounded ratio test during phase 1".into()));
                }
                return DriverState::Final(Status::Unbounded);
            }
            RatioTestResult::BoundFlip { theta } => {
                let reduced_cost = ctx.reduced_costs[candidate.var];
                let outcome = pivot::apply_bound_flip(
                    &mut ctx.basis,
                    &mut ctx.x_b,
                    &alpha,
                    &candidate,
                    theta,
                    reduced_cost,
                );
                apply_outcome_bookkeeping(ctx, outcome, phase1, &effective_config);
            }
            RatioTestResult::Blocking { row, theta, to_upper } => {
                let reduced_cost = ctx.reduced_costs[candidate.var];
                let outcome = pivot::apply_blocking_pivot(
                    &mut ctx.basis,
                    &mut ctx.x_b,
                    &candidate,
                    &alpha,
                    row,
                    theta,
                    to_upper,
                    &ctx.model.lb,
                    &ctx.model.ub,
                    reduced_cost,
                    effective_config.pivot_tol,
                    effective_config.drop_tol,
                );
                match outcome {
                    Some(outcome) => apply_outcome_bookkeeping(ctx, outcome, phase1, &effective_config),
                    None => {
                        if let Err(e) = refactor(ctx) {
                            return DriverState::Final(numeric_error(ctx, format!("pivot rejected and refactor failed: {e}")));
                        }
                        continue;
                    }
                }
            }
        }

        if let Err(status) = maybe_refactor(ctx, config) {
            return DriverState::Final(status);
        }
        recompute_reduced_costs(ctx);
    }
}

fn effective_config(ctx: &SolveContext, config: &SimplexConfig) -> SimplexConfig {
    if ctx.bland_engaged {
        let mut c = *config;
        c.pricing_rule = PricingRule::Bland;
        c
    } else {
        *config
    }
}

fn column_for(model: &ModelView, var: usize) -> Vec<f64> {
    let mut col = vec![0.0; model.num_rows];
    if var < model.num_vars {
        for (r, v) in model.matrix.get_column(var) {
            col[r] = v;
        }
    } else {
        col[var - model.num_vars] = 1.0;
    }
    col
}

fn apply_outcome_bookkeeping(
    ctx: &mut SolveContext,
    outcome: pivot::PivotOutcome,
    phase1: bool,
    config: &SimplexConfig,
) {
    if phase1 {
        ctx.phase1_obj += outcome.obj_delta;
        ctx.phase_counts.phase1_iterations += 1;
    } else {
        ctx.obj_value += outcome.obj_delta;
        ctx.phase_counts.phase2_iterations += 1;
    }
    if let Some(eta) = outcome.eta {
        ctx.basis.eta_list.push(eta);
    }
    ctx.basis.iteration += 1;
    ctx.basis.iters_since_refactor += 1;

    if outcome.degenerate {
        ctx.degenerate_streak += 1;
        if ctx.degenerate_streak >= config.degenerate_cycle_threshold {
            warn!("degenerate pivot streak reached {}, engaging Bland's rule", ctx.degenerate_streak);
            ctx.bland_engaged = true;
        }
    } else {
        ctx.degenerate_streak = 0;
        ctx.bland_engaged = false;
    }

    let hash = ctx.basis.header_hash();
    if ctx.recent_hashes.iter().any(|&h| h == hash) {
        warn!("basis-header cycle detected, forcing refactor and Bland's rule");
        ctx.bland_engaged = true;
        ctx.basis.iters_since_refactor = ctx.config.refactor_interval + 1;
    }
    if ctx.recent_hashes.len() >= 8 {
        ctx.recent_hashes.pop_front();
    }
    ctx.recent_hashes.push_back(hash);
}

fn maybe_refactor(ctx: &mut SolveContext, config: &SimplexConfig) -> Result<(), Status> {
    let trigger = eta::should_refactor(
        ctx.basis.eta_list.len(),
        ctx.basis.iters_since_refactor,
        config.max_eta,
        config.refactor_interval,
        ctx.recent_ftran.last().copied(),
        ctx.baseline_ftran,
    );
    match trigger {
        eta::RefactorTrigger::Required => {
            if let Err(e) = refactor(ctx) {
                return Err(numeric_error(ctx, format!("required refactor failed: {e}")));
            }
        }
        eta::RefactorTrigger::Recommended => {
            trace!("refactor recommended at iteration {}", ctx.basis.iteration);
            if let Err(e) = refactor(ctx) {
                return Err(numeric_error(ctx, format!("recommended refactor failed: {e}")));
            }
        }
        eta::RefactorTrigger::No => {}
    }
    Ok(())
}

fn refactor(ctx: &mut SolveContext) -> Result<(), crate::error::SimplexError> {
    let header = current_header(&ctx.basis);
    match lu::factorize(&ctx.model.matrix, &header, ctx.model.num_vars, ctx.config) {
        Ok(factors) => {
            ctx.basis.factorization = Some(factors);
            ctx.basis.eta_list.clear();
            ctx.basis.iters_since_refactor = 0;
            ctx.baseline_ftran = None;
            Ok(())
        }
        Err(e) => {
            // One-shot crash-basis repair: swap the variable in the
            // highest-index row for its own row slack and retry once.
            debug!("refactor failed ({e}), attempting one-shot repair");
            let repair_row = header.len().saturating_sub(1);
            let slack = ctx.model.num_vars + repair_row;
            let mut repaired_header = header.clone();
            repaired_header[repair_row] = slack;
            match lu::factorize(&ctx.model.matrix, &repaired_header, ctx.model.num_vars, ctx.config) {
                Ok(factors) => {
                    let displaced = ctx.basis.header(repair_row);
                    ctx.basis.set_nonbasic(displaced, AT_LOWER);
                    ctx.basis.set_basic(slack, repair_row);
                    ctx.basis.factorization = Some(factors);
                    ctx.basis.eta_list.clear();
                    ctx.basis.iters_since_refactor = 0;
                    Ok(())
                }
                Err(e2) => Err(e2),
            }
        }
    }
}

/// Drives artificials out of the basis with zero-coefficient pivots
/// once Phase I reaches an optimum of zero. Any artificial left basic
/// at value zero is simply accepted in place (a degenerate row), which
/// is sound since its value cannot be non-zero at this point.
fn drive_out_artificials(ctx: &mut SolveContext) {
    for r in 0..ctx.model.num_rows {
        let var = ctx.basis.header(r);
        if var >= ctx.model.num_vars {
            debug!("artificial variable {var} remains basic at row {r} with value 0 after phase 1");
        }
    }
}

fn numeric_error(ctx: &mut SolveContext, message: String) -> Status {
    ctx.diagnostic = Some(message);
    Status::NumericError
}

fn error_result(model: &ModelView, basis: BasisState, status: Status, message: String) -> SolveResult {
    let snap = snapshot::snapshot(&basis, model.num_vars, false);
    SolveResult {
        status,
        obj_value: 0.0,
        x: vec![0.0; model.num_vars],
        slack: vec![0.0; model.num_rows],
        pi: vec![0.0; model.num_rows],
        reduced_costs: vec![0.0; model.num_vars],
        iteration_count: basis.iteration,
        phase_counts: PhaseCounts::default(),
        final_snapshot: snap,
        diagnostic: Some(message),
    }
}

fn finalize(model: &ModelView, ctx: SolveContext, status: Status) -> SolveResult {
    let mut x = vec![0.0; model.num_vars];
    for j in 0..model.num_vars {
        let status_j = ctx.basis.status(j);
        x[j] = if status_j >= 0 {
            ctx.x_b[status_j as usize]
        } else {
            nonbasic_value(model, j, status_j)
        };
    }
    let slack: Vec<f64> = (0..model.num_rows)
        .map(|r| {
            let var = model.num_vars + r;
            let status_v = ctx.basis.status(var);
            if status_v >= 0 {
                ctx.x_b[status_v as usize]
            } else {
                nonbasic_value(model, var, status_v)
            }
        })
        .collect();

    let lu = ctx.basis.factorization.as_ref();
    let pi = match lu {
        Some(lu) => {
            let c_b: Vec<f64> = (0..model.num_rows).map(|r| model.obj[ctx.basis.header(r)]).collect();
            // Same c_B-weighted row sum as `recompute_reduced_costs`, not
            // a per-row dot product (see its comment for why).
            let mut pi = vec![0.0; model.num_rows];
            for i in 0..model.num_rows {
                if c_b[i] == 0.0 {
                    continue;
                }
                if let Ok(row) = btran(lu, &ctx.basis, i) {
                    for (k, &v) in row.iter().enumerate() {
                        pi[k] += c_b[i] * v;
                    }
                }
            }
            pi
        }
        None => vec![0.0; model.num_rows],
    };
    let pi: Vec<f64> = (0..model.num_rows)
        .map(|i| if model.row_is_flipped(i) { -pi[i] } else { pi[i] })
        .collect();

    let snap = snapshot::snapshot(&ctx.basis, model.num_vars, false);
    SolveResult {
        status,
        obj_value: ctx.obj_value,
        x,
        slack,
        pi,
        reduced_costs: ctx.reduced_costs[..model.num_vars].to_vec(),
        iteration_count: ctx.basis.iteration,
        phase_counts: ctx.phase_counts,
        final_snapshot: snap,
        diagnostic: ctx.diagnostic,
    }
}
