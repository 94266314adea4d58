//! # revised-simplex-core
//!
//! Core of a revised-simplex linear-programming engine: a sparse basis
//! factorization, the FTRAN/BTRAN transform solves against it, and the
//! two-phase primal pivot loop that threads them into a full solve.
//!
//! The entry point is [`phase::solve`]. Everything else — the sparse
//! matrix store, the basis state, the LU factorization, the eta file —
//! is a collaborator `solve` owns for the duration of one call.
//!
//! This crate does not parse model files, expose bindings, or manage an
//! environment; it consumes an already-built [`model::ModelView`] and
//! returns a [`result::SolveResult`].

pub mod basis;
pub mod config;
pub mod error;
pub mod eta;
pub mod lu;
pub mod model;
pub mod phase;
pub mod pivot;
pub mod pricing;
pub mod result;
pub mod snapshot;
pub mod sparse;
pub mod transform;

pub use config::{PricingRule, SimplexConfig, TieBreak};
pub use error::{SimplexError, SimplexResult};
pub use model::ModelView;
pub use phase::{solve, NeverTerminate, TerminateFlag};
pub use result::{PhaseCounts, SolveResult, Status};
pub use snapshot::BasisSnapshot;
