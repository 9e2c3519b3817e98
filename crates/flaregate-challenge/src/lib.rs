//! # flaregate-challenge
//!
//! Detects anti-bot challenges (Cloudflare interstitials, Turnstile,
//! hCaptcha, reCAPTCHA, DDoS-Guard) on a live browser page and resolves
//! them through a configurable chain of solvers.

pub mod detector;
pub mod errors;
pub mod solvers;

pub use detector::{detect, wait_for_resolution, ChallengeKind, Detection};
pub use errors::{ChallengeError, Result};
pub use solvers::{ExternalProviderSolver, SolveOutcome, SolveParams, Solver, SolverChain, WaitSolver};
