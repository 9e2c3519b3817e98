//! The solver trait and an ordered fallback chain over configured solvers.

mod provider;
mod wait;

pub use provider::ExternalProviderSolver;
pub use wait::WaitSolver;

use crate::detector::ChallengeKind;
use crate::errors::{ChallengeError, Result};
use async_trait::async_trait;
use flaregate_core::Page;
use std::time::Duration;
use tracing::{info, warn};

/// Parameters a solver needs to attempt a challenge.
pub struct SolveParams<'a> {
    pub page: &'a Page,
    pub kind: ChallengeKind,
    pub site_url: String,
    pub timeout: Duration,
    /// The widget's site key, read off the DOM by `detector::detect`.
    /// Required by `ExternalProviderSolver` for every kind it handles.
    pub site_key: Option<String>,
    /// reCAPTCHA v3's page action, if the probe found one.
    pub action: Option<String>,
    /// Turnstile's `cData`, if the widget carries one.
    pub cdata: Option<String>,
}

/// Outcome of a successful solve: a token (for Turnstile/hCaptcha/reCAPTCHA)
/// or nothing (for interstitials the wait solver clears on its own).
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub token: Option<String>,
}

/// A strategy for resolving a detected challenge.
#[async_trait]
pub trait Solver: Send + Sync {
    /// Stable identifier used in logs and the response's usage block.
    fn name(&self) -> &str;

    /// Whether this solver is applicable to the given challenge kind.
    fn can_solve(&self, kind: ChallengeKind) -> bool;

    /// Attempts to resolve the challenge, returning a token on success.
    async fn solve(&self, params: &SolveParams<'_>) -> Result<SolveOutcome>;

    /// Estimated cost of a single solve in USD, for the usage block.
    fn cost(&self) -> f64 {
        0.0
    }

    /// Remaining account balance, if the solver tracks one (paid providers).
    async fn balance(&self) -> Result<Option<f64>> {
        Ok(None)
    }
}

/// An ordered list of solvers tried in turn until one succeeds.
pub struct SolverChain {
    solvers: Vec<Box<dyn Solver>>,
}

impl SolverChain {
    /// Builds a chain. Order matters: the wait solver is conventionally
    /// first since it is free and often sufficient for interstitials.
    pub fn new(solvers: Vec<Box<dyn Solver>>) -> Self {
        Self { solvers }
    }

    /// Attempts each applicable solver in order, returning the first
    /// success along with its name and cost. Returns `NoSolverAvailable`
    /// if none apply, or the last solver's failure if all applicable ones
    /// fail.
    pub async fn resolve(&self, params: SolveParams<'_>) -> Result<(String, SolveOutcome, f64)> {
        let mut last_err = None;
        let mut attempted = false;

        for solver in &self.solvers {
            if !solver.can_solve(params.kind) {
                continue;
            }
            attempted = true;

            info!(solver = solver.name(), kind = ?params.kind, "attempting solver");
            match solver.solve(&params).await {
                Ok(outcome) => return Ok((solver.name().to_string(), outcome, solver.cost())),
                Err(e) => {
                    warn!(solver = solver.name(), error = %e, "solver failed, trying next");
                    last_err = Some(e);
                }
            }
        }

        if !attempted {
            return Err(ChallengeError::NoSolverAvailable(params.kind));
        }

        Err(last_err.unwrap_or(ChallengeError::NoSolverAvailable(params.kind)))
    }

    /// The cheapest configured solver applicable to `kind`, or `None` if
    /// no solver in the chain handles it.
    pub fn cost(&self, kind: ChallengeKind) -> Option<f64> {
        self.solvers
            .iter()
            .filter(|s| s.can_solve(kind))
            .map(|s| s.cost())
            .fold(None, |min, c| Some(min.map_or(c, |m: f64| m.min(c))))
    }

    /// The lowest non-negative balance reported across every solver that
    /// tracks one, or `None` if none do (or none responded).
    pub async fn balance(&self) -> Option<f64> {
        let mut min_balance = None;
        for solver in &self.solvers {
            if let Ok(Some(b)) = solver.balance().await {
                if b >= 0.0 {
                    min_balance = Some(min_balance.map_or(b, |m: f64| m.min(b)));
                }
            }
        }
        min_balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFails;

    #[async_trait]
    impl Solver for AlwaysFails {
        fn name(&self) -> &str {
            "always-fails"
        }
        fn can_solve(&self, _kind: ChallengeKind) -> bool {
            true
        }
        async fn solve(&self, _params: &SolveParams<'_>) -> Result<SolveOutcome> {
            Err(ChallengeError::SolverFailed {
                solver: self.name().to_string(),
                reason: "intentional".to_string(),
            })
        }
    }

    fn params(page: &Page, kind: ChallengeKind) -> SolveParams<'_> {
        SolveParams {
            page,
            kind,
            site_url: "https://example.com".to_string(),
            timeout: Duration::from_millis(50),
            site_key: None,
            action: None,
            cdata: None,
        }
    }

    #[tokio::test]
    async fn chain_reports_no_solver_available_when_none_apply() {
        struct NeverApplies;
        #[async_trait]
        impl Solver for NeverApplies {
            fn name(&self) -> &str {
                "never"
            }
            fn can_solve(&self, _kind: ChallengeKind) -> bool {
                false
            }
            async fn solve(&self, _params: &SolveParams<'_>) -> Result<SolveOutcome> {
                unreachable!("can_solve is false, resolve must never call solve")
            }
        }

        let chain = SolverChain::new(vec![Box::new(NeverApplies)]);
        let page = Page::for_tests();
        let err = chain.resolve(params(&page, ChallengeKind::Turnstile)).await.unwrap_err();
        assert!(matches!(err, ChallengeError::NoSolverAvailable(ChallengeKind::Turnstile)));
    }

    #[tokio::test]
    async fn chain_propagates_last_solver_failure_when_all_applicable_fail() {
        let chain = SolverChain::new(vec![Box::new(AlwaysFails)]);
        let page = Page::for_tests();
        let err = chain.resolve(params(&page, ChallengeKind::CfJs)).await.unwrap_err();
        assert!(matches!(err, ChallengeError::SolverFailed { solver, .. } if solver == "always-fails"));
    }

    #[test]
    fn chain_cost_is_the_minimum_among_matching_solvers() {
        struct Cheap;
        #[async_trait]
        impl Solver for Cheap {
            fn name(&self) -> &str {
                "cheap"
            }
            fn can_solve(&self, kind: ChallengeKind) -> bool {
                kind == ChallengeKind::Turnstile
            }
            async fn solve(&self, _params: &SolveParams<'_>) -> Result<SolveOutcome> {
                unreachable!()
            }
            fn cost(&self) -> f64 {
                0.001
            }
        }

        let chain = SolverChain::new(vec![Box::new(Cheap)]);
        assert_eq!(chain.cost(ChallengeKind::Turnstile), Some(0.001));
        assert_eq!(chain.cost(ChallengeKind::HCaptcha), None);
    }
}
