//! The free, always-first solver: simply waits for Cloudflare's/DDoS-Guard's
//! own JS challenge to clear on its own, which is how IUAM-style
//! interstitials are designed to resolve.

use super::{SolveOutcome, SolveParams, Solver};
use crate::detector::{self, ChallengeKind};
use crate::errors::{ChallengeError, Result};
use async_trait::async_trait;

/// Polls the page until the interstitial clears or the deadline passes.
pub struct WaitSolver {
    poll_timeout: std::time::Duration,
}

impl WaitSolver {
    pub fn new(poll_timeout: std::time::Duration) -> Self {
        Self { poll_timeout }
    }
}

#[async_trait]
impl Solver for WaitSolver {
    fn name(&self) -> &str {
        "wait"
    }

    fn can_solve(&self, kind: ChallengeKind) -> bool {
        matches!(
            kind,
            ChallengeKind::CfJs | ChallengeKind::CfInterstitial | ChallengeKind::DdosGuard
        )
    }

    async fn solve(&self, params: &SolveParams<'_>) -> Result<SolveOutcome> {
        let bound = self.poll_timeout.min(params.timeout);
        let resolved = detector::wait_for_resolution(params.page, bound).await?;

        if resolved == ChallengeKind::None {
            Ok(SolveOutcome { token: None })
        } else {
            Err(ChallengeError::SolverTimeout(bound))
        }
    }
}
