//! Inter-annotator agreement hook.
//!
//! The agreement measure itself is provided by the deployment. A task only
//! knows which tier pairs to hand over and how to cache the per-tier values.

use crate::scheme::TierScheme;
use crate::textgrid::IntervalTier;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct GammaError(pub String);

/// Computes an agreement value for one tier annotated by two annotators.
pub trait GammaComputer: Send + Sync {
    /// `Ok(None)` means the measure is not defined for this tier.
    fn tier_gamma(
        &self,
        tier: &TierScheme,
        reference: &IntervalTier,
        target: &IntervalTier,
    ) -> Result<Option<f64>, GammaError>;
}
