//! Overlays — weight-to-weight transforms applied in list order.
//!
//! Overlay output need not sum to 1.0; the allocator sizes whatever it gets.

use chrono::NaiveDate;

use super::{PipelineContext, PipelineError};
use crate::domain::Weights;

/// Risk or regime adjustment of target weights.
pub trait Overlay: Send + Sync {
    /// Registry type name (e.g., "risk_overlay_none").
    fn name(&self) -> &str;

    fn apply(
        &self,
        weights: &Weights,
        as_of: NaiveDate,
        ctx: &PipelineContext,
    ) -> Result<Weights, PipelineError>;
}

/// Pass-through overlay. Registered as both `risk_overlay_none` and
/// `regime_overlay_none`; the name records which slot it fills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoOpOverlay {
    name: &'static str,
}

impl NoOpOverlay {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Overlay for NoOpOverlay {
    fn name(&self) -> &str {
        self.name
    }

    fn apply(
        &self,
        weights: &Weights,
        _as_of: NaiveDate,
        _ctx: &PipelineContext,
    ) -> Result<Weights, PipelineError> {
        Ok(weights.clone())
    }
}
