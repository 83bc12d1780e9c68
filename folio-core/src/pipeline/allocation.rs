//! Allocation models — raw target weights for a date.

use chrono::NaiveDate;

use super::{PipelineContext, PipelineError};
use crate::domain::{weight_sum, Weights};

/// Produces the raw target weights of the portfolio.
pub trait AllocationModel: Send + Sync {
    /// Registry type name (e.g., "beta_engine_60_40").
    fn name(&self) -> &str;

    fn target_weights(
        &self,
        as_of: NaiveDate,
        ctx: &PipelineContext,
    ) -> Result<Weights, PipelineError>;
}

/// Static configured weights, normalized by their sum.
///
/// `{SPY: 60, TLT: 40}` and `{SPY: 0.6, TLT: 0.4}` yield the same targets.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticWeights {
    name: String,
    weights: Weights,
}

impl StaticWeights {
    pub fn new(name: impl Into<String>, weights: Weights) -> Self {
        Self {
            name: name.into(),
            weights,
        }
    }
}

impl AllocationModel for StaticWeights {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_weights(
        &self,
        _as_of: NaiveDate,
        _ctx: &PipelineContext,
    ) -> Result<Weights, PipelineError> {
        let total = weight_sum(&self.weights);
        if total.is_nan() || total <= 0.0 {
            return Err(PipelineError::NonPositiveWeightSum(total));
        }
        Ok(self
            .weights
            .iter()
            .map(|(symbol, w)| (symbol.clone(), w / total))
            .collect())
    }
}
