//! `PlanProvider`: resolves the set of `TablePlan`s a source participates
//! in (spec §4.1). Kept as a trait so config-driven and schema-driven
//! resolution can share the same seam the pipeline depends on.

use async_trait::async_trait;
use model::plan::TablePlan;

use crate::error::SyncError;

#[async_trait]
pub trait PlanProvider: Send + Sync {
    async fn plans(&self) -> Result<Vec<TablePlan>, SyncError>;
}

/// A fixed list of plans, as loaded from config at startup.
pub struct StaticPlanProvider {
    plans: Vec<TablePlan>,
}

impl StaticPlanProvider {
    pub fn new(plans: Vec<TablePlan>) -> Self {
        Self { plans }
    }
}

#[async_trait]
impl PlanProvider for StaticPlanProvider {
    async fn plans(&self) -> Result<Vec<TablePlan>, SyncError> {
        Ok(self.plans.clone())
    }
}
