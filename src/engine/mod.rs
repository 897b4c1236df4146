//! # Memory Allocation Engine
//!
//! Translates a memory allocation request into a validated per-DIMM,
//! per-interleave-set layout, then hands the layout to a goal committer.
//!
//! Computing a layout goes through three stages, each a list of single
//! purpose objects run in order:
//!
//! 1. Request rules reject malformed or unsatisfiable requests before any
//!    work is done.
//! 2. Layout steps fill in an empty layout seeded with one entry per target
//!    DIMM. Recoverable shortfalls are recorded as layout warnings.
//! 3. Post-layout checks verify the invariants of the finished layout.
//!
//! Nothing is written while computing a layout. Committing is a separate
//! call that does not roll back: every DIMM is attempted and the outcome of
//! each one is reported.
//!
//! ## Layout
//!
//! ```text
//! src/engine
//! ├── checks.rs ------------> # Post-layout checks.
//! ├── context.rs -----------> # Platform snapshot shared by rules, steps and checks.
//! ├── mod.rs ---------------> # Allocator. This file.
//! ├── report.rs ------------> # Per-DIMM outcome of committing goals.
//! ├── rules ----------------> # Request rules.
//! ├── steps ----------------> # Layout steps.
//! └── validation_tests.rs --> # End-to-end layout tests.
//! ```

use log::{debug, error, info};

use nvm_api::{
    config::MemoryAllocationRequest,
    error::{NvmError, NvmResultExt, ReportError, ResourceError},
    layout::MemoryAllocationLayout,
    platform::{Dimm, Pool, SystemCapabilities},
    primitives::bytes::ByteCount,
};

use crate::providers::{CapabilityProvider, GoalCommitter, InventoryProvider};

mod checks;
mod context;
mod report;
mod rules;
mod steps;

pub use context::AllocationContext;
pub use report::AllocationReport;

use checks::{post_layout_checks, PostLayoutCheck};
use rules::{request_rules, RequestRule};
use steps::{layout_steps, LayoutStep};

#[cfg(test)]
mod validation_tests;

pub struct Allocator {
    ctx: AllocationContext,
    rules: Vec<Box<dyn RequestRule>>,
    steps: Vec<Box<dyn LayoutStep>>,
    checks: Vec<Box<dyn PostLayoutCheck>>,
}

impl Allocator {
    pub fn new(
        capabilities: SystemCapabilities,
        dimms: Vec<Dimm>,
        pools: Vec<Pool>,
        socket_count: u16,
    ) -> Self {
        Self {
            ctx: AllocationContext::new(capabilities, dimms, pools, socket_count),
            rules: request_rules(),
            steps: layout_steps(),
            checks: post_layout_checks(),
        }
    }

    /// Queries the collaborators once and snapshots their answers for the
    /// lifetime of the allocator.
    pub fn from_providers(
        capabilities: &dyn CapabilityProvider,
        inventory: &dyn InventoryProvider,
    ) -> Result<Self, NvmError> {
        Ok(Self::new(
            capabilities
                .capabilities()
                .message("Failed to query system capabilities")?,
            inventory
                .manageable_dimms()
                .message("Failed to query manageable DIMMs")?,
            inventory.pools().message("Failed to query pools")?,
            inventory
                .socket_count()
                .message("Failed to query socket count")?,
        ))
    }

    pub fn context(&self) -> &AllocationContext {
        &self.ctx
    }

    /// Runs the request rules only.
    #[tracing::instrument(skip_all)]
    pub fn verify(&self, request: &MemoryAllocationRequest) -> Result<(), NvmError> {
        debug!("Verifying memory allocation request");
        for rule in &self.rules {
            debug!("Verifying request rule '{}'", rule.name());
            rule.verify(&self.ctx, request)
                .message(format!("Request rule '{}' failed", rule.name()))?;
        }
        Ok(())
    }

    /// Computes the layout for a request. Deterministic and free of side
    /// effects.
    #[tracing::instrument(skip_all)]
    pub fn layout(
        &self,
        request: &MemoryAllocationRequest,
    ) -> Result<MemoryAllocationLayout, NvmError> {
        self.verify(request)?;

        let targets = self.ctx.target_dimms(request);
        let mut layout = MemoryAllocationLayout::new(targets.iter().copied());
        if request.reserve_dimm {
            layout.reserved_dimm = targets.last().map(|dimm| dimm.id.clone());
            debug!("Reserving DIMM {:?} for storage", layout.reserved_dimm);
        }

        for step in &self.steps {
            debug!("Starting layout step '{}'", step.name());
            step.execute(&self.ctx, request, &mut layout)
                .message(format!("Layout step '{}' failed", step.name()))?;
        }

        for check in &self.checks {
            debug!("Running post-layout check '{}'", check.name());
            check
                .verify(&self.ctx, request, &layout)
                .message(format!("Post-layout check '{}' failed", check.name()))?;
        }

        let volatile = layout
            .total_volatile()
            .structured(ResourceError::CapacityOverflow)?;
        let persistent = layout
            .total_persistent()
            .structured(ResourceError::CapacityOverflow)?;
        let storage = layout
            .total_storage()
            .structured(ResourceError::CapacityOverflow)?;
        debug!(
            "Computed layout: {volatile} volatile, {persistent} app-direct, {storage} storage, {} warning(s)",
            layout.warnings.len()
        );
        Ok(layout)
    }

    /// Commits the goal of every DIMM of a layout, in layout order. A failed
    /// DIMM does not stop the others and nothing is rolled back.
    #[tracing::instrument(skip_all)]
    pub fn allocate(
        &self,
        layout: &MemoryAllocationLayout,
        committer: &mut dyn GoalCommitter,
    ) -> AllocationReport {
        let mut report = AllocationReport::default();
        for goal in layout.goals() {
            info!("Committing configuration goal to DIMM '{}'", goal.dimm_id);
            let result = committer.commit_goal(&goal.dimm_id, &goal);
            if let Err(e) = &result {
                error!(
                    "Failed to commit configuration goal to DIMM '{}': {e}",
                    goal.dimm_id
                );
            }
            report.record(goal.dimm_id, result);
        }
        report
    }

    /// Raw capacity of the DIMMs a request targets.
    pub fn total_requested_capacity(
        &self,
        request: &MemoryAllocationRequest,
    ) -> Result<ByteCount, NvmError> {
        self.ctx
            .target_dimms(request)
            .iter()
            .try_fold(ByteCount::ZERO, |total, dimm| total.checked_add(dimm.capacity))
            .structured(ResourceError::CapacityOverflow)
    }
}
