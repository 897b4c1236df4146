use log::debug;

use nvm_api::{
    config::MemoryAllocationRequest,
    error::NvmError,
    layout::{LayoutWarning, MemoryAllocationLayout},
};

use super::{AllocationContext, LayoutStep};

/// Warns when an interleaved extent uses a format the BIOS does not
/// recommend.
pub(crate) struct CheckRecommendedSettings;

impl LayoutStep for CheckRecommendedSettings {
    fn name(&self) -> &'static str {
        "check-recommended-settings"
    }

    fn execute(
        &self,
        ctx: &AllocationContext,
        request: &MemoryAllocationRequest,
        layout: &mut MemoryAllocationLayout,
    ) -> Result<(), NvmError> {
        if layout.has_warning(LayoutWarning::AppDirectNotSupportedByDriver) {
            return Ok(());
        }

        let platform = ctx.platform();
        for extent in request
            .persistent
            .iter()
            .filter(|extent| extent.capacity.is_requested() && !extent.by_one)
        {
            let format = extent
                .format
                .unwrap_or_else(|| platform.default_interleave_format());
            if platform
                .interleave_format(&format)
                .is_some_and(|capability| !capability.recommended)
            {
                debug!("Interleave format '{format}' is not recommended by the platform");
                layout.add_warning(LayoutWarning::PersistentSettingsNotRecommended);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use nvm_api::{
        config::{Capacity, PersistentExtent},
        platform::InterleaveCapability,
    };
    use sysdefs::interleave::{InterleaveFormat, InterleaveSize};

    use crate::engine::context::test_utils::two_socket_context;

    use super::*;

    #[test]
    fn test_not_recommended() {
        let mut ctx = two_socket_context(128);
        let other = InterleaveFormat::new(InterleaveSize::Size64B, InterleaveSize::Size4KB);
        ctx.capabilities
            .platform
            .interleave_formats
            .push(InterleaveCapability {
                format: other,
                recommended: false,
            });

        let request = |format, by_one| MemoryAllocationRequest {
            persistent: vec![PersistentExtent {
                format: Some(format),
                by_one,
                ..PersistentExtent::new(Capacity::Remaining)
            }],
            ..Default::default()
        };

        let mut layout = MemoryAllocationLayout::default();
        for (format, by_one) in [(InterleaveFormat::default(), false), (other, true)] {
            CheckRecommendedSettings
                .execute(&ctx, &request(format, by_one), &mut layout)
                .unwrap();
        }
        assert!(layout.warnings.is_empty());

        CheckRecommendedSettings
            .execute(&ctx, &request(other, false), &mut layout)
            .unwrap();
        assert_eq!(
            layout.warnings,
            vec![LayoutWarning::PersistentSettingsNotRecommended]
        );
    }
}
