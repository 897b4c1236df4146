use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use nvm_api::{
    config::MemoryAllocationRequest,
    error::NvmError,
    layout::{LayoutWarning, MemoryAllocationLayout},
    SocketId,
};

use super::{AllocationContext, LayoutStep};

/// Warns when the DIMMs of a socket are not populated symmetrically: every
/// memory controller should use the same channels, and every channel should
/// hold the same number of DIMMs.
pub(crate) struct CheckDimmPopulation;

#[derive(Default)]
struct SocketPopulation {
    channels_by_controller: BTreeMap<u16, BTreeSet<u16>>,
    dimms_per_channel: BTreeMap<(u16, u16), usize>,
}

impl SocketPopulation {
    fn is_optimal(&self) -> bool {
        let mut channel_sets = self.channels_by_controller.values();
        let symmetric_controllers = match channel_sets.next() {
            Some(first) => channel_sets.all(|channels| channels == first),
            None => true,
        };

        let mut counts = self.dimms_per_channel.values();
        let even_channels = match counts.next() {
            Some(first) => counts.all(|count| count == first),
            None => true,
        };

        symmetric_controllers && even_channels
    }
}

impl LayoutStep for CheckDimmPopulation {
    fn name(&self) -> &'static str {
        "check-dimm-population"
    }

    fn execute(
        &self,
        _: &AllocationContext,
        _: &MemoryAllocationRequest,
        layout: &mut MemoryAllocationLayout,
    ) -> Result<(), NvmError> {
        let mut sockets: BTreeMap<SocketId, SocketPopulation> = BTreeMap::new();
        for dimm in layout.dimms.values() {
            let socket = sockets.entry(dimm.socket_id).or_default();
            socket
                .channels_by_controller
                .entry(dimm.memory_controller_id)
                .or_default()
                .insert(dimm.channel_id);
            *socket
                .dimms_per_channel
                .entry((dimm.memory_controller_id, dimm.channel_id))
                .or_default() += 1;
        }

        if let Some(socket_id) = sockets
            .iter()
            .find_map(|(socket_id, population)| (!population.is_optimal()).then_some(*socket_id))
        {
            debug!("DIMM population of socket {socket_id} is not optimal");
            layout.add_warning(LayoutWarning::NonOptimalPopulation);
        }

        Ok(())
    }
}
