use std::collections::BTreeSet;

use nvm_api::{
    config::MemoryAllocationRequest,
    platform::{Dimm, PlatformCapabilities, Pool, SystemCapabilities},
    primitives::bytes::ByteCount,
    DimmId, SocketId,
};

/// Read-only view of the platform used for one or more allocations.
#[cfg_attr(test, derive(Clone, Default))]
pub struct AllocationContext {
    pub capabilities: SystemCapabilities,

    /// Manageable DIMMs in placement order.
    pub dimms: Vec<Dimm>,

    pub pools: Vec<Pool>,

    pub socket_count: u16,
}

impl AllocationContext {
    pub fn new(
        capabilities: SystemCapabilities,
        mut dimms: Vec<Dimm>,
        pools: Vec<Pool>,
        socket_count: u16,
    ) -> Self {
        dimms.sort_by(|a, b| a.placement().cmp(&b.placement()));
        Self {
            capabilities,
            dimms,
            pools,
            socket_count,
        }
    }

    pub fn platform(&self) -> &PlatformCapabilities {
        &self.capabilities.platform
    }

    /// Granularity of every region placed on a DIMM.
    pub fn alignment(&self) -> ByteCount {
        self.capabilities.platform.alignment
    }

    pub fn dimm(&self, dimm_id: &str) -> Option<&Dimm> {
        self.dimms.iter().find(|dimm| dimm.id == dimm_id)
    }

    pub fn dimms_on_socket(&self, socket_id: SocketId) -> impl Iterator<Item = &Dimm> {
        self.dimms
            .iter()
            .filter(move |dimm| dimm.socket_id == socket_id)
    }

    /// DIMMs targeted by a request, in placement order. Unknown DIMM ids are
    /// skipped; request rules reject them before any layout is computed.
    pub fn target_dimms(&self, request: &MemoryAllocationRequest) -> Vec<&Dimm> {
        if !request.dimms.is_empty() {
            let ids = request.dimms.iter().collect::<BTreeSet<&DimmId>>();
            self.dimms
                .iter()
                .filter(|dimm| ids.contains(&dimm.id))
                .collect()
        } else if !request.sockets.is_empty() {
            self.dimms
                .iter()
                .filter(|dimm| request.sockets.contains(&dimm.socket_id))
                .collect()
        } else {
            self.dimms.iter().collect()
        }
    }

    /// Pools holding namespaces that include the DIMM.
    pub fn pools_with_namespaces<'a>(&'a self, dimm_id: &'a str) -> impl Iterator<Item = &'a Pool> {
        self.pools.iter().filter(move |pool| {
            pool.namespace_count > 0 && pool.dimms.iter().any(|id| id == dimm_id)
        })
    }
}


#[cfg(test)]
mod tests {
    use nvm_api::platform::PoolKind;

    use super::{test_utils::*, *};

    #[test]
    fn test_target_dimms() {
        let ctx = two_socket_context(128);
        let ids = |dimms: Vec<&Dimm>| dimms.iter().map(|d| d.id.clone()).collect::<Vec<_>>();

        assert_eq!(ctx.target_dimms(&MemoryAllocationRequest::default()).len(), 4);
        assert_eq!(
            ids(ctx.target_dimms(&MemoryAllocationRequest {
                sockets: vec![1],
                ..Default::default()
            })),
            vec!["0x1001", "0x1011"]
        );
        assert_eq!(
            ids(ctx.target_dimms(&MemoryAllocationRequest {
                dimms: vec!["0x1011".into(), "0x0001".into(), "0xffff".into()],
                ..Default::default()
            })),
            vec!["0x0001", "0x1011"]
        );
    }

    #[test]
    fn test_placement_order() {
        let ctx = AllocationContext::new(
            SystemCapabilities::default(),
            vec![dimm("b", 1, 0, 0, 1), dimm("a", 0, 1, 0, 1), dimm("c", 0, 0, 1, 1)],
            Vec::new(),
            2,
        );
        let ids = ctx.dimms.iter().map(|d| d.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["c", "a", "b"]);
        assert_eq!(ctx.dimms_on_socket(0).count(), 2);
    }

    #[test]
    fn test_pools_with_namespaces() {
        let mut ctx = two_socket_context(128);
        ctx.pools = vec![
            Pool {
                id: "empty".into(),
                kind: PoolKind::AppDirect,
                dimms: vec!["0x0001".into()],
                namespace_count: 0,
            },
            Pool {
                id: "used".into(),
                kind: PoolKind::Storage,
                dimms: vec!["0x0011".into()],
                namespace_count: 2,
            },
        ];
        assert_eq!(ctx.pools_with_namespaces("0x0001").count(), 0);
        assert_eq!(
            ctx.pools_with_namespaces("0x0011")
                .map(|p| p.id.as_str())
                .collect::<Vec<_>>(),
            ["used"]
        );
    }
}
