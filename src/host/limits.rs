//! Hard resource ceilings for queue hosts
//!
//! The check exists to fail fast locally instead of letting the scheduler
//! reject the job after hours in the queue. Interactive hosts carry no
//! limits at all.

use crate::error::LimitViolation;
use crate::host::walltime::Walltime;

/// A host's hard ceilings. All values non-negative; `max_total` may be
/// smaller than `max_nodes * max_ppn` on allocation-constrained clusters.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    pub max_nodes: i64,
    pub max_ppn: i64,
    pub max_total: i64,
    pub min_nodes: i64,
    pub max_wall: Walltime,
    /// In MB.
    pub max_mem_per_node: i64,
}

/// How a host interprets the node/ppn pair during limit checks.
///
/// `TotalProcessors` hosts accept `ppn == -1`, which changes the meaning of
/// `nodes` to "total processor count". Memory is deliberately not checked
/// in that case; without a ppn there is no per-node figure to check
/// against. This is preserved legacy behavior, not an oversight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitPolicy {
    Standard,
    TotalProcessors,
}

/// The user's resource request, after defaults and prompting.
#[derive(Debug, Clone, Copy)]
pub struct ResourceRequest {
    pub nodes: i64,
    pub ppn: i64,
    pub wall: Walltime,
    /// Per-processor memory in MB.
    pub mem: Option<i64>,
}

impl ResourceLimits {
    pub fn check(
        &self,
        host: &str,
        policy: LimitPolicy,
        req: &ResourceRequest,
    ) -> Result<(), LimitViolation> {
        if policy == LimitPolicy::TotalProcessors && req.ppn == -1 {
            // nodes is the total processor count here
            if req.nodes > self.max_total {
                return Err(LimitViolation::MaxTotal {
                    host: host.to_string(),
                    max: self.max_total,
                });
            }
            if req.nodes < self.min_nodes {
                return Err(LimitViolation::MinTotal {
                    host: host.to_string(),
                    min: self.min_nodes,
                });
            }
        } else {
            if req.ppn < 1 {
                return Err(LimitViolation::NonPositivePpn);
            }
            if req.nodes > self.max_nodes {
                return Err(LimitViolation::MaxNodes {
                    host: host.to_string(),
                    max: self.max_nodes,
                });
            }
            if req.ppn > self.max_ppn {
                return Err(LimitViolation::MaxPpn {
                    host: host.to_string(),
                    max: self.max_ppn,
                });
            }
            if req.nodes * req.ppn > self.max_total {
                return Err(LimitViolation::MaxTotal {
                    host: host.to_string(),
                    max: self.max_total,
                });
            }
            if req.nodes < self.min_nodes {
                return Err(LimitViolation::MinNodes {
                    host: host.to_string(),
                    min: self.min_nodes,
                });
            }
            if let Some(mem) = req.mem {
                if req.ppn * mem > self.max_mem_per_node {
                    return Err(LimitViolation::MaxMemPerNode {
                        host: host.to_string(),
                        max: self.max_mem_per_node,
                    });
                }
            }
        }

        if req.wall > self.max_wall {
            return Err(LimitViolation::MaxWall {
                host: host.to_string(),
                max: self.max_wall,
            });
        }

        Ok(())
    }
}
