/// Runtime tracker configuration and compile-time pool limits.
use crate::ewma;

/// Maximum tracked nodes. Power of two: also sizes the MAC index.
pub const MAX_NODES: usize = 128;

/// Maximum distinct essid groups.
pub const MAX_ESSIDS: usize = 32;

/// Maximum distinct channels in the channel index.
pub const MAX_CHANNELS: usize = 64;

/// Maximum (node, channel) memberships across all nodes.
pub const MAX_MEMBERSHIPS: usize = 512;

/// Default silence, in seconds, before a node is evicted.
pub const DEFAULT_NODE_TIMEOUT: u32 = 60;

/// Default seconds between timeout sweeps.
pub const DEFAULT_SWEEP_INTERVAL: u32 = 1;

/// Tracker configuration, owned by the caller and handed to the registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    /// Weight of each new signal sample in the moving average, in (0, 1].
    pub ewma_weight: f32,
    /// Seconds without a frame before a node is evicted.
    pub node_timeout: u32,
    /// Seconds between sweeps, for [`SweepTimer`](crate::registry::SweepTimer).
    pub sweep_interval: u32,
}

impl TrackerConfig {
    pub const fn new() -> Self {
        Self {
            ewma_weight: ewma::DEFAULT_WEIGHT,
            node_timeout: DEFAULT_NODE_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Set the moving-average weight, clamped to (0, 1]. NaN falls back to
    /// the default.
    pub fn with_ewma_weight(mut self, weight: f32) -> Self {
        self.ewma_weight = if weight.is_nan() {
            ewma::DEFAULT_WEIGHT
        } else if weight <= 0.0 {
            f32::MIN_POSITIVE
        } else if weight > 1.0 {
            1.0
        } else {
            weight
        };
        self
    }

    pub fn with_node_timeout(mut self, secs: u32) -> Self {
        self.node_timeout = secs;
        self
    }

    pub fn with_sweep_interval(mut self, secs: u32) -> Self {
        self.sweep_interval = secs.max(1);
        self
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new()
    }
}
