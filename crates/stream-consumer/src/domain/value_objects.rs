/// Tuning knobs for one running consumer loop.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Capacity of the outbound channel SC emits `BlockPayload`s on.
    /// Recommended 20,000 (§4.1); SC blocks on send once it fills.
    pub outbound_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: shared_bus::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}
