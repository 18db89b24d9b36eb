//! Connection counters exposed to hosts and handlers

use std::time::{Duration, Instant};

/// Running totals for one context, across reconnects
#[derive(Debug, Clone, Default)]
pub struct ConnectionStats {
    pub frames_received: u64,
    pub malformed_frames: u64,
    pub events_dispatched: u64,
    pub handler_failures: u64,
    pub heartbeats_sent: u64,
    pub heartbeat_acks: u64,
    pub last_heartbeat_latency: Option<Duration>,
    pub connected_since: Option<Instant>,
    pub disconnects: u32,
}

impl ConnectionStats {
    pub fn uptime(&self) -> Option<Duration> {
        self.connected_since.map(|since| since.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uptime_only_while_connected() {
        let mut stats = ConnectionStats::default();
        assert_eq!(stats.uptime(), None);

        stats.connected_since = Some(Instant::now());
        assert!(stats.uptime().is_some());
    }
}
