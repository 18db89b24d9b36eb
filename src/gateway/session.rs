//! Per-connection gateway session
//!
//! Created by a successful `connect`, dropped as soon as the connection is lost.

use super::heartbeat::HeartbeatSchedule;
use std::time::{Duration, Instant};
use url::Url;

/// Everything that only makes sense while one socket is (being) established
#[derive(Debug, Clone)]
pub struct GatewaySession {
    url: Url,
    started_at: Instant,
    heartbeat: Option<HeartbeatSchedule>,
    last_sequence: Option<u64>,
    session_id: Option<String>,
    identified: bool,
}

impl GatewaySession {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            started_at: Instant::now(),
            heartbeat: None,
            last_sequence: None,
            session_id: None,
            identified: false,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Time since the session was created by `connect`
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    pub fn heartbeat(&self) -> Option<&HeartbeatSchedule> {
        self.heartbeat.as_ref()
    }

    pub fn heartbeat_mut(&mut self) -> Option<&mut HeartbeatSchedule> {
        self.heartbeat.as_mut()
    }

    pub fn start_heartbeat(&mut self, schedule: HeartbeatSchedule) {
        self.heartbeat = Some(schedule);
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Sequence numbers only move forward
    pub fn observe_sequence(&mut self, sequence: Option<u64>) {
        if let Some(seq) = sequence {
            self.last_sequence = Some(self.last_sequence.map_or(seq, |last| last.max(seq)));
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn set_session_id(&mut self, session_id: String) {
        self.session_id = Some(session_id);
    }

    pub fn identified(&self) -> bool {
        self.identified
    }

    pub fn mark_identified(&mut self) {
        self.identified = true;
    }

    /// How long a poll may wait before the next heartbeat needs attention
    pub fn poll_budget(&self, limit: Duration, now: Instant) -> Duration {
        match &self.heartbeat {
            Some(schedule) => limit.min(schedule.time_until_due(now)),
            None => limit,
        }
    }
}

/// Append the protocol version and encoding to a discovered gateway URL
pub fn gateway_url(raw: &str, version: u8) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(raw)?;
    url.query_pairs_mut()
        .clear()
        .append_pair("v", &version.to_string())
        .append_pair("encoding", "json");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> GatewaySession {
        GatewaySession::new(Url::parse("wss://gateway.example/").unwrap())
    }

    #[test]
    fn test_gateway_url_appends_query() {
        let url = gateway_url("wss://gateway.example/v9", 10).unwrap();
        assert_eq!(url.as_str(), "wss://gateway.example/v9?v=10&encoding=json");
    }

    #[test]
    fn test_gateway_url_replaces_existing_query() {
        let url = gateway_url("wss://gateway.discord.gg/?v=6&encoding=etf", 10).unwrap();
        assert_eq!(url.as_str(), "wss://gateway.discord.gg/?v=10&encoding=json");
    }

    #[test]
    fn test_gateway_url_rejects_garbage() {
        assert!(gateway_url("not a url", 10).is_err());
    }

    #[test]
    fn test_sequence_only_moves_forward() {
        let mut session = session();
        assert_eq!(session.last_sequence(), None);

        session.observe_sequence(Some(3));
        session.observe_sequence(None);
        session.observe_sequence(Some(2));
        assert_eq!(session.last_sequence(), Some(3));

        session.observe_sequence(Some(8));
        assert_eq!(session.last_sequence(), Some(8));
    }

    #[test]
    fn test_poll_budget_respects_heartbeat() {
        let now = Instant::now();
        let mut session = session();
        let limit = Duration::from_millis(100);

        assert_eq!(session.poll_budget(limit, now), limit);

        session.start_heartbeat(HeartbeatSchedule::new(Duration::from_millis(40), 1.0, now));
        assert_eq!(session.poll_budget(limit, now), Duration::from_millis(40));
    }

    #[test]
    fn test_age_counts_from_creation() {
        let before = Instant::now();
        let session = session();
        let later = Instant::now() + Duration::from_secs(2);
        assert!(session.age(later) >= Duration::from_secs(2));
        assert_eq!(session.age(before), Duration::ZERO);
    }

    #[test]
    fn test_identify_and_session_id() {
        let mut session = session();
        assert!(!session.identified());
        session.mark_identified();
        session.set_session_id("abc".to_string());
        assert!(session.identified());
        assert_eq!(session.session_id(), Some("abc"));
    }
}
