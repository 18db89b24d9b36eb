//! Heartbeat scheduling
//!
//! The first beat goes out after `interval * jitter` so that many clients reconnecting at
//! once do not beat in lockstep; after that, one beat per interval. A beat that falls due
//! while the previous one is still unacknowledged means the connection is dead.

use rand::Rng;
use std::time::{Duration, Instant};

/// What the schedule wants done at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    NotDue,
    /// Send a heartbeat now
    Due,
    /// A beat is due but the last one was never acknowledged
    Zombied,
}

#[derive(Debug, Clone)]
pub struct HeartbeatSchedule {
    interval: Duration,
    next_due: Instant,
    awaiting_ack: bool,
    last_sent: Option<Instant>,
    last_latency: Option<Duration>,
}

impl HeartbeatSchedule {
    /// `jitter` is clamped to `[0, 1]`
    pub fn new(interval: Duration, jitter: f64, now: Instant) -> Self {
        let jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };

        Self {
            interval,
            next_due: now + interval.mul_f64(jitter),
            awaiting_ack: false,
            last_sent: None,
            last_latency: None,
        }
    }

    pub fn with_random_jitter(interval: Duration, now: Instant) -> Self {
        let jitter = rand::thread_rng().gen::<f64>();
        Self::new(interval, jitter, now)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    pub fn awaiting_ack(&self) -> bool {
        self.awaiting_ack
    }

    pub fn last_latency(&self) -> Option<Duration> {
        self.last_latency
    }

    pub fn check(&self, now: Instant) -> HeartbeatAction {
        if now < self.next_due {
            HeartbeatAction::NotDue
        } else if self.awaiting_ack {
            HeartbeatAction::Zombied
        } else {
            HeartbeatAction::Due
        }
    }

    pub fn time_until_due(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }

    /// A scheduled beat went out; the next one is due one interval from now
    pub fn record_sent(&mut self, now: Instant) {
        self.awaiting_ack = true;
        self.last_sent = Some(now);
        self.next_due = now + self.interval;
    }

    /// The server asked for a beat out of band; the schedule itself does not move
    pub fn record_requested(&mut self, now: Instant) {
        self.awaiting_ack = true;
        self.last_sent = Some(now);
    }

    /// Returns the round-trip time when a beat was outstanding
    pub fn record_ack(&mut self, now: Instant) -> Option<Duration> {
        self.awaiting_ack = false;
        let latency = self.last_sent.map(|sent| now.saturating_duration_since(sent));
        if latency.is_some() {
            self.last_latency = latency;
        }
        latency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(1000);

    #[test]
    fn test_first_beat_is_jittered() {
        let now = Instant::now();
        let schedule = HeartbeatSchedule::new(INTERVAL, 0.25, now);

        assert_eq!(schedule.next_due(), now + Duration::from_millis(250));
        assert_eq!(schedule.check(now), HeartbeatAction::NotDue);
        assert_eq!(
            schedule.check(now + Duration::from_millis(250)),
            HeartbeatAction::Due
        );
    }

    #[test]
    fn test_jitter_is_clamped() {
        let now = Instant::now();
        assert_eq!(HeartbeatSchedule::new(INTERVAL, -3.0, now).next_due(), now);
        assert_eq!(
            HeartbeatSchedule::new(INTERVAL, 7.0, now).next_due(),
            now + INTERVAL
        );
        assert_eq!(HeartbeatSchedule::new(INTERVAL, f64::NAN, now).next_due(), now);
    }

    #[test]
    fn test_random_jitter_stays_within_one_interval() {
        let now = Instant::now();
        for _ in 0..100 {
            let schedule = HeartbeatSchedule::with_random_jitter(INTERVAL, now);
            assert!(schedule.next_due() <= now + INTERVAL);
        }
    }

    #[test]
    fn test_acked_beats_keep_going() {
        let start = Instant::now();
        let mut schedule = HeartbeatSchedule::new(INTERVAL, 0.0, start);

        assert_eq!(schedule.check(start), HeartbeatAction::Due);
        schedule.record_sent(start);
        assert!(schedule.awaiting_ack());

        let acked_at = start + Duration::from_millis(40);
        assert_eq!(schedule.record_ack(acked_at), Some(Duration::from_millis(40)));
        assert!(!schedule.awaiting_ack());

        let next = start + INTERVAL;
        assert_eq!(schedule.check(next - Duration::from_millis(1)), HeartbeatAction::NotDue);
        assert_eq!(schedule.check(next), HeartbeatAction::Due);
    }

    #[test]
    fn test_missing_ack_is_zombied() {
        let start = Instant::now();
        let mut schedule = HeartbeatSchedule::new(INTERVAL, 0.0, start);
        schedule.record_sent(start);

        assert_eq!(schedule.check(start + INTERVAL), HeartbeatAction::Zombied);
    }

    #[test]
    fn test_requested_beat_does_not_move_schedule() {
        let start = Instant::now();
        let mut schedule = HeartbeatSchedule::new(INTERVAL, 0.5, start);
        let due = schedule.next_due();

        schedule.record_requested(start + Duration::from_millis(10));
        assert_eq!(schedule.next_due(), due);
        assert!(schedule.awaiting_ack());
    }

    #[test]
    fn test_ack_without_beat_has_no_latency() {
        let now = Instant::now();
        let mut schedule = HeartbeatSchedule::new(INTERVAL, 0.0, now);
        assert_eq!(schedule.record_ack(now), None);
        assert_eq!(schedule.last_latency(), None);
    }

    #[test]
    fn test_time_until_due_saturates() {
        let now = Instant::now();
        let schedule = HeartbeatSchedule::new(INTERVAL, 0.5, now);

        assert_eq!(schedule.time_until_due(now), Duration::from_millis(500));
        assert_eq!(schedule.time_until_due(now + INTERVAL), Duration::ZERO);
    }
}
