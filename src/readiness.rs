//! Engine load and responder health.
//!
//! Two independent signals gate dispatch: the host document must be loaded
//! (`performing_long_load` is false) and the engine's result channel must be
//! responding. Both arrive as [`EngineEvent`](crate::EngineEvent) messages and
//! are folded in on the owner thread.

use std::time::{Duration, Instant};

/// Host document load phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadPhase {
    #[default]
    NotLoaded,
    /// Content is being fetched or parsed.
    Loading,
    Ready,
}

/// Transition worth reporting to the rest of the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadinessChange {
    /// Load finished. `reload` is set when the engine had been ready before.
    BecameReady { reload: bool },
    LoadFailed { message: String },
    /// The result channel went down.
    Degraded,
    /// The result channel came back.
    Recovered,
}

/// Tracks load phase and responder health.
#[derive(Clone, Debug)]
pub struct ReadinessTracker {
    phase: LoadPhase,
    responding: bool,
    loaded_once: bool,
    last_heartbeat: Option<Instant>,
    heartbeat_timeout: Option<Duration>,
}

impl ReadinessTracker {
    pub fn new(heartbeat_timeout: Option<Duration>) -> Self {
        Self {
            phase: LoadPhase::NotLoaded,
            responding: true,
            loaded_once: false,
            last_heartbeat: None,
            heartbeat_timeout,
        }
    }

    pub fn set_heartbeat_timeout(&mut self, heartbeat_timeout: Option<Duration>) {
        self.heartbeat_timeout = heartbeat_timeout;
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn performing_long_load(&self) -> bool {
        self.phase == LoadPhase::Loading
    }

    pub fn result_server_responding(&self) -> bool {
        self.responding
    }

    /// Commands may be dispatched only while loaded and responding.
    pub fn accepts_commands(&self) -> bool {
        self.phase == LoadPhase::Ready && self.responding
    }

    pub fn load_started(&mut self) {
        if self.phase == LoadPhase::Ready {
            log::debug!("readiness: engine reloading host document");
        }
        self.phase = LoadPhase::Loading;
    }

    pub fn load_finished(&mut self, now: Instant) -> Option<ReadinessChange> {
        if self.phase == LoadPhase::Ready {
            return None;
        }
        self.phase = LoadPhase::Ready;
        self.last_heartbeat = Some(now);
        let reload = self.loaded_once;
        self.loaded_once = true;
        Some(ReadinessChange::BecameReady { reload })
    }

    pub fn load_failed(&mut self, message: String) -> ReadinessChange {
        log::warn!("readiness: host document failed to load: {}", message);
        self.phase = LoadPhase::NotLoaded;
        ReadinessChange::LoadFailed { message }
    }

    pub fn set_responding(&mut self, responding: bool, now: Instant) -> Option<ReadinessChange> {
        if responding {
            self.last_heartbeat = Some(now);
        }
        if self.responding == responding {
            return None;
        }
        self.responding = responding;
        if responding {
            log::debug!("readiness: result channel recovered");
            Some(ReadinessChange::Recovered)
        } else {
            log::warn!("readiness: result channel down");
            Some(ReadinessChange::Degraded)
        }
    }

    pub fn heartbeat(&mut self, now: Instant) -> Option<ReadinessChange> {
        self.set_responding(true, now)
    }

    /// Mark the responder down when heartbeats have gone quiet for too long.
    pub fn check(&mut self, now: Instant) -> Option<ReadinessChange> {
        let timeout = self.heartbeat_timeout?;
        if self.phase != LoadPhase::Ready || !self.responding {
            return None;
        }
        let last = self.last_heartbeat?;
        if now.saturating_duration_since(last) < timeout {
            return None;
        }
        self.set_responding(false, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_cycle_gates_commands() {
        let now = Instant::now();
        let mut tracker = ReadinessTracker::new(None);
        assert!(!tracker.accepts_commands());
        assert!(!tracker.performing_long_load());

        tracker.load_started();
        assert!(tracker.performing_long_load());
        assert!(!tracker.accepts_commands());

        assert_eq!(
            tracker.load_finished(now),
            Some(ReadinessChange::BecameReady { reload: false })
        );
        assert!(tracker.accepts_commands());
        assert_eq!(tracker.load_finished(now), None);
    }

    #[test]
    fn reload_is_flagged() {
        let now = Instant::now();
        let mut tracker = ReadinessTracker::new(None);
        tracker.load_started();
        tracker.load_finished(now);
        tracker.load_started();
        assert!(tracker.performing_long_load());
        assert_eq!(
            tracker.load_finished(now),
            Some(ReadinessChange::BecameReady { reload: true })
        );
    }

    #[test]
    fn responder_flips_independently_of_load() {
        let now = Instant::now();
        let mut tracker = ReadinessTracker::new(None);
        tracker.load_started();
        tracker.load_finished(now);
        assert_eq!(
            tracker.set_responding(false, now),
            Some(ReadinessChange::Degraded)
        );
        assert_eq!(tracker.phase(), LoadPhase::Ready);
        assert!(!tracker.accepts_commands());
        assert_eq!(tracker.set_responding(false, now), None);
        assert_eq!(tracker.heartbeat(now), Some(ReadinessChange::Recovered));
        assert!(tracker.accepts_commands());
    }

    #[test]
    fn stale_heartbeat_degrades_only_when_supervised() {
        let start = Instant::now();
        let mut unsupervised = ReadinessTracker::new(None);
        unsupervised.load_started();
        unsupervised.load_finished(start);
        assert_eq!(unsupervised.check(start + Duration::from_secs(3600)), None);

        let mut tracker = ReadinessTracker::new(Some(Duration::from_secs(2)));
        tracker.load_started();
        tracker.load_finished(start);
        assert_eq!(tracker.check(start + Duration::from_millis(1999)), None);
        tracker.heartbeat(start + Duration::from_millis(1500));
        assert_eq!(tracker.check(start + Duration::from_millis(3000)), None);
        assert_eq!(
            tracker.check(start + Duration::from_millis(3500)),
            Some(ReadinessChange::Degraded)
        );
        assert!(!tracker.result_server_responding());
    }

    #[test]
    fn failed_load_returns_to_not_loaded() {
        let mut tracker = ReadinessTracker::new(None);
        tracker.load_started();
        let change = tracker.load_failed("net::ERR_FILE_NOT_FOUND".to_string());
        assert!(matches!(change, ReadinessChange::LoadFailed { .. }));
        assert_eq!(tracker.phase(), LoadPhase::NotLoaded);
        assert!(!tracker.performing_long_load());
    }
}
