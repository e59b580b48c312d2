//! Typing sessions
//!
//! A session is a run of keypresses whose consecutive gaps all stay below
//! the configured delta. A lone keypress is not a session.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Session {
    /// Stamp of the first key
    pub start: f64,
    /// Stamp of the last key
    pub end: f64,
    pub keys: usize,
}

impl Session {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Split ascending key stamps into sessions
pub fn segment_sessions(stamps: &[f64], max_delta: f64) -> Vec<Session> {
    let mut sessions = Vec::new();
    let mut current: Option<Session> = None;

    for pair in stamps.windows(2) {
        let (prev, stamp) = (pair[0], pair[1]);
        if stamp - prev < max_delta {
            match current.as_mut() {
                Some(session) => {
                    session.end = stamp;
                    session.keys += 1;
                }
                None => {
                    current = Some(Session {
                        start: prev,
                        end: stamp,
                        keys: 2,
                    })
                }
            }
        } else if let Some(session) = current.take() {
            sessions.push(session);
        }
    }
    sessions.extend(current);
    sessions
}

/// Aggregate figures over a window of keypresses
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub keys: usize,
    pub sessions: usize,
    /// Keys in the longest session by duration
    pub longest_session_keys: usize,
    pub longest_session_duration: f64,
    pub most_keys_in_session: usize,
    pub average_session_keys: f64,
    pub average_session_duration: f64,
    /// Mean gap between consecutive keys, sessions or not
    pub average_key_interval: f64,
    pub keys_per_hour: f64,
}

impl SessionStats {
    pub fn compute(stamps: &[f64], max_delta: f64) -> Self {
        let sessions = segment_sessions(stamps, max_delta);
        let mut stats = SessionStats {
            keys: stamps.len(),
            sessions: sessions.len(),
            ..Default::default()
        };

        if let (Some(first), Some(last)) = (stamps.first(), stamps.last()) {
            let span = last - first;
            if stamps.len() > 1 {
                stats.average_key_interval = span / (stamps.len() - 1) as f64;
            }
            stats.keys_per_hour = if span > 0.0 {
                3600.0 * stamps.len() as f64 / span
            } else {
                stamps.len() as f64
            };
        }

        if let Some(longest) = sessions
            .iter()
            .max_by(|a, b| a.duration().total_cmp(&b.duration()))
        {
            stats.longest_session_keys = longest.keys;
            stats.longest_session_duration = longest.duration();
        }
        stats.most_keys_in_session = sessions.iter().map(|s| s.keys).max().unwrap_or(0);
        if !sessions.is_empty() {
            let n = sessions.len() as f64;
            stats.average_session_keys = sessions.iter().map(|s| s.keys).sum::<usize>() as f64 / n;
            stats.average_session_duration = sessions.iter().map(Session::duration).sum::<f64>() / n;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamps_from_deltas(deltas: &[f64]) -> Vec<f64> {
        let mut stamps = vec![100.0];
        for d in deltas {
            let last = stamps[stamps.len() - 1];
            stamps.push(last + d);
        }
        stamps
    }

    #[test]
    fn test_segment_by_delta() {
        let stamps = stamps_from_deltas(&[1.0, 1.0, 5.0, 1.0]);
        let sessions = segment_sessions(&stamps, 3.0);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].keys, 3);
        assert_eq!(sessions[1].keys, 2);
        assert_eq!(sessions[0].duration(), 2.0);
    }

    #[test]
    fn test_delta_equal_to_max_breaks() {
        let stamps = stamps_from_deltas(&[3.0, 3.0]);
        assert!(segment_sessions(&stamps, 3.0).is_empty());
    }

    #[test]
    fn test_single_key_is_no_session() {
        assert!(segment_sessions(&[5.0], 3.0).is_empty());
        assert!(segment_sessions(&[], 3.0).is_empty());
    }

    #[test]
    fn test_stats() {
        let stamps = stamps_from_deltas(&[1.0, 1.0, 5.0, 1.0, 0.5, 0.5, 0.5]);
        let stats = SessionStats::compute(&stamps, 3.0);
        assert_eq!(stats.keys, 8);
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.longest_session_keys, 5);
        assert_eq!(stats.longest_session_duration, 2.5);
        assert_eq!(stats.most_keys_in_session, 5);
        assert_eq!(stats.average_session_keys, 4.0);
        assert_eq!(stats.average_session_duration, 2.25);
        assert_eq!(stats.average_key_interval, 9.5 / 7.0);
    }

    #[test]
    fn test_stats_empty() {
        assert_eq!(SessionStats::compute(&[], 3.0), SessionStats::default());
    }
}
