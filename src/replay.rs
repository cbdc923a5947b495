//! Input replay loop
//!
//! Replays a [`ReplaySchedule`] against a [`LiveSession`]: one key press per
//! recorded gap, followed by a spin until the compensated gap has elapsed.
//! The spin samples a monotonic clock instead of sleeping, since sleep
//! overshoot is larger than the frame-level precision the replay aims for.
//! Every spin iteration checks the session for the game-over indicator and
//! abandons the rest of the schedule once it shows up.

use crate::errors::{FlapError, Result};
use crate::schedule::ReplaySchedule;
use crate::types::ResultRecord;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Externally owned interactive session the replay drives
///
/// Each query is a non-blocking read of page state; the replay loop does all
/// of the polling itself.
#[allow(async_fn_in_trait)]
pub trait LiveSession {
    /// Dispatch one synthetic key press
    async fn press_key(&mut self) -> Result<()>;

    /// Whether the game-over indicator is present
    async fn is_terminated(&mut self) -> Result<bool>;

    /// Whether the page reports the run as finished
    async fn is_complete(&mut self) -> Result<bool>;

    async fn read_score(&mut self) -> Result<i64>;

    async fn read_auth_latency(&mut self) -> Result<f64>;
}

/// How far a replay got
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayProgress {
    pub keys_sent: usize,
    /// Game ended before the schedule ran out
    pub terminated_early: bool,
    pub elapsed: Duration,
}

/// Result of a complete run
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    pub progress: ReplayProgress,
    pub result: ResultRecord,
}

/// Paces key presses against a live session
#[derive(Debug, Clone)]
pub struct Replayer {
    compensation: Duration,
    completion_timeout: Option<Duration>,
}

impl Replayer {
    pub fn new(compensation: Duration) -> Self {
        Self {
            compensation,
            completion_timeout: None,
        }
    }

    /// Bound the post-replay completion poll
    pub fn with_completion_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.completion_timeout = timeout;
        self
    }

    pub fn compensation(&self) -> Duration {
        self.compensation
    }

    /// Replay every gap of the schedule, stopping early on game over
    pub async fn replay<S: LiveSession>(
        &self,
        session: &mut S,
        schedule: &ReplaySchedule,
    ) -> Result<ReplayProgress> {
        let gaps = schedule.paced_gaps(self.compensation);
        let started = Instant::now();
        let mut keys_sent = 0;
        let mut terminated_early = false;

        info!(presses = schedule.key_presses(), span = ?schedule.span(), "Starting replay");

        'schedule: for (i, gap) in gaps.iter().enumerate() {
            let gap_start = Instant::now();
            session.press_key().await?;
            keys_sent += 1;

            while gap_start.elapsed() < *gap {
                if session.is_terminated().await? {
                    debug!(index = i, "Game over indicator seen during gap");
                    terminated_early = true;
                    break 'schedule;
                }
            }
        }

        let progress = ReplayProgress {
            keys_sent,
            terminated_early,
            elapsed: started.elapsed(),
        };
        info!(
            keys_sent = progress.keys_sent,
            terminated_early = progress.terminated_early,
            elapsed = ?progress.elapsed,
            "Replay finished"
        );
        Ok(progress)
    }

    /// Spin until the session reports completion
    ///
    /// Without a completion timeout this never gives up.
    pub async fn wait_for_completion<S: LiveSession>(&self, session: &mut S) -> Result<()> {
        let started = Instant::now();
        let mut warned = false;

        loop {
            if session.is_complete().await? {
                debug!(waited = ?started.elapsed(), "Session reported completion");
                return Ok(());
            }

            let waited = started.elapsed();
            match self.completion_timeout {
                Some(limit) if waited >= limit => {
                    return Err(FlapError::timeout(limit, "completion flag never became true"));
                }
                None if !warned && waited >= Duration::from_secs(60) => {
                    warn!("Still waiting for the completion flag after a minute (no timeout set)");
                    warned = true;
                }
                _ => {}
            }
        }
    }

    /// Full post-connect flow: replay, wait for completion, read results
    pub async fn run<S: LiveSession>(
        &self,
        session: &mut S,
        schedule: &ReplaySchedule,
        seed: &str,
    ) -> Result<ReplayOutcome> {
        let progress = self.replay(session, schedule).await?;
        self.wait_for_completion(session).await?;
        let result = collect_result(session, seed).await?;
        info!(score = result.score, auth_latency = result.auth_latency, seed = %result.seed, "Collected result");
        Ok(ReplayOutcome { progress, result })
    }
}

impl Default for Replayer {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::DEFAULT_COMPENSATION_MS))
    }
}

/// Read the final score and authentication latency out of the session
pub async fn collect_result<S: LiveSession>(session: &mut S, seed: &str) -> Result<ResultRecord> {
    let score = session.read_score().await?;
    let auth_latency = session.read_auth_latency().await?;
    Ok(ResultRecord {
        score,
        auth_latency,
        seed: seed.to_string(),
    })
}

/// Seed identifier of a recording: the input file name without extension
pub fn seed_from_path(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| FlapError::config(format!("cannot derive seed from {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Session double that ends the game after a fixed number of presses
    #[derive(Default)]
    struct ScriptedSession {
        presses: usize,
        end_after: Option<usize>,
        complete_after_polls: usize,
        completion_polls: usize,
        termination_checks: usize,
    }

    impl LiveSession for ScriptedSession {
        async fn press_key(&mut self) -> Result<()> {
            self.presses += 1;
            Ok(())
        }

        async fn is_terminated(&mut self) -> Result<bool> {
            self.termination_checks += 1;
            Ok(self.end_after.is_some_and(|n| self.presses >= n))
        }

        async fn is_complete(&mut self) -> Result<bool> {
            self.completion_polls += 1;
            Ok(self.completion_polls > self.complete_after_polls)
        }

        async fn read_score(&mut self) -> Result<i64> {
            Ok(17)
        }

        async fn read_auth_latency(&mut self) -> Result<f64> {
            Ok(0.231)
        }
    }

    #[tokio::test]
    async fn test_full_schedule_presses_once_per_gap() {
        let schedule = ReplaySchedule::new(&[1000, 1003, 1006, 1010]);
        let mut session = ScriptedSession::default();

        let progress = Replayer::new(Duration::ZERO)
            .replay(&mut session, &schedule)
            .await
            .unwrap();

        assert_eq!(progress.keys_sent, 3);
        assert_eq!(session.presses, 3);
        assert!(!progress.terminated_early);
    }

    #[tokio::test]
    async fn test_replay_respects_recorded_gaps() {
        let schedule = ReplaySchedule::new(&[0, 30, 60]);
        let mut session = ScriptedSession::default();

        let progress = Replayer::new(Duration::from_millis(11))
            .replay(&mut session, &schedule)
            .await
            .unwrap();

        // Two compensated waits of 19ms each
        assert!(progress.elapsed >= Duration::from_millis(38), "{:?}", progress.elapsed);
        assert!(session.termination_checks > 0);
    }

    #[tokio::test]
    async fn test_game_over_stops_replay() {
        let schedule = ReplaySchedule::new(&[0, 5, 10, 15, 20, 25]);
        let mut session = ScriptedSession {
            end_after: Some(2),
            ..Default::default()
        };

        let progress = Replayer::new(Duration::ZERO)
            .replay(&mut session, &schedule)
            .await
            .unwrap();

        assert!(progress.terminated_early);
        assert_eq!(progress.keys_sent, 2);
        assert_eq!(session.presses, 2);
    }

    #[tokio::test]
    async fn test_empty_schedule_sends_nothing() {
        let schedule = ReplaySchedule::new(&[]);
        let mut session = ScriptedSession::default();
        let progress = Replayer::default().replay(&mut session, &schedule).await.unwrap();
        assert_eq!(progress.keys_sent, 0);
    }

    #[tokio::test]
    async fn test_completion_poll_spins_until_flag() {
        let mut session = ScriptedSession {
            complete_after_polls: 25,
            ..Default::default()
        };
        Replayer::default().wait_for_completion(&mut session).await.unwrap();
        assert_eq!(session.completion_polls, 26);
    }

    #[tokio::test]
    async fn test_completion_timeout() {
        let mut session = ScriptedSession {
            complete_after_polls: usize::MAX,
            ..Default::default()
        };
        let err = Replayer::default()
            .with_completion_timeout(Some(Duration::from_millis(20)))
            .wait_for_completion(&mut session)
            .await
            .unwrap_err();
        assert!(matches!(err, FlapError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_run_collects_result() {
        let schedule = ReplaySchedule::new(&[0, 2, 4]);
        let mut session = ScriptedSession::default();
        let outcome = Replayer::new(Duration::ZERO)
            .run(&mut session, &schedule, "seed42")
            .await
            .unwrap();

        assert_eq!(
            outcome.result,
            ResultRecord {
                score: 17,
                auth_latency: 0.231,
                seed: "seed42".to_string(),
            }
        );
        assert_eq!(outcome.progress.keys_sent, 2);
    }

    #[test]
    fn test_seed_from_path() {
        assert_eq!(seed_from_path(&PathBuf::from("inputs/seed42.csv")).unwrap(), "seed42");
        assert!(seed_from_path(&PathBuf::from("/")).is_err());
    }
}
