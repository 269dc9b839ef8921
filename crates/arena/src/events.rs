//! Live events for observers
//!
//! Publishing never blocks the run: a slow subscriber lags and loses the
//! oldest events, it never holds up the scheduler.

use match_logic::MatchProgress;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::leaderboard::Leaderboard;
use crate::state::{CurrentMatch, MatchRecord, MatchSeat, RunKind};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArenaEvent {
    TournamentStarted {
        kind: RunKind,
        total_matches: usize,
        participants: Vec<MatchSeat>,
    },
    MatchStarted {
        #[serde(flatten)]
        current: CurrentMatch,
    },
    MatchProgress {
        match_number: usize,
        #[serde(flatten)]
        progress: MatchProgress,
    },
    MatchCompleted {
        result: MatchRecord,
        leaderboard: Leaderboard,
    },
    TournamentPaused,
    TournamentResumed,
    TournamentStopped {
        completed_matches: usize,
    },
    TournamentReset,
    TournamentFinished {
        leaderboard: Leaderboard,
    },
    TournamentError {
        message: String,
    },
}

impl ArenaEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ArenaEvent::TournamentStarted { .. } => "tournament_started",
            ArenaEvent::MatchStarted { .. } => "match_started",
            ArenaEvent::MatchProgress { .. } => "match_progress",
            ArenaEvent::MatchCompleted { .. } => "match_completed",
            ArenaEvent::TournamentPaused => "tournament_paused",
            ArenaEvent::TournamentResumed => "tournament_resumed",
            ArenaEvent::TournamentStopped { .. } => "tournament_stopped",
            ArenaEvent::TournamentReset => "tournament_reset",
            ArenaEvent::TournamentFinished { .. } => "tournament_finished",
            ArenaEvent::TournamentError { .. } => "tournament_error",
        }
    }
}

/// Destination for arena events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: ArenaEvent);
}

/// Fan-out to any number of subscribers over a bounded broadcast channel.
#[derive(Clone, Debug)]
pub struct BroadcastSink {
    tx: broadcast::Sender<ArenaEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ArenaEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: ArenaEvent) {
        let kind = event.kind();
        // Err only means nobody is listening
        if self.tx.send(event).is_err() {
            trace!(kind, "event dropped, no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use match_logic::{Move, ParticipantId, ProgressEntry};

    #[test]
    fn test_tagged_snake_case() {
        let json = serde_json::to_value(ArenaEvent::TournamentPaused).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "tournament_paused" }));

        let json = serde_json::to_value(ArenaEvent::TournamentError {
            message: "Need at least 3 participants".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "tournament_error");
        assert_eq!(json["message"], "Need at least 3 participants");
    }

    #[test]
    fn test_progress_payload_is_flat() {
        let event = ArenaEvent::MatchProgress {
            match_number: 2,
            progress: MatchProgress {
                round: 5,
                total_rounds: 30,
                participants: vec![ProgressEntry {
                    id: ParticipantId(1),
                    name: "Alpha".into(),
                    score: 12,
                    last_move: Move::Defect,
                    cooperation_pct: 40.0,
                }],
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "match_progress");
        assert_eq!(json["match_number"], 2);
        assert_eq!(json["round"], 5);
        assert_eq!(json["total_rounds"], 30);
        assert_eq!(json["participants"][0]["last_move"], "D");
    }

    #[test]
    fn test_kind_matches_tag() {
        let event = ArenaEvent::TournamentStopped { completed_matches: 3 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind());
    }

    #[test]
    fn test_publish_without_subscribers_is_ignored() {
        let sink = BroadcastSink::new(4);
        sink.publish(ArenaEvent::TournamentReset);
        assert_eq!(sink.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_each_receive() {
        let sink = BroadcastSink::new(4);
        let mut a = sink.subscribe();
        let mut b = sink.subscribe();
        sink.publish(ArenaEvent::TournamentResumed);
        assert_eq!(a.recv().await.unwrap(), ArenaEvent::TournamentResumed);
        assert_eq!(b.recv().await.unwrap(), ArenaEvent::TournamentResumed);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let sink = BroadcastSink::new(2);
        let mut rx = sink.subscribe();
        for _ in 0..5 {
            sink.publish(ArenaEvent::TournamentPaused);
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(rx.recv().await.unwrap(), ArenaEvent::TournamentPaused);
    }
}
