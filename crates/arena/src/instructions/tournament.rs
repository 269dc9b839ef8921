//! Tournament lifecycle instructions
//!
//! `start` and `start_showdown` build the schedule under the arena lock and
//! spawn the run task. The task plays matches strictly in order, waits at
//! match boundaries while paused, and gives up as soon as the run generation
//! it was started with is no longer current (stop, reset or a newer start).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use match_logic::{generate_all_groups, Contestant, Match, ParticipantId, PayoffTable};
use tokio::runtime::Handle;
use tokio::task;
use tracing::{debug, error, info, warn};

use crate::error::{require, ArenaError, Result};
use crate::events::ArenaEvent;
use crate::leaderboard::Leaderboard;
use crate::registry::Registry;
use crate::state::{CurrentMatch, MatchRecord, MatchSeat, RunKind, TournamentState, TournamentStatus};
use crate::ArenaInner;

/// Everything the run task needs, fixed when the run starts.
struct Schedule {
    generation: u64,
    groups: Vec<Vec<ParticipantId>>,
    payoff: PayoffTable,
}

/// Every `match_size` group of `ids`, in lexicographic order of position.
fn schedule_groups(ids: &[ParticipantId], match_size: usize) -> Vec<Vec<ParticipantId>> {
    generate_all_groups(ids.len(), match_size)
        .into_iter()
        .map(|group| group.into_iter().map(|i| ids[i]).collect())
        .collect()
}

/// Round-robin over the whole roster, in registration order.
pub(crate) fn start(inner: &Arc<ArenaInner>) -> Result<usize> {
    begin(inner, RunKind::RoundRobin, |registry| Ok(registry.ids()))
}

/// Round-robin over a fixed subset, in the order given.
pub(crate) fn start_showdown(inner: &Arc<ArenaInner>, ids: &[ParticipantId]) -> Result<usize> {
    begin(inner, RunKind::Showdown, |registry| {
        let mut seen = HashSet::new();
        for &id in ids {
            require!(
                seen.insert(id),
                ArenaError::InvalidShowdown(format!("participant {} listed twice", id))
            );
            require!(registry.get(id).is_some(), ArenaError::UnknownParticipant(id));
        }
        Ok(ids.to_vec())
    })
}

fn begin(
    inner: &Arc<ArenaInner>,
    kind: RunKind,
    select: impl FnOnce(&Registry) -> Result<Vec<ParticipantId>>,
) -> Result<usize> {
    let runtime = Handle::try_current()
        .map_err(|_| ArenaError::Config("starting a tournament needs a tokio runtime".into()))?;
    let match_size = inner.config.match_size;

    let mut shared = inner.shared.write();
    require!(!shared.state.is_active(), ArenaError::AlreadyRunning);

    let ids = select(&shared.registry)?;
    if ids.len() < match_size {
        drop(shared);
        warn!(found = ids.len(), required = match_size, "Not enough participants to start");
        inner.publish(ArenaEvent::TournamentError {
            message: format!("Need at least {} participants", match_size),
        });
        return Err(ArenaError::InsufficientParticipants {
            required: match_size,
            found: ids.len(),
        });
    }

    let participants: Vec<MatchSeat> = shared
        .registry
        .subset(&ids)?
        .into_iter()
        .map(|p| MatchSeat {
            id: p.id,
            name: p.name.clone(),
        })
        .collect();
    let groups = schedule_groups(&ids, match_size);
    let total_matches = groups.len();

    // A new run starts from zero
    shared.generation += 1;
    shared.registry.reset_stats();
    shared.results.clear();
    shared.refresh_leaderboard();
    shared.state = TournamentState::started(kind, total_matches);
    inner.set_status(&mut shared, TournamentStatus::Running);

    let schedule = Schedule {
        generation: shared.generation,
        groups,
        payoff: shared.payoff.clone(),
    };
    drop(shared);

    info!(
        ?kind,
        total_matches,
        participants = participants.len(),
        generation = schedule.generation,
        "Tournament started"
    );
    inner.publish(ArenaEvent::TournamentStarted {
        kind,
        total_matches,
        participants,
    });

    let handle = runtime.spawn(run(Arc::clone(inner), schedule));
    if let Some(previous) = inner.task.lock().replace(handle) {
        previous.abort();
    }
    Ok(total_matches)
}

pub(crate) fn pause(inner: &ArenaInner) -> Result<()> {
    {
        let mut shared = inner.shared.write();
        let from = shared.state.status;
        require!(
            from == TournamentStatus::Running,
            ArenaError::InvalidTransition { from, action: "pause" }
        );
        inner.set_status(&mut shared, TournamentStatus::Paused);
    }

    info!("Tournament paused");
    inner.publish(ArenaEvent::TournamentPaused);
    Ok(())
}

pub(crate) fn resume(inner: &ArenaInner) -> Result<()> {
    {
        let mut shared = inner.shared.write();
        let from = shared.state.status;
        require!(
            from == TournamentStatus::Paused,
            ArenaError::InvalidTransition { from, action: "resume" }
        );
        inner.set_status(&mut shared, TournamentStatus::Running);
    }

    info!("Tournament resumed");
    inner.publish(ArenaEvent::TournamentResumed);
    Ok(())
}

/// Cancel the active run, keeping the results of finished matches.
pub(crate) fn stop(inner: &ArenaInner) -> Result<()> {
    let completed_matches = {
        let mut shared = inner.shared.write();
        let from = shared.state.status;
        require!(
            from.is_active(),
            ArenaError::InvalidTransition { from, action: "stop" }
        );
        shared.generation += 1;
        shared.state.current_match = None;
        inner.set_status(&mut shared, TournamentStatus::Idle);
        shared.state.completed_matches
    };
    inner.abort_task();

    info!(completed_matches, "Tournament stopped");
    inner.publish(ArenaEvent::TournamentStopped { completed_matches });
    Ok(())
}

async fn run(inner: Arc<ArenaInner>, schedule: Schedule) {
    let Schedule {
        generation,
        groups,
        payoff,
    } = schedule;

    for (index, ids) in groups.iter().enumerate() {
        if !wait_while_paused(&inner, generation).await {
            debug!(generation, "Run cancelled between matches");
            return;
        }
        match play_match(&inner, generation, index, ids, &payoff).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(generation, match_number = index + 1, "Run cancelled during a match");
                return;
            }
            Err(err) => {
                abort_run(&inner, generation, &err);
                return;
            }
        }
    }

    if let Some(leaderboard) = finish_run(&inner, generation) {
        info!(generation, matches = groups.len(), "Tournament finished");
        inner.publish(ArenaEvent::TournamentFinished { leaderboard });
    }
}

/// Block at a match boundary while paused. `false` once the run is over.
async fn wait_while_paused(inner: &ArenaInner, generation: u64) -> bool {
    let mut status = inner.status_tx.subscribe();
    loop {
        match current_status(inner, generation) {
            Some(TournamentStatus::Running) => return true,
            Some(TournamentStatus::Paused) => {}
            _ => return false,
        }
        // Any status change wakes us; the poll bounds the wait regardless
        if let Ok(Err(_)) = tokio::time::timeout(inner.config.pause_poll(), status.changed()).await {
            tokio::time::sleep(inner.config.pause_poll()).await;
        }
    }
}

fn current_status(inner: &ArenaInner, generation: u64) -> Option<TournamentStatus> {
    let shared = inner.shared.read();
    (shared.generation == generation).then_some(shared.state.status)
}

fn is_current(inner: &ArenaInner, generation: u64) -> bool {
    inner.shared.read().generation == generation
}

async fn pace(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Play one scheduled match. `Ok(false)` if the run was cancelled meanwhile;
/// nothing from a cancelled match is recorded.
async fn play_match(
    inner: &ArenaInner,
    generation: u64,
    index: usize,
    ids: &[ParticipantId],
    payoff: &PayoffTable,
) -> Result<bool> {
    let match_number = index + 1;
    let Some((contestants, current)) = begin_match(inner, generation, index, ids)? else {
        return Ok(false);
    };
    debug!(match_number, participants = ?ids, "Match started");
    inner.publish(ArenaEvent::MatchStarted { current });
    pace(inner.config.match_start_delay()).await;

    let mut game = Match::new(
        contestants,
        payoff.clone(),
        inner.sandbox.clone(),
        inner.config.match_config(),
    )?;

    // Rounds run on the blocking pool, one progress interval at a time
    while !game.is_finished() {
        let (returned, progress) = task::spawn_blocking(move || {
            let progress = game.play_until_report();
            (game, progress)
        })
        .await
        .map_err(|e| ArenaError::Internal(format!("match {} worker failed: {}", match_number, e)))?;
        game = returned;
        let progress = progress?;

        if !is_current(inner, generation) {
            return Ok(false);
        }
        if let Some(progress) = progress {
            inner.publish(ArenaEvent::MatchProgress {
                match_number,
                progress,
            });
            pace(inner.config.round_delay()).await;
        }
    }

    let Some((record, leaderboard)) = complete_match(inner, generation, game)? else {
        return Ok(false);
    };
    let scores: Vec<(ParticipantId, i64)> = record
        .result
        .participants
        .iter()
        .map(|p| (p.id, p.score))
        .collect();
    info!(match_number, ?scores, "Match completed");
    inner.publish(ArenaEvent::MatchCompleted {
        result: record,
        leaderboard,
    });
    pace(inner.config.match_end_delay()).await;
    Ok(true)
}

fn begin_match(
    inner: &ArenaInner,
    generation: u64,
    index: usize,
    ids: &[ParticipantId],
) -> Result<Option<(Vec<Contestant>, CurrentMatch)>> {
    let mut shared = inner.shared.write();
    if shared.generation != generation {
        return Ok(None);
    }
    let contestants = shared.registry.contestants(ids)?;
    let current = CurrentMatch {
        match_number: index + 1,
        participants: contestants
            .iter()
            .map(|c| MatchSeat {
                id: c.id,
                name: c.name.clone(),
            })
            .collect(),
    };
    shared.state.current_match_index = index;
    shared.state.current_match = Some(current.clone());
    Ok(Some((contestants, current)))
}

/// Apply a finished match's totals, log it and rebuild the leaderboard, all
/// under one write lock.
fn complete_match(
    inner: &ArenaInner,
    generation: u64,
    game: Match,
) -> Result<Option<(MatchRecord, Leaderboard)>> {
    let result = game.finish();
    let mut shared = inner.shared.write();
    if shared.generation != generation {
        return Ok(None);
    }
    shared.registry.apply_result(&result)?;
    let record = MatchRecord::new(shared.results.len() as u64 + 1, result);
    shared.results.push(record.clone());
    shared.state.completed_matches += 1;
    shared.refresh_leaderboard();
    Ok(Some((record, shared.leaderboard.clone())))
}

fn finish_run(inner: &ArenaInner, generation: u64) -> Option<Leaderboard> {
    let mut shared = inner.shared.write();
    if shared.generation != generation {
        return None;
    }
    shared.state.current_match = None;
    inner.set_status(&mut shared, TournamentStatus::Finished);
    Some(shared.leaderboard.clone())
}

/// Invariant violation inside a run: report it and drop back to idle.
fn abort_run(inner: &ArenaInner, generation: u64, err: &ArenaError) {
    {
        let mut shared = inner.shared.write();
        if shared.generation != generation {
            return;
        }
        shared.state.current_match = None;
        inner.set_status(&mut shared, TournamentStatus::Idle);
    }

    error!(%err, generation, "Tournament aborted");
    inner.publish(ArenaEvent::TournamentError {
        message: err.to_string(),
    });
}
