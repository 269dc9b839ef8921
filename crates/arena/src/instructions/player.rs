//! Roster commands
//!
//! The roster is frozen while a run is active, so a scheduled match can never
//! lose a participant or see its strategy change underneath it.

use match_logic::ParticipantId;
use tracing::{debug, info};

use crate::error::{require, ArenaError, Result};
use crate::registry::Participant;
use crate::ArenaInner;

/// Screen, compile and trial-run a strategy for the configured match size.
pub(crate) fn validate_strategy(inner: &ArenaInner, strategy: &str) -> Result<()> {
    inner
        .sandbox
        .validate(strategy, inner.config.match_size)
        .map_err(|fault| {
            debug!(%fault, "Strategy rejected");
            ArenaError::InvalidStrategy(fault)
        })
}

pub(crate) fn register(inner: &ArenaInner, name: &str, strategy: &str) -> Result<ParticipantId> {
    // Validation may take up to the strategy deadline; keep it off the lock
    validate_strategy(inner, strategy)?;

    let mut shared = inner.shared.write();
    require!(
        !shared.state.is_active(),
        ArenaError::RunActive("register participants")
    );
    let id = shared.registry.register(name, strategy)?;
    shared.refresh_leaderboard();

    info!(participant = %id, name = name.trim(), "Participant registered");
    Ok(id)
}

pub(crate) fn rename(inner: &ArenaInner, id: ParticipantId, name: &str) -> Result<()> {
    let mut shared = inner.shared.write();
    require!(
        !shared.state.is_active(),
        ArenaError::RunActive("rename participants")
    );
    shared.registry.rename(id, name)?;
    shared.refresh_leaderboard();

    info!(participant = %id, name = name.trim(), "Participant renamed");
    Ok(())
}

pub(crate) fn update_strategy(inner: &ArenaInner, id: ParticipantId, strategy: &str) -> Result<()> {
    validate_strategy(inner, strategy)?;

    let mut shared = inner.shared.write();
    require!(
        !shared.state.is_active(),
        ArenaError::RunActive("update strategies")
    );
    shared.registry.set_strategy(id, strategy)?;

    info!(participant = %id, "Strategy updated");
    Ok(())
}

pub(crate) fn remove(inner: &ArenaInner, id: ParticipantId) -> Result<Participant> {
    let mut shared = inner.shared.write();
    require!(
        !shared.state.is_active(),
        ArenaError::RunActive("remove participants")
    );
    let removed = shared.registry.remove(id)?;
    shared.refresh_leaderboard();

    info!(participant = %id, name = %removed.name, "Participant removed");
    Ok(removed)
}
