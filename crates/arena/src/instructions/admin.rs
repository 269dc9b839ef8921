//! Administrative commands: payoff table and reset

use match_logic::PayoffTable;
use tracing::info;

use crate::error::{require, ArenaError, Result};
use crate::events::ArenaEvent;
use crate::state::TournamentState;
use crate::{ArenaInner, TournamentStatus};

/// Replace the payoff table. Refused while a run is active.
pub(crate) fn set_payoff_table(inner: &ArenaInner, table: PayoffTable) -> Result<PayoffTable> {
    table.check_match_size(inner.config.match_size)?;

    let mut shared = inner.shared.write();
    require!(
        !shared.state.is_active(),
        ArenaError::RunActive("update the payoff table")
    );
    shared.payoff = table.clone();

    info!(
        cooperate = ?table.cooperate_row(),
        defect = ?table.defect_row(),
        "Payoff table updated"
    );
    Ok(table)
}

/// Cancel any run, zero every participant's stats and clear the results log.
pub(crate) fn reset(inner: &ArenaInner) {
    inner.abort_task();
    {
        let mut shared = inner.shared.write();
        shared.generation += 1;
        shared.registry.reset_stats();
        shared.results.clear();
        shared.state = TournamentState::default();
        shared.refresh_leaderboard();
        inner.set_status(&mut shared, TournamentStatus::Idle);
    }

    info!("Tournament reset");
    inner.publish(ArenaEvent::TournamentReset);
}
