//! Match Settlement
//!
//! Writes a finished match back to the players' persistent records:
//! win/loss/draw counters and, in enhanced mode, experience. Saving is
//! best-effort; a failed save is logged and never undoes the finish.

use tracing::{debug, warn};

use crate::directory::PlayerDirectory;
use crate::game::state::{MatchState, Side};

/// Experience handed out when an enhanced match ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExperienceAward {
    /// Winner's experience; the loser gets nothing.
    pub win: u32,
    /// Each player's experience on a draw.
    pub draw: u32,
}

/// Apply the result of a finished match to both combatants and save them.
pub fn settle(game: &mut MatchState, directory: &dyn PlayerDirectory, award: Option<ExperienceAward>) {
    let winner = game.winner;

    for side in Side::BOTH {
        let Some(combatant) = game.combatant_mut(side) else {
            continue;
        };
        let player = &mut combatant.player;
        player.stats.games_played += 1;

        match winner {
            Some(w) if w == side => {
                player.stats.games_won += 1;
                if let Some(award) = award {
                    player.add_experience(award.win);
                }
            }
            Some(_) => player.stats.games_lost += 1,
            None => {
                player.stats.games_drawn += 1;
                if let Some(award) = award {
                    player.add_experience(award.draw);
                }
            }
        }
    }

    for combatant in game.combatants() {
        match directory.save_player(&combatant.player) {
            Ok(()) => debug!("Saved player {} after match {}", combatant.id(), game.id),
            Err(e) => warn!("Failed to save player {} after match {}: {}", combatant.id(), game.id, e),
        }
    }
}
