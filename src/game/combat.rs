//! Combat Resolution
//!
//! Damage, critical hits and target legality. The resolver holds no match
//! state of its own; it validates an attack completely before touching the
//! match, so a rejected attack leaves towers and mana exactly as they were.

use serde::{Serialize, Deserialize};

use crate::error::RuleViolation;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::player::{Combatant, PlayerId};
use crate::game::state::{MatchMode, MatchState, Side};
use crate::game::tower::{Tower, KING, LEFT_GUARD, RIGHT_GUARD, TOWER_COUNT};

/// Outcome of one resolved attack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BattleResult {
    /// Attacking player.
    pub attacker_id: PlayerId,
    /// Defending player.
    pub defender_id: PlayerId,
    /// Troop id used.
    pub troop_used: String,
    /// Targeted tower slot.
    pub target_tower: usize,
    /// Damage dealt.
    pub damage: u32,
    /// Was the hit critical?
    pub critical_hit: bool,
    /// Did the target fall?
    pub tower_destroyed: bool,
    /// Simple mode: the attacker keeps the turn.
    pub can_continue: bool,
    /// A king tower fell.
    pub game_ended: bool,
    /// Winner when the game ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerId>,
}

/// Damage before mitigation floors at zero: `max(0, attack - defense)`,
/// scaled by `crit_multiplier` and rounded on a critical hit.
pub fn calculate_damage(attack: u32, defense: u32, critical: bool, crit_multiplier: f64) -> u32 {
    let base = attack.saturating_sub(defense);
    if critical {
        (f64::from(base) * crit_multiplier).round().max(0.0) as u32
    } else {
        base
    }
}

/// Check that `slot` may be attacked under `mode`'s ordering rules.
///
/// Simple mode forces the order left guard, right guard, king. Enhanced
/// mode accepts any standing tower.
pub fn check_target(mode: MatchMode, towers: &[Tower; TOWER_COUNT], slot: i32) -> Result<usize, RuleViolation> {
    let index = usize::try_from(slot)
        .ok()
        .filter(|&i| i < TOWER_COUNT)
        .ok_or(RuleViolation::InvalidTarget(slot))?;

    if mode == MatchMode::Simple {
        if index == KING && (towers[LEFT_GUARD].is_alive() || towers[RIGHT_GUARD].is_alive()) {
            return Err(RuleViolation::GuardTowersStanding);
        }
        if index == RIGHT_GUARD && towers[LEFT_GUARD].is_alive() {
            return Err(RuleViolation::LeftGuardStanding);
        }
    }

    if !towers[index].is_alive() {
        return Err(RuleViolation::TargetAlreadyDestroyed);
    }

    Ok(index)
}

/// Slots the attacker may currently hit on `defender`'s side.
///
/// Simple: the lowest standing slot only. Enhanced: every standing slot.
pub fn valid_targets(game: &MatchState, defender: Side) -> Vec<usize> {
    let Some(combatant) = game.combatant(defender) else {
        return Vec::new();
    };
    let standing = combatant.towers.iter().filter(|t| t.is_alive()).map(|t| t.position);

    match game.mode {
        MatchMode::Simple => standing.take(1).collect(),
        MatchMode::Enhanced => standing.collect(),
    }
}

/// Number of a combatant's towers at zero hit points.
#[inline]
pub fn count_destroyed(combatant: &Combatant) -> usize {
    combatant.towers_destroyed()
}

/// Winner by the current board.
///
/// A fallen king decides the match. Otherwise enhanced mode compares
/// destroyed towers and a tie is a draw; simple mode has no winner yet.
pub fn winner(game: &MatchState) -> Option<Side> {
    let (home, away) = (game.home.as_ref()?, game.away.as_ref()?);

    if !home.towers[KING].is_alive() {
        return Some(Side::Away);
    }
    if !away.towers[KING].is_alive() {
        return Some(Side::Home);
    }

    if game.mode == MatchMode::Enhanced {
        // Each side is credited with the towers it destroyed on the other
        let home_score = count_destroyed(away);
        let away_score = count_destroyed(home);
        return match home_score.cmp(&away_score) {
            std::cmp::Ordering::Greater => Some(Side::Home),
            std::cmp::Ordering::Less => Some(Side::Away),
            std::cmp::Ordering::Equal => None,
        };
    }

    None
}

/// Applies attacks to a match.
#[derive(Clone, Debug)]
pub struct CombatResolver {
    crit_multiplier: f64,
}

impl Default for CombatResolver {
    fn default() -> Self {
        Self::new(1.2)
    }
}

impl CombatResolver {
    /// Create a resolver with the given critical multiplier.
    pub fn new(crit_multiplier: f64) -> Self {
        Self { crit_multiplier }
    }

    /// Critical hit damage multiplier.
    pub fn crit_multiplier(&self) -> f64 {
        self.crit_multiplier
    }

    /// Resolve one attack by `attacker_id` with `troop_id` on tower `target`.
    ///
    /// Order of checks: both seats resolvable, troop owned, slot in range,
    /// ordering rules (simple), target standing, mana (enhanced). Only then
    /// is mana deducted, the critical roll made and damage applied. Appends
    /// `attack_made` and, if the tower fell, `tower_destroyed` to the log.
    /// Ending the match is left to the caller.
    pub fn resolve_attack(
        &self,
        game: &mut MatchState,
        attacker_id: &PlayerId,
        troop_id: &str,
        target: i32,
    ) -> Result<BattleResult, RuleViolation> {
        let mode = game.mode;
        let side = game.side_of(attacker_id).ok_or(RuleViolation::PlayersInvalid)?;
        let (attacker, defender, rng) = game.battle_parts(side).ok_or(RuleViolation::PlayersInvalid)?;

        let troop = attacker
            .troop(troop_id)
            .cloned()
            .ok_or_else(|| RuleViolation::TroopNotFound(troop_id.to_string()))?;

        let slot = check_target(mode, &defender.towers, target)?;

        if mode == MatchMode::Enhanced && !attacker.spend_mana(troop.mana_cost) {
            return Err(RuleViolation::InsufficientResource {
                need: troop.mana_cost,
                have: attacker.mana,
            });
        }

        let critical = mode == MatchMode::Enhanced && rng.roll(troop.crit_chance);
        let tower = &mut defender.towers[slot];
        let damage = calculate_damage(troop.attack, tower.defense, critical, self.crit_multiplier);
        tower.take_damage(damage);

        let tower_destroyed = !tower.is_alive();
        let game_ended = !defender.towers[KING].is_alive();

        let result = BattleResult {
            attacker_id: attacker.id().clone(),
            defender_id: defender.id().clone(),
            troop_used: troop.id.clone(),
            target_tower: slot,
            damage,
            critical_hit: critical,
            tower_destroyed,
            can_continue: mode == MatchMode::Simple && tower_destroyed && !game_ended,
            game_ended,
            winner: game_ended.then(|| attacker.id().clone()),
        };

        let defender_id = result.defender_id.clone();
        game.record(GameEvent::new(
            Some(attacker_id.clone()),
            GameEventData::AttackMade(result.clone()),
        ));
        if tower_destroyed {
            game.record(GameEvent::new(
                Some(attacker_id.clone()),
                GameEventData::TowerDestroyed { owner: defender_id, position: slot },
            ));
        }

        Ok(result)
    }
}
