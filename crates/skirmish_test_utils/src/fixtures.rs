//! Test fixtures and helpers.
//!
//! Pre-built terrains, rosters and whole worlds for consistent testing
//! across crates.

use skirmish_core::actor::{Actor, ActorId, ActorKind, ActorStats, PlayerId, RangedPayload};
use skirmish_core::math::{Fixed, Vec2Fixed};
use skirmish_core::pathfinding::TerrainWeights;
use skirmish_core::state::State;
use skirmish_core::terrain::{Terrain, TerrainKind};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> Fixed {
    Fixed::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> Fixed {
    Fixed::from_num(n)
}

/// Create a vector from integer coordinates.
#[must_use]
pub fn vec2(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::new(fixed(x), fixed(y))
}

/// All-plain square terrain with unit cells.
#[must_use]
pub fn flat_terrain(rows: u32) -> Terrain {
    Terrain::new(rows, fixed(1))
}

/// Terrain with a forest band and a mountain ridge.
///
/// Columns `rows/4` to `rows/2` are forest; column `3*rows/4` is mountain
/// except for a gap at the middle row.
#[must_use]
pub fn mixed_terrain(rows: u32) -> Terrain {
    let mut terrain = flat_terrain(rows);
    for x in rows / 4..rows / 2 {
        for y in 0..rows {
            terrain.set_kind(x, y, TerrainKind::Forest);
        }
    }
    let ridge = 3 * rows / 4;
    for y in 0..rows {
        if y != rows / 2 {
            terrain.set_kind(ridge, y, TerrainKind::Mountain);
        }
    }
    terrain
}

/// Movement weights that prefer plains over forest over mountains.
#[must_use]
pub fn standard_weights() -> TerrainWeights {
    TerrainWeights {
        plain: fixed(1),
        forest: fixed(2),
        mountain: fixed(3),
    }
}

/// Stats for a line fighter.
#[must_use]
pub fn fighter_stats() -> ActorStats {
    ActorStats {
        attack: 10,
        max_hp: 100,
        max_speed: fixed(5),
        size: fixed(1),
        total_respawn_time: fixed(10),
        los_radius: fixed(10),
        attack_speed: fixed(5),
        attack_range: fixed(3),
    }
}

/// Stats for an immobile structure.
#[must_use]
pub fn structure_stats() -> ActorStats {
    ActorStats {
        attack: 0,
        max_hp: 500,
        max_speed: Fixed::ZERO,
        size: fixed(2),
        total_respawn_time: Fixed::ZERO,
        los_radius: fixed(8),
        attack_speed: fixed(5),
        attack_range: Fixed::ZERO,
    }
}

/// Incrementally builds a dense actor roster.
#[derive(Debug, Default)]
pub struct RosterBuilder {
    actors: Vec<Actor>,
}

impl RosterBuilder {
    /// Start an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an actor, returning its ID.
    pub fn push(
        &mut self,
        player: PlayerId,
        kind: ActorKind,
        stats: ActorStats,
        position: Vec2Fixed,
    ) -> ActorId {
        let id = self.actors.len();
        self.actors.push(Actor::new(id, player, kind, stats, position));
        id
    }

    /// Add a ranged unit with default projectile parameters.
    pub fn push_ranged(
        &mut self,
        player: PlayerId,
        kind: ActorKind,
        stats: ActorStats,
        position: Vec2Fixed,
    ) -> ActorId {
        let id = self.actors.len();
        let actor = Actor::new(id, player, kind, stats, position)
            .with_ranged(RangedPayload::new(fixed(8), fixed(10), fixed(1)));
        self.actors.push(actor);
        id
    }

    /// Add a tower for a player.
    pub fn push_tower(&mut self, player: PlayerId, position: Vec2Fixed) -> ActorId {
        let id = self.actors.len();
        let actor = Actor::new(id, player, ActorKind::Tower, structure_stats(), position)
            .with_tower(
                fixed(8),
                fixed(20),
                RangedPayload::new(fixed(8), fixed(10), fixed(1)),
            );
        self.actors.push(actor);
        id
    }

    /// Add the mandatory king, base and flag for a player around a corner
    /// position.
    pub fn push_headquarters(&mut self, player: PlayerId, position: Vec2Fixed) {
        self.push(player, ActorKind::King, fighter_stats(), position);
        self.push(player, ActorKind::Base, structure_stats(), position);
        self.push(player, ActorKind::Flag, structure_stats(), position);
    }

    /// Build a world on the given terrain.
    ///
    /// # Panics
    ///
    /// Panics when the roster is incomplete; fixtures are expected to be
    /// valid.
    #[must_use]
    pub fn build(self, terrain: Terrain) -> State {
        State::new(terrain, self.actors).expect("fixture roster must be valid")
    }
}

/// A standard two-player world on a flat 64-cell grid.
///
/// Each player gets a king, base and flag in their corner, three swordsmen
/// and an archer.
#[must_use]
pub fn two_player_state() -> State {
    let mut roster = RosterBuilder::new();
    for (player, corner) in [(PlayerId::P1, 4), (PlayerId::P2, 58)] {
        roster.push_headquarters(player, vec2(corner, corner));
        for offset in 0..3 {
            roster.push(
                player,
                ActorKind::Swordsman,
                fighter_stats(),
                vec2(corner, corner - 2 - offset),
            );
        }
        roster.push_ranged(
            player,
            ActorKind::Archer,
            fighter_stats(),
            vec2(corner - 2, corner),
        );
    }
    roster.build(flat_terrain(64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_player_state_is_valid() {
        let state = two_player_state();
        assert_eq!(state.player_unit_ids(PlayerId::P1).len(), 5);
        assert_eq!(state.player_unit_ids(PlayerId::P2).len(), 5);
        assert_ne!(state.king_id(PlayerId::P1), state.king_id(PlayerId::P2));
    }

    #[test]
    fn test_mixed_terrain_layout() {
        let terrain = mixed_terrain(32);
        assert_eq!(terrain.element(8, 10).kind, TerrainKind::Forest);
        assert_eq!(terrain.element(24, 0).kind, TerrainKind::Mountain);
        // The gap in the ridge
        assert_eq!(terrain.element(24, 16).kind, TerrainKind::Plain);
    }
}
