//! The authoritative world state and its command surface.
//!
//! Exactly one canonical `State` exists per battle; each player additionally
//! owns a private structural copy (a buffer) that mirrors it between
//! merges. All mutation funnels through the five command methods plus
//! [`update`](State::update), which advances everything one tick in a fixed,
//! deterministic order.
//!
//! # Tick Pipeline
//!
//! 1. **Line of sight** - decay direct visibility, flood-fill from every
//!    living actor
//! 2. **Formations** - leader succession, waypoint upkeep, member steering
//! 3. **State machines** - behavior transitions, melee damage events
//! 4. **Movement** - velocity integration and bounds clamping
//! 5. **Flags** - carried flags ride on their captor
//! 6. **Projectiles** - launch pending shots, move and resolve
//! 7. **Towers** - contention scoring and capture
//! 8. **Caches** - per-player unit and visibility ID lists

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::actor::{Actor, ActorId, ActorKind, ActorPayload, PlayerId, NUM_PLAYERS};
use crate::actor_state::{self, DamageEvent, StateContext, TargetSnapshot};
use crate::command::PlayerCommand;
use crate::error::{CommandError, GameError, Result};
use crate::formation::{FormationMaker, PathPlanner};
use crate::math::{Fixed, Vec2Fixed};
use crate::pathfinding::{PathError, TerrainWeights};
use crate::projectile::ProjectileHandler;
use crate::terrain::Terrain;

/// One entry of the append-only tower capture audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerCaptureLogEntry {
    /// The captured tower.
    pub tower_id: ActorId,
    /// Tick the capture landed.
    pub tick: u64,
    /// Player the tower flipped to.
    pub player_id: PlayerId,
}

/// The world: actor table, terrain, path planner and projectile handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// Current simulation tick.
    tick: u64,
    /// Dense actor table; `actors[id].id == id`.
    actors: Vec<Actor>,
    /// Terrain grid with per-player line of sight.
    terrain: Terrain,
    /// Formations and the A* graph.
    path_planner: PathPlanner,
    /// Ranged projectiles in flight.
    projectiles: ProjectileHandler,
    /// King actor per player.
    kings: [ActorId; NUM_PLAYERS],
    /// Base actor per player.
    bases: [ActorId; NUM_PLAYERS],
    /// Flag actor per player.
    flags: [ActorId; NUM_PLAYERS],
    /// Every tower in the world.
    tower_ids: Vec<ActorId>,
    /// Cached living unit IDs per player, recomputed every tick.
    unit_ids: [Vec<ActorId>; NUM_PLAYERS],
    /// Cached enemy IDs in direct sight per player, recomputed every tick.
    visible_enemy_ids: [Vec<ActorId>; NUM_PLAYERS],
    /// Append-only tower capture audit trail.
    tower_capture_log: Vec<TowerCaptureLogEntry>,
}

impl State {
    /// Build the world from terrain and a complete actor roster.
    ///
    /// The roster must be dense (`actors[i].id == i`) and hold exactly one
    /// king, base and flag per player.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidState`] when the roster violates either rule.
    pub fn new(terrain: Terrain, actors: Vec<Actor>) -> Result<Self> {
        for (index, actor) in actors.iter().enumerate() {
            if actor.id != index {
                return Err(GameError::InvalidState(format!(
                    "actor table must be dense: slot {index} holds id {}",
                    actor.id
                )));
            }
        }

        let kings = Self::find_singleton(&actors, ActorKind::King)?;
        let bases = Self::find_singleton(&actors, ActorKind::Base)?;
        let flags = Self::find_singleton(&actors, ActorKind::Flag)?;
        let tower_ids = actors
            .iter()
            .filter(|actor| actor.kind == ActorKind::Tower)
            .map(|actor| actor.id)
            .collect();

        let rows = terrain.rows();
        let mut state = Self {
            tick: 0,
            actors,
            terrain,
            path_planner: PathPlanner::new(rows),
            projectiles: ProjectileHandler::new(),
            kings,
            bases,
            flags,
            tower_ids,
            unit_ids: [Vec::new(), Vec::new()],
            visible_enemy_ids: [Vec::new(), Vec::new()],
            tower_capture_log: Vec::new(),
        };
        state.refresh_caches();
        Ok(state)
    }

    fn find_singleton(actors: &[Actor], kind: ActorKind) -> Result<[ActorId; NUM_PLAYERS]> {
        let mut found: [Option<ActorId>; NUM_PLAYERS] = [None, None];
        for actor in actors {
            if actor.kind == kind {
                let slot = &mut found[actor.player_id.index()];
                if slot.is_some() {
                    return Err(GameError::InvalidState(format!(
                        "duplicate {kind:?} for {:?}",
                        actor.player_id
                    )));
                }
                *slot = Some(actor.id);
            }
        }
        match found {
            [Some(first), Some(second)] => Ok([first, second]),
            _ => Err(GameError::InvalidState(format!("missing {kind:?}"))),
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Current tick number.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// The whole actor table.
    #[must_use]
    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    /// One actor by ID.
    #[must_use]
    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(id)
    }

    /// The terrain grid.
    #[must_use]
    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    /// Projectiles currently in flight.
    #[must_use]
    pub fn projectiles(&self) -> &ProjectileHandler {
        &self.projectiles
    }

    /// The formation registry and A* graph.
    #[must_use]
    pub fn path_planner(&self) -> &PathPlanner {
        &self.path_planner
    }

    /// Living unit IDs of a player, as of the last tick.
    #[must_use]
    pub fn player_unit_ids(&self, player: PlayerId) -> &[ActorId] {
        &self.unit_ids[player.index()]
    }

    /// Enemy unit IDs currently in a player's direct sight, as of the last
    /// tick.
    #[must_use]
    pub fn player_enemy_ids(&self, player: PlayerId) -> &[ActorId] {
        &self.visible_enemy_ids[player.index()]
    }

    /// Every tower, regardless of owner.
    #[must_use]
    pub fn tower_ids(&self) -> &[ActorId] {
        &self.tower_ids
    }

    /// Towers currently controlled by a player.
    #[must_use]
    pub fn towers_of(&self, player: PlayerId) -> Vec<ActorId> {
        self.tower_ids
            .iter()
            .copied()
            .filter(|&id| self.actors[id].controlling_player() == player)
            .collect()
    }

    /// A player's king.
    #[must_use]
    pub fn king_id(&self, player: PlayerId) -> ActorId {
        self.kings[player.index()]
    }

    /// A player's base.
    #[must_use]
    pub fn base_id(&self, player: PlayerId) -> ActorId {
        self.bases[player.index()]
    }

    /// A player's flag.
    #[must_use]
    pub fn flag_id(&self, player: PlayerId) -> ActorId {
        self.flags[player.index()]
    }

    /// Dead units of a player whose respawn countdown has elapsed.
    #[must_use]
    pub fn respawnable_ids(&self, player: PlayerId) -> Vec<ActorId> {
        self.actors
            .iter()
            .filter(|actor| {
                actor.kind.is_unit()
                    && actor.player_id == player
                    && actor.is_dead
                    && actor.time_to_respawn <= Fixed::ZERO
            })
            .map(|actor| actor.id)
            .collect()
    }

    /// The tower capture audit trail, oldest first.
    #[must_use]
    pub fn tower_capture_log(&self) -> &[TowerCaptureLogEntry] {
        &self.tower_capture_log
    }

    /// Plan a path without moving anything.
    ///
    /// # Errors
    ///
    /// Propagates [`PathError`] from the search.
    pub fn plan_path(
        &mut self,
        start: Vec2Fixed,
        destination: Vec2Fixed,
        weights: TerrainWeights,
        waypoints: &mut Vec<Vec2Fixed>,
    ) -> std::result::Result<Fixed, PathError> {
        self.path_planner
            .plan_path(start, destination, &self.terrain, weights, waypoints)
    }

    // ------------------------------------------------------------------
    // Command surface
    // ------------------------------------------------------------------

    /// Form units up and walk them to a destination.
    ///
    /// # Errors
    ///
    /// See [`CommandError`] for the full taxonomy.
    pub fn move_units(
        &mut self,
        player: PlayerId,
        units: &[ActorId],
        destination: Vec2Fixed,
        maker: FormationMaker,
        weights: TerrainWeights,
    ) -> std::result::Result<(), CommandError> {
        if units.is_empty() {
            return Err(CommandError::EmptySelection);
        }
        for &unit in units {
            let actor = self.actors.get(unit).ok_or(CommandError::InvalidActorId)?;
            if !actor.kind.can_plan_path() {
                return Err(CommandError::InvalidActorId);
            }
            if actor.player_id != player {
                return Err(CommandError::NotOwned);
            }
            if actor.is_dead {
                return Err(CommandError::ActorDead);
            }
        }

        let Self {
            path_planner,
            actors,
            terrain,
            ..
        } = self;
        path_planner
            .make_formation(player, units, terrain, maker, destination, weights, actors)
            .map_err(|error| match error {
                PathError::OutOfBounds => CommandError::InvalidTarget,
                PathError::Unreachable => CommandError::Unreachable,
            })?;
        Ok(())
    }

    /// Mark `target` as the attack target of every listed attacker.
    ///
    /// # Errors
    ///
    /// See [`CommandError`] for the full taxonomy.
    pub fn attack_unit(
        &mut self,
        player: PlayerId,
        attackers: &[ActorId],
        target: ActorId,
    ) -> std::result::Result<(), CommandError> {
        if attackers.is_empty() {
            return Err(CommandError::EmptySelection);
        }
        for &attacker in attackers {
            let actor = self
                .actors
                .get(attacker)
                .ok_or(CommandError::InvalidActorId)?;
            if actor.player_id != player {
                return Err(CommandError::NotOwned);
            }
            if actor.is_dead {
                return Err(CommandError::ActorDead);
            }
        }

        let target_actor = self.actors.get(target).ok_or(CommandError::InvalidTarget)?;
        if target_actor.controlling_player() == player {
            return Err(CommandError::TargetOwned);
        }
        if target_actor.is_dead {
            return Err(CommandError::TargetDead);
        }
        if !self.terrain.in_direct_los(target_actor.position, player) {
            return Err(CommandError::NotInLineOfSight);
        }

        for &attacker in attackers {
            self.actors[attacker].attack_target = Some(target);
        }
        Ok(())
    }

    /// Pick up the enemy flag with the player's king.
    ///
    /// # Errors
    ///
    /// See [`CommandError`] for the full taxonomy.
    pub fn flag_capture(&mut self, player: PlayerId) -> std::result::Result<(), CommandError> {
        let king_id = self.king_id(player);
        let flag_id = self.flag_id(player.opponent());

        let king = &self.actors[king_id];
        let flag = &self.actors[flag_id];
        if king.is_dead {
            return Err(CommandError::ActorDead);
        }
        if king.position.distance(flag.position) > king.size + flag.size {
            return Err(CommandError::TooFar);
        }
        if matches!(king.payload, ActorPayload::King { held_flag: Some(_) }) {
            return Err(CommandError::AlreadyHoldingFlag);
        }

        self.actors[king_id].payload = ActorPayload::King {
            held_flag: Some(flag_id),
        };
        self.actors[flag_id].payload = ActorPayload::Flag {
            captor: Some(king_id),
        };
        tracing::info!(?player, king = king_id, flag = flag_id, "flag captured");
        Ok(())
    }

    /// Drop a carried flag at the player's own base.
    ///
    /// # Errors
    ///
    /// See [`CommandError`] for the full taxonomy.
    pub fn flag_drop(&mut self, player: PlayerId) -> std::result::Result<(), CommandError> {
        let king_id = self.king_id(player);
        let base_id = self.base_id(player);

        let king = &self.actors[king_id];
        let base = &self.actors[base_id];
        if king.is_dead {
            return Err(CommandError::ActorDead);
        }
        if king.position.distance(base.position) > king.size + base.size {
            return Err(CommandError::TooFar);
        }
        let ActorPayload::King {
            held_flag: Some(flag_id),
        } = king.payload
        else {
            return Err(CommandError::NotHoldingFlag);
        };

        self.actors[king_id].payload = ActorPayload::King { held_flag: None };
        self.actors[flag_id].payload = ActorPayload::Flag { captor: None };
        tracing::info!(?player, king = king_id, flag = flag_id, "flag dropped");
        Ok(())
    }

    /// Schedule a dead unit to revive at a tower or base.
    ///
    /// Revival itself happens through the Dead-state exit once the
    /// countdown has elapsed and the location is set.
    ///
    /// # Errors
    ///
    /// See [`CommandError`] for the full taxonomy.
    pub fn respawn_unit(
        &mut self,
        player: PlayerId,
        unit: ActorId,
        structure: ActorId,
    ) -> std::result::Result<(), CommandError> {
        let actor = self.actors.get(unit).ok_or(CommandError::InvalidActorId)?;
        if actor.player_id != player {
            return Err(CommandError::NotOwned);
        }
        if !actor.is_dead {
            return Err(CommandError::NotDead);
        }
        if actor.time_to_respawn > Fixed::ZERO {
            return Err(CommandError::StillRespawning);
        }

        let respawn_site = self
            .actors
            .get(structure)
            .ok_or(CommandError::InvalidRespawnTarget)?;
        if !respawn_site.kind.is_respawn_structure()
            || respawn_site.controlling_player() != player
            || respawn_site.is_dead
        {
            return Err(CommandError::InvalidRespawnTarget);
        }

        self.actors[unit].respawn_target = Some(structure);
        Ok(())
    }

    /// Apply one logged command through the validated surface.
    ///
    /// # Errors
    ///
    /// Propagates the command's own [`CommandError`].
    pub fn apply_command(
        &mut self,
        player: PlayerId,
        command: &PlayerCommand,
    ) -> std::result::Result<(), CommandError> {
        match command {
            PlayerCommand::MoveUnits {
                units,
                destination,
                maker,
                weights,
            } => self.move_units(player, units, *destination, *maker, *weights),
            PlayerCommand::AttackUnit { attackers, target } => {
                self.attack_unit(player, attackers, *target)
            }
            PlayerCommand::FlagCapture => self.flag_capture(player),
            PlayerCommand::FlagDrop => self.flag_drop(player),
            PlayerCommand::RespawnUnit { unit, structure } => {
                self.respawn_unit(player, *unit, *structure)
            }
        }
    }

    /// Replay a drained buffer log onto this state.
    ///
    /// A command that validated against the buffer can still fail here when
    /// the worlds have diverged since the last merge; such commands are
    /// skipped with a warning. Returns the number applied.
    pub fn replay_log(&mut self, player: PlayerId, commands: &[PlayerCommand]) -> usize {
        let mut applied = 0;
        for command in commands {
            match self.apply_command(player, command) {
                Ok(()) => applied += 1,
                Err(error) => {
                    tracing::warn!(?player, ?error, "buffered command rejected on merge");
                }
            }
        }
        applied
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the world one tick.
    pub fn update(&mut self, delta_time: Fixed) {
        self.tick += 1;

        // 1. Line of sight: decay, then flood-fill from every living actor
        self.terrain.decay_los();
        let sights: Vec<(Vec2Fixed, Fixed, PlayerId)> = self
            .actors
            .iter()
            .filter(|actor| !actor.is_dead)
            .map(|actor| (actor.position, actor.los_radius, actor.controlling_player()))
            .collect();
        for (position, radius, player) in sights {
            self.terrain.mark_los(position, radius, player, self.tick);
        }

        // 2. Formations steer their members
        {
            let Self {
                path_planner,
                actors,
                ..
            } = self;
            path_planner.update(actors);
        }

        // 3. Behavior state machines; melee strikes become damage events
        let mut events: Vec<DamageEvent> = Vec::new();
        for id in 0..self.actors.len() {
            let ctx = self.state_context(id);
            actor_state::advance(&mut self.actors[id], &ctx, delta_time, &mut events);
        }
        self.apply_damage_events(&events);

        // 4. Movement integration and bounds clamping
        let bounds = self.terrain.size();
        for actor in &mut self.actors {
            if !actor.is_dead && !actor.kind.is_structure() {
                actor.position = actor.position + actor.velocity * delta_time;
                actor.check_bounds(bounds);
            }
        }

        // 5. Carried flags ride on their captor
        for player in PlayerId::both() {
            let flag_id = self.flags[player.index()];
            if let ActorPayload::Flag {
                captor: Some(king_id),
            } = self.actors[flag_id].payload
            {
                let king_position = self.actors[king_id].position;
                self.actors[flag_id].position = king_position;
            }
        }

        // 6. Projectiles: launch pending shots, move, resolve
        let projectile_events = {
            let Self {
                projectiles,
                actors,
                terrain,
                ..
            } = self;
            projectiles.update(delta_time, actors, terrain)
        };
        self.apply_damage_events(&projectile_events);

        // 7. Tower contention
        self.update_towers(delta_time);

        // 8. Per-player caches
        self.refresh_caches();

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "state advanced");
        }
    }

    /// Resolve the context snapshot one actor's state machine needs.
    fn state_context(&self, id: ActorId) -> StateContext {
        let actor = &self.actors[id];
        let target = actor
            .attack_target
            .and_then(|target_id| self.actors.get(target_id))
            .map(|target| TargetSnapshot {
                position: target.position,
                size: target.size,
                // Zero hp counts as dead even before the Dead transition
                // lands on the target's own turn
                is_dead: target.is_dead || target.hp == 0,
            });
        let respawn_position = actor
            .respawn_target
            .and_then(|respawn_id| self.actors.get(respawn_id))
            .map(|site| site.position);
        StateContext {
            target,
            respawn_position,
        }
    }

    fn apply_damage_events(&mut self, events: &[DamageEvent]) {
        for event in events {
            if let Some(target) = self.actors.get_mut(event.target) {
                target.damage(event.damage);
            }
        }
    }

    /// Score tower contention and flip ownership when a side prevails.
    fn update_towers(&mut self, delta_time: Fixed) {
        for index in 0..self.tower_ids.len() {
            let tower_id = self.tower_ids[index];
            let (tower_position, radius) = {
                let ActorPayload::Tower(tower) = &self.actors[tower_id].payload else {
                    continue;
                };
                (self.actors[tower_id].position, tower.contention_radius)
            };

            let mut counts = [0i64; NUM_PLAYERS];
            for actor in &self.actors {
                if actor.id == tower_id || actor.is_dead || !actor.kind.is_unit() {
                    continue;
                }
                if actor.position.distance(tower_position) < radius {
                    counts[actor.player_id.index()] += 1;
                }
            }

            let capture = {
                let ActorPayload::Tower(tower) = &mut self.actors[tower_id].payload else {
                    continue;
                };
                tower.contention_score +=
                    Fixed::from_num(counts[0] - counts[1]) * delta_time;
                if tower.contention_score.abs() >= tower.max_contention_score {
                    let new_owner = if tower.contention_score > Fixed::ZERO {
                        PlayerId::P1
                    } else {
                        PlayerId::P2
                    };
                    tower.prev_owner = tower.owner;
                    let changed = new_owner != tower.owner;
                    tower.owner = new_owner;
                    tower.contention_score = Fixed::ZERO;
                    Some((new_owner, changed))
                } else {
                    None
                }
            };

            if let Some((new_owner, changed)) = capture {
                let tower = &mut self.actors[tower_id];
                tower.player_id = new_owner;
                tower.hp = tower.max_hp;
                tower.is_dead = false;
                tower.attack_target = None;
                if changed {
                    self.tower_capture_log.push(TowerCaptureLogEntry {
                        tower_id,
                        tick: self.tick,
                        player_id: new_owner,
                    });
                    tracing::info!(tower = tower_id, owner = ?new_owner, "tower captured");
                }
            }
        }
    }

    /// Recompute the per-player ID caches from the live table.
    fn refresh_caches(&mut self) {
        for player in PlayerId::both() {
            let units: Vec<ActorId> = self
                .actors
                .iter()
                .filter(|actor| {
                    actor.kind.is_unit() && actor.player_id == player && !actor.is_dead
                })
                .map(|actor| actor.id)
                .collect();

            let enemies: Vec<ActorId> = self
                .actors
                .iter()
                .filter(|actor| {
                    actor.kind.is_unit()
                        && actor.player_id == player.opponent()
                        && !actor.is_dead
                        && self.terrain.in_direct_los(actor.position, player)
                })
                .map(|actor| actor.id)
                .collect();

            self.unit_ids[player.index()] = units;
            self.visible_enemy_ids[player.index()] = enemies;
        }
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Hash of the simulation-relevant state.
    ///
    /// Two states that evolved through identical inputs produce identical
    /// hashes; used by determinism tests and merge checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.actors.len().hash(&mut hasher);

        for actor in &self.actors {
            actor.id.hash(&mut hasher);
            actor.position.x.to_bits().hash(&mut hasher);
            actor.position.y.to_bits().hash(&mut hasher);
            actor.velocity.x.to_bits().hash(&mut hasher);
            actor.velocity.y.to_bits().hash(&mut hasher);
            actor.hp.hash(&mut hasher);
            actor.is_dead.hash(&mut hasher);
            actor.state.tag().hash(&mut hasher);
            actor.attack_target.hash(&mut hasher);
        }

        hasher.finish()
    }

    /// Serialize the whole world for the one-way renderer export.
    ///
    /// # Errors
    ///
    /// [`GameError::SerializationFailed`] when encoding fails.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|error| GameError::SerializationFailed(error.to_string()))
    }

    /// Restore a world from snapshot bytes.
    ///
    /// # Errors
    ///
    /// [`GameError::SerializationFailed`] when decoding fails.
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|error| GameError::SerializationFailed(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{ActorKind, ActorStats, RangedPayload};
    use crate::actor_state::ActorState;
    use crate::terrain::LosStatus;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn vec2(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::new(fixed(x), fixed(y))
    }

    struct WorldBuilder {
        actors: Vec<Actor>,
    }

    impl WorldBuilder {
        fn new() -> Self {
            let mut builder = Self { actors: Vec::new() };
            // Standard fixtures: king, base and flag per player, tucked
            // into opposite corners of a 64x64 world.
            for (player, corner) in [(PlayerId::P1, 2), (PlayerId::P2, 60)] {
                let structure_stats = ActorStats {
                    max_hp: 500,
                    max_speed: Fixed::ZERO,
                    size: fixed(2),
                    ..ActorStats::default()
                };
                builder.push(player, ActorKind::King, ActorStats::default(), vec2(corner, corner));
                builder.push(player, ActorKind::Base, structure_stats, vec2(corner, corner));
                builder.push(player, ActorKind::Flag, structure_stats, vec2(corner, corner));
            }
            builder
        }

        fn push(
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

        fn push_built(&mut self, build: impl FnOnce(ActorId) -> Actor) -> ActorId {
            let id = self.actors.len();
            self.actors.push(build(id));
            id
        }

        fn build(self) -> State {
            State::new(Terrain::new(128, fixed(1)), self.actors).unwrap()
        }
    }

    fn fighter_stats() -> ActorStats {
        ActorStats {
            attack: 10,
            max_hp: 50,
            max_speed: fixed(10),
            size: fixed(1),
            total_respawn_time: fixed(10),
            los_radius: fixed(60),
            attack_speed: fixed(5),
            attack_range: fixed(10),
        }
    }

    #[test]
    fn test_roster_must_be_complete() {
        let result = State::new(Terrain::new(8, fixed(1)), Vec::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_attack_unit_validation_taxonomy() {
        let mut builder = WorldBuilder::new();
        let attacker = builder.push(PlayerId::P1, ActorKind::Swordsman, fighter_stats(), vec2(10, 10));
        let ally = builder.push(PlayerId::P1, ActorKind::Swordsman, fighter_stats(), vec2(12, 10));
        let enemy = builder.push(PlayerId::P2, ActorKind::Swordsman, fighter_stats(), vec2(14, 10));
        let mut state = builder.build();
        state.update(Fixed::ONE);

        assert_eq!(
            state.attack_unit(PlayerId::P1, &[], enemy),
            Err(CommandError::EmptySelection)
        );
        assert_eq!(
            state.attack_unit(PlayerId::P1, &[999], enemy),
            Err(CommandError::InvalidActorId)
        );
        assert_eq!(
            state.attack_unit(PlayerId::P2, &[attacker], enemy),
            Err(CommandError::NotOwned)
        );
        assert_eq!(
            state.attack_unit(PlayerId::P1, &[attacker], 999),
            Err(CommandError::InvalidTarget)
        );
        assert_eq!(
            state.attack_unit(PlayerId::P1, &[attacker], ally),
            Err(CommandError::TargetOwned)
        );

        assert_eq!(state.attack_unit(PlayerId::P1, &[attacker], enemy), Ok(()));
        assert_eq!(state.actor(attacker).unwrap().attack_target, Some(enemy));
    }

    #[test]
    fn test_attack_requires_line_of_sight() {
        let mut builder = WorldBuilder::new();
        // Short sight: the enemy across the map stays invisible
        let mut stats = fighter_stats();
        stats.los_radius = fixed(3);
        let attacker = builder.push(PlayerId::P1, ActorKind::Swordsman, stats, vec2(10, 10));
        let enemy = builder.push(PlayerId::P2, ActorKind::Swordsman, stats, vec2(50, 50));
        let mut state = builder.build();
        state.update(Fixed::ONE);

        assert_eq!(
            state.attack_unit(PlayerId::P1, &[attacker], enemy),
            Err(CommandError::NotInLineOfSight)
        );
    }

    #[test]
    fn test_dead_target_is_rejected() {
        let mut builder = WorldBuilder::new();
        let attacker = builder.push(PlayerId::P1, ActorKind::Swordsman, fighter_stats(), vec2(10, 10));
        let enemy = builder.push(PlayerId::P2, ActorKind::Swordsman, fighter_stats(), vec2(14, 10));
        let mut state = builder.build();
        state.actors[enemy].hp = 0;
        state.update(Fixed::ONE);

        assert_eq!(
            state.attack_unit(PlayerId::P1, &[attacker], enemy),
            Err(CommandError::TargetDead)
        );
    }

    #[test]
    fn test_flag_capture_too_far() {
        // King fifty units from the enemy flag with a size sum of forty:
        // must fail and leave both sides unlinked
        let mut builder = WorldBuilder::new();
        builder.actors.clear();
        for (player, x) in [(PlayerId::P1, 5), (PlayerId::P2, 20)] {
            let king_stats = ActorStats {
                size: fixed(20),
                ..ActorStats::default()
            };
            let structure_stats = ActorStats {
                size: fixed(20),
                max_speed: Fixed::ZERO,
                ..ActorStats::default()
            };
            builder.push(player, ActorKind::King, king_stats, vec2(x, 5));
            builder.push(player, ActorKind::Base, structure_stats, vec2(x, 5));
            builder.push(player, ActorKind::Flag, structure_stats, vec2(x, 55));
        }
        let mut state = builder.build();

        // P1 king at (5,5); P2 flag at (20,55): distance > 50, sizes 20+20
        assert_eq!(state.flag_capture(PlayerId::P1), Err(CommandError::TooFar));
        let king = state.actor(state.king_id(PlayerId::P1)).unwrap();
        assert!(matches!(king.payload, ActorPayload::King { held_flag: None }));
        let flag = state.actor(state.flag_id(PlayerId::P2)).unwrap();
        assert!(matches!(flag.payload, ActorPayload::Flag { captor: None }));
    }

    #[test]
    fn test_flag_capture_and_drop_round_trip() {
        let builder = WorldBuilder::new();
        let mut state = builder.build();
        let king_id = state.king_id(PlayerId::P1);
        let flag_id = state.flag_id(PlayerId::P2);

        // Walk the king onto the enemy flag
        state.actors[king_id].position = state.actors[flag_id].position;
        assert_eq!(state.flag_capture(PlayerId::P1), Ok(()));
        assert_eq!(
            state.flag_capture(PlayerId::P1),
            Err(CommandError::AlreadyHoldingFlag)
        );

        // The flag rides along
        state.actors[king_id].position = vec2(30, 30);
        state.update(Fixed::ONE);
        assert_eq!(state.actor(flag_id).unwrap().position, state.actor(king_id).unwrap().position);

        // Return home and drop
        let base_position = state.actor(state.base_id(PlayerId::P1)).unwrap().position;
        state.actors[king_id].position = base_position;
        assert_eq!(state.flag_drop(PlayerId::P1), Ok(()));
        assert_eq!(state.flag_drop(PlayerId::P1), Err(CommandError::NotHoldingFlag));
    }

    #[test]
    fn test_respawn_unit_validation() {
        let mut builder = WorldBuilder::new();
        let unit = builder.push(PlayerId::P1, ActorKind::Swordsman, fighter_stats(), vec2(10, 10));
        let mut state = builder.build();
        let own_base = state.base_id(PlayerId::P1);
        let enemy_base = state.base_id(PlayerId::P2);

        assert_eq!(
            state.respawn_unit(PlayerId::P1, unit, own_base),
            Err(CommandError::NotDead)
        );

        state.actors[unit].hp = 0;
        state.update(Fixed::ONE);
        assert_eq!(
            state.respawn_unit(PlayerId::P1, unit, own_base),
            Err(CommandError::StillRespawning)
        );

        for _ in 0..12 {
            state.update(Fixed::ONE);
        }
        assert_eq!(
            state.respawn_unit(PlayerId::P1, unit, enemy_base),
            Err(CommandError::InvalidRespawnTarget)
        );
        assert_eq!(state.respawn_unit(PlayerId::P1, unit, own_base), Ok(()));

        // The Dead-state exit revives at the base on the next tick
        state.update(Fixed::ONE);
        let revived = state.actor(unit).unwrap();
        assert!(!revived.is_dead);
        assert_eq!(revived.hp, revived.max_hp);
        assert_eq!(revived.position, state.actor(own_base).unwrap().position);
    }

    #[test]
    fn test_pursuit_and_attack_cadence_scenario() {
        // Two fighters a hundred apart, range ten, speed ten, strike every
        // five ticks: pursuit closes at ten per tick, then damage lands on
        // the cadence until the target dies and the attacker idles.
        let mut builder = WorldBuilder::new();
        let mut attacker_stats = fighter_stats();
        attacker_stats.los_radius = fixed(120);
        let attacker = builder.push(PlayerId::P1, ActorKind::Swordsman, attacker_stats, vec2(2, 30));
        let mut target_stats = fighter_stats();
        target_stats.max_hp = 20;
        let target = builder.push(PlayerId::P2, ActorKind::Swordsman, target_stats, vec2(102, 30));
        let mut state = builder.build();
        state.update(Fixed::ONE);

        assert_eq!(state.attack_unit(PlayerId::P1, &[attacker], target), Ok(()));

        // Distance 100, contact at range ten plus size one: nine ticks of
        // pursuit close 90 units
        state.update(Fixed::ONE);
        assert_eq!(state.actor(attacker).unwrap().state, ActorState::Pursuit);
        let speed = state.actor(attacker).unwrap().velocity.magnitude();
        assert!((speed - fixed(10)).abs() < Fixed::from_num(0.01));

        let mut hp_drops = Vec::new();
        let mut last_hp = state.actor(target).unwrap().hp;
        for tick in 2..=30 {
            state.update(Fixed::ONE);
            let hp = state.actor(target).unwrap().hp;
            if hp != last_hp {
                hp_drops.push((tick, last_hp - hp));
                last_hp = hp;
            }
        }

        // 20 hp at 10 damage per strike: two strikes, five ticks apart
        assert_eq!(hp_drops.len(), 2);
        assert_eq!(hp_drops[0].1, 10);
        assert_eq!(hp_drops[1].0 - hp_drops[0].0, 5);
        // Target died; attacker returned to idle
        assert!(state.actor(target).unwrap().is_dead);
        assert_eq!(state.actor(attacker).unwrap().state, ActorState::Idle);
        assert_eq!(state.actor(attacker).unwrap().attack_target, None);
    }

    #[test]
    fn test_los_monotonic_decay() {
        let mut builder = WorldBuilder::new();
        let mut stats = fighter_stats();
        stats.los_radius = fixed(3);
        let scout = builder.push(PlayerId::P1, ActorKind::Scout, stats, vec2(30, 30));
        let mut state = builder.build();

        state.update(Fixed::ONE);
        assert_eq!(state.terrain().los(30, 30, PlayerId::P1), LosStatus::DirectLos);

        // The scout dies; once nothing marks its cells they decay to
        // explored, never back to unexplored
        state.actors[scout].hp = 0;
        state.update(Fixed::ONE);
        state.update(Fixed::ONE);
        assert_eq!(state.terrain().los(30, 30, PlayerId::P1), LosStatus::Explored);
        state.update(Fixed::ONE);
        assert_eq!(state.terrain().los(30, 30, PlayerId::P1), LosStatus::Explored);
    }

    #[test]
    fn test_tower_contention_capture() {
        let mut builder = WorldBuilder::new();
        let tower = builder.push_built(|id| {
            Actor::new(
                id,
                PlayerId::P2,
                ActorKind::Tower,
                ActorStats {
                    max_hp: 200,
                    max_speed: Fixed::ZERO,
                    size: fixed(2),
                    ..ActorStats::default()
                },
                vec2(30, 30),
            )
            .with_tower(
                fixed(8),
                fixed(6),
                RangedPayload::new(fixed(8), fixed(6), Fixed::ONE),
            )
        });
        // Two P1 fighters camp the tower; nobody from P2 contests
        builder.push(PlayerId::P1, ActorKind::Swordsman, fighter_stats(), vec2(29, 30));
        builder.push(PlayerId::P1, ActorKind::Swordsman, fighter_stats(), vec2(31, 30));
        let mut state = builder.build();

        // Score climbs two per tick toward the threshold of six
        for _ in 0..3 {
            state.update(Fixed::ONE);
        }

        let captured = state.actor(tower).unwrap();
        assert_eq!(captured.controlling_player(), PlayerId::P1);
        assert_eq!(state.tower_capture_log().len(), 1);
        assert_eq!(state.tower_capture_log()[0].tower_id, tower);
        assert_eq!(state.tower_capture_log()[0].player_id, PlayerId::P1);
        assert_eq!(state.towers_of(PlayerId::P1), vec![tower]);
        assert!(state.towers_of(PlayerId::P2).is_empty());
    }

    #[test]
    fn test_caches_track_visibility() {
        let mut builder = WorldBuilder::new();
        let mut blind = fighter_stats();
        blind.los_radius = fixed(2);
        let _near = builder.push(PlayerId::P1, ActorKind::Swordsman, blind, vec2(30, 30));
        let enemy_near = builder.push(PlayerId::P2, ActorKind::Swordsman, blind, vec2(31, 30));
        let enemy_far = builder.push(PlayerId::P2, ActorKind::Swordsman, blind, vec2(50, 50));
        let mut state = builder.build();
        state.update(Fixed::ONE);

        let visible = state.player_enemy_ids(PlayerId::P1);
        assert!(visible.contains(&enemy_near));
        assert!(!visible.contains(&enemy_far));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut builder = WorldBuilder::new();
        builder.push(PlayerId::P1, ActorKind::Swordsman, fighter_stats(), vec2(10, 10));
        let mut state = builder.build();
        state.update(Fixed::ONE);

        let bytes = state.snapshot().unwrap();
        let restored = State::from_snapshot(&bytes).unwrap();

        assert_eq!(state.tick(), restored.tick());
        assert_eq!(state.state_hash(), restored.state_hash());
    }

    #[test]
    fn test_update_is_deterministic() {
        let build = || {
            let mut builder = WorldBuilder::new();
            let a = builder.push(PlayerId::P1, ActorKind::Swordsman, fighter_stats(), vec2(10, 10));
            let b = builder.push(PlayerId::P2, ActorKind::Swordsman, fighter_stats(), vec2(20, 10));
            (builder.build(), a, b)
        };

        let (mut first, a1, b1) = build();
        let (mut second, a2, b2) = build();
        assert_eq!((a1, b1), (a2, b2));

        for state in [&mut first, &mut second] {
            state.update(Fixed::ONE);
            state.attack_unit(PlayerId::P1, &[a1], b1).unwrap();
            for _ in 0..20 {
                state.update(Fixed::ONE);
            }
        }

        assert_eq!(first.state_hash(), second.state_hash());
    }
}
