//! Formation movement and the path planner.
//!
//! Units ordered to move travel as a formation: one leader walks the
//! planned waypoints, every other member holds a relative offset from the
//! leader. Formations survive casualties by electing a new leader, reshape
//! themselves when membership changes, and disband when their waypoint
//! stack empties or their shape becomes invalid.

use serde::{Deserialize, Serialize};

use crate::actor::{Actor, ActorId, PlayerId, NUM_PLAYERS};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::pathfinding::{Graph, PathError, TerrainWeights};
use crate::terrain::Terrain;

/// Strategy that maps a formation size to relative offsets from the leader.
///
/// Offsets index by member position; slot zero is the leader and is always
/// the zero offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormationMaker {
    /// Solid square block, filled row by row.
    Grid {
        /// Distance between neighbouring slots.
        #[serde(with = "fixed_serde")]
        spacing: Fixed,
    },
    /// Single rank abreast.
    Line {
        /// Distance between neighbouring slots.
        #[serde(with = "fixed_serde")]
        spacing: Fixed,
    },
    /// Arrow-head wedge behind the leader; needs at least three units.
    Wedge {
        /// Distance between neighbouring slots.
        #[serde(with = "fixed_serde")]
        spacing: Fixed,
    },
}

impl FormationMaker {
    /// Smallest membership this shape supports.
    #[must_use]
    pub const fn min_units(&self) -> usize {
        match self {
            Self::Grid { .. } | Self::Line { .. } => 1,
            Self::Wedge { .. } => 3,
        }
    }

    /// Whether a formation of `count` members can hold this shape.
    #[must_use]
    pub const fn is_valid(&self, count: usize) -> bool {
        count >= self.min_units()
    }

    /// Relative offsets from the leader for a formation of `count` members.
    ///
    /// The first offset is always zero (the leader's own slot).
    #[must_use]
    pub fn offsets(&self, count: usize) -> Vec<Vec2Fixed> {
        match *self {
            Self::Grid { spacing } => {
                let side = (1..).find(|side| side * side >= count).unwrap_or(1);
                (0..count)
                    .map(|i| {
                        let col = i % side;
                        let row = i / side;
                        Vec2Fixed::new(
                            Fixed::from_num(col as u32) * spacing,
                            Fixed::from_num(row as u32) * spacing,
                        )
                    })
                    .collect()
            }
            Self::Line { spacing } => (0..count)
                .map(|i| Vec2Fixed::new(Fixed::from_num(i as u32) * spacing, Fixed::ZERO))
                .collect(),
            Self::Wedge { spacing } => (0..count)
                .map(|i| {
                    // Tip first, then alternating right/left down the arms
                    let rank = (i + 1) / 2;
                    let rank_offset = Fixed::from_num(rank as u32) * spacing;
                    let lateral = if i % 2 == 1 { rank_offset } else { -rank_offset };
                    Vec2Fixed::new(lateral, rank_offset)
                })
                .collect(),
        }
    }
}

/// Formation bookkeeping attached to every path-capable actor.
///
/// Lifecycle: set when the actor joins a formation, cleared on arrival or
/// cancellation. The leader reference is an ID into the actor table; `None`
/// marks the actor as its own formation's leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PathPlannerHelper {
    formation_id: u64,
    leader: Option<ActorId>,
    relative_position: Vec2Fixed,
    is_path_planning: bool,
    destination: Option<Vec2Fixed>,
}

impl PathPlannerHelper {
    /// Create an idle helper, not part of any formation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a formation. `leader` is `None` when this actor leads.
    pub fn set_path(&mut self, formation_id: u64, relative_position: Vec2Fixed, leader: Option<ActorId>) {
        self.formation_id = formation_id;
        self.relative_position = relative_position;
        self.leader = leader;
        self.is_path_planning = true;
        self.destination = None;
    }

    /// Leave the formation and stop steering.
    pub fn finish(&mut self) {
        self.is_path_planning = false;
        self.leader = None;
        self.destination = None;
    }

    /// Whether this actor is currently walking a formation path.
    #[must_use]
    pub const fn is_path_planning(&self) -> bool {
        self.is_path_planning
    }

    /// ID of the formation this helper belongs to.
    #[must_use]
    pub const fn formation_id(&self) -> u64 {
        self.formation_id
    }

    /// Whether this actor leads its formation.
    #[must_use]
    pub const fn is_leader(&self) -> bool {
        self.is_path_planning && self.leader.is_none()
    }

    /// The leader this actor follows, `None` when leading.
    #[must_use]
    pub const fn leader(&self) -> Option<ActorId> {
        self.leader
    }

    /// Promote this actor to leader.
    pub fn make_leader(&mut self) {
        self.leader = None;
    }

    /// Re-point this actor at a new leader.
    pub fn update_leader(&mut self, leader: ActorId) {
        self.leader = Some(leader);
    }

    /// Offset of this actor's slot from the leader.
    #[must_use]
    pub const fn relative_position(&self) -> Vec2Fixed {
        self.relative_position
    }

    /// Reassign this actor's slot offset after a reshape.
    pub fn set_relative_position(&mut self, relative_position: Vec2Fixed) {
        self.relative_position = relative_position;
    }

    /// Record the current steering target for this tick.
    pub fn steer_towards(&mut self, destination: Vec2Fixed) {
        self.destination = Some(destination);
    }

    /// The steering target recorded this tick.
    #[must_use]
    pub const fn destination(&self) -> Option<Vec2Fixed> {
        self.destination
    }
}

/// A group of actors walking a waypoint path together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formation {
    player_id: PlayerId,
    formation_id: u64,
    unit_ids: Vec<ActorId>,
    leader: ActorId,
    maker: FormationMaker,
    /// Waypoint stack, consumed back-to-front; the exact destination sits
    /// at the bottom.
    destinations: Vec<Vec2Fixed>,
    is_finished: bool,
}

impl Formation {
    /// Form up: unit zero leads, every other member takes an offset slot.
    ///
    /// # Panics
    ///
    /// Panics if `unit_ids` is empty; the command surface rejects empty
    /// selections before a formation is created.
    #[must_use]
    pub fn new(
        player_id: PlayerId,
        formation_id: u64,
        unit_ids: Vec<ActorId>,
        maker: FormationMaker,
        destinations: Vec<Vec2Fixed>,
        actors: &mut [Actor],
    ) -> Self {
        assert!(!unit_ids.is_empty(), "formation needs at least one unit");

        let offsets = maker.offsets(unit_ids.len());
        let leader = unit_ids[0];
        actors[leader].path_helper.set_path(formation_id, offsets[0], None);
        for (index, &unit) in unit_ids.iter().enumerate().skip(1) {
            actors[unit]
                .path_helper
                .set_path(formation_id, offsets[index], Some(leader));
        }

        Self {
            player_id,
            formation_id,
            unit_ids,
            leader,
            maker,
            destinations,
            is_finished: false,
        }
    }

    /// Whether this formation has released its members.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.is_finished
    }

    /// ID of this formation, unique per player.
    #[must_use]
    pub const fn formation_id(&self) -> u64 {
        self.formation_id
    }

    /// Owning player.
    #[must_use]
    pub const fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Current member count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.unit_ids.len()
    }

    /// Whether the formation has no members left.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unit_ids.is_empty()
    }

    fn belongs(&self, actor: &Actor) -> bool {
        actor.path_helper.is_path_planning()
            && actor.path_helper.formation_id() == self.formation_id
    }

    fn release_members(&self, actors: &mut [Actor]) {
        for &unit in &self.unit_ids {
            actors[unit].velocity = Vec2Fixed::ZERO;
            actors[unit].path_helper.finish();
        }
    }

    /// One tick of formation upkeep and steering.
    pub fn update(&mut self, actors: &mut [Actor]) {
        // Detect leader loss, drop departed members and promote a successor
        let leader_lost = !self.belongs(&actors[self.leader]);
        let mut survivors = Vec::with_capacity(self.unit_ids.len());
        let mut new_leader: Option<ActorId> = None;

        for &unit in &self.unit_ids {
            if !self.belongs(&actors[unit]) {
                continue;
            }
            survivors.push(unit);
            if leader_lost {
                match new_leader {
                    None => {
                        new_leader = Some(unit);
                        actors[unit].path_helper.make_leader();
                    }
                    Some(leader) => actors[unit].path_helper.update_leader(leader),
                }
            }
        }

        let old_count = self.unit_ids.len();
        self.unit_ids = survivors;
        if let Some(leader) = new_leader {
            self.leader = leader;
        }

        if self.unit_ids.is_empty() {
            self.is_finished = true;
            return;
        }

        // Membership changed: re-derive the shape, or disband when the new
        // size cannot hold it
        if old_count != self.unit_ids.len() {
            if !self.maker.is_valid(self.unit_ids.len()) {
                self.release_members(actors);
                self.is_finished = true;
                return;
            }
            let offsets = self.maker.offsets(self.unit_ids.len());
            for (index, &unit) in self.unit_ids.iter().enumerate() {
                actors[unit].path_helper.set_relative_position(offsets[index]);
            }
        }

        // Pop the waypoint once any member closes within three sizes of it
        if let Some(&waypoint) = self.destinations.last() {
            for &unit in &self.unit_ids {
                let reach = actors[unit].size * Fixed::from_num(3);
                if actors[unit].position.distance(waypoint) <= reach {
                    self.destinations.pop();
                    break;
                }
            }
        }

        if self.destinations.is_empty() {
            self.release_members(actors);
            self.is_finished = true;
            return;
        }

        // Steer: leader at the waypoint, followers at their slot, all at
        // half speed
        let waypoint = *self.destinations.last().expect("checked non-empty");
        let leader_position = actors[self.leader].position;

        let mut in_formation = vec![false; self.unit_ids.len()];
        for (index, &unit) in self.unit_ids.iter().enumerate() {
            let actor = &mut actors[unit];
            let slot = if actor.path_helper.is_leader() {
                waypoint
            } else {
                leader_position + actor.path_helper.relative_position()
            };
            actor.path_helper.steer_towards(slot);
            actor.velocity = (slot - actor.position).scaled_to(actor.max_speed / Fixed::from_num(2));

            // Leaders are trivially in formation; followers must be within
            // two sizes of their slot
            in_formation[index] = actor.path_helper.is_leader() || {
                let slot = leader_position + actor.path_helper.relative_position();
                actor.position.distance(slot) <= actor.size * Fixed::from_num(2)
            };
        }

        // Everyone in place: the whole formation doubles up for this tick.
        // Otherwise only the stragglers sprint to catch up.
        let all_formed = in_formation.iter().all(|&formed| formed);
        for (index, &unit) in self.unit_ids.iter().enumerate() {
            if all_formed || !in_formation[index] {
                let doubled = actors[unit].velocity * Fixed::from_num(2);
                actors[unit].velocity = doubled;
            }
        }
    }
}

/// Per-player formation registry plus the shared A* graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathPlanner {
    formations: Vec<Vec<Formation>>,
    next_formation_id: [u64; NUM_PLAYERS],
    graph: Graph,
}

impl PathPlanner {
    /// Create a planner for a terrain of the given row count.
    #[must_use]
    pub fn new(rows: u32) -> Self {
        Self {
            formations: vec![Vec::new(); NUM_PLAYERS],
            next_formation_id: [1; NUM_PLAYERS],
            graph: Graph::new(rows),
        }
    }

    /// Plan a path and form the units up to walk it.
    ///
    /// The path is planned from the first unit's position; the formation
    /// consumes it as a waypoint stack.
    ///
    /// # Errors
    ///
    /// Propagates [`PathError`] when no route exists.
    pub fn make_formation(
        &mut self,
        player_id: PlayerId,
        unit_ids: &[ActorId],
        terrain: &Terrain,
        maker: FormationMaker,
        destination: Vec2Fixed,
        weights: TerrainWeights,
        actors: &mut [Actor],
    ) -> Result<u64, PathError> {
        let start = actors[unit_ids[0]].position;
        let mut destinations = Vec::new();
        self.graph.find_path(
            start,
            destination,
            terrain,
            weights,
            Fixed::ZERO,
            &mut destinations,
        )?;

        let formation_id = self.next_formation_id[player_id.index()];
        self.next_formation_id[player_id.index()] += 1;
        self.formations[player_id.index()].push(Formation::new(
            player_id,
            formation_id,
            unit_ids.to_vec(),
            maker,
            destinations,
            actors,
        ));
        Ok(formation_id)
    }

    /// Plan a path without forming anything up.
    ///
    /// # Errors
    ///
    /// Propagates [`PathError`] when no route exists.
    pub fn plan_path(
        &mut self,
        start: Vec2Fixed,
        destination: Vec2Fixed,
        terrain: &Terrain,
        weights: TerrainWeights,
        waypoints: &mut Vec<Vec2Fixed>,
    ) -> Result<Fixed, PathError> {
        self.graph
            .find_path(start, destination, terrain, weights, Fixed::ZERO, waypoints)
    }

    /// Advance every formation one tick and drop the finished ones.
    pub fn update(&mut self, actors: &mut [Actor]) {
        for player_formations in &mut self.formations {
            for formation in player_formations.iter_mut() {
                formation.update(actors);
            }
            player_formations.retain(|formation| !formation.is_finished());
        }
    }

    /// Number of live formations for a player.
    #[must_use]
    pub fn active_formations(&self, player_id: PlayerId) -> usize {
        self.formations[player_id.index()].len()
    }

    /// Total membership across a player's live formations.
    #[must_use]
    pub fn total_members(&self, player_id: PlayerId) -> usize {
        self.formations[player_id.index()]
            .iter()
            .map(Formation::len)
            .sum()
    }
}
