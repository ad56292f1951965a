//! Terrain grid and per-player line of sight.
//!
//! The world is a square grid of uniform cells. Each cell carries a terrain
//! kind and, per player, a line-of-sight status plus the tick it was last
//! seen. Line of sight is recomputed every tick: direct visibility first
//! decays to explored, then a cost-bounded flood fill from every living
//! actor re-marks the cells it can currently see.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::actor::{PlayerId, NUM_PLAYERS};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Terrain classification of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TerrainKind {
    /// Open ground. Cheapest to cross, best to see and shoot over.
    #[default]
    Plain,
    /// Forest. Slows movement, dampens sight lines and projectiles.
    Forest,
    /// Mountain. Expensive to cross, commanding fire positions.
    Mountain,
    /// Masked terrain in player views of unexplored cells. Never stored in
    /// the authoritative grid.
    Undefined,
}

/// Per-player visibility status of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LosStatus {
    /// Never seen by this player.
    #[default]
    Unexplored,
    /// Seen at some earlier tick, not currently visible.
    Explored,
    /// Currently visible this tick.
    DirectLos,
}

/// Terrain multiplier table indexed by (source kind, destination kind).
///
/// Shared by projectile damage and line-of-sight step cost (as its
/// reciprocal): fighting and seeing out of a forest is hard, raining arrows
/// down from a mountain is easy.
#[must_use]
pub fn terrain_multiplier(from: TerrainKind, to: TerrainKind) -> Fixed {
    use TerrainKind::{Forest, Mountain, Plain};

    let percent = match (from, to) {
        (Plain, Forest) => 70,
        (Plain, Mountain) => 130,
        (Forest, _) => 70,
        (Mountain, Plain) => 130,
        // Plain->Plain, Mountain->Forest, Mountain->Mountain and anything
        // involving a masked cell
        _ => 100,
    };

    Fixed::from_num(percent) / Fixed::from_num(100)
}

/// One cell of the terrain grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainElement {
    /// Terrain classification.
    pub kind: TerrainKind,
    /// Per-player visibility status.
    pub los: [LosStatus; NUM_PLAYERS],
    /// Tick each player last had direct sight of this cell.
    pub last_seen: [u64; NUM_PLAYERS],
}

impl TerrainElement {
    /// Create a cell of the given kind, unexplored for both players.
    #[must_use]
    pub const fn new(kind: TerrainKind) -> Self {
        Self {
            kind,
            los: [LosStatus::Unexplored; NUM_PLAYERS],
            last_seen: [0; NUM_PLAYERS],
        }
    }
}

impl Default for TerrainElement {
    fn default() -> Self {
        Self::new(TerrainKind::Plain)
    }
}

/// Offsets of the four edge-adjacent neighbour cells.
const ADJACENT: [(i64, i64); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];

/// Offsets of the four diagonal neighbour cells.
const DIAGONAL: [(i64, i64); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];

/// Square grid of terrain cells with a uniform cell size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terrain {
    /// Number of rows (and columns).
    rows: u32,
    /// Size of each cell in world units.
    #[serde(with = "fixed_serde")]
    cell_size: Fixed,
    /// Cell data stored in row-major order.
    cells: Vec<TerrainElement>,
}

impl Terrain {
    /// Create an all-plain terrain grid.
    ///
    /// # Panics
    ///
    /// Panics if `rows` is zero or `cell_size` is not positive.
    #[must_use]
    pub fn new(rows: u32, cell_size: Fixed) -> Self {
        assert!(rows > 0, "Terrain must have at least one row");
        assert!(cell_size > Fixed::ZERO, "Terrain cell_size must be positive");

        let cell_count = (rows as usize) * (rows as usize);
        Self {
            rows,
            cell_size,
            cells: vec![TerrainElement::default(); cell_count],
        }
    }

    /// Create a terrain grid from a square matrix of kinds.
    ///
    /// # Panics
    ///
    /// Panics if the matrix is empty or not square.
    #[must_use]
    pub fn from_kinds(kinds: &[Vec<TerrainKind>], cell_size: Fixed) -> Self {
        let rows = u32::try_from(kinds.len()).expect("terrain too large");
        let mut terrain = Self::new(rows, cell_size);
        for (x, row) in kinds.iter().enumerate() {
            assert_eq!(row.len(), kinds.len(), "terrain matrix must be square");
            for (y, &kind) in row.iter().enumerate() {
                let index = terrain.offset_to_index(x as u32, y as u32);
                terrain.cells[index].kind = kind;
            }
        }
        terrain
    }

    /// Number of rows (and columns) in the grid.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Size of each cell in world units.
    #[must_use]
    pub const fn cell_size(&self) -> Fixed {
        self.cell_size
    }

    /// World-space extent of the whole grid.
    #[must_use]
    pub fn size(&self) -> Vec2Fixed {
        let extent = Fixed::from_num(self.rows) * self.cell_size;
        Vec2Fixed::new(extent, extent)
    }

    #[inline]
    fn offset_to_index(&self, x: u32, y: u32) -> usize {
        (x as usize) * (self.rows as usize) + (y as usize)
    }

    /// Check if an offset is within grid bounds.
    #[must_use]
    pub fn in_bounds(&self, x: u32, y: u32) -> bool {
        x < self.rows && y < self.rows
    }

    /// Get the cell at a grid offset.
    ///
    /// # Panics
    ///
    /// Panics if the offset is out of bounds; callers validate offsets at
    /// the command boundary.
    #[must_use]
    pub fn element(&self, x: u32, y: u32) -> &TerrainElement {
        assert!(self.in_bounds(x, y), "terrain offset out of bounds");
        &self.cells[self.offset_to_index(x, y)]
    }

    fn element_mut(&mut self, x: u32, y: u32) -> &mut TerrainElement {
        assert!(self.in_bounds(x, y), "terrain offset out of bounds");
        let index = self.offset_to_index(x, y);
        &mut self.cells[index]
    }

    /// Set the kind of a cell. Returns `false` if out of bounds.
    pub fn set_kind(&mut self, x: u32, y: u32, kind: TerrainKind) -> bool {
        if self.in_bounds(x, y) {
            self.element_mut(x, y).kind = kind;
            true
        } else {
            false
        }
    }

    /// Convert a world position to the offset of its occupying cell.
    ///
    /// Returns `None` outside the grid.
    #[must_use]
    pub fn coordinate_to_offset(&self, pos: Vec2Fixed) -> Option<(u32, u32)> {
        if pos.x < Fixed::ZERO || pos.y < Fixed::ZERO {
            return None;
        }

        let x = (pos.x / self.cell_size).to_num::<i64>();
        let y = (pos.y / self.cell_size).to_num::<i64>();

        if x >= 0 && x < i64::from(self.rows) && y >= 0 && y < i64::from(self.rows) {
            Some((x as u32, y as u32))
        } else {
            None
        }
    }

    /// Get the cell occupying a world position.
    ///
    /// Returns `None` outside the grid.
    #[must_use]
    pub fn coordinate_to_element(&self, pos: Vec2Fixed) -> Option<&TerrainElement> {
        self.coordinate_to_offset(pos).map(|(x, y)| self.element(x, y))
    }

    /// Convert a grid offset to the world position of the cell center.
    #[must_use]
    pub fn offset_to_center(&self, x: u32, y: u32) -> Vec2Fixed {
        let half = self.cell_size / Fixed::from_num(2);
        Vec2Fixed::new(
            Fixed::from_num(x) * self.cell_size + half,
            Fixed::from_num(y) * self.cell_size + half,
        )
    }

    fn neighbours_of(
        &self,
        offset: (u32, u32),
        margin: Fixed,
        table: &[(i64, i64); 4],
    ) -> Vec<(u32, u32)> {
        // The margin is given in world units; cells within it of the grid
        // edge are excluded so wide formations do not hug the boundary.
        let margin_cells = (margin / self.cell_size).to_num::<i64>();
        let limit = i64::from(self.rows) - margin_cells;

        let mut neighbours = Vec::with_capacity(4);
        for &(dx, dy) in table {
            let nx = i64::from(offset.0) + dx;
            let ny = i64::from(offset.1) + dy;
            if nx >= margin_cells && nx < limit && ny >= margin_cells && ny < limit {
                neighbours.push((nx as u32, ny as u32));
            }
        }
        neighbours
    }

    /// Edge-adjacent neighbours of a cell, excluding cells within `margin`
    /// world units of the grid edge.
    #[must_use]
    pub fn adjacent_neighbours(&self, offset: (u32, u32), margin: Fixed) -> Vec<(u32, u32)> {
        self.neighbours_of(offset, margin, &ADJACENT)
    }

    /// Diagonal neighbours of a cell, excluding cells within `margin` world
    /// units of the grid edge.
    #[must_use]
    pub fn diagonal_neighbours(&self, offset: (u32, u32), margin: Fixed) -> Vec<(u32, u32)> {
        self.neighbours_of(offset, margin, &DIAGONAL)
    }

    /// All eight neighbours of a cell, adjacent first, then diagonal.
    #[must_use]
    pub fn all_neighbours(&self, offset: (u32, u32), margin: Fixed) -> Vec<(u32, u32)> {
        let mut neighbours = self.adjacent_neighbours(offset, margin);
        neighbours.extend(self.diagonal_neighbours(offset, margin));
        neighbours
    }

    /// Visibility status of a cell for a player.
    #[must_use]
    pub fn los(&self, x: u32, y: u32, player: PlayerId) -> LosStatus {
        self.element(x, y).los[player.index()]
    }

    /// Tick a player last had direct sight of a cell.
    #[must_use]
    pub fn last_seen(&self, x: u32, y: u32, player: PlayerId) -> u64 {
        self.element(x, y).last_seen[player.index()]
    }

    /// Whether a world position is currently visible to a player.
    #[must_use]
    pub fn in_direct_los(&self, pos: Vec2Fixed, player: PlayerId) -> bool {
        self.coordinate_to_element(pos)
            .is_some_and(|cell| cell.los[player.index()] == LosStatus::DirectLos)
    }

    /// Downgrade every directly-visible cell to explored, for both players.
    ///
    /// Runs at the start of every tick, before the flood fills re-mark what
    /// is still visible. A cell that was visible and no longer is therefore
    /// ends the tick as `Explored`, never `Unexplored`.
    pub fn decay_los(&mut self) {
        for cell in &mut self.cells {
            for status in &mut cell.los {
                if *status == LosStatus::DirectLos {
                    *status = LosStatus::Explored;
                }
            }
        }
    }

    /// Flood-fill direct line of sight outward from a world position.
    ///
    /// Each step into a neighbouring cell costs the reciprocal of the
    /// terrain multiplier between the two cells, so sight carries further
    /// over plains than through forest or across mountains. Cells reached
    /// within the `los_radius` budget are marked `DirectLos` for `player`
    /// and stamped with `tick`.
    pub fn mark_los(&mut self, origin: Vec2Fixed, los_radius: Fixed, player: PlayerId, tick: u64) {
        let Some(start) = self.coordinate_to_offset(origin) else {
            return;
        };

        let mut visited = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();

        visited[self.offset_to_index(start.0, start.1)] = true;
        queue.push_back((start, Fixed::ZERO));

        while let Some((offset, cost)) = queue.pop_front() {
            let cell = self.element_mut(offset.0, offset.1);
            cell.los[player.index()] = LosStatus::DirectLos;
            cell.last_seen[player.index()] = tick;

            let from_kind = self.element(offset.0, offset.1).kind;
            for neighbour in self.all_neighbours(offset, Fixed::ZERO) {
                let index = self.offset_to_index(neighbour.0, neighbour.1);
                if visited[index] {
                    continue;
                }
                let to_kind = self.cells[index].kind;
                let step = Fixed::from_num(1) / terrain_multiplier(from_kind, to_kind);
                let total = cost + step;
                if total <= los_radius {
                    visited[index] = true;
                    queue.push_back((neighbour, total));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn vec2(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::new(fixed(x), fixed(y))
    }

    #[test]
    fn test_terrain_creation() {
        let terrain = Terrain::new(8, fixed(10));
        assert_eq!(terrain.rows(), 8);
        assert_eq!(terrain.size(), vec2(80, 80));
        assert_eq!(terrain.element(3, 3).kind, TerrainKind::Plain);
    }

    #[test]
    fn test_coordinate_conversions() {
        let terrain = Terrain::new(10, fixed(2));

        assert_eq!(terrain.coordinate_to_offset(vec2(1, 1)), Some((0, 0)));
        assert_eq!(terrain.coordinate_to_offset(vec2(3, 5)), Some((1, 2)));
        assert_eq!(terrain.coordinate_to_offset(vec2(20, 20)), None);
        assert_eq!(terrain.coordinate_to_offset(vec2(-1, 0)), None);

        assert_eq!(terrain.offset_to_center(0, 0), vec2(1, 1));
        assert_eq!(terrain.offset_to_center(1, 2), vec2(3, 5));
    }

    #[test]
    fn test_neighbours_interior() {
        let terrain = Terrain::new(10, fixed(1));
        assert_eq!(terrain.adjacent_neighbours((5, 5), Fixed::ZERO).len(), 4);
        assert_eq!(terrain.diagonal_neighbours((5, 5), Fixed::ZERO).len(), 4);
        assert_eq!(terrain.all_neighbours((5, 5), Fixed::ZERO).len(), 8);
    }

    #[test]
    fn test_neighbours_corner() {
        let terrain = Terrain::new(10, fixed(1));
        assert_eq!(terrain.adjacent_neighbours((0, 0), Fixed::ZERO).len(), 2);
        assert_eq!(terrain.diagonal_neighbours((0, 0), Fixed::ZERO).len(), 1);
    }

    #[test]
    fn test_neighbours_margin() {
        let terrain = Terrain::new(10, fixed(1));
        // A margin of two cells shrinks the usable grid to [2, 8)
        let neighbours = terrain.all_neighbours((2, 2), fixed(2));
        assert_eq!(neighbours.len(), 3);
        for (x, y) in neighbours {
            assert!(x >= 2 && y >= 2);
        }
    }

    #[test]
    fn test_multiplier_table() {
        use TerrainKind::{Forest, Mountain, Plain};
        let pct = |v: i32| Fixed::from_num(v) / fixed(100);

        assert_eq!(terrain_multiplier(Plain, Plain), pct(100));
        assert_eq!(terrain_multiplier(Plain, Forest), pct(70));
        assert_eq!(terrain_multiplier(Plain, Mountain), pct(130));
        assert_eq!(terrain_multiplier(Forest, Plain), pct(70));
        assert_eq!(terrain_multiplier(Forest, Forest), pct(70));
        assert_eq!(terrain_multiplier(Forest, Mountain), pct(70));
        assert_eq!(terrain_multiplier(Mountain, Plain), pct(130));
        assert_eq!(terrain_multiplier(Mountain, Forest), pct(100));
        assert_eq!(terrain_multiplier(Mountain, Mountain), pct(100));
    }

    #[test]
    fn test_los_decay() {
        let mut terrain = Terrain::new(4, fixed(1));
        terrain.element_mut(1, 1).los[PlayerId::P1.index()] = LosStatus::DirectLos;
        terrain.element_mut(2, 2).los[PlayerId::P2.index()] = LosStatus::Explored;

        terrain.decay_los();

        assert_eq!(terrain.los(1, 1, PlayerId::P1), LosStatus::Explored);
        assert_eq!(terrain.los(2, 2, PlayerId::P2), LosStatus::Explored);
        assert_eq!(terrain.los(0, 0, PlayerId::P1), LosStatus::Unexplored);
    }

    #[test]
    fn test_los_flood_fill_marks_radius() {
        let mut terrain = Terrain::new(10, fixed(1));
        terrain.mark_los(vec2(5, 5), fixed(2), PlayerId::P1, 7);

        assert_eq!(terrain.los(5, 5, PlayerId::P1), LosStatus::DirectLos);
        assert_eq!(terrain.los(5, 7, PlayerId::P1), LosStatus::DirectLos);
        assert_eq!(terrain.last_seen(5, 7, PlayerId::P1), 7);
        // Well outside a budget of two steps
        assert_eq!(terrain.los(5, 9, PlayerId::P1), LosStatus::Unexplored);
        // The other player saw nothing
        assert_eq!(terrain.los(5, 5, PlayerId::P2), LosStatus::Unexplored);
    }

    #[test]
    fn test_los_shorter_through_forest() {
        // Forest east of the origin: each step costs 1/0.7 ≈ 1.43, so a
        // budget of two steps on plains covers only one forest step.
        let mut terrain = Terrain::new(12, fixed(1));
        for y in 0..12 {
            for x in 7..12 {
                terrain.set_kind(x, y, TerrainKind::Forest);
            }
        }

        terrain.mark_los(vec2(6, 6), fixed(2), PlayerId::P1, 1);

        assert_eq!(terrain.los(4, 6, PlayerId::P1), LosStatus::DirectLos);
        assert_eq!(terrain.los(7, 6, PlayerId::P1), LosStatus::DirectLos);
        assert_eq!(terrain.los(8, 6, PlayerId::P1), LosStatus::Unexplored);
    }
}
