//! Grid-based pathfinding using A* over the terrain.
//!
//! The search works in cell offsets with caller-supplied per-terrain
//! movement weights, so different unit kinds can price the same ground
//! differently (a magician prefers plains, a scout barely cares). All
//! arithmetic is fixed-point for deterministic results.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::terrain::{Terrain, TerrainKind};

/// Pathfinding failure modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    /// Start or destination lies outside the terrain grid.
    #[error("Position outside the terrain grid")]
    OutOfBounds,

    /// Every route to the destination is exhausted without reaching it.
    ///
    /// The search reports this when the open list drains before the
    /// destination cell is popped; callers must treat the destination as
    /// unreachable rather than receive fabricated waypoints.
    #[error("No route to the destination")]
    Unreachable,
}

/// Per-terrain movement weights for one path request.
///
/// Entering a cell costs the weight of that cell's terrain kind. Weights are
/// supplied per actor kind by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainWeights {
    /// Cost of entering a plain cell.
    #[serde(with = "fixed_serde")]
    pub plain: Fixed,
    /// Cost of entering a forest cell.
    #[serde(with = "fixed_serde")]
    pub forest: Fixed,
    /// Cost of entering a mountain cell.
    #[serde(with = "fixed_serde")]
    pub mountain: Fixed,
}

impl TerrainWeights {
    /// Uniform weights: every kind costs one.
    #[must_use]
    pub const fn uniform() -> Self {
        Self {
            plain: Fixed::ONE,
            forest: Fixed::ONE,
            mountain: Fixed::ONE,
        }
    }

    /// Weight of entering a cell of the given kind.
    #[must_use]
    pub fn weight(&self, kind: TerrainKind) -> Fixed {
        match kind {
            TerrainKind::Forest => self.forest,
            TerrainKind::Mountain => self.mountain,
            TerrainKind::Plain | TerrainKind::Undefined => self.plain,
        }
    }

    /// The minimum weight across all kinds.
    ///
    /// Scaling the Euclidean heuristic by this keeps it an admissible lower
    /// bound on the remaining cost.
    #[must_use]
    pub fn min(&self) -> Fixed {
        self.plain.min(self.forest).min(self.mountain)
    }
}

impl Default for TerrainWeights {
    fn default() -> Self {
        Self::uniform()
    }
}

/// A node in the A* open list.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct OpenEntry {
    /// Grid offset of the cell.
    x: u32,
    y: u32,
    /// f = g + h at the time this entry was pushed.
    f_score: Fixed,
    /// Stamp of the push; stale entries are skipped when popped.
    stamp: u64,
    /// Tie-breaker for determinism: lower coordinates first.
    tie_breaker: u64,
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse the comparison for min-heap
        // behavior. Lower f_score = higher priority.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[inline]
fn coords_to_tie_breaker(x: u32, y: u32) -> u64 {
    (u64::from(y) << 32) | u64::from(x)
}

/// Reusable A* search state over a square grid.
///
/// The graph keeps its per-cell scratch buffers (g-scores, parents, closed
/// bitmap, last-added stamps) between searches and resets them at the start
/// of each request, so repeated path planning does not reallocate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    /// Rows (and columns) of the grid this graph searches.
    rows: u32,
    /// Best known cost to each cell.
    #[serde(skip)]
    g_score: Vec<Fixed>,
    /// Parent offsets for path reconstruction.
    #[serde(skip)]
    parents: Vec<Option<(u32, u32)>>,
    /// Cells already expanded.
    #[serde(skip)]
    closed: Vec<bool>,
    /// Cells currently queued at least once.
    #[serde(skip)]
    in_open: Vec<bool>,
    /// Stamp of the most recent push per cell.
    ///
    /// An entry popped with an older stamp has been superseded by a cheaper
    /// push and is skipped; this replaces a decrease-key operation.
    #[serde(skip)]
    last_added: Vec<u64>,
    /// Monotonic push counter within one search.
    #[serde(skip)]
    stamp: u64,
}

impl Graph {
    /// Create a graph for a grid of the given row count.
    #[must_use]
    pub fn new(rows: u32) -> Self {
        let cells = (rows as usize) * (rows as usize);
        Self {
            rows,
            g_score: vec![Fixed::MAX; cells],
            parents: vec![None; cells],
            closed: vec![false; cells],
            in_open: vec![false; cells],
            last_added: vec![0; cells],
            stamp: 0,
        }
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (x as usize) * (self.rows as usize) + (y as usize)
    }

    fn reset(&mut self) {
        let cells = (self.rows as usize) * (self.rows as usize);
        self.g_score.clear();
        self.g_score.resize(cells, Fixed::MAX);
        self.parents.clear();
        self.parents.resize(cells, None);
        self.closed.clear();
        self.closed.resize(cells, false);
        self.in_open.clear();
        self.in_open.resize(cells, false);
        self.last_added.clear();
        self.last_added.resize(cells, 0);
        self.stamp = 0;
    }

    /// Heuristic: Euclidean distance between cell offsets scaled by the
    /// minimum terrain weight. Admissible because no step can cost less.
    fn heuristic(from: (u32, u32), to: (u32, u32), weights: &TerrainWeights) -> Fixed {
        let a = Vec2Fixed::new(Fixed::from_num(from.0), Fixed::from_num(from.1));
        let b = Vec2Fixed::new(Fixed::from_num(to.0), Fixed::from_num(to.1));
        a.distance(b) * weights.min()
    }

    /// Find a path between two world positions.
    ///
    /// Waypoints are pushed onto `waypoints` as a stack consumed
    /// back-to-front: the exact destination point first, then the centers of
    /// the route cells from the destination back toward the start. The top
    /// of the stack (`waypoints.last()`) is the next point to walk to.
    ///
    /// `unit_width` excludes cells within that many world units of the grid
    /// edge, so wide formations keep clear of the boundary.
    ///
    /// Returns the total path weight.
    ///
    /// # Errors
    ///
    /// [`PathError::OutOfBounds`] when either endpoint lies outside the
    /// grid; [`PathError::Unreachable`] when no route exists.
    pub fn find_path(
        &mut self,
        start: Vec2Fixed,
        destination: Vec2Fixed,
        terrain: &Terrain,
        weights: TerrainWeights,
        unit_width: Fixed,
        waypoints: &mut Vec<Vec2Fixed>,
    ) -> Result<Fixed, PathError> {
        let start_offset = terrain
            .coordinate_to_offset(start)
            .ok_or(PathError::OutOfBounds)?;
        let goal_offset = terrain
            .coordinate_to_offset(destination)
            .ok_or(PathError::OutOfBounds)?;

        // The original request point is the final exact waypoint; everything
        // above it on the stack is snapped to cell centers.
        waypoints.push(destination);

        if start_offset == goal_offset {
            return Ok(Fixed::ZERO);
        }

        self.reset();

        let mut open: BinaryHeap<OpenEntry> = BinaryHeap::new();
        let start_index = self.index(start_offset.0, start_offset.1);
        self.g_score[start_index] = Fixed::ZERO;
        self.in_open[start_index] = true;
        self.last_added[start_index] = self.stamp;
        open.push(OpenEntry {
            x: start_offset.0,
            y: start_offset.1,
            f_score: Self::heuristic(start_offset, goal_offset, &weights),
            stamp: self.stamp,
            tie_breaker: coords_to_tie_breaker(start_offset.0, start_offset.1),
        });
        self.stamp += 1;

        let mut reached = false;
        while let Some(current) = open.pop() {
            let current_index = self.index(current.x, current.y);
            self.closed[current_index] = true;

            if (current.x, current.y) == goal_offset {
                reached = true;
                break;
            }

            // A cheaper push has superseded this entry
            if current.stamp != self.last_added[current_index] {
                continue;
            }

            for (nx, ny) in terrain.all_neighbours((current.x, current.y), unit_width) {
                let neighbour_index = self.index(nx, ny);
                if self.closed[neighbour_index] {
                    continue;
                }
                if !self.in_open[neighbour_index] {
                    self.g_score[neighbour_index] = Fixed::MAX;
                    self.in_open[neighbour_index] = true;
                }

                let step = weights.weight(terrain.element(nx, ny).kind);
                let tentative = self.g_score[current_index].saturating_add(step);
                if tentative < self.g_score[neighbour_index] {
                    self.parents[neighbour_index] = Some((current.x, current.y));
                    self.g_score[neighbour_index] = tentative;
                    self.last_added[neighbour_index] = self.stamp;
                    open.push(OpenEntry {
                        x: nx,
                        y: ny,
                        f_score: tentative + Self::heuristic((nx, ny), goal_offset, &weights),
                        stamp: self.stamp,
                        tie_breaker: coords_to_tie_breaker(nx, ny),
                    });
                    self.stamp += 1;
                }
            }
        }

        if !reached {
            waypoints.pop();
            return Err(PathError::Unreachable);
        }

        // Walk parents from the goal back to the start, pushing cell
        // centers; the start cell itself is not a waypoint.
        let mut seek = goal_offset;
        while seek != start_offset {
            waypoints.push(terrain.offset_to_center(seek.0, seek.1));
            seek = self.parents[self.index(seek.0, seek.1)]
                .expect("reached cell must have a parent chain to the start");
        }

        Ok(self.g_score[self.index(goal_offset.0, goal_offset.1)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn vec2(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::new(fixed(x), fixed(y))
    }

    fn flat(rows: u32) -> Terrain {
        Terrain::new(rows, fixed(1))
    }

    fn plan(
        terrain: &Terrain,
        start: Vec2Fixed,
        dest: Vec2Fixed,
        weights: TerrainWeights,
    ) -> Result<(Fixed, Vec<Vec2Fixed>), PathError> {
        let mut graph = Graph::new(terrain.rows());
        let mut waypoints = Vec::new();
        let weight = graph.find_path(start, dest, terrain, weights, Fixed::ZERO, &mut waypoints)?;
        Ok((weight, waypoints))
    }

    #[test]
    fn test_straight_path_weight() {
        let terrain = flat(10);
        let (weight, waypoints) =
            plan(&terrain, vec2(0, 5), vec2(9, 5), TerrainWeights::uniform()).unwrap();

        // Nine cells entered at weight one each
        assert_eq!(weight, fixed(9));
        // Exact destination at the bottom of the stack, next step on top
        assert_eq!(waypoints.first(), Some(&vec2(9, 5)));
        let top = *waypoints.last().unwrap();
        let (tx, ty) = terrain.coordinate_to_offset(top).unwrap();
        assert!(tx.abs_diff(0) <= 1 && ty.abs_diff(5) <= 1, "top waypoint must neighbour the start cell");
    }

    #[test]
    fn test_diagonal_uniform_optimality() {
        let terrain = flat(10);
        let (weight, _) =
            plan(&terrain, vec2(0, 0), vec2(7, 7), TerrainWeights::uniform()).unwrap();

        // Seven diagonal steps is the least-cost route on uniform ground
        assert_eq!(weight, fixed(7));
    }

    #[test]
    fn test_same_cell_path() {
        let terrain = flat(10);
        let (weight, waypoints) =
            plan(&terrain, vec2(5, 5), vec2(5, 5), TerrainWeights::uniform()).unwrap();

        assert_eq!(weight, Fixed::ZERO);
        assert_eq!(waypoints, vec![vec2(5, 5)]);
    }

    #[test]
    fn test_avoids_expensive_terrain() {
        // A mountain ridge across the direct route; crossing costs 50 per
        // cell, walking around costs 1 per cell.
        let mut terrain = flat(9);
        for y in 0..8 {
            terrain.set_kind(4, y, TerrainKind::Mountain);
        }

        let weights = TerrainWeights {
            plain: fixed(1),
            forest: fixed(2),
            mountain: fixed(50),
        };
        let (weight, waypoints) = plan(&terrain, vec2(1, 1), vec2(7, 1), weights).unwrap();

        // The detour through row eight must beat the ridge crossing
        assert!(weight < fixed(25), "expected detour, got weight {weight}");
        let crosses_ridge = waypoints
            .iter()
            .filter_map(|p| terrain.coordinate_to_offset(*p))
            .any(|(x, y)| x == 4 && y < 8);
        assert!(!crosses_ridge, "path should route around the ridge");
    }

    #[test]
    fn test_unreachable_is_reported() {
        // The edge margin walls off everything: no neighbour survives a
        // margin wider than the half grid.
        let terrain = flat(10);
        let mut graph = Graph::new(terrain.rows());
        let mut waypoints = Vec::new();
        let result = graph.find_path(
            vec2(1, 1),
            vec2(8, 8),
            &terrain,
            TerrainWeights::uniform(),
            fixed(5),
            &mut waypoints,
        );

        assert_eq!(result, Err(PathError::Unreachable));
        assert!(waypoints.is_empty(), "no waypoints on failure");
    }

    #[test]
    fn test_out_of_bounds_endpoints() {
        let terrain = flat(10);
        let mut graph = Graph::new(terrain.rows());
        let mut waypoints = Vec::new();

        let result = graph.find_path(
            vec2(-1, 0),
            vec2(5, 5),
            &terrain,
            TerrainWeights::uniform(),
            Fixed::ZERO,
            &mut waypoints,
        );
        assert_eq!(result, Err(PathError::OutOfBounds));

        let result = graph.find_path(
            vec2(5, 5),
            vec2(50, 5),
            &terrain,
            TerrainWeights::uniform(),
            Fixed::ZERO,
            &mut waypoints,
        );
        assert_eq!(result, Err(PathError::OutOfBounds));
    }

    #[test]
    fn test_determinism() {
        let mut terrain = flat(20);
        for y in 5..15 {
            terrain.set_kind(10, y, TerrainKind::Mountain);
        }
        let weights = TerrainWeights {
            plain: fixed(1),
            forest: fixed(2),
            mountain: fixed(5),
        };

        let first = plan(&terrain, vec2(5, 10), vec2(15, 10), weights).unwrap();
        let second = plan(&terrain, vec2(5, 10), vec2(15, 10), weights).unwrap();
        let third = plan(&terrain, vec2(5, 10), vec2(15, 10), weights).unwrap();

        assert_eq!(first, second);
        assert_eq!(second, third);
    }

    #[test]
    fn test_graph_is_reusable() {
        let terrain = flat(10);
        let mut graph = Graph::new(terrain.rows());

        let mut first = Vec::new();
        let mut second = Vec::new();
        graph
            .find_path(
                vec2(0, 0),
                vec2(9, 9),
                &terrain,
                TerrainWeights::uniform(),
                Fixed::ZERO,
                &mut first,
            )
            .unwrap();
        graph
            .find_path(
                vec2(0, 0),
                vec2(9, 9),
                &terrain,
                TerrainWeights::uniform(),
                Fixed::ZERO,
                &mut second,
            )
            .unwrap();

        assert_eq!(first, second);
    }

    proptest! {
        /// On uniform ground the returned weight equals the Chebyshev
        /// distance between the endpoint cells: the least number of
        /// 8-connected steps, each at weight one.
        #[test]
        fn prop_uniform_weight_is_chebyshev(
            sx in 0u32..12, sy in 0u32..12,
            dx in 0u32..12, dy in 0u32..12,
        ) {
            let terrain = flat(12);
            let weights = TerrainWeights::uniform();
            let start = terrain.offset_to_center(sx, sy);
            let dest = terrain.offset_to_center(dx, dy);

            let (weight, _) = plan(&terrain, start, dest, weights).unwrap();
            let chebyshev = sx.abs_diff(dx).max(sy.abs_diff(dy));
            prop_assert_eq!(weight, Fixed::from_num(chebyshev));
        }
    }
}
