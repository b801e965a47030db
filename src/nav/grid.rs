//! A* pathfinding on a ground-plane grid
//!
//! The grid covers the XZ plane. Cells are either walkable or blocked; paths
//! move between the centers of 4-connected walkable cells.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::{Vec2, Vec3};
use rustc_hash::FxHashMap;

/// Grid cell coordinates.
pub type Cell = (usize, usize);

/// A walkability grid over the XZ plane
#[derive(Debug, Clone)]
pub struct NavGrid {
    /// Width in cells (along X)
    pub width: usize,
    /// Depth in cells (along Z)
    pub depth: usize,
    /// Cell size in world units
    pub cell_size: f32,
    /// World XZ of the grid corner
    pub origin: Vec2,
    /// Walkable cells (true = walkable)
    cells: Vec<bool>,
}

impl NavGrid {
    /// Create a grid with every cell walkable
    #[must_use]
    pub fn new(width: usize, depth: usize, cell_size: f32) -> Self {
        Self {
            width,
            depth,
            cell_size,
            origin: Vec2::ZERO,
            cells: vec![true; width * depth],
        }
    }

    /// Create a grid covering the square `[-half_extent, half_extent]` on both axes
    #[must_use]
    pub fn centered(half_extent: f32, cell_size: f32) -> Self {
        let cells = ((half_extent * 2.0) / cell_size).ceil().max(1.0) as usize;
        let mut grid = Self::new(cells, cells, cell_size);
        grid.origin = Vec2::splat(-half_extent);
        grid
    }

    /// Set a cell's walkability
    pub fn set_walkable(&mut self, x: usize, z: usize, walkable: bool) {
        if x < self.width && z < self.depth {
            self.cells[z * self.width + x] = walkable;
        }
    }

    /// Check if a cell is walkable; cells outside the grid are not
    #[must_use]
    pub fn is_walkable(&self, x: usize, z: usize) -> bool {
        x < self.width && z < self.depth && self.cells[z * self.width + x]
    }

    /// Mark every cell whose center lies inside an axis-aligned box as blocked
    pub fn block_box(&mut self, center: Vec3, half_extents: Vec3) {
        for z in 0..self.depth {
            for x in 0..self.width {
                let world = self.cell_center(x, z);
                if (world.x - center.x).abs() <= half_extents.x
                    && (world.z - center.z).abs() <= half_extents.z
                {
                    self.set_walkable(x, z, false);
                }
            }
        }
    }

    /// Cell containing a world position, if it lies on the grid
    #[must_use]
    pub fn cell_at(&self, position: Vec3) -> Option<Cell> {
        let local = Vec2::new(position.x, position.z) - self.origin;
        let x = (local.x / self.cell_size).floor();
        let z = (local.y / self.cell_size).floor();
        if x < 0.0 || z < 0.0 || x as usize >= self.width || z as usize >= self.depth {
            return None;
        }
        Some((x as usize, z as usize))
    }

    /// World position of a cell center, at ground height
    #[must_use]
    pub fn cell_center(&self, x: usize, z: usize) -> Vec3 {
        let corner = self.origin
            + Vec2::new(
                (x as f32 + 0.5) * self.cell_size,
                (z as f32 + 0.5) * self.cell_size,
            );
        Vec3::new(corner.x, 0.0, corner.y)
    }

    /// Check whether a world position stands on a walkable cell
    #[must_use]
    pub fn is_walkable_at(&self, position: Vec3) -> bool {
        self.cell_at(position)
            .is_some_and(|(x, z)| self.is_walkable(x, z))
    }

    /// Closest walkable point within `radius` of `point`.
    ///
    /// A point already on a walkable cell is returned unchanged; otherwise the
    /// nearest walkable cell center wins.
    #[must_use]
    pub fn nearest_walkable(&self, point: Vec3, radius: f32) -> Option<Vec3> {
        if self.is_walkable_at(point) {
            return Some(point);
        }
        let reach = (radius / self.cell_size).ceil() as i64 + 1;
        let local = Vec2::new(point.x, point.z) - self.origin;
        let cx = (local.x / self.cell_size).floor() as i64;
        let cz = (local.y / self.cell_size).floor() as i64;

        let mut best: Option<(Vec3, f32)> = None;
        for z in (cz - reach)..=(cz + reach) {
            for x in (cx - reach)..=(cx + reach) {
                if x < 0 || z < 0 || !self.is_walkable(x as usize, z as usize) {
                    continue;
                }
                let mut center = self.cell_center(x as usize, z as usize);
                center.y = point.y;
                let distance = center.distance(point);
                if distance <= radius && best.is_none_or(|(_, d)| distance < d) {
                    best = Some((center, distance));
                }
            }
        }
        best.map(|(position, _)| position)
    }

    /// Get walkable neighbors of a cell (4-directional)
    fn neighbors(&self, x: usize, z: usize) -> impl Iterator<Item = Cell> + '_ {
        let candidates = [
            x.checked_sub(1).map(|nx| (nx, z)),
            Some((x + 1, z)),
            z.checked_sub(1).map(|nz| (x, nz)),
            Some((x, z + 1)),
        ];
        candidates
            .into_iter()
            .flatten()
            .filter(|&(nx, nz)| self.is_walkable(nx, nz))
    }
}

/// Result of pathfinding
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavPath {
    /// Waypoints in world coordinates, ending at the goal
    pub waypoints: Vec<Vec3>,
    /// Total path length
    pub length: f32,
}

impl NavPath {
    /// Check if the path has no waypoints
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

/// A* node for priority queue
#[derive(Debug, Clone, Copy)]
struct Node {
    cell: Cell,
    f_cost: f32,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cell == other.cell
    }
}

impl Eq for Node {}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for min-heap
        other.f_cost.total_cmp(&self.f_cost)
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find a path between two world positions using A*.
///
/// Returns `None` when either end is off the walkable grid or no route
/// exists. The final waypoint is the exact goal.
#[must_use]
pub fn find_path(grid: &NavGrid, start: Vec3, goal: Vec3) -> Option<NavPath> {
    let start_cell = grid.cell_at(start)?;
    let goal_cell = grid.cell_at(goal)?;
    if !grid.is_walkable(start_cell.0, start_cell.1) || !grid.is_walkable(goal_cell.0, goal_cell.1) {
        return None;
    }

    let heuristic = |(x, z): Cell| -> f32 {
        // Manhattan distance
        (x as f32 - goal_cell.0 as f32).abs() + (z as f32 - goal_cell.1 as f32).abs()
    };

    let mut open_set = BinaryHeap::new();
    let mut came_from: FxHashMap<Cell, Cell> = FxHashMap::default();
    let mut g_score: FxHashMap<Cell, f32> = FxHashMap::default();

    g_score.insert(start_cell, 0.0);
    open_set.push(Node {
        cell: start_cell,
        f_cost: heuristic(start_cell),
    });

    while let Some(current) = open_set.pop() {
        if current.cell == goal_cell {
            return Some(reconstruct(grid, &came_from, start, goal, goal_cell));
        }

        let current_g = g_score.get(&current.cell).copied().unwrap_or(f32::MAX);
        for next in grid.neighbors(current.cell.0, current.cell.1) {
            let tentative_g = current_g + 1.0;
            if tentative_g < g_score.get(&next).copied().unwrap_or(f32::MAX) {
                came_from.insert(next, current.cell);
                g_score.insert(next, tentative_g);
                open_set.push(Node {
                    cell: next,
                    f_cost: tentative_g + heuristic(next),
                });
            }
        }
    }

    None
}

fn reconstruct(
    grid: &NavGrid,
    came_from: &FxHashMap<Cell, Cell>,
    start: Vec3,
    goal: Vec3,
    goal_cell: Cell,
) -> NavPath {
    let mut cells = vec![goal_cell];
    let mut cursor = goal_cell;
    while let Some(&previous) = came_from.get(&cursor) {
        cells.push(previous);
        cursor = previous;
    }
    cells.reverse();

    // The start cell is where the agent already stands
    let mut waypoints: Vec<Vec3> = cells
        .iter()
        .skip(1)
        .map(|&(x, z)| {
            let mut center = grid.cell_center(x, z);
            center.y = start.y;
            center
        })
        .collect();
    match waypoints.last_mut() {
        Some(last) => *last = goal,
        None => waypoints.push(goal),
    }

    let mut length = 0.0;
    let mut previous = start;
    for waypoint in &waypoints {
        length += previous.distance(*waypoint);
        previous = *waypoint;
    }
    NavPath { waypoints, length }
}
