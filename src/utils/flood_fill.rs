//! # Grid Flood Fill
//!
//! Reachability and connected-region queries over a [`Grid`], built on the
//! breadth-first search of the `pathfinding` crate. All queries use
//! 4-connectivity.

use crate::{CellState, Grid, Position};
use pathfinding::prelude::bfs_reach;

/// All cells reachable from `start` through cells accepted by `walkable`,
/// in breadth-first order. Empty if `start` itself is not walkable.
pub fn reachable_cells<F>(grid: &Grid, start: Position, walkable: F) -> Vec<Position>
where
    F: Fn(CellState) -> bool,
{
    let accepts = |pos: Position| grid.get(pos).is_some_and(&walkable);
    if !accepts(start) {
        return Vec::new();
    }

    bfs_reach(start, |&pos| {
        pos.cardinal_adjacent_positions()
            .into_iter()
            .filter(|&n| accepts(n))
            .collect::<Vec<_>>()
    })
    .collect()
}

/// Splits every cell accepted by `walkable` into 4-connected regions.
///
/// Regions are discovered in row-major order of their first cell, and the
/// cells of each region are listed in breadth-first order.
pub fn connected_regions<F>(grid: &Grid, walkable: F) -> Vec<Vec<Position>>
where
    F: Fn(CellState) -> bool,
{
    let width = grid.width as usize;
    let mut labelled = vec![false; width * grid.height as usize];
    let mut regions = Vec::new();

    for pos in grid.positions() {
        let idx = pos.y as usize * width + pos.x as usize;
        if labelled[idx] || !grid.get(pos).is_some_and(&walkable) {
            continue;
        }

        let region = reachable_cells(grid, pos, &walkable);
        for cell in &region {
            labelled[cell.y as usize * width + cell.x as usize] = true;
        }
        regions.push(region);
    }

    regions
}
