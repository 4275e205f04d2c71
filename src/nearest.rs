//! Nearest-node resolution for floor and survey-date switches.
//!
//! When the active panorama does not exist in a freshly loaded node set, the
//! viewer re-enters at whichever candidate lies closest to where the user was
//! standing. Distances are compared squared; the first minimum in input order
//! wins so results are reproducible.

#[cfg(test)]
#[path = "nearest_test.rs"]
mod nearest_test;

use crate::coords::Point;
use crate::node::TilesId;

/// A node that may be chosen as the new entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub node_id: TilesId,
    pub position: Point,
}

/// The chosen entry point and its position.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestNode {
    pub node_id: TilesId,
    pub x: f64,
    pub y: f64,
}

/// Closest candidate to `target`, or `None` for an empty candidate list.
#[must_use]
pub fn find_nearest(candidates: &[Candidate], target: Point) -> Option<NearestNode> {
    let mut best: Option<(&Candidate, f64)> = None;
    for candidate in candidates {
        let dist = candidate.position.distance_sq(target);
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((candidate, dist)),
        }
    }
    best.map(|(c, _)| NearestNode { node_id: c.node_id.clone(), x: c.position.x, y: c.position.y })
}
