#![allow(clippy::float_cmp)]

use super::*;

fn candidate(id: &str, x: f64, y: f64) -> Candidate {
    Candidate { node_id: id.into(), position: Point::new(x, y) }
}

#[test]
fn empty_candidates_resolve_to_none() {
    assert_eq!(find_nearest(&[], Point::new(100.0, 100.0)), None);
}

#[test]
fn picks_closest_of_diagonal_nodes() {
    let nodes = [candidate("a", 90.0, 90.0), candidate("b", 150.0, 150.0), candidate("c", 210.0, 210.0)];
    let nearest = find_nearest(&nodes, Point::new(100.0, 100.0)).unwrap();
    assert_eq!(nearest, NearestNode { node_id: "a".into(), x: 90.0, y: 90.0 });
}

#[test]
fn picks_closest_regardless_of_order() {
    let nodes = [candidate("c", 210.0, 210.0), candidate("b", 150.0, 150.0), candidate("a", 90.0, 90.0)];
    let nearest = find_nearest(&nodes, Point::new(140.0, 160.0)).unwrap();
    assert_eq!(nearest.node_id, "b");
}

#[test]
fn ties_keep_first_encountered() {
    let nodes = [candidate("left", 40.0, 50.0), candidate("right", 60.0, 50.0)];
    let nearest = find_nearest(&nodes, Point::new(50.0, 50.0)).unwrap();
    assert_eq!(nearest.node_id, "left");
}

#[test]
fn exact_match_wins() {
    let nodes = [candidate("near", 11.0, 10.0), candidate("exact", 10.0, 10.0)];
    let nearest = find_nearest(&nodes, Point::new(10.0, 10.0)).unwrap();
    assert_eq!(nearest.node_id, "exact");
}

#[test]
fn single_candidate_always_chosen() {
    let nodes = [candidate("only", -500.0, 9000.0)];
    assert_eq!(find_nearest(&nodes, Point::new(0.0, 0.0)).unwrap().node_id, "only");
}
