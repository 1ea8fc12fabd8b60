//! Bounded breadth-first traversals over the adjacency index.

use std::collections::{HashMap, VecDeque};

use crate::context::AnalysisContext;

/// Hop distance from `start` to every node reachable within `max_hops`,
/// including `start` itself at distance 0.
pub fn bounded_distances(
    ctx: &AnalysisContext,
    start: usize,
    max_hops: u32,
) -> HashMap<usize, u32> {
    let mut distances = HashMap::new();
    let mut queue = VecDeque::new();

    distances.insert(start, 0);
    queue.push_back((start, 0u32));

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_hops {
            continue;
        }
        for &neighbor in ctx.neighbors(node) {
            if !distances.contains_key(&neighbor) {
                distances.insert(neighbor, depth + 1);
                queue.push_back((neighbor, depth + 1));
            }
        }
    }

    distances
}

/// Distance from `start` to the closest *other* node matching `is_target`,
/// if one exists within `max_hops`.
pub fn distance_to_nearest<F>(
    ctx: &AnalysisContext,
    start: usize,
    max_hops: u32,
    is_target: F,
) -> Option<u32>
where
    F: Fn(usize) -> bool,
{
    let mut visited = vec![false; ctx.node_count()];
    let mut queue = VecDeque::new();

    visited[start] = true;
    queue.push_back((start, 0u32));

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_hops {
            continue;
        }
        for &neighbor in ctx.neighbors(node) {
            if visited[neighbor] {
                continue;
            }
            if is_target(neighbor) {
                return Some(depth + 1);
            }
            visited[neighbor] = true;
            queue.push_back((neighbor, depth + 1));
        }
    }

    None
}

/// Explore the neighborhood of `start` with an explicit worklist of
/// `(node, depth)` pairs. Returns every node within `max_depth` hops with its
/// minimum depth, ordered by (depth, node index).
pub fn explore_cluster(ctx: &AnalysisContext, start: usize, max_depth: u32) -> Vec<(usize, u32)> {
    let mut best: HashMap<usize, u32> = HashMap::new();
    let mut stack = vec![(start, 0u32)];

    while let Some((node, depth)) = stack.pop() {
        if best.get(&node).is_some_and(|&seen| seen <= depth) {
            continue;
        }
        best.insert(node, depth);
        if depth == max_depth {
            continue;
        }
        for &neighbor in ctx.neighbors(node) {
            if best.get(&neighbor).map_or(true, |&seen| seen > depth + 1) {
                stack.push((neighbor, depth + 1));
            }
        }
    }

    let mut members: Vec<(usize, u32)> = best.into_iter().collect();
    members.sort_by_key(|&(node, depth)| (depth, node));
    members
}
