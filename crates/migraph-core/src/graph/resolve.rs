//! Deterministic depth-first ordering with cycle detection.
//!
//! The traversal keeps an explicit stack of frames instead of recursing, so
//! deep histories cannot overflow the call stack and the active path is
//! always available for cycle reporting.

use std::collections::HashSet;
use std::hash::Hash;

/// Why a traversal stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalError<T> {
    /// A node reappeared on the active path.
    ///
    /// Holds the path from the first occurrence of the repeated node, in
    /// visitation order, followed by the repeated node again.
    Cycle(Vec<T>),
    /// More than `limit` distinct nodes were reached.
    TooLarge {
        /// The ceiling that was exceeded.
        limit: usize,
    },
}

struct Frame<T> {
    node: T,
    /// Children still to explore, popped from the back.
    pending: Vec<T>,
}

/// Which end of the sorted children a frame explores first.
#[derive(Clone, Copy)]
enum Order {
    Ascending,
    Descending,
}

/// Order `target` and everything reachable from it through `children`.
///
/// Every node appears after all of its children, and each node appears once:
/// the first time it is fully explored fixes its position. Children are
/// sorted ascending by `key` and explored from the largest key down, which
/// makes the result independent of the order `children` returns them in.
///
/// A reported cycle is the first one met when children are explored from
/// the smallest key up.
///
/// `limit` caps the number of distinct nodes the traversal may reach.
pub fn resolve<T, K, C, F>(
    target: &T,
    mut children: C,
    mut key: F,
    limit: Option<usize>,
) -> Result<Vec<T>, TraversalError<T>>
where
    T: Clone + Eq + Hash,
    K: Ord,
    C: FnMut(&T) -> Vec<T>,
    F: FnMut(&T) -> K,
{
    let mut done: HashSet<T> = HashSet::new();
    let mut on_path: HashSet<T> = HashSet::new();
    let mut order = Vec::new();
    let mut reached = 1usize;

    check_limit(reached, limit)?;
    let mut stack = vec![open_frame(target.clone(), &mut children, &mut key, Order::Descending)];
    on_path.insert(target.clone());

    while let Some(frame) = stack.last_mut() {
        match frame.pending.pop() {
            Some(child) => {
                if done.contains(&child) {
                    continue;
                }
                if on_path.contains(&child) {
                    let cycle = first_cycle(target, &mut children, &mut key, limit)
                        .unwrap_or_else(|| cycle_from(&stack, child));
                    return Err(TraversalError::Cycle(cycle));
                }
                reached += 1;
                check_limit(reached, limit)?;
                on_path.insert(child.clone());
                let next = open_frame(child, &mut children, &mut key, Order::Descending);
                stack.push(next);
            }
            None => {
                if let Some(finished) = stack.pop() {
                    on_path.remove(&finished.node);
                    done.insert(finished.node.clone());
                    order.push(finished.node);
                }
            }
        }
    }

    Ok(order)
}

/// The first cycle met exploring children from the smallest key up.
///
/// A node fully explored without meeting its own path lies on no cycle, so
/// skipping it later cannot hide an earlier cycle. Returns None when the
/// walk reaches more than `limit` nodes.
fn first_cycle<T, K, C, F>(
    target: &T,
    children: &mut C,
    key: &mut F,
    limit: Option<usize>,
) -> Option<Vec<T>>
where
    T: Clone + Eq + Hash,
    K: Ord,
    C: FnMut(&T) -> Vec<T>,
    F: FnMut(&T) -> K,
{
    let mut done: HashSet<T> = HashSet::new();
    let mut on_path: HashSet<T> = HashSet::new();
    let mut reached = 1usize;

    let mut stack = vec![open_frame(target.clone(), children, key, Order::Ascending)];
    on_path.insert(target.clone());

    while let Some(frame) = stack.last_mut() {
        match frame.pending.pop() {
            Some(child) => {
                if done.contains(&child) {
                    continue;
                }
                if on_path.contains(&child) {
                    return Some(cycle_from(&stack, child));
                }
                reached += 1;
                if check_limit::<T>(reached, limit).is_err() {
                    return None;
                }
                on_path.insert(child.clone());
                let next = open_frame(child, children, key, Order::Ascending);
                stack.push(next);
            }
            None => {
                if let Some(finished) = stack.pop() {
                    on_path.remove(&finished.node);
                    done.insert(finished.node);
                }
            }
        }
    }

    None
}

fn open_frame<T, K, C, F>(node: T, children: &mut C, key: &mut F, order: Order) -> Frame<T>
where
    K: Ord,
    C: FnMut(&T) -> Vec<T>,
    F: FnMut(&T) -> K,
{
    let mut pending = children(&node);
    pending.sort_by_key(|child| key(child));
    if let Order::Ascending = order {
        pending.reverse();
    }
    Frame { node, pending }
}

fn cycle_from<T: Clone + Eq>(stack: &[Frame<T>], repeated: T) -> Vec<T> {
    let start = stack
        .iter()
        .position(|frame| frame.node == repeated)
        .unwrap_or(0);
    let mut cycle: Vec<T> = stack[start..].iter().map(|f| f.node.clone()).collect();
    cycle.push(repeated);
    cycle
}

fn check_limit<T>(reached: usize, limit: Option<usize>) -> Result<(), TraversalError<T>> {
    match limit {
        Some(limit) if reached > limit => Err(TraversalError::TooLarge { limit }),
        _ => Ok(()),
    }
}
