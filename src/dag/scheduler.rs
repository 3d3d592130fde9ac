//! Ready-frontier scheduling over a star graph
//!
//! Node states are observed from the outside world on every pass, so the
//! frontier is recomputed each time rather than advanced incrementally.

use std::collections::{BTreeSet, HashMap, VecDeque};

use super::Graph;

/// Runtime state of a single star
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeState {
    /// No workload has been created yet
    #[default]
    Pending,
    /// Workload created, not yet observed ready
    Launched,
    /// Workload observed ready
    Ready,
    /// Launch or readiness failed permanently
    Failed,
}

/// Observed state per star name. Missing entries are `Pending`.
pub type NodeStates = HashMap<String, NodeState>;

fn state_of(states: &NodeStates, name: &str) -> NodeState {
    states.get(name).copied().unwrap_or_default()
}

/// All stars that may be launched now, in declaration order.
///
/// A star qualifies when it is still pending and every dependency is ready.
pub fn next_batch<'a>(graph: &Graph<'a>, states: &NodeStates) -> Vec<&'a str> {
    graph
        .nodes()
        .filter(|star| state_of(states, &star.name) == NodeState::Pending)
        .filter(|star| {
            graph
                .dependencies_of(&star.name)
                .iter()
                .all(|dep| state_of(states, dep) == NodeState::Ready)
        })
        .map(|star| star.name.as_str())
        .collect()
}

/// Stars that can never launch because a transitive dependency failed
pub fn blocked_by_failure<'a>(graph: &Graph<'a>, states: &NodeStates) -> BTreeSet<&'a str> {
    let mut queue: VecDeque<&'a str> = graph
        .nodes()
        .filter(|star| state_of(states, &star.name) == NodeState::Failed)
        .map(|star| star.name.as_str())
        .collect();

    let mut blocked = BTreeSet::new();
    while let Some(name) = queue.pop_front() {
        for dependent in graph.dependents_of(name) {
            if state_of(states, dependent) == NodeState::Pending && blocked.insert(dependent) {
                queue.push_back(dependent);
            }
        }
    }
    blocked
}

/// Whether any star is still in flight or could still be launched
pub fn has_forward_progress(graph: &Graph<'_>, states: &NodeStates) -> bool {
    graph
        .nodes()
        .any(|star| state_of(states, &star.name) == NodeState::Launched)
        || !next_batch(graph, states).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{AstroSpec, AstroStar};

    fn spec(stars: &[(&str, &[&str])]) -> AstroSpec {
        AstroSpec {
            stars: stars
                .iter()
                .map(|(name, deps)| AstroStar {
                    name: name.to_string(),
                    star_type: "docker".to_string(),
                    dependencies: deps.iter().map(|d| d.to_string()).collect(),
                    ..Default::default()
                })
                .collect(),
        }
    }

    fn states(entries: &[(&str, NodeState)]) -> NodeStates {
        entries
            .iter()
            .map(|(name, state)| (name.to_string(), *state))
            .collect()
    }

    #[test]
    fn test_roots_launch_together() {
        let spec = spec(&[("A", &[]), ("B", &[]), ("C", &["A", "B"])]);
        let graph = Graph::build(&spec).unwrap();

        assert_eq!(next_batch(&graph, &NodeStates::new()), vec!["A", "B"]);
    }

    #[test]
    fn test_dependent_waits_for_ready() {
        let spec = spec(&[("A", &[]), ("B", &["A"])]);
        let graph = Graph::build(&spec).unwrap();

        let launched = states(&[("A", NodeState::Launched)]);
        assert!(next_batch(&graph, &launched).is_empty());

        let ready = states(&[("A", NodeState::Ready)]);
        assert_eq!(next_batch(&graph, &ready), vec!["B"]);
    }

    #[test]
    fn test_launched_star_is_never_rescheduled() {
        let spec = spec(&[("A", &[]), ("B", &[])]);
        let graph = Graph::build(&spec).unwrap();

        let current = states(&[("A", NodeState::Launched), ("B", NodeState::Ready)]);
        assert!(next_batch(&graph, &current).is_empty());
    }

    #[test]
    fn test_partial_readiness_of_dependencies() {
        let spec = spec(&[("A", &[]), ("B", &[]), ("C", &["A", "B"])]);
        let graph = Graph::build(&spec).unwrap();

        let current = states(&[("A", NodeState::Ready), ("B", NodeState::Launched)]);
        assert!(next_batch(&graph, &current).is_empty());
    }

    #[test]
    fn test_failure_blocks_transitive_dependents() {
        let spec = spec(&[
            ("A", &[]),
            ("B", &["A"]),
            ("C", &["B"]),
            ("D", &[]),
        ]);
        let graph = Graph::build(&spec).unwrap();

        let current = states(&[("A", NodeState::Failed), ("D", NodeState::Launched)]);
        assert!(next_batch(&graph, &current).is_empty());
        assert_eq!(
            blocked_by_failure(&graph, &current),
            BTreeSet::from(["B", "C"])
        );
        assert!(has_forward_progress(&graph, &current));

        let settled = states(&[("A", NodeState::Failed), ("D", NodeState::Ready)]);
        assert!(!has_forward_progress(&graph, &settled));
    }
}
