//! Graph model and structural validation

use std::collections::HashMap;

use crate::crd::{AstroSpec, AstroStar};
use crate::error::GraphError;

/// A validated, immutable view of the stars declared in a spec.
///
/// Dependency and dependent lists are index-based and resolved once at
/// build time so the scheduler can walk them without name lookups.
#[derive(Debug)]
pub struct Graph<'a> {
    stars: Vec<&'a AstroStar>,
    index: HashMap<&'a str, usize>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl<'a> Graph<'a> {
    /// Build and validate the graph for a spec.
    ///
    /// Names are indexed first, then dependencies are linked; dangling or
    /// duplicate names fail before the cycle check runs.
    pub fn build(spec: &'a AstroSpec) -> Result<Self, GraphError> {
        let mut index = HashMap::with_capacity(spec.stars.len());
        for (i, star) in spec.stars.iter().enumerate() {
            if index.insert(star.name.as_str(), i).is_some() {
                return Err(GraphError::DuplicateName {
                    name: star.name.clone(),
                });
            }
        }

        let mut dependencies = vec![Vec::new(); spec.stars.len()];
        let mut dependents = vec![Vec::new(); spec.stars.len()];
        for (i, star) in spec.stars.iter().enumerate() {
            for dep in &star.dependencies {
                let Some(&j) = index.get(dep.as_str()) else {
                    return Err(GraphError::UnknownDependency {
                        star: star.name.clone(),
                        dependency: dep.clone(),
                    });
                };
                if !dependencies[i].contains(&j) {
                    dependencies[i].push(j);
                    dependents[j].push(i);
                }
            }
        }

        let graph = Self {
            stars: spec.stars.iter().collect(),
            index,
            dependencies,
            dependents,
        };
        graph.validate()?;
        Ok(graph)
    }

    /// Check that the dependency relation is acyclic.
    ///
    /// Roots and edges are visited in declaration order so the reported
    /// cycle is the same on every run for the same input.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut marks = vec![Mark::Unvisited; self.stars.len()];
        // (node, next dependency to visit)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..self.stars.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::InProgress;
            stack.push((root, 0));

            while let Some(top) = stack.last_mut() {
                let node = top.0;
                let Some(&dep) = self.dependencies[node].get(top.1) else {
                    marks[node] = Mark::Done;
                    stack.pop();
                    continue;
                };
                top.1 += 1;

                match marks[dep] {
                    Mark::Unvisited => {
                        marks[dep] = Mark::InProgress;
                        stack.push((dep, 0));
                    }
                    Mark::InProgress => {
                        let start = stack
                            .iter()
                            .position(|&(n, _)| n == dep)
                            .unwrap_or_default();
                        let mut path: Vec<String> = stack[start..]
                            .iter()
                            .map(|&(n, _)| self.stars[n].name.clone())
                            .collect();
                        path.push(self.stars[dep].name.clone());
                        return Err(GraphError::Cycle { path });
                    }
                    Mark::Done => {}
                }
            }
        }

        Ok(())
    }

    /// Stars in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = &'a AstroStar> + '_ {
        self.stars.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&'a AstroStar> {
        self.index.get(name).map(|&i| self.stars[i])
    }

    /// Direct dependencies of a star, in declaration order
    pub fn dependencies_of(&self, name: &str) -> Vec<&'a str> {
        self.resolve(name, &self.dependencies)
    }

    /// Stars that directly depend on the given star
    pub fn dependents_of(&self, name: &str) -> Vec<&'a str> {
        self.resolve(name, &self.dependents)
    }

    fn resolve(&self, name: &str, edges: &[Vec<usize>]) -> Vec<&'a str> {
        self.index
            .get(name)
            .map(|&i| {
                edges[i]
                    .iter()
                    .map(|&j| self.stars[j].name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(stars: &[(&str, &[&str])]) -> AstroSpec {
        AstroSpec {
            stars: stars
                .iter()
                .map(|(name, deps)| AstroStar {
                    name: name.to_string(),
                    star_type: "docker".to_string(),
                    dependencies: deps.iter().map(|d| d.to_string()).collect(),
                    image: "busybox".to_string(),
                    port: 80,
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn test_build_valid_graph() {
        let spec = spec(&[("A", &[]), ("B", &["A"]), ("C", &["A"]), ("D", &["B", "C"])]);
        let graph = Graph::build(&spec).unwrap();

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.dependencies_of("D"), vec!["B", "C"]);
        assert_eq!(graph.dependents_of("A"), vec!["B", "C"]);
        assert!(graph.dependents_of("D").is_empty());
        assert!(graph.dependencies_of("missing").is_empty());
        let names: Vec<_> = graph.nodes().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_empty_spec() {
        let spec = AstroSpec::default();
        let graph = Graph::build(&spec).unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn test_duplicate_name_reports_first() {
        let spec = spec(&[("A", &[]), ("B", &[]), ("B", &[]), ("A", &[])]);
        assert_eq!(
            Graph::build(&spec).unwrap_err(),
            GraphError::DuplicateName { name: "B".into() }
        );
    }

    #[test]
    fn test_unknown_dependency() {
        let spec = spec(&[("A", &[]), ("B", &["C"])]);
        assert_eq!(
            Graph::build(&spec).unwrap_err(),
            GraphError::UnknownDependency {
                star: "B".into(),
                dependency: "C".into()
            }
        );
    }

    #[test]
    fn test_two_node_cycle() {
        let spec = spec(&[("A", &["B"]), ("B", &["A"])]);
        assert_eq!(
            Graph::build(&spec).unwrap_err(),
            GraphError::Cycle {
                path: vec!["A".into(), "B".into(), "A".into()]
            }
        );
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let spec = spec(&[("A", &["A"])]);
        assert_eq!(
            Graph::build(&spec).unwrap_err(),
            GraphError::Cycle {
                path: vec!["A".into(), "A".into()]
            }
        );
    }

    #[test]
    fn test_cycle_path_excludes_entry_prefix() {
        let spec = spec(&[("X", &["A"]), ("A", &["B"]), ("B", &["C"]), ("C", &["A"])]);
        assert_eq!(
            Graph::build(&spec).unwrap_err(),
            GraphError::Cycle {
                path: vec!["A".into(), "B".into(), "C".into(), "A".into()]
            }
        );
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let spec = spec(&[("D", &["B", "C"]), ("B", &["A"]), ("C", &["A"]), ("A", &[])]);
        assert!(Graph::build(&spec).is_ok());
    }

    #[test]
    fn test_duplicate_dependency_entries_collapse() {
        let spec = spec(&[("A", &[]), ("B", &["A", "A"])]);
        let graph = Graph::build(&spec).unwrap();
        assert_eq!(graph.dependencies_of("B"), vec!["A"]);
        assert_eq!(graph.dependents_of("A"), vec!["B"]);
    }
}
