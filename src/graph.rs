//! Dependency graph module.
//!
//! Provides the `StatGraph` type, which represents stat dependencies as a
//! directed acyclic graph (DAG). Used by the dependency manager to decide
//! the order in which derived stats are recomputed.

use crate::error::SimError;
use crate::stat::Stat;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// A directed acyclic graph of stat dependencies.
///
/// Nodes are `Stat`s; if stat A is derived from stat B then B must be
/// recomputed before A.
///
/// # Examples
///
/// ```rust
/// use simkernel::graph::StatGraph;
/// use simkernel::Stat;
///
/// let mut graph = StatGraph::new();
///
/// // Attack power is derived from strength
/// graph.add_edge(Stat::AttackPower, Stat::Strength);
///
/// let order = graph.topological_sort().unwrap();
/// let str_pos = order.iter().position(|s| *s == Stat::Strength).unwrap();
/// let ap_pos = order.iter().position(|s| *s == Stat::AttackPower).unwrap();
/// assert!(str_pos < ap_pos);
/// ```
#[derive(Debug, Clone)]
pub struct StatGraph {
    graph: DiGraph<Stat, ()>,
    node_map: HashMap<Stat, NodeIndex>,
}

impl StatGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Create a graph holding every stat as an isolated node, in slot order.
    ///
    /// Seeding all nodes up front keeps the topological order stable no
    /// matter in which order dependencies are registered.
    pub fn with_all_stats() -> Self {
        let mut graph = Self::new();
        for &stat in Stat::ALL {
            graph.add_node(stat);
        }
        graph
    }

    /// Add a node to the graph if it doesn't exist.
    ///
    /// # Returns
    ///
    /// The node index for this stat.
    pub fn add_node(&mut self, stat: Stat) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(&stat) {
            idx
        } else {
            let idx = self.graph.add_node(stat);
            self.node_map.insert(stat, idx);
            idx
        }
    }

    /// Add an edge representing a dependency.
    ///
    /// `from` depends on `to` (`to` must be computed before `from`).
    /// Both nodes are added to the graph if they don't exist.
    ///
    /// # Arguments
    ///
    /// * `from` - The derived stat
    /// * `to` - The stat it is derived from
    pub fn add_edge(&mut self, from: Stat, to: Stat) {
        let from_idx = self.add_node(from);
        let to_idx = self.add_node(to);
        if self.graph.find_edge(to_idx, from_idx).is_none() {
            self.graph.add_edge(to_idx, from_idx, ());
        }
    }

    /// Detect cycles in the graph.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if no cycles are detected
    /// * `Err(SimError::DependencyCycle)` with the cycle path if one is found
    ///
    /// # Examples
    ///
    /// ```rust
    /// use simkernel::graph::StatGraph;
    /// use simkernel::Stat;
    ///
    /// let mut graph = StatGraph::new();
    /// graph.add_edge(Stat::SpellPower, Stat::Intellect);
    /// assert!(graph.detect_cycles().is_ok());
    ///
    /// graph.add_edge(Stat::Intellect, Stat::SpellPower);
    /// assert!(graph.detect_cycles().is_err());
    /// ```
    pub fn detect_cycles(&self) -> Result<(), SimError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        for node_idx in self.graph.node_indices() {
            if !visited.contains(&node_idx) {
                let mut cycle_path = Vec::new();
                if let Some(cycle) =
                    self.dfs_cycle_detect(node_idx, &mut visited, &mut rec_stack, &mut cycle_path)
                {
                    return Err(cycle);
                }
            }
        }

        Ok(())
    }

    fn dfs_cycle_detect(
        &self,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        rec_stack: &mut HashSet<NodeIndex>,
        cycle_path: &mut Vec<Stat>,
    ) -> Option<SimError> {
        visited.insert(node);
        rec_stack.insert(node);
        cycle_path.push(self.graph[node]);

        for neighbor in self
            .graph
            .neighbors_directed(node, petgraph::Direction::Outgoing)
        {
            if !visited.contains(&neighbor) {
                if let Some(cycle) = self.dfs_cycle_detect(neighbor, visited, rec_stack, cycle_path)
                {
                    return Some(cycle);
                }
            } else if rec_stack.contains(&neighbor) {
                let neighbor_stat = self.graph[neighbor];
                let start = cycle_path
                    .iter()
                    .position(|stat| *stat == neighbor_stat)
                    .unwrap_or(0);
                let mut path = cycle_path[start..].to_vec();
                path.push(neighbor_stat);
                return Some(SimError::DependencyCycle { path });
            }
        }

        rec_stack.remove(&node);
        cycle_path.pop();
        None
    }

    /// Get a topological order of all nodes.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Stat>)` with sources before the stats derived from them
    /// * `Err(SimError::DependencyCycle)` if the graph is cyclic
    pub fn topological_sort(&self) -> Result<Vec<Stat>, SimError> {
        self.detect_cycles()?;

        match toposort(&self.graph, None) {
            Ok(indices) => Ok(indices.into_iter().map(|idx| self.graph[idx]).collect()),
            Err(cycle) => Err(SimError::DependencyCycle {
                path: vec![self.graph[cycle.node_id()]],
            }),
        }
    }

    /// Stats this stat is directly derived from.
    pub fn sources_of(&self, stat: Stat) -> Vec<Stat> {
        match self.node_map.get(&stat) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, petgraph::Direction::Incoming)
                .map(|n| self.graph[n])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Check whether a stat has a node in the graph.
    pub fn contains_node(&self, stat: Stat) -> bool {
        self.node_map.contains_key(&stat)
    }

    /// Number of dependency edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

impl Default for StatGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_dependency() {
        let mut graph = StatGraph::new();
        graph.add_edge(Stat::AttackPower, Stat::Strength);

        let order = graph.topological_sort().unwrap();
        assert_eq!(order, vec![Stat::Strength, Stat::AttackPower]);
    }

    #[test]
    fn test_cycle_detection() {
        let mut graph = StatGraph::new();
        graph.add_edge(Stat::SpellPower, Stat::Intellect);
        graph.add_edge(Stat::Intellect, Stat::Spirit);
        graph.add_edge(Stat::Spirit, Stat::SpellPower);

        match graph.detect_cycles() {
            Err(SimError::DependencyCycle { path }) => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_diamond_order() {
        let mut graph = StatGraph::with_all_stats();
        graph.add_edge(Stat::AttackPower, Stat::Strength);
        graph.add_edge(Stat::AttackPower, Stat::Agility);
        graph.add_edge(Stat::MeleeCrit, Stat::Agility);
        graph.add_edge(Stat::BlockValue, Stat::AttackPower);

        let order = graph.topological_sort().unwrap();
        assert_eq!(order.len(), Stat::ALL.len());
        let pos = |s: Stat| order.iter().position(|x| *x == s).unwrap();
        assert!(pos(Stat::Strength) < pos(Stat::AttackPower));
        assert!(pos(Stat::Agility) < pos(Stat::AttackPower));
        assert!(pos(Stat::Agility) < pos(Stat::MeleeCrit));
        assert!(pos(Stat::AttackPower) < pos(Stat::BlockValue));
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let mut graph = StatGraph::new();
        graph.add_edge(Stat::AttackPower, Stat::Strength);
        graph.add_edge(Stat::AttackPower, Stat::Strength);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.sources_of(Stat::AttackPower), vec![Stat::Strength]);
        assert!(graph.contains_node(Stat::Strength));
        assert!(!graph.contains_node(Stat::Spirit));
    }
}
