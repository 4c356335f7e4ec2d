//! Dependency graph between registered configurations.
//!
//! Edges point from dependent to dependency: if A has a parameter holding
//! the key of B, the edge is `A -> B`. The registry builds one graph per
//! resolution call and checks it before anything is built.
//!
//! # Example
//!
//! ```
//! use tessera_core::{DependencyGraph, RegistrationKey};
//!
//! let a: RegistrationKey = "name:a--namespace:demo".parse().unwrap();
//! let b: RegistrationKey = "name:b--namespace:demo".parse().unwrap();
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_edge(&a, &b);
//!
//! graph.check_acyclic().unwrap();
//! assert_eq!(graph.topological_order(&a), vec![b.clone(), a.clone()]);
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::{Error, Result};
use crate::key::RegistrationKey;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<RegistrationKey>,
    /// Adjacency list: key depends on each value.
    edges: BTreeMap<RegistrationKey, BTreeSet<RegistrationKey>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, key: &RegistrationKey) {
        self.nodes.insert(key.clone());
        self.edges.entry(key.clone()).or_default();
    }

    /// Declare that `from` depends on `to`. Missing nodes are added.
    pub fn add_edge(&mut self, from: &RegistrationKey, to: &RegistrationKey) {
        self.add_node(from);
        self.add_node(to);
        if let Some(deps) = self.edges.get_mut(from) {
            deps.insert(to.clone());
        }
    }

    pub fn contains(&self, key: &RegistrationKey) -> bool {
        self.nodes.contains(key)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &RegistrationKey> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Direct dependencies of a node, sorted.
    pub fn dependencies_of(&self, key: &RegistrationKey) -> Vec<&RegistrationKey> {
        self.edges
            .get(key)
            .map(|deps| deps.iter().collect())
            .unwrap_or_default()
    }

    /// Nodes that depend directly on `key`, sorted.
    pub fn dependents_of(&self, key: &RegistrationKey) -> Vec<&RegistrationKey> {
        self.edges
            .iter()
            .filter(|(_, deps)| deps.contains(key))
            .map(|(from, _)| from)
            .collect()
    }

    /// Every `(from, to)` edge, sorted.
    pub fn edges(&self) -> Vec<(&RegistrationKey, &RegistrationKey)> {
        self.edges
            .iter()
            .flat_map(|(from, deps)| deps.iter().map(move |to| (from, to)))
            .collect()
    }

    /// Depth-first cycle detection with an on-stack marker per node.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotADag` listing the edges of the first cycle found,
    /// in traversal order.
    pub fn check_acyclic(&self) -> Result<()> {
        let mut visited: BTreeSet<&RegistrationKey> = BTreeSet::new();
        let mut stack: Vec<&RegistrationKey> = Vec::new();
        for node in &self.nodes {
            if !visited.contains(node) {
                if let Some(cycle) = self.find_cycle(node, &mut visited, &mut stack) {
                    return Err(Error::NotADag { edges: cycle });
                }
            }
        }
        Ok(())
    }

    fn find_cycle<'a>(
        &'a self,
        node: &'a RegistrationKey,
        visited: &mut BTreeSet<&'a RegistrationKey>,
        stack: &mut Vec<&'a RegistrationKey>,
    ) -> Option<Vec<(RegistrationKey, RegistrationKey)>> {
        visited.insert(node);
        stack.push(node);
        for dep in self.dependencies_of(node) {
            if let Some(start) = stack.iter().position(|k| *k == dep) {
                let mut cycle: Vec<(RegistrationKey, RegistrationKey)> = stack[start..]
                    .windows(2)
                    .map(|pair| (pair[0].clone(), pair[1].clone()))
                    .collect();
                cycle.push((node.clone(), dep.clone()));
                return Some(cycle);
            }
            if !visited.contains(dep) {
                if let Some(cycle) = self.find_cycle(dep, visited, stack) {
                    return Some(cycle);
                }
            }
        }
        stack.pop();
        None
    }

    /// Check that every node is reachable from `root`, ignoring edge
    /// direction.
    ///
    /// # Errors
    ///
    /// Returns `Error::DisconnectedGraph` with the unreachable nodes.
    pub fn check_connected(&self, root: &RegistrationKey) -> Result<()> {
        let mut reached: BTreeSet<&RegistrationKey> = BTreeSet::new();
        let mut queue: VecDeque<&RegistrationKey> = VecDeque::new();
        if let Some(start) = self.nodes.get(root) {
            reached.insert(start);
            queue.push_back(start);
        }
        while let Some(current) = queue.pop_front() {
            let neighbours = self
                .dependencies_of(current)
                .into_iter()
                .chain(self.dependents_of(current));
            for next in neighbours {
                if reached.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        let unreachable: Vec<RegistrationKey> = self
            .nodes
            .iter()
            .filter(|node| !reached.contains(node))
            .cloned()
            .collect();
        if unreachable.is_empty() {
            Ok(())
        } else {
            Err(Error::DisconnectedGraph {
                root: root.clone(),
                nodes: unreachable,
            })
        }
    }

    /// Post-order walk from `root`: every dependency before its dependents,
    /// children visited in sorted order, each node once.
    pub fn topological_order(&self, root: &RegistrationKey) -> Vec<RegistrationKey> {
        let mut visited: BTreeSet<&RegistrationKey> = BTreeSet::new();
        let mut order = Vec::with_capacity(self.nodes.len());
        if let Some(start) = self.nodes.get(root) {
            self.post_order(start, &mut visited, &mut order);
        }
        order
    }

    /// Post-order walk over every node, roots taken in sorted order.
    pub fn topological_sort(&self) -> Vec<RegistrationKey> {
        let mut visited: BTreeSet<&RegistrationKey> = BTreeSet::new();
        let mut order = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            self.post_order(node, &mut visited, &mut order);
        }
        order
    }

    fn post_order<'a>(
        &'a self,
        node: &'a RegistrationKey,
        visited: &mut BTreeSet<&'a RegistrationKey>,
        order: &mut Vec<RegistrationKey>,
    ) {
        if !visited.insert(node) {
            return;
        }
        for dep in self.dependencies_of(node) {
            self.post_order(dep, visited, order);
        }
        order.push(node.clone());
    }
}
