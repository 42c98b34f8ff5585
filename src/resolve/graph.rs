// src/resolve/graph.rs

use std::collections::HashMap;
use std::fmt;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

/// Import graph recorded during one resolution.
///
/// Nodes are package ids, edges point from importer to imported. Platform
/// packages never appear here.
#[derive(Debug, Clone, Default)]
pub struct ImportGraph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl ImportGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_package(&mut self, id: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(id) {
            return *idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.index.insert(id.to_string(), idx);
        idx
    }

    pub fn add_import(&mut self, from: &str, to: &str) {
        let a = self.add_package(from);
        let b = self.add_package(to);
        self.graph.update_edge(a, b, ());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn package_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn import_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Direct imports of `id`, sorted.
    pub fn imports_of(&self, id: &str) -> Vec<&str> {
        let Some(idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .graph
            .neighbors_directed(*idx, Direction::Outgoing)
            .map(|n| self.graph[n].as_str())
            .collect();
        out.sort_unstable();
        out
    }

    /// Packages ordered so that every package comes after the ones it
    /// imports. `None` if the graph has a cycle, which a completed
    /// resolution never records.
    pub fn build_order(&self) -> Option<Vec<&str>> {
        let mut order = toposort(&self.graph, None).ok()?;
        order.reverse();
        Some(order.into_iter().map(|n| self.graph[n].as_str()).collect())
    }
}

/// One line per package, leaves first: `core -> util`.
impl fmt::Display for ImportGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = self
            .build_order()
            .unwrap_or_else(|| self.graph.node_weights().map(String::as_str).collect());
        for (i, id) in order.into_iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let imports = self.imports_of(id);
            if imports.is_empty() {
                write!(f, "{id}")?;
            } else {
                write!(f, "{id} -> {}", imports.join(", "))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_order_puts_leaves_first() {
        let mut g = ImportGraph::new();
        g.add_import("app", "core");
        g.add_import("app", "util");
        g.add_import("core", "util");
        g.add_import("core", "util");

        assert_eq!(g.package_count(), 3);
        assert_eq!(g.import_count(), 3);
        assert_eq!(g.imports_of("app"), vec!["core", "util"]);
        assert_eq!(g.build_order().unwrap(), vec!["util", "core", "app"]);
    }

    #[test]
    fn display_lists_imports_leaves_first() {
        let mut g = ImportGraph::new();
        g.add_import("app", "core");
        g.add_import("app", "util");
        g.add_import("core", "util");
        assert_eq!(g.to_string(), "util\ncore -> util\napp -> core, util");
    }

    #[test]
    fn cyclic_graph_has_no_build_order() {
        let mut g = ImportGraph::new();
        g.add_import("a", "b");
        g.add_import("b", "a");
        assert!(g.build_order().is_none());
    }
}
