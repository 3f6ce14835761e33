//! Class hierarchy as a directed graph (subtype → supertype)

use super::ClassId;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;

#[derive(Debug, Default)]
pub struct TypeHierarchy {
    graph: DiGraph<ClassId, ()>,
}

impl TypeHierarchy {
    /// One node per class; node `i` is `ClassId(i)`
    pub fn new(class_count: usize) -> Self {
        let mut graph = DiGraph::with_capacity(class_count, class_count);
        for i in 0..class_count {
            graph.add_node(ClassId(i));
        }
        Self { graph }
    }

    pub fn add_supertype(&mut self, sub: ClassId, sup: ClassId) {
        if sub != sup {
            self.graph
                .update_edge(NodeIndex::new(sub.0), NodeIndex::new(sup.0), ());
        }
    }

    /// Whether `sub` is `sup` or a transitive subtype of it
    pub fn inherits_from(&self, sub: ClassId, sup: ClassId) -> bool {
        if sub == sup {
            return true;
        }
        if sub.0 >= self.graph.node_count() || sup.0 >= self.graph.node_count() {
            return false;
        }
        has_path_connecting(
            &self.graph,
            NodeIndex::new(sub.0),
            NodeIndex::new(sup.0),
            None,
        )
    }

    /// Direct supertypes
    pub fn supertypes(&self, class: ClassId) -> Vec<ClassId> {
        if class.0 >= self.graph.node_count() {
            return Vec::new();
        }
        let mut out: Vec<ClassId> = self
            .graph
            .neighbors(NodeIndex::new(class.0))
            .map(|n| self.graph[n])
            .collect();
        out.sort();
        out
    }

    /// All transitive supertypes in breadth-first order, nearest first
    pub fn all_supertypes(&self, class: ClassId) -> Vec<ClassId> {
        if class.0 >= self.graph.node_count() {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut bfs = Bfs::new(&self.graph, NodeIndex::new(class.0));
        while let Some(node) = bfs.next(&self.graph) {
            if node.index() != class.0 {
                out.push(self.graph[node]);
            }
        }
        out
    }
}
