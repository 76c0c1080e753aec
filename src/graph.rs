//! Straight skeleton graph as reported by the worker.

use crate::geometry::Point;
use std::collections::HashMap;

/// Integer node id as it appears on the wire. Not necessarily contiguous.
pub type NodeId = i64;

/// A skeleton vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub position: Point,
    /// Distance to the nearest input segment. Negative for vertices that lie
    /// outside the polygon they were computed for.
    pub radius: f64,
}

impl Node {
    pub fn is_exterior(&self) -> bool {
        self.radius < 0.0
    }
}

/// Undirected multigraph of skeleton nodes.
///
/// Nodes iterate in first-declaration order. Re-declaring an id overwrites the
/// node's data in place. Edges keep insertion order and multiplicity;
/// self-loops are allowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletonGraph {
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
    edges: Vec<(NodeId, NodeId)>,
}

impl SkeletonGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, or overwrite the one already holding `id`.
    pub fn add_node(&mut self, id: NodeId, position: Point, radius: f64) {
        let node = Node {
            id,
            position,
            radius,
        };
        match self.index.get(&id) {
            Some(&slot) => self.nodes[slot] = node,
            None => {
                self.index.insert(id, self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    /// Add an edge between two declared nodes.
    ///
    /// Returns the first endpoint that is not declared, leaving the graph
    /// unchanged.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId) -> Result<(), NodeId> {
        if let Some(missing) = [a, b].into_iter().find(|&id| !self.contains_node(id)) {
            return Err(missing);
        }
        self.edges.push((a, b));
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).map(|&slot| &self.nodes[slot])
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[(NodeId, NodeId)] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Ids adjacent to `id`, once per incident edge (a self-loop yields `id` twice).
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for &(a, b) in &self.edges {
            if a == id {
                out.push(b);
            }
            if b == id {
                out.push(a);
            }
        }
        out
    }

    /// Edges whose endpoints both lie strictly inside the input.
    pub fn interior_edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.edges.iter().copied().filter(move |&(a, b)| {
            let inside = |id| self.node(id).is_some_and(|n| n.radius > 0.0);
            inside(a) && inside(b)
        })
    }

    /// Largest radius over all nodes, if any.
    pub fn max_radius(&self) -> Option<f64> {
        self.nodes.iter().map(|n| n.radius).reduce(f64::max)
    }
}
