use crate::model::{Record, RecordType};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{EdgeRef, VisitMap, Visitable};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Graph slot. A slot without a record stands for an id that has only been
/// referenced by a link so far.
#[derive(Debug, Clone)]
struct Slot {
    id: String,
    record: Option<Record>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportNode {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportLink {
    pub source: String,
    pub target: String,
    pub value: u32,
}

/// Node/link document handed to a renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<ExportNode>,
    pub links: Vec<ExportLink>,
}

/// Directed parent -> child hierarchy.
///
/// Node and link inserts are idempotent. A link may name ids that have no
/// record yet; the link is kept and the missing end simply never shows up as
/// a node, so a child below it is neither a root nor reachable from one.
#[derive(Debug, Clone, Default)]
pub struct HierarchyGraph {
    graph: DiGraph<Slot, ()>,
    index: HashMap<String, NodeIndex>,
    /// Resolved slots in record insertion order
    order: Vec<NodeIndex>,
}

impl HierarchyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node unless one with the same id already exists.
    /// Returns whether the node was inserted.
    pub fn add_node(&mut self, record: Record) -> bool {
        if let Some(&idx) = self.index.get(&record.id) {
            let slot = &mut self.graph[idx];
            if slot.record.is_some() {
                return false;
            }
            slot.record = Some(record);
            self.order.push(idx);
            return true;
        }

        let id = record.id.clone();
        let idx = self.graph.add_node(Slot {
            id: id.clone(),
            record: Some(record),
        });
        self.index.insert(id, idx);
        self.order.push(idx);
        true
    }

    /// Insert a `parent -> child` link unless that exact pair exists.
    /// Returns whether the link was inserted.
    pub fn add_link(&mut self, parent_id: &str, child_id: &str) -> bool {
        let parent = self.slot_for(parent_id);
        let child = self.slot_for(child_id);
        if self.graph.contains_edge(parent, child) {
            return false;
        }
        self.graph.add_edge(parent, child, ());
        true
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.resolved(id).is_some()
    }

    pub fn node(&self, id: &str) -> Option<&Record> {
        self.resolved(id).and_then(|idx| self.graph[idx].record.as_ref())
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Record> + '_ {
        self.order
            .iter()
            .filter_map(move |&idx| self.graph[idx].record.as_ref())
    }

    /// Links as `(parent, child)` in insertion order
    pub fn links(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.graph.edge_references().map(move |e| {
            (
                self.graph[e.source()].id.as_str(),
                self.graph[e.target()].id.as_str(),
            )
        })
    }

    /// Ids linked to `id` in either direction
    pub fn neighbors_of(&self, id: &str) -> HashSet<&str> {
        match self.index.get(id) {
            Some(&idx) => self
                .graph
                .neighbors_undirected(idx)
                .map(|n| self.graph[n].id.as_str())
                .collect(),
            None => HashSet::new(),
        }
    }

    /// Nodes that never appear as a link target
    pub fn roots(&self) -> Vec<&Record> {
        self.nodes_without(Direction::Incoming)
    }

    /// Nodes that never appear as a link source
    pub fn leaves(&self) -> Vec<&Record> {
        self.nodes_without(Direction::Outgoing)
    }

    /// Depth of every node reachable from a root.
    ///
    /// Depth-first from each root in insertion order, children in link
    /// order. A node keeps the depth of the first path that reaches it, and
    /// a node is never entered twice, which also stops cycles. Nodes no root
    /// reaches are absent from the result.
    pub fn calculate_depths(&self) -> HashMap<String, usize> {
        let mut depths = HashMap::new();
        let mut visited = self.graph.visit_map();

        for root in self.root_indices() {
            let mut stack = vec![(root, 0usize)];
            while let Some((idx, depth)) = stack.pop() {
                if !visited.visit(idx) {
                    continue;
                }
                if let Some(record) = &self.graph[idx].record {
                    depths.insert(record.id.clone(), depth);
                }
                // Newest link first, so the oldest child is popped first
                for child in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                    if !visited.is_visited(&child) {
                        stack.push((child, depth + 1));
                    }
                }
            }
        }

        depths
    }

    /// Node/link document for a renderer. Depths are left empty.
    pub fn export(&self) -> GraphExport {
        let nodes = self
            .nodes()
            .map(|node| ExportNode {
                id: node.id.clone(),
                title: node.title.clone(),
                record_type: node.record_type.clone(),
                depth: None,
                created_time: node.created_time.map(|t| t.timestamp_millis()),
            })
            .collect();
        let links = self
            .links()
            .map(|(source, target)| ExportLink {
                source: source.to_string(),
                target: target.to_string(),
                value: 1,
            })
            .collect();
        GraphExport { nodes, links }
    }

    fn slot_for(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(Slot {
            id: id.to_string(),
            record: None,
        });
        self.index.insert(id.to_string(), idx);
        idx
    }

    fn resolved(&self, id: &str) -> Option<NodeIndex> {
        self.index
            .get(id)
            .copied()
            .filter(|&idx| self.graph[idx].record.is_some())
    }

    fn root_indices(&self) -> Vec<NodeIndex> {
        self.order
            .iter()
            .copied()
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect()
    }

    fn nodes_without(&self, direction: Direction) -> Vec<&Record> {
        self.order
            .iter()
            .filter(|&&idx| self.graph.neighbors_directed(idx, direction).next().is_none())
            .filter_map(|&idx| self.graph[idx].record.as_ref())
            .collect()
    }
}
