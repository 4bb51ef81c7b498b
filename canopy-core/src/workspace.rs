use crate::graph::{GraphExport, HierarchyGraph};
use crate::model::{AggregateStats, Record, RecordType};
use canopy_stream::{AssembledExport, RawRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Pages deeper than this count as deep
pub const DEEP_PAGE_THRESHOLD: usize = 5;
/// Pages deeper than this are practically unfindable by clicking through
pub const UNFINDABLE_DEPTH: usize = 4;
/// Nodes with more neighbors than this are navigation bottlenecks
pub const BOTTLENECK_THRESHOLD: usize = 10;

/// Structural aggregates of a workspace graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureSummary {
    pub total_nodes: usize,
    pub total_links: usize,
    pub max_depth: usize,
    /// Mean over the nodes reachable from a root
    pub avg_depth: f64,
    pub root_nodes: usize,
    pub leaf_nodes: usize,
    pub orphaned_blocks: usize,
    pub duplicate_count: usize,
    pub bottleneck_count: usize,
    pub deep_pages_count: usize,
    pub unfindable_pages: usize,
    pub collections_count: usize,
    pub linked_database_count: usize,
    pub template_count: usize,
    pub percentage_unlinked: f64,
    pub scatter_index: f64,
    pub nav_depth_score: f64,
    pub nav_complexity: f64,
}

/// A node with a creation time, for growth windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Epoch millis
    pub timestamp: i64,
}

/// Hierarchy graph of one analysed workspace. Built once, never modified.
#[derive(Debug, Clone)]
pub struct WorkspaceModel {
    graph: HierarchyGraph,
    depths: HashMap<String, usize>,
    stats: Option<AggregateStats>,
    summary: StructureSummary,
}

impl WorkspaceModel {
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        Self::build(records, None)
    }

    pub fn from_raw(records: &[RawRecord]) -> Self {
        Self::build(records.iter().map(Record::from), None)
    }

    /// Build from a fully reassembled stream
    pub fn from_export(export: &AssembledExport) -> Self {
        let stats = export.stats.as_ref().map(AggregateStats::from);
        Self::build(export.records.iter().map(Record::from), stats)
    }

    pub fn with_stats(mut self, stats: AggregateStats) -> Self {
        self.stats = Some(stats);
        self
    }

    fn build(records: impl IntoIterator<Item = Record>, stats: Option<AggregateStats>) -> Self {
        let mut graph = HierarchyGraph::new();
        let mut duplicates = 0usize;

        for record in records {
            let link = record.parent_id.clone().map(|parent| (parent, record.id.clone()));
            // A repeated id drops the whole row, parent link included
            if !graph.add_node(record) {
                duplicates += 1;
                continue;
            }
            if let Some((parent, child)) = link {
                graph.add_link(&parent, &child);
            }
        }

        if duplicates > 0 {
            debug!(
                "Ignored {} records with an id already in the graph, along with their parent links",
                duplicates
            );
        }

        let depths = graph.calculate_depths();
        let summary = summarize(&graph, &depths);
        info!(
            "Built workspace graph: {} nodes, {} links, {} reachable",
            summary.total_nodes,
            summary.total_links,
            depths.len()
        );

        Self {
            graph,
            depths,
            stats,
            summary,
        }
    }

    pub fn graph(&self) -> &HierarchyGraph {
        &self.graph
    }

    pub fn stats(&self) -> Option<&AggregateStats> {
        self.stats.as_ref()
    }

    /// Depths of every node reachable from a root
    pub fn depths(&self) -> &HashMap<String, usize> {
        &self.depths
    }

    pub fn depth_of(&self, id: &str) -> Option<usize> {
        self.depths.get(id).copied()
    }

    pub fn calculate_depths(&self) -> HashMap<String, usize> {
        self.graph.calculate_depths()
    }

    pub fn summary(&self) -> &StructureSummary {
        &self.summary
    }

    /// Nodes with a creation time, oldest first
    pub fn timeline(&self) -> Vec<TimelineEntry> {
        let mut entries: Vec<TimelineEntry> = self
            .graph
            .nodes()
            .filter_map(|node| {
                node.created_time.map(|created| TimelineEntry {
                    id: node.id.clone(),
                    title: node.title.clone(),
                    record_type: node.record_type.clone(),
                    timestamp: created.timestamp_millis(),
                })
            })
            .collect();
        entries.sort_by_key(|entry| entry.timestamp);
        entries
    }

    pub fn count_by_type(&self, record_type: &RecordType) -> usize {
        self.graph
            .nodes()
            .filter(|node| &node.record_type == record_type)
            .count()
    }

    /// Graph export with each reachable node's depth filled in
    pub fn export_graph(&self) -> GraphExport {
        let mut export = self.graph.export();
        for node in &mut export.nodes {
            node.depth = self.depth_of(&node.id);
        }
        export
    }
}

fn summarize(graph: &HierarchyGraph, depths: &HashMap<String, usize>) -> StructureSummary {
    let total_nodes = graph.node_count();
    let max_depth = depths.values().copied().max().unwrap_or(0);
    let avg_depth = if depths.is_empty() {
        0.0
    } else {
        depths.values().sum::<usize>() as f64 / depths.len() as f64
    };

    let mut orphaned_blocks = 0;
    let mut bottleneck_count = 0;
    let mut title_counts: HashMap<&str, usize> = HashMap::new();
    let mut collections_count = 0;
    let mut linked_database_count = 0;
    let mut template_count = 0;

    for node in graph.nodes() {
        let neighbors = graph.neighbors_of(&node.id).len();
        if neighbors == 0 {
            orphaned_blocks += 1;
        }
        if neighbors > BOTTLENECK_THRESHOLD {
            bottleneck_count += 1;
        }
        *title_counts.entry(node.title.as_str()).or_insert(0) += 1;
        match node.record_type {
            RecordType::Collection => collections_count += 1,
            RecordType::LinkedDatabase => linked_database_count += 1,
            RecordType::Template => template_count += 1,
            _ => {}
        }
    }

    // Titles that occur more than once, not the number of duplicate nodes
    let duplicate_count = title_counts.values().filter(|&&count| count > 1).count();
    let deep_pages_count = depths.values().filter(|&&d| d > DEEP_PAGE_THRESHOLD).count();
    let unfindable_pages = depths.values().filter(|&&d| d > UNFINDABLE_DEPTH).count();
    let root_nodes = graph.roots().len();

    let per_node = |value: f64| {
        if total_nodes == 0 {
            0.0
        } else {
            value / total_nodes as f64
        }
    };

    StructureSummary {
        total_nodes,
        total_links: graph.edge_count(),
        max_depth,
        avg_depth,
        root_nodes,
        leaf_nodes: graph.leaves().len(),
        orphaned_blocks,
        duplicate_count,
        bottleneck_count,
        deep_pages_count,
        unfindable_pages,
        collections_count,
        linked_database_count,
        template_count,
        percentage_unlinked: per_node(orphaned_blocks as f64) * 100.0,
        scatter_index: per_node(root_nodes as f64),
        nav_depth_score: (100.0 - avg_depth * 10.0).max(0.0),
        nav_complexity: per_node((bottleneck_count * 5 + unfindable_pages * 3) as f64) * 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_disconnected_nodes_are_all_orphans() {
        let model = WorkspaceModel::from_records((0..7).map(|i| Record::new(format!("n{}", i))));
        let summary = model.summary();
        assert_eq!(summary.total_nodes, 7);
        assert_eq!(summary.orphaned_blocks, 7);
        assert_eq!(summary.root_nodes, 7);
        assert_eq!(summary.leaf_nodes, 7);
        assert_eq!(summary.scatter_index, 1.0);
        assert_eq!(summary.percentage_unlinked, 100.0);
    }

    #[test]
    fn test_chain_depth_stats() {
        let model = WorkspaceModel::from_records(vec![
            Record::new("root"),
            Record::new("a").with_parent("root"),
            Record::new("b").with_parent("a"),
            Record::new("c").with_parent("b"),
        ]);
        let summary = model.summary();
        assert_eq!(summary.max_depth, 3);
        assert_eq!(summary.avg_depth, 1.5);
        assert_eq!(summary.nav_depth_score, 85.0);
        assert_eq!(summary.total_links, 3);
        assert_eq!(summary.orphaned_blocks, 0);
    }

    #[test]
    fn test_duplicate_count_counts_titles() {
        let titles = ["X", "X", "Y", "Z", "Z", "Z"];
        let model = WorkspaceModel::from_records(
            titles
                .iter()
                .enumerate()
                .map(|(i, t)| Record::new(format!("n{}", i)).with_title(*t)),
        );
        assert_eq!(model.summary().duplicate_count, 2);
    }

    #[test]
    fn test_empty_workspace_has_defined_aggregates() {
        let model = WorkspaceModel::from_records(Vec::new());
        let summary = model.summary();
        assert_eq!(summary.max_depth, 0);
        assert_eq!(summary.avg_depth, 0.0);
        assert_eq!(summary.percentage_unlinked, 0.0);
        assert_eq!(summary.scatter_index, 0.0);
        assert_eq!(summary.nav_complexity, 0.0);
        assert_eq!(summary.nav_depth_score, 100.0);
    }

    #[test]
    fn test_bottleneck_and_deep_pages() {
        let mut records = vec![Record::new("hub")];
        for i in 0..11 {
            records.push(Record::new(format!("spoke{}", i)).with_parent("hub"));
        }
        // A chain hanging off the first spoke: depths 2..=7
        let mut parent = "spoke0".to_string();
        for i in 0..6 {
            let id = format!("deep{}", i);
            records.push(Record::new(id.clone()).with_parent(parent));
            parent = id;
        }
        let model = WorkspaceModel::from_records(records);
        let summary = model.summary();
        assert_eq!(summary.bottleneck_count, 1);
        assert_eq!(summary.max_depth, 7);
        // depths 6 and 7
        assert_eq!(summary.deep_pages_count, 2);
        // depths 5, 6 and 7
        assert_eq!(summary.unfindable_pages, 3);
        let expected = (1.0 * 5.0 + 3.0 * 3.0) / 18.0 * 100.0;
        assert!((summary.nav_complexity - expected).abs() < 1e-9);
    }

    #[test]
    fn test_unreachable_nodes_are_left_out_of_average() {
        let model = WorkspaceModel::from_records(vec![
            Record::new("root"),
            Record::new("a").with_parent("root"),
            Record::new("lost").with_parent("never-exported"),
        ]);
        assert_eq!(model.depths().len(), 2);
        assert_eq!(model.depth_of("lost"), None);
        assert_eq!(model.summary().avg_depth, 0.5);
        assert_eq!(model.summary().total_nodes, 3);
    }

    #[test]
    fn test_type_counts() {
        let model = WorkspaceModel::from_records(vec![
            Record::new("a").with_type(RecordType::Collection),
            Record::new("b").with_type(RecordType::Collection),
            Record::new("c").with_type(RecordType::LinkedDatabase),
            Record::new("d").with_type(RecordType::Template),
            Record::new("e"),
        ]);
        let summary = model.summary();
        assert_eq!(summary.collections_count, 2);
        assert_eq!(summary.linked_database_count, 1);
        assert_eq!(summary.template_count, 1);
        assert_eq!(model.count_by_type(&RecordType::Page), 1);
    }

    #[test]
    fn test_timeline_is_sorted_and_skips_undated() {
        let t = |d: u32| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap();
        let model = WorkspaceModel::from_records(vec![
            Record::new("late").with_created_time(t(20)),
            Record::new("undated"),
            Record::new("early").with_created_time(t(2)),
        ]);
        let timeline = model.timeline();
        let ids: Vec<&str> = timeline.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert_eq!(timeline[0].timestamp, t(2).timestamp_millis());
    }

    #[test]
    fn test_export_graph_shape() {
        let model = WorkspaceModel::from_records(vec![
            Record::new("root").with_title("Home"),
            Record::new("a").with_parent("root"),
        ]);
        let export = model.export_graph();
        assert_eq!(export.nodes.len(), 2);
        assert_eq!(export.nodes[1].depth, Some(1));
        assert_eq!(
            export.links,
            vec![crate::graph::ExportLink {
                source: "root".to_string(),
                target: "a".to_string(),
                value: 1
            }]
        );
        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["nodes"][0]["type"], "page");
        assert_eq!(json["nodes"][0]["title"], "Home");
    }

    #[test]
    fn test_from_export_carries_stats() {
        let export = AssembledExport {
            records: vec![RawRecord::new("a"), RawRecord::new("b").with_parent("a")],
            stats: Some(
                canopy_stream::RawAggregateStats::default().with_counter("TOTAL_NUM_MEMBERS", 9),
            ),
        };
        let model = WorkspaceModel::from_export(&export);
        assert_eq!(model.stats().unwrap().members, 9);
        assert_eq!(model.summary().total_links, 1);
    }
}
