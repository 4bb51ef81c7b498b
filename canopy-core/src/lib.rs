//! Workspace hierarchy model and analytics for Canopy.

pub mod analysis;
pub mod error;
pub mod graph;
pub mod insights;
pub mod metrics;
pub mod model;
pub mod report;
pub mod workspace;

pub use analysis::{Analysis, ProgressCallback, collect_export, stream_export};
pub use error::{AnalysisError, Result};
pub use graph::{ExportLink, ExportNode, GraphExport, HierarchyGraph};
pub use insights::{HealthReport, HealthStatus, assess_health};
pub use metrics::{
    DefaultOrganizationRules, MetricGroup, MetricGroupKind, MetricValue, MetricsEngine,
    OrganizationRules, RoiAssumptions, WorkspaceMetrics,
};
pub use model::{AggregateStats, Record, RecordType};
pub use report::{ReportData, ReportFormat, render_report, save_report};
pub use workspace::{StructureSummary, TimelineEntry, WorkspaceModel};
