// Workspace health scoring and recommendations

use crate::metrics::MetricValue;
use crate::workspace::{DEEP_PAGE_THRESHOLD, StructureSummary};
use serde::{Deserialize, Serialize};
use std::fmt;

const STRUCTURE_WEIGHT: f64 = 0.4;
const ORGANIZATION_WEIGHT: f64 = 0.3;
const ACTIVITY_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
}

impl HealthStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            HealthStatus::Excellent
        } else if score >= 60.0 {
            HealthStatus::Good
        } else if score >= 40.0 {
            HealthStatus::Fair
        } else {
            HealthStatus::NeedsImprovement
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Excellent => "Excellent",
            HealthStatus::Good => "Good",
            HealthStatus::Fair => "Fair",
            HealthStatus::NeedsImprovement => "Needs Improvement",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub score: f64,
    pub status: HealthStatus,
    pub structure_score: f64,
    pub organization_score: f64,
    /// `None` when no page carries a creation time
    pub activity_score: Option<f64>,
    pub recommendations: Vec<String>,
}

fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// Score a workspace from its structure and content growth rate.
///
/// Without a growth signal the activity weight is spread over the other two
/// scores instead of counting as zero activity.
pub fn assess_health(structure: &StructureSummary, growth_rate: MetricValue) -> HealthReport {
    let depth_penalty = (structure.max_depth as f64 - DEEP_PAGE_THRESHOLD as f64).max(0.0) * 5.0;
    let orphan_ratio = share(structure.orphaned_blocks, structure.total_nodes) / 100.0;
    let structure_score = (100.0 - depth_penalty - orphan_ratio * 30.0).max(0.0);

    let template_pct = share(structure.template_count, structure.total_nodes);
    let database_pct = share(
        structure.collections_count + structure.linked_database_count,
        structure.total_nodes,
    );
    let organization_score = (template_pct * 0.4 + database_pct * 0.6).min(100.0);

    let activity_score = growth_rate.as_f64().map(|rate| rate.clamp(0.0, 100.0));

    let score = match activity_score {
        Some(activity) => {
            structure_score * STRUCTURE_WEIGHT
                + organization_score * ORGANIZATION_WEIGHT
                + activity * ACTIVITY_WEIGHT
        }
        None => {
            (structure_score * STRUCTURE_WEIGHT + organization_score * ORGANIZATION_WEIGHT)
                / (STRUCTURE_WEIGHT + ORGANIZATION_WEIGHT)
        }
    };

    let mut recommendations = Vec::new();
    if structure.max_depth > DEEP_PAGE_THRESHOLD {
        recommendations
            .push("Consider flattening your workspace structure to improve navigation".to_string());
    }
    if structure.orphaned_blocks > 0 {
        recommendations
            .push("Link or archive orphaned pages to maintain workspace organization".to_string());
    }
    if template_pct < 10.0 {
        recommendations.push("Create more templates to standardize content creation".to_string());
    }
    if database_pct < 15.0 {
        recommendations
            .push("Consider using more databases to organize structured data".to_string());
    }
    if let Some(activity) = activity_score {
        if activity < 50.0 {
            recommendations
                .push("Encourage more regular updates to keep content fresh".to_string());
        }
        if activity < 30.0 {
            recommendations.push("Consider archiving or removing outdated content".to_string());
        }
    }

    HealthReport {
        score,
        status: HealthStatus::from_score(score),
        structure_score,
        organization_score,
        activity_score,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structure() -> StructureSummary {
        StructureSummary {
            total_nodes: 100,
            max_depth: 3,
            template_count: 20,
            collections_count: 10,
            linked_database_count: 10,
            ..StructureSummary::default()
        }
    }

    #[test]
    fn test_status_bands() {
        assert_eq!(HealthStatus::from_score(80.0), HealthStatus::Excellent);
        assert_eq!(HealthStatus::from_score(79.9), HealthStatus::Good);
        assert_eq!(HealthStatus::from_score(40.0), HealthStatus::Fair);
        assert_eq!(HealthStatus::from_score(12.0), HealthStatus::NeedsImprovement);
        assert_eq!(HealthStatus::NeedsImprovement.to_string(), "Needs Improvement");
    }

    #[test]
    fn test_weighted_score() {
        let report = assess_health(&structure(), MetricValue::Value(60.0));
        assert_eq!(report.structure_score, 100.0);
        // 20% templates, 20% databases
        assert!((report.organization_score - 20.0).abs() < 1e-9);
        let expected = 100.0 * 0.4 + 20.0 * 0.3 + 60.0 * 0.3;
        assert!((report.score - expected).abs() < 1e-9);
        assert_eq!(report.status, HealthStatus::Good);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_missing_growth_redistributes_weight() {
        let report = assess_health(&structure(), MetricValue::NoSignal);
        assert_eq!(report.activity_score, None);
        let expected = (100.0 * 0.4 + 20.0 * 0.3) / 0.7;
        assert!((report.score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_penalties_and_recommendations() {
        let summary = StructureSummary {
            total_nodes: 10,
            max_depth: 8,
            orphaned_blocks: 5,
            ..StructureSummary::default()
        };
        let report = assess_health(&summary, MetricValue::Value(10.0));
        // 100 - 15 depth - 15 orphans
        assert!((report.structure_score - 70.0).abs() < 1e-9);
        assert_eq!(report.organization_score, 0.0);
        assert_eq!(report.recommendations.len(), 6);
    }

    #[test]
    fn test_empty_workspace_is_finite() {
        let report = assess_health(&StructureSummary::default(), MetricValue::NoSignal);
        assert!(report.score.is_finite());
        assert_eq!(report.structure_score, 100.0);
    }
}
