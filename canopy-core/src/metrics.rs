use crate::model::AggregateStats;
use crate::workspace::{StructureSummary, WorkspaceModel};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Integrations a well-connected workspace is expected to have
pub const RECOMMENDED_INTEGRATIONS: f64 = 5.0;
/// Growth window in days
pub const GROWTH_WINDOW_DAYS: i64 = 30;

/// One metric. `NoSignal` marks a ratio whose inputs could not produce a
/// number and serializes as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(u64),
    Value(f64),
    NoSignal,
}

impl MetricValue {
    pub fn count(n: usize) -> Self {
        MetricValue::Count(n as u64)
    }

    /// Non-finite input becomes `NoSignal`
    pub fn value(v: f64) -> Self {
        if v.is_finite() {
            MetricValue::Value(v)
        } else {
            MetricValue::NoSignal
        }
    }

    /// `numerator / denominator * scale`, `NoSignal` on a zero denominator
    pub fn ratio(numerator: f64, denominator: f64, scale: f64) -> Self {
        if denominator == 0.0 {
            MetricValue::NoSignal
        } else {
            Self::value(numerator / denominator * scale)
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Count(n) => Some(*n as f64),
            MetricValue::Value(v) => Some(*v),
            MetricValue::NoSignal => None,
        }
    }

    pub fn is_signal(&self) -> bool {
        !matches!(self, MetricValue::NoSignal)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Count(n) => write!(f, "{}", n),
            MetricValue::Value(v) => write!(f, "{:.2}", v),
            MetricValue::NoSignal => write!(f, "n/a"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricGroupKind {
    Structure,
    Usage,
    Growth,
    Organization,
    Roi,
}

impl MetricGroupKind {
    pub const ALL: [MetricGroupKind; 5] = [
        MetricGroupKind::Structure,
        MetricGroupKind::Usage,
        MetricGroupKind::Growth,
        MetricGroupKind::Organization,
        MetricGroupKind::Roi,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            MetricGroupKind::Structure => "Structure",
            MetricGroupKind::Usage => "Usage",
            MetricGroupKind::Growth => "Growth",
            MetricGroupKind::Organization => "Organization",
            MetricGroupKind::Roi => "ROI",
        }
    }
}

/// Metrics produced by one group, in insertion order
#[derive(Debug, Clone, PartialEq)]
pub struct MetricGroup {
    pub kind: MetricGroupKind,
    entries: Vec<(String, MetricValue)>,
}

impl MetricGroup {
    pub fn new(kind: MetricGroupKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: MetricValue) {
        self.entries.push((key.into(), value));
    }

    pub fn get(&self, key: &str) -> Option<MetricValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Flat merged mapping of every group's metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceMetrics {
    #[serde(flatten)]
    values: BTreeMap<String, MetricValue>,
    /// Keys each group contributed, for sectioned rendering
    #[serde(skip)]
    sections: Vec<(MetricGroupKind, Vec<String>)>,
}

impl WorkspaceMetrics {
    /// Merge groups by key. Groups own disjoint key names; a collision is a
    /// programming error and the first value is kept.
    pub fn merge(groups: impl IntoIterator<Item = MetricGroup>) -> Self {
        let mut metrics = Self::default();
        for group in groups {
            let mut keys = Vec::with_capacity(group.len());
            for (key, value) in group.entries {
                if metrics.values.contains_key(&key) {
                    warn!("Metric {} reported by more than one group", key);
                    debug_assert!(false, "duplicate metric key {}", key);
                    continue;
                }
                metrics.values.insert(key.clone(), value);
                keys.push(key);
            }
            metrics.sections.push((group.kind, keys));
        }
        metrics
    }

    pub fn get(&self, key: &str) -> Option<MetricValue> {
        self.values.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, MetricValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Metrics of one group in the order the group produced them
    pub fn section(&self, kind: MetricGroupKind) -> Vec<(&str, MetricValue)> {
        self.sections
            .iter()
            .filter(|(k, _)| *k == kind)
            .flat_map(|(_, keys)| keys.iter())
            .filter_map(|key| self.values.get(key).map(|v| (key.as_str(), *v)))
            .collect()
    }
}

/// Business rules behind the three organization sub-scores. Each returns a
/// score in 0..=100; the engine clamps whatever comes back.
pub trait OrganizationRules {
    fn visibility(&self, structure: &StructureSummary, stats: &AggregateStats) -> f64;
    fn collaboration(&self, structure: &StructureSummary, stats: &AggregateStats) -> f64;
    fn productivity(&self, structure: &StructureSummary, stats: &AggregateStats) -> f64;
}

/// Teamspace size at which collaboration scores full marks
const FULL_TEAMSPACE_SIZE: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultOrganizationRules;

impl OrganizationRules for DefaultOrganizationRules {
    fn visibility(&self, structure: &StructureSummary, _stats: &AggregateStats) -> f64 {
        let linked_share = 100.0 - structure.percentage_unlinked;
        (structure.nav_depth_score + linked_share) / 2.0
    }

    fn collaboration(&self, _structure: &StructureSummary, stats: &AggregateStats) -> f64 {
        let teamspace_size = stats.members as f64 / stats.teamspaces.max(1) as f64;
        let size_score = (teamspace_size / FULL_TEAMSPACE_SIZE * 100.0).min(100.0);
        let people = stats.members + stats.guests;
        let guest_score = if people == 0 {
            0.0
        } else {
            (stats.guests as f64 / people as f64 * 100.0).min(100.0)
        };
        size_score * 0.7 + guest_score * 0.3
    }

    fn productivity(&self, structure: &StructureSummary, stats: &AggregateStats) -> f64 {
        let integrations =
            (stats.integrations as f64 / RECOMMENDED_INTEGRATIONS * 100.0).min(100.0);
        let automation = (stats.bots as f64 / stats.members.max(1) as f64 * 100.0).min(100.0);
        let templates = if structure.total_nodes == 0 {
            0.0
        } else {
            (structure.template_count as f64 / structure.total_nodes as f64 * 100.0).min(100.0)
        };
        (integrations + automation + templates) / 3.0
    }
}

/// Pricing and salary figures behind the ROI group
#[derive(Debug, Clone, PartialEq)]
pub struct RoiAssumptions {
    /// Per seat per month
    pub team_seat_price: f64,
    pub enterprise_seat_price: f64,
    pub enterprise_ai_seat_price: f64,
    pub average_salary: f64,
    pub working_hours_per_year: f64,
    pub standard_improvement: f64,
    pub ai_improvement: f64,
}

impl Default for RoiAssumptions {
    fn default() -> Self {
        Self {
            team_seat_price: 10.0,
            enterprise_seat_price: 20.0,
            enterprise_ai_seat_price: 25.0,
            average_salary: 80_000.0,
            working_hours_per_year: 2080.0,
            standard_improvement: 0.2,
            ai_improvement: 0.5,
        }
    }
}

impl RoiAssumptions {
    pub fn plan_cost(&self, members: u64, seat_price: f64) -> f64 {
        members as f64 * seat_price * 12.0
    }

    pub fn hourly_rate(&self) -> f64 {
        if self.working_hours_per_year == 0.0 {
            0.0
        } else {
            self.average_salary / self.working_hours_per_year
        }
    }

    /// Yearly value of `improvement` (a fraction) across all members
    pub fn productivity_gain(&self, members: u64, improvement: f64) -> f64 {
        members as f64 * self.working_hours_per_year * self.hourly_rate() * improvement
    }

    pub fn roi(&self, members: u64, seat_price: f64, improvement: f64) -> MetricValue {
        let cost = self.plan_cost(members, seat_price);
        let gain = self.productivity_gain(members, improvement);
        MetricValue::ratio(gain - cost, cost, 100.0)
    }
}

/// Computes the five metric groups over a built workspace.
///
/// Every group is a pure function of the model, the aggregate stats and, for
/// growth, the clock passed in.
#[derive(Debug, Clone, Default)]
pub struct MetricsEngine<R = DefaultOrganizationRules> {
    rules: R,
    roi: RoiAssumptions,
}

impl MetricsEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: OrganizationRules> MetricsEngine<R> {
    pub fn with_rules<S: OrganizationRules>(self, rules: S) -> MetricsEngine<S> {
        MetricsEngine {
            rules,
            roi: self.roi,
        }
    }

    pub fn with_roi_assumptions(mut self, roi: RoiAssumptions) -> Self {
        self.roi = roi;
        self
    }

    pub fn roi_assumptions(&self) -> &RoiAssumptions {
        &self.roi
    }

    pub fn structure(&self, model: &WorkspaceModel) -> MetricGroup {
        let s = model.summary();
        let mut group = MetricGroup::new(MetricGroupKind::Structure);
        group.insert("total_pages", MetricValue::count(s.total_nodes));
        group.insert("total_links", MetricValue::count(s.total_links));
        group.insert("max_depth", MetricValue::count(s.max_depth));
        group.insert("avg_depth", MetricValue::value(s.avg_depth));
        group.insert("deep_pages_count", MetricValue::count(s.deep_pages_count));
        group.insert("root_pages", MetricValue::count(s.root_nodes));
        group.insert("leaf_pages", MetricValue::count(s.leaf_nodes));
        group.insert("orphaned_blocks", MetricValue::count(s.orphaned_blocks));
        group.insert("collections_count", MetricValue::count(s.collections_count));
        group.insert(
            "linked_database_count",
            MetricValue::count(s.linked_database_count),
        );
        group.insert("template_count", MetricValue::count(s.template_count));
        group.insert("duplicate_count", MetricValue::count(s.duplicate_count));
        group.insert("bottleneck_count", MetricValue::count(s.bottleneck_count));
        group.insert("percentage_unlinked", MetricValue::value(s.percentage_unlinked));
        group.insert("scatter_index", MetricValue::value(s.scatter_index));
        group.insert("unfindable_pages", MetricValue::count(s.unfindable_pages));
        group.insert("nav_depth_score", MetricValue::value(s.nav_depth_score));
        group.insert("nav_complexity", MetricValue::value(s.nav_complexity));
        group
    }

    /// Empty without aggregate stats
    pub fn usage(&self, stats: Option<&AggregateStats>) -> MetricGroup {
        let mut group = MetricGroup::new(MetricGroupKind::Usage);
        let Some(stats) = stats else {
            return group;
        };
        group.insert("total_num_members", MetricValue::Count(stats.members));
        group.insert("total_num_guests", MetricValue::Count(stats.guests));
        group.insert("total_num_teamspaces", MetricValue::Count(stats.teamspaces));
        group.insert("total_num_integrations", MetricValue::Count(stats.integrations));
        group.insert("total_num_bots", MetricValue::Count(stats.bots));
        group.insert(
            "average_teamspace_members",
            MetricValue::ratio(stats.members as f64, stats.teamspaces.max(1) as f64, 1.0),
        );
        group.insert(
            "automation_usage_rate",
            MetricValue::ratio(stats.bots as f64, stats.members.max(1) as f64, 100.0),
        );
        group.insert(
            "current_integration_coverage",
            MetricValue::ratio(stats.integrations as f64, RECOMMENDED_INTEGRATIONS, 100.0),
        );
        group
    }

    /// Share of dated pages created within the last 30 days before `now`
    pub fn growth(&self, model: &WorkspaceModel, now: DateTime<Utc>) -> MetricGroup {
        let cutoff = (now - Duration::days(GROWTH_WINDOW_DAYS)).timestamp_millis();
        let timeline = model.timeline();
        let recent = timeline.iter().filter(|e| e.timestamp > cutoff).count();

        let rate = MetricValue::ratio(recent as f64, timeline.len() as f64, 100.0);
        if !rate.is_signal() {
            debug!("No dated pages, growth rate has no signal");
        }

        let mut group = MetricGroup::new(MetricGroupKind::Growth);
        group.insert("monthly_content_growth_rate", rate);
        group.insert("pages_created_last_30_days", MetricValue::count(recent));
        group.insert("timestamped_pages", MetricValue::count(timeline.len()));
        group
    }

    /// Empty without aggregate stats
    pub fn organization(
        &self,
        model: &WorkspaceModel,
        stats: Option<&AggregateStats>,
    ) -> MetricGroup {
        let mut group = MetricGroup::new(MetricGroupKind::Organization);
        let Some(stats) = stats else {
            return group;
        };
        let structure = model.summary();
        let score = |raw: f64| if raw.is_finite() { raw.clamp(0.0, 100.0) } else { 0.0 };
        let visibility = score(self.rules.visibility(structure, stats));
        let collaboration = score(self.rules.collaboration(structure, stats));
        let productivity = score(self.rules.productivity(structure, stats));

        group.insert("current_visibility_score", MetricValue::value(visibility));
        group.insert("current_collaboration_score", MetricValue::value(collaboration));
        group.insert("current_productivity_score", MetricValue::value(productivity));
        group.insert(
            "current_organization_score",
            MetricValue::value((visibility + collaboration + productivity) / 3.0),
        );
        group
    }

    /// Empty without aggregate stats
    pub fn roi(&self, stats: Option<&AggregateStats>) -> MetricGroup {
        let mut group = MetricGroup::new(MetricGroupKind::Roi);
        let Some(stats) = stats else {
            return group;
        };
        let members = stats.members;
        let a = &self.roi;

        group.insert(
            "current_plan",
            MetricValue::value(a.plan_cost(members, a.team_seat_price)),
        );
        group.insert(
            "enterprise_plan",
            MetricValue::value(a.plan_cost(members, a.enterprise_seat_price)),
        );
        group.insert(
            "enterprise_plan_w_ai",
            MetricValue::value(a.plan_cost(members, a.enterprise_ai_seat_price)),
        );
        for (key, improvement) in [
            ("10_percent_increase", 0.1),
            ("20_percent_increase", 0.2),
            ("50_percent_increase", 0.5),
        ] {
            group.insert(
                key,
                MetricValue::value(a.productivity_gain(members, improvement)),
            );
        }
        group.insert(
            "enterprise_plan_roi",
            a.roi(members, a.enterprise_seat_price, a.standard_improvement),
        );
        group.insert(
            "enterprise_plan_w_ai_roi",
            a.roi(members, a.enterprise_ai_seat_price, a.ai_improvement),
        );
        group
    }

    pub fn groups(&self, model: &WorkspaceModel, now: DateTime<Utc>) -> Vec<MetricGroup> {
        let stats = model.stats();
        vec![
            self.structure(model),
            self.usage(stats),
            self.growth(model, now),
            self.organization(model, stats),
            self.roi(stats),
        ]
    }

    pub fn compute_all(&self, model: &WorkspaceModel, now: DateTime<Utc>) -> WorkspaceMetrics {
        let metrics = WorkspaceMetrics::merge(self.groups(model, now));
        debug!("Computed {} metrics", metrics.len());
        metrics
    }
}
