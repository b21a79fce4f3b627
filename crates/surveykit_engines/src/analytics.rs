#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use surveykit_contracts::response::{ResponseId, SurveyResponse};
use surveykit_contracts::survey::{Survey, SurveyId};

use crate::param_codec::ParamCodec;

pub const UNKNOWN_SURVEY_NAME: &str = "Unknown Survey";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalyticsRange {
    Last7Days,
    #[default]
    Last30Days,
    Last90Days,
}

impl AnalyticsRange {
    pub fn days(self) -> i64 {
        match self {
            AnalyticsRange::Last7Days => 7,
            AnalyticsRange::Last30Days => 30,
            AnalyticsRange::Last90Days => 90,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnalyticsRange::Last7Days => "7d",
            AnalyticsRange::Last30Days => "30d",
            AnalyticsRange::Last90Days => "90d",
        }
    }
}

impl fmt::Display for AnalyticsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalyticsRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(AnalyticsRange::Last7Days),
            "30d" => Ok(AnalyticsRange::Last30Days),
            "90d" => Ok(AnalyticsRange::Last90Days),
            other => Err(format!(
                "unknown range '{other}'. expected one of: 7d, 30d, 90d"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsQuery {
    /// `None` covers every survey.
    pub survey_id: Option<SurveyId>,
    pub range: AnalyticsRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsConfig {
    pub top_values_per_parameter: usize,
    pub recent_responses: usize,
}

impl AnalyticsConfig {
    pub fn mvp_v1() -> Self {
        Self {
            top_values_per_parameter: 5,
            recent_responses: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsStats {
    pub total_responses: usize,
    pub active_surveys: usize,
    pub encrypted_parameters: usize,
    pub unique_visitors: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
    /// Share of all responses in range, 0..=100.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBreakdown {
    pub name: String,
    pub top_values: Vec<ValueCount>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentResponse {
    pub response_id: ResponseId,
    pub survey_name: String,
    pub timestamp: DateTime<Utc>,
    pub parameter_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsReport {
    pub stats: AnalyticsStats,
    pub parameters: Vec<ParameterBreakdown>,
    pub recent: Vec<RecentResponse>,
}

#[derive(Debug, Clone)]
pub struct AnalyticsEngine {
    config: AnalyticsConfig,
    codec: ParamCodec,
}

impl AnalyticsEngine {
    pub fn new(config: AnalyticsConfig, codec: ParamCodec) -> Self {
        Self { config, codec }
    }

    pub fn compute(
        &self,
        surveys: &[Survey],
        responses: &[SurveyResponse],
        query: &AnalyticsQuery,
        now: DateTime<Utc>,
    ) -> AnalyticsReport {
        let cutoff = now - Duration::days(query.range.days());
        let in_scope: Vec<&SurveyResponse> = responses
            .iter()
            .filter(|r| r.timestamp >= cutoff)
            .filter(|r| query.survey_id.as_ref().map_or(true, |id| &r.survey_id == id))
            .collect();

        let stats = AnalyticsStats {
            total_responses: in_scope.len(),
            active_surveys: surveys.iter().filter(|s| s.is_active).count(),
            encrypted_parameters: surveys.iter().map(Survey::encrypted_parameter_count).sum(),
            unique_visitors: in_scope
                .iter()
                .map(|r| r.ip_address.as_str())
                .collect::<BTreeSet<_>>()
                .len(),
        };

        AnalyticsReport {
            stats,
            parameters: self.parameter_breakdown(&in_scope),
            recent: self.recent(surveys, &in_scope),
        }
    }

    fn parameter_breakdown(&self, in_scope: &[&SurveyResponse]) -> Vec<ParameterBreakdown> {
        let mut counts: BTreeMap<&str, BTreeMap<String, usize>> = BTreeMap::new();
        for r in in_scope {
            for (name, value) in &r.parameters {
                let decoded = self.codec.decode(value);
                let shown = if decoded.is_empty() {
                    value.clone()
                } else {
                    decoded
                };
                *counts.entry(name).or_default().entry(shown).or_default() += 1;
            }
        }

        let total = in_scope.len() as f64;
        counts
            .into_iter()
            .map(|(name, values)| {
                let mut ranked: Vec<(String, usize)> = values.into_iter().collect();
                ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                ranked.truncate(self.config.top_values_per_parameter);
                ParameterBreakdown {
                    name: name.to_string(),
                    top_values: ranked
                        .into_iter()
                        .map(|(value, count)| ValueCount {
                            value,
                            count,
                            percentage: count as f64 / total * 100.0,
                        })
                        .collect(),
                }
            })
            .collect()
    }

    fn recent(&self, surveys: &[Survey], in_scope: &[&SurveyResponse]) -> Vec<RecentResponse> {
        let mut newest: Vec<&SurveyResponse> = in_scope.to_vec();
        newest.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        newest
            .into_iter()
            .take(self.config.recent_responses)
            .map(|r| RecentResponse {
                response_id: r.id.clone(),
                survey_name: surveys
                    .iter()
                    .find(|s| s.id == r.survey_id)
                    .map_or_else(|| UNKNOWN_SURVEY_NAME.to_string(), |s| s.name.clone()),
                timestamp: r.timestamp,
                parameter_names: r.parameters.keys().cloned().collect(),
            })
            .collect()
    }
}
