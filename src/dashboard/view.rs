use serde::Serialize;

use crate::dataset::{Datasets, Direction, ReportItem};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DashboardView {
    Ready { overview: Overview },
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionTotals {
    pub total: usize,
    pub inbound: usize,
    pub outbound: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentPoint {
    pub period: String,
    pub average_score: f64,
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
}

/// Everything the dashboard charts and lists, in display order.
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub interactions: InteractionTotals,
    pub sentiment: Vec<SentimentPoint>,
    pub report_timestamp: String,
    pub issues: Vec<ReportItem>,
    pub recommendations: Vec<ReportItem>,
}

impl Overview {
    pub fn from_datasets(datasets: &Datasets) -> Self {
        let inbound = datasets
            .interactions
            .iter()
            .filter(|r| r.direction == Direction::Inbound)
            .count();

        let sentiment = datasets
            .sentiment_chronological()
            .into_iter()
            .map(|p| SentimentPoint {
                period: p.key.clone(),
                average_score: p.aggregate.average_score,
                positive: p.aggregate.positive,
                negative: p.aggregate.negative,
                neutral: p.aggregate.neutral,
            })
            .collect();

        Self {
            interactions: InteractionTotals {
                total: datasets.interactions.len(),
                inbound,
                outbound: datasets.interactions.len() - inbound,
            },
            sentiment,
            report_timestamp: datasets.report.timestamp.clone(),
            issues: datasets.report.issues.clone(),
            recommendations: datasets.report.recommendations.clone(),
        }
    }
}
