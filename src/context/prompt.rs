use super::selector::Selection;
use crate::dataset::{AnalysisReport, InteractionRecord, ReportItem, SentimentPeriod};

pub const DATASET_MARKER: &str = "### DATASET";
pub const INSTRUCTIONS_MARKER: &str = "### INSTRUCTIONS";
pub const QUESTION_MARKER: &str = "### QUESTION";
pub const RESPONSE_MARKER: &str = "### RESPONSE";

/// Section markers the model must never reproduce in its reply.
pub const STOP_SEQUENCES: [&str; 4] = [
    DATASET_MARKER,
    INSTRUCTIONS_MARKER,
    QUESTION_MARKER,
    RESPONSE_MARKER,
];

const PREAMBLE: &str = "\
You are a customer service analytics assistant for the Amazon support team. \
You answer questions using three data sources:
1. Customer interactions: support tweets with tweet_id, author_id, inbound (true when a customer wrote it), created_at, text and response_tweet_id.
2. Monthly sentiment: for each month, counts of positive, negative and neutral interactions and an average sentiment score.
3. Analysis report: key issues and recommendations derived from the interactions, each with a title and description.";

const INSTRUCTIONS: &str = "\
- Use ONLY the information in the three datasets above.
- If the datasets do not contain the answer, say that the information is not available. Never make up facts.
- Keep the answer concise. Prefer the single most relevant fact.";

const CLOSING: &str = "Answer with evidence taken only from the context provided above.";

/// Report fields quoted alongside the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportMeta<'a> {
    pub timestamp: &'a str,
}

impl<'a> From<&'a AnalysisReport> for ReportMeta<'a> {
    fn from(report: &'a AnalysisReport) -> Self {
        Self {
            timestamp: &report.timestamp,
        }
    }
}

/// `[created_at] Customer: "text"`, on a single line with inner quotes escaped.
pub fn render_interaction(record: &InteractionRecord) -> String {
    let text = record
        .text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('"', "\\\"");
    format!(
        "[{}] {}: \"{}\"",
        record.created_at,
        record.direction.speaker(),
        text
    )
}

/// `2017-10: Score=0.12 (4 positive, 2 negative, 1 neutral)`
pub fn render_period(period: &SentimentPeriod) -> String {
    let aggregate = &period.aggregate;
    format!(
        "{}: Score={:.2} ({} positive, {} negative, {} neutral)",
        period.key, aggregate.average_score, aggregate.positive, aggregate.negative, aggregate.neutral
    )
}

fn render_item(item: &ReportItem) -> String {
    format!("{}: {}", item.title, item.description)
}

fn interactions_section(selection: &Selection<'_>) -> Vec<String> {
    let mut lines = vec![
        format!("{} 1: CUSTOMER INTERACTIONS", DATASET_MARKER),
        format!("Total records: {}", selection.total_interactions),
    ];

    if selection.interactions.is_empty() {
        lines.push("Relevant examples: none of the interactions match this question.".to_string());
    } else {
        lines.push("Relevant examples:".to_string());
        lines.extend(selection.interactions.iter().map(|r| render_interaction(r)));
    }
    lines
}

fn sentiment_section(selection: &Selection<'_>) -> Vec<String> {
    let summary = &selection.sentiment;
    let mut lines = vec![format!("{} 2: MONTHLY SENTIMENT", DATASET_MARKER)];

    match (summary.earliest, summary.latest) {
        (Some(earliest), Some(latest)) => {
            lines.push(format!("Period covered: {} to {}", earliest.key, latest.key));
            lines.push("Most recent periods:".to_string());
            lines.extend(summary.recent.iter().map(|p| render_period(p)));
        }
        _ => lines.push("Sentiment data is not available.".to_string()),
    }
    lines
}

fn report_section(selection: &Selection<'_>, meta: ReportMeta<'_>) -> Vec<String> {
    let mut lines = vec![
        format!("{} 3: ANALYSIS REPORT", DATASET_MARKER),
        format!("Report generated: {}", meta.timestamp),
    ];

    if selection.issues.is_empty() {
        lines.push("Relevant issues: none match this question.".to_string());
    } else {
        lines.push("Relevant issues:".to_string());
        lines.extend(selection.issues.iter().map(|i| render_item(i)));
    }

    if selection.recommendations.is_empty() {
        lines.push("Relevant recommendations: none match this question.".to_string());
    } else {
        lines.push("Relevant recommendations:".to_string());
        lines.extend(selection.recommendations.iter().map(|r| render_item(r)));
    }
    lines
}

/// Builds the full prompt for one question. Pure and deterministic.
pub fn compose(query: &str, selection: &Selection<'_>, meta: ReportMeta<'_>) -> String {
    let sections = [
        PREAMBLE.to_string(),
        interactions_section(selection).join("\n"),
        sentiment_section(selection).join("\n"),
        report_section(selection, meta).join("\n"),
        format!("{}\n{}", INSTRUCTIONS_MARKER, INSTRUCTIONS),
        format!("{}\n{}", QUESTION_MARKER, query.trim()),
        format!("{}\n{}", RESPONSE_MARKER, CLOSING),
    ];
    sections.join("\n\n")
}
