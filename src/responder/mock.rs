//! Mock responder: canned replies behind simulated latency.
//!
//! DESIGN
//! ======
//! Each call sleeps for a random duration drawn from its configured
//! `LatencyRange`, then answers from static tables. Search, suggestion and
//! validation calls, plus chat streams, may fail at a configured rate: the
//! failure path waits a failure latency and reports the generic network
//! error. Keyword routing and the validation rules are plain functions so
//! they can be tested without a runtime.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use super::ResponseSource;
use super::types::{FormFields, Fragment, FragmentStream, SearchAction, SearchFilter, SearchResult, Validation};
use crate::config::{DashboardConfig, LatencyRange};
use crate::error::RequestError;

pub const NETWORK_ERROR_MESSAGE: &str = "Network request failed. Please try again.";

pub const MAX_FIELD_SUGGESTIONS: usize = 3;

const FRAGMENT_BUFFER: usize = 16;

// =============================================================================
// CANNED DATA
// =============================================================================

const CHAT_REPLIES: [&str; 5] = [
    "Based on your current dashboard data, I can see that user engagement has increased by 23% this week. Would you like me to analyze the contributing factors?",
    "I've analyzed the patterns in your data. The peak activity times are between 2-4 PM UTC. Consider scheduling your campaigns during these windows for maximum impact.",
    "Looking at your metrics, I notice an opportunity to improve conversion rates. The checkout flow shows a 15% drop-off at step 3. Would you like suggestions for optimization?",
    "Your API performance looks healthy with 99.7% uptime this month. I detected a brief latency spike on Tuesday that was automatically resolved.",
    "I've prepared a summary of your weekly KPIs: Revenue is up 12%, new signups increased by 8%, and customer satisfaction remains at 4.7/5 stars.",
];

const HELP_REPLY: &str = "I'm here to help! I can assist you with analyzing dashboard metrics, generating reports, identifying trends, and providing actionable insights. What would you like to explore?";

const REPORT_REPLY: &str = "I can generate several types of reports for you: Weekly Performance Summary, User Engagement Analysis, Revenue Breakdown, or a Custom Report. Which would you prefer?";

const EMAIL_SUGGESTIONS: [&str; 3] = ["user@company.com", "admin@example.org", "contact@business.io"];
const NAME_SUGGESTIONS: [&str; 3] = ["John Smith", "Sarah Johnson", "Alex Chen"];
const COMPANY_SUGGESTIONS: [&str; 3] = ["Acme Corp", "TechStart Inc", "Digital Solutions LLC"];
const ROLE_SUGGESTIONS: [&str; 3] = ["Product Manager", "Software Engineer", "Marketing Lead"];

pub const WARN_EMAIL_FORMAT: &str = "Email format appears invalid";
pub const WARN_NAME_SHORT: &str = "Name seems too short";
pub const TIP_COMPANY: &str = "Pro tip: Adding company details helps personalize your experience";
pub const TIP_ROLE: &str = "Consider adding your role for better AI recommendations";

/// Which canned search result a query routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTopic {
    Default,
    Analytics,
    Users,
}

fn filter(label: &str, value: &str) -> SearchFilter {
    SearchFilter { label: label.into(), value: value.into() }
}

fn action(label: &str, icon: &str) -> SearchAction {
    SearchAction { label: label.into(), icon: icon.into() }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Canned result for a topic.
#[must_use]
pub fn canned_result(topic: SearchTopic) -> SearchResult {
    match topic {
        SearchTopic::Default => SearchResult {
            content: "I found several results matching your query. Here are some AI-suggested refinements.".into(),
            suggestions: strings(&["Recent items", "Most popular", "By category"]),
            filters: vec![
                filter("Last 7 days", "7d"),
                filter("Active only", "active"),
                filter("High priority", "high"),
            ],
            actions: vec![
                action("Export results", "download"),
                action("Create report", "file-text"),
                action("Set alert", "bell"),
            ],
        },
        SearchTopic::Analytics => SearchResult {
            content: "Based on your analytics query, I've identified key trends and patterns.".into(),
            suggestions: strings(&["Compare periods", "Segment by source", "View anomalies"]),
            filters: vec![
                filter("Traffic sources", "sources"),
                filter("Conversion rate", "conversion"),
                filter("User behavior", "behavior"),
            ],
            actions: vec![action("Generate insights", "sparkles"), action("Schedule report", "calendar")],
        },
        SearchTopic::Users => SearchResult {
            content: "I've analyzed your user data and found actionable insights.".into(),
            suggestions: strings(&["Active users", "Churn risk", "Top performers"]),
            filters: vec![filter("New users", "new"), filter("Premium tier", "premium"), filter("Inactive", "inactive")],
            actions: vec![action("Send campaign", "mail"), action("Export segment", "users")],
        },
    }
}

// =============================================================================
// RULES
// =============================================================================

/// Route a query by keyword. Analytics wins over users when both match.
#[must_use]
pub fn classify_query(query: &str) -> SearchTopic {
    let lower = query.to_lowercase();
    if lower.contains("analytics") || lower.contains("data") {
        SearchTopic::Analytics
    } else if lower.contains("user") || lower.contains("customer") {
        SearchTopic::Users
    } else {
        SearchTopic::Default
    }
}

/// Fixed reply for prompts that ask for help or a report, if any.
#[must_use]
pub fn keyword_reply(prompt: &str) -> Option<&'static str> {
    let lower = prompt.to_lowercase();
    if lower.contains("help") {
        Some(HELP_REPLY)
    } else if lower.contains("report") {
        Some(REPORT_REPLY)
    } else {
        None
    }
}

/// Static candidates for a form field. Unknown fields have none.
#[must_use]
pub fn field_candidates(field: &str) -> &'static [&'static str] {
    match field {
        "email" => &EMAIL_SUGGESTIONS,
        "name" => &NAME_SUGGESTIONS,
        "company" => &COMPANY_SUGGESTIONS,
        "role" => &ROLE_SUGGESTIONS,
        _ => &[],
    }
}

/// Up to three candidates containing `partial` (case-insensitive), or the
/// first three candidates when `partial` is empty.
#[must_use]
pub fn match_suggestions(field: &str, partial: &str) -> Vec<String> {
    let candidates = field_candidates(field);
    if partial.is_empty() {
        return strings(&candidates[..candidates.len().min(MAX_FIELD_SUGGESTIONS)]);
    }
    let needle = partial.to_lowercase();
    candidates
        .iter()
        .filter(|candidate| candidate.to_lowercase().contains(&needle))
        .take(MAX_FIELD_SUGGESTIONS)
        .map(|s| (*s).to_string())
        .collect()
}

/// Deterministic validation rules. A field counts as present when non-empty.
#[must_use]
pub fn validate_fields(fields: &FormFields) -> Validation {
    let value = |key: &str| fields.get(key).map_or("", String::as_str);
    let mut warnings = Vec::new();
    let mut tips = Vec::new();

    let email = value("email");
    if !email.is_empty() && !email.contains('@') {
        warnings.push(WARN_EMAIL_FORMAT.to_string());
    }

    let name = value("name");
    if !name.is_empty() && name.chars().count() < 3 {
        warnings.push(WARN_NAME_SHORT.to_string());
    }

    if !value("company").is_empty() {
        tips.push(TIP_COMPANY.to_string());
    }

    if value("role").is_empty() {
        tips.push(TIP_ROLE.to_string());
    }

    Validation { is_valid: warnings.is_empty(), warnings, tips }
}

/// Split a reply into accumulated word-by-word fragments.
#[must_use]
pub fn word_fragments(reply: &str) -> Vec<Fragment> {
    let words: Vec<&str> = reply.split(' ').collect();
    let last = words.len() - 1;
    let mut accumulated = String::with_capacity(reply.len());
    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            if i > 0 {
                accumulated.push(' ');
            }
            accumulated.push_str(word);
            Fragment { content: accumulated.clone(), is_complete: i == last }
        })
        .collect()
}

// =============================================================================
// RANDOMNESS
// =============================================================================

fn sample_latency(range: LatencyRange) -> Duration {
    if range.min_ms == range.max_ms {
        return Duration::from_millis(range.min_ms);
    }
    Duration::from_millis(rand::rng().random_range(range.min_ms..=range.max_ms))
}

fn roll_failure(rate: f64) -> bool {
    rate > 0.0 && rand::rng().random_bool(rate.min(1.0))
}

fn pick_chat_reply(prompt: &str) -> &'static str {
    keyword_reply(prompt).unwrap_or_else(|| CHAT_REPLIES[rand::rng().random_range(0..CHAT_REPLIES.len())])
}

async fn simulate_latency(range: LatencyRange) {
    let delay = sample_latency(range);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

// =============================================================================
// MOCK RESPONDER
// =============================================================================

/// [`ResponseSource`] that answers from canned tables.
#[derive(Debug, Clone, Copy)]
pub struct MockResponder {
    config: DashboardConfig,
}

impl MockResponder {
    #[must_use]
    pub fn new(config: DashboardConfig) -> Self {
        Self { config }
    }

    /// Run the injected-failure lottery for one call.
    async fn maybe_fail(&self, rate: f64, operation: &'static str) -> Result<(), RequestError> {
        if roll_failure(rate) {
            simulate_latency(self.config.latencies.failure).await;
            warn!(operation, "mock: injected failure");
            return Err(RequestError::failed(NETWORK_ERROR_MESSAGE));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ResponseSource for MockResponder {
    /// Must be called from within a Tokio runtime; the fragments are
    /// produced by a spawned task.
    fn stream_response(&self, prompt: &str) -> FragmentStream {
        let (tx, stream) = FragmentStream::channel(FRAGMENT_BUFFER);
        let reply = pick_chat_reply(prompt);
        let fail = roll_failure(self.config.error_rates.chat);
        let latencies = self.config.latencies;

        tokio::spawn(async move {
            if fail {
                simulate_latency(latencies.failure).await;
                warn!(operation = "chat", "mock: injected failure");
                let _ = tx.send(Err(RequestError::failed(NETWORK_ERROR_MESSAGE))).await;
                return;
            }

            simulate_latency(latencies.chat).await;
            for fragment in word_fragments(reply) {
                simulate_latency(latencies.token).await;
                if tx.send(Ok(fragment)).await.is_err() {
                    debug!("mock: chat stream consumer dropped");
                    return;
                }
            }
        });

        stream
    }

    async fn fetch_result(&self, query: &str) -> Result<SearchResult, RequestError> {
        self.maybe_fail(self.config.error_rates.search, "search")
            .await?;
        simulate_latency(self.config.latencies.search).await;
        let topic = classify_query(query);
        debug!(?topic, "mock: search answered");
        Ok(canned_result(topic))
    }

    async fn fetch_field_suggestions(&self, field: &str, partial: &str) -> Result<Vec<String>, RequestError> {
        self.maybe_fail(self.config.error_rates.suggest, "suggest")
            .await?;
        simulate_latency(self.config.latencies.suggest).await;
        Ok(match_suggestions(field, partial))
    }

    async fn validate(&self, fields: &FormFields) -> Result<Validation, RequestError> {
        self.maybe_fail(self.config.error_rates.validate, "validate")
            .await?;
        simulate_latency(self.config.latencies.validate).await;
        Ok(validate_fields(fields))
    }
}

#[cfg(test)]
#[path = "mock_test.rs"]
mod tests;
