use async_trait::async_trait;
use common::{MonthlyStats, format_amount};
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::error::{JobError, Result};

/// Generic advice sent when the model fails or answers in an unusable shape.
pub const FALLBACK_INSIGHTS: [&str; 3] = [
    "Your highest expense category this month might need attention.",
    "Consider setting up a budget for better financial management.",
    "Track your recurring expenses to identify potential savings.",
];

/// Turns a prompt into raw model text.
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Gemini `generateContent` over HTTP.
pub struct GeminiInsightGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiInsightGenerator {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl InsightGenerator for GeminiInsightGenerator {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| JobError::Insight(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(JobError::Insight(format!("model returned {}: {}", status, body)));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| JobError::Insight(format!("malformed response: {}", e)))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(JobError::Insight("empty response".to_string()));
        }
        Ok(text)
    }
}

/// Stand-in used when no model API key is configured. Every report then
/// carries the fallback insights.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledInsightGenerator;

#[async_trait]
impl InsightGenerator for DisabledInsightGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(JobError::Insight("insight generation is not configured".to_string()))
    }
}

/// Prompt asking for three insights about one month of figures.
pub fn build_prompt(stats: &MonthlyStats, month: &str, currency_code: &str) -> String {
    let money = |amount| format_amount(amount, currency_code);
    let categories = if stats.by_category.is_empty() {
        "none".to_string()
    } else {
        stats
            .by_category
            .iter()
            .map(|(category, amount)| format!("{}: {}", category, money(*amount)))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "Analyze this financial data and provide 3 concise, actionable insights.\n\
         Focus on spending patterns and practical advice.\n\
         Keep it friendly and conversational.\n\
         \n\
         Financial Data for {month}:\n\
         - Total Income: {income}\n\
         - Total Expenses: {expenses}\n\
         - Net Income: {net}\n\
         - Expense Categories: {categories}\n\
         \n\
         Format the response as a JSON array of strings, like this:\n\
         [\"insight 1\", \"insight 2\", \"insight 3\"]",
        month = month,
        income = money(stats.total_income),
        expenses = money(stats.total_expenses),
        net = money(stats.net()),
        categories = categories,
    )
}

/// Extracts the insight list from model output.
///
/// Markdown code fences are stripped first. The rest must be a non-empty JSON
/// array of strings.
pub fn parse_insights(raw: &str) -> Result<Vec<String>> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let insights: Vec<String> = serde_json::from_str(cleaned)
        .map_err(|e| JobError::Insight(format!("not a JSON string array: {}", e)))?;

    let insights: Vec<String> = insights
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if insights.is_empty() {
        return Err(JobError::Insight("no insights in response".to_string()));
    }
    Ok(insights)
}

/// Asks the generator for insights, falling back to [`FALLBACK_INSIGHTS`] on
/// any failure. Never fails the caller.
pub async fn generate_financial_insights(
    generator: &dyn InsightGenerator,
    stats: &MonthlyStats,
    month: &str,
    currency_code: &str,
) -> Vec<String> {
    let prompt = build_prompt(stats, month, currency_code);
    let result = match generator.generate(&prompt).await {
        Ok(raw) => parse_insights(&raw),
        Err(e) => Err(e),
    };

    result.unwrap_or_else(|e| {
        warn!("Using fallback insights for {}: {}", month, e);
        FALLBACK_INSIGHTS.iter().map(|s| s.to_string()).collect()
    })
}
