// src/narrative.rs

use crate::insights::InsightReport;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Per-rollup prompts for the free-text generator. Carried in config
/// instead of process-wide state so callers can override individual
/// prompts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptSet {
    pub total_revenue: String,
    pub top_selling_items: String,
    pub spending_by_day: String,
    pub vat_anomalies: String,
    pub avg_by_conditions: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            total_revenue: "Calculate the total revenue and average order value from the dataset."
                .to_string(),
            top_selling_items:
                "Identify the top-selling items and the number of times each was sold.".to_string(),
            spending_by_day: "Provide the total spending by day of the week.".to_string(),
            vat_anomalies: "Detect any anomalies in the VAT data and list possible issues."
                .to_string(),
            avg_by_conditions:
                "Calculate the average total amount by weather condition and game day.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub prompts: PromptSet,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://integrate.api.nvidia.com/v1".to_string(),
            model: "mistralai/mixtral-8x22b-instruct-v0.1".to_string(),
            prompts: PromptSet::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Generate free-text commentary for each rollup of the report.
///
/// Strictly best-effort: a failed or misconfigured endpoint produces
/// warnings and an empty/partial result, never an error. The core report
/// is already persisted by the time this runs.
pub async fn generate_narratives(
    config: &NarrativeConfig,
    report: &InsightReport,
) -> Vec<(String, String)> {
    let Ok(api_key) = std::env::var("NARRATIVE_API_KEY") else {
        warn!("NARRATIVE_API_KEY not set — skipping narrative generation");
        return Vec::new();
    };

    let report_json = match serde_json::to_string_pretty(report) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Could not serialize report for prompts");
            return Vec::new();
        }
    };

    let client = Client::new();
    let sections = [
        ("total_revenue", &config.prompts.total_revenue),
        ("top_selling_items", &config.prompts.top_selling_items),
        ("spending_by_day", &config.prompts.spending_by_day),
        ("vat_anomalies", &config.prompts.vat_anomalies),
        ("avg_by_conditions", &config.prompts.avg_by_conditions),
    ];

    let mut narratives = Vec::new();
    for (section, prompt) in sections {
        let content = format!("{prompt}\n\nDataset insights:\n{report_json}");
        match generate_one(&client, config, &api_key, &content).await {
            Ok(text) => {
                info!(section = section, chars = text.len(), "Narrative generated");
                narratives.push((section.to_string(), text));
            }
            Err(e) => {
                warn!(section = section, error = %e, "Narrative generation failed");
            }
        }
    }
    narratives
}

async fn generate_one(
    client: &Client,
    config: &NarrativeConfig,
    api_key: &str,
    content: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    let request = ChatRequest {
        model: config.model.clone(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: content.to_string(),
        }],
        temperature: 0.5,
        max_tokens: 1024,
    };

    let url = format!("{}/chat/completions", config.base_url);
    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&request)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(format!("narrative API error {status}: {body}").into());
    }

    let chat_response: ChatResponse = response.json().await?;
    let text = chat_response
        .choices
        .first()
        .map(|c| c.message.content.trim().to_string())
        .ok_or("Empty response from narrative model")?;
    Ok(text)
}
