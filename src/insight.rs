//! Domain-insight side channel.
//!
//! Sends raw document text to a domain-specialized classification model on
//! the Hugging Face inference API and returns whatever structured signal
//! comes back, purely as additional prompt material. The channel is
//! advisory-only: every failure mode — missing credential, network error,
//! non-success status, malformed body — collapses to `None` and is never
//! surfaced as an error. Running without an `HF_API_KEY` is a normal
//! operating mode, not a failure.

use std::time::Duration;

use crate::config::InsightConfig;

/// Query the configured insight model with (truncated) document text.
pub async fn augment(config: &InsightConfig, text: &str) -> Option<serde_json::Value> {
    let model = config.model.as_deref()?;

    let api_key = match std::env::var("HF_API_KEY") {
        Ok(k) => k,
        Err(_) => {
            tracing::debug!("HF_API_KEY not set, skipping domain insights");
            return None;
        }
    };

    // Truncate to the model's accepted input length on a char boundary.
    let input: String = text.chars().take(config.max_input_chars).collect();

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .ok()?;

    let url = format!("https://api-inference.huggingface.co/models/{}", model);

    let response = match client
        .post(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&serde_json::json!({ "inputs": input }))
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(model, error = %e, "insight call failed, continuing without it");
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::warn!(
            model,
            status = response.status().as_u16(),
            "insight model returned non-success, continuing without it"
        );
        return None;
    }

    match response.json::<serde_json::Value>().await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(model, error = %e, "insight response unparseable, continuing without it");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_model_configured_returns_none() {
        let config = InsightConfig::default();
        assert!(augment(&config, "some report text").await.is_none());
    }
}
