//! Generative-model client and response normalization.
//!
//! Supports two providers (OpenAI chat completions and Gemini
//! generateContent) in two modes:
//! - **structured** — the model is asked to return a function-call payload
//!   with four named fields (`key_findings`, `reasoning_steps`,
//!   `recommendations`, `full_summary`);
//! - **freetext** — the model returns prose, parsed heuristically.
//!
//! Both shapes are carried as [`GenerationResult`] and funneled through one
//! [`normalize`] function, so the orchestrator never branches on response
//! shape. Parse failures are never fatal: the free-text parser guarantees a
//! best-effort structured result, and the original response text is always
//! preserved verbatim in `full_summary`.

use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::PipelineError;
use crate::models::{GenerationResult, SummaryContent};

const FUNCTION_NAME: &str = "record_summary";

const PLACEHOLDER_FINDING: &str = "See the full summary for details.";
const PLACEHOLDER_STEP: &str = "Analysis derived from the full report text.";
const PLACEHOLDER_RECOMMENDATION: &str = "Review the full summary with a qualified clinician.";

/// JSON schema for the structured response payload.
fn summary_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "key_findings": {
                "type": "array",
                "items": { "type": "string" },
                "description": "3-5 key findings from the report"
            },
            "reasoning_steps": {
                "type": "object",
                "additionalProperties": { "type": "string" },
                "description": "Labeled step-by-step reasoning, e.g. {\"Step 1\": \"...\"}"
            },
            "recommendations": {
                "type": "array",
                "items": { "type": "string" },
                "description": "3-5 actionable recommendations"
            },
            "full_summary": {
                "type": "string",
                "description": "Complete narrative summary"
            }
        },
        "required": ["key_findings", "reasoning_steps", "recommendations", "full_summary"]
    })
}

/// Call the configured generative model with an assembled prompt.
///
/// Provider and mode come from configuration, never from call sites.
pub async fn call_generation(
    config: &GenerationConfig,
    prompt: &str,
) -> Result<GenerationResult, PipelineError> {
    match config.provider.as_str() {
        "openai" => call_openai(config, prompt).await,
        "gemini" => call_gemini(config, prompt).await,
        other => Err(PipelineError::Generation(format!(
            "unknown generation provider: {}",
            other
        ))),
    }
}

/// Convert either response shape into the canonical summary.
pub fn normalize(result: GenerationResult) -> SummaryContent {
    match result {
        GenerationResult::Structured(payload) => parse_structured(&payload),
        GenerationResult::FreeText(text) => parse_free_text(&text),
    }
}

// ============ OpenAI ============

async fn call_openai(
    config: &GenerationConfig,
    prompt: &str,
) -> Result<GenerationResult, PipelineError> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| PipelineError::Generation("OPENAI_API_KEY not set".to_string()))?;

    let url = config
        .url
        .as_deref()
        .unwrap_or("https://api.openai.com/v1/chat/completions");

    let mut body = serde_json::json!({
        "model": config.model,
        "messages": [{ "role": "user", "content": prompt }],
    });

    if config.mode == "structured" {
        body["tools"] = serde_json::json!([{
            "type": "function",
            "function": {
                "name": FUNCTION_NAME,
                "description": "Record the structured analysis of a clinical report",
                "parameters": summary_schema(),
            }
        }]);
        body["tool_choice"] = serde_json::json!({
            "type": "function",
            "function": { "name": FUNCTION_NAME }
        });
    }

    let json = post_with_retry(config, url, &body, Some(&api_key)).await?;

    let message = &json["choices"][0]["message"];

    if config.mode == "structured" {
        if let Some(arguments) = message["tool_calls"][0]["function"]["arguments"].as_str() {
            let payload: serde_json::Value = serde_json::from_str(arguments)
                .unwrap_or(serde_json::Value::Null);
            if payload.is_object() {
                return Ok(GenerationResult::Structured(payload));
            }
        }
        // The model ignored the tool; fall through to whatever prose it gave.
    }

    let text = message["content"].as_str().unwrap_or_default().to_string();
    if text.is_empty() {
        return Err(PipelineError::Generation(
            "OpenAI response contained neither a tool call nor text".to_string(),
        ));
    }
    Ok(GenerationResult::FreeText(text))
}

// ============ Gemini ============

async fn call_gemini(
    config: &GenerationConfig,
    prompt: &str,
) -> Result<GenerationResult, PipelineError> {
    let api_key = std::env::var("GEMINI_API_KEY")
        .map_err(|_| PipelineError::Generation("GEMINI_API_KEY not set".to_string()))?;

    let base = config
        .url
        .as_deref()
        .unwrap_or("https://generativelanguage.googleapis.com");
    let url = format!(
        "{}/v1beta/models/{}:generateContent?key={}",
        base, config.model, api_key
    );

    let mut body = serde_json::json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
    });

    if config.mode == "structured" {
        body["tools"] = serde_json::json!([{
            "function_declarations": [{
                "name": FUNCTION_NAME,
                "description": "Record the structured analysis of a clinical report",
                "parameters": summary_schema(),
            }]
        }]);
        body["tool_config"] = serde_json::json!({
            "function_calling_config": { "mode": "ANY" }
        });
    }

    let json = post_with_retry(config, &url, &body, None).await?;

    let parts = json["candidates"][0]["content"]["parts"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    if config.mode == "structured" {
        for part in &parts {
            let args = &part["functionCall"]["args"];
            if args.is_object() {
                return Ok(GenerationResult::Structured(args.clone()));
            }
        }
    }

    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");
    if text.is_empty() {
        return Err(PipelineError::Generation(
            "Gemini response contained neither a function call nor text".to_string(),
        ));
    }
    Ok(GenerationResult::FreeText(text))
}

/// POST with the same 429/5xx/network retry policy the embedding clients use.
async fn post_with_retry(
    config: &GenerationConfig,
    url: &str,
    body: &serde_json::Value,
    bearer: Option<&str>,
) -> Result<serde_json::Value, PipelineError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| PipelineError::Generation(e.to_string()))?;

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(key) = bearer {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json()
                        .await
                        .map_err(|e| PipelineError::Generation(e.to_string()));
                }

                let body_text = response.text().await.unwrap_or_default();

                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(PipelineError::provider(status.as_u16(), body_text));
                    continue;
                }

                return Err(PipelineError::provider(status.as_u16(), body_text));
            }
            Err(e) => {
                last_err = Some(PipelineError::Generation(e.to_string()));
                continue;
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| PipelineError::Generation("generation failed after retries".to_string())))
}

// ============ Structured payload parsing ============

/// Map a function-call payload onto [`SummaryContent`].
///
/// Missing or empty fields get single-item placeholder defaults so the
/// summary's lists are never empty. A missing `full_summary` synthesizes a
/// brief narrative from the findings and recommendations. Reasoning steps
/// keep the payload's own order (`serde_json/preserve_order`); a key-sorted
/// map would scramble ten or more steps ("Step 1", "Step 10", "Step 2").
pub fn parse_structured(payload: &serde_json::Value) -> SummaryContent {
    let key_findings = string_list(&payload["key_findings"], PLACEHOLDER_FINDING);
    let recommendations = string_list(&payload["recommendations"], PLACEHOLDER_RECOMMENDATION);

    let mut reasoning_steps: Vec<(String, String)> = payload["reasoning_steps"]
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();
    if reasoning_steps.is_empty() {
        reasoning_steps.push(("Step 1".to_string(), PLACEHOLDER_STEP.to_string()));
    }

    let full_summary = match payload["full_summary"].as_str() {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => format!(
            "Key findings: {} Recommendations: {}",
            key_findings.join(" "),
            recommendations.join(" ")
        ),
    };

    SummaryContent {
        key_findings,
        reasoning_steps,
        recommendations,
        full_summary,
    }
}

fn string_list(value: &serde_json::Value, placeholder: &str) -> Vec<String> {
    let items: Vec<String> = value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default();

    if items.is_empty() {
        vec![placeholder.to_string()]
    } else {
        items
    }
}

// ============ Free-text parsing ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    KeyFindings,
    Reasoning,
    Recommendations,
}

/// Heuristic free-text section parser.
///
/// A small line classifier: each line is a bullet (`-`, `•`, `*`, or a
/// digit followed by `.`), a header (contains one of the case-insensitive
/// section keywords), or plain text — in that order, so a list item whose
/// text mentions a section keyword stays an item. Bullets accumulate into
/// the section opened by the most recent header; bullets before any header
/// are ignored. Sections with no bullets fall back to a single placeholder
/// entry. `full_summary` is always the entire unmodified input.
pub fn parse_free_text(text: &str) -> SummaryContent {
    let mut key_findings = Vec::new();
    let mut reasoning_texts: Vec<String> = Vec::new();
    let mut recommendations = Vec::new();
    let mut section = Section::None;

    for line in text.lines() {
        if let Some(item) = bullet_text(line) {
            if item.is_empty() {
                continue;
            }
            match section {
                Section::KeyFindings => key_findings.push(item.to_string()),
                Section::Reasoning => reasoning_texts.push(item.to_string()),
                Section::Recommendations => recommendations.push(item.to_string()),
                Section::None => {}
            }
            continue;
        }

        if let Some(next) = classify_header(line) {
            section = next;
        }
    }

    if key_findings.is_empty() {
        key_findings.push(PLACEHOLDER_FINDING.to_string());
    }
    if recommendations.is_empty() {
        recommendations.push(PLACEHOLDER_RECOMMENDATION.to_string());
    }

    let reasoning_steps: Vec<(String, String)> = if reasoning_texts.is_empty() {
        vec![("Step 1".to_string(), PLACEHOLDER_STEP.to_string())]
    } else {
        reasoning_texts
            .into_iter()
            .enumerate()
            .map(|(i, t)| (format!("Step {}", i + 1), t))
            .collect()
    };

    SummaryContent {
        key_findings,
        reasoning_steps,
        recommendations,
        full_summary: text.to_string(),
    }
}

fn classify_header(line: &str) -> Option<Section> {
    let lower = line.to_lowercase();
    if lower.contains("key findings") {
        Some(Section::KeyFindings)
    } else if lower.contains("reasoning")
        || lower.contains("step-by-step")
        || lower.contains("step by step")
    {
        Some(Section::Reasoning)
    } else if lower.contains("recommendations") {
        Some(Section::Recommendations)
    } else {
        None
    }
}

/// Strip a bullet marker, returning the item text. `None` for non-bullets.
fn bullet_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();

    for marker in ['-', '•'] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            return Some(rest.trim());
        }
    }

    // A lone asterisk is a bullet; a doubled one opens markdown bold,
    // typically a header like "**Key Findings:**".
    if let Some(rest) = trimmed.strip_prefix('*') {
        if !rest.starts_with('*') {
            return Some(rest.trim());
        }
    }

    // "1. item" style
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = trimmed[digits..].strip_prefix('.') {
            return Some(rest.trim());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_findings_and_recommendations() {
        let text = "Key Findings:\n- A\n- B\nRecommendations:\n- C";
        let summary = parse_free_text(text);
        assert_eq!(summary.key_findings, vec!["A", "B"]);
        assert_eq!(summary.recommendations, vec!["C"]);
        assert_eq!(summary.reasoning_steps.len(), 1);
        assert_eq!(summary.reasoning_steps[0].0, "Step 1");
        assert_eq!(summary.full_summary, text);
    }

    #[test]
    fn test_no_headers_still_structured() {
        let text = "The scan shows no abnormalities and everything looks fine.";
        let summary = parse_free_text(text);
        assert!(!summary.key_findings.is_empty());
        assert!(!summary.reasoning_steps.is_empty());
        assert!(!summary.recommendations.is_empty());
        assert_eq!(summary.full_summary, text);
    }

    #[test]
    fn test_reasoning_steps_labeled_sequentially() {
        let text = "Step-by-step reasoning:\n1. Examined the values.\n2. Compared to baseline.\n3. Drew conclusions.";
        let summary = parse_free_text(text);
        assert_eq!(summary.reasoning_steps.len(), 3);
        assert_eq!(summary.reasoning_steps[0], ("Step 1".to_string(), "Examined the values.".to_string()));
        assert_eq!(summary.reasoning_steps[2].0, "Step 3");
    }

    #[test]
    fn test_bullet_marker_variants() {
        let text = "KEY FINDINGS\n• unicode bullet\n* asterisk bullet\n- dash bullet\n12. numbered bullet";
        let summary = parse_free_text(text);
        assert_eq!(
            summary.key_findings,
            vec!["unicode bullet", "asterisk bullet", "dash bullet", "numbered bullet"]
        );
    }

    #[test]
    fn test_headers_case_insensitive() {
        let text = "key findings:\n- x\nRECOMMENDATIONS\n- y";
        let summary = parse_free_text(text);
        assert_eq!(summary.key_findings, vec!["x"]);
        assert_eq!(summary.recommendations, vec!["y"]);
    }

    #[test]
    fn test_bullet_mentioning_section_keyword_stays_an_item() {
        let text = "Key Findings:\n\
                    - recommendations were discussed with the patient\n\
                    - elevated WBC\n\
                    Recommendations:\n\
                    - repeat the panel in two weeks";
        let summary = parse_free_text(text);
        assert_eq!(
            summary.key_findings,
            vec![
                "recommendations were discussed with the patient",
                "elevated WBC"
            ]
        );
        assert_eq!(summary.recommendations, vec!["repeat the panel in two weeks"]);
    }

    #[test]
    fn test_bold_markdown_headers_open_sections() {
        let text = "**Key Findings:**\n- x\n**Recommendations:**\n- y";
        let summary = parse_free_text(text);
        assert_eq!(summary.key_findings, vec!["x"]);
        assert_eq!(summary.recommendations, vec!["y"]);
    }

    #[test]
    fn test_bullets_before_any_header_ignored() {
        let text = "- stray bullet\nKey Findings:\n- real finding";
        let summary = parse_free_text(text);
        assert_eq!(summary.key_findings, vec!["real finding"]);
    }

    #[test]
    fn test_full_summary_verbatim_even_with_trailing_whitespace() {
        let text = "Key Findings:\n- A\n\n   ";
        let summary = parse_free_text(text);
        assert_eq!(summary.full_summary, text);
    }

    #[test]
    fn test_parse_structured_complete() {
        let payload = serde_json::json!({
            "key_findings": ["Elevated WBC", "Mild anemia"],
            "reasoning_steps": { "Step 1": "Reviewed CBC panel." },
            "recommendations": ["Repeat CBC in 2 weeks"],
            "full_summary": "The panel shows elevated WBC with mild anemia."
        });
        let summary = parse_structured(&payload);
        assert_eq!(summary.key_findings.len(), 2);
        assert_eq!(summary.reasoning_steps[0].0, "Step 1");
        assert_eq!(summary.recommendations, vec!["Repeat CBC in 2 weeks"]);
        assert_eq!(summary.full_summary, "The panel shows elevated WBC with mild anemia.");
    }

    #[test]
    fn test_parse_structured_keeps_step_order_past_nine() {
        let mut steps = serde_json::Map::new();
        for i in 1..=12 {
            steps.insert(
                format!("Step {}", i),
                serde_json::Value::String(format!("reasoning {}", i)),
            );
        }
        let payload = serde_json::json!({ "reasoning_steps": steps });

        let summary = parse_structured(&payload);
        let labels: Vec<&str> = summary
            .reasoning_steps
            .iter()
            .map(|(label, _)| label.as_str())
            .collect();
        // Lexicographic key order would put "Step 10" before "Step 2".
        assert_eq!(labels[1], "Step 2");
        assert_eq!(labels[9], "Step 10");
        assert_eq!(labels[11], "Step 12");
    }

    #[test]
    fn test_parse_structured_missing_fields_get_placeholders() {
        let payload = serde_json::json!({ "key_findings": ["Only finding"] });
        let summary = parse_structured(&payload);
        assert_eq!(summary.key_findings, vec!["Only finding"]);
        assert_eq!(summary.reasoning_steps.len(), 1);
        assert_eq!(summary.recommendations.len(), 1);
        assert!(!summary.full_summary.is_empty());
    }

    #[test]
    fn test_normalize_both_variants() {
        let structured = normalize(GenerationResult::Structured(serde_json::json!({
            "key_findings": ["F"],
            "reasoning_steps": { "Step 1": "R" },
            "recommendations": ["C"],
            "full_summary": "S"
        })));
        assert_eq!(structured.full_summary, "S");

        let freetext = normalize(GenerationResult::FreeText(
            "Key Findings:\n- F".to_string(),
        ));
        assert_eq!(freetext.key_findings, vec!["F"]);
        assert_eq!(freetext.full_summary, "Key Findings:\n- F");
    }
}
