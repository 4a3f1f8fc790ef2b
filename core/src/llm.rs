//! LLM vendor port (C12, SPEC_FULL.md §4.12).
//!
//! The core only consumes a narrow capability behind [`LlmPort`]; the real
//! vendor adapter lives outside this crate. JSON repair and cost
//! accounting are the core's responsibility so every caller gets the same
//! guarantees regardless of which vendor answered.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct CostEstimate {
    pub cost_cents: f64,
    pub latency_ms: u64,
}

#[derive(Debug, Error, PartialEq)]
pub enum LlmError {
    #[error("vendor call timed out after {0}ms")]
    Timeout(u64),
    #[error("vendor call failed: {0}")]
    Vendor(String),
}

impl LlmError {
    pub fn code(&self) -> &'static str {
        "EXTERNAL"
    }
}

/// A narrow capability: issue one chat-style call and report usage. The
/// real HTTP client lives in the adapter that implements this outside the
/// crate; an in-crate deterministic double implements it for tests.
#[async_trait]
pub trait LlmPort: Send + Sync {
    async fn call(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> Result<LlmResponse, LlmError>;
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: String,
    pub model_name: String,
    pub input_cents_per_1k: f64,
    pub output_cents_per_1k: f64,
    pub max_tokens: u32,
    pub supports_json_mode: bool,
}

/// model id -> spec, seeded with a small built-in table and overridable
/// for tests (`parking_lot::RwLock` keeps reads cheap and lock-free of the
/// async runtime).
pub struct ModelRegistry {
    models: RwLock<HashMap<String, ModelSpec>>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        let mut models = HashMap::new();
        models.insert(
            "default".to_string(),
            ModelSpec {
                provider: "test".to_string(),
                model_name: "deterministic-double".to_string(),
                input_cents_per_1k: 0.1,
                output_cents_per_1k: 0.3,
                max_tokens: 4096,
                supports_json_mode: true,
            },
        );
        Self {
            models: RwLock::new(models),
        }
    }
}

impl ModelRegistry {
    pub fn get(&self, model_id: &str) -> Option<ModelSpec> {
        self.models.read().get(model_id).cloned()
    }

    pub fn register(&self, model_id: String, spec: ModelSpec) {
        self.models.write().insert(model_id, spec);
    }

    pub fn calculate_cost(
        &self,
        model_id: &str,
        input_tokens: u32,
        output_tokens: u32,
        latency_ms: u64,
    ) -> CostEstimate {
        let spec = self.get(model_id).unwrap_or_else(|| {
            self.get("default").expect("default model always registered")
        });
        let cost_cents = (input_tokens as f64 / 1000.0) * spec.input_cents_per_1k
            + (output_tokens as f64 / 1000.0) * spec.output_cents_per_1k;
        CostEstimate {
            cost_cents,
            latency_ms,
        }
    }
}

/// Strip markdown code fences, strip trailing commas, and extract the
/// first balanced `{...}` object — the core's JSON-repair responsibility
/// per SPEC_FULL.md §4.12.
pub fn repair_json(raw: &str) -> Option<Value> {
    let mut text = raw.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        text = stripped;
    } else if let Some(stripped) = text.strip_prefix("```") {
        text = stripped;
    }
    if let Some(stripped) = text.strip_suffix("```") {
        text = stripped;
    }
    let text = text.trim();

    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut end = None;
    for (i, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(start + i + 1);
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end?;
    let candidate = &text[start..end];
    let no_trailing_commas = strip_trailing_commas(candidate);
    serde_json::from_str(&no_trailing_commas).ok()
}

fn strip_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                i += 1;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_json_strips_markdown_fence() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(repair_json(raw), Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn repair_json_strips_trailing_comma() {
        let raw = "{\"a\": 1, \"b\": 2,}";
        assert_eq!(repair_json(raw), Some(serde_json::json!({"a": 1, "b": 2})));
    }

    #[test]
    fn repair_json_extracts_first_object_from_prose() {
        let raw = "Sure thing! {\"actionType\": \"rest\"} hope that helps.";
        assert_eq!(repair_json(raw), Some(serde_json::json!({"actionType": "rest"})));
    }

    #[test]
    fn repair_json_returns_none_for_non_json() {
        assert_eq!(repair_json("no braces here"), None);
    }

    #[test]
    fn default_model_is_registered() {
        let registry = ModelRegistry::default();
        assert!(registry.get("default").is_some());
    }

    #[test]
    fn calculate_cost_falls_back_to_default_model() {
        let registry = ModelRegistry::default();
        let cost = registry.calculate_cost("unknown-model", 1000, 1000, 50);
        assert!(cost.cost_cents > 0.0);
    }
}
