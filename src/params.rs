//! Configuration held in AWS Systems Manager Parameter Store.
//!
//! Two JSON-encoded parameters are read once at cold-start: the generation
//! parameters passed to the completion model and the recommendation
//! defaults a request may override per-invocation.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Generation parameters for the completion model.
///
/// Unknown fields are kept and forwarded verbatim so operators can tune the
/// model body without a code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmParameters {
    pub temperature: f64,
    pub top_k: u32,
    pub max_tokens_to_sample: u32,
    pub stop_sequences: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl LlmParameters {
    /// Merges the rendered prompt into the stored parameters, producing the
    /// completion-model request body.
    pub fn invocation_body(&self, prompt: &str) -> Result<String> {
        let mut body = serde_json::to_value(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        body["prompt"] = serde_json::Value::String(prompt.to_string());
        serde_json::to_string(&body).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Stored recommendation defaults, overridable per request.
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationDefaults {
    /// How many item types the completion model is asked for.
    #[serde(deserialize_with = "count_from_string_or_number")]
    pub num_types: u32,
    /// How many items each vector search returns.
    #[serde(deserialize_with = "count_from_string_or_number")]
    pub num_items: u32,
    /// Completion model identifier.
    pub model_id: String,
}

/// The platform stores counts as JSON strings; accept numbers too.
fn count_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Fetches and parses a JSON-encoded parameter.
///
/// Fails with a configuration error if the parameter is missing, empty, or
/// not valid JSON for `T`; callers run this at cold-start only.
pub async fn fetch_json<T: DeserializeOwned>(
    client: &aws_sdk_ssm::Client,
    name: &str,
) -> Result<T> {
    let output = client
        .get_parameter()
        .name(name)
        .send()
        .await
        .map_err(|e| Error::Config(format!("cannot read parameter {name}: {e}")))?;
    let value = output
        .parameter
        .and_then(|p| p.value)
        .ok_or_else(|| Error::Config(format!("parameter {name} has no value")))?;
    serde_json::from_str(&value)
        .map_err(|e| Error::Config(format!("parameter {name} is not valid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommendation_defaults_should_accept_counts_as_strings() {
        let defaults: RecommendationDefaults = serde_json::from_str(
            r#"{"num_types": "1", "num_items": "3", "model_id": "anthropic.claude-v2"}"#,
        )
        .unwrap();
        assert_eq!(defaults.num_types, 1);
        assert_eq!(defaults.num_items, 3);
        assert_eq!(defaults.model_id, "anthropic.claude-v2");
    }

    #[test]
    fn recommendation_defaults_should_accept_counts_as_numbers() {
        let defaults: RecommendationDefaults = serde_json::from_str(
            r#"{"num_types": 2, "num_items": 5, "model_id": "anthropic.claude-v2"}"#,
        )
        .unwrap();
        assert_eq!(defaults.num_types, 2);
        assert_eq!(defaults.num_items, 5);
    }

    #[test]
    fn recommendation_defaults_should_reject_non_numeric_counts() {
        let result: std::result::Result<RecommendationDefaults, _> =
            serde_json::from_str(
                r#"{"num_types": "many", "num_items": "1", "model_id": "m"}"#,
            );
        assert!(result.is_err());
    }

    #[test]
    fn invocation_body_should_merge_prompt_and_keep_extra_fields() {
        let params: LlmParameters = serde_json::from_str(
            r#"{
                "temperature": 0.7,
                "top_k": 1,
                "max_tokens_to_sample": 1000,
                "stop_sequences": ["\n\nHuman:"],
                "top_p": 0.9
            }"#,
        )
        .unwrap();
        let body: serde_json::Value =
            serde_json::from_str(&params.invocation_body("Hello").unwrap())
                .unwrap();
        assert_eq!(body["prompt"], "Hello");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["top_p"], 0.9);
        assert_eq!(body["stop_sequences"][0], "\n\nHuman:");
    }
}
