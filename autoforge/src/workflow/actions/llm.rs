//! LLM prompt actions
//!
//! Thin HTTP clients for the OpenAI and Gemini chat APIs. Transient HTTP
//! failures surface as action failures; retry policy, if any, belongs to the
//! workflow author (e.g. a retry branch), not here.

use super::{
    required_string, string_input, ActionDefinition, ActionError, ActionOutputDefinition,
    ActionParameter, ActionResult, ExecutionContext, ExecutionResult, ParamType, WorkflowAction,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Wall-clock ceiling for one LLM HTTP round trip
const LLM_TIMEOUT: Duration = Duration::from_secs(120);

fn http_client() -> ActionResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(LLM_TIMEOUT)
        .build()
        .map_err(|e| ActionError::HttpError(format!("Failed to build HTTP client: {}", e)))
}

fn api_key(env_var: &str) -> ActionResult<String> {
    std::env::var(env_var).map_err(|_| {
        ActionError::ExecutionError(format!(
            "API key not configured: set the {env_var} environment variable"
        ))
    })
}

fn response_outputs(text: String, logs: Vec<String>) -> ExecutionResult {
    let mut outputs = HashMap::new();
    outputs.insert("response".to_string(), json!(text));
    ExecutionResult::success(outputs, logs)
}

/// Action that sends a prompt to OpenAI ChatGPT
#[derive(Debug, Clone)]
pub struct AskChatGptAction {
    endpoint: String,
    api_key_env: String,
}

impl AskChatGptAction {
    /// Create the action with the default OpenAI endpoint
    pub fn new() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }

    /// Override the API endpoint (proxies, tests)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Default for AskChatGptAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WorkflowAction for AskChatGptAction {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            id: "ask-chatgpt".to_string(),
            name: "Ask ChatGPT".to_string(),
            description: "Send a prompt to OpenAI ChatGPT and get a response".to_string(),
            parameters: vec![
                ActionParameter {
                    name: "prompt".to_string(),
                    label: "Prompt".to_string(),
                    param_type: ParamType::Text,
                    required: true,
                    default_value: None,
                    description: Some("The prompt to send".to_string()),
                },
                ActionParameter {
                    name: "model".to_string(),
                    label: "Model".to_string(),
                    param_type: ParamType::String,
                    required: false,
                    default_value: Some(json!("gpt-4o")),
                    description: None,
                },
            ],
            inputs: vec![],
            outputs: vec![ActionOutputDefinition {
                name: "response".to_string(),
                output_type: ParamType::String,
                description: None,
            }],
        }
    }

    async fn execute(
        &self,
        inputs: &HashMap<String, Value>,
        _context: &ExecutionContext,
    ) -> ActionResult<ExecutionResult> {
        let prompt = required_string(inputs, "prompt")?;
        let model = string_input(inputs, "model").unwrap_or_else(|| "gpt-4o".to_string());
        let key = api_key(&self.api_key_env)?;

        tracing::debug!(model = %model, "Sending prompt to ChatGPT");

        let response = http_client()?
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(key)
            .json(&json!({
                "model": model,
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await
            .map_err(|e| ActionError::HttpError(format!("OpenAI request failed: {}", e)))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| ActionError::HttpError(format!("Invalid OpenAI response: {}", e)))?;

        if !status.is_success() {
            let message = body["error"]["message"].as_str().unwrap_or("unknown error");
            return Err(ActionError::HttpError(format!(
                "OpenAI API error ({status}): {message}"
            )));
        }

        let text = body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(response_outputs(
            text,
            vec![format!("ChatGPT responded ({model})")],
        ))
    }
}

/// Action that sends a prompt to Google Gemini
#[derive(Debug, Clone)]
pub struct AskGeminiAction {
    endpoint: String,
    api_key_env: String,
}

impl AskGeminiAction {
    /// Create the action with the default Gemini endpoint
    pub fn new() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
        }
    }

    /// Override the API endpoint (proxies, tests)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Default for AskGeminiAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WorkflowAction for AskGeminiAction {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            id: "ask-gemini".to_string(),
            name: "Ask Gemini".to_string(),
            description: "Send a prompt to Google Gemini and get a response".to_string(),
            parameters: vec![
                ActionParameter {
                    name: "prompt".to_string(),
                    label: "Prompt".to_string(),
                    param_type: ParamType::Text,
                    required: true,
                    default_value: None,
                    description: Some("The prompt to send".to_string()),
                },
                ActionParameter {
                    name: "model".to_string(),
                    label: "Model".to_string(),
                    param_type: ParamType::String,
                    required: false,
                    default_value: Some(json!("gemini-2.5-flash")),
                    description: None,
                },
            ],
            inputs: vec![],
            outputs: vec![ActionOutputDefinition {
                name: "response".to_string(),
                output_type: ParamType::String,
                description: None,
            }],
        }
    }

    async fn execute(
        &self,
        inputs: &HashMap<String, Value>,
        _context: &ExecutionContext,
    ) -> ActionResult<ExecutionResult> {
        let prompt = required_string(inputs, "prompt")?;
        let model =
            string_input(inputs, "model").unwrap_or_else(|| "gemini-2.5-flash".to_string());
        let key = api_key(&self.api_key_env)?;

        tracing::debug!(model = %model, "Sending prompt to Gemini");

        let response = http_client()?
            .post(format!(
                "{}/models/{}:generateContent",
                self.endpoint, model
            ))
            .query(&[("key", key)])
            .json(&json!({
                "contents": [{"parts": [{"text": prompt}]}],
            }))
            .send()
            .await
            .map_err(|e| ActionError::HttpError(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| ActionError::HttpError(format!("Invalid Gemini response: {}", e)))?;

        if !status.is_success() {
            let message = body["error"]["message"].as_str().unwrap_or("unknown error");
            return Err(ActionError::HttpError(format!(
                "Gemini API error ({status}): {message}"
            )));
        }

        let text = body["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(response_outputs(
            text,
            vec![format!("Gemini responded ({model})")],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::test_helpers::*;

    #[tokio::test]
    async fn test_missing_api_key_is_an_error() {
        let (context, _storage) = test_context();
        let action = AskChatGptAction {
            endpoint: "http://localhost:1".to_string(),
            api_key_env: "AUTOFORGE_TEST_UNSET_KEY".to_string(),
        };

        let mut inputs = HashMap::new();
        inputs.insert("prompt".to_string(), json!("hello"));

        let err = action.execute(&inputs, &context).await.unwrap_err();
        assert!(err.to_string().contains("AUTOFORGE_TEST_UNSET_KEY"));
    }

    #[tokio::test]
    async fn test_missing_prompt_is_invalid_input() {
        let (context, _storage) = test_context();
        let action = AskGeminiAction::new();
        assert!(action.execute(&HashMap::new(), &context).await.is_err());
    }

    #[test]
    fn test_definitions_expose_response_output() {
        for def in [
            AskChatGptAction::new().definition(),
            AskGeminiAction::new().definition(),
        ] {
            assert_eq!(def.outputs.len(), 1);
            assert_eq!(def.outputs[0].name, "response");
        }
    }
}
