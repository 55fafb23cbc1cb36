use std::time::Instant;

use agent_core::{
    OracleError, OracleInput, OracleRequest, OracleResponse, PlanningOracle, ResponseItem,
    SafetyCheck, SurfaceCapabilities,
};
use action_primitives::RawAction;
use async_trait::async_trait;
use paperpilot_core_types::EnvironmentKind;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use crate::config::OracleSettings;

const TOOL_TYPE: &str = "computer_use_preview";

/// Planning oracle backed by the OpenAI Responses API computer-use tool.
pub struct OpenAiComputerUseOracle {
    client: Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl OpenAiComputerUseOracle {
    pub fn new(settings: &OracleSettings) -> Result<Self, OracleError> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| OracleError::Config("missing OpenAI API key".to_string()))?
            .to_string();
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|err| OracleError::Config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.api_base)
    }
}

#[async_trait]
impl PlanningOracle for OpenAiComputerUseOracle {
    fn name(&self) -> &str {
        "openai"
    }

    async fn consult(&self, request: OracleRequest) -> Result<OracleResponse, OracleError> {
        let body = build_request_body(&self.model, &request);
        let started = Instant::now();

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| OracleError::Transport(format!("openai request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            warn!(
                target: "openai",
                status = status.as_u16(),
                "computer-use request rejected"
            );
            return Err(OracleError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let payload: JsonValue = response
            .json()
            .await
            .map_err(|err| OracleError::Decode(format!("openai response invalid: {err}")))?;
        let parsed = parse_response(payload)?;
        debug!(
            target: "openai",
            response_id = %parsed.conversation,
            items = parsed.items.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "computer-use response received"
        );
        Ok(parsed)
    }
}

fn tool_declaration(capabilities: &SurfaceCapabilities) -> JsonValue {
    json!({
        "type": TOOL_TYPE,
        "display_width": capabilities.viewport.width,
        "display_height": capabilities.viewport.height,
        "environment": capabilities.environment.as_str(),
    })
}

/// Body of a `POST /responses` call for one turn.
pub fn build_request_body(model: &str, request: &OracleRequest) -> JsonValue {
    let mut body = json!({
        "model": model,
        "tools": [tool_declaration(&request.capabilities)],
        "truncation": "auto",
    });

    match &request.input {
        OracleInput::Initial { goal, frame } => {
            body["input"] = json!([{
                "role": "user",
                "content": [
                    { "type": "input_text", "text": goal },
                    { "type": "input_image", "image_url": frame.to_data_url() },
                ],
            }]);
        }
        OracleInput::FollowUp {
            conversation,
            call_id,
            frame,
            acknowledged_safety_checks,
        } => {
            let mut output = json!({
                "type": "computer_call_output",
                "call_id": call_id,
                "output": {
                    "type": "computer_screenshot",
                    "image_url": frame.to_data_url(),
                },
            });
            if !acknowledged_safety_checks.is_empty() {
                output["acknowledged_safety_checks"] = json!(acknowledged_safety_checks);
            }
            if request.capabilities.environment == EnvironmentKind::Browser {
                if let Some(url) = &frame.url {
                    output["current_url"] = json!(url);
                }
            }
            body["previous_response_id"] = json!(conversation.as_str());
            body["input"] = json!([output]);
        }
    }

    body
}

#[derive(Debug, Deserialize)]
struct ResponsesPayload {
    id: String,
    #[serde(default)]
    output: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputItem {
    ComputerCall {
        call_id: String,
        action: JsonValue,
        #[serde(default)]
        pending_safety_checks: Vec<SafetyCheck>,
    },
    Message {
        #[serde(default)]
        content: Vec<ContentPart>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    OutputText {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Map a Responses API body onto oracle response items. Item types other
/// than `computer_call` and `message` (e.g. `reasoning`) are skipped.
pub fn parse_response(payload: JsonValue) -> Result<OracleResponse, OracleError> {
    let payload: ResponsesPayload = serde_json::from_value(payload)
        .map_err(|err| OracleError::Decode(format!("unexpected response shape: {err}")))?;

    let mut items = Vec::new();
    for raw in payload.output {
        let item: OutputItem = serde_json::from_value(raw)
            .map_err(|err| OracleError::Decode(format!("malformed output item: {err}")))?;
        match item {
            OutputItem::ComputerCall {
                call_id,
                action,
                pending_safety_checks,
            } => items.push(ResponseItem::ActionCall {
                call_id,
                action: RawAction::new(action),
                safety_checks: pending_safety_checks,
            }),
            OutputItem::Message { content } => {
                let text: String = content
                    .into_iter()
                    .filter_map(|part| match part {
                        ContentPart::OutputText { text } => Some(text),
                        ContentPart::Other => None,
                    })
                    .collect();
                if !text.trim().is_empty() {
                    items.push(ResponseItem::Message { text });
                }
            }
            OutputItem::Other => {}
        }
    }

    Ok(OracleResponse::new(payload.id, items))
}
