use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub model_uri: String,
    pub completion_options: CompletionOptions,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOptions {
    pub stream: bool,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    pub result: CompletionResult,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
    #[serde(default)]
    pub model_version: Option<String>,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct Alternative {
    pub message: Message,
    #[serde(default)]
    pub status: Option<String>,
}
