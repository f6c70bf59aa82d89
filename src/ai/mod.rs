//! AI code-assistance bridge.
//!
//! The core only builds a prompt from a realtime request, forwards it to the
//! external completion provider, and relays the response. No AI logic here.

pub mod provider;
pub mod routes;

use serde::{Deserialize, Serialize};

use crate::session::protocol::Position;

pub use provider::{AiProvider, GeminiProvider};

/// The fixed set of supported assistance requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiRequestType {
    Suggest,
    Debug,
    Optimize,
    Explain,
    Generate,
}

impl AiRequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suggest => "suggest",
            Self::Debug => "debug",
            Self::Optimize => "optimize",
            Self::Explain => "explain",
            Self::Generate => "generate",
        }
    }
}

/// Free-form request payload; which fields are required depends on the type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiPayload {
    pub prompt: Option<String>,
    pub code: Option<String>,
    pub language: Option<String>,
    pub context: Option<String>,
    pub error: Option<String>,
    pub cursor_position: Option<Position>,
}

/// A fully built provider request.
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub prompt: String,
    pub language: String,
    pub context: String,
}

/// Turn a typed request payload into a provider prompt.
/// Fails with a user-facing message when required fields are missing.
pub fn build_prompt(request_type: AiRequestType, payload: &AiPayload) -> Result<PromptRequest, String> {
    let language = payload
        .language
        .as_deref()
        .filter(|l| !l.trim().is_empty())
        .ok_or("Programming language is required")?
        .to_string();

    let code = || -> Result<&str, String> {
        payload
            .code
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| "Code is required".to_string())
    };

    let request = match request_type {
        AiRequestType::Suggest => {
            let code = code()?;
            let (line, column) = payload
                .cursor_position
                .as_ref()
                .map(|p| (p.line.to_string(), p.column.to_string()))
                .unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));
            PromptRequest {
                prompt: format!(
                    "Provide code suggestions for the following {} code at cursor position line {}, column {}:\n\n{}",
                    language, line, column, code
                ),
                context: code.to_string(),
                language,
            }
        }
        AiRequestType::Debug => {
            let code = code()?;
            let error_part = payload
                .error
                .as_deref()
                .filter(|e| !e.trim().is_empty())
                .map(|e| format!(" with error: {}", e))
                .unwrap_or_default();
            PromptRequest {
                prompt: format!(
                    "Debug the following {} code{}:\n\n{}\n\nExplain what's wrong and how to fix it.",
                    language, error_part, code
                ),
                context: code.to_string(),
                language,
            }
        }
        AiRequestType::Optimize => {
            let code = code()?;
            PromptRequest {
                prompt: format!(
                    "Optimize the following {} code for better performance and readability:\n\n{}\n\nProvide the optimized code and explain your changes.",
                    language, code
                ),
                context: code.to_string(),
                language,
            }
        }
        AiRequestType::Explain => {
            let code = code()?;
            PromptRequest {
                prompt: format!(
                    "Explain the following {} code in detail:\n\n{}\n\nProvide a clear explanation of what the code does, how it works, and any important concepts it demonstrates.",
                    language, code
                ),
                context: code.to_string(),
                language,
            }
        }
        AiRequestType::Generate => {
            let prompt = payload
                .prompt
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .ok_or("Prompt is required")?;
            PromptRequest {
                prompt: prompt.to_string(),
                context: payload.context.clone().unwrap_or_default(),
                language,
            }
        }
    };

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggest_requires_code() {
        let payload = AiPayload {
            language: Some("python".to_string()),
            ..Default::default()
        };
        assert!(build_prompt(AiRequestType::Suggest, &payload).is_err());
    }

    #[test]
    fn generate_requires_prompt_not_code() {
        let payload = AiPayload {
            prompt: Some("write a fizzbuzz".to_string()),
            language: Some("rust".to_string()),
            ..Default::default()
        };
        let req = build_prompt(AiRequestType::Generate, &payload).unwrap();
        assert_eq!(req.prompt, "write a fizzbuzz");
        assert_eq!(req.language, "rust");
    }

    #[test]
    fn debug_prompt_includes_error() {
        let payload = AiPayload {
            code: Some("x = ".to_string()),
            language: Some("python".to_string()),
            error: Some("SyntaxError".to_string()),
            ..Default::default()
        };
        let req = build_prompt(AiRequestType::Debug, &payload).unwrap();
        assert!(req.prompt.contains("with error: SyntaxError"));
    }

    #[test]
    fn missing_language_is_rejected() {
        let payload = AiPayload {
            code: Some("x = 1".to_string()),
            ..Default::default()
        };
        assert!(build_prompt(AiRequestType::Explain, &payload).is_err());
    }
}
