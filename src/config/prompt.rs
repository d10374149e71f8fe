use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use log::info;

use crate::models::chat::ChatMessage;

pub const DEFAULT_PREAMBLE: &str =
    "You are a helpful assistant for the HCT Survival Prediction Tool.\nUse the following context to answer the user's question:";

/// Disease background, C-index explanation and the race-fairness adjustment rationale.
pub const DEFAULT_REFERENCE: &str = include_str!("../../prompts/hct_reference.txt");

#[derive(Debug)]
pub enum PromptError {
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

fn default_preamble() -> String {
    DEFAULT_PREAMBLE.to_string()
}

fn default_reference() -> String {
    DEFAULT_REFERENCE.trim_end().to_string()
}

/// Static parts of the chat prompt. Loaded once and shared by every request.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PromptConfig {
    #[serde(default = "default_preamble")]
    pub preamble: String,
    #[serde(default = "default_reference")]
    pub reference: String,
    #[serde(skip)]
    pub last_loaded: Option<SystemTime>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            preamble: default_preamble(),
            reference: default_reference(),
            last_loaded: None,
        }
    }
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(path.as_ref())?;
    let mut config: PromptConfig = serde_json::from_str(&file_content)?;
    config.last_loaded = Some(SystemTime::now());
    info!("Loaded prompts from '{}'", path.as_ref().display());
    Ok(Arc::new(config))
}

/// Returns the freshly loaded config when the file changed since `current_config` was loaded.
pub fn reload_prompts_if_changed<P: AsRef<Path>>(
    path: P,
    current_config: &Arc<PromptConfig>
) -> Result<Option<Arc<PromptConfig>>, PromptError> {
    let metadata = fs::metadata(&path)?;

    match (metadata.modified().ok(), current_config.last_loaded) {
        (Some(modified), Some(last_loaded)) if modified <= last_loaded => Ok(None),
        (None, Some(_)) => Ok(None),
        _ => {
            info!("Prompts file changed, reloading...");
            load_prompts(path).map(Some)
        }
    }
}

pub fn format_history_lines(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|msg| format!("{}: {}", msg.role, msg.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_chat_prompt(
    config: &PromptConfig,
    model: &str,
    history: &[ChatMessage],
    message: &str
) -> String {
    format!(
        "Your model is {model}\n{preamble}\n\nContext:\n{history}\n\n{reference}\n\nQuestion: {message}\n\nAnswer:",
        model = model,
        preamble = config.preamble,
        history = format_history_lines(history),
        reference = config.reference,
        message = message
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "deepseek/deepseek-r1-distill-llama-70b:free";

    #[test]
    fn prompt_contains_every_section_in_order() {
        let config = PromptConfig::default();
        let history = vec![
            ChatMessage::assistant("Hi, how can I assist you today?"),
            ChatMessage::user("What is HCT?"),
            ChatMessage::assistant("Hematopoietic cell transplantation."),
        ];
        let prompt = build_chat_prompt(&config, MODEL, &history, "What is DRI score?");

        let preamble = prompt.find(DEFAULT_PREAMBLE).unwrap();
        let first = prompt.find("assistant: Hi, how can I assist you today?").unwrap();
        let second = prompt.find("user: What is HCT?").unwrap();
        let third = prompt.find("assistant: Hematopoietic cell transplantation.").unwrap();
        let reference = prompt.find(config.reference.as_str()).unwrap();
        let question = prompt.find("Question: What is DRI score?").unwrap();

        assert!(preamble < first && first < second && second < third);
        assert!(third < reference && reference < question);
        assert!(prompt.starts_with(&format!("Your model is {}", MODEL)));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn history_lines_are_newline_joined() {
        let history = vec![ChatMessage::user("a"), ChatMessage::assistant("b")];
        assert_eq!(format_history_lines(&history), "user: a\nassistant: b");
    }

    #[test]
    fn empty_history_keeps_static_sections() {
        let config = PromptConfig::default();
        let prompt = build_chat_prompt(&config, MODEL, &[], "What is C-index?");
        assert!(prompt.contains(DEFAULT_PREAMBLE));
        assert!(prompt.contains("Context:\n\n"));
        assert!(prompt.contains(config.reference.as_str()));
        assert!(prompt.contains("Question: What is C-index?"));
    }

    #[test]
    fn reference_does_not_depend_on_input() {
        let config = PromptConfig::default();
        let a = build_chat_prompt(&config, MODEL, &[], "one");
        let b = build_chat_prompt(&config, MODEL, &[ChatMessage::user("x")], "two");
        assert!(a.contains(config.reference.as_str()));
        assert!(b.contains(config.reference.as_str()));
        assert!(config.reference.contains("concordance index (C-index)"));
    }

    #[test]
    fn prompt_file_overrides_only_given_fields() {
        let path = std::env::temp_dir().join(format!("hct-prompts-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, r#"{"preamble":"You answer transplant questions."}"#).unwrap();

        let config = load_prompts(&path).unwrap();
        assert_eq!(config.preamble, "You answer transplant questions.");
        assert_eq!(config.reference, default_reference());
        assert!(config.last_loaded.is_some());

        assert!(reload_prompts_if_changed(&path, &config).unwrap().is_none());
        let unloaded = Arc::new(PromptConfig::default());
        assert!(reload_prompts_if_changed(&path, &unloaded).unwrap().is_some());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn malformed_prompt_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("hct-prompts-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_prompts(&path), Err(PromptError::JsonError(_))));
        fs::remove_file(&path).unwrap();
    }
}
