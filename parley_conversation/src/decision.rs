//! Best-effort parsing of a model's free-text action decision.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static CODE_FENCE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*\s*(.*?)\s*```$").ok());

static OBJECT_SPAN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    PublicPost,
    PrivateMessage,
    Reply,
    Silence,
}

impl Action {
    /// Case-insensitive; anything unrecognised is [`Action::Silence`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "public_post" => Self::PublicPost,
            "private_message" => Self::PrivateMessage,
            "reply" => Self::Reply,
            _ => Self::Silence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub target: Option<String>,
    pub content: Option<String>,
}

impl Decision {
    #[must_use]
    pub const fn silence() -> Self {
        Self {
            action: Action::Silence,
            target: None,
            content: None,
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    CODE_FENCE
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map_or(text, |m| m.as_str())
}

fn parse_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str(text) {
        return Some(map);
    }
    let span = OBJECT_SPAN.as_ref()?.find(text)?;
    match serde_json::from_str(span.as_str()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn field_text(map: &serde_json::Map<String, Value>, field: &str) -> Option<String> {
    match map.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Parse model output into a [`Decision`].
///
/// Accepts a bare JSON object, one wrapped in a Markdown code fence, or one
/// embedded in surrounding prose. Never fails: empty, garbage or
/// unrecognised output is [`Action::Silence`].
#[must_use]
pub fn parse_decision(text: &str) -> Decision {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Decision::silence();
    }
    let Some(map) = parse_object(strip_code_fence(trimmed)) else {
        return Decision::silence();
    };
    let action = field_text(&map, "action").map_or(Action::Silence, |a| Action::from_label(&a));
    Decision {
        action,
        target: field_text(&map, "target"),
        content: field_text(&map, "content"),
    }
}

/// Whether `target` uses the `agent_<id>` token form.
#[must_use]
pub fn is_agent_token(target: &str) -> bool {
    let target = target.trim();
    target
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("agent_"))
        && parse_agent_target(target).is_some()
}

/// Resolve `"7"`, `"agent_7"` or `"agent_07"` to an agent id.
#[must_use]
pub fn parse_agent_target(target: &str) -> Option<i64> {
    let target = target.trim();
    let digits = match target.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("agent_") => &target[6..],
        _ => target,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_and_garbage_parse_to_silence() {
        assert_eq!(parse_decision(r#"{"action":"silence"}"#).action, Action::Silence);
        assert_eq!(parse_decision("").action, Action::Silence);
        assert_eq!(parse_decision("   ").action, Action::Silence);
        assert_eq!(parse_decision("I think I'll wait.").action, Action::Silence);
        assert_eq!(parse_decision(r#"{"action":"dance"}"#).action, Action::Silence);
        assert_eq!(parse_decision(r#"["public_post"]"#).action, Action::Silence);
        assert_eq!(parse_decision(r#"{"target":"agent_3"}"#).action, Action::Silence);
    }

    #[test]
    fn private_message_decision() {
        let decision =
            parse_decision(r#"{"action":"private_message","target":"agent_7","content":"hi"}"#);
        assert_eq!(
            decision,
            Decision {
                action: Action::PrivateMessage,
                target: Some("agent_7".to_string()),
                content: Some("hi".to_string()),
            }
        );
    }

    #[test]
    fn action_is_case_insensitive() {
        assert_eq!(parse_decision(r#"{"action":" PUBLIC_POST "}"#).action, Action::PublicPost);
        assert_eq!(parse_decision(r#"{"action":"Reply"}"#).action, Action::Reply);
    }

    #[test]
    fn fenced_and_embedded_objects_are_found() {
        let fenced = "```json\n{\"action\": \"public_post\", \"content\": \"hello all\"}\n```";
        assert_eq!(parse_decision(fenced).action, Action::PublicPost);

        let prose = "Sure! Here is my move: {\"action\": \"reply\", \"target\": 4} Thanks.";
        let decision = parse_decision(prose);
        assert_eq!(decision.action, Action::Reply);
        assert_eq!(decision.target.as_deref(), Some("4"));
    }

    #[test]
    fn agent_targets_resolve() {
        assert_eq!(parse_agent_target("7"), Some(7));
        assert_eq!(parse_agent_target("agent_7"), Some(7));
        assert_eq!(parse_agent_target("agent_07"), Some(7));
        assert_eq!(parse_agent_target(" AGENT_12 "), Some(12));
        assert_eq!(parse_agent_target("agent_"), None);
        assert_eq!(parse_agent_target("bob"), None);
        assert_eq!(parse_agent_target("-3"), None);
    }

    #[test]
    fn only_prefixed_targets_are_agent_tokens() {
        assert!(is_agent_token("agent_03"));
        assert!(!is_agent_token("3"));
        assert!(!is_agent_token("agent_x"));
    }
}
