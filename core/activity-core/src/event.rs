//! Hook payloads and the events derived from them.
//!
//! The host pipes one JSON object per invocation. Two shapes are accepted:
//!
//! ```text
//! kind = tool_invocation | session_start | session_stop   (generic schema)
//! hook_event_name = PreToolUse | PostToolUse               → tool invocation
//! hook_event_name = SubagentStart                          → session start
//! hook_event_name = SubagentStop                           → session stop
//! ```
//!
//! Anything else maps to `None`: the recorder writes nothing and succeeds, so
//! event kinds the host adds later pass through untouched.

use serde::{Deserialize, Serialize};

/// Session type recorded when the payload carries none.
pub const UNKNOWN_SESSION_TYPE: &str = "unknown";

/// Raw hook payload. Every field is optional; unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub hook_event_name: Option<String>,

    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub tool_input: Option<ToolInput>,

    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub session_type: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub agent_type: Option<String>,
}

/// The subset of a tool's arguments worth recording.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolInput {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub subagent_type: Option<String>,
}

/// Discriminator written into every audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ToolInvocation,
    SessionStart,
    SessionStop,
}

impl EventKind {
    fn from_kind(value: &str) -> Option<Self> {
        match value {
            "tool_invocation" => Some(EventKind::ToolInvocation),
            "session_start" => Some(EventKind::SessionStart),
            "session_stop" => Some(EventKind::SessionStop),
            _ => None,
        }
    }

    fn from_hook_event_name(value: &str) -> Option<Self> {
        match value {
            "PreToolUse" | "PostToolUse" => Some(EventKind::ToolInvocation),
            "SubagentStart" => Some(EventKind::SessionStart),
            "SubagentStop" => Some(EventKind::SessionStop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    ToolInvocation {
        tool_name: String,
        description: Option<String>,
        prompt: Option<String>,
    },
    SessionStart {
        session_id: String,
        session_type: String,
    },
    SessionStop {
        session_id: String,
        session_type: String,
    },
}

impl HookEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HookEvent::ToolInvocation { .. } => EventKind::ToolInvocation,
            HookEvent::SessionStart { .. } => EventKind::SessionStart,
            HookEvent::SessionStop { .. } => EventKind::SessionStop,
        }
    }
}

impl HookInput {
    /// Classifies the payload. `kind` takes precedence over `hook_event_name`.
    pub fn to_event(&self) -> Option<HookEvent> {
        let (kind, native) = match self.kind.as_deref() {
            Some(kind) => (EventKind::from_kind(kind)?, false),
            None => (
                EventKind::from_hook_event_name(self.hook_event_name.as_deref()?)?,
                true,
            ),
        };

        match kind {
            EventKind::ToolInvocation => Some(HookEvent::ToolInvocation {
                tool_name: non_empty(self.tool_name.as_deref())?.to_string(),
                description: self.field(|i| i.description.as_deref(), self.description.as_deref()),
                prompt: self.field(|i| i.prompt.as_deref(), self.prompt.as_deref()),
            }),
            EventKind::SessionStart => Some(HookEvent::SessionStart {
                session_id: self.session_key(native)?,
                session_type: self.session_type(),
            }),
            EventKind::SessionStop => Some(HookEvent::SessionStop {
                session_id: self.session_key(native)?,
                session_type: self.session_type(),
            }),
        }
    }

    /// Top-level fields win; `tool_input` fills the gaps.
    fn field<'a>(
        &'a self,
        from_tool_input: impl Fn(&'a ToolInput) -> Option<&'a str>,
        top_level: Option<&'a str>,
    ) -> Option<String> {
        non_empty(top_level)
            .or_else(|| non_empty(self.tool_input.as_ref().and_then(from_tool_input)))
            .map(str::to_string)
    }

    // Native payloads carry the host session in `session_id` and the
    // background agent in `agent_id`; the agent is what we track.
    fn session_key(&self, native: bool) -> Option<String> {
        let id = if native {
            non_empty(self.agent_id.as_deref()).or_else(|| non_empty(self.session_id.as_deref()))
        } else {
            non_empty(self.session_id.as_deref())
        };
        id.map(str::to_string)
    }

    fn session_type(&self) -> String {
        non_empty(self.session_type.as_deref())
            .or_else(|| non_empty(self.agent_type.as_deref()))
            .or_else(|| {
                non_empty(
                    self.tool_input
                        .as_ref()
                        .and_then(|input| input.subagent_type.as_deref()),
                )
            })
            .unwrap_or(UNKNOWN_SESSION_TYPE)
            .to_string()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> HookInput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_generic_tool_invocation() {
        let input = parse(
            r#"{"kind":"tool_invocation","tool_name":"Task","description":"review","prompt":"look at main.rs"}"#,
        );
        assert_eq!(
            input.to_event(),
            Some(HookEvent::ToolInvocation {
                tool_name: "Task".to_string(),
                description: Some("review".to_string()),
                prompt: Some("look at main.rs".to_string()),
            })
        );
    }

    #[test]
    fn test_native_pre_tool_use_reads_tool_input() {
        let input = parse(
            r#"{
                "hook_event_name": "PreToolUse",
                "session_id": "host-1",
                "tool_name": "Task",
                "tool_input": {"description": "Audit deps", "prompt": "check Cargo.lock", "subagent_type": "sw-engineer"}
            }"#,
        );
        match input.to_event() {
            Some(HookEvent::ToolInvocation {
                tool_name,
                description,
                prompt,
            }) => {
                assert_eq!(tool_name, "Task");
                assert_eq!(description.as_deref(), Some("Audit deps"));
                assert_eq!(prompt.as_deref(), Some("check Cargo.lock"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_native_subagent_start_prefers_agent_id() {
        let input = parse(
            r#"{"hook_event_name":"SubagentStart","session_id":"host-1","agent_id":"a1","agent_type":"sw-engineer"}"#,
        );
        assert_eq!(
            input.to_event(),
            Some(HookEvent::SessionStart {
                session_id: "a1".to_string(),
                session_type: "sw-engineer".to_string(),
            })
        );
    }

    #[test]
    fn test_native_subagent_stop_falls_back_to_session_id() {
        let input = parse(r#"{"hook_event_name":"SubagentStop","session_id":"host-1"}"#);
        assert_eq!(
            input.to_event(),
            Some(HookEvent::SessionStop {
                session_id: "host-1".to_string(),
                session_type: UNKNOWN_SESSION_TYPE.to_string(),
            })
        );
    }

    #[test]
    fn test_kind_takes_precedence_over_hook_event_name() {
        let input = parse(
            r#"{"kind":"session_stop","hook_event_name":"SubagentStart","session_id":"s1","session_type":"qa"}"#,
        );
        assert_eq!(input.to_event().map(|e| e.kind()), Some(EventKind::SessionStop));
    }

    #[test]
    fn test_unknown_kind_is_ignored() {
        assert!(parse(r#"{"kind":"session_pause","session_id":"s1"}"#)
            .to_event()
            .is_none());
        assert!(parse(r#"{"hook_event_name":"Notification"}"#)
            .to_event()
            .is_none());
        assert!(parse(r#"{}"#).to_event().is_none());
    }

    #[test]
    fn test_session_event_without_id_is_ignored() {
        let input = parse(r#"{"kind":"session_start","session_id":"  ","session_type":"qa"}"#);
        assert!(input.to_event().is_none());
    }

    #[test]
    fn test_tool_invocation_without_tool_name_is_ignored() {
        let input = parse(r#"{"kind":"tool_invocation","prompt":"hi"}"#);
        assert!(input.to_event().is_none());
    }

    #[test]
    fn test_unknown_fields_are_tolerated() {
        let input = parse(
            r#"{"kind":"session_start","session_id":"s1","session_type":"qa","cwd":"/tmp","extra":{"a":1}}"#,
        );
        assert!(input.to_event().is_some());
    }
}
