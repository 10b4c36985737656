use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::types::Todo;

pub const UNKNOWN_SESSION: &str = "unknown";
pub const EXIT_ALLOW: i32 = 0;
pub const EXIT_BLOCK: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum HookStage {
    /// A user directive arrived.
    UserPromptSubmit,
    /// The agent submitted a plan for approval.
    PlanSubmit,
    /// The agent is about to write its todo list.
    TodoPre,
    /// The agent's todo list was written.
    TodoPost,
}

impl HookStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserPromptSubmit => "user_prompt_submit",
            Self::PlanSubmit => "plan_submit",
            Self::TodoPre => "todo_pre",
            Self::TodoPost => "todo_post",
        }
    }
}

fn unknown_session() -> String {
    UNKNOWN_SESSION.to_string()
}

/// Null becomes `unknown`; non-string ids keep their JSON text.
fn session_or_unknown<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => unknown_session(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn todos_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Todo>, D::Error> {
    Ok(Option::<Vec<Todo>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptInput {
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "unknown_session", deserialize_with = "session_or_unknown")]
    pub session_id: String,
}

/// Tool-use hooks carry the tool's arguments under `parameters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUseInput {
    #[serde(default = "unknown_session", deserialize_with = "session_or_unknown")]
    pub session_id: String,
    #[serde(default)]
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanParameters {
    pub plan: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodoParameters {
    #[serde(default, deserialize_with = "todos_or_empty")]
    pub todos: Vec<Todo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookAction {
    Pass,
    /// Pass, with context for the agent on stdout.
    Inject,
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOutcome {
    pub action: HookAction,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl HookOutcome {
    pub fn pass() -> Self {
        Self {
            action: HookAction::Pass,
            stdout: None,
            stderr: None,
        }
    }

    pub fn inject(context: String) -> Self {
        Self {
            action: HookAction::Inject,
            stdout: Some(context),
            stderr: None,
        }
    }

    pub fn block(feedback: String) -> Self {
        Self {
            action: HookAction::Block,
            stdout: None,
            stderr: Some(feedback),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.action {
            HookAction::Pass | HookAction::Inject => EXIT_ALLOW,
            HookAction::Block => EXIT_BLOCK,
        }
    }
}
