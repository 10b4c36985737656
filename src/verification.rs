//! Todo-list checks run around the host's todo write: issues before it commits, progress after.

use crate::types::{Todo, TodoStatus};

pub const MIN_EVIDENCE_CHARS: usize = 25;
pub const FAILURE_TOKENS: &[&str] = &["error", "failed", "couldn't", "unable", "no result"];

pub const ISSUE_MULTIPLE_IN_PROGRESS: &str =
    "VERA: Multiple steps in_progress. Complete current step before starting next.";

/// Every issue found in `todos`, in list order. Empty means the write may proceed.
pub fn check_todos(todos: &[Todo]) -> Vec<String> {
    let mut issues = Vec::new();

    let in_progress = todos
        .iter()
        .filter(|t| t.status == TodoStatus::InProgress)
        .count();
    if in_progress > 1 {
        issues.push(ISSUE_MULTIPLE_IN_PROGRESS.to_string());
    }

    for todo in todos.iter().filter(|t| t.status == TodoStatus::Completed) {
        let evidence = todo.evidence();
        if todo.requires_evidence() && evidence.is_empty() {
            issues.push(format!(
                "VERA: '{}' needs verification_evidence. Go check and report what you observed.",
                todo.content
            ));
        } else if !evidence.is_empty() && evidence.chars().count() < MIN_EVIDENCE_CHARS {
            issues.push(format!(
                "VERA: Evidence too vague: \"{evidence}\". Be specific about what you saw."
            ));
        }

        if indicates_failure(evidence) {
            issues.push(format!(
                "VERA: '{}' evidence indicates failure. Resolve before marking complete.",
                todo.content
            ));
        }
    }

    issues
}

pub fn indicates_failure(evidence: &str) -> bool {
    let lower = evidence.to_lowercase();
    FAILURE_TOKENS.iter().any(|t| lower.contains(t))
}

/// Issues as the agent sees them: one paragraph each.
pub fn render_issues(issues: &[String]) -> String {
    issues.join("\n\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn of(todos: &[Todo]) -> Option<Self> {
        if todos.is_empty() {
            return None;
        }
        Some(Self {
            completed: todos
                .iter()
                .filter(|t| t.status == TodoStatus::Completed)
                .count(),
            total: todos.len(),
        })
    }

    pub fn all_completed(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.completed, self.total)
    }
}
