use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context};
use serde::Serialize;

use crate::trust::TrustPaths;

pub const EVENT_PROMPT_SUBMIT: &str = "UserPromptSubmit";
pub const EVENT_TODO_PRE: &str = "TodoWrite.PreToolUse";
pub const EVENT_MALFORMED: &str = "Hook.MalformedInput";
pub const STATUS_GATE_CLEARED: &str = "VERA_GATE_CLEARED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStream {
    Audit,
    Plans,
    Progress,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DirectiveEvent {
    pub timestamp: String,
    pub session_id: String,
    pub event: String,
    pub is_action: bool,
    pub score: u32,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TodoCheckEvent {
    pub timestamp: String,
    pub session_id: String,
    pub event: String,
    pub blocked: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct GateClearedEvent {
    pub timestamp: String,
    pub session_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MalformedInputEvent {
    pub timestamp: String,
    pub session_id: String,
    pub event: String,
    pub stage: String,
    pub error: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PlanScoreRecord {
    pub timestamp: String,
    pub session_id: String,
    pub score: u32,
    pub status: String,
    pub feedback: Vec<String>,
    pub plan_preview: String,
    pub plan_sha256: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ProgressRecord {
    pub timestamp: String,
    pub session_id: String,
    pub completed: String,
}

/// One JSON line. Serialized without a tag so each stream keeps its flat layout.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum AuditRecord {
    Directive(DirectiveEvent),
    TodoCheck(TodoCheckEvent),
    GateCleared(GateClearedEvent),
    Malformed(MalformedInputEvent),
    PlanScore(PlanScoreRecord),
    Progress(ProgressRecord),
}

impl AuditRecord {
    pub fn stream(&self) -> AuditStream {
        match self {
            Self::Directive(_)
            | Self::TodoCheck(_)
            | Self::GateCleared(_)
            | Self::Malformed(_) => AuditStream::Audit,
            Self::PlanScore(_) => AuditStream::Plans,
            Self::Progress(_) => AuditStream::Progress,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Self::Directive(e) => &e.session_id,
            Self::TodoCheck(e) => &e.session_id,
            Self::GateCleared(e) => &e.session_id,
            Self::Malformed(e) => &e.session_id,
            Self::PlanScore(e) => &e.session_id,
            Self::Progress(e) => &e.session_id,
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn append(&self, record: &AuditRecord) -> anyhow::Result<()>;
}

/// Append-only JSONL files, one per stream.
#[derive(Debug, Clone)]
pub struct AuditLog {
    audit: PathBuf,
    plans: PathBuf,
    progress: PathBuf,
}

impl AuditLog {
    pub fn new(audit: PathBuf, plans: PathBuf, progress: PathBuf) -> Self {
        Self {
            audit,
            plans,
            progress,
        }
    }

    pub fn from_paths(paths: &TrustPaths) -> Self {
        Self::new(
            paths.audit.clone(),
            paths.plans.clone(),
            paths.progress.clone(),
        )
    }

    pub fn path_for(&self, stream: AuditStream) -> &Path {
        match stream {
            AuditStream::Audit => &self.audit,
            AuditStream::Plans => &self.plans,
            AuditStream::Progress => &self.progress,
        }
    }
}

impl AuditSink for AuditLog {
    fn append(&self, record: &AuditRecord) -> anyhow::Result<()> {
        let path = self.path_for(record.stream());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create audit dir: {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open audit log: {}", path.display()))?;
        // Whole line in one write; O_APPEND keeps concurrent sessions from splicing records.
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append audit log: {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn stream(&self, stream: AuditStream) -> Vec<AuditRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.stream() == stream)
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, record: &AuditRecord) -> anyhow::Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow!("audit buffer poisoned"))?
            .push(record.clone());
        Ok(())
    }
}
