use std::sync::Arc;

use hex::encode as hex_encode;
use sha2::{Digest, Sha256};

use crate::classifier::{self, Classification};
use crate::hooks::config::GateMode;
use crate::scorer::{self, PlanScore};
use crate::trust::audit::{
    AuditRecord, AuditSink, DirectiveEvent, GateClearedEvent, MalformedInputEvent,
    PlanScoreRecord, ProgressRecord, TodoCheckEvent, EVENT_MALFORMED, EVENT_PROMPT_SUBMIT,
    EVENT_TODO_PRE, STATUS_GATE_CLEARED,
};
use crate::trust::profile::{ClientProfile, ProfileStore};
use crate::trust::{now_rfc3339, DEFAULT_CLIENT};
use crate::types::{Directive, Plan, Todo};
use crate::verification::{self, Progress};

pub const GATE_CLEARED_MESSAGE: &str =
    "All steps verified. Agent authorized to deliver completion message.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Block { issues: Vec<String> },
}

impl GateDecision {
    pub fn from_issues(issues: Vec<String>) -> Self {
        if issues.is_empty() {
            Self::Allow
        } else {
            Self::Block { issues }
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Block { .. })
    }
}

#[derive(Debug, Clone)]
pub struct DirectiveOutcome {
    pub classification: Classification,
    /// Present only for action directives.
    pub brief: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlanReview {
    pub score: PlanScore,
    pub decision: GateDecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionReport {
    pub progress: Progress,
    pub cleared: bool,
}

/// The four lifecycle gates over one audit sink and one profile source.
#[derive(Clone)]
pub struct VeraGate {
    audit: Arc<dyn AuditSink>,
    profiles: Arc<dyn ProfileStore>,
    client_key: String,
    mode: GateMode,
}

impl VeraGate {
    pub fn new(audit: Arc<dyn AuditSink>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            audit,
            profiles,
            client_key: DEFAULT_CLIENT.to_string(),
            mode: GateMode::Enforce,
        }
    }

    pub fn with_client(mut self, client_key: impl Into<String>) -> Self {
        self.client_key = client_key.into();
        self
    }

    pub fn with_mode(mut self, mode: GateMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> GateMode {
        self.mode
    }

    pub fn client_key(&self) -> &str {
        &self.client_key
    }

    /// The session id is not consulted; every session maps to the configured client.
    pub fn load_profile(&self) -> Option<ClientProfile> {
        match self.profiles.lookup(&self.client_key) {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(client = %self.client_key, "client profile unavailable: {e:#}");
                None
            }
        }
    }

    pub fn classify_directive(&self, directive: &Directive) -> DirectiveOutcome {
        let classification = classifier::classify(&directive.text);
        if matches!(self.mode, GateMode::Off) {
            return DirectiveOutcome {
                classification,
                brief: None,
            };
        }
        self.record(AuditRecord::Directive(DirectiveEvent {
            timestamp: now_rfc3339(),
            session_id: directive.session_id.clone(),
            event: EVENT_PROMPT_SUBMIT.to_string(),
            is_action: classification.is_action,
            score: classification.score,
        }));
        let brief = classification.is_action.then(|| {
            let profile = self.load_profile();
            classifier::render_brief(&directive.text, profile.as_ref())
        });
        DirectiveOutcome {
            classification,
            brief,
        }
    }

    pub fn review_plan(&self, plan: &Plan) -> PlanReview {
        let profile = self.load_profile();
        let score = scorer::score_plan(&plan.text, profile.as_ref());
        if matches!(self.mode, GateMode::Off) {
            return PlanReview {
                score,
                decision: GateDecision::Allow,
            };
        }
        self.record(AuditRecord::PlanScore(PlanScoreRecord {
            timestamp: now_rfc3339(),
            session_id: plan.session_id.clone(),
            score: score.score,
            status: score.status.as_str().to_string(),
            feedback: score.feedback.clone(),
            plan_preview: scorer::plan_preview(&plan.text),
            plan_sha256: sha256_hex(plan.text.as_bytes()),
        }));
        let decision = if score.approved() {
            GateDecision::Allow
        } else {
            self.enforce(GateDecision::Block {
                issues: score.feedback.clone(),
            })
        };
        PlanReview { score, decision }
    }

    pub fn check_todos(&self, session_id: &str, todos: &[Todo]) -> GateDecision {
        if matches!(self.mode, GateMode::Off) {
            return GateDecision::Allow;
        }
        let issues = verification::check_todos(todos);
        self.record(AuditRecord::TodoCheck(TodoCheckEvent {
            timestamp: now_rfc3339(),
            session_id: session_id.to_string(),
            event: EVENT_TODO_PRE.to_string(),
            blocked: !issues.is_empty(),
            issues: issues.clone(),
        }));
        self.enforce(GateDecision::from_issues(issues))
    }

    /// Reports progress after a todo write. Never blocks; repeated calls repeat the records.
    pub fn observe_todos(&self, session_id: &str, todos: &[Todo]) -> Option<CompletionReport> {
        if matches!(self.mode, GateMode::Off) {
            return None;
        }
        let progress = Progress::of(todos)?;
        self.record(AuditRecord::Progress(ProgressRecord {
            timestamp: now_rfc3339(),
            session_id: session_id.to_string(),
            completed: progress.label(),
        }));
        let cleared = progress.all_completed();
        if cleared {
            self.record(AuditRecord::GateCleared(GateClearedEvent {
                timestamp: now_rfc3339(),
                session_id: session_id.to_string(),
                status: STATUS_GATE_CLEARED.to_string(),
                message: GATE_CLEARED_MESSAGE.to_string(),
            }));
        }
        Some(CompletionReport { progress, cleared })
    }

    pub fn record_malformed(&self, session_id: &str, stage: &str, error: &str) {
        if matches!(self.mode, GateMode::Off) {
            return;
        }
        self.record(AuditRecord::Malformed(MalformedInputEvent {
            timestamp: now_rfc3339(),
            session_id: session_id.to_string(),
            event: EVENT_MALFORMED.to_string(),
            stage: stage.to_string(),
            error: error.to_string(),
        }));
    }

    fn enforce(&self, decision: GateDecision) -> GateDecision {
        match (&decision, self.mode) {
            (GateDecision::Block { issues }, GateMode::Observe) => {
                tracing::info!(issues = issues.len(), "observe mode: block downgraded to allow");
                GateDecision::Allow
            }
            _ => decision,
        }
    }

    fn record(&self, record: AuditRecord) {
        if let Err(e) = self.audit.append(&record) {
            tracing::warn!(session = %record.session_id(), "failed to append audit log: {e:#}");
        }
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(hasher.finalize())
}
