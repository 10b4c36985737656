use serde_json::Value;

use crate::gate::{GateDecision, VeraGate};
use crate::hooks::protocol::{
    HookOutcome, HookStage, PlanParameters, PromptInput, TodoParameters, ToolUseInput,
    UNKNOWN_SESSION,
};
use crate::scorer;
use crate::types::{Directive, Plan};
use crate::verification;

/// Runs one lifecycle hook over the raw stdin payload. Unreadable input never blocks.
pub fn run_hook(gate: &VeraGate, stage: HookStage, input: &[u8]) -> HookOutcome {
    match stage {
        HookStage::UserPromptSubmit => run_user_prompt(gate, input),
        HookStage::PlanSubmit => run_plan_submit(gate, input),
        HookStage::TodoPre => run_todo_pre(gate, input),
        HookStage::TodoPost => run_todo_post(gate, input),
    }
}

fn fail_open(gate: &VeraGate, stage: HookStage, session_id: &str, error: &str) -> HookOutcome {
    tracing::debug!(stage = stage.as_str(), "malformed hook input: {error}");
    gate.record_malformed(session_id, stage.as_str(), error);
    HookOutcome::pass()
}

fn run_user_prompt(gate: &VeraGate, input: &[u8]) -> HookOutcome {
    let parsed: PromptInput = match serde_json::from_slice(input) {
        Ok(v) => v,
        Err(e) => {
            return fail_open(gate, HookStage::UserPromptSubmit, UNKNOWN_SESSION, &e.to_string())
        }
    };
    let outcome = gate.classify_directive(&Directive {
        text: parsed.prompt,
        session_id: parsed.session_id,
    });
    match outcome.brief {
        Some(brief) => HookOutcome::inject(brief),
        None => HookOutcome::pass(),
    }
}

fn parse_tool_use(input: &[u8]) -> Result<ToolUseInput, String> {
    serde_json::from_slice(input).map_err(|e| e.to_string())
}

fn run_plan_submit(gate: &VeraGate, input: &[u8]) -> HookOutcome {
    let stage = HookStage::PlanSubmit;
    let envelope = match parse_tool_use(input) {
        Ok(v) => v,
        Err(e) => return fail_open(gate, stage, UNKNOWN_SESSION, &e),
    };
    let params: PlanParameters = match serde_json::from_value(envelope.parameters) {
        Ok(p) => p,
        Err(e) => return fail_open(gate, stage, &envelope.session_id, &e.to_string()),
    };
    let review = gate.review_plan(&Plan {
        text: params.plan,
        session_id: envelope.session_id,
    });
    match review.decision {
        GateDecision::Allow => HookOutcome::pass(),
        GateDecision::Block { .. } => {
            HookOutcome::block(scorer::render_revision_request(&review.score))
        }
    }
}

fn todo_parameters(parameters: Value) -> Result<TodoParameters, String> {
    if parameters.is_null() {
        return Ok(TodoParameters::default());
    }
    serde_json::from_value(parameters).map_err(|e| e.to_string())
}

fn run_todo_pre(gate: &VeraGate, input: &[u8]) -> HookOutcome {
    let stage = HookStage::TodoPre;
    let envelope = match parse_tool_use(input) {
        Ok(v) => v,
        Err(e) => return fail_open(gate, stage, UNKNOWN_SESSION, &e),
    };
    let params = match todo_parameters(envelope.parameters) {
        Ok(p) => p,
        Err(e) => return fail_open(gate, stage, &envelope.session_id, &e),
    };
    match gate.check_todos(&envelope.session_id, &params.todos) {
        GateDecision::Allow => HookOutcome::pass(),
        GateDecision::Block { issues } => {
            HookOutcome::block(verification::render_issues(&issues))
        }
    }
}

fn run_todo_post(gate: &VeraGate, input: &[u8]) -> HookOutcome {
    let stage = HookStage::TodoPost;
    let envelope = match parse_tool_use(input) {
        Ok(v) => v,
        Err(e) => return fail_open(gate, stage, UNKNOWN_SESSION, &e),
    };
    let params = match todo_parameters(envelope.parameters) {
        Ok(p) => p,
        Err(e) => return fail_open(gate, stage, &envelope.session_id, &e),
    };
    if let Some(report) = gate.observe_todos(&envelope.session_id, &params.todos) {
        tracing::debug!(
            session = %envelope.session_id,
            completed = %report.progress.label(),
            cleared = report.cleared,
            "todo progress"
        );
    }
    HookOutcome::pass()
}
