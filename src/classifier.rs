//! Directive classification: decides whether a user prompt asks the agent to act on the world.

use std::sync::OnceLock;

use regex::Regex;

use crate::trust::profile::ClientProfile;

pub const ACTION_THRESHOLD: u32 = 6;

/// A weighted lexical rule. Every matching rule contributes its weight.
#[derive(Debug, Clone, Copy)]
pub struct ActionRule {
    pub name: &'static str,
    pub pattern: &'static str,
    pub weight: u32,
}

pub const ACTION_RULES: &[ActionRule] = &[
    ActionRule {
        name: "imperative_verb",
        pattern: r"\b(send|email|text|message|call|schedule|book|create|update|post|invoice|reply|respond)\b",
        weight: 4,
    },
    ActionRule {
        name: "retrieval_request",
        pattern: r"\b(find|search|look up|check|get|fetch|pull)\b.{0,20}\b(contact|email|number|file|doc)\b",
        weight: 4,
    },
    ActionRule {
        name: "follow_up",
        pattern: r"\b(remind|follow.?up|reach out|let .+ know)\b",
        weight: 4,
    },
    ActionRule {
        name: "preparatory_verb",
        pattern: r"\b(draft|write|prepare|set up|arrange|coordinate)\b",
        weight: 3,
    },
    ActionRule {
        name: "manipulation_verb",
        pattern: r"\b(add|remove|delete|move|copy|attach)\b",
        weight: 3,
    },
    ActionRule {
        name: "polite_request",
        pattern: r"\b(need|want|should|please|can you|could you)\b.{0,30}\b(send|email|call|schedule)\b",
        weight: 2,
    },
];

/// Anchored signals checked in order before any action scoring.
pub const CONVERSATIONAL_SIGNALS: &[&str] = &[
    r"^(thanks|thank you|ok|okay|got it|sounds good|perfect|great|yes|no|sure|alright)[\s!.]*$",
    r"^(what did you|did you|have you|when did|how did).{0,50}\?$",
    r"^(nice|good|excellent|wonderful|awesome)[\s!.]*$",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub is_action: bool,
    pub score: u32,
}

struct CompiledRules {
    conversational: Vec<Regex>,
    actions: Vec<(Regex, u32)>,
}

fn compiled() -> &'static CompiledRules {
    static RULES: OnceLock<CompiledRules> = OnceLock::new();
    RULES.get_or_init(|| CompiledRules {
        conversational: CONVERSATIONAL_SIGNALS
            .iter()
            .map(|p| Regex::new(p).expect("conversational signal regex"))
            .collect(),
        actions: ACTION_RULES
            .iter()
            .map(|r| (Regex::new(r.pattern).expect("action rule regex"), r.weight))
            .collect(),
    })
}

pub fn is_conversational(normalized: &str) -> bool {
    compiled().conversational.iter().any(|re| re.is_match(normalized))
}

pub fn action_score(normalized: &str) -> u32 {
    compiled()
        .actions
        .iter()
        .filter(|(re, _)| re.is_match(normalized))
        .map(|(_, weight)| weight)
        .sum()
}

pub fn classify(prompt: &str) -> Classification {
    let normalized = prompt.trim().to_lowercase();
    if is_conversational(&normalized) {
        return Classification {
            is_action: false,
            score: 0,
        };
    }
    let score = action_score(&normalized);
    Classification {
        is_action: score >= ACTION_THRESHOLD,
        score,
    }
}

/// Advisory context handed back to the agent when a directive needs a plan.
pub fn render_brief(prompt: &str, profile: Option<&ClientProfile>) -> String {
    let mut out = String::from("BLOOM DIRECTIVE DETECTED — PLAN REQUIRED\n\n");
    out.push_str(&format!("Directive: \"{prompt}\"\n\n"));

    if let Some(profile) = profile {
        out.push_str(&format!("Client: {}\n", profile.display_name()));
        let rules = profile.rules();
        if !rules.is_empty() {
            out.push_str("Client profile rules:\n");
            out.push_str(&rules.join("\n"));
            out.push_str("\n\n");
        }
    }

    out.push_str("You MUST now:\n");
    out.push_str(
        "1. Research read-only (skill docs, client profile, contacts) — no external actions yet\n",
    );
    out.push_str("2. Present your numbered plan via exit_plan_mode — name the tool, recipient, and verification method\n");
    out.push_str("3. Wait for Vera's score. ≥80 = proceed. <80 = revise and resubmit.\n");
    out.push_str("4. Execute via TodoWrite after approval. Verify before marking complete.\n");
    out
}
