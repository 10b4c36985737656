//! Plan scoring. Four independent 25-point dimensions over the lowercased plan text.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::trust::profile::ClientProfile;

pub const APPROVAL_THRESHOLD: u32 = 80;
pub const DIMENSION_POINTS: u32 = 25;
pub const MAX_SCORE: u32 = 100;
pub const MIN_PLAN_CHARS: usize = 80;
pub const REPLY_MISMATCH_PENALTY: u32 = 15;
pub const PLAN_PREVIEW_CHARS: usize = 300;

pub const KNOWN_TOOLS: &[&str] = &[
    "gmail",
    "yahoo",
    "yahoo mail",
    "imessage",
    "whatsapp",
    "sms",
    "twilio",
    "google calendar",
    "calendly",
    "gohighlevel",
    "hubspot",
    "stripe",
    "quickbooks",
    "google drive",
    "nano banana",
    "ideogram",
    "dalle",
    "notion",
    "slack",
    "voice call",
    "twilio voice",
];

#[derive(Debug, Clone, Copy)]
pub struct VagueMarker {
    pub pattern: &'static str,
    /// The marker is excused when the text right after it matches this.
    pub unless_followed_by: Option<&'static str>,
}

pub const VAGUE_MARKERS: &[VagueMarker] = &[
    VagueMarker {
        pattern: r"\betc\b",
        unless_followed_by: None,
    },
    VagueMarker {
        pattern: r"\bhandle it\b",
        unless_followed_by: None,
    },
    VagueMarker {
        pattern: r"\btake care of\b",
        unless_followed_by: None,
    },
    VagueMarker {
        pattern: r"\bcomplete the request\b",
        unless_followed_by: None,
    },
    VagueMarker {
        pattern: r"\bdo the task\b",
        unless_followed_by: None,
    },
    VagueMarker {
        pattern: r"\bsend the email\b",
        unless_followed_by: Some(r"^\s+to\s+\w"),
    },
    VagueMarker {
        pattern: r"\band so on\b",
        unless_followed_by: None,
    },
];

const ACTION_PLAN_PATTERN: &str =
    r"\b(send|email|text|message|call|schedule|create|update|post|invoice|reply)\b";
const VERIFICATION_PATTERN: &str = r"\b(verif\w*|confirm\w*|check.*sent|read.*back|confirm.*delivered|sent folder|delivery receipt|check.*calendar)\b";
const REPLY_PATTERN: &str = r"\b(reply|respond|response)\b";
// `from:` is followed by a space in practice, so it must not demand a trailing word boundary.
const SOURCE_CHECK_PATTERN: &str = r"\bfrom:|\b(inbound|source|original.*email|same.*channel)\b";

const FEEDBACK_TOOL: &str = "Tool specificity (0/25): Name the exact tool. Not 'send an email' — 'send via Gmail' or 'send via Yahoo'.";
const FEEDBACK_VERIFICATION: &str = "Verification coverage (0/25): Add a verification step. How will you confirm it actually happened?";
const FEEDBACK_VAGUE: &str =
    "Language quality (0/25): Remove vague language ('etc', 'handle it'). Be specific.";
const FEEDBACK_BRIEF: &str =
    "Language quality (0/25): Plan is too brief. Include steps, tool, recipient, and verification.";
const FEEDBACK_PROFILE: &str = "Client profile (10/25): Read the From: header. Match outbound tool to inbound source domain.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    ToolSpecificity,
    VerificationCoverage,
    LanguageQuality,
    ClientProfileMatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionScore {
    pub dimension: Dimension,
    pub points: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Approved,
    Returned,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Returned => "RETURNED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanScore {
    pub score: u32,
    pub feedback: Vec<String>,
    pub status: PlanStatus,
    pub dimensions: Vec<DimensionScore>,
}

impl PlanScore {
    pub fn approved(&self) -> bool {
        matches!(self.status, PlanStatus::Approved)
    }
}

struct CompiledScorer {
    action_plan: Regex,
    verification: Regex,
    reply: Regex,
    source_check: Regex,
    vague: Vec<(Regex, Option<Regex>)>,
}

fn compiled() -> &'static CompiledScorer {
    static SCORER: OnceLock<CompiledScorer> = OnceLock::new();
    SCORER.get_or_init(|| CompiledScorer {
        action_plan: Regex::new(ACTION_PLAN_PATTERN).expect("action plan regex"),
        verification: Regex::new(VERIFICATION_PATTERN).expect("verification regex"),
        reply: Regex::new(REPLY_PATTERN).expect("reply regex"),
        source_check: Regex::new(SOURCE_CHECK_PATTERN).expect("source check regex"),
        vague: VAGUE_MARKERS
            .iter()
            .map(|m| {
                (
                    Regex::new(m.pattern).expect("vague marker regex"),
                    m.unless_followed_by
                        .map(|f| Regex::new(f).expect("vague exception regex")),
                )
            })
            .collect(),
    })
}

fn has_vague_language(lower: &str) -> bool {
    compiled().vague.iter().any(|(re, exception)| {
        re.find_iter(lower).any(|m| match exception {
            Some(ex) => !ex.is_match(&lower[m.end()..]),
            None => true,
        })
    })
}

fn dimension(dimension: Dimension, points: u32, feedback: Option<&str>) -> DimensionScore {
    DimensionScore {
        dimension,
        points,
        feedback: feedback.map(ToString::to_string),
    }
}

fn score_tool_specificity(lower: &str, is_action: bool) -> DimensionScore {
    if !is_action || KNOWN_TOOLS.iter().any(|tool| lower.contains(tool)) {
        dimension(Dimension::ToolSpecificity, DIMENSION_POINTS, None)
    } else {
        dimension(Dimension::ToolSpecificity, 0, Some(FEEDBACK_TOOL))
    }
}

fn score_verification(lower: &str, is_action: bool) -> DimensionScore {
    if !is_action || compiled().verification.is_match(lower) {
        dimension(Dimension::VerificationCoverage, DIMENSION_POINTS, None)
    } else {
        dimension(Dimension::VerificationCoverage, 0, Some(FEEDBACK_VERIFICATION))
    }
}

fn score_language(plan: &str, lower: &str) -> DimensionScore {
    if has_vague_language(lower) {
        return dimension(Dimension::LanguageQuality, 0, Some(FEEDBACK_VAGUE));
    }
    if plan.trim().chars().count() < MIN_PLAN_CHARS {
        return dimension(Dimension::LanguageQuality, 0, Some(FEEDBACK_BRIEF));
    }
    dimension(Dimension::LanguageQuality, DIMENSION_POINTS, None)
}

fn score_profile_match(lower: &str, profile: Option<&ClientProfile>) -> DimensionScore {
    let wants_match = profile.is_some_and(|p| p.reply_channel_match);
    let scorer = compiled();
    if wants_match && scorer.reply.is_match(lower) && !scorer.source_check.is_match(lower) {
        return dimension(
            Dimension::ClientProfileMatch,
            DIMENSION_POINTS - REPLY_MISMATCH_PENALTY,
            Some(FEEDBACK_PROFILE),
        );
    }
    dimension(Dimension::ClientProfileMatch, DIMENSION_POINTS, None)
}

pub fn score_plan(plan: &str, profile: Option<&ClientProfile>) -> PlanScore {
    let lower = plan.to_lowercase();
    let is_action = compiled().action_plan.is_match(&lower);

    let dimensions = vec![
        score_tool_specificity(&lower, is_action),
        score_verification(&lower, is_action),
        score_language(plan, &lower),
        score_profile_match(&lower, profile),
    ];
    let score = dimensions
        .iter()
        .map(|d| d.points)
        .sum::<u32>()
        .min(MAX_SCORE);
    let feedback = dimensions
        .iter()
        .filter_map(|d| d.feedback.clone())
        .collect();
    let status = if score >= APPROVAL_THRESHOLD {
        PlanStatus::Approved
    } else {
        PlanStatus::Returned
    };
    PlanScore {
        score,
        feedback,
        status,
        dimensions,
    }
}

pub fn plan_preview(plan: &str) -> String {
    plan.chars().take(PLAN_PREVIEW_CHARS).collect()
}

/// Feedback shown to the agent when a plan is returned.
pub fn render_revision_request(score: &PlanScore) -> String {
    let mut out = format!(
        "VERA PLAN SCORE: {}/100 — Revision required.\n\nPoints lost:\n",
        score.score
    );
    for item in &score.feedback {
        out.push_str(&format!("• {item}\n"));
    }
    out.push_str("\nRevise and resubmit via exit_plan_mode.");
    out
}

#[cfg(test)]
mod tests {
    use super::{
        plan_preview, render_revision_request, score_plan, Dimension, PlanStatus, FEEDBACK_BRIEF,
        FEEDBACK_PROFILE, FEEDBACK_VAGUE,
    };
    use crate::trust::profile::ClientProfile;

    fn reply_profile() -> ClientProfile {
        ClientProfile {
            client_name: Some("YES School".to_string()),
            reply_channel_match: true,
            ..ClientProfile::default()
        }
    }

    fn points(score: &super::PlanScore, dim: Dimension) -> u32 {
        score
            .dimensions
            .iter()
            .find(|d| d.dimension == dim)
            .map(|d| d.points)
            .expect("dimension present")
    }

    #[test]
    fn vague_plan_is_returned() {
        let s = score_plan("I will handle it and send the email etc.", None);
        assert_eq!(points(&s, Dimension::LanguageQuality), 0);
        assert_eq!(s.score, 25);
        assert_eq!(s.status, PlanStatus::Returned);
        assert!(s.feedback.iter().any(|f| f == FEEDBACK_VAGUE));
        assert!(!s.feedback.iter().any(|f| f == FEEDBACK_BRIEF));
    }

    #[test]
    fn reply_matching_source_scores_full() {
        let plan = "Reply via Gmail to the sender, verifying delivery in the Sent folder, matching the From: header domain.";
        let s = score_plan(plan, Some(&reply_profile()));
        assert_eq!(s.score, 100);
        assert!(s.approved());
        assert!(s.feedback.is_empty());
    }

    #[test]
    fn reply_without_source_check_loses_fifteen() {
        let plan = "Reply to the parent via Gmail with the enrollment dates, then verify it shows in the Sent folder afterwards.";
        let s = score_plan(plan, Some(&reply_profile()));
        assert_eq!(points(&s, Dimension::ClientProfileMatch), 10);
        assert_eq!(s.score, 85);
        assert_eq!(s.status, PlanStatus::Approved);
        assert_eq!(s.feedback, vec![FEEDBACK_PROFILE.to_string()]);

        let no_profile = score_plan(plan, None);
        assert_eq!(no_profile.score, 100);
    }

    #[test]
    fn non_action_plan_gets_tool_and_verification_credit() {
        let plan = "Research the three enrollment options in the knowledge base and summarise the differences for review.";
        let s = score_plan(plan, None);
        assert_eq!(points(&s, Dimension::ToolSpecificity), 25);
        assert_eq!(points(&s, Dimension::VerificationCoverage), 25);
        assert_eq!(s.score, 100);
    }

    #[test]
    fn any_verify_inflection_counts_as_verification() {
        let plan = "Text the parent through Twilio SMS with the pickup time and verify the delivery status afterwards.";
        let s = score_plan(plan, None);
        assert_eq!(points(&s, Dimension::VerificationCoverage), 25);
        let missing = score_plan(
            "Text the parent through Twilio SMS with the pickup time and the new room number for Friday.",
            None,
        );
        assert_eq!(points(&missing, Dimension::VerificationCoverage), 0);
    }

    #[test]
    fn short_plan_gets_brevity_feedback() {
        let s = score_plan("Review the notes.", None);
        assert_eq!(s.score, 75);
        assert_eq!(s.feedback, vec![FEEDBACK_BRIEF.to_string()]);
        assert_eq!(s.status, PlanStatus::Returned);
    }

    #[test]
    fn send_the_email_to_someone_is_not_vague() {
        let plan = "Send the email to Dana through Gmail with the signed contract, then confirm it appears in the sent folder.";
        let s = score_plan(plan, None);
        assert_eq!(points(&s, Dimension::LanguageQuality), 25);
        let vague = score_plan(
            "Send the email through Gmail with the signed contract, then confirm it appears in the sent folder.",
            None,
        );
        assert_eq!(points(&vague, Dimension::LanguageQuality), 0);
    }

    #[test]
    fn rescoring_is_identical_and_bounded() {
        let profile = reply_profile();
        for plan in [
            "",
            "reply",
            "I will handle it and send the email etc.",
            "Reply via Gmail to the sender, verifying delivery in the Sent folder, matching the From: header domain.",
        ] {
            let a = score_plan(plan, Some(&profile));
            let b = score_plan(plan, Some(&profile));
            assert_eq!((a.score, &a.feedback), (b.score, &b.feedback));
            assert!(a.score <= 100);
        }
    }

    #[test]
    fn revision_request_lists_every_item() {
        let s = score_plan("I will handle it and send the email etc.", None);
        let text = render_revision_request(&s);
        assert!(text.starts_with("VERA PLAN SCORE: 25/100 — Revision required.\n\nPoints lost:\n"));
        assert_eq!(text.matches("• ").count(), s.feedback.len());
        assert!(text.ends_with("Revise and resubmit via exit_plan_mode."));
    }

    #[test]
    fn preview_counts_chars() {
        let plan = "é".repeat(400);
        assert_eq!(plan_preview(&plan).chars().count(), 300);
    }
}
