use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::tempdir;
use vera_gate::gate::GATE_CLEARED_MESSAGE;
use vera_gate::hooks::config::{GateMode, VeraConfigFile};
use vera_gate::trust::audit::{AuditLog, AuditRecord, AuditSink, ProgressRecord};
use vera_gate::trust::profile::FileProfileStore;
use vera_gate::trust::{resolve_paths, TrustPaths};
use vera_gate::types::{Directive, Plan, Todo};
use vera_gate::verification::ISSUE_MULTIPLE_IN_PROGRESS;
use vera_gate::{GateDecision, VeraGate};

const PROFILE_JSON: &str = r#"{
  "client_id": "yes-school",
  "client_name": "YES School",
  "preferences": {
    "invoicing": {
      "notes": "Invoices go out through QuickBooks only",
      "primary": {"tool": "quickbooks", "label": "QuickBooks"},
      "fallbacks": [{"tool": "gmail", "label": "Gmail"}]
    },
    "scheduling": {"notes": ""}
  },
  "reply_channel_match": true
}"#;

fn setup(root: &Path) -> (VeraGate, TrustPaths) {
    let paths = resolve_paths(root, &VeraConfigFile::default(), None, None);
    std::fs::create_dir_all(&paths.profiles_dir).expect("profiles dir");
    std::fs::write(paths.profiles_dir.join("yes-school.json"), PROFILE_JSON).expect("profile");
    let gate = VeraGate::new(
        Arc::new(AuditLog::from_paths(&paths)),
        Arc::new(FileProfileStore::new(paths.profiles_dir.clone())),
    )
    .with_client("yes-school");
    (gate, paths)
}

fn read_lines(path: &Path) -> Vec<Value> {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    content
        .lines()
        .map(|l| serde_json::from_str(l).expect("audit line is json"))
        .collect()
}

fn todos(value: Value) -> Vec<Todo> {
    serde_json::from_value(value).expect("todos")
}

#[test]
fn acknowledgement_gets_no_brief() {
    let tmp = tempdir().expect("tmp");
    let (gate, paths) = setup(tmp.path());
    let out = gate.classify_directive(&Directive {
        text: "ok thanks!".to_string(),
        session_id: "s1".to_string(),
    });
    assert!(!out.classification.is_action);
    assert_eq!(out.classification.score, 0);
    assert!(out.brief.is_none());

    let lines = read_lines(&paths.audit);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["is_action"], json!(false));
}

#[test]
fn invoice_directive_brief_carries_profile_rules() {
    let tmp = tempdir().expect("tmp");
    let (gate, _) = setup(tmp.path());
    let out = gate.classify_directive(&Directive {
        text: "Can you send an invoice to the client and follow up next week?".to_string(),
        session_id: "s1".to_string(),
    });
    assert!(out.classification.score >= 6);
    let brief = out.brief.expect("brief");
    assert!(brief.contains("Client: YES School"));
    assert!(brief.contains("- invoicing: Invoices go out through QuickBooks only"));
    assert!(!brief.contains("- scheduling:"));
    assert!(brief.contains("- REPLY RULE: Match outbound channel to inbound source domain"));
}

#[test]
fn vague_plan_is_returned_and_logged() {
    let tmp = tempdir().expect("tmp");
    let (gate, paths) = setup(tmp.path());
    let text = "I will handle it and send the email etc.";
    let review = gate.review_plan(&Plan {
        text: text.to_string(),
        session_id: "s2".to_string(),
    });
    assert!(review.score.score < 80);
    assert!(review.decision.is_blocked());

    let lines = read_lines(&paths.plans);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["status"], json!("RETURNED"));
    assert_eq!(lines[0]["score"], json!(review.score.score));
    assert_eq!(lines[0]["plan_preview"], json!(text));
    assert_eq!(lines[0]["session_id"], json!("s2"));
}

#[test]
fn reply_plan_matching_source_is_approved_at_full_marks() {
    let tmp = tempdir().expect("tmp");
    let (gate, paths) = setup(tmp.path());
    let review = gate.review_plan(&Plan {
        text: "Reply via Gmail to the sender, verifying delivery in the Sent folder, matching the From: header domain.".to_string(),
        session_id: "s3".to_string(),
    });
    assert_eq!(review.score.score, 100);
    assert_eq!(review.decision, GateDecision::Allow);
    assert_eq!(read_lines(&paths.plans)[0]["status"], json!("APPROVED"));
}

#[test]
fn two_in_progress_steps_yield_exactly_one_issue() {
    let tmp = tempdir().expect("tmp");
    let (gate, paths) = setup(tmp.path());
    let list = todos(json!([
        {"content": "Draft reply", "status": "in_progress"},
        {"content": "Send reply", "status": "in_progress"}
    ]));
    match gate.check_todos("s4", &list) {
        GateDecision::Block { issues } => {
            assert_eq!(issues, vec![ISSUE_MULTIPLE_IN_PROGRESS.to_string()])
        }
        GateDecision::Allow => panic!("expected block"),
    }
    let lines = read_lines(&paths.audit);
    assert_eq!(lines[0]["event"], json!("TodoWrite.PreToolUse"));
    assert_eq!(lines[0]["blocked"], json!(true));
}

#[test]
fn evidence_gating_and_failure_veto() {
    let tmp = tempdir().expect("tmp");
    let (gate, _) = setup(tmp.path());
    let missing = todos(json!([{
        "content": "Email parent",
        "status": "completed",
        "metadata": {"verification_method": "email_check"}
    }]));
    assert!(gate.check_todos("s5", &missing).is_blocked());

    let verified = todos(json!([{
        "content": "Email parent",
        "status": "completed",
        "metadata": {
            "verification_method": "email_check",
            "verification_evidence": "Checked sent folder, confirmed delivery timestamp 14:02."
        }
    }]));
    assert_eq!(gate.check_todos("s5", &verified), GateDecision::Allow);

    let failed = todos(json!([{
        "content": "Email parent",
        "status": "completed",
        "metadata": {
            "verification_method": "email_check",
            "verification_evidence": "Opened the sent folder at 14:02 and the delivery report says it failed permanently."
        }
    }]));
    assert!(gate.check_todos("s5", &failed).is_blocked());
}

#[test]
fn all_completed_list_clears_the_gate_and_empty_list_is_silent() {
    let tmp = tempdir().expect("tmp");
    let (gate, paths) = setup(tmp.path());

    assert!(gate.observe_todos("s6", &[]).is_none());
    assert!(read_lines(&paths.audit).is_empty());
    assert!(read_lines(&paths.progress).is_empty());

    let list = todos(json!([
        {"content": "a", "status": "completed"},
        {"content": "b", "status": "completed"}
    ]));
    let report = gate.observe_todos("s6", &list).expect("report");
    assert!(report.cleared);

    let progress = read_lines(&paths.progress);
    assert_eq!(progress[0]["completed"], json!("2/2"));
    let audit = read_lines(&paths.audit);
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0]["status"], json!("VERA_GATE_CLEARED"));
    assert_eq!(audit[0]["message"], json!(GATE_CLEARED_MESSAGE));
}

#[test]
fn partial_progress_does_not_clear() {
    let tmp = tempdir().expect("tmp");
    let (gate, paths) = setup(tmp.path());
    let list = todos(json!([
        {"content": "a", "status": "completed"},
        {"content": "b", "status": "pending"},
        {"content": "c", "status": "in_progress"}
    ]));
    let report = gate.observe_todos("s7", &list).expect("report");
    assert!(!report.cleared);
    assert_eq!(read_lines(&paths.progress)[0]["completed"], json!("1/3"));
    assert!(read_lines(&paths.audit).is_empty());
}

#[test]
fn observe_mode_audits_without_blocking() {
    let tmp = tempdir().expect("tmp");
    let (gate, paths) = setup(tmp.path());
    let gate = gate.with_mode(GateMode::Observe);
    let review = gate.review_plan(&Plan {
        text: "I will handle it and send the email etc.".to_string(),
        session_id: "s8".to_string(),
    });
    assert_eq!(review.decision, GateDecision::Allow);
    assert_eq!(read_lines(&paths.plans)[0]["status"], json!("RETURNED"));
}

#[test]
fn missing_profile_gives_full_profile_credit() {
    let tmp = tempdir().expect("tmp");
    let (gate, _) = setup(tmp.path());
    let gate = gate.with_client("no-such-client");
    let review = gate.review_plan(&Plan {
        text: "Reply to the parent via Gmail with the enrollment dates, then verify it shows in the Sent folder afterwards.".to_string(),
        session_id: "s9".to_string(),
    });
    assert_eq!(review.score.score, 100);
}

#[test]
fn concurrent_appends_keep_every_line_whole() {
    let tmp = tempdir().expect("tmp");
    let paths = resolve_paths(tmp.path(), &VeraConfigFile::default(), None, None);
    let log = Arc::new(AuditLog::from_paths(&paths));

    let workers: Vec<_> = (0..8)
        .map(|w| {
            let log = log.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    let record = AuditRecord::Progress(ProgressRecord {
                        timestamp: "2026-01-01T00:00:00Z".to_string(),
                        session_id: format!("worker-{w}-{}", "x".repeat(200 + i)),
                        completed: format!("{i}/50"),
                    });
                    log.append(&record).expect("append");
                }
            })
        })
        .collect();
    for w in workers {
        w.join().expect("worker");
    }

    let lines = read_lines(&paths.progress);
    assert_eq!(lines.len(), 400);
    assert!(lines.iter().all(|l| l["completed"].as_str().is_some()));
}
