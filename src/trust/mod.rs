pub mod audit;
pub mod profile;

use std::path::{Path, PathBuf};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::hooks::config::VeraConfigFile;

pub const AUDIT_FILE: &str = "vera-audit.jsonl";
pub const PLANS_FILE: &str = "vera-plans.jsonl";
pub const PROGRESS_FILE: &str = "vera-progress.jsonl";
pub const DEFAULT_CLIENT: &str = "yes-school";

#[derive(Debug, Clone)]
pub struct TrustPaths {
    pub state_dir: PathBuf,
    pub audit: PathBuf,
    pub plans: PathBuf,
    pub progress: PathBuf,
    pub profiles_dir: PathBuf,
}

/// Flag beats config beats the default under `workdir`. Relative paths resolve against `workdir`.
pub fn resolve_paths(
    workdir: &Path,
    cfg: &VeraConfigFile,
    state_dir: Option<PathBuf>,
    profiles_dir: Option<PathBuf>,
) -> TrustPaths {
    let state_dir = workdir.join(
        state_dir
            .or_else(|| cfg.state_dir.clone())
            .unwrap_or_else(|| PathBuf::from("bloom")),
    );
    let profiles_dir = match profiles_dir.or_else(|| cfg.profiles_dir.clone()) {
        Some(p) => workdir.join(p),
        None => state_dir.join("clients"),
    };
    TrustPaths {
        audit: state_dir.join(AUDIT_FILE),
        plans: state_dir.join(PLANS_FILE),
        progress: state_dir.join(PROGRESS_FILE),
        profiles_dir,
        state_dir,
    }
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
