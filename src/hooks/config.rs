use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Allow everything and write nothing.
    Off,
    /// Run every check and audit it, but never block.
    Observe,
    #[default]
    Enforce,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VeraConfigFile {
    pub version: u32,
    #[serde(default)]
    pub mode: GateMode,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub profiles_dir: Option<PathBuf>,
}

impl Default for VeraConfigFile {
    fn default() -> Self {
        Self {
            version: 1,
            mode: GateMode::Enforce,
            client: None,
            state_dir: None,
            profiles_dir: None,
        }
    }
}

impl VeraConfigFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read vera config: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("failed to parse vera config: {}", path.display()))
    }

    pub fn parse(yaml: &str) -> anyhow::Result<Self> {
        let parsed: VeraConfigFile = serde_yaml::from_str(yaml)?;
        if parsed.version != 1 {
            return Err(anyhow!("unsupported vera config version: {}", parsed.version));
        }
        if let Some(client) = &parsed.client {
            if client.trim().is_empty() {
                return Err(anyhow!("client must not be empty"));
            }
        }
        Ok(parsed)
    }

    /// Missing file means defaults; a present but broken file is an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

pub fn default_config_path(workdir: &Path) -> PathBuf {
    workdir.join(".vera").join("config.yaml")
}

pub const DEFAULT_TEMPLATE: &str = r#"version: 1
# enforce: block on violations. observe: audit only. off: allow everything, write nothing.
mode: enforce
# Every session resolves to this client's profile.
client: yes-school
state_dir: bloom
profiles_dir: bloom/clients
"#;

pub fn write_default_template(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_TEMPLATE)
        .with_context(|| format!("failed to write vera config: {}", path.display()))?;
    Ok(())
}
