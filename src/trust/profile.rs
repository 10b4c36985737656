use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolChoice {
    pub tool: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutcomePreference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<ToolChoice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<ToolChoice>,
}

/// Outcome preferences in document order; the brief lists rules the way the client wrote them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences(Vec<(String, OutcomePreference)>);

impl Preferences {
    pub fn new(entries: Vec<(String, OutcomePreference)>) -> Self {
        Self(entries)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OutcomePreference)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, outcome: &str) -> Option<&OutcomePreference> {
        self.0.iter().find(|(k, _)| k == outcome).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Preferences {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Preferences {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = Preferences;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of outcome name to preference")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, OutcomePreference>()? {
                    entries.push((k, v));
                }
                Ok(Preferences(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub reply_channel_match: bool,
}

impl ClientProfile {
    pub fn display_name(&self) -> &str {
        self.client_name.as_deref().unwrap_or("Unknown")
    }

    /// `- outcome: notes` for every preference with notes, then the reply rule when requested.
    pub fn rules(&self) -> Vec<String> {
        let mut rules: Vec<String> = self
            .preferences
            .iter()
            .filter_map(|(outcome, pref)| {
                pref.notes
                    .as_deref()
                    .filter(|n| !n.is_empty())
                    .map(|n| format!("- {outcome}: {n}"))
            })
            .collect();
        if self.reply_channel_match {
            rules.push("- REPLY RULE: Match outbound channel to inbound source domain".to_string());
        }
        rules
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTool {
    pub tool: String,
    pub label: String,
    pub is_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

/// Tools known to be unconnected. Anything not listed counts as available.
#[derive(Debug, Clone, Default)]
pub struct ToolAvailability {
    unavailable: BTreeSet<String>,
}

impl ToolAvailability {
    pub fn with_unavailable<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            unavailable: tools.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_available(&self, tool: &str) -> bool {
        !self.unavailable.contains(tool)
    }
}

pub fn resolve_tool_for_outcome(
    outcome: &str,
    profile: &ClientProfile,
    availability: &ToolAvailability,
) -> Option<ResolvedTool> {
    let pref = profile.preferences.get(outcome)?;
    let primary = pref.primary.as_ref()?;
    if availability.is_available(&primary.tool) {
        return Some(ResolvedTool {
            tool: primary.tool.clone(),
            label: primary.label.clone(),
            is_fallback: false,
            fallback_reason: None,
        });
    }
    pref.fallbacks
        .iter()
        .find(|fb| availability.is_available(&fb.tool))
        .map(|fb| ResolvedTool {
            tool: fb.tool.clone(),
            label: fb.label.clone(),
            is_fallback: true,
            fallback_reason: Some(format!("{} not available", primary.label)),
        })
}

pub trait ProfileStore: Send + Sync {
    /// `Ok(None)` when the client has no profile document.
    fn lookup(&self, client_key: &str) -> anyhow::Result<Option<ClientProfile>>;
}

/// `<dir>/<client_key>.json`
#[derive(Debug, Clone)]
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path_for(&self, client_key: &str) -> anyhow::Result<PathBuf> {
        let valid = !client_key.is_empty()
            && client_key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(anyhow!("invalid client key: {client_key:?}"));
        }
        Ok(self.dir.join(format!("{client_key}.json")))
    }
}

impl ProfileStore for FileProfileStore {
    fn lookup(&self, client_key: &str) -> anyhow::Result<Option<ClientProfile>> {
        let path = self.path_for(client_key)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read client profile: {}", path.display()))
            }
        };
        let profile = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse client profile: {}", path.display()))?;
        Ok(Some(profile))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryProfileStore {
    profiles: BTreeMap<String, ClientProfile>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, client_key: &str, profile: ClientProfile) -> Self {
        self.profiles.insert(client_key.to_string(), profile);
        self
    }
}

impl ProfileStore for MemoryProfileStore {
    fn lookup(&self, client_key: &str) -> anyhow::Result<Option<ClientProfile>> {
        Ok(self.profiles.get(client_key).cloned())
    }
}
