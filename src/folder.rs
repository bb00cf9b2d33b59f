//! Write-time normalisation of app folder labels.

use std::collections::BTreeMap;

pub const DEFAULT_FALLBACK: &str = "Uncategorized";
pub const DEFAULT_ALIASES: &str = "Telefono=Schermata Principale";

/// Maps a raw folder label to the label that is persisted.
///
/// Grouping in the listing is an exact string match, so every write path goes
/// through [`FolderRules::normalize`] and reads never re-normalise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRules {
    fallback: String,
    aliases: BTreeMap<String, String>,
}

impl Default for FolderRules {
    fn default() -> Self {
        let aliases = parse_aliases(DEFAULT_ALIASES).unwrap_or_default();
        FolderRules {
            fallback: DEFAULT_FALLBACK.to_string(),
            aliases,
        }
    }
}

impl FolderRules {
    /// An empty fallback is replaced by [`DEFAULT_FALLBACK`].
    pub fn new(fallback: impl Into<String>, aliases: BTreeMap<String, String>) -> Self {
        let fallback = fallback.into().trim().to_string();
        FolderRules {
            fallback: if fallback.is_empty() {
                DEFAULT_FALLBACK.to_string()
            } else {
                fallback
            },
            aliases,
        }
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    pub fn normalize(&self, raw: Option<&str>) -> String {
        let trimmed = raw.map(str::trim).unwrap_or_default();
        if trimmed.is_empty() {
            return self.fallback.clone();
        }
        match self.aliases.get(trimmed) {
            Some(mapped) => mapped.clone(),
            None => trimmed.to_string(),
        }
    }
}

/// Parses `from=to` pairs separated by `;`. Blank entries are ignored.
pub fn parse_aliases(raw: &str) -> Result<BTreeMap<String, String>, String> {
    let mut out = BTreeMap::new();
    for entry in raw.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (from, to) = entry
            .split_once('=')
            .ok_or_else(|| format!("folder alias `{entry}` is missing `=`"))?;
        let (from, to) = (from.trim(), to.trim());
        if from.is_empty() || to.is_empty() {
            return Err(format!("folder alias `{entry}` has an empty side"));
        }
        out.insert(from.to_string(), to.to_string());
    }
    Ok(out)
}
