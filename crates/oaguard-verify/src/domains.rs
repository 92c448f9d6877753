use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, VerifyError};

/// Bundled domain dataset, used when no on-disk override is configured.
const BUNDLED_DATASET: &str = include_str!("../data/domains.json");

/// Where the classifier reads its dataset document from.
#[derive(Debug, Clone, Default)]
pub enum DatasetSource {
    #[default]
    Bundled,
    File(std::path::PathBuf),
}

impl DatasetSource {
    fn read(&self) -> Result<String> {
        match self {
            Self::Bundled => Ok(BUNDLED_DATASET.to_string()),
            Self::File(path) => std::fs::read_to_string(path).map_err(|e| {
                VerifyError::Dataset(format!("failed to read {}: {e}", path.display()))
            }),
        }
    }
}

/// Flat, lowercase domain substring sets flattened from the category
/// dataset. Read-only after load; queries are substring containment.
#[derive(Debug, Clone, Default)]
pub struct DomainClassifier {
    whitelist: Vec<String>,
    blacklist: Vec<String>,
    conditional: Vec<String>,
    loaded: bool,
}

impl DomainClassifier {
    /// Load (or reload) the dataset. Idempotent: repeated calls replace the
    /// in-memory sets. On failure the sets are left empty and every query
    /// conservatively answers false; admission falls through to DOI-based
    /// handling.
    pub fn load(&mut self, source: &DatasetSource) -> bool {
        match Self::parse_dataset(source) {
            Ok((whitelist, blacklist, conditional)) => {
                debug!(
                    whitelist = whitelist.len(),
                    blacklist = blacklist.len(),
                    conditional = conditional.len(),
                    "domain dataset loaded"
                );
                self.whitelist = whitelist;
                self.blacklist = blacklist;
                self.conditional = conditional;
                self.loaded = true;
                true
            }
            Err(e) => {
                warn!("domain dataset failed to load, classifier degrades to empty sets: {e}");
                self.whitelist.clear();
                self.blacklist.clear();
                self.conditional.clear();
                self.loaded = false;
                false
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_whitelisted(&self, domain: &str) -> bool {
        contains_match(&self.whitelist, domain)
    }

    pub fn is_blacklisted(&self, domain: &str) -> bool {
        contains_match(&self.blacklist, domain)
    }

    pub fn is_conditional(&self, domain: &str) -> bool {
        contains_match(&self.conditional, domain)
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.whitelist.len(),
            self.blacklist.len(),
            self.conditional.len(),
        )
    }

    fn parse_dataset(source: &DatasetSource) -> Result<(Vec<String>, Vec<String>, Vec<String>)> {
        let raw = source.read()?;
        let doc: Value =
            serde_json::from_str(&raw).map_err(|e| VerifyError::Dataset(e.to_string()))?;

        let whitelist = flatten_domains(doc.get("allowlist"));
        let blacklist = flatten_domains(doc.get("blacklist"));
        let conditional = flatten_domains(doc.get("conditional"));

        if whitelist.is_empty() && blacklist.is_empty() {
            return Err(VerifyError::Dataset(
                "dataset has no allowlist or blacklist entries".to_string(),
            ));
        }

        Ok((whitelist, blacklist, conditional))
    }
}

/// Collect every string leaf under a node, flattening category groupings of
/// arbitrary nesting depth into one lowercase list.
fn flatten_domains(node: Option<&Value>) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(node) = node {
        walk(node, &mut out);
    }
    out
}

fn walk(node: &Value, out: &mut Vec<String>) {
    match node {
        Value::String(s) => {
            let domain = s.trim().to_lowercase();
            if !domain.is_empty() {
                out.push(domain);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, out);
            }
        }
        Value::Object(map) => {
            for value in map.values() {
                walk(value, out);
            }
        }
        _ => {}
    }
}

/// Case-insensitive substring containment: a domain matches when some
/// classifier entry is a substring of the lowercased input.
fn contains_match(entries: &[String], domain: &str) -> bool {
    let domain = domain.to_lowercase();
    entries.iter().any(|entry| domain.contains(entry.as_str()))
}
