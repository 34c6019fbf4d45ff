//! Registry record parsing
//!
//! Every data file in the registry describes one crate, one JSON object per
//! published version:
//!
//! ```text
//! {"name":"serde","vers":"1.0.0","yanked":false,"features":{"derive":[]}}
//! ```

use serde::Deserialize;

use crate::index::constants::REGISTRY_CONFIG_FILE;
use crate::index::error::ParseError;
use crate::index::types::{Crate, CrateVersion};
use crate::util::deserialize_bool_from_anything;

#[derive(Debug, Deserialize)]
struct RegistryRecord {
    name: String,
    vers: String,
    #[serde(default, deserialize_with = "deserialize_bool_from_anything")]
    yanked: bool,
    #[serde(default)]
    features: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    features2: Option<serde_json::Map<String, serde_json::Value>>,
}

impl RegistryRecord {
    fn into_version(self) -> CrateVersion {
        let mut features: Vec<String> = self.features.into_iter().map(|(name, _)| name).collect();
        if let Some(features2) = self.features2 {
            features.extend(features2.into_iter().map(|(name, _)| name));
        }
        CrateVersion::new(self.vers, self.yanked, features)
    }
}

/// Parse one registry line into a version
pub fn parse_record(line: &[u8]) -> Result<CrateVersion, ParseError> {
    let record: RegistryRecord = serde_json::from_slice(line)?;
    Ok(record.into_version())
}

fn parse_record_for(crate_name: &str, line: &[u8]) -> Result<CrateVersion, ParseError> {
    let record: RegistryRecord = serde_json::from_slice(line)?;
    if !record.name.eq_ignore_ascii_case(crate_name) {
        return Err(ParseError::NameMismatch {
            expected: crate_name.to_string(),
            found: record.name,
        });
    }
    Ok(record.into_version())
}

/// Parse a whole registry data file
///
/// Blank lines are skipped silently; malformed lines are logged and skipped
/// so one bad record never hides the rest of the file.
pub fn parse_crate_file(crate_name: &str, contents: &[u8]) -> Crate {
    let mut versions = Vec::new();

    for (line_no, line) in contents.split(|b| *b == b'\n').enumerate() {
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }

        match parse_record_for(crate_name, line) {
            Ok(version) => versions.push(version),
            Err(e) => {
                tracing::warn!(
                    crate_name,
                    line = line_no + 1,
                    "Skipping registry record: {}",
                    e
                );
            }
        }
    }

    Crate::new(crate_name, versions)
}

/// Map a path inside the registry tree to the crate it describes
///
/// Returns `None` for the root `config.json` and for anything under a hidden
/// directory such as `.github/`.
pub fn crate_name_for_path(path: &str) -> Option<&str> {
    if path.is_empty() || path == REGISTRY_CONFIG_FILE {
        return None;
    }

    let mut components = path.split('/').peekable();
    let mut file_name = None;
    while let Some(component) = components.next() {
        if component.is_empty() || component.starts_with('.') {
            return None;
        }
        if components.peek().is_none() {
            file_name = Some(component);
        }
    }
    file_name
}
