//! Loading and normalizing the repository lists named on the command line.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use failure::{Error, ResultExt};

/// The raw URL spellings accepted in input files, stripped down to the bare
/// `owner/name` form during normalization.
const URL_PREFIXES: &[&str] = &[
    "http://www.github.com/",
    "https://www.github.com/",
    "http://github.com/",
    "https://github.com/",
];

/// A single queued repository.
///
/// The original input line is kept around so failures can be reported in the
/// user's own words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// The line as it appeared in the input file (whitespace trimmed).
    pub raw: String,
    /// The normalized `owner/name` identifier.
    pub id: String,
}

/// Normalize one input line, returning `None` for blank lines.
pub fn normalize(line: &str) -> Option<WorkItem> {
    let raw = line.trim();
    if raw.is_empty() {
        return None;
    }

    let mut id = raw;
    for prefix in URL_PREFIXES {
        if id.starts_with(prefix) {
            id = &id[prefix.len()..];
            break;
        }
    }

    Some(WorkItem {
        raw: raw.to_string(),
        id: id.to_string(),
    })
}

/// Read every input file and produce the deduplicated list of work items.
///
/// Duplicates are dropped up front (first occurrence wins) so two workers can
/// never end up writing the same artifact files at the same time. A missing
/// input file aborts the whole run.
pub fn load_identifiers<P: AsRef<Path>>(files: &[P]) -> Result<Vec<WorkItem>, Error> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for path in files {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|_| format!("Unable to read {}", path.display()))?;

        for line in contents.lines() {
            if let Some(item) = normalize(line) {
                if seen.insert(item.id.clone()) {
                    items.push(item);
                } else {
                    debug!("Ignoring duplicate entry {}", item.raw);
                }
            }
        }
    }

    Ok(items)
}
