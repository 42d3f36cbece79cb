use std::collections::BTreeMap;

use super::protector::NarrativeProtector;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentDiff {
    pub has_changes: bool,
    pub added_sections: Vec<String>,
    pub removed_sections: Vec<String>,
    pub modified_sections: Vec<String>,
}

impl ContentDiff {
    pub fn summary(&self) -> String {
        format!(
            "{} added, {} removed, {} modified",
            self.added_sections.len(),
            self.removed_sections.len(),
            self.modified_sections.len()
        )
    }
}

/// Decides whether a freshly rendered report differs from the one on disk.
///
/// The comparison ignores the narrative section, line endings, trailing
/// whitespace and the length of blank-line runs.
pub struct ContentDiffer {
    protector: NarrativeProtector,
}

impl ContentDiffer {
    pub fn new() -> Self {
        Self {
            protector: NarrativeProtector::new(),
        }
    }

    /// `candidate` is a report rendered without narrative
    pub fn has_semantic_change(&self, existing: &str, candidate: &str) -> bool {
        let existing = normalize(&self.protector.strip_narrative(&unify_line_endings(existing)));
        let candidate = normalize(&self.protector.strip_narrative(&unify_line_endings(candidate)));
        existing != candidate
    }

    /// Entity-level summary of what changed between two reports
    pub fn diff_content(&self, old_content: &str, new_content: &str) -> ContentDiff {
        let old_sections = self.sections(old_content);
        let new_sections = self.sections(new_content);

        let added_sections: Vec<String> = new_sections
            .keys()
            .filter(|key| !old_sections.contains_key(*key))
            .cloned()
            .collect();
        let removed_sections: Vec<String> = old_sections
            .keys()
            .filter(|key| !new_sections.contains_key(*key))
            .cloned()
            .collect();
        let modified_sections: Vec<String> = new_sections
            .iter()
            .filter(|(key, body)| old_sections.get(*key).is_some_and(|old| old != *body))
            .map(|(key, _)| key.clone())
            .collect();

        ContentDiff {
            has_changes: self.has_semantic_change(old_content, new_content),
            added_sections,
            removed_sections,
            modified_sections,
        }
    }

    /// Entity sections keyed by `name (file)`; repeated keys get `#2`, `#3`, ...
    fn sections(&self, content: &str) -> BTreeMap<String, String> {
        let normalized = normalize(&self.protector.strip_narrative(&unify_line_endings(content)));
        let mut sections = BTreeMap::new();
        let mut current: Option<(String, Vec<&str>)> = None;

        for line in normalized.lines() {
            if let Some(heading) = line.strip_prefix("### ") {
                insert_section(&mut sections, current.take());
                current = Some((heading.trim_matches('`').to_string(), Vec::new()));
            } else if line.starts_with("## ") {
                insert_section(&mut sections, current.take());
            } else if let Some((_, body)) = current.as_mut() {
                body.push(line);
            }
        }
        insert_section(&mut sections, current);

        sections
    }
}

impl Default for ContentDiffer {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_section(sections: &mut BTreeMap<String, String>, section: Option<(String, Vec<&str>)>) {
    let Some((heading, body)) = section else {
        return;
    };
    let base = section_key(&heading, &body);
    let mut key = base.clone();
    let mut occurrence = 1;
    while sections.contains_key(&key) {
        occurrence += 1;
        key = format!("{} #{}", base, occurrence);
    }
    sections.insert(key, body.join("\n"));
}

fn section_key(name: &str, body: &[&str]) -> String {
    let file = body
        .iter()
        .find_map(|line| line.strip_prefix("**File:** "))
        .map(|location| location.trim_matches('`'))
        .map(|location| location.rsplit_once(':').map_or(location, |(path, _)| path));

    match file {
        Some(path) => format!("{} ({})", name, path),
        None => name.to_string(),
    }
}

fn unify_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

/// Unified line endings and no trailing whitespace. Each run of blank lines
/// becomes a single blank line; leading and trailing ones are dropped.
pub fn normalize(content: &str) -> String {
    let unified = unify_line_endings(content);
    let mut lines: Vec<&str> = Vec::new();
    let mut pending_blank = false;

    for line in unified.lines().map(str::trim_end) {
        if line.is_empty() {
            pending_blank = !lines.is_empty();
            continue;
        }
        if pending_blank {
            lines.push("");
            pending_blank = false;
        }
        lines.push(line);
    }

    lines.join("\n")
}
