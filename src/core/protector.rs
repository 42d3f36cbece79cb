use regex::Regex;

/// Heading that opens the narrative section
pub const NARRATIVE_HEADING: &str = "## Description";

/// Locates, renders and strips the narrative section of a report.
///
/// The section sits between the title and the count line:
///
/// ```text
/// # Python Functions Report
///
/// ## Description
///
/// <narrative>
///
/// ---
///
/// Total functions found: **3**
/// ```
///
/// Matching is textual. A docstring line reading exactly `## Description`
/// in a report without narrative would be taken for the heading.
pub struct NarrativeProtector {
    /// Regex for detecting the section heading
    heading_regex: Regex,

    /// Regex for the count line that follows the section
    boundary_regex: Regex,

    /// Regex for the horizontal rule closing the section
    rule_regex: Regex,
}

/// Line range of a narrative section, end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NarrativeRange {
    pub start: usize,
    pub end: usize,
}

impl NarrativeProtector {
    pub fn new() -> Self {
        Self {
            heading_regex: Regex::new(r"^## Description\s*$").expect("Invalid heading regex"),
            boundary_regex: Regex::new(r"^Total functions found:").expect("Invalid boundary regex"),
            rule_regex: Regex::new(r"^---\s*$").expect("Invalid rule regex"),
        }
    }

    /// Lines of a rendered narrative section, including its trailing rule
    pub fn section_lines(&self, narrative: &str) -> Vec<String> {
        let mut lines = vec![NARRATIVE_HEADING.to_string(), String::new()];
        lines.extend(narrative.trim().lines().map(|l| l.trim_end().to_string()));
        lines.push(String::new());
        lines.push("---".to_string());
        lines.push(String::new());
        lines
    }

    /// Find the narrative section.
    ///
    /// It runs from the heading to the count line. Without a count line it ends
    /// after the next rule, and without a rule it runs to the end of the text.
    pub fn find_section(&self, content: &str) -> Option<NarrativeRange> {
        let lines: Vec<&str> = content.lines().collect();
        let start = lines.iter().position(|l| self.heading_regex.is_match(l))?;

        let after = start + 1;
        let end = lines[after..]
            .iter()
            .position(|l| self.boundary_regex.is_match(l))
            .map(|offset| after + offset)
            .or_else(|| {
                lines[after..]
                    .iter()
                    .position(|l| self.rule_regex.is_match(l))
                    .map(|offset| after + offset + 1)
            })
            .unwrap_or(lines.len());

        Some(NarrativeRange { start, end })
    }

    /// Narrative text without heading and closing rule
    pub fn extract_narrative(&self, content: &str) -> Option<String> {
        let range = self.find_section(content)?;
        let lines: Vec<&str> = content.lines().collect();

        let mut body: Vec<&str> = lines[range.start + 1..range.end].to_vec();
        while body.last().is_some_and(|l| l.trim().is_empty() || self.rule_regex.is_match(l)) {
            body.pop();
        }
        let text = body.join("\n").trim().to_string();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Content with the narrative section removed
    pub fn strip_narrative(&self, content: &str) -> String {
        match self.find_section(content) {
            Some(range) => {
                let lines: Vec<&str> = content.lines().collect();
                let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
                kept.extend_from_slice(&lines[..range.start]);
                kept.extend_from_slice(&lines[range.end..]);
                let mut stripped = kept.join("\n");
                if content.ends_with('\n') {
                    stripped.push('\n');
                }
                stripped
            }
            None => content.to_string(),
        }
    }
}

impl Default for NarrativeProtector {
    fn default() -> Self {
        Self::new()
    }
}
