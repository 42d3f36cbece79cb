use tracing::debug;

use super::model::{Entity, FunctionRecord, RecordField, RecordTypeRecord};
use super::parser::{DeclKind, DeclNode, LineSpan, ParsedFile};
use super::signature::{argument_list, function_signature, record_signature};
use crate::config::ScanConfig;

#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    /// Extract declarations whose header is commented out
    pub include_commented: bool,

    /// Turn marker-decorated classes into record types
    pub include_record_types: bool,

    /// Decorator names that qualify a class as a record type
    pub record_markers: Vec<String>,
}

impl From<&ScanConfig> for ExtractorOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            include_commented: config.include_commented,
            include_record_types: config.include_record_types,
            record_markers: config.record_markers.clone(),
        }
    }
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self::from(&ScanConfig::default())
    }
}

/// Entities from one file plus what was dropped along the way
#[derive(Debug, Default)]
pub struct FileExtraction {
    pub entities: Vec<Entity>,

    /// Declarations that could not be normalized
    pub skipped_declarations: usize,

    /// Commented-out declarations left out
    pub commented_excluded: usize,
}

enum Outcome {
    Entity(Entity),
    Commented,
    /// Classes that are not records, module roots
    Container,
    Malformed(&'static str),
}

/// Turns declaration nodes into normalized entities
pub struct DeclarationExtractor {
    options: ExtractorOptions,
}

impl DeclarationExtractor {
    pub fn new(options: ExtractorOptions) -> Self {
        Self { options }
    }

    /// Extract every declaration of a parsed file, including nested ones and
    /// those recovered from commented-out code
    pub fn extract_file(&self, file: &ParsedFile) -> FileExtraction {
        let mut extraction = FileExtraction::default();
        let roots = file.module.children.iter().chain(file.commented.iter());
        for node in roots {
            self.walk(node, file, &mut extraction);
        }
        extraction
    }

    /// Normalize a single declaration node. Returns `None` for nodes that are
    /// filtered out, are not declarations, or cannot be normalized.
    pub fn extract_declaration(
        &self,
        node: &DeclNode,
        file_path: &str,
        raw: &str,
        comment_marker: &str,
    ) -> Option<Entity> {
        match self.classify(node, file_path, raw, comment_marker) {
            Outcome::Entity(entity) => Some(entity),
            Outcome::Malformed(reason) => {
                debug!("Dropping declaration at {}:{}: {}", file_path, node.line, reason);
                None
            }
            Outcome::Commented | Outcome::Container => None,
        }
    }

    fn walk(&self, node: &DeclNode, file: &ParsedFile, extraction: &mut FileExtraction) {
        match self.classify(node, &file.relative_path, &file.source, file.comment_marker) {
            Outcome::Entity(entity) => extraction.entities.push(entity),
            Outcome::Commented => extraction.commented_excluded += 1,
            Outcome::Container => {}
            Outcome::Malformed(reason) => {
                debug!(
                    "Dropping declaration at {}:{}: {}",
                    file.relative_path, node.line, reason
                );
                extraction.skipped_declarations += 1;
            }
        }

        for child in &node.children {
            self.walk(child, file, extraction);
        }
    }

    fn classify(&self, node: &DeclNode, file_path: &str, raw: &str, comment_marker: &str) -> Outcome {
        let is_record = self.options.include_record_types && self.is_record_marked(node);
        if node.kind == DeclKind::Other || (node.kind == DeclKind::RecordType && !is_record) {
            return Outcome::Container;
        }
        if !self.options.include_commented && is_commented(raw, node.header, comment_marker) {
            return Outcome::Commented;
        }

        let name = match node.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Outcome::Malformed("declaration has no name"),
        };
        if node.line == 0 {
            return Outcome::Malformed("declaration has no location");
        }

        match node.kind {
            DeclKind::Function | DeclKind::AsyncFunction => {
                if node.params.is_none() {
                    return Outcome::Malformed("parameter list could not be read");
                }
                Outcome::Entity(Entity::Function(FunctionRecord {
                    name: name.to_string(),
                    file_path: file_path.to_string(),
                    line_number: node.line,
                    signature: function_signature(node),
                    arguments: argument_list(node),
                    return_type: node.returns.clone(),
                    decorators: node.decorators.clone(),
                    is_async: node.is_async(),
                    docstring: node.docstring.clone(),
                }))
            }
            DeclKind::RecordType => Outcome::Entity(Entity::RecordType(RecordTypeRecord {
                name: name.to_string(),
                file_path: file_path.to_string(),
                line_number: node.line,
                decorators: node.decorators.clone(),
                docstring: node.docstring.clone(),
                fields: node
                    .fields
                    .iter()
                    .map(|f| RecordField {
                        name: f.name.clone(),
                        field_type: f.annotation.clone(),
                    })
                    .collect(),
                signature: record_signature(node),
            })),
            DeclKind::Other => Outcome::Container,
        }
    }

    fn is_record_marked(&self, node: &DeclNode) -> bool {
        node.decorators
            .iter()
            .any(|d| decorator_matches(d, &self.options.record_markers))
    }
}

/// Whether a decorator names one of the markers, bare or module-qualified.
/// Call arguments are ignored: `dataclasses.dataclass(frozen=True)` matches `dataclass`.
pub fn decorator_matches(decorator: &str, markers: &[String]) -> bool {
    let target = decorator
        .split('(')
        .next()
        .unwrap_or(decorator)
        .trim();

    markers.iter().any(|marker| {
        target == marker
            || target
                .strip_suffix(marker.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// A header counts as commented out when every non-blank line in it starts
/// with the comment marker
pub fn is_commented(raw: &str, header: LineSpan, comment_marker: &str) -> bool {
    if header.start == 0 || header.end < header.start {
        return false;
    }

    let mut saw_line = false;
    for line in raw.lines().skip(header.start - 1).take(header.end - header.start + 1) {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            continue;
        }
        if !trimmed.starts_with(comment_marker) {
            return false;
        }
        saw_line = true;
    }
    saw_line
}
