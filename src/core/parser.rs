use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::languages::{LanguageParser, PythonParser};
use crate::config::ScanConfig;
use crate::error::{Result, ScribeError};

/// Shape of a declaration node, independent of the grammar that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclKind {
    Function,
    AsyncFunction,
    /// A class declaration. It only becomes a record when a marker decorator qualifies it.
    RecordType,
    /// Containers that are not declarations themselves, such as the module root
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    Regular,
    /// `*args`
    VarPositional,
    /// `**kwargs`
    VarKeyword,
    /// Bare `*` separating keyword-only parameters
    KeywordOnlyMarker,
    /// `/` closing the positional-only parameters
    PositionalOnlyMarker,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamNode {
    pub kind: ParamKind,
    pub name: String,
    pub annotation: Option<String>,
    pub default: Option<String>,
}

impl ParamNode {
    pub fn regular(name: &str) -> Self {
        Self {
            kind: ParamKind::Regular,
            name: name.to_string(),
            annotation: None,
            default: None,
        }
    }

    pub fn with_annotation(mut self, annotation: &str) -> Self {
        self.annotation = Some(annotation.to_string());
        self
    }

    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    pub fn with_kind(mut self, kind: ParamKind) -> Self {
        self.kind = kind;
        self
    }

    /// Separators shape the signature but are not arguments
    pub fn is_separator(&self) -> bool {
        matches!(
            self.kind,
            ParamKind::KeywordOnlyMarker | ParamKind::PositionalOnlyMarker
        )
    }
}

/// Annotated attribute in a class body (`x: int = 0`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldNode {
    pub name: String,
    pub annotation: Option<String>,
}

/// Inclusive 1-based line range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

/// Grammar-neutral declaration node handed to the extractor.
///
/// Every kind exposes the same surface so extraction never has to reach back
/// into the syntax tree. Fields that do not apply to a kind stay empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclNode {
    pub kind: DeclKind,

    /// Declared name; `None` when error recovery left the node nameless
    pub name: Option<String>,

    /// Line of the `def`/`class` keyword, not of the first decorator
    pub line: usize,

    /// First decorator line through the end of the parameter list or class header
    pub header: LineSpan,

    /// Decorator expressions as written, without the leading `@`
    pub decorators: Vec<String>,

    /// Type parameter list as written, brackets included (`[T: int]`)
    pub type_params: Option<String>,

    /// Parameter list; `None` when it could not be read
    pub params: Option<Vec<ParamNode>>,

    /// Return annotation
    pub returns: Option<String>,

    pub docstring: Option<String>,

    /// Class header as written (`class Point(Base)`)
    pub header_text: String,

    pub fields: Vec<FieldNode>,

    /// Declarations nested in this one's body
    pub children: Vec<DeclNode>,
}

impl DeclNode {
    /// Empty node of the given kind, used as a base by the lowering code and tests
    pub fn new(kind: DeclKind, name: Option<&str>, line: usize) -> Self {
        Self {
            kind,
            name: name.map(str::to_string),
            line,
            header: LineSpan {
                start: line,
                end: line,
            },
            decorators: Vec::new(),
            type_params: None,
            params: None,
            returns: None,
            docstring: None,
            header_text: String::new(),
            fields: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn is_async(&self) -> bool {
        self.kind == DeclKind::AsyncFunction
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, DeclKind::Function | DeclKind::AsyncFunction)
    }
}

/// A parsed source file with its declaration tree
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Absolute path on disk
    pub path: PathBuf,

    /// Path relative to the scan root, forward-slash separated
    pub relative_path: String,

    /// Raw source text
    pub source: String,

    /// Module root; its children are the top-level declarations
    pub module: DeclNode,

    /// Declarations recovered from commented-out code
    pub commented: Vec<DeclNode>,

    /// Single-line comment marker of the file's language
    pub comment_marker: &'static str,
}

/// A file that was discovered but could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub reason: String,
}

/// Result of parsing a whole tree
#[derive(Debug, Default)]
pub struct ParseBatch {
    pub files: Vec<ParsedFile>,
    pub failures: Vec<FileFailure>,
}

/// Source discovery and parallel parsing for a scan root
pub struct CodeParser {
    config: ScanConfig,
}

impl CodeParser {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        // Surface grammar problems up front rather than once per worker
        let probe = PythonParser::new()?;
        for ext in &config.extensions {
            if !probe.file_extensions().contains(&ext.as_str()) {
                warn!(
                    "Files with extension '{}' will be parsed as {}",
                    ext,
                    probe.language_name()
                );
            }
        }

        Ok(Self {
            config: config.clone(),
        })
    }

    /// Check that the root exists and is a directory
    pub fn validate_root(root: &Path) -> Result<()> {
        if !root.exists() {
            return Err(ScribeError::InvalidRoot(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScribeError::NotADirectory(root.to_path_buf()));
        }
        Ok(())
    }

    /// Find all source files below the root, sorted by path
    pub fn discover(&self, root: &Path) -> Result<Vec<PathBuf>> {
        Self::validate_root(root)?;

        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(false)
            .git_ignore(self.config.respect_gitignore)
            .git_global(false)
            .git_exclude(false)
            .ignore(false)
            .parents(false);
        if !self.config.recursive {
            builder.max_depth(Some(1));
        }

        let mut files = Vec::new();
        for entry in builder.build() {
            let entry = entry.map_err(|e| ScribeError::FileSystem(e.to_string()))?;
            let path = entry.path();

            if path.is_file() && self.should_parse_file(path) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        debug!("Discovered {} source files under {}", files.len(), root.display());
        Ok(files)
    }

    /// Parse every discovered file. Failures are collected, never propagated.
    pub fn parse_directory(&self, root: &Path) -> Result<ParseBatch> {
        let files = self.discover(root)?;

        let parse_all = || -> Vec<std::result::Result<ParsedFile, FileFailure>> {
            files
                .par_iter()
                .map_init(PythonParser::new, |parser, path| {
                    let relative_path = relative_path(root, path);
                    match parser {
                        Ok(parser) => self.parse_file(parser, path, relative_path),
                        Err(e) => Err(FileFailure {
                            path: relative_path,
                            reason: e.to_string(),
                        }),
                    }
                })
                .collect()
        };

        let results = match self.config.threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| ScribeError::Config(format!("Failed to create thread pool: {}", e)))?
                .install(parse_all),
            None => parse_all(),
        };

        let mut batch = ParseBatch::default();
        for result in results {
            match result {
                Ok(file) => batch.files.push(file),
                Err(failure) => {
                    debug!("Skipping {}: {}", failure.path, failure.reason);
                    batch.failures.push(failure);
                }
            }
        }

        Ok(batch)
    }

    /// Read and parse a single file
    fn parse_file(
        &self,
        parser: &mut PythonParser,
        path: &Path,
        relative_path: String,
    ) -> std::result::Result<ParsedFile, FileFailure> {
        let fail = |reason: String| FileFailure {
            path: relative_path.clone(),
            reason,
        };

        let metadata = std::fs::metadata(path).map_err(|e| fail(e.to_string()))?;
        if metadata.len() as usize > self.config.max_file_size {
            return Err(fail(format!(
                "file exceeds maximum size limit of {} bytes",
                self.config.max_file_size
            )));
        }

        let source = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        let module = parser
            .parse(&source, path)
            .map_err(|e| fail(e.to_string()))?;
        let commented = parser.parse_commented(&source);

        Ok(ParsedFile {
            path: path.to_path_buf(),
            relative_path,
            comment_marker: parser.comment_marker(),
            source,
            module,
            commented,
        })
    }

    /// Determine if a file should be parsed based on configuration
    fn should_parse_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.config.extensions.iter().any(|e| e == ext))
            .unwrap_or(false)
    }
}

/// Path relative to the root with forward slashes
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
