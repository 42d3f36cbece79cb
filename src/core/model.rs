//! Extracted entities.
//!
//! Records are built once by the extractor and never mutated afterwards; a
//! changed source file yields a fresh set of records.

use serde::{Deserialize, Serialize};

/// A function, method or nested function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,

    /// Path relative to the scan root, forward-slash separated
    pub file_path: String,

    /// Line of the `def` keyword
    pub line_number: usize,

    /// Canonical signature
    pub signature: String,

    /// `name`, `name: Type`, `name: Type = default`, `*args`, `**kwargs`
    pub arguments: Vec<String>,

    pub return_type: Option<String>,

    /// Decorators as written, without `@`
    pub decorators: Vec<String>,

    pub is_async: bool,

    pub docstring: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordField {
    pub name: String,
    pub field_type: Option<String>,
}

impl RecordField {
    pub fn display(&self) -> String {
        match &self.field_type {
            Some(ty) => format!("{}: {}", self.name, ty),
            None => self.name.clone(),
        }
    }
}

/// A class qualified as a record type by one of its decorators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTypeRecord {
    pub name: String,
    pub file_path: String,
    pub line_number: usize,
    pub decorators: Vec<String>,
    pub docstring: Option<String>,
    pub fields: Vec<RecordField>,

    /// Decorator lines followed by the class header
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    Function(FunctionRecord),
    RecordType(RecordTypeRecord),
}

impl Entity {
    pub fn name(&self) -> &str {
        match self {
            Entity::Function(f) => &f.name,
            Entity::RecordType(r) => &r.name,
        }
    }

    pub fn file_path(&self) -> &str {
        match self {
            Entity::Function(f) => &f.file_path,
            Entity::RecordType(r) => &r.file_path,
        }
    }

    pub fn line_number(&self) -> usize {
        match self {
            Entity::Function(f) => f.line_number,
            Entity::RecordType(r) => r.line_number,
        }
    }

    pub fn signature(&self) -> &str {
        match self {
            Entity::Function(f) => &f.signature,
            Entity::RecordType(r) => &r.signature,
        }
    }

    pub fn decorators(&self) -> &[String] {
        match self {
            Entity::Function(f) => &f.decorators,
            Entity::RecordType(r) => &r.decorators,
        }
    }

    pub fn docstring(&self) -> Option<&str> {
        match self {
            Entity::Function(f) => f.docstring.as_deref(),
            Entity::RecordType(r) => r.docstring.as_deref(),
        }
    }

    pub fn is_record_type(&self) -> bool {
        matches!(self, Entity::RecordType(_))
    }

    /// Parent directory of the file, `""` for the scan root
    pub fn directory(&self) -> &str {
        directory_of(self.file_path())
    }
}

/// Parent directory of a forward-slash relative path, `""` for the root
pub fn directory_of(file_path: &str) -> &str {
    file_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// First non-blank line of a docstring
pub fn docstring_summary(docstring: &str) -> &str {
    docstring
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}
