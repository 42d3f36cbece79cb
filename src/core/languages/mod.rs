//! Language-specific parsers
//!
//! Each language lowers its syntax tree into grammar-neutral [`DeclNode`]s so
//! the extractor never deals with grammar details.

mod python;

pub use python::PythonParser;

use super::DeclNode;
use crate::error::Result;

/// Trait that all language parsers must implement
pub trait LanguageParser {
    /// Parse source code into a module node whose children are the declarations
    fn parse(&mut self, content: &str, file_path: &std::path::Path) -> Result<DeclNode>;

    /// Recover declarations hidden in commented-out code.
    ///
    /// Line numbers and header spans refer to the original file.
    fn parse_commented(&mut self, _content: &str) -> Vec<DeclNode> {
        Vec::new()
    }

    /// Get the file extensions this parser handles
    fn file_extensions(&self) -> &[&str];

    /// Get the language name
    fn language_name(&self) -> &str;

    /// Single-line comment marker
    fn comment_marker(&self) -> &'static str;
}
