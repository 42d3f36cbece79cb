use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;
use tree_sitter::{Node, Parser};

use super::LanguageParser;
use crate::core::{DeclKind, DeclNode, FieldNode, LineSpan, ParamKind, ParamNode};
use crate::error::{Result, ScribeError};

/// Python-specific parser using Tree-sitter
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let python_language = tree_sitter_python::language();
        parser
            .set_language(&python_language)
            .map_err(|e| ScribeError::Parser(format!("Failed to set Python language: {}", e)))?;

        Ok(Self { parser })
    }

    /// Rows holding a comment that is the first token on its line
    fn comment_rows(&mut self, content: &str) -> BTreeSet<usize> {
        let mut rows = BTreeSet::new();
        if let Some(tree) = self.parser.parse(content, None) {
            let lines: Vec<&str> = content.lines().collect();
            collect_comment_rows(tree.root_node(), &lines, &mut rows);
        }
        rows
    }
}

impl LanguageParser for PythonParser {
    fn parse(&mut self, content: &str, file_path: &Path) -> Result<DeclNode> {
        let tree = self
            .parser
            .parse(content, None)
            .ok_or_else(|| ScribeError::Parser("Failed to parse Python code".to_string()))?;

        let root_node = tree.root_node();
        if root_node.has_error() {
            let line = first_error_line(root_node).unwrap_or(1);
            return Err(ScribeError::Parser(format!("syntax error near line {}", line)));
        }

        let module_name = file_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "module".to_string());

        let mut module = DeclNode::new(DeclKind::Other, Some(module_name.as_str()), 1);
        let lowering = Lowering {
            source: content,
            row_offset: 0,
        };
        lowering.extract_python_items(root_node, &mut module.children);

        Ok(module)
    }

    fn parse_commented(&mut self, content: &str) -> Vec<DeclNode> {
        let mut declarations = Vec::new();
        let comment_rows = self.comment_rows(content);

        for block in commented_blocks(content, &comment_rows) {
            let Some(tree) = self.parser.parse(&block.text, None) else {
                continue;
            };
            let root_node = tree.root_node();
            if root_node.has_error() {
                // Commented prose that happens to start with `def`
                continue;
            }

            let lowering = Lowering {
                source: &block.text,
                row_offset: block.first_row,
            };
            lowering.extract_python_items(root_node, &mut declarations);
        }

        declarations
    }

    fn file_extensions(&self) -> &[&str] {
        &["py", "pyi"]
    }

    fn language_name(&self) -> &str {
        "python"
    }

    fn comment_marker(&self) -> &'static str {
        "#"
    }
}

/// Lowers tree-sitter nodes of one parsed text into declaration nodes
struct Lowering<'a> {
    source: &'a str,
    /// Row of the parsed text's first line within the original file
    row_offset: usize,
}

impl Lowering<'_> {
    /// Walk the AST and collect definitions. Other statements are transparent,
    /// so definitions under `if`/`try`/`with` blocks are found too.
    fn extract_python_items(&self, node: Node, out: &mut Vec<DeclNode>) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();

        for child in children {
            match child.kind() {
                "function_definition" => {
                    out.push(self.parse_python_function(child, Vec::new(), child));
                }
                "class_definition" => {
                    out.push(self.parse_python_class(child, Vec::new(), child));
                }
                "decorated_definition" => {
                    if let Some(decl) = self.parse_decorated(child) {
                        out.push(decl);
                    }
                }
                _ => self.extract_python_items(child, out),
            }
        }
    }

    fn parse_decorated(&self, node: Node) -> Option<DeclNode> {
        let mut decorators = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "decorator" {
                decorators.push(self.decorator_text(child));
            }
        }

        let definition = node.child_by_field_name("definition")?;
        match definition.kind() {
            "function_definition" => Some(self.parse_python_function(definition, decorators, node)),
            "class_definition" => Some(self.parse_python_class(definition, decorators, node)),
            _ => None,
        }
    }

    /// Parse a Python function definition. `outer` is the decorated wrapper when
    /// there is one, so the header span starts at the first decorator.
    fn parse_python_function(&self, node: Node, decorators: Vec<String>, outer: Node) -> DeclNode {
        let mut cursor = node.walk();
        let is_async = node.children(&mut cursor).any(|c| c.kind() == "async");
        let kind = if is_async {
            DeclKind::AsyncFunction
        } else {
            DeclKind::Function
        };

        let name = node
            .child_by_field_name("name")
            .map(|n| self.node_text(n).to_string());
        let line = self.line_of(node);
        let mut decl = DeclNode::new(kind, name.as_deref(), line);
        decl.decorators = decorators;
        decl.type_params = node
            .child_by_field_name("type_parameters")
            .map(|t| self.node_text(t).to_string());

        let params_node = node.child_by_field_name("parameters");
        let returns_node = node.child_by_field_name("return_type");
        decl.params = params_node.map(|p| self.parse_parameters(p));
        decl.returns = returns_node.map(|r| self.node_text(r).to_string());

        let header_end = returns_node
            .or(params_node)
            .map(|n| self.end_line_of(n))
            .unwrap_or(line);
        decl.header = LineSpan {
            start: self.line_of(outer),
            end: header_end.max(line),
        };

        if let Some(body) = node.child_by_field_name("body") {
            decl.docstring = self.extract_docstring_from_body(body);
            self.extract_python_items(body, &mut decl.children);
        }

        decl
    }

    /// Parse a Python class definition
    fn parse_python_class(&self, node: Node, decorators: Vec<String>, outer: Node) -> DeclNode {
        let name_node = node.child_by_field_name("name");
        let name = name_node.map(|n| self.node_text(n).to_string());
        let line = self.line_of(node);
        let mut decl = DeclNode::new(DeclKind::RecordType, name.as_deref(), line);
        decl.decorators = decorators;

        let header_last = node
            .child_by_field_name("superclasses")
            .or_else(|| node.child_by_field_name("type_parameters"))
            .or(name_node);
        decl.header_text = match header_last {
            Some(last) => self.source[node.start_byte()..last.end_byte()].to_string(),
            None => self.node_text(node).lines().next().unwrap_or("").trim().to_string(),
        };
        decl.header = LineSpan {
            start: self.line_of(outer),
            end: header_last.map(|n| self.end_line_of(n)).unwrap_or(line),
        };

        if let Some(body) = node.child_by_field_name("body") {
            decl.docstring = self.extract_docstring_from_body(body);
            decl.fields = self.extract_fields(body);
            self.extract_python_items(body, &mut decl.children);
        }

        decl
    }

    fn parse_parameters(&self, node: Node) -> Vec<ParamNode> {
        let mut params = Vec::new();
        let mut cursor = node.walk();

        for child in node.named_children(&mut cursor) {
            let param = match child.kind() {
                "comment" => continue,
                "identifier" => ParamNode::regular(self.node_text(child)),
                "typed_parameter" => {
                    let mut param = child
                        .named_child(0)
                        .map(|inner| self.splat_or_plain(inner))
                        .unwrap_or_else(|| ParamNode::regular(self.node_text(child)));
                    if let Some(ty) = child.child_by_field_name("type") {
                        param = param.with_annotation(self.node_text(ty));
                    }
                    param
                }
                "default_parameter" | "typed_default_parameter" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| self.node_text(n))
                        .unwrap_or_else(|| self.node_text(child));
                    let mut param = ParamNode::regular(name);
                    if let Some(ty) = child.child_by_field_name("type") {
                        param = param.with_annotation(self.node_text(ty));
                    }
                    if let Some(value) = child.child_by_field_name("value") {
                        param = param.with_default(self.node_text(value));
                    }
                    param
                }
                "list_splat_pattern" | "dictionary_splat_pattern" => self.splat_or_plain(child),
                "keyword_separator" => {
                    ParamNode::regular("*").with_kind(ParamKind::KeywordOnlyMarker)
                }
                "positional_separator" => {
                    ParamNode::regular("/").with_kind(ParamKind::PositionalOnlyMarker)
                }
                // Anything else (tuple patterns and the like) keeps its raw text
                _ => ParamNode::regular(self.node_text(child)),
            };
            params.push(param);
        }

        params
    }

    fn splat_or_plain(&self, node: Node) -> ParamNode {
        let text = self.node_text(node);
        match node.kind() {
            "list_splat_pattern" => ParamNode::regular(text.trim_start_matches('*').trim())
                .with_kind(ParamKind::VarPositional),
            "dictionary_splat_pattern" => ParamNode::regular(text.trim_start_matches('*').trim())
                .with_kind(ParamKind::VarKeyword),
            _ => ParamNode::regular(text),
        }
    }

    /// Annotated assignments at the top level of a class body
    fn extract_fields(&self, body: Node) -> Vec<FieldNode> {
        let mut fields = Vec::new();
        let mut cursor = body.walk();

        for child in body.named_children(&mut cursor) {
            if child.kind() != "expression_statement" {
                continue;
            }
            let Some(assignment) = child.named_child(0) else {
                continue;
            };
            if assignment.kind() != "assignment" {
                continue;
            }
            let (Some(left), Some(ty)) = (
                assignment.child_by_field_name("left"),
                assignment.child_by_field_name("type"),
            ) else {
                continue;
            };
            if left.kind() == "identifier" {
                fields.push(FieldNode {
                    name: self.node_text(left).to_string(),
                    annotation: Some(self.node_text(ty).to_string()),
                });
            }
        }

        fields
    }

    /// Extract docstring from function/class body
    fn extract_docstring_from_body(&self, body: Node) -> Option<String> {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            match child.kind() {
                "comment" => continue,
                "expression_statement" => {
                    let expr = child.named_child(0)?;
                    if expr.kind() == "string" && child.named_child_count() == 1 {
                        return clean_docstring(string_literal_value(self.node_text(expr)));
                    }
                    return None;
                }
                _ => return None,
            }
        }
        None
    }

    fn decorator_text(&self, node: Node) -> String {
        let mut cursor = node.walk();
        let expression = node
            .named_children(&mut cursor)
            .find(|c| c.kind() != "comment");
        match expression {
            Some(expr) => self.node_text(expr).trim().to_string(),
            None => self.node_text(node).trim().trim_start_matches('@').trim().to_string(),
        }
    }

    /// Extract text content of a node
    fn node_text(&self, node: Node) -> &str {
        &self.source[node.byte_range()]
    }

    fn line_of(&self, node: Node) -> usize {
        node.start_position().row + 1 + self.row_offset
    }

    fn end_line_of(&self, node: Node) -> usize {
        node.end_position().row + 1 + self.row_offset
    }
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error())
        .find_map(first_error_line)
}

/// Contents of a string literal without prefix and quotes
fn string_literal_value(text: &str) -> &str {
    let body = text.trim_start_matches(|c: char| "rRbBuUfF".contains(c));
    let quote_len = if body.starts_with("\"\"\"") || body.starts_with("'''") {
        3
    } else {
        1
    };
    if body.len() < quote_len * 2 {
        return body;
    }
    &body[quote_len..body.len() - quote_len]
}

/// Clean docstring indentation the way `inspect.cleandoc` does: the first line
/// loses its leading whitespace, the rest lose their common margin, and
/// surrounding blank lines are dropped.
pub fn clean_docstring(raw: &str) -> Option<String> {
    let expanded = raw.replace('\t', "        ");
    let lines: Vec<&str> = expanded.lines().collect();
    let (first, rest) = lines.split_first()?;

    let margin = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<&str> = Vec::with_capacity(lines.len());
    cleaned.push(first.trim_start());
    for line in rest {
        cleaned.push(line.get(margin..).unwrap_or_else(|| line.trim_start()));
    }

    while cleaned.last().is_some_and(|l| l.trim().is_empty()) {
        cleaned.pop();
    }
    let leading = cleaned.iter().take_while(|l| l.trim().is_empty()).count();
    let cleaned = &cleaned[leading..];

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.join("\n"))
    }
}

/// A run of comment lines that, uncommented, starts a declaration
#[derive(Debug, PartialEq, Eq)]
struct CommentedBlock {
    /// 0-based row of the block's first line in the original file
    first_row: usize,
    /// Uncommented, dedented text with one line per original row
    text: String,
}

fn declaration_start() -> &'static Regex {
    static DECL_START: OnceLock<Regex> = OnceLock::new();
    DECL_START.get_or_init(|| {
        Regex::new(r"^(@[A-Za-z_]|def\s|async\s+def\s|class\s)")
            .expect("Invalid declaration start regex")
    })
}

fn uncomment(line: &str) -> &str {
    let trimmed = line.trim_start();
    let without_marker = trimmed.strip_prefix('#').unwrap_or(trimmed);
    without_marker.strip_prefix(' ').unwrap_or(without_marker)
}

fn collect_comment_rows(node: Node, lines: &[&str], rows: &mut BTreeSet<usize>) {
    if node.kind() == "comment" {
        let position = node.start_position();
        let starts_line = lines
            .get(position.row)
            .is_some_and(|line| line.len() - line.trim_start().len() == position.column);
        if starts_line {
            rows.insert(position.row);
        }
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_comment_rows(child, lines, rows);
    }
}

/// Runs of consecutive comment rows. `comment_rows` comes from the syntax
/// tree, so `#` lines inside string literals never start a run.
fn commented_blocks(content: &str, comment_rows: &BTreeSet<usize>) -> Vec<CommentedBlock> {
    let lines: Vec<&str> = content.lines().collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if !comment_rows.contains(&i) {
            i += 1;
            continue;
        }

        let start = i;
        while i < lines.len() && comment_rows.contains(&i) {
            i += 1;
        }

        let uncommented: Vec<&str> = lines[start..i].iter().map(|l| uncomment(l)).collect();
        let Some(first_decl) = uncommented
            .iter()
            .position(|l| declaration_start().is_match(l.trim_start()))
        else {
            continue;
        };

        let block = &uncommented[first_decl..];
        let margin = block
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.len() - l.trim_start().len())
            .min()
            .unwrap_or(0);

        let mut text = block
            .iter()
            .map(|l| l.get(margin..).unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\n");
        text.push('\n');

        blocks.push(CommentedBlock {
            first_row: start + first_decl,
            text,
        });
    }

    blocks
}
