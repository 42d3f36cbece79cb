use std::collections::HashMap;

use super::model::{docstring_summary, Entity};
use super::protector::NarrativeProtector;
use super::repository::{DirectoryBucket, EntityRepository};

pub const REPORT_TITLE: &str = "# Python Functions Report";

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Show only the first non-blank docstring line
    pub brief_docstring: bool,

    /// Narrative prose to place under the title
    pub narrative_text: Option<String>,

    /// Whether the narrative section is rendered at all
    pub include_description_section: bool,
}

impl RenderOptions {
    /// Options for the bare report the change detector compares against
    pub fn bare(brief_docstring: bool) -> Self {
        Self {
            brief_docstring,
            narrative_text: None,
            include_description_section: false,
        }
    }

    pub fn with_narrative(mut self, narrative: impl Into<String>) -> Self {
        self.narrative_text = Some(narrative.into());
        self.include_description_section = true;
        self
    }

    fn narrative(&self) -> Option<&str> {
        if !self.include_description_section {
            return None;
        }
        self.narrative_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

/// Renders an entity repository as a Markdown report.
///
/// Output depends only on the repository contents and the options, so two
/// scans of an unchanged tree produce identical bytes.
pub struct ReportRenderer {
    protector: NarrativeProtector,
}

impl ReportRenderer {
    pub fn new() -> Self {
        Self {
            protector: NarrativeProtector::new(),
        }
    }

    pub fn render(&self, repository: &EntityRepository, options: &RenderOptions) -> String {
        let mut md = String::new();

        md.push_str(REPORT_TITLE);
        md.push_str("\n\n");

        if let Some(narrative) = options.narrative() {
            for line in self.protector.section_lines(narrative) {
                md.push_str(&line);
                md.push('\n');
            }
        }

        md.push_str(&format!(
            "Total functions found: **{}**\n",
            repository.function_count()
        ));
        let record_count = repository.record_type_count();
        if record_count > 0 {
            md.push_str(&format!("Total record types found: **{}**\n", record_count));
        }
        md.push_str("\n---\n\n");

        if repository.is_empty() {
            return finish(md);
        }

        let buckets = repository.grouped();
        let anchors = entity_anchors(&buckets);

        md.push_str("## Table of Contents\n\n");
        let mut anchor_iter = anchors.iter();
        for bucket in &buckets {
            md.push_str(&format!(
                "- [{}]({})\n",
                bucket.label(),
                directory_anchor(bucket.label())
            ));
            for entity in &bucket.entities {
                if let Some(anchor) = anchor_iter.next() {
                    md.push_str(&format!("  - [{}](#{})\n", entity.name(), anchor));
                }
            }
        }
        md.push_str("\n---\n\n");

        for bucket in &buckets {
            md.push_str(&format!("## Directory: `{}`\n\n", bucket.label()));
            md.push_str(&format!(
                "Functions in this directory: **{}**\n",
                bucket.function_count()
            ));
            if bucket.record_type_count() > 0 {
                md.push_str(&format!(
                    "Record types in this directory: **{}**\n",
                    bucket.record_type_count()
                ));
            }
            md.push('\n');

            for entity in &bucket.entities {
                self.render_entity(&mut md, entity, options.brief_docstring);
            }
        }

        finish(md)
    }

    fn render_entity(&self, md: &mut String, entity: &Entity, brief: bool) {
        md.push_str(&format!("### `{}`\n\n", entity.name()));
        md.push_str(&format!(
            "**File:** `{}:{}`\n\n",
            entity.file_path(),
            entity.line_number()
        ));

        md.push_str("**Signature:**\n```python\n");
        md.push_str(entity.signature());
        md.push_str("\n```\n\n");

        if !entity.decorators().is_empty() {
            md.push_str("**Decorators:**\n");
            for decorator in entity.decorators() {
                md.push_str(&format!("- `@{}`\n", decorator));
            }
            md.push('\n');
        }

        match entity {
            Entity::Function(function) => {
                if !function.arguments.is_empty() {
                    md.push_str("**Arguments:**\n");
                    for arg in &function.arguments {
                        md.push_str(&format!("- `{}`\n", arg));
                    }
                    md.push('\n');
                }
                if let Some(return_type) = &function.return_type {
                    md.push_str(&format!("**Returns:** `{}`\n\n", return_type));
                }
                if function.is_async {
                    md.push_str("**Type:** Async function\n\n");
                }
            }
            Entity::RecordType(record) => {
                if !record.fields.is_empty() {
                    md.push_str("**Fields:**\n");
                    for field in &record.fields {
                        md.push_str(&format!("- `{}`\n", field.display()));
                    }
                    md.push('\n');
                }
                md.push_str("**Type:** Record type\n\n");
            }
        }

        match entity.docstring() {
            Some(docstring) if brief => {
                md.push_str("**Documentation:**\n");
                md.push_str(&format!("> {}\n\n", docstring_summary(docstring)));
            }
            Some(docstring) => {
                md.push_str("**Documentation:**\n```\n");
                md.push_str(docstring);
                md.push_str("\n```\n\n");
            }
            None => md.push_str("**Documentation:** No docstring provided\n\n"),
        }

        md.push_str("---\n\n");
    }
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Trim trailing blank lines down to a single newline
fn finish(mut md: String) -> String {
    let trimmed = md.trim_end_matches('\n').len();
    md.truncate(trimmed);
    md.push('\n');
    md
}

/// GitHub-style heading slug
pub fn slugify(heading: &str) -> String {
    heading
        .trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            '-' | '_' => Some(c),
            c if c.is_alphanumeric() => Some(c),
            _ => None,
        })
        .collect()
}

pub fn directory_anchor(label: &str) -> String {
    format!("#directory-{}", slugify(label))
}

/// Anchors for every entity in report order, duplicates suffixed `-1`, `-2`, ...
fn entity_anchors(buckets: &[DirectoryBucket<'_>]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    buckets
        .iter()
        .flat_map(|bucket| bucket.entities.iter())
        .map(|entity| {
            let slug = slugify(entity.name());
            let count = seen.entry(slug.clone()).or_insert(0);
            let anchor = if *count == 0 {
                slug
            } else {
                format!("{}-{}", slug, count)
            };
            *count += 1;
            anchor
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{FunctionRecord, RecordField, RecordTypeRecord};

    fn func(name: &str, file_path: &str, line: usize) -> FunctionRecord {
        FunctionRecord {
            name: name.to_string(),
            file_path: file_path.to_string(),
            line_number: line,
            signature: format!("def {}()", name),
            arguments: vec![],
            return_type: None,
            decorators: vec![],
            is_async: false,
            docstring: None,
        }
    }

    fn render(entities: Vec<Entity>, options: &RenderOptions) -> String {
        ReportRenderer::new().render(&EntityRepository::new(entities), options)
    }

    #[test]
    fn test_empty_report_is_header_only() {
        let report = render(vec![], &RenderOptions::default());
        assert_eq!(
            report,
            "# Python Functions Report\n\nTotal functions found: **0**\n\n---\n"
        );
    }

    #[test]
    fn test_full_entity_block() {
        let mut f = func("greet", "app/main.py", 12);
        f.signature = "async def greet(name: str, times=1) -> str".to_string();
        f.arguments = vec!["name: str".to_string(), "times=1".to_string()];
        f.return_type = Some("str".to_string());
        f.decorators = vec!["cache".to_string()];
        f.is_async = true;
        f.docstring = Some("Say hello.\n\nMore detail.".to_string());

        let report = render(vec![Entity::Function(f)], &RenderOptions::default());
        let expected = "\
# Python Functions Report

Total functions found: **1**

---

## Table of Contents

- [app](#directory-app)
  - [greet](#greet)

---

## Directory: `app`

Functions in this directory: **1**

### `greet`

**File:** `app/main.py:12`

**Signature:**
```python
async def greet(name: str, times=1) -> str
```

**Decorators:**
- `@cache`

**Arguments:**
- `name: str`
- `times=1`

**Returns:** `str`

**Type:** Async function

**Documentation:**
```
Say hello.

More detail.
```

---
";
        assert_eq!(report, expected);
    }

    #[test]
    fn test_brief_docstring_and_missing_docstring() {
        let mut documented = func("documented", "mod.py", 1);
        documented.docstring = Some("\nFirst line.\nSecond line.".to_string());
        let bare = func("bare", "mod.py", 5);

        let report = render(
            vec![Entity::Function(documented), Entity::Function(bare)],
            &RenderOptions::bare(true),
        );
        assert!(report.contains("**Documentation:**\n> First line.\n"));
        assert!(!report.contains("Second line."));
        assert!(report.contains("**Documentation:** No docstring provided"));
    }

    #[test]
    fn test_root_directory_label_and_anchor() {
        let report = render(
            vec![Entity::Function(func("main", "main.py", 1))],
            &RenderOptions::default(),
        );
        assert!(report.contains("- [(root)](#directory-root)\n"));
        assert!(report.contains("## Directory: `(root)`\n"));
    }

    #[test]
    fn test_duplicate_anchors_are_suffixed() {
        let report = render(
            vec![
                Entity::Function(func("run", "a/x.py", 1)),
                Entity::Function(func("run", "b/y.py", 1)),
                Entity::Function(func("run", "b/z.py", 1)),
            ],
            &RenderOptions::default(),
        );
        assert!(report.contains("  - [run](#run)\n"));
        assert!(report.contains("  - [run](#run-1)\n"));
        assert!(report.contains("  - [run](#run-2)\n"));
    }

    #[test]
    fn test_narrative_placement() {
        let options = RenderOptions::default().with_narrative("A small tool.");
        let report = render(vec![Entity::Function(func("f", "m.py", 1))], &options);
        assert!(report.starts_with(
            "# Python Functions Report\n\n## Description\n\nA small tool.\n\n---\n\nTotal functions found: **1**\n"
        ));
    }

    #[test]
    fn test_narrative_ignored_when_disabled_or_blank() {
        let mut options = RenderOptions::default().with_narrative("text");
        options.include_description_section = false;
        let report = render(vec![], &options);
        assert!(!report.contains("## Description"));

        let blank = RenderOptions::default().with_narrative("   ");
        assert!(!render(vec![], &blank).contains("## Description"));
    }

    #[test]
    fn test_record_type_block_and_counts() {
        let record = RecordTypeRecord {
            name: "Point".to_string(),
            file_path: "geo/shapes.py".to_string(),
            line_number: 3,
            decorators: vec!["dataclass".to_string()],
            docstring: None,
            fields: vec![
                RecordField {
                    name: "x".to_string(),
                    field_type: Some("int".to_string()),
                },
                RecordField {
                    name: "y".to_string(),
                    field_type: Some("int".to_string()),
                },
            ],
            signature: "@dataclass\nclass Point".to_string(),
        };
        let report = render(
            vec![
                Entity::RecordType(record),
                Entity::Function(func("area", "geo/shapes.py", 10)),
            ],
            &RenderOptions::default(),
        );

        assert!(report.contains("Total functions found: **1**\nTotal record types found: **1**\n"));
        assert!(report.contains(
            "Functions in this directory: **1**\nRecord types in this directory: **1**\n"
        ));
        assert!(report.contains("**Fields:**\n- `x: int`\n- `y: int`\n\n**Type:** Record type\n"));
        assert!(report.contains("```python\n@dataclass\nclass Point\n```"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let entities = vec![
            Entity::Function(func("b", "pkg/b/m.py", 1)),
            Entity::Function(func("a", "pkg/a/m.py", 1)),
        ];
        let mut reversed = entities.clone();
        reversed.reverse();

        let first = render(entities, &RenderOptions::default());
        let second = render(reversed, &RenderOptions::default());
        assert_eq!(first, second);
        assert!(first.find("pkg/a").unwrap() < first.find("pkg/b").unwrap());
        assert!(first.ends_with("---\n"));
        assert!(!first.ends_with("\n\n"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("pkg/a"), "pkga");
        assert_eq!(slugify("(root)"), "root");
        assert_eq!(slugify("My_Func"), "my_func");
        assert_eq!(slugify("Table of Contents"), "table-of-contents");
    }
}
