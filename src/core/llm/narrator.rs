use serde::{Deserialize, Serialize};

use crate::core::model::{docstring_summary, Entity};
use crate::error::Result;

/// What a narrator gets to see of the scanned code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeRequest {
    pub project_name: String,

    /// Entities in report order
    pub entities: Vec<EntitySummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySummary {
    pub name: String,

    /// `function`, `async function` or `record type`
    pub kind: String,

    pub file_path: String,
    pub signature: String,

    /// First non-blank docstring line
    pub summary: Option<String>,
}

impl From<&Entity> for EntitySummary {
    fn from(entity: &Entity) -> Self {
        let kind = match entity {
            Entity::Function(f) if f.is_async => "async function",
            Entity::Function(_) => "function",
            Entity::RecordType(_) => "record type",
        };
        Self {
            name: entity.name().to_string(),
            kind: kind.to_string(),
            file_path: entity.file_path().to_string(),
            signature: entity.signature().to_string(),
            summary: entity
                .docstring()
                .map(docstring_summary)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

impl NarrativeRequest {
    pub fn new<'a>(project_name: &str, entities: impl IntoIterator<Item = &'a Entity>) -> Self {
        Self {
            project_name: project_name.to_string(),
            entities: entities.into_iter().map(EntitySummary::from).collect(),
        }
    }

    /// Prompt shared by all providers
    pub fn build_prompt(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str(&format!(
            "Project: {}\n\nThe project contains the following Python declarations:\n\n",
            self.project_name
        ));

        for entity in &self.entities {
            prompt.push_str(&format!(
                "- {} `{}` in {}: `{}`",
                entity.kind,
                entity.name,
                entity.file_path,
                entity.signature.replace('\n', " ")
            ));
            if let Some(summary) = &entity.summary {
                prompt.push_str(&format!(" - {}", summary));
            }
            prompt.push('\n');
        }

        prompt.push_str(
            "\nWrite a short description of what this codebase does and how its parts fit together. \
             Use plain Markdown paragraphs. Do not use headings or horizontal rules, and do not list every function.",
        );

        prompt
    }
}

/// Produces the prose placed in the report's description section
#[async_trait::async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, request: &NarrativeRequest) -> Result<String>;

    /// Get the provider name (e.g., "Anthropic", "OpenAI")
    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;
}
