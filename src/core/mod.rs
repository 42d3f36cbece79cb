mod engine;
mod parser;
mod extractor;
mod signature;
mod model;
mod repository;
mod renderer;
mod differ;
mod protector;
mod llm;

// Language-specific parsers
mod languages;

pub use parser::{
    relative_path, CodeParser, DeclKind, DeclNode, FieldNode, FileFailure, LineSpan, ParamKind,
    ParamNode, ParseBatch, ParsedFile,
};
pub use extractor::{
    decorator_matches, is_commented, DeclarationExtractor, ExtractorOptions, FileExtraction,
};
pub use signature::{argument_list, function_signature, record_signature, render_parameter};
pub use model::{
    directory_of, docstring_summary, Entity, FunctionRecord, RecordField, RecordTypeRecord,
};
pub use repository::{DirectoryBucket, EntityRepository, ROOT_LABEL};
pub use renderer::{directory_anchor, slugify, RenderOptions, ReportRenderer, REPORT_TITLE};
pub use differ::{normalize, ContentDiff, ContentDiffer};
pub use protector::{NarrativeProtector, NarrativeRange, NARRATIVE_HEADING};
pub use llm::{
    create_narrator, AnthropicProvider, EntitySummary, NarrativeGenerator, NarrativeRequest,
    OpenAiProvider,
};

// Export the main engine
pub use engine::{
    decide, Decision, Engine, NarrativeStatus, PriorReport, ReportAction, RunOutcome, ScanSummary,
    SkipReason, WorkflowState,
};
