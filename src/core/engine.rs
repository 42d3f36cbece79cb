// src/core/engine.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, ScribeError};
use super::{
    CodeParser, ContentDiffer, DeclarationExtractor, EntityRepository, ExtractorOptions,
    FileFailure, NarrativeGenerator, NarrativeProtector, NarrativeRequest, RenderOptions,
    ReportRenderer,
};

/// Stages of a single run, logged as they are entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Scan,
    RenderBare,
    NoPriorFile,
    PriorFilePresent,
    Decide,
    Write,
    Skip,
    Done,
}

/// What is known about the report already on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorReport {
    /// No file, or no output path at all
    Absent,
    /// Same entities as the fresh scan
    Unchanged,
    /// Different entities, or unreadable
    Changed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The existing report already matches the code
    Unchanged,
    /// Nothing was found and empty reports are not wanted
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    WriteBare,
    WriteWithNarrative,
    Skip(SkipReason),
}

/// Choose what to do with a freshly rendered report
pub fn decide(
    is_empty: bool,
    include_empty: bool,
    narrative_requested: bool,
    prior: PriorReport,
) -> Decision {
    if is_empty && !include_empty {
        return Decision::Skip(SkipReason::Empty);
    }
    if !narrative_requested {
        return Decision::WriteBare;
    }
    match prior {
        PriorReport::Unchanged => Decision::Skip(SkipReason::Unchanged),
        PriorReport::Absent | PriorReport::Changed => Decision::WriteWithNarrative,
    }
}

/// Recoverable problems and counts from one scan
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub files_discovered: usize,
    pub files_parsed: usize,
    pub skipped_files: Vec<FileFailure>,
    pub skipped_declarations: usize,
    pub commented_excluded: usize,
    pub functions: usize,
    pub record_types: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportAction {
    Written(PathBuf),
    /// No output path configured; the caller prints the report
    Printed(String),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrativeStatus {
    NotRequested,
    /// Requested, but the report on disk was already current
    NotNeeded,
    Generated,
    /// Report written without narrative
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub action: ReportAction,
    pub narrative: NarrativeStatus,
    pub summary: ScanSummary,
    pub warnings: Vec<String>,
    /// Description of the report left in place on an unchanged skip
    pub preserved_narrative: Option<String>,
}

/// Main orchestration engine for declscribe
pub struct Engine {
    config: Config,
    parser: CodeParser,
    extractor: DeclarationExtractor,
    renderer: ReportRenderer,
    differ: ContentDiffer,
    protector: NarrativeProtector,
    narrator: Option<Box<dyn NarrativeGenerator>>,
    narrator_error: Option<String>,
    narrative_timeout: Duration,
}

impl Engine {
    /// Create an engine, building the configured narrative provider if enabled
    pub fn new(config: Config) -> Result<Self> {
        let mut narrator_error = None;
        let narrator = if config.narrative.enabled {
            match super::llm::create_narrator(&config.narrative) {
                Ok(narrator) => {
                    info!(
                        "Narrative generation enabled: {} ({})",
                        narrator.provider_name(),
                        narrator.model_name()
                    );
                    Some(narrator)
                }
                Err(e) => {
                    warn!("Failed to initialize narrative provider: {}", e);
                    warn!("Continuing without narrative");
                    narrator_error = Some(e.to_string());
                    None
                }
            }
        } else {
            debug!("Narrative generation disabled");
            None
        };

        let mut engine = Self::build(config, narrator)?;
        engine.narrator_error = narrator_error;
        Ok(engine)
    }

    /// Create an engine around an existing narrator
    pub fn with_narrator(config: Config, narrator: Box<dyn NarrativeGenerator>) -> Result<Self> {
        Self::build(config, Some(narrator))
    }

    fn build(config: Config, narrator: Option<Box<dyn NarrativeGenerator>>) -> Result<Self> {
        debug!("Loaded configuration: {:?}", config);

        let parser = CodeParser::new(&config.scan)?;
        let extractor = DeclarationExtractor::new(ExtractorOptions::from(&config.scan));
        let narrative_timeout = Duration::from_secs(config.narrative.timeout_secs);

        Ok(Self {
            config,
            parser,
            extractor,
            renderer: ReportRenderer::new(),
            differ: ContentDiffer::new(),
            protector: NarrativeProtector::new(),
            narrator,
            narrator_error: None,
            narrative_timeout,
        })
    }

    /// Override the bound on a single narrative request
    pub fn with_narrative_timeout(mut self, timeout: Duration) -> Self {
        self.narrative_timeout = timeout;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Discover, parse and extract everything under `root`
    pub fn scan(&self, root: &Path) -> Result<(EntityRepository, ScanSummary)> {
        let batch = self.parser.parse_directory(root)?;

        let mut summary = ScanSummary {
            files_discovered: batch.files.len() + batch.failures.len(),
            files_parsed: batch.files.len(),
            skipped_files: batch.failures,
            ..ScanSummary::default()
        };

        let mut entities = Vec::new();
        for file in &batch.files {
            let extraction = self.extractor.extract_file(file);
            summary.skipped_declarations += extraction.skipped_declarations;
            summary.commented_excluded += extraction.commented_excluded;
            entities.extend(extraction.entities);
        }

        let repository = EntityRepository::new(entities);
        summary.functions = repository.function_count();
        summary.record_types = repository.record_type_count();

        info!(
            "Scanned {} files: {} functions, {} record types",
            summary.files_parsed, summary.functions, summary.record_types
        );
        if !summary.skipped_files.is_empty() {
            warn!("Skipped {} files that could not be parsed", summary.skipped_files.len());
        }
        if summary.skipped_declarations > 0 {
            warn!("Dropped {} malformed declarations", summary.skipped_declarations);
        }
        if summary.commented_excluded > 0 {
            debug!("Excluded {} commented-out declarations", summary.commented_excluded);
        }

        Ok((repository, summary))
    }

    /// Run the whole workflow once.
    ///
    /// `cancel` aborts a pending narrative request when it turns `true`; the
    /// report is then written without narrative.
    pub async fn run(&self, cancel: Option<watch::Receiver<bool>>) -> Result<RunOutcome> {
        let root = self.config.scan.root.clone();
        let output = self.config.report.output.clone();
        let narrative_requested = self.config.narrative.enabled;
        let mut warnings = Vec::new();

        enter(WorkflowState::Scan);
        let (repository, summary) = self.scan(&root)?;
        for failure in &summary.skipped_files {
            warnings.push(format!("Skipped {}: {}", failure.path, failure.reason));
        }

        enter(WorkflowState::RenderBare);
        let bare = self
            .renderer
            .render(&repository, &RenderOptions::bare(self.config.report.brief_docstring));

        let (prior, preserved_narrative) = match &output {
            Some(path) if narrative_requested && path.exists() => {
                enter(WorkflowState::PriorFilePresent);
                self.compare_with_prior(path, &bare, &mut warnings).await
            }
            _ => {
                enter(WorkflowState::NoPriorFile);
                (PriorReport::Absent, None)
            }
        };

        enter(WorkflowState::Decide);
        let decision = decide(
            repository.is_empty(),
            self.config.report.include_empty,
            narrative_requested,
            prior,
        );
        debug!("Decision: {:?}", decision);

        let (content, narrative) = match decision {
            Decision::Skip(reason) => {
                enter(WorkflowState::Skip);
                let narrative = match reason {
                    SkipReason::Empty => {
                        let message = format!("No functions found in '{}'", root.display());
                        warn!("{}", message);
                        warnings.push(message);
                        if narrative_requested {
                            NarrativeStatus::NotNeeded
                        } else {
                            NarrativeStatus::NotRequested
                        }
                    }
                    SkipReason::Unchanged => {
                        info!("No changes detected in codebase. Skipping update.");
                        if let Some(text) = &preserved_narrative {
                            debug!("Keeping existing description ({} lines)", text.lines().count());
                        }
                        NarrativeStatus::NotNeeded
                    }
                };
                enter(WorkflowState::Done);
                return Ok(RunOutcome {
                    action: ReportAction::Skipped(reason),
                    narrative,
                    summary,
                    warnings,
                    preserved_narrative,
                });
            }
            Decision::WriteBare => (bare, NarrativeStatus::NotRequested),
            Decision::WriteWithNarrative => match self.narrate(&repository, cancel).await {
                Ok(text) => {
                    let options = RenderOptions::bare(self.config.report.brief_docstring)
                        .with_narrative(text);
                    (self.renderer.render(&repository, &options), NarrativeStatus::Generated)
                }
                Err(e) => {
                    let message = format!("Writing report without description: {}", e);
                    warn!("{}", message);
                    warnings.push(message);
                    (bare, NarrativeStatus::Failed(e.to_string()))
                }
            },
        };

        enter(WorkflowState::Write);
        let action = match output {
            Some(path) => {
                write_report(&path, &content).await?;
                info!("Report generated successfully: {}", path.display());
                ReportAction::Written(path)
            }
            None => ReportAction::Printed(content),
        };

        enter(WorkflowState::Done);
        Ok(RunOutcome {
            action,
            narrative,
            summary,
            warnings,
            preserved_narrative: None,
        })
    }

    async fn compare_with_prior(
        &self,
        path: &Path,
        bare: &str,
        warnings: &mut Vec<String>,
    ) -> (PriorReport, Option<String>) {
        match tokio::fs::read_to_string(path).await {
            Ok(existing) => {
                if self.differ.has_semantic_change(&existing, bare) {
                    let diff = self.differ.diff_content(&existing, bare);
                    info!("Changes detected: {}", diff.summary());
                    for section in &diff.added_sections {
                        debug!("  added: {}", section);
                    }
                    for section in &diff.removed_sections {
                        debug!("  removed: {}", section);
                    }
                    for section in &diff.modified_sections {
                        debug!("  modified: {}", section);
                    }
                    (PriorReport::Changed, None)
                } else {
                    (PriorReport::Unchanged, self.protector.extract_narrative(&existing))
                }
            }
            Err(e) => {
                let message = format!(
                    "Could not read existing report {}: {}; regenerating",
                    path.display(),
                    e
                );
                warn!("{}", message);
                warnings.push(message);
                (PriorReport::Changed, None)
            }
        }
    }

    /// Ask the narrator once, bounded by the timeout and the cancel signal
    async fn narrate(
        &self,
        repository: &EntityRepository,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<String> {
        let narrator = self.narrator.as_deref().ok_or_else(|| {
            ScribeError::Narrative(
                self.narrator_error
                    .clone()
                    .unwrap_or_else(|| "no narrative provider configured".to_string()),
            )
        })?;

        let request = NarrativeRequest::new(&self.config.project.name, repository.sorted());
        info!(
            "Requesting description from {} ({})",
            narrator.provider_name(),
            narrator.model_name()
        );

        let generation = tokio::time::timeout(self.narrative_timeout, narrator.generate(&request));
        let result = match cancel {
            Some(mut cancel) => {
                tokio::select! {
                    result = generation => result,
                    _ = cancelled(&mut cancel) => {
                        return Err(ScribeError::Narrative("request cancelled".to_string()));
                    }
                }
            }
            None => generation.await,
        };

        let text = result.map_err(|_| {
            ScribeError::Narrative(format!(
                "request timed out after {:?}",
                self.narrative_timeout
            ))
        })??;

        let text = text.trim();
        if text.is_empty() {
            return Err(ScribeError::Narrative(
                "provider returned an empty description".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

fn enter(state: WorkflowState) {
    debug!("Workflow state: {:?}", state);
}

/// Resolves once the flag turns `true`; never resolves if the sender is gone
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Write through a sibling temp file so the target is never half-written
async fn write_report(path: &Path, content: &str) -> Result<()> {
    let output_error = |source: std::io::Error| ScribeError::Output {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(output_error)?;
    }

    let temp = temp_path(path);
    if let Err(e) = tokio::fs::write(&temp, content).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(output_error(e));
    }
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(output_error(e));
    }

    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}
