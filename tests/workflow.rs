// End-to-end runs of the scan / render / preserve workflow

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use async_trait::async_trait;
use predicates::prelude::*;
use tokio::sync::watch;

use declscribe::config::Config;
use declscribe::core::{
    Engine, NarrativeGenerator, NarrativeRequest, NarrativeStatus, ReportAction, SkipReason,
};
use declscribe::error::{Result, ScribeError};

/// Returns "Narrative N" for the N-th call
struct CountingNarrator {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl NarrativeGenerator for CountingNarrator {
    async fn generate(&self, request: &NarrativeRequest) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!(
            "Narrative {} covering {} declarations.",
            call,
            request.entities.len()
        ))
    }

    fn provider_name(&self) -> &str {
        "counting"
    }

    fn model_name(&self) -> &str {
        "test"
    }
}

struct FailingNarrator;

#[async_trait]
impl NarrativeGenerator for FailingNarrator {
    async fn generate(&self, _request: &NarrativeRequest) -> Result<String> {
        Err(ScribeError::Narrative("service unavailable".to_string()))
    }

    fn provider_name(&self) -> &str {
        "failing"
    }

    fn model_name(&self) -> &str {
        "test"
    }
}

struct SlowNarrator {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl NarrativeGenerator for SlowNarrator {
    async fn generate(&self, _request: &NarrativeRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("too late".to_string())
    }

    fn provider_name(&self) -> &str {
        "slow"
    }

    fn model_name(&self) -> &str {
        "test"
    }
}

const MODULE_A: &str = r#"
def alpha(x: int) -> int:
    """Return x unchanged."""
    return x
"#;

const MODULE_B: &str = r#"
async def gamma(url, *args, **kwargs):
    pass
"#;

fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    temp.child("src/pkg/a/mod.py").write_str(MODULE_A).unwrap();
    temp.child("src/pkg/b/mod.py").write_str(MODULE_B).unwrap();
    temp
}

fn config(root: &Path, output: Option<PathBuf>, narrative: bool) -> Config {
    let mut config = Config::default();
    config.scan.root = root.to_path_buf();
    config.report.output = output;
    config.narrative.enabled = narrative;
    config
}

fn counting_engine(config: Config, calls: &Arc<AtomicUsize>) -> Engine {
    Engine::with_narrator(
        config,
        Box::new(CountingNarrator {
            calls: Arc::clone(calls),
        }),
    )
    .unwrap()
}

#[tokio::test]
async fn test_unchanged_code_preserves_report_and_narrative() {
    let temp = project();
    let output = temp.child("docs/report.md");
    let calls = Arc::new(AtomicUsize::new(0));

    let first = counting_engine(
        config(&temp.child("src"), Some(output.to_path_buf()), true),
        &calls,
    )
    .run(None)
    .await
    .unwrap();
    assert_eq!(first.action, ReportAction::Written(output.to_path_buf()));
    assert_eq!(first.narrative, NarrativeStatus::Generated);
    assert_eq!(first.preserved_narrative, None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    output.assert(predicate::str::contains("## Description\n\nNarrative 1 covering 2 declarations."));

    let bytes_before = std::fs::read(output.path()).unwrap();
    let mtime_before = std::fs::metadata(output.path()).unwrap().modified().unwrap();

    let second = counting_engine(
        config(&temp.child("src"), Some(output.to_path_buf()), true),
        &calls,
    )
    .run(None)
    .await
    .unwrap();

    assert_eq!(second.action, ReportAction::Skipped(SkipReason::Unchanged));
    assert_eq!(second.narrative, NarrativeStatus::NotNeeded);
    assert_eq!(
        second.preserved_narrative.as_deref(),
        Some("Narrative 1 covering 2 declarations.")
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read(output.path()).unwrap(), bytes_before);
    assert_eq!(
        std::fs::metadata(output.path()).unwrap().modified().unwrap(),
        mtime_before
    );
}

#[tokio::test]
async fn test_changed_code_regenerates_with_fresh_narrative() {
    let temp = project();
    let output = temp.child("docs/report.md");
    let calls = Arc::new(AtomicUsize::new(0));

    counting_engine(
        config(&temp.child("src"), Some(output.to_path_buf()), true),
        &calls,
    )
    .run(None)
    .await
    .unwrap();

    temp.child("src/pkg/a/extra.py")
        .write_str("def beta():\n    pass\n")
        .unwrap();

    let outcome = counting_engine(
        config(&temp.child("src"), Some(output.to_path_buf()), true),
        &calls,
    )
    .run(None)
    .await
    .unwrap();

    assert_eq!(outcome.action, ReportAction::Written(output.to_path_buf()));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let report = std::fs::read_to_string(output.path()).unwrap();
    assert!(report.contains("Narrative 2 covering 3 declarations."));
    assert!(!report.contains("Narrative 1"));
    assert_eq!(report.matches("## Description").count(), 1);

    let alpha = report.find("### `alpha`").unwrap();
    let beta = report.find("### `beta`").unwrap();
    let gamma = report.find("### `gamma`").unwrap();
    assert!(alpha < beta && beta < gamma);
    assert!(report.contains("Functions in this directory: **2**"));
}

#[tokio::test]
async fn test_without_narrative_always_overwrites() {
    let temp = project();
    let output = temp.child("report.md");
    let calls = Arc::new(AtomicUsize::new(0));

    output.write_str("stale content\n").unwrap();

    let outcome = counting_engine(
        config(&temp.child("src"), Some(output.to_path_buf()), false),
        &calls,
    )
    .run(None)
    .await
    .unwrap();

    assert_eq!(outcome.action, ReportAction::Written(output.to_path_buf()));
    assert_eq!(outcome.narrative, NarrativeStatus::NotRequested);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    output.assert(predicate::str::starts_with(
        "# Python Functions Report\n\nTotal functions found: **2**\n",
    ));
    output.assert(predicate::str::contains("stale").not());
    output.assert(predicate::str::contains("## Description").not());
}

#[tokio::test]
async fn test_narrator_failure_writes_bare_report() {
    let temp = project();
    let output = temp.child("report.md");

    let engine = Engine::with_narrator(
        config(&temp.child("src"), Some(output.to_path_buf()), true),
        Box::new(FailingNarrator),
    )
    .unwrap();
    let outcome = engine.run(None).await.unwrap();

    assert_eq!(outcome.action, ReportAction::Written(output.to_path_buf()));
    assert!(matches!(
        &outcome.narrative,
        NarrativeStatus::Failed(reason) if reason.contains("service unavailable")
    ));
    assert!(!outcome.warnings.is_empty());
    output.assert(predicate::str::contains("### `alpha`"));
    output.assert(predicate::str::contains("## Description").not());
}

#[tokio::test]
async fn test_narrator_timeout_writes_bare_report() {
    let temp = project();
    let output = temp.child("report.md");
    let calls = Arc::new(AtomicUsize::new(0));

    let engine = Engine::with_narrator(
        config(&temp.child("src"), Some(output.to_path_buf()), true),
        Box::new(SlowNarrator {
            calls: Arc::clone(&calls),
        }),
    )
    .unwrap()
    .with_narrative_timeout(Duration::from_millis(50));

    let outcome = engine.run(None).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(
        &outcome.narrative,
        NarrativeStatus::Failed(reason) if reason.contains("timed out")
    ));
    output.assert(predicate::str::contains("## Description").not());
}

#[tokio::test]
async fn test_cancellation_writes_bare_report() {
    let temp = project();
    let output = temp.child("report.md");
    let calls = Arc::new(AtomicUsize::new(0));

    let engine = Engine::with_narrator(
        config(&temp.child("src"), Some(output.to_path_buf()), true),
        Box::new(SlowNarrator {
            calls: Arc::clone(&calls),
        }),
    )
    .unwrap();

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = cancel_tx.send(true);
        // Keep the sender alive until the signal has been observed
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let outcome = tokio::time::timeout(Duration::from_secs(5), engine.run(Some(cancel_rx)))
        .await
        .expect("cancellation should end the run")
        .unwrap();

    assert!(matches!(
        &outcome.narrative,
        NarrativeStatus::Failed(reason) if reason.contains("cancelled")
    ));
    output.assert(predicate::path::exists());
    output.assert(predicate::str::contains("## Description").not());
}

#[tokio::test]
async fn test_empty_tree_is_skipped_unless_requested() {
    let temp = TempDir::new().unwrap();
    temp.child("src/notes.txt").write_str("not python").unwrap();
    let output = temp.child("report.md");

    let outcome = Engine::new(config(&temp.child("src"), Some(output.to_path_buf()), false))
        .unwrap()
        .run(None)
        .await
        .unwrap();
    assert_eq!(outcome.action, ReportAction::Skipped(SkipReason::Empty));
    assert!(outcome.warnings.iter().any(|w| w.contains("No functions found")));
    output.assert(predicate::path::missing());

    let mut with_empty = config(&temp.child("src"), Some(output.to_path_buf()), false);
    with_empty.report.include_empty = true;
    Engine::new(with_empty).unwrap().run(None).await.unwrap();
    output.assert("# Python Functions Report\n\nTotal functions found: **0**\n\n---\n");
}

#[tokio::test]
async fn test_invalid_root_is_fatal() {
    let temp = TempDir::new().unwrap();
    let output = temp.child("report.md");

    let missing = Engine::new(config(&temp.child("nope"), Some(output.to_path_buf()), false))
        .unwrap()
        .run(None)
        .await;
    assert!(matches!(missing, Err(ScribeError::InvalidRoot(_))));

    temp.child("file.py").write_str("def f():\n    pass\n").unwrap();
    let not_dir = Engine::new(config(&temp.child("file.py"), Some(output.to_path_buf()), false))
        .unwrap()
        .run(None)
        .await;
    assert!(matches!(not_dir, Err(ScribeError::NotADirectory(_))));

    output.assert(predicate::path::missing());
}

#[tokio::test]
async fn test_output_parent_directories_are_created() {
    let temp = project();
    let output = temp.child("deep/nested/docs/report.md");

    Engine::new(config(&temp.child("src"), Some(output.to_path_buf()), false))
        .unwrap()
        .run(None)
        .await
        .unwrap();

    output.assert(predicate::path::is_file());
}

#[tokio::test]
async fn test_directories_are_grouped_in_order() {
    let temp = project();
    temp.child("src/main.py").write_str("def main():\n    pass\n").unwrap();

    let outcome = Engine::new(config(&temp.child("src"), None, false))
        .unwrap()
        .run(None)
        .await
        .unwrap();

    let ReportAction::Printed(report) = outcome.action else {
        panic!("expected the report to be returned for printing");
    };

    let root = report.find("## Directory: `(root)`").unwrap();
    let a = report.find("## Directory: `pkg/a`").unwrap();
    let b = report.find("## Directory: `pkg/b`").unwrap();
    assert!(root < a && a < b);
    assert!(report.contains("- [pkg/a](#directory-pkga)\n  - [alpha](#alpha)\n"));
    assert!(report.contains("**File:** `pkg/b/mod.py:2`"));
    assert!(report.contains("async def gamma(url, *args, **kwargs)"));
    assert!(report.ends_with("---\n"));
}

#[tokio::test]
async fn test_commented_functions_excluded_by_default() {
    let temp = TempDir::new().unwrap();
    temp.child("src/mod.py")
        .write_str("def visible():\n    pass\n\n# def hidden():\n#     pass\n")
        .unwrap();

    let run = |include_commented: bool| {
        let mut cfg = config(&temp.child("src"), None, false);
        cfg.scan.include_commented = include_commented;
        async move {
            match Engine::new(cfg).unwrap().run(None).await.unwrap().action {
                ReportAction::Printed(report) => report,
                other => panic!("unexpected action {:?}", other),
            }
        }
    };

    let default_report = run(false).await;
    assert!(default_report.contains("### `visible`"));
    assert!(!default_report.contains("hidden"));

    let inclusive_report = run(true).await;
    assert!(inclusive_report.contains("### `hidden`"));
    assert!(inclusive_report.contains("**File:** `mod.py:4`"));
}

#[tokio::test]
async fn test_unparseable_file_is_skipped_not_fatal() {
    let temp = project();
    temp.child("src/broken.py")
        .write_str("def broken(:\n    pass\n")
        .unwrap();

    let outcome = Engine::new(config(&temp.child("src"), None, false))
        .unwrap()
        .run(None)
        .await
        .unwrap();

    assert_eq!(outcome.summary.files_discovered, 3);
    assert_eq!(outcome.summary.files_parsed, 2);
    assert_eq!(outcome.summary.skipped_files.len(), 1);
    assert_eq!(outcome.summary.skipped_files[0].path, "broken.py");
    assert_eq!(outcome.summary.functions, 2);
}

#[tokio::test]
async fn test_unreadable_prior_report_counts_as_changed() {
    let temp = project();
    let output = temp.child("report.md");
    output.write_binary(&[0xff, 0xfe, 0x00, 0x80]).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let outcome = counting_engine(
        config(&temp.child("src"), Some(output.to_path_buf()), true),
        &calls,
    )
    .run(None)
    .await
    .unwrap();

    assert_eq!(outcome.action, ReportAction::Written(output.to_path_buf()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(outcome.warnings.iter().any(|w| w.contains("Could not read existing report")));
    output.assert(predicate::str::contains("Narrative 1"));
}

#[tokio::test]
async fn test_record_types_are_reported_when_enabled() {
    let temp = TempDir::new().unwrap();
    temp.child("src/shapes.py")
        .write_str(
            "from dataclasses import dataclass\n\n@dataclass\nclass Point:\n    \"\"\"A point.\"\"\"\n    x: int\n    y: int = 0\n\n    def norm(self) -> float:\n        return 0.0\n",
        )
        .unwrap();

    let mut cfg = config(&temp.child("src"), None, false);
    cfg.scan.include_record_types = true;
    let outcome = Engine::new(cfg).unwrap().run(None).await.unwrap();

    let ReportAction::Printed(report) = outcome.action else {
        panic!("expected printed report");
    };
    assert!(report.contains("Total functions found: **1**\nTotal record types found: **1**\n"));
    assert!(report.contains("### `Point`"));
    assert!(report.contains("**Type:** Record type"));
    assert!(report.contains("- `x: int`"));
    assert!(report.contains("### `norm`"));
}
