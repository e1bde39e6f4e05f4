//! End-to-end pipeline tests: a registry of stub external handlers
//! (shell scripts standing in for the analyzer scripts) driven through
//! the full resolve -> invoke -> normalize -> persist flow.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use scanhub::error::PipelineError;
use scanhub::persist::MemoryStore;
use scanhub::pipeline::Pipeline;
use scanhub::registry::{ExternalHandler, HandlerDescriptor, ToolRegistry};
use scanhub::request::{save_upload, Identity, ToolRequest};
use scanhub::supervisor::{CommandValidator, ExecutionSupervisor};

fn png_exts() -> Vec<String> {
    vec!["png".to_string()]
}

/// Registry whose "external" tools are shell scripts written into `dir`.
fn stub_registry(dir: &Path, timeout_secs: u64) -> ToolRegistry {
    let mut registry = ToolRegistry::builtin(
        Path::new("/nonexistent/backend"),
        "python3",
        Duration::from_secs(120),
    );

    let scripts = [
        (
            "stub-scanner",
            "scanner.sh",
            concat!(
                "printf '{\"ok\": true, \"tool\": \"Stub Scanner\", ",
                "\"risk_level\": \"Low\", \"main_finding\": \"Nothing odd.\", ",
                "\"echoed\": \"%s\"}' \"$1\"\n"
            ),
        ),
        (
            "stub-crasher",
            "crasher.sh",
            "echo 'model missing' >&2\nexit 1\n",
        ),
        ("stub-sleeper", "sleeper.sh", "sleep 30\n"),
        ("stub-garbage", "garbage.sh", "echo 'not json at all'\n"),
        ("stub-bare", "bare.sh", "echo '{\"ok\": true}'\n"),
    ];

    for (tool_id, script, body) in scripts {
        std::fs::write(dir.join(script), body).unwrap();
        registry.register(
            tool_id,
            HandlerDescriptor::External(ExternalHandler {
                working_dir: dir.to_path_buf(),
                program: "sh".to_string(),
                args: vec![script.to_string()],
                timeout: Duration::from_secs(timeout_secs),
            }),
        );
    }

    registry.register(
        "stub-missing",
        HandlerDescriptor::External(ExternalHandler {
            working_dir: dir.to_path_buf(),
            program: "interp-that-is-not-deployed".to_string(),
            args: vec![],
            timeout: Duration::from_secs(timeout_secs),
        }),
    );

    registry
}

fn stub_pipeline(dir: &Path, store: Arc<MemoryStore>) -> Pipeline {
    let registry = stub_registry(dir, 1);
    let validator = CommandValidator::with_whitelist(vec![
        "sh".to_string(),
        "interp-that-is-not-deployed".to_string(),
    ]);
    Pipeline::new(
        registry,
        ExecutionSupervisor::with_validator(validator),
        store,
    )
}

#[tokio::test]
async fn external_handler_output_is_normalized_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let pipeline = stub_pipeline(dir.path(), store.clone());

    let request = ToolRequest::from_text(
        "stub-scanner",
        "http://example.com",
        "",
        Some(Identity::new("analyst-1")),
    );
    let report = pipeline.run(request).await.unwrap();

    assert!(report.ok);
    assert_eq!(report.tool, "Stub Scanner");
    assert_eq!(report.risk_level.as_deref(), Some("Low"));
    assert_eq!(report.main_finding.as_deref(), Some("Nothing odd."));
    assert_eq!(report.details["echoed"], "http://example.com");

    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].identity, "analyst-1");
    assert_eq!(records[0].tool_name, "Stub Scanner");
    assert_eq!(records[0].input_summary, "http://example.com");
}

#[tokio::test]
async fn bare_report_gets_defaults_filled() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = stub_pipeline(dir.path(), Arc::new(MemoryStore::new()));

    let request = ToolRequest::from_text("stub-bare", "x", "", None);
    let report = pipeline.run(request).await.unwrap();

    assert!(report.ok);
    assert_eq!(report.tool, "stub-bare");
    assert_eq!(report.risk_level, None);
    assert_eq!(report.main_finding.as_deref(), Some("Analysis saved."));
}

#[tokio::test]
async fn crashing_handler_maps_to_handler_error_with_stderr_detail() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let pipeline = stub_pipeline(dir.path(), store.clone());

    let request = ToolRequest::from_text(
        "stub-crasher",
        "x",
        "",
        Some(Identity::new("analyst-1")),
    );
    let err = pipeline.run(request).await.unwrap_err();

    assert_eq!(err.to_string(), "Tool failed: model missing");
    assert_eq!(err.status().as_u16(), 500);
    // Failed invocations never reach the gateway.
    assert!(store.is_empty());
}

#[tokio::test]
async fn timeout_returns_within_epsilon_and_is_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let pipeline = stub_pipeline(dir.path(), store.clone());

    let request = ToolRequest::from_text(
        "stub-sleeper",
        "x",
        "",
        Some(Identity::new("analyst-1")),
    );
    let start = Instant::now();
    let err = pipeline.run(request).await.unwrap_err();

    assert!(matches!(err, PipelineError::Timeout(1)));
    assert!(start.elapsed() < Duration::from_secs(3));
    assert!(store.is_empty());
}

#[tokio::test]
async fn unparsable_output_is_a_normalization_error_with_raw_text() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = stub_pipeline(dir.path(), Arc::new(MemoryStore::new()));

    let request = ToolRequest::from_text("stub-garbage", "x", "", None);
    let err = pipeline.run(request).await.unwrap_err();

    match err {
        PipelineError::Normalization { raw_output } => {
            assert_eq!(raw_output, "not json at all");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn missing_executable_is_a_deployment_defect() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = stub_pipeline(dir.path(), Arc::new(MemoryStore::new()));

    let request = ToolRequest::from_text("stub-missing", "x", "", None);
    let err = pipeline.run(request).await.unwrap_err();

    assert!(matches!(err, PipelineError::ExecutableMissing));
    assert_eq!(
        err.to_string(),
        "Backend script or interpreter not found."
    );
}

#[tokio::test]
async fn uploaded_file_is_deleted_on_success_path() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let pipeline = stub_pipeline(dir.path(), store.clone());

    let upload = save_upload(dir.path(), "capture.png", b"\x89PNG", &png_exts()).unwrap();
    let upload_path = upload.path().to_path_buf();
    assert!(upload_path.exists());

    let request =
        ToolRequest::from_upload("stub-scanner", upload, Some(Identity::new("analyst-1")));
    let report = pipeline.run(request).await.unwrap();

    assert!(report.ok);
    assert!(!upload_path.exists(), "temp upload must be deleted");
    // File payloads are summarized by sanitized filename, not content.
    assert_eq!(store.records()[0].input_summary, "File: capture.png");
}

#[tokio::test]
async fn uploaded_file_is_deleted_on_handler_error_path() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = stub_pipeline(dir.path(), Arc::new(MemoryStore::new()));

    let upload = save_upload(dir.path(), "capture.png", b"\x89PNG", &png_exts()).unwrap();
    let upload_path = upload.path().to_path_buf();

    let request = ToolRequest::from_upload("stub-crasher", upload, None);
    let err = pipeline.run(request).await.unwrap_err();

    assert!(matches!(err, PipelineError::Handler { .. }));
    assert!(!upload_path.exists(), "temp upload must be deleted");
}

#[tokio::test]
async fn uploaded_file_is_deleted_on_timeout_path() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = stub_pipeline(dir.path(), Arc::new(MemoryStore::new()));

    let upload = save_upload(dir.path(), "capture.png", b"\x89PNG", &png_exts()).unwrap();
    let upload_path = upload.path().to_path_buf();

    let request = ToolRequest::from_upload("stub-sleeper", upload, None);
    let err = pipeline.run(request).await.unwrap_err();

    assert!(matches!(err, PipelineError::Timeout(_)));
    assert!(!upload_path.exists(), "temp upload must be deleted");
}

#[tokio::test]
async fn metachar_payload_reaches_handler_as_single_argument() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = stub_pipeline(dir.path(), Arc::new(MemoryStore::new()));

    let payload = "; rm -rf /";
    let request = ToolRequest::from_text("stub-scanner", payload, "", None);
    let report = pipeline.run(request).await.unwrap();

    assert!(report.ok);
    assert_eq!(report.details["echoed"], payload);
    // The scratch directory survived the hostile payload.
    assert!(dir.path().exists());
}

#[tokio::test]
async fn internal_tools_run_through_the_same_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let pipeline = stub_pipeline(dir.path(), store.clone());

    // Scenario: weak password, persisted for the identity-bearing caller.
    let request = ToolRequest::from_text(
        "password-analyzer",
        "abc",
        "",
        Some(Identity::new("analyst-1")),
    );
    let report = pipeline.run(request).await.unwrap();
    assert!(report.ok);
    assert_eq!(report.risk_level.as_deref(), Some("Weak"));
    assert_eq!(store.len(), 1);

    // Scenario: encryptor failure report is surfaced, not persisted.
    let request = ToolRequest::from_text(
        "text-encryptor",
        "hello",
        "bad-mode",
        Some(Identity::new("analyst-1")),
    );
    let report = pipeline.run(request).await.unwrap();
    assert!(!report.ok);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn concurrent_requests_to_the_same_tool_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(stub_pipeline(dir.path(), Arc::new(MemoryStore::new())));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                let request =
                    ToolRequest::from_text("stub-scanner", format!("input-{i}"), "", None);
                pipeline.run(request).await
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.details["echoed"], format!("input-{i}"));
    }
}
