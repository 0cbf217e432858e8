//! Export of successful outcomes.
//!
//! Writes the report to a file or to stdout in JSON or JSONL format. Failures
//! are never exported; they are only logged and counted.

mod jsonl;
mod types;

use std::io::{self, ErrorKind};

use tokio::io::AsyncWriteExt;

use crate::error_handling::ExportError;
use crate::models::FetchOutcome;

pub use types::{ExportFormat, ExportOptions, ExportRecord};

/// Writes the successful outcomes in `outcomes` and returns how many were written.
///
/// Records are encoded in memory first, then written with async I/O so the
/// runtime workers never block on the destination.
///
/// # Errors
///
/// Returns [`ExportError::Io`] when the destination cannot be created or
/// written, and [`ExportError::Serialize`] when a record cannot be encoded.
pub async fn export_report(
    outcomes: &[FetchOutcome],
    opts: &ExportOptions,
) -> Result<usize, ExportError> {
    let records: Vec<ExportRecord<'_>> = outcomes
        .iter()
        .filter_map(ExportRecord::from_outcome)
        .collect();

    let path = opts.output.display().to_string();
    let io_error = |source: io::Error| ExportError::Io {
        path: path.clone(),
        source,
    };

    let mut buf = Vec::new();
    match opts.format {
        ExportFormat::Json => jsonl::write_json(&mut buf, &records),
        ExportFormat::Jsonl => jsonl::write_jsonl(&mut buf, &records),
    }
    .map_err(|e| {
        if e.is_io() {
            io_error(e.into())
        } else {
            ExportError::Serialize(e)
        }
    })?;

    if opts.is_stdout() {
        let mut stdout = tokio::io::stdout();
        ignore_broken_pipe(stdout.write_all(&buf).await).map_err(io_error)?;
        ignore_broken_pipe(stdout.flush().await).map_err(io_error)?;
    } else {
        tokio::fs::write(&opts.output, &buf)
            .await
            .map_err(io_error)?;
    }

    log::info!("Exported {} record(s) to {}", records.len(), path);
    Ok(records.len())
}

/// Treats a closed stdout as success so `| head` does not fail the run.
fn ignore_broken_pipe(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::error_handling::FailureKind;
    use crate::models::{
        FetchSuccess, PerformanceMetrics, ResponseSnapshot, SecurityVerdict,
    };

    fn sample_outcomes() -> Vec<FetchOutcome> {
        let ok = FetchOutcome::success(
            "https://ok.test",
            FetchSuccess {
                status_code: 200,
                content_length: 1234,
                timing: PerformanceMetrics {
                    dns_lookup: Duration::from_millis(3),
                    time_to_first_byte: Duration::from_millis(40),
                    total: Duration::from_millis(55),
                    ..Default::default()
                },
                final_url: "https://ok.test/".to_string(),
                response: ResponseSnapshot::default(),
            },
        )
        .with_security(SecurityVerdict::observed(true, true));
        let failed =
            FetchOutcome::failure("https://down.test", FailureKind::ConnectionFailed, "refused")
                .with_security(SecurityVerdict::unreachable());
        vec![ok, failed]
    }

    #[tokio::test]
    async fn test_export_json_only_successes() {
        let dir = TempDir::new().expect("tempdir");
        let opts = ExportOptions::new(dir.path().join("results.json"), ExportFormat::Json);

        let written = export_report(&sample_outcomes(), &opts)
            .await
            .expect("export");
        assert_eq!(written, 1);

        let text = std::fs::read_to_string(&opts.output).expect("read back");
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        let rows = value.as_array().expect("array");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["url"], "https://ok.test");
        assert_eq!(rows[0]["final_url"], "https://ok.test/");
        assert_eq!(rows[0]["status_code"], 200);
        assert_eq!(rows[0]["content_length"], 1234);
        assert_eq!(rows[0]["metrics"]["dns_lookup_ms"], 3.0);
        assert_eq!(rows[0]["metrics"]["total_ms"], 55.0);
        assert_eq!(rows[0]["security"]["headers_secure"], true);
        assert_eq!(rows[0]["security"]["tls_cert_valid"], true);
    }

    #[tokio::test]
    async fn test_export_jsonl() {
        let dir = TempDir::new().expect("tempdir");
        let opts = ExportOptions::new(dir.path().join("results.jsonl"), ExportFormat::Jsonl);

        let mut outcomes = sample_outcomes();
        outcomes.push(outcomes[0].clone());
        let written = export_report(&outcomes, &opts).await.expect("export");
        assert_eq!(written, 2);

        let text = std::fs::read_to_string(&opts.output).expect("read back");
        assert_eq!(text.lines().count(), 2);
        for line in text.lines() {
            let row: serde_json::Value = serde_json::from_str(line).expect("json line");
            assert_eq!(row["status_code"], 200);
        }
    }

    #[tokio::test]
    async fn test_export_to_missing_directory_is_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let opts = ExportOptions::new(
            dir.path().join("missing").join("results.json"),
            ExportFormat::Json,
        );

        let err = export_report(&sample_outcomes(), &opts)
            .await
            .expect_err("directory does not exist");
        assert!(matches!(err, ExportError::Io { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_export_replaces_existing_file() {
        let dir = TempDir::new().expect("tempdir");
        let opts = ExportOptions::new(dir.path().join("results.jsonl"), ExportFormat::Jsonl);
        std::fs::write(&opts.output, "stale line\nstale line\nstale line\n").expect("seed");

        let written = export_report(&sample_outcomes(), &opts)
            .await
            .expect("export");
        assert_eq!(written, 1);

        let text = std::fs::read_to_string(&opts.output).expect("read back");
        assert_eq!(text.lines().count(), 1);
        assert!(!text.contains("stale"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_export_on_single_threaded_runtime() {
        let dir = TempDir::new().expect("tempdir");
        let opts = ExportOptions::new(dir.path().join("results.json"), ExportFormat::Json);

        let export = tokio::spawn({
            let opts = opts.clone();
            async move { export_report(&sample_outcomes(), &opts).await }
        });
        let written = export.await.expect("export task").expect("export");
        assert_eq!(written, 1);
    }

    #[test]
    fn test_ignore_broken_pipe() {
        let closed = Err(io::Error::new(ErrorKind::BrokenPipe, "closed"));
        assert!(ignore_broken_pipe(closed).is_ok());

        let denied = Err(io::Error::new(ErrorKind::PermissionDenied, "denied"));
        assert!(ignore_broken_pipe(denied).is_err());
    }

    #[test]
    fn test_dash_means_stdout() {
        assert!(ExportOptions::new("-", ExportFormat::Json).is_stdout());
        assert!(!ExportOptions::new("out.json", ExportFormat::Json).is_stdout());
    }
}
