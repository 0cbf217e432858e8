//! URL input collection.
//!
//! URLs come from positional arguments, then from `--file` (or stdin when the
//! file is `-`). Entries are passed on verbatim apart from trimming; malformed
//! ones are reported by the fetcher as `invalid_request` outcomes.

use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::config::Config;

/// Gathers every URL named by the configuration, in input order.
pub async fn collect_urls(config: &Config) -> Result<Vec<String>> {
    let mut urls: Vec<String> = config
        .urls
        .iter()
        .filter_map(|arg| accept_line(arg))
        .map(str::to_string)
        .collect();

    if let Some(file) = &config.file {
        let from_input = if file == Path::new("-") {
            info!("Reading URLs from stdin");
            read_url_lines(BufReader::new(tokio::io::stdin())).await?
        } else {
            let handle = tokio::fs::File::open(file)
                .await
                .with_context(|| format!("Failed to open input file {}", file.display()))?;
            read_url_lines(BufReader::new(handle))
                .await
                .with_context(|| format!("Failed to read input file {}", file.display()))?
        };
        urls.extend(from_input);
    }

    info!("Total URLs to fetch: {}", urls.len());
    Ok(urls)
}

/// Reads one URL per line, skipping blank lines and `#` comments.
pub async fn read_url_lines<R>(reader: R) -> std::io::Result<Vec<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut urls = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if let Some(url) = accept_line(&line) {
            urls.push(url.to_string());
        }
    }
    Ok(urls)
}

fn accept_line(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_read_url_lines_skips_blank_and_comments() {
        let input = b"https://a.test\n\n   \n# comment\n  https://b.test  \nnot a url\n";
        let urls = read_url_lines(&input[..]).await.expect("read");
        assert_eq!(urls, ["https://a.test", "https://b.test", "not a url"]);
    }

    #[tokio::test]
    async fn test_collect_urls_args_then_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "https://from-file.test/").expect("write");
        writeln!(file, "#https://skipped.test/").expect("write");

        let config = Config {
            urls: vec!["https://from-args.test/".to_string(), " ".to_string()],
            file: Some(file.path().to_path_buf()),
            ..Default::default()
        };

        let urls = collect_urls(&config).await.expect("collect");
        assert_eq!(urls, ["https://from-args.test/", "https://from-file.test/"]);
    }

    #[tokio::test]
    async fn test_collect_urls_missing_file_is_error() {
        let config = Config {
            file: Some("/definitely/not/here/urls.txt".into()),
            ..Default::default()
        };
        let err = collect_urls(&config).await.expect_err("missing file");
        assert!(format!("{err:#}").contains("Failed to open input file"));
    }
}
