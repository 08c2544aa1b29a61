//! Newline-delimited file helpers shared by the caches, pending list and
//! sinks.

use crate::error::{Result, StoreError};
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Read trimmed, non-empty lines. A missing file reads as empty.
pub async fn load_lines(path: &Path) -> Result<Vec<String>> {
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(StoreError::io(path)(e)),
    }
}

/// Append one line and fsync before returning.
pub async fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(StoreError::io(path))?;
    file.write_all(format!("{line}\n").as_bytes())
        .await
        .map_err(StoreError::io(path))?;
    file.sync_data().await.map_err(StoreError::io(path))?;
    Ok(())
}

/// Replace the file's contents with `lines`.
///
/// Writes a sibling temp file and renames it over the target, so a crash
/// leaves either the old or the new list.
pub async fn rewrite_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut body = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        body.push_str(line);
        body.push('\n');
    }

    let mut file = fs::File::create(&tmp).await.map_err(StoreError::io(&tmp))?;
    file.write_all(body.as_bytes())
        .await
        .map_err(StoreError::io(&tmp))?;
    file.sync_all().await.map_err(StoreError::io(&tmp))?;
    drop(file);

    fs::rename(&tmp, path).await.map_err(StoreError::io(path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let tmp = TempDir::new().expect("create temp dir");
        let lines = load_lines(&tmp.path().join("nope.txt"))
            .await
            .expect("load lines");
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_append_and_load_skip_blanks() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("cache.txt");
        append_line(&path, "a@yahoo.com").await.expect("append");
        append_line(&path, "  ").await.expect("append blank");
        append_line(&path, " b@aol.com ").await.expect("append");

        let lines = load_lines(&path).await.expect("load lines");
        assert_eq!(lines, vec!["a@yahoo.com", "b@aol.com"]);
    }

    #[tokio::test]
    async fn test_rewrite_replaces_contents() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("mail.txt");
        append_line(&path, "old").await.expect("append");

        rewrite_lines(&path, &["x".to_string(), "y".to_string()])
            .await
            .expect("rewrite");
        assert_eq!(load_lines(&path).await.expect("load"), vec!["x", "y"]);

        rewrite_lines(&path, &[]).await.expect("rewrite empty");
        assert!(load_lines(&path).await.expect("load").is_empty());
        assert!(!tmp.path().join("mail.txt.tmp").exists());
    }
}
