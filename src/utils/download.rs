use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::PharmaGuardError;

/// Default directory for exported result files.
pub fn default_export_dir() -> PathBuf {
    match dirs::download_dir() {
        Some(dir) => dir,
        None => std::env::temp_dir().join("pharmaguard"),
    }
}

/// Keeps `[A-Za-z0-9_-]`, maps everything else to `_`.
pub fn sanitize_file_component(value: &str) -> String {
    let out: String = value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() {
        "unknown".to_string()
    } else {
        out
    }
}

/// Writes `content` to `dir/file_name` through a temporary file and a rename.
/// An existing file with the same name is replaced.
pub async fn save_export(
    dir: &Path,
    file_name: &str,
    content: &str,
) -> Result<PathBuf, PharmaGuardError> {
    if file_name.is_empty() || file_name.contains(['/', '\\']) {
        return Err(PharmaGuardError::InvalidArgument(format!(
            "Invalid export file name '{file_name}'"
        )));
    }
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);

    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut opened = None;
    for attempt in 0..32_u32 {
        let candidate = dir.join(format!(
            ".{file_name}.{}.{}.tmp",
            std::process::id(),
            seed.saturating_add(attempt as u128)
        ));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => {
                opened = Some((candidate, file));
                break;
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err.into()),
        }
    }
    let Some((tmp_path, mut file)) = opened else {
        return Err(PharmaGuardError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "Unable to allocate temporary export file",
        )));
    };

    let written = async {
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        tokio::fs::rename(&tmp_path, &path).await
    }
    .await;
    if let Err(err) = written {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err.into());
    }

    debug!(path = %path.display(), bytes = content.len(), "Wrote result export");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(label: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!("pharmaguard-test-{label}-{suffix}"))
    }

    #[test]
    fn sanitize_file_component_replaces_unsafe_chars() {
        assert_eq!(sanitize_file_component("WARFARIN"), "WARFARIN");
        assert_eq!(sanitize_file_component(" 5-FU/oral "), "5-FU_oral");
        assert_eq!(sanitize_file_component("../etc"), "___etc");
        assert_eq!(sanitize_file_component("   "), "unknown");
    }

    #[tokio::test]
    async fn save_export_writes_and_replaces() {
        let dir = scratch_dir("save");
        let path = save_export(&dir, "result.json", "{\"a\": 1}")
            .await
            .expect("first write");
        assert_eq!(path, dir.join("result.json"));
        assert_eq!(
            tokio::fs::read_to_string(&path).await.expect("read"),
            "{\"a\": 1}"
        );

        save_export(&dir, "result.json", "{\"a\": 2}")
            .await
            .expect("second write");
        assert_eq!(
            tokio::fs::read_to_string(&path).await.expect("read"),
            "{\"a\": 2}"
        );

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn save_export_rejects_path_separators() {
        let dir = scratch_dir("reject");
        let err = save_export(&dir, "../escape.json", "{}")
            .await
            .expect_err("should reject");
        assert!(matches!(err, PharmaGuardError::InvalidArgument(_)));
    }
}
