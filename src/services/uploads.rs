use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::{
    error::{AppError, AppResult},
    models::question::UploadedFile,
    services::metrics::ATTACHMENTS_COUNTER,
};

/// Byte budget for a stored name, collision suffix included. Filesystems cap
/// a path component at 255 bytes.
const MAX_NAME_BYTES: usize = 200;
/// An extension longer than this is not treated as one when truncating.
const MAX_EXTENSION_BYTES: usize = 32;
const FALLBACK_NAME: &str = "upload";

/// Reduce a client-supplied filename to a safe single path component:
/// directory parts are dropped, anything but letters, digits, `.`, `-` and
/// `_` becomes `_`, and leading dots are removed. Long names are cut to
/// `MAX_NAME_BYTES` on a char boundary, keeping a short extension.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or("");
    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        return FALLBACK_NAME.to_string();
    }
    if cleaned.len() <= MAX_NAME_BYTES {
        return cleaned.to_string();
    }

    let (stem, ext) = short_extension(cleaned);
    let stem = truncate_bytes(stem, MAX_NAME_BYTES - ext.len());
    format!("{stem}{ext}")
}

/// `name` with `_n` before its extension, cut so the result stays within
/// `MAX_NAME_BYTES`.
fn numbered(name: &str, n: u32) -> String {
    let suffix = format!("_{n}");
    let (stem, ext) = short_extension(name);
    let stem = truncate_bytes(stem, MAX_NAME_BYTES.saturating_sub(ext.len() + suffix.len()));
    format!("{stem}{suffix}{ext}")
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
fn truncate_bytes(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Split `name.ext` into (`name`, `.ext`). No extension, or one longer than
/// `MAX_EXTENSION_BYTES`, gives (`name`, "").
fn short_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && name.len() - idx <= MAX_EXTENSION_BYTES => name.split_at(idx),
        _ => (name, ""),
    }
}

/// The shared directory question attachments are written to.
pub struct UploadArea {
    dir: PathBuf,
}

impl UploadArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store `file` under its sanitized name, adding `_1`, `_2`, ... to the
    /// stem when that name is taken. Returns the stored name.
    pub async fn save(&self, file: &UploadedFile) -> AppResult<String> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let wanted = sanitize_filename(&file.filename);
        let mut attempt = 0u32;
        loop {
            let candidate = if attempt == 0 {
                wanted.clone()
            } else {
                numbered(&wanted, attempt)
            };
            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.dir.join(&candidate))
                .await;
            match opened {
                Ok(mut out) => {
                    out.write_all(&file.bytes).await?;
                    out.flush().await?;
                    ATTACHMENTS_COUNTER.with_label_values(&["stored"]).inc();
                    info!("Stored attachment {} ({} bytes)", candidate, file.bytes.len());
                    return Ok(candidate);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => {
                    ATTACHMENTS_COUNTER.with_label_values(&["failed"]).inc();
                    return Err(e.into());
                }
            }
        }
    }

    /// Store every file in order; returns the stored names in the same order.
    pub async fn save_all(&self, files: &[UploadedFile]) -> AppResult<Vec<String>> {
        let mut names = Vec::with_capacity(files.len());
        for file in files {
            names.push(self.save(file).await?);
        }
        Ok(names)
    }

    /// Path of a stored attachment. Names that would not survive
    /// sanitisation unchanged are refused, as is anything resolving outside
    /// the upload directory.
    pub fn resolve(&self, name: &str) -> AppResult<PathBuf> {
        if name.is_empty() || sanitize_filename(name) != name {
            return Err(AppError::BadRequest("Invalid attachment name".into()));
        }
        let not_found = || AppError::NotFound(format!("Attachment {name}"));

        let canonical_dir = std::fs::canonicalize(&self.dir).map_err(|_| not_found())?;
        let canonical_file =
            std::fs::canonicalize(self.dir.join(name)).map_err(|_| not_found())?;
        if !canonical_file.starts_with(&canonical_dir) {
            return Err(AppError::AccessDenied);
        }
        Ok(canonical_file)
    }

    /// Names of the regular files currently in the upload directory.
    pub async fn stored_names(&self) -> AppResult<Vec<String>> {
        self.names_older_than(Duration::ZERO).await
    }

    /// Like `stored_names`, leaving out files modified within `min_age`. A
    /// question's files are written before its row is committed, so fresh
    /// files may be about to gain a reference.
    pub async fn names_older_than(&self, min_age: Duration) -> AppResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        let now = SystemTime::now();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            if !min_age.is_zero() {
                // unknown age counts as fresh
                let age = meta
                    .modified()
                    .ok()
                    .and_then(|modified| now.duration_since(modified).ok());
                if !age.is_some_and(|age| age >= min_age) {
                    continue;
                }
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area() -> UploadArea {
        UploadArea::new(std::env::temp_dir().join(format!("board-uploads-{}", uuid::Uuid::new_v4())))
    }

    fn file(name: &str, body: &str) -> UploadedFile {
        UploadedFile {
            filename: name.into(),
            bytes: bytes::Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn test_sanitize_strips_directories_and_specials() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\report final.pdf"), "report_final.pdf");
        assert_eq!(sanitize_filename("..hidden"), "hidden");
        assert_eq!(sanitize_filename("a;b|c.txt"), "a_b_c.txt");
        assert_eq!(sanitize_filename("과제 1.hwp"), "과제_1.hwp");
        assert_eq!(sanitize_filename(".."), FALLBACK_NAME);
        assert_eq!(sanitize_filename(""), FALLBACK_NAME);
    }

    #[test]
    fn test_sanitize_truncates_but_keeps_extension() {
        let long = format!("{}.pdf", "x".repeat(300));
        let cleaned = sanitize_filename(&long);
        assert_eq!(cleaned.len(), MAX_NAME_BYTES);
        assert!(cleaned.ends_with(".pdf"));
    }

    #[test]
    fn test_sanitize_caps_multibyte_names_by_bytes() {
        let long = format!("{}.pdf", "과".repeat(100));
        let cleaned = sanitize_filename(&long);
        assert!(cleaned.len() <= MAX_NAME_BYTES);
        assert!(cleaned.ends_with(".pdf"));
        assert!(cleaned.starts_with("과과과"));
    }

    #[test]
    fn test_sanitize_cuts_an_oversized_extension() {
        let cleaned = sanitize_filename(&format!("a.{}", "b".repeat(300)));
        assert_eq!(cleaned.len(), MAX_NAME_BYTES);
        assert!(cleaned.starts_with("a.bbb"));
    }

    #[tokio::test]
    async fn test_long_names_can_be_stored_twice() {
        let area = area();
        let hangul = format!("{}.pdf", "과".repeat(100));
        let first = area.save(&file(&hangul, "one")).await.unwrap();
        let second = area.save(&file(&hangul, "two")).await.unwrap();
        assert_ne!(first, second);
        assert!(second.len() <= MAX_NAME_BYTES);
        assert!(second.ends_with("_1.pdf"));
        assert!(area.resolve(&second).is_ok());

        let stored = area.save(&file(&format!("a.{}", "b".repeat(300)), "three")).await.unwrap();
        assert!(area.resolve(&stored).is_ok());
        assert_eq!(area.stored_names().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_save_avoids_overwriting() {
        let area = area();
        let first = area.save(&file("notes.pdf", "one")).await.unwrap();
        let second = area.save(&file("notes.pdf", "two")).await.unwrap();
        let third = area.save(&file("dir/notes.pdf", "three")).await.unwrap();

        assert_eq!(first, "notes.pdf");
        assert_eq!(second, "notes_1.pdf");
        assert_eq!(third, "notes_2.pdf");
        assert_eq!(std::fs::read_to_string(area.dir().join("notes.pdf")).unwrap(), "one");
        assert_eq!(area.stored_names().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_fresh_files_are_not_yet_settled() {
        let area = area();
        area.save(&file("just-now.txt", "hi")).await.unwrap();

        assert!(area.names_older_than(Duration::from_secs(3600)).await.unwrap().is_empty());
        assert_eq!(area.stored_names().await.unwrap(), vec!["just-now.txt"]);
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal_and_missing() {
        let area = area();
        area.save(&file("x.txt", "hi")).await.unwrap();

        assert!(area.resolve("x.txt").is_ok());
        assert!(matches!(area.resolve("../x.txt"), Err(AppError::BadRequest(_))));
        assert!(matches!(area.resolve("y.txt"), Err(AppError::NotFound(_))));
    }
}
