use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use encoding_rs::Encoding;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{
    encoding::{decode_text, encode_with_bom, Decoded},
    next_id, Build, Guard, Mutate, Record, Repository,
};
use crate::{
    error::{AppError, AppResult},
    services::metrics::STORAGE_FALLBACKS_COUNTER,
};

/// A collection stored as one delimited text file, rewritten whole on every
/// mutation. Mutations are serialized by `lock`; reads are not, and rely on
/// the rename in `store` to always observe a complete file.
pub struct CsvTable<T> {
    path: PathBuf,
    legacy: &'static Encoding,
    lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> CsvTable<T> {
    pub fn new(path: impl Into<PathBuf>, legacy: &'static Encoding) -> Self {
        Self {
            path: path.into(),
            legacy,
            lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole collection. A missing file is an empty collection.
    /// An unreadable file also yields an empty collection; when `quarantine`
    /// is set (the caller holds the lock and is about to overwrite) the bad
    /// file is first renamed aside so its bytes survive.
    async fn load(&self, quarantine: bool) -> AppResult<Vec<T>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let (text, decoded) = decode_text(&bytes, self.legacy);
        if decoded == Decoded::Legacy {
            warn!(
                "{} is not UTF-8; read it as {}",
                self.path.display(),
                self.legacy.name()
            );
            STORAGE_FALLBACKS_COUNTER
                .with_label_values(&["legacy_encoding"])
                .inc();
        }

        match parse::<T>(&text) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(
                    "{} could not be parsed ({}); treating the {} collection as empty",
                    self.path.display(),
                    e,
                    T::KIND
                );
                STORAGE_FALLBACKS_COUNTER
                    .with_label_values(&["unparsable"])
                    .inc();
                if quarantine {
                    self.quarantine().await;
                }
                Ok(Vec::new())
            }
        }
    }

    /// Read without degrading: an unparsable file is an error rather than an
    /// empty collection. For tools that act on what is absent from a table.
    pub async fn list_strict(&self) -> AppResult<Vec<T>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let (text, _) = decode_text(&bytes, self.legacy);
        parse::<T>(&text).map_err(AppError::Internal)
    }

    async fn quarantine(&self) {
        let aside = sibling(&self.path, &format!("corrupt-{}", Utc::now().timestamp()));
        match tokio::fs::rename(&self.path, &aside).await {
            Ok(()) => info!("Moved unreadable {} to {}", self.path.display(), aside.display()),
            Err(e) => warn!("Could not move aside {}: {}", self.path.display(), e),
        }
    }

    async fn store(&self, records: &[T]) -> AppResult<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(T::HEADERS)?;
        for record in records {
            writer.serialize(record.to_row())?;
        }
        let body = writer.into_inner().map_err(|e| e.into_error())?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = sibling(&self.path, "tmp");
        tokio::fs::write(&tmp, encode_with_bom(&body)).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn parse<T: Record>(text: &str) -> anyhow::Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());
    let mut records = Vec::new();
    for row in reader.deserialize::<T::Row>() {
        records.push(T::from_row(row?)?);
    }
    Ok(records)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{suffix}"));
    path.with_file_name(name)
}

#[async_trait]
impl<T: Record> Repository<T> for CsvTable<T> {
    async fn list(&self) -> AppResult<Vec<T>> {
        self.load(false).await
    }

    async fn get(&self, id: i64) -> AppResult<Option<T>> {
        Ok(self.load(false).await?.into_iter().find(|r| r.id() == id))
    }

    async fn insert(&self, build: Build<T>) -> AppResult<T> {
        let _guard = self.lock.lock().await;
        let mut records = self.load(true).await?;
        let record = build(next_id(&records)?);
        records.push(record.clone());
        self.store(&records).await?;
        Ok(record)
    }

    async fn update(&self, id: i64, mutate: Mutate<T>) -> AppResult<T> {
        let _guard = self.lock.lock().await;
        let mut records = self.load(true).await?;
        let record = records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| AppError::NotFound(format!("{} {}", T::KIND, id)))?;
        mutate(record)?;
        let updated = record.clone();
        self.store(&records).await?;
        Ok(updated)
    }

    async fn delete(&self, id: i64, guard: Guard<T>) -> AppResult<bool> {
        let _guard = self.lock.lock().await;
        let mut records = self.load(true).await?;
        let Some(pos) = records.iter().position(|r| r.id() == id) else {
            return Ok(false);
        };
        guard(&records[pos])?;
        records.remove(pos);
        self.store(&records).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        announcement::{Announcement, AnnouncementStatus},
        question::Question,
    };

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("course-board-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn question(id: i64, attachments: &[&str]) -> Question {
        Question {
            id,
            author_email: "stu1@u.edu".into(),
            title: "제목".into(),
            content: format!("line one, \"quoted\"\nline two #{id}"),
            attachments: attachments.iter().map(|s| s.to_string()).collect(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_collection() {
        let table: CsvTable<Question> =
            CsvTable::new(scratch_dir().join("questions.csv"), encoding_rs::EUC_KR);
        assert!(table.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_records_survive_a_reload() {
        let path = scratch_dir().join("questions.csv");
        let table: CsvTable<Question> = CsvTable::new(&path, encoding_rs::EUC_KR);
        let originals = vec![question(1, &[]), question(2, &["a.pdf", "b c.png"]), question(5, &["x.txt"])];
        table.store(&originals).await.unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert!(raw.starts_with(b"\xEF\xBB\xBF"));

        let reopened: CsvTable<Question> = CsvTable::new(&path, encoding_rs::EUC_KR);
        assert_eq!(reopened.list().await.unwrap(), originals);
    }

    #[tokio::test]
    async fn test_reads_legacy_encoded_file() {
        let path = scratch_dir().join("announcements.csv");
        let text = "id,content,date,status\n1,금요일까지 등록,2025-03-04 09:15,confirmed\n";
        let (bytes, _, _) = encoding_rs::EUC_KR.encode(text);
        std::fs::write(&path, &bytes).unwrap();

        let table: CsvTable<Announcement> = CsvTable::new(&path, encoding_rs::EUC_KR);
        let records = table.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "금요일까지 등록");
        assert_eq!(records[0].status, AnnouncementStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_reads_file_without_attachments_column() {
        let path = scratch_dir().join("questions.csv");
        std::fs::write(
            &path,
            "\u{feff}id,email,title,content,date\n1,stu1@u.edu,등록,How do I register?,2025-03-04 09:15\n",
        )
        .unwrap();

        let table: CsvTable<Question> = CsvTable::new(&path, encoding_rs::EUC_KR);
        let records = table.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].attachments.is_empty());
        assert_eq!(records[0].title, "등록");
    }

    #[tokio::test]
    async fn test_unparsable_file_is_moved_aside_before_overwrite() {
        let dir = scratch_dir();
        let path = dir.join("announcements.csv");
        std::fs::write(&path, "id,content,date,status\nnot-a-number,x,y,z\n").unwrap();

        let table: CsvTable<Announcement> = CsvTable::new(&path, encoding_rs::EUC_KR);
        assert!(table.list().await.unwrap().is_empty());

        let created = table
            .insert(Box::new(|id: i64| Announcement {
                id,
                content: "fresh".into(),
                created_at: Utc::now(),
                status: AnnouncementStatus::Pending,
            }))
            .await
            .unwrap();
        assert_eq!(created.id, 1);

        let quarantined = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().contains(".corrupt-"));
        assert!(quarantined);
    }

    #[tokio::test]
    async fn test_strict_read_reports_unparsable_file() {
        let path = scratch_dir().join("questions.csv");
        std::fs::write(&path, "id,email,title,content,attachments,date\nx,a,b,c,d,e\n").unwrap();

        let table: CsvTable<Question> = CsvTable::new(&path, encoding_rs::EUC_KR);
        assert!(table.list_strict().await.is_err());
        assert!(table.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_error_leaves_file_untouched() {
        let path = scratch_dir().join("questions.csv");
        let table: CsvTable<Question> = CsvTable::new(&path, encoding_rs::EUC_KR);
        table.store(&[question(1, &[])]).await.unwrap();

        let result = table
            .update(1, Box::new(|q: &mut Question| {
                q.content = "changed".into();
                Err(AppError::AccessDenied)
            }))
            .await;
        assert!(matches!(result, Err(AppError::AccessDenied)));
        assert_ne!(table.get(1).await.unwrap().unwrap().content, "changed");
    }

    #[tokio::test]
    async fn test_insert_after_largest_possible_id_fails_cleanly() {
        let path = scratch_dir().join("announcements.csv");
        let original = format!("id,content,date,status\n{},x,2025-03-04 09:15,pending\n", i64::MAX);
        std::fs::write(&path, &original).unwrap();

        let table: CsvTable<Announcement> = CsvTable::new(&path, encoding_rs::EUC_KR);
        let result = table
            .insert(Box::new(|id: i64| Announcement {
                id,
                content: "one too many".into(),
                created_at: Utc::now(),
                status: AnnouncementStatus::Pending,
            }))
            .await;

        assert!(matches!(result, Err(AppError::Internal(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
        assert_eq!(table.list().await.unwrap()[0].id, i64::MAX);
    }

    #[test]
    fn test_next_id_starts_at_one_and_follows_max() {
        let empty: Vec<Question> = Vec::new();
        assert_eq!(next_id(&empty).unwrap(), 1);
        assert_eq!(next_id(&[question(3, &[]), question(7, &[])]).unwrap(), 8);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_get_distinct_ids() {
        let table = std::sync::Arc::new(CsvTable::<Question>::new(
            scratch_dir().join("questions.csv"),
            encoding_rs::EUC_KR,
        ));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let table = table.clone();
            handles.push(tokio::spawn(async move {
                table.insert(Box::new(|id: i64| question(id, &[]))).await.unwrap().id
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.sort();
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
        assert_eq!(table.list().await.unwrap().len(), 8);
    }
}
