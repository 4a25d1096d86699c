use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use csv::WriterBuilder;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{SegmentStore, sort_segments};
use crate::model::{Segment, SegmentKey, SegmentRecord};

/// Directory-backed store, one CSV per key:
/// `<root>/date=YYYY-MM-DD/train_code=<code>.csv`.
///
/// A new set is written to a staging file next to the live one and renamed
/// over it once flushed, so the swap is atomic on the same filesystem.
/// Staging files left behind by an interrupted write are removed by the next
/// `replace` of the same key. One process writes to a directory at a time.
pub struct CsvStore {
    root: PathBuf,
}

impl CsvStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn date_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(format!("date={}", date.format("%Y-%m-%d")))
    }

    /// Location of the live file for `key`.
    pub fn path_for(&self, key: &SegmentKey) -> Result<PathBuf> {
        let code = &key.train_code;
        if code.is_empty() || code.contains(['/', '\\']) || code.starts_with('.') {
            bail!("train code '{code}' cannot be used as a file name");
        }
        Ok(self.date_dir(key.date).join(format!("train_code={code}.csv")))
    }

    fn live_name(live: &Path) -> &str {
        live.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("segments.csv")
    }

    fn staging_path(live: &Path) -> PathBuf {
        let name = Self::live_name(live);
        live.with_file_name(format!(".{name}.{}.staging", Uuid::new_v4()))
    }

    /// Removes staging files of `live` orphaned by earlier interrupted writes.
    fn sweep_staging(live: &Path) -> Result<usize> {
        let Some(dir) = live.parent() else {
            return Ok(0);
        };
        let prefix = format!(".{}.", Self::live_name(live));
        let mut removed = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with(&prefix) && name.ends_with(".staging") {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Persists the rename itself by syncing the directory entry.
    #[cfg(unix)]
    fn sync_dir(dir: &Path) -> Result<()> {
        File::open(dir)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_dir(_dir: &Path) -> Result<()> {
        Ok(())
    }

    fn write_staging(path: &Path, segments: &[Segment]) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);
        for segment in segments {
            writer.serialize(SegmentRecord::from(segment))?;
        }
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SegmentStore for CsvStore {
    #[tracing::instrument(skip(self, segments), fields(key = %key, count = segments.len()))]
    async fn replace(&self, key: &SegmentKey, mut segments: Vec<Segment>) -> Result<()> {
        let live = self.path_for(key)?;
        let dir = self.date_dir(key.date);
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        let swept = Self::sweep_staging(&live)
            .with_context(|| format!("removing stale staging files in {}", dir.display()))?;
        if swept > 0 {
            warn!(swept, "Removed staging files of an interrupted write");
        }

        sort_segments(&mut segments);
        let staging = Self::staging_path(&live);
        debug!(staging = %staging.display(), "Writing staging file");

        if let Err(e) = Self::write_staging(&staging, &segments) {
            let _ = fs::remove_file(&staging);
            return Err(e.context(format!("writing staging file {}", staging.display())));
        }

        fs::rename(&staging, &live).with_context(|| {
            format!("swapping {} into {}", staging.display(), live.display())
        })?;
        Self::sync_dir(&dir).with_context(|| format!("syncing {}", dir.display()))?;

        info!(path = %live.display(), "Segment set replaced");
        Ok(())
    }

    async fn segments(&self, key: &SegmentKey) -> Result<Vec<Segment>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&path)?;
        let mut rdr = csv::Reader::from_reader(file);
        let mut segments = Vec::new();

        for result in rdr.deserialize() {
            let record: SegmentRecord =
                result.with_context(|| format!("reading {}", path.display()))?;
            segments.push(Segment::from(record));
        }

        sort_segments(&mut segments);
        Ok(segments)
    }

    async fn keys(&self) -> Result<Vec<SegmentKey>> {
        let mut keys = Vec::new();
        if !self.root.exists() {
            return Ok(keys);
        }

        for date_entry in fs::read_dir(&self.root)? {
            let date_entry = date_entry?;
            if !date_entry.file_type()?.is_dir() {
                continue;
            }
            let dir_name = date_entry.file_name();
            let Some(date) = dir_name
                .to_str()
                .and_then(|name| name.strip_prefix("date="))
                .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
            else {
                continue;
            };

            for entry in fs::read_dir(date_entry.path())? {
                let entry = entry?;
                let file_name = entry.file_name();
                if let Some(code) = file_name
                    .to_str()
                    .and_then(|name| name.strip_prefix("train_code="))
                    .and_then(|name| name.strip_suffix(".csv"))
                {
                    keys.push(SegmentKey::new(date, code));
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Endpoint, PerClass};
    use chrono::{NaiveTime, Utc};
    use rust_decimal::Decimal;
    use std::env;

    fn temp_root(name: &str) -> PathBuf {
        let root = env::temp_dir().join(format!("daily_ticket_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        root
    }

    fn segment(id: i64, origin: u32, destination: u32) -> Segment {
        let endpoint = |index, hour| Endpoint {
            index,
            name: format!("站{index}"),
            name_pinyin: format!("zhan{index}"),
            time: NaiveTime::from_hms_opt(hour, 30, 0).unwrap(),
        };
        Segment {
            id,
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            train_code: "D3".to_string(),
            origin: endpoint(origin, 8),
            destination: endpoint(destination, 9),
            distance_km: Decimal::new(1255, 1),
            seats: PerClass::from_fn(|class| class.columns().len() as u32),
            fares: PerClass::from_fn(|class| class.unit_price() * Decimal::new(1255, 1)),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_replace_then_read_back() {
        let root = temp_root("read_back");
        let store = CsvStore::new(&root);
        let written = vec![segment(1, 0, 1), segment(2, 0, 2), segment(3, 1, 2)];
        let key = written[0].key();

        store.replace(&key, written.clone()).await.unwrap();
        let read = store.segments(&key).await.unwrap();

        assert_eq!(read.len(), 3);
        for (a, b) in written.iter().zip(&read) {
            assert!(a.same_content(b));
            assert_eq!(a.id, b.id);
        }

        fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_replace_leaves_no_staging_files() {
        let root = temp_root("staging");
        let store = CsvStore::new(&root);
        let key = segment(0, 0, 1).key();

        store.replace(&key, vec![segment(1, 0, 1)]).await.unwrap();
        store.replace(&key, vec![segment(2, 0, 1)]).await.unwrap();

        let dir = store.path_for(&key).unwrap().parent().unwrap().to_path_buf();
        let names: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["train_code=D3.csv".to_string()]);
        assert_eq!(store.segments(&key).await.unwrap()[0].id, 2);

        fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_replace_removes_orphaned_staging_files() {
        let root = temp_root("orphans");
        let store = CsvStore::new(&root);
        let key = segment(0, 0, 1).key();
        let live = store.path_for(&key).unwrap();
        let dir = live.parent().unwrap().to_path_buf();
        fs::create_dir_all(&dir).unwrap();

        // Left by a write that never reached the rename.
        fs::write(dir.join(".train_code=D3.csv.0b5e8c1e.staging"), "partial").unwrap();
        // Belongs to another key.
        fs::write(dir.join(".train_code=G1.csv.7f2a.staging"), "other").unwrap();

        store.replace(&key, vec![segment(1, 0, 1)]).await.unwrap();

        let mut names: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                ".train_code=G1.csv.7f2a.staging".to_string(),
                "train_code=D3.csv".to_string()
            ]
        );
        assert_eq!(store.segments(&key).await.unwrap().len(), 1);
        assert_eq!(store.keys().await.unwrap(), vec![key]);

        fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_keys_lists_stored_sets() {
        let root = temp_root("keys");
        let store = CsvStore::new(&root);
        let key = segment(0, 0, 1).key();
        store.replace(&key, vec![segment(1, 0, 1)]).await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec![key]);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_path_for_rejects_path_like_codes() {
        let store = CsvStore::new("segments");
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        assert!(store.path_for(&SegmentKey::new(date, "../G1")).is_err());
        assert!(store.path_for(&SegmentKey::new(date, "")).is_err());
        assert!(store.path_for(&SegmentKey::new(date, "G1")).is_ok());
    }
}
