use crate::types::{RelayError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Per-feed watermark repository: one plain-decimal file per feed id
/// under the state directory. A feed that has never been seen reads
/// as 0.
pub struct WatermarkStore {
    dir: PathBuf,
}

impl WatermarkStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, feed_id: u64) -> PathBuf {
        self.dir.join(format!("{}.watermark", feed_id))
    }

    pub fn read(&self, feed_id: u64) -> Result<i64> {
        let path = self.path_for(feed_id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        raw.trim().parse::<i64>().map_err(|_| {
            RelayError::Parse(format!(
                "watermark file {} holds non-numeric value {:?}",
                path.display(),
                raw.trim()
            ))
        })
    }

    /// Whole-value overwrite, atomic per feed: written to a temp file
    /// first, then renamed into place. Last write wins.
    pub fn write(&self, feed_id: u64, value: i64) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(feed_id);
        let tmp = tmp_path(&path);
        fs::write(&tmp, value.to_string())?;
        fs::rename(&tmp, &path)?;

        debug!("Watermark for feed {} is now {}", feed_id, value);
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_feed_reads_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());
        assert_eq!(store.read(42).unwrap(), 0);
    }

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());
        store.write(42, 1650508215).unwrap();
        assert_eq!(store.read(42).unwrap(), 1650508215);
    }

    #[test]
    fn last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());
        store.write(42, 100).unwrap();
        store.write(42, 200).unwrap();
        assert_eq!(store.read(42).unwrap(), 200);
    }

    #[test]
    fn feeds_do_not_share_watermarks() {
        let dir = tempfile::tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());
        store.write(1, 10).unwrap();
        store.write(2, 20).unwrap();
        assert_eq!(store.read(1).unwrap(), 10);
        assert_eq!(store.read(2).unwrap(), 20);
    }

    #[test]
    fn corrupt_watermark_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());
        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(dir.path().join("42.watermark"), "not a number").unwrap();
        assert!(store.read(42).is_err());
    }
}
