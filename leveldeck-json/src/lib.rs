use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leveldeck_core::{CoreError, LevelStore, MapDictionary, Weights, WriteBatch};
use log::{error, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tokio::task;

pub mod paths;

const FILE_VERSION: u32 = 1;

/// On-disk layout. `levels` holds raw codes; weights sit beside them, not among them.
#[derive(Clone, Serialize, Deserialize)]
struct FileImage {
    version: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    weights: Option<Weights>,
    levels: BTreeMap<String, i64>,
}

impl FileImage {
    fn new_empty() -> Self {
        let now = Utc::now();
        Self {
            version: FILE_VERSION,
            created_at: now,
            updated_at: now,
            weights: None,
            levels: BTreeMap::new(),
        }
    }

    fn apply(&mut self, batch: &WriteBatch) {
        for (key, level) in &batch.levels {
            self.levels.insert(key.clone(), level.code());
        }
        if let Some(w) = &batch.weights {
            self.weights = Some(w.clone());
        }
        self.updated_at = Utc::now();
    }
}

/// Whole-file JSON store. Each commit rewrites the file atomically and drops a
/// timestamped copy into the backups directory.
pub struct JsonStore {
    path: PathBuf,
    backups_dir: PathBuf,
    max_backups: usize,
    image: RwLock<FileImage>,
    writer: Mutex<()>,
}

impl JsonStore {
    pub async fn open_default() -> Result<Self, CoreError> {
        let (file, backups) = paths::default_store_file();
        Self::open_with(file, backups, 10).await
    }

    pub async fn open_with(path: PathBuf, backups_dir: PathBuf, max_backups: usize) -> Result<Self, CoreError> {
        ensure_parent_dirs(&path)?;
        ensure_dir(&backups_dir)?;
        let image = load_or_init(&path, &backups_dir).await?;
        info!("json store at {} ({} keys)", path.display(), image.levels.len());
        Ok(Self {
            path,
            backups_dir,
            max_backups: max_backups.max(1),
            image: RwLock::new(image),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn ensure_parent_dirs(path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

fn ensure_dir(path: &Path) -> Result<(), CoreError> {
    fs::create_dir_all(path).map_err(|_| CoreError::Storage("io"))
}

async fn load_or_init(path: &Path, backups_dir: &Path) -> Result<FileImage, CoreError> {
    if path.exists() {
        let p = path.to_path_buf();
        task::spawn_blocking(move || {
            let buf = fs::read_to_string(&p)?;
            let img = serde_json::from_str::<FileImage>(&buf)?;
            Ok::<FileImage, std::io::Error>(img)
        })
        .await
        .map_err(|_| CoreError::Storage("io"))?
        .map_err(|e| {
            error!("cannot read {}: {e}", path.display());
            CoreError::Storage("unreadable level file")
        })
    } else {
        let img = FileImage::new_empty();
        write_with_backup(path, backups_dir, 1, &img).map_err(|_| CoreError::Storage("io"))?;
        Ok(img)
    }
}

/// Persists `img` to `path`, then drops a backup copy. Once the main file is on disk
/// the write counts as done; backup trouble is only logged.
fn write_with_backup(path: &Path, backups_dir: &Path, max_backups: usize, img: &FileImage) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec_pretty(img)?;
    let mut tmp = NamedTempFile::new_in(path.parent().unwrap_or_else(|| Path::new(".")))?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    if let Err(e) = write_backup(backups_dir, max_backups, &json) {
        warn!("backup in {} skipped: {e}", backups_dir.display());
    }
    Ok(())
}

fn write_backup(backups_dir: &Path, max_backups: usize, json: &[u8]) -> Result<(), std::io::Error> {
    fs::create_dir_all(backups_dir)?;
    let ts = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
    let backup_path = backups_dir.join(format!("levels-{ts}.json"));
    let mut btmp = NamedTempFile::new_in(backups_dir)?;
    btmp.write_all(json)?;
    btmp.flush()?;
    btmp.persist(&backup_path).map_err(|e| e.error)?;

    rotate_backups(backups_dir, max_backups)
}

fn rotate_backups(dir: &Path, keep: usize) -> Result<(), std::io::Error> {
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    entries.sort_by_key(|e| e.file_name());
    if entries.len() > keep {
        for e in &entries[0..entries.len() - keep] {
            let _ = fs::remove_file(e.path());
        }
    }
    Ok(())
}

#[async_trait]
impl LevelStore for JsonStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, CoreError> {
        Ok(self.image.read().levels.get(key).copied())
    }

    async fn entries(&self) -> Result<Vec<(String, i64)>, CoreError> {
        Ok(self
            .image
            .read()
            .levels
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }

    async fn weights(&self) -> Result<Option<Weights>, CoreError> {
        Ok(self.image.read().weights.clone())
    }

    async fn commit(&self, batch: &WriteBatch) -> Result<(), CoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let _writer = self.writer.lock().await;
        let mut next = self.image.read().clone();
        next.apply(batch);

        let path = self.path.clone();
        let backups = self.backups_dir.clone();
        let keep = self.max_backups;
        let snapshot = next.clone();
        task::spawn_blocking(move || write_with_backup(&path, &backups, keep, &snapshot))
            .await
            .map_err(|_| CoreError::Storage("io"))?
            .map_err(|e| {
                error!("cannot write {}: {e}", self.path.display());
                CoreError::Storage("io")
            })?;

        // Only a file that reached disk becomes the visible state.
        *self.image.write() = next;
        Ok(())
    }
}

/// Loads a dictionary from a JSON object file mapping keys to arbitrary values.
pub async fn load_dictionary(path: impl AsRef<Path>) -> Result<MapDictionary, CoreError> {
    let p = path.as_ref().to_path_buf();
    let entries = task::spawn_blocking(move || {
        let buf = fs::read_to_string(&p)?;
        let map = serde_json::from_str::<HashMap<String, Value>>(&buf)?;
        Ok::<_, std::io::Error>(map)
    })
    .await
    .map_err(|_| CoreError::Storage("io"))?
    .map_err(|_| CoreError::Storage("unreadable dictionary file"))?;
    Ok(MapDictionary::new(entries))
}
