use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tokio::sync::{Mutex, RwLock};

use crate::{
    error::{Result, StoreError},
    models::Link,
    watcher::{self, WatchHandle},
};

/// Pause between a file change event and the reload it triggers.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Start a background watcher that reloads on external edits.
    pub watch: bool,
    pub settle_delay: Duration,
}

impl StoreOptions {
    pub fn unwatched() -> Self {
        Self {
            watch: false,
            ..Self::default()
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            watch: true,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Alias → [`Link`] map persisted as a single pretty-printed JSON file.
///
/// One reader/writer lock guards both the map and every read or write of the
/// backing file, so `get`/`list` run concurrently while mutations and
/// reloads run one at a time. Every successful mutation is on disk before
/// it returns.
pub struct LinkStore {
    path: PathBuf,
    links: RwLock<HashMap<String, Link>>,
    watcher: Mutex<Option<WatchHandle>>,
}

impl LinkStore {
    /// Open the store at `path`, creating its directory if needed and loading
    /// the file if it already exists.
    pub async fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Arc<Self>> {
        let path = resolve_path(path.as_ref()).await?;

        let mut links = HashMap::new();
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        if exists {
            load_into(&path, &mut links).await?;
        }
        tracing::debug!("Loaded {} link(s) from {}", links.len(), path.display());

        let store = Arc::new_cyclic(|weak| {
            let handle = if options.watch {
                match watcher::spawn(weak.clone(), path.clone(), options.settle_delay) {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        tracing::error!("Could not watch {}: {}", path.display(), e);
                        None
                    }
                }
            } else {
                None
            };

            Self {
                path,
                links: RwLock::new(links),
                watcher: Mutex::new(handle),
            }
        });

        Ok(store)
    }

    /// Absolute path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a new link. Fails if the alias is taken.
    pub async fn create(&self, link: Link) -> Result<()> {
        let mut links = self.links.write().await;
        if links.contains_key(&link.alias) {
            return Err(StoreError::AlreadyExists(link.alias));
        }

        let alias = link.alias.clone();
        links.insert(alias.clone(), link);
        if let Err(e) = persist(&self.path, &links).await {
            links.remove(&alias);
            return Err(e);
        }

        tracing::info!("Created link {}", alias);
        Ok(())
    }

    pub async fn get(&self, alias: &str) -> Result<Link> {
        let links = self.links.read().await;
        links
            .get(alias)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(alias.to_owned()))
    }

    /// Snapshot of every link, in no particular order.
    pub async fn list(&self) -> Vec<Link> {
        let links = self.links.read().await;
        links.values().cloned().collect()
    }

    /// Replace an existing link wholesale. Timestamps are stored exactly as
    /// given.
    pub async fn update(&self, link: Link) -> Result<()> {
        let mut links = self.links.write().await;
        if !links.contains_key(&link.alias) {
            return Err(StoreError::NotFound(link.alias));
        }

        let alias = link.alias.clone();
        let previous = links.insert(alias.clone(), link);
        if let Err(e) = persist(&self.path, &links).await {
            if let Some(previous) = previous {
                links.insert(alias, previous);
            }
            return Err(e);
        }

        tracing::info!("Updated link {}", alias);
        Ok(())
    }

    pub async fn delete(&self, alias: &str) -> Result<()> {
        let mut links = self.links.write().await;
        let Some(removed) = links.remove(alias) else {
            return Err(StoreError::NotFound(alias.to_owned()));
        };

        if let Err(e) = persist(&self.path, &links).await {
            links.insert(alias.to_owned(), removed);
            return Err(e);
        }

        tracing::info!("Deleted link {}", alias);
        Ok(())
    }

    /// Write the whole in-memory map back to disk.
    pub async fn save(&self) -> Result<()> {
        let links = self.links.write().await;
        persist(&self.path, &links).await
    }

    /// Replace the in-memory map with the file's current contents. On a
    /// parse error the previous map is kept.
    pub(crate) async fn reload(&self) -> Result<usize> {
        let mut links = self.links.write().await;
        load_into(&self.path, &mut links).await?;
        Ok(links.len())
    }

    /// Stop the file watcher, if any, and wait for it to exit.
    pub async fn close(&self) {
        let handle = self.watcher.lock().await.take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }
}

async fn resolve_path(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path).map_err(|e| StoreError::io(path, e))?;

    let (Some(dir), Some(file_name)) = (absolute.parent(), absolute.file_name()) else {
        return Err(StoreError::io(
            &absolute,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path"),
        ));
    };

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))?;

    // Watch events report canonical directory paths on some platforms.
    let dir = tokio::fs::canonicalize(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))?;

    Ok(dir.join(file_name))
}

/// Serialize `links` and move it over `path` via a sibling temp file.
///
/// Callers must already hold the store's write lock.
async fn persist(path: &Path, links: &HashMap<String, Link>) -> Result<()> {
    let data = serde_json::to_vec_pretty(links).map_err(StoreError::Serialize)?;

    let tmp = temp_path(path);
    if let Err(e) = tokio::fs::write(&tmp, &data).await {
        return Err(StoreError::io(&tmp, e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StoreError::io(path, e));
    }

    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
}

/// Read `path` into `links`. An empty file yields an empty map; a parse
/// failure leaves `links` untouched.
///
/// Callers must already hold the store's write lock (or own the map).
async fn load_into(path: &Path, links: &mut HashMap<String, Link>) -> Result<()> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| StoreError::io(path, e))?;

    if data.iter().all(u8::is_ascii_whitespace) {
        links.clear();
        return Ok(());
    }

    let loaded: HashMap<String, Link> =
        serde_json::from_slice(&data).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    *links = loaded;
    Ok(())
}
