//! Background reload of the links file.
//!
//! ```text
//! notify callback → bounded channel → settle delay → LinkStore::reload
//! ```
//!
//! The containing directory is watched rather than the file itself so that
//! editors that replace the file (write temp, rename over) are still seen.

use std::{
    path::{Path, PathBuf},
    sync::Weak,
    time::Duration,
};

use notify::{
    event::ModifyKind, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{error::Result, store::LinkStore};

type NotifyResult = notify::Result<Event>;

/// Events buffered between the notify thread and the reload task.
const EVENT_BUFFER: usize = 64;

/// Owns the watcher task. Dropping the handle signals the task to stop.
pub struct WatchHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Signal the task and wait for it to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Watcher task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Start watching `path` and reload `store` whenever the file is written.
///
/// Holds only a weak reference so the task never keeps the store alive.
pub(crate) fn spawn(
    store: Weak<LinkStore>,
    path: PathBuf,
    settle_delay: Duration,
) -> Result<WatchHandle> {
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let (event_tx, event_rx) = mpsc::channel::<NotifyResult>(EVENT_BUFFER);
    // The callback runs on notify's own thread, so it may block.
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = event_tx.blocking_send(res);
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(run(
        watcher,
        event_rx,
        shutdown_rx,
        store,
        path,
        settle_delay,
    ));

    Ok(WatchHandle {
        shutdown: Some(shutdown_tx),
        task: Some(task),
    })
}

async fn run(
    // Kept alive for the lifetime of the loop; dropping it ends the watch.
    watcher: RecommendedWatcher,
    mut events: mpsc::Receiver<NotifyResult>,
    mut shutdown: oneshot::Receiver<()>,
    store: Weak<LinkStore>,
    path: PathBuf,
    settle_delay: Duration,
) {
    tracing::debug!("Watching {} for changes", path.display());

    loop {
        let event = tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            Ok(event) if is_write_to(&event, &path) => {}
            Ok(_) => continue,
            Err(e) => {
                tracing::error!("Watcher error on {}: {}", path.display(), e);
                break;
            }
        }

        // Let a multi-step write finish before reading the file.
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(settle_delay) => {}
        }

        // Whatever queued up during the delay is covered by this reload.
        let mut failed = false;
        while let Ok(pending) = events.try_recv() {
            if let Err(e) = pending {
                tracing::error!("Watcher error on {}: {}", path.display(), e);
                failed = true;
                break;
            }
        }
        if failed {
            break;
        }

        let Some(store) = store.upgrade() else {
            break;
        };
        match store.reload().await {
            Ok(count) => tracing::debug!("Reloaded {} link(s) from {}", count, path.display()),
            Err(e) => tracing::warn!("Error reloading links: {}", e),
        }
    }

    // Close the channel first so a callback blocked on a full buffer returns.
    drop(events);
    drop(watcher);
    tracing::debug!("Stopped watching {}", path.display());
}

/// Whether `event` writes to exactly `path`. Metadata-only changes are
/// ignored.
fn is_write_to(event: &Event, path: &Path) -> bool {
    let is_write = match event.kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    };

    is_write && event.paths.iter().any(|p| p == path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::Link,
        store::{LinkStore, StoreOptions},
    };
    use std::sync::Arc;
    use tempfile::TempDir;

    const SETTLE: Duration = Duration::from_millis(50);

    fn make_event(paths: Vec<&str>, kind: EventKind) -> Event {
        Event {
            kind,
            paths: paths.into_iter().map(PathBuf::from).collect(),
            attrs: Default::default(),
        }
    }

    fn modify_kind() -> EventKind {
        EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Any))
    }

    async fn open_watched(dir: &TempDir) -> Arc<LinkStore> {
        let options = StoreOptions {
            watch: true,
            settle_delay: SETTLE,
        };
        LinkStore::open(dir.path().join("links.json"), options)
            .await
            .unwrap()
    }

    fn document(links: &[Link]) -> String {
        let map: std::collections::HashMap<_, _> =
            links.iter().map(|l| (l.alias.clone(), l.clone())).collect();
        serde_json::to_string_pretty(&map).unwrap()
    }

    /// Poll `check` until it passes or a few seconds elapse.
    async fn eventually<F, Fut>(mut check: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..100 {
            if check().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[test]
    fn write_events_on_target_match() {
        let target = Path::new("/data/links.json");

        assert!(is_write_to(
            &make_event(vec!["/data/links.json"], modify_kind()),
            target
        ));
        assert!(is_write_to(
            &make_event(
                vec!["/data/links.json"],
                EventKind::Create(notify::event::CreateKind::File)
            ),
            target
        ));
        assert!(is_write_to(
            &make_event(
                vec!["/data/.links.json.abc.tmp", "/data/links.json"],
                EventKind::Modify(ModifyKind::Name(notify::event::RenameMode::Both))
            ),
            target
        ));
    }

    #[test]
    fn other_events_are_ignored() {
        let target = Path::new("/data/links.json");

        assert!(!is_write_to(
            &make_event(vec!["/data/other.json"], modify_kind()),
            target
        ));
        assert!(!is_write_to(
            &make_event(
                vec!["/data/links.json"],
                EventKind::Modify(ModifyKind::Metadata(
                    notify::event::MetadataKind::Permissions
                ))
            ),
            target
        ));
        assert!(!is_write_to(
            &make_event(
                vec!["/data/links.json"],
                EventKind::Remove(notify::event::RemoveKind::File)
            ),
            target
        ));
        assert!(!is_write_to(
            &make_event(
                vec!["/data/links.json"],
                EventKind::Access(notify::event::AccessKind::Read)
            ),
            target
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn external_edit_is_picked_up() {
        let dir = TempDir::new().unwrap();
        let store = open_watched(&dir).await;
        store
            .create(Link::new("gh", "https://github.com/x", None, None))
            .await
            .unwrap();

        let external = Link::new("wiki", "https://wiki.example.com", None, Some("docs"));
        std::fs::write(store.path(), document(&[external.clone()])).unwrap();

        let seen = eventually(|| {
            let store = store.clone();
            async move { store.get("wiki").await.is_ok() }
        })
        .await;
        assert!(seen, "external edit never reached the store");
        assert_eq!(store.list().await, vec![external]);

        store.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn bad_edit_is_skipped_and_watching_continues() {
        let dir = TempDir::new().unwrap();
        let store = open_watched(&dir).await;
        store
            .create(Link::new("gh", "https://github.com/x", None, None))
            .await
            .unwrap();

        std::fs::write(store.path(), "{ definitely not json").unwrap();
        tokio::time::sleep(SETTLE * 6).await;
        assert!(store.get("gh").await.is_ok());

        let fixed = Link::new("fixed", "https://example.com", None, None);
        std::fs::write(store.path(), document(&[fixed])).unwrap();

        let seen = eventually(|| {
            let store = store.clone();
            async move { store.get("fixed").await.is_ok() }
        })
        .await;
        assert!(seen, "watcher stopped after a failed reload");
        assert!(store.get("gh").await.unwrap_err().is_not_found());

        store.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn truncated_file_empties_the_store() {
        let dir = TempDir::new().unwrap();
        let store = open_watched(&dir).await;
        store
            .create(Link::new("gh", "https://github.com/x", None, None))
            .await
            .unwrap();

        std::fs::write(store.path(), "").unwrap();

        let emptied = eventually(|| {
            let store = store.clone();
            async move { store.list().await.is_empty() }
        })
        .await;
        assert!(emptied);

        store.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn closed_store_stops_reloading() {
        let dir = TempDir::new().unwrap();
        let store = open_watched(&dir).await;
        store
            .create(Link::new("gh", "https://github.com/x", None, None))
            .await
            .unwrap();
        store.close().await;

        std::fs::write(store.path(), "").unwrap();
        tokio::time::sleep(SETTLE * 8).await;

        assert!(store.get("gh").await.is_ok());
    }

    /// Drive `run` with hand-fed events. The returned senders must stay
    /// alive for as long as the loop should keep running.
    fn run_with_events(
        store: Weak<LinkStore>,
        path: PathBuf,
    ) -> (mpsc::Sender<NotifyResult>, oneshot::Sender<()>, JoinHandle<()>) {
        let watcher = notify::recommended_watcher(|_: NotifyResult| {}).unwrap();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(watcher, event_rx, shutdown_rx, store, path, SETTLE));
        (event_tx, shutdown_tx, task)
    }

    fn write_event(path: &Path) -> NotifyResult {
        Ok(Event {
            kind: modify_kind(),
            paths: vec![path.to_path_buf()],
            attrs: Default::default(),
        })
    }

    #[tokio::test]
    async fn watch_error_ends_the_loop() {
        let dir = TempDir::new().unwrap();
        let (event_tx, _shutdown_tx, task) =
            run_with_events(Weak::new(), dir.path().join("links.json"));

        event_tx
            .send(Err(notify::Error::generic("watch backend failed")))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("loop kept running after a watch error")
            .unwrap();
    }

    #[tokio::test]
    async fn watch_error_during_settle_delay_ends_the_loop() {
        let dir = TempDir::new().unwrap();
        let store = LinkStore::open(dir.path().join("links.json"), StoreOptions::unwatched())
            .await
            .unwrap();
        store
            .create(Link::new("gh", "https://github.com/x", None, None))
            .await
            .unwrap();
        let path = store.path().to_path_buf();
        let (event_tx, _shutdown_tx, task) = run_with_events(Arc::downgrade(&store), path.clone());

        // A plain write reloads and keeps the loop going.
        event_tx.send(write_event(&path)).await.unwrap();
        tokio::time::sleep(SETTLE * 4).await;
        assert!(!task.is_finished());

        // An error queued behind a write is seen while draining.
        event_tx.send(write_event(&path)).await.unwrap();
        event_tx
            .send(Err(notify::Error::generic("watch backend failed")))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("loop kept running after a watch error")
            .unwrap();
        assert!(store.get("gh").await.is_ok());
    }
}
