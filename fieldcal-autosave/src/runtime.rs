use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use fieldcal_store::repository::SETTINGS;
use fieldcal_store::settings::SETTINGS_ID;
use fieldcal_store::{paths, DocumentRepository, ReportSession, SaveOutcome};

use crate::config::{AutosaveConfig, WATCH_DEBOUNCE_WINDOW};
use crate::debounce::{debounce_task, Command, SaveFn};
use crate::error::{io_err, AutosaveError};

pub type SharedSession = Arc<Mutex<ReportSession>>;
pub type SharedRepository = Arc<dyn DocumentRepository>;

type TaskHandle = JoinHandle<Result<(), AutosaveError>>;

/// Running autosave loops for one session. Dropping the handle without
/// calling [`AutosaveHandle::shutdown`] leaves the tasks running until the
/// runtime stops.
pub struct AutosaveHandle {
    draft_tx: mpsc::UnboundedSender<Command>,
    settings_tx: mpsc::UnboundedSender<Command>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<(&'static str, TaskHandle)>,
}

/// Start the draft and settings loops (and the settings watcher when
/// configured). Must be called from inside a Tokio runtime.
pub fn spawn(session: SharedSession, repo: SharedRepository, config: &AutosaveConfig) -> AutosaveHandle {
    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    let (draft_tx, draft_rx) = mpsc::unbounded_channel();
    let (settings_tx, settings_rx) = mpsc::unbounded_channel();
    let mut tasks = Vec::new();

    tasks.push((
        "draft_autosave",
        spawn_task(
            &shutdown_tx,
            debounce_task("draft", config.draft_delay, draft_saver(&session, &repo), draft_rx, shutdown_tx.subscribe()),
        ),
    ));
    tasks.push((
        "settings_autosave",
        spawn_task(
            &shutdown_tx,
            debounce_task(
                "settings",
                config.settings_delay,
                settings_saver(&session, &repo),
                settings_rx,
                shutdown_tx.subscribe(),
            ),
        ),
    ));

    if let Some(home) = &config.watch_home {
        let watcher = settings_watcher_task(home.clone(), session.clone(), repo.clone(), shutdown_tx.subscribe());
        tasks.push(("settings_watcher", spawn_task(&shutdown_tx, watcher)));
    }

    AutosaveHandle {
        draft_tx,
        settings_tx,
        shutdown_tx,
        tasks,
    }
}

/// A task that fails takes the others down with it.
fn spawn_task<F>(shutdown: &broadcast::Sender<()>, task: F) -> TaskHandle
where
    F: std::future::Future<Output = Result<(), AutosaveError>> + Send + 'static,
{
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        let result = task.await;
        if let Err(err) = &result {
            tracing::error!(error = %err, "autosave task stopped");
        }
        let _ = shutdown.send(());
        result
    })
}

impl AutosaveHandle {
    /// Report an edit to the form. Restarts the draft timer.
    pub fn draft_edited(&self) {
        let _ = self.draft_tx.send(Command::Edited);
    }

    /// Report an edit to the settings bundle. Restarts the settings timer.
    pub fn settings_edited(&self) {
        let _ = self.settings_tx.send(Command::Edited);
    }

    /// Run any pending save now and wait for it.
    pub async fn flush(&self) -> Result<(), AutosaveError> {
        for (tx, name) in [(&self.draft_tx, "draft autosave"), (&self.settings_tx, "settings autosave")] {
            let (done, wait) = oneshot::channel();
            tx.send(Command::Flush(done))
                .map_err(|_| AutosaveError::ChannelClosed(name))?;
            wait.await.map_err(|_| AutosaveError::ChannelClosed(name))?;
        }
        Ok(())
    }

    /// End the session. Pending saves are discarded.
    pub async fn shutdown(self) -> Result<(), AutosaveError> {
        let _ = self.shutdown_tx.send(());
        for (name, task) in self.tasks {
            handle_join(name, task.await)?;
        }
        Ok(())
    }

    /// [`Self::flush`], then [`Self::shutdown`].
    pub async fn finish(self) -> Result<(), AutosaveError> {
        self.flush().await?;
        self.shutdown().await
    }
}

fn lock(session: &SharedSession) -> MutexGuard<'_, ReportSession> {
    session.lock().unwrap_or_else(|p| p.into_inner())
}

fn draft_saver(session: &SharedSession, repo: &SharedRepository) -> SaveFn {
    let session = session.clone();
    let repo = repo.clone();
    Arc::new(move || {
        if let Some(draft) = lock(&session).autosave(repo.as_ref()) {
            if let Some(id) = draft.id {
                tracing::info!(draft = %id, "draft autosaved");
            }
        }
    })
}

fn settings_saver(session: &SharedSession, repo: &SharedRepository) -> SaveFn {
    let session = session.clone();
    let repo = repo.clone();
    Arc::new(move || match lock(&session).save_settings(repo.as_ref()) {
        Ok(SaveOutcome::Written { hash }) => tracing::info!(%hash, "settings autosaved"),
        Ok(SaveOutcome::Unchanged) => tracing::debug!("settings unchanged, nothing to save"),
        Err(err) => tracing::warn!(error = %err, "settings autosave failed"),
    })
}

// ---------------------------------------------------------------------------
// Settings watcher
// ---------------------------------------------------------------------------

fn settings_document_path(home: &Path) -> PathBuf {
    paths::collections_dir_at(home)
        .join(SETTINGS)
        .join(format!("{SETTINGS_ID}.json"))
}

async fn settings_watcher_task(
    home: PathBuf,
    session: SharedSession,
    repo: SharedRepository,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), AutosaveError> {
    let document = settings_document_path(&home);
    let dir = document.parent().map(Path::to_path_buf).unwrap_or_else(|| home.clone());
    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    }
    // FSEvents reports real paths; compare against the canonical form.
    let dir = fs::canonicalize(&dir).unwrap_or(dir);
    let document = dir.join(format!("{SETTINGS_ID}.json"));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    tracing::info!(path = %document.display(), "watching settings document");

    let mut seen = HashMap::<PathBuf, Instant>::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }
                if !event.paths.iter().any(|p| p == &document) {
                    continue;
                }
                if !should_process_event(&mut seen, &document, Instant::now(), WATCH_DEBOUNCE_WINDOW) {
                    continue;
                }

                let session = session.clone();
                let repo = repo.clone();
                let reloaded = tokio::task::spawn_blocking(move || reload_settings(&session, repo.as_ref()))
                    .await
                    .map_err(|err| AutosaveError::Task(format!("settings reload join error: {err}")))?;
                match reloaded {
                    Ok(true) => tracing::info!("settings changed on disk, reloaded"),
                    Ok(false) => tracing::debug!("settings document touched, content unchanged"),
                    Err(err) => tracing::warn!(error = %err, "settings reload failed"),
                }
            }
        }
    }

    Ok(())
}

/// Replace the session's settings with the stored bundle when the two
/// differ. Returns whether anything changed.
pub(crate) fn reload_settings(
    session: &SharedSession,
    repo: &dyn DocumentRepository,
) -> Result<bool, AutosaveError> {
    Ok(lock(session).reload_settings(repo)?)
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

fn should_process_event(
    seen: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
    threshold: Duration,
) -> bool {
    seen.retain(|_, at| now.duration_since(*at) <= Duration::from_secs(30));
    match seen.get(path) {
        Some(last) if now.duration_since(*last) < threshold => false,
        _ => {
            seen.insert(path.to_path_buf(), now);
            true
        }
    }
}

fn handle_join(
    task: &str,
    result: Result<Result<(), AutosaveError>, tokio::task::JoinError>,
) -> Result<(), AutosaveError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(AutosaveError::Task(format!("{task} task join failure: {err}"))),
    }
}

/// Install the global subscriber. `FIELDCAL_LOG` wins over `RUST_LOG`; the
/// default level is `info`. `FIELDCAL_LOG_FORMAT=json` switches to JSON
/// lines. Output goes to stderr so command output on stdout stays parseable.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_env("FIELDCAL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = match std::env::var("FIELDCAL_LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().try_init(),
        _ => builder.try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldcal_core::{ReportingSettings, Role};
    use fieldcal_store::repository::DRAFTS;
    use fieldcal_store::{MemoryRepository, SessionUser, SettingsStore};
    use tokio::time::advance;

    fn shared() -> (SharedSession, Arc<MemoryRepository>) {
        let session = ReportSession::with_settings(
            ReportingSettings::default(),
            SessionUser::new("tech-1", Role::Technician),
        );
        (Arc::new(Mutex::new(session)), Arc::new(MemoryRepository::new()))
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn edits_without_a_customer_never_create_a_draft() {
        let (session, repo) = shared();
        let handle = spawn(session.clone(), repo.clone(), &AutosaveConfig::default());
        lock(&session).state.comments = "exploring".into();
        handle.draft_edited();
        handle.finish().await.unwrap();
        assert!(repo.get_all(DRAFTS).unwrap().is_empty());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn flushed_draft_holds_the_latest_state() {
        let (session, repo) = shared();
        let handle = spawn(session.clone(), repo.clone(), &AutosaveConfig::default());

        lock(&session).state.selection.customer_id = "c1".into();
        for text in ["a", "ab", "abc"] {
            lock(&session).state.comments = text.into();
            handle.draft_edited();
            tokio::task::yield_now().await;
            advance(Duration::from_secs(1)).await;
        }
        handle.finish().await.unwrap();

        let drafts = repo.get_all(DRAFTS).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0]["comments"], "abc");
        assert!(lock(&session).active_draft_id().is_some());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn shutdown_discards_unsaved_edits() {
        let (session, repo) = shared();
        let handle = spawn(session.clone(), repo.clone(), &AutosaveConfig::default());
        lock(&session).state.selection.customer_id = "c1".into();
        handle.draft_edited();
        handle.shutdown().await.unwrap();
        assert!(repo.get_all(DRAFTS).unwrap().is_empty());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn settings_loop_saves_on_its_own_timer() {
        let (session, repo) = shared();
        let handle = spawn(session.clone(), repo.clone(), &AutosaveConfig::default());
        lock(&session).update_settings(|s| s.add_unit("kN")).unwrap();
        handle.settings_edited();
        handle.finish().await.unwrap();

        let stored = repo.get_by_id(SETTINGS, SETTINGS_ID).unwrap().unwrap();
        assert!(stored["units"].as_array().unwrap().iter().any(|u| u == "kN"));
        assert!(repo.get_all(DRAFTS).unwrap().is_empty(), "the draft loop was never told about an edit");
    }

    #[test]
    fn reload_picks_up_foreign_writes_only() {
        let (session, repo) = shared();
        assert!(!reload_settings(&session, repo.as_ref()).unwrap());

        let mut foreign = ReportingSettings::default();
        foreign.add_unit("Nm").unwrap();
        SettingsStore::new().save(repo.as_ref(), &foreign).unwrap();

        assert!(reload_settings(&session, repo.as_ref()).unwrap());
        assert!(lock(&session).catalog().settings().units.contains(&"Nm".to_string()));
        assert!(!reload_settings(&session, repo.as_ref()).unwrap());
        assert_eq!(
            lock(&session).save_settings(repo.as_ref()).unwrap(),
            SaveOutcome::Unchanged,
            "a reloaded bundle is not written back"
        );
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn watcher_events_are_collapsed_per_path() {
        let mut seen = HashMap::new();
        let path = PathBuf::from("/tmp/settings/reporting.json");
        let mut reloads = 0;
        for _ in 0..5 {
            if should_process_event(&mut seen, &path, Instant::now(), WATCH_DEBOUNCE_WINDOW) {
                reloads += 1;
            }
            advance(Duration::from_millis(50)).await;
        }
        advance(Duration::from_secs(1)).await;
        if should_process_event(&mut seen, &path, Instant::now(), WATCH_DEBOUNCE_WINDOW) {
            reloads += 1;
        }
        assert_eq!(reloads, 2);
    }

    #[test]
    fn settings_document_lives_in_the_settings_collection() {
        let path = settings_document_path(Path::new("/home/u"));
        assert_eq!(path, PathBuf::from("/home/u/.fieldcal/collections/settings/reporting.json"));
    }
}
