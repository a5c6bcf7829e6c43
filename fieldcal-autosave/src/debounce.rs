//! Last-state-wins debounce loop.
//!
//! Every edit pushes the deadline out to `now + delay`. When the deadline
//! passes the save runs once, reading whatever state exists at that moment.
//! Ending the session drops a pending save; a flush runs it immediately.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep_until, Instant};

use crate::error::AutosaveError;

pub(crate) type SaveFn = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug)]
pub(crate) enum Command {
    Edited,
    /// Save now if an edit is pending, then acknowledge.
    Flush(oneshot::Sender<()>),
}

pub(crate) async fn debounce_task(
    name: &'static str,
    delay: Duration,
    save: SaveFn,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), AutosaveError> {
    let mut deadline: Option<Instant> = None;

    loop {
        let timer = async move {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = shutdown_rx.recv() => {
                if deadline.is_some() {
                    tracing::debug!(task = name, "session ended with an unsaved edit");
                }
                break;
            }
            command = commands.recv() => {
                let Some(command) = command else { break };
                match command {
                    Command::Edited => deadline = Some(Instant::now() + delay),
                    Command::Flush(done) => {
                        if deadline.take().is_some() {
                            run_save(name, &save).await?;
                        }
                        let _ = done.send(());
                    }
                }
            }
            _ = timer => {
                deadline = None;
                run_save(name, &save).await?;
            }
        }
    }

    Ok(())
}

async fn run_save(name: &'static str, save: &SaveFn) -> Result<(), AutosaveError> {
    let save = Arc::clone(save);
    tokio::task::spawn_blocking(move || save())
        .await
        .map_err(|err| AutosaveError::Task(format!("{name} save join error: {err}")))?;
    tracing::debug!(task = name, "debounced save ran");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    struct Harness {
        commands: mpsc::UnboundedSender<Command>,
        saved: mpsc::UnboundedReceiver<Instant>,
        shutdown: broadcast::Sender<()>,
        task: tokio::task::JoinHandle<Result<(), AutosaveError>>,
    }

    fn harness(delay: Duration) -> Harness {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (saved_tx, saved) = mpsc::unbounded_channel();
        let (shutdown, _) = broadcast::channel(4);
        let save: SaveFn = Arc::new(move || {
            let _ = saved_tx.send(Instant::now());
        });
        let task = tokio::spawn(debounce_task("test", delay, save, commands_rx, shutdown.subscribe()));
        Harness { commands, saved, shutdown, task }
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn rapid_edits_collapse_into_one_save() {
        let mut h = harness(Duration::from_secs(5));
        let start = Instant::now();
        for _ in 0..5 {
            h.commands.send(Command::Edited).unwrap();
            tokio::task::yield_now().await;
            advance(Duration::from_secs(1)).await;
        }

        let at = h.saved.recv().await.unwrap();
        assert_eq!(at - start, Duration::from_secs(9), "last edit at 4s plus the 5s delay");

        advance(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert!(h.saved.try_recv().is_err(), "no further edits, no further saves");

        let _ = h.shutdown.send(());
        h.task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn each_quiet_period_saves_again() {
        let mut h = harness(Duration::from_secs(2));
        let start = Instant::now();
        h.commands.send(Command::Edited).unwrap();
        assert_eq!(h.saved.recv().await.unwrap() - start, Duration::from_secs(2));

        h.commands.send(Command::Edited).unwrap();
        assert_eq!(h.saved.recv().await.unwrap() - start, Duration::from_secs(4));

        let _ = h.shutdown.send(());
        h.task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn shutdown_drops_a_pending_save() {
        let mut h = harness(Duration::from_secs(5));
        h.commands.send(Command::Edited).unwrap();
        tokio::task::yield_now().await;
        advance(Duration::from_secs(1)).await;

        let _ = h.shutdown.send(());
        h.task.await.unwrap().unwrap();
        assert!(h.saved.try_recv().is_err());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn flush_saves_immediately_and_only_when_dirty() {
        let mut h = harness(Duration::from_secs(5));
        let start = Instant::now();

        let (done, wait) = oneshot::channel();
        h.commands.send(Command::Flush(done)).unwrap();
        wait.await.unwrap();
        assert!(h.saved.try_recv().is_err(), "clean flush does nothing");

        h.commands.send(Command::Edited).unwrap();
        let (done, wait) = oneshot::channel();
        h.commands.send(Command::Flush(done)).unwrap();
        wait.await.unwrap();
        assert_eq!(h.saved.try_recv().unwrap(), start);

        advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert!(h.saved.try_recv().is_err(), "flush cleared the deadline");

        let _ = h.shutdown.send(());
        h.task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn closed_command_channel_ends_the_task() {
        let h = harness(Duration::from_secs(5));
        drop(h.commands);
        h.task.await.unwrap().unwrap();
    }
}
