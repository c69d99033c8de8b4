use crate::api::ClientError;
use crate::session::ConsoleSession;
use crate::status::UpdateStatusSnapshot;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self) -> Result<UpdateStatusSnapshot, ClientError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "outcome")]
pub enum PollOutcome {
    /// Another fetch was still pending; this tick was dropped.
    Skipped,
    /// The fetch failed; the cached snapshot is unchanged.
    Failed,
    Applied { completion: bool },
}

pub struct StatusPoller {
    source: Arc<dyn StatusSource>,
    session: Arc<ConsoleSession>,
    interval: Duration,
    in_flight: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl StatusPoller {
    pub fn new(
        source: Arc<dyn StatusSource>,
        session: Arc<ConsoleSession>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            session,
            interval,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &Arc<ConsoleSession> {
        &self.session
    }

    /// One tick: fetch the status and hand it to the session. Ticks that land
    /// while a fetch is outstanding are dropped, not queued, so snapshots are
    /// never applied out of order.
    pub async fn poll_once(&self) -> PollOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Status poll still in flight; dropping tick");
            return PollOutcome::Skipped;
        }
        let _guard = InFlight(&self.in_flight);

        match self.source.fetch_status().await {
            Ok(snapshot) => {
                let outcome = self.session.apply_snapshot(snapshot);
                PollOutcome::Applied {
                    completion: outcome.completion().is_some(),
                }
            }
            Err(err) => {
                tracing::warn!("Error fetching update status: {err}");
                PollOutcome::Failed
            }
        }
    }

    /// Polls forever, waiting the interval after each completed poll.
    pub async fn run(self: Arc<Self>) {
        tracing::info!("Polling update status every {:?}", self.interval);
        loop {
            self.poll_once().await;
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::{DisplaySurface, Presenter};
    use crate::status::UpdateState;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct ScriptedSource {
        replies: Mutex<VecDeque<Result<UpdateStatusSnapshot, ClientError>>>,
        hold_first: Mutex<Option<Arc<Notify>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(replies: Vec<Result<UpdateStatusSnapshot, ClientError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn fetch_status(&self) -> Result<UpdateStatusSnapshot, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.hold_first.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Status { status: 503 }))
        }
    }

    fn snapshot(state: UpdateState, completed: u64) -> UpdateStatusSnapshot {
        UpdateStatusSnapshot {
            state,
            total_devices: 2,
            completed_devices: completed,
            successful_updates: completed,
            ..Default::default()
        }
    }

    fn poller(source: Arc<ScriptedSource>) -> Arc<StatusPoller> {
        let session = Arc::new(ConsoleSession::new(Presenter::bound(
            DisplaySurface::update_page(10),
        )));
        Arc::new(StatusPoller::new(
            source,
            session,
            Duration::from_millis(3000),
        ))
    }

    #[tokio::test]
    async fn tick_during_pending_fetch_is_dropped() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(snapshot(UpdateState::Updating, 0)),
            Ok(snapshot(UpdateState::Updating, 1)),
        ]));
        *source.hold_first.lock().unwrap() = Some(gate.clone());
        let poller = poller(source.clone());

        let pending = tokio::spawn({
            let poller = poller.clone();
            async move { poller.poll_once().await }
        });
        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(poller.poll_once().await, PollOutcome::Skipped);
        assert_eq!(source.calls(), 1);

        gate.notify_one();
        assert_eq!(
            pending.await.unwrap(),
            PollOutcome::Applied { completion: false }
        );

        assert_eq!(
            poller.poll_once().await,
            PollOutcome::Applied { completion: false }
        );
        assert_eq!(source.calls(), 2);
        let state = poller.session().poll_state();
        assert_eq!(state.last_snapshot.unwrap().completed_devices, 1);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_snapshot() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(snapshot(UpdateState::Updating, 1)),
            Err(ClientError::Status { status: 500 }),
            Err(ClientError::Decode("truncated".into())),
            Ok(snapshot(UpdateState::Completed, 2)),
        ]));
        let poller = poller(source.clone());

        assert_eq!(
            poller.poll_once().await,
            PollOutcome::Applied { completion: false }
        );
        assert_eq!(poller.poll_once().await, PollOutcome::Failed);
        assert_eq!(poller.poll_once().await, PollOutcome::Failed);

        let state = poller.session().poll_state();
        assert_eq!(state.last_snapshot, Some(snapshot(UpdateState::Updating, 1)));
        assert!(state.in_progress);

        assert_eq!(
            poller.poll_once().await,
            PollOutcome::Applied { completion: true }
        );
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn run_keeps_polling_after_failures() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(ClientError::Status { status: 502 }),
            Ok(snapshot(UpdateState::Updating, 1)),
        ]));
        let poller = poller(source.clone());
        let task = tokio::spawn(poller.clone().run());

        tokio::time::sleep(Duration::from_millis(6500)).await;
        task.abort();

        assert_eq!(source.calls(), 3);
        assert_eq!(
            poller.session().poll_state().last_snapshot,
            Some(snapshot(UpdateState::Updating, 1))
        );
    }
}
