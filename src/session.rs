use crate::presenter::Presenter;
use crate::reconcile::{Reconciliation, reconcile};
use crate::status::{ClientPollState, UpdateStatusSnapshot};
use std::sync::Mutex;

/// Poll context for one console: the cached server state plus the presenter
/// it renders into. Every writer goes through short critical sections that
/// never span an await point.
pub struct ConsoleSession {
    poll_state: Mutex<ClientPollState>,
    presenter: Presenter,
}

impl ConsoleSession {
    pub fn new(presenter: Presenter) -> Self {
        Self {
            poll_state: Mutex::new(ClientPollState::default()),
            presenter,
        }
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    pub fn poll_state(&self) -> ClientPollState {
        self.poll_state
            .lock()
            .expect("poll state poisoned")
            .clone()
    }

    pub fn in_progress(&self) -> bool {
        self.poll_state.lock().expect("poll state poisoned").in_progress
    }

    pub fn apply_snapshot(&self, next: UpdateStatusSnapshot) -> Reconciliation {
        let outcome = {
            let mut state = self.poll_state.lock().expect("poll state poisoned");
            let outcome = reconcile(state.last_snapshot.as_ref(), &next, state.completion_fired);
            state.last_snapshot = Some(next);
            state.in_progress = outcome.in_progress;
            state.completion_fired = outcome.completion_fired;
            outcome
        };
        if let Some(banner) = outcome.completion() {
            tracing::info!("Update episode finished: {}", banner.message);
        }
        self.presenter.apply(&outcome.effects);
        outcome
    }

    pub fn begin_launch(&self) {
        self.poll_state
            .lock()
            .expect("poll state poisoned")
            .begin_launch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::{DisplaySurface, START_BUTTON_LABEL};
    use crate::status::UpdateState;

    fn snapshot(state: UpdateState) -> UpdateStatusSnapshot {
        UpdateStatusSnapshot {
            state,
            total_devices: 2,
            completed_devices: 2,
            successful_updates: 2,
            ..Default::default()
        }
    }

    #[test]
    fn relaunch_rearms_completion() {
        let session = ConsoleSession::new(Presenter::bound(DisplaySurface::update_page(10)));

        session.apply_snapshot(snapshot(UpdateState::Updating));
        assert!(session.apply_snapshot(snapshot(UpdateState::Completed)).completion().is_some());
        assert!(session.apply_snapshot(snapshot(UpdateState::Completed)).completion().is_none());

        session.begin_launch();
        assert!(session.in_progress());
        assert!(!session.poll_state().completion_fired);

        session.apply_snapshot(snapshot(UpdateState::Updating));
        assert!(session.apply_snapshot(snapshot(UpdateState::Completed)).completion().is_some());
        assert!(!session.in_progress());
    }

    fn start_button(session: &ConsoleSession) -> (bool, String) {
        let button = session.presenter().surface().unwrap().start_button.unwrap();
        (button.disabled, button.label)
    }

    fn launched_session() -> ConsoleSession {
        let session = ConsoleSession::new(Presenter::bound(DisplaySurface::update_page(10)));
        session.presenter().set_start_button(true, "Updating...");
        session.begin_launch();
        session
    }

    #[test]
    fn errored_update_reenables_start_button() {
        let session = launched_session();
        session.apply_snapshot(snapshot(UpdateState::Updating));
        assert!(start_button(&session).0);

        let outcome = session.apply_snapshot(snapshot(UpdateState::Error));
        assert!(outcome.completion().is_none());
        assert!(!session.in_progress());
        assert_eq!(start_button(&session), (false, START_BUTTON_LABEL.to_string()));
    }

    #[test]
    fn update_finished_between_polls_reenables_start_button() {
        let session = launched_session();
        let outcome = session.apply_snapshot(snapshot(UpdateState::Completed));
        assert!(outcome.completion().is_none());
        assert_eq!(start_button(&session), (false, START_BUTTON_LABEL.to_string()));
    }

    #[test]
    fn snapshot_is_cached_wholesale() {
        let session = ConsoleSession::new(Presenter::new());
        let next = snapshot(UpdateState::Updating);
        session.apply_snapshot(next.clone());
        let state = session.poll_state();
        assert_eq!(state.last_snapshot, Some(next));
        assert!(state.in_progress);
    }
}
