//! Turns a freshly polled status snapshot into display effects.
//!
//! Progress and counters are emitted on every poll and are safe to re-apply.
//! The completion banner is a one-shot effect: it fires on the falling edge of
//! `updating` and is suppressed until a new launch rearms it. Any other
//! snapshot outside `updating` settles the page so it can be launched again.

use crate::status::{UpdateState, UpdateStatusSnapshot};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum OverallProgress {
    NoProgress,
    Devices { completed: u64, total: u64, percent: u8 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub successful: u64,
    pub failed: u64,
    pub skipped: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgressView {
    pub overall: OverallProgress,
    pub device_percent: u8,
    pub current_device: Option<String>,
    pub counters: Counters,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BannerTone {
    Success,
    Warning,
}

impl BannerTone {
    pub fn alert_class(self) -> &'static str {
        match self {
            BannerTone::Success => "alert-success",
            BannerTone::Warning => "alert-warning",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompletionBanner {
    pub tone: BannerTone,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Progress(ProgressView),
    Completion(CompletionBanner),
    /// The server is not updating and no banner was due.
    Settled,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reconciliation {
    pub effects: Vec<Effect>,
    pub in_progress: bool,
    pub completion_fired: bool,
}

impl Reconciliation {
    pub fn completion(&self) -> Option<&CompletionBanner> {
        self.effects.iter().find_map(|effect| match effect {
            Effect::Completion(banner) => Some(banner),
            Effect::Progress(_) | Effect::Settled => None,
        })
    }
}

pub fn reconcile(
    previous: Option<&UpdateStatusSnapshot>,
    next: &UpdateStatusSnapshot,
    completion_fired: bool,
) -> Reconciliation {
    let mut effects = vec![Effect::Progress(progress_view(next))];

    let falling_edge = next.state == UpdateState::Completed
        && previous.is_some_and(UpdateStatusSnapshot::is_updating);

    let mut fired = completion_fired;
    if falling_edge && !completion_fired {
        effects.push(Effect::Completion(CompletionBanner {
            tone: if next.failed_updates > 0 {
                BannerTone::Warning
            } else {
                BannerTone::Success
            },
            message: completion_message(
                next.successful_updates,
                next.failed_updates,
                next.skipped_updates,
            ),
        }));
        fired = true;
    } else if !next.is_updating() {
        effects.push(Effect::Settled);
    }

    Reconciliation {
        effects,
        in_progress: next.is_updating(),
        completion_fired: fired,
    }
}

pub fn progress_view(snapshot: &UpdateStatusSnapshot) -> ProgressView {
    ProgressView {
        overall: overall_progress(snapshot.completed_devices, snapshot.total_devices),
        device_percent: clamp_percent(snapshot.upload_progress),
        current_device: snapshot.current_device.clone(),
        counters: Counters {
            successful: snapshot.successful_updates,
            failed: snapshot.failed_updates,
            skipped: snapshot.skipped_updates,
        },
    }
}

pub fn overall_progress(completed: u64, total: u64) -> OverallProgress {
    if total == 0 {
        return OverallProgress::NoProgress;
    }
    OverallProgress::Devices {
        completed,
        total,
        percent: clamp_percent(completed as f64 / total as f64 * 100.0),
    }
}

fn clamp_percent(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

/// Success, failure and skipped clauses are independent of each other.
pub fn completion_message(successful: u64, failed: u64, skipped: u64) -> String {
    let mut message = if failed > 0 {
        format!(
            "Update completed with issues. {successful} device(s) updated, {failed} failed."
        )
    } else {
        format!("Update completed successfully! {successful} device(s) updated.")
    };
    if skipped > 0 {
        message.push_str(&format!(
            " {skipped} device(s) skipped (already had the image)."
        ));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(state: UpdateState) -> UpdateStatusSnapshot {
        UpdateStatusSnapshot {
            state,
            total_devices: 3,
            completed_devices: if state == UpdateState::Completed { 3 } else { 1 },
            successful_updates: 2,
            skipped_updates: 1,
            upload_progress: 55.5,
            ..Default::default()
        }
    }

    /// Feeds a snapshot sequence through the reconciler the way the poller does.
    fn run(sequence: &[UpdateState], mut fired: bool) -> (Vec<bool>, bool) {
        let mut previous: Option<UpdateStatusSnapshot> = None;
        let mut completions = Vec::new();
        for state in sequence {
            let next = snapshot(*state);
            let outcome = reconcile(previous.as_ref(), &next, fired);
            completions.push(outcome.completion().is_some());
            fired = outcome.completion_fired;
            previous = Some(next);
        }
        (completions, fired)
    }

    #[test]
    fn completion_fires_once_per_episode() {
        use UpdateState::*;
        let (completions, fired) =
            run(&[Updating, Updating, Completed, Completed, Completed], false);
        assert_eq!(completions, vec![false, false, true, false, false]);
        assert!(fired);
    }

    #[test]
    fn completed_without_observed_update_does_not_fire() {
        use UpdateState::*;
        let (completions, _) = run(&[Completed, Completed], false);
        assert_eq!(completions, vec![false, false]);
        let (completions, _) = run(&[Idle, Completed], false);
        assert_eq!(completions, vec![false, false]);
    }

    #[test]
    fn already_fired_flag_suppresses_edge() {
        let previous = snapshot(UpdateState::Updating);
        let next = snapshot(UpdateState::Completed);
        let outcome = reconcile(Some(&previous), &next, true);
        assert!(outcome.completion().is_none());
        assert!(outcome.completion_fired);
    }

    #[test]
    fn progress_is_always_emitted() {
        let next = snapshot(UpdateState::Updating);
        let outcome = reconcile(None, &next, false);
        assert!(matches!(outcome.effects.as_slice(), [Effect::Progress(_)]));
        assert!(outcome.in_progress);
    }

    #[test]
    fn leaving_updating_without_banner_settles() {
        let updating = snapshot(UpdateState::Updating);
        for state in [UpdateState::Error, UpdateState::Idle, UpdateState::Unknown] {
            let outcome = reconcile(Some(&updating), &snapshot(state), false);
            assert!(matches!(
                outcome.effects.as_slice(),
                [Effect::Progress(_), Effect::Settled]
            ));
        }

        let completed = snapshot(UpdateState::Completed);
        let outcome = reconcile(None, &completed, false);
        assert!(matches!(
            outcome.effects.as_slice(),
            [Effect::Progress(_), Effect::Settled]
        ));
        let outcome = reconcile(Some(&updating), &completed, true);
        assert!(matches!(
            outcome.effects.as_slice(),
            [Effect::Progress(_), Effect::Settled]
        ));
    }

    #[test]
    fn completion_edge_does_not_also_settle() {
        let updating = snapshot(UpdateState::Updating);
        let completed = snapshot(UpdateState::Completed);
        let outcome = reconcile(Some(&updating), &completed, false);
        assert!(matches!(
            outcome.effects.as_slice(),
            [Effect::Progress(_), Effect::Completion(_)]
        ));
    }

    #[test]
    fn in_progress_tracks_updating_state() {
        let updating = snapshot(UpdateState::Updating);
        assert!(reconcile(None, &updating, false).in_progress);
        let errored = snapshot(UpdateState::Error);
        let outcome = reconcile(Some(&updating), &errored, false);
        assert!(!outcome.in_progress);
        assert!(outcome.completion().is_none());
        let unknown = snapshot(UpdateState::Unknown);
        assert!(!reconcile(Some(&updating), &unknown, false).in_progress);
    }

    #[test]
    fn zero_total_reports_no_progress() {
        assert_eq!(overall_progress(0, 0), OverallProgress::NoProgress);
        assert_eq!(overall_progress(5, 0), OverallProgress::NoProgress);
    }

    #[test]
    fn overshoot_clamps_to_hundred() {
        assert_eq!(
            overall_progress(7, 4),
            OverallProgress::Devices {
                completed: 7,
                total: 4,
                percent: 100
            }
        );
        assert_eq!(
            overall_progress(1, 3),
            OverallProgress::Devices {
                completed: 1,
                total: 3,
                percent: 33
            }
        );
    }

    #[test]
    fn device_percent_is_rounded_and_clamped() {
        let mut next = snapshot(UpdateState::Updating);
        next.upload_progress = 99.6;
        assert_eq!(progress_view(&next).device_percent, 100);
        next.upload_progress = 140.0;
        assert_eq!(progress_view(&next).device_percent, 100);
        next.upload_progress = f64::NAN;
        assert_eq!(progress_view(&next).device_percent, 0);
        next.upload_progress = 12.4;
        assert_eq!(progress_view(&next).device_percent, 12);
    }

    #[test]
    fn banner_with_skips_and_no_failures() {
        let message = completion_message(3, 0, 2);
        assert_eq!(
            message,
            "Update completed successfully! 3 device(s) updated. \
             2 device(s) skipped (already had the image)."
        );
        assert!(!message.contains("failed"));
    }

    #[test]
    fn banner_with_failures_and_no_skips() {
        let message = completion_message(1, 2, 0);
        assert_eq!(
            message,
            "Update completed with issues. 1 device(s) updated, 2 failed."
        );
        assert!(!message.contains("skipped"));
    }

    #[test]
    fn failure_tone_selects_warning() {
        let previous = snapshot(UpdateState::Updating);
        let mut next = snapshot(UpdateState::Completed);
        next.failed_updates = 1;
        let outcome = reconcile(Some(&previous), &next, false);
        let banner = outcome.completion().unwrap();
        assert_eq!(banner.tone, BannerTone::Warning);
        assert!(banner.message.contains("with issues"));
        assert!(banner.message.contains("1 device(s) skipped"));
    }
}
