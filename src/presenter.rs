use crate::reconcile::{BannerTone, CompletionBanner, Effect, OverallProgress, ProgressView};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

pub const START_BUTTON_LABEL: &str = "Start Update Process";
const NO_PROGRESS_TEXT: &str = "No devices in progress";
const MAX_TOASTS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Warning,
    Error,
    Info,
    #[serde(other)]
    Other,
}

impl NotificationKind {
    pub fn color_class(self) -> &'static str {
        match self {
            NotificationKind::Success => "text-bg-success",
            NotificationKind::Warning => "text-bg-warning",
            NotificationKind::Error => "text-bg-danger",
            NotificationKind::Info => "text-bg-info",
            NotificationKind::Other => "text-bg-secondary",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            NotificationKind::Success => "Success",
            NotificationKind::Warning => "Warning",
            NotificationKind::Error => "Error",
            NotificationKind::Info => "Info",
            NotificationKind::Other => "Notice",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProgressBar {
    pub width_percent: u8,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Banner {
    pub alert_class: &'static str,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProgressContainer {
    pub banner: Option<Banner>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StartButton {
    pub disabled: bool,
    pub label: String,
}

impl Default for StartButton {
    fn default() -> Self {
        Self {
            disabled: false,
            label: START_BUTTON_LABEL.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Toast {
    pub id: u64,
    pub kind: NotificationKind,
    pub title: &'static str,
    pub color_class: &'static str,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ToastContainer {
    pub toasts: VecDeque<Toast>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogPanel {
    pub lines: VecDeque<String>,
    pub max_lines: usize,
}

impl LogPanel {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines: max_lines.max(1),
        }
    }

    fn push(&mut self, line: String) {
        while self.lines.len() >= self.max_lines {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }
}

/// Elements of the update page. A `None` slot is an element the page does not
/// contain; writes aimed at it are skipped.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DisplaySurface {
    pub overall_bar: Option<ProgressBar>,
    pub device_bar: Option<ProgressBar>,
    pub device_name: Option<String>,
    pub successful_count: Option<String>,
    pub skipped_count: Option<String>,
    pub failed_count: Option<String>,
    pub progress_container: Option<ProgressContainer>,
    pub start_button: Option<StartButton>,
    pub live_log: Option<LogPanel>,
    pub toast_container: Option<ToastContainer>,
}

impl DisplaySurface {
    pub fn update_page(log_lines: usize) -> Self {
        Self {
            overall_bar: Some(ProgressBar {
                width_percent: 0,
                text: NO_PROGRESS_TEXT.to_string(),
            }),
            device_bar: Some(ProgressBar {
                width_percent: 0,
                text: "0%".to_string(),
            }),
            device_name: Some("None".to_string()),
            successful_count: Some("0".to_string()),
            skipped_count: Some("0".to_string()),
            failed_count: Some("0".to_string()),
            progress_container: Some(ProgressContainer::default()),
            start_button: Some(StartButton::default()),
            live_log: Some(LogPanel::new(log_lines)),
            toast_container: None,
        }
    }

    fn apply_progress(&mut self, view: &ProgressView) {
        if let Some(bar) = self.overall_bar.as_mut() {
            match view.overall {
                OverallProgress::NoProgress => {
                    bar.width_percent = 0;
                    bar.text = NO_PROGRESS_TEXT.to_string();
                }
                OverallProgress::Devices {
                    completed,
                    total,
                    percent,
                } => {
                    bar.width_percent = percent;
                    bar.text = format!("{completed}/{total} devices ({percent}%)");
                }
            }
        }
        if let Some(bar) = self.device_bar.as_mut() {
            bar.width_percent = view.device_percent;
            bar.text = format!("{}%", view.device_percent);
        }
        if let Some(name) = self.device_name.as_mut() {
            *name = view
                .current_device
                .clone()
                .unwrap_or_else(|| "None".to_string());
        }
        set_text(&mut self.successful_count, view.counters.successful);
        set_text(&mut self.skipped_count, view.counters.skipped);
        set_text(&mut self.failed_count, view.counters.failed);
    }

    fn apply_completion(&mut self, banner: &CompletionBanner) {
        let Some(container) = self.progress_container.as_mut() else {
            return;
        };
        let alert_class = banner.tone.alert_class();
        match container.banner.as_mut() {
            Some(existing) => {
                existing.alert_class = alert_class;
                existing.message.clone_from(&banner.message);
            }
            None => {
                container.banner = Some(Banner {
                    alert_class,
                    message: banner.message.clone(),
                });
            }
        }
        self.settle();
    }

    fn settle(&mut self) {
        if let Some(button) = self.start_button.as_mut() {
            button.disabled = false;
            button.label = START_BUTTON_LABEL.to_string();
        }
    }
}

fn set_text(slot: &mut Option<String>, value: u64) {
    if let Some(text) = slot.as_mut() {
        *text = value.to_string();
    }
}

/// Side-effecting sink for reconciled effects, toasts and log lines.
///
/// The presenter only writes when a surface is bound, so polling can keep
/// running while nobody is looking at the update page.
#[derive(Default)]
pub struct Presenter {
    surface: RwLock<Option<DisplaySurface>>,
    next_toast_id: AtomicU64,
}

impl Presenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bound(surface: DisplaySurface) -> Self {
        let presenter = Self::new();
        presenter.bind(surface);
        presenter
    }

    pub fn bind(&self, surface: DisplaySurface) {
        *self.surface.write().expect("presenter surface poisoned") = Some(surface);
    }

    pub fn surface(&self) -> Option<DisplaySurface> {
        self.surface
            .read()
            .expect("presenter surface poisoned")
            .clone()
    }

    pub fn apply(&self, effects: &[Effect]) {
        self.with_surface(|surface| {
            for effect in effects {
                match effect {
                    Effect::Progress(view) => surface.apply_progress(view),
                    Effect::Completion(banner) => surface.apply_completion(banner),
                    Effect::Settled => surface.settle(),
                }
            }
        });
    }

    pub fn show_toast(&self, kind: NotificationKind, message: &str) {
        let id = self.next_toast_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.with_surface(|surface| {
            let container = surface
                .toast_container
                .get_or_insert_with(ToastContainer::default);
            while container.toasts.len() >= MAX_TOASTS {
                container.toasts.pop_front();
            }
            container.toasts.push_back(Toast {
                id,
                kind,
                title: kind.title(),
                color_class: kind.color_class(),
                message: message.to_string(),
            });
        });
    }

    pub fn append_log(&self, message: &str) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.with_surface(|surface| {
            if let Some(panel) = surface.live_log.as_mut() {
                panel.push(format!("[{stamp}] {message}"));
            }
        });
    }

    pub fn set_start_button(&self, disabled: bool, label: &str) {
        self.with_surface(|surface| {
            if let Some(button) = surface.start_button.as_mut() {
                button.disabled = disabled;
                button.label = label.to_string();
            }
        });
    }

    fn with_surface(&self, write: impl FnOnce(&mut DisplaySurface)) {
        let mut guard = self.surface.write().expect("presenter surface poisoned");
        match guard.as_mut() {
            Some(surface) => write(surface),
            None => tracing::trace!("No display surface bound; skipping render"),
        }
    }
}
