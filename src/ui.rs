use crate::format::format_date;
use crate::presenter::{DisplaySurface, ProgressBar, START_BUTTON_LABEL};
use crate::status::UpdateStatusSnapshot;
use dioxus::core::NoOpMutations;
use dioxus::prelude::*;

const REFRESH_SECS: u64 = 3;

#[derive(Props, Clone, PartialEq)]
pub struct AppProps {
    pub updater_url: String,
    pub surface: Option<DisplaySurface>,
    pub snapshot: Option<UpdateStatusSnapshot>,
    pub in_progress: bool,
}

pub fn render_html(
    updater_url: &str,
    surface: Option<DisplaySurface>,
    snapshot: Option<UpdateStatusSnapshot>,
    in_progress: bool,
) -> String {
    let mut app = VirtualDom::new_with_props(
        App,
        AppProps {
            updater_url: updater_url.to_string(),
            surface,
            snapshot,
            in_progress,
        },
    );
    // Build the tree before rendering to avoid SSR panics.
    let mut noop = NoOpMutations {};
    let _ = app.rebuild(&mut noop);
    format!("<!DOCTYPE html>{}", dioxus_ssr::render(&mut app))
}

#[component]
fn App(props: AppProps) -> Element {
    let styles = r#"
* { box-sizing: border-box; }
body, html { margin: 0; padding: 0; background: #0b0d13; }
.page { min-height: 100vh; display: flex; justify-content: center; padding: 36px 18px; color: #e9ecf5; font-family: "Inter", system-ui, -apple-system, sans-serif; }
.shell { width: min(900px, 100%); display: flex; flex-direction: column; gap: 12px; }
.title { font-size: 26px; margin: 0; }
.subtitle { margin: 0; color: #9aa4bc; font-size: 15px; }
.tag { display: inline-flex; width: fit-content; padding: 8px 12px; border-radius: 999px; background: #10131c; border: 1px solid #1f2431; color: #c5cee3; font-size: 14px; }
.card { background: linear-gradient(145deg, #161a23, #0f1219); border: 1px solid #1f2230; border-radius: 16px; padding: 22px; }
.card-title { margin: 0 0 10px 0; font-size: 20px; }
.muted { color: #8f98ac; font-size: 14px; }
.bar { height: 14px; border-radius: 8px; background: #10141d; border: 1px solid #1f2230; overflow: hidden; }
.bar-fill { height: 100%; background: linear-gradient(135deg, #5fd0ff, #3c8dff); }
.bar-text { margin: 6px 0 14px 0; color: #c5cee3; font-size: 13px; }
.counters { display: grid; grid-template-columns: repeat(3, 1fr); gap: 10px; }
.counter { background: #10141d; border: 1px solid #1f2230; border-radius: 12px; padding: 12px; text-align: center; }
.counter strong { display: block; font-size: 22px; }
.alert { margin-top: 14px; padding: 12px; border-radius: 12px; }
.alert-success { background: #12331f; border: 1px solid #2c7a4b; }
.alert-warning { background: #3a2d10; border: 1px solid #a27b24; }
.field { display: flex; flex-direction: column; gap: 6px; margin-bottom: 10px; font-size: 14px; }
.field input, .field select, .field textarea { padding: 10px 12px; border-radius: 10px; border: 1px solid #262b38; background: #0f1118; color: #dfe4f3; }
.primary { width: 100%; padding: 14px 16px; border-radius: 12px; border: none; background: linear-gradient(135deg, #5fd0ff, #3c8dff); color: #0b0d12; font-weight: 800; font-size: 16px; cursor: pointer; }
.primary:disabled { opacity: 0.5; cursor: not-allowed; }
.log { max-height: 260px; overflow-y: auto; background: #07090d; border-radius: 10px; padding: 10px; font-family: monospace; font-size: 12px; white-space: pre-wrap; margin: 0; }
.toast-container { position: fixed; bottom: 0; right: 0; padding: 16px; display: flex; flex-direction: column; gap: 8px; }
.toast { min-width: 260px; border-radius: 10px; padding: 10px 12px; }
.toast-header { display: flex; justify-content: space-between; font-size: 13px; margin-bottom: 4px; }
.text-bg-success { background: #198754; }
.text-bg-warning { background: #ffc107; color: #111; }
.text-bg-danger { background: #dc3545; }
.text-bg-info { background: #0dcaf0; color: #111; }
.text-bg-secondary { background: #6c757d; }
"#;

    // While updating, the page reloads itself from script so the leave
    // prompt only fires when the user navigates away.
    let leave_guard = r#"
let selfReload = false;
window.addEventListener('beforeunload', (e) => {
  if (selfReload) return;
  e.preventDefault();
  e.returnValue = 'Update in progress. Are you sure you want to leave?';
  return e.returnValue;
});
setTimeout(() => {
  selfReload = true;
  window.location.reload();
}, REFRESH_MS);
"#
    .replace("REFRESH_MS", &(REFRESH_SECS * 1000).to_string());

    let last_update = props
        .snapshot
        .as_ref()
        .and_then(|snapshot| snapshot.last_update.as_deref())
        .map(format_date)
        .unwrap_or_else(|| "never".to_string());
    let state_label = props
        .snapshot
        .as_ref()
        .map(|snapshot| format!("{:?}", snapshot.state).to_lowercase())
        .unwrap_or_else(|| "unknown".to_string());

    let Some(surface) = props.surface.clone() else {
        return rsx! {
            div { class: "page",
                div { class: "shell",
                    h1 { class: "title", "Firmware Updater" }
                    p { class: "muted", "No update page is bound to this console." }
                }
            }
            style { "{styles}" }
        };
    };

    let overall = surface.overall_bar.clone();
    let device = surface.device_bar.clone();
    let device_name = surface.device_name.clone();
    let counters = [
        ("Successful", surface.successful_count.clone()),
        ("Skipped", surface.skipped_count.clone()),
        ("Failed", surface.failed_count.clone()),
    ];
    let banner = surface
        .progress_container
        .as_ref()
        .and_then(|container| container.banner.clone());
    let (button_disabled, button_label) = surface
        .start_button
        .as_ref()
        .map(|button| (button.disabled, button.label.clone()))
        .unwrap_or((false, START_BUTTON_LABEL.to_string()));
    let has_button = surface.start_button.is_some();
    let log_text = surface
        .live_log
        .as_ref()
        .map(|panel| panel.lines.iter().cloned().collect::<Vec<_>>().join("\n"));
    let toasts: Vec<_> = surface
        .toast_container
        .as_ref()
        .map(|container| container.toasts.iter().cloned().collect())
        .unwrap_or_default();

    rsx! {
        div { class: "page",
            meta { name: "viewport", content: "width=device-width, initial-scale=1" }
            if !props.in_progress {
                meta { "http-equiv": "refresh", content: "{REFRESH_SECS}" }
            }
            div { class: "shell",
                h1 { class: "title", "Firmware Updater" }
                p { class: "subtitle", "Status: {state_label} (last update {last_update})" }
                div { class: "tag", "Updater at {props.updater_url}" }
                div { id: "update-progress-container", class: "card",
                    h2 { class: "card-title", "Update progress" }
                    if let Some(bar) = overall {
                        {progress_bar("overall-progress-bar", bar)}
                    }
                    if let Some(name) = device_name {
                        p { class: "muted", "Current device: " span { id: "current-device-name", "{name}" } }
                    }
                    if let Some(bar) = device {
                        {progress_bar("current-device-progress-bar", bar)}
                    }
                    div { class: "counters",
                        for (label, value) in counters {
                            if let Some(value) = value {
                                div { class: "counter",
                                    strong { "{value}" }
                                    span { class: "muted", "{label}" }
                                }
                            }
                        }
                    }
                    if let Some(banner) = banner {
                        div { class: "alert {banner.alert_class}", "{banner.message}" }
                    }
                }
                if has_button {
                    form { class: "card", method: "post", action: "/launch",
                        h2 { class: "card-title", "Start update" }
                        label { class: "field",
                            span { "Devices (comma or space separated)" }
                            textarea { name: "devices", rows: "2" }
                        }
                        label { class: "field",
                            span { "Build directory" }
                            input { name: "build_dir", r#type: "text", value: "../application/build" }
                        }
                        label { class: "field",
                            span { "Update mode" }
                            select { name: "update_mode",
                                option { value: "confirm", "Confirm" }
                                option { value: "test", "Test" }
                            }
                        }
                        label { class: "field",
                            span { "Stall timeout (seconds)" }
                            input { name: "stall_timeout", r#type: "number", min: "1", value: "300" }
                        }
                        button { id: "start-update-btn", class: "primary", r#type: "submit", disabled: button_disabled, "{button_label}" }
                    }
                }
                if let Some(text) = log_text {
                    div { class: "card",
                        h2 { class: "card-title", "Live log" }
                        pre { id: "live-log", class: "log", "{text}" }
                    }
                }
            }
        }
        if !toasts.is_empty() {
            div { id: "toast-container", class: "toast-container",
                for toast in toasts {
                    div { key: "{toast.id}", class: "toast {toast.color_class}", role: "alert",
                        div { class: "toast-header",
                            strong { "{toast.title}" }
                        }
                        div { class: "toast-body", "{toast.message}" }
                    }
                }
            }
        }
        style { "{styles}" }
        if props.in_progress {
            script { "{leave_guard}" }
        }
    }
}

fn progress_bar(id: &'static str, bar: ProgressBar) -> Element {
    rsx! {
        div { class: "bar",
            div { id: "{id}", class: "bar-fill", style: "width: {bar.width_percent}%" }
        }
        p { class: "bar-text", "{bar.text}" }
    }
}
