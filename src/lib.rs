pub mod api;
pub mod config;
pub mod format;
pub mod launcher;
pub mod notify;
pub mod poller;
pub mod presenter;
pub mod reconcile;
pub mod session;
pub mod status;
pub mod ui;
pub mod web;
