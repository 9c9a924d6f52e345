use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use super::Destination;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A user-visible toast/banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info<S: Into<String>>(msg: S) -> Self { Self { level: NoticeLevel::Info, message: msg.into() } }
    pub fn error<S: Into<String>>(msg: S) -> Self { Self { level: NoticeLevel::Error, message: msg.into() } }
}

/// Sink for the router's observable side effects.
pub trait Navigator: Send + Sync {
    fn notify(&self, notice: Notice);
    fn redirect(&self, to: Destination);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    Notice(Notice),
    Redirect(Destination),
}

/// Navigator that records every event with the (tokio) instant it fired.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    events: Mutex<Vec<(Instant, NavEvent)>>,
}

impl RecordingNavigator {
    pub fn new() -> Self { Self::default() }

    pub fn events(&self) -> Vec<NavEvent> {
        self.events.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn timed_events(&self) -> Vec<(Instant, NavEvent)> {
        self.events.lock().clone()
    }

    pub fn redirects(&self) -> Vec<Destination> {
        self.events
            .lock()
            .iter()
            .filter_map(|(_, e)| match e { NavEvent::Redirect(d) => Some(d.clone()), _ => None })
            .collect()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.events
            .lock()
            .iter()
            .filter_map(|(_, e)| match e { NavEvent::Notice(n) => Some(n.clone()), _ => None })
            .collect()
    }
}

impl Navigator for RecordingNavigator {
    fn notify(&self, notice: Notice) {
        self.events.lock().push((Instant::now(), NavEvent::Notice(notice)));
    }

    fn redirect(&self, to: Destination) {
        self.events.lock().push((Instant::now(), NavEvent::Redirect(to)));
    }
}
