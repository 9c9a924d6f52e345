//! Profile router: sends a signed-in user to the profile page for their role.
//!
//! One activation runs `Resolving -> FetchingRecord -> Routing` and ends in exactly one
//! terminal state. Every notice and redirect is gated on the caller's `CancelToken`, so
//! nothing fires once the hosting page has gone away.
//!
//! | Outcome                | Notice                          | Redirect                         |
//! |------------------------|---------------------------------|----------------------------------|
//! | nobody signed in       | "Please log in to view ..."     | `/login`                         |
//! | record read failed     | "Failed to load user profile"   | `/login` after the failure delay |
//! | role `recruiter`       | -                               | `/profiles/recruiters/<id>`      |
//! | role `student`         | -                               | `/profiles/students/<id>`        |
//! | anything else          | "Unrecognized role: <value>"    | none                             |

mod cancel;
mod navigator;

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::DEFAULT_FAILURE_REDIRECT_MS;
use crate::identity::{IdentityService, UserId};
use crate::storage::DocumentStore;

pub use cancel::CancelToken;
pub use navigator::{NavEvent, Navigator, Notice, NoticeLevel, RecordingNavigator};

pub const UNAUTHENTICATED_NOTICE: &str = "Please log in to view your profile";
pub const FETCH_FAILED_NOTICE: &str = "Failed to load user profile";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Student,
    Recruiter,
    Unrecognized(String),
}

impl Role {
    /// Case-insensitive match on the record's role field; absent reads as `"none"`.
    pub fn from_field(raw: Option<&str>) -> Self {
        match raw {
            None => Role::Unrecognized("none".to_string()),
            Some(r) if r.eq_ignore_ascii_case("student") => Role::Student,
            Some(r) if r.eq_ignore_ascii_case("recruiter") => Role::Recruiter,
            Some(r) => Role::Unrecognized(r.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum Destination {
    Login,
    RecruiterProfile(UserId),
    StudentProfile(UserId),
}

impl Destination {
    pub fn path(&self) -> String {
        match self {
            Destination::Login => "/login".to_string(),
            Destination::RecruiterProfile(id) => format!("/profiles/recruiters/{}", id),
            Destination::StudentProfile(id) => format!("/profiles/students/{}", id),
        }
    }
}

impl Display for Destination {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(&self.path()) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterState {
    Resolving,
    Unauthenticated,
    FetchingRecord,
    FetchFailed,
    Routing,
    Routed(Destination),
    RoleError(String),
    Cancelled,
}

pub struct ProfileRouter {
    identity: Arc<dyn IdentityService>,
    store: Arc<dyn DocumentStore>,
    nav: Arc<dyn Navigator>,
    failure_delay: Duration,
    state: Mutex<RouterState>,
}

impl ProfileRouter {
    pub fn new(identity: Arc<dyn IdentityService>, store: Arc<dyn DocumentStore>, nav: Arc<dyn Navigator>) -> Self {
        Self {
            identity,
            store,
            nav,
            failure_delay: Duration::from_millis(DEFAULT_FAILURE_REDIRECT_MS),
            state: Mutex::new(RouterState::Resolving),
        }
    }

    pub fn with_failure_delay(mut self, delay: Duration) -> Self {
        self.failure_delay = delay;
        self
    }

    pub fn state(&self) -> RouterState { self.state.lock().clone() }

    fn enter(&self, next: RouterState) -> RouterState {
        debug!(target: "getit::profile", "router state -> {:?}", next);
        *self.state.lock() = next.clone();
        next
    }

    // Side effects are dropped once the activation is cancelled.
    fn notify(&self, cancel: &CancelToken, notice: Notice) -> bool {
        if cancel.is_cancelled() { return false; }
        self.nav.notify(notice);
        true
    }

    fn redirect(&self, cancel: &CancelToken, to: Destination) -> bool {
        if cancel.is_cancelled() { return false; }
        self.nav.redirect(to);
        true
    }

    /// Drive one activation to a terminal state.
    pub async fn run(&self, cancel: &CancelToken) -> RouterState {
        self.enter(RouterState::Resolving);
        let identity = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.enter(RouterState::Cancelled),
            id = self.identity.current_identity() => id,
        };

        let Some(user_id) = identity else {
            if !self.notify(cancel, Notice::info(UNAUTHENTICATED_NOTICE)) || !self.redirect(cancel, Destination::Login) {
                return self.enter(RouterState::Cancelled);
            }
            return self.enter(RouterState::Unauthenticated);
        };

        self.enter(RouterState::FetchingRecord);
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.enter(RouterState::Cancelled),
            r = self.store.get_user(&user_id) => r,
        };

        let record = match fetched {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "getit::profile", "failed to load record for {}: {e}", user_id);
                if !self.notify(cancel, Notice::error(FETCH_FAILED_NOTICE)) {
                    return self.enter(RouterState::Cancelled);
                }
                self.enter(RouterState::FetchFailed);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return self.enter(RouterState::Cancelled),
                    _ = tokio::time::sleep(self.failure_delay) => {}
                }
                if !self.redirect(cancel, Destination::Login) {
                    return self.enter(RouterState::Cancelled);
                }
                return RouterState::FetchFailed;
            }
        };

        self.enter(RouterState::Routing);
        let dest = match Role::from_field(record.role.as_deref()) {
            Role::Recruiter => Destination::RecruiterProfile(user_id),
            Role::Student => Destination::StudentProfile(user_id),
            Role::Unrecognized(value) => {
                if !self.notify(cancel, Notice::error(format!("Unrecognized role: {}", value))) {
                    return self.enter(RouterState::Cancelled);
                }
                return self.enter(RouterState::RoleError(value));
            }
        };
        if !self.redirect(cancel, dest.clone()) {
            return self.enter(RouterState::Cancelled);
        }
        self.enter(RouterState::Routed(dest))
    }
}
