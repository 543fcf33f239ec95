//! `weekroster` - weekly signups with a capacity-bounded roster and an
//! auto-promoting waitlist
//!
//! Each week has a fixed number of confirmed slots per player category.
//! Signups past the limit join a first-in first-out waitlist, and when a
//! confirmed player drops out the head of the waitlist is promoted and sent
//! an email notice. The roster is kept as one JSON document in a local file,
//! a local `SQLite` database, or a hosted row store with a local fallback.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod roster;
pub mod service;
pub mod store;
pub mod week;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use notify::{Notifier, PromotionNotice};
pub use roster::{Category, Placement, PlayerId, RosterSnapshot, SignupManager};
pub use service::SignupService;
pub use store::{open_store, RosterStore};
pub use week::WeekKey;
