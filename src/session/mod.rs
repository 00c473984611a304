//! Session history and its on-disk form.

pub mod store;

pub use store::{
    EventTotals, PersistError, PersistReport, SessionConfig, SessionFile, SessionStore,
    SharedSessionStore, PERSISTED_STATES,
};
