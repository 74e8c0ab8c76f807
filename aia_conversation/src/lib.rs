#![warn(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Conversation session: transcript state and the controller that drives it.
//!
//! A session opens with a synthetic assistant greeting. Each user turn is
//! appended optimistically, sent to the completion backend together with the
//! prior history, and then either confirmed by the assistant reply or rolled
//! back when the backend fails.
//!
//! # Key Features
//! - Single request in flight per session
//! - Rollback of the optimistic user turn on failure
//! - Snapshots published to observers over a `watch` channel
//! - Late replies dropped after the session was cleared

mod controller;
mod history;
mod store;

pub use controller::{SendOutcome, SessionController};
pub use history::{HistoryStats, history_payload};
pub use store::{ConversationStore, SessionState};
