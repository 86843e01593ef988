// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Session Lifecycle
//!
//! Who is signed in, and for how long they stay signed in without touching
//! anything.
//!
//! ## Pieces
//!
//! - [`session`]: the state holder (token, user, message) and its operations
//!   `initialize`, `login`, `logout`, `reset_idle_deadline`.
//! - [`watchdog`]: the idle timer and the countdown timer, as a pure state
//!   machine over explicit deadlines.
//! - [`driver`]: a tokio task that feeds activity and timer firings into the
//!   manager and reports what happened.
//!
//! ## Timing
//!
//! Defaults: warning after **9 minutes** idle, then a **60 second** countdown,
//! so a session lives at most **10 minutes** past the last activity.
//!
//! ```no_run
//! use clinic_session::security::{SessionManager, WatchdogConfig};
//! use clinic_session::{api::ApiClient, models::Credentials, storage::MemoryTokenStore};
//! use tokio::time::Instant;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = ApiClient::new("http://localhost:5000", 30)?;
//! let mut session = SessionManager::new(client, MemoryTokenStore::new(), WatchdogConfig::default());
//!
//! if !session.initialize(Instant::now()).await {
//!     session.login(&Credentials::new("me@example.com", "secret"), Instant::now()).await?;
//! }
//! session.reset_idle_deadline(Instant::now());
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod session;
pub mod watchdog;

pub use driver::{
    session_task, SessionCommand, SessionDriver, SessionFuture, SessionHandle, SessionTask,
};
pub use session::{
    LogoutKind, SessionManager, SessionNotice, INACTIVITY_MESSAGE, TOKEN_NOT_SAVED_MESSAGE,
    TOKEN_REJECTED_MESSAGE,
};
pub use watchdog::{
    Watchdog, WatchdogConfig, WatchdogEvent, WatchdogPhase, DEFAULT_COUNTDOWN_SECS,
    DEFAULT_IDLE_WARNING_SECS,
};
