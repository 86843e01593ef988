// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! clinic-session - session lifecycle for the practice dashboard
//!
//! Sign in, stay signed in while you work, get warned before an idle session
//! ends, and get signed out when it does.
//!
//! **Login** -> **Active** -> (9 min idle) -> **Warning** (60 s) -> **Logged out**
//!
//! # Core Modules
//!
//! - [`security`] - Session state, inactivity watchdog and its async driver
//! - [`api`] - Backend client and the `AuthBackend` seam
//! - [`storage`] - Token persistence across restarts
//! - [`dashboard`] - Admin operations routed through the session
//! - [`models`] - Wire types and form validation
//! - [`config`] - Client configuration (`~/.clinic/config.json`)
//! - [`error`] - Consistent error formatting utilities

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod security;
pub mod storage;
pub mod utils;

pub use api::{ApiClient, ApiError, AuthBackend};
pub use config::ClientConfig;
pub use models::{Credentials, User};
pub use security::{
    LogoutKind, SessionDriver, SessionHandle, SessionManager, SessionNotice, WatchdogConfig,
    WatchdogPhase,
};
pub use storage::{FileTokenStore, MemoryTokenStore, StorageError, TokenStore};
