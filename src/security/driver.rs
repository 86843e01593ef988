// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Tokio driver for the session watchdog.
//!
//! One task owns the [`SessionManager`] and is the only writer. It waits on
//! two things: the next command from a [`SessionHandle`], and the watchdog's
//! next deadline. Activity that piles up in the channel is collapsed into a
//! single deadline reset.
//!
//! ```no_run
//! # use clinic_session::security::{SessionDriver, SessionManager, WatchdogConfig};
//! # use clinic_session::{api::ApiClient, storage::MemoryTokenStore};
//! # async fn example() -> anyhow::Result<()> {
//! let client = ApiClient::new("http://localhost:5000", 30)?;
//! let manager = SessionManager::new(client, MemoryTokenStore::new(), WatchdogConfig::default());
//! let (driver, handle, mut notices) = SessionDriver::new(manager);
//! let task = tokio::spawn(driver.run());
//!
//! handle.activity();
//! while let Some(notice) = notices.recv().await {
//!     println!("{:?}", notice);
//! }
//! let manager = task.await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::{pending, Future};
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};

use super::session::{SessionManager, SessionNotice};
use crate::api::{ApiError, AuthBackend};
use crate::models::{Credentials, User};
use crate::storage::TokenStore;

/// Command queue depth. Activity beyond this is dropped, which is harmless
/// because queued activity is coalesced anyway.
const COMMAND_CAPACITY: usize = 64;

/// Future returned by a [`SessionTask`], borrowing the manager.
pub type SessionFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Work run by the driver with exclusive access to the manager.
pub type SessionTask<B, S> =
    Box<dyn for<'a> FnOnce(&'a mut SessionManager<B, S>) -> SessionFuture<'a> + Send>;

/// Box a closure as a [`SessionTask`]. Passing the closure through here pins
/// down its higher-ranked signature.
pub fn session_task<B, S, F>(task: F) -> SessionTask<B, S>
where
    B: AuthBackend + 'static,
    S: TokenStore + 'static,
    F: for<'a> FnOnce(&'a mut SessionManager<B, S>) -> SessionFuture<'a> + Send + 'static,
{
    Box::new(task)
}

pub enum SessionCommand<B: AuthBackend, S: TokenStore> {
    /// Qualifying user activity
    Activity,
    /// "Continue" on the warning dialog
    Continue,
    /// Explicit logout with optional reason
    Logout(Option<String>),
    /// Error from an authenticated call made elsewhere
    ApiError(ApiError),
    /// Anything else that needs the manager: login, dashboard calls
    Run(SessionTask<B, S>),
    /// Stop the driver and cancel all timers
    Shutdown,
}

impl<B: AuthBackend, S: TokenStore> fmt::Debug for SessionCommand<B, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activity => f.write_str("Activity"),
            Self::Continue => f.write_str("Continue"),
            Self::Logout(reason) => f.debug_tuple("Logout").field(reason).finish(),
            Self::ApiError(error) => f.debug_tuple("ApiError").field(error).finish(),
            Self::Run(_) => f.write_str("Run(..)"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Cheap, cloneable sender side of the driver.
pub struct SessionHandle<B: AuthBackend, S: TokenStore> {
    commands: mpsc::Sender<SessionCommand<B, S>>,
}

impl<B: AuthBackend, S: TokenStore> Clone for SessionHandle<B, S> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
        }
    }
}

impl<B: AuthBackend, S: TokenStore> fmt::Debug for SessionHandle<B, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

impl<B: AuthBackend + 'static, S: TokenStore + 'static> SessionHandle<B, S> {
    /// Report activity. Never blocks; a full queue already holds activity.
    pub fn activity(&self) {
        let _ = self.commands.try_send(SessionCommand::Activity);
    }

    pub async fn continue_session(&self) {
        let _ = self.commands.send(SessionCommand::Continue).await;
    }

    pub async fn logout(&self, reason: Option<String>) {
        let _ = self.commands.send(SessionCommand::Logout(reason)).await;
    }

    pub async fn report_error(&self, error: ApiError) {
        let _ = self.commands.send(SessionCommand::ApiError(error)).await;
    }

    /// Run `task` against the manager inside the driver and return its
    /// output. `None` once the driver has stopped.
    ///
    /// Timers are serviced again as soon as the task finishes; anything that
    /// fell due meanwhile fires then.
    pub async fn with_session<T, F>(&self, task: F) -> Option<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut SessionManager<B, S>) -> Pin<Box<dyn Future<Output = T> + Send + 'a>>
            + Send
            + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let run = session_task(move |manager| {
            Box::pin(async move {
                let output = task(manager).await;
                let _ = reply_tx.send(output);
            })
        });
        self.commands.send(SessionCommand::Run(run)).await.ok()?;
        reply_rx.await.ok()
    }

    /// Sign in through the driver; the watchdog restarts on success.
    /// `None` once the driver has stopped.
    pub async fn login(&self, credentials: Credentials) -> Option<Result<User, ApiError>> {
        self.with_session(move |manager| {
            Box::pin(async move { manager.login(&credentials, Instant::now()).await })
        })
        .await
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(SessionCommand::Shutdown).await;
    }

    /// True once the driver has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Owns the session manager while it runs.
pub struct SessionDriver<B: AuthBackend, S: TokenStore> {
    manager: SessionManager<B, S>,
    commands: mpsc::Receiver<SessionCommand<B, S>>,
    notices: mpsc::UnboundedSender<SessionNotice>,
}

impl<B: AuthBackend, S: TokenStore> SessionDriver<B, S> {
    pub fn new(
        manager: SessionManager<B, S>,
    ) -> (Self, SessionHandle<B, S>, mpsc::UnboundedReceiver<SessionNotice>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let driver = Self {
            manager,
            commands: cmd_rx,
            notices: notice_tx,
        };
        (driver, SessionHandle { commands: cmd_tx }, notice_rx)
    }

    fn emit(&self, notice: SessionNotice) {
        // Receiver gone means nobody is rendering; the session still runs.
        let _ = self.notices.send(notice);
    }

    /// Run until `Shutdown` or every handle is dropped. Returns the manager
    /// with all timers cancelled.
    pub async fn run(mut self) -> SessionManager<B, S> {
        tracing::debug!("SESSION_DRIVER | started phase={}", self.manager.phase());

        loop {
            let deadline = self.manager.next_timer_deadline();
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(first) = command else { break };
                    let batch = self.drain(first);
                    if !self.apply(batch).await {
                        break;
                    }
                }
                _ = wait_until(deadline) => {
                    for notice in self.manager.poll_timers(Instant::now()) {
                        self.emit(notice);
                    }
                }
            }
        }

        self.manager.shutdown();
        tracing::debug!("SESSION_DRIVER | stopped");
        self.manager
    }

    /// Pull everything already queued, collapsing runs of activity.
    fn drain(&mut self, first: SessionCommand<B, S>) -> Vec<SessionCommand<B, S>> {
        let mut batch = vec![first];
        while let Ok(next) = self.commands.try_recv() {
            let repeat = matches!(
                (batch.last(), &next),
                (Some(SessionCommand::Activity), SessionCommand::Activity)
            );
            if !repeat {
                batch.push(next);
            }
        }
        batch
    }

    /// Apply a batch; returns false on shutdown.
    async fn apply(&mut self, batch: Vec<SessionCommand<B, S>>) -> bool {
        for command in batch {
            let now = Instant::now();
            let notice = match command {
                SessionCommand::Activity => {
                    self.manager.reset_idle_deadline(now);
                    None
                }
                SessionCommand::Continue => self.manager.continue_session(now),
                SessionCommand::Logout(reason) => self.manager.logout(reason.as_deref()),
                SessionCommand::ApiError(error) => self.manager.handle_api_error(&error),
                SessionCommand::Run(task) => {
                    self.run_task(task).await;
                    None
                }
                SessionCommand::Shutdown => return false,
            };
            if let Some(notice) = notice {
                self.emit(notice);
            }
        }
        true
    }

    /// Run a task and report a logout it caused (a rejected token seen by
    /// `observe`).
    async fn run_task(&mut self, task: SessionTask<B, S>) {
        let was_authenticated = self.manager.is_authenticated();
        task(&mut self.manager).await;
        if was_authenticated && !self.manager.is_authenticated() {
            if let Some(kind) = self.manager.last_logout() {
                let reason = self.manager.message().map(str::to_string);
                self.emit(SessionNotice::LoggedOut { kind, reason });
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}
