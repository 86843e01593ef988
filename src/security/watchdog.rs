// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Inactivity Watchdog
//!
//! Two cooperating timers layered on top of the session:
//!
//! - **Idle timer**: fires once after `idle_window` without activity and opens
//!   the warning.
//! - **Countdown timer**: ticks once per second while the warning is open and
//!   forces logout when the countdown reaches zero.
//!
//! The watchdog never sleeps or spawns anything itself. Each armed timer is a
//! [`TimerHandle`] plus a deadline stored on the struct; the driver sleeps
//! until [`Watchdog::next_deadline`] and hands the firing back through
//! [`Watchdog::fire`]. A firing whose handle is no longer the live one is
//! dropped, so a timer that was replaced or cancelled can never act.

use std::time::Duration;
use tokio::time::Instant;

/// Idle time before the warning is shown: 9 minutes.
pub const DEFAULT_IDLE_WARNING_SECS: u64 = 9 * 60;

/// Seconds the user has to confirm before the forced logout.
pub const DEFAULT_COUNTDOWN_SECS: u32 = 60;

/// Countdown tick interval.
pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Watchdog timing inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Idle time before the warning opens
    pub idle_window: Duration,
    /// Countdown length in ticks (seconds)
    pub countdown_secs: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            idle_window: Duration::from_secs(DEFAULT_IDLE_WARNING_SECS),
            countdown_secs: DEFAULT_COUNTDOWN_SECS,
        }
    }
}

impl WatchdogConfig {
    /// Build a config from raw seconds. Zero values are raised to one second.
    pub fn from_secs(idle_secs: u64, countdown_secs: u32) -> Self {
        if idle_secs == 0 || countdown_secs == 0 {
            tracing::warn!(
                "WATCHDOG_CONFIG | idle={}s countdown={}s | zero values raised to 1s",
                idle_secs,
                countdown_secs
            );
        }
        Self {
            idle_window: Duration::from_secs(idle_secs.max(1)),
            countdown_secs: countdown_secs.max(1),
        }
    }

    /// Upper bound on session lifetime after the last observed activity.
    pub fn max_session_lifetime(&self) -> Duration {
        self.idle_window + COUNTDOWN_TICK * self.countdown_secs
    }
}

/// Watchdog phase. `LoggedOut` is a transition, not a resting state: it
/// collapses straight back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogPhase {
    /// Not authenticated, nothing armed
    Idle,
    /// Authenticated, idle timer running
    Active,
    /// Warning open, countdown running
    Warning,
}

impl std::fmt::Display for WatchdogPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchdogPhase::Idle => write!(f, "IDLE"),
            WatchdogPhase::Active => write!(f, "ACTIVE"),
            WatchdogPhase::Warning => write!(f, "WARNING"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Idle,
    Countdown,
}

/// Identity of one armed timer. Every arm gets a fresh generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    pub kind: TimerKind,
    generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct ArmedTimer {
    handle: TimerHandle,
    deadline: Instant,
}

/// What a watchdog transition means for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogEvent {
    /// Idle timer elapsed; warning opened with the full countdown
    WarningStarted { remaining: u32 },
    /// One countdown second elapsed
    CountdownTick { remaining: u32 },
    /// User confirmed; warning closed, idle timer restarted
    WarningDismissed,
    /// Countdown reached zero; caller must log out
    Expired,
}

/// Idle/countdown state machine.
#[derive(Debug)]
pub struct Watchdog {
    config: WatchdogConfig,
    phase: WatchdogPhase,
    idle_timer: Option<ArmedTimer>,
    countdown_timer: Option<ArmedTimer>,
    countdown_remaining: Option<u32>,
    generation: u64,
}

impl Watchdog {
    pub fn new(config: WatchdogConfig) -> Self {
        Self {
            config,
            phase: WatchdogPhase::Idle,
            idle_timer: None,
            countdown_timer: None,
            countdown_remaining: None,
            generation: 0,
        }
    }

    pub fn phase(&self) -> WatchdogPhase {
        self.phase
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    /// Deadline of the idle timer, if armed.
    pub fn idle_deadline(&self) -> Option<Instant> {
        self.idle_timer.map(|t| t.deadline)
    }

    /// Seconds left on the countdown. Only `Some` while the warning is open.
    pub fn countdown_remaining(&self) -> Option<u32> {
        self.countdown_remaining
    }

    pub fn is_warning(&self) -> bool {
        self.phase == WatchdogPhase::Warning
    }

    /// Number of armed timers (0, 1 or 2).
    pub fn live_timers(&self) -> usize {
        self.idle_timer.is_some() as usize + self.countdown_timer.is_some() as usize
    }

    fn arm(&mut self, kind: TimerKind, deadline: Instant) -> ArmedTimer {
        self.generation += 1;
        ArmedTimer {
            handle: TimerHandle { kind, generation: self.generation },
            deadline,
        }
    }

    fn arm_idle(&mut self, now: Instant) {
        let deadline = now + self.config.idle_window;
        // Replaces any previous idle timer.
        self.idle_timer = Some(self.arm(TimerKind::Idle, deadline));
    }

    /// `Idle -> Active`. Also used to restart from any phase after a fresh
    /// authentication.
    pub fn start(&mut self, now: Instant) {
        self.countdown_timer = None;
        self.countdown_remaining = None;
        self.phase = WatchdogPhase::Active;
        self.arm_idle(now);
        tracing::debug!(
            "WATCHDOG_STARTED | idle_window={}s countdown={}s",
            self.config.idle_window.as_secs(),
            self.config.countdown_secs
        );
    }

    /// Cancel everything and go dormant. Safe to call in any phase.
    pub fn stop(&mut self) {
        if self.phase != WatchdogPhase::Idle {
            tracing::debug!("WATCHDOG_STOPPED | phase={}", self.phase);
        }
        self.phase = WatchdogPhase::Idle;
        self.idle_timer = None;
        self.countdown_timer = None;
        self.countdown_remaining = None;
    }

    /// Activity while `Active` pushes the idle deadline to `now + idle_window`.
    /// Ignored in `Idle` and `Warning`; returns whether the deadline moved.
    pub fn record_activity(&mut self, now: Instant) -> bool {
        if self.phase != WatchdogPhase::Active {
            return false;
        }
        self.arm_idle(now);
        true
    }

    /// `Warning -> Active` without re-arming the idle timer. The caller must
    /// follow up with [`Watchdog::record_activity`].
    pub fn dismiss_warning(&mut self) -> Option<WatchdogEvent> {
        if self.phase != WatchdogPhase::Warning {
            return None;
        }
        if self.countdown_remaining.unwrap_or(0) == 0 {
            return None;
        }
        self.countdown_timer = None;
        self.countdown_remaining = None;
        self.phase = WatchdogPhase::Active;
        Some(WatchdogEvent::WarningDismissed)
    }

    /// `Warning -> Active` on explicit confirmation, idle timer restarted.
    pub fn continue_session(&mut self, now: Instant) -> Option<WatchdogEvent> {
        let event = self.dismiss_warning()?;
        self.arm_idle(now);
        Some(event)
    }

    /// The earliest armed timer.
    pub fn next_deadline(&self) -> Option<(TimerHandle, Instant)> {
        [self.idle_timer, self.countdown_timer]
            .into_iter()
            .flatten()
            .min_by_key(|t| t.deadline)
            .map(|t| (t.handle, t.deadline))
    }

    fn enter_warning(&mut self, fired_at: Instant) -> Option<WatchdogEvent> {
        if self.countdown_timer.is_some() {
            return None;
        }
        let remaining = self.config.countdown_secs;
        self.phase = WatchdogPhase::Warning;
        self.countdown_remaining = Some(remaining);
        self.countdown_timer = Some(self.arm(TimerKind::Countdown, fired_at + COUNTDOWN_TICK));
        Some(WatchdogEvent::WarningStarted { remaining })
    }

    /// Deliver a timer firing. Stale handles and firings that no longer fit
    /// the current phase are ignored.
    pub fn fire(&mut self, handle: TimerHandle) -> Option<WatchdogEvent> {
        match handle.kind {
            TimerKind::Idle => {
                let timer = self.idle_timer.filter(|t| t.handle == handle)?;
                self.idle_timer = None;
                if self.phase != WatchdogPhase::Active {
                    return None;
                }
                self.enter_warning(timer.deadline)
            }
            TimerKind::Countdown => {
                let timer = self.countdown_timer.filter(|t| t.handle == handle)?;
                if self.phase != WatchdogPhase::Warning {
                    self.countdown_timer = None;
                    return None;
                }
                let remaining = self.countdown_remaining.unwrap_or(0).saturating_sub(1);
                self.countdown_remaining = Some(remaining);
                if remaining == 0 {
                    self.countdown_timer = None;
                    return Some(WatchdogEvent::Expired);
                }
                // Chain from the previous deadline so ticks do not drift.
                self.countdown_timer =
                    Some(self.arm(TimerKind::Countdown, timer.deadline + COUNTDOWN_TICK));
                Some(WatchdogEvent::CountdownTick { remaining })
            }
        }
    }

    /// Fire every timer due at or before `now`, oldest first. Stops after
    /// `Expired`.
    pub fn poll(&mut self, now: Instant) -> Vec<WatchdogEvent> {
        let mut events = Vec::new();
        while let Some((handle, deadline)) = self.next_deadline() {
            if deadline > now {
                break;
            }
            if let Some(event) = self.fire(handle) {
                events.push(event);
                if event == WatchdogEvent::Expired {
                    break;
                }
            }
        }
        events
    }
}
