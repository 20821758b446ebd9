//! The watch state machine.
//!
//! ```text
//!  Syncing ──► ArmingWait ──► Waiting ──(deadline)──► WokenByTimeout ──► ArmingWait
//!                  ▲             │
//!                  │             └──(change)──► WokenByNotification ──► Draining ──► ArmingWait
//!                  │
//!               Faulted ◄── any error in Syncing / ArmingWait / Waiting / WokenByTimeout / Draining
//! ```
//!
//! There is no terminal state. [`WatchEngine::run`] steps until the shutdown
//! flag is raised, or until the session is lost: nothing reconnects, so a
//! dead socket ends the watch with an error instead of faulting forever.
//!
//! Mail that arrives while draining (after the wait ended, before the next
//! one is armed) is not noticed until a later wake-up.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use super::clock::Clock;
use crate::config::WatchConfig;
use crate::error::{Result, Rr2OpmlError};
use crate::export::opml::write_opml;
use crate::mailbox::{Mailbox, NotificationFilter, WaitSignal};
use crate::resolver::http::LinkResolver;
use crate::resolver::StoryResolver;
use crate::store::stories::StoryStore;
use crate::sync::sync_once;

/// Where the engine is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Initial absorption of everything already waiting.
    Syncing,
    /// About to issue a fresh wait with a new deadline.
    ArmingWait,
    /// Blocked on the mailbox in poll-interval slices.
    Waiting,
    /// The deadline passed without news; the wait is refreshed.
    WokenByTimeout,
    /// The server reported a change.
    WokenByNotification,
    /// Wait ended; fetching and absorbing new mail.
    Draining,
    /// A step failed; cleaning up before re-arming.
    Faulted,
}

/// Timing of the watch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSettings {
    /// Longest a single wait may stay armed.
    pub rearm_interval: Duration,
    /// Longest a single blocking poll may take.
    pub poll_interval: Duration,
    /// Pause in `Faulted` before re-arming.
    pub fault_pause: Duration,
}

impl WatchSettings {
    pub fn from_config(watch: &WatchConfig) -> Self {
        Self {
            rearm_interval: watch.rearm_interval(),
            poll_interval: watch.poll_interval(),
            fault_pause: watch.fault_pause(),
        }
    }
}

/// Counters for what the engine has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub arms: u64,
    pub timeouts: u64,
    pub notifications: u64,
    pub drains: u64,
    pub faults: u64,
    pub stories_added: u64,
    pub regenerations: u64,
    pub failed_regenerations: u64,
}

/// Owns the mailbox session and drives it through [`WatchState`].
pub struct WatchEngine<M, L, C> {
    mailbox: M,
    filter: NotificationFilter,
    resolver: StoryResolver<L>,
    store: StoryStore,
    outline_path: PathBuf,
    settings: WatchSettings,
    clock: C,

    state: WatchState,
    deadline: Option<Instant>,
    armed: bool,
    last_error: Option<Rr2OpmlError>,
    disconnected: bool,
    outline_stale: bool,
    stats: WatchStats,
}

impl<M, L, C> WatchEngine<M, L, C>
where
    M: Mailbox,
    L: LinkResolver,
    C: Clock,
{
    pub fn new(
        mailbox: M,
        filter: NotificationFilter,
        resolver: StoryResolver<L>,
        store: StoryStore,
        outline_path: PathBuf,
        settings: WatchSettings,
        clock: C,
    ) -> Self {
        Self {
            mailbox,
            filter,
            resolver,
            store,
            outline_path,
            settings,
            clock,
            state: WatchState::Syncing,
            deadline: None,
            armed: false,
            last_error: None,
            disconnected: false,
            outline_stale: false,
            stats: WatchStats::default(),
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn stats(&self) -> WatchStats {
        self.stats
    }

    /// Deadline of the current wait, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// The error behind the most recent fault.
    pub fn last_error(&self) -> Option<&Rr2OpmlError> {
        self.last_error.as_ref()
    }

    /// Whether the session was lost. [`run`](Self::run) stops once this is set.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Whether the outline on disk is known to lag the store.
    pub fn outline_stale(&self) -> bool {
        self.outline_stale
    }

    pub fn mailbox(&self) -> &M {
        &self.mailbox
    }

    pub fn store(&self) -> &StoryStore {
        &self.store
    }

    /// Give back the mailbox, e.g. to log out.
    pub fn into_mailbox(self) -> M {
        self.mailbox
    }

    /// Step until `shutdown` is raised, then end any outstanding wait.
    ///
    /// The flag is checked between steps, so shutdown takes effect within
    /// one poll interval. Returns the error that dropped the session if the
    /// connection is lost first.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        info!(
            rearm_secs = self.settings.rearm_interval.as_secs(),
            poll_secs = self.settings.poll_interval.as_secs(),
            "Watching mailbox"
        );
        while !shutdown.load(Ordering::Relaxed) {
            self.step();
            if self.disconnected {
                self.stop();
                return Err(self
                    .last_error
                    .take()
                    .unwrap_or(Rr2OpmlError::Protocol(imap::Error::ConnectionLost)));
            }
        }
        self.stop();
        Ok(())
    }

    /// End any outstanding wait. Failures are logged and ignored.
    pub fn stop(&mut self) {
        if self.armed {
            if let Err(e) = self.mailbox.end_wait() {
                warn!(error = %e, "Could not end wait during shutdown");
            }
            self.armed = false;
        }
        self.deadline = None;
        info!(
            stories_added = self.stats.stories_added,
            faults = self.stats.faults,
            "Watch stopped"
        );
    }

    /// Perform one transition and return the new state.
    pub fn step(&mut self) -> WatchState {
        let next = match self.state {
            WatchState::Syncing => self.on_syncing(),
            WatchState::ArmingWait => self.on_arming(),
            WatchState::Waiting => self.on_waiting(),
            WatchState::WokenByTimeout => self.on_timeout(),
            WatchState::WokenByNotification => self.on_notification(),
            WatchState::Draining => self.on_draining(),
            WatchState::Faulted => self.on_faulted(),
        };
        trace!(from = ?self.state, to = ?next, "Watch transition");
        self.state = next;
        next
    }

    fn on_syncing(&mut self) -> WatchState {
        match self.absorb() {
            Ok(()) => WatchState::ArmingWait,
            Err(e) => self.fault(e),
        }
    }

    fn on_arming(&mut self) -> WatchState {
        let deadline = self.clock.now() + self.settings.rearm_interval;
        match self.mailbox.begin_wait() {
            Ok(()) => {
                self.armed = true;
                self.deadline = Some(deadline);
                self.stats.arms += 1;
                debug!(arms = self.stats.arms, "Wait armed");
                WatchState::Waiting
            }
            Err(e) => self.fault(e),
        }
    }

    fn on_waiting(&mut self) -> WatchState {
        let now = self.clock.now();
        let deadline = *self.deadline.get_or_insert(now);
        if now >= deadline {
            return WatchState::WokenByTimeout;
        }

        let slice = self.settings.poll_interval.min(deadline - now);
        match self.mailbox.poll_wait(slice) {
            Ok(WaitSignal::Changed) => {
                self.stats.notifications += 1;
                WatchState::WokenByNotification
            }
            Ok(WaitSignal::Quiet) => WatchState::Waiting,
            Err(e) => self.fault(e),
        }
    }

    fn on_timeout(&mut self) -> WatchState {
        if let Err(e) = self.end_wait() {
            return self.fault(e);
        }
        self.stats.timeouts += 1;
        debug!("Wait reached its deadline; re-arming");
        if self.outline_stale {
            self.regenerate();
        }
        WatchState::ArmingWait
    }

    fn on_notification(&mut self) -> WatchState {
        info!("Mailbox changed");
        WatchState::Draining
    }

    fn on_draining(&mut self) -> WatchState {
        // The server accepts nothing else while a wait is outstanding.
        if let Err(e) = self.end_wait() {
            return self.fault(e);
        }
        self.stats.drains += 1;
        match self.absorb() {
            Ok(()) => WatchState::ArmingWait,
            Err(e) => self.fault(e),
        }
    }

    fn on_faulted(&mut self) -> WatchState {
        self.stats.faults += 1;
        match &self.last_error {
            Some(e) if e.is_recoverable() => warn!(error = %e, "Mailbox fault; re-arming"),
            Some(e) => error!(error = %e, "Watch cycle failed; re-arming"),
            None => warn!("Watch cycle faulted; re-arming"),
        }

        if self.armed {
            if let Err(e) = self.mailbox.end_wait() {
                debug!(error = %e, "Ignoring failure to end wait after fault");
            }
            self.armed = false;
        }
        self.deadline = None;

        if !self.settings.fault_pause.is_zero() {
            self.clock.sleep(self.settings.fault_pause);
        }
        WatchState::ArmingWait
    }

    fn fault(&mut self, e: Rr2OpmlError) -> WatchState {
        if e.is_disconnect() {
            error!(error = %e, "Mail session lost");
            self.disconnected = true;
        }
        self.last_error = Some(e);
        WatchState::Faulted
    }

    fn end_wait(&mut self) -> Result<()> {
        self.mailbox.end_wait()?;
        self.armed = false;
        self.deadline = None;
        Ok(())
    }

    /// Run the sync step and regenerate the outline if anything changed.
    fn absorb(&mut self) -> Result<()> {
        let report = match sync_once(&mut self.mailbox, &self.filter, &self.resolver, &self.store)
        {
            Ok(report) => report,
            Err(e) => {
                // Some stories may have been stored before the failure.
                self.outline_stale = true;
                return Err(e);
            }
        };
        self.stats.stories_added += report.inserted as u64;
        if report.has_new() || self.outline_stale {
            self.regenerate();
        }
        Ok(())
    }

    /// Rewrite the outline from the store. Failures leave it marked stale.
    fn regenerate(&mut self) {
        let result = self
            .store
            .all()
            .and_then(|stories| write_opml(&stories, &self.outline_path));
        match result {
            Ok(()) => {
                self.outline_stale = false;
                self.stats.regenerations += 1;
            }
            Err(e) => {
                error!(
                    path = %self.outline_path.display(),
                    error = %e,
                    "Could not regenerate subscription list; will retry"
                );
                self.outline_stale = true;
                self.stats.failed_regenerations += 1;
            }
        }
    }
}
