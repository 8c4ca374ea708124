use log::{info, warn};

use crate::error::{Error, Result};
use crate::model::{common::SessionWindow, db::Motion, mongodb::Id};
use crate::store::{SharedStore, WindowInstall};

use super::{Clock, SessionFinalizers, SharedClock};

/// The session lifecycle of each motion: unopened, open, closed, and open
/// again with a fresh window.
#[derive(Clone)]
pub struct VotingSession {
    store: SharedStore,
    clock: SharedClock,
    default_minutes: i64,
    finalizers: SessionFinalizers,
}

impl VotingSession {
    pub fn new(
        store: SharedStore,
        clock: SharedClock,
        default_minutes: i64,
        finalizers: SessionFinalizers,
    ) -> Self {
        Self {
            store,
            clock,
            default_minutes,
            finalizers,
        }
    }

    /// Open a session on the motion, starting now and lasting
    /// `duration_minutes` (or the configured default).
    ///
    /// Fails with `AlreadyOpen` while the current window is still running;
    /// once it has closed, a fresh window replaces it.
    pub async fn open(&self, motion_id: Id, duration_minutes: Option<i64>) -> Result<Motion> {
        let minutes = duration_minutes.unwrap_or(self.default_minutes);
        let now = self.clock.now();
        let window = match SessionWindow::starting_at(now, minutes) {
            Some(window) => window,
            None => {
                // An unknown motion takes precedence over a bad duration.
                if self.store.motion(motion_id).await?.is_none() {
                    return Err(motion_not_found(motion_id));
                }
                warn!("Rejected session of {minutes} minutes for motion {motion_id}");
                return Err(Error::InvalidDuration(minutes.to_string()));
            }
        };

        match self.store.install_window(motion_id, window).await? {
            WindowInstall::Installed(motion) => {
                info!(
                    "Opened session on motion {motion_id} until {}",
                    window.closes_at()
                );
                self.finalizers.schedule(&motion).await;
                Ok(motion)
            }
            WindowInstall::AlreadyOpen => {
                warn!("Session on motion {motion_id} is already open");
                Err(Error::AlreadyOpen(motion_id))
            }
            WindowInstall::NotFound => Err(motion_not_found(motion_id)),
        }
    }

    /// Is the motion accepting votes right now?
    pub async fn is_open(&self, motion_id: Id) -> Result<bool> {
        let motion = self
            .store
            .motion(motion_id)
            .await?
            .ok_or_else(|| motion_not_found(motion_id))?;
        Ok(motion.is_open_at(self.clock.now()))
    }
}

fn motion_not_found(motion_id: Id) -> Error {
    Error::not_found(format!("Motion {motion_id}"))
}
