use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    futures::future::{BoxFuture, FutureExt},
    tokio::sync::Mutex,
    Build, Rocket,
};

use crate::error::Result;
use crate::model::{db::Motion, mongodb::Id};
use crate::scheduled_task::ScheduledTask;
use crate::store::SharedStore;

use super::{Clock, SharedClock, TallyEngine};

/// A scheduled finalizer, with the `closes_at` it was scheduled for.
type TaskMap = HashMap<Id, (DateTime<Utc>, ScheduledTask<()>)>;

/// Session finalizers: one task per open session that reports the final
/// tally once the window closes. Finalizers only read.
#[derive(Clone)]
pub struct SessionFinalizers {
    tally: TallyEngine,
    clock: SharedClock,
    tasks: Arc<Mutex<TaskMap>>,
}

impl SessionFinalizers {
    pub fn new(tally: TallyEngine, clock: SharedClock) -> Self {
        Self {
            tally,
            clock,
            tasks: Default::default(),
        }
    }

    /// Does the motion have a finalizer waiting to run?
    pub async fn has_finalizer(&self, motion_id: Id) -> bool {
        self.tasks.lock().await.contains_key(&motion_id)
    }

    /// Schedule a finalizer for every motion whose session is open now.
    /// Returns how many were scheduled.
    pub async fn schedule_open_sessions(&self, store: &SharedStore) -> Result<usize> {
        let open = store.motions_open_at(self.clock.now()).await?;
        for motion in &open {
            self.schedule(motion).await;
        }
        Ok(open.len())
    }

    /// Schedule a finalizer for the motion's current window, replacing any
    /// finalizer scheduled for an earlier one.
    pub async fn schedule(&self, motion: &Motion) {
        let closes_at = match motion.session {
            Some(window) => window.closes_at(),
            None => return,
        };
        let finalizer = Self::finalizer(motion.id, closes_at, self.tally.clone(), self.tasks.clone());

        let mut tasks = self.tasks.lock().await;
        if let Some((_, task)) = tasks.remove(&motion.id) {
            if task.cancel().await {
                debug!("Replaced finalizer for motion {} had already run", motion.id);
            }
        }
        let task = ScheduledTask::new(finalizer, closes_at, self.clock.now());
        tasks.insert(motion.id, (closes_at, task));
    }

    /// Run the motion's finalizer immediately and wait for it. Returns false
    /// if none was scheduled.
    #[cfg(test)]
    pub async fn finalize_now(&self, motion_id: Id) -> bool {
        let task = self.tasks.lock().await.remove(&motion_id);
        match task {
            Some((_, task)) => {
                task.trigger_now();
                if let Err(e) = task.await {
                    error!("Finalizer for motion {motion_id} did not complete: {e}");
                }
                true
            }
            None => false,
        }
    }

    fn finalizer(
        motion_id: Id,
        closes_at: DateTime<Utc>,
        tally: TallyEngine,
        tasks: Arc<Mutex<TaskMap>>,
    ) -> BoxFuture<'static, ()> {
        async move {
            match tally.tally(motion_id).await {
                Ok(result) => info!(
                    "Session on motion {motion_id} closed at {closes_at}: {} YES, {} NO, {} total",
                    result.yes, result.no, result.total
                ),
                Err(e) => error!("Could not tally motion {motion_id} at session close: {e}"),
            }

            // Only remove our own entry; the motion may have been reopened.
            let mut tasks = tasks.lock().await;
            if matches!(tasks.get(&motion_id), Some((at, _)) if *at == closes_at) {
                tasks.remove(&motion_id);
            }
        }
        .boxed()
    }
}

/// A fairing that schedules finalizers for every session open at ignition.
/// Depends on `SharedStore` and `SessionFinalizers` being in managed state,
/// so it must be attached after the fairings providing them.
pub struct SessionFinalizerFairing;

#[rocket::async_trait]
impl Fairing for SessionFinalizerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Session Finalizers",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (store, finalizers) = match (
            rocket.state::<SharedStore>(),
            rocket.state::<SessionFinalizers>(),
        ) {
            (Some(store), Some(finalizers)) => (store, finalizers),
            _ => {
                error!("Store and finalizers must be managed before scheduling finalizers");
                return Err(rocket);
            }
        };
        match finalizers.schedule_open_sessions(store).await {
            Ok(0) => debug!("No open sessions to finalize"),
            Ok(count) => info!("Scheduled finalizers for {count} open sessions"),
            Err(e) => {
                error!("Failed to schedule session finalizers: {e}");
                return Err(rocket);
            }
        }
        Ok(rocket)
    }
}
