use std::sync::Arc;
use rand::Rng;
use rand::rngs::StdRng;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use crate::notify::NotificationKind;
use super::errors::UploadFailure;
use super::manager::SessionShared;
use super::types::{StepPolicy, UploadEvent, UploadId, UploadStatus};

/// 单个任务的模拟传输进度生成器
///
/// 每次写入前都在任务表锁内检查取消令牌和 attempt，
/// 所以被删除或被重试替换掉的生成器不会再修改任务。
pub(crate) struct ProgressWorker {
    pub(crate) shared: Arc<SessionShared>,
    pub(crate) upload_id: UploadId,
    pub(crate) attempt: u32,
    pub(crate) cancellation_token: CancellationToken,
    pub(crate) rng: StdRng,
}

impl ProgressWorker {
    pub async fn run(mut self) {
        let period = self.shared.config.tick_interval;
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let cancellation_token = self.cancellation_token.clone();

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    tracing::debug!(upload_id = %self.upload_id, attempt = self.attempt, "generator cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if self.tick() {
                        break;
                    }
                }
            }
        }
    }

    fn next_step(&mut self) -> u8 {
        match self.shared.config.step {
            StepPolicy::Fixed { step } => step.max(1),
            StepPolicy::Randomized { max_step } => self.rng.random_range(1..=max_step.max(1)),
        }
    }

    /// Returns true when the generator should stop.
    fn tick(&mut self) -> bool {
        let step = self.next_step();

        let mut store = self.shared.store.lock();
        let Some(task) = store.current_mut(&self.upload_id, self.attempt, &self.cancellation_token) else {
            return true;
        };

        let reached = task.advance(step);
        let progress = task.progress;
        tracing::debug!(upload_id = %self.upload_id, progress, "tick");
        self.shared.send_event(UploadEvent::Progress {
            upload_id: self.upload_id,
            progress,
        });

        if !reached {
            return false;
        }

        let failed = self.rng.random_bool(self.shared.config.failure_probability);
        let name = task.name.clone();
        let new_status = if failed {
            task.fail(&UploadFailure::SimulatedTransfer);
            tracing::warn!(upload_id = %self.upload_id, name = %name, attempt = self.attempt, "simulated transfer failed");
            self.shared
                .notifications
                .emit(format!("{} failed to upload", name), NotificationKind::Error);
            UploadStatus::Error
        } else {
            task.complete();
            tracing::info!(upload_id = %self.upload_id, name = %name, "upload completed");
            self.shared
                .notifications
                .emit(format!("{} uploaded successfully", name), NotificationKind::Success);
            UploadStatus::Completed
        };

        store.release_generator(&self.upload_id);
        self.shared.send_event(UploadEvent::StateChanged {
            upload_id: self.upload_id,
            old_status: UploadStatus::Uploading,
            new_status,
        });

        true
    }
}
