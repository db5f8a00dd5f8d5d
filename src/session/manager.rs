use std::sync::Arc;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use crate::auth::AuthSession;
use crate::config::SessionConfig;
use crate::notify::{NotificationBus, NotificationKind};
use crate::utils::format_bytes;
use super::errors::{Result, UploadFailure, ValidationError};
use super::store::TaskStore;
use super::task::UploadTask;
use super::types::{FileDescriptor, UploadEvent, UploadId, UploadStatus};
use super::validator::{validate, ValidationPolicy};
use super::worker::ProgressWorker;

/// 会话内共享状态，生成器通过 Arc 持有
pub(crate) struct SessionShared {
    pub(crate) config: SessionConfig,
    pub(crate) policy: ValidationPolicy,
    pub(crate) store: Mutex<TaskStore>,
    pub(crate) notifications: NotificationBus,
    pub(crate) event_tx: broadcast::Sender<UploadEvent>,
    /// 主随机源，只用来给每个生成器派生独立的种子
    pub(crate) rng: Mutex<StdRng>,
    pub(crate) runtime: Handle,
}

impl SessionShared {
    pub(crate) fn send_event(&self, event: UploadEvent) {
        // 没有订阅者时发送失败，忽略即可
        let _ = self.event_tx.send(event);
    }
}

/// Upload session engine.
///
/// Owns every [`UploadTask`] of one logged-in user. All public operations are
/// synchronous; simulated transfers run as tokio tasks on the runtime the
/// session was created in. [`UploadSession::list`] returns tasks in submission order.
pub struct UploadSession {
    shared: Arc<SessionShared>,
    user: AuthSession,
}

impl UploadSession {
    /// Create a session on the current tokio runtime.
    pub fn new(user: &AuthSession, config: SessionConfig) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(user, config, rng)
    }

    /// Create a session with an explicit randomness source.
    pub fn with_rng(user: &AuthSession, config: SessionConfig, rng: StdRng) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current()?;
        let notifications = NotificationBus::with_runtime(config.notification_lifetime, runtime.clone());
        let (event_tx, _) = broadcast::channel(config.event_capacity);

        tracing::info!(user = user.username(), ?config, "upload session created");

        Ok(Self {
            shared: Arc::new(SessionShared {
                policy: config.validation_policy(),
                config,
                store: Mutex::new(TaskStore::new()),
                notifications,
                event_tx,
                rng: Mutex::new(rng),
                runtime,
            }),
            user: user.clone(),
        })
    }

    /// Validate and enqueue files. Accepted files start uploading immediately,
    /// rejected ones are kept as failed tasks.
    pub fn submit<I>(&self, files: I) -> Vec<UploadId>
    where
        I: IntoIterator<Item = FileDescriptor>,
    {
        let mut store = self.shared.store.lock();
        let mut ids = Vec::new();
        let mut accepted = 0usize;

        for file in files {
            let task = match validate(&file, &self.shared.policy) {
                Ok(()) => {
                    accepted += 1;
                    UploadTask::accepted(file)
                }
                Err(err) => {
                    let message = rejection_message(&file, &err);
                    tracing::warn!(name = %file.name, size = file.size, mime_type = %file.mime_type, reason = %err, "file rejected");
                    self.shared.notifications.emit(message, NotificationKind::Error);
                    UploadTask::rejected(file, &UploadFailure::from(err))
                }
            };

            let upload_id = task.id;
            let status = task.status;
            store.insert(task);
            self.shared.send_event(UploadEvent::Submitted { upload_id, status });

            if status == UploadStatus::Uploading {
                self.start_generator(&mut store, upload_id);
            }
            ids.push(upload_id);
        }

        if accepted > 0 {
            let noun = if accepted == 1 { "file" } else { "files" };
            self.shared
                .notifications
                .emit(format!("Uploading {} {}", accepted, noun), NotificationKind::Info);
        }

        tracing::info!(submitted = ids.len(), accepted, "files submitted");
        ids
    }

    /// Remove a task, cancelling its transfer. Unknown ids are ignored.
    pub fn delete(&self, upload_id: UploadId) {
        let mut store = self.shared.store.lock();
        let Some(task) = store.remove(&upload_id) else {
            return;
        };

        tracing::info!(%upload_id, name = %task.name, "upload deleted");
        self.shared
            .notifications
            .emit(format!("{} deleted", task.name), NotificationKind::Info);
        self.shared.send_event(UploadEvent::Removed { upload_id });
    }

    /// Restart a failed task from zero. No-op unless the task is in `Error`.
    ///
    /// 被校验拒绝的文件重试时重新校验，仍不通过则保持原状态
    pub fn retry(&self, upload_id: UploadId) {
        let mut store = self.shared.store.lock();
        let Some(task) = store.get_mut(&upload_id) else {
            return;
        };
        if task.status != UploadStatus::Error {
            tracing::debug!(%upload_id, status = ?task.status, "retry ignored");
            return;
        }

        let file = FileDescriptor::new(task.name.clone(), task.size, task.mime_type.clone());
        if let Err(err) = validate(&file, &self.shared.policy) {
            tracing::warn!(%upload_id, name = %file.name, reason = %err, "retry rejected");
            self.shared
                .notifications
                .emit(rejection_message(&file, &err), NotificationKind::Error);
            return;
        }

        if !task.restart() {
            tracing::debug!(%upload_id, status = ?task.status, "retry ignored");
            return;
        }
        let name = task.name.clone();

        store.cancel_generator(&upload_id);
        self.start_generator(&mut store, upload_id);

        tracing::info!(%upload_id, name = %name, "upload retried");
        self.shared
            .notifications
            .emit(format!("Retrying {}", name), NotificationKind::Info);
        self.shared.send_event(UploadEvent::StateChanged {
            upload_id,
            old_status: UploadStatus::Error,
            new_status: UploadStatus::Uploading,
        });
    }

    /// Snapshot of all tasks in submission order.
    pub fn list(&self) -> Vec<UploadTask> {
        self.shared.store.lock().snapshot()
    }

    pub fn get(&self, upload_id: UploadId) -> Option<UploadTask> {
        self.shared.store.lock().get(&upload_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清除所有已完成的任务，返回清除数量
    pub fn clear_finished(&self) -> usize {
        let removed = self.shared
            .store
            .lock()
            .remove_where(|task| task.status == UploadStatus::Completed);

        for task in &removed {
            self.shared.send_event(UploadEvent::Removed { upload_id: task.id });
        }
        if !removed.is_empty() {
            self.shared.notifications.emit(
                format!("Cleared {} finished upload(s)", removed.len()),
                NotificationKind::Info,
            );
        }

        removed.len()
    }

    pub fn notifications(&self) -> &NotificationBus {
        &self.shared.notifications
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn user(&self) -> &AuthSession {
        &self.user
    }

    /// 订阅事件
    ///
    /// 注意：接收速度跟不上发送速度时会丢失事件（lagged error）
    pub fn subscribe_events(&self) -> broadcast::Receiver<UploadEvent> {
        self.shared.event_tx.subscribe()
    }

    /// 只订阅某一个任务的事件，任务被移除后接收结束
    pub fn subscribe_task(&self, upload_id: UploadId) -> TaskEventReceiver {
        TaskEventReceiver {
            receiver: self.shared.event_tx.subscribe(),
            upload_id,
            finished: false,
        }
    }

    /// Stop every running transfer. Tasks stay in the collection as they are.
    pub fn shutdown(&self) {
        self.shared.store.lock().cancel_all();
        tracing::debug!("upload session shut down");
    }

    fn start_generator(&self, store: &mut TaskStore, upload_id: UploadId) {
        let Some(task) = store.get_mut(&upload_id) else {
            return;
        };
        task.attempts += 1;
        let attempt = task.attempts;

        // 每次启动都派生新种子，任务之间、重试之间互不影响
        let seed: u64 = self.shared.rng.lock().random();
        let cancellation_token = CancellationToken::new();
        let worker = ProgressWorker {
            shared: self.shared.clone(),
            upload_id,
            attempt,
            cancellation_token: cancellation_token.clone(),
            rng: StdRng::seed_from_u64(seed),
        };

        let join_handle = self.shared.runtime.spawn(worker.run());
        store.attach_generator(&upload_id, cancellation_token, join_handle);
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn rejection_message(file: &FileDescriptor, err: &ValidationError) -> String {
    match err {
        ValidationError::TooLarge { limit, .. } => {
            format!("{} exceeds {}", file.name, format_bytes(*limit))
        }
        ValidationError::InvalidType { .. } => format!("{} type not allowed", file.name),
    }
}

/// Event stream of a single upload.
///
/// Yields `None` once the upload has been removed or the session is gone.
pub struct TaskEventReceiver {
    receiver: broadcast::Receiver<UploadEvent>,
    upload_id: UploadId,
    finished: bool,
}

impl TaskEventReceiver {
    pub fn upload_id(&self) -> UploadId {
        self.upload_id
    }

    pub async fn recv(&mut self) -> Option<UploadEvent> {
        while !self.finished {
            match self.receiver.recv().await {
                Ok(event) if event.upload_id() == self.upload_id => {
                    self.finished = matches!(event, UploadEvent::Removed { .. });
                    return Some(event);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(upload_id = %self.upload_id, skipped, "event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => self.finished = true,
            }
        }
        None
    }
}
