use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use crate::session::Result;
use super::types::{Notification, NotificationId, NotificationKind};

pub const DEFAULT_NOTIFICATION_LIFETIME: Duration = Duration::from_millis(3000);

/// 通知总线
///
/// 每条通知都有自己独立的自动消失定时器，互不影响。
#[derive(Clone)]
pub struct NotificationBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    /// 当前存活的通知（插入顺序）
    entries: Mutex<Vec<Notification>>,

    /// 每条通知的自动消失定时器
    timers: Mutex<HashMap<NotificationId, JoinHandle<()>>>,

    lifetime: Duration,
    runtime: Handle,
}

impl NotificationBus {
    /// Create a bus bound to the current tokio runtime.
    pub fn new(lifetime: Duration) -> Result<Self> {
        Ok(Self::with_runtime(lifetime, Handle::try_current()?))
    }

    pub fn with_runtime(lifetime: Duration, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(BusInner {
                entries: Mutex::new(Vec::new()),
                timers: Mutex::new(HashMap::new()),
                lifetime,
                runtime,
            }),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.inner.lifetime
    }

    /// Append a notification and schedule its auto-dismiss.
    pub fn emit(&self, message: impl Into<String>, kind: NotificationKind) -> NotificationId {
        let notification = Notification {
            id: NotificationId::new(),
            message: message.into(),
            kind,
            created_at: Utc::now(),
        };
        let id = notification.id;

        tracing::debug!(%id, ?kind, message = %notification.message, "notification emitted");
        self.inner.entries.lock().push(notification);

        // 定时器只持有弱引用，总线被释放后定时器自然失效
        let weak: Weak<BusInner> = Arc::downgrade(&self.inner);
        let lifetime = self.inner.lifetime;
        let timer = self.inner.runtime.spawn(async move {
            tokio::time::sleep(lifetime).await;
            if let Some(inner) = weak.upgrade() {
                // 与 emit 相同的加锁顺序：先 timers 再 entries
                let mut timers = inner.timers.lock();
                timers.remove(&id);
                inner.remove_entry(id);
            }
        });

        // 定时器可能已经在其他工作线程上触发过
        let mut timers = self.inner.timers.lock();
        if self.inner.contains(id) {
            timers.insert(id, timer);
        }

        id
    }

    /// Remove a notification. Returns false when it was already gone.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        if let Some(timer) = self.inner.timers.lock().remove(&id) {
            timer.abort();
        }
        self.inner.remove_entry(id)
    }

    pub fn list(&self) -> Vec<Notification> {
        self.inner.entries.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }
}

impl BusInner {
    fn remove_entry(&self, id: NotificationId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|n| n.id != id);
        entries.len() != before
    }

    fn contains(&self, id: NotificationId) -> bool {
        self.entries.lock().iter().any(|n| n.id == id)
    }
}

#[cfg(test)]
impl NotificationBus {
    fn pending_timers(&self) -> usize {
        self.inner.timers.lock().len()
    }
}

impl Drop for BusInner {
    fn drop(&mut self) {
        for (_, timer) in self.timers.get_mut().drain() {
            timer.abort();
        }
    }
}
