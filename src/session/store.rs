use std::collections::HashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use super::task::UploadTask;
use super::types::{UploadId, UploadStatus};

struct TaskHandle {
    task: UploadTask,
    cancellation_token: Option<CancellationToken>,
    join_handle: Option<JoinHandle<()>>,
}

impl TaskHandle {
    fn stop_generator(&mut self) {
        if let Some(token) = self.cancellation_token.take() {
            token.cancel();
        }
        if let Some(handle) = self.join_handle.take() {
            handle.abort();
        }
    }
}

/// 任务表：按 id 索引，另存一份提交顺序
#[derive(Default)]
pub(crate) struct TaskStore {
    tasks: HashMap<UploadId, TaskHandle>,
    order: Vec<UploadId>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task: UploadTask) {
        let id = task.id;
        self.tasks.insert(id, TaskHandle {
            task,
            cancellation_token: None,
            join_handle: None,
        });
        self.order.push(id);
    }

    pub fn get(&self, id: &UploadId) -> Option<&UploadTask> {
        self.tasks.get(id).map(|handle| &handle.task)
    }

    pub fn get_mut(&mut self, id: &UploadId) -> Option<&mut UploadTask> {
        self.tasks.get_mut(id).map(|handle| &mut handle.task)
    }

    /// The task, only while `token` is still the live generator of `attempt`.
    pub fn current_mut(
        &mut self,
        id: &UploadId,
        attempt: u32,
        token: &CancellationToken,
    ) -> Option<&mut UploadTask> {
        if token.is_cancelled() {
            return None;
        }

        self.tasks
            .get_mut(id)
            .map(|handle| &mut handle.task)
            .filter(|task| task.attempts == attempt && task.status == UploadStatus::Uploading)
    }

    /// 登记新的进度生成器，旧的（如果有）先被取消
    pub fn attach_generator(&mut self, id: &UploadId, token: CancellationToken, join_handle: JoinHandle<()>) {
        match self.tasks.get_mut(id) {
            Some(handle) => {
                handle.stop_generator();
                handle.cancellation_token = Some(token);
                handle.join_handle = Some(join_handle);
            }
            None => {
                token.cancel();
                join_handle.abort();
            }
        }
    }

    /// Cancel the generator of a task, if one is running.
    pub fn cancel_generator(&mut self, id: &UploadId) {
        if let Some(handle) = self.tasks.get_mut(id) {
            handle.stop_generator();
        }
    }

    /// 生成器正常结束后调用，只丢弃句柄，不中断当前任务
    pub fn release_generator(&mut self, id: &UploadId) {
        if let Some(handle) = self.tasks.get_mut(id) {
            handle.cancellation_token = None;
            handle.join_handle = None;
        }
    }

    pub fn remove(&mut self, id: &UploadId) -> Option<UploadTask> {
        let mut handle = self.tasks.remove(id)?;
        handle.stop_generator();
        self.order.retain(|x| x != id);
        Some(handle.task)
    }

    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<UploadTask>
    where
        F: FnMut(&UploadTask) -> bool,
    {
        let ids: Vec<_> = self.order
            .iter()
            .filter(|id| self.tasks.get(*id).is_some_and(|handle| predicate(&handle.task)))
            .copied()
            .collect();

        ids.iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn cancel_all(&mut self) {
        for handle in self.tasks.values_mut() {
            handle.stop_generator();
        }
    }

    /// 按提交顺序的快照
    pub fn snapshot(&self) -> Vec<UploadTask> {
        self.order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .map(|handle| handle.task.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}
