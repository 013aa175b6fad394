//! The `queues.json` repository.
//!
//! `save_queue` is the persistence hook the queue runner calls after
//! every prompt (§4.9) so a crash leaves an accurate resumable state.

use codex_agent_core::{PromptMode, PromptResult, PromptStatus, Queue, QueuedPrompt};

use crate::error::RepoError;
use crate::store::JsonStore;

pub struct QueueRepository {
    store: JsonStore<Vec<Queue>>,
}

impl QueueRepository {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            store: JsonStore::new(path),
        }
    }

    pub async fn list(&self) -> Vec<Queue> {
        self.store.load().await
    }

    pub async fn get(&self, id: &str) -> Option<Queue> {
        self.list().await.into_iter().find(|q| q.id == id)
    }

    pub async fn create(&self, name: String, project_path: String) -> Result<Queue, RepoError> {
        let mut queues = self.list().await;
        let queue = Queue::new(name, project_path);
        queues.push(queue.clone());
        self.store.save(&queues)?;
        Ok(queue)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, RepoError> {
        let mut queues = self.list().await;
        let before = queues.len();
        queues.retain(|q| q.id != id);
        let removed = queues.len() != before;
        if removed {
            self.store.save(&queues)?;
        }
        Ok(removed)
    }

    /// Overwrites the whole on-disk queue with `queue`'s current state.
    /// This is the hook the dispatch engine persists through after every
    /// prompt completes.
    pub async fn save_queue(&self, queue: &Queue) -> Result<(), RepoError> {
        let mut queues = self.list().await;
        match queues.iter_mut().find(|q| q.id == queue.id) {
            Some(slot) => *slot = queue.clone(),
            None => queues.push(queue.clone()),
        }
        self.store.save(&queues)
    }

    pub async fn set_paused(&self, id: &str, paused: bool) -> Result<Option<Queue>, RepoError> {
        let mut queues = self.list().await;
        let Some(queue) = queues.iter_mut().find(|q| q.id == id) else {
            return Ok(None);
        };
        queue.paused = paused;
        let updated = queue.clone();
        self.store.save(&queues)?;
        Ok(Some(updated))
    }

    pub async fn add_prompt(
        &self,
        id: &str,
        prompt: String,
        images: Vec<String>,
        mode: PromptMode,
    ) -> Result<Option<QueuedPrompt>, RepoError> {
        let mut queues = self.list().await;
        let Some(queue) = queues.iter_mut().find(|q| q.id == id) else {
            return Ok(None);
        };
        let queued = QueuedPrompt::new(prompt, images, mode);
        queue.prompts.push(queued.clone());
        self.store.save(&queues)?;
        Ok(Some(queued))
    }

    /// Moves the prompt at `command_id` to `new_index` within the queue's
    /// ordered prompt sequence.
    pub async fn move_prompt(
        &self,
        id: &str,
        command_id: &str,
        new_index: usize,
    ) -> Result<Option<Queue>, RepoError> {
        let mut queues = self.list().await;
        let Some(queue) = queues.iter_mut().find(|q| q.id == id) else {
            return Ok(None);
        };
        let Some(pos) = queue.prompts.iter().position(|p| p.id == command_id) else {
            return Ok(None);
        };
        let prompt = queue.prompts.remove(pos);
        let clamped = new_index.min(queue.prompts.len());
        queue.prompts.insert(clamped, prompt);
        let updated = queue.clone();
        self.store.save(&queues)?;
        Ok(Some(updated))
    }

    pub async fn set_prompt_mode(
        &self,
        id: &str,
        command_id: &str,
        mode: PromptMode,
    ) -> Result<Option<QueuedPrompt>, RepoError> {
        let mut queues = self.list().await;
        let Some(queue) = queues.iter_mut().find(|q| q.id == id) else {
            return Ok(None);
        };
        let Some(prompt) = queue.prompts.iter_mut().find(|p| p.id == command_id) else {
            return Ok(None);
        };
        prompt.mode = mode;
        let updated = prompt.clone();
        self.store.save(&queues)?;
        Ok(Some(updated))
    }

    /// Marks a prompt `running`, stamping `started_at`.
    pub async fn mark_running(&self, id: &str, command_id: &str) -> Result<(), RepoError> {
        let mut queues = self.list().await;
        if let Some(queue) = queues.iter_mut().find(|q| q.id == id) {
            if let Some(prompt) = queue.prompts.iter_mut().find(|p| p.id == command_id) {
                prompt.status = PromptStatus::Running;
                prompt.started_at = Some(chrono::Utc::now());
            }
        }
        self.store.save(&queues)
    }

    /// Marks a prompt `completed`/`failed` and stamps `completed_at`.
    pub async fn mark_finished(
        &self,
        id: &str,
        command_id: &str,
        exit_code: i32,
    ) -> Result<(), RepoError> {
        let mut queues = self.list().await;
        if let Some(queue) = queues.iter_mut().find(|q| q.id == id) {
            if let Some(prompt) = queue.prompts.iter_mut().find(|p| p.id == command_id) {
                prompt.status = if exit_code == 0 {
                    PromptStatus::Completed
                } else {
                    PromptStatus::Failed
                };
                prompt.result = Some(PromptResult { exit_code });
                prompt.completed_at = Some(chrono::Utc::now());
            }
        }
        self.store.save(&queues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn repo(dir: &std::path::Path) -> QueueRepository {
        QueueRepository::new(dir.join("queues.json"))
    }

    #[tokio::test]
    async fn at_most_one_running_prompt_invariant_holds_after_transitions() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        let queue = repo.create("q".to_string(), "/proj".to_string()).await.unwrap();
        let a = repo
            .add_prompt(&queue.id, "a".to_string(), vec![], PromptMode::Auto)
            .await
            .unwrap()
            .unwrap();

        repo.mark_running(&queue.id, &a.id).await.unwrap();
        let fetched = repo.get(&queue.id).await.unwrap();
        assert_eq!(fetched.running_prompt().unwrap().id, a.id);

        repo.mark_finished(&queue.id, &a.id, 0).await.unwrap();
        let fetched = repo.get(&queue.id).await.unwrap();
        assert!(fetched.running_prompt().is_none());
        assert_eq!(fetched.prompts[0].status, PromptStatus::Completed);
        assert_eq!(fetched.prompts[0].result.as_ref().unwrap().exit_code, 0);
    }

    #[tokio::test]
    async fn move_prompt_reorders() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        let queue = repo.create("q".to_string(), "/proj".to_string()).await.unwrap();
        let a = repo
            .add_prompt(&queue.id, "a".to_string(), vec![], PromptMode::Auto)
            .await
            .unwrap()
            .unwrap();
        let b = repo
            .add_prompt(&queue.id, "b".to_string(), vec![], PromptMode::Auto)
            .await
            .unwrap()
            .unwrap();

        repo.move_prompt(&queue.id, &b.id, 0).await.unwrap();
        let fetched = repo.get(&queue.id).await.unwrap();
        assert_eq!(fetched.prompts[0].id, b.id);
        assert_eq!(fetched.prompts[1].id, a.id);
    }
}
