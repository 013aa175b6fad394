//! The `groups.json` repository.

use codex_agent_core::Group;

use crate::error::RepoError;
use crate::store::JsonStore;

pub struct GroupRepository {
    store: JsonStore<Vec<Group>>,
}

impl GroupRepository {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            store: JsonStore::new(path),
        }
    }

    pub async fn list(&self) -> Vec<Group> {
        self.store.load().await
    }

    pub async fn get(&self, id: &str) -> Option<Group> {
        self.list().await.into_iter().find(|g| g.id == id)
    }

    pub async fn create(&self, name: String, description: Option<String>) -> Result<Group, RepoError> {
        let mut groups = self.list().await;
        let group = Group::new(name, description);
        groups.push(group.clone());
        self.store.save(&groups)?;
        Ok(group)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, RepoError> {
        let mut groups = self.list().await;
        let before = groups.len();
        groups.retain(|g| g.id != id);
        let removed = groups.len() != before;
        if removed {
            self.store.save(&groups)?;
        }
        Ok(removed)
    }

    async fn update<F>(&self, id: &str, f: F) -> Result<Option<Group>, RepoError>
    where
        F: FnOnce(&mut Group),
    {
        let mut groups = self.list().await;
        let Some(group) = groups.iter_mut().find(|g| g.id == id) else {
            return Ok(None);
        };
        f(group);
        let updated = group.clone();
        self.store.save(&groups)?;
        Ok(Some(updated))
    }

    pub async fn add_session(&self, id: &str, session_id: String) -> Result<Option<Group>, RepoError> {
        self.update(id, |g| g.add_session(session_id)).await
    }

    pub async fn remove_session(&self, id: &str, session_id: &str) -> Result<Option<Group>, RepoError> {
        self.update(id, |g| {
            g.remove_session(session_id);
        })
        .await
    }

    pub async fn set_paused(&self, id: &str, paused: bool) -> Result<Option<Group>, RepoError> {
        self.update(id, |g| {
            g.paused = paused;
            g.updated_at = chrono::Utc::now();
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn repo(dir: &std::path::Path) -> GroupRepository {
        GroupRepository::new(dir.join("groups.json"))
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        assert!(repo.list().await.is_empty());
    }

    #[tokio::test]
    async fn create_list_delete_round_trip() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());

        let group = repo.create("fleet".to_string(), None).await.unwrap();
        assert_eq!(repo.list().await.len(), 1);

        repo.add_session(&group.id, "s1".to_string()).await.unwrap();
        let fetched = repo.get(&group.id).await.unwrap();
        assert_eq!(fetched.session_ids, vec!["s1".to_string()]);

        assert!(repo.delete(&group.id).await.unwrap());
        assert!(repo.list().await.is_empty());
    }

    #[tokio::test]
    async fn add_session_is_idempotent_and_ordered() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        let group = repo.create("fleet".to_string(), None).await.unwrap();

        repo.add_session(&group.id, "s1".to_string()).await.unwrap();
        repo.add_session(&group.id, "s2".to_string()).await.unwrap();
        repo.add_session(&group.id, "s1".to_string()).await.unwrap();

        let fetched = repo.get(&group.id).await.unwrap();
        assert_eq!(fetched.session_ids, vec!["s1".to_string(), "s2".to_string()]);
    }
}
