//! In-memory job and menu repositories.
//!
//! Back the CLI and the test suite. A database-backed deployment implements
//! the same [`JobRepository`] / [`MenuRepository`] traits.

use crate::error::PortError;
use crate::job::{Job, JobId, JobStatus, MenuId};
use crate::output::MenuRecord;
use crate::ports::{JobRepository, MenuRepository};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: &Job) -> Result<(), PortError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(PortError::Storage(format!("job {} already exists", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, PortError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn update(&self, job: &Job) -> Result<(), PortError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(stored) => {
                *stored = job.clone();
                Ok(())
            }
            None => Err(PortError::NotFound(format!("job {}", job.id))),
        }
    }

    async fn compare_and_update(&self, expected: JobStatus, job: &Job) -> Result<bool, PortError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(stored) if stored.status == expected => {
                *stored = job.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(PortError::NotFound(format!("job {}", job.id))),
        }
    }

    async fn delete(&self, id: JobId) -> Result<(), PortError> {
        match self.jobs.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(PortError::NotFound(format!("job {}", id))),
        }
    }
}

#[derive(Default)]
pub struct InMemoryMenuRepository {
    menus: RwLock<HashMap<MenuId, MenuRecord>>,
}

impl InMemoryMenuRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.menus.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.menus.read().await.is_empty()
    }
}

#[async_trait]
impl MenuRepository for InMemoryMenuRepository {
    async fn create(&self, record: &MenuRecord) -> Result<(), PortError> {
        self.menus.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: MenuId) -> Result<Option<MenuRecord>, PortError> {
        Ok(self.menus.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: MenuId) -> Result<(), PortError> {
        match self.menus.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(PortError::NotFound(format!("menu {}", id))),
        }
    }
}
