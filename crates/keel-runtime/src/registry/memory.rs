//! In-memory registry for testing and development

use tokio::sync::RwLock;

use super::{BuildRecord, BuildRegistry, QualityResultRecord};
use crate::build::BuildStatus;
use crate::error::Result;

/// Registry keeping records in insertion order
#[derive(Default)]
pub struct MemoryRegistry {
    builds: RwLock<Vec<BuildRecord>>,
    quality: RwLock<Vec<QualityResultRecord>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl BuildRegistry for MemoryRegistry {
    async fn put_build_record(&self, record: BuildRecord) -> Result<()> {
        self.builds.write().await.push(record);
        Ok(())
    }

    async fn put_quality_result(&self, record: QualityResultRecord) -> Result<()> {
        self.quality.write().await.push(record);
        Ok(())
    }

    async fn latest_build(&self, table_name: &str) -> Result<Option<BuildRecord>> {
        let builds = self.builds.read().await;
        Ok(builds.iter().rev().find(|r| r.table_name == table_name).cloned())
    }

    async fn latest_successful_build(&self, table_name: &str) -> Result<Option<BuildRecord>> {
        let builds = self.builds.read().await;
        Ok(builds
            .iter()
            .rev()
            .find(|r| r.table_name == table_name && r.status == BuildStatus::Success)
            .cloned())
    }

    async fn build_records(&self, table_name: Option<&str>, limit: usize) -> Result<Vec<BuildRecord>> {
        let builds = self.builds.read().await;
        Ok(builds
            .iter()
            .rev()
            .filter(|r| table_name.map_or(true, |t| r.table_name == t))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn quality_results(&self, table_name: &str, limit: usize) -> Result<Vec<QualityResultRecord>> {
        let quality = self.quality.read().await;
        Ok(quality
            .iter()
            .rev()
            .filter(|r| r.table_name == table_name)
            .take(limit)
            .cloned()
            .collect())
    }
}
