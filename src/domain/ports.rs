use crate::domain::model::PollStatus;
use crate::utils::error::Result;
use async_trait::async_trait;

/// 分析結果、報表等產出物的存放位置
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, key: &str, data: &[u8]) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
}

/// 長時間執行作業的狀態查詢
#[async_trait]
pub trait StatusSource: Send + Sync {
    type Output: Send;

    async fn check(&self) -> Result<PollStatus<Self::Output>>;
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}
