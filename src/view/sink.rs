use crate::error::AppError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// 客户端保存二进制下载结果
#[async_trait]
pub trait ArchiveSink: Send + Sync {
    async fn save(&self, file_name: &str, bytes: Vec<u8>) -> Result<PathBuf, AppError>;
}

/// 写入指定目录
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArchiveSink for DirectorySink {
    async fn save(&self, file_name: &str, bytes: Vec<u8>) -> Result<PathBuf, AppError> {
        // 只取文件名部分，服务端给的名字不能跳出目标目录
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| AppError::Validation(format!("invalid file name: {}", file_name)))?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);
        tokio::fs::write(&path, &bytes).await?;
        info!("Saved {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }
}
