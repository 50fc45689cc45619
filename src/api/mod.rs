pub mod client;

pub use client::ApiClient;

use crate::error::AppError;
use crate::models::{InvoiceUpdate, JobHandle, JobId, ListResponse, RecordId, ServerAck, StatusReport};
use async_trait::async_trait;

/// 后端发票服务的远程操作
///
/// 控制器与轮询器只依赖该 trait，测试中用内存实现替换。
#[async_trait]
pub trait InvoiceGateway: Send + Sync {
    /// GET /invoices?search=<term>，空串表示不过滤
    async fn list_invoices(&self, search: &str) -> Result<ListResponse, AppError>;

    /// POST /upload，仅 202 + job_id 视为成功
    async fn submit_upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<JobHandle, AppError>;

    /// GET /upload/status/{job_id}
    async fn job_status(&self, job_id: &JobId) -> Result<StatusReport, AppError>;

    async fn update_invoice(&self, id: &RecordId, fields: &InvoiceUpdate) -> Result<ServerAck, AppError>;

    async fn delete_invoice(&self, id: &RecordId) -> Result<ServerAck, AppError>;

    /// POST /download/zip，返回压缩包字节
    async fn export_zip(&self, ids: &[RecordId]) -> Result<Vec<u8>, AppError>;

    async fn clear_all(&self) -> Result<ServerAck, AppError>;

    /// 单张发票下载直链
    fn download_url(&self, _id: &RecordId) -> Option<String> {
        None
    }
}
