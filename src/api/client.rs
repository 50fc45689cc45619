use crate::api::InvoiceGateway;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{
    InvoiceUpdate, JobHandle, JobId, ListResponse, RecordId, ServerAck, StatusReport, SubmitResponse,
};
use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// 服务端错误响应体，只关心 `error` 字段
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExportRequest<'a> {
    selected_ids: &'a [RecordId],
}

const MISSING_JOB_ID: &str = "upload failed: server did not return a job id";

/// 后端 REST 接口客户端
#[derive(Clone)]
pub struct ApiClient {
    client: Arc<Client>,
    base_url: Url,
}

impl ApiClient {
    pub fn new(client: Arc<Client>, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let base_url = Url::parse(&config.api.base_url)
            .map_err(|e| AppError::Internal(format!("invalid base url: {}", e)))?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self::new(Arc::new(client), base_url))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// 在 base_url 路径后追加路径段 (自动转义)
    fn endpoint(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Internal(format!("base url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, label: &str, request: RequestBuilder) -> Result<Response, AppError> {
        let response = request.send().await.map_err(|e| {
            warn!("[API] {} transport failure: {}", label, e);
            AppError::from(e)
        })?;
        debug!("[API] {} -> {}", label, response.status().as_u16());
        Ok(response)
    }

    /// 发送请求，非 2xx 转为 AppError，成功则解析 JSON
    async fn send_json<T: DeserializeOwned>(
        &self,
        label: &str,
        request: RequestBuilder,
    ) -> Result<T, AppError> {
        let response = self.send(label, request).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response.json::<T>().await?)
    }

    /// GET /download/{id}，返回 (文件名, 字节)
    pub async fn download_invoice(&self, id: &RecordId) -> Result<(String, Vec<u8>), AppError> {
        let url = self.endpoint(&["download", id.as_str()])?;
        let response = self.send("GET /download/{id}", self.client.get(url)).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let file_name = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_file_name)
            .unwrap_or_else(|| format!("invoice_{}.pdf", id));
        let bytes = response.bytes().await?.to_vec();
        info!("[API] downloaded invoice {} ({} bytes)", id, bytes.len());
        Ok((file_name, bytes))
    }
}

#[async_trait]
impl InvoiceGateway for ApiClient {
    async fn list_invoices(&self, search: &str) -> Result<ListResponse, AppError> {
        let url = self.endpoint(&["invoices"])?;
        let request = self.client.get(url).query(&[("search", search)]);
        self.send_json("GET /invoices", request).await
    }

    async fn submit_upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<JobHandle, AppError> {
        let url = self.endpoint(&["upload"])?;
        let size = bytes.len();
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/zip")?;
        let form = multipart::Form::new().part("zip_file", part);

        info!("[API] POST /upload ({}, {} bytes)", file_name, size);
        let response = self.send("POST /upload", self.client.post(url).multipart(form)).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        // 2xx 但响应体不是 JSON 时按"未返回 job_id"处理
        let body: SubmitResponse = match response.text().await {
            Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
            Err(e) => {
                warn!("[API] POST /upload body unreadable: {}", e);
                SubmitResponse::default()
            }
        };

        match body.job_id {
            Some(job_id) if status == StatusCode::ACCEPTED => {
                info!("[API] upload accepted, job {}", job_id);
                Ok(JobHandle {
                    job_id,
                    file_name: file_name.to_string(),
                })
            }
            _ => Err(AppError::Http {
                status: status.as_u16(),
                message: body.error.unwrap_or_else(|| MISSING_JOB_ID.to_string()),
            }),
        }
    }

    async fn job_status(&self, job_id: &JobId) -> Result<StatusReport, AppError> {
        let url = self.endpoint(&["upload", "status", job_id.as_str()])?;
        self.send_json("GET /upload/status/{job_id}", self.client.get(url)).await
    }

    async fn update_invoice(&self, id: &RecordId, fields: &InvoiceUpdate) -> Result<ServerAck, AppError> {
        let url = self.endpoint(&["invoices", id.as_str()])?;
        info!("[API] PUT /invoices/{}", id);
        self.send_json("PUT /invoices/{id}", self.client.put(url).json(fields)).await
    }

    async fn delete_invoice(&self, id: &RecordId) -> Result<ServerAck, AppError> {
        let url = self.endpoint(&["invoices", id.as_str()])?;
        info!("[API] DELETE /invoices/{}", id);
        self.send_json("DELETE /invoices/{id}", self.client.delete(url)).await
    }

    async fn export_zip(&self, ids: &[RecordId]) -> Result<Vec<u8>, AppError> {
        let url = self.endpoint(&["download", "zip"])?;
        info!("[API] POST /download/zip ({} ids)", ids.len());
        let request = self.client.post(url).json(&ExportRequest { selected_ids: ids });
        let response = self.send("POST /download/zip", request).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn clear_all(&self) -> Result<ServerAck, AppError> {
        let url = self.endpoint(&["clear-all"])?;
        warn!("[API] POST /clear-all");
        self.send_json("POST /clear-all", self.client.post(url)).await
    }

    fn download_url(&self, id: &RecordId) -> Option<String> {
        self.endpoint(&["download", id.as_str()])
            .ok()
            .map(String::from)
    }
}

/// 非 2xx 响应转为 AppError：优先取响应体 `error` 字段，失败则降级为通用状态码提示
async fn error_from_response(response: Response) -> AppError {
    let status = response.status().as_u16();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!("[API] error body unreadable (HTTP {}): {}", status, e);
            return AppError::generic_http(status);
        }
    };

    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody { error: Some(message) }) if !message.trim().is_empty() => {
            AppError::Http { status, message }
        }
        _ => AppError::generic_http(status),
    }
}

/// 从 Content-Disposition 中取 filename="..."
fn attachment_file_name(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}
