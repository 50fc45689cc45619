use crate::api::InvoiceGateway;
use crate::config::AppConfig;
use crate::error::{AppError, UNREACHABLE_HINT};
use crate::models::{Invoice, InvoiceUpdate, JobHandle, RecordId, Summary};
use crate::service::poller::{JobOutcome, JobPoller};
use crate::service::selection::{SelectionAffordance, SelectionTracker};
use crate::view::{
    render_list, ArchiveSink, Confirmer, ListBody, ListView, Notification, Notifier, UploadState,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 控制器内部状态，锁不跨 await 持有
#[derive(Default)]
struct ControllerState {
    active_term: String,
    /// 每次 load 自增，过期响应直接丢弃
    generation: u64,
    invoices: Vec<Invoice>,
    selection: SelectionTracker,
}

/// 列表控制器
///
/// 所有改动类操作成功后都会带着当前搜索词重新 load，不做本地乐观更新。
pub struct ListController {
    gateway: Arc<dyn InvoiceGateway>,
    view: Arc<dyn ListView>,
    notifier: Arc<dyn Notifier>,
    confirmer: Arc<dyn Confirmer>,
    poller: JobPoller,
    dismiss_after: Duration,
    export_name: String,
    state: Mutex<ControllerState>,
}

impl ListController {
    pub fn new(
        gateway: Arc<dyn InvoiceGateway>,
        view: Arc<dyn ListView>,
        notifier: Arc<dyn Notifier>,
        confirmer: Arc<dyn Confirmer>,
        config: &AppConfig,
    ) -> Self {
        let poller = JobPoller::from_config(gateway.clone(), config);
        Self {
            gateway,
            view,
            notifier,
            confirmer,
            poller,
            dismiss_after: config.dismiss_after(),
            export_name: config.export.file_name.clone(),
            state: Mutex::new(ControllerState::default()),
        }
    }

    pub fn active_term(&self) -> String {
        self.state.lock().active_term.clone()
    }

    /// 当前列表中某条记录的编辑表单默认值
    pub fn edit_defaults(&self, id: &RecordId) -> Option<InvoiceUpdate> {
        self.state
            .lock()
            .invoices
            .iter()
            .find(|inv| &inv.id == id)
            .map(InvoiceUpdate::from_invoice)
    }

    fn notify_success(&self, message: impl Into<String>) {
        self.notifier.notify(Notification::success(message, self.dismiss_after));
    }

    fn notify_error(&self, message: impl Into<String>) {
        self.notifier.notify(Notification::error(message, self.dismiss_after));
    }

    // ── 加载 ─────────────────────────────────────────────────────────────────

    /// 拉取列表与统计并整体替换展示内容
    pub async fn load(&self, search_term: &str) -> Result<(), AppError> {
        let generation = {
            let mut state = self.state.lock();
            state.active_term = search_term.to_string();
            state.generation += 1;
            state.generation
        };
        self.view.show_body(&ListBody::Loading);

        let fetched = self.gateway.list_invoices(search_term).await;

        let mut state = self.state.lock();
        if state.generation != generation {
            debug!("Discarding superseded list response for {:?}", search_term);
            return Ok(());
        }

        match fetched {
            Ok(resp) => {
                let body = render_list(&resp.invoices, |id| self.gateway.download_url(id));
                let affordance = state.selection.rebind(body.row_ids());
                info!("Loaded {} invoices (search={:?})", resp.invoices.len(), search_term);
                state.invoices = resp.invoices;
                drop(state);

                self.view.show_body(&body);
                self.view.show_stats(&resp.stats);
                self.view.bind_selection(&affordance);
                Ok(())
            }
            Err(e) => {
                let affordance = state.selection.rebind(Vec::new());
                state.invoices.clear();
                drop(state);

                let message = load_failure_message(&e);
                error!("Failed to load invoices: {}", e);
                self.view.show_body(&ListBody::Error(message.clone()));
                self.view.show_stats(&Summary::default());
                self.view.bind_selection(&affordance);
                self.notify_error(message);
                Err(e)
            }
        }
    }

    /// 用给定搜索词刷新；失败已在 load 内部提示
    async fn reload(&self, search_term: &str) {
        if let Err(e) = self.load(search_term).await {
            debug!("Refresh after mutation failed: {}", e);
        }
    }

    pub async fn refresh(&self) {
        let term = self.active_term();
        self.reload(&term).await;
    }

    // ── 改动类操作 ───────────────────────────────────────────────────────────

    pub async fn update(&self, id: &RecordId, fields: &InvoiceUpdate) -> Result<(), AppError> {
        let term = self.active_term();
        match self.gateway.update_invoice(id, fields).await {
            Ok(_) => {
                self.notify_success(format!("Invoice ID {} updated.", id));
                self.reload(&term).await;
                Ok(())
            }
            Err(e) => {
                warn!("Update of invoice {} failed: {}", id, e);
                self.notify_error(format!("Update failed: {}", e));
                Err(e)
            }
        }
    }

    /// 删除单张发票。用户取消确认时返回 Ok(false)
    pub async fn delete(&self, id: &RecordId) -> Result<bool, AppError> {
        if !self
            .confirmer
            .confirm(&format!("Delete invoice (ID: {})?", id))
        {
            return Ok(false);
        }

        let term = self.active_term();
        match self.gateway.delete_invoice(id).await {
            Ok(_) => {
                self.notify_success(format!("Invoice ID {} deleted.", id));
                self.reload(&term).await;
                Ok(true)
            }
            Err(e) => {
                warn!("Delete of invoice {} failed: {}", id, e);
                self.notify_error(format!("Delete failed: {}", e));
                Err(e)
            }
        }
    }

    /// 清空全部发票与文件。用户取消确认时返回 Ok(false)
    pub async fn clear_all(&self) -> Result<bool, AppError> {
        if !self.confirmer.confirm(
            "Clear ALL invoice data and PDF files? This cannot be undone.",
        ) {
            return Ok(false);
        }

        let term = self.active_term();
        match self.gateway.clear_all().await {
            Ok(_) => {
                self.notify_success("Database and files cleared.");
                self.reload(&term).await;
                Ok(true)
            }
            Err(e) => {
                warn!("Clear-all failed: {}", e);
                self.notify_error(format!("Clear failed: {}", e));
                Err(e)
            }
        }
    }

    // ── 上传 ─────────────────────────────────────────────────────────────────

    /// 上传 ZIP 并轮询后台任务直到终止
    ///
    /// 每次调用拥有独立的 watch，多次并发上传互不影响，各自终止后各自刷新。
    pub async fn upload(&self, path: &Path, cancel: &CancellationToken) -> Result<JobOutcome, AppError> {
        let Some(file_name) = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
        else {
            let err = AppError::Validation("No file selected".into());
            self.notify_error(err.to_string());
            return Err(err);
        };

        self.view.show_upload_state(&UploadState::Uploading);
        let handle = match self.submit(path, &file_name).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("Upload of {} failed: {}", file_name, e);
                self.notify_error(format!("Upload failed: {}", e));
                self.view.show_upload_state(&UploadState::Idle);
                return Err(e);
            }
        };
        self.notify_success(format!(
            "File \"{}\" uploaded, processing in background...",
            file_name
        ));

        let view = self.view.clone();
        let outcome = self
            .poller
            .watch(&handle, cancel, |status| {
                view.show_upload_state(&UploadState::Working(status.clone()))
            })
            .await;
        self.view.show_upload_state(&UploadState::Idle);

        match &outcome {
            JobOutcome::Finished(stats) => {
                self.view.clear_upload_form();
                self.notify_success(format!(
                    "File \"{}\" processed!\nPDFs found: {}\nProcessed: {}\nImported: {}\nSkipped (duplicates): {}",
                    file_name, stats.found, stats.processed, stats.inserted, stats.duplicates
                ));
                self.refresh().await;
            }
            JobOutcome::Failed(message) => {
                self.notify_error(format!("File \"{}\" failed to process:\n{}", file_name, message));
            }
            JobOutcome::PollFailed(e) => {
                self.notify_error(format!("Error while checking processing status: {}", e));
            }
            JobOutcome::TimedOut { attempts } => {
                self.notify_error(format!(
                    "Stopped waiting for \"{}\" after {} status checks; it may still finish on the server.",
                    file_name, attempts
                ));
            }
            JobOutcome::Cancelled => {
                self.notify_error(format!("Stopped watching \"{}\".", file_name));
            }
        }

        Ok(outcome)
    }

    async fn submit(&self, path: &Path, file_name: &str) -> Result<JobHandle, AppError> {
        let bytes = tokio::fs::read(path).await?;
        self.gateway.submit_upload(file_name, bytes).await
    }

    // ── 选择与批量导出 ───────────────────────────────────────────────────────

    pub fn toggle_all(&self, checked: bool) -> SelectionAffordance {
        let affordance = self.state.lock().selection.toggle_all(checked);
        self.view.bind_selection(&affordance);
        affordance
    }

    pub fn set_checked(&self, id: &RecordId, checked: bool) -> SelectionAffordance {
        let affordance = self.state.lock().selection.set_checked(id, checked);
        self.view.bind_selection(&affordance);
        affordance
    }

    pub fn selected_ids(&self) -> Vec<RecordId> {
        self.state.lock().selection.selected_ids()
    }

    /// 打包下载选中的发票
    ///
    /// 选中为空时不发请求。成功与失败最终都会重新绑定选择控件。
    pub async fn export_selected(&self, sink: &dyn ArchiveSink) -> Result<PathBuf, AppError> {
        let ids = self.selected_ids();
        if ids.is_empty() {
            let err = AppError::Validation("No invoices selected".into());
            self.notify_error(err.to_string());
            return Err(err);
        }

        let result = match self.gateway.export_zip(&ids).await {
            Ok(bytes) => sink.save(&self.export_name, bytes).await,
            Err(e) => Err(e),
        };

        let affordance = {
            let mut state = self.state.lock();
            if result.is_ok() {
                state.selection.clear()
            } else {
                state.selection.affordance()
            }
        };

        match &result {
            Ok(path) => {
                info!("Exported {} invoices to {}", ids.len(), path.display());
                self.notify_success(format!(
                    "Saved {} invoices to {}",
                    ids.len(),
                    path.display()
                ));
            }
            Err(e) => {
                warn!("Export of {} invoices failed: {}", ids.len(), e);
                self.notify_error(format!("Export failed: {}", e));
            }
        }
        self.view.bind_selection(&affordance);
        result
    }
}

fn load_failure_message(err: &AppError) -> String {
    if err.is_unreachable() {
        format!("Load failed: {}", UNREACHABLE_HINT)
    } else {
        format!("Load failed: {}", err)
    }
}
