pub mod render;
pub mod sink;

pub use render::{format_amount, render_list, ListBody, RowView, PLACEHOLDER};
pub use sink::{ArchiveSink, DirectorySink};

use crate::models::{JobStatus, Summary};
use crate::service::SelectionAffordance;
use std::time::Duration;

/// 上传按钮状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Uploading,
    Working(JobStatus),
}

/// 列表展示能力 (渲染与订阅分两步)
pub trait ListView: Send + Sync {
    /// 整体替换列表主体
    fn show_body(&self, body: &ListBody);

    fn show_stats(&self, stats: &Summary);

    /// 渲染之后重新绑定选择相关控件
    fn bind_selection(&self, affordance: &SelectionAffordance);

    fn show_upload_state(&self, state: &UploadState);

    /// 只在处理成功后调用
    fn clear_upload_form(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

/// 自动消失的提示消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub dismiss_after: Duration,
}

impl Notification {
    pub fn success(message: impl Into<String>, dismiss_after: Duration) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
            dismiss_after,
        }
    }

    pub fn error(message: impl Into<String>, dismiss_after: Duration) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
            dismiss_after,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// 破坏性操作前的确认
pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}
