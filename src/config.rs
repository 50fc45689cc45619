use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub poll: PollConfig,
    pub notify: NotifyConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// 单次请求超时，未设置则不限
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// 任务轮询配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval_ms: u64,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub dismiss_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub file_name: String,
    pub output_dir: PathBuf,
}

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000/api/v1";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_DEADLINE_SECS: u64 = 30 * 60;
pub const DEFAULT_DISMISS_MS: u64 = 5000;
pub const DEFAULT_EXPORT_NAME: &str = "selected_invoices.zip";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                timeout_secs: None,
            },
            poll: PollConfig {
                interval_ms: DEFAULT_POLL_INTERVAL_MS,
                max_attempts: None,
                deadline_secs: Some(DEFAULT_DEADLINE_SECS),
            },
            notify: NotifyConfig {
                dismiss_ms: DEFAULT_DISMISS_MS,
            },
            export: ExportConfig {
                file_name: DEFAULT_EXPORT_NAME.to_string(),
                output_dir: PathBuf::from("."),
            },
        }
    }
}

impl AppConfig {
    /// 加载配置：默认值 -> fapiao-desk.toml (可选) -> FAPIAO__* 环境变量
    pub fn from_env() -> Result<Self, AppError> {
        let settings = config::Config::builder()
            .set_default("api.base_url", DEFAULT_BASE_URL)?
            .set_default("poll.interval_ms", DEFAULT_POLL_INTERVAL_MS)?
            .set_default("poll.deadline_secs", DEFAULT_DEADLINE_SECS)?
            .set_default("notify.dismiss_ms", DEFAULT_DISMISS_MS)?
            .set_default("export.file_name", DEFAULT_EXPORT_NAME)?
            .set_default("export.output_dir", ".")?
            .add_source(config::File::with_name("fapiao-desk").required(false))
            .add_source(
                config::Environment::with_prefix("FAPIAO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: AppConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.poll.interval_ms == 0 {
            return Err(AppError::Validation(
                "poll.interval_ms must be greater than zero".into(),
            ));
        }
        url::Url::parse(&self.api.base_url).map_err(|e| {
            AppError::Validation(format!("invalid api.base_url {}: {}", self.api.base_url, e))
        })?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll.interval_ms)
    }

    pub fn poll_deadline(&self) -> Option<Duration> {
        self.poll.deadline_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.api.timeout_secs.map(Duration::from_secs)
    }

    pub fn dismiss_after(&self) -> Duration {
        Duration::from_millis(self.notify.dismiss_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend_contract() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(2000));
        assert_eq!(cfg.poll.max_attempts, None);
        assert_eq!(cfg.dismiss_after(), Duration::from_secs(5));
        assert_eq!(cfg.export.file_name, "selected_invoices.zip");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.poll.interval_ms = 0;
        assert!(matches!(cfg.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn malformed_base_url_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.api.base_url = "not a url".into();
        assert!(cfg.validate().is_err());
    }
}
