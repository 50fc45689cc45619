use thiserror::Error;

/// 无法连接后端时展示给用户的提示
pub const UNREACHABLE_HINT: &str = "cannot reach the backend service (make sure the backend is running)";

/// 客户端统一错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 传输层失败：连接被拒绝、超时等
    #[error("{} ({0})", UNREACHABLE_HINT)]
    Unreachable(String),

    /// 非 2xx 响应，message 为服务端 `error` 字段或通用状态码提示
    #[error("{message}")]
    Http { status: u16, message: String },

    /// 成功响应但响应体无法解析
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// 本地校验失败，未发出任何请求
    #[error("{0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// 通用状态码提示 (错误响应体缺失或无法解析时使用)
    pub fn generic_http(status: u16) -> Self {
        AppError::Http {
            status,
            message: format!("HTTP error! status: {}", status),
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            AppError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, AppError::Unreachable(_))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            AppError::Unreachable(err.to_string())
        } else if err.is_builder() {
            AppError::Internal(err.to_string())
        } else if err.is_decode() {
            AppError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            AppError::generic_http(status.as_u16())
        } else {
            AppError::Unreachable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_http_message_carries_status_code() {
        let err = AppError::generic_http(503);
        assert_eq!(err.http_status(), Some(503));
        assert_eq!(err.to_string(), "HTTP error! status: 503");
    }

    #[test]
    fn http_error_displays_server_message_verbatim() {
        let err = AppError::Http {
            status: 400,
            message: "文件类型错误，请上传 ZIP 压缩包".into(),
        };
        assert_eq!(err.to_string(), "文件类型错误，请上传 ZIP 压缩包");
    }

    #[test]
    fn unreachable_message_is_actionable() {
        let err = AppError::Unreachable("connection refused".into());
        assert!(err.is_unreachable());
        assert!(err.http_status().is_none());
        assert!(err.to_string().contains(UNREACHABLE_HINT));
    }
}
