use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// 发票主键 (不透明、稳定)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        super::deserialize_opaque_id(deserializer).map(RecordId)
    }
}

/// 发票记录 (列表接口返回)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: RecordId,
    #[serde(default)]
    pub invoice_code: Option<String>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    /// 金额 (不含税)，缺失与 0 不同
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub amount: Option<BigDecimal>,
    /// 价税合计
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub total_amount: Option<BigDecimal>,
    #[serde(default)]
    pub buyer_name: Option<String>,
    #[serde(default)]
    pub seller_name: Option<String>,
}

/// 金额字段兼容 JSON 数字、数字字符串、空串与 null
fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<BigDecimal>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        // serde_json 以最短往返形式输出浮点数，避免二进制误差进入 BigDecimal
        Some(Value::Number(n)) => BigDecimal::from_str(&n.to_string())
            .map(Some)
            .map_err(D::Error::custom),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => BigDecimal::from_str(s.trim())
            .map(Some)
            .map_err(D::Error::custom),
        Some(other) => Err(D::Error::custom(format!("invalid amount: {}", other))),
    }
}

/// 统计汇总 (服务端计算，客户端原样展示)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Summary {
    pub total_count: u64,
    pub total_amount: String,
    pub total_tax_amount: String,
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            total_count: 0,
            total_amount: "¥0.00".to_string(),
            total_tax_amount: "¥0.00".to_string(),
        }
    }
}

/// GET /invoices 响应体
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub invoices: Vec<Invoice>,
    #[serde(default)]
    pub stats: Summary,
}

/// 编辑表单 (PUT /invoices/{id} 请求体)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceUpdate {
    pub buyer_name: String,
    pub seller_name: String,
    pub invoice_code: String,
    pub invoice_number: String,
    pub issue_date: String,
    pub amount: BigDecimal,
    pub total_amount: BigDecimal,
}

impl InvoiceUpdate {
    /// 用现有记录填充编辑表单默认值，缺失金额此处才按 0 处理
    pub fn from_invoice(invoice: &Invoice) -> Self {
        Self {
            buyer_name: invoice.buyer_name.clone().unwrap_or_default(),
            seller_name: invoice.seller_name.clone().unwrap_or_default(),
            invoice_code: invoice.invoice_code.clone().unwrap_or_default(),
            invoice_number: invoice.invoice_number.clone().unwrap_or_default(),
            issue_date: invoice
                .issue_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            amount: invoice.amount.clone().unwrap_or_else(BigDecimal::zero),
            total_amount: invoice.total_amount.clone().unwrap_or_else(BigDecimal::zero),
        }
    }
}

/// 更新/删除/清空等接口的确认响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}
