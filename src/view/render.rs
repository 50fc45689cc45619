use crate::models::{Invoice, InvoiceUpdate, RecordId};
use bigdecimal::BigDecimal;

/// 缺失字段的占位文本
pub const PLACEHOLDER: &str = "N/A";

/// 列表主体，任意时刻只展示其中一种
#[derive(Debug, Clone, PartialEq)]
pub enum ListBody {
    Loading,
    Rows(Vec<RowView>),
    Empty,
    Error(String),
}

impl ListBody {
    pub fn row_ids(&self) -> Vec<RecordId> {
        match self {
            ListBody::Rows(rows) => rows.iter().map(|r| r.id.clone()).collect(),
            _ => Vec::new(),
        }
    }
}

/// 单行展示数据
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub id: RecordId,
    pub invoice_code: String,
    pub invoice_number: String,
    pub issue_date: String,
    pub amount: String,
    pub total_amount: String,
    pub buyer_name: String,
    pub seller_name: String,
    pub download_url: Option<String>,
    /// 编辑表单默认值
    pub edit: InvoiceUpdate,
}

/// ¥ + 两位小数；缺失时为占位文本，不显示为 0
pub fn format_amount(amount: Option<&BigDecimal>) -> String {
    match amount {
        Some(value) => format!("¥{}", value.round(2).with_scale(2)),
        None => PLACEHOLDER.to_string(),
    }
}

fn text_or_placeholder(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

/// 纯函数：记录列表 -> 列表主体
pub fn render_list<F>(invoices: &[Invoice], download_url: F) -> ListBody
where
    F: Fn(&RecordId) -> Option<String>,
{
    if invoices.is_empty() {
        return ListBody::Empty;
    }

    let rows = invoices
        .iter()
        .map(|inv| RowView {
            id: inv.id.clone(),
            invoice_code: text_or_placeholder(inv.invoice_code.as_deref()),
            invoice_number: text_or_placeholder(inv.invoice_number.as_deref()),
            issue_date: inv
                .issue_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            amount: format_amount(inv.amount.as_ref()),
            total_amount: format_amount(inv.total_amount.as_ref()),
            buyer_name: text_or_placeholder(inv.buyer_name.as_deref()),
            seller_name: text_or_placeholder(inv.seller_name.as_deref()),
            download_url: download_url(&inv.id),
            edit: InvoiceUpdate::from_invoice(inv),
        })
        .collect();

    ListBody::Rows(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn invoice(json: serde_json::Value) -> Invoice {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn missing_amount_renders_placeholder_exactly() {
        let body = render_list(&[invoice(serde_json::json!({"id": 1}))], |_| None);
        let ListBody::Rows(rows) = body else {
            panic!("expected rows");
        };
        assert_eq!(rows[0].amount, "N/A");
        assert_eq!(rows[0].total_amount, "N/A");
        assert_ne!(rows[0].amount, "¥0.00");
        assert!(!rows[0].amount.contains("NaN"));
    }

    #[test]
    fn zero_amount_is_not_a_missing_amount() {
        assert_eq!(format_amount(Some(&BigDecimal::from(0))), "¥0.00");
    }

    #[test]
    fn amounts_round_to_two_decimals() {
        let v = BigDecimal::from_str("1234.5").unwrap();
        assert_eq!(format_amount(Some(&v)), "¥1234.50");
        let v = BigDecimal::from_str("88.456").unwrap();
        assert_eq!(format_amount(Some(&v)), "¥88.46");
    }

    #[test]
    fn empty_input_renders_empty_state_only() {
        assert_eq!(render_list(&[], |_| None), ListBody::Empty);
        assert!(ListBody::Empty.row_ids().is_empty());
    }

    #[test]
    fn rows_carry_links_and_edit_defaults() {
        let invoices = vec![
            invoice(serde_json::json!({"id": 5, "buyer_name": "甲公司", "issue_date": "2024-06-01"})),
            invoice(serde_json::json!({"id": 6, "buyer_name": "", "total_amount": 12})),
        ];
        let body = render_list(&invoices, |id| Some(format!("/download/{}", id)));
        let ListBody::Rows(rows) = &body else {
            panic!("expected rows");
        };

        assert_eq!(body.row_ids(), vec![RecordId::new("5"), RecordId::new("6")]);
        assert_eq!(rows[0].buyer_name, "甲公司");
        assert_eq!(rows[0].issue_date, "2024-06-01");
        assert_eq!(rows[0].download_url.as_deref(), Some("/download/5"));
        assert_eq!(rows[1].buyer_name, PLACEHOLDER);
        assert_eq!(rows[1].edit.amount, BigDecimal::from(0));
        assert_eq!(rows[1].total_amount, "¥12.00");
    }
}
