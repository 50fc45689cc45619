//! 终端展示：把列表、统计、提示与确认输出到 stdout/stdin

use crate::models::Summary;
use crate::service::SelectionAffordance;
use crate::view::{
    Confirmer, ListBody, ListView, Notification, NotificationLevel, Notifier, RowView, UploadState,
};
use std::io::{BufRead, Write};
use tokio::runtime::{Handle, RuntimeFlavor};

const HEADER: [&str; 8] = [
    "ID", "Code", "Number", "Date", "Amount", "Total", "Buyer", "Seller",
];

/// 终端视图。确认提示会阻塞读取 stdin
pub struct TerminalView {
    assume_yes: bool,
}

impl TerminalView {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

fn row_cells(row: &RowView) -> [&str; 8] {
    [
        row.id.as_str(),
        &row.invoice_code,
        &row.invoice_number,
        &row.issue_date,
        &row.amount,
        &row.total_amount,
        &row.buyer_name,
        &row.seller_name,
    ]
}

/// 把列表主体格式化为文本行 (按字符数对齐)
pub fn format_body(body: &ListBody) -> Vec<String> {
    match body {
        ListBody::Loading => vec!["Loading...".to_string()],
        ListBody::Empty => vec!["No invoices found.".to_string()],
        ListBody::Error(message) => vec![format!("!! {}", message)],
        ListBody::Rows(rows) => {
            let mut widths = HEADER.map(|h| h.chars().count());
            for row in rows {
                for (w, cell) in widths.iter_mut().zip(row_cells(row)) {
                    *w = (*w).max(cell.chars().count());
                }
            }

            let line = |cells: [&str; 8]| {
                cells
                    .iter()
                    .zip(widths)
                    .map(|(cell, w)| format!("{}{}", cell, " ".repeat(w - cell.chars().count())))
                    .collect::<Vec<_>>()
                    .join("  ")
                    .trim_end()
                    .to_string()
            };

            std::iter::once(line(HEADER))
                .chain(rows.iter().map(|row| line(row_cells(row))))
                .collect()
        }
    }
}

pub fn format_stats(stats: &Summary) -> String {
    format!(
        "Count: {}  Amount: {}  Total incl. tax: {}",
        stats.total_count, stats.total_amount, stats.total_tax_amount
    )
}

impl ListView for TerminalView {
    fn show_body(&self, body: &ListBody) {
        // 加载提示只在终端里一闪而过，不单独占行
        if matches!(body, ListBody::Loading) {
            return;
        }
        for line in format_body(body) {
            println!("{}", line);
        }
    }

    fn show_stats(&self, stats: &Summary) {
        println!("{}", format_stats(stats));
    }

    fn bind_selection(&self, affordance: &SelectionAffordance) {
        if affordance.selected_count > 0 {
            println!(
                "[{}] select all  {}",
                if affordance.select_all_checked { "x" } else { " " },
                affordance.download_label
            );
        }
    }

    fn show_upload_state(&self, state: &UploadState) {
        match state {
            UploadState::Idle => {}
            UploadState::Uploading => println!("Uploading..."),
            UploadState::Working(status) => println!("{}...", status.busy_label()),
        }
    }
}

impl Notifier for TerminalView {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => println!("[OK] {}", notification.message),
            NotificationLevel::Error => eprintln!("[ERROR] {}", notification.message),
        }
    }
}

impl Confirmer for TerminalView {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        on_blocking_thread(|| {
            print!("{} [y/N] ", prompt);
            let _ = std::io::stdout().flush();
            read_answer(&mut std::io::stdin().lock())
        })
    }
}

fn read_answer(input: &mut impl BufRead) -> bool {
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(_) => matches!(answer.trim(), "y" | "Y" | "yes"),
        Err(_) => false,
    }
}

/// 多线程运行时里让出当前 worker 再阻塞；单线程运行时不支持 block_in_place，直接执行
fn on_blocking_thread<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::render_list;

    #[test]
    fn rows_are_aligned_under_header() {
        let invoices = vec![
            serde_json::from_value(serde_json::json!({"id": 1, "amount": 5, "buyer_name": "甲"})).unwrap(),
            serde_json::from_value(serde_json::json!({"id": 22, "invoice_number": "98765432"})).unwrap(),
        ];
        let lines = format_body(&render_list(&invoices, |_| None));

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID  Code"));
        assert!(lines[1].contains("¥5.00"));
        assert!(lines[2].contains("98765432"));
        // 第二列起始位置一致
        let col = |l: &str| l.chars().position(|c| c == ' ').unwrap();
        assert_eq!(col(&lines[0]), col(&lines[2]));
    }

    #[test]
    fn non_row_bodies_render_single_line() {
        assert_eq!(format_body(&ListBody::Empty), vec!["No invoices found."]);
        assert_eq!(
            format_body(&ListBody::Error("Load failed: x".into())),
            vec!["!! Load failed: x"]
        );
    }

    #[test]
    fn answer_accepts_only_yes() {
        assert!(read_answer(&mut "y\n".as_bytes()));
        assert!(read_answer(&mut "yes\n".as_bytes()));
        assert!(!read_answer(&mut "n\n".as_bytes()));
        assert!(!read_answer(&mut "".as_bytes()));
    }

    #[tokio::test]
    async fn blocking_prompt_runs_on_current_thread_runtime() {
        assert_eq!(on_blocking_thread(|| 7), 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_prompt_runs_on_multi_thread_runtime() {
        assert_eq!(on_blocking_thread(|| 7), 7);
    }

    #[test]
    fn stats_pass_through_verbatim() {
        let line = format_stats(&Summary {
            total_count: 2,
            total_amount: "¥1,000.00".into(),
            total_tax_amount: "¥1,130.00".into(),
        });
        assert_eq!(line, "Count: 2  Amount: ¥1,000.00  Total incl. tax: ¥1,130.00");
    }
}
