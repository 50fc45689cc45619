use crate::models::RecordId;
use indexmap::IndexSet;
use tracing::debug;

/// 批量下载按钮与全选框的状态 (每次渲染/勾选后重新计算)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionAffordance {
    pub row_count: usize,
    pub selected_count: usize,
    /// 选中数为 0 时禁用
    pub download_enabled: bool,
    pub download_label: String,
    /// 行数非 0 且全部勾选时为 true
    pub select_all_checked: bool,
}

/// 选中集合
///
/// 只保存当前渲染出的行 ID 与其中被勾选的 ID，勾选集合始终是渲染集合的子集。
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    rendered: IndexSet<RecordId>,
    selected: IndexSet<RecordId>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 渲染后重新绑定：记录新行集合，丢弃已不在列表中的勾选
    pub fn rebind<I>(&mut self, rendered: I) -> SelectionAffordance
    where
        I: IntoIterator<Item = RecordId>,
    {
        self.rendered = rendered.into_iter().collect();
        let before = self.selected.len();
        let rendered = &self.rendered;
        self.selected.retain(|id| rendered.contains(id));
        if self.selected.len() != before {
            debug!("Dropped {} stale selections", before - self.selected.len());
        }
        self.affordance()
    }

    /// 全选框：所有行与其保持一致
    pub fn toggle_all(&mut self, checked: bool) -> SelectionAffordance {
        if checked {
            self.selected = self.rendered.clone();
        } else {
            self.selected.clear();
        }
        self.affordance()
    }

    /// 单行勾选。不在当前列表中的 ID 忽略
    pub fn set_checked(&mut self, id: &RecordId, checked: bool) -> SelectionAffordance {
        if !self.rendered.contains(id) {
            debug!("Ignoring toggle for {} (not rendered)", id);
        } else if checked {
            self.selected.insert(id.clone());
        } else {
            self.selected.shift_remove(id);
        }
        self.affordance()
    }

    pub fn clear(&mut self) -> SelectionAffordance {
        self.selected.clear();
        self.affordance()
    }

    pub fn is_checked(&self, id: &RecordId) -> bool {
        self.selected.contains(id)
    }

    /// 按列表顺序返回选中 ID
    pub fn selected_ids(&self) -> Vec<RecordId> {
        self.rendered
            .iter()
            .filter(|id| self.selected.contains(*id))
            .cloned()
            .collect()
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn row_count(&self) -> usize {
        self.rendered.len()
    }

    pub fn affordance(&self) -> SelectionAffordance {
        let row_count = self.rendered.len();
        let selected_count = self.selected.len();
        SelectionAffordance {
            row_count,
            selected_count,
            download_enabled: selected_count > 0,
            download_label: format!("Download selected ({})", selected_count),
            select_all_checked: row_count > 0 && selected_count == row_count,
        }
    }
}
