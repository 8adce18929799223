//! 门户（portal）与门户行
//!
//! 门户行是嵌套实体：与记录相同的身份/版本/字段脏标记语义。
//! 新建行使用哨兵身份并始终包含在下一次提交中；删除行直接从门户中移除，
//! 提交时不会发送删除标记。
//!
//! 宿主创建了行却没有返回其身份时（新建记录的响应不含门户行信息），该行进入
//! [`RowState::AwaitingRefresh`]：不再参与提交，也拒绝编辑，直到记录刷新。

use super::field::{FieldSet, FieldValue};
use super::NEW_RECORD_ID;
use crate::core::error::{RecordError, RecordResult};

/// 门户行在本地的生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// 来自宿主，身份有效
    Persisted,
    /// 本地新建，尚未提交
    Created,
    /// 已在宿主创建但身份未知
    AwaitingRefresh,
}

/// 门户行
#[derive(Debug, Clone, PartialEq)]
pub struct PortalRow {
    record_id: i64,
    mod_id: i64,
    fields: FieldSet,
    state: RowState,
}

impl PortalRow {
    /// 从宿主数据构造（干净状态）
    pub fn hydrate(record_id: i64, mod_id: i64, fields: FieldSet) -> Self {
        Self {
            record_id,
            mod_id,
            fields,
            state: RowState::Persisted,
        }
    }

    /// 新建行（哨兵身份）
    pub fn create(fields: FieldSet) -> Self {
        Self {
            record_id: NEW_RECORD_ID,
            mod_id: NEW_RECORD_ID,
            fields,
            state: RowState::Created,
        }
    }

    pub fn record_id(&self) -> i64 {
        self.record_id
    }

    pub fn mod_id(&self) -> i64 {
        self.mod_id
    }

    pub fn state(&self) -> RowState {
        self.state
    }

    /// 尚未提交到宿主
    pub fn is_new(&self) -> bool {
        self.state == RowState::Created
    }

    pub fn is_awaiting_refresh(&self) -> bool {
        self.state == RowState::AwaitingRefresh
    }

    /// 需要包含在下一次提交中
    pub fn is_edited(&self) -> bool {
        match self.state {
            RowState::Created => true,
            RowState::Persisted => self.fields.any_edited(),
            RowState::AwaitingRefresh => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> RecordResult<()> {
        if self.is_awaiting_refresh() {
            return Err(RecordError::AwaitingRefresh);
        }
        self.fields.set(name, value)
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// 提交成功后更新状态
    ///
    /// 新建行没有拿到宿主分配的身份时进入 `AwaitingRefresh`。
    pub(crate) fn mark_committed(&mut self, assigned: Option<(i64, i64)>) {
        match assigned {
            Some((record_id, mod_id)) => {
                self.record_id = record_id;
                self.mod_id = mod_id;
                self.state = RowState::Persisted;
            }
            None if self.state == RowState::Created => {
                self.state = RowState::AwaitingRefresh;
            }
            None => {}
        }
        self.fields.clear_edits();
    }
}

/// 门户：按名称分组的有序行集合
#[derive(Debug, Clone, PartialEq)]
pub struct Portal {
    name: String,
    skeleton: Vec<String>,
    rows: Vec<PortalRow>,
}

impl Portal {
    /// 创建空门户
    ///
    /// `skeleton` 是新建行的字段名（来自门户元数据）。
    pub fn new(name: impl Into<String>, skeleton: Vec<String>) -> Self {
        Self {
            name: name.into(),
            skeleton,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(name: impl Into<String>, skeleton: Vec<String>, rows: Vec<PortalRow>) -> Self {
        Self {
            name: name.into(),
            skeleton,
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 新增一行并返回其可变引用
    ///
    /// 没有元数据骨架时沿用现有第一行的字段名。
    pub fn create_row(&mut self) -> &mut PortalRow {
        let fields = if self.skeleton.is_empty() {
            match self.rows.first() {
                Some(row) => FieldSet::skeleton(row.fields.names().map(str::to_string)),
                None => FieldSet::default(),
            }
        } else {
            FieldSet::skeleton(self.skeleton.iter().cloned())
        };
        tracing::trace!(target: "records", "Portal {} gained a new row", self.name);
        self.rows.push(PortalRow::create(fields));
        let last = self.rows.len() - 1;
        &mut self.rows[last]
    }

    /// 从门户中移除一行
    pub fn remove_row(&mut self, index: usize) -> RecordResult<PortalRow> {
        if index >= self.rows.len() {
            return Err(RecordError::RowOutOfRange {
                portal: self.name.clone(),
                index,
            });
        }
        Ok(self.rows.remove(index))
    }

    pub fn rows(&self) -> &[PortalRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&PortalRow> {
        self.rows.get(index)
    }

    pub fn row_mut(&mut self, index: usize) -> RecordResult<&mut PortalRow> {
        let portal = self.name.clone();
        self.rows
            .get_mut(index)
            .ok_or(RecordError::RowOutOfRange { portal, index })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 是否有需要提交的行
    pub fn any_edited(&self) -> bool {
        self.rows.iter().any(PortalRow::is_edited)
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<PortalRow> {
        &mut self.rows
    }
}
