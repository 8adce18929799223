//! 实体：记录的纯数据部分
//!
//! 身份、版本、字段集和门户，以及脏标记相关的全部操作。网络操作在
//! [`crate::records::Record`] 中，它在实体之上附加了布局句柄。

use super::field::{FieldSet, FieldValue};
use super::portal::Portal;
use super::NEW_RECORD_ID;
use crate::core::error::{RecordError, RecordResult};
use std::collections::BTreeMap;

/// 宿主确认写入后返回的身份信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    pub record_id: i64,
    pub mod_id: i64,
    /// 新建门户行的 (record_id, mod_id)，按提交顺序
    pub new_portal_rows: Vec<(i64, i64)>,
}

/// 记录实体
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    layout: String,
    record_id: i64,
    mod_id: i64,
    fields: FieldSet,
    portals: BTreeMap<String, Portal>,
}

impl Entity {
    /// 从宿主数据构造（干净状态）
    pub fn hydrate(
        layout: impl Into<String>,
        record_id: i64,
        mod_id: i64,
        fields: FieldSet,
        portals: Vec<Portal>,
    ) -> Self {
        Self {
            layout: layout.into(),
            record_id,
            mod_id,
            fields,
            portals: portals
                .into_iter()
                .map(|portal| (portal.name().to_string(), portal))
                .collect(),
        }
    }

    /// 新建实体（哨兵身份，所有标记清空）
    pub fn new(layout: impl Into<String>, fields: FieldSet, portals: Vec<Portal>) -> Self {
        Self::hydrate(layout, NEW_RECORD_ID, NEW_RECORD_ID, fields, portals)
    }

    pub fn layout_name(&self) -> &str {
        &self.layout
    }

    pub fn record_id(&self) -> i64 {
        self.record_id
    }

    pub fn mod_id(&self) -> i64 {
        self.mod_id
    }

    /// 尚未在宿主创建
    pub fn is_new(&self) -> bool {
        self.record_id == NEW_RECORD_ID
    }

    /// 是否有待提交的修改（字段或门户行）
    pub fn is_edited(&self) -> bool {
        self.fields.any_edited() || self.portals.values().any(Portal::any_edited)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> RecordResult<()> {
        self.fields.set(name, value)
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn portal(&self, name: &str) -> Option<&Portal> {
        self.portals.get(name)
    }

    pub fn portal_mut(&mut self, name: &str) -> RecordResult<&mut Portal> {
        self.portals
            .get_mut(name)
            .ok_or_else(|| RecordError::UnknownPortal {
                portal: name.to_string(),
            })
    }

    pub fn portals(&self) -> impl Iterator<Item = &Portal> {
        self.portals.values()
    }

    /// 提交成功后同步身份并清除脏标记
    pub(crate) fn apply_commit(&mut self, outcome: CommitOutcome) {
        self.record_id = outcome.record_id;
        self.mod_id = outcome.mod_id;
        self.fields.clear_edits();

        let mut assigned = outcome.new_portal_rows.into_iter();
        for portal in self.portals.values_mut() {
            for row in portal.rows_mut().iter_mut() {
                if row.is_new() {
                    row.mark_committed(assigned.next());
                } else if row.is_edited() {
                    row.mark_committed(None);
                }
            }
        }
        tracing::debug!(
            target: "records",
            "Record {} on {} committed at mod {}",
            self.record_id,
            self.layout,
            self.mod_id
        );
    }

    /// 宿主在提交之外修改了记录（如容器上传）后同步版本
    pub(crate) fn set_mod_id(&mut self, mod_id: i64) {
        self.mod_id = mod_id;
    }

    /// 用宿主数据整体替换（刷新）
    pub(crate) fn replace_from(&mut self, other: Entity) {
        *self = other;
    }

    /// 干净的副本，使用新的身份
    pub(crate) fn clean_copy(&self, record_id: i64, mod_id: i64) -> Entity {
        let fields = FieldSet::hydrate(self.fields.snapshot());
        let portals = self
            .portals
            .values()
            .map(|portal| {
                let mut copy = portal.clone();
                let rows = copy.rows_mut();
                rows.retain(|row| !row.is_new());
                for row in rows.iter_mut() {
                    row.mark_committed(None);
                }
                copy
            })
            .collect();
        Entity::hydrate(self.layout.clone(), record_id, mod_id, fields, portals)
    }
}
