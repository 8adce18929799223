//! 提交载荷构建
//!
//! 根据实体的脏标记生成最小的创建/更新载荷：
//!
//! ```text
//!  新实体 (哨兵身份)            已有实体
//!  ┌──────────────────┐        ┌──────────────────────────┐
//!  │ fieldData: 全部字段 │        │ recordId + modId          │
//!  │ portalData: 新行    │        │ fieldData: 仅已编辑字段     │
//!  └──────────────────┘        │ portalData: 新行 + 已编辑行 │
//!                               └──────────────────────────┘
//! ```
//!
//! 门户行递归套用相同规则：新行发送全部字段，已有行只发送已编辑字段并携带身份。
//! 没有任何行入选的门户不出现在 `portalData` 中。

use super::entity::Entity;
use super::portal::{Portal, PortalRow};
use crate::bridge::protocol::{PortalRowPayload, RequestPayload, WriteRequest};
use std::collections::BTreeMap;

/// 提交计划
#[derive(Debug, Clone, PartialEq)]
pub enum CommitPlan {
    /// 新建记录（全量快照）
    Create(WriteRequest),
    /// 更新已有记录（仅差异）
    Update(WriteRequest),
}

impl CommitPlan {
    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create(_))
    }

    pub fn body(&self) -> &WriteRequest {
        match self {
            Self::Create(body) | Self::Update(body) => body,
        }
    }

    pub fn body_mut(&mut self) -> &mut WriteRequest {
        match self {
            Self::Create(body) | Self::Update(body) => body,
        }
    }

    /// 载荷中新建门户行的数量
    pub fn new_row_count(&self) -> usize {
        self.body()
            .portal_data
            .values()
            .flatten()
            .filter(|row| row.record_id.is_none())
            .count()
    }

    pub fn into_payload(self) -> RequestPayload {
        match self {
            Self::Create(body) => RequestPayload::CreateRecord(body),
            Self::Update(body) => RequestPayload::ModifyRecord(body),
        }
    }
}

/// 构建提交载荷
///
/// 零编辑的已有实体仍然生成一个字段数据为空的更新（提交可能还要运行脚本）。
pub fn build_payload(entity: &Entity) -> CommitPlan {
    let portal_data = portal_payloads(entity.portals());

    if entity.is_new() {
        CommitPlan::Create(WriteRequest {
            layout: entity.layout_name().to_string(),
            field_data: entity.fields().snapshot(),
            portal_data,
            ..Default::default()
        })
    } else {
        CommitPlan::Update(WriteRequest {
            layout: entity.layout_name().to_string(),
            record_id: Some(entity.record_id()),
            mod_id: Some(entity.mod_id()),
            field_data: entity.fields().edited_values(),
            portal_data,
            ..Default::default()
        })
    }
}

fn portal_payloads<'a>(
    portals: impl Iterator<Item = &'a Portal>,
) -> BTreeMap<String, Vec<PortalRowPayload>> {
    portals
        .filter_map(|portal| {
            let rows: Vec<PortalRowPayload> = portal
                .rows()
                .iter()
                .filter(|row| row.is_edited())
                .map(row_payload)
                .collect();
            (!rows.is_empty()).then(|| (portal.name().to_string(), rows))
        })
        .collect()
}

fn row_payload(row: &PortalRow) -> PortalRowPayload {
    if row.is_new() {
        PortalRowPayload {
            record_id: None,
            mod_id: None,
            fields: row.fields().snapshot(),
        }
    } else {
        PortalRowPayload {
            record_id: Some(row.record_id()),
            mod_id: Some(row.mod_id()),
            fields: row.fields().edited_values(),
        }
    }
}
