//! 带布局句柄的记录
//!
//! [`Record`] 解引用到 [`Entity`]，字段和门户的读写都直接在记录上进行；
//! 这里只负责需要访问宿主的操作：提交、刷新、复制、删除、容器上传。

use super::diff::build_payload;
use super::entity::Entity;
use crate::bridge::protocol::{ContainerUpload, RecordTarget, RequestPayload, WriteRequest};
use crate::core::error::{BridgeResult, RecordError};
use crate::layout::response::WriteResponse;
use crate::layout::Layout;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// 宿主脚本及其参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

impl Script {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameter: None,
        }
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }
}

/// 提交时附带的脚本
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// 写入完成后运行
    pub after: Option<Script>,
    /// 处理请求之前运行
    pub prerequest: Option<Script>,
    /// 排序之前运行
    pub presort: Option<Script>,
}

impl CommitOptions {
    pub fn after(mut self, script: Script) -> Self {
        self.after = Some(script);
        self
    }

    pub fn prerequest(mut self, script: Script) -> Self {
        self.prerequest = Some(script);
        self
    }

    pub fn presort(mut self, script: Script) -> Self {
        self.presort = Some(script);
        self
    }

    fn apply(self, body: &mut WriteRequest) {
        if let Some(script) = self.after {
            body.script = Some(script.name);
            body.script_param = script.parameter;
        }
        if let Some(script) = self.prerequest {
            body.script_prerequest = Some(script.name);
            body.script_prerequest_param = script.parameter;
        }
        if let Some(script) = self.presort {
            body.script_presort = Some(script.name);
            body.script_presort_param = script.parameter;
        }
    }
}

/// 布局上的一条记录
#[derive(Debug, Clone)]
pub struct Record {
    layout: Layout,
    entity: Entity,
}

impl Record {
    pub(crate) fn new(layout: Layout, entity: Entity) -> Self {
        Self { layout, entity }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn into_entity(self) -> Entity {
        self.entity
    }

    /// 提交修改
    pub async fn commit(&mut self) -> BridgeResult<()> {
        self.commit_with(CommitOptions::default()).await
    }

    /// 提交修改并附带脚本
    ///
    /// 新记录发送全部字段并创建；已有记录只发送已编辑的字段。失败时脏标记
    /// 保持不变，重试会发送完全相同的差异。
    pub async fn commit_with(&mut self, options: CommitOptions) -> BridgeResult<()> {
        let mut plan = build_payload(&self.entity);
        options.apply(plan.body_mut());
        let creating = plan.is_create();
        let new_rows = plan.new_row_count();

        let response: WriteResponse = self
            .layout
            .bridge()
            .issue(plan.into_payload())
            .wait_as()
            .await?;
        let existing = (!creating).then(|| (self.entity.record_id(), self.entity.mod_id()));
        let outcome = response.into_outcome(existing)?;

        if outcome.new_portal_rows.len() < new_rows {
            tracing::debug!(
                target: "records",
                "Host assigned {} of {} new portal row id(s); refresh to load the rest",
                outcome.new_portal_rows.len(),
                new_rows
            );
        }
        self.entity.apply_commit(outcome);
        Ok(())
    }

    /// 从宿主重新读取，丢弃本地修改
    pub async fn refresh(&mut self) -> BridgeResult<()> {
        self.ensure_persisted()?;
        let fresh = self.layout.fetch_entity(self.entity.record_id()).await?;
        self.entity.replace_from(fresh);
        Ok(())
    }

    /// 在宿主复制记录，返回干净的本地副本
    pub async fn duplicate(&self) -> BridgeResult<Record> {
        self.ensure_persisted()?;
        let response: WriteResponse = self
            .layout
            .bridge()
            .issue(RequestPayload::DuplicateRecord(self.target()))
            .wait_as()
            .await?;
        let outcome = response.into_outcome(None)?;
        tracing::debug!(
            target: "records",
            "Record {} duplicated as {}",
            self.entity.record_id(),
            outcome.record_id
        );
        Ok(Record::new(
            self.layout.clone(),
            self.entity.clean_copy(outcome.record_id, outcome.mod_id),
        ))
    }

    /// 在宿主删除记录
    ///
    /// 消耗记录句柄；调用方应同时将其从持有的集合中移除。
    pub async fn delete(self) -> BridgeResult<()> {
        self.ensure_persisted()?;
        let response: WriteResponse = self
            .layout
            .bridge()
            .issue(RequestPayload::DeleteRecord(self.target()))
            .wait_as()
            .await?;
        response.check()?;
        tracing::debug!(target: "records", "Record {} deleted", self.entity.record_id());
        Ok(())
    }

    /// 上传文件到容器字段
    ///
    /// `data` 为 base64 编码的文件内容。成功后只同步宿主返回的 modId，
    /// 本地的其他修改保持待提交。
    pub async fn upload_container(
        &mut self,
        field: &str,
        file_name: impl Into<String>,
        data: impl Into<String>,
    ) -> BridgeResult<()> {
        self.ensure_persisted()?;
        if !self.entity.fields().contains(field) {
            return Err(RecordError::UnknownField {
                field: field.to_string(),
            }
            .into());
        }

        let record_id = self.entity.record_id();
        let mod_id = self.entity.mod_id();
        let upload = ContainerUpload {
            layout: self.layout.name().to_string(),
            record_id,
            mod_id,
            field_name: field.to_string(),
            file_name: file_name.into(),
            data: data.into(),
        };
        let response: WriteResponse = self
            .layout
            .bridge()
            .issue(RequestPayload::UploadContainer(upload))
            .wait_as()
            .await?;
        let outcome = response.into_outcome(Some((record_id, mod_id)))?;
        self.entity.set_mod_id(outcome.mod_id);
        tracing::debug!(
            target: "records",
            "Uploaded into {} of record {}, now at mod {}",
            field,
            record_id,
            outcome.mod_id
        );
        Ok(())
    }

    fn ensure_persisted(&self) -> BridgeResult<()> {
        if self.entity.is_new() {
            return Err(RecordError::NotPersisted.into());
        }
        Ok(())
    }

    fn target(&self) -> RecordTarget {
        RecordTarget {
            layout: self.layout.name().to_string(),
            record_id: self.entity.record_id(),
        }
    }
}

impl Deref for Record {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        &self.entity
    }
}

impl DerefMut for Record {
    fn deref_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }
}
