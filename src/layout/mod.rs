//! 布局句柄
//!
//! [`Layout`] 是面向单个布局的操作入口：元数据（带缓存）、运行脚本、
//! 读取单条记录、范围读取/查找、新建记录。

pub mod metadata;
pub mod query;
pub mod read;
pub mod response;

pub use metadata::{DatabaseMetadata, FieldMeta, LayoutEntry, LayoutMetadata, MetadataCache};
pub use query::{FindOperator, FindRequest, Query, QueryPart, TemporalKind};
pub use read::RecordQuery;
pub use response::{ApiEnvelope, RecordData, RecordResponse, ScriptResponse, WriteResponse};

use crate::bridge::protocol::{LayoutTarget, RecordTarget, RequestPayload, RunScriptRequest};
use crate::bridge::Bridge;
use crate::client::Client;
use crate::core::error::{BridgeResult, HostError};
use crate::records::{Entity, FieldSet, Portal, Record, Script};
use std::sync::Arc;

/// 宿主中“记录不存在”的错误码
const RECORD_MISSING: i64 = 101;

/// 脚本执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutcome {
    /// 脚本错误（错误码 0 表示成功）
    pub error: Option<HostError>,
    /// 脚本返回值
    pub result: Option<String>,
}

impl ScriptOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl From<ScriptResponse> for ScriptOutcome {
    fn from(response: ScriptResponse) -> Self {
        Self {
            error: response
                .script_error
                .filter(|code| *code != 0)
                .map(HostError::from_code),
            result: response.script_result,
        }
    }
}

/// 布局句柄
#[derive(Debug, Clone)]
pub struct Layout {
    client: Client,
    name: String,
}

impl Layout {
    pub(crate) fn new(client: Client, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn bridge(&self) -> &Bridge {
        self.client.bridge()
    }

    /// 布局元数据，首次获取后缓存
    pub async fn metadata(&self) -> BridgeResult<Arc<LayoutMetadata>> {
        let cache = self.client.metadata_cache();
        if let Some(cached) = cache.get(&self.name) {
            return Ok(cached);
        }

        let envelope: ApiEnvelope<LayoutMetadata> = self
            .bridge()
            .issue(RequestPayload::GetLayoutMetadata(LayoutTarget {
                layout: self.name.clone(),
            }))
            .wait_as()
            .await?;
        let metadata = envelope.into_result()?;
        tracing::debug!(
            target: "layout",
            "Cached metadata for {} ({} fields, {} portals)",
            self.name,
            metadata.field_meta_data.len(),
            metadata.portal_meta_data.len()
        );
        Ok(cache.insert(&self.name, metadata))
    }

    /// 在此布局的上下文中运行脚本
    pub async fn run_script(&self, script: &Script) -> BridgeResult<ScriptOutcome> {
        let response: ScriptResponse = self
            .bridge()
            .issue(RequestPayload::RunScript(RunScriptRequest {
                layout: self.name.clone(),
                name: script.name.clone(),
                parameter: script.parameter.clone(),
            }))
            .wait_as()
            .await?;
        let outcome = ScriptOutcome::from(response);
        if let Some(err) = &outcome.error {
            tracing::warn!(target: "layout", "Script {} failed: {}", script.name, err);
        }
        Ok(outcome)
    }

    /// 读取单条记录
    pub async fn get_record(&self, record_id: i64) -> BridgeResult<Record> {
        let entity = self.fetch_entity(record_id).await?;
        Ok(Record::new(self.clone(), entity))
    }

    pub(crate) async fn fetch_entity(&self, record_id: i64) -> BridgeResult<Entity> {
        let metadata = self.metadata().await?;
        let envelope: ApiEnvelope<RecordResponse> = self
            .bridge()
            .issue(RequestPayload::GetRecord(RecordTarget {
                layout: self.name.clone(),
                record_id,
            }))
            .wait_as()
            .await?;

        let data = envelope
            .into_result()?
            .data
            .into_iter()
            .next()
            .ok_or_else(|| HostError::from_code(RECORD_MISSING))?;
        data.into_entity(&self.name, Some(&metadata))
    }

    /// 范围读取（无查找条件）
    pub fn range(&self) -> RecordQuery {
        RecordQuery::new(self.clone())
    }

    /// 查找
    pub fn find(&self, request: FindRequest) -> RecordQuery {
        RecordQuery::new(self.clone()).request(request)
    }

    /// 新建本地记录，字段骨架来自元数据
    ///
    /// 记录使用哨兵身份，第一次 `commit` 时在宿主创建。
    pub async fn new_record(&self) -> BridgeResult<Record> {
        let metadata = self.metadata().await?;
        let portals = metadata
            .portal_names()
            .map(|name| Portal::new(name, metadata.portal_field_names(name)))
            .collect();
        let entity = Entity::new(
            self.name.clone(),
            FieldSet::skeleton(metadata.field_names()),
            portals,
        );
        Ok(Record::new(self.clone(), entity))
    }
}
