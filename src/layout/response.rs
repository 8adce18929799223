//! 宿主响应结构
//!
//! 宿主对数值字段并不一致：id 和错误码有时是数字，有时是字符串。
//! 这里统一用宽松解析，之后的代码只接触 `i64`。

use crate::core::error::{BridgeError, BridgeResult, HostError};
use crate::layout::metadata::LayoutMetadata;
use crate::records::entity::{CommitOutcome, Entity};
use crate::records::field::{FieldSet, FieldValue};
use crate::records::portal::{Portal, PortalRow};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) if s.trim().is_empty() => Some(0),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_i64(&value)
        .ok_or_else(|| de::Error::custom(format!("expected an integer, got {}", value)))
}

fn lenient_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    value_to_i64(&value)
        .map(Some)
        .ok_or_else(|| de::Error::custom(format!("expected an integer, got {}", value)))
}

/// 宿主消息
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiMessage {
    #[serde(deserialize_with = "lenient_i64")]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// 数据层响应外壳：`{ messages: [...], response: {...} }`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub messages: Vec<ApiMessage>,
    pub response: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// 第一条非零消息（宿主报告的错误）
    pub fn error(&self) -> Option<HostError> {
        self.messages
            .iter()
            .find(|message| message.code != 0)
            .map(|message| HostError::new(message.code, message.message.clone()))
    }

    /// 成功时返回响应体
    pub fn into_result(self) -> BridgeResult<T> {
        if let Some(err) = self.error() {
            return Err(err.into());
        }
        self.response
            .ok_or_else(|| BridgeError::Protocol("response body is missing".to_string()))
    }
}

/// 一条记录数据
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordData {
    #[serde(deserialize_with = "lenient_i64")]
    pub record_id: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub mod_id: i64,
    #[serde(default)]
    pub field_data: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub portal_data: BTreeMap<String, Vec<BTreeMap<String, Value>>>,
}

impl RecordData {
    /// 转换为干净的实体
    ///
    /// 门户行的 `recordId`/`modId` 从字段中剥离。元数据里有但响应中没有的门户
    /// 以空门户出现，以便直接新建行。
    pub fn into_entity(self, layout: &str, metadata: Option<&LayoutMetadata>) -> BridgeResult<Entity> {
        let mut portals: BTreeMap<String, Portal> = BTreeMap::new();

        for (name, rows) in self.portal_data {
            let rows = rows
                .into_iter()
                .map(portal_row)
                .collect::<BridgeResult<Vec<_>>>()?;
            let skeleton = metadata
                .map(|meta| meta.portal_field_names(&name))
                .unwrap_or_default();
            portals.insert(name.clone(), Portal::with_rows(name, skeleton, rows));
        }
        if let Some(meta) = metadata {
            for name in meta.portal_names() {
                if !portals.contains_key(name) {
                    portals.insert(
                        name.to_string(),
                        Portal::new(name, meta.portal_field_names(name)),
                    );
                }
            }
        }

        Ok(Entity::hydrate(
            layout,
            self.record_id,
            self.mod_id,
            FieldSet::hydrate(self.field_data),
            portals.into_values().collect(),
        ))
    }
}

fn portal_row(mut raw: BTreeMap<String, Value>) -> BridgeResult<PortalRow> {
    let mut take_id = |key: &str| -> BridgeResult<i64> {
        let value = raw
            .remove(key)
            .ok_or_else(|| BridgeError::Protocol(format!("portal row is missing {}", key)))?;
        value_to_i64(&value)
            .ok_or_else(|| BridgeError::Protocol(format!("portal row has invalid {}: {}", key, value)))
    };
    let record_id = take_id("recordId")?;
    let mod_id = take_id("modId")?;

    let fields = raw
        .into_iter()
        .map(|(name, value)| -> BridgeResult<(String, FieldValue)> {
            Ok((name, serde_json::from_value(value)?))
        })
        .collect::<BridgeResult<Vec<_>>>()?;
    Ok(PortalRow::hydrate(record_id, mod_id, FieldSet::hydrate(fields)))
}

/// 读取/查找的响应体
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordResponse {
    #[serde(default)]
    pub data: Vec<RecordData>,
}

/// 新建门户行被分配的身份
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPortalRecord {
    #[serde(deserialize_with = "lenient_i64")]
    pub record_id: i64,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub mod_id: Option<i64>,
}

/// 写入（新建/修改/复制/删除）的响应
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub error: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub record_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub mod_id: Option<i64>,
    #[serde(default)]
    pub new_portal_record_info: Vec<NewPortalRecord>,
}

impl WriteResponse {
    /// 宿主报告的错误（错误码 0 视为成功）
    pub fn check(&self) -> BridgeResult<()> {
        match self.error {
            Some(code) if code != 0 => Err(HostError::from_code(code).into()),
            _ => Ok(()),
        }
    }

    /// 转为提交结果
    ///
    /// 修改操作的响应可以省略 `recordId`/`modId`，此时沿用 `existing`。
    pub fn into_outcome(self, existing: Option<(i64, i64)>) -> BridgeResult<CommitOutcome> {
        self.check()?;
        let record_id = self
            .record_id
            .or(existing.map(|(id, _)| id))
            .ok_or_else(|| {
                BridgeError::Protocol("write response did not assign a record id".to_string())
            })?;
        Ok(CommitOutcome {
            record_id,
            mod_id: self
                .mod_id
                .or(existing.map(|(_, mod_id)| mod_id))
                .unwrap_or(0),
            new_portal_rows: self
                .new_portal_record_info
                .into_iter()
                .map(|row| (row.record_id, row.mod_id.unwrap_or(0)))
                .collect(),
        })
    }
}

/// 脚本执行结果
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptResponse {
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub script_error: Option<i64>,
    #[serde(default)]
    pub script_result: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_success_and_error() {
        let ok: ApiEnvelope<RecordResponse> = serde_json::from_value(json!({
            "messages": [{ "code": "0", "message": "OK" }],
            "response": { "data": [] }
        }))
        .unwrap();
        assert!(ok.into_result().unwrap().data.is_empty());

        let missing: ApiEnvelope<RecordResponse> = serde_json::from_value(json!({
            "messages": [{ "code": 401, "message": "" }]
        }))
        .unwrap();
        let err = missing.into_result().unwrap_err();
        assert_eq!(err.host_code(), Some(401));
    }

    fn decodable<T: serde::de::DeserializeOwned>() {}

    #[test]
    fn test_envelopes_decode_without_default_bodies() {
        decodable::<ApiEnvelope<RecordResponse>>();
        decodable::<ApiEnvelope<crate::layout::LayoutMetadata>>();
        decodable::<ApiEnvelope<crate::layout::DatabaseMetadata>>();

        let bare: ApiEnvelope<RecordResponse> = serde_json::from_value(json!({
            "messages": [{ "code": 0 }]
        }))
        .unwrap();
        assert!(bare.response.is_none());
    }

    #[test]
    fn test_envelope_without_body_is_protocol_error() {
        let empty: ApiEnvelope<RecordResponse> = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(empty.into_result(), Err(BridgeError::Protocol(_))));
    }

    #[test]
    fn test_record_data_to_entity() {
        let data: RecordData = serde_json::from_value(json!({
            "recordId": "12",
            "modId": 4,
            "fieldData": { "Name": "Ada", "Age": 36 },
            "portalData": {
                "Items": [{ "recordId": "3", "modId": "1", "Items::qty": 2 }]
            }
        }))
        .unwrap();

        let meta: LayoutMetadata = serde_json::from_value(json!({
            "fieldMetaData": [{ "name": "Name" }, { "name": "Age" }],
            "portalMetaData": {
                "Items": [{ "name": "Items::qty" }],
                "Notes": [{ "name": "Notes::text" }]
            }
        }))
        .unwrap();

        let entity = data.into_entity("Contacts", Some(&meta)).unwrap();
        assert_eq!(entity.record_id(), 12);
        assert_eq!(entity.mod_id(), 4);
        assert!(!entity.is_edited());
        assert_eq!(entity.get("Age"), Some(&FieldValue::from(36)));

        let items = entity.portal("Items").unwrap();
        let row = items.row(0).unwrap();
        assert_eq!(row.record_id(), 3);
        assert!(!row.fields().contains("recordId"));
        assert!(entity.portal("Notes").unwrap().is_empty());
    }

    #[test]
    fn test_portal_row_without_id_rejected() {
        let data: RecordData = serde_json::from_value(json!({
            "recordId": 1,
            "modId": 1,
            "portalData": { "Items": [{ "Items::qty": 2 }] }
        }))
        .unwrap();
        assert!(matches!(
            data.into_entity("Orders", None),
            Err(BridgeError::Protocol(_))
        ));
    }

    #[test]
    fn test_write_response() {
        let created: WriteResponse = serde_json::from_value(json!({
            "recordId": "40",
            "modId": "0",
            "newPortalRecordInfo": [{ "tableName": "Items", "recordId": "9", "modId": "0" }]
        }))
        .unwrap();
        let outcome = created.into_outcome(None).unwrap();
        assert_eq!(outcome.record_id, 40);
        assert_eq!(outcome.new_portal_rows, vec![(9, 0)]);

        let failed: WriteResponse = serde_json::from_value(json!({ "error": "301" })).unwrap();
        let err = failed.into_outcome(Some((1, 1))).unwrap_err();
        assert_eq!(err.host_code(), Some(301));

        let no_id: WriteResponse = serde_json::from_value(json!({ "error": 0 })).unwrap();
        assert!(no_id.clone().into_outcome(None).is_err());
        let kept = no_id.into_outcome(Some((5, 2))).unwrap();
        assert_eq!((kept.record_id, kept.mod_id), (5, 2));
    }

    #[test]
    fn test_script_response() {
        let response: ScriptResponse =
            serde_json::from_value(json!({ "scriptError": "0", "scriptResult": "done" })).unwrap();
        assert_eq!(response.script_error, Some(0));
        assert_eq!(response.script_result.as_deref(), Some("done"));
    }
}
