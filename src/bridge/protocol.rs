//! Request Protocol
//!
//! Closed set of request kinds the bridge can send to the host. Every
//! outbound request is one of these tagged variants; the host boundary
//! never sees free-form JSON built elsewhere in the crate.

use crate::bridge::pending::RequestId;
use crate::records::field::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Requests sent from the bridge to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RequestPayload {
    // Metadata
    GetDbMetadata,
    GetLayoutMetadata(LayoutTarget),

    // Scripts
    RunScript(RunScriptRequest),

    // Reads
    GetRecordRange(ReadRequest),
    FindRecord(ReadRequest),
    GetRecord(RecordTarget),

    // Writes
    CreateRecord(WriteRequest),
    ModifyRecord(WriteRequest),
    DuplicateRecord(RecordTarget),
    DeleteRecord(RecordTarget),
    UploadContainer(ContainerUpload),
}

impl RequestPayload {
    /// Short name used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GetDbMetadata => "getDbMetadata",
            Self::GetLayoutMetadata(_) => "getLayoutMetadata",
            Self::RunScript(_) => "runScript",
            Self::GetRecordRange(_) => "getRecordRange",
            Self::FindRecord(_) => "findRecord",
            Self::GetRecord(_) => "getRecord",
            Self::CreateRecord(_) => "createRecord",
            Self::ModifyRecord(_) => "modifyRecord",
            Self::DuplicateRecord(_) => "duplicateRecord",
            Self::DeleteRecord(_) => "deleteRecord",
            Self::UploadContainer(_) => "uploadContainer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutTarget {
    pub layout: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTarget {
    pub layout: String,
    pub record_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunScriptRequest {
    pub layout: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

/// Range read or find request
///
/// `offset` is 1-based: offset 1 starts at the first record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRequest {
    pub layout: String,
    pub offset: u32,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub portals: Vec<PortalWindow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascend,
    Descend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub field_name: String,
    pub sort_order: SortOrder,
}

/// Which slice of a portal to return with each record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalWindow {
    pub name: String,
    pub offset: u32,
    pub limit: u32,
}

/// File upload into a container field of an existing record
///
/// `data` carries the file content base64-encoded; the host decodes it into
/// the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerUpload {
    pub layout: String,
    pub record_id: i64,
    pub mod_id: i64,
    pub field_name: String,
    pub file_name: String,
    pub data: String,
}

/// Create or modify body
///
/// `record_id`/`mod_id` are only present on modify. Script hooks use the
/// host's dotted key names.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    pub layout: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_id: Option<i64>,
    pub field_data: BTreeMap<String, FieldValue>,
    pub portal_data: BTreeMap<String, Vec<PortalRowPayload>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(
        rename = "script.param",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub script_param: Option<String>,
    #[serde(
        rename = "script.prerequest",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub script_prerequest: Option<String>,
    #[serde(
        rename = "script.prerequest.param",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub script_prerequest_param: Option<String>,
    #[serde(
        rename = "script.presort",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub script_presort: Option<String>,
    #[serde(
        rename = "script.presort.param",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub script_presort_param: Option<String>,
}

/// One portal row inside `portalData`
///
/// Existing rows carry their identity; new rows carry only field values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalRowPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_id: Option<i64>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

/// A request as it appears inside the outbound envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundRequest {
    pub id: RequestId,
    #[serde(flatten)]
    pub payload: RequestPayload,
}

/// Single string parameter handed to the host script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    pub token: String,
    pub requests: Vec<OutboundRequest>,
}
