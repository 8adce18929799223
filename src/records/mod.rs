//! 记录与脏状态跟踪
//!
//! - [`field`]：字段值与 edited 标记
//! - [`portal`]：门户与门户行（嵌套实体）
//! - [`entity`]：记录的纯数据部分
//! - [`diff`]：最小提交载荷
//! - [`record`]：带布局句柄的记录，负责网络操作

pub mod diff;
pub mod entity;
pub mod field;
pub mod portal;
pub mod record;


/// 未持久化实体的哨兵身份
pub const NEW_RECORD_ID: i64 = -1;

pub use diff::{build_payload, CommitPlan};
pub use entity::{CommitOutcome, Entity};
pub use field::{Field, FieldSet, FieldValue};
pub use portal::{Portal, PortalRow, RowState};
pub use record::{CommitOptions, Record, Script};
