//! 字段值与脏标记
//!
//! 每个字段都是 "值 + edited 标记" 的包装。字段集的形状在构造时确定
//! （来自宿主数据或布局元数据），之后只能修改已有字段的值。

use crate::core::error::{RecordError, RecordResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 字段值
///
/// 宿主的数据层只有文本和数字两种标量，空值序列化为 `null`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(serde_json::Number),
    Text(String),
    Empty,
}

impl FieldValue {
    /// 空文本值（新记录的字段骨架使用）
    pub fn blank() -> Self {
        Self::Text(String::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Empty => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Empty => None,
        }
    }

    /// 空值或空文本
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            Self::Number(_) => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
            Self::Empty => Ok(()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for FieldValue {
    /// 非有限浮点数（NaN/Inf）无法表示，转为空值
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(Self::Number)
            .unwrap_or(Self::Empty)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Empty)
    }
}

/// 带脏标记的字段
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub value: FieldValue,
    pub edited: bool,
}

impl Field {
    /// 干净字段（从宿主数据加载）
    pub fn clean(value: FieldValue) -> Self {
        Self {
            value,
            edited: false,
        }
    }
}

/// 固定形状的字段集
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    fields: BTreeMap<String, Field>,
}

impl FieldSet {
    /// 从宿主数据构造，所有字段都是干净的
    pub fn hydrate<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        Self {
            fields: values
                .into_iter()
                .map(|(name, value)| (name.into(), Field::clean(value)))
                .collect(),
        }
    }

    /// 按字段名构造空骨架
    pub fn skeleton<I, K>(names: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::hydrate(names.into_iter().map(|name| (name, FieldValue::blank())))
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).map(|field| &field.value)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// 修改字段值并标记为已编辑
    ///
    /// 写入与原值相同的值也会标记，提交时照常发送。
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> RecordResult<()> {
        let field = self
            .fields
            .get_mut(name)
            .ok_or_else(|| RecordError::UnknownField {
                field: name.to_string(),
            })?;
        field.value = value.into();
        field.edited = true;
        Ok(())
    }

    pub fn is_edited(&self, name: &str) -> bool {
        self.fields.get(name).map_or(false, |field| field.edited)
    }

    pub fn any_edited(&self) -> bool {
        self.fields.values().any(|field| field.edited)
    }

    /// 已编辑的字段
    pub fn edited(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields
            .iter()
            .filter(|(_, field)| field.edited)
            .map(|(name, field)| (name.as_str(), &field.value))
    }

    /// 全部字段
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields
            .iter()
            .map(|(name, field)| (name.as_str(), &field.value))
    }

    /// 只含已编辑字段的值映射
    pub fn edited_values(&self) -> BTreeMap<String, FieldValue> {
        self.edited()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    /// 全部字段的值映射
    pub fn snapshot(&self) -> BTreeMap<String, FieldValue> {
        self.iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 清除所有编辑标记（提交成功后调用）
    pub fn clear_edits(&mut self) {
        for field in self.fields.values_mut() {
            field.edited = false;
        }
    }

    /// 用宿主数据覆盖值并清除编辑标记
    ///
    /// 宿主返回了本地没有的字段时加入字段集。
    pub fn replace_all<I, K>(&mut self, values: I)
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        for (name, value) in values {
            self.fields.insert(name.into(), Field::clean(value));
        }
        self.clear_edits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_value_untagged() {
        let values: Vec<FieldValue> =
            serde_json::from_value(json!([1, 2.5, "text", null])).unwrap();
        assert_eq!(values[0], FieldValue::from(1));
        assert_eq!(values[1].as_f64(), Some(2.5));
        assert_eq!(values[2], FieldValue::from("text"));
        assert_eq!(values[3], FieldValue::Empty);
        assert_eq!(serde_json::to_value(&values).unwrap(), json!([1, 2.5, "text", null]));
    }

    #[test]
    fn test_field_value_conversions() {
        assert_eq!(FieldValue::from("42").as_i64(), Some(42));
        assert_eq!(FieldValue::from(f64::NAN), FieldValue::Empty);
        assert_eq!(FieldValue::from(None::<i64>), FieldValue::Empty);
        assert_eq!(FieldValue::from(7).to_string(), "7");
        assert!(FieldValue::blank().is_empty());
    }

    #[test]
    fn test_hydrate_is_clean() {
        let set = FieldSet::hydrate([("a", FieldValue::from(1)), ("b", FieldValue::from(2))]);
        assert!(!set.any_edited());
        assert_eq!(set.edited().count(), 0);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_set_marks_edited() {
        let mut set = FieldSet::hydrate([("a", FieldValue::from(1)), ("b", FieldValue::from(2))]);
        set.set("a", 5).unwrap();
        assert!(set.is_edited("a"));
        assert!(!set.is_edited("b"));
        assert_eq!(set.edited_values().len(), 1);
        assert_eq!(set.get("a"), Some(&FieldValue::from(5)));
    }

    #[test]
    fn test_same_value_still_edited() {
        let mut set = FieldSet::hydrate([("a", FieldValue::from("x"))]);
        set.set("a", "x").unwrap();
        assert!(set.is_edited("a"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut set = FieldSet::skeleton(["a"]);
        let err = set.set("zzz", 1).unwrap_err();
        assert_eq!(
            err,
            RecordError::UnknownField {
                field: "zzz".to_string()
            }
        );
        assert!(!set.contains("zzz"));
    }

    #[test]
    fn test_clear_edits() {
        let mut set = FieldSet::skeleton(["a", "b"]);
        set.set("a", "1").unwrap();
        set.set("b", "2").unwrap();
        set.clear_edits();
        assert!(!set.any_edited());
        assert_eq!(set.get("b"), Some(&FieldValue::from("2")));
    }

    #[test]
    fn test_replace_all_adds_and_cleans() {
        let mut set = FieldSet::skeleton(["a"]);
        set.set("a", "local").unwrap();
        set.replace_all([("a", FieldValue::from("remote")), ("c", FieldValue::from(3))]);
        assert!(!set.any_edited());
        assert_eq!(set.get("a"), Some(&FieldValue::from("remote")));
        assert!(set.contains("c"));
    }
}
