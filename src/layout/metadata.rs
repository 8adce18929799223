//! 布局与数据库元数据
//!
//! 元数据在第一次获取后缓存，只有显式清除才会失效。新建记录和新建门户行的
//! 字段骨架都来自这里。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// 单个字段的元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMeta {
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub display_type: String,
    #[serde(default)]
    pub result: String,
    /// 其余宿主提供的属性原样保留
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// 布局元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutMetadata {
    #[serde(default)]
    pub field_meta_data: Vec<FieldMeta>,
    #[serde(default)]
    pub portal_meta_data: BTreeMap<String, Vec<FieldMeta>>,
}

impl LayoutMetadata {
    pub fn field_names(&self) -> Vec<String> {
        self.field_meta_data.iter().map(|f| f.name.clone()).collect()
    }

    pub fn portal_names(&self) -> impl Iterator<Item = &str> {
        self.portal_meta_data.keys().map(String::as_str)
    }

    /// 门户行的字段名；未知门户返回空
    pub fn portal_field_names(&self, portal: &str) -> Vec<String> {
        self.portal_meta_data
            .get(portal)
            .map(|fields| fields.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.field_meta_data.iter().find(|f| f.name == name)
    }
}

/// 数据库中的布局条目，文件夹条目包含子条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutEntry {
    pub name: String,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub folder_layout_names: Vec<LayoutEntry>,
}

/// 数据库元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    #[serde(default)]
    pub layouts: Vec<LayoutEntry>,
}

impl DatabaseMetadata {
    /// 展开文件夹后的全部布局名（深度优先，保持宿主顺序）
    pub fn layout_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_names(&self.layouts, &mut names);
        names
    }
}

fn collect_names(entries: &[LayoutEntry], out: &mut Vec<String>) {
    for entry in entries {
        if entry.is_folder || !entry.folder_layout_names.is_empty() {
            collect_names(&entry.folder_layout_names, out);
        } else {
            out.push(entry.name.clone());
        }
    }
}

/// 按布局名缓存的元数据
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: Mutex<HashMap<String, Arc<LayoutMetadata>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<LayoutMetadata>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, layout: &str) -> Option<Arc<LayoutMetadata>> {
        self.lock().get(layout).cloned()
    }

    /// 写入缓存；已有条目时保留先到的那份
    pub fn insert(&self, layout: &str, metadata: LayoutMetadata) -> Arc<LayoutMetadata> {
        self.lock()
            .entry(layout.to_string())
            .or_insert_with(|| Arc::new(metadata))
            .clone()
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        tracing::debug!(target: "layout", "Clearing {} cached layout(s)", entries.len());
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_layout_metadata_parsing() {
        let meta: LayoutMetadata = serde_json::from_value(json!({
            "fieldMetaData": [
                { "name": "Name", "type": "normal", "result": "text", "maxRepeat": 1 },
                { "name": "Age", "type": "normal", "result": "number" }
            ],
            "portalMetaData": {
                "Items": [{ "name": "Items::qty" }, { "name": "Items::sku" }]
            }
        }))
        .unwrap();

        assert_eq!(meta.field_names(), vec!["Name", "Age"]);
        assert_eq!(meta.portal_field_names("Items"), vec!["Items::qty", "Items::sku"]);
        assert!(meta.portal_field_names("Nope").is_empty());
        assert_eq!(meta.field("Name").unwrap().extra.get("maxRepeat"), Some(&json!(1)));
    }

    #[test]
    fn test_layout_names_flatten_folders() {
        let meta: DatabaseMetadata = serde_json::from_value(json!({
            "layouts": [
                { "name": "Contacts" },
                { "name": "Admin", "isFolder": true, "folderLayoutNames": [
                    { "name": "Users" },
                    { "name": "Nested", "isFolder": true, "folderLayoutNames": [{ "name": "Audit" }] }
                ]},
                { "name": "Orders" }
            ]
        }))
        .unwrap();
        assert_eq!(meta.layout_names(), vec!["Contacts", "Users", "Audit", "Orders"]);
    }

    #[test]
    fn test_cache_insert_get_clear() {
        let cache = MetadataCache::new();
        assert!(cache.get("Contacts").is_none());

        let stored = cache.insert("Contacts", LayoutMetadata::default());
        assert!(Arc::ptr_eq(&stored, &cache.get("Contacts").unwrap()));

        let again = cache.insert("Contacts", LayoutMetadata::default());
        assert!(Arc::ptr_eq(&stored, &again));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
