//! JSONディレクトリストア
//!
//! データディレクトリ配下の3ファイルで全ストアを実装する:
//! - catalog.json: ファクトリーコードマスタ
//! - orders.json: 整備オーダー（連携状態を含む）
//! - links.json: 連携の追記ログ（提案用の履歴にも使う）

use super::{CatalogStore, DateRange, LinkPersistence, OrderStore};
use crate::error::{ReconcileError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opcode_reconcile_common::text::normalize;
use opcode_reconcile_common::{BatchLinkItem, CatalogEntry, HistoryEntry, LinkBinding, OperationKind, ServiceOrder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

const CATALOG_FILE: &str = "catalog.json";
const ORDERS_FILE: &str = "orders.json";
const LINKS_FILE: &str = "links.json";

/// 連携ログの1行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub order_number: Option<String>,
    pub internal_code: String,
    /// 明細側の説明
    #[serde(default)]
    pub item_description: String,
    pub factory_code: String,
    pub kind: OperationKind,
    /// マスタ側の説明
    #[serde(default)]
    pub factory_description: String,
}

pub struct JsonStore {
    dir: PathBuf,
    // 読み込み→書き込みの間に他の書き込みが割り込まないようにする
    lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_json<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Ok(T::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{}.tmp", name));
        let content = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(file = %path.display(), "保存しました");
        Ok(())
    }

    /// オーダーを保存（同じIDは置き換え、新規は追加）
    pub async fn save_orders(&self, orders: &[ServiceOrder]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut stored: Vec<ServiceOrder> = self.read_json(ORDERS_FILE).await?;

        for order in orders {
            match stored.iter_mut().find(|o| o.id == order.id) {
                Some(existing) => *existing = order.clone(),
                None => stored.push(order.clone()),
            }
        }

        self.write_json(ORDERS_FILE, &stored).await
    }

    /// 連携ログ全件
    pub async fn link_log(&self) -> Result<Vec<LinkRecord>> {
        self.read_json(LINKS_FILE).await
    }

    /// 同じ社内コードの過去の連携（新しい順）
    pub async fn link_history(&self, internal_code: &str) -> Result<Vec<HistoryEntry>> {
        let code = normalize(internal_code);
        let log = self.link_log().await?;
        Ok(log
            .into_iter()
            .rev()
            .filter(|r| normalize(&r.internal_code) == code)
            .map(|r| HistoryEntry {
                internal_code: r.internal_code,
                description: r.item_description,
                factory_code: r.factory_code,
                factory_description: r.factory_description,
            })
            .collect())
    }

    async fn append_links(&self, records: Vec<LinkRecord>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut log: Vec<LinkRecord> = self.read_json(LINKS_FILE).await?;
        log.extend(records);
        self.write_json(LINKS_FILE, &log).await
    }
}

#[async_trait]
impl CatalogStore for JsonStore {
    async fn list(&self) -> Result<Vec<CatalogEntry>> {
        let entries: Vec<CatalogEntry> = self.read_json(CATALOG_FILE).await?;
        debug!(count = entries.len(), "マスタ読み込み");
        Ok(entries)
    }

    async fn create(&self, mut entry: CatalogEntry) -> Result<CatalogEntry> {
        let _guard = self.lock.lock().await;
        let mut entries: Vec<CatalogEntry> = self.read_json(CATALOG_FILE).await?;
        entry.id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        entries.push(entry.clone());
        self.write_json(CATALOG_FILE, &entries).await?;
        Ok(entry)
    }

    async fn delete(&self, id: u64) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries: Vec<CatalogEntry> = self.read_json(CATALOG_FILE).await?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Err(ReconcileError::EntryNotFound(id.to_string()));
        }
        self.write_json(CATALOG_FILE, &entries).await?;
        info!(id, "マスタ行を削除しました");
        Ok(())
    }
}

#[async_trait]
impl OrderStore for JsonStore {
    async fn list_orders(&self, range: &DateRange, branch: Option<&str>) -> Result<Vec<ServiceOrder>> {
        let orders: Vec<ServiceOrder> = self.read_json(ORDERS_FILE).await?;
        let branch = branch.map(normalize);
        let filtered: Vec<ServiceOrder> = orders
            .into_iter()
            .filter(|o| range.contains(o.date))
            .filter(|o| branch.as_ref().map_or(true, |b| normalize(&o.branch) == *b))
            .collect();
        debug!(count = filtered.len(), "オーダー読み込み");
        Ok(filtered)
    }
}

impl LinkRecord {
    fn new(at: DateTime<Utc>, item: &BatchLinkItem, binding: &LinkBinding) -> Self {
        Self {
            at,
            order_number: Some(item.order_number.clone()),
            internal_code: item.internal_code.clone(),
            item_description: item.description.clone(),
            factory_code: binding.factory_code.clone(),
            kind: binding.kind,
            factory_description: binding.description.clone(),
        }
    }
}

#[async_trait]
impl LinkPersistence for JsonStore {
    async fn link_item(&self, item: &BatchLinkItem, binding: &LinkBinding) -> Result<()> {
        self.append_links(vec![LinkRecord::new(Utc::now(), item, binding)]).await
    }

    async fn link_batch(&self, items: &[BatchLinkItem], binding: &LinkBinding) -> Result<()> {
        let at = Utc::now();
        let records = items.iter().map(|item| LinkRecord::new(at, item, binding)).collect();
        self.append_links(records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_empty_directory_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("missing"));
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.list_orders(&DateRange::default(), None).await.unwrap().is_empty());
        assert!(store.link_log().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        let a = store
            .create(CatalogEntry {
                factory_code: "A".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let b = store
            .create(CatalogEntry {
                factory_code: "B".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        store.delete(1).await.unwrap();
        let entries = store.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].factory_code, "B");

        assert!(matches!(store.delete(1).await, Err(ReconcileError::EntryNotFound(_))));
    }

    #[tokio::test]
    async fn test_link_history_filters_by_code() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let items = vec![BatchLinkItem {
            order_number: "OT-1".into(),
            internal_code: "MO006".into(),
            description: "REVISION DE FRENOS".into(),
        }];
        let brake = LinkBinding {
            factory_code: "WSA3HAC02101GH00".into(),
            kind: OperationKind::Labor,
            description: "BRAKE SYSTEM CHECK".into(),
        };
        store.link_batch(&items, &brake).await.unwrap();

        let wash = BatchLinkItem {
            order_number: "OT-2".into(),
            internal_code: "MO001".into(),
            description: "LAVADO".into(),
        };
        let wash_binding = LinkBinding {
            factory_code: "X".into(),
            kind: OperationKind::Repair,
            description: "WASH".into(),
        };
        store.link_item(&wash, &wash_binding).await.unwrap();

        let history = store.link_history(" mo006").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].factory_code, "WSA3HAC02101GH00");
        assert_eq!(history[0].description, "REVISION DE FRENOS");
        assert_eq!(history[0].factory_description, "BRAKE SYSTEM CHECK");

        // 一括・単一どちらも明細側と紐付け側の両方を記録する
        let log = store.link_log().await.unwrap();
        assert_eq!(log.len(), 2);
        for record in &log {
            assert!(record.order_number.is_some());
            assert!(!record.item_description.is_empty());
            assert!(!record.factory_description.is_empty());
        }
        let single = log.iter().find(|r| r.internal_code == "MO001").unwrap();
        assert_eq!(single.order_number.as_deref(), Some("OT-2"));
        assert_eq!(single.item_description, "LAVADO");
        assert_eq!(single.factory_description, "WASH");
        assert_eq!(single.kind, OperationKind::Repair);
    }
}
