//! 照合エンジンが利用する外部ストア
//!
//! - CatalogStore: ファクトリーコードマスタ
//! - OrderStore: 整備オーダー
//! - LinkPersistence: 連携結果の書き込み先
//!
//! json モジュールにJSONディレクトリ実装がある。

pub mod json;

use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use opcode_reconcile_common::{BatchLinkItem, CatalogEntry, LinkBinding, ServiceOrder};

pub use json::{JsonStore, LinkRecord};

/// オーダー取得期間（両端含む、None は無制限）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list(&self) -> Result<Vec<CatalogEntry>>;

    /// 登録してIDを採番したマスタ行を返す
    async fn create(&self, entry: CatalogEntry) -> Result<CatalogEntry>;

    async fn delete(&self, id: u64) -> Result<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn list_orders(&self, range: &DateRange, branch: Option<&str>) -> Result<Vec<ServiceOrder>>;
}

/// 連携結果の書き込み先
///
/// binding にはファクトリーコード・作業区分・マスタ説明が入る。
/// 明細側（オーダー番号・社内コード・説明）と合わせて監査記録になる。
#[async_trait]
pub trait LinkPersistence: Send + Sync {
    async fn link_item(&self, item: &BatchLinkItem, binding: &LinkBinding) -> Result<()>;

    /// 一括連携（全件成功または全件失敗）
    async fn link_batch(&self, items: &[BatchLinkItem], binding: &LinkBinding) -> Result<()>;
}
