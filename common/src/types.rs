//! データモデル
//!
//! - CatalogEntry: メーカー作業コード（ファクトリーコード）マスタの1行
//! - ServiceOrder / OrderLineItem: 整備オーダーとその明細
//! - AdmissionRule / ClassificationRule: 対象判定・分類ルール
//! - KeywordHints / Suggestion: AIプロバイダの応答

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 作業区分
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    #[default]
    Labor,
    Repair,
}

impl OperationKind {
    /// 取込ファイルの表記から判定（"REP", "REPARACION", "Repair" → Repair）
    pub fn parse(value: &str) -> Self {
        let v = crate::text::normalize_header(value);
        if v.starts_with("REP") {
            OperationKind::Repair
        } else {
            OperationKind::Labor
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Labor => write!(f, "labor"),
            OperationKind::Repair => write!(f, "repair"),
        }
    }
}

impl std::str::FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "labor" | "l" | "mo" => Ok(OperationKind::Labor),
            "repair" | "r" | "rep" => Ok(OperationKind::Repair),
            _ => Err(format!("Unknown operation kind: {}. Use labor or repair", s)),
        }
    }
}

/// マスタ行の連携状態
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    #[default]
    Pending,
    Linked,
    Error,
}

/// ファクトリーコードマスタの1行
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(default)]
    pub id: u64,

    pub factory_code: String,

    #[serde(default)]
    pub kind: OperationKind,

    /// 対応する社内コード
    #[serde(default)]
    pub internal_code: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub series: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    /// 標準作業時間（h）
    #[serde(default)]
    pub standard_hours: Option<f64>,

    /// バッテリー・高電圧作業
    #[serde(default)]
    pub high_voltage: Option<bool>,

    #[serde(default)]
    pub status: LinkStatus,

    #[serde(default)]
    pub confidence: Option<f64>,
}

/// オーダー明細
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    pub internal_code: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub quantity: f64,

    #[serde(default)]
    pub unit_price: f64,

    #[serde(default)]
    pub total: f64,

    #[serde(default)]
    pub linked: bool,

    /// 連携先ファクトリーコード
    #[serde(default)]
    pub factory_code: Option<String>,

    #[serde(default)]
    pub factory_kind: Option<OperationKind>,

    /// 連携時点のマスタ説明（監査用スナップショット）
    #[serde(default)]
    pub factory_description: Option<String>,
}

impl OrderLineItem {
    pub fn new(internal_code: &str, description: &str, quantity: f64, unit_price: f64) -> Self {
        Self {
            internal_code: internal_code.to_string(),
            description: description.to_string(),
            quantity,
            unit_price,
            total: quantity * unit_price,
            ..Default::default()
        }
    }
}

/// オーダー状態
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    Pending,
    InProcess,
    Transmitted,
    Rejected,
    Completed,
    Error,
}

impl OrderStatus {
    /// 送信済み・完了は以降の連携作業の対象外
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Transmitted | OrderStatus::Completed)
    }
}

/// オーダーのイベントログ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// 整備オーダー
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOrder {
    pub id: u64,

    #[serde(default)]
    pub branch: String,

    #[serde(default)]
    pub document_type: String,

    pub order_number: String,

    #[serde(default)]
    pub date: NaiveDate,

    /// 車両識別子（VIN・登録番号）
    #[serde(default)]
    pub vehicle_id: String,

    #[serde(default)]
    pub model_code: Option<String>,

    #[serde(default)]
    pub model_description: Option<String>,

    #[serde(default)]
    pub year: Option<i32>,

    #[serde(default)]
    pub total: f64,

    #[serde(default)]
    pub status: OrderStatus,

    #[serde(default)]
    pub items: Vec<OrderLineItem>,

    #[serde(default)]
    pub events: Vec<OrderEvent>,
}

impl ServiceOrder {
    pub fn linked_count(&self) -> usize {
        self.items.iter().filter(|i| i.linked).count()
    }
}

/// 対象判定ルール（プレースホルダーコード定義）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRule {
    pub id: u64,
    pub name: String,

    #[serde(default)]
    pub active: bool,

    /// 必ず連携が必要な汎用社内コード
    #[serde(default)]
    pub placeholder_codes: Vec<String>,

    #[serde(default)]
    pub default_category: Option<String>,

    #[serde(default)]
    pub default_hours: Option<f64>,
}

/// 優先度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

/// キーワード分類ルール
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRule {
    pub id: u64,
    pub keyword: String,
    pub category: String,

    #[serde(default)]
    pub icon: String,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub color: String,
}

/// 分類結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub rule_id: u64,
    pub keyword: String,
    pub category: String,
    pub icon: String,
    pub priority: Priority,
    pub color: String,
}

impl From<&ClassificationRule> for Classification {
    fn from(rule: &ClassificationRule) -> Self {
        Self {
            rule_id: rule.id,
            keyword: rule.keyword.clone(),
            category: rule.category.clone(),
            icon: rule.icon.clone(),
            priority: rule.priority,
            color: rule.color.clone(),
        }
    }
}

/// AIキーワード抽出結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeywordHints {
    /// 説明文の英訳
    pub translation: String,
    pub keywords: Vec<String>,
}

impl KeywordHints {
    pub fn is_empty(&self) -> bool {
        self.keywords.iter().all(|k| k.trim().is_empty())
    }
}

/// AI候補提案
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Suggestion {
    pub factory_code: String,
    pub description: String,
    pub confidence: f64,
    pub reasoning: String,
}
