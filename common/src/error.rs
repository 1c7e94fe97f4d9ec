//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// 取込ファイルで必須列が特定できない
    #[error("Column detection error: no column found for '{field}' (headers: {headers:?})")]
    ColumnDetection { field: String, headers: Vec<String> },

    /// 未連携の必須プレースホルダーが残っている
    #[error("Transmission blocked for order {order_number}: unresolved placeholder codes {codes:?}")]
    ValidationBlocked {
        order_number: String,
        codes: Vec<String>,
    },

    /// 連携先の永続化に失敗（ローカル状態は未変更）
    #[error("Persistence error ({affected} items not linked): {message}")]
    Persistence { affected: usize, message: String },

    #[error("Admission rule not found: {0}")]
    RuleNotFound(u64),

    #[error("Order {0} cannot be transmitted: no linked items or already transmitted")]
    NotTransmittable(String),

    /// 送信済み・完了オーダーへの連携
    #[error("Order {0} is closed for linking (transmitted or completed)")]
    OrderClosed(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
