use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("未対応のファイル形式です: {0}（csv / xlsx / xls）")]
    UnsupportedFormat(String),

    #[error("オーダーが見つかりません: {0}")]
    OrderNotFound(String),

    #[error("マスタ行が見つかりません: {0}")]
    EntryNotFound(String),

    #[error("ストアエラー: {0}")]
    Store(String),

    #[error("AI呼び出しエラー: {0}")]
    AiCall(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV読み込みエラー: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel読み込みエラー: {0}")]
    ExcelRead(#[from] calamine::Error),

    #[error("Excel生成エラー: {0}")]
    ExcelGeneration(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Common(#[from] opcode_reconcile_common::Error),
}

impl ReconcileError {
    /// 一括連携の永続化失敗で未連携のまま残った明細数
    pub fn affected_items(&self) -> Option<usize> {
        match self {
            ReconcileError::Common(opcode_reconcile_common::Error::Persistence { affected, .. }) => Some(*affected),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
