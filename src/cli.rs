use crate::ai_provider::AiProvider;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "opcode-reconcile")]
#[command(about = "整備オーダー明細とメーカー作業コードの照合ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// AIプロバイダ (claude/codex/gemini/none)、省略時は設定値
    #[arg(long, global = true)]
    pub ai_provider: Option<AiProvider>,

    /// データディレクトリ、省略時は設定値
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

/// オーダー絞込み条件
#[derive(clap::Args, Clone, Debug, Default)]
pub struct OrderFilter {
    /// 開始日 (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// 終了日 (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// 拠点
    #[arg(long)]
    pub branch: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// マスタファイル（CSV/Excel）を取り込む
    Import {
        /// 取込ファイル
        #[arg(required = true)]
        file: PathBuf,

        /// シリーズ列がない場合の既定シリーズ
        #[arg(short, long)]
        series: Option<String>,
    },

    /// マスタの表示・削除
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// 未連携明細を車種・年式でグループ表示
    Groups {
        #[command(flatten)]
        filter: OrderFilter,

        /// Excelに出力
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// 明細の候補コードを探す
    Suggest {
        /// オーダー番号
        #[arg(required = true)]
        order: String,

        /// 明細位置（0始まり）
        #[arg(required = true)]
        item: usize,

        /// 一覧モードの検索語
        #[arg(short, long, default_value = "")]
        search: String,

        /// 連携履歴からAI提案も取得
        #[arg(long)]
        history: bool,
    },

    /// 1明細を連携
    Link {
        /// オーダー番号
        #[arg(required = true)]
        order: String,

        /// 明細位置（0始まり）
        #[arg(required = true)]
        item: usize,

        /// ファクトリーコード
        #[arg(short, long, required = true)]
        code: String,

        /// 別シリーズの行しかない場合の確認を省略
        #[arg(short, long)]
        yes: bool,
    },

    /// グループ内の未連携明細を一括連携
    LinkGroup {
        /// グループキー（例: "SONG PLUS 2025"）
        #[arg(required = true)]
        group: String,

        /// ファクトリーコード
        #[arg(short, long, required = true)]
        code: String,

        /// 確認を省略
        #[arg(short, long)]
        yes: bool,

        #[command(flatten)]
        filter: OrderFilter,
    },

    /// 送信前チェック
    Check {
        /// オーダー番号（省略時は全オーダー）
        order: Option<String>,
    },

    /// 連携状況の集計
    Stats {
        #[command(flatten)]
        filter: OrderFilter,
    },

    /// 対象判定ルールの管理
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// 設定を表示/編集
    Config {
        /// 設定を表示
        #[arg(long)]
        show: bool,

        /// データディレクトリを設定
        #[arg(long)]
        set_data_dir: Option<PathBuf>,

        /// AIプロバイダを設定
        #[arg(long)]
        set_ai_provider: Option<AiProvider>,
    },
}

#[derive(Subcommand)]
pub enum CatalogAction {
    /// マスタ一覧
    List {
        /// シリーズ文脈で絞込み
        #[arg(short, long)]
        series: Option<String>,

        /// 説明・コードの検索語
        #[arg(long, default_value = "")]
        search: String,
    },

    /// マスタ行を削除
    Delete {
        #[arg(required = true)]
        id: u64,
    },
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// ルール一覧
    List,

    /// ルールを有効化
    Activate {
        #[arg(required = true)]
        id: u64,
    },

    /// ルールを削除
    Remove {
        #[arg(required = true)]
        id: u64,
    },

    /// ルールを追加
    Add {
        /// ルール名
        #[arg(required = true)]
        name: String,

        /// プレースホルダーコード（カンマ区切り）
        #[arg(long, value_delimiter = ',')]
        codes: Vec<String>,

        /// 取込時の既定カテゴリ
        #[arg(long)]
        category: Option<String>,

        /// 取込時の既定作業時間
        #[arg(long)]
        hours: Option<f64>,

        /// 追加と同時に有効化
        #[arg(long)]
        activate: bool,
    },
}
