use crate::ai_provider::AiProvider;
use crate::error::{ReconcileError, Result};
use opcode_reconcile_common::matcher::{DEFAULT_LISTING_LIMIT, DEFAULT_RANKING_LIMIT};
use opcode_reconcile_common::{default_classification_rules, AdmissionRule, ClassificationRule, RuleSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// データディレクトリを上書きする環境変数
pub const DATA_DIR_ENV: &str = "OPCODE_RECONCILE_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// catalog.json / orders.json / links.json の置き場所
    pub data_dir: Option<PathBuf>,
    pub ai_provider: AiProvider,
    pub ai_timeout_seconds: u64,
    /// 一覧モードの最大件数
    pub listing_limit: usize,
    /// スコア順モードの最大件数
    pub ranking_limit: usize,
    pub admission_rules: Vec<AdmissionRule>,
    pub classification_rules: Vec<ClassificationRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// 指定パスから読み込み（ファイルがなければ既定値）
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default_config())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ReconcileError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("opcode-reconcile").join("config.json"))
    }

    fn default_config() -> Self {
        Self {
            data_dir: None,
            ai_provider: AiProvider::Claude,
            ai_timeout_seconds: 120,
            listing_limit: DEFAULT_LISTING_LIMIT,
            ranking_limit: DEFAULT_RANKING_LIMIT,
            admission_rules: vec![AdmissionRule {
                id: 1,
                name: "全明細（オープン）".into(),
                active: true,
                ..Default::default()
            }],
            classification_rules: default_classification_rules(),
        }
    }

    /// データディレクトリ（環境変数 → 設定値 → OS既定）
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }

        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }

        let base = dirs::data_dir()
            .ok_or_else(|| ReconcileError::Config("データディレクトリが見つかりません".into()))?;
        Ok(base.join("opcode-reconcile"))
    }

    /// 対象判定ルール（有効ルールは常に1件）
    pub fn rule_set(&self) -> RuleSet {
        RuleSet::new(self.admission_rules.clone())
    }

    pub fn set_rule_set(&mut self, rules: RuleSet) {
        self.admission_rules = rules.into_rules();
    }
}
