//! AIプロバイダ連携
//!
//! AI CLI（claude / codex / gemini）をプロセスとして呼び出し、
//! キーワード抽出とコード提案を行う。
//!
//! AIは補助情報なので、失敗・タイムアウト・未設定はいずれも
//! 「ヒントなし」「提案なし」として扱い、照合処理は止めない。

use crate::error::{ReconcileError, Result};
use async_trait::async_trait;
use clap::ValueEnum;
use opcode_reconcile_common::{
    build_keyword_prompt, build_suggestion_prompt, parse_keyword_response, parse_suggestion_response,
    HistoryEntry, KeywordHints, Suggestion,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    Claude,
    Codex,
    Gemini,
    /// AIを使わない
    None,
}

impl AiProvider {
    pub fn command_name(&self) -> Option<&'static str> {
        match self {
            AiProvider::Claude => Some("claude"),
            AiProvider::Codex => Some("codex"),
            AiProvider::Gemini => Some("gemini"),
            AiProvider::None => None,
        }
    }

    /// 非対話モードで1回だけ応答させる引数
    fn args(&self, prompt: &str) -> Vec<String> {
        match self {
            AiProvider::Claude => vec!["-p".into(), prompt.into(), "--output-format".into(), "text".into()],
            AiProvider::Codex => vec!["exec".into(), prompt.into()],
            AiProvider::Gemini => vec!["-p".into(), prompt.into()],
            AiProvider::None => Vec::new(),
        }
    }
}

impl std::fmt::Display for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command_name().unwrap_or("none"))
    }
}

/// 候補探索のためのAI補助
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// 明細説明の英訳とキーワード
    async fn extract_keywords(&self, text: &str) -> Result<KeywordHints>;

    /// 過去の連携履歴からのコード提案
    async fn suggest_candidates(
        &self,
        description: &str,
        internal_code: &str,
        history: &[HistoryEntry],
    ) -> Result<Vec<Suggestion>>;
}

/// AI CLIプロセスによる実装
pub struct CliProvider {
    provider: AiProvider,
    timeout: Duration,
}

impl CliProvider {
    pub fn new(provider: AiProvider, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    async fn run(&self, prompt: &str) -> Result<String> {
        let program = self
            .provider
            .command_name()
            .ok_or_else(|| ReconcileError::AiCall("AIプロバイダが設定されていません".into()))?;
        let args = self.provider.args(prompt);

        // Windowsではcmd /c経由
        #[cfg(windows)]
        let mut command = {
            let mut c = Command::new("cmd");
            c.arg("/c").arg(program).args(&args);
            c
        };

        #[cfg(not(windows))]
        let mut command = {
            let mut c = Command::new(program);
            c.args(&args);
            c
        };

        command.kill_on_drop(true);
        debug!(provider = %self.provider, prompt_len = prompt.len(), "AI CLI呼び出し");

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ReconcileError::AiCall(format!("{}秒でタイムアウトしました", self.timeout.as_secs())))?
            .map_err(|e| ReconcileError::AiCall(format!("{} CLI実行エラー: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReconcileError::AiCall(format!(
                "{} CLI failed (code {:?}): {}",
                program,
                output.status.code(),
                stderr.trim()
            )));
        }

        let response = String::from_utf8_lossy(&output.stdout).to_string();
        debug!(response_len = response.len(), "AI CLI応答");
        Ok(response)
    }
}

#[async_trait]
impl SuggestionProvider for CliProvider {
    async fn extract_keywords(&self, text: &str) -> Result<KeywordHints> {
        let response = self.run(&build_keyword_prompt(text)).await?;
        Ok(parse_keyword_response(&response)?)
    }

    async fn suggest_candidates(
        &self,
        description: &str,
        internal_code: &str,
        history: &[HistoryEntry],
    ) -> Result<Vec<Suggestion>> {
        let response = self
            .run(&build_suggestion_prompt(description, internal_code, history))
            .await?;
        Ok(parse_suggestion_response(&response)?)
    }
}

/// AIなし（常に空の結果）
pub struct NoopProvider;

#[async_trait]
impl SuggestionProvider for NoopProvider {
    async fn extract_keywords(&self, _text: &str) -> Result<KeywordHints> {
        Ok(KeywordHints::default())
    }

    async fn suggest_candidates(&self, _: &str, _: &str, _: &[HistoryEntry]) -> Result<Vec<Suggestion>> {
        Ok(Vec::new())
    }
}

/// 設定からプロバイダを生成
pub fn create_provider(provider: AiProvider, timeout_seconds: u64) -> Box<dyn SuggestionProvider> {
    match provider {
        AiProvider::None => Box::new(NoopProvider),
        p => Box::new(CliProvider::new(p, Duration::from_secs(timeout_seconds.max(1)))),
    }
}

/// キーワード抽出（失敗時は空のヒント）
pub async fn keyword_hints_or_empty(provider: &dyn SuggestionProvider, text: &str) -> KeywordHints {
    match provider.extract_keywords(text).await {
        Ok(hints) => hints,
        Err(e) => {
            warn!(error = %e, "キーワード抽出に失敗しました（ヒントなしで続行）");
            KeywordHints::default()
        }
    }
}

/// コード提案（失敗時は空）
pub async fn suggestions_or_empty(
    provider: &dyn SuggestionProvider,
    description: &str,
    internal_code: &str,
    history: &[HistoryEntry],
) -> Vec<Suggestion> {
    match provider.suggest_candidates(description, internal_code, history).await {
        Ok(suggestions) => suggestions,
        Err(e) => {
            warn!(error = %e, "コード提案に失敗しました（提案なしで続行）");
            Vec::new()
        }
    }
}
