//! AIプロバイダ向けプロンプト生成
//!
//! - build_keyword_prompt: 明細説明からの英訳・キーワード抽出用
//! - build_suggestion_prompt: 過去の連携履歴を添えたファクトリーコード提案用

use serde::{Deserialize, Serialize};

/// 抽出キーワードの最大数
pub const MAX_KEYWORDS: usize = 8;

/// 過去の連携履歴1件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryEntry {
    pub internal_code: String,
    pub description: String,
    pub factory_code: String,
    pub factory_description: String,
}

/// キーワード抽出プロンプト
///
/// 明細説明（主にスペイン語）を英訳し、マスタ照合用の英単語キーワードを返させる。
pub fn build_keyword_prompt(description: &str) -> String {
    format!(
        r#"You are a service advisor at a vehicle dealership. Translate the following repair order line description to English and extract the technical keywords that would appear in a manufacturer labor operation catalog.

Description: "{description}"

Rules:
- Keywords must be single uppercase English words (e.g. BRAKE, PAD, INSPECTION)
- At most {max} keywords, most specific first
- Do not include vehicle model names

Output ONLY this JSON object:
{{"translation": "english translation", "keywords": ["KEYWORD1", "KEYWORD2"]}}
"#,
        description = description.trim(),
        max = MAX_KEYWORDS,
    )
}

/// ファクトリーコード提案プロンプト
///
/// # Arguments
/// * `description` - 明細の説明
/// * `internal_code` - 明細の社内コード
/// * `history` - 同じ社内コード・類似説明の過去の連携
pub fn build_suggestion_prompt(description: &str, internal_code: &str, history: &[HistoryEntry]) -> String {
    let history_list = if history.is_empty() {
        "(none)".to_string()
    } else {
        history
            .iter()
            .map(|h| {
                format!(
                    "- {} \"{}\" -> {} \"{}\"",
                    h.internal_code, h.description, h.factory_code, h.factory_description
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You reconcile dealership internal operation codes with manufacturer factory codes.

## Line item
- Internal code: {internal_code}
- Description: "{description}"

## Previous confirmed links
{history_list}

Suggest the most likely factory codes, based only on the previous links above.

Output ONLY a JSON array:
[
  {{"factoryCode": "CODE", "description": "catalog description", "confidence": 0.0-1.0, "reasoning": "short reason"}}
]
"#,
        internal_code = internal_code.trim(),
        description = description.trim(),
        history_list = history_list,
    )
}
