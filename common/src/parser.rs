//! AIレスポンスパーサー
//!
//! AIプロバイダの応答からJSONを抽出し、キーワード抽出結果と
//! コード提案をパースする

use crate::error::{Error, Result};
use crate::types::{KeywordHints, Suggestion};

/// レスポンスからJSON部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 最初に現れる [...] または {...}
/// 3. エラー
///
/// # Examples
/// ```
/// use opcode_reconcile_common::extract_json;
///
/// let response = "Result: {\"keywords\": [\"BRAKE\"]} done";
/// let json = extract_json(response).unwrap();
/// assert!(json.starts_with('{'));
/// ```
pub fn extract_json(response: &str) -> Result<&str> {
    // ```json ... ``` ブロックを探す
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7; // "```json" の長さ
        if let Some(end_offset) = response[start..].find("```") {
            let end = start + end_offset;
            return Ok(response[start..end].trim());
        }
    }

    // 生の [...] / {...} を探す
    if let Some(start) = response.find(['[', '{']) {
        let close = if response[start..].starts_with('[') { ']' } else { '}' };
        if let Some(end) = response.rfind(close) {
            if end >= start {
                return Ok(&response[start..=end]);
            }
        }
    }

    Err(Error::Parse("JSONが見つかりません".into()))
}

/// キーワード抽出レスポンスをパース
pub fn parse_keyword_response(response: &str) -> Result<KeywordHints> {
    let json_str = extract_json(response)?;
    let hints: KeywordHints = serde_json::from_str(json_str.trim())
        .map_err(|e| Error::Parse(format!("キーワード JSONパースエラー: {}", e)))?;
    Ok(hints)
}

/// コード提案レスポンスをパース
pub fn parse_suggestion_response(response: &str) -> Result<Vec<Suggestion>> {
    let json_str = extract_json(response)?;
    let suggestions: Vec<Suggestion> = serde_json::from_str(json_str.trim())
        .map_err(|e| Error::Parse(format!("提案 JSONパースエラー: {}", e)))?;
    Ok(suggestions)
}
