//! 候補照合・スコアリング
//!
//! 未連携明細の説明と車両シリーズから、マスタ行の候補を挙げる。
//!
//! ## 2つのモード
//! - list_candidates: シリーズ絞込み + 文字列検索（AIなし、スコアなし）
//! - rank_candidates: AI抽出キーワードによる加点方式のランキング
//!
//! 加点は規則ベースで、どのキーワードで何点入ったかを ScoreHit として残す。

use crate::text::{normalize, normalize_header, tokenize};
use crate::types::CatalogEntry;
use serde::{Deserialize, Serialize};

/// 一覧モードの既定上限
pub const DEFAULT_LISTING_LIMIT: usize = 50;

/// ランキングモードの既定上限
pub const DEFAULT_RANKING_LIMIT: usize = 20;

const TOKEN_POINTS: u32 = 15;
const DESCRIPTION_POINTS: u32 = 8;
const CODE_POINTS: u32 = 5;
const PREFIX_POINTS: u32 = 5;
/// 前方一致ボーナスの対象となるキーワード長（これより長いもの）
const PREFIX_MIN_LEN: usize = 4;
/// 包含で一致とみなす側の最小文字数
const CONTAINMENT_MIN_LEN: usize = 3;

/// 加点の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitKind {
    /// 説明文の単語と完全一致
    Token,
    /// 説明文に部分一致
    Description,
    /// ファクトリーコードに部分一致
    Code,
    /// 説明文がキーワードで始まる
    Prefix,
}

/// 1件の加点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreHit {
    pub keyword: String,
    pub kind: HitKind,
    pub points: u32,
}

/// スコア付き候補
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
    pub entry: CatalogEntry,
    pub match_score: u32,
    pub hits: Vec<ScoreHit>,
}

/// マスタ行が車両シリーズ文脈に該当するか
///
/// シリーズ・モデルを英数字のみに詰めて比較し、一致またはどちらかが
/// 他方を含めば該当とする。包含は含まれる側が CONTAINMENT_MIN_LEN 文字以上の
/// 場合のみ。文脈が空なら該当なし。
pub fn matches_series(entry: &CatalogEntry, context: &str) -> bool {
    let context = normalize_header(context);
    if context.is_empty() {
        return false;
    }

    [entry.series.as_deref(), entry.model.as_deref()]
        .into_iter()
        .flatten()
        .map(normalize_header)
        .filter(|value| !value.is_empty())
        .any(|value| value == context || contains_part(&value, &context) || contains_part(&context, &value))
}

fn contains_part(whole: &str, part: &str) -> bool {
    part.chars().count() >= CONTAINMENT_MIN_LEN && whole.contains(part)
}

/// コード指定で選んだマスタ行
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryMatch<'a> {
    pub entry: &'a CatalogEntry,
    /// シリーズ文脈に該当したか（false は別シリーズの行で代用）
    pub in_series: bool,
}

/// ファクトリーコードでマスタ行を探す
///
/// 同じコードが複数シリーズにある場合は文脈に該当する行を優先する。
/// 該当がなければ最初の行を in_series = false で返すので、呼び出し側で確認すること。
pub fn find_entry<'a>(catalog: &'a [CatalogEntry], code: &str, context: &str) -> Option<EntryMatch<'a>> {
    let code = normalize(code);
    if code.is_empty() {
        return None;
    }

    let mut matching = catalog.iter().filter(|e| normalize(&e.factory_code) == code).peekable();
    let first = *matching.peek()?;
    Some(match matching.find(|e| matches_series(e, context)) {
        Some(entry) => EntryMatch { entry, in_series: true },
        None => EntryMatch {
            entry: first,
            in_series: false,
        },
    })
}

/// シリーズ絞込み + 文字列検索による候補一覧（スコアなし）
///
/// # Arguments
/// * `catalog` - マスタ全体
/// * `context` - 車両シリーズ文脈（空なら結果も空）
/// * `search` - 説明・コードに対する部分一致検索語（空なら絞込みなし）
/// * `limit` - 最大件数
pub fn list_candidates<'a>(
    catalog: &'a [CatalogEntry],
    context: &str,
    search: &str,
    limit: usize,
) -> Vec<&'a CatalogEntry> {
    let term = normalize(search);

    catalog
        .iter()
        .filter(|entry| matches_series(entry, context))
        .filter(|entry| {
            term.is_empty()
                || normalize(&entry.description).contains(&term)
                || normalize(&entry.factory_code).contains(&term)
                || normalize(&entry.internal_code).contains(&term)
        })
        .take(limit)
        .collect()
}

/// 1件のマスタ行をキーワードで採点
///
/// キーワードは正規化・重複除去済みであること。
pub fn score_entry(entry: &CatalogEntry, keywords: &[String]) -> (u32, Vec<ScoreHit>) {
    let description = normalize(&entry.description);
    let code = normalize(&entry.factory_code);
    let tokens = tokenize(&entry.description);

    let mut hits = Vec::new();
    for keyword in keywords {
        let mut hit = |kind: HitKind, points: u32| {
            hits.push(ScoreHit {
                keyword: keyword.clone(),
                kind,
                points,
            })
        };

        if tokens.iter().any(|t| t == keyword) {
            hit(HitKind::Token, TOKEN_POINTS);
        }
        if description.contains(keyword.as_str()) {
            hit(HitKind::Description, DESCRIPTION_POINTS);
        }
        if code.contains(keyword.as_str()) {
            hit(HitKind::Code, CODE_POINTS);
        }
        if keyword.chars().count() > PREFIX_MIN_LEN && description.starts_with(keyword.as_str()) {
            hit(HitKind::Prefix, PREFIX_POINTS);
        }
    }

    let score = hits.iter().map(|h| h.points).sum();
    (score, hits)
}

/// AIキーワードによる加点ランキング
///
/// - シリーズ文脈に該当するマスタ行のみ採点
/// - 0点は除外、降順の安定ソート（同点はマスタ順）
/// - キーワードなし・文脈なしは空の結果（エラーではない）
pub fn rank_candidates(
    catalog: &[CatalogEntry],
    context: &str,
    hints: &[String],
    limit: usize,
) -> Vec<ScoredCandidate> {
    let keywords = prepare_keywords(hints);
    if keywords.is_empty() {
        return Vec::new();
    }

    let mut candidates: Vec<ScoredCandidate> = catalog
        .iter()
        .filter(|entry| matches_series(entry, context))
        .filter_map(|entry| {
            let (match_score, hits) = score_entry(entry, &keywords);
            (match_score > 0).then(|| ScoredCandidate {
                entry: entry.clone(),
                match_score,
                hits,
            })
        })
        .collect();

    // sort_by は安定ソート
    candidates.sort_by(|a, b| b.match_score.cmp(&a.match_score));
    candidates.truncate(limit);
    candidates
}

/// キーワードを正規化し、空・重複を除く（順序は保持）
fn prepare_keywords(hints: &[String]) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for hint in hints {
        let keyword = normalize(hint);
        if !keyword.is_empty() && !keywords.contains(&keyword) {
            keywords.push(keyword);
        }
    }
    keywords
}
