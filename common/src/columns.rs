//! 取込ファイルの列自動判定
//!
//! 見出しが不定の表（CSV/Excel）から、ファクトリーコード・説明・シリーズ・
//! モデル・作業時間の各列を推定する。
//!
//! ## 判定方針
//! - スコア方式ではなく「候補を順に試して最初に当たったもの」を採用
//! - 同じ見出しの組み合わせに対して常に同じ結果を返す
//! - コード列が見つからなければ ColumnDetection エラー（変換は行わない）

use crate::error::{Error, Result};
use crate::text::{normalize, normalize_header};
use crate::types::{CatalogEntry, LinkStatus, OperationKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// コード列の同義語（優先順）
const CODE_SYNONYMS: &[&str] = &[
    "CODIGOFABRICA",
    "FACTORYCODE",
    "CODIGOBYD",
    "CODIGOOPERACION",
    "OPERATIONCODE",
    "LABORCODE",
    "OPCODE",
    "CODIGO",
];

/// コード列の候補から外す車両系の語
const VEHICLE_TOKENS: &[&str] = &["VEHICULO", "VEHICLE", "SERIE", "MODELO", "MODEL"];

const GENERIC_CODE_TOKEN: &str = "CODE";

const DESCRIPTION_SYNONYMS: &[&str] = &[
    "DESCRIPCION",
    "DESCRIPTION",
    "DETALLE",
    "NOMBRE",
    "NAME",
    "DESC",
];

const SERIES_SYNONYMS: &[&str] = &["SERIE", "VEHICULO", "VEHICLE", "PLATAFORMA", "PLATFORM"];

const MODEL_SYNONYMS: &[&str] = &["MODELO", "MODEL"];

const HOURS_SYNONYMS: &[&str] = &["HORAS", "HOURS", "HRS", "TIEMPO", "TIME"];

const KIND_SYNONYMS: &[&str] = &["TIPOOPERACION", "TIPO", "TYPE", "KIND", "CLASE"];

const CATEGORY_SYNONYMS: &[&str] = &["CATEGORIA", "CATEGORY", "SISTEMA", "GRUPO", "GROUP"];

const INTERNAL_CODE_SYNONYMS: &[&str] = &[
    "CODIGOINTERNO",
    "INTERNALCODE",
    "CODIGODMS",
    "DMSCODE",
    "CODIGOTALLER",
];

const HIGH_VOLTAGE_SYNONYMS: &[&str] = &["ALTOVOLTAJE", "HIGHVOLTAGE", "BATERIA", "BATTERY"];

/// セル値（文字列または数値）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    /// 表示用文字列（整数値は小数点なし）
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
        }
    }

    /// 数値として解釈（"1,5" も 1.5 として扱う）
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        }
    }

    /// "SI", "X", "1" などを真として扱う
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            CellValue::Number(n) => Some(*n != 0.0),
            CellValue::Text(s) => match normalize_header(s).as_str() {
                "" => None,
                "SI" | "S" | "YES" | "Y" | "TRUE" | "X" | "1" => Some(true),
                _ => Some(false),
            },
        }
    }
}

/// 取込行（見出し → セル値）
pub type RawRow = HashMap<String, CellValue>;

/// 取込表
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// 見出し（ファイル上の列順）
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// 意味フィールド → 見出し名 の対応
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub code: String,
    pub description: Option<String>,
    pub series: Option<String>,
    pub model: Option<String>,
    pub hours: Option<String>,
    pub kind: Option<String>,
    pub category: Option<String>,
    pub internal_code: Option<String>,
    pub high_voltage: Option<String>,
}

/// 列判定を実行
///
/// # Arguments
/// * `headers` - 見出し（列順）
///
/// # Returns
/// * `Ok(ColumnMapping)` - 判定結果
/// * `Err(Error::ColumnDetection)` - コード列が見つからない場合
pub fn detect_columns(headers: &[String]) -> Result<ColumnMapping> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();

    // 1. コード列（車両・シリーズ・モデル列は除外）
    let vehicle_columns: Vec<usize> = normalized
        .iter()
        .enumerate()
        .filter(|(_, h)| VEHICLE_TOKENS.iter().any(|t| h.contains(*t)))
        .map(|(i, _)| i)
        .collect();

    let code_idx = find_exact(&normalized, CODE_SYNONYMS, &vehicle_columns)
        .or_else(|| find_substring(&normalized, CODE_SYNONYMS, &vehicle_columns))
        .or_else(|| find_substring(&normalized, &[GENERIC_CODE_TOKEN], &vehicle_columns))
        .ok_or_else(|| Error::ColumnDetection {
            field: "code".to_string(),
            headers: headers.to_vec(),
        })?;

    // 2. 説明列（コード列を除外、見つからなければコード列の次の列）
    let description_idx = find_exact(&normalized, DESCRIPTION_SYNONYMS, &[code_idx])
        .or_else(|| find_substring(&normalized, DESCRIPTION_SYNONYMS, &[code_idx]))
        .or_else(|| Some(code_idx + 1).filter(|i| *i < headers.len()));

    // 3. その他は独立に部分一致検索
    let pick = |idx: Option<usize>| idx.map(|i| headers[i].clone());

    Ok(ColumnMapping {
        code: headers[code_idx].clone(),
        description: pick(description_idx),
        series: pick(find_substring(&normalized, SERIES_SYNONYMS, &[])),
        model: pick(find_substring(&normalized, MODEL_SYNONYMS, &[])),
        hours: pick(find_substring(&normalized, HOURS_SYNONYMS, &[])),
        kind: pick(find_substring(&normalized, KIND_SYNONYMS, &[])),
        category: pick(find_substring(&normalized, CATEGORY_SYNONYMS, &[])),
        internal_code: pick(find_substring(&normalized, INTERNAL_CODE_SYNONYMS, &[code_idx])),
        high_voltage: pick(find_substring(&normalized, HIGH_VOLTAGE_SYNONYMS, &[])),
    })
}

/// 同義語の優先順に完全一致を探す
fn find_exact(normalized: &[String], synonyms: &[&str], excluded: &[usize]) -> Option<usize> {
    synonyms.iter().find_map(|syn| {
        normalized
            .iter()
            .enumerate()
            .find(|(i, h)| !excluded.contains(i) && h.as_str() == *syn)
            .map(|(i, _)| i)
    })
}

/// 同義語の優先順に部分一致を探す
fn find_substring(normalized: &[String], synonyms: &[&str], excluded: &[usize]) -> Option<usize> {
    synonyms.iter().find_map(|syn| {
        normalized
            .iter()
            .enumerate()
            .find(|(i, h)| !excluded.contains(i) && !h.is_empty() && h.contains(*syn))
            .map(|(i, _)| i)
    })
}

/// 取込時の既定値
#[derive(Debug, Clone, Default)]
pub struct ImportDefaults {
    pub series: Option<String>,
    pub category: Option<String>,
    pub hours: Option<f64>,
}

/// 変換結果
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub entries: Vec<CatalogEntry>,
    /// コードが空でスキップした行番号（データ行の0始まり）
    pub skipped_rows: Vec<usize>,
}

/// 判定済みの列対応で取込行をマスタ行に変換
pub fn rows_to_entries(
    table: &RawTable,
    mapping: &ColumnMapping,
    defaults: &ImportDefaults,
) -> ImportOutcome {
    let mut outcome = ImportOutcome::default();

    for (row_idx, row) in table.rows.iter().enumerate() {
        let cell = |column: &Option<String>| column.as_ref().and_then(|c| row.get(c));
        let text = |column: &Option<String>| {
            cell(column)
                .map(|v| v.as_text())
                .filter(|s| !s.is_empty())
        };

        let code = row
            .get(&mapping.code)
            .map(|v| normalize(&v.as_text()))
            .unwrap_or_default();
        if code.is_empty() {
            outcome.skipped_rows.push(row_idx);
            continue;
        }

        outcome.entries.push(CatalogEntry {
            id: 0,
            factory_code: code,
            kind: text(&mapping.kind)
                .map(|k| OperationKind::parse(&k))
                .unwrap_or_default(),
            internal_code: text(&mapping.internal_code)
                .map(|c| normalize(&c))
                .unwrap_or_default(),
            description: text(&mapping.description).unwrap_or_default(),
            series: text(&mapping.series).or_else(|| defaults.series.clone()),
            model: text(&mapping.model),
            category: text(&mapping.category).or_else(|| defaults.category.clone()),
            standard_hours: cell(&mapping.hours)
                .and_then(|v| v.as_number())
                .or(defaults.hours),
            high_voltage: cell(&mapping.high_voltage).and_then(|v| v.as_flag()),
            status: LinkStatus::Pending,
            confidence: None,
        });
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(pairs: &[(&str, CellValue)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_detect_standard_headers() {
        let h = headers(&["Código Fábrica", "Descripción", "Serie", "Modelo", "Horas"]);
        let mapping = detect_columns(&h).unwrap();
        assert_eq!(mapping.code, "Código Fábrica");
        assert_eq!(mapping.description.as_deref(), Some("Descripción"));
        assert_eq!(mapping.series.as_deref(), Some("Serie"));
        assert_eq!(mapping.model.as_deref(), Some("Modelo"));
        assert_eq!(mapping.hours.as_deref(), Some("Horas"));
    }

    #[test]
    fn test_code_ignores_vehicle_columns() {
        // "Código Modelo" はコード列として採用しない
        let h = headers(&["Código Modelo", "Codigo", "Detalle"]);
        let mapping = detect_columns(&h).unwrap();
        assert_eq!(mapping.code, "Codigo");
        assert_eq!(mapping.model.as_deref(), Some("Código Modelo"));
    }

    #[test]
    fn test_exact_match_beats_substring() {
        let h = headers(&["Codigo Operacion Interna", "CODIGO"]);
        let mapping = detect_columns(&h).unwrap();
        assert_eq!(mapping.code, "CODIGO");
    }

    #[test]
    fn test_generic_code_token() {
        let h = headers(&["Vehicle code", "Ref code", "Text"]);
        let mapping = detect_columns(&h).unwrap();
        assert_eq!(mapping.code, "Ref code");
        assert_eq!(mapping.description.as_deref(), Some("Text"));
    }

    #[test]
    fn test_description_falls_back_to_next_column() {
        let h = headers(&["Serie", "Factory Code", "Texto", "Horas"]);
        let mapping = detect_columns(&h).unwrap();
        assert_eq!(mapping.code, "Factory Code");
        assert_eq!(mapping.description.as_deref(), Some("Texto"));
    }

    #[test]
    fn test_description_fallback_at_last_column() {
        let h = headers(&["Serie", "Factory Code"]);
        let mapping = detect_columns(&h).unwrap();
        assert_eq!(mapping.description, None);
    }

    #[test]
    fn test_missing_code_column_fails() {
        let h = headers(&["Modelo", "Descripción", "Horas"]);
        let err = detect_columns(&h).unwrap_err();
        match err {
            Error::ColumnDetection { field, headers } => {
                assert_eq!(field, "code");
                assert_eq!(headers.len(), 3);
            }
            other => panic!("想定外のエラー: {:?}", other),
        }
    }

    #[test]
    fn test_detection_is_deterministic() {
        let h = headers(&[
            "Serie Vehiculo",
            "Code",
            "Codigo BYD",
            "Description",
            "Descripcion larga",
            "Std Hours",
            "Tiempo",
        ]);
        let first = detect_columns(&h).unwrap();
        for _ in 0..20 {
            assert_eq!(detect_columns(&h).unwrap(), first);
        }
        assert_eq!(first.code, "Codigo BYD");
        assert_eq!(first.description.as_deref(), Some("Description"));
        assert_eq!(first.hours.as_deref(), Some("Std Hours"));
    }

    #[test]
    fn test_rows_to_entries() {
        let h = headers(&["Codigo", "Descripcion", "Serie", "Horas", "Tipo", "Bateria"]);
        let mapping = detect_columns(&h).unwrap();
        let table = RawTable {
            headers: h,
            rows: vec![
                row(&[
                    ("Codigo", CellValue::Text(" wsa3hac02101gh00 ".into())),
                    ("Descripcion", CellValue::Text("Brake inspection".into())),
                    ("Serie", CellValue::Text("SONG PLUS DMI".into())),
                    ("Horas", CellValue::Text("1,5".into())),
                    ("Tipo", CellValue::Text("Reparación".into())),
                    ("Bateria", CellValue::Text("SI".into())),
                ]),
                row(&[("Codigo", CellValue::Text("".into()))]),
                row(&[
                    ("Codigo", CellValue::Number(2101.0)),
                    ("Horas", CellValue::Number(0.8)),
                ]),
            ],
        };
        let defaults = ImportDefaults {
            series: Some("DOLPHIN".into()),
            category: Some("General".into()),
            hours: Some(1.0),
        };

        let outcome = rows_to_entries(&table, &mapping, &defaults);
        assert_eq!(outcome.entries.len(), 2);
        assert_eq!(outcome.skipped_rows, vec![1]);

        let first = &outcome.entries[0];
        assert_eq!(first.factory_code, "WSA3HAC02101GH00");
        assert_eq!(first.kind, OperationKind::Repair);
        assert_eq!(first.standard_hours, Some(1.5));
        assert_eq!(first.high_voltage, Some(true));
        assert_eq!(first.category.as_deref(), Some("General"));

        let second = &outcome.entries[1];
        assert_eq!(second.factory_code, "2101");
        assert_eq!(second.series.as_deref(), Some("DOLPHIN"));
        assert_eq!(second.standard_hours, Some(0.8));
        assert_eq!(second.kind, OperationKind::Labor);
    }
}
