//! マスタ取込
//!
//! CSV / Excel ファイルを RawTable に読み込み、列を自動判定して
//! CatalogEntry に変換し、ストアへ登録する。

use crate::error::{ReconcileError, Result};
use crate::store::CatalogStore;
use calamine::{open_workbook_auto, Data, Reader};
use indicatif::{ProgressBar, ProgressStyle};
use opcode_reconcile_common::text::normalize;
use opcode_reconcile_common::{
    detect_columns, rows_to_entries, CatalogEntry, CellValue, ColumnMapping, ImportDefaults, RawRow, RawTable,
    RuleSet,
};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// 取込結果
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub mapping: Option<ColumnMapping>,
    pub created: Vec<CatalogEntry>,
    /// 既存マスタと同じコード・シリーズのためスキップ
    pub duplicates: usize,
    /// コードが空でスキップした行（データ行の0始まり）
    pub skipped_rows: Vec<usize>,
}

/// 拡張子で判定してファイルを読み込む
pub fn read_table(path: &Path) -> Result<RawTable> {
    if !path.exists() {
        return Err(ReconcileError::FileNotFound(path.display().to_string()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "csv" | "txt" => read_csv(path),
        "xlsx" | "xlsm" | "xls" | "ods" => read_excel(path),
        _ => Err(ReconcileError::UnsupportedFormat(path.display().to_string())),
    }
}

/// CSV読み込み（区切り文字は先頭行の ; と , の多い方）
pub fn read_csv(path: &Path) -> Result<RawTable> {
    let content = std::fs::read_to_string(path)?;
    let content = content.trim_start_matches('\u{feff}');
    let first_line = content.lines().next().unwrap_or_default();
    let delimiter = if first_line.matches(';').count() > first_line.matches(',').count() {
        b';'
    } else {
        b','
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .filter(|(_, v)| !v.is_empty())
            .map(|(h, v)| (h.clone(), CellValue::Text(v.to_string())))
            .collect();
        if !row.is_empty() {
            rows.push(row);
        }
    }

    Ok(RawTable { headers, rows })
}

/// Excel読み込み（先頭シート、最初の空でない行を見出しとする）
pub fn read_excel(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ReconcileError::Config(format!("シートがありません: {}", path.display())))??;

    let mut row_iter = range
        .rows()
        .skip_while(|row| row.iter().all(|c| matches!(c, Data::Empty)));

    let headers: Vec<String> = match row_iter.next() {
        Some(row) => row.iter().map(|c| c.to_string().trim().to_string()).collect(),
        None => return Ok(RawTable::default()),
    };

    let rows = row_iter
        .map(|row| {
            headers
                .iter()
                .zip(row.iter())
                .filter(|(h, _)| !h.is_empty())
                .filter_map(|(h, cell)| to_cell_value(cell).map(|v| (h.clone(), v)))
                .collect::<RawRow>()
        })
        .filter(|row| !row.is_empty())
        .collect();

    Ok(RawTable { headers, rows })
}

fn to_cell_value(cell: &Data) -> Option<CellValue> {
    match cell {
        Data::Empty => None,
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::Bool(b) => Some(CellValue::Text(if *b { "SI" } else { "NO" }.to_string())),
        Data::String(s) if s.trim().is_empty() => None,
        other => Some(CellValue::Text(other.to_string())),
    }
}

/// 読み込み → 列判定 → 変換（ストアには書き込まない）
pub fn prepare_entries(
    path: &Path,
    rules: &RuleSet,
    series: Option<String>,
) -> Result<(ColumnMapping, Vec<CatalogEntry>, Vec<usize>)> {
    let table = read_table(path)?;
    let mapping = detect_columns(&table.headers)?;
    info!(
        code = %mapping.code,
        description = ?mapping.description,
        series = ?mapping.series,
        rows = table.rows.len(),
        "列を判定しました"
    );

    let active = rules.active();
    let defaults = ImportDefaults {
        series,
        category: active.and_then(|r| r.default_category.clone()),
        hours: active.and_then(|r| r.default_hours),
    };
    let outcome = rows_to_entries(&table, &mapping, &defaults);
    Ok((mapping, outcome.entries, outcome.skipped_rows))
}

fn entry_key(entry: &CatalogEntry) -> (String, String) {
    (
        entry.factory_code.clone(),
        entry.series.as_deref().map(normalize).unwrap_or_default(),
    )
}

/// ファイルを取り込んでマスタに登録
pub async fn import_catalog(
    store: &dyn CatalogStore,
    path: &Path,
    rules: &RuleSet,
    series: Option<String>,
    show_progress: bool,
) -> Result<ImportReport> {
    let (mapping, entries, skipped_rows) = prepare_entries(path, rules, series)?;
    if !skipped_rows.is_empty() {
        warn!(count = skipped_rows.len(), "コードが空の行をスキップしました");
    }

    let mut existing: HashSet<(String, String)> = store.list().await?.iter().map(entry_key).collect();
    let mut report = ImportReport {
        mapping: Some(mapping),
        skipped_rows,
        ..Default::default()
    };

    let pb = if show_progress {
        let pb = ProgressBar::new(entries.len() as u64);
        if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}") {
            pb.set_style(style);
        }
        pb.set_message("登録中...");
        Some(pb)
    } else {
        None
    };

    for entry in entries {
        if let Some(pb) = &pb {
            pb.inc(1);
        }
        if !existing.insert(entry_key(&entry)) {
            report.duplicates += 1;
            continue;
        }
        report.created.push(store.create(entry).await?);
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    info!(
        created = report.created.len(),
        duplicates = report.duplicates,
        skipped = report.skipped_rows.len(),
        "取込完了"
    );
    Ok(report)
}
