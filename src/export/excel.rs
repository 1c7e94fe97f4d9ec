//! グループ一覧のExcel出力
//!
//! - 「Grupos」シート: 車種・年式ごとの件数
//! - 「Detalle」シート: グループ内の未連携明細

use crate::error::Result;
use opcode_reconcile_common::{ModelGroup, RuleSet};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use std::path::Path;

const SUMMARY_HEADERS: [(&str, f64); 4] = [("Grupo", 28.0), ("Modelo", 22.0), ("Año", 8.0), ("Ítems", 8.0)];

const DETAIL_HEADERS: [(&str, f64); 8] = [
    ("Grupo", 28.0),
    ("Orden", 14.0),
    ("Vehículo", 20.0),
    ("Código interno", 16.0),
    ("Descripción", 44.0),
    ("Cantidad", 10.0),
    ("Total", 12.0),
    ("Obligatorio", 12.0),
];

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x1F4E78))
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin)
}

fn write_headers(sheet: &mut Worksheet, headers: &[(&str, f64)], format: &Format) -> Result<()> {
    for (col, (title, width)) in headers.iter().enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(0, col, *title, format)?;
        sheet.set_column_width(col, *width)?;
    }
    sheet.set_freeze_panes(1, 0)?;
    Ok(())
}

fn build_workbook(groups: &[ModelGroup], rules: &RuleSet) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    let header = header_format();
    let mandatory = Format::new().set_font_color(Color::RGB(0xC00000)).set_bold();
    let money = Format::new().set_num_format("#,##0.00");

    let summary = workbook.add_worksheet();
    summary.set_name("Grupos")?;
    write_headers(summary, &SUMMARY_HEADERS, &header)?;

    for (i, group) in groups.iter().enumerate() {
        let row = (i + 1) as u32;
        summary.write_string(row, 0, &group.key)?;
        summary.write_string(row, 1, &group.model_name)?;
        if let Some(year) = group.year {
            summary.write_number(row, 2, year as f64)?;
        }
        summary.write_number(row, 3, group.count as f64)?;
    }

    let total_row = (groups.len() + 1) as u32;
    summary.write_string_with_format(total_row, 0, "Total", &Format::new().set_bold())?;
    summary.write_number_with_format(
        total_row,
        3,
        groups.iter().map(|g| g.count).sum::<usize>() as f64,
        &Format::new().set_bold(),
    )?;

    let detail = workbook.add_worksheet();
    detail.set_name("Detalle")?;
    write_headers(detail, &DETAIL_HEADERS, &header)?;

    let mut row = 1u32;
    for group in groups {
        for grouped in &group.items {
            let item = &grouped.item;
            detail.write_string(row, 0, &group.key)?;
            detail.write_string(row, 1, &grouped.order_number)?;
            detail.write_string(row, 2, &grouped.vehicle_id)?;
            detail.write_string(row, 3, &item.internal_code)?;
            detail.write_string(row, 4, &item.description)?;
            detail.write_number(row, 5, item.quantity)?;
            detail.write_number_with_format(row, 6, item.total, &money)?;
            if rules.is_placeholder(&item.internal_code) {
                detail.write_string_with_format(row, 7, "SI", &mandatory)?;
            }
            row += 1;
        }
    }

    Ok(workbook)
}

/// グループ一覧をExcelファイルに出力
pub fn generate_group_report(groups: &[ModelGroup], rules: &RuleSet, output_path: &Path) -> Result<()> {
    let mut workbook = build_workbook(groups, rules)?;
    workbook.save(output_path)?;
    Ok(())
}

/// グループ一覧をバッファに出力
pub fn generate_group_report_buffer(groups: &[ModelGroup], rules: &RuleSet) -> Result<Vec<u8>> {
    let mut workbook = build_workbook(groups, rules)?;
    Ok(workbook.save_to_buffer()?)
}
