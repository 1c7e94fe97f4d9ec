//! 出力モジュール

pub mod excel;

pub use excel::{generate_group_report, generate_group_report_buffer};
