//! opcode-reconcile
//!
//! 整備オーダー明細（社内コード）をメーカー作業コード（ファクトリーコード）に
//! 照合・連携するCLI。照合エンジン本体は opcode-reconcile-common にある。

pub mod ai_provider;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod importer;
pub mod reconciler;
pub mod store;
