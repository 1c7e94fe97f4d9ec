//! Operation Code Reconciliation Common Library
//!
//! 照合エンジン本体。CLIやストアから独立した純粋関数と型を提供する。

pub mod columns;
pub mod error;
pub mod grouping;
pub mod linking;
pub mod matcher;
pub mod parser;
pub mod prompts;
pub mod rules;
pub mod stats;
pub mod text;
pub mod types;

pub use columns::{detect_columns, rows_to_entries, CellValue, ColumnMapping, ImportDefaults, ImportOutcome, RawRow, RawTable};
pub use error::{Error, Result};
pub use grouping::{build_groups, group_key, model_name, GroupedItem, ModelGroup};
pub use linking::{
    apply_link, can_transmit, commit_batch, ensure_linkable, link_request, plan_batch_link,
    unresolved_mandatory_items, validate_transmission, BatchLinkItem, BatchPlan, ItemRef, LinkBinding,
};
pub use matcher::{find_entry, list_candidates, rank_candidates, score_entry, EntryMatch, ScoreHit, ScoredCandidate};
pub use parser::{extract_json, parse_keyword_response, parse_suggestion_response};
pub use prompts::{build_keyword_prompt, build_suggestion_prompt, HistoryEntry};
pub use rules::{classify, default_classification_rules, RuleSet};
pub use stats::{compute_stats, ReconciliationStats};
pub use types::*;
