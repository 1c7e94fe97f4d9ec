//! 対象判定・分類ルール
//!
//! - AdmissionRule: 社内コードがプレースホルダー（必須連携）かどうか、
//!   連携作業の対象かどうかを判定する
//! - ClassificationRule: 説明文のキーワードでカテゴリ・優先度を付ける
//! - RuleSet: 有効な AdmissionRule を常に1件に保つ

use crate::error::{Error, Result};
use crate::text::normalize;
use crate::types::{AdmissionRule, Classification, ClassificationRule, Priority};
use serde::{Deserialize, Serialize};

impl AdmissionRule {
    /// 正規化したコードがプレースホルダー一覧に含まれるか
    pub fn is_placeholder(&self, code: &str) -> bool {
        let code = normalize(code);
        if code.is_empty() {
            return false;
        }
        self.placeholder_codes.iter().any(|p| normalize(p) == code)
    }

    /// 連携作業の対象か
    ///
    /// - プレースホルダー一覧が空: 全コードが対象（オープン方針）
    /// - 一覧あり: 一覧に含まれるコードのみ対象（ホワイトリスト方針）
    pub fn is_relevant(&self, code: &str) -> bool {
        if self.placeholder_codes.is_empty() {
            return true;
        }
        self.is_placeholder(code)
    }
}

/// 説明文を分類（リスト順で最初に一致したルールを採用）
///
/// 一致の良し悪しではなく評価順で決まる。該当なしは None。
pub fn classify(description: &str, rules: &[ClassificationRule]) -> Option<Classification> {
    let text = normalize(description);
    if text.is_empty() {
        return None;
    }

    rules
        .iter()
        .find(|rule| {
            let keyword = normalize(&rule.keyword);
            !keyword.is_empty() && text.contains(&keyword)
        })
        .map(Classification::from)
}

/// 既定の分類ルール
pub fn default_classification_rules() -> Vec<ClassificationRule> {
    let rule = |id: u64, keyword: &str, category: &str, icon: &str, priority: Priority, color: &str| {
        ClassificationRule {
            id,
            keyword: keyword.to_string(),
            category: category.to_string(),
            icon: icon.to_string(),
            priority,
            color: color.to_string(),
        }
    };

    vec![
        rule(1, "ALTO VOLTAJE", "Alto voltaje", "zap", Priority::High, "red"),
        rule(2, "BATERIA", "Alto voltaje", "battery", Priority::High, "red"),
        rule(3, "FRENO", "Frenos", "disc", Priority::High, "orange"),
        rule(4, "AIRBAG", "Seguridad", "shield", Priority::High, "orange"),
        rule(5, "ACEITE", "Mantenimiento", "droplet", Priority::Normal, "blue"),
        rule(6, "MANTENIMIENTO", "Mantenimiento", "wrench", Priority::Normal, "blue"),
        rule(7, "REVISION", "Inspección", "search", Priority::Normal, "teal"),
        rule(8, "NEUMATICO", "Neumáticos", "circle", Priority::Normal, "gray"),
        rule(9, "LAVADO", "Estética", "sparkles", Priority::Low, "gray"),
    ]
}

/// 対象判定ルールの集合（有効ルールは常に1件）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    rules: Vec<AdmissionRule>,
    active_id: Option<u64>,
}

impl RuleSet {
    /// 保存済みのルールから構築
    ///
    /// active フラグが0件または複数件でも、最初のフラグ付き（なければ先頭）1件に揃える。
    pub fn new(rules: Vec<AdmissionRule>) -> Self {
        let active_id = rules
            .iter()
            .find(|r| r.active)
            .or_else(|| rules.first())
            .map(|r| r.id);

        let mut set = Self { rules, active_id };
        set.sync_flags();
        set
    }

    /// 現在の有効ルール
    pub fn active(&self) -> Option<&AdmissionRule> {
        let id = self.active_id?;
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn rules(&self) -> &[AdmissionRule] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<AdmissionRule> {
        self.rules
    }

    /// 次に使うID
    pub fn next_id(&self) -> u64 {
        self.rules.iter().map(|r| r.id).max().unwrap_or(0) + 1
    }

    /// ルールを追加（最初の1件、または active 指定なら有効化）
    pub fn add(&mut self, rule: AdmissionRule) {
        let activate = rule.active || self.active_id.is_none();
        let id = rule.id;
        self.rules.retain(|r| r.id != id);
        self.rules.push(rule);
        if activate {
            self.active_id = Some(id);
        }
        self.sync_flags();
    }

    /// 指定ルールを有効化（他は全て無効化）
    pub fn activate(&mut self, id: u64) -> Result<()> {
        if !self.rules.iter().any(|r| r.id == id) {
            return Err(Error::RuleNotFound(id));
        }
        self.active_id = Some(id);
        self.sync_flags();
        Ok(())
    }

    /// ルールを削除
    ///
    /// 有効ルールを削除した場合は残りの先頭を有効化する。
    pub fn remove(&mut self, id: u64) -> Result<AdmissionRule> {
        let pos = self
            .rules
            .iter()
            .position(|r| r.id == id)
            .ok_or(Error::RuleNotFound(id))?;
        let removed = self.rules.remove(pos);

        if self.active_id == Some(id) {
            self.active_id = self.rules.first().map(|r| r.id);
        }
        self.sync_flags();
        Ok(removed)
    }

    /// 有効ルールでプレースホルダー判定（ルールなしは false）
    pub fn is_placeholder(&self, code: &str) -> bool {
        self.active().map(|r| r.is_placeholder(code)).unwrap_or(false)
    }

    /// 有効ルールで対象判定（ルールなしはオープン方針）
    pub fn is_relevant(&self, code: &str) -> bool {
        self.active().map(|r| r.is_relevant(code)).unwrap_or(true)
    }

    fn sync_flags(&mut self) {
        let active_id = self.active_id;
        for rule in &mut self.rules {
            rule.active = Some(rule.id) == active_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admission(id: u64, codes: &[&str], active: bool) -> AdmissionRule {
        AdmissionRule {
            id,
            name: format!("rule-{}", id),
            active,
            placeholder_codes: codes.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn keyword_rule(id: u64, keyword: &str, category: &str) -> ClassificationRule {
        ClassificationRule {
            id,
            keyword: keyword.to_string(),
            category: category.to_string(),
            ..Default::default()
        }
    }

    fn active_count(set: &RuleSet) -> usize {
        set.rules().iter().filter(|r| r.active).count()
    }

    // =============================================
    // AdmissionRule テスト
    // =============================================

    #[test]
    fn test_is_placeholder_normalized() {
        let rule = admission(1, &[" mo006 ", "MO-GEN"], true);
        assert!(rule.is_placeholder("MO006"));
        assert!(rule.is_placeholder("  Mo006"));
        assert!(rule.is_placeholder("mo-gen"));
        assert!(!rule.is_placeholder("MO007"));
        assert!(!rule.is_placeholder(""));
    }

    #[test]
    fn test_open_policy_when_no_placeholders() {
        let rule = admission(1, &[], true);
        for code in ["MO006", "REP-123", "", "anything"] {
            assert!(rule.is_relevant(code), "オープン方針で対象外: {}", code);
            assert!(!rule.is_placeholder(code));
        }
    }

    #[test]
    fn test_whitelist_policy() {
        let rule = admission(1, &["MO006"], true);
        assert!(rule.is_relevant("mo006"));
        assert!(!rule.is_relevant("REP-123"));
    }

    // =============================================
    // classify テスト
    // =============================================

    #[test]
    fn test_classify_first_match_wins() {
        let rules = vec![
            keyword_rule(1, "BRAKE", "Brakes"),
            keyword_rule(2, "DISC BRAKE", "BrakesAdvanced"),
        ];
        let result = classify("DISC BRAKE PAD", &rules).unwrap();
        assert_eq!(result.category, "Brakes");
        assert_eq!(result.rule_id, 1);
    }

    #[test]
    fn test_classify_case_insensitive() {
        let rules = vec![keyword_rule(1, "freno", "Frenos")];
        let result = classify("  Revision de FRENOS delanteros", &rules).unwrap();
        assert_eq!(result.category, "Frenos");
    }

    #[test]
    fn test_classify_no_match() {
        let rules = vec![keyword_rule(1, "ACEITE", "Mantenimiento")];
        assert!(classify("REVISION DE FRENOS", &rules).is_none());
        assert!(classify("", &rules).is_none());
        assert!(classify("ACEITE", &[]).is_none());
    }

    #[test]
    fn test_default_rules_prioritize_high_voltage() {
        let rules = default_classification_rules();
        let result = classify("Cambio de aceite y revision bateria", &rules).unwrap();
        assert_eq!(result.category, "Alto voltaje");
        assert_eq!(result.priority, Priority::High);
    }

    // =============================================
    // RuleSet テスト
    // =============================================

    #[test]
    fn test_rule_set_normalizes_active_flags() {
        let set = RuleSet::new(vec![
            admission(1, &[], false),
            admission(2, &["MO006"], true),
            admission(3, &["MO007"], true),
        ]);
        assert_eq!(set.active().map(|r| r.id), Some(2));
        assert_eq!(active_count(&set), 1);

        let none_flagged = RuleSet::new(vec![admission(5, &[], false), admission(6, &[], false)]);
        assert_eq!(none_flagged.active().map(|r| r.id), Some(5));
        assert_eq!(active_count(&none_flagged), 1);
    }

    #[test]
    fn test_activate_deactivates_others() {
        let mut set = RuleSet::new(vec![admission(1, &[], true), admission(2, &["MO006"], false)]);
        set.activate(2).unwrap();
        assert_eq!(set.active().map(|r| r.id), Some(2));
        assert_eq!(active_count(&set), 1);
        assert!(!set.is_relevant("REP-1"));
    }

    #[test]
    fn test_activate_unknown_rule() {
        let mut set = RuleSet::new(vec![admission(1, &[], true)]);
        assert!(matches!(set.activate(9), Err(Error::RuleNotFound(9))));
        assert_eq!(set.active().map(|r| r.id), Some(1));
    }

    #[test]
    fn test_remove_active_falls_back_to_first() {
        let mut set = RuleSet::new(vec![
            admission(1, &[], false),
            admission(2, &["MO006"], true),
            admission(3, &["MO007"], false),
        ]);
        let removed = set.remove(2).unwrap();
        assert_eq!(removed.id, 2);
        assert_eq!(set.active().map(|r| r.id), Some(1));
        assert_eq!(active_count(&set), 1);
    }

    #[test]
    fn test_remove_inactive_keeps_active() {
        let mut set = RuleSet::new(vec![admission(1, &[], false), admission(2, &["MO006"], true)]);
        set.remove(1).unwrap();
        assert_eq!(set.active().map(|r| r.id), Some(2));
    }

    #[test]
    fn test_remove_last_rule_uses_open_policy() {
        let mut set = RuleSet::new(vec![admission(1, &["MO006"], true)]);
        set.remove(1).unwrap();
        assert!(set.active().is_none());
        assert!(set.is_relevant("REP-1"));
        assert!(!set.is_placeholder("MO006"));
    }

    #[test]
    fn test_add_first_rule_activates() {
        let mut set = RuleSet::default();
        set.add(admission(1, &["MO006"], false));
        assert_eq!(set.active().map(|r| r.id), Some(1));

        set.add(admission(2, &[], false));
        assert_eq!(set.active().map(|r| r.id), Some(1));

        set.add(admission(3, &["MO009"], true));
        assert_eq!(set.active().map(|r| r.id), Some(3));
        assert_eq!(active_count(&set), 1);
        assert_eq!(set.next_id(), 4);
    }
}
