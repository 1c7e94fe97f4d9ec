//! 連携状況の集計

use crate::grouping::build_groups;
use crate::rules::RuleSet;
use crate::types::ServiceOrder;
use serde::{Deserialize, Serialize};

/// 連携状況の統計
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationStats {
    /// 集計対象オーダー数（送信済み・完了を除く）
    pub open_orders: usize,
    /// 送信済み・完了でスキップしたオーダー数
    pub terminal_orders: usize,
    /// 未連携の対象明細数
    pub pending_items: usize,
    pub linked_items: usize,
    /// 未連携のプレースホルダー明細数
    pub mandatory_pending: usize,
    pub groups: usize,
}

/// オーダー群から統計を計算
pub fn compute_stats(orders: &[ServiceOrder], rules: &RuleSet) -> ReconciliationStats {
    let mut stats = ReconciliationStats::default();

    for order in orders {
        if order.status.is_terminal() {
            stats.terminal_orders += 1;
            continue;
        }
        stats.open_orders += 1;

        for item in &order.items {
            if item.linked {
                stats.linked_items += 1;
            } else if rules.is_relevant(&item.internal_code) {
                stats.pending_items += 1;
                if rules.is_placeholder(&item.internal_code) {
                    stats.mandatory_pending += 1;
                }
            }
        }
    }

    stats.groups = build_groups(orders, rules).len();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AdmissionRule, OrderLineItem, OrderStatus};

    #[test]
    fn test_compute_stats() {
        let rules = RuleSet::new(vec![AdmissionRule {
            id: 1,
            name: "mo".to_string(),
            active: true,
            placeholder_codes: vec!["MO006".to_string()],
            ..Default::default()
        }]);

        let mut linked = OrderLineItem::new("MO006", "", 1.0, 1.0);
        linked.linked = true;

        let orders = vec![
            ServiceOrder {
                id: 1,
                order_number: "OT-1".to_string(),
                model_description: Some("SEAL".to_string()),
                items: vec![OrderLineItem::new("MO006", "", 1.0, 1.0), OrderLineItem::new("PART", "", 1.0, 1.0), linked],
                ..Default::default()
            },
            ServiceOrder {
                id: 2,
                order_number: "OT-2".to_string(),
                status: OrderStatus::Completed,
                items: vec![OrderLineItem::new("MO006", "", 1.0, 1.0)],
                ..Default::default()
            },
        ];

        let stats = compute_stats(&orders, &rules);
        assert_eq!(stats.open_orders, 1);
        assert_eq!(stats.terminal_orders, 1);
        assert_eq!(stats.pending_items, 1);
        assert_eq!(stats.linked_items, 1);
        assert_eq!(stats.mandatory_pending, 1);
        assert_eq!(stats.groups, 1);
    }
}
