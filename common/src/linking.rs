//! 連携の適用と送信前チェック
//!
//! - apply_link: 1明細にファクトリーコードを紐付ける（再連携は上書き）
//! - ensure_linkable / link_request: 単一連携の事前確認と永続化用の明細情報
//! - plan_batch_link / commit_batch: 一括連携の計画と確定
//! - can_transmit / unresolved_mandatory_items / validate_transmission: 送信可否
//!
//! 一括連携は「計画 → 永続化 → 確定」の順で行う。永続化に失敗した場合は
//! commit_batch を呼ばないことで、ローカル状態を一切変更しない。

use crate::error::{Error, Result};
use crate::grouping::GroupedItem;
use crate::rules::RuleSet;
use crate::text::normalize;
use crate::types::{OperationKind, OrderLineItem, OrderStatus, ServiceOrder};
use serde::{Deserialize, Serialize};

/// 紐付け内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkBinding {
    pub factory_code: String,
    pub kind: OperationKind,
    /// マスタ説明（連携時点のスナップショットとして保存）
    pub description: String,
}

/// 明細の参照（オーダーID + 明細位置）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRef {
    pub order_id: u64,
    pub item_index: usize,
}

impl From<&GroupedItem> for ItemRef {
    fn from(grouped: &GroupedItem) -> Self {
        Self {
            order_id: grouped.order_id,
            item_index: grouped.item_index,
        }
    }
}

/// 永続化先に渡す1明細分の情報（単一連携・一括連携共通）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchLinkItem {
    pub order_number: String,
    pub internal_code: String,
    pub description: String,
}

/// 一括連携の計画
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchPlan {
    /// 連携対象（重複除去済み）
    pub targets: Vec<ItemRef>,
    pub requests: Vec<BatchLinkItem>,
    /// 連携済み・送信済みオーダー・対象外明細のためスキップ
    pub skipped: Vec<ItemRef>,
    /// 存在しない参照
    pub missing: Vec<ItemRef>,
}

impl BatchPlan {
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// 明細に紐付けを適用
///
/// 連携済みの明細に再適用した場合は紐付けを上書きする（エラーにしない）。
pub fn apply_link(item: &mut OrderLineItem, binding: &LinkBinding) {
    item.linked = true;
    item.factory_code = Some(binding.factory_code.clone());
    item.factory_kind = Some(binding.kind);
    item.factory_description = Some(binding.description.clone());
}

/// 送信済み・完了オーダーは連携できない（再連携による上書きも不可）
pub fn ensure_linkable(order: &ServiceOrder) -> Result<()> {
    if order.status.is_terminal() {
        return Err(Error::OrderClosed(order.order_number.clone()));
    }
    Ok(())
}

/// 永続化先に渡す明細情報を作る
pub fn link_request(order: &ServiceOrder, item: &OrderLineItem) -> BatchLinkItem {
    BatchLinkItem {
        order_number: order.order_number.clone(),
        internal_code: item.internal_code.clone(),
        description: item.description.clone(),
    }
}

/// 一括連携の計画を立てる（状態は変更しない）
///
/// - 同じ明細の重複参照は1件にまとめる
/// - 連携済み明細・送信済み/完了オーダーの明細は二重連携防止のためスキップ
/// - 有効ルールで対象外の明細もスキップ（グループ外の参照が渡された場合）
pub fn plan_batch_link(orders: &[ServiceOrder], refs: &[ItemRef], rules: &RuleSet) -> BatchPlan {
    let mut plan = BatchPlan::default();
    let mut seen: Vec<ItemRef> = Vec::new();

    for item_ref in refs {
        if seen.contains(item_ref) {
            continue;
        }
        seen.push(*item_ref);

        let found = orders
            .iter()
            .find(|o| o.id == item_ref.order_id)
            .and_then(|o| o.items.get(item_ref.item_index).map(|item| (o, item)));

        match found {
            None => plan.missing.push(*item_ref),
            Some((order, item))
                if item.linked || order.status.is_terminal() || !rules.is_relevant(&item.internal_code) =>
            {
                plan.skipped.push(*item_ref)
            }
            Some((order, item)) => {
                plan.targets.push(*item_ref);
                plan.requests.push(link_request(order, item));
            }
        }
    }

    plan
}

/// 永続化成功後に計画を確定する
///
/// # Returns
/// 紐付けた明細数
pub fn commit_batch(orders: &mut [ServiceOrder], plan: &BatchPlan, binding: &LinkBinding) -> usize {
    let mut applied = 0;
    for target in &plan.targets {
        if let Some(item) = orders
            .iter_mut()
            .find(|o| o.id == target.order_id)
            .and_then(|o| o.items.get_mut(target.item_index))
        {
            apply_link(item, binding);
            applied += 1;
        }
    }
    applied
}

/// 送信可能か（連携済み明細が1件以上、かつ未送信）
pub fn can_transmit(order: &ServiceOrder) -> bool {
    order.items.iter().any(|i| i.linked) && order.status != OrderStatus::Transmitted
}

/// 未連携のプレースホルダー明細
pub fn unresolved_mandatory_items<'a>(order: &'a ServiceOrder, rules: &RuleSet) -> Vec<&'a OrderLineItem> {
    order
        .items
        .iter()
        .filter(|i| !i.linked && rules.is_placeholder(&i.internal_code))
        .collect()
}

/// 送信前チェック
///
/// # Returns
/// * `Err(Error::ValidationBlocked)` - 未連携のプレースホルダー明細がある
/// * `Err(Error::NotTransmittable)` - 連携済み明細がない、または送信済み
pub fn validate_transmission(order: &ServiceOrder, rules: &RuleSet) -> Result<()> {
    let unresolved = unresolved_mandatory_items(order, rules);
    if !unresolved.is_empty() {
        let mut codes: Vec<String> = unresolved.iter().map(|i| normalize(&i.internal_code)).collect();
        codes.sort();
        codes.dedup();
        return Err(Error::ValidationBlocked {
            order_number: order.order_number.clone(),
            codes,
        });
    }

    if !can_transmit(order) {
        return Err(Error::NotTransmittable(order.order_number.clone()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AdmissionRule;

    fn binding(code: &str) -> LinkBinding {
        LinkBinding {
            factory_code: code.to_string(),
            kind: OperationKind::Labor,
            description: "BRAKE INSPECTION".to_string(),
        }
    }

    fn order(id: u64, codes: &[&str]) -> ServiceOrder {
        ServiceOrder {
            id,
            order_number: format!("OT-{}", id),
            items: codes
                .iter()
                .map(|c| OrderLineItem::new(c, "REVISION DE FRENOS", 1.0, 20.0))
                .collect(),
            ..Default::default()
        }
    }

    fn rules() -> RuleSet {
        RuleSet::new(vec![AdmissionRule {
            id: 1,
            name: "mo".to_string(),
            active: true,
            placeholder_codes: vec!["MO006".to_string()],
            ..Default::default()
        }])
    }

    fn item_ref(order_id: u64, item_index: usize) -> ItemRef {
        ItemRef { order_id, item_index }
    }

    #[test]
    fn test_apply_link_records_snapshot() {
        let mut item = OrderLineItem::new("MO006", "REVISION DE FRENOS", 1.0, 20.0);
        apply_link(&mut item, &binding("WSA3HAC02101GH00"));
        assert!(item.linked);
        assert_eq!(item.factory_code.as_deref(), Some("WSA3HAC02101GH00"));
        assert_eq!(item.factory_kind, Some(OperationKind::Labor));
        assert_eq!(item.factory_description.as_deref(), Some("BRAKE INSPECTION"));
    }

    #[test]
    fn test_relink_overwrites() {
        let mut item = OrderLineItem::new("MO006", "", 1.0, 0.0);
        apply_link(&mut item, &binding("A"));
        let mut second = binding("B");
        second.kind = OperationKind::Repair;
        apply_link(&mut item, &second);
        assert_eq!(item.factory_code.as_deref(), Some("B"));
        assert_eq!(item.factory_kind, Some(OperationKind::Repair));
    }

    #[test]
    fn test_plan_dedupes_and_skips_linked() {
        let mut orders = vec![order(1, &["MO006", "MO006"]), order(2, &["MO006"])];
        apply_link(&mut orders[0].items[1], &binding("X"));
        orders[1].status = OrderStatus::Transmitted;

        let refs = vec![
            item_ref(1, 0),
            item_ref(1, 0),
            item_ref(1, 1),
            item_ref(2, 0),
            item_ref(9, 0),
            item_ref(1, 5),
        ];
        let plan = plan_batch_link(&orders, &refs, &rules());
        assert_eq!(plan.targets, vec![item_ref(1, 0)]);
        assert_eq!(plan.requests.len(), 1);
        assert_eq!(plan.requests[0].order_number, "OT-1");
        assert_eq!(plan.skipped, vec![item_ref(1, 1), item_ref(2, 0)]);
        assert_eq!(plan.missing, vec![item_ref(9, 0), item_ref(1, 5)]);
    }

    #[test]
    fn test_plan_does_not_mutate() {
        let orders = vec![order(1, &["MO006"])];
        let before = orders.clone();
        let _ = plan_batch_link(&orders, &[item_ref(1, 0)], &rules());
        assert_eq!(orders, before);
    }

    #[test]
    fn test_commit_batch_applies_to_targets() {
        let mut orders = vec![order(1, &["MO006", "MO006"]), order(2, &["MO006"])];
        let plan = plan_batch_link(&orders, &[item_ref(1, 1), item_ref(2, 0)], &rules());
        let applied = commit_batch(&mut orders, &plan, &binding("WSA3HAC02101GH00"));
        assert_eq!(applied, 2);
        assert!(!orders[0].items[0].linked);
        assert!(orders[0].items[1].linked);
        assert!(orders[1].items[0].linked);
    }

    #[test]
    fn test_plan_skips_irrelevant_items() {
        let orders = vec![order(1, &["MO006", "REP-1"])];

        // ホワイトリスト方針では REP-1 は対象外
        let plan = plan_batch_link(&orders, &[item_ref(1, 0), item_ref(1, 1)], &rules());
        assert_eq!(plan.targets, vec![item_ref(1, 0)]);
        assert_eq!(plan.skipped, vec![item_ref(1, 1)]);

        // ルールなしは全明細が対象
        let plan = plan_batch_link(&orders, &[item_ref(1, 0), item_ref(1, 1)], &RuleSet::default());
        assert_eq!(plan.targets.len(), 2);
    }

    #[test]
    fn test_ensure_linkable_rejects_closed_orders() {
        let mut o = order(1, &["MO006"]);
        assert!(ensure_linkable(&o).is_ok());

        o.status = OrderStatus::Rejected;
        assert!(ensure_linkable(&o).is_ok());

        for status in [OrderStatus::Transmitted, OrderStatus::Completed] {
            o.status = status;
            match ensure_linkable(&o) {
                Err(Error::OrderClosed(number)) => assert_eq!(number, "OT-1"),
                other => panic!("想定外の結果: {:?}", other),
            }
        }
    }

    #[test]
    fn test_link_request_carries_item_fields() {
        let o = order(7, &["MO006"]);
        let request = link_request(&o, &o.items[0]);
        assert_eq!(request.order_number, "OT-7");
        assert_eq!(request.internal_code, "MO006");
        assert_eq!(request.description, "REVISION DE FRENOS");
    }

    #[test]
    fn test_can_transmit() {
        let mut o = order(1, &["MO006", "REP-1"]);
        assert!(!can_transmit(&o));

        apply_link(&mut o.items[1], &binding("X"));
        assert!(can_transmit(&o));

        o.status = OrderStatus::Transmitted;
        assert!(!can_transmit(&o));
    }

    #[test]
    fn test_unresolved_mandatory_items() {
        let mut o = order(1, &["MO006", "REP-1", " mo006"]);
        assert_eq!(unresolved_mandatory_items(&o, &rules()).len(), 2);

        apply_link(&mut o.items[0], &binding("X"));
        let unresolved = unresolved_mandatory_items(&o, &rules());
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].internal_code, " mo006");
    }

    #[test]
    fn test_validate_transmission_blocks_on_placeholders() {
        let mut o = order(1, &["MO006", "REP-1", "MO006"]);
        apply_link(&mut o.items[1], &binding("X"));

        match validate_transmission(&o, &rules()) {
            Err(Error::ValidationBlocked { order_number, codes }) => {
                assert_eq!(order_number, "OT-1");
                assert_eq!(codes, vec!["MO006".to_string()]);
            }
            other => panic!("想定外の結果: {:?}", other),
        }

        apply_link(&mut o.items[0], &binding("Y"));
        apply_link(&mut o.items[2], &binding("Y"));
        assert!(validate_transmission(&o, &rules()).is_ok());
    }

    #[test]
    fn test_validate_transmission_nothing_linked() {
        let o = order(1, &["REP-1"]);
        assert!(matches!(
            validate_transmission(&o, &rules()),
            Err(Error::NotTransmittable(_))
        ));
    }
}
