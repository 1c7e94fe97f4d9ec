//! 車種・年式グルーピング
//!
//! 全オーダーの未連携明細を「車種名 + 年式」でまとめ、一括連携の単位にする。
//!
//! 車種名はモデル説明の先頭2語のみを使う。"SONG PLUS 2025 BC DM-I" と
//! "SONG PLUS 2025 BL DM-I" は同じグループになる。先頭2語が同じ別グレードを
//! まとめてしまう・語順の違う表記をまとめられない、という既知の限界がある。

use crate::rules::RuleSet;
use crate::text::normalize;
use crate::types::{OrderLineItem, ServiceOrder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// モデル情報がないオーダーの車種名
pub const UNKNOWN_MODEL: &str = "SIN MODELO";

/// グループ内の1明細
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedItem {
    pub order_id: u64,
    pub order_number: String,
    pub vehicle_id: String,
    /// オーダー内の明細位置
    pub item_index: usize,
    pub item: OrderLineItem,
}

/// 車種・年式グループ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelGroup {
    pub key: String,
    pub model_name: String,
    pub year: Option<i32>,
    pub items: Vec<GroupedItem>,
    pub count: usize,
}

/// 車種名（モデル説明の先頭2語 → モデルコード → プレースホルダー）
///
/// 候補照合のシリーズ文脈にもこの値を使う。
pub fn model_name(order: &ServiceOrder) -> String {
    let from_description = order
        .model_description
        .as_deref()
        .map(|d| {
            normalize(d)
                .split(' ')
                .filter(|t| !t.is_empty())
                .take(2)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|name| !name.is_empty());

    from_description
        .or_else(|| {
            order
                .model_code
                .as_deref()
                .map(normalize)
                .filter(|code| !code.is_empty())
        })
        .unwrap_or_else(|| UNKNOWN_MODEL.to_string())
}

/// グループキー（車種名 + 年式）
pub fn group_key(order: &ServiceOrder) -> String {
    let name = model_name(order);
    match order.year {
        Some(year) => format!("{} {}", name, year),
        None => name,
    }
}

/// 未連携かつ対象の明細をグループ化する
///
/// - 送信済み・完了オーダーは対象外
/// - 結果はキーの辞書順
/// - 同じ入力には常に同じ順序の結果を返す
pub fn build_groups(orders: &[ServiceOrder], rules: &RuleSet) -> Vec<ModelGroup> {
    let mut groups: BTreeMap<String, ModelGroup> = BTreeMap::new();

    for order in orders.iter().filter(|o| !o.status.is_terminal()) {
        let key = group_key(order);

        for (item_index, item) in order.items.iter().enumerate() {
            if item.linked || !rules.is_relevant(&item.internal_code) {
                continue;
            }

            let group = groups.entry(key.clone()).or_insert_with(|| ModelGroup {
                key: key.clone(),
                model_name: model_name(order),
                year: order.year,
                items: Vec::new(),
                count: 0,
            });
            group.items.push(GroupedItem {
                order_id: order.id,
                order_number: order.order_number.clone(),
                vehicle_id: order.vehicle_id.clone(),
                item_index,
                item: item.clone(),
            });
            group.count += 1;
        }
    }

    groups.into_values().filter(|g| g.count > 0).collect()
}
