//! 照合処理のオーケストレーション
//!
//! ストア・AIプロバイダと照合エンジン（純粋関数）をつなぐ。
//! 一括連携は「計画 → 永続化 → 確定」の順で、永続化が成功するまで
//! 手元のオーダーには一切手を触れない。

use crate::ai_provider::{keyword_hints_or_empty, suggestions_or_empty, SuggestionProvider};
use crate::error::{ReconcileError, Result};
use crate::store::{CatalogStore, DateRange, LinkPersistence, OrderStore};
use chrono::Utc;
use opcode_reconcile_common::matcher::{DEFAULT_LISTING_LIMIT, DEFAULT_RANKING_LIMIT};
use opcode_reconcile_common::{
    apply_link, build_groups, classify, commit_batch, compute_stats, ensure_linkable, link_request, list_candidates,
    model_name, plan_batch_link, rank_candidates, validate_transmission, CatalogEntry, Classification, ClassificationRule,
    Error as EngineError, HistoryEntry, ItemRef, KeywordHints, LinkBinding, ModelGroup, OrderEvent,
    ReconciliationStats, RuleSet, ScoredCandidate, ServiceOrder, Suggestion,
};
use tracing::{debug, info, warn};

/// 明細1件の候補探索結果
#[derive(Debug, Clone, Default)]
pub struct CandidateReport {
    /// 照合に使った車両シリーズ文脈
    pub context: String,
    pub hints: KeywordHints,
    pub ranked: Vec<ScoredCandidate>,
    pub listing: Vec<CatalogEntry>,
    pub classification: Option<Classification>,
    /// 送信前に連携必須のプレースホルダーか
    pub mandatory: bool,
}

/// 一括連携の結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub linked: usize,
    pub skipped: Vec<ItemRef>,
    pub missing: Vec<ItemRef>,
}

pub struct Reconciler<'a> {
    catalog: &'a dyn CatalogStore,
    orders: &'a dyn OrderStore,
    links: &'a dyn LinkPersistence,
    ai: &'a dyn SuggestionProvider,
    rules: RuleSet,
    classification_rules: Vec<ClassificationRule>,
    listing_limit: usize,
    ranking_limit: usize,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        catalog: &'a dyn CatalogStore,
        orders: &'a dyn OrderStore,
        links: &'a dyn LinkPersistence,
        ai: &'a dyn SuggestionProvider,
        rules: RuleSet,
    ) -> Self {
        Self {
            catalog,
            orders,
            links,
            ai,
            rules,
            classification_rules: Vec::new(),
            listing_limit: DEFAULT_LISTING_LIMIT,
            ranking_limit: DEFAULT_RANKING_LIMIT,
        }
    }

    pub fn with_classification_rules(mut self, rules: Vec<ClassificationRule>) -> Self {
        self.classification_rules = rules;
        self
    }

    pub fn with_limits(mut self, listing_limit: usize, ranking_limit: usize) -> Self {
        self.listing_limit = listing_limit;
        self.ranking_limit = ranking_limit;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub async fn load_orders(&self, range: &DateRange, branch: Option<&str>) -> Result<Vec<ServiceOrder>> {
        let orders = self.orders.list_orders(range, branch).await?;
        info!(count = orders.len(), "オーダーを読み込みました");
        Ok(orders)
    }

    pub fn groups(&self, orders: &[ServiceOrder]) -> Vec<ModelGroup> {
        build_groups(orders, &self.rules)
    }

    pub fn stats(&self, orders: &[ServiceOrder]) -> ReconciliationStats {
        compute_stats(orders, &self.rules)
    }

    /// 明細の候補を探す（一覧 + AIキーワードのランキング）
    pub async fn candidates(&self, order: &ServiceOrder, item_index: usize, search: &str) -> Result<CandidateReport> {
        let item = order
            .items
            .get(item_index)
            .ok_or_else(|| ReconcileError::OrderNotFound(format!("{} #{}", order.order_number, item_index)))?;

        let catalog = self.catalog.list().await?;
        let context = model_name(order);

        let listing = list_candidates(&catalog, &context, search, self.listing_limit)
            .into_iter()
            .cloned()
            .collect();

        let hints = keyword_hints_or_empty(self.ai, &item.description).await;
        let ranked = rank_candidates(&catalog, &context, &hints.keywords, self.ranking_limit);
        debug!(context = %context, keywords = ?hints.keywords, ranked = ranked.len(), "候補を採点しました");

        Ok(CandidateReport {
            context,
            hints,
            ranked,
            listing,
            classification: classify(&item.description, &self.classification_rules),
            mandatory: self.rules.is_placeholder(&item.internal_code),
        })
    }

    /// AIによるコード提案（失敗時は空）
    pub async fn suggest(&self, description: &str, internal_code: &str, history: &[HistoryEntry]) -> Vec<Suggestion> {
        suggestions_or_empty(self.ai, description, internal_code, history).await
    }

    /// 1明細を連携（再連携は上書き）
    ///
    /// 送信済み・完了オーダーは OrderClosed エラーで、永続化も呼ばない。
    pub async fn link_item(&self, orders: &mut [ServiceOrder], target: ItemRef, entry: &CatalogEntry) -> Result<()> {
        let request = {
            let order = orders
                .iter()
                .find(|o| o.id == target.order_id)
                .ok_or_else(|| ReconcileError::OrderNotFound(target.order_id.to_string()))?;
            let item = order.items.get(target.item_index).ok_or_else(|| {
                ReconcileError::OrderNotFound(format!("{} #{}", order.order_number, target.item_index))
            })?;
            ensure_linkable(order)?;
            link_request(order, item)
        };

        let binding = binding_for(entry);
        self.links
            .link_item(&request, &binding)
            .await
            .map_err(|e| persistence_error(1, e))?;

        if let Some(order) = orders.iter_mut().find(|o| o.id == target.order_id) {
            if let Some(item) = order.items.get_mut(target.item_index) {
                apply_link(item, &binding);
            }
            order.events.push(link_event(&request.internal_code, &binding));
        }
        info!(code = %request.internal_code, factory_code = %binding.factory_code, "連携しました");
        Ok(())
    }

    /// 一括連携
    ///
    /// 永続化に失敗した場合は Persistence エラー（対象件数つき）を返し、
    /// どの明細も連携済みにしない。
    pub async fn link_batch(
        &self,
        orders: &mut [ServiceOrder],
        refs: &[ItemRef],
        entry: &CatalogEntry,
    ) -> Result<BatchOutcome> {
        let plan = plan_batch_link(orders, refs, &self.rules);
        let mut outcome = BatchOutcome {
            linked: 0,
            skipped: plan.skipped.clone(),
            missing: plan.missing.clone(),
        };
        if plan.is_empty() {
            info!(skipped = plan.skipped.len(), "一括連携の対象がありません");
            return Ok(outcome);
        }

        let binding = binding_for(entry);
        if let Err(e) = self.links.link_batch(&plan.requests, &binding).await {
            warn!(affected = plan.targets.len(), error = %e, "一括連携を中止しました（変更なし）");
            return Err(persistence_error(plan.targets.len(), e));
        }

        outcome.linked = commit_batch(orders, &plan, &binding);
        for (target, request) in plan.targets.iter().zip(&plan.requests) {
            if let Some(order) = orders.iter_mut().find(|o| o.id == target.order_id) {
                order.events.push(link_event(&request.internal_code, &binding));
            }
        }

        info!(
            linked = outcome.linked,
            skipped = outcome.skipped.len(),
            factory_code = %binding.factory_code,
            "一括連携しました"
        );
        Ok(outcome)
    }

    /// 送信前チェック
    pub fn check(&self, order: &ServiceOrder) -> Result<()> {
        Ok(validate_transmission(order, &self.rules)?)
    }
}

/// マスタ行から紐付け内容を作る
pub fn binding_for(entry: &CatalogEntry) -> LinkBinding {
    LinkBinding {
        factory_code: entry.factory_code.clone(),
        kind: entry.kind,
        description: entry.description.clone(),
    }
}

fn link_event(internal_code: &str, binding: &LinkBinding) -> OrderEvent {
    OrderEvent {
        at: Utc::now(),
        message: format!("{} -> {} ({})", internal_code, binding.factory_code, binding.kind),
    }
}

fn persistence_error(affected: usize, source: ReconcileError) -> ReconcileError {
    ReconcileError::Common(EngineError::Persistence {
        affected,
        message: source.to_string(),
    })
}
