use anyhow::Context;
use clap::Parser;
use dialoguer::Confirm;
use opcode_reconcile::{cli, config, error, export, importer, reconciler, store};
use opcode_reconcile::ai_provider::{create_provider, SuggestionProvider};
use opcode_reconcile_common::text::normalize;
use opcode_reconcile_common::{find_entry, list_candidates, CatalogEntry, ItemRef, RuleSet, ServiceOrder};
use cli::{CatalogAction, Cli, Commands, OrderFilter, RulesAction};
use config::Config;
use error::ReconcileError;
use reconciler::Reconciler;
use store::{CatalogStore, DateRange, JsonStore};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load().context("設定の読み込みに失敗しました")?;
    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => config.data_dir()?,
    };
    let store = JsonStore::new(data_dir);
    let ai = create_provider(cli.ai_provider.unwrap_or(config.ai_provider), config.ai_timeout_seconds);

    match cli.command {
        Commands::Import { file, series } => {
            println!("📥 opcode-reconcile - マスタ取込\n");

            let report = importer::import_catalog(&store, &file, &config.rule_set(), series, true)
                .await
                .with_context(|| format!("取込に失敗しました: {}", file.display()))?;

            if let Some(mapping) = &report.mapping {
                println!("列判定:");
                println!("  コード: {}", mapping.code);
                println!("  説明: {}", mapping.description.as_deref().unwrap_or("-"));
                println!("  シリーズ: {}", mapping.series.as_deref().unwrap_or("-"));
                println!("  作業時間: {}", mapping.hours.as_deref().unwrap_or("-"));
            }
            println!("\n✔ 登録: {}件", report.created.len());
            if report.duplicates > 0 {
                println!("- 重複スキップ: {}件", report.duplicates);
            }
            if !report.skipped_rows.is_empty() {
                println!("- コード空欄スキップ: {}行", report.skipped_rows.len());
            }
        }

        Commands::Catalog { action } => match action {
            CatalogAction::List { series, search } => {
                let catalog = store.list().await?;
                let entries: Vec<&CatalogEntry> = match series.as_deref() {
                    Some(context) => list_candidates(&catalog, context, &search, config.listing_limit),
                    None => {
                        let term = normalize(&search);
                        catalog
                            .iter()
                            .filter(|e| term.is_empty() || normalize(&e.description).contains(&term))
                            .take(config.listing_limit)
                            .collect()
                    }
                };

                println!("マスタ: {}件中 {}件表示", catalog.len(), entries.len());
                for entry in entries {
                    print_entry(entry);
                }
            }
            CatalogAction::Delete { id } => {
                store.delete(id).await?;
                println!("✔ マスタ行を削除しました: {}", id);
            }
        },

        Commands::Groups { filter, export: export_path } => {
            let reconciler = build_reconciler(&store, ai.as_ref(), &config);
            let orders = reconciler.load_orders(&date_range(&filter), filter.branch.as_deref()).await?;
            let groups = reconciler.groups(&orders);

            if groups.is_empty() {
                println!("✓ 未連携の明細はありません");
            }
            for group in &groups {
                println!("■ {} ({}件)", group.key, group.count);
                for grouped in &group.items {
                    let mark = if reconciler.rules().is_placeholder(&grouped.item.internal_code) { "!" } else { " " };
                    println!(
                        "  {} {} #{} {} {}",
                        mark, grouped.order_number, grouped.item_index, grouped.item.internal_code, grouped.item.description
                    );
                }
            }

            if let Some(path) = export_path {
                export::generate_group_report(&groups, reconciler.rules(), &path)?;
                println!("\n✔ Excelを出力: {}", path.display());
            }
        }

        Commands::Suggest { order, item, search, history } => {
            let reconciler = build_reconciler(&store, ai.as_ref(), &config);
            let orders = reconciler.load_orders(&DateRange::default(), None).await?;
            let order = &orders[find_order(&orders, &order)?];
            let line = order
                .items
                .get(item)
                .ok_or_else(|| ReconcileError::OrderNotFound(format!("{} #{}", order.order_number, item)))?;

            println!("🔎 {} #{} {} {}", order.order_number, item, line.internal_code, line.description);
            let report = reconciler.candidates(order, item, &search).await?;
            println!("  車種: {}", report.context);
            if report.mandatory {
                println!("  ⚠ 送信前に連携が必要なコードです");
            }
            if let Some(c) = &report.classification {
                println!("  分類: {} {} ({:?})", c.icon, c.category, c.priority);
            }
            if !report.hints.is_empty() {
                println!("  キーワード: {} ({})", report.hints.keywords.join(", "), report.hints.translation);
            }

            println!("\nスコア順 ({}件):", report.ranked.len());
            for candidate in &report.ranked {
                let hits: Vec<String> = candidate
                    .hits
                    .iter()
                    .map(|h| format!("{}:{:?}+{}", h.keyword, h.kind, h.points))
                    .collect();
                println!(
                    "  [{:>3}] {} {} ({})",
                    candidate.match_score,
                    candidate.entry.factory_code,
                    candidate.entry.description,
                    hits.join(" ")
                );
            }

            println!("\n一覧 ({}件):", report.listing.len());
            for entry in &report.listing {
                print_entry(entry);
            }

            if history {
                let past = store.link_history(&line.internal_code).await?;
                let suggestions = reconciler.suggest(&line.description, &line.internal_code, &past).await;
                println!("\nAI提案 ({}件、履歴{}件):", suggestions.len(), past.len());
                for s in &suggestions {
                    println!("  {:.2} {} {} - {}", s.confidence, s.factory_code, s.description, s.reasoning);
                }
            }
        }

        Commands::Link { order, item, code, yes } => {
            let reconciler = build_reconciler(&store, ai.as_ref(), &config);
            let mut orders = reconciler.load_orders(&DateRange::default(), None).await?;
            let idx = find_order(&orders, &order)?;
            let catalog = store.list().await?;
            let context = opcode_reconcile_common::model_name(&orders[idx]);
            let entry = match select_entry(&catalog, &code, &context, yes)? {
                Some(entry) => entry,
                None => {
                    println!("中止しました");
                    return Ok(());
                }
            };

            let target = ItemRef {
                order_id: orders[idx].id,
                item_index: item,
            };
            reconciler.link_item(&mut orders, target, entry).await?;
            store.save_orders(&orders[idx..=idx]).await?;
            println!("✔ {} #{} → {}", orders[idx].order_number, item, entry.factory_code);
        }

        Commands::LinkGroup { group, code, yes, filter } => {
            let reconciler = build_reconciler(&store, ai.as_ref(), &config);
            let mut orders = reconciler.load_orders(&date_range(&filter), filter.branch.as_deref()).await?;
            let groups = reconciler.groups(&orders);
            let key = normalize(&group);
            let target = groups
                .iter()
                .find(|g| g.key == key)
                .ok_or_else(|| anyhow::anyhow!("グループが見つかりません: {}", group))?;

            let catalog = store.list().await?;
            let entry = match select_entry(&catalog, &code, &target.model_name, yes)? {
                Some(entry) => entry,
                None => {
                    println!("中止しました");
                    return Ok(());
                }
            };

            println!("■ {} ({}件) → {} {}", target.key, target.count, entry.factory_code, entry.description);
            let confirmed = yes
                || Confirm::new()
                    .with_prompt(format!("{}件を一括連携しますか？", target.count))
                    .default(false)
                    .interact()?;
            if !confirmed {
                println!("中止しました");
                return Ok(());
            }

            let refs: Vec<ItemRef> = target.items.iter().map(ItemRef::from).collect();
            let outcome = match reconciler.link_batch(&mut orders, &refs, entry).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    if let Some(affected) = e.affected_items() {
                        println!("✗ {}件は未連携のままです", affected);
                    }
                    return Err(e.into());
                }
            };
            store.save_orders(&orders).await?;
            println!("✔ 一括連携: {}件", outcome.linked);
            if !outcome.skipped.is_empty() {
                println!("- スキップ: {}件", outcome.skipped.len());
            }
        }

        Commands::Check { order } => {
            let reconciler = build_reconciler(&store, ai.as_ref(), &config);
            let orders = reconciler.load_orders(&DateRange::default(), None).await?;
            let targets: Vec<&ServiceOrder> = match order {
                Some(number) => vec![&orders[find_order(&orders, &number)?]],
                None => orders.iter().filter(|o| !o.status.is_terminal()).collect(),
            };

            let mut blocked = 0;
            for order in targets {
                match reconciler.check(order) {
                    Ok(()) => println!("✔ {} 送信可能", order.order_number),
                    Err(e) => {
                        blocked += 1;
                        println!("✗ {}", e);
                    }
                }
            }
            if blocked > 0 {
                println!("\n{}件のオーダーは送信できません", blocked);
            }
        }

        Commands::Stats { filter } => {
            let reconciler = build_reconciler(&store, ai.as_ref(), &config);
            let orders = reconciler.load_orders(&date_range(&filter), filter.branch.as_deref()).await?;
            let stats = reconciler.stats(&orders);
            println!("連携状況:");
            println!("  対象オーダー: {}", stats.open_orders);
            println!("  送信済み・完了: {}", stats.terminal_orders);
            println!("  未連携明細: {}", stats.pending_items);
            println!("  うち必須: {}", stats.mandatory_pending);
            println!("  連携済み明細: {}", stats.linked_items);
            println!("  グループ数: {}", stats.groups);
        }

        Commands::Rules { action } => {
            let mut rules = config.rule_set();
            match action {
                RulesAction::List => {
                    print_rules(&rules);
                    return Ok(());
                }
                RulesAction::Activate { id } => {
                    rules.activate(id).map_err(ReconcileError::from)?;
                    println!("✔ ルール{}を有効化しました", id);
                }
                RulesAction::Remove { id } => {
                    let removed = rules.remove(id).map_err(ReconcileError::from)?;
                    println!("✔ ルールを削除しました: {}", removed.name);
                }
                RulesAction::Add { name, codes, category, hours, activate } => {
                    let id = rules.next_id();
                    rules.add(opcode_reconcile_common::AdmissionRule {
                        id,
                        name,
                        active: activate,
                        placeholder_codes: codes.iter().map(|c| normalize(c)).filter(|c| !c.is_empty()).collect(),
                        default_category: category,
                        default_hours: hours,
                    });
                    println!("✔ ルール{}を追加しました", id);
                }
            }
            config.set_rule_set(rules);
            config.save()?;
            print_rules(&config.rule_set());
        }

        Commands::Config { show, set_data_dir, set_ai_provider } => {
            let mut changed = false;
            if let Some(dir) = set_data_dir {
                config.data_dir = Some(dir);
                changed = true;
            }
            if let Some(provider) = set_ai_provider {
                config.ai_provider = provider;
                changed = true;
            }
            if changed {
                config.save()?;
                println!("✔ 設定を保存しました");
            }

            if show || !changed {
                println!("設定:");
                println!("  設定ファイル: {}", Config::config_path()?.display());
                println!("  データ: {}", store.dir().display());
                println!("  AIプロバイダ: {}", config.ai_provider);
                println!("  AIタイムアウト: {}秒", config.ai_timeout_seconds);
                println!("  一覧上限: {}", config.listing_limit);
                println!("  スコア順上限: {}", config.ranking_limit);
                println!("  分類ルール: {}件", config.classification_rules.len());
            }
        }
    }

    Ok(())
}

fn build_reconciler<'a>(store: &'a JsonStore, ai: &'a dyn SuggestionProvider, config: &Config) -> Reconciler<'a> {
    Reconciler::new(store, store, store, ai, config.rule_set())
        .with_classification_rules(config.classification_rules.clone())
        .with_limits(config.listing_limit, config.ranking_limit)
}

fn date_range(filter: &OrderFilter) -> DateRange {
    DateRange::new(filter.from, filter.to)
}

fn find_order(orders: &[ServiceOrder], number: &str) -> error::Result<usize> {
    let number = normalize(number);
    orders
        .iter()
        .position(|o| normalize(&o.order_number) == number)
        .ok_or(ReconcileError::OrderNotFound(number))
}

/// コードが一致するマスタ行を選ぶ
///
/// シリーズ文脈に合う行がなく別シリーズの行で代用する場合は警告を出し、
/// `--yes` がなければ確認する。None は中止。
fn select_entry<'a>(
    catalog: &'a [CatalogEntry],
    code: &str,
    context: &str,
    yes: bool,
) -> anyhow::Result<Option<&'a CatalogEntry>> {
    let found = find_entry(catalog, code, context).ok_or_else(|| ReconcileError::EntryNotFound(normalize(code)))?;
    if found.in_series {
        return Ok(Some(found.entry));
    }

    println!(
        "⚠ {} は {} のシリーズにありません（マスタのシリーズ: {}）",
        found.entry.factory_code,
        context,
        found.entry.series.as_deref().unwrap_or("-")
    );
    let confirmed = yes
        || Confirm::new()
            .with_prompt("別シリーズの行で連携しますか？")
            .default(false)
            .interact()?;
    Ok(confirmed.then_some(found.entry))
}

fn print_entry(entry: &CatalogEntry) {
    println!(
        "  {:>5} {} [{}] {} {}",
        entry.id,
        entry.factory_code,
        entry.kind,
        entry.series.as_deref().unwrap_or("-"),
        entry.description
    );
}

fn print_rules(rules: &RuleSet) {
    println!("対象判定ルール:");
    for rule in rules.rules() {
        let mark = if rule.active { "*" } else { " " };
        let codes = if rule.placeholder_codes.is_empty() {
            "（全明細）".to_string()
        } else {
            rule.placeholder_codes.join(", ")
        };
        println!("  {} {:>3} {} - {}", mark, rule.id, rule.name, codes);
    }
}
