// ==========================================
// 库存批量导入 - 分类器
// ==========================================
// 三级匹配（先命中先生效）:
//   1. 精确匹配: 编码逐字节相等（区分大小写）        → VALID / EXACT
//   2. 归一化匹配: 大小写折叠 + 去空白/标点后相等    → VALID / NORMALIZED
//   3. 模糊建议: 相似度 ≥ 阈值                        → SUGGESTED
//   4. 其他                                           → ERROR "product not found"
// 仓库走相同策略；数量 < 最小阈值强制 ERROR "invalid quantity"
// ==========================================
// 性能: 目录查询按"去重后的编码"进行并限制并发，
//       预览延迟与不同编码数成正比，而非行数
// ==========================================

use crate::domain::inventory::{ClassifiedRow, FieldResolution, RawRow};
use crate::domain::types::MatchKind;
use crate::engine::similarity::{best_match, FuzzyCandidate, FuzzyMatch};
use crate::importer::data_cleaner::{is_valid_quantity, normalize_code};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_trait::CatalogResolver;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// 分类器参数
#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub fuzzy_threshold: u8,
    pub min_quantity: f64,
    pub resolver_concurrency: usize,
    pub use_description: bool,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 70,
            min_quantity: 0.0001,
            resolver_concurrency: 8,
            use_description: false,
        }
    }
}

/// 精确/归一化阶段的命中结果
type DirectHit = Option<(i64, MatchKind)>;

/// 单批次内的解析缓存（按去重编码）
#[derive(Debug, Default)]
struct ResolutionCache {
    products: HashMap<String, DirectHit>,
    product_suggestions: HashMap<(String, Option<String>), Option<FuzzyMatch>>,
    warehouses: HashMap<String, DirectHit>,
    warehouse_suggestions: HashMap<String, Option<FuzzyMatch>>,
}

// ==========================================
// Classifier
// ==========================================
pub struct Classifier {
    resolver: Arc<dyn CatalogResolver>,
    settings: ClassifierSettings,
}

impl Classifier {
    pub fn new(resolver: Arc<dyn CatalogResolver>, settings: ClassifierSettings) -> Self {
        Self { resolver, settings }
    }

    pub fn settings(&self) -> &ClassifierSettings {
        &self.settings
    }

    /// 分类单行
    pub async fn classify_row(&self, raw: RawRow) -> ImportResult<ClassifiedRow> {
        self.classify_batch(vec![raw])
            .await?
            .pop()
            .ok_or_else(|| ImportError::InternalError("分类结果为空".to_string()))
    }

    /// 分类整批
    ///
    /// # 返回
    /// - 与输入等长、同序的分类行（行数守恒）
    #[instrument(skip(self, rows), fields(total_rows = rows.len()))]
    pub async fn classify_batch(&self, rows: Vec<RawRow>) -> ImportResult<Vec<ClassifiedRow>> {
        let mut cache = ResolutionCache::default();

        // === 步骤 1: 去重编码 ===
        let product_codes: BTreeSet<String> =
            rows.iter().filter_map(|r| r.product_code.clone()).collect();
        let warehouse_labels: BTreeSet<String> =
            rows.iter().filter_map(|r| r.warehouse_label.clone()).collect();
        debug!(
            distinct_products = product_codes.len(),
            distinct_warehouses = warehouse_labels.len(),
            "去重编码完成"
        );

        // === 步骤 2: 精确/归一化匹配（并发受限）===
        cache.products = self.resolve_products(product_codes).await?;
        cache.warehouses = self.resolve_warehouses(warehouse_labels).await?;

        // === 步骤 3: 未命中的编码做模糊建议 ===
        self.suggest_products(&rows, &mut cache).await?;
        self.suggest_warehouses(&mut cache).await?;

        // === 步骤 4: 逐行组装 ===
        let classified: Vec<ClassifiedRow> = rows
            .into_iter()
            .map(|raw| self.assemble(raw, &cache))
            .collect();

        info!(
            distinct_products = cache.products.len(),
            distinct_warehouses = cache.warehouses.len(),
            "分类完成"
        );
        Ok(classified)
    }

    fn concurrency(&self) -> usize {
        self.settings.resolver_concurrency.max(1)
    }

    async fn resolve_products(
        &self,
        codes: BTreeSet<String>,
    ) -> ImportResult<HashMap<String, DirectHit>> {
        let resolver = self.resolver.clone();
        stream::iter(codes.into_iter().map(move |code| {
            let resolver = resolver.clone();
            async move {
                let hit = resolve_product_direct(resolver.as_ref(), &code).await?;
                Ok::<_, ImportError>((code, hit))
            }
        }))
        .buffer_unordered(self.concurrency())
        .try_collect()
        .await
    }

    async fn resolve_warehouses(
        &self,
        labels: BTreeSet<String>,
    ) -> ImportResult<HashMap<String, DirectHit>> {
        let resolver = self.resolver.clone();
        stream::iter(labels.into_iter().map(move |label| {
            let resolver = resolver.clone();
            async move {
                let hit = resolve_warehouse_direct(resolver.as_ref(), &label).await?;
                Ok::<_, ImportError>((label, hit))
            }
        }))
        .buffer_unordered(self.concurrency())
        .try_collect()
        .await
    }

    async fn suggest_products(
        &self,
        rows: &[RawRow],
        cache: &mut ResolutionCache,
    ) -> ImportResult<()> {
        let mut pending: BTreeSet<(String, Option<String>)> = BTreeSet::new();
        for row in rows {
            if let Some(code) = &row.product_code {
                if matches!(cache.products.get(code), Some(None)) {
                    pending.insert((code.clone(), self.description_key(row)));
                }
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        // 目录快照仅在需要时拉取一次
        let snapshot = self.resolver.list_products().await?;
        let candidates: Vec<FuzzyCandidate<'_>> = snapshot
            .iter()
            .map(|p| FuzzyCandidate {
                id: p.product_id,
                code: p.code.as_str(),
                alt_text: if self.settings.use_description {
                    p.description.as_deref()
                } else {
                    None
                },
            })
            .collect();

        for (code, description) in pending {
            let found = best_match(
                &code,
                description.as_deref(),
                &candidates,
                self.settings.fuzzy_threshold,
            );
            debug!(code = %code, suggestion = ?found, "产品模糊建议");
            cache.product_suggestions.insert((code, description), found);
        }
        Ok(())
    }

    async fn suggest_warehouses(&self, cache: &mut ResolutionCache) -> ImportResult<()> {
        let pending: Vec<String> = cache
            .warehouses
            .iter()
            .filter(|(_, hit)| hit.is_none())
            .map(|(label, _)| label.clone())
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let snapshot = self.resolver.list_warehouses().await?;
        // 名称与编码都参与比对，取较高分
        let candidates: Vec<FuzzyCandidate<'_>> = snapshot
            .iter()
            .map(|w| FuzzyCandidate {
                id: w.warehouse_id,
                code: w.name.as_str(),
                alt_text: Some(w.code.as_str()),
            })
            .collect();

        for label in pending {
            let found = best_match(&label, Some(&label), &candidates, self.settings.fuzzy_threshold);
            debug!(label = %label, suggestion = ?found, "仓库模糊建议");
            cache.warehouse_suggestions.insert(label, found);
        }
        Ok(())
    }

    fn description_key(&self, row: &RawRow) -> Option<String> {
        if self.settings.use_description {
            row.description.clone()
        } else {
            None
        }
    }

    fn assemble(&self, raw: RawRow, cache: &ResolutionCache) -> ClassifiedRow {
        let product = match &raw.product_code {
            None => FieldResolution::Missing,
            Some(code) => match cache.products.get(code) {
                Some(Some((id, kind))) => FieldResolution::Matched { id: *id, kind: *kind },
                _ => {
                    let key = (code.clone(), self.description_key(&raw));
                    to_resolution(cache.product_suggestions.get(&key))
                }
            },
        };

        let warehouse = match &raw.warehouse_label {
            None => FieldResolution::Missing,
            Some(label) => match cache.warehouses.get(label) {
                Some(Some((id, kind))) => FieldResolution::Matched { id: *id, kind: *kind },
                _ => to_resolution(cache.warehouse_suggestions.get(label)),
            },
        };

        let quantity_ok = is_valid_quantity(raw.quantity, self.settings.min_quantity);

        ClassifiedRow {
            raw,
            product,
            warehouse,
            quantity_ok,
            suggestion_accepted: false,
        }
    }
}

fn to_resolution(suggestion: Option<&Option<FuzzyMatch>>) -> FieldResolution {
    match suggestion {
        Some(Some(m)) => FieldResolution::Suggested {
            candidate_id: m.id,
            candidate_label: m.code.clone(),
            score: m.score,
        },
        _ => FieldResolution::Unresolved,
    }
}

/// 产品: 精确 → 归一化
async fn resolve_product_direct(
    resolver: &dyn CatalogResolver,
    code: &str,
) -> ImportResult<DirectHit> {
    if let Some(product) = resolver.find_product_by_code(code).await? {
        return Ok(Some((product.product_id, MatchKind::Exact)));
    }

    let key = normalize_code(code);
    if key.is_empty() {
        return Ok(None);
    }

    // 归一化键冲突时取字典序最小的编码
    let hit = resolver
        .find_products_by_normalized_code(&key)
        .await?
        .into_iter()
        .min_by(|a, b| a.code.cmp(&b.code))
        .map(|p| (p.product_id, MatchKind::Normalized));
    Ok(hit)
}

/// 仓库: 精确 → 归一化
async fn resolve_warehouse_direct(
    resolver: &dyn CatalogResolver,
    label: &str,
) -> ImportResult<DirectHit> {
    if let Some(warehouse) = resolver.find_warehouse(label).await? {
        return Ok(Some((warehouse.warehouse_id, MatchKind::Exact)));
    }

    let key = normalize_code(label);
    if key.is_empty() {
        return Ok(None);
    }

    let hit = resolver
        .find_warehouses_by_normalized(&key)
        .await?
        .into_iter()
        .min_by(|a, b| a.name.cmp(&b.name))
        .map(|w| (w.warehouse_id, MatchKind::Normalized));
    Ok(hit)
}
