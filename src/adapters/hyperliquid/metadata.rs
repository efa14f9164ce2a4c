//! Asset metadata
//!
//! Resolves symbol → asset id, size decimals, tick size and reference prices
//! from `/info metaAndAssetCtxs`. The endpoint has been seen in several shapes:
//!
//! - `[{"universe": [...]}, [ctx, ctx, ...]]` (current API)
//! - `{"universe": [...], "assetCtxs": [...]}`
//! - `{"assetCtxs": [...]}` where each entry carries both names and prices
//!
//! Universe entries and contexts are joined by list index.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::adapters::errors::{ExchangeError, ExchangeResult};

use super::actions::OrderWire;
use super::orders::{build_order, OrderSpec};
use super::rest::ExchangeTransport;

/// Static and reference data for one asset
#[derive(Debug, Clone, PartialEq)]
pub struct AssetMeta {
    /// Upper-case symbol
    pub symbol: String,
    pub asset_id: u32,
    pub sz_decimals: u32,
    pub px_decimals: Option<u32>,
    /// `10^-px_decimals` when `px_decimals` is known
    pub tick_size: Option<Decimal>,
    pub mid_px: Option<f64>,
    pub oracle_px: Option<f64>,
}

impl AssetMeta {
    /// Build a wire order for this asset, rounded to its tick and size decimals
    pub fn build_order(&self, spec: &OrderSpec) -> ExchangeResult<OrderWire> {
        if spec.asset_id != self.asset_id {
            return Err(ExchangeError::Config(format!(
                "Order for asset {} built with metadata of {} ({})",
                spec.asset_id, self.symbol, self.asset_id
            )));
        }
        build_order(spec, self.tick_size, self.sz_decimals)
    }
}

const PRICE_KEYS: [&str; 4] = ["midPx", "oraclePx", "indexPx", "markPx"];

fn as_object_list(value: Option<&Value>) -> Option<&Vec<Value>> {
    value.and_then(Value::as_array)
}

fn blocks_of(obj: &Value) -> (Option<&Vec<Value>>, Option<&Vec<Value>>) {
    (
        as_object_list(obj.get("universe")),
        as_object_list(obj.get("assetCtxs")),
    )
}

/// Split a raw response into (universe, asset contexts)
fn extract_blocks(raw: &Value) -> (Option<&Vec<Value>>, Option<&Vec<Value>>) {
    let (mut universe, mut ctxs) = match raw {
        Value::Object(_) => blocks_of(raw),
        _ => (None, None),
    };

    if let Value::Array(elements) = raw {
        for element in elements {
            match element {
                Value::Object(_) => {
                    let (u, c) = blocks_of(element);
                    universe = u.or(universe);
                    ctxs = c.or(ctxs);
                }
                Value::Array(list) => {
                    let looks_like_ctxs = list
                        .first()
                        .and_then(Value::as_object)
                        .map(|first| PRICE_KEYS.iter().any(|k| first.contains_key(*k)))
                        .unwrap_or(false);
                    if looks_like_ctxs {
                        ctxs = Some(list);
                    }
                }
                _ => {}
            }
        }
    }

    if universe.is_none() {
        universe = as_object_list(raw.get("assets")).or(ctxs);
    }
    (universe, ctxs)
}

/// Numbers or numeric strings (the live API sends prices as strings)
fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn integer(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Build the symbol index from a `metaAndAssetCtxs` response
pub fn parse_asset_meta(raw: &Value) -> HashMap<String, AssetMeta> {
    let (universe, ctxs) = extract_blocks(raw);
    let Some(universe) = universe else {
        tracing::warn!("metaAndAssetCtxs response has no universe");
        return HashMap::new();
    };

    let mut index = HashMap::with_capacity(universe.len());
    for (idx, entry) in universe.iter().enumerate() {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        let Some(symbol) = ["name", "symbol", "asset"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
        else {
            continue;
        };

        let asset_id = ["id", "assetId", "a"]
            .iter()
            .find_map(|k| integer(obj.get(*k)))
            .and_then(|id| u32::try_from(id).ok())
            .unwrap_or(idx as u32);
        let sz_decimals = integer(obj.get("szDecimals")).unwrap_or(0) as u32;
        let px_decimals = integer(obj.get("pxDecimals")).map(|d| d as u32);
        let tick_size = px_decimals
            .filter(|d| *d <= 28)
            .map(|d| Decimal::new(1, d));

        let ctx = ctxs.and_then(|c| c.get(idx)).and_then(Value::as_object);
        let mid_px = ctx.and_then(|c| number(c.get("midPx")));
        let oracle_px = ctx.and_then(|c| number(c.get("oraclePx")).or_else(|| number(c.get("indexPx"))));

        let meta = AssetMeta {
            symbol: symbol.to_uppercase(),
            asset_id,
            sz_decimals,
            px_decimals,
            tick_size,
            mid_px,
            oracle_px,
        };
        index.insert(meta.symbol.clone(), meta);
    }
    index
}

/// Lazily loaded symbol → [`AssetMeta`] index
pub struct MetadataResolver {
    transport: Arc<ExchangeTransport>,
    index: RwLock<HashMap<String, AssetMeta>>,
}

impl MetadataResolver {
    pub fn new(transport: Arc<ExchangeTransport>) -> Self {
        Self {
            transport,
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch `metaAndAssetCtxs` and rebuild the index
    pub async fn refresh(&self) -> ExchangeResult<usize> {
        let raw = self.transport.meta_and_asset_ctxs().await?;
        let fresh = parse_asset_meta(&raw);
        let count = fresh.len();
        *self.index.write().await = fresh;
        tracing::info!(assets = count, "Asset metadata refreshed");
        Ok(count)
    }

    /// Metadata for `symbol` (case-insensitive); loads the index on first use
    pub async fn get(&self, symbol: &str) -> ExchangeResult<Option<AssetMeta>> {
        if self.index.read().await.is_empty() {
            self.refresh().await?;
        }
        if symbol.is_empty() {
            return Ok(None);
        }
        Ok(self.index.read().await.get(&symbol.to_uppercase()).cloned())
    }

    /// Like [`Self::get`], but a missing symbol is an error
    pub async fn require(&self, symbol: &str) -> ExchangeResult<AssetMeta> {
        self.get(symbol)
            .await?
            .ok_or_else(|| ExchangeError::Config(format!("Asset metadata not found: {}", symbol)))
    }
}
