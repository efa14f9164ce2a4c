//! Order wire builders
//!
//! Turns a caller-side [`OrderSpec`] into an [`OrderWire`]: price rounded down
//! to the asset tick, size rounded down to `szDecimals`, both encoded as
//! decimal strings without trailing zeros. Minimum-notional and margin checks
//! stay with the caller.

use rust_decimal::prelude::*;
use uuid::Uuid;

use crate::adapters::errors::{ExchangeError, ExchangeResult};

use super::actions::{LimitWire, OrderTypeWire, OrderWire, Tif, Tpsl, TriggerWire};

/// Order description as the caller thinks of it
#[derive(Debug, Clone)]
pub struct OrderSpec {
    pub asset_id: u32,
    pub is_buy: bool,
    /// Limit price; for market-style orders pass the slippage-bounded price
    /// and use `Tif::Ioc`
    pub px: f64,
    pub sz: f64,
    pub reduce_only: bool,
    pub tif: Tif,
    pub cloid: Option<String>,
}

impl OrderSpec {
    pub fn limit(asset_id: u32, is_buy: bool, px: f64, sz: f64) -> Self {
        Self {
            asset_id,
            is_buy,
            px,
            sz,
            reduce_only: false,
            tif: Tif::Gtc,
            cloid: None,
        }
    }

    pub fn with_tif(mut self, tif: Tif) -> Self {
        self.tif = tif;
        self
    }

    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }

    pub fn with_cloid(mut self, cloid: impl Into<String>) -> Self {
        self.cloid = Some(cloid.into());
        self
    }
}

/// Random 16-byte client order id, `0x` + 32 hex chars
pub fn new_cloid() -> String {
    format!("0x{}", Uuid::new_v4().simple())
}

fn to_decimal(value: f64, what: &str) -> ExchangeResult<Decimal> {
    if !value.is_finite() || value < 0.0 {
        return Err(ExchangeError::Config(format!("Invalid {}: {}", what, value)));
    }
    Decimal::from_f64(value)
        .ok_or_else(|| ExchangeError::Config(format!("Invalid {}: {}", what, value)))
}

fn wire_string(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Round a price down to a multiple of `tick`; `None` or zero tick leaves it as is
pub fn round_price(px: f64, tick: Option<Decimal>) -> ExchangeResult<Decimal> {
    let px = to_decimal(px, "price")?;
    match tick {
        Some(tick) if tick > Decimal::ZERO => Ok((px / tick).floor() * tick),
        _ => Ok(px),
    }
}

/// Round a size down to `sz_decimals` places
pub fn round_size(sz: f64, sz_decimals: u32) -> ExchangeResult<Decimal> {
    let sz = to_decimal(sz, "size")?;
    Ok(sz.round_dp_with_strategy(sz_decimals, RoundingStrategy::ToZero))
}

/// Build a limit order wire
pub fn build_order(
    spec: &OrderSpec,
    tick: Option<Decimal>,
    sz_decimals: u32,
) -> ExchangeResult<OrderWire> {
    let px = round_price(spec.px, tick)?;
    let sz = round_size(spec.sz, sz_decimals)?;
    if sz.is_zero() {
        return Err(ExchangeError::Config(format!(
            "Order size {} rounds to zero at {} decimals",
            spec.sz, sz_decimals
        )));
    }

    Ok(OrderWire {
        asset: spec.asset_id,
        is_buy: spec.is_buy,
        limit_px: wire_string(px),
        sz: wire_string(sz),
        reduce_only: spec.reduce_only,
        order_type: OrderTypeWire::Limit(LimitWire { tif: spec.tif }),
        cloid: spec.cloid.clone(),
    })
}

/// Build a reduce-only TP/SL trigger order that executes as market on trigger
pub fn build_trigger_order(
    asset_id: u32,
    is_buy: bool,
    sz: f64,
    limit_px: f64,
    trigger_px: f64,
    tpsl: Tpsl,
    sz_decimals: u32,
) -> ExchangeResult<OrderWire> {
    let sz = round_size(sz, sz_decimals)?;
    let limit_px = to_decimal(limit_px, "limit price")?;
    let trigger_px = to_decimal(trigger_px, "trigger price")?;

    Ok(OrderWire {
        asset: asset_id,
        is_buy,
        limit_px: wire_string(limit_px),
        sz: wire_string(sz),
        reduce_only: true,
        order_type: OrderTypeWire::Trigger(TriggerWire {
            is_market: true,
            trigger_px: wire_string(trigger_px),
            tpsl,
        }),
        cloid: None,
    })
}
