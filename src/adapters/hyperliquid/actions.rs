//! Hyperliquid `/exchange` actions
//!
//! Every action is a map tagged by `type`. Field order is fixed by the struct
//! declarations below, which keeps the MessagePack encoding used for the
//! action hash byte-for-byte reproducible.
//!
//! Docs: https://hyperliquid.gitbook.io/hyperliquid-docs/for-developers/api/exchange-endpoint

use serde::{Deserialize, Serialize};

// =============================================================================
// Action envelope
// =============================================================================

/// One exchange operation, before signing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Order(BulkOrder),
    Cancel(BulkCancel),
    CancelByCloid(BulkCancelCloid),
    ScheduleCancel(ScheduleCancel),
    UsdClassTransfer(UsdClassTransfer),
    SendAsset(SendAsset),
}

impl Action {
    /// Wire value of the `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Order(_) => "order",
            Action::Cancel(_) => "cancel",
            Action::CancelByCloid(_) => "cancelByCloid",
            Action::ScheduleCancel(_) => "scheduleCancel",
            Action::UsdClassTransfer(_) => "usdClassTransfer",
            Action::SendAsset(_) => "sendAsset",
        }
    }

    /// Account/asset transfers never carry a vault address
    pub fn is_transfer(&self) -> bool {
        matches!(self, Action::UsdClassTransfer(_) | Action::SendAsset(_))
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Time-in-force for limit orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tif {
    /// Good till cancel
    Gtc,
    /// Immediate or cancel
    Ioc,
    /// Add liquidity only (post-only)
    Alo,
}

/// Take-profit or stop-loss leg of a trigger order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tpsl {
    Tp,
    Sl,
}

/// TP/SL grouping for a batch of orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Grouping {
    #[default]
    Na,
    NormalTpsl,
    PositionTpsl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitWire {
    pub tif: Tif,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerWire {
    pub is_market: bool,
    pub trigger_px: String,
    pub tpsl: Tpsl,
}

/// `{"limit": {...}}` or `{"trigger": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderTypeWire {
    Limit(LimitWire),
    Trigger(TriggerWire),
}

/// Single order in compact wire form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderWire {
    /// Asset index
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "b")]
    pub is_buy: bool,
    /// Limit price, decimal string
    #[serde(rename = "p")]
    pub limit_px: String,
    /// Size, decimal string
    #[serde(rename = "s")]
    pub sz: String,
    #[serde(rename = "r")]
    pub reduce_only: bool,
    #[serde(rename = "t")]
    pub order_type: OrderTypeWire,
    /// Client order id (16-byte hex)
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub cloid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOrder {
    pub orders: Vec<OrderWire>,
    pub grouping: Grouping,
}

// =============================================================================
// Cancels
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelWire {
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "o")]
    pub oid: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkCancel {
    pub cancels: Vec<CancelWire>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelCloidWire {
    pub asset: u32,
    pub cloid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkCancelCloid {
    pub cancels: Vec<CancelCloidWire>,
}

/// Dead man's switch: cancel all open orders at `time` (UTC ms)
///
/// `time: None` clears a previously scheduled cancel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleCancel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
}

// =============================================================================
// Transfers
// =============================================================================

/// Move USDC between spot and perp balances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsdClassTransfer {
    pub hyperliquid_chain: String,
    pub signature_chain_id: String,
    pub amount: String,
    pub to_perp: bool,
    pub nonce: u64,
}

/// Send a token to another account or dex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAsset {
    pub hyperliquid_chain: String,
    pub signature_chain_id: String,
    pub destination: String,
    pub source_dex: String,
    pub destination_dex: String,
    pub token: String,
    pub amount: String,
    pub from_sub_account: String,
    pub nonce: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn limit_order() -> OrderWire {
        OrderWire {
            asset: 0,
            is_buy: true,
            limit_px: "50000".to_string(),
            sz: "0.01".to_string(),
            reduce_only: false,
            order_type: OrderTypeWire::Limit(LimitWire { tif: Tif::Gtc }),
            cloid: None,
        }
    }

    #[test]
    fn test_order_action_json_shape() {
        let action = Action::Order(BulkOrder {
            orders: vec![limit_order()],
            grouping: Grouping::Na,
        });

        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "order",
                "orders": [{
                    "a": 0, "b": true, "p": "50000", "s": "0.01", "r": false,
                    "t": {"limit": {"tif": "Gtc"}}
                }],
                "grouping": "na"
            })
        );
    }

    #[test]
    fn test_trigger_order_json_shape() {
        let wire = OrderTypeWire::Trigger(TriggerWire {
            is_market: true,
            trigger_px: "50000".to_string(),
            tpsl: Tpsl::Sl,
        });
        assert_eq!(
            serde_json::to_value(&wire).unwrap(),
            json!({"trigger": {"isMarket": true, "triggerPx": "50000", "tpsl": "sl"}})
        );
    }

    #[test]
    fn test_action_kinds_and_transfer_flag() {
        let cancel = Action::CancelByCloid(BulkCancelCloid {
            cancels: vec![CancelCloidWire {
                asset: 3,
                cloid: "0x00000000000000000000000000000001".into(),
            }],
        });
        assert_eq!(cancel.kind(), "cancelByCloid");
        assert!(!cancel.is_transfer());

        let transfer = Action::UsdClassTransfer(UsdClassTransfer {
            hyperliquid_chain: "Testnet".into(),
            signature_chain_id: "0x66eee".into(),
            amount: "10".into(),
            to_perp: true,
            nonce: 1,
        });
        assert_eq!(transfer.kind(), "usdClassTransfer");
        assert!(transfer.is_transfer());

        let value = serde_json::to_value(&transfer).unwrap();
        assert_eq!(value["type"], "usdClassTransfer");
        assert_eq!(value["toPerp"], true);
    }

    #[test]
    fn test_schedule_cancel_omits_missing_time() {
        let clear = Action::ScheduleCancel(ScheduleCancel { time: None });
        assert_eq!(serde_json::to_value(&clear).unwrap(), json!({"type": "scheduleCancel"}));

        let parsed: Action =
            serde_json::from_value(json!({"type": "scheduleCancel", "time": 1700000010000u64}))
                .unwrap();
        assert_eq!(
            parsed,
            Action::ScheduleCancel(ScheduleCancel { time: Some(1_700_000_010_000) })
        );
    }
}
