//! Wire shapes for the upstream subscription frame and the downstream
//! JSON-RPC 2.0 notification (§6).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The raw frame delivered by the upstream `vdb_stream` subscription, before
/// `stream-consumer` decodes it into a [`crate::entities::BlockPayload`].
///
/// Field names match the wire format in §6 exactly; `state_nodes_rlp` and
/// `storage_nodes_rlp` are hex-keyed maps because that is how the chain
/// node's JSON-RPC codec emits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamFrame {
    pub block_number: u64,
    #[serde(rename = "headersRlp")]
    pub headers_rlp: Vec<u8>,
    #[serde(rename = "unclesRlp")]
    pub uncles_rlp: Vec<UncleRlp>,
    #[serde(rename = "transactionsRlp")]
    pub transactions_rlp: Vec<Vec<u8>>,
    #[serde(rename = "receiptsRlp")]
    pub receipts_rlp: Vec<Vec<u8>>,
    #[serde(rename = "stateNodesRlp")]
    pub state_nodes_rlp: BTreeMap<String, StateNodeRlp>,
    #[serde(rename = "storageNodesRlp")]
    pub storage_nodes_rlp: BTreeMap<String, BTreeMap<String, StorageNodeRlp>>,
    #[serde(rename = "errMsg", default, skip_serializing_if = "String::is_empty")]
    pub err_msg: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncleRlp {
    pub hash: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateNodeRlp {
    pub bytes: Vec<u8>,
    pub leaf: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageNodeRlp {
    pub bytes: Vec<u8>,
    pub leaf: bool,
}

/// A downstream JSON-RPC 2.0 subscription notification, sent under the
/// `vulcanizedb` namespace over WebSocket or IPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionNotification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: SubscriptionParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionParams {
    pub subscription: String,
    pub result: serde_json::Value,
    /// Populated when this subscriber's own processing failed (e.g. its
    /// delivery channel overflowed); the subscription itself stays alive (§7).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
}

impl SubscriptionNotification {
    pub fn new(subscription: String, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            method: "vdb_stream",
            params: SubscriptionParams {
                subscription,
                result,
                err_msg: None,
            },
        }
    }

    pub fn error(subscription: String, err_msg: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: "vdb_stream",
            params: SubscriptionParams {
                subscription,
                result: serde_json::Value::Null,
                err_msg: Some(err_msg.into()),
            },
        }
    }
}
