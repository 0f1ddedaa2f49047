use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use mandi_common::error::{MarketError, MarketResult};
use mandi_common::message::Message;
use mandi_common::order::Order;
use mandi_common::quotation::Quotation;

/// One order with everything it owns, as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order: Order,
    pub quotations: Vec<Quotation>,
    pub messages: Vec<Message>,
}

/// Durable image of the whole market, written after every mutation and
/// read back at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub orders: Vec<OrderSnapshot>,
}

/// Default snapshot location under the platform data directory.
pub fn default_path() -> PathBuf {
    let data = dirs::data_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
    data.join("mandi").join("market.json")
}

/// Load a snapshot if one exists. A missing file is a fresh market, not
/// an error.
pub fn load(path: &Path) -> MarketResult<Option<MarketSnapshot>> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(MarketError::StorageUnavailable(format!(
                "failed to read {}: {e}",
                path.display()
            )));
        }
    };
    let snapshot = serde_json::from_str(&data).map_err(|e| {
        MarketError::StorageUnavailable(format!("corrupt snapshot {}: {e}", path.display()))
    })?;
    Ok(Some(snapshot))
}

pub fn save(path: &Path, snapshot: &MarketSnapshot) -> MarketResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            MarketError::StorageUnavailable(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let data = serde_json::to_string_pretty(snapshot)
        .map_err(|e| MarketError::StorageUnavailable(format!("failed to serialize: {e}")))?;
    std::fs::write(path, data).map_err(|e| {
        MarketError::StorageUnavailable(format!("failed to write {}: {e}", path.display()))
    })
}
