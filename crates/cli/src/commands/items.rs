use serde_json::Value;
use tether::Connection;

use crate::error::Result;

pub async fn execute(connection: &Connection) -> Result<Value> {
	let items = connection.items().await?;
	tracing::debug!(count = items.len(), "Listed exposed items");
	Ok(Value::from(items))
}
