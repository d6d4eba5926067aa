use serde_json::Value;
use tether::Connection;

use crate::error::Result;

pub async fn execute(connection: &Connection) -> Result<Value> {
	Ok(connection.describe().await?)
}
