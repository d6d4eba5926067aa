use serde_json::Value;
use tether::Connection;

use crate::error::Result;
use crate::path::MemberPath;

pub async fn execute(connection: &Connection, path: MemberPath, args: Vec<Value>) -> Result<Value> {
	tracing::debug!(%path, args = args.len(), "Calling");
	Ok(connection.call(path.item_path, &path.name, args).await?)
}
