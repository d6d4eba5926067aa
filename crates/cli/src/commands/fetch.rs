use serde_json::Value;
use tether::Connection;

use crate::error::{CliError, Result};
use crate::path::MemberPath;

/// Reads a property. An absent value is reported as [`CliError::NotFound`].
pub async fn execute(connection: &Connection, path: MemberPath) -> Result<Value> {
	connection
		.fetch(path.item_path.clone(), &path.name)
		.await?
		.ok_or_else(|| CliError::NotFound(path.to_string()))
}
