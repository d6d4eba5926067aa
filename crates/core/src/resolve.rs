//! Item path resolution.

use crate::registry::Registry;
use crate::value::Value;

/// Walks `path` from the registry: the first segment is an identity, the rest
/// are member names.
///
/// Returns `None` when any step fails: an unknown identity, a missing member,
/// a member read off a non-indexable value, or a read that raised.
pub fn resolve<S: AsRef<str>>(registry: &Registry, path: &[S]) -> Option<Value> {
	let (identity, members) = path.split_first()?;
	let mut current = registry.lookup(identity.as_ref())?;

	for name in members {
		let name = name.as_ref();
		if !current.is_indexable() {
			tracing::trace!(member = name, "Path walks through a non-indexable value");
			return None;
		}
		current = match current.member(name) {
			Ok(Some(next)) => next,
			Ok(None) => return None,
			Err(fault) => {
				tracing::debug!(member = name, %fault, "Member read failed during resolution");
				return None;
			}
		};
	}

	Some(current)
}
