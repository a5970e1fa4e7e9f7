//! Entitlement id composition.
//!
//! Entitlement ids are reversible composites of the form
//! `"<resourceType>:<resourceId>:<localId>"`.

use crate::error::{ConnectorError, ConnectorResult};
use crate::types::ResourceId;

/// Build an entitlement id for a resource and a local entitlement id.
pub fn build_entitlement_id(resource: &ResourceId, local_id: &str) -> String {
    format!(
        "{}:{}:{}",
        resource.resource_type, resource.resource, local_id
    )
}

/// Split an entitlement id into `(resource_type, resource_id, local_id)`.
///
/// The id must contain exactly three colon-separated parts; the local id
/// itself must not contain colons.
pub fn split_entitlement_id(id: &str) -> ConnectorResult<(&str, &str, &str)> {
    let mut parts = id.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(resource_type), Some(resource_id), Some(local_id))
            if !resource_type.is_empty() && !resource_id.is_empty() && !local_id.is_empty() =>
        {
            Ok((resource_type, resource_id, local_id))
        }
        _ => Err(ConnectorError::invariant(format!(
            "invalid entitlement id: {id}"
        ))),
    }
}
