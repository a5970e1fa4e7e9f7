//! Connector capability traits.
//!
//! Connectors implement [`ResourceSyncer`] per resource type; provisioning
//! capabilities are separate traits so a connector only implements what it
//! supports.

use async_trait::async_trait;

use crate::error::ConnectorResult;
use crate::pagination::PageToken;
use crate::types::{
    AccountInfo, CredentialOptions, Entitlement, Grant, PlaintextData, Resource, ResourceType,
};

/// One page of results plus the token for the next page. An empty token
/// means there are no further pages.
#[derive(Debug, Clone, Default)]
pub struct ListResult<T> {
    pub items: Vec<T>,
    pub next_page_token: String,
}

impl<T> ListResult<T> {
    /// A result with no items and no further pages.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_page_token: String::new(),
        }
    }

    /// Whether more pages follow this one.
    pub fn has_next_page(&self) -> bool {
        !self.next_page_token.is_empty()
    }
}

/// Phase executor for one resource type: lists resources and enumerates
/// their entitlements and grants, one bounded page at a time.
#[async_trait]
pub trait ResourceSyncer: Send + Sync {
    /// The resource type this syncer produces.
    fn resource_type(&self) -> &ResourceType;

    /// List one page of resources.
    async fn list(&self, token: &PageToken) -> ConnectorResult<ListResult<Resource>>;

    /// List one page of entitlements for a resource.
    async fn entitlements(
        &self,
        resource: &Resource,
        token: &PageToken,
    ) -> ConnectorResult<ListResult<Entitlement>>;

    /// List one page of grants for a resource.
    async fn grants(
        &self,
        resource: &Resource,
        token: &PageToken,
    ) -> ConnectorResult<ListResult<Grant>>;
}

/// Grant and revoke entitlements on the target system.
#[async_trait]
pub trait ProvisionOp: Send + Sync {
    /// Grant an entitlement to a principal.
    async fn grant(&self, principal: &Resource, entitlement: &Entitlement) -> ConnectorResult<()>;

    /// Revoke an existing grant.
    async fn revoke(&self, grant: &Grant) -> ConnectorResult<()>;
}

/// Create accounts on the target system.
#[async_trait]
pub trait CreateAccountOp: Send + Sync {
    /// Create an account and return the created resource along with any
    /// generated secrets.
    async fn create_account(
        &self,
        info: &AccountInfo,
        credential_options: Option<&CredentialOptions>,
    ) -> ConnectorResult<(Resource, Vec<PlaintextData>)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_result_next_page() {
        let done: ListResult<Resource> = ListResult::empty();
        assert!(!done.has_next_page());

        let more: ListResult<Resource> = ListResult {
            items: Vec::new(),
            next_page_token: "200".to_string(),
        };
        assert!(more.has_next_page());
    }
}
