//! # Connector Framework
//!
//! Core abstractions for syncing identities out of external systems.
//!
//! This crate defines the canonical identity stream a connector emits
//! ([resources](types::Resource), [entitlements](types::Entitlement), and
//! [grants](types::Grant)) together with the capability traits connectors
//! implement and the pagination primitives that keep sync pages bounded.
//!
//! ## Crate Organization
//!
//! - [`types`] - The identity data model and provisioning value types
//! - [`ids`] - Entitlement id composition (`"type:resourceId:localId"`)
//! - [`pagination`] - Page tokens and the multi-query page bag
//! - [`traits`] - Capability traits (`ResourceSyncer`, `ProvisionOp`, ...)
//! - [`error`] - Error taxonomy with classification codes

pub mod error;
pub mod ids;
pub mod pagination;
pub mod traits;
pub mod types;

/// Prelude module for convenient imports.
///
/// ```
/// use quarry_connector::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ConnectorError, ConnectorResult};
    pub use crate::ids::{build_entitlement_id, split_entitlement_id};
    pub use crate::pagination::{PageBag, PageState, PageToken};
    pub use crate::traits::{CreateAccountOp, ListResult, ProvisionOp, ResourceSyncer};
    pub use crate::types::{
        AccountInfo, AccountType, Annotation, AppTrait, ConnectorMetadata, CredentialOptions,
        Email, Entitlement, EntitlementPurpose, Grant, GroupTrait, PlaintextData, Resource,
        ResourceId, ResourceTrait, ResourceType, RoleTrait, TraitKind, UserStatus, UserTrait,
    };
}

// Re-export async_trait for connector implementors
pub use async_trait::async_trait;
