//! Identity data model.
//!
//! Resources, traits, entitlements, and grants form the canonical stream a
//! connector emits; the provisioning value types describe account creation
//! requests and their results.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kinds of traits a resource type can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraitKind {
    User,
    Group,
    Role,
    App,
}

impl TraitKind {
    /// Get the string representation used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            TraitKind::User => "user",
            TraitKind::Group => "group",
            TraitKind::Role => "role",
            TraitKind::App => "app",
        }
    }
}

impl fmt::Display for TraitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A resource type declared by the connector configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceType {
    /// Stable identifier, unique within the connector.
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Traits resources of this type carry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<TraitKind>,
    /// Additional metadata.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

/// Globally unique reference to a resource: `(type, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    /// The resource type id.
    pub resource_type: String,
    /// The resource id, unique within the type.
    pub resource: String,
}

impl ResourceId {
    /// Create a resource id. The id must be a non-empty string.
    pub fn new(
        resource_type: impl Into<String>,
        resource: impl Into<String>,
    ) -> Result<Self, crate::error::ConnectorError> {
        let resource = resource.into();
        if resource.is_empty() {
            return Err(crate::error::ConnectorError::configuration(
                "resource id must not be empty",
            ));
        }
        Ok(Self {
            resource_type: resource_type.into(),
            resource,
        })
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.resource)
    }
}

/// A synced identity object: user, group, role, or app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Global key of the resource.
    pub id: ResourceId,
    /// Human-readable name.
    pub display_name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Trait attached to this resource, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_trait: Option<ResourceTrait>,
    /// Additional metadata.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

/// Typed attribute set attached to a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResourceTrait {
    User(UserTrait),
    Group(GroupTrait),
    Role(RoleTrait),
    App(AppTrait),
}

impl ResourceTrait {
    /// The trait kind of this value.
    pub fn kind(&self) -> TraitKind {
        match self {
            ResourceTrait::User(_) => TraitKind::User,
            ResourceTrait::Group(_) => TraitKind::Group,
            ResourceTrait::Role(_) => TraitKind::Role,
            ResourceTrait::App(_) => TraitKind::App,
        }
    }
}

/// An email address attached to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub address: String,
    /// The first configured email is the primary address.
    pub primary: bool,
}

/// Lifecycle status of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Enabled,
    Disabled,
    Deleted,
    #[default]
    Unspecified,
}

impl UserStatus {
    /// Map a configured status value onto the enum.
    ///
    /// Matching is case-insensitive. Returns `None` for values outside the
    /// supported vocabulary; callers log a warning and fall back to
    /// [`UserStatus::Unspecified`].
    pub fn from_mapping(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "active" | "enabled" => Some(UserStatus::Enabled),
            "disabled" | "inactive" | "suspended" | "locked" => Some(UserStatus::Disabled),
            "deleted" => Some(UserStatus::Deleted),
            _ => None,
        }
    }
}

/// Classification of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Human,
    Service,
    System,
}

impl AccountType {
    /// Map a configured account-type value onto the enum.
    ///
    /// Matching is case-insensitive. Returns `None` for unknown values;
    /// callers log a warning and default to [`AccountType::Human`].
    pub fn from_mapping(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "user" | "human" => Some(AccountType::Human),
            "service" => Some(AccountType::Service),
            "system" => Some(AccountType::System),
            _ => None,
        }
    }
}

/// User trait attributes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserTrait {
    /// Email addresses; index 0 is primary.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<Email>,
    /// Account status.
    #[serde(default)]
    pub status: UserStatus,
    /// Free-form detail attached to the status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_details: Option<String>,
    /// Profile attributes. Manager id/email mappings land here under the
    /// `manager_id` and `manager_email` keys.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profile: BTreeMap<String, String>,
    /// Account classification.
    #[serde(default)]
    pub account_type: AccountType,
    /// Primary login identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    /// Alternative login identifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub login_aliases: Vec<String>,
    /// Time of the user's last login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    /// Employee identifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub employee_ids: Vec<String>,
    /// Whether multi-factor authentication is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_enabled: Option<bool>,
    /// Whether single sign-on is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sso_enabled: Option<bool>,
}

/// Group trait attributes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupTrait {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profile: BTreeMap<String, String>,
}

/// Role trait attributes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoleTrait {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profile: BTreeMap<String, String>,
}

/// App trait attributes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppTrait {
    /// Link to help documentation for the application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profile: BTreeMap<String, String>,
}

/// Intended use of an entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementPurpose {
    Assignment,
    Permission,
    #[default]
    Unspecified,
}

impl EntitlementPurpose {
    /// Map a configured purpose value onto the enum, defaulting to
    /// [`EntitlementPurpose::Unspecified`].
    pub fn from_mapping(value: &str) -> Self {
        match value {
            "assignment" => EntitlementPurpose::Assignment,
            "permission" => EntitlementPurpose::Permission,
            _ => EntitlementPurpose::Unspecified,
        }
    }
}

/// A named right attached to a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entitlement {
    /// Composite id: `"<resourceType>:<resourceId>:<localId>"`.
    pub id: String,
    /// The resource this entitlement belongs to.
    pub resource: ResourceId,
    /// Human-readable name.
    pub display_name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Short identifier.
    pub slug: String,
    /// Intended use.
    #[serde(default)]
    pub purpose: EntitlementPurpose,
    /// Resource type ids eligible to receive this entitlement.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grantable_to: Vec<String>,
    /// Additional metadata.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

/// A principal holding an entitlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    /// The party holding the grant.
    pub principal: ResourceId,
    /// The entitlement being held, by composite id.
    pub entitlement_id: String,
    /// Additional metadata.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

/// Metadata attached to resources, entitlements, or grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Annotation {
    /// The entitlement is fixed and cannot be granted or revoked.
    EntitlementImmutable,
    /// The grant expands into further entitlements.
    GrantExpandable {
        entitlement_ids: Vec<String>,
        #[serde(default)]
        shallow: bool,
    },
    /// External URL related to the resource or entitlement.
    ExternalLink { url: String },
    /// Entitlement and grant processing is bypassed for this resource type.
    SkipEntitlementsAndGrants,
}

/// Metadata describing the connector to its host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorMetadata {
    pub display_name: String,
    pub description: String,
    /// Field schema for account creation, when provisioning is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_creation_schema: Option<AccountCreationSchema>,
}

/// Field schema describing the inputs required to create an account.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AccountCreationSchema {
    pub fields: BTreeMap<String, SchemaField>,
}

/// A single account-creation field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub placeholder: String,
    pub field_type: SchemaFieldType,
}

/// Value type of an account-creation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaFieldType {
    String,
    StringList,
    Boolean,
    Int,
    Map,
}

/// Caller-supplied data for an account creation request.
#[derive(Debug, Clone, Default)]
pub struct AccountInfo {
    /// Field values keyed by schema field name.
    pub profile: serde_json::Map<String, serde_json::Value>,
}

/// Credential handling requested for an account creation.
#[derive(Debug, Clone)]
pub enum CredentialOptions {
    /// The account is created without a password.
    NoPassword,
    /// A random password is generated per the given constraints.
    RandomPassword(RandomPasswordOptions),
}

/// Constraints for random password generation.
#[derive(Debug, Clone)]
pub struct RandomPasswordOptions {
    /// Total password length.
    pub length: usize,
    /// Minimum number of lowercase characters.
    pub min_lowercase: usize,
    /// Minimum number of uppercase characters.
    pub min_uppercase: usize,
    /// Minimum number of digits.
    pub min_digits: usize,
    /// Minimum number of symbol characters.
    pub min_symbols: usize,
}

impl Default for RandomPasswordOptions {
    fn default() -> Self {
        Self {
            length: 16,
            min_lowercase: 1,
            min_uppercase: 1,
            min_digits: 1,
            min_symbols: 1,
        }
    }
}

/// Kinds of credential handlers a connector can support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialOptionKind {
    NoPassword,
    RandomPassword,
}

/// Credential capability advertisement for account provisioning.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialDetails {
    pub supported: Vec<CredentialOptionKind>,
    pub preferred: CredentialOptionKind,
}

/// A secret produced during provisioning, returned to the caller exactly
/// once and never logged.
#[derive(Clone)]
pub struct PlaintextData {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for PlaintextData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The payload is a secret; only the name is printable.
        f.debug_struct("PlaintextData")
            .field("name", &self.name)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_id_rejects_empty() {
        assert!(ResourceId::new("user", "").is_err());
        let id = ResourceId::new("user", "alice").unwrap();
        assert_eq!(id.to_string(), "user:alice");
    }

    #[test]
    fn test_user_status_mapping() {
        assert_eq!(UserStatus::from_mapping("Active"), Some(UserStatus::Enabled));
        assert_eq!(
            UserStatus::from_mapping("ENABLED"),
            Some(UserStatus::Enabled)
        );
        assert_eq!(
            UserStatus::from_mapping("suspended"),
            Some(UserStatus::Disabled)
        );
        assert_eq!(
            UserStatus::from_mapping("locked"),
            Some(UserStatus::Disabled)
        );
        assert_eq!(
            UserStatus::from_mapping("deleted"),
            Some(UserStatus::Deleted)
        );
        assert_eq!(UserStatus::from_mapping("weird"), None);
    }

    #[test]
    fn test_account_type_mapping() {
        assert_eq!(AccountType::from_mapping("user"), Some(AccountType::Human));
        assert_eq!(AccountType::from_mapping("HUMAN"), Some(AccountType::Human));
        assert_eq!(
            AccountType::from_mapping("service"),
            Some(AccountType::Service)
        );
        assert_eq!(
            AccountType::from_mapping("system"),
            Some(AccountType::System)
        );
        assert_eq!(AccountType::from_mapping("robot"), None);
    }

    #[test]
    fn test_entitlement_purpose_mapping() {
        assert_eq!(
            EntitlementPurpose::from_mapping("assignment"),
            EntitlementPurpose::Assignment
        );
        assert_eq!(
            EntitlementPurpose::from_mapping("permission"),
            EntitlementPurpose::Permission
        );
        assert_eq!(
            EntitlementPurpose::from_mapping("anything else"),
            EntitlementPurpose::Unspecified
        );
    }

    #[test]
    fn test_annotation_serialization() {
        let anno = Annotation::GrantExpandable {
            entitlement_ids: vec!["group:eng:member".to_string()],
            shallow: true,
        };
        let json = serde_json::to_string(&anno).unwrap();
        assert!(json.contains("\"type\":\"grant_expandable\""));
        assert!(json.contains("\"shallow\":true"));

        let parsed: Annotation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, anno);
    }

    #[test]
    fn test_plaintext_data_debug_redacts() {
        let data = PlaintextData {
            name: "password".to_string(),
            bytes: b"hunter2".to_vec(),
        };
        let rendered = format!("{data:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("password"));
    }
}
