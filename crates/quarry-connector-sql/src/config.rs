//! Connector configuration.
//!
//! The configuration is a YAML document describing the database connection
//! and, per resource type, the queries and mapping expressions that turn
//! rows into resources, entitlements, and grants. Parsed once at startup
//! and immutable thereafter.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use quarry_connector::error::{ConnectorError, ConnectorResult};
use quarry_connector::types::{
    AccountCreationSchema, Annotation, ResourceType, SchemaField, SchemaFieldType, TraitKind,
};

/// The overall connector configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Application name that identifies the connector.
    #[serde(default)]
    pub app_name: String,

    /// Optional description of the application.
    #[serde(default)]
    pub app_description: String,

    /// Database connection settings.
    #[serde(default)]
    pub connect: ConnectConfig,

    /// Resource types configured in the connector, keyed by id.
    #[serde(default)]
    pub resource_types: BTreeMap<String, ResourceTypeConfig>,
}

/// Settings required to connect to the database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectConfig {
    /// Connection string. Supports `${ENV_VAR}` substitution.
    pub dsn: String,

    // User and password are only required when the DSN itself carries no
    // credentials, e.g. when they contain characters that need URL
    // encoding.
    /// Database username.
    #[serde(default)]
    pub user: String,

    /// Database password.
    #[serde(default)]
    pub password: String,
}

/// Configuration for one resource type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceTypeConfig {
    /// Display name for this resource type.
    pub name: String,

    /// Additional context for the resource type.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Query configuration for listing resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<ListQuery>,

    /// Dynamic entitlement query and mapping settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entitlements: Option<EntitlementsQuery>,

    /// Predefined entitlements that do not require a query. When set,
    /// dynamic entitlements are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_entitlements: Option<Vec<EntitlementMapping>>,

    /// Queries discovering existing entitlement grants.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grants: Vec<GrantsQuery>,

    /// Bypass entitlement and grant processing for this resource type.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip_entitlements_and_grants: bool,

    /// Account provisioning configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_provisioning: Option<AccountProvisioning>,
}

/// Query configuration for listing resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    /// Variables usable within the query, each either a direct reference
    /// to an input field or an expression.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,

    /// The SQL statement, with `?<KEY>` placeholders.
    pub query: String,

    /// Pagination strategy and settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationConfig>,

    /// How query columns map to resource fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<ResourceMappingConfig>,
}

/// How to map query results to resource properties. All values are
/// expressions evaluated against the current row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceMappingConfig {
    /// Expression for the resource's unique identifier.
    pub id: String,

    /// Expression for the resource's human-readable name.
    pub display_name: String,

    /// Expression for the resource description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Trait mappings. At most one category may be set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits: Option<TraitsConfig>,

    /// Extra metadata attached to mapped resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<AnnotationsConfig>,
}

/// Extra metadata for resource or grant mappings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationsConfig {
    /// Mark the entitlement as immutable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entitlement_immutable: Option<EntitlementImmutableConfig>,

    /// External URL related to the resource or entitlement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_link: Option<ExternalLinkConfig>,
}

/// Marker config for immutable entitlements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitlementImmutableConfig {}

/// External link annotation config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalLinkConfig {
    pub url: String,
}

/// Trait mappings per category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraitsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserTraitMapping>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupTraitMapping>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleTraitMapping>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<AppTraitMapping>,
}

impl TraitsConfig {
    /// Number of trait categories configured.
    pub fn category_count(&self) -> usize {
        [
            self.user.is_some(),
            self.group.is_some(),
            self.role.is_some(),
            self.app.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

/// Attribute mappings for user resources. All values are expressions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserTraitMapping {
    /// Email addresses; the first entry is the primary address.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,

    /// Account status. Recognized values (case-insensitive):
    /// active/enabled, disabled/inactive/suspended/locked, deleted.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,

    /// Additional information about the status.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_details: String,

    /// Profile attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profile: BTreeMap<String, String>,

    /// Account type. Recognized values: user, human, service, system.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub account_type: String,

    /// Primary login identifier.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub login: String,

    /// Alternative login identifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub login_aliases: Vec<String>,

    /// Time of the user's last login.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_login: String,

    /// Employee identifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub employee_ids: Vec<String>,

    /// Identifier of the user's manager; lands in the profile map.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub manager_id: String,

    /// Email address of the user's manager; lands in the profile map.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub manager_email: String,

    /// Whether multi-factor authentication is enabled.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mfa_enabled: String,

    /// Whether single sign-on is enabled.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sso_enabled: String,
}

/// Attribute mappings for group resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupTraitMapping {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profile: BTreeMap<String, String>,
}

/// Attribute mappings for role resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleTraitMapping {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profile: BTreeMap<String, String>,
}

/// Attribute mappings for app resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppTraitMapping {
    /// Link to help documentation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help_url: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profile: BTreeMap<String, String>,
}

/// Pagination strategy for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationStrategy {
    /// Numeric offset paging.
    Offset,
    /// Paging by monotone primary key.
    Cursor,
}

/// How query results are paginated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// The pagination approach.
    pub strategy: PaginationStrategy,

    /// Column uniquely identifying records. Must appear in every selected
    /// row; for the cursor strategy the result set must be sorted
    /// ascending by this column.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub primary_key: String,
}

/// Query configuration for dynamic entitlements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitlementsQuery {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,

    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationConfig>,

    /// Mappings interpreting each row as entitlement objects.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub map: Vec<EntitlementMapping>,
}

/// How query results are mapped to an entitlement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitlementMapping {
    /// Local entitlement id. For static entitlements this is a literal;
    /// for dynamic mappings an expression.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Expression for the human-readable name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,

    /// Expression for the description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Resource type ids eligible to receive this entitlement. Unknown
    /// ids are dropped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grantable_to: Vec<String>,

    /// Intended use: assignment or permission.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub purpose: String,

    /// Short identifier. Defaults to `id` for static entitlements.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub slug: String,

    /// Mark the entitlement as immutable.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub immutable: bool,

    /// Expression; a truthy result skips this mapping for the row.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub skip_if: String,

    /// Queries for granting and revoking this entitlement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning: Option<EntitlementProvisioning>,
}

/// Provisioning settings for one entitlement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitlementProvisioning {
    /// Queries and settings for granting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant: Option<ProvisioningQueries>,

    /// Queries and settings for revoking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoke: Option<ProvisioningQueries>,

    /// Variables usable within the provisioning queries, evaluated against
    /// the provisioning inputs (`principal`, `entitlement`, `resource`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,
}

/// An ordered provisioning statement sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisioningQueries {
    /// Execute the statements without a surrounding transaction.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_transaction: bool,

    /// SQL statements to execute, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<String>,
}

/// Query configuration for existing entitlement grants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrantsQuery {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,

    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationConfig>,

    /// Mappings interpreting each row as grants.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub map: Vec<GrantMapping>,
}

/// How query results are mapped to a grant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrantMapping {
    /// Expression; a truthy result skips this mapping for the row.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub skip_if: String,

    /// Expression for the principal's unique identifier.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub principal_id: String,

    /// The principal's resource type. A literal, not an expression.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub principal_type: String,

    /// Expression for the associated entitlement id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entitlement_id: String,

    /// Extra metadata for the grant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<AnnotationsConfig>,

    /// Expansion of this grant into further entitlements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expandable: Option<ExpandableGrant>,
}

/// Grant expansion settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpandableGrant {
    /// Expression; a truthy result skips the expansion for the row.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub skip_if: String,

    /// Expressions for the entitlement ids to expand into.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entitlement_ids: Vec<String>,

    /// Expand shallowly.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub shallow: bool,
}

/// Account provisioning configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountProvisioning {
    /// Fields required for account creation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schema: Vec<AccountFieldConfig>,

    /// Supported credential handlers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<AccountCredentials>,

    /// Queries and settings for creating accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<AccountCreation>,

    /// Query validating the created account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate: Option<AccountValidation>,
}

/// One field of the account creation schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountFieldConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Value type: string, string_list, boolean, int, or map.
    #[serde(rename = "type")]
    pub field_type: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub placeholder: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

/// Supported credential handlers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_password: Option<NoPasswordConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_password: Option<RandomPasswordConfig>,
}

/// Accounts created without a password.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoPasswordConfig {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub preferred: bool,
}

/// Random password generation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RandomPasswordConfig {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub preferred: bool,

    #[serde(default)]
    pub max_length: usize,

    #[serde(default)]
    pub min_length: usize,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub disallowed_characters: String,
}

/// Validation of newly created accounts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountValidation {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,

    /// The validation query. The YAML key is the historical plural
    /// `queries`; the singular `query` is accepted as an alias.
    #[serde(rename = "queries", alias = "query")]
    pub query: String,
}

/// Account creation statement sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountCreation {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,

    /// SQL statements to execute, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<String>,

    /// Execute the statements without a surrounding transaction.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_transaction: bool,
}

impl Config {
    /// Parse a YAML document into a validated configuration.
    pub fn parse(data: &str) -> ConnectorResult<Self> {
        let config: Config = serde_yaml::from_str(data).map_err(|e| {
            ConnectorError::configuration(format!("failed to parse configuration: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> ConnectorResult<Self> {
        let data = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConnectorError::configuration(format!(
                "failed to read configuration file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::parse(&data)
    }

    /// Structural validation beyond what deserialization enforces.
    pub fn validate(&self) -> ConnectorResult<()> {
        for (rt_id, rt) in &self.resource_types {
            if let Some(traits) = rt.list.as_ref().and_then(|l| l.map.as_ref()).and_then(|m| m.traits.as_ref()) {
                if traits.category_count() > 1 {
                    return Err(ConnectorError::configuration(format!(
                        "resource type {rt_id} configures multiple trait categories; only one is supported"
                    )));
                }
            }
        }
        Ok(())
    }

    fn extract_traits(&self, rt_id: &str) -> ConnectorResult<Vec<TraitKind>> {
        let rt = self.resource_types.get(rt_id).ok_or_else(|| {
            ConnectorError::configuration(format!("resource type {rt_id} not found in config"))
        })?;

        let list = rt.list.as_ref().ok_or_else(|| {
            ConnectorError::configuration(format!("resource type {rt_id} has no listing defined"))
        })?;

        let map = list.map.as_ref().ok_or_else(|| {
            ConnectorError::configuration(format!(
                "resource type {rt_id} has no listing map defined"
            ))
        })?;

        let mut traits = Vec::new();
        if let Some(t) = &map.traits {
            if t.user.is_some() {
                traits.push(TraitKind::User);
            }
            if t.group.is_some() {
                traits.push(TraitKind::Group);
            }
            if t.role.is_some() {
                traits.push(TraitKind::Role);
            }
            if t.app.is_some() {
                traits.push(TraitKind::App);
            }
        }
        Ok(traits)
    }

    /// Build the resource type descriptor for one configured type.
    pub fn get_resource_type(&self, rt_id: &str) -> ConnectorResult<ResourceType> {
        let traits = self.extract_traits(rt_id)?;
        let rt = self.resource_types.get(rt_id).ok_or_else(|| {
            ConnectorError::configuration(format!("resource type {rt_id} not found in config"))
        })?;

        let mut annotations = Vec::new();
        if rt.skip_entitlements_and_grants {
            annotations.push(Annotation::SkipEntitlementsAndGrants);
        }

        Ok(ResourceType {
            id: rt_id.to_string(),
            display_name: rt.name.clone(),
            description: rt.description.clone(),
            traits,
            annotations,
        })
    }

    /// Build resource type descriptors for every configured type.
    pub fn get_resource_types(&self) -> ConnectorResult<Vec<ResourceType>> {
        self.resource_types
            .keys()
            .map(|rt_id| self.get_resource_type(rt_id))
            .collect()
    }

    /// Find the first resource type with account provisioning configured.
    ///
    /// Returns [`ConnectorError::NotDefined`] when no type has it.
    pub fn extract_account_provisioning(&self) -> ConnectorResult<(&str, &AccountProvisioning)> {
        for (rt_id, rt) in &self.resource_types {
            if let Some(provisioning) = &rt.account_provisioning {
                return Ok((rt_id, provisioning));
            }
        }
        Err(ConnectorError::NotDefined)
    }

    /// Build the account creation schema for connector metadata. `None`
    /// when no account provisioning is configured.
    pub fn account_creation_schema(&self) -> ConnectorResult<Option<AccountCreationSchema>> {
        let (_, provisioning) = match self.extract_account_provisioning() {
            Ok(found) => found,
            Err(e) if e.is_not_defined() => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut schema = AccountCreationSchema::default();
        for field in &provisioning.schema {
            let field_type = match field.field_type.as_str() {
                "string" => SchemaFieldType::String,
                "string_list" => SchemaFieldType::StringList,
                "boolean" => SchemaFieldType::Boolean,
                "int" => SchemaFieldType::Int,
                "map" => SchemaFieldType::Map,
                other => {
                    return Err(ConnectorError::configuration(format!(
                        "unsupported field type: {other}"
                    )))
                }
            };

            schema.fields.insert(
                field.name.clone(),
                SchemaField {
                    display_name: field.name.clone(),
                    description: field.description.clone(),
                    required: field.required,
                    placeholder: field.placeholder.clone(),
                    field_type,
                },
            );
        }

        Ok(Some(schema))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
app_name: "Example App"
app_description: "Syncs identities from the example schema"
connect:
  dsn: "mysql://${DB_HOST}:3306/app"
  user: app
  password: "${DB_PASSWORD}"
resource_types:
  user:
    name: User
    description: A user of the application
    list:
      query: "SELECT id, name, email, status FROM users ORDER BY id ASC LIMIT ?<Limit> OFFSET ?<Offset>"
      pagination:
        strategy: offset
        primary_key: id
      map:
        id: .id
        display_name: .name
        traits:
          user:
            emails:
              - .email
            status: .status
            profile:
              name: .name
  role:
    name: Role
    list:
      query: "SELECT id, role_name FROM roles"
      map:
        id: .id
        display_name: "titleCase(.role_name)"
        traits:
          role:
            profile:
              role: .role_name
    static_entitlements:
      - id: member
        display_name: "\"Role Member\""
        purpose: assignment
        immutable: true
        provisioning:
          vars:
            user_id: principal.ID
            role_id: resource.ID
          grant:
            queries:
              - "INSERT INTO user_roles (user_id, role_id) VALUES (?<user_id>, ?<role_id>)"
          revoke:
            queries:
              - "DELETE FROM user_roles WHERE user_id = ?<user_id> AND role_id = ?<role_id>"
    grants:
      - query: "SELECT user_id, role_id FROM user_roles"
        map:
          - principal_id: .user_id
            principal_type: user
            entitlement_id: "resource.Type + \":\" + resource.ID + \":member\""
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.app_name, "Example App");
        assert_eq!(config.resource_types.len(), 2);

        let user = &config.resource_types["user"];
        let list = user.list.as_ref().unwrap();
        assert_eq!(
            list.pagination.as_ref().unwrap().strategy,
            PaginationStrategy::Offset
        );
        assert_eq!(list.pagination.as_ref().unwrap().primary_key, "id");

        let role = &config.resource_types["role"];
        let statics = role.static_entitlements.as_ref().unwrap();
        assert_eq!(statics[0].id, "member");
        assert!(statics[0].immutable);
        assert_eq!(role.grants.len(), 1);
    }

    #[test]
    fn test_resource_type_traits() {
        let config = Config::parse(SAMPLE).unwrap();
        let rt = config.get_resource_type("user").unwrap();
        assert_eq!(rt.traits, vec![TraitKind::User]);
        assert_eq!(rt.display_name, "User");

        let rt = config.get_resource_type("role").unwrap();
        assert_eq!(rt.traits, vec![TraitKind::Role]);
    }

    #[test]
    fn test_unknown_resource_type() {
        let config = Config::parse(SAMPLE).unwrap();
        assert!(config.get_resource_type("nope").is_err());
    }

    #[test]
    fn test_missing_list_map_is_an_error() {
        let yaml = r#"
resource_types:
  user:
    name: User
    list:
      query: "SELECT 1"
"#;
        let config = Config::parse(yaml).unwrap();
        assert!(config.get_resource_type("user").is_err());
    }

    #[test]
    fn test_multiple_trait_categories_rejected() {
        let yaml = r#"
resource_types:
  user:
    name: User
    list:
      query: "SELECT 1"
      map:
        id: .id
        display_name: .name
        traits:
          user:
            status: .status
          group:
            profile:
              name: .name
"#;
        let err = Config::parse(yaml).unwrap_err();
        assert!(err.to_string().contains("multiple trait categories"));
    }

    #[test]
    fn test_account_provisioning_not_defined() {
        let config = Config::parse(SAMPLE).unwrap();
        let err = config.extract_account_provisioning().unwrap_err();
        assert!(err.is_not_defined());
        assert!(config.account_creation_schema().unwrap().is_none());
    }

    #[test]
    fn test_validation_query_accepts_plural_key() {
        let yaml = r#"
schema:
  - name: username
    type: string
    required: true
validate:
  queries: "SELECT * FROM users WHERE username = ?<username>"
"#;
        let provisioning: AccountProvisioning = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            provisioning.validate.unwrap().query,
            "SELECT * FROM users WHERE username = ?<username>"
        );

        let yaml_singular = r#"
validate:
  query: "SELECT 1"
"#;
        let provisioning: AccountProvisioning = serde_yaml::from_str(yaml_singular).unwrap();
        assert_eq!(provisioning.validate.unwrap().query, "SELECT 1");
    }

    #[test]
    fn test_account_creation_schema() {
        let yaml = r#"
resource_types:
  user:
    name: User
    list:
      query: "SELECT 1"
      map:
        id: .id
        display_name: .name
    account_provisioning:
      schema:
        - name: username
          type: string
          required: true
        - name: groups
          type: string_list
      create:
        queries:
          - "INSERT INTO users (username) VALUES (?<username>)"
      validate:
        queries: "SELECT * FROM users WHERE username = ?<username>"
"#;
        let config = Config::parse(yaml).unwrap();
        let schema = config.account_creation_schema().unwrap().unwrap();
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(
            schema.fields["username"].field_type,
            SchemaFieldType::String
        );
        assert!(schema.fields["username"].required);
        assert_eq!(
            schema.fields["groups"].field_type,
            SchemaFieldType::StringList
        );
    }

    #[test]
    fn test_unsupported_schema_field_type() {
        let yaml = r#"
resource_types:
  user:
    name: User
    account_provisioning:
      schema:
        - name: username
          type: uuid
"#;
        let config = Config::parse(yaml).unwrap();
        assert!(config.account_creation_schema().is_err());
    }
}
