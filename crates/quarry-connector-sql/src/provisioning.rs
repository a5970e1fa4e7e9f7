//! Provisioning: grant, revoke, and account creation.
//!
//! Provisioning executes ordered statement sequences against the database,
//! by default inside a transaction. Each statement must affect at most one
//! row; anything more aborts the sequence and rolls the transaction back.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, error, warn};

use quarry_connector::error::{ConnectorError, ConnectorResult};
use quarry_connector::ids::split_entitlement_id;
use quarry_connector::types::{
    AccountInfo, CredentialDetails, CredentialOptionKind, CredentialOptions, Entitlement, Grant,
    PlaintextData, RandomPasswordOptions, Resource,
};
use quarry_expr::rhai;
use quarry_expr::{Dynamic, Inputs};

use crate::config::{AccountProvisioning, EntitlementProvisioning};
use crate::database::VarMap;
use crate::inputs::provisioning_inputs;
use crate::query::rewrite_provisioning_query;
use crate::syncer::SqlSyncer;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()-_=+";

impl SqlSyncer {
    /// Find the provisioning config for an entitlement: static entries are
    /// matched by id first, then the dynamic entitlement mappings.
    fn get_provisioning_config(&self, local_id: &str) -> Option<&EntitlementProvisioning> {
        if let Some(entries) = &self.config.static_entitlements {
            for entry in entries {
                if entry.id == local_id {
                    if let Some(provisioning) = &entry.provisioning {
                        debug!(entitlement_id = local_id, "provisioning is enabled for entitlement");
                        return Some(provisioning);
                    }
                }
            }
        }

        if let Some(dynamic) = &self.config.entitlements {
            for mapping in &dynamic.map {
                if let Some(provisioning) = &mapping.provisioning {
                    debug!(entitlement_id = local_id, "provisioning is enabled for entitlement");
                    return Some(provisioning);
                }
            }
        }

        None
    }

    /// Grant an entitlement to a principal by executing the configured
    /// grant statement sequence.
    pub(crate) async fn grant_entitlement(
        &self,
        principal: &Resource,
        entitlement: &Entitlement,
    ) -> ConnectorResult<()> {
        debug!(entitlement_id = %entitlement.id, "granting entitlement");

        let (_, _, local_id) = split_entitlement_id(&entitlement.id)?;

        let provisioning = self.get_provisioning_config(local_id).ok_or_else(|| {
            ConnectorError::configuration("provisioning is not enabled for this connector")
        })?;

        let grant = provisioning
            .grant
            .as_ref()
            .filter(|queries| !queries.queries.is_empty())
            .ok_or_else(|| {
                ConnectorError::configuration("no grant config found for entitlement")
            })?;

        let vars = self.prepare_provisioning_vars(&provisioning.vars, principal, entitlement)?;
        self.run_provisioning_queries(&grant.queries, &vars, !grant.no_transaction)
            .await?;

        debug!(
            principal_id = %principal.id.resource,
            entitlement_id = %entitlement.id,
            "granted entitlement"
        );
        Ok(())
    }

    /// Revoke a grant by executing the configured revoke statement
    /// sequence.
    pub(crate) async fn revoke_grant(&self, grant: &Grant) -> ConnectorResult<()> {
        debug!(entitlement_id = %grant.entitlement_id, "revoking entitlement");

        let (resource_type, resource_id, local_id) = split_entitlement_id(&grant.entitlement_id)?;

        let provisioning = self.get_provisioning_config(local_id).ok_or_else(|| {
            ConnectorError::configuration("provisioning is not enabled for this connector")
        })?;

        let revoke = provisioning
            .revoke
            .as_ref()
            .filter(|queries| !queries.queries.is_empty())
            .ok_or_else(|| {
                ConnectorError::configuration("no revoke config found for entitlement")
            })?;

        let mut inputs = Inputs::new();
        inputs.set_principal(&grant.principal.resource, &grant.principal.resource_type);
        inputs.set_entitlement(local_id);
        inputs.set_resource(resource_id, resource_type, "");

        let vars = self.evaluate_provisioning_vars(&provisioning.vars, &inputs)?;
        self.run_provisioning_queries(&revoke.queries, &vars, !revoke.no_transaction)
            .await?;

        debug!(entitlement_id = %grant.entitlement_id, "revoked grant");
        Ok(())
    }

    fn prepare_provisioning_vars(
        &self,
        vars: &std::collections::BTreeMap<String, String>,
        principal: &Resource,
        entitlement: &Entitlement,
    ) -> ConnectorResult<VarMap> {
        let inputs = provisioning_inputs(principal, entitlement)?;
        self.evaluate_provisioning_vars(vars, &inputs)
    }

    /// Provisioning vars are always expressions; there is no direct
    /// passthrough of input fields here.
    fn evaluate_provisioning_vars(
        &self,
        vars: &std::collections::BTreeMap<String, String>,
        inputs: &Inputs,
    ) -> ConnectorResult<VarMap> {
        let mut ret = VarMap::new();
        for (key, expr) in vars {
            let out = self.env.evaluate(expr, inputs)?;
            ret.insert(key.clone(), out);
        }
        Ok(ret)
    }

    /// Execute an ordered statement sequence, optionally inside a
    /// transaction.
    ///
    /// Each statement must affect at most one row. A statement affecting
    /// more than one row aborts the sequence, rolls back, and surfaces an
    /// invariant violation; no later statement runs.
    pub(crate) async fn run_provisioning_queries(
        &self,
        queries: &[String],
        vars: &VarMap,
        use_transaction: bool,
    ) -> ConnectorResult<()> {
        let dialect = self.db.dialect();

        // Template everything up front so a bad statement never opens a
        // transaction.
        let mut prepared = Vec::with_capacity(queries.len());
        for query in queries {
            prepared.push(rewrite_provisioning_query(dialect, query, vars)?);
        }

        if use_transaction {
            let mut tx = self.db.begin().await?;

            for (sql, args) in &prepared {
                let rows_affected = match tx.execute(sql, args).await {
                    Ok(n) => n,
                    Err(e) => {
                        if let Err(rollback_err) = tx.rollback().await {
                            error!(error = %rollback_err, "failed to rollback provisioning queries");
                        }
                        return Err(e);
                    }
                };

                if rows_affected > 1 {
                    if let Err(rollback_err) = tx.rollback().await {
                        error!(error = %rollback_err, "failed to rollback provisioning queries");
                    }
                    return Err(ConnectorError::invariant(
                        "query affected more than one row, ending and rolling back",
                    ));
                }

                debug!(query = %sql, rows_affected, use_tx = true, "query executed");
            }

            tx.commit().await?;
        } else {
            for (sql, args) in &prepared {
                let rows_affected = self.db.execute(sql, args).await?;
                if rows_affected > 1 {
                    return Err(ConnectorError::invariant(
                        "query affected more than one row",
                    ));
                }
                debug!(query = %sql, rows_affected, use_tx = false, "query executed");
            }
        }

        Ok(())
    }

    /// Create an account: build the query inputs (schema fields plus
    /// generated credentials), run the creation statements, then map the
    /// created row back through the validation query.
    pub(crate) async fn create_account_internal(
        &self,
        info: &AccountInfo,
        credential_options: Option<&CredentialOptions>,
    ) -> ConnectorResult<(Resource, Vec<PlaintextData>)> {
        let (resource_type_id, provisioning) = self.full_config.extract_account_provisioning()?;
        debug!(resource_type_id, "creating account");

        let (inputs, plaintext) =
            prepare_account_inputs(provisioning, info, credential_options)?;

        let create = provisioning.create.as_ref().ok_or_else(|| {
            ConnectorError::configuration("no account creation queries defined")
        })?;

        // The prepared inputs double as the template vars for the creation
        // statements.
        let mut vars = VarMap::new();
        for (key, value) in inputs.iter() {
            vars.insert(key.to_string(), value.clone());
        }

        self.run_provisioning_queries(&create.queries, &vars, !create.no_transaction)
            .await?;

        let resource = self.validate_account(provisioning, &inputs).await?;
        Ok((resource, plaintext))
    }

    /// Run the validation query exactly once (no pagination) and map the
    /// first row to the created resource.
    async fn validate_account(
        &self,
        provisioning: &AccountProvisioning,
        inputs: &Inputs,
    ) -> ConnectorResult<Resource> {
        let validate = provisioning.validate.as_ref().ok_or_else(|| {
            ConnectorError::configuration(
                "validation configuration is not defined for account provisioning",
            )
        })?;
        if validate.query.is_empty() {
            return Err(ConnectorError::configuration(
                "validation query is not defined for account provisioning",
            ));
        }

        let vars = self.prepare_query_vars(inputs, &validate.vars)?;

        let mut found: Option<Resource> = None;
        self.run_query(None, &validate.query, None, &vars, |row| {
            found = Some(self.map_resource(row)?);
            Ok(false)
        })
        .await?;

        found.ok_or_else(|| {
            ConnectorError::configuration("unable to find resource for account provisioning")
        })
    }

    /// Advertise the credential handlers this connector supports.
    ///
    /// `None` when account provisioning is not configured or no handler is
    /// declared.
    pub fn credential_details(&self) -> ConnectorResult<Option<CredentialDetails>> {
        let (_, provisioning) = match self.full_config.extract_account_provisioning() {
            Ok(found) => found,
            Err(e) if e.is_not_defined() => return Ok(None),
            Err(e) => return Err(e),
        };

        let Some(credentials) = &provisioning.credentials else {
            return Err(ConnectorError::configuration(
                "no credential options defined",
            ));
        };

        let mut supported = Vec::new();
        let mut preferred = Vec::new();

        if let Some(no_password) = &credentials.no_password {
            supported.push(CredentialOptionKind::NoPassword);
            if no_password.preferred {
                preferred.push(CredentialOptionKind::NoPassword);
            }
        }
        if let Some(random_password) = &credentials.random_password {
            supported.push(CredentialOptionKind::RandomPassword);
            if random_password.preferred {
                preferred.push(CredentialOptionKind::RandomPassword);
            }
        }

        if supported.is_empty() {
            return Ok(None);
        }
        if preferred.len() > 1 {
            return Err(ConnectorError::configuration(
                "multiple preferred credential options are not supported",
            ));
        }

        Ok(Some(CredentialDetails {
            preferred: preferred.first().copied().unwrap_or(supported[0]),
            supported,
        }))
    }
}

/// Build the account creation inputs: schema field values by type, then
/// generated credentials, then the `input`/`credentials` submaps, unless
/// an author-declared schema field already took those names.
pub(crate) fn prepare_account_inputs(
    provisioning: &AccountProvisioning,
    info: &AccountInfo,
    credential_options: Option<&CredentialOptions>,
) -> ConnectorResult<(Inputs, Vec<PlaintextData>)> {
    let mut query_inputs = Inputs::new();
    let mut schema_vars = rhai::Map::new();

    for field in &provisioning.schema {
        let Some(value) = info.profile.get(&field.name) else {
            continue;
        };

        let parsed: Option<Dynamic> = match field.field_type.as_str() {
            "string" => value
                .as_str()
                .filter(|s| !s.is_empty())
                .map(|s| Dynamic::from(s.to_string())),
            "string_list" => value.as_array().map(|items| {
                let list: rhai::Array = items
                    .iter()
                    .filter_map(|item| item.as_str())
                    .filter(|s| !s.is_empty())
                    .map(|s| Dynamic::from(s.to_string()))
                    .collect();
                Dynamic::from(list)
            }),
            "boolean" => value.as_bool().map(Dynamic::from),
            "int" => value.as_i64().filter(|n| *n != 0).map(Dynamic::from),
            "map" => value
                .as_object()
                .and_then(|_| rhai::serde::to_dynamic(value).ok()),
            other => {
                warn!(field = %field.name, field_type = %other, "unsupported schema field type, skipping");
                None
            }
        };

        if let Some(parsed) = parsed {
            query_inputs.set(&field.name, parsed.clone());
            schema_vars.insert(field.name.clone().into(), parsed);
        }
    }

    let mut credentials = rhai::Map::new();
    let mut plaintext = Vec::new();

    match credential_options {
        None | Some(CredentialOptions::NoPassword) => {}
        Some(CredentialOptions::RandomPassword(options)) => {
            let password = generate_random_password(options)?;

            query_inputs.set("password", Dynamic::from(password.clone()));
            credentials.insert("password".into(), Dynamic::from(password.clone()));
            plaintext.push(PlaintextData {
                name: "password".to_string(),
                bytes: password.into_bytes(),
            });
        }
    }

    // Namespaced access for expressions. The author's schema field wins a
    // name collision.
    if !schema_vars.is_empty() && query_inputs.get("input").is_none() {
        query_inputs.set("input", Dynamic::from(schema_vars));
    }
    if !credentials.is_empty() && query_inputs.get("credentials").is_none() {
        query_inputs.set("credentials", Dynamic::from(credentials));
    }

    Ok((query_inputs, plaintext))
}

/// Generate a random password meeting the per-charset minimum counts.
pub(crate) fn generate_random_password(
    options: &RandomPasswordOptions,
) -> ConnectorResult<String> {
    let minimum_total =
        options.min_lowercase + options.min_uppercase + options.min_digits + options.min_symbols;
    let length = options.length.max(minimum_total);
    if length == 0 {
        return Err(ConnectorError::configuration(
            "random password length must be positive",
        ));
    }

    let mut rng = OsRng;
    let mut chars: Vec<u8> = Vec::with_capacity(length);

    let mut take = |set: &[u8], n: usize, chars: &mut Vec<u8>| {
        for _ in 0..n {
            chars.push(set[rng.gen_range(0..set.len())]);
        }
    };

    take(LOWERCASE, options.min_lowercase, &mut chars);
    take(UPPERCASE, options.min_uppercase, &mut chars);
    take(DIGITS, options.min_digits, &mut chars);
    take(SYMBOLS, options.min_symbols, &mut chars);

    let all: Vec<u8> = [LOWERCASE, UPPERCASE, DIGITS, SYMBOLS].concat();
    while chars.len() < length {
        chars.push(all[rng.gen_range(0..all.len())]);
    }

    chars.shuffle(&mut rng);
    String::from_utf8(chars)
        .map_err(|_| ConnectorError::configuration("generated password was not valid UTF-8"))
}
