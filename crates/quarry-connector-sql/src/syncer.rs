//! The per-resource-type syncer and the connector assembly.

use std::sync::Arc;

use async_trait::async_trait;

use quarry_connector::error::{ConnectorError, ConnectorResult};
use quarry_connector::pagination::PageToken;
use quarry_connector::traits::{CreateAccountOp, ListResult, ProvisionOp, ResourceSyncer};
use quarry_connector::types::{
    AccountInfo, ConnectorMetadata, CredentialOptions, Entitlement, Grant, PlaintextData,
    Resource, ResourceType,
};
use quarry_expr::Env;

use crate::config::{Config, ResourceTypeConfig};
use crate::database::{self, Database};
use crate::inputs::sync_inputs;

/// Phase executor for one resource type: lists resources, enumerates
/// entitlements and grants, and runs provisioning against the database.
pub struct SqlSyncer {
    pub(crate) resource_type: ResourceType,
    pub(crate) config: ResourceTypeConfig,
    pub(crate) full_config: Arc<Config>,
    pub(crate) db: Arc<dyn Database>,
    pub(crate) env: Arc<Env>,
}

impl SqlSyncer {
    /// Create a syncer for one configured resource type.
    pub fn new(
        resource_type: ResourceType,
        config: ResourceTypeConfig,
        full_config: Arc<Config>,
        db: Arc<dyn Database>,
        env: Arc<Env>,
    ) -> Self {
        Self {
            resource_type,
            config,
            full_config,
            db,
            env,
        }
    }
}

#[async_trait]
impl ResourceSyncer for SqlSyncer {
    fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    async fn list(&self, token: &PageToken) -> ConnectorResult<ListResult<Resource>> {
        let list = self.config.list.as_ref().ok_or_else(|| {
            ConnectorError::configuration("no resource list configuration provided")
        })?;

        let inputs = sync_inputs(None);
        let vars = self.prepare_query_vars(&inputs, &list.vars)?;

        let mut items = Vec::new();
        let next_page_token = self
            .run_query(
                Some(token),
                &list.query,
                list.pagination.as_ref(),
                &vars,
                |row| {
                    items.push(self.map_resource(row)?);
                    Ok(true)
                },
            )
            .await?;

        Ok(ListResult {
            items,
            next_page_token,
        })
    }

    async fn entitlements(
        &self,
        resource: &Resource,
        token: &PageToken,
    ) -> ConnectorResult<ListResult<Entitlement>> {
        self.entitlements_page(resource, token).await
    }

    async fn grants(
        &self,
        resource: &Resource,
        token: &PageToken,
    ) -> ConnectorResult<ListResult<Grant>> {
        self.grants_page(resource, token).await
    }
}

#[async_trait]
impl ProvisionOp for SqlSyncer {
    async fn grant(&self, principal: &Resource, entitlement: &Entitlement) -> ConnectorResult<()> {
        self.grant_entitlement(principal, entitlement).await
    }

    async fn revoke(&self, grant: &Grant) -> ConnectorResult<()> {
        self.revoke_grant(grant).await
    }
}

#[async_trait]
impl CreateAccountOp for SqlSyncer {
    async fn create_account(
        &self,
        info: &AccountInfo,
        credential_options: Option<&CredentialOptions>,
    ) -> ConnectorResult<(Resource, Vec<PlaintextData>)> {
        self.create_account_internal(info, credential_options).await
    }
}

/// The assembled connector: configuration, database, and a shared
/// expression environment.
pub struct SqlConnector {
    config: Arc<Config>,
    db: Arc<dyn Database>,
    env: Arc<Env>,
}

impl SqlConnector {
    /// Connect to the database named by the configuration DSN and build
    /// the connector.
    pub async fn connect(config: Config) -> ConnectorResult<Self> {
        let db = database::connect(
            &config.connect.dsn,
            &config.connect.user,
            &config.connect.password,
        )
        .await?;
        Ok(Self::from_parts(config, db))
    }

    /// Assemble a connector from an already-connected database. The seam
    /// for host-supplied drivers and for tests.
    pub fn from_parts(config: Config, db: Arc<dyn Database>) -> Self {
        Self {
            config: Arc::new(config),
            db,
            env: Arc::new(Env::new()),
        }
    }

    /// Metadata describing the connector to its host.
    pub fn metadata(&self) -> ConnectorResult<ConnectorMetadata> {
        let display_name = if self.config.app_name.is_empty() {
            "Generic SQL Connector".to_string()
        } else {
            self.config.app_name.clone()
        };
        let description = if self.config.app_description.is_empty() {
            "Syncs identities from an arbitrary SQL database".to_string()
        } else {
            self.config.app_description.clone()
        };

        Ok(ConnectorMetadata {
            display_name,
            description,
            account_creation_schema: self.config.account_creation_schema()?,
        })
    }

    /// Build one syncer per configured resource type.
    pub fn resource_syncers(&self) -> ConnectorResult<Vec<SqlSyncer>> {
        let mut syncers = Vec::new();
        for (rt_id, rt_config) in &self.config.resource_types {
            let resource_type = self.config.get_resource_type(rt_id)?;
            syncers.push(SqlSyncer::new(
                resource_type,
                rt_config.clone(),
                self.config.clone(),
                self.db.clone(),
                self.env.clone(),
            ));
        }
        Ok(syncers)
    }
}
