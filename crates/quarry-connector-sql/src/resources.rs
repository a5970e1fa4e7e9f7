//! Row-to-resource mapping.

use tracing::warn;

use quarry_connector::error::{ConnectorError, ConnectorResult};
use quarry_connector::types::{
    AccountType, Annotation, AppTrait, Email, GroupTrait, Resource, ResourceId, ResourceTrait,
    RoleTrait, UserStatus, UserTrait,
};
use quarry_expr::Inputs;

use crate::config::{
    AppTraitMapping, GroupTraitMapping, ResourceMappingConfig, RoleTraitMapping, UserTraitMapping,
};
use crate::database::SqlRow;
use crate::inputs::sync_inputs;
use crate::syncer::SqlSyncer;
use crate::time::parse_time_with_dialect;

impl SqlSyncer {
    /// Map one row to a typed resource per the list mapping configuration.
    ///
    /// Any expression failure aborts mapping of the row; unknown status or
    /// account-type values only warn.
    pub(crate) fn map_resource(&self, row: &SqlRow) -> ConnectorResult<Resource> {
        let list = self
            .config
            .list
            .as_ref()
            .ok_or_else(|| ConnectorError::configuration("no resource list configuration provided"))?;
        let mapping = list
            .map
            .as_ref()
            .ok_or_else(|| ConnectorError::configuration("no mapping configuration provided"))?;

        let inputs = sync_inputs(Some(row));

        let mut resource = self.map_resource_fields(mapping, &inputs)?;
        resource.resource_trait = self.map_traits(mapping, &inputs)?;

        Ok(resource)
    }

    fn map_resource_fields(
        &self,
        mapping: &ResourceMappingConfig,
        inputs: &Inputs,
    ) -> ConnectorResult<Resource> {
        if mapping.id.is_empty() {
            return Err(ConnectorError::configuration(
                "no ID mapping configuration provided",
            ));
        }
        let id_value = self.env.evaluate_string(&mapping.id, inputs)?;
        let id = ResourceId::new(&self.resource_type.id, id_value)?;

        if mapping.display_name.is_empty() {
            return Err(ConnectorError::configuration(
                "no display name mapping configuration provided",
            ));
        }
        let display_name = self.env.evaluate_string(&mapping.display_name, inputs)?;

        let description = if mapping.description.is_empty() {
            String::new()
        } else {
            self.env.evaluate_string(&mapping.description, inputs)?
        };

        let mut annotations = Vec::new();
        if let Some(config) = &mapping.annotations {
            if let Some(link) = &config.external_link {
                annotations.push(Annotation::ExternalLink {
                    url: link.url.clone(),
                });
            }
        }

        Ok(Resource {
            id,
            display_name,
            description,
            resource_trait: None,
            annotations,
        })
    }

    /// Evaluate the configured trait category. The first set category of
    /// user, group, role, app wins; config validation rejects more than
    /// one.
    fn map_traits(
        &self,
        mapping: &ResourceMappingConfig,
        inputs: &Inputs,
    ) -> ConnectorResult<Option<ResourceTrait>> {
        let Some(traits) = &mapping.traits else {
            return Ok(None);
        };

        if let Some(user) = &traits.user {
            return Ok(Some(ResourceTrait::User(self.map_user_trait(user, inputs)?)));
        }
        if let Some(group) = &traits.group {
            return Ok(Some(ResourceTrait::Group(
                self.map_group_trait(group, inputs)?,
            )));
        }
        if let Some(role) = &traits.role {
            return Ok(Some(ResourceTrait::Role(self.map_role_trait(role, inputs)?)));
        }
        if let Some(app) = &traits.app {
            return Ok(Some(ResourceTrait::App(self.map_app_trait(app, inputs)?)));
        }

        Ok(None)
    }

    fn map_user_trait(
        &self,
        mapping: &UserTraitMapping,
        inputs: &Inputs,
    ) -> ConnectorResult<UserTrait> {
        let mut user = UserTrait::default();

        // The first configured email is the primary address.
        for (index, email_expr) in mapping.emails.iter().enumerate() {
            if email_expr.is_empty() {
                warn!(index, "missing email mapping configuration for user trait");
                continue;
            }
            let address = self.env.evaluate_string(email_expr, inputs)?;
            user.emails.push(Email {
                address,
                primary: index == 0,
            });
        }

        if !mapping.status.is_empty() {
            let status_value = self.env.evaluate_string(&mapping.status, inputs)?;
            user.status = match UserStatus::from_mapping(&status_value) {
                Some(status) => status,
                None => {
                    warn!(status = %status_value, "unexpected status value in mapping");
                    UserStatus::Unspecified
                }
            };

            if !mapping.status_details.is_empty() {
                let details = self.env.evaluate_string(&mapping.status_details, inputs)?;
                user.status_details = Some(details);
            }
        }

        for (key, value_expr) in &mapping.profile {
            let value = self.env.evaluate_string(value_expr, inputs)?;
            user.profile.insert(key.clone(), value);
        }

        if !mapping.last_login.is_empty() {
            let last_login = self.env.evaluate_string(&mapping.last_login, inputs)?;
            if !last_login.is_empty() {
                match parse_time_with_dialect(&last_login, self.db.dialect()) {
                    Ok(parsed) => user.last_login = Some(parsed),
                    Err(e) => {
                        warn!(last_login = %last_login, error = %e, "failed to parse last login time");
                    }
                }
            }
        }

        for id_expr in &mapping.employee_ids {
            let employee_id = self.env.evaluate_string(id_expr, inputs)?;
            if !employee_id.is_empty() {
                user.employee_ids.push(employee_id);
            }
        }

        if !mapping.account_type.is_empty() {
            let value = self.env.evaluate_string(&mapping.account_type, inputs)?;
            user.account_type = match AccountType::from_mapping(&value) {
                Some(account_type) => account_type,
                None => {
                    warn!(account_type = %value, "unexpected account type value in mapping, defaulting to human");
                    AccountType::Human
                }
            };
        }

        if !mapping.login.is_empty() {
            let login = self.env.evaluate_string(&mapping.login, inputs)?;
            user.login = Some(login);

            for alias_expr in &mapping.login_aliases {
                let alias = self.env.evaluate_string(alias_expr, inputs)?;
                if !alias.is_empty() {
                    user.login_aliases.push(alias);
                }
            }
        }

        // Manager mappings land in the profile map rather than dedicated
        // fields.
        if !mapping.manager_id.is_empty() {
            let manager_id = self.env.evaluate_string(&mapping.manager_id, inputs)?;
            if !manager_id.is_empty() {
                user.profile.insert("manager_id".to_string(), manager_id);
            }
        }
        if !mapping.manager_email.is_empty() {
            let manager_email = self.env.evaluate_string(&mapping.manager_email, inputs)?;
            if !manager_email.is_empty() {
                user.profile
                    .insert("manager_email".to_string(), manager_email);
            }
        }

        if !mapping.mfa_enabled.is_empty() {
            user.mfa_enabled = Some(self.env.evaluate_bool(&mapping.mfa_enabled, inputs)?);
        }
        if !mapping.sso_enabled.is_empty() {
            user.sso_enabled = Some(self.env.evaluate_bool(&mapping.sso_enabled, inputs)?);
        }

        Ok(user)
    }

    fn map_group_trait(
        &self,
        mapping: &GroupTraitMapping,
        inputs: &Inputs,
    ) -> ConnectorResult<GroupTrait> {
        let mut group = GroupTrait::default();
        for (key, value_expr) in &mapping.profile {
            let value = self.env.evaluate_string(value_expr, inputs)?;
            group.profile.insert(key.clone(), value);
        }
        Ok(group)
    }

    fn map_role_trait(
        &self,
        mapping: &RoleTraitMapping,
        inputs: &Inputs,
    ) -> ConnectorResult<RoleTrait> {
        let mut role = RoleTrait::default();
        for (key, value_expr) in &mapping.profile {
            let value = self.env.evaluate_string(value_expr, inputs)?;
            role.profile.insert(key.clone(), value);
        }
        Ok(role)
    }

    fn map_app_trait(
        &self,
        mapping: &AppTraitMapping,
        inputs: &Inputs,
    ) -> ConnectorResult<AppTrait> {
        let mut app = AppTrait::default();

        if !mapping.help_url.is_empty() {
            app.help_url = Some(self.env.evaluate_string(&mapping.help_url, inputs)?);
        }

        for (key, value_expr) in &mapping.profile {
            let value = self.env.evaluate_string(value_expr, inputs)?;
            app.profile.insert(key.clone(), value);
        }

        Ok(app)
    }
}
