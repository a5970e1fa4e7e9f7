//! Entitlement enumeration and mapping.

use quarry_connector::error::{ConnectorError, ConnectorResult};
use quarry_connector::ids::build_entitlement_id;
use quarry_connector::pagination::PageToken;
use quarry_connector::traits::ListResult;
use quarry_connector::types::{Annotation, Entitlement, EntitlementPurpose, Resource};

use crate::config::EntitlementMapping;
use crate::database::SqlRow;
use crate::inputs::sync_inputs_with_resource;
use crate::syncer::SqlSyncer;

impl SqlSyncer {
    /// Enumerate entitlements for a resource. Static entitlements take
    /// precedence: when configured, dynamic entitlements are ignored.
    pub(crate) async fn entitlements_page(
        &self,
        resource: &Resource,
        token: &PageToken,
    ) -> ConnectorResult<ListResult<Entitlement>> {
        if self.config.static_entitlements.is_some() {
            return self.static_entitlements(resource);
        }
        self.dynamic_entitlements(resource, token).await
    }

    /// Produce one entitlement per static entry. Static entitlements are
    /// never paginated.
    fn static_entitlements(&self, resource: &Resource) -> ConnectorResult<ListResult<Entitlement>> {
        let Some(entries) = &self.config.static_entitlements else {
            return Ok(ListResult::empty());
        };

        let inputs = sync_inputs_with_resource(None, resource);
        let mut items = Vec::new();

        for entry in entries {
            if entry.display_name.is_empty() {
                return Err(ConnectorError::configuration(
                    "static entitlements mapping display_name is required",
                ));
            }
            let display_name = self.env.evaluate_string(&entry.display_name, &inputs)?;

            let description = if entry.description.is_empty() {
                String::new()
            } else {
                self.env.evaluate_string(&entry.description, &inputs)?
            };

            let mut annotations = Vec::new();
            if entry.immutable {
                annotations.push(Annotation::EntitlementImmutable);
            }

            items.push(Entitlement {
                id: build_entitlement_id(&resource.id, &entry.id),
                resource: resource.id.clone(),
                display_name,
                description,
                // An unset slug defaults to the entitlement id.
                slug: if entry.slug.is_empty() {
                    entry.id.clone()
                } else {
                    entry.slug.clone()
                },
                purpose: EntitlementPurpose::from_mapping(&entry.purpose),
                grantable_to: Vec::new(),
                annotations,
            });
        }

        Ok(ListResult {
            items,
            next_page_token: String::new(),
        })
    }

    async fn dynamic_entitlements(
        &self,
        resource: &Resource,
        token: &PageToken,
    ) -> ConnectorResult<ListResult<Entitlement>> {
        let Some(config) = &self.config.entitlements else {
            return Ok(ListResult::empty());
        };

        let inputs = sync_inputs_with_resource(None, resource);
        let vars = self.prepare_query_vars(&inputs, &config.vars)?;

        let mut items = Vec::new();
        let next_page_token = self
            .run_query(
                Some(token),
                &config.query,
                config.pagination.as_ref(),
                &vars,
                |row| {
                    for mapping in &config.map {
                        if let Some(entitlement) = self.map_entitlement(resource, mapping, row)? {
                            items.push(entitlement);
                        }
                    }
                    Ok(true)
                },
            )
            .await?;

        Ok(ListResult {
            items,
            next_page_token,
        })
    }

    /// Map one row through one entitlement mapping. Returns `None` when
    /// `skip_if` evaluates truthy; that is a skip, not an error.
    pub(crate) fn map_entitlement(
        &self,
        resource: &Resource,
        mapping: &EntitlementMapping,
        row: &SqlRow,
    ) -> ConnectorResult<Option<Entitlement>> {
        let inputs = sync_inputs_with_resource(Some(row), resource);

        if !mapping.skip_if.is_empty() && self.env.evaluate_bool(&mapping.skip_if, &inputs)? {
            return Ok(None);
        }

        if mapping.id.is_empty() {
            return Err(ConnectorError::configuration(
                "entitlements mapping id is required",
            ));
        }
        let local_id = self.env.evaluate_string(&mapping.id, &inputs)?;

        if mapping.display_name.is_empty() {
            return Err(ConnectorError::configuration(
                "entitlements mapping display_name is required",
            ));
        }
        let display_name = self.env.evaluate_string(&mapping.display_name, &inputs)?;

        let description = if mapping.description.is_empty() {
            String::new()
        } else {
            self.env.evaluate_string(&mapping.description, &inputs)?
        };

        // Cross-reference grantable resource types; unknown ids are
        // silently dropped.
        let grantable_to = mapping
            .grantable_to
            .iter()
            .filter(|rt| self.full_config.resource_types.contains_key(*rt))
            .cloned()
            .collect();

        if mapping.slug.is_empty() {
            return Err(ConnectorError::configuration(
                "entitlements mapping slug is required",
            ));
        }
        let slug = self.env.evaluate_string(&mapping.slug, &inputs)?;

        let purpose = if mapping.purpose.is_empty() {
            EntitlementPurpose::Unspecified
        } else {
            let value = self.env.evaluate_string(&mapping.purpose, &inputs)?;
            EntitlementPurpose::from_mapping(&value)
        };

        let mut annotations = Vec::new();
        if mapping.immutable {
            annotations.push(Annotation::EntitlementImmutable);
        }

        Ok(Some(Entitlement {
            id: build_entitlement_id(&resource.id, &local_id),
            resource: resource.id.clone(),
            display_name,
            description,
            slug,
            purpose,
            grantable_to,
            annotations,
        }))
    }
}
