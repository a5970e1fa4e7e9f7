//! Grant enumeration and mapping.
//!
//! A resource type may configure several grant queries. The page bag
//! linearizes them: the first call pushes one state per query, and each
//! subsequent call drains the top state until its query is exhausted, so
//! a token from query N is only ever consumed against query N.

use quarry_connector::error::{ConnectorError, ConnectorResult};
use quarry_connector::pagination::{PageBag, PageState, PageToken};
use quarry_connector::traits::ListResult;
use quarry_connector::types::{Annotation, Grant, Resource, ResourceId};

use crate::config::{GrantMapping, GrantsQuery};
use crate::database::SqlRow;
use crate::inputs::sync_inputs_with_resource;
use crate::syncer::SqlSyncer;

const GRANT_QUERY_KIND: &str = "grant-query";

impl SqlSyncer {
    /// Enumerate one page of grants for a resource across the configured
    /// grant queries.
    pub(crate) async fn grants_page(
        &self,
        resource: &Resource,
        token: &PageToken,
    ) -> ConnectorResult<ListResult<Grant>> {
        if self.config.grants.is_empty() {
            return Ok(ListResult::empty());
        }

        let mut bag = PageBag::unmarshal(&token.token)?;
        if bag.current().is_none() {
            for index in 0..self.config.grants.len() {
                bag.push(PageState {
                    kind: GRANT_QUERY_KIND.to_string(),
                    id: index.to_string(),
                    token: String::new(),
                });
            }
        }

        let current = match bag.current() {
            Some(state) if state.kind == GRANT_QUERY_KIND => state.clone(),
            _ => return Err(ConnectorError::invalid_page_token("invalid page token")),
        };

        let index: usize = current.id.parse().map_err(|_| {
            ConnectorError::invalid_page_token(format!(
                "invalid grant query index: {}",
                current.id
            ))
        })?;
        let grant_config = self.config.grants.get(index).ok_or_else(|| {
            ConnectorError::invalid_page_token(format!("grant query index {index} out of range"))
        })?;

        let inner_token = PageToken {
            token: current.token.clone(),
            size: token.size,
        };
        let (items, inner_next) = self
            .list_grants(resource, &inner_token, grant_config)
            .await?;

        bag.next(&inner_next);

        Ok(ListResult {
            items,
            next_page_token: bag.marshal()?,
        })
    }

    async fn list_grants(
        &self,
        resource: &Resource,
        token: &PageToken,
        config: &GrantsQuery,
    ) -> ConnectorResult<(Vec<Grant>, String)> {
        let inputs = sync_inputs_with_resource(None, resource);
        let vars = self.prepare_query_vars(&inputs, &config.vars)?;

        let mut items = Vec::new();
        let next = self
            .run_query(
                Some(token),
                &config.query,
                config.pagination.as_ref(),
                &vars,
                |row| {
                    for mapping in &config.map {
                        if let Some(grant) = self.map_grant(resource, mapping, row)? {
                            items.push(grant);
                        }
                    }
                    Ok(true)
                },
            )
            .await?;

        Ok((items, next))
    }

    /// Map one row through one grant mapping. Returns `None` when
    /// `skip_if` evaluates truthy.
    pub(crate) fn map_grant(
        &self,
        resource: &Resource,
        mapping: &GrantMapping,
        row: &SqlRow,
    ) -> ConnectorResult<Option<Grant>> {
        if mapping.principal_id.is_empty() {
            return Err(ConnectorError::configuration(
                "missing principal ID mapping",
            ));
        }
        if mapping.principal_type.is_empty() {
            return Err(ConnectorError::configuration(
                "missing principal type mapping",
            ));
        }
        if mapping.entitlement_id.is_empty() {
            return Err(ConnectorError::configuration(
                "missing entitlement ID mapping",
            ));
        }

        let inputs = sync_inputs_with_resource(Some(row), resource);

        if !mapping.skip_if.is_empty() && self.env.evaluate_bool(&mapping.skip_if, &inputs)? {
            return Ok(None);
        }

        let principal_id = self.env.evaluate_string(&mapping.principal_id, &inputs)?;
        // The principal type is a literal, not an expression.
        let principal = ResourceId::new(&mapping.principal_type, principal_id)?;

        let entitlement_id = self.env.evaluate_string(&mapping.entitlement_id, &inputs)?;

        let mut annotations = Vec::new();
        if let Some(expandable) = &mapping.expandable {
            let skip = !expandable.skip_if.is_empty()
                && self.env.evaluate_bool(&expandable.skip_if, &inputs)?;

            if !skip {
                let mut entitlement_ids = Vec::new();
                for expr in &expandable.entitlement_ids {
                    entitlement_ids.push(self.env.evaluate_string(expr, &inputs)?);
                }
                annotations.push(Annotation::GrantExpandable {
                    entitlement_ids,
                    shallow: expandable.shallow,
                });
            }
        }

        Ok(Some(Grant {
            principal,
            entitlement_id,
            annotations,
        }))
    }
}
