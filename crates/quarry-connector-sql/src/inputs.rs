//! Bridging between SQL rows, identity types, and expression inputs.

use quarry_connector::error::{ConnectorError, ConnectorResult};
use quarry_connector::ids::split_entitlement_id;
use quarry_connector::types::{Entitlement, Resource};
use quarry_expr::rhai;
use quarry_expr::{Dynamic, Inputs, Map};

use crate::database::{SqlRow, SqlValue};

/// Convert one SQL value into an expression value.
pub fn sql_value_to_dynamic(value: &SqlValue) -> Dynamic {
    match value {
        SqlValue::Null => Dynamic::UNIT,
        SqlValue::Bool(b) => Dynamic::from(*b),
        SqlValue::Int(i) => Dynamic::from(*i),
        SqlValue::UInt(u) => match i64::try_from(*u) {
            Ok(i) => Dynamic::from(i),
            Err(_) => Dynamic::from(u.to_string()),
        },
        SqlValue::Float(f) => Dynamic::from(*f),
        SqlValue::Text(s) => Dynamic::from(s.clone()),
        SqlValue::Bytes(b) => Dynamic::from_blob(b.clone()),
    }
}

/// Convert an expression value into a SQL parameter.
pub fn dynamic_to_sql_value(value: &Dynamic) -> ConnectorResult<SqlValue> {
    if value.is_unit() {
        return Ok(SqlValue::Null);
    }
    if let Ok(i) = value.as_int() {
        return Ok(SqlValue::Int(i));
    }
    if let Ok(b) = value.as_bool() {
        return Ok(SqlValue::Bool(b));
    }
    if let Ok(f) = value.as_float() {
        return Ok(SqlValue::Float(f));
    }
    if let Ok(c) = value.as_char() {
        return Ok(SqlValue::Text(c.to_string()));
    }
    if value.is_blob() {
        return Ok(SqlValue::Bytes(value.clone().cast::<rhai::Blob>()));
    }

    let type_name = value.type_name();
    value
        .clone()
        .into_string()
        .map(SqlValue::Text)
        .map_err(|_| {
            ConnectorError::expression(format!("unsupported query parameter type {type_name}"))
        })
}

/// Build the `cols` binding from a row.
pub fn row_to_map(row: &SqlRow) -> Map {
    let mut map = Map::new();
    for (name, value) in row.iter() {
        map.insert(name.into(), sql_value_to_dynamic(value));
    }
    map
}

/// Inputs for sync-phase evaluations: the current row, if any.
pub fn sync_inputs(row: Option<&SqlRow>) -> Inputs {
    let mut inputs = Inputs::new();
    if let Some(row) = row {
        inputs.set_row(row_to_map(row));
    }
    inputs
}

/// Inputs for sync-phase evaluations with a current resource.
pub fn sync_inputs_with_resource(row: Option<&SqlRow>, resource: &Resource) -> Inputs {
    let mut inputs = sync_inputs(row);
    inputs.set_resource(
        &resource.id.resource,
        &resource.id.resource_type,
        &resource.display_name,
    );
    inputs
}

/// Inputs for grant/revoke provisioning: the principal, the entitlement's
/// local id, and the resource recovered from the entitlement id.
pub fn provisioning_inputs(
    principal: &Resource,
    entitlement: &Entitlement,
) -> ConnectorResult<Inputs> {
    let (resource_type, resource_id, local_id) = split_entitlement_id(&entitlement.id)?;

    let mut inputs = Inputs::new();
    inputs.set_principal(&principal.id.resource, &principal.id.resource_type);
    inputs.set_entitlement(local_id);
    inputs.set_resource(resource_id, resource_type, "");
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_connector::types::ResourceId;

    fn resource(rt: &str, id: &str, name: &str) -> Resource {
        Resource {
            id: ResourceId::new(rt, id).unwrap(),
            display_name: name.to_string(),
            description: String::new(),
            resource_trait: None,
            annotations: Vec::new(),
        }
    }

    #[test]
    fn test_sql_value_round_trip() {
        let cases = vec![
            SqlValue::Null,
            SqlValue::Bool(true),
            SqlValue::Int(-3),
            SqlValue::Float(2.5),
            SqlValue::Text("hello".to_string()),
        ];
        for value in cases {
            let dynamic = sql_value_to_dynamic(&value);
            assert_eq!(dynamic_to_sql_value(&dynamic).unwrap(), value);
        }
    }

    #[test]
    fn test_uint_conversion() {
        let in_range = sql_value_to_dynamic(&SqlValue::UInt(7));
        assert_eq!(dynamic_to_sql_value(&in_range).unwrap(), SqlValue::Int(7));

        let out_of_range = sql_value_to_dynamic(&SqlValue::UInt(u64::MAX));
        assert_eq!(
            dynamic_to_sql_value(&out_of_range).unwrap(),
            SqlValue::Text(u64::MAX.to_string())
        );
    }

    #[test]
    fn test_rejects_structured_parameters() {
        let map = Dynamic::from(Map::new());
        assert!(dynamic_to_sql_value(&map).is_err());
    }

    #[test]
    fn test_sync_inputs_carry_row_and_resource() {
        let mut row = SqlRow::new();
        row.push("email", SqlValue::Text("a@example.com".to_string()));

        let resource = resource("role", "admin", "Admins");
        let inputs = sync_inputs_with_resource(Some(&row), &resource);

        let env = quarry_expr::Env::new();
        assert_eq!(
            env.evaluate_string(".email", &inputs).unwrap(),
            "a@example.com"
        );
        assert_eq!(env.evaluate_string("resource.ID", &inputs).unwrap(), "admin");
        assert_eq!(
            env.evaluate_string("resource.DisplayName", &inputs).unwrap(),
            "Admins"
        );
    }

    #[test]
    fn test_provisioning_inputs_split_entitlement() {
        let principal = resource("user", "alice", "Alice");
        let entitlement = Entitlement {
            id: "role:admin:member".to_string(),
            resource: ResourceId::new("role", "admin").unwrap(),
            display_name: "Member".to_string(),
            description: String::new(),
            slug: "member".to_string(),
            purpose: Default::default(),
            grantable_to: Vec::new(),
            annotations: Vec::new(),
        };

        let inputs = provisioning_inputs(&principal, &entitlement).unwrap();
        let env = quarry_expr::Env::new();
        assert_eq!(
            env.evaluate_string("principal.ID", &inputs).unwrap(),
            "alice"
        );
        assert_eq!(
            env.evaluate_string("entitlement.ID", &inputs).unwrap(),
            "member"
        );
        assert_eq!(env.evaluate_string("resource.ID", &inputs).unwrap(), "admin");
        assert_eq!(env.evaluate_string("resource.Type", &inputs).unwrap(), "role");
    }
}
