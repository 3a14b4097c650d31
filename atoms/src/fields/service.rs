use serde_json::{Map, Value};

use super::model::{AccessFn, CallerContext, FieldDef, FieldType};
use crate::error::StoreError;

/// Validate a full field map for record creation. Returns the effective map:
/// supplied values that pass their type check, plus declared defaults for
/// omitted optional fields. Nothing is persisted on failure.
pub fn validate_fields(
    defs: &[FieldDef],
    supplied: &Map<String, Value>,
) -> Result<Map<String, Value>, StoreError> {
    reject_unknown(defs, supplied)?;

    let mut effective = Map::new();
    for def in defs {
        match supplied.get(&def.name) {
            Some(value) if !value.is_null() => {
                check_type(def, value)?;
                effective.insert(def.name.clone(), value.clone());
            }
            _ => {
                if let Some(default) = &def.default {
                    effective.insert(def.name.clone(), default.clone());
                } else if def.required {
                    return Err(StoreError::Validation(format!(
                        "missing required field: {}",
                        def.name
                    )));
                }
            }
        }
    }
    Ok(effective)
}

/// Validate the supplied subset of fields for an update. Null clears an
/// optional field; clearing a required field is rejected.
pub fn validate_partial(
    defs: &[FieldDef],
    supplied: &Map<String, Value>,
) -> Result<Map<String, Value>, StoreError> {
    let mut changes = Map::new();
    for (name, value) in supplied {
        let def = match defs.iter().find(|d| d.name == *name) {
            Some(def) => def,
            None => {
                return Err(StoreError::Validation(format!("unknown field: {}", name)));
            }
        };
        if value.is_null() {
            if def.required {
                return Err(StoreError::Validation(format!(
                    "required field cannot be cleared: {}",
                    name
                )));
            }
        } else {
            check_type(def, value)?;
        }
        changes.insert(name.clone(), value.clone());
    }
    Ok(changes)
}

/// Evaluate an access predicate for an operation.
pub fn check_access(policy: AccessFn, ctx: &CallerContext, op: &str) -> Result<(), StoreError> {
    if policy(ctx) {
        Ok(())
    } else {
        Err(StoreError::Forbidden(format!("{} not allowed", op)))
    }
}

fn reject_unknown(defs: &[FieldDef], supplied: &Map<String, Value>) -> Result<(), StoreError> {
    for name in supplied.keys() {
        if !defs.iter().any(|d| d.name == *name) {
            return Err(StoreError::Validation(format!("unknown field: {}", name)));
        }
    }
    Ok(())
}

fn check_type(def: &FieldDef, value: &Value) -> Result<(), StoreError> {
    let (ok, expected) = match def.field_type {
        FieldType::Text => (value.is_string(), "text"),
        FieldType::Number => (value.is_number(), "number"),
        FieldType::Checkbox => (value.is_boolean(), "checkbox"),
    };
    if ok {
        Ok(())
    } else {
        Err(StoreError::Validation(format!(
            "field {} expects a {} value",
            def.name, expected
        )))
    }
}
