//! The expression environment.
//!
//! A sandboxed engine shared by every evaluation. The engine is effectively
//! immutable after construction and safe for concurrent read access;
//! compiled expressions are cached since the same mapping expressions run
//! once per row.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rhai::{Dynamic, Engine, AST};

use crate::error::{ExprError, ExprResult};
use crate::functions;
use crate::inputs::Inputs;
use crate::preprocess::preprocess;

/// Maximum number of operations per evaluation.
const MAX_OPERATIONS: u64 = 100_000;

/// Maximum call stack depth.
const MAX_CALL_STACK_DEPTH: usize = 64;

/// Maximum string size in bytes.
const MAX_STRING_SIZE: usize = 65536;

/// Maximum array size.
const MAX_ARRAY_SIZE: usize = 10_000;

/// Maximum map size.
const MAX_MAP_SIZE: usize = 10_000;

/// Shared expression environment.
pub struct Env {
    engine: Engine,
    cache: RwLock<HashMap<String, Arc<AST>>>,
}

impl Env {
    /// Build the environment: a sandboxed engine with the extension
    /// function catalog registered.
    pub fn new() -> Self {
        let mut engine = Engine::new();

        engine.set_max_operations(MAX_OPERATIONS);
        engine.set_max_call_levels(MAX_CALL_STACK_DEPTH);
        engine.set_max_string_size(MAX_STRING_SIZE);
        engine.set_max_array_size(MAX_ARRAY_SIZE);
        engine.set_max_map_size(MAX_MAP_SIZE);

        functions::register_all(&mut engine);

        Self {
            engine,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn compiled(&self, processed: &str) -> ExprResult<Arc<AST>> {
        if let Ok(cache) = self.cache.read() {
            if let Some(ast) = cache.get(processed) {
                return Ok(ast.clone());
            }
        }

        let ast = self
            .engine
            .compile_expression(processed)
            .map_err(|e| ExprError::Compile {
                expr: processed.to_string(),
                message: e.to_string(),
            })?;
        let ast = Arc::new(ast);

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(processed.to_string(), ast.clone());
        }

        Ok(ast)
    }

    /// Evaluate an expression against the given inputs.
    pub fn evaluate(&self, expr: &str, inputs: &Inputs) -> ExprResult<Dynamic> {
        let processed = preprocess(expr);
        let ast = self.compiled(&processed)?;

        let mut scope = inputs.to_scope();
        self.engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
            .map_err(|e| ExprError::Eval {
                expr: expr.to_string(),
                message: e.to_string(),
            })
    }

    /// Evaluate an expression and coerce the result to a string.
    ///
    /// Strings pass through; integers become decimal strings; booleans and
    /// floats use their display form. Anything else is a type error.
    pub fn evaluate_string(&self, expr: &str, inputs: &Inputs) -> ExprResult<String> {
        let out = self.evaluate(expr, inputs)?;
        let type_name = out.type_name();

        if let Ok(i) = out.as_int() {
            return Ok(i.to_string());
        }
        if let Ok(b) = out.as_bool() {
            return Ok(b.to_string());
        }
        if let Ok(f) = out.as_float() {
            return Ok(f.to_string());
        }
        if let Ok(c) = out.as_char() {
            return Ok(c.to_string());
        }
        out.into_string().map_err(|_| ExprError::Type {
            expected: "string",
            actual: type_name.to_string(),
        })
    }

    /// Evaluate an expression and coerce the result to a bool.
    ///
    /// Booleans pass through; non-zero integers are true; strings parse
    /// case-insensitively as `true`/`false`/`1`/`0`. Anything else is a
    /// type error.
    pub fn evaluate_bool(&self, expr: &str, inputs: &Inputs) -> ExprResult<bool> {
        let out = self.evaluate(expr, inputs)?;
        let type_name = out.type_name();

        if let Ok(b) = out.as_bool() {
            return Ok(b);
        }
        if let Ok(i) = out.as_int() {
            return Ok(i != 0);
        }
        if let Ok(s) = out.into_string() {
            return match s.to_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(ExprError::Type {
                    expected: "bool",
                    actual: format!("string {s:?}"),
                }),
            };
        }
        Err(ExprError::Type {
            expected: "bool",
            actual: type_name.to_string(),
        })
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::Map;

    fn row(entries: &[(&str, Dynamic)]) -> Inputs {
        let mut cols = Map::new();
        for (k, v) in entries {
            cols.insert((*k).into(), v.clone());
        }
        let mut inputs = Inputs::new();
        inputs.set_row(cols);
        inputs
    }

    #[test]
    fn test_evaluate_column_reference() {
        let env = Env::new();
        let inputs = row(&[("name", Dynamic::from("alice".to_string()))]);

        let out = env.evaluate_string(".name", &inputs).unwrap();
        assert_eq!(out, "alice");
    }

    #[test]
    fn test_evaluate_bare_identifier_is_literal() {
        let env = Env::new();
        let out = env.evaluate_string("admin", &Inputs::new()).unwrap();
        assert_eq!(out, "admin");
    }

    #[test]
    fn test_evaluate_booleans_stay_booleans() {
        let env = Env::new();
        assert!(env.evaluate_bool("true", &Inputs::new()).unwrap());
        assert!(!env.evaluate_bool("false", &Inputs::new()).unwrap());
    }

    #[test]
    fn test_evaluate_string_coerces_integers() {
        let env = Env::new();
        let inputs = row(&[("id", Dynamic::from(42_i64))]);
        assert_eq!(env.evaluate_string(".id", &inputs).unwrap(), "42");
    }

    #[test]
    fn test_evaluate_bool_coercions() {
        let env = Env::new();
        let inputs = row(&[
            ("n", Dynamic::from(2_i64)),
            ("z", Dynamic::from(0_i64)),
            ("s", Dynamic::from("TRUE".to_string())),
            ("f", Dynamic::from("0".to_string())),
            ("bad", Dynamic::from("maybe".to_string())),
        ]);

        assert!(env.evaluate_bool(".n", &inputs).unwrap());
        assert!(!env.evaluate_bool(".z", &inputs).unwrap());
        assert!(env.evaluate_bool(".s", &inputs).unwrap());
        assert!(!env.evaluate_bool(".f", &inputs).unwrap());
        assert!(env.evaluate_bool(".bad", &inputs).is_err());
    }

    #[test]
    fn test_evaluate_comparison() {
        let env = Env::new();
        let inputs = row(&[("role_name", Dynamic::from("Admin".to_string()))]);

        assert!(env
            .evaluate_bool(".role_name == \"Admin\"", &inputs)
            .unwrap());
        assert!(!env
            .evaluate_bool(".role_name == \"Viewer\"", &inputs)
            .unwrap());
    }

    #[test]
    fn test_evaluate_member_access_on_resource() {
        let env = Env::new();
        let mut inputs = Inputs::new();
        inputs.set_resource("admin", "role", "Administrators");

        assert_eq!(
            env.evaluate_string("resource.ID", &inputs).unwrap(),
            "admin"
        );
        assert_eq!(
            env.evaluate_string("resource.Type", &inputs).unwrap(),
            "role"
        );
    }

    #[test]
    fn test_compile_error_surfaces() {
        let env = Env::new();
        let err = env.evaluate("1 +", &Inputs::new()).unwrap_err();
        assert!(matches!(err, ExprError::Compile { .. }));
    }

    #[test]
    fn test_statements_are_rejected() {
        let env = Env::new();
        assert!(env.evaluate("let x = 1; x", &Inputs::new()).is_err());
    }

    #[test]
    fn test_cache_reuses_compiled_expressions() {
        let env = Env::new();
        let inputs = row(&[("name", Dynamic::from("a".to_string()))]);
        env.evaluate_string(".name", &inputs).unwrap();
        env.evaluate_string(".name", &inputs).unwrap();

        let cache = env.cache.read().unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_string_concatenation() {
        let env = Env::new();
        let inputs = row(&[
            ("first", Dynamic::from("Ada".to_string())),
            ("last", Dynamic::from("Lovelace".to_string())),
        ]);

        let out = env
            .evaluate_string(".first + \" \" + .last", &inputs)
            .unwrap();
        assert_eq!(out, "Ada Lovelace");
    }
}
