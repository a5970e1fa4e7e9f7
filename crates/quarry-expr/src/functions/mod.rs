//! Extension function catalog.
//!
//! Each function is declared as a [`FunctionDefinition`]: its name, an
//! overload operator id, a registrar that binds the implementation into an
//! engine, and table-driven test cases. The environment builder walks the
//! catalog at construction time; the test suite walks it again and
//! evaluates every declared case.

use rhai::{Dynamic, Engine, EvalAltResult};

use crate::inputs::Inputs;

pub mod case;
pub mod php;
pub mod slugify;

pub use case::{title_case, to_lower, to_upper};
pub use php::{php_deserialize_string_array, php_serialize_string_array, PhpValue};
pub use slugify::slugify;

/// A single extension function and its self-tests.
pub struct FunctionDefinition {
    /// Name the function is callable by in expressions.
    pub name: &'static str,
    /// Overload operator id, unique across the catalog.
    pub operator: &'static str,
    /// Binds the implementation into an engine.
    pub registrar: fn(&mut Engine),
    /// Expressions exercising the function, with expected results.
    pub test_cases: &'static [ExprTestCase],
}

/// One catalog test case.
pub struct ExprTestCase {
    pub expr: &'static str,
    pub expected: Expected,
    /// Bindings for the evaluation; defaults to empty inputs.
    pub inputs: Option<fn() -> Inputs>,
}

/// Expected evaluation result of a test case.
pub enum Expected {
    Str(&'static str),
    StrList(&'static [&'static str]),
}

fn register_to_upper(engine: &mut Engine) {
    engine.register_fn("toUpper", |s: &str| to_upper(s));
}

fn register_to_lower(engine: &mut Engine) {
    engine.register_fn("toLower", |s: &str| to_lower(s));
}

fn register_title_case(engine: &mut Engine) {
    engine.register_fn("titleCase", |s: &str| title_case(s));
}

fn register_slugify(engine: &mut Engine) {
    engine.register_fn("slugify", |s: &str| slugify(s));
}

fn register_php_deserialize(engine: &mut Engine) {
    engine.register_fn(
        "phpDeserializeStringArray",
        |s: &str| -> Result<rhai::Array, Box<EvalAltResult>> {
            php_deserialize_string_array(s)
                .map(|keys| keys.into_iter().map(Dynamic::from).collect())
                .map_err(|e| format!("phpDeserializeStringArray: {e}").into())
        },
    );
}

fn register_php_serialize(engine: &mut Engine) {
    engine.register_fn(
        "phpSerializeStringArray",
        |items: rhai::Array| -> Result<String, Box<EvalAltResult>> {
            let mut strings = Vec::with_capacity(items.len());
            for item in items {
                let type_name = item.type_name();
                let s = item.into_string().map_err(|_| -> Box<EvalAltResult> {
                    format!("phpSerializeStringArray: expected string element, got {type_name}")
                        .into()
                })?;
                strings.push(s);
            }
            Ok(php_serialize_string_array(&strings))
        },
    );
}

fn username_inputs() -> Inputs {
    let mut cols = rhai::Map::new();
    cols.insert("username".into(), Dynamic::from("alice".to_string()));
    let mut inputs = Inputs::new();
    inputs.set_row(cols);
    inputs
}

/// All extension functions known to the environment.
pub fn catalog() -> Vec<FunctionDefinition> {
    vec![
        FunctionDefinition {
            name: "toUpper",
            operator: "toUpper_string",
            registrar: register_to_upper,
            test_cases: &[
                ExprTestCase {
                    expr: "toUpper(\"hello\")",
                    expected: Expected::Str("HELLO"),
                    inputs: None,
                },
                ExprTestCase {
                    expr: "toUpper(\"\")",
                    expected: Expected::Str(""),
                    inputs: None,
                },
                ExprTestCase {
                    expr: "toUpper(\"MiXeD 42\")",
                    expected: Expected::Str("MIXED 42"),
                    inputs: None,
                },
            ],
        },
        FunctionDefinition {
            name: "toLower",
            operator: "toLower_string",
            registrar: register_to_lower,
            test_cases: &[
                ExprTestCase {
                    expr: "toLower(\"HELLO\")",
                    expected: Expected::Str("hello"),
                    inputs: None,
                },
                ExprTestCase {
                    expr: "toLower(\"MiXeD 42\")",
                    expected: Expected::Str("mixed 42"),
                    inputs: None,
                },
            ],
        },
        FunctionDefinition {
            name: "titleCase",
            operator: "titleCase_string",
            registrar: register_title_case,
            test_cases: &[
                ExprTestCase {
                    expr: "titleCase(\"hello\")",
                    expected: Expected::Str("Hello"),
                    inputs: None,
                },
                ExprTestCase {
                    expr: "titleCase(\"\")",
                    expected: Expected::Str(""),
                    inputs: None,
                },
                ExprTestCase {
                    expr: "titleCase(\"Hello\")",
                    expected: Expected::Str("Hello"),
                    inputs: None,
                },
                ExprTestCase {
                    expr: "\"foo\" + titleCase(\"bar\")",
                    expected: Expected::Str("fooBar"),
                    inputs: None,
                },
                ExprTestCase {
                    expr: "titleCase(\"foo bar qux baz\")",
                    expected: Expected::Str("Foo Bar Qux Baz"),
                    inputs: None,
                },
                ExprTestCase {
                    expr: "titleCase(cols[\"username\"])",
                    expected: Expected::Str("Alice"),
                    inputs: Some(username_inputs),
                },
            ],
        },
        FunctionDefinition {
            name: "slugify",
            operator: "slugify_string",
            registrar: register_slugify,
            test_cases: &[
                ExprTestCase {
                    expr: "slugify(\"Hello, World!\")",
                    expected: Expected::Str("hello-world"),
                    inputs: None,
                },
                ExprTestCase {
                    expr: "slugify(\"GoLang_is Awesome\")",
                    expected: Expected::Str("golang-is-awesome"),
                    inputs: None,
                },
                ExprTestCase {
                    expr: "slugify(\"____leading_and_trailing____\")",
                    expected: Expected::Str("leading-and-trailing"),
                    inputs: None,
                },
                ExprTestCase {
                    expr: "slugify(\"Already--slugified\")",
                    expected: Expected::Str("already-slugified"),
                    inputs: None,
                },
                ExprTestCase {
                    expr: "slugify(\"123 Numbers\")",
                    expected: Expected::Str("123-numbers"),
                    inputs: None,
                },
            ],
        },
        FunctionDefinition {
            name: "phpDeserializeStringArray",
            operator: "phpDeserializeStringArray_string",
            registrar: register_php_deserialize,
            test_cases: &[
                ExprTestCase {
                    expr: "phpDeserializeStringArray(\"a:1:{s:13:\\\"administrator\\\";b:1;}\")",
                    expected: Expected::StrList(&["administrator"]),
                    inputs: None,
                },
                ExprTestCase {
                    expr: "phpDeserializeStringArray(\"a:1:{s:13:\\\"administrator\\\";b:1;}\")[0]",
                    expected: Expected::Str("administrator"),
                    inputs: None,
                },
                ExprTestCase {
                    expr:
                        "phpDeserializeStringArray(\"a:2:{s:3:\\\"foo\\\";s:3:\\\"bar\\\";s:3:\\\"baz\\\";s:3:\\\"qux\\\";}\")[0]",
                    expected: Expected::Str("baz"),
                    inputs: None,
                },
                ExprTestCase {
                    expr:
                        "phpDeserializeStringArray(\"a:2:{s:3:\\\"foo\\\";s:3:\\\"bar\\\";s:3:\\\"baz\\\";s:3:\\\"qux\\\";}\")[1]",
                    expected: Expected::Str("foo"),
                    inputs: None,
                },
            ],
        },
        FunctionDefinition {
            name: "phpSerializeStringArray",
            operator: "phpSerializeStringArray_list_string",
            registrar: register_php_serialize,
            test_cases: &[
                ExprTestCase {
                    expr: "phpSerializeStringArray([\"administrator\"])",
                    expected: Expected::Str("a:1:{s:13:\"administrator\";b:1;}"),
                    inputs: None,
                },
                ExprTestCase {
                    expr: "phpSerializeStringArray([\"subscriber\"])",
                    expected: Expected::Str("a:1:{s:10:\"subscriber\";b:1;}"),
                    inputs: None,
                },
            ],
        },
    ]
}

/// Register every catalog function into an engine.
pub fn register_all(engine: &mut Engine) {
    for def in catalog() {
        (def.registrar)(engine);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Env;

    #[test]
    fn test_catalog_operators_are_unique() {
        let defs = catalog();
        for (i, a) in defs.iter().enumerate() {
            for b in defs.iter().skip(i + 1) {
                assert_ne!(a.operator, b.operator);
            }
        }
    }

    #[test]
    fn test_catalog_cases_evaluate() {
        let env = Env::new();
        for def in catalog() {
            for case in def.test_cases {
                let inputs = case.inputs.map(|f| f()).unwrap_or_default();
                let out = env
                    .evaluate(case.expr, &inputs)
                    .unwrap_or_else(|e| panic!("{}/{}: {e}", def.name, case.expr));

                match &case.expected {
                    Expected::Str(want) => {
                        let got = out
                            .into_string()
                            .unwrap_or_else(|t| panic!("{}: expected string, got {t}", def.name));
                        assert_eq!(got, *want, "{}/{}", def.name, case.expr);
                    }
                    Expected::StrList(want) => {
                        let arr = out.cast::<rhai::Array>();
                        let got: Vec<String> = arr
                            .into_iter()
                            .map(|d| d.into_string().expect("string list element"))
                            .collect();
                        let want: Vec<String> = want.iter().map(|s| s.to_string()).collect();
                        assert_eq!(got, want, "{}/{}", def.name, case.expr);
                    }
                }
            }
        }
    }

    #[test]
    fn test_php_deserialize_error_surfaces() {
        let env = Env::new();
        let err = env
            .evaluate("phpDeserializeStringArray(\"garbage\")", &Inputs::new())
            .unwrap_err();
        assert!(err.to_string().contains("phpDeserializeStringArray"));
    }
}
