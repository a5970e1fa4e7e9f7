//! Expression preprocessing sugar.
//!
//! Two rewrites are applied before compilation:
//!
//! 1. An expression that is nothing but a bare identifier becomes a string
//!    literal (`admin` -> `"admin"`), except the keywords `true`/`false`.
//! 2. A leading-dot column reference becomes a map access on the current
//!    row (`.role_name` -> `cols["role_name"]`). Member access such as
//!    `user.role` is left untouched.

use std::sync::LazyLock;

use regex::Regex;

static BARE_IDENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("BARE_IDENT_RE is a valid regex pattern")
});

static DOT_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\w+").expect("DOT_FIELD_RE is a valid regex pattern"));

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Rewrite column references and bare strings.
///
/// Example: `.role_name == "Admin"` -> `cols["role_name"] == "Admin"`.
pub fn preprocess(expr: &str) -> String {
    if BARE_IDENT_RE.is_match(expr) {
        if expr == "true" || expr == "false" {
            return expr.to_string();
        }
        return format!("\"{expr}\"");
    }

    let bytes = expr.as_bytes();
    let mut result = String::with_capacity(expr.len());
    let mut last = 0;

    for m in DOT_FIELD_RE.find_iter(expr) {
        result.push_str(&expr[last..m.start()]);

        // A dot preceded by an identifier character is member access, not a
        // column reference.
        if m.start() > 0 && is_ident_byte(bytes[m.start() - 1]) {
            result.push_str(m.as_str());
        } else {
            let field = &m.as_str()[1..];
            result.push_str("cols[\"");
            result.push_str(field);
            result.push_str("\"]");
        }
        last = m.end();
    }
    result.push_str(&expr[last..]);

    result
}
