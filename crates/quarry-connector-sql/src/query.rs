//! Query templating and paginated execution.
//!
//! Templated queries carry `?<KEY>` or `?<KEY|OPT[,OPT...]>` placeholders.
//! The reserved keys `limit`, `offset`, and `cursor` bind from the active
//! pagination context; any other key must be supplied by the caller. Every
//! substituted value becomes a dialect-appropriate bind parameter unless
//! the `unquoted` option interpolates it directly.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use quarry_connector::error::{ConnectorError, ConnectorResult};
use quarry_connector::pagination::PageToken;
use quarry_expr::Inputs;

use crate::config::{PaginationConfig, PaginationStrategy};
use crate::database::{Dialect, SqlRow, SqlValue, VarMap};
use crate::inputs::dynamic_to_sql_value;
use crate::syncer::SqlSyncer;

const MAX_PAGE_SIZE: usize = 1000;
const MIN_PAGE_SIZE: usize = 1;
const DEFAULT_PAGE_SIZE: usize = 100;

const LIMIT_KEY: &str = "limit";
const OFFSET_KEY: &str = "offset";
const CURSOR_KEY: &str = "cursor";
const UNQUOTED_OPT: &str = "unquoted";

static QUERY_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\?\<([a-zA-Z0-9_]+)(?:\|([a-zA-Z0-9_,]+))?\>")
        .expect("QUERY_TOKEN_RE is a valid regex pattern")
});

/// Parsed form of one `?<...>` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QueryTokenOpts {
    pub key: String,
    pub unquoted: bool,
}

/// Parse a single template token. Keys and options are case-insensitive.
pub(crate) fn parse_token(token: &str) -> ConnectorResult<QueryTokenOpts> {
    let caps = QUERY_TOKEN_RE
        .captures(token)
        .ok_or_else(|| ConnectorError::template(format!("invalid token format: {token}")))?;

    let mut opts = QueryTokenOpts {
        key: caps[1].to_lowercase(),
        unquoted: false,
    };

    let Some(opt_str) = caps.get(2) else {
        return Ok(opts);
    };

    for opt in opt_str.as_str().split(',') {
        match opt.trim().to_lowercase().as_str() {
            UNQUOTED_OPT => opts.unquoted = true,
            other => {
                return Err(ConnectorError::template(format!("unknown option {other}")));
            }
        }
    }

    Ok(opts)
}

/// Active pagination state for one query execution.
#[derive(Debug, Clone)]
pub(crate) struct PaginationContext {
    pub strategy: PaginationStrategy,
    pub limit: usize,
    pub offset: u64,
    pub cursor: String,
    pub primary_key: String,
}

pub(crate) fn clamp_page_size(size: usize) -> usize {
    if size == 0 {
        return DEFAULT_PAGE_SIZE;
    }
    size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
}

/// Build the pagination context for a page request, if the query is
/// configured for pagination at all.
pub(crate) fn setup_pagination(
    token: Option<&PageToken>,
    config: Option<&PaginationConfig>,
) -> ConnectorResult<Option<PaginationContext>> {
    let Some(config) = config else {
        return Ok(None);
    };

    let raw_token = token.map(|t| t.token.as_str()).unwrap_or("");
    let limit = clamp_page_size(token.map(|t| t.size).unwrap_or(0));

    let mut ctx = PaginationContext {
        strategy: config.strategy,
        limit,
        offset: 0,
        cursor: String::new(),
        primary_key: config.primary_key.clone(),
    };

    match config.strategy {
        PaginationStrategy::Offset => {
            if !raw_token.is_empty() {
                ctx.offset = raw_token.parse::<u64>().map_err(|e| {
                    ConnectorError::invalid_page_token(format!(
                        "failed to parse offset token {raw_token}: {e}"
                    ))
                })?;
            }
        }
        PaginationStrategy::Cursor => {
            ctx.cursor = raw_token.to_string();
        }
    }

    Ok(Some(ctx))
}

/// Compute the token for the next page.
///
/// The offset token is `(offset + 1) * limit`, the historical encoding of
/// page count times page size, which the parser accepts back as a plain
/// integer offset. Cursor tokens are the stringified primary key of the
/// last delivered row.
pub(crate) fn next_page_token(
    ctx: &PaginationContext,
    last_row_id: Option<&SqlValue>,
) -> ConnectorResult<String> {
    match ctx.strategy {
        PaginationStrategy::Offset => Ok(((ctx.offset + 1) * ctx.limit as u64).to_string()),
        PaginationStrategy::Cursor => match last_row_id {
            Some(SqlValue::Text(s)) => Ok(s.clone()),
            Some(SqlValue::Bytes(b)) => Ok(String::from_utf8_lossy(b).into_owned()),
            Some(SqlValue::Int(i)) => Ok(i.to_string()),
            Some(SqlValue::UInt(u)) => Ok(u.to_string()),
            Some(_) | None => Err(ConnectorError::invariant(
                "unexpected type for primary key",
            )),
        },
    }
}

enum ResolvedValue {
    Value(SqlValue),
    Missing,
}

fn resolve_reserved(
    key: &str,
    ctx: Option<&PaginationContext>,
    pagination_used: &mut bool,
) -> Option<ConnectorResult<SqlValue>> {
    let value = match key {
        // Request one more row than the page size so the executor can see
        // whether additional results exist.
        LIMIT_KEY => ctx.map(|c| SqlValue::Int(c.limit as i64 + 1)),
        OFFSET_KEY => ctx.map(|c| SqlValue::Int(c.offset as i64)),
        CURSOR_KEY => ctx.map(|c| SqlValue::Text(c.cursor.clone())),
        _ => return None,
    };

    *pagination_used = true;
    Some(value.ok_or_else(|| {
        ConnectorError::template(format!(
            "pagination key {key} used without pagination configuration"
        ))
    }))
}

/// Rewrite a templated query into dialect-specific parameterized SQL.
///
/// Returns the rewritten SQL, the bind arguments in order, and whether any
/// pagination key was substituted. All token failures are joined into one
/// error.
pub(crate) fn rewrite_query(
    dialect: Dialect,
    ctx: Option<&PaginationContext>,
    query: &str,
    vars: &VarMap,
) -> ConnectorResult<(String, Vec<SqlValue>, bool)> {
    let mut args: Vec<SqlValue> = Vec::new();
    let mut errors: Vec<String> = Vec::new();
    let mut pagination_used = false;

    let rewritten = QUERY_TOKEN_RE.replace_all(query, |caps: &regex::Captures<'_>| {
        let token = &caps[0];
        let opts = match parse_token(token) {
            Ok(opts) => opts,
            Err(e) => {
                errors.push(format!("in token {token}: {e}"));
                return token.to_string();
            }
        };

        let resolved = match resolve_reserved(&opts.key, ctx, &mut pagination_used) {
            Some(Ok(value)) => ResolvedValue::Value(value),
            Some(Err(e)) => {
                errors.push(e.to_string());
                return token.to_string();
            }
            None => match vars.get(&opts.key) {
                Some(dynamic) => match dynamic_to_sql_value(dynamic) {
                    Ok(value) => ResolvedValue::Value(value),
                    Err(e) => {
                        errors.push(format!("in token {token}: {e}"));
                        return token.to_string();
                    }
                },
                None => ResolvedValue::Missing,
            },
        };

        let value = match resolved {
            ResolvedValue::Value(value) => value,
            ResolvedValue::Missing => {
                errors.push(format!("unknown token {token}"));
                return token.to_string();
            }
        };

        if opts.unquoted {
            // Documented sharp edge: the value lands in the SQL text.
            warn!(key = %opts.key, "unquoted substitution used in query");
            return value.to_unquoted_string();
        }

        args.push(value);
        dialect.next_placeholder(args.len())
    });

    if !errors.is_empty() {
        return Err(ConnectorError::template(errors.join("; ")));
    }

    Ok((rewritten.into_owned(), args, pagination_used))
}

/// Rewrite a provisioning statement. No pagination keys are available;
/// every key must come from `vars`.
pub(crate) fn rewrite_provisioning_query(
    dialect: Dialect,
    query: &str,
    vars: &VarMap,
) -> ConnectorResult<(String, Vec<SqlValue>)> {
    let mut args: Vec<SqlValue> = Vec::new();
    let mut errors: Vec<String> = Vec::new();

    let rewritten = QUERY_TOKEN_RE.replace_all(query, |caps: &regex::Captures<'_>| {
        let token = &caps[0];
        let opts = match parse_token(token) {
            Ok(opts) => opts,
            Err(e) => {
                errors.push(format!("in token {token}: {e}"));
                return token.to_string();
            }
        };

        let value = match vars.get(&opts.key).map(dynamic_to_sql_value) {
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                errors.push(format!("in token {token}: {e}"));
                return token.to_string();
            }
            None => {
                errors.push(format!("unknown token {token}"));
                return token.to_string();
            }
        };

        if opts.unquoted {
            warn!(key = %opts.key, "unquoted substitution used in provisioning query");
            return value.to_unquoted_string();
        }

        args.push(value);
        dialect.next_placeholder(args.len())
    });

    if !errors.is_empty() {
        return Err(ConnectorError::template(errors.join("; ")));
    }

    Ok((rewritten.into_owned(), args))
}

impl SqlSyncer {
    /// Resolve configured query variables: a value that names an input
    /// binding passes through directly, anything else is evaluated as an
    /// expression.
    pub(crate) fn prepare_query_vars(
        &self,
        inputs: &Inputs,
        vars: &std::collections::BTreeMap<String, String>,
    ) -> ConnectorResult<VarMap> {
        let mut ret = HashMap::new();

        for (key, value) in vars {
            if let Some(direct) = inputs.get(value) {
                ret.insert(key.clone(), direct.clone());
                continue;
            }

            let out = self.env.evaluate(value, inputs)?;
            ret.insert(key.clone(), out);
        }

        Ok(ret)
    }

    /// Run a templated query with pagination state, streaming each row to
    /// the visitor, and produce the next-page token.
    ///
    /// The executor requests `limit + 1` rows; the presence of the extra
    /// row yields a non-empty next-page token, and the extra row is never
    /// delivered to the visitor. The visitor returns `false` to stop
    /// early.
    pub(crate) async fn run_query<F>(
        &self,
        token: Option<&PageToken>,
        query: &str,
        pagination: Option<&PaginationConfig>,
        vars: &VarMap,
        mut visit: F,
    ) -> ConnectorResult<String>
    where
        F: FnMut(&SqlRow) -> ConnectorResult<bool> + Send,
    {
        let ctx = setup_pagination(token, pagination)?;
        let (sql, args, pagination_used) =
            rewrite_query(self.db.dialect(), ctx.as_ref(), query, vars)?;

        // A context without any pagination key in the query is inert.
        let ctx = if pagination_used { ctx } else { None };

        debug!(query = %sql, args = args.len(), "running query");

        let max_rows = ctx.as_ref().map(|c| c.limit as u64 + 1);
        let rows = self.db.query(&sql, &args, max_rows).await?;

        let mut last_row_id: Option<SqlValue> = None;
        let mut saw_extra_row = false;
        let mut delivered = 0usize;

        for row in &rows {
            if let Some(ctx) = &ctx {
                if delivered >= ctx.limit {
                    saw_extra_row = true;
                    break;
                }

                let pk = row.get(&ctx.primary_key).ok_or_else(|| {
                    ConnectorError::invariant("primary key not found in query results")
                })?;
                last_row_id = Some(pk.clone());
            }

            delivered += 1;
            if !visit(row)? {
                break;
            }
        }

        match &ctx {
            Some(ctx) if saw_extra_row => next_page_token(ctx, last_row_id.as_ref()),
            _ => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_expr::Dynamic;

    fn ctx(strategy: PaginationStrategy, limit: usize, offset: u64, cursor: &str) -> PaginationContext {
        PaginationContext {
            strategy,
            limit,
            offset,
            cursor: cursor.to_string(),
            primary_key: "id".to_string(),
        }
    }

    #[test]
    fn test_parse_token_basic() {
        let opts = parse_token("?<limit>").unwrap();
        assert_eq!(opts.key, "limit");
        assert!(!opts.unquoted);
    }

    #[test]
    fn test_parse_token_with_option() {
        let opts = parse_token("?<limit|unquoted>").unwrap();
        assert_eq!(opts.key, "limit");
        assert!(opts.unquoted);
    }

    #[test]
    fn test_parse_token_mixed_case() {
        let opts = parse_token("?<LIMIT|UNQUOTED>").unwrap();
        assert_eq!(opts.key, "limit");
        assert!(opts.unquoted);
    }

    #[test]
    fn test_parse_token_invalid() {
        assert!(parse_token("invalid").is_err());
        assert!(parse_token("?<limit|unknown>").is_err());
    }

    #[test]
    fn test_clamp_page_size() {
        assert_eq!(clamp_page_size(0), 100);
        assert_eq!(clamp_page_size(50), 50);
        assert_eq!(clamp_page_size(5000), 1000);
    }

    #[test]
    fn test_rewrite_query_no_tokens() {
        let vars = VarMap::new();
        let (sql, args, used) =
            rewrite_query(Dialect::MySql, None, "SELECT * FROM table", &vars).unwrap();
        assert_eq!(sql, "SELECT * FROM table");
        assert!(args.is_empty());
        assert!(!used);
    }

    #[test]
    fn test_rewrite_query_limit_lookahead() {
        let p_ctx = ctx(PaginationStrategy::Offset, 10, 0, "");
        let vars = VarMap::new();
        let (sql, args, used) = rewrite_query(
            Dialect::MySql,
            Some(&p_ctx),
            "SELECT * FROM table LIMIT ?<limit>",
            &vars,
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM table LIMIT ?");
        assert_eq!(args, vec![SqlValue::Int(11)]);
        assert!(used);
    }

    #[test]
    fn test_rewrite_query_case_insensitive_keys() {
        let p_ctx = ctx(PaginationStrategy::Offset, 10, 0, "");
        let vars = VarMap::new();
        let (sql, args, _) = rewrite_query(
            Dialect::MySql,
            Some(&p_ctx),
            "SELECT * FROM table LIMIT ?<LIMIT>",
            &vars,
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM table LIMIT ?");
        assert_eq!(args, vec![SqlValue::Int(11)]);
    }

    #[test]
    fn test_rewrite_query_postgres_placeholders() {
        let p_ctx = ctx(PaginationStrategy::Offset, 10, 123, "");
        let vars = VarMap::new();
        let (sql, args, used) = rewrite_query(
            Dialect::Postgres,
            Some(&p_ctx),
            "SELECT * FROM table LIMIT ?<LIMIT> OFFSET ?<OFFSET>",
            &vars,
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM table LIMIT $1 OFFSET $2");
        assert_eq!(args, vec![SqlValue::Int(11), SqlValue::Int(123)]);
        assert!(used);
    }

    #[test]
    fn test_rewrite_query_sqlserver_and_oracle_placeholders() {
        let vars: VarMap = [
            ("a".to_string(), Dynamic::from(1_i64)),
            ("b".to_string(), Dynamic::from(2_i64)),
        ]
        .into_iter()
        .collect();

        let (sql, _, _) = rewrite_query(
            Dialect::SqlServer,
            None,
            "SELECT * FROM t WHERE x = ?<a> AND y = ?<b>",
            &vars,
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE x = @p1 AND y = @p2");

        let (sql, _, _) = rewrite_query(
            Dialect::Oracle,
            None,
            "SELECT * FROM t WHERE x = ?<a> AND y = ?<b>",
            &vars,
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE x = :1 AND y = :2");
    }

    #[test]
    fn test_rewrite_query_unquoted() {
        let vars: VarMap = [
            (
                "table_name".to_string(),
                Dynamic::from("example_table".to_string()),
            ),
            ("foo".to_string(), Dynamic::from("test example".to_string())),
        ]
        .into_iter()
        .collect();

        let (sql, args, used) = rewrite_query(
            Dialect::MySql,
            None,
            "SELECT * FROM ?<table_name|unquoted> WHERE test = ?<foo>",
            &vars,
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM example_table WHERE test = ?");
        assert_eq!(args, vec![SqlValue::Text("test example".to_string())]);
        assert!(!used);
    }

    #[test]
    fn test_rewrite_query_unknown_key() {
        let vars = VarMap::new();
        let err = rewrite_query(
            Dialect::MySql,
            None,
            "SELECT * FROM t WHERE x = ?<nope>",
            &vars,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown token ?<nope>"));
    }

    #[test]
    fn test_rewrite_query_joins_multiple_errors() {
        let vars = VarMap::new();
        let err = rewrite_query(
            Dialect::MySql,
            None,
            "SELECT * FROM t WHERE x = ?<a> AND y = ?<b|bogus>",
            &vars,
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("unknown token ?<a>"));
        assert!(message.contains("unknown option bogus"));
    }

    #[test]
    fn test_rewrite_query_pagination_key_without_config() {
        let vars = VarMap::new();
        let err = rewrite_query(
            Dialect::MySql,
            None,
            "SELECT * FROM t LIMIT ?<limit>",
            &vars,
        )
        .unwrap_err();
        assert!(err.to_string().contains("without pagination configuration"));
    }

    #[test]
    fn test_rewrite_malformed_token_passes_through() {
        // Tokens that do not match the grammar are left in the SQL verbatim.
        let vars = VarMap::new();
        let (sql, args, _) =
            rewrite_query(Dialect::MySql, None, "SELECT * FROM t LIMIT ?<limit|>", &vars).unwrap();
        assert_eq!(sql, "SELECT * FROM t LIMIT ?<limit|>");
        assert!(args.is_empty());
    }

    #[test]
    fn test_setup_pagination_offset_token() {
        let config = PaginationConfig {
            strategy: PaginationStrategy::Offset,
            primary_key: "id".to_string(),
        };
        let token = PageToken {
            token: "200".to_string(),
            size: 25,
        };

        let ctx = setup_pagination(Some(&token), Some(&config)).unwrap().unwrap();
        assert_eq!(ctx.offset, 200);
        assert_eq!(ctx.limit, 25);

        let bad = PageToken {
            token: "not-a-number".to_string(),
            size: 0,
        };
        assert!(setup_pagination(Some(&bad), Some(&config)).is_err());
    }

    #[test]
    fn test_setup_pagination_cursor_token() {
        let config = PaginationConfig {
            strategy: PaginationStrategy::Cursor,
            primary_key: "id".to_string(),
        };
        let token = PageToken {
            token: "row-99".to_string(),
            size: 0,
        };

        let ctx = setup_pagination(Some(&token), Some(&config)).unwrap().unwrap();
        assert_eq!(ctx.cursor, "row-99");
        assert_eq!(ctx.limit, 100);
    }

    #[test]
    fn test_setup_pagination_without_config() {
        assert!(setup_pagination(None, None).unwrap().is_none());
    }

    #[test]
    fn test_next_page_token_offset_formula() {
        let p_ctx = ctx(PaginationStrategy::Offset, 10, 0, "");
        assert_eq!(next_page_token(&p_ctx, None).unwrap(), "10");

        let p_ctx = ctx(PaginationStrategy::Offset, 10, 10, "");
        assert_eq!(next_page_token(&p_ctx, None).unwrap(), "110");
    }

    #[test]
    fn test_next_page_token_cursor_types() {
        let p_ctx = ctx(PaginationStrategy::Cursor, 10, 0, "");
        assert_eq!(
            next_page_token(&p_ctx, Some(&SqlValue::Int(42))).unwrap(),
            "42"
        );
        assert_eq!(
            next_page_token(&p_ctx, Some(&SqlValue::Text("abc".to_string()))).unwrap(),
            "abc"
        );
        assert_eq!(
            next_page_token(&p_ctx, Some(&SqlValue::UInt(7))).unwrap(),
            "7"
        );
        assert_eq!(
            next_page_token(&p_ctx, Some(&SqlValue::Bytes(b"xyz".to_vec()))).unwrap(),
            "xyz"
        );
        assert!(next_page_token(&p_ctx, Some(&SqlValue::Float(1.5))).is_err());
        assert!(next_page_token(&p_ctx, None).is_err());
    }
}
