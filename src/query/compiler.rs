//! Filter compiler: turns user-supplied filter specs into a parameterized
//! WHERE fragment, splitting off filters that can only run after fetch.
//!
//! Resolution order for a filter field: cross-entity alias, pushdown formula,
//! post-fetch formula (deferred), per-kind filter allowlist. Anything else is
//! dropped without error, so stale configuration and probing both degrade to
//! "that filter does not apply".

use serde_json::Value;
use tracing::debug;

use crate::formula;
use crate::types::EntityKind;
use crate::vocab::{self, FilterOp};
use crate::workboard::model::FilterSpec;

use super::{ParamBinder, SqlFragment};

/// Output of one compile pass: the SQL-pushable predicate and the filters
/// deferred to the post-processor.
#[derive(Debug)]
pub struct CompiledFilters {
    pub fragment: SqlFragment,
    pub deferred: Vec<FilterSpec>,
}

/// Compile `filters` for `kind`. Placeholder numbering starts after
/// `starting_param_index` so the fragment composes with the access predicate.
pub fn compile(filters: &[FilterSpec], kind: EntityKind, starting_param_index: usize) -> CompiledFilters {
    let mut binder = ParamBinder::new(starting_param_index);
    let mut conditions = Vec::new();
    let mut deferred = Vec::new();

    for filter in filters {
        match resolve_field(&filter.field, kind) {
            FieldTarget::Column { target, cast } => {
                if let Some(sql) = condition(&target, cast, filter.operator, filter.value.as_ref(), &mut binder) {
                    conditions.push(sql);
                }
            }
            FieldTarget::PostFetch => deferred.push(filter.clone()),
            FieldTarget::Unknown => {
                debug!(field = %filter.field, "dropping filter on unknown field");
            }
        }
    }

    let fragment = if conditions.is_empty() {
        SqlFragment::empty()
    } else {
        SqlFragment::new(conditions.join(" AND "), binder.into_params())
    };
    CompiledFilters { fragment, deferred }
}

enum FieldTarget {
    /// A qualified column or parenthesized pushdown expression, with the
    /// placeholder cast string-typed values need against that column.
    Column { target: String, cast: Option<&'static str> },
    PostFetch,
    Unknown,
}

fn resolve_field(field: &str, kind: EntityKind) -> FieldTarget {
    if let Some(qualified) = vocab::resolve_alias(kind, field) {
        return FieldTarget::Column { target: qualified.to_string(), cast: None };
    }
    if let Some(expr) = formula::pushdown_expression(field, kind) {
        return FieldTarget::Column { target: format!("({})", expr), cast: None };
    }
    if formula::is_post_fetch(field, kind) {
        return FieldTarget::PostFetch;
    }
    if vocab::is_filter_field(kind, field) {
        return FieldTarget::Column {
            target: format!("e.\"{}\"", field),
            cast: vocab::param_cast(field),
        };
    }
    FieldTarget::Unknown
}

/// Render one condition. Returns `None` when the value shape does not fit the
/// operator; the filter is dropped and the rest still apply.
fn condition(
    target: &str,
    cast: Option<&'static str>,
    op: FilterOp,
    value: Option<&Value>,
    binder: &mut ParamBinder,
) -> Option<String> {
    if op.is_comparison() {
        let value = scalar(value)?;
        let sym = match op {
            FilterOp::Eq => "=",
            FilterOp::Neq => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            _ => unreachable!(),
        };
        Some(format!("{} {} {}", target, sym, placeholder(binder, value.clone(), cast)))
    } else if op.is_pattern() {
        // The caller supplies the raw substring; wildcards and escaping
        // belong to the compiler.
        let needle = escape_like(value?.as_str()?);
        let (pattern, sym) = match op {
            FilterOp::Contains => (format!("%{}%", needle), "ILIKE"),
            FilterOp::NotContains => (format!("%{}%", needle), "NOT ILIKE"),
            FilterOp::StartsWith => (format!("{}%", needle), "ILIKE"),
            FilterOp::EndsWith => (format!("%{}", needle), "ILIKE"),
            _ => unreachable!(),
        };
        Some(format!("{} {} {}", target, sym, binder.push(Value::String(pattern))))
    } else if op.is_null_check() {
        let sym = if op == FilterOp::IsNull { "IS NULL" } else { "IS NOT NULL" };
        Some(format!("{} {}", target, sym))
    } else {
        debug_assert!(op.is_membership());
        let values = value?.as_array()?;
        // An empty membership list means "no preference", not "no rows":
        // the filter is dropped entirely.
        if values.is_empty() {
            return None;
        }
        let placeholders: Vec<String> = values
            .iter()
            .map(|v| placeholder(binder, v.clone(), cast))
            .collect();
        let sym = if op == FilterOp::In { "IN" } else { "NOT IN" };
        Some(format!("{} {} ({})", target, sym, placeholders.join(", ")))
    }
}

/// Bind one value, appending the column's cast when the value is a string.
/// Numeric and boolean parameters bind with their own wire types and need
/// no cast.
fn placeholder(binder: &mut ParamBinder, value: Value, cast: Option<&'static str>) -> String {
    let cast = cast.filter(|_| value.is_string());
    let ph = binder.push(value);
    match cast {
        Some(c) => format!("{}::{}", ph, c),
        None => ph,
    }
}

fn scalar(value: Option<&Value>) -> Option<&Value> {
    match value {
        Some(Value::Null) | None => None,
        Some(Value::Array(_)) | Some(Value::Object(_)) => None,
        Some(v) => Some(v),
    }
}

/// Escape LIKE metacharacters so the supplied substring matches literally.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter(field: &str, operator: FilterOp, value: Value) -> FilterSpec {
        FilterSpec { field: field.into(), operator, value: Some(value) }
    }

    #[test]
    fn compiles_comparisons_with_positional_params() {
        let filters = vec![
            filter("stage", FilterOp::Eq, json!("proposal")),
            filter("value", FilterOp::Gte, json!(50000)),
        ];
        let compiled = compile(&filters, EntityKind::Deals, 2);
        assert_eq!(compiled.fragment.sql, "e.\"stage\" = $3 AND e.\"value\" >= $4");
        assert_eq!(compiled.fragment.params, vec![json!("proposal"), json!(50000)]);
        assert!(compiled.deferred.is_empty());
    }

    #[test]
    fn unknown_fields_are_dropped_silently() {
        let filters = vec![
            filter("stage", FilterOp::Eq, json!("proposal")),
            filter("secret_column; DROP TABLE deals", FilterOp::Eq, json!("x")),
        ];
        let compiled = compile(&filters, EntityKind::Deals, 0);
        assert_eq!(compiled.fragment.sql, "e.\"stage\" = $1");
        assert!(!compiled.fragment.sql.contains("DROP"));
    }

    #[test]
    fn empty_in_list_is_dropped_not_always_false() {
        let filters = vec![filter("stage", FilterOp::In, json!([]))];
        let compiled = compile(&filters, EntityKind::Deals, 0);
        assert!(compiled.fragment.is_empty());
        assert!(compiled.fragment.params.is_empty());
    }

    #[test]
    fn membership_expands_to_one_param_per_element() {
        let filters = vec![filter("stage", FilterOp::NotIn, json!(["lost", "won"]))];
        let compiled = compile(&filters, EntityKind::Deals, 0);
        assert_eq!(compiled.fragment.sql, "e.\"stage\" NOT IN ($1, $2)");
        assert_eq!(compiled.fragment.params.len(), 2);
    }

    #[test]
    fn pattern_values_are_wrapped_and_escaped() {
        let filters = vec![filter("title", FilterOp::Contains, json!("50%_off"))];
        let compiled = compile(&filters, EntityKind::Deals, 0);
        assert_eq!(compiled.fragment.sql, "e.\"title\" ILIKE $1");
        assert_eq!(compiled.fragment.params[0], json!("%50\\%\\_off%"));
    }

    #[test]
    fn null_checks_bind_no_params() {
        let filters = vec![FilterSpec {
            field: "notes".into(),
            operator: FilterOp::IsNotNull,
            value: None,
        }];
        let compiled = compile(&filters, EntityKind::Deals, 0);
        assert_eq!(compiled.fragment.sql, "e.\"notes\" IS NOT NULL");
        assert!(compiled.fragment.params.is_empty());
    }

    #[test]
    fn pushdown_formula_filters_wrap_the_expression() {
        let filters = vec![filter("days_in_stage", FilterOp::Gt, json!(14))];
        let compiled = compile(&filters, EntityKind::Deals, 0);
        assert!(compiled.fragment.sql.starts_with("(FLOOR(EXTRACT(EPOCH"));
        assert!(compiled.fragment.sql.ends_with("> $1"));
    }

    #[test]
    fn post_fetch_formula_filters_are_deferred() {
        let filters = vec![
            filter("completion_score", FilterOp::Gte, json!(75)),
            filter("stage", FilterOp::Eq, json!("proposal")),
        ];
        let compiled = compile(&filters, EntityKind::Deals, 0);
        assert_eq!(compiled.fragment.sql, "e.\"stage\" = $1");
        assert_eq!(compiled.deferred.len(), 1);
        assert_eq!(compiled.deferred[0].field, "completion_score");
    }

    #[test]
    fn alias_fields_resolve_to_join_columns() {
        let filters = vec![filter("owner_name", FilterOp::StartsWith, json!("Ann"))];
        let compiled = compile(&filters, EntityKind::Contacts, 0);
        assert_eq!(compiled.fragment.sql, "owner.\"name\" ILIKE $1");
        assert_eq!(compiled.fragment.params[0], json!("Ann%"));
    }

    #[test]
    fn uuid_and_timestamp_fields_cast_their_placeholders() {
        let filters = vec![
            filter("owner_id", FilterOp::Eq, json!("c7f8a7a2-8c54-4df1-9aee-2a5b1f4c9d10")),
            filter("created_at", FilterOp::Gte, json!("2026-01-01T00:00:00Z")),
        ];
        let compiled = compile(&filters, EntityKind::Deals, 0);
        assert_eq!(
            compiled.fragment.sql,
            "e.\"owner_id\" = $1::uuid AND e.\"created_at\" >= $2::timestamptz"
        );
    }

    #[test]
    fn membership_on_uuid_fields_casts_each_element() {
        let filters = vec![filter(
            "company_id",
            FilterOp::In,
            json!(["5f0f0a43-93a1-4f6e-9c86-d4a0a4f0b001", "5f0f0a43-93a1-4f6e-9c86-d4a0a4f0b002"]),
        )];
        let compiled = compile(&filters, EntityKind::Contacts, 0);
        assert_eq!(compiled.fragment.sql, "e.\"company_id\" IN ($1::uuid, $2::uuid)");
        assert_eq!(compiled.fragment.params.len(), 2);
    }

    #[test]
    fn text_and_numeric_fields_bind_without_a_cast() {
        let filters = vec![
            filter("stage", FilterOp::Eq, json!("proposal")),
            filter("value", FilterOp::Lt, json!(10000)),
        ];
        let compiled = compile(&filters, EntityKind::Deals, 0);
        assert_eq!(compiled.fragment.sql, "e.\"stage\" = $1 AND e.\"value\" < $2");
    }

    #[test]
    fn malformed_values_drop_only_that_filter() {
        let filters = vec![
            filter("value", FilterOp::Gte, Value::Null),
            filter("stage", FilterOp::In, json!("proposal")),
            filter("title", FilterOp::Contains, json!(7)),
            filter("status", FilterOp::Eq, json!("open")),
        ];
        let compiled = compile(&filters, EntityKind::Deals, 0);
        assert_eq!(compiled.fragment.sql, "e.\"status\" = $1");
    }
}
