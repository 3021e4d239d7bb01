//! Query assembler: combines the base projection, foreign-name joins,
//! pushdown formula projections, the access predicate, the compiled filter
//! predicate, a validated sort and pagination bounds into a data query and a
//! structurally paired count query.

use tracing::debug;

use crate::formula;
use crate::types::{EntityKind, SortDirection};
use crate::vocab;
use crate::workboard::model::{ColumnKind, ColumnSpec};

use super::SqlFragment;

/// Validated and clamped upstream; the assembler trusts these integers and
/// inlines them.
#[derive(Debug, Clone, Copy)]
pub struct PageBounds {
    pub page: i64,
    pub limit: i64,
}

impl PageBounds {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// The paired queries plus the formula names that survived re-validation.
/// `formula_names` covers both pushdown and post-fetch formulas; the service
/// routes the latter to the post-processor.
#[derive(Debug)]
pub struct BuiltQueries {
    pub count: SqlFragment,
    pub data: SqlFragment,
    pub formula_names: Vec<String>,
}

pub fn build(
    kind: EntityKind,
    columns: &[ColumnSpec],
    sort_column: Option<&str>,
    sort_direction: SortDirection,
    bounds: PageBounds,
    access: &SqlFragment,
    filter: &SqlFragment,
) -> BuiltQueries {
    // Re-validate persisted column specs: stored boards may predate a
    // vocabulary or registry change, so unknown names are skipped here too.
    let formula_names = valid_formula_names(columns, kind);
    let pushdown = formula::select_fragments(&formula_names, kind);

    let mut projection = vec!["e.*".to_string()];
    projection.extend(foreign_name_projections(kind));
    for (expr, alias) in &pushdown {
        projection.push(format!("{} AS \"{}\"", expr, alias));
    }

    let joins = join_clauses(kind);
    let where_clause = combine_predicates(access, filter);

    let mut params = access.params.clone();
    params.extend(filter.params.iter().cloned());

    let count_sql = format!(
        "SELECT COUNT(*) AS \"count\" FROM \"{}\" e{}{}",
        kind.table_name(),
        joins,
        where_clause
            .as_deref()
            .map(|w| format!(" WHERE {}", w))
            .unwrap_or_default()
    );

    let mut data_sql = format!(
        "SELECT {} FROM \"{}\" e{}{}",
        projection.join(", "),
        kind.table_name(),
        joins,
        where_clause
            .as_deref()
            .map(|w| format!(" WHERE {}", w))
            .unwrap_or_default()
    );

    if let Some(order) = resolve_sort(kind, sort_column, &pushdown) {
        data_sql.push_str(&format!(" ORDER BY {} {}", order, sort_direction.to_sql()));
    }
    data_sql.push_str(&format!(" LIMIT {} OFFSET {}", bounds.limit, bounds.offset()));

    BuiltQueries {
        count: SqlFragment::new(count_sql, params.clone()),
        data: SqlFragment::new(data_sql, params),
        formula_names,
    }
}

/// Formula column names that exist in the registry and apply to `kind`.
/// Raw columns are checked against the allowlist for the same reason; an
/// invalid spec contributes nothing to the query.
pub fn valid_formula_names(columns: &[ColumnSpec], kind: EntityKind) -> Vec<String> {
    let mut names = Vec::new();
    for column in columns {
        match column.kind {
            ColumnKind::Raw => {
                if !vocab::is_raw_field(kind, &column.field) {
                    debug!(field = %column.field, "dropping column on unknown raw field");
                }
            }
            ColumnKind::Formula => {
                let Some(name) = column.formula.as_deref() else { continue };
                let applicable = formula::lookup(name)
                    .map(|f| f.applies_to.contains(&kind))
                    .unwrap_or(false);
                if applicable && !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                } else if !applicable {
                    debug!(formula = %name, "dropping column on inapplicable formula");
                }
            }
        }
    }
    names
}

fn foreign_name_projections(kind: EntityKind) -> Vec<String> {
    match kind {
        EntityKind::Deals => vec![
            "owner.\"name\" AS \"owner_name\"".to_string(),
            "comp.\"name\" AS \"company_name\"".to_string(),
            "cont.\"last_name\" AS \"contact_name\"".to_string(),
        ],
        EntityKind::Contacts => vec![
            "owner.\"name\" AS \"owner_name\"".to_string(),
            "comp.\"name\" AS \"company_name\"".to_string(),
        ],
        EntityKind::Companies => vec!["owner.\"name\" AS \"owner_name\"".to_string()],
    }
}

fn join_clauses(kind: EntityKind) -> String {
    let mut joins = String::from(" LEFT JOIN \"users\" owner ON owner.\"id\" = e.\"owner_id\"");
    match kind {
        EntityKind::Deals => {
            joins.push_str(" LEFT JOIN \"companies\" comp ON comp.\"id\" = e.\"company_id\"");
            joins.push_str(" LEFT JOIN \"contacts\" cont ON cont.\"id\" = e.\"contact_id\"");
        }
        EntityKind::Contacts => {
            joins.push_str(" LEFT JOIN \"companies\" comp ON comp.\"id\" = e.\"company_id\"");
        }
        EntityKind::Companies => {}
    }
    joins
}

fn combine_predicates(access: &SqlFragment, filter: &SqlFragment) -> Option<String> {
    match (access.is_empty(), filter.is_empty()) {
        (true, true) => None,
        (false, true) => Some(access.sql.clone()),
        (true, false) => Some(filter.sql.clone()),
        (false, false) => Some(format!("{} AND {}", access.sql, filter.sql)),
    }
}

/// Sort target: a pushdown alias already in the projection, a cross-entity
/// alias, or a member of the sort allowlist. Anything else drops ORDER BY
/// entirely rather than erroring.
fn resolve_sort(
    kind: EntityKind,
    sort_column: Option<&str>,
    pushdown: &[(&'static str, &str)],
) -> Option<String> {
    let column = sort_column?;
    if pushdown.iter().any(|(_, alias)| *alias == column) {
        return Some(format!("\"{}\"", column));
    }
    if let Some(qualified) = vocab::resolve_alias(kind, column) {
        return Some(qualified.to_string());
    }
    if vocab::is_sort_field(kind, column) {
        return Some(format!("e.\"{}\"", column));
    }
    debug!(column = %column, "omitting ORDER BY on unknown sort column");
    None
}
