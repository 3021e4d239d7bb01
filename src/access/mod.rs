//! Access control: one policy-evaluation function that renders the
//! organization/ownership/team-membership visibility rules as a parameterized
//! predicate. List narrowing and single-resource checks both consume the same
//! predicate, so the two enforcement paths cannot drift apart.
//!
//! Policy, in order:
//! 1. The organization boundary is absolute: principals in an organization
//!    only see resources whose owner is in that organization; principals
//!    without one only see what they own.
//! 2. Admins see everything inside their organization.
//! 3. Non-admins see what they own, plus deals where they are team members.
//! 4. Activities and tasks inherit from their parent deal, one level only.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::query::{ParamBinder, SqlFragment};
use crate::types::{Principal, ResourceKind};

/// Visibility predicate over the alias `e` for `kind`'s table. Placeholder
/// numbering starts after `starting_param_index`. Computed fresh per request,
/// never cached.
pub fn predicate_for(principal: &Principal, kind: ResourceKind, starting_param_index: usize) -> SqlFragment {
    let mut binder = ParamBinder::new(starting_param_index);
    let sql = predicate("e", principal, kind, &mut binder);
    SqlFragment::new(sql, binder.into_params())
}

fn predicate(alias: &str, principal: &Principal, kind: ResourceKind, binder: &mut ParamBinder) -> String {
    match kind {
        ResourceKind::Activity | ResourceKind::Task => {
            // Inherited from the parent deal; exactly one level of indirection.
            let deal_predicate = predicate("d", principal, ResourceKind::Deal, binder);
            format!(
                "{}.\"deal_id\" IN (SELECT d.\"id\" FROM \"deals\" d WHERE {})",
                alias, deal_predicate
            )
        }
        _ => entity_predicate(alias, principal, kind, binder),
    }
}

fn entity_predicate(alias: &str, principal: &Principal, kind: ResourceKind, binder: &mut ParamBinder) -> String {
    let Some(org_id) = principal.organization_id else {
        // No organization: direct ownership only, regardless of role.
        let owner = bind_uuid(binder, principal.id);
        return format!("{}.\"owner_id\" = {}", alias, owner);
    };

    if principal.is_admin() {
        // Everything owned inside the organization.
        let org = bind_uuid(binder, org_id);
        return format!(
            "{}.\"owner_id\" IN (SELECT u.\"id\" FROM \"users\" u WHERE u.\"organization_id\" = {})",
            alias, org
        );
    }

    let owner = bind_uuid(binder, principal.id);
    let owned = format!("{}.\"owner_id\" = {}", alias, owner);
    if kind != ResourceKind::Deal {
        return owned;
    }

    // Team membership widens deal visibility, but only inside the
    // organization boundary.
    let member = bind_uuid(binder, principal.id);
    let org = bind_uuid(binder, org_id);
    format!(
        "({owned} OR ({alias}.\"id\" IN (SELECT tm.\"deal_id\" FROM \"deal_team_members\" tm \
         WHERE tm.\"user_id\" = {member}) AND {alias}.\"owner_id\" IN \
         (SELECT u.\"id\" FROM \"users\" u WHERE u.\"organization_id\" = {org})))"
    )
}

/// The `SELECT EXISTS` query `check_access` runs: the list predicate scoped
/// to a single resource id. Split out so the pairing is testable without a
/// database.
pub fn exists_query(principal: &Principal, kind: ResourceKind, resource_id: Uuid) -> SqlFragment {
    let mut binder = ParamBinder::new(0);
    let id = bind_uuid(&mut binder, resource_id);
    let visible = predicate("e", principal, kind, &mut binder);
    let sql = format!(
        "SELECT EXISTS (SELECT 1 FROM \"{}\" e WHERE e.\"id\" = {} AND {}) AS \"allowed\"",
        kind.table_name(),
        id,
        visible
    );
    SqlFragment::new(sql, binder.into_params())
}

/// Single-resource visibility check. `false` is the caller's cue to surface
/// access-denied, which stays distinct from not-found.
pub async fn check_access(
    pool: &PgPool,
    principal: &Principal,
    kind: ResourceKind,
    resource_id: Uuid,
) -> Result<bool, DatabaseError> {
    let fragment = exists_query(principal, kind, resource_id);
    let mut query = sqlx::query_scalar::<_, bool>(&fragment.sql);
    for param in &fragment.params {
        query = crate::database::rows::bind_scalar(query, param);
    }
    let allowed = query.fetch_one(pool).await?;
    Ok(allowed)
}

/// Uuids travel as text parameters through the JSON binding layer; the
/// explicit cast keeps the comparison typed, since Postgres has no
/// `uuid = text` operator.
fn bind_uuid(binder: &mut ParamBinder, id: Uuid) -> String {
    format!("{}::uuid", binder.push(Value::String(id.to_string())))
}
