//! Access policy properties that are decidable from the generated
//! predicates: the organization boundary, team-membership scoping, and the
//! pairing between list narrowing and single-resource checks.

use serde_json::Value;
use uuid::Uuid;

use workboard_api::access;
use workboard_api::types::{Principal, ResourceKind, Role};

fn principal(role: Role, org: Option<Uuid>) -> Principal {
    Principal { id: Uuid::new_v4(), role, organization_id: org }
}

#[test]
fn organization_boundary_binds_the_principals_own_org_only() {
    let org_a = Uuid::new_v4();
    let org_b = Uuid::new_v4();
    let admin_a = principal(Role::Admin, Some(org_a));

    let fragment = access::predicate_for(&admin_a, ResourceKind::Deal, 0);
    // The only bound value is org A; nothing references org B, so a
    // resource owned in org B can never satisfy the predicate.
    assert_eq!(fragment.params, vec![Value::String(org_a.to_string())]);
    assert!(!fragment.sql.contains(&org_b.to_string()));
    assert!(fragment.sql.contains("u.\"organization_id\" = $1::uuid"));
}

#[test]
fn role_cannot_bypass_the_boundary_without_an_org() {
    let admin = principal(Role::Admin, None);
    let member = principal(Role::Member, None);
    let admin_frag = access::predicate_for(&admin, ResourceKind::Company, 0);
    let member_frag = access::predicate_for(&member, ResourceKind::Company, 0);
    // Identical shape: ownership only.
    assert_eq!(admin_frag.sql, member_frag.sql);
    assert_eq!(admin_frag.sql, "e.\"owner_id\" = $1::uuid");
}

#[test]
fn team_membership_widens_deals_only() {
    let org = Uuid::new_v4();
    let member = principal(Role::Member, Some(org));

    let deals = access::predicate_for(&member, ResourceKind::Deal, 0);
    assert!(deals.sql.contains("\"deal_team_members\""));

    for kind in [ResourceKind::Contact, ResourceKind::Company] {
        let fragment = access::predicate_for(&member, kind, 0);
        assert!(!fragment.sql.contains("\"deal_team_members\""));
        assert_eq!(fragment.sql, "e.\"owner_id\" = $1::uuid");
    }
}

#[test]
fn team_membership_is_keyed_to_the_member_not_the_owner() {
    let org = Uuid::new_v4();
    let member = principal(Role::Member, Some(org));
    let fragment = access::predicate_for(&member, ResourceKind::Deal, 0);
    // Ownership and membership both bind the requesting principal's id;
    // the deal owner's identity never appears as a parameter.
    assert_eq!(fragment.params[0], Value::String(member.id.to_string()));
    assert_eq!(fragment.params[1], Value::String(member.id.to_string()));
    assert_eq!(fragment.params[2], Value::String(org.to_string()));
}

#[test]
fn tasks_and_activities_inherit_one_level_from_deals() {
    let member = principal(Role::Member, Some(Uuid::new_v4()));
    for kind in [ResourceKind::Activity, ResourceKind::Task] {
        let fragment = access::predicate_for(&member, kind, 0);
        assert!(fragment.sql.starts_with("e.\"deal_id\" IN (SELECT d.\"id\" FROM \"deals\" d WHERE"));
        // The nested predicate is the deal predicate, not a further
        // recursion through activities.
        assert_eq!(fragment.sql.matches("e.\"deal_id\" IN").count(), 1);
        assert!(!fragment.sql.contains("\"activities\""));
        assert!(!fragment.sql.contains("\"tasks\""));
    }
}

#[test]
fn every_uuid_parameter_is_cast_from_its_text_binding() {
    // Principal, org and resource ids are bound as text; without the
    // explicit cast Postgres has no uuid = text operator and the query
    // fails to plan at all.
    let member = principal(Role::Member, Some(Uuid::new_v4()));

    let list = access::predicate_for(&member, ResourceKind::Deal, 0);
    for n in 1..=list.params.len() {
        assert!(
            list.sql.contains(&format!("${}::uuid", n)),
            "placeholder ${} missing its uuid cast in {}",
            n,
            list.sql
        );
    }

    let single = access::exists_query(&member, ResourceKind::Deal, Uuid::new_v4());
    for n in 1..=single.params.len() {
        assert!(
            single.sql.contains(&format!("${}::uuid", n)),
            "placeholder ${} missing its uuid cast in {}",
            n,
            single.sql
        );
    }
}

#[test]
fn check_access_uses_the_list_predicate_verbatim() {
    let member = principal(Role::Member, Some(Uuid::new_v4()));
    let resource = Uuid::new_v4();

    let list = access::predicate_for(&member, ResourceKind::Deal, 1);
    let single = access::exists_query(&member, ResourceKind::Deal, resource);

    // The EXISTS query is the list predicate with the id bound as $1 ahead
    // of it, so the two enforcement paths agree by construction.
    assert!(single.sql.contains(&list.sql));
    assert_eq!(single.params[0], Value::String(resource.to_string()));
    assert_eq!(&single.params[1..], &list.params[..]);
}
