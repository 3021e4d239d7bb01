//! Field & operator vocabulary: the closed allowlists every dynamic part of a
//! workboard request is checked against. Identifiers never reach SQL unless
//! they come out of one of these tables.

use serde::{Deserialize, Serialize};

use crate::types::EntityKind;

/// Raw fields that may appear as workboard columns, per entity kind.
/// Must stay in sync with the entity table definitions.
pub const DEAL_FIELDS: &[&str] = &[
    "id",
    "title",
    "stage",
    "value",
    "currency",
    "probability",
    "expected_close_date",
    "status",
    "notes",
    "next_step",
    "pain_points",
    "decision_process",
    "owner_id",
    "company_id",
    "contact_id",
    "stage_changed_at",
    "created_at",
    "updated_at",
];

pub const CONTACT_FIELDS: &[&str] = &[
    "id",
    "first_name",
    "last_name",
    "email",
    "phone",
    "job_title",
    "status",
    "notes",
    "owner_id",
    "company_id",
    "created_at",
    "updated_at",
];

pub const COMPANY_FIELDS: &[&str] = &[
    "id",
    "name",
    "industry",
    "website",
    "employee_count",
    "city",
    "country",
    "status",
    "notes",
    "owner_id",
    "created_at",
    "updated_at",
];

/// Sortable subset: free-text fields are excluded, everything else sorts.
pub const DEAL_SORT_FIELDS: &[&str] = &[
    "title",
    "stage",
    "value",
    "currency",
    "probability",
    "expected_close_date",
    "status",
    "stage_changed_at",
    "created_at",
    "updated_at",
];

pub const CONTACT_SORT_FIELDS: &[&str] = &[
    "first_name",
    "last_name",
    "email",
    "job_title",
    "status",
    "created_at",
    "updated_at",
];

pub const COMPANY_SORT_FIELDS: &[&str] = &[
    "name",
    "industry",
    "employee_count",
    "city",
    "country",
    "status",
    "created_at",
    "updated_at",
];

pub fn raw_fields(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Deals => DEAL_FIELDS,
        EntityKind::Contacts => CONTACT_FIELDS,
        EntityKind::Companies => COMPANY_FIELDS,
    }
}

/// Filterable fields are the raw fields; aliases and formulas are resolved
/// separately by the compiler.
pub fn filter_fields(kind: EntityKind) -> &'static [&'static str] {
    raw_fields(kind)
}

pub fn sort_fields(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Deals => DEAL_SORT_FIELDS,
        EntityKind::Contacts => CONTACT_SORT_FIELDS,
        EntityKind::Companies => COMPANY_SORT_FIELDS,
    }
}

pub fn is_raw_field(kind: EntityKind, field: &str) -> bool {
    raw_fields(kind).contains(&field)
}

pub fn is_filter_field(kind: EntityKind, field: &str) -> bool {
    filter_fields(kind).contains(&field)
}

pub fn is_sort_field(kind: EntityKind, field: &str) -> bool {
    sort_fields(kind).contains(&field)
}

/// Columns whose filter values arrive as JSON strings but compare as a
/// non-text Postgres type. The compiler casts the placeholder, since
/// parameters bind as text and Postgres will not coerce them implicitly.
pub fn param_cast(field: &str) -> Option<&'static str> {
    match field {
        "id" | "owner_id" | "company_id" | "contact_id" => Some("uuid"),
        "created_at" | "updated_at" | "stage_changed_at" => Some("timestamptz"),
        "expected_close_date" => Some("date"),
        _ => None,
    }
}

/// Cross-entity aliases: display names resolved through the joins the
/// assembler always adds. The qualified column references join aliases,
/// never user input.
pub fn resolve_alias(kind: EntityKind, field: &str) -> Option<&'static str> {
    match (kind, field) {
        (_, "owner_name") => Some("owner.\"name\""),
        (EntityKind::Deals, "company_name") => Some("comp.\"name\""),
        (EntityKind::Contacts, "company_name") => Some("comp.\"name\""),
        (EntityKind::Deals, "contact_name") => Some("cont.\"last_name\""),
        _ => None,
    }
}

/// The closed filter operator set. Deserialization is the only way a request
/// names an operator, so anything outside this enum fails at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    In,
    NotIn,
}

impl FilterOp {
    /// Comparison operators expect a single scalar value.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            FilterOp::Eq | FilterOp::Neq | FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte
        )
    }

    /// Pattern operators expect a raw substring; wildcards are added by the
    /// compiler, never by the caller.
    pub fn is_pattern(&self) -> bool {
        matches!(
            self,
            FilterOp::Contains | FilterOp::NotContains | FilterOp::StartsWith | FilterOp::EndsWith
        )
    }

    pub fn is_null_check(&self) -> bool {
        matches!(self, FilterOp::IsNull | FilterOp::IsNotNull)
    }

    pub fn is_membership(&self) -> bool {
        matches!(self, FilterOp::In | FilterOp::NotIn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlists_are_closed() {
        assert!(is_raw_field(EntityKind::Deals, "stage"));
        assert!(!is_raw_field(EntityKind::Deals, "password"));
        assert!(!is_raw_field(EntityKind::Contacts, "stage"));
        assert!(is_sort_field(EntityKind::Companies, "employee_count"));
        assert!(!is_sort_field(EntityKind::Deals, "notes"));
    }

    #[test]
    fn aliases_resolve_per_kind() {
        assert_eq!(resolve_alias(EntityKind::Deals, "owner_name"), Some("owner.\"name\""));
        assert_eq!(resolve_alias(EntityKind::Companies, "company_name"), None);
        assert_eq!(resolve_alias(EntityKind::Contacts, "contact_name"), None);
    }

    #[test]
    fn operators_deserialize_from_wire_names() {
        let op: FilterOp = serde_json::from_str("\"not_contains\"").unwrap();
        assert_eq!(op, FilterOp::NotContains);
        assert!(serde_json::from_str::<FilterOp>("\"like\"").is_err());
    }
}
