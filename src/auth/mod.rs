use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims issued by the identity collaborator. The engine consumes these
/// to build a `Principal`; it never issues or mutates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    /// Open role string; only "admin" is special
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
    /// Expiry, seconds since epoch
    pub exp: usize,
}
