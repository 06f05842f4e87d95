use serde::{Deserialize, Serialize};

/// User record as returned by the user directory. Only the fields the
/// comment engine cares about; unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
}
