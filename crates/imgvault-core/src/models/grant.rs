use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Relation namespace holding image grants
pub const NS_IMAGE: &str = "Image";
/// Namespace of grant subjects
pub const NS_USER: &str = "User";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Editor,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "editor" => Ok(Role::Editor),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Relation tuple `(namespace, object, relation, subject)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorizationGrant {
    pub namespace: String,
    pub object_id: String,
    pub subject_id: String,
    pub role: Role,
}

impl AuthorizationGrant {
    pub fn owner(object_id: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            namespace: NS_IMAGE.to_string(),
            object_id: object_id.into(),
            subject_id: subject_id.into(),
            role: Role::Owner,
        }
    }
}

/// Authenticated caller, as resolved by the gateway in front of the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
}

impl CallerIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}
