use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SuperAdmin,
    StudioAdmin,
    Photographer,
    Client,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UserRole::SuperAdmin => "super_admin",
            UserRole::StudioAdmin => "studio_admin",
            UserRole::Photographer => "photographer",
            UserRole::Client => "client",
        };
        write!(f, "{s}")
    }
}
