use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Created,
    Connected,
    Disconnected,
}

impl std::fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GatewayStatus::Created => "created",
            GatewayStatus::Connected => "connected",
            GatewayStatus::Disconnected => "disconnected",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for GatewayStatus {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(GatewayStatus::Created),
            "connected" | "open" => Ok(GatewayStatus::Connected),
            "disconnected" | "close" => Ok(GatewayStatus::Disconnected),
            _ => Err(anyhow::anyhow!("Unknown gateway status: {s}")),
        }
    }
}

/// One registered outbound WhatsApp channel of a studio.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GatewayInstance {
    pub id: Uuid,
    pub instance_name: String,
    /// Stored as TEXT; unknown values are treated as neither connected nor created.
    pub status: String,
    pub api_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}

impl GatewayInstance {
    pub fn status(&self) -> Option<GatewayStatus> {
        self.status.parse().ok()
    }
}
