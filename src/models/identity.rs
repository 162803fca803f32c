use serde::{Deserialize, Serialize};

use crate::models::{ChatSender, OnlineUser, UpdatedBy};

/// Claims carried in an access token issued by the auth service.
/// Field names must match what the issuer signs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub organization_id: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    pub exp: usize,
}

/// The authenticated identity of one connection.
///
/// Populated once at connect time from the verified token and immutable
/// for the connection lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub organization_id: String,
    pub role: Option<String>,
    pub avatar: Option<String>,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }

    pub fn online_user(&self) -> OnlineUser {
        OnlineUser {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }

    pub fn updated_by(&self) -> UpdatedBy {
        UpdatedBy {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }

    pub fn chat_sender(&self) -> ChatSender {
        ChatSender {
            id: self.user_id.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

impl From<TokenClaims> for Identity {
    fn from(claims: TokenClaims) -> Self {
        // Fall back to the email when the display name claim is absent.
        let name = claims.name.unwrap_or_else(|| claims.email.clone());
        Self {
            user_id: claims.user_id,
            email: claims.email,
            name,
            organization_id: claims.organization_id,
            role: claims.role,
            avatar: claims.avatar,
        }
    }
}
