use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An authenticated account, as returned by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Server-controlled metadata; holds the authorization `role`.
    #[serde(default)]
    pub app_metadata: Map<String, Value>,
    /// User-editable metadata such as `display_name`.
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl User {
    pub fn role(&self) -> Option<&str> {
        self.app_metadata.get("role").and_then(Value::as_str)
    }
}

/// A signed-in session. Held in memory by the backend; the application saves
/// it between runs and hands it back with `restore_session`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: User,
}

/// What the rest of the application needs to know about the current session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthInfo {
    /// The user's metadata, if signed in.
    pub user: Option<Map<String, Value>>,
    pub role: Option<String>,
}

impl AuthInfo {
    pub fn from_session(session: Option<&Session>) -> Self {
        match session {
            Some(session) => Self {
                user: Some(session.user.user_metadata.clone()),
                role: session.user.role().map(str::to_string),
            },
            None => Self::default(),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Whether a user is signed in and carries exactly the given role.
    pub fn is_permitted(&self, role: &str) -> bool {
        self.is_signed_in() && self.role.as_deref() == Some(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_deserializes_auth_response() {
        let session: Session = serde_json::from_value(json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh",
            "user": {
                "id": "b7c1",
                "email": "reader@example.com",
                "app_metadata": { "provider": "email", "role": "permitted" },
                "user_metadata": { "display_name": "Reader" }
            }
        }))
        .unwrap();
        assert_eq!(session.user.role(), Some("permitted"));

        let info = AuthInfo::from_session(Some(&session));
        assert!(info.is_signed_in());
        assert!(info.is_permitted("permitted"));
        assert!(!info.is_permitted("admin"));
        assert_eq!(info.user.unwrap()["display_name"], json!("Reader"));
    }

    #[test]
    fn test_no_session_is_not_permitted() {
        let info = AuthInfo::from_session(None);
        assert_eq!(info, AuthInfo { user: None, role: None });
        assert!(!info.is_permitted("permitted"));
    }

    #[test]
    fn test_role_without_user_is_not_permitted() {
        let info = AuthInfo { user: None, role: Some("permitted".to_string()) };
        assert!(!info.is_permitted("permitted"));
    }
}
