use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

impl UserProfile {
    /// Human-readable label: display_name, falling back to username, then email.
    pub fn display_identity(&self) -> Option<String> {
        self.display_name
            .clone()
            .or_else(|| self.username.clone())
            .or_else(|| self.email.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(
        display_name: Option<&str>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            username: username.map(String::from),
            display_name: display_name.map(String::from),
            email: email.map(String::from),
            avatar_url: None,
        }
    }

    #[test]
    fn display_identity_prefers_display_name() {
        let p = profile(Some("Ada"), Some("ada"), Some("ada@example.com"));
        assert_eq!(p.display_identity().as_deref(), Some("Ada"));
    }

    #[test]
    fn display_identity_falls_back_to_username_then_email() {
        let p = profile(None, Some("ada"), Some("ada@example.com"));
        assert_eq!(p.display_identity().as_deref(), Some("ada"));

        let p = profile(None, None, Some("ada@example.com"));
        assert_eq!(p.display_identity().as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn display_identity_is_none_when_profile_is_bare() {
        let p = profile(None, None, None);
        assert_eq!(p.display_identity(), None);
    }
}
