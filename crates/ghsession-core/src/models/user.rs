use serde::{Deserialize, Deserializer, Serialize};

/// GitHub identity as supplied by the backend. Fields are stored verbatim,
/// nothing is validated locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// GitHub sends `null` for accounts without a profile name
    #[serde(default)]
    pub name: Option<String>,
    pub avatar_url: String,
    pub login: String,
}

impl User {
    /// Name for display, falling back to the login when the profile has no name
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.login,
        }
    }
}

/// Response body of `POST /authenticate`. The backend answers `"user": null`
/// when it could not load the GitHub profile.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: Option<User>,
}

/// GitHub ids are numeric; some backends forward them untouched.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
