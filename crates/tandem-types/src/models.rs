use serde::{Deserialize, Serialize};

/// The authenticated caller, as seen by the login and `auth_user` endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

/// A user record projected for API consumption.
///
/// `id` and `email` are private: they are only populated when `me` is true,
/// and are left out of the JSON otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileView {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    pub followers_count: i64,
    pub followees_count: i64,
    pub me: bool,
    pub following: bool,
    pub followed: bool,
}

impl ProfileView {
    /// Clears the private fields unless the viewer is looking at themselves.
    pub fn redact(&mut self, viewer: Option<i64>) {
        self.me = viewer == Some(self.id);
        if !self.me {
            self.id = 0;
            self.email.clear();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleFollowOutput {
    pub following: bool,
    pub followers_count: i64,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}
