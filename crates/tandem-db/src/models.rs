/// Database row types. These map directly to SQLite rows and never leave
/// the server; API projections live in tandem-types.

pub struct CredentialRow {
    pub id: i64,
    pub username: String,
    pub password: String,
}
