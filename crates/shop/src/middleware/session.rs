//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions. The session id
//! cookie is signed with a key derived from `SHOP_SESSION_SECRET`.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use tower_sessions::cookie::Key;
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::ShopConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "shoppingify_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Cookie signing key for a session secret.
///
/// SHA-512 yields the 64 bytes `Key::from` requires, whatever the secret's
/// length.
#[must_use]
pub fn session_key(secret: &SecretString) -> Key {
    let digest = Sha512::digest(secret.expose_secret().as_bytes());
    Key::from(digest.as_slice())
}

/// Create the session layer with `PostgreSQL` store.
///
/// The store's table is created by `PostgresStore::migrate`, which the CLI
/// `migrate` command runs alongside the schema migrations.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &ShopConfig,
) -> SessionManagerLayer<PostgresStore, SignedCookie> {
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_https())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(session_key(&config.session_secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_is_derived_from_secret() {
        let secret = SecretString::from("s".repeat(32));
        let key = session_key(&secret);

        assert_eq!(key.master().len(), 64);
        assert_eq!(key.master(), session_key(&secret).master());
        assert_ne!(
            key.master(),
            session_key(&SecretString::from("t".repeat(32))).master()
        );
    }
}
