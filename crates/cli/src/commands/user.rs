//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! shoppingify-cli user create-staff -e support@example.com
//! shoppingify-cli user set-password -e support@example.com -p 'new password'
//! ```

use rand::Rng;
use rand::distr::Alphanumeric;
use thiserror::Error;

use shoppingify_shop::services::auth::{AuthError, AuthService, Registration};

use super::{CommandError, connect};

const GENERATED_PASSWORD_LENGTH: usize = 20;

/// Errors that can occur while managing users.
#[derive(Debug, Error)]
pub enum UserCommandError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("{0}")]
    Auth(#[from] AuthError),
}

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Resolve the password to use, generating one when none was given.
///
/// The second value is true when the password was generated.
fn password_or_generated(password: Option<String>) -> (String, bool) {
    password.map_or_else(|| (generate_password(), true), |p| (p, false))
}

#[allow(clippy::print_stdout)]
fn print_generated(email: &str, password: &str) {
    println!("Generated password for {email}: {password}");
}

/// Create a staff account.
///
/// # Errors
///
/// Returns an error if the email is invalid or taken, the password is too
/// weak, or the database is unreachable.
pub async fn create_staff(
    email: &str,
    first_name: &str,
    last_name: &str,
    password: Option<String>,
) -> Result<(), UserCommandError> {
    let pool = connect().await?;
    let (password, generated) = password_or_generated(password);

    let user = AuthService::new(&pool)
        .create_staff(&Registration {
            email,
            password: &password,
            first_name,
            last_name,
        })
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "Staff account created");
    if generated {
        print_generated(email, &password);
    }
    Ok(())
}

/// Replace a user's password.
///
/// # Errors
///
/// Returns an error if no user has `email`, the password is too weak, or the
/// database is unreachable.
pub async fn set_password(email: &str, password: Option<String>) -> Result<(), UserCommandError> {
    let pool = connect().await?;
    let (password, generated) = password_or_generated(password);

    AuthService::new(&pool).set_password(email, &password).await?;

    tracing::info!(%email, "Password updated");
    if generated {
        print_generated(email, &password);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_password_shape() {
        let password = generate_password();
        assert_eq!(password.len(), GENERATED_PASSWORD_LENGTH);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(password, generate_password());
    }

    #[test]
    fn test_explicit_password_is_kept() {
        let (password, generated) = password_or_generated(Some("correct horse".to_owned()));
        assert_eq!(password, "correct horse");
        assert!(!generated);

        let (_, generated) = password_or_generated(None);
        assert!(generated);
    }
}
