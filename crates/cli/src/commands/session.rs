//! Sign-in commands.
//!
//! # Usage
//!
//! ```bash
//! STOREFRONT_PASSWORD=... sfs login -e jane@example.com
//! sfs whoami
//! sfs logout
//! ```

#![allow(clippy::print_stdout)]

use secrecy::SecretString;
use storefront_sync_core::Email;
use thiserror::Error;

use super::Engine;

/// Errors specific to the session commands.
#[derive(Debug, Error)]
pub enum SessionCommandError {
    /// Email failed validation before any request was made.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] storefront_sync_core::EmailError),

    /// Refresh did not produce a token.
    #[error("Session has ended, sign in again")]
    SessionEnded,
}

/// Sign in and store credentials.
pub async fn login(
    engine: &Engine,
    email: &str,
    password: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let email = Email::parse(email).map_err(SessionCommandError::from)?;
    let password = SecretString::from(password);

    let user_id = engine.session().login(&email, &password).await?;
    println!("Signed in as {email} ({user_id})");
    Ok(())
}

/// Remove stored credentials.
pub fn logout(engine: &Engine) {
    engine.session().logout();
    println!("Signed out");
}

/// Print the signed-in customer id.
pub fn whoami(engine: &Engine) {
    match engine.session().user_id() {
        Some(user_id) => println!("{user_id}"),
        None => println!("anonymous"),
    }
}

/// Force a token refresh.
pub async fn refresh(engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
    if engine.session().refresh().await.is_none() {
        return Err(SessionCommandError::SessionEnded.into());
    }
    println!("Access token refreshed");
    Ok(())
}
