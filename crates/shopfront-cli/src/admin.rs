use std::io::IsTerminal;

use anyhow::{Context, Result, bail};
use dialoguer::Password;
use shopfront_config::AppConfig;
use shopfront_db::NewUser;
use shopfront_security::{InputValidator, hash_password};
use tracing::info;

use crate::context::open_database;

/// Create a backoffice account. Without `--password` the password is read
/// from the terminal.
pub fn create_admin(
    config: &AppConfig,
    email: &str,
    name: &str,
    password: Option<String>,
) -> Result<()> {
    let email = InputValidator::email(email)?;
    let name = InputValidator::required("name", name)?;

    let password = match password {
        Some(password) => password,
        None if std::io::stdin().is_terminal() => Password::new()
            .with_prompt("Admin password")
            .with_confirmation("Confirm password", "Passwords don't match")
            .interact()
            .context("password input cancelled")?,
        None => bail!("--password is required when not running in a terminal"),
    };
    InputValidator::password(&password)?;
    let password_hash = hash_password(&password)?;

    let db = open_database(config)?;
    let id = db.create_user(&NewUser {
        email: &email,
        name: &name,
        password_hash: &password_hash,
        is_admin: true,
    })?;

    info!("created admin account {id}");
    println!("Created admin {email} (id {id})");
    Ok(())
}
