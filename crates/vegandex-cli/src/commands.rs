//! Command handlers.

use std::io::{self, Write};

use anyhow::Result;
use tracing::warn;
use vegandex_core::{
    ApiClient, Config, CredentialStore, ProfileUpdate, SessionManager, SessionStatus, UserProfile,
};

use crate::cli::Commands;

pub type Manager = SessionManager<ApiClient, dyn CredentialStore>;

/// Maximum length for email input.
const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Run a command. Returns `false` when the operation reported failure.
pub async fn run(command: Commands, manager: &Manager, config: &mut Config) -> Result<bool> {
    match command {
        Commands::Status { json } => {
            print_status(manager, json)?;
            Ok(true)
        }
        Commands::Login { email } => login(manager, config, email).await,
        Commands::Register { username, email } => register(manager, &username, &email).await,
        Commands::Logout => {
            manager.logout().await;
            println!("Signed out.");
            Ok(true)
        }
        Commands::Refresh => report(manager.refresh_profile().await.map(|p| print_profile(&p))),
        Commands::UpdateProfile { username, email } => {
            let update = ProfileUpdate { username, email };
            report(manager.update_profile(&update).await.map(|p| print_profile(&p)))
        }
        Commands::RecordUpload { product_id } => {
            if !manager.is_authenticated() {
                eprintln!("Not signed in.");
                return Ok(false);
            }
            manager.record_uploaded_product(&product_id).await;
            println!("Recorded product {}.", product_id);
            Ok(true)
        }
        Commands::VerifyEmail { token } => report(
            manager
                .verify_email(&token)
                .await
                .map(|()| println!("Email verified.")),
        ),
        Commands::ResendVerification => report(
            manager
                .resend_verification()
                .await
                .map(|()| println!("Verification email sent.")),
        ),
    }
}

fn report<E: std::fmt::Display>(result: std::result::Result<(), E>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) => {
            eprintln!("Error: {}", e);
            Ok(false)
        }
    }
}

fn print_profile(profile: &UserProfile) {
    println!("Signed in as {} <{}>", profile.username, profile.email);
    println!("Uploaded products: {}", profile.uploaded_products.len());
}

fn print_status(manager: &Manager, json: bool) -> Result<()> {
    let session = manager.snapshot();
    if json {
        let value = serde_json::json!({
            "status": session.status(),
            "profile": session.profile().map(|p| p.as_ref()),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match (session.status(), session.profile()) {
        (SessionStatus::Authenticated, Some(profile)) => print_profile(profile),
        _ => println!("Not signed in."),
    }
    Ok(())
}

async fn login(manager: &Manager, config: &mut Config, email: Option<String>) -> Result<bool> {
    let email = match email {
        Some(email) => email,
        None => prompt_email(config.last_email.as_deref())?,
    };
    let password = prompt_password("Password: ")?;

    if email.is_empty() || password.is_empty() {
        eprintln!("Email and password required");
        return Ok(false);
    }
    if email.len() > MAX_EMAIL_LENGTH || password.len() > MAX_PASSWORD_LENGTH {
        eprintln!("Email or password too long");
        return Ok(false);
    }

    match manager.login(&email, &password).await {
        Ok(profile) => {
            config.last_email = Some(email);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            print_profile(&profile);
            Ok(true)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            Ok(false)
        }
    }
}

async fn register(manager: &Manager, username: &str, email: &str) -> Result<bool> {
    let password = prompt_password("Password: ")?;
    let confirmation = prompt_password("Confirm password: ")?;

    if password.is_empty() {
        eprintln!("Password required");
        return Ok(false);
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        eprintln!("Password too long");
        return Ok(false);
    }
    if password != confirmation {
        eprintln!("Passwords do not match");
        return Ok(false);
    }

    match manager.register(username, email, &password).await {
        Ok(profile) => {
            print_profile(&profile);
            Ok(true)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            Ok(false)
        }
    }
}

fn prompt_email(last_email: Option<&str>) -> Result<String> {
    match last_email {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match (input.is_empty(), last_email) {
        (true, Some(last)) => last.to_string(),
        _ => input.to_string(),
    })
}

fn prompt_password(prompt: &str) -> Result<String> {
    let password = rpassword::prompt_password(prompt)?;
    Ok(password)
}
