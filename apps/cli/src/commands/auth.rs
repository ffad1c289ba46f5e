//! Authentication commands.

use super::{AppContext, Globals};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use fixitkit_auth::{AuthError, Session};
use std::io::{self, Write};

fn display_name(session: &Session) -> &str {
    session.user.email.as_deref().unwrap_or(session.user_id())
}

/// Prompt for email and a hidden password. `None` when either is blank.
fn prompt_credentials(format: &OutputFormat) -> Result<Option<(String, String)>> {
    print!("Email: ");
    io::stdout().flush()?;
    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    let email = email.trim().to_string();

    if email.is_empty() {
        output::print_error("Email is required", format);
        return Ok(None);
    }

    let password = rpassword::prompt_password("Password: ")?;

    if password.is_empty() {
        output::print_error("Password is required", format);
        return Ok(None);
    }

    Ok(Some((email, password)))
}

/// Prompt and sign in. Failures are printed, not returned.
pub(super) async fn interactive_login(ctx: &AppContext, globals: &Globals) -> Result<()> {
    let Some((email, password)) = prompt_credentials(&globals.format)? else {
        return Ok(());
    };

    if globals.format == OutputFormat::Text {
        println!("Logging in...");
    }

    match ctx.provider.sign_in(&email, &password).await {
        Ok(session) => {
            output::print_success(
                &format!("Logged in as {}", display_name(&session)),
                &globals.format,
            );
        }
        Err(e) => {
            output::print_error(&format!("Login failed: {}", e), &globals.format);
        }
    }

    Ok(())
}

/// Create an account with email and password.
pub async fn signup(ctx: &AppContext, globals: &Globals) -> Result<()> {
    let format = &globals.format;
    if let Some(session) = ctx.provider.current_session() {
        output::print_success(
            &format!("Already logged in as {}", display_name(&session)),
            format,
        );
        return Ok(());
    }

    let Some((email, password)) = prompt_credentials(format)? else {
        return Ok(());
    };

    match ctx.provider.sign_up(&email, &password).await {
        Ok(session) => output::print_success(
            &format!("Account created. Logged in as {}", display_name(&session)),
            format,
        ),
        Err(AuthError::EmailConfirmationRequired { email }) => output::print_success(
            &format!(
                "Account created. Confirm the link sent to {}, then run `fixitkit login`",
                email
            ),
            format,
        ),
        Err(e) => output::print_error(&format!("Sign up failed: {}", e), format),
    }

    Ok(())
}

/// Login with email and password.
pub async fn login(ctx: &AppContext, globals: &Globals) -> Result<()> {
    if let Some(session) = ctx.provider.current_session() {
        output::print_success(
            &format!("Already logged in as {}", display_name(&session)),
            &globals.format,
        );
        return Ok(());
    }

    interactive_login(ctx, globals).await
}

/// Logout and clear session.
pub async fn logout(ctx: &AppContext, globals: &Globals) -> Result<()> {
    if !ctx.provider.is_authenticated() {
        output::print_success("Not logged in", &globals.format);
        return Ok(());
    }

    match ctx.provider.sign_out().await {
        Ok(()) => output::print_success("Logged out successfully", &globals.format),
        Err(e) => output::print_error(&format!("Logout failed: {}", e), &globals.format),
    }

    Ok(())
}

/// Check authentication status.
pub async fn status(ctx: &AppContext, globals: &Globals) -> Result<()> {
    let session = ctx.provider.current_session();

    match globals.format {
        OutputFormat::Text => match &session {
            Some(session) => {
                println!("Auth:     logged in");
                println!("User ID:  {}", session.user_id());
                if let Some(email) = &session.user.email {
                    println!("Email:    {}", email);
                }
                println!("Expires:  {}", session.expires_at.to_rfc3339());
            }
            None => println!("Auth:     not logged in"),
        },
        OutputFormat::Json => {
            let json = serde_json::json!({
                "logged_in": session.is_some(),
                "user_id": session.as_ref().map(|s| s.user_id()),
                "email": session.as_ref().and_then(|s| s.user.email.as_deref()),
                "expires_at": session.as_ref().map(|s| s.expires_at.to_rfc3339()),
            });
            output::print_json(&json);
        }
    }

    Ok(())
}
