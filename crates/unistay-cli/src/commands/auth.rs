use anyhow::{Context, Result};
use colored::Colorize;
use unistay_auth::{AuthError, Role, Session};

use crate::cli::{LoginArgs, OutputFormat};
use crate::context::SessionContext;
use crate::output::{print_json, print_session, print_success};

pub async fn login(ctx: &SessionContext, args: &LoginArgs, format: OutputFormat) -> Result<()> {
    let session = ctx
        .adapter
        .login_with_password(&args.email, &args.password)
        .await
        .map_err(user_facing)?;
    let next = ctx.guard.landing_for(&session, None);
    ctx.store.sign_in(session.clone());

    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "session": ctx.store.snapshot().view(),
            "next": next,
        }));
    }
    print_success(&format!(
        "Signed in to {} as {} ({})",
        ctx.api.cyan(),
        session.email.cyan(),
        session.role
    ));
    println!("{}: {}", "Next".cyan(), next);
    Ok(())
}

pub fn logout(ctx: &SessionContext) {
    match ctx.store.current() {
        Some(session) => {
            ctx.store.sign_out();
            print_success(&format!("Signed out {}", session.email));
        }
        None => println!("Not signed in"),
    }
}

pub fn whoami(ctx: &SessionContext, profile: &str, format: OutputFormat) -> Result<()> {
    print_session(&ctx.store.snapshot(), profile, format)
}

pub async fn select_role(ctx: &SessionContext, raw_role: &str, format: OutputFormat) -> Result<()> {
    let session = signed_in(ctx)?;
    let role: Role = raw_role.parse().map_err(user_facing)?;
    let update = ctx
        .adapter
        .select_role(&session, role)
        .await
        .map_err(user_facing)?;
    let updated = ctx.store.update(update)?;
    let next = ctx.guard.landing_for(&updated, None);

    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({ "role": updated.role, "next": next }));
    }
    print_success(&format!("Role set to {}", updated.role.to_string().cyan()));
    println!("{}: {}", "Next".cyan(), next);
    Ok(())
}

/// Refreshes the access token regardless of how long it has left.
///
/// A rejected refresh signs out; a network failure keeps the session.
pub async fn refresh(ctx: &SessionContext) -> Result<()> {
    let session = signed_in(ctx)?;
    match ctx.adapter.refresh(&session).await {
        Ok(update) => {
            let updated = ctx.store.update(update)?;
            print_success(&format!(
                "Access token refreshed, valid until {}",
                crate::output::format_unix(updated.access_expires_at)
            ));
            Ok(())
        }
        Err(e @ AuthError::Network { .. }) => Err(user_facing(e)),
        Err(e) => {
            ctx.store.sign_out();
            Err(user_facing(e)).context("Session ended, sign in again")
        }
    }
}

fn signed_in(ctx: &SessionContext) -> Result<Session> {
    ctx.store
        .current()
        .context("Not signed in. Run: unistay login --email <email>")
}

/// Error with the message meant for people, details kept in the log.
fn user_facing(e: AuthError) -> anyhow::Error {
    tracing::debug!(error = %e, category = %e.category(), "Command failed");
    anyhow::anyhow!(e.user_message())
}
