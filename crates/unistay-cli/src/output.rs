use colored::Colorize;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use unistay_auth::{GuardDecision, RouteTable, SessionSnapshot, SessionStatus};

use crate::cli::OutputFormat;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Unix seconds as RFC 3339, or the raw number if out of range.
pub fn format_unix(ts: i64) -> String {
    OffsetDateTime::from_unix_timestamp(ts)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| ts.to_string())
}

pub fn print_session(
    snapshot: &SessionSnapshot,
    profile: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(&snapshot.view());
    }
    let Some(session) = snapshot
        .session
        .as_ref()
        .filter(|_| snapshot.status == SessionStatus::Authenticated)
    else {
        print_error(&format!("Not signed in (profile: \"{profile}\")"));
        return Ok(());
    };

    let mut builder = Builder::default();
    builder.push_record(["Profile", profile]);
    builder.push_record(["User", session.user_id.as_str()]);
    builder.push_record(["Email", session.email.as_str()]);
    builder.push_record(["Role", session.role.as_str()]);
    builder.push_record(["Verified", if session.is_verified { "yes" } else { "no" }]);
    builder.push_record([
        "Access token expires",
        format_unix(session.access_expires_at).as_str(),
    ]);
    builder.push_record(["Session expires", format_unix(session.expires_at).as_str()]);
    println!("{}", builder.build().with(Style::rounded()));

    if session.role.is_pending() {
        println!(
            "{} choose a role with: unistay select-role <student|landlord|agent>",
            "Hint:".yellow()
        );
    }
    Ok(())
}

pub fn print_decision(
    path: &str,
    decision: &GuardDecision,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(decision);
    }
    match decision {
        GuardDecision::Allow => println!("{} {}", "allow".green().bold(), path),
        GuardDecision::Redirect { target, reason } => println!(
            "{} {} -> {} ({})",
            "redirect".yellow().bold(),
            path,
            target.cyan(),
            reason
        ),
    }
    Ok(())
}

pub fn print_routes(routes: &RouteTable, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        let rows: Vec<serde_json::Value> = routes
            .iter()
            .map(|r| serde_json::json!({ "prefix": r.prefix(), "allowed": r.allowed() }))
            .collect();
        return print_json(&rows);
    }
    let mut builder = Builder::default();
    builder.push_record(["Prefix", "Allowed roles"]);
    for route in routes.iter() {
        let roles: Vec<&str> = route.allowed().iter().map(|r| r.as_str()).collect();
        builder.push_record([route.prefix().to_string(), roles.join(", ")]);
    }
    println!("{}", builder.build().with(Style::rounded()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_unix() {
        assert_eq!(format_unix(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_unix(i64::MAX), i64::MAX.to_string());
    }
}
