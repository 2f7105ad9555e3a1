use anyhow::Result;
use unistay_auth::RoleGuard;

use crate::cli::OutputFormat;
use crate::context::SessionContext;
use crate::output::{print_decision, print_routes};

/// Prints what the guard decides for `path` with the current session.
pub fn open(ctx: &SessionContext, path: &str, format: OutputFormat) -> Result<()> {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    let decision = ctx.guard.evaluate_store(&path, &ctx.store);
    print_decision(&path, &decision, format)
}

pub fn routes(guard: &RoleGuard, format: OutputFormat) -> Result<()> {
    print_routes(guard.routes(), format)
}
