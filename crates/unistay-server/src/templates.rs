//! Server-rendered pages.
//!
//! Layout is intentionally plain: the pages exist so the sign-in, role
//! selection and registration flows can be driven from a browser.

use unistay_auth::guard::CALLBACK_PARAM;
use unistay_auth::wizard::{RegistrationDraft, SOCIAL_PROVIDERS};
use unistay_auth::{RegistrationWizard, Role, Session, WizardStep};

/// Shared CSS for all pages.
const SHARED_STYLES: &str = r#"
* { box-sizing: border-box; }
body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    margin: 0;
    background: #f5f6fa;
    color: #1d1f2c;
    line-height: 1.5;
}
.container { max-width: 480px; margin: 3rem auto; padding: 0 1rem; }
.card { background: #fff; border: 1px solid #e3e5ee; border-radius: 8px; padding: 1.5rem; }
.card-title { font-size: 1.25rem; font-weight: 600; margin-bottom: 1rem; }
.form-group { margin-bottom: 1rem; }
.form-label { display: block; font-size: 0.875rem; margin-bottom: 0.25rem; }
.form-input { width: 100%; padding: 0.5rem; border: 1px solid #cfd3e0; border-radius: 6px; }
.btn { padding: 0.5rem 1rem; border-radius: 6px; border: 1px solid #3b3fe3; cursor: pointer; }
.btn-primary { background: #3b3fe3; color: #fff; }
.btn-secondary { background: #fff; color: #3b3fe3; }
.alert-error { background: #fdecea; color: #a12622; padding: 0.75rem; border-radius: 6px; margin-bottom: 1rem; }
.steps { font-size: 0.875rem; color: #6c757d; margin-bottom: 1rem; }
.hint { font-size: 0.875rem; color: #6c757d; margin-top: 1rem; }
"#;

/// Base HTML template wrapper.
fn html_page(title: &str, content: &str) -> String {
    let mut html = String::with_capacity(content.len() + 1500);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("    <meta charset=\"UTF-8\">\n");
    html.push_str(
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    html.push_str("    <title>");
    html.push_str(&html_escape(title));
    html.push_str(" - UniStay</title>\n");
    html.push_str("    <style>");
    html.push_str(SHARED_STYLES);
    html.push_str("</style>\n</head>\n<body>\n    <div class=\"container\">\n");
    html.push_str(content);
    html.push_str("\n    </div>\n</body>\n</html>");
    html
}

fn push_error(content: &mut String, error: Option<&str>) {
    if let Some(e) = error {
        content.push_str("<div class=\"alert-error\">");
        content.push_str(&html_escape(e));
        content.push_str("</div>\n");
    }
}

fn push_input(content: &mut String, name: &str, label: &str, kind: &str, value: &str) {
    content.push_str("<div class=\"form-group\">\n<label class=\"form-label\" for=\"");
    content.push_str(name);
    content.push_str("\">");
    content.push_str(label);
    content.push_str("</label>\n<input class=\"form-input\" type=\"");
    content.push_str(kind);
    content.push_str("\" id=\"");
    content.push_str(name);
    content.push_str("\" name=\"");
    content.push_str(name);
    content.push('"');
    // Passwords are never echoed back.
    if kind != "password" {
        content.push_str(" value=\"");
        content.push_str(&html_escape(value));
        content.push('"');
    }
    content.push_str(">\n</div>\n");
}

fn push_hidden(content: &mut String, name: &str, value: &str) {
    content.push_str("<input type=\"hidden\" name=\"");
    content.push_str(name);
    content.push_str("\" value=\"");
    content.push_str(&html_escape(value));
    content.push_str("\">\n");
}

fn provider_label(provider: &str) -> String {
    let mut chars = provider.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Landing page.
pub fn render_home(session: Option<&Session>) -> String {
    let mut content = String::with_capacity(512);
    content.push_str("<div class=\"card\">\n<div class=\"card-title\">UniStay</div>\n");
    match session {
        Some(s) => {
            content.push_str("<p>Signed in as ");
            content.push_str(&html_escape(&s.email));
            content.push_str(" (");
            content.push_str(s.role.as_str());
            content.push_str(").</p>\n");
            if let Some(root) = s.role.dashboard_root() {
                content.push_str("<p><a href=\"");
                content.push_str(root);
                content.push_str("\">Go to your dashboard</a></p>\n");
            }
            content.push_str("<form method=\"POST\" action=\"/logout\"><button class=\"btn btn-secondary\" type=\"submit\">Sign out</button></form>\n");
        }
        None => {
            content.push_str("<p><a href=\"/login\">Sign in</a> or <a href=\"/register\">create an account</a>.</p>\n");
        }
    }
    content.push_str("</div>");
    html_page("Home", &content)
}

/// Renders the login form.
///
/// `providers` lists `(id, display name)` pairs of the enabled OAuth providers.
pub fn render_login_form(
    callback: Option<&str>,
    email: &str,
    error: Option<&str>,
    providers: &[(String, String)],
) -> String {
    let mut content = String::with_capacity(2048);
    content.push_str("<div class=\"card\">\n<div class=\"card-title\">Sign in</div>\n");
    push_error(&mut content, error);

    content.push_str("<form method=\"POST\" action=\"/login\">\n");
    if let Some(cb) = callback {
        push_hidden(&mut content, CALLBACK_PARAM, cb);
    }
    push_input(&mut content, "email", "Email", "email", email);
    push_input(&mut content, "password", "Password", "password", "");
    content.push_str("<button type=\"submit\" class=\"btn btn-primary\">Sign in</button>\n");
    content.push_str("</form>\n");

    for (id, name) in providers {
        content.push_str("<p><a class=\"btn btn-secondary\" href=\"/auth/signin/");
        content.push_str(&html_escape(id));
        if let Some(cb) = callback {
            content.push('?');
            content.push_str(CALLBACK_PARAM);
            content.push('=');
            content.push_str(&html_escape(&unistay_auth::guard::encode_query_value(cb)));
        }
        content.push_str("\">Continue with ");
        content.push_str(&html_escape(name));
        content.push_str("</a></p>\n");
    }

    content.push_str("<div class=\"hint\">New here? <a href=\"/register\">Create an account</a></div>\n");
    content.push_str("</div>");
    html_page("Sign In", &content)
}

/// Renders the role selection form for a `pending` user.
pub fn render_select_role(email: &str, error: Option<&str>) -> String {
    let mut content = String::with_capacity(1024);
    content.push_str("<div class=\"card\">\n<div class=\"card-title\">Choose how you will use UniStay</div>\n");
    content.push_str("<p>Signed in as ");
    content.push_str(&html_escape(email));
    content.push_str(".</p>\n");
    push_error(&mut content, error);
    content.push_str("<form method=\"POST\" action=\"/select_role\">\n");
    for role in Role::SELF_SELECTABLE {
        content.push_str("<div class=\"form-group\"><label><input type=\"radio\" name=\"role\" value=\"");
        content.push_str(role.as_str());
        content.push_str("\"> ");
        content.push_str(&provider_label(role.as_str()));
        content.push_str("</label></div>\n");
    }
    content.push_str("<button type=\"submit\" class=\"btn btn-primary\">Continue</button>\n</form>\n</div>");
    html_page("Select Role", &content)
}

/// Renders the registration wizard at its current step.
pub fn render_wizard(wizard: &RegistrationWizard) -> String {
    let step = wizard.step();
    let draft = wizard.draft();
    let mut content = String::with_capacity(3072);
    content.push_str("<div class=\"card\">\n<div class=\"card-title\">Create your account</div>\n");
    content.push_str("<div class=\"steps\">Step ");
    content.push_str(&step.number().to_string());
    content.push_str(" of ");
    content.push_str(&WizardStep::ALL.len().to_string());
    content.push_str(": ");
    content.push_str(step.title());
    content.push_str("</div>\n");
    push_error(&mut content, wizard.error());

    content.push_str("<form method=\"POST\" action=\"/register\">\n");
    match step {
        WizardStep::RoleSelect => push_role_select(&mut content, draft),
        WizardStep::Details => push_details(&mut content, draft),
        WizardStep::RoleDetails => push_role_details(&mut content, draft),
        WizardStep::SocialSignup => push_social_signup(&mut content),
    }

    if step.previous().is_some() {
        content.push_str("<button type=\"submit\" name=\"action\" value=\"back\" class=\"btn btn-secondary\">Back</button>\n");
    }
    if step.is_final() {
        content.push_str("<button type=\"submit\" name=\"action\" value=\"submit\" class=\"btn btn-primary\">Create account</button>\n");
    } else {
        content.push_str("<button type=\"submit\" name=\"action\" value=\"next\" class=\"btn btn-primary\">Next</button>\n");
    }
    content.push_str("</form>\n");
    content.push_str("<div class=\"hint\">Already registered? <a href=\"/login\">Sign in</a></div>\n</div>");
    html_page("Register", &content)
}

fn push_role_select(content: &mut String, draft: &RegistrationDraft) {
    for role in Role::SELF_SELECTABLE {
        content.push_str("<div class=\"form-group\"><label><input type=\"radio\" name=\"role\" value=\"");
        content.push_str(role.as_str());
        content.push('"');
        if draft.role == Some(role) {
            content.push_str(" checked");
        }
        content.push_str("> ");
        content.push_str(&provider_label(role.as_str()));
        content.push_str("</label></div>\n");
    }
}

fn push_details(content: &mut String, draft: &RegistrationDraft) {
    let d = &draft.details;
    push_input(content, "first_name", "First name", "text", &d.first_name);
    push_input(content, "last_name", "Last name", "text", &d.last_name);
    push_input(content, "email", "Email", "email", &d.email);
    push_input(content, "phone", "Phone (optional)", "tel", &d.phone);
    push_input(content, "password", "Password", "password", "");
    push_input(
        content,
        "password_confirmation",
        "Confirm password",
        "password",
        "",
    );
}

fn push_role_details(content: &mut String, draft: &RegistrationDraft) {
    let r = &draft.role_details;
    match draft.role {
        Some(Role::Student) => {
            push_input(content, "university", "University", "text", &r.university);
            push_input(content, "student_id", "Student ID", "text", &r.student_id);
        }
        Some(Role::Landlord) => {
            push_input(
                content,
                "properties_count",
                "Number of properties",
                "text",
                &r.properties_count,
            );
        }
        Some(Role::Agent) => {
            push_input(content, "agency_name", "Agency name", "text", &r.agency_name);
            push_input(
                content,
                "licence_number",
                "Licence number",
                "text",
                &r.licence_number,
            );
        }
        _ => content.push_str("<p>Go back and choose a role first.</p>\n"),
    }
}

fn push_social_signup(content: &mut String) {
    content.push_str("<p>Finish with your email and password, or continue with a social account.</p>\n");
    for provider in SOCIAL_PROVIDERS {
        content.push_str("<button type=\"submit\" name=\"provider\" value=\"");
        content.push_str(provider);
        content.push_str("\" class=\"btn btn-secondary\">Continue with ");
        content.push_str(&provider_label(provider));
        content.push_str("</button>\n");
    }
}

/// Placeholder for a guarded area; the page body is out of scope here.
pub fn render_area(area: &str, session: &Session) -> String {
    let mut content = String::with_capacity(512);
    content.push_str("<div class=\"card\">\n<div class=\"card-title\">");
    content.push_str(&html_escape(area));
    content.push_str("</div>\n<p>Signed in as ");
    content.push_str(&html_escape(&session.email));
    content.push_str(" (");
    content.push_str(session.role.as_str());
    content.push_str(").</p>\n");
    content.push_str("<form method=\"POST\" action=\"/logout\"><button class=\"btn btn-secondary\" type=\"submit\">Sign out</button></form>\n</div>");
    html_page(area, &content)
}

/// Shown when a role has no area it may enter.
pub fn render_unauthorized() -> String {
    let content = "<div class=\"card\">\n<div class=\"card-title\">Not allowed</div>\n\
        <p>Your account does not have access to that page.</p>\n\
        <p><a href=\"/\">Back to the start page</a></p>\n</div>";
    html_page("Unauthorized", content)
}

/// Renders an error page.
pub fn render_error_page(title: &str, message: &str) -> String {
    let mut content = String::with_capacity(512);
    content.push_str("<div class=\"card\">\n<div class=\"card-title\">");
    content.push_str(&html_escape(title));
    content.push_str("</div>\n<div class=\"alert-error\">");
    content.push_str(&html_escape(message));
    content.push_str("</div>\n<p><a href=\"/login\">Back to sign in</a></p>\n</div>");
    html_page(title, &content)
}

/// Simple HTML escaping to prevent XSS.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
