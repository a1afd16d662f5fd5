use crate::error::IdpError;
use crate::model::App;

use regex::Regex;

/// Built-in applications that are never exported or reconfigured.
pub const SYSTEM_APPS: [&str; 11] = [
    "okta-iga-reviewer",
    "okta-flow-sso",
    "okta-access-requests-resource-catalog",
    "flow",
    "okta-atspoke-sso",
    "okta-admin-console",
    "okta-dashboard",
    "okta-browser-plugin",
    "Okta Admin Console",
    "Okta Browser Plugin",
    "Okta Dashboard",
];

pub fn is_system_app(app: &App) -> bool {
    let label = app.label.to_lowercase();
    let name = app.name.to_lowercase();
    name.starts_with("okta_")
        || SYSTEM_APPS.iter().any(|system| {
            let system = system.to_lowercase();
            label.contains(&system) || name.contains(&system)
        })
}

/// Shell-style wildcard (`*`, `?`, `[...]`) matched against a whole label.
#[derive(Debug, Clone)]
pub struct LabelPattern(Regex);

impl LabelPattern {
    pub fn new(pattern: &str) -> Result<Self, IdpError> {
        Ok(Self(Regex::new(&wildcard_to_regex(pattern))?))
    }

    pub fn matches(&self, label: &str) -> bool {
        self.0.is_match(label)
    }
}

fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let class: String = chars.by_ref().take_while(|&c| c != ']').collect();
                match class.strip_prefix('!') {
                    Some(rest) => out.push_str(&format!("[^{}]", rest.replace('\\', r"\\"))),
                    None => out.push_str(&format!("[{}]", class.replace('\\', r"\\"))),
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}
