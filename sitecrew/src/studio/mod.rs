//! The studio: one project, one team, rounds of conversation.

mod session;
mod workflow;

use std::path::{Path, PathBuf};

pub use session::{EndReason, RoundReport, RoundState, Session, TurnRecord};
pub use workflow::{Scenario, Workflow};

/// Directory name for a project: alphanumerics and `-`/`_` kept, the
/// rest replaced with `-`.
pub fn project_slug(name: &str) -> String {
    let slug: String = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    if slug.is_empty() { "project".to_string() } else { slug }
}

pub fn project_root(base: &Path, name: &str) -> PathBuf {
    base.join(project_slug(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert_eq!(project_slug("Sweet Treats Bakery"), "Sweet-Treats-Bakery");
        assert_eq!(project_slug("../etc"), "---etc");
        assert_eq!(project_slug("  "), "project");
    }
}
