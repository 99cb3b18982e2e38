use std::fmt;

use crate::draft::Stage;

/// How the workflow was entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryMode {
    /// New report: starts in `pre`, may go back from `post`
    #[default]
    Fresh,
    /// Editing an already submitted report: starts in `post`, cannot go back
    PostEdit,
}

impl EntryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryMode::Fresh => "fresh",
            EntryMode::PostEdit => "edit",
        }
    }
}

/// Bookmarkable position in the workflow, e.g. `stage=post&mode=edit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavState {
    pub stage: Stage,
    pub mode: EntryMode,
}

impl NavState {
    pub fn to_query(&self) -> String {
        match self.mode {
            EntryMode::Fresh => format!("stage={}", self.stage),
            EntryMode::PostEdit => format!("stage={}&mode={}", self.stage, self.mode.as_str()),
        }
    }

    /// Parse a query string leniently: unknown keys are ignored and unknown
    /// values fall back to the defaults (`pre`, fresh)
    pub fn from_query(query: &str) -> Self {
        let mut nav = NavState::default();
        for pair in query.trim_start_matches('?').split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key {
                "stage" => nav.stage = value.parse().unwrap_or_default(),
                "mode" if value == "edit" => nav.mode = EntryMode::PostEdit,
                _ => {}
            }
        }
        nav
    }
}

impl fmt::Display for NavState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_forms() {
        let nav = NavState {
            stage: Stage::Post,
            mode: EntryMode::PostEdit,
        };
        assert_eq!(nav.to_query(), "stage=post&mode=edit");
        assert_eq!(NavState::from_query("stage=post&mode=edit"), nav);

        let fresh = NavState::default();
        assert_eq!(fresh.to_query(), "stage=pre");
        assert_eq!(NavState::from_query(&fresh.to_query()), fresh);
    }

    #[test]
    fn test_lenient_parsing() {
        assert_eq!(NavState::from_query(""), NavState::default());
        assert_eq!(NavState::from_query("?stage=bogus&x=1"), NavState::default());
        assert_eq!(
            NavState::from_query("?mode=fresh&stage=POST"),
            NavState {
                stage: Stage::Post,
                mode: EntryMode::Fresh
            }
        );
    }
}
