//! Process-wide session and theme context.
//!
//! The session and theme live in an explicit [`AppContext`] passed to
//! whatever surface hosts the orchestration — never in ambient globals.
//! Role gating is a pure predicate over the session and the required role,
//! independent of any particular routing mechanism.

use serde::{Deserialize, Serialize};

/// The role a logged-in session acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Uploader: submits media for analysis, may share live location.
    User,

    /// Monitoring authority: watches alerts and live locations.
    Police,
}

/// An authenticated session. Produced by an external credential check;
/// this crate only carries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Email the session authenticated as.
    pub email: String,

    /// Role the session acts as.
    pub role: Role,

    /// Badge identifier, present for police sessions.
    #[serde(default)]
    pub police_id: Option<String>,
}

/// Decide whether a session may access a view gated on `required`.
///
/// Pure: no session means deny, a role mismatch means deny.
pub fn authorize(session: Option<&SessionContext>, required: Role) -> bool {
    match session {
        Some(ctx) => ctx.role == required,
        None => false,
    }
}

/// Display theme, persisted across sessions by the hosting surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light palette.
    Light,

    /// Dark palette (the persisted default).
    #[default]
    Dark,
}

impl Theme {
    /// Parse a persisted theme value, falling back to the default for
    /// anything unrecognized.
    pub fn from_persisted(raw: Option<&str>) -> Self {
        match raw {
            Some("light") => Theme::Light,
            Some("dark") => Theme::Dark,
            _ => Theme::default(),
        }
    }
}

/// Explicit process-wide state: who is logged in and how the surface is
/// themed. Initialized once at startup, torn down on logout.
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    /// The active session, if any.
    pub session: Option<SessionContext>,

    /// Current display theme.
    pub theme: Theme,
}

impl AppContext {
    /// Initialize from a persisted theme value and no session.
    pub fn init(persisted_theme: Option<&str>) -> Self {
        Self {
            session: None,
            theme: Theme::from_persisted(persisted_theme),
        }
    }

    /// Install a session after a successful external credential check.
    pub fn login(&mut self, session: SessionContext) {
        self.session = Some(session);
    }

    /// Clear the session. The theme survives logout.
    pub fn logout(&mut self) {
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn police_session() -> SessionContext {
        SessionContext {
            email: "officer@example.com".to_string(),
            role: Role::Police,
            police_id: Some("PD-1044".to_string()),
        }
    }

    #[test]
    fn test_authorize_matches_role() {
        let session = police_session();
        assert!(authorize(Some(&session), Role::Police));
        assert!(!authorize(Some(&session), Role::User));
    }

    #[test]
    fn test_authorize_denies_missing_session() {
        assert!(!authorize(None, Role::User));
        assert!(!authorize(None, Role::Police));
    }

    #[test]
    fn test_theme_parsing_falls_back_to_dark() {
        assert_eq!(Theme::from_persisted(Some("light")), Theme::Light);
        assert_eq!(Theme::from_persisted(Some("dark")), Theme::Dark);
        assert_eq!(Theme::from_persisted(Some("neon")), Theme::Dark);
        assert_eq!(Theme::from_persisted(None), Theme::Dark);
    }

    #[test]
    fn test_logout_clears_session_keeps_theme() {
        let mut ctx = AppContext::init(Some("light"));
        ctx.login(police_session());
        assert!(ctx.session.is_some());

        ctx.logout();
        assert!(ctx.session.is_none());
        assert_eq!(ctx.theme, Theme::Light);
    }
}
