use crate::core::config::SessionConfig;
use bizflow_types::{AuthStatus, SessionUser};
use serde::{Deserialize, Serialize};

/// Identity of the current session, injected into each controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionContext {
    pub status: AuthStatus,
    pub user: Option<SessionUser>,
}

impl SessionContext {
    pub fn authenticated(user: SessionUser) -> Self {
        Self {
            status: AuthStatus::Authenticated,
            user: Some(user),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            status: AuthStatus::Unauthenticated,
            user: None,
        }
    }

    pub fn loading() -> Self {
        Self {
            status: AuthStatus::Loading,
            user: None,
        }
    }

    /// Session described by the `[session]` config table. A user id makes
    /// the session authenticated; name and email default to empty.
    pub fn from_config(config: &SessionConfig) -> Self {
        match config.user_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Self::authenticated(SessionUser {
                id: id.to_string(),
                name: config.name.clone().unwrap_or_default(),
                email: config.email.clone().unwrap_or_default(),
            }),
            _ => Self::anonymous(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated && self.user.is_some()
    }

    /// User id usable for persistence; `None` unless authenticated.
    pub fn user_id(&self) -> Option<&str> {
        if self.status != AuthStatus::Authenticated {
            return None;
        }
        self.user.as_ref().map(|user| user.id.as_str())
    }
}
