//! Access decisions for protected views.
//!
//! Every protected command applies the same rules, so they live here instead
//! of being repeated at each call site. A decision is only final once the
//! session has finished loading; before that the answer is always `Pending`.

use crate::auth::{Identity, SessionView};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Session still hydrating; do not redirect yet.
    Pending,
    Granted(Identity),
    RedirectToLogin,
    /// Signed in, but not as the owner of the resource.
    Forbidden,
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted(_))
    }
}

/// Require any signed-in user.
pub fn require_user(view: &SessionView) -> Access {
    if view.is_loading {
        return Access::Pending;
    }
    match view.user {
        Some(ref user) => Access::Granted(user.clone()),
        None => Access::RedirectToLogin,
    }
}

/// Require the signed-in user to own the resource.
pub fn require_owner(view: &SessionView, owner_id: &str) -> Access {
    match require_user(view) {
        Access::Granted(user) if user.id != owner_id => Access::Forbidden,
        access => access,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity {
            id: "u1".to_string(),
            email: "alice@example.com".to_string(),
        }
    }

    fn view(user: Option<Identity>, is_loading: bool) -> SessionView {
        SessionView {
            token: user.as_ref().map(|_| "a.b.c".to_string()),
            user,
            is_loading,
        }
    }

    #[test]
    fn test_pending_while_loading() {
        assert_eq!(require_user(&view(None, true)), Access::Pending);
        assert_eq!(require_owner(&view(None, true), "u1"), Access::Pending);
    }

    #[test]
    fn test_redirect_when_loaded_without_user() {
        assert_eq!(require_user(&view(None, false)), Access::RedirectToLogin);
        assert_eq!(require_owner(&view(None, false), "u1"), Access::RedirectToLogin);
    }

    #[test]
    fn test_granted_for_user() {
        assert_eq!(require_user(&view(Some(alice()), false)), Access::Granted(alice()));
        assert!(require_owner(&view(Some(alice()), false), "u1").is_granted());
    }

    #[test]
    fn test_forbidden_for_other_owner() {
        assert_eq!(require_owner(&view(Some(alice()), false), "u2"), Access::Forbidden);
    }
}
