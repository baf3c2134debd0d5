//! Route table and navigation guard.
//!
//! Public views are reachable by anyone; the agent view requires an
//! authenticated session. There are no intermediate states: a navigation
//! either renders the requested route or redirects to login.

use crate::session::SessionStore;

/// The application's views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Features,
    Pricing,
    Login,
    Signup,
    Agent,
}

impl Route {
    /// Stable path string for this route.
    pub fn path(self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Features => "/features",
            Route::Pricing => "/pricing",
            Route::Login => "/login",
            Route::Signup => "/signup",
            Route::Agent => "/agent",
        }
    }

    /// Resolves a path string back to a route.
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/" => Some(Route::Home),
            "/features" => Some(Route::Features),
            "/pricing" => Some(Route::Pricing),
            "/login" => Some(Route::Login),
            "/signup" => Some(Route::Signup),
            "/agent" => Some(Route::Agent),
            _ => None,
        }
    }

    /// True for routes that require an authenticated session.
    pub fn is_protected(self) -> bool {
        matches!(self, Route::Agent)
    }
}

/// Outcome of resolving a navigation against the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Render the requested route.
    Render(Route),
    /// The route is protected and the session is unauthenticated.
    RedirectToLogin,
}

/// Applies the guard: protected routes render only for authenticated
/// sessions, everything else renders unconditionally.
pub fn resolve(route: Route, session: &SessionStore) -> Navigation {
    if route.is_protected() && !session.is_authenticated() {
        Navigation::RedirectToLogin
    } else {
        Navigation::Render(route)
    }
}
