//! Navigation between the login screen and the token screen.

use std::sync::{Arc, RwLock};

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    #[default]
    Login,
    Token,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/",
            Route::Token => "/token",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/" => Some(Route::Login),
            "/token" => Some(Route::Token),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Login => "Sign in",
            Route::Token => "User Access Token",
        }
    }
}

/// Shared handle to the active route.
/// Clones point at the same route, so a background sign-in can redirect the UI.
#[derive(Debug, Clone, Default)]
pub struct Router {
    current: Arc<RwLock<Route>>,
}

impl Router {
    pub fn new(start: Route) -> Self {
        Self {
            current: Arc::new(RwLock::new(start)),
        }
    }

    pub fn current(&self) -> Route {
        match self.current.read() {
            Ok(route) => *route,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn navigate(&self, route: Route) {
        debug!(path = route.path(), "Navigating");
        match self.current.write() {
            Ok(mut current) => *current = route,
            Err(poisoned) => *poisoned.into_inner() = route,
        }
    }
}
