//! Routes shared by the device and host HTTP servers.

/// Viewer page served at `/`.
pub const INDEX_HTML: &str = include_str!("index.html");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Index,
    Stream,
}

impl Route {
    pub const ALL: [Route; 2] = [Route::Index, Route::Stream];

    pub fn path(self) -> &'static str {
        match self {
            Route::Index => "/",
            Route::Stream => "/stream",
        }
    }

    /// Matches a request line's method and target. Query strings are ignored.
    pub fn resolve(method: &str, target: &str) -> Option<Route> {
        if method != "GET" {
            return None;
        }
        let path = target.split('?').next().unwrap_or(target);
        Self::ALL.into_iter().find(|route| route.path() == path)
    }
}
