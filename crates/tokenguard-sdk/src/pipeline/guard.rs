//! Post-response hook: decide whether a failure may trigger a refresh

use super::request::RetryableRequest;
use crate::config::RoutesConfig;
use reqwest::StatusCode;
use url::Url;

/// Paths that are never subject to refresh-and-replay
#[derive(Debug, Clone)]
pub struct AuthRoutes {
    paths: Vec<String>,
}

impl AuthRoutes {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths
                .into_iter()
                .map(|p| normalize(&p.into()).to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// True when the URL path equals an auth route or ends with it on a
    /// segment boundary, so `/api/auth/login` matches `/auth/login`.
    /// Query strings are ignored.
    pub fn matches(&self, url: &Url) -> bool {
        let path = normalize(url.path());
        self.paths.iter().any(|route| {
            path == route
                || path
                    .strip_suffix(route.as_str())
                    .is_some_and(|prefix| prefix.ends_with('/') || route.starts_with('/'))
        })
    }
}

impl From<&RoutesConfig> for AuthRoutes {
    fn from(routes: &RoutesConfig) -> Self {
        Self::new([
            routes.login.as_str(),
            routes.register.as_str(),
            routes.refresh.as_str(),
            routes.logout.as_str(),
        ])
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        path
    } else {
        trimmed
    }
}

/// Why a failure is handed back to the caller untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    /// Status is not 401
    NotUnauthorized,
    /// The one permitted replay has been used
    AlreadyRetried,
    /// Login, register, refresh or logout
    AuthRoute,
}

/// Outcome of [`ResponseGuard::evaluate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Refresh the credential and replay the request
    Eligible,
    /// Return the response as is
    PassThrough(PassReason),
}

/// Classifies responses as refresh-eligible or pass-through
#[derive(Debug, Clone)]
pub struct ResponseGuard {
    auth_routes: AuthRoutes,
}

impl ResponseGuard {
    pub fn new(auth_routes: AuthRoutes) -> Self {
        Self { auth_routes }
    }

    pub fn auth_routes(&self) -> &AuthRoutes {
        &self.auth_routes
    }

    pub fn evaluate(&self, status: StatusCode, request: &RetryableRequest) -> Verdict {
        if status != StatusCode::UNAUTHORIZED {
            return Verdict::PassThrough(PassReason::NotUnauthorized);
        }
        if request.is_retried() {
            return Verdict::PassThrough(PassReason::AlreadyRetried);
        }
        if self.auth_routes.matches(request.url()) {
            return Verdict::PassThrough(PassReason::AuthRoute);
        }
        Verdict::Eligible
    }
}
