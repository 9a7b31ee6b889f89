//! Per-request authentication and role routing.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::{
    TypedHeader,
    extract::cookie::{Cookie, CookieJar, SameSite},
    headers::{Authorization, authorization::Bearer},
};
use deployment::Deployment;
use services::services::{
    access::AccessService,
    roles::{CookieUpdate, Navigation, RoleCookies, SessionView},
    session::SESSION_COOKIE,
};
use tracing::debug;

use crate::{DeploymentImpl, error::ApiError};

const PUBLIC_PATHS: &[&str] = &["/", "/login", "/about", "/contact", "/pricing", "/health", "/favicon.ico"];
const PUBLIC_PREFIXES: &[&str] = &["/assets/", "/api/auth/"];

pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

fn is_api(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

pub fn login_redirect(path: &str) -> String {
    format!("/login?from={}", urlencoding::encode(path))
}

/// Cookie with the shared attributes of every role cookie.
pub fn role_cookie(name: String, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .max_age(time::Duration::days(1))
        .same_site(SameSite::Lax)
        .http_only(true)
        .build()
}

pub fn apply_cookie_updates(mut jar: CookieJar, updates: &[CookieUpdate]) -> CookieJar {
    for update in updates {
        jar = match update {
            CookieUpdate::Set { name, value } => jar.add(role_cookie(name.clone(), value.clone())),
            CookieUpdate::Clear { name } => {
                jar.remove(Cookie::build((name.clone(), String::new())).path("/"))
            }
        };
    }
    jar
}

/// Verified session from the bearer header, falling back to the session cookie.
pub fn session_from(
    deployment: &DeploymentImpl,
    bearer: Option<&str>,
    jar: &CookieJar,
) -> Option<SessionView> {
    let token = bearer
        .map(str::to_string)
        .or_else(|| jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string()))?;
    match deployment.session_keys().verify(&token) {
        Ok(session) => Some(session),
        Err(err) => {
            debug!(error = %err, "ignoring invalid session token");
            None
        }
    }
}

pub fn role_cookies(jar: &CookieJar) -> RoleCookies {
    RoleCookies::from_lookup(|name| jar.get(name).map(|cookie| cookie.value().to_string()))
}

pub async fn require_session(
    State(deployment): State<DeploymentImpl>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let bearer = bearer.as_ref().map(|TypedHeader(auth)| auth.token());
    let session = session_from(&deployment, bearer, &jar);

    // Signed-in users have no business on the login page.
    let public = is_public(&path);
    if public && !(path == "/login" && session.is_some()) {
        return next.run(request).await;
    }

    let Some(session) = session else {
        if is_api(&path) {
            return ApiError::Unauthorized.into_response();
        }
        return Redirect::temporary(&login_redirect(&path)).into_response();
    };

    let resolved = AccessService::resolve(
        &deployment.db().pool,
        deployment.role_policy(),
        &session,
        &role_cookies(&jar),
        &path,
    )
    .await;
    let (user, resolution) = match resolved {
        Ok(resolved) => resolved,
        Err(err) => return ApiError::from(err).into_response(),
    };

    let jar = apply_cookie_updates(jar, &resolution.cookies);
    if let Navigation::Redirect(target) = &resolution.navigation {
        if !is_api(&path) {
            debug!(user_id = %user.user_id, from = %path, to = %target, "role redirect");
            return (jar, Redirect::temporary(target)).into_response();
        }
    }

    request.extensions_mut().insert(user);
    request.extensions_mut().insert(session);
    let response = next.run(request).await;
    (jar, response).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_paths() {
        assert!(is_public("/"));
        assert!(is_public("/login"));
        assert!(is_public("/assets/app.js"));
        assert!(is_public("/api/auth/dev-login"));
        assert!(!is_public("/agent/dashboard"));
        assert!(!is_public("/api/applications"));
        assert!(!is_public("/aboutus"));
    }

    #[test]
    fn login_redirect_encodes_origin() {
        assert_eq!(
            login_redirect("/agent/applications"),
            "/login?from=%2Fagent%2Fapplications"
        );
    }
}
