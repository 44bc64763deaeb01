/// Refresh Token Cookie
///
/// The refresh token only ever travels in this cookie. It is HttpOnly so page
/// scripts cannot read it, Secure so it is never sent in clear text, and
/// SameSite=None so a separately hosted frontend can still send it back.

use actix_web::cookie::time::{Duration, OffsetDateTime};
use actix_web::cookie::{Cookie, SameSite};
use actix_web::HttpRequest;

/// Cookie name carrying the refresh token
pub const REFRESH_COOKIE_NAME: &str = "jwt";

const COOKIE_PATH: &str = "/";

/// Build the cookie set at login.
///
/// `max_age_seconds` must be the refresh token TTL so the browser drops the
/// cookie exactly when the token inside stops verifying.
pub fn refresh_cookie<'a>(token: String, max_age_seconds: i64) -> Cookie<'a> {
    Cookie::build(REFRESH_COOKIE_NAME, token)
        .path(COOKIE_PATH)
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .max_age(Duration::seconds(max_age_seconds))
        .finish()
}

/// Build the cookie that tells the browser to drop the refresh cookie.
///
/// Name, path and flags must match `refresh_cookie` or browsers ignore it.
pub fn clear_refresh_cookie<'a>() -> Cookie<'a> {
    Cookie::build(REFRESH_COOKIE_NAME, "")
        .path(COOKIE_PATH)
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .finish()
}

/// Read the refresh token from the request, ignoring an empty value.
pub fn extract_refresh_token(req: &HttpRequest) -> Option<String> {
    req.cookie(REFRESH_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|value| !value.is_empty())
}
