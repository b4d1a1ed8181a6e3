use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::config::{CookieSettings, Settings};
use crate::gate::CookieDirective;
use crate::models::Session;

/// Applies the shared path/domain/`Secure` attributes to a directive.
pub fn build_cookie(settings: &CookieSettings, directive: CookieDirective) -> Cookie<'static> {
    let mut builder = Cookie::build((directive.name, directive.value))
        .path(settings.path.clone())
        .secure(settings.secure)
        .http_only(directive.http_only)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(directive.max_age_seconds));

    if let Some(domain) = &settings.domain {
        builder = builder.domain(domain.clone());
    }

    builder.build()
}

pub fn session_cookie(settings: &Settings, session: &Session) -> Cookie<'static> {
    build_cookie(
        &settings.cookie,
        CookieDirective {
            name: settings.session.cookie_name.clone(),
            value: session.id.clone(),
            max_age_seconds: settings.session.ttl_seconds,
            http_only: settings.cookie.http_only,
        },
    )
}

/// Overwrites the session cookie with an already-expired one.
pub fn cleared_session_cookie(settings: &Settings) -> Cookie<'static> {
    build_cookie(
        &settings.cookie,
        CookieDirective {
            name: settings.session.cookie_name.clone(),
            value: String::new(),
            max_age_seconds: 0,
            http_only: settings.cookie.http_only,
        },
    )
}
