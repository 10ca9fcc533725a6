//! Auth cookies
//!
//! Exactly two cookies carry auth state: `jwt` (access token) and
//! `refresh` (opaque secret). Both are set and cleared with identical
//! attributes, otherwise browsers keep the old cookie around.

use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use super::token::ACCESS_TTL_SECONDS;

pub const ACCESS_COOKIE: &str = "jwt";
pub const REFRESH_COOKIE: &str = "refresh";

/// Refresh cookie and session lifetime: 90 days
pub const REFRESH_TTL_SECONDS: i64 = 90 * 24 * 60 * 60;

/// Non-empty value of a request cookie
pub fn cookie_value<'a>(jar: &'a CookieJar, name: &str) -> Option<&'a str> {
    jar.get(name)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty())
}

/// Attribute policy for both auth cookies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookiePolicy {
    /// Production: `Secure; SameSite=None` so the dashboard origin can send
    /// them cross-site. Otherwise `SameSite=Lax` over plain http.
    pub fn for_environment(production: bool) -> Self {
        if production {
            Self {
                secure: true,
                same_site: SameSite::None,
            }
        } else {
            Self {
                secure: false,
                same_site: SameSite::Lax,
            }
        }
    }

    fn build(&self, name: &'static str, value: String, max_age_seconds: i64) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .max_age(cookie::time::Duration::seconds(max_age_seconds))
            .build()
    }

    pub fn access_cookie(&self, token: String) -> Cookie<'static> {
        self.build(ACCESS_COOKIE, token, ACCESS_TTL_SECONDS)
    }

    pub fn refresh_cookie(&self, secret: String) -> Cookie<'static> {
        self.build(REFRESH_COOKIE, secret, REFRESH_TTL_SECONDS)
    }

    /// Write the access cookie
    pub fn set_access(&self, jar: CookieJar, token: String) -> CookieJar {
        jar.add(self.access_cookie(token))
    }

    /// Write both cookies
    pub fn set_all(&self, jar: CookieJar, token: String, secret: String) -> CookieJar {
        jar.add(self.refresh_cookie(secret))
            .add(self.access_cookie(token))
    }

    /// Emit clearing directives for both cookies
    ///
    /// Directives are emitted whether or not the request carried the
    /// cookies.
    pub fn clear_all(&self, jar: CookieJar) -> CookieJar {
        let mut access = self.access_cookie(String::new());
        access.make_removal();
        let mut refresh = self.refresh_cookie(String::new());
        refresh.make_removal();
        jar.add(access).add(refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_cookie_headers(jar: CookieJar) -> Vec<String> {
        use axum::response::IntoResponse;

        let response = jar.into_response();
        response
            .headers()
            .get_all(axum::http::header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok().map(ToString::to_string))
            .collect()
    }

    #[test]
    fn production_cookies_are_secure_and_cross_site() {
        let policy = CookiePolicy::for_environment(true);
        let cookie = policy.access_cookie("token".to_string());

        assert_eq!(cookie.name(), "jwt");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::seconds(3600)));
    }

    #[test]
    fn development_cookies_are_lax() {
        let policy = CookiePolicy::for_environment(false);
        let cookie = policy.refresh_cookie("secret".to_string());

        assert_eq!(cookie.name(), "refresh");
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(
            cookie.max_age(),
            Some(cookie::time::Duration::seconds(7_776_000))
        );
    }

    #[test]
    fn set_all_writes_both_cookies() {
        let policy = CookiePolicy::for_environment(false);
        let headers = set_cookie_headers(policy.set_all(
            CookieJar::new(),
            "token".to_string(),
            "secret".to_string(),
        ));

        assert_eq!(headers.len(), 2);
        assert!(headers.iter().any(|h| h.starts_with("jwt=token")));
        assert!(headers.iter().any(|h| h.starts_with("refresh=secret")));
        assert!(headers.iter().all(|h| h.contains("HttpOnly")));
    }

    #[test]
    fn clear_all_keeps_attributes_and_expires_both() {
        let policy = CookiePolicy::for_environment(true);
        let headers = set_cookie_headers(policy.clear_all(CookieJar::new()));

        assert_eq!(headers.len(), 2);
        for name in ["jwt=", "refresh="] {
            let header = headers
                .iter()
                .find(|h| h.starts_with(name))
                .unwrap_or_else(|| panic!("missing clearing directive for {name}"));
            assert!(header.starts_with(&format!("{name};")));
            assert!(header.contains("Max-Age=0"));
            assert!(header.contains("HttpOnly"));
            assert!(header.contains("Secure"));
            assert!(header.contains("SameSite=None"));
            assert!(header.contains("Path=/"));
        }
    }
}
