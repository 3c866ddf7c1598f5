//! One-shot flash messages carried in a cookie.
//!
//! A message is set before a redirect and removed by the next page that
//! renders it.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

pub const FLASH_COOKIE_NAME: &str = "imagebed_flash";

/// Queue a message for the next rendered page.
pub fn set(jar: CookieJar, message: &str) -> CookieJar {
    let cookie = Cookie::build((FLASH_COOKIE_NAME, URL_SAFE_NO_PAD.encode(message)))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    jar.add(cookie)
}

/// Take the pending message, if any, and clear the cookie.
pub fn take(jar: CookieJar) -> (CookieJar, Option<String>) {
    let Some(cookie) = jar.get(FLASH_COOKIE_NAME) else {
        return (jar, None);
    };

    let message = URL_SAFE_NO_PAD
        .decode(cookie.value())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok());

    let removal = Cookie::build((FLASH_COOKIE_NAME, "")).path("/").build();
    (jar.remove(removal), message)
}
