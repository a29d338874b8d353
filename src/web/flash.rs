// src/web/flash.rs
//! One-shot message carried across a redirect in a signed cookie.

use tower_cookies::{Cookie, Cookies, Key};

const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

pub fn set_flash(cookies: &Cookies, key: &Key, kind: FlashKind, message: &str) {
    let value = format!("{}:{}", kind.as_str(), urlencoding::encode(message));
    let mut cookie = Cookie::new(FLASH_COOKIE, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookies.signed(key).add(cookie);
}

/// Reads and clears the flash. A tampered or malformed cookie is dropped.
pub fn take_flash(cookies: &Cookies, key: &Key) -> Option<Flash> {
    let signed = cookies.signed(key);
    let cookie = signed.get(FLASH_COOKIE)?;
    let mut removal = Cookie::from(FLASH_COOKIE);
    removal.set_path("/");
    signed.remove(removal);
    parse_flash(cookie.value())
}

fn parse_flash(raw: &str) -> Option<Flash> {
    let (kind, message) = raw.split_once(':')?;
    let kind = match kind {
        "success" => FlashKind::Success,
        "error" => FlashKind::Error,
        _ => return None,
    };
    let message = urlencoding::decode(message).ok()?.into_owned();
    Some(Flash { kind, message })
}
