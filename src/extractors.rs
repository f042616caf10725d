use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use axum_extra::extract::CookieJar;

use crate::{db::models::AuthUser, names, rejections::AppError, AppState};

/// Extracts the locale from the `lang` cookie, falling back to the browser's
/// `Accept-Language` header, then to `"pt-BR"`.
pub struct Locale(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Locale {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let locale = jar
            .get(names::LOCALE_COOKIE_NAME)
            .and_then(|c| match_supported_locale(c.value()))
            .or_else(|| {
                parts
                    .headers
                    .get(header::ACCEPT_LANGUAGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(locale_from_accept_language)
            })
            .unwrap_or(names::DEFAULT_LOCALE);
        Ok(Locale(locale.to_string()))
    }
}

/// Match a language tag against supported locales, returning the locale string.
fn match_supported_locale(lang: &str) -> Option<&'static str> {
    let lang = lang.to_ascii_lowercase();
    if lang == "pt" || lang.starts_with("pt-") {
        return Some("pt-BR");
    }
    if lang == "en" || lang.starts_with("en-") {
        return Some("en");
    }
    None
}

/// Parse an `Accept-Language` header and return the best matching supported locale.
fn locale_from_accept_language(header: &str) -> Option<&'static str> {
    let mut entries: Vec<(&str, f32)> = header
        .split(',')
        .map(|entry| {
            let entry = entry.trim();
            if let Some((lang, params)) = entry.split_once(';') {
                let q = params
                    .split(';')
                    .find_map(|p| p.trim().strip_prefix("q="))
                    .and_then(|v| v.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                (lang.trim(), q)
            } else {
                (entry, 1.0)
            }
        })
        .collect();
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    entries
        .iter()
        .find_map(|(lang, _)| match_supported_locale(lang))
}

/// Guard extractor that resolves the `Authorization: Bearer <token>` header
/// against the issued tokens. Carries the authenticated user's info for use in
/// handlers.
pub struct AuthGuard(pub AuthUser);

impl FromRequestParts<AppState> for AuthGuard {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthorized)?;

        match state.db.get_user_by_token(token).await {
            Ok(Some(user)) => Ok(AuthGuard(user)),
            Ok(None) => Err(AppError::Unauthorized),
            Err(e) => {
                tracing::error!("failed to resolve bearer token: {e:?}");
                Err(AppError::Internal(format!("failed to resolve bearer token: {e:#}")))
            }
        }
    }
}

/// Like [`AuthGuard`], but only lets admins through.
pub struct AdminGuard(pub AuthUser);

impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthGuard(user) = AuthGuard::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!("user_id={} refused on an admin route", user.id);
            return Err(AppError::Forbidden("errors.admin_only"));
        }
        Ok(AdminGuard(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_language_prefers_highest_quality() {
        assert_eq!(
            locale_from_accept_language("fr;q=0.9, en;q=0.5, pt-PT;q=0.8"),
            Some("pt-BR")
        );
        assert_eq!(locale_from_accept_language("en-US,en;q=0.9"), Some("en"));
    }

    #[test]
    fn unsupported_languages_yield_none() {
        assert_eq!(locale_from_accept_language("de, fr;q=0.5"), None);
    }
}
