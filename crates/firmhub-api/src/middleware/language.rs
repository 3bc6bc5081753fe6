//! Request language negotiation
//!
//! `?lang=` wins over `Accept-Language`, which wins over the configured default. The
//! chosen language is stored in the request extensions and echoed in `Content-Language`.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use firmhub_core::Language;
use std::convert::Infallible;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLanguage(pub Language);

fn query_lang(query: Option<&str>) -> Option<&str> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "lang")
        .map(|(_, value)| value)
}

fn negotiate(query: Option<&str>, headers: &HeaderMap, default: Language) -> Language {
    let accept = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok());
    Language::negotiate(query_lang(query), accept, default)
}

pub async fn language_middleware(
    State(default): State<Language>,
    mut request: Request,
    next: Next,
) -> Response {
    let lang = negotiate(request.uri().query(), request.headers(), default);
    request.extensions_mut().insert(RequestLanguage(lang));

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CONTENT_LANGUAGE, HeaderValue::from_static(lang.code()));
    response
}

// Falls back to negotiating from the parts when the middleware did not run.
impl<S> FromRequestParts<S> for RequestLanguage
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(lang) = parts.extensions.get::<RequestLanguage>() {
            return Ok(*lang);
        }
        Ok(RequestLanguage(negotiate(
            parts.uri.query(),
            &parts.headers,
            Language::default(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn echo(RequestLanguage(lang): RequestLanguage) -> &'static str {
        lang.code()
    }

    fn app() -> Router {
        Router::new()
            .route("/", get(echo))
            .layer(middleware::from_fn_with_state(Language::En, language_middleware))
    }

    #[test]
    fn test_query_lang_parsing() {
        assert_eq!(query_lang(Some("a=1&lang=fr")), Some("fr"));
        assert_eq!(query_lang(Some("language=fr")), None);
        assert_eq!(query_lang(None), None);
    }

    #[tokio::test]
    async fn test_query_overrides_header() {
        let response = app()
            .oneshot(
                HttpRequest::get("/?lang=de")
                    .header("accept-language", "fr-CH, fr;q=0.9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers().get("content-language").unwrap(), "de");
    }

    #[tokio::test]
    async fn test_accept_language_then_default() {
        let response = app()
            .oneshot(
                HttpRequest::get("/")
                    .header("accept-language", "fr-CH, en;q=0.5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers().get("content-language").unwrap(), "fr");

        let response = app()
            .oneshot(HttpRequest::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers().get("content-language").unwrap(), "en");
    }
}
