use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::debug;

use crate::infra::{
    app_state::AppState,
    cache::ContentKind,
    errors::{AppError, AppResult},
};

/// Redirect the site root to the visitor's language.
pub async fn locale_redirect_handler(headers: HeaderMap) -> Response {
    let prefers_chinese = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase().contains("zh"))
        .unwrap_or(false);
    let target = if prefers_chinese { "/cn/" } else { "/en/" };

    (StatusCode::FOUND, [(header::LOCATION, target)]).into_response()
}

pub async fn english_index_handler(State(state): State<AppState>) -> AppResult<Response> {
    serve_cached(&state, "en/index.html").await
}

pub async fn chinese_index_handler(State(state): State<AppState>) -> AppResult<Response> {
    serve_cached(&state, "cn/index.html").await
}

pub async fn healthz_handler() -> &'static str {
    "ok"
}

/// Serve any other path below the web root.
///
/// Index documents and pages go through the reload cache; media and other
/// assets are streamed from disk.
pub async fn served_file_handler(
    State(state): State<AppState>,
    request: Request,
) -> AppResult<Response> {
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return Err(AppError::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
        ));
    }

    let relative = {
        let raw_path = request.uri().path();
        let decoded = urlencoding::decode(raw_path)
            .map_err(|_| AppError::bad_request("Malformed path"))?;
        match sanitize_relative_path(&decoded) {
            Some(relative) => relative,
            None => {
                debug!(path = %raw_path, "rejected request path");
                return Err(AppError::bad_request("Invalid path"));
            }
        }
    };

    match ContentKind::from_path(&relative) {
        ContentKind::Json | ContentKind::Html => serve_cached(&state, &relative).await,
        ContentKind::Binary => {
            let response = ServeDir::new(state.config.web_root())
                .oneshot(request)
                .await
                .map(|response| response.map(Body::new));
            match response {
                Ok(response) => Ok(response),
                Err(never) => match never {},
            }
        }
    }
}

async fn serve_cached(state: &AppState, relative: &str) -> AppResult<Response> {
    let Some(file) = state.cache.get_or_load(relative).await? else {
        return Err(AppError::not_found(format!("{relative} not found")));
    };

    Ok((
        [(header::CONTENT_TYPE, file.content_kind.mime())],
        file.bytes,
    )
        .into_response())
}

/// Turn a decoded request path into a key under the web root.
///
/// Returns `None` for anything that could leave the root: parent or
/// current-directory segments, backslashes, empty segments and drive
/// prefixes. A trailing slash addresses the directory's `index.html`.
pub fn sanitize_relative_path(path: &str) -> Option<String> {
    if path.contains('\\') || path.contains('\0') {
        return None;
    }

    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() || trimmed.starts_with('/') {
        return None;
    }

    let mut relative = trimmed.to_string();
    if relative.ends_with('/') {
        relative.push_str("index.html");
    }

    let valid = relative.split('/').all(|segment| {
        !segment.is_empty() && segment != "." && segment != ".." && !segment.contains(':')
    });
    valid.then_some(relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_paths() {
        assert_eq!(
            sanitize_relative_path("/multimedia/music/db.json").as_deref(),
            Some("multimedia/music/db.json")
        );
        assert_eq!(
            sanitize_relative_path("/multimedia/").as_deref(),
            Some("multimedia/index.html")
        );
    }

    #[test]
    fn rejects_escapes() {
        for path in [
            "/../secret.json",
            "/a/../../b.html",
            "/a\\b.json",
            "//etc/passwd",
            "/a//b.json",
            "/./db.json",
            "/C:/windows.html",
            "/",
        ] {
            assert!(sanitize_relative_path(path).is_none(), "{path}");
        }
    }

    #[tokio::test]
    async fn redirect_follows_accept_language() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9".parse().unwrap());
        let response = locale_redirect_handler(headers).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/cn/");

        let response = locale_redirect_handler(HeaderMap::new()).await;
        assert_eq!(response.headers()[header::LOCATION], "/en/");
    }
}
