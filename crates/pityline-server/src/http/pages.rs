use crate::error::AppError;
use crate::AppState;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use percent_encoding::percent_decode_str;
use pityline_model::{ArticleSummary, Section};
use std::collections::HashMap;

fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn html_page(title: &str, body: &str) -> Response {
    let html = format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{} - Pityline</title></head>\
<body>{}</body></html>",
        html_escape(title),
        body
    );
    let mut response = Response::new(Body::from(html));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        "content-type",
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

fn article_list_items(articles: &[ArticleSummary]) -> String {
    let mut list = String::new();
    for article in articles {
        list.push_str(&format!(
            "<li><a href=\"/articles/{}\">{}</a> <small>{}</small><p>{}</p></li>",
            html_escape(&article.slug),
            html_escape(&article.title),
            article.published_at.format("%Y-%m-%d"),
            html_escape(&article.summary),
        ));
    }
    if list.is_empty() {
        list.push_str("<li>Nothing published yet.</li>");
    }
    list
}

pub(crate) async fn home_handler(State(state): State<AppState>) -> Result<Response, AppError> {
    let articles = state
        .articles
        .list_articles(None, state.server.article_page_limit)
        .await?;
    let body = format!(
        "<h1>Pityline</h1>\
<p>News and guides for gacha games.</p>\
<nav><a href=\"/news\">News</a> | <a href=\"/guides\">Guides</a></nav>\
<h2>Latest</h2><ul>{}</ul>",
        article_list_items(&articles)
    );
    Ok(html_page("Home", &body))
}

async fn section_page(state: &AppState, section: Section) -> Result<Response, AppError> {
    let articles = state
        .articles
        .list_articles(Some(section), state.server.article_page_limit)
        .await?;
    let title = match section {
        Section::News => "News",
        Section::Guides => "Guides",
    };
    let body = format!(
        "<h1>{title}</h1><ul>{}</ul>",
        article_list_items(&articles)
    );
    Ok(html_page(title, &body))
}

pub(crate) async fn news_handler(State(state): State<AppState>) -> Result<Response, AppError> {
    section_page(&state, Section::News).await
}

pub(crate) async fn guides_handler(State(state): State<AppState>) -> Result<Response, AppError> {
    section_page(&state, Section::Guides).await
}

pub(crate) async fn article_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let article = state
        .articles
        .find_article(&slug)
        .await?
        .ok_or(AppError::NotFound)?;
    let body = format!(
        "<article><h1>{}</h1><p><small>{} - {}</small></p><div>{}</div></article>",
        html_escape(&article.title),
        article.section,
        article.published_at.format("%Y-%m-%d"),
        html_escape(&article.body),
    );
    Ok(html_page(&article.title, &body))
}

/// The page every gated request lands on while maintenance is active.
/// Reads through the settings cache like the gate does, so an enabled
/// message shows up within the cache TTL of the toggle.
pub(crate) async fn maintenance_handler(State(state): State<AppState>) -> Response {
    let settings = state
        .settings_cache
        .current(state.settings_store.as_ref())
        .await;
    let message = if settings.message.is_empty() {
        "We are performing scheduled maintenance.".to_string()
    } else {
        settings.message.clone()
    };
    let eta = settings
        .estimated_end_time
        .map(|t| {
            format!(
                "<p>Estimated to finish around {}.</p>",
                t.format("%Y-%m-%d %H:%M UTC")
            )
        })
        .unwrap_or_default();
    let body = format!(
        "<h1>Down for maintenance</h1><p>{}</p>{}",
        html_escape(&message),
        eta
    );
    html_page("Maintenance", &body)
}

pub(crate) async fn coming_soon_handler(
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let requested = params
        .get("page")
        .map(|raw| percent_decode_str(raw).decode_utf8_lossy().into_owned())
        .unwrap_or_default();
    let detail = if requested.is_empty() {
        String::new()
    } else {
        format!("<p><code>{}</code> is not live yet.</p>", html_escape(&requested))
    };
    let body = format!(
        "<h1>Coming soon</h1>{detail}<p>Check back after launch, or head to \
<a href=\"/news\">the news section</a>.</p>"
    );
    html_page("Coming soon", &body)
}
