use crate::{
    models::{group_by_category, tree_rows, TreeRow},
    AppState,
};
use askama::Template;
use axum::{extract::State, response::IntoResponse};
use std::sync::Arc;

// ── Template structs ───────────────────────────────────────────────────────

#[derive(Template)]
#[template(
    ext = "html",
    source = r#"<!DOCTYPE html>
<html>
<head>
    <title>Go Links Service</title>
    <style>
        body { font-family: monospace, sans-serif; max-width: 800px; margin: 0 auto; padding: 20px; }
        h1 { color: #333; }
        pre { white-space: pre; line-height: 1.5; }
        a { text-decoration: none; color: #0066cc; }
        a:hover { text-decoration: underline; }
    </style>
</head>
<body>
    <h1>Go Links Service</h1>
    <p>Use this service by navigating to <code>{{ base_url }}/&lt;alias&gt;</code></p>
    <h2>Available Links</h2>
{% if rows.is_empty() %}
    <p>No links available. Add some using the CLI tool.</p>
{% else %}
<pre>
{% for row in rows -%}
{{ row.prefix }}{% match row.url %}{% when Some with (url) %}{{ row.text }} → <a href="{{ url }}">{{ url }}</a>{% when None %}{{ row.text }}{% endmatch %}
{% endfor -%}
</pre>
{% endif %}
</body>
</html>
"#
)]
struct IndexTemplate {
    base_url: String,
    rows: Vec<TreeRow>,
}

#[derive(Template)]
#[template(
    ext = "html",
    source = r#"<!DOCTYPE html>
<html>
<head>
    <title>Go Links Service - Info</title>
    <style>
        body { font-family: monospace, sans-serif; max-width: 800px; margin: 0 auto; padding: 20px; }
        h1, h2 { color: #333; }
        .stats { display: flex; gap: 20px; }
        .stat-box { flex: 1; padding: 15px; background: #f5f5f5; border-radius: 5px; text-align: center; }
        .stat-number { font-size: 24px; font-weight: bold; margin: 10px 0; }
    </style>
</head>
<body>
    <h1>Go Links Service - Info</h1>
    <div class="stats">
        <div class="stat-box">
            <div>Total Links</div>
            <div class="stat-number">{{ total }}</div>
        </div>
    </div>
    <h2>Service Information</h2>
    <ul>
        <li>Base URL: {{ base_url }}</li>
        <li>Storage: JSON File ({{ storage_path }})</li>
    </ul>
    <p><a href="/">Back to home</a></p>
</body>
</html>
"#
)]
struct InfoTemplate {
    total: usize,
    base_url: String,
    storage_path: String,
}

// ── Handlers ───────────────────────────────────────────────────────────────

/// GET /
/// Usage line plus every link, grouped by category.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let groups = group_by_category(state.store.list().await);

    IndexTemplate {
        base_url: state.config.base_url(),
        rows: tree_rows(&groups),
    }
}

/// GET /info
pub async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    InfoTemplate {
        total: state.store.list().await.len(),
        base_url: state.config.base_url(),
        storage_path: state.store.path().display().to_string(),
    }
}
