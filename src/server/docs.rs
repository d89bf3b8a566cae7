//! Documentation page served at `GET /`.

use axum::response::Html;

use crate::provider::ProviderId;
use crate::request::{Mode, Model};

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>GPT API Gateway</title>
<style>
body { font-family: system-ui, sans-serif; max-width: 48rem; margin: 2rem auto; line-height: 1.5; }
code, pre { background: #f4f4f4; border-radius: 4px; }
pre { padding: 0.75rem; overflow-x: auto; }
</style>
</head>
<body>
<h1>GPT API Gateway</h1>
<p>Send a prompt to one of the aggregator's providers and receive the answer as JSON or as a server-sent event stream.</p>
<h2><code>POST /api/generate</code></h2>
<pre>{
  "prompt": "Explain ownership in Rust",
  "model": "gpt-3.5-turbo",
  "provider": "ChatGLM",
  "mode": "normal"
}</pre>
<p>Only <code>prompt</code> is required. Unknown values for the other fields fall back to their defaults.</p>
<h3>Normal mode</h3>
<pre>{"model": "...", "provider": "...", "mode": "normal", "response": "..."}</pre>
<h3>Streaming mode</h3>
<pre>data: {"chunk": "..."}

data: {"error": "..."}</pre>
<p>An <code>error</code> event is always the last event of its stream.</p>
"#;

const PAGE_TAIL: &str = r#"<h2>Other endpoints</h2>
<ul>
<li><code>GET /api/providers</code>: accepted values and defaults</li>
<li><code>GET /health</code>: liveness and uptime</li>
<li><code>GET /metrics</code>: Prometheus metrics</li>
</ul>
</body>
</html>
"#;

fn list_section(title: &str, items: impl Iterator<Item = &'static str>, default: &str) -> String {
    let mut html = format!("<h3>{title}</h3>\n<ul>\n");
    for item in items {
        if item == default {
            html.push_str(&format!("<li><code>{item}</code> (default)</li>\n"));
        } else {
            html.push_str(&format!("<li><code>{item}</code></li>\n"));
        }
    }
    html.push_str("</ul>\n");
    html
}

/// Render the page. Accepted values come from the same enums the validator uses.
pub fn render_index() -> String {
    let mut page = String::from(PAGE_HEAD);
    page.push_str("<h2>Accepted values</h2>\n");
    page.push_str(&list_section(
        "Models",
        Model::ALL.iter().map(|m| m.as_str()),
        Model::default().as_str(),
    ));
    page.push_str(&list_section(
        "Providers",
        ProviderId::ALL.iter().map(|p| p.as_str()),
        ProviderId::default().as_str(),
    ));
    page.push_str(&list_section(
        "Modes",
        Mode::ALL.iter().map(|m| m.as_str()),
        Mode::default().as_str(),
    ));
    page.push_str(PAGE_TAIL);
    page
}

pub async fn index() -> Html<String> {
    Html(render_index())
}
