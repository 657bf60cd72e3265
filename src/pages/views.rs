//! Server-rendered HTML. Every piece of user-supplied text goes through [`escape`].

use std::fmt::Write;

use time::format_description::well_known::Rfc3339;

use crate::analysis::repo_types::AnalysisRecord;
use crate::auth::session::Flash;
use crate::uploads::{ALLOWED_EXTENSIONS, UPLOAD_URL_PREFIX};

pub const MODEL_CLASSES: [&str; 14] = [
    "Arnold Chiari malformation",
    "Arachnoid cyst",
    "Cerebellar hypoplasia",
    "Cisterna magna",
    "Colpocephaly",
    "Encephalocele",
    "Holoprosencephaly",
    "Hydranencephaly",
    "Intracranial hemorrhage",
    "Intracranial tumor",
    "Mild ventriculomegaly",
    "Moderate ventriculomegaly",
    "Porencephaly",
    "Severe ventriculomegaly",
];
pub const MODEL_TYPE: &str = "YOLOv5";
pub const MODEL_ACCURACY: &str = "95.5%";
pub const MODEL_TRAINING_IMAGES: &str = "10,000+";
pub const MODEL_LAST_UPDATED: &str = "2024";

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, username: Option<&str>, flashes: &[Flash], body: &str) -> String {
    let nav = match username {
        Some(name) => format!(
            r#"<span>Signed in as <strong>{}</strong></span>
<a href="/dashboard">Dashboard</a> <a href="/history">History</a> <a href="/about">About</a> <a href="/logout">Logout</a>"#,
            escape(name)
        ),
        None => r#"<a href="/">Home</a> <a href="/about">About</a>"#.to_string(),
    };
    let mut notices = String::new();
    for flash in flashes {
        let _ = writeln!(
            notices,
            r#"<div class="flash flash-{}">{}</div>"#,
            flash.kind.as_str(),
            escape(&flash.message)
        );
    }
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{title} · Fetal Brain Abnormality Detection</title></head>
<body>
<nav>{nav}</nav>
{notices}<main>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
    )
}

fn analyses_table(rows: &[AnalysisRecord]) -> String {
    if rows.is_empty() {
        return r#"<p class="empty">No analyses yet.</p>"#.to_string();
    }
    let mut html = String::from(
        "<table>\n<tr><th>Image</th><th>Result</th><th>Confidence</th><th>Date</th></tr>\n",
    );
    for row in rows {
        let when = row
            .analysis_timestamp
            .format(&Rfc3339)
            .unwrap_or_default();
        let confidence = row
            .confidence_score
            .map(|c| format!("{:.1}%", c * 100.0))
            .unwrap_or_else(|| "-".into());
        let _ = writeln!(
            html,
            r#"<tr><td><a href="{}/{}">{}</a></td><td>{}</td><td>{}</td><td>{}</td></tr>"#,
            UPLOAD_URL_PREFIX,
            escape(&row.image_filename),
            escape(&row.original_filename),
            escape(row.detected_abnormality.as_deref().unwrap_or("-")),
            confidence,
            when,
        );
    }
    html.push_str("</table>");
    html
}

pub fn index(username: Option<&str>, flashes: &[Flash]) -> String {
    let body = match username {
        Some(name) => format!(
            r#"<h1>Welcome back, {}</h1><p><a href="/dashboard">Go to your dashboard</a></p>"#,
            escape(name)
        ),
        None => r#"<h1>Fetal Brain Abnormality Detection</h1>
<section>
<h2>Login</h2>
<form method="post" action="/login">
<input name="username" placeholder="Username" required>
<input name="password" type="password" placeholder="Password" required>
<button type="submit">Login</button>
</form>
</section>
<section>
<h2>Register</h2>
<form method="post" action="/register">
<input name="username" placeholder="Username" required>
<input name="email" type="email" placeholder="Email" required>
<input name="password" type="password" placeholder="Password" required>
<input name="mobile" placeholder="Mobile (optional)">
<button type="submit">Register</button>
</form>
</section>"#
            .to_string(),
    };
    layout("Welcome", username, flashes, &body)
}

pub fn dashboard(username: &str, flashes: &[Flash], recent: &[AnalysisRecord]) -> String {
    let accept = ALLOWED_EXTENSIONS
        .iter()
        .map(|e| format!(".{e}"))
        .collect::<Vec<_>>()
        .join(",");
    let body = format!(
        r#"<h1>Dashboard</h1>
<section>
<h2>Analyze an ultrasound image</h2>
<form id="upload-form">
<input type="file" name="file" accept="{accept}" required>
<button type="submit">Analyze</button>
</form>
<div id="upload-result"></div>
</section>
<section>
<h2>Recent analyses</h2>
{table}
<p><a href="/history">View full history</a></p>
</section>
<script>
document.getElementById("upload-form").addEventListener("submit", async (ev) => {{
  ev.preventDefault();
  const out = document.getElementById("upload-result");
  out.textContent = "Analyzing...";
  const res = await fetch("/upload", {{ method: "POST", body: new FormData(ev.target) }});
  const data = await res.json();
  if (!res.ok) {{ out.textContent = data.error; return; }}
  const r = data.results;
  out.textContent = r.original_filename + ": " + r.detected_abnormality +
    " (" + (r.confidence_score * 100).toFixed(1) + "%)";
  const img = document.createElement("img");
  img.src = r.result_image_url || r.original_image_url;
  img.width = 320;
  out.appendChild(img);
}});
</script>"#,
        table = analyses_table(recent),
    );
    layout("Dashboard", Some(username), flashes, &body)
}

pub fn history(username: &str, flashes: &[Flash], analyses: &[AnalysisRecord]) -> String {
    let body = format!("<h1>Analysis history</h1>\n{}", analyses_table(analyses));
    layout("History", Some(username), flashes, &body)
}

pub fn about(username: Option<&str>) -> String {
    let classes: String = MODEL_CLASSES
        .iter()
        .map(|c| format!("<li>{c}</li>"))
        .collect();
    let body = format!(
        r#"<h1>About the model</h1>
<dl>
<dt>Model</dt><dd>{MODEL_TYPE}</dd>
<dt>Accuracy</dt><dd>{MODEL_ACCURACY}</dd>
<dt>Training images</dt><dd>{MODEL_TRAINING_IMAGES}</dd>
<dt>Last updated</dt><dd>{MODEL_LAST_UPDATED}</dd>
</dl>
<h2>Detected conditions</h2>
<ul>{classes}</ul>"#
    );
    layout("About", username, &[], &body)
}

pub fn error_page(message: &str) -> String {
    layout(
        "Error",
        None,
        &[],
        &format!("<h1>Something went wrong</h1><p>{}</p>", escape(message)),
    )
}
