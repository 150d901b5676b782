//! HTML fragments for the browser form flow

use crate::registry::StartOutcome;

/// Landing page with the restream form
pub const INDEX: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>HLS restream</title>
</head>
<body>
  <h1>HLS restream</h1>
  <form method="post" action="/restream">
    <input type="url" name="inputUrl" placeholder="https://example.com/live.m3u8" size="60" required>
    <button type="submit">Restream</button>
  </form>
  <p><a href="/status">Status</a></p>
</body>
</html>
"#;

/// Escape text for inclusion in HTML content or attribute values
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Fragment shown after a successful start
pub fn started(outcome: &StartOutcome) -> String {
    let source = escape(&outcome.url);
    let local = escape(&outcome.output);
    let heading = if outcome.already_running {
        "Restream already running"
    } else {
        "Restream started"
    };

    format!(
        r#"<h2>{heading}</h2>
<p>Source: <a href="{source}" target="_blank">{source}</a></p>
<p>Local stream: <a href="{local}" target="_blank">{local}</a></p>
<video src="{local}" controls autoplay style="width: 600px; height: 340px;"></video>
<br><br>
<a href="/">Back</a>
"#
    )
}

/// Fragment shown when the URL was refused
pub fn rejected(reason: &str) -> String {
    format!(
        "<p>Invalid URL: {}. It must start with http(s) and end in .m3u8 or .ts</p>\n<a href=\"/\">Back</a>\n",
        escape(reason)
    )
}

/// Fragment shown when the transcoder could not be started
pub fn failed(reason: &str) -> String {
    format!(
        "<p>Restream failed: {}</p>\n<a href=\"/\">Back</a>\n",
        escape(reason)
    )
}
