//! HTML rendering of the consultation dashboard and error pages

use consult_core::Figure;
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};
use std::fmt::Write as _;

use crate::pipeline::Consultation;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

const AI_WARNING: &str = "This recommendation was generated by a large language model from \
the patient record and public environmental data. It may be incomplete or wrong and must be \
reviewed by a qualified clinician before it informs any care decision.";

const STYLE: &str = r##"
  * { margin: 0; padding: 0; box-sizing: border-box; }
  body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
         background: #f5f5f5; color: #333; line-height: 1.6; }
  .header { background: #1f4e5f; color: #fff; padding: 20px 32px; }
  .header h1 { font-size: 24px; font-weight: 600; }
  .header .sub { color: #b7d3dc; font-size: 14px; margin-top: 4px; }
  .container { max-width: 1100px; margin: 24px auto; padding: 0 16px; }
  .card { background: #fff; border-radius: 8px; padding: 20px; margin-bottom: 16px;
          box-shadow: 0 1px 3px rgba(0,0,0,0.1); }
  .card h2 { font-size: 18px; margin-bottom: 12px; color: #1f4e5f; }
  .warning { background: #fff4e5; border-left: 4px solid #e67e22; padding: 12px 16px;
             margin-bottom: 16px; border-radius: 4px; font-size: 14px; }
  .demographics { display: flex; gap: 32px; flex-wrap: wrap; }
  .demographics div span { display: block; font-size: 12px; color: #7f8c8d; }
  table { width: 100%; border-collapse: collapse; font-size: 14px; }
  th, td { text-align: left; padding: 6px 8px; border-bottom: 1px solid #ecf0f1; }
  th { color: #7f8c8d; font-weight: 600; }
  .empty { color: #95a5a6; font-style: italic; }
  iframe { width: 100%; height: 360px; border: 0; border-radius: 4px; margin-top: 8px; }
  .chart { width: 100%; height: 420px; }
  .recommendation { font-size: 14px; }
  .recommendation p, .recommendation ul, .recommendation ol { margin-bottom: 8px; }
  .recommendation ul, .recommendation ol { padding-left: 24px; }
  .model { color: #95a5a6; font-size: 12px; margin-top: 8px; }
"##;

/// Escape text for HTML element content and quoted attribute values
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Link targets that would run script in the page
fn is_unsafe_url(url: &str) -> bool {
    let scheme = url.trim_start().to_ascii_lowercase();
    ["javascript:", "vbscript:", "data:"]
        .iter()
        .any(|prefix| scheme.starts_with(prefix))
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    if is_unsafe_url(&url) {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

/// Render model output written in Markdown. Raw HTML in the input is shown
/// as text, never passed through.
pub fn render_markdown(input: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let events = Parser::new_ext(input, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        other => other,
    });
    let mut out = String::with_capacity(input.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

/// Figure JSON safe to place inside a `<script>` element
fn figure_json(figure: &Figure) -> String {
    serde_json::to_string(figure)
        .unwrap_or_else(|e| {
            tracing::error!("Failed to serialize chart: {}", e);
            "{\"data\":[],\"layout\":{}}".to_string()
        })
        .replace("</", "<\\/")
}

fn document(title: &str, body: &str, scripts: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<link rel="icon" href="data:,">
<title>{title}</title>
<style>{style}</style>
{scripts}
</head>
<body>
<div class="header">
  <h1>Climate Consult</h1>
  <div class="sub">Environmental health consultation for the launched patient</div>
</div>
<div class="container">
{body}
</div>
</body>
</html>
"##,
        title = escape_html(title),
        style = STYLE,
        scripts = scripts,
        body = body,
    )
}

fn table<T>(headers: &[&str], rows: &[T], columns: impl Fn(&T) -> Vec<String>) -> String {
    if rows.is_empty() {
        return "<p class=\"empty\">None recorded</p>".to_string();
    }
    let mut html = String::from("<table><thead><tr>");
    for header in headers {
        let _ = write!(html, "<th>{}</th>", escape_html(header));
    }
    html.push_str("</tr></thead><tbody>");
    for row in rows {
        html.push_str("<tr>");
        for cell in columns(row) {
            let _ = write!(html, "<td>{}</td>", escape_html(&cell));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

/// The consultation dashboard
pub fn render_consultation(consultation: &Consultation) -> String {
    let demographics = &consultation.demographics;
    let history = &consultation.history;

    let conditions = table(
        &["Condition", "Clinical status", "Verification status"],
        &history.conditions,
        |c| {
            vec![
                c.name.to_string(),
                c.clinical_status.clone(),
                c.verification_status.clone(),
            ]
        },
    );
    let encounters = table(&["Encounter", "Status"], &history.encounters, |e| {
        vec![e.description.to_string(), e.status.clone()]
    });
    let medications = table(
        &["Medication", "Status"],
        &history.medication_administrations,
        |m| vec![m.name.to_string(), m.status.clone()],
    );

    let body = format!(
        r##"<div class="warning"><strong>AI-generated content.</strong> {warning}</div>
<div class="card">
  <h2>Patient</h2>
  <div class="demographics">
    <div><span>Name</span>{name}</div>
    <div><span>Birth date</span>{birth_date}</div>
    <div><span>Sex</span>{sex}</div>
  </div>
</div>
<div class="card"><h2>Conditions</h2>{conditions}</div>
<div class="card"><h2>Encounters</h2>{encounters}</div>
<div class="card"><h2>Medication Administrations</h2>{medications}</div>
<div class="card">
  <h2>Location</h2>
  <div>{address}</div>
  <iframe src="{map_url}" loading="lazy" referrerpolicy="no-referrer-when-downgrade" allowfullscreen></iframe>
</div>
<div class="card"><h2>Air Quality</h2><div id="aqi-chart" class="chart"></div></div>
<div class="card"><h2>Temperature</h2><div id="temperature-chart" class="chart"></div></div>
<div class="card">
  <h2>Consultation</h2>
  <div class="recommendation">{recommendation}</div>
  <div class="model">Generated {generated_at} by {model}</div>
</div>
<script>
  Plotly.newPlot("aqi-chart", {aqi});
  Plotly.newPlot("temperature-chart", {temperature});
</script>"##,
        warning = escape_html(AI_WARNING),
        name = escape_html(&demographics.name),
        birth_date = escape_html(&demographics.birth_date_display()),
        sex = escape_html(demographics.sex.as_str()),
        conditions = conditions,
        encounters = encounters,
        medications = medications,
        address = escape_html(&demographics.address),
        map_url = escape_html(&consultation.map_url),
        recommendation = render_markdown(&consultation.recommendation),
        generated_at = consultation.generated_at,
        model = escape_html(&consultation.model),
        aqi = figure_json(&consultation.aqi_chart),
        temperature = figure_json(&consultation.temperature_chart),
    );

    let scripts = format!(r#"<script src="{}" charset="utf-8"></script>"#, PLOTLY_CDN);
    document("Climate Consult", &body, &scripts)
}

/// Error page with a title and a user-facing message
pub fn render_error(title: &str, message: &str, relaunch: bool) -> String {
    let action = if relaunch {
        r#"<p><a href="/launch">Launch again</a></p>"#
    } else {
        ""
    };
    let body = format!(
        r#"<div class="card"><h2>{}</h2><p>{}</p>{}</div>"#,
        escape_html(title),
        escape_html(message),
        action
    );
    document(title, &body, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_error_page_escapes_message() {
        let html = render_error("Launch required", "<script>alert(1)</script>", true);
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>alert(1)"));
        assert!(html.contains(r#"href="/launch""#));
    }

    #[test]
    fn test_markdown_recommendation() {
        let html = render_markdown(
            "**Stay indoors** when smoky.\n\n- Use a HEPA filter\n- Keep an inhaler nearby",
        );
        assert!(html.contains("<strong>Stay indoors</strong>"));
        assert!(html.contains("<li>Use a HEPA filter</li>"));
        assert!(!html.contains("**"));
    }

    #[test]
    fn test_markdown_drops_raw_html_and_script_links() {
        let html = render_markdown(
            "<script>alert(1)</script>\n\nSee <b>this</b> and [that](javascript:alert(2)).",
        );
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<b>"));
        assert!(html.contains("&lt;b&gt;"));
        assert!(!html.contains("javascript:"));
        assert!(html.contains(r##"<a href="#">that</a>"##));
    }

    #[test]
    fn test_empty_table_placeholder() {
        let rows: Vec<String> = Vec::new();
        let html = table(&["Condition"], &rows, |r| vec![r.clone()]);
        assert!(html.contains("None recorded"));
    }
}
