//! Digest mail bodies (HTML + plain text).

use mailsift_core::types::Report;

use crate::email::CLOUD_CID;

/// HTML body. References the inline cloud when `with_cloud` is set.
pub fn render_html(report: &Report, product: &str, with_cloud: bool) -> String {
    let mut html = String::with_capacity(1024);
    html.push_str("<!DOCTYPE html><html><body style=\"font-family:Helvetica,Arial,sans-serif;color:#1b1b1b\">");
    html.push_str(&format!("<h2>Hi {},</h2>", escape(&report.name)));
    html.push_str(&format!(
        "<p>Below is the summary and word cloud for: {}</p>",
        escape(&report.tags.join(", "))
    ));
    if !report.summary.is_empty() {
        html.push_str(&format!("<p>{}</p>", escape(&report.summary)));
    }
    if !report.message.is_empty() {
        html.push_str(&format!("<p><em>{}</em></p>", escape(&report.message)));
    }
    if with_cloud {
        html.push_str(&format!(
            "<p><img src=\"cid:{CLOUD_CID}\" alt=\"Word cloud\" style=\"max-width:100%\"></p>"
        ));
    }
    html.push_str("<p>If you have any questions, reply to this email.</p>");
    html.push_str(&format!("<p>Regards,<br>{}</p></body></html>", escape(product)));
    html
}

/// Plain-text alternative.
pub fn render_text(report: &Report, product: &str) -> String {
    let mut lines = vec![
        format!("Hi {},", report.name),
        String::new(),
        format!("Below is the summary for: {}", report.tags.join(", ")),
        String::new(),
    ];
    if !report.summary.is_empty() {
        lines.push(report.summary.clone());
        lines.push(String::new());
    }
    if !report.message.is_empty() {
        lines.push(report.message.clone());
        lines.push(String::new());
    }
    lines.push(format!("Regards,\n{product}"));
    lines.join("\n")
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
