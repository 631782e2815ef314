//! Self-contained HTML rendering of a transcript.
//!
//! The output carries its own stylesheet and no scripts or remote assets, so
//! it can be attached, stored, or served as-is.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use url::Url;

use super::{Document, Transcript, TranscriptMessage};
use crate::platform::Embed;

const STYLE: &str = r#"
body { background: #0b0713; color: #f2f2f2; font-family: system-ui, sans-serif; padding: 20px; }
.wrap { background: #150d24; border-radius: 16px; padding: 20px 28px; max-width: 900px; margin: 40px auto; }
h1 { color: #a877ff; text-align: center; }
.meta { color: #cfcfcf; line-height: 1.5; }
.msg { background: #1d1233; border: 1px solid #8000ff55; border-radius: 10px; margin: 10px 0; padding: 8px 12px; }
.author { color: #a877ff; font-weight: bold; }
.time { color: #aaa; font-size: 13px; margin-left: 6px; }
.content { margin-top: 5px; white-space: pre-wrap; word-wrap: break-word; }
.empty { color: #888; font-style: italic; }
.attachments { margin-top: 6px; font-size: 14px; }
.attachments a { color: #8ab4ff; }
.embed { margin-top: 6px; border-left: 4px solid #8000ff; padding: 4px 10px; background: #120a20; }
.embed-title { font-weight: bold; }
.embed-footer { color: #aaa; font-size: 12px; margin-top: 4px; }
footer { opacity: .6; text-align: center; margin-top: 30px; }
"#;

/// Escape text for inclusion in HTML element content or quoted attributes.
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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

fn format_time(ts: DateTime<Utc>, tz: Tz) -> String {
    ts.with_timezone(&tz)
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string()
}

/// Only http(s) URLs become links; anything else is shown as text.
fn safe_link(raw: &str) -> Option<String> {
    Url::parse(raw)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| u.to_string())
}

/// File name for the rendered transcript of a channel.
#[must_use]
pub fn transcript_filename(channel_name: &str) -> String {
    let slug: String = channel_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "transcript.html".to_string()
    } else {
        format!("transcript-{slug}.html")
    }
}

fn render_embed(out: &mut String, embed: &Embed) {
    let color = embed.color.unwrap_or(0x0080_00ff) & 0x00ff_ffff;
    let _ = write!(
        out,
        "<div class=\"embed\" style=\"border-left-color: #{color:06x}\">"
    );
    if let Some(title) = &embed.title {
        let _ = write!(out, "<div class=\"embed-title\">{}</div>", escape_html(title));
    }
    if let Some(description) = &embed.description {
        let _ = write!(out, "<div class=\"content\">{}</div>", escape_html(description));
    }
    if let Some(footer) = &embed.footer {
        let _ = write!(out, "<div class=\"embed-footer\">{}</div>", escape_html(footer));
    }
    out.push_str("</div>");
}

fn render_message(out: &mut String, message: &TranscriptMessage, tz: Tz) {
    let _ = write!(
        out,
        "<div class=\"msg\" id=\"m{}\"><div><span class=\"author\">{}</span><span class=\"time\">{}</span></div>",
        escape_html(&message.id),
        escape_html(&message.author),
        format_time(message.timestamp, tz)
    );

    if message.text.trim().is_empty() {
        out.push_str("<div class=\"content empty\">No text</div>");
    } else {
        let _ = write!(
            out,
            "<div class=\"content\">{}</div>",
            escape_html(&message.text)
        );
    }

    if !message.attachments.is_empty() {
        out.push_str("<div class=\"attachments\">📎 ");
        for (i, attachment) in message.attachments.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            match safe_link(&attachment.url) {
                Some(href) => {
                    let _ = write!(
                        out,
                        "<a href=\"{}\" rel=\"noopener noreferrer\">{}</a>",
                        escape_html(&href),
                        escape_html(&attachment.filename)
                    );
                }
                None => out.push_str(&escape_html(&attachment.filename)),
            }
        }
        out.push_str("</div>");
    }

    if let Some(embed) = &message.embed {
        render_embed(out, embed);
    }

    out.push_str("</div>\n");
}

/// Render a transcript to a standalone HTML document.
///
/// Output depends only on the transcript and the timezone, never on the
/// current clock.
#[must_use]
pub fn render(transcript: &Transcript, tz: Tz) -> Document {
    let header = &transcript.header;
    let mut html = String::with_capacity(4096 + transcript.messages.len() * 256);

    let _ = write!(
        html,
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\" />\n\
         <meta http-equiv=\"Content-Security-Policy\" content=\"default-src 'none'; style-src 'unsafe-inline'; img-src https: data:\" />\n\
         <title>{} - Ticket Transcript</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<div class=\"wrap\">\n\
         <h1>Ticket Transcript</h1>\n<p class=\"meta\">Server: {}<br>Channel: #{}<br>Opened by: {}<br>Closed by: {}<br>Closed at: {}<br>Messages: {}</p>\n<hr>\n",
        escape_html(&header.channel_name),
        escape_html(&header.guild_name),
        escape_html(&header.channel_name),
        escape_html(&header.owner),
        escape_html(&header.closer),
        format_time(transcript.closed_at, tz),
        transcript.messages.len()
    );

    for message in &transcript.messages {
        render_message(&mut html, message, tz);
    }

    html.push_str("<hr>\n<footer>Generated by ticketdesk</footer>\n</div>\n</body>\n</html>\n");

    Document {
        filename: transcript_filename(&header.channel_name),
        channel_name: header.channel_name.clone(),
        html,
    }
}
