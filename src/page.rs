use crate::conversation::Message;
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag};
use std::fmt::Write;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 48rem; margin: 0 auto; padding: 1rem; }
#transcript { display: flex; flex-direction: column; gap: .75rem; margin-bottom: 6rem; }
.msg { border-radius: .5rem; padding: .5rem .75rem; }
.msg .role { font-size: .75rem; font-weight: 600; text-transform: uppercase; opacity: .6; }
.msg.user { background: #eef2ff; }
.msg.assistant { background: #f4f4f5; }
.sources { font-size: .85rem; margin: .25rem 0 0; padding-left: 1.25rem; }
.error { background: #fee2e2; color: #991b1b; border-radius: .5rem; padding: .5rem .75rem; }
form { position: fixed; bottom: 0; left: 0; right: 0; display: flex; gap: .5rem;
       max-width: 48rem; margin: 0 auto; padding: 1rem; background: #fff; }
form input[name=prompt] { flex: 1; padding: .5rem; }
"#;

/// Full chat view: transcript, optional inline error, and the input form.
pub fn render_chat(title: &str, transcript: &[Message], error: Option<&str>) -> String {
    let mut body = String::new();
    let _ = write!(body, "<h1>{}</h1>\n<main id=\"transcript\">\n", escape(title));
    for m in transcript {
        render_message(&mut body, m);
    }
    if let Some(e) = error {
        render_error(&mut body, &format!("Error: {e}"));
    }
    body.push_str("</main>\n");
    body.push_str(concat!(
        "<form method=\"post\" action=\"/\">\n",
        "<input name=\"prompt\" placeholder=\"Ask me something...\" autocomplete=\"off\" autofocus>\n",
        "<button type=\"submit\">Send</button>\n",
        "</form>\n",
        "<script>window.scrollTo(0, document.body.scrollHeight);</script>\n",
    ));
    document(title, &body)
}

/// Startup failed: one message, no input.
pub fn render_halted(title: &str, message: &str) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "<h1>{}</h1>", escape(title));
    render_error(&mut body, message);
    document(title, &body)
}

fn document(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        escape(title)
    )
}

fn render_message(out: &mut String, m: &Message) {
    let role = m.role().as_str();
    let _ = write!(
        out,
        "<section class=\"msg {role}\">\n<div class=\"role\">{role}</div>\n{}",
        markdown_to_html(m.content())
    );
    if !m.sources().is_empty() {
        out.push_str("<ul class=\"sources\">\n");
        for src in m.sources() {
            let href = safe_url(CowStr::Borrowed(src.uri.as_str()));
            let _ = writeln!(
                out,
                "<li><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a></li>",
                escape(&href),
                escape(&src.title)
            );
        }
        out.push_str("</ul>\n");
    }
    out.push_str("</section>\n");
}

fn render_error(out: &mut String, message: &str) {
    let _ = writeln!(out, "<div class=\"error\" role=\"alert\">{}</div>", escape(message));
}

/// Markdown to HTML with raw HTML shown as text and script URLs dropped.
pub fn markdown_to_html(src: &str) -> String {
    let opts = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let events = Parser::new_ext(src, opts).map(|ev| match ev {
        Event::Html(s) | Event::InlineHtml(s) => Event::Text(s),
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

    let mut out = String::new();
    pulldown_cmark::html::push_html(&mut out, events);
    out
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let scheme = url.trim_start().to_ascii_lowercase();
    if ["javascript:", "vbscript:", "data:"]
        .iter()
        .any(|s| scheme.starts_with(s))
    {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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
