//! Full HTML documents around transcoded fragments.

use url::Url;

use crate::transcode::html::escape_html;

const STYLE: &str = "body{max-width:42rem;margin:1rem auto;padding:0 1rem;font-family:sans-serif;line-height:1.5}\
pre{overflow-x:auto;background:#f4f4f4;padding:.5rem}\
blockquote{border-left:3px solid #ccc;margin-left:0;padding-left:1rem;font-style:italic}\
p.link{margin:.25rem 0}a.gemini::after{content:\" \\2192\"}\
header,footer{font-size:.9rem;color:#555}";

/// Everything the page wrapper needs besides the transcoded body.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub site_title: &'a str,
    pub title: &'a str,
    /// Already-rendered HTML fragment.
    pub body: &'a str,
    /// Address of the same page over the native protocol.
    pub gemini_url: Option<&'a Url>,
    /// The page was fetched through the gateway.
    pub proxied: bool,
}

/// Wrap a transcoded fragment into a complete HTML document.
pub fn render_page(ctx: &PageContext<'_>) -> String {
    let mut footer = String::new();
    if let Some(url) = ctx.gemini_url {
        let url = escape_html(url.as_str());
        if ctx.proxied {
            footer = format!(
                r#"<p>Proxied content from <a href="{0}" class="gemini">{0}</a></p>"#,
                url
            );
        } else {
            footer = format!(r#"<p>View on Gemini: <a href="{0}" class="gemini">{0}</a></p>"#, url);
        }
    }
    document(ctx.site_title, ctx.title, ctx.body, &footer)
}

/// Error page shown for every non-success HTTP response.
pub fn render_error_page(site_title: &str, status: u16, reason: &str, message: &str) -> String {
    let body = format!(
        "<h1>{} {}</h1>\n<p>{}</p>\n",
        status,
        escape_html(reason),
        escape_html(message)
    );
    document(site_title, reason, &body, "")
}

/// Page announcing a redirect to a destination outside the native protocol.
pub fn render_interstitial(site_title: &str, destination: &Url) -> String {
    let href = escape_html(destination.as_str());
    let body = format!(
        "<h1>External redirect</h1>\n<p>This page is redirecting you to <a href=\"{0}\">{0}</a></p>\n",
        href
    );
    document(site_title, "External redirect", &body, "")
}

fn document(site_title: &str, title: &str, body: &str, footer: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>{style}</style>\n</head>\n<body>\n\
         <header><a href=\"/\">{site}</a></header>\n<main>\n{body}</main>\n\
         <footer>{footer}</footer>\n</body>\n</html>\n",
        title = escape_html(title),
        style = STYLE,
        site = escape_html(site_title),
        body = body,
        footer = footer,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_escapes_title_and_links_original() {
        let url = Url::parse("gemini://alice.example/notes.gmi").unwrap();
        let html = render_page(&PageContext {
            site_title: "Site",
            title: "<Notes>",
            body: "<p>x</p>\n",
            gemini_url: Some(&url),
            proxied: false,
        });
        assert!(html.contains("<title>&lt;Notes&gt;</title>"));
        assert!(html.contains("<main>\n<p>x</p>\n</main>"));
        assert!(html.contains("View on Gemini"));
        assert!(html.contains(r#"href="gemini://alice.example/notes.gmi""#));
    }

    #[test]
    fn proxied_footer() {
        let url = Url::parse("gemini://b.example/").unwrap();
        let html = render_page(&PageContext {
            site_title: "Site",
            title: "t",
            body: "",
            gemini_url: Some(&url),
            proxied: true,
        });
        assert!(html.contains("Proxied content from"));
    }

    #[test]
    fn error_page_escapes_message() {
        let html = render_error_page("Site", 503, "Service Unavailable", "returned 41: <down>");
        assert!(html.contains("<h1>503 Service Unavailable</h1>"));
        assert!(html.contains("returned 41: &lt;down&gt;"));
    }

    #[test]
    fn interstitial_names_destination() {
        let url = Url::parse("https://web.example/page").unwrap();
        let html = render_interstitial("Site", &url);
        assert!(html.contains("This page is redirecting you to"));
        assert!(html.contains(r#"<a href="https://web.example/page">"#));
    }
}
