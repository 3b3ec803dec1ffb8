//! Link target resolution for rendered anchors.

use url::Url;

use crate::gemini::{gateway_path, SCHEME};

/// Schemes that would execute in the context of the serving origin.
const SCRIPTING_SCHEMES: &[&str] = &["javascript", "vbscript", "data"];

/// What to do with links that point at the native protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeLinks {
    /// Emit `gemini://` addresses as they are.
    Keep,
    /// Rewrite `gemini://host/path` into the gateway's `/host/path` space.
    ViaGateway,
}

/// A resolved anchor target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub href: String,
    /// The link points at the native protocol.
    pub native: bool,
}

/// Resolves gemtext link targets against a base address.
#[derive(Debug, Clone, Copy)]
pub struct LinkResolver<'a> {
    base: Option<&'a Url>,
    native: NativeLinks,
}

impl<'a> LinkResolver<'a> {
    /// Relative links stay relative; absolute links are kept.
    pub fn local() -> Self {
        Self { base: None, native: NativeLinks::Keep }
    }

    pub fn new(base: Option<&'a Url>, native: NativeLinks) -> Self {
        Self { base, native }
    }

    pub fn base(&self) -> Option<&'a Url> {
        self.base
    }

    pub fn resolve(&self, target: &str) -> ResolvedLink {
        if has_scripting_scheme(target) {
            return ResolvedLink { href: "#".to_string(), native: false };
        }
        if let Ok(absolute) = Url::parse(target) {
            return self.finish(absolute, Some(target));
        }

        let Some(base) = self.base else {
            return ResolvedLink { href: target.to_string(), native: false };
        };

        match base.join(target) {
            Ok(resolved) => self.finish(resolved, None),
            Err(e) => {
                tracing::debug!(target = %target, base = %base, error = %e, "Unresolvable link target");
                ResolvedLink { href: target.to_string(), native: false }
            }
        }
    }

    /// `original` is the untouched source text of an absolute target.
    fn finish(&self, url: Url, original: Option<&str>) -> ResolvedLink {
        let native = url.scheme() == SCHEME;
        if native && self.native == NativeLinks::ViaGateway {
            if let Some(path) = gateway_path(&url) {
                return ResolvedLink { href: path, native };
            }
        }
        let href = match original {
            Some(text) => text.to_string(),
            None => url.to_string(),
        };
        ResolvedLink { href, native }
    }
}

/// Browsers drop ASCII whitespace and control characters inside a scheme.
fn has_scripting_scheme(target: &str) -> bool {
    let Some((scheme, _)) = target.split_once(':') else {
        return false;
    };
    let scheme: String = scheme
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .collect();
    SCRIPTING_SCHEMES.iter().any(|s| scheme.eq_ignore_ascii_case(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_dot_segments() {
        let base = Url::parse("gemini://a.example/x/y").unwrap();
        let resolver = LinkResolver::new(Some(&base), NativeLinks::Keep);
        assert_eq!(
            resolver.resolve("../z"),
            ResolvedLink { href: "gemini://a.example/z".into(), native: true }
        );
    }

    #[test]
    fn absolute_targets_unmodified() {
        let base = Url::parse("gemini://a.example/").unwrap();
        let resolver = LinkResolver::new(Some(&base), NativeLinks::Keep);
        assert_eq!(
            resolver.resolve("https://Example.COM/a b"),
            ResolvedLink { href: "https://Example.COM/a b".into(), native: false }
        );
        assert!(resolver.resolve("gemini://b.example/").native);
    }

    #[test]
    fn gateway_rewrites_native_links_only() {
        let base = Url::parse("gemini://a.example/dir/page.gmi").unwrap();
        let resolver = LinkResolver::new(Some(&base), NativeLinks::ViaGateway);
        assert_eq!(resolver.resolve("other.gmi").href, "/a.example/dir/other.gmi");
        assert_eq!(resolver.resolve("gemini://b.example:1966/?x").href, "/b.example:1966/?x");
        assert_eq!(resolver.resolve("https://web.example/").href, "https://web.example/");
    }

    #[test]
    fn scripting_schemes_neutralized() {
        let resolver = LinkResolver::local();
        assert_eq!(resolver.resolve("javascript:alert(1)").href, "#");
        assert_eq!(resolver.resolve("JavaScript:alert(1)").href, "#");
        assert_eq!(resolver.resolve(" java\tscript:alert(1)").href, "#");
        assert_eq!(resolver.resolve("notes:javascript").href, "notes:javascript");
    }

    #[test]
    fn local_keeps_relative_links() {
        let resolver = LinkResolver::local();
        assert_eq!(
            resolver.resolve("posts/one.gmi"),
            ResolvedLink { href: "posts/one.gmi".into(), native: false }
        );
    }
}
