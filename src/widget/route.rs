use regex::Regex;

/// One entry of `hiddenRoutePatterns`.
///
/// A pattern containing `*` becomes a regex anchored over the whole route,
/// with each `*` expanded to `.*` and everything else matched literally.
/// Any other pattern matches when the route contains it as a substring.
#[derive(Debug, Clone)]
pub enum RoutePattern {
    Substring(String),
    Wildcard { source: String, regex: Regex },
}

impl RoutePattern {
    pub fn compile(raw: &str) -> Self {
        let source = raw.trim().to_string();
        if !source.contains('*') {
            return RoutePattern::Substring(source);
        }

        let body = source
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        match Regex::new(&format!("^{body}$")) {
            Ok(regex) => RoutePattern::Wildcard { source, regex },
            Err(e) => {
                tracing::warn!(pattern = %source, "invalid route pattern, using substring match: {e}");
                RoutePattern::Substring(source)
            }
        }
    }

    pub fn source(&self) -> &str {
        match self {
            RoutePattern::Substring(s) => s,
            RoutePattern::Wildcard { source, .. } => source,
        }
    }

    pub fn matches(&self, route: &str) -> bool {
        match self {
            RoutePattern::Substring(s) => route.contains(s.as_str()),
            RoutePattern::Wildcard { regex, .. } => regex.is_match(route),
        }
    }
}

impl PartialEq for RoutePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source() == other.source()
    }
}

impl Eq for RoutePattern {}
