use crate::widget::DeviceClass;

/// What the host page tells the widget about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContext {
    pub url: String,
    pub referrer: String,
    pub user_agent: String,
}

impl PageContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = referrer.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// The path component of the page URL. Relative or unparseable URLs are
    /// used as-is, minus any query or fragment.
    pub fn route(&self) -> String {
        match url::Url::parse(&self.url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => self
                .url
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }

    pub fn device_class(&self) -> DeviceClass {
        DeviceClass::classify(&self.user_agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_from_absolute_url() {
        let page = PageContext::new("https://example.com/projects/42?ref=nav#top");
        assert_eq!(page.route(), "/projects/42");
    }

    #[test]
    fn route_from_relative_url() {
        assert_eq!(PageContext::new("/admin/pages?x=1").route(), "/admin/pages");
        assert_eq!(PageContext::new("").route(), "");
    }
}
