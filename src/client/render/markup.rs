//! HTML markup for the two render modes.

use std::collections::HashSet;

use crate::widget::{deep_link, Agent, ConfigMode, WidgetConfiguration};

const WHATSAPP_ICON: &str = r#"<svg class="wa-icon" viewBox="0 0 24 24" aria-hidden="true"><path fill="currentColor" d="M12 2a10 10 0 0 0-8.6 15.1L2 22l5-1.3A10 10 0 1 0 12 2zm5.3 14.1c-.2.6-1.3 1.2-1.8 1.2-.5.1-1 .2-3.3-.7-2.8-1.1-4.6-4-4.7-4.2-.1-.2-1.1-1.5-1.1-2.9s.7-2.1 1-2.4c.3-.3.6-.3.8-.3h.6c.2 0 .4 0 .6.5l.9 2.1c.1.2.1.4 0 .5l-.3.5-.4.4c-.1.1-.3.3-.1.6.2.3.8 1.3 1.7 2.1 1.2 1 2.1 1.4 2.4 1.5.3.1.5.1.6-.1l.9-1c.2-.3.4-.2.6-.1l2 .9c.3.1.5.2.5.3.1.2.1.6-.1 1.3z"/></svg>"#;

const PLACEHOLDER_AVATAR: &str = r#"<span class="wa-avatar wa-avatar-placeholder" aria-hidden="true"><svg viewBox="0 0 24 24"><circle cx="12" cy="8" r="4" fill="currentColor"/><path fill="currentColor" d="M4 21c0-4.4 3.6-7 8-7s8 2.6 8 7z"/></svg></span>"#;

/// View state that changes while the widget is mounted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub tooltip_visible: bool,
    pub popup_open: bool,
    pub failed_avatars: HashSet<String>,
}

pub(crate) fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
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

/// Hex colours and plain colour names only; anything else falls back to the
/// default so a config value cannot break out of the style attribute.
fn safe_color(color: &str) -> &str {
    let c = color.trim();
    let hex = c.len() > 1
        && c.len() <= 9
        && c.starts_with('#')
        && c[1..].chars().all(|ch| ch.is_ascii_hexdigit());
    let named = !c.is_empty() && c.chars().all(|ch| ch.is_ascii_alphabetic());
    if hex || named {
        c
    } else {
        crate::widget::defaults::DEFAULT_BUTTON_COLOR
    }
}

/// Render the whole widget for the current state. `None` when the
/// configuration has nothing to show.
pub fn render(config: &WidgetConfiguration, state: &ViewState) -> Option<String> {
    let mode = config.mode.as_ref()?;
    let size = config.appearance.size_px;
    let color = safe_color(&config.appearance.color);
    let pulse = if config.pulse_animation { " wa-pulse" } else { "" };

    let mut html = format!(
        r#"<div class="wa-widget wa-{position}" style="position:fixed;{offsets};z-index:9999">"#,
        position = config.position,
        offsets = config.position.css_offsets(),
    );

    match mode {
        ConfigMode::Single { contact } => {
            let link = deep_link(contact, &config.default_message);
            if config.tooltip.enabled && state.tooltip_visible && !config.tooltip.text.is_empty() {
                html.push_str(&format!(
                    r#"<span class="wa-tooltip" role="tooltip">{}</span>"#,
                    escape_html(&config.tooltip.text)
                ));
            }
            html.push_str(&format!(
                r#"<a class="wa-button{pulse}" href="{href}" target="_blank" rel="noopener noreferrer" aria-label="Chat on WhatsApp" style="background:{color};width:{size}px;height:{size}px;border-radius:50%">{icon}</a>"#,
                href = escape_html(&link),
                icon = WHATSAPP_ICON,
            ));
        }
        ConfigMode::Multi { agents } => {
            if state.popup_open {
                html.push_str(&render_directory(config, agents, state));
            }
            html.push_str(&format!(
                r#"<button type="button" class="wa-button{pulse}" aria-expanded="{open}" aria-label="Choose a contact" style="background:{color};width:{size}px;height:{size}px;border-radius:50%">{icon}</button>"#,
                open = state.popup_open,
                icon = WHATSAPP_ICON,
            ));
        }
    }

    html.push_str("</div>");
    Some(html)
}

fn render_directory(config: &WidgetConfiguration, agents: &[Agent], state: &ViewState) -> String {
    let mut html = String::from(r#"<div class="wa-popup" role="dialog"><ul class="wa-agents">"#);
    for agent in agents {
        let link = deep_link(&agent.phone_number, &config.default_message);
        let (status_class, status_label) = if agent.is_always_online {
            ("wa-online", "Online")
        } else {
            ("wa-offline", "Offline")
        };

        html.push_str(&format!(
            r#"<li class="wa-agent" data-agent-id="{id}"><a href="{href}" target="_blank" rel="noopener noreferrer">"#,
            id = escape_html(&agent.id),
            href = escape_html(&link),
        ));
        match &agent.avatar_url {
            Some(url) if !state.failed_avatars.contains(&agent.id) => html.push_str(&format!(
                r#"<img class="wa-avatar" src="{}" alt="" loading="lazy">"#,
                escape_html(url)
            )),
            _ => html.push_str(PLACEHOLDER_AVATAR),
        }
        html.push_str(&format!(
            r#"<span class="wa-agent-name">{}</span>"#,
            escape_html(&agent.display_name)
        ));
        if let Some(title) = &agent.title {
            html.push_str(&format!(
                r#"<span class="wa-agent-title">{}</span>"#,
                escape_html(title)
            ));
        }
        html.push_str(&format!(
            r#"<span class="wa-status {status_class}">{status_label}</span></a></li>"#
        ));
    }
    html.push_str("</ul></div>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::defaults::default_payload;
    use crate::widget::{AgentPayload, Position};

    fn multi_config() -> WidgetConfiguration {
        let mut payload = default_payload();
        payload.position = Position::TopLeft;
        payload.agents = vec![
            AgentPayload {
                id: "a1".into(),
                display_name: "Ana <Sales>".into(),
                title: Some("Sales".into()),
                phone_number: "+351 912 345 678".into(),
                avatar_url: Some("https://cdn.example/ana.png".into()),
                is_always_online: true,
            },
            AgentPayload {
                id: "a2".into(),
                display_name: "Bruno".into(),
                title: None,
                phone_number: "351 934 000 111".into(),
                avatar_url: None,
                is_always_online: false,
            },
        ];
        WidgetConfiguration::from(&payload)
    }

    #[test]
    fn single_mode_links_to_contact() {
        let config = WidgetConfiguration::fallback();
        let html = render(&config, &ViewState::default()).unwrap();

        assert!(html.contains("wa-bottom-right"));
        assert!(html.contains("bottom:20px;right:20px"));
        assert!(html.contains("https://wa.me/15555550100?text=Hello%21%20I%20would%20like%20more%20information."));
        assert!(html.contains("background:#25D366;width:60px;height:60px"));
        assert!(html.contains("wa-button wa-pulse"));
        assert!(!html.contains("wa-tooltip"));
    }

    #[test]
    fn single_mode_shows_tooltip_when_visible() {
        let config = WidgetConfiguration::fallback();
        let state = ViewState {
            tooltip_visible: true,
            ..Default::default()
        };
        let html = render(&config, &state).unwrap();
        assert!(html.contains(r#"<span class="wa-tooltip" role="tooltip">Need help? Chat with us!</span>"#));
    }

    #[test]
    fn multi_mode_lists_agents_in_order_when_open() {
        let config = multi_config();
        let closed = render(&config, &ViewState::default()).unwrap();
        assert!(!closed.contains("wa-popup"));
        assert!(closed.contains(r#"aria-expanded="false""#));

        let open = render(
            &config,
            &ViewState {
                popup_open: true,
                ..Default::default()
            },
        )
        .unwrap();
        let first = open.find(r#"data-agent-id="a1""#).unwrap();
        let second = open.find(r#"data-agent-id="a2""#).unwrap();
        assert!(first < second);
        assert!(open.contains("Ana &lt;Sales&gt;"));
        assert!(open.contains("https://wa.me/351912345678"));
        assert!(open.contains(r#"wa-status wa-online">Online"#));
        assert!(open.contains(r#"wa-status wa-offline">Offline"#));
        assert!(open.contains(r#"src="https://cdn.example/ana.png""#));
    }

    #[test]
    fn failed_avatar_renders_placeholder() {
        let config = multi_config();
        let mut state = ViewState {
            popup_open: true,
            ..Default::default()
        };
        state.failed_avatars.insert("a1".into());
        let html = render(&config, &state).unwrap();
        assert!(!html.contains("ana.png"));
        assert_eq!(html.matches("wa-avatar-placeholder").count(), 2);
    }

    #[test]
    fn hostile_color_is_replaced() {
        let mut payload = default_payload();
        payload.button_color = "red;}</style><script>".into();
        payload.pulse_animation = false;
        let html = render(&WidgetConfiguration::from(&payload), &ViewState::default()).unwrap();
        assert!(html.contains("background:#25D366"));
        assert!(!html.contains("<script>"));
        assert!(!html.contains("wa-pulse"));
    }

    #[test]
    fn nothing_to_render_without_mode() {
        let mut payload = default_payload();
        payload.phone_number.clear();
        assert!(render(&WidgetConfiguration::from(&payload), &ViewState::default()).is_none());
    }
}
