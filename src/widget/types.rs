use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::defaults::{self, DEFAULT_CONFIG_ID};
use super::route::RoutePattern;

// ============================================================================
// Wire Payload
// ============================================================================

/// Screen corner the floating button is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

impl Position {
    /// CSS offsets for the container, e.g. `bottom:20px;right:20px`.
    pub fn css_offsets(self) -> &'static str {
        match self {
            Position::BottomRight => "bottom:20px;right:20px",
            Position::BottomLeft => "bottom:20px;left:20px",
            Position::TopRight => "top:20px;right:20px",
            Position::TopLeft => "top:20px;left:20px",
        }
    }

    pub fn is_left(self) -> bool {
        matches!(self, Position::BottomLeft | Position::TopLeft)
    }

    pub fn is_top(self) -> bool {
        matches!(self, Position::TopRight | Position::TopLeft)
    }
}

impl std::str::FromStr for Position {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bottom-right" => Ok(Self::BottomRight),
            "bottom-left" => Ok(Self::BottomLeft),
            "top-right" => Ok(Self::TopRight),
            "top-left" => Ok(Self::TopLeft),
            _ => Err(format!("invalid widget position: {s}")),
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Position::BottomRight => "bottom-right",
            Position::BottomLeft => "bottom-left",
            Position::TopRight => "top-right",
            Position::TopLeft => "top-left",
        };
        f.write_str(s)
    }
}

/// One agent entry as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPayload {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_always_online: bool,
}

/// The configuration record exactly as `GET /whatsapp/config` returns it and
/// as the local cache stores it: flat fields plus the resolved agent list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPayload {
    pub id: String,
    pub enabled: bool,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default = "defaults::default_button_color")]
    pub button_color: String,
    #[serde(default = "defaults::default_button_size")]
    pub button_size: u32,
    #[serde(default = "default_true")]
    pub show_tooltip: bool,
    #[serde(default)]
    pub tooltip_text: String,
    #[serde(default = "default_true")]
    pub pulse_animation: bool,
    #[serde(default = "defaults::default_show_delay_ms")]
    pub show_delay_ms: u64,
    #[serde(default = "default_true")]
    pub show_on_mobile: bool,
    #[serde(default = "default_true")]
    pub show_on_desktop: bool,
    #[serde(default)]
    pub hidden_routes: Vec<String>,
    #[serde(default)]
    pub default_message: String,
    #[serde(default)]
    pub agents: Vec<AgentPayload>,
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Resolved Configuration
// ============================================================================

/// A phone number reduced to its digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Strip everything but ASCII digits. Returns `None` when nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            None
        } else {
            Some(Self(digits))
        }
    }

    pub fn digits(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub id: String,
    pub display_name: String,
    pub title: Option<String>,
    pub phone_number: PhoneNumber,
    pub avatar_url: Option<String>,
    pub is_always_online: bool,
}

impl Agent {
    /// Agents without a usable number are dropped rather than rendered as
    /// dead links.
    fn from_payload(payload: &AgentPayload) -> Option<Self> {
        let phone_number = PhoneNumber::parse(&payload.phone_number)?;
        Some(Self {
            id: payload.id.clone(),
            display_name: payload.display_name.clone(),
            title: payload.title.clone().filter(|t| !t.trim().is_empty()),
            phone_number,
            avatar_url: payload.avatar_url.clone().filter(|u| !u.trim().is_empty()),
            is_always_online: payload.is_always_online,
        })
    }
}

/// The two mutually exclusive render shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigMode {
    Single { contact: PhoneNumber },
    Multi { agents: Vec<Agent> },
}

impl ConfigMode {
    /// `Multi` iff the agent list is non-empty; otherwise `Single` when a
    /// contact number is usable; otherwise nothing can be rendered.
    pub fn derive(phone_number: &str, agents: &[AgentPayload]) -> Option<Self> {
        let agents: Vec<Agent> = agents.iter().filter_map(Agent::from_payload).collect();
        if !agents.is_empty() {
            return Some(ConfigMode::Multi { agents });
        }
        PhoneNumber::parse(phone_number).map(|contact| ConfigMode::Single { contact })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appearance {
    pub color: String,
    pub size_px: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TooltipSettings {
    pub enabled: bool,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceVisibility {
    pub mobile: bool,
    pub desktop: bool,
}

/// Configuration as the client pipeline consumes it. Built once per resolve
/// from a [`ConfigPayload`]; `mode` is always derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfiguration {
    pub id: String,
    pub enabled: bool,
    pub mode: Option<ConfigMode>,
    pub position: Position,
    pub appearance: Appearance,
    pub tooltip: TooltipSettings,
    pub pulse_animation: bool,
    pub show_delay: Duration,
    pub device_visibility: DeviceVisibility,
    pub hidden_route_patterns: Vec<RoutePattern>,
    pub default_message: String,
}

impl WidgetConfiguration {
    /// The compiled-in configuration used whenever the origin is unreachable.
    pub fn fallback() -> Self {
        Self::from(&defaults::default_payload())
    }

    pub fn is_fallback(&self) -> bool {
        self.id == DEFAULT_CONFIG_ID
    }

    pub fn agents(&self) -> &[Agent] {
        match &self.mode {
            Some(ConfigMode::Multi { agents }) => agents,
            _ => &[],
        }
    }
}

impl From<&ConfigPayload> for WidgetConfiguration {
    fn from(p: &ConfigPayload) -> Self {
        let mut hidden_route_patterns: Vec<RoutePattern> = Vec::new();
        for raw in &p.hidden_routes {
            let pattern = RoutePattern::compile(raw);
            if !pattern.source().is_empty() && !hidden_route_patterns.contains(&pattern) {
                hidden_route_patterns.push(pattern);
            }
        }

        Self {
            id: p.id.clone(),
            enabled: p.enabled,
            mode: ConfigMode::derive(&p.phone_number, &p.agents),
            position: p.position,
            appearance: Appearance {
                color: p.button_color.clone(),
                size_px: p.button_size,
            },
            tooltip: TooltipSettings {
                enabled: p.show_tooltip,
                text: p.tooltip_text.clone(),
            },
            pulse_animation: p.pulse_animation,
            show_delay: Duration::from_millis(p.show_delay_ms),
            device_visibility: DeviceVisibility {
                mobile: p.show_on_mobile,
                desktop: p.show_on_desktop,
            },
            hidden_route_patterns,
            default_message: p.default_message.clone(),
        }
    }
}

// ============================================================================
// Device Classification
// ============================================================================

/// Device bucket derived from the user-agent string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceClass {
    /// Tablet signals are checked first so Android tablets (no `Mobile`
    /// token) and iPads are not counted as phones.
    pub fn classify(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        let android = ua.contains("android");

        if ua.contains("ipad")
            || ua.contains("tablet")
            || ua.contains("kindle")
            || ua.contains("silk/")
            || (android && !ua.contains("mobile"))
        {
            return DeviceClass::Tablet;
        }

        const MOBILE_SIGNALS: [&str; 8] = [
            "mobile",
            "android",
            "iphone",
            "ipod",
            "blackberry",
            "iemobile",
            "opera mini",
            "webos",
        ];
        if MOBILE_SIGNALS.iter().any(|s| ua.contains(s)) {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }

    /// The bucket used for visibility gating. Tablets honour the desktop flag.
    pub fn visibility_bucket(self) -> DeviceClass {
        match self {
            DeviceClass::Mobile => DeviceClass::Mobile,
            DeviceClass::Tablet | DeviceClass::Desktop => DeviceClass::Desktop,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Desktop => "desktop",
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Engagement Event
// ============================================================================

/// One click-through, client → origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementEvent {
    pub config_id: String,
    pub agent_id: Option<String>,
    pub page_url: String,
    pub referrer: String,
    pub device_class: DeviceClass,
    pub session_id: String,
}
