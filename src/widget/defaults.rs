//! Compiled-in widget defaults.

use super::types::{ConfigPayload, Position};

/// Identifier carried by the fallback configuration.
pub const DEFAULT_CONFIG_ID: &str = "default";

/// Contact number used when no configuration could be fetched.
pub const DEFAULT_PHONE_NUMBER: &str = "15555550100";

/// WhatsApp green.
pub const DEFAULT_BUTTON_COLOR: &str = "#25D366";

pub const DEFAULT_BUTTON_SIZE_PX: u32 = 60;

pub const DEFAULT_SHOW_DELAY_MS: u64 = 2000;

pub const DEFAULT_TOOLTIP_TEXT: &str = "Need help? Chat with us!";

pub const DEFAULT_MESSAGE: &str = "Hello! I would like more information.";

pub const DEFAULT_HIDDEN_ROUTE: &str = "/admin";

pub(crate) fn default_button_color() -> String {
    DEFAULT_BUTTON_COLOR.to_string()
}

pub(crate) fn default_button_size() -> u32 {
    DEFAULT_BUTTON_SIZE_PX
}

pub(crate) fn default_show_delay_ms() -> u64 {
    DEFAULT_SHOW_DELAY_MS
}

/// The fallback record: enabled, single contact, bottom-right, 60px green
/// button, tooltip and pulse on, 2s delay, visible on every device, hidden
/// under `/admin`.
pub fn default_payload() -> ConfigPayload {
    ConfigPayload {
        id: DEFAULT_CONFIG_ID.to_string(),
        enabled: true,
        phone_number: DEFAULT_PHONE_NUMBER.to_string(),
        position: Position::BottomRight,
        button_color: default_button_color(),
        button_size: DEFAULT_BUTTON_SIZE_PX,
        show_tooltip: true,
        tooltip_text: DEFAULT_TOOLTIP_TEXT.to_string(),
        pulse_animation: true,
        show_delay_ms: DEFAULT_SHOW_DELAY_MS,
        show_on_mobile: true,
        show_on_desktop: true,
        hidden_routes: vec![DEFAULT_HIDDEN_ROUTE.to_string()],
        default_message: DEFAULT_MESSAGE.to_string(),
        agents: Vec::new(),
    }
}
