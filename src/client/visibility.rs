use crate::widget::{DeviceClass, WidgetConfiguration};

/// Why the widget stays hidden. Not an error: a normal policy outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HiddenReason {
    Disabled,
    RouteHidden { pattern: String },
    DeviceHidden(DeviceClass),
    NothingToRender,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden(HiddenReason),
}

impl Visibility {
    pub fn is_visible(&self) -> bool {
        matches!(self, Visibility::Visible)
    }
}

/// Decides whether the widget may appear. Pure; the first failing rule wins:
///
/// 1. the configuration is enabled,
/// 2. no hidden route pattern matches the route,
/// 3. the device's bucket is allowed (tablets use the desktop flag),
/// 4. the configuration has something to render.
#[derive(Debug, Default, Clone, Copy)]
pub struct VisibilityPolicy;

impl VisibilityPolicy {
    pub fn evaluate(config: &WidgetConfiguration, route: &str, device: DeviceClass) -> Visibility {
        if !config.enabled {
            return Visibility::Hidden(HiddenReason::Disabled);
        }

        if let Some(pattern) = config
            .hidden_route_patterns
            .iter()
            .find(|p| p.matches(route))
        {
            return Visibility::Hidden(HiddenReason::RouteHidden {
                pattern: pattern.source().to_string(),
            });
        }

        let allowed = match device.visibility_bucket() {
            DeviceClass::Mobile => config.device_visibility.mobile,
            _ => config.device_visibility.desktop,
        };
        if !allowed {
            return Visibility::Hidden(HiddenReason::DeviceHidden(device));
        }

        if config.mode.is_none() {
            return Visibility::Hidden(HiddenReason::NothingToRender);
        }

        Visibility::Visible
    }

    pub fn should_display(config: &WidgetConfiguration, route: &str, device: DeviceClass) -> bool {
        Self::evaluate(config, route, device).is_visible()
    }
}
