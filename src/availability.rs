use crate::config::DeviceOverride;
use crate::platform::PlatformCapabilities;

const TABLET_TOKENS: [&str; 5] = ["ipad", "tablet", "kindle", "silk", "playbook"];
const PHONE_TOKENS: [&str; 4] = ["iphone", "ipod", "windows phone", "blackberry"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Phone,
    Tablet,
    Desktop,
}

/// Heurística de tipo de dispositivo por user agent y puntos táctiles.
/// Es orientativa: puede fallar con agentes poco comunes.
pub fn classify_device(user_agent: &str, max_touch_points: u32) -> DeviceClass {
    let ua = user_agent.to_lowercase();
    let android = ua.contains("android");
    let mobile = ua.contains("mobile");

    // iPadOS se anuncia como Macintosh con pantalla táctil
    if TABLET_TOKENS.iter().any(|t| ua.contains(t))
        || (android && !mobile)
        || (ua.contains("macintosh") && max_touch_points > 1)
    {
        return DeviceClass::Tablet;
    }

    if PHONE_TOKENS.iter().any(|t| ua.contains(t)) || (android && mobile) || ua.contains("mobi") {
        return DeviceClass::Phone;
    }

    DeviceClass::Desktop
}

/// Resultado del sondeo de capacidades
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub supported: bool,
    pub has_orientation: bool,
    pub has_motion: bool,
    pub is_phone: bool,
    pub device: DeviceClass,
}

/// Decide si se ofrece el modo sensor. Sin efectos secundarios.
/// Solo teléfonos: una tableta suele estar apoyada y su inclinación no dice nada.
pub fn probe(capabilities: &PlatformCapabilities, device_override: DeviceOverride) -> Availability {
    let device = classify_device(&capabilities.user_agent, capabilities.max_touch_points);
    let is_phone = match device_override {
        DeviceOverride::Auto => device == DeviceClass::Phone,
        DeviceOverride::Phone => true,
        DeviceOverride::NotPhone => false,
    };
    let has_signal = capabilities.has_orientation || capabilities.has_motion;

    Availability {
        supported: has_signal && is_phone,
        has_orientation: capabilities.has_orientation,
        has_motion: capabilities.has_motion,
        is_phone,
        device,
    }
}
