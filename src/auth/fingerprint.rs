//! Device fingerprint normalization, identity derivation, and similarity.
//!
//! The identity hash only covers attributes that are stable across visits.
//! The IP address and plugin list churn too often and would cause false
//! negatives, so they are excluded from derivation; the IP is carried for
//! audit logging only.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

/// Version tag prefixed to every derived identity so a future revision of
/// the algorithm can coexist with stored records.
const IDENTITY_VERSION: &str = "v1";

/// Raw client-reported attributes, as posted by the browser.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeviceFingerprint {
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub screen_resolution: String,
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub cookie_enabled: bool,
    #[serde(default)]
    pub plugins: String,
    #[serde(default)]
    pub canvas_hash: String,
    #[serde(default)]
    pub webgl_hash: String,
    #[serde(default)]
    pub color_depth: u32,
    #[serde(default)]
    pub hardware_concurrency: u32,
    #[serde(default)]
    pub device_memory: u32,
    #[serde(default)]
    pub max_touch_points: u32,
    /// Audit logging only, never part of the identity.
    #[serde(default)]
    pub ip_address: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BrowserFamily {
    Chrome,
    Firefox,
    Safari,
    Edge,
    Opera,
    InternetExplorer,
    Other,
}

impl BrowserFamily {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
            Self::Safari => "safari",
            Self::Edge => "edge",
            Self::Opera => "opera",
            Self::InternetExplorer => "ie",
            Self::Other => "other",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OsFamily {
    Windows,
    MacOs,
    Ios,
    Android,
    Linux,
    Other,
}

impl OsFamily {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Linux => "linux",
            Self::Other => "other",
        }
    }
}

/// Coarse user-agent parse. Versions are deliberately ignored; browser
/// updates must not change the device identity. Unrecognized agents land in
/// the `other` bucket rather than failing.
#[must_use]
pub fn browser_family(user_agent: &str) -> BrowserFamily {
    let ua = user_agent.to_lowercase();
    // Chromium-derived browsers advertise "chrome" too; check them first.
    if ua.contains("edg/") || ua.contains("edge/") {
        BrowserFamily::Edge
    } else if ua.contains("opr/") || ua.contains("opera") {
        BrowserFamily::Opera
    } else if ua.contains("firefox/") {
        BrowserFamily::Firefox
    } else if ua.contains("chrome/") || ua.contains("chromium/") {
        BrowserFamily::Chrome
    } else if ua.contains("safari/") {
        BrowserFamily::Safari
    } else if ua.contains("msie") || ua.contains("trident/") {
        BrowserFamily::InternetExplorer
    } else {
        BrowserFamily::Other
    }
}

#[must_use]
pub fn os_family(user_agent: &str) -> OsFamily {
    let ua = user_agent.to_lowercase();
    if ua.contains("windows") {
        OsFamily::Windows
    } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
        OsFamily::Ios
    } else if ua.contains("mac os") || ua.contains("macintosh") {
        OsFamily::MacOs
    } else if ua.contains("android") {
        OsFamily::Android
    } else if ua.contains("linux") {
        OsFamily::Linux
    } else {
        OsFamily::Other
    }
}

/// Human-readable device label shown in the trusted-device list.
#[must_use]
pub fn device_label(fingerprint: &DeviceFingerprint) -> String {
    let browser = match browser_family(&fingerprint.user_agent) {
        BrowserFamily::Chrome => "Chrome",
        BrowserFamily::Firefox => "Firefox",
        BrowserFamily::Safari => "Safari",
        BrowserFamily::Edge => "Edge",
        BrowserFamily::Opera => "Opera",
        BrowserFamily::InternetExplorer => "Internet Explorer",
        BrowserFamily::Other => "Unknown browser",
    };
    let os = match os_family(&fingerprint.user_agent) {
        OsFamily::Windows => "Windows",
        OsFamily::MacOs => "macOS",
        OsFamily::Ios => "iOS",
        OsFamily::Android => "Android",
        OsFamily::Linux => "Linux",
        OsFamily::Other => "unknown OS",
    };
    format!("{browser} on {os}")
}

/// Derive the deterministic, versioned device identity from the stable
/// attribute subset.
#[must_use]
pub fn device_identity(fingerprint: &DeviceFingerprint) -> String {
    let stable = [
        browser_family(&fingerprint.user_agent).as_str(),
        os_family(&fingerprint.user_agent).as_str(),
        &fingerprint.screen_resolution,
        &fingerprint.timezone,
        &fingerprint.language,
        &fingerprint.platform,
        if fingerprint.cookie_enabled { "1" } else { "0" },
        &fingerprint.canvas_hash,
        &fingerprint.webgl_hash,
    ]
    .join("|");
    let numeric = format!(
        "{}|{}|{}|{}",
        fingerprint.color_depth,
        fingerprint.hardware_concurrency,
        fingerprint.device_memory,
        fingerprint.max_touch_points
    );

    let mut hasher = Sha256::new();
    hasher.update(stable.as_bytes());
    hasher.update(b"|");
    hasher.update(numeric.as_bytes());
    let digest = hasher.finalize();
    format!("{IDENTITY_VERSION}:{digest:x}")
}

/// Match ratio between two fingerprints over the nine compared attributes.
///
/// Used by magic-link redemption, where the redeeming device only has to be
/// close to the issuing one: minor drift (a plugin install, a canvas nuance)
/// passes, a wholly different device does not.
#[must_use]
pub fn similarity(stored: &DeviceFingerprint, current: &DeviceFingerprint) -> f64 {
    let checks = [
        stored.user_agent == current.user_agent,
        stored.screen_resolution == current.screen_resolution,
        stored.timezone == current.timezone,
        stored.language == current.language,
        stored.platform == current.platform,
        stored.cookie_enabled == current.cookie_enabled,
        stored.plugins == current.plugins,
        stored.canvas_hash == current.canvas_hash,
        stored.webgl_hash == current.webgl_hash,
    ];
    let matches = checks.iter().filter(|matched| **matched).count();
    matches as f64 / checks.len() as f64
}
