use log::{warn, Level};
use serde::Deserialize;
use wasm_bindgen::JsValue;

use crate::error::{Error, Result};

/// Name of the optional page global holding configuration overrides.
pub const CONFIG_GLOBAL: &str = "landingTrackerConfig";

#[cfg(debug_assertions)]
pub fn log_level() -> Level {
    Level::Debug // Verbose console output when running a dev build
}

#[cfg(not(debug_assertions))]
pub fn log_level() -> Level {
    Level::Info
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectionConfig {
    /// Probed in order; the first selector that matches wins.
    pub selectors: Vec<String>,
    pub container_selector: String,
    pub timeout_ms: u32,
    pub settle_ms: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            selectors: vec![
                ".pipedriveWebForms form".to_string(),
                ".pipedrive-form-container form".to_string(),
                ".pipedriveWebForms".to_string(),
            ],
            container_selector: ".pipedrive-form-container".to_string(),
            timeout_ms: 5000,
            settle_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackingConfig {
    pub field_selector: String,
    pub submit_selector: String,
    pub input_debounce_ms: u32,
    pub form_type: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            field_selector: "input, select, textarea".to_string(),
            submit_selector: r#"button[type="submit"], input[type="submit"]"#.to_string(),
            input_debounce_ms: 500,
            form_type: "pipedrive_webform".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubmissionConfig {
    pub success_selector: String,
    pub error_selector: String,
    pub message_type: String,
    pub modal_id: String,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            success_selector: ".success-message, .pd-success".to_string(),
            error_selector: ".error-message, .pd-error".to_string(),
            message_type: "pipedrive-form-submitted".to_string(),
            modal_id: "successModal".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToastConfig {
    pub enter_delay_ms: u32,
    /// Measured from insertion to the start of the slide-out.
    pub lifetime_ms: u32,
    pub exit_ms: u32,
}

impl Default for ToastConfig {
    fn default() -> Self {
        Self {
            enter_delay_ms: 100,
            lifetime_ms: 5000,
            exit_ms: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EffectsConfig {
    pub reveal_selector: String,
    pub reveal_class: String,
    pub reveal_threshold: f64,
    pub reveal_root_margin: String,
    pub parallax_selector: String,
    pub parallax_speed: f64,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            reveal_selector: ".bg-white, .benefit-card, .form-container".to_string(),
            reveal_class: "fade-in".to_string(),
            reveal_threshold: 0.1,
            reveal_root_margin: "0px 0px -50px 0px".to_string(),
            parallax_selector: ".hero-pattern".to_string(),
            parallax_speed: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccessibilityConfig {
    pub skip_link_label: String,
    pub main_content_id: String,
    pub main_content_selectors: Vec<String>,
    pub cta_selector: String,
    pub form_section_id: String,
    pub highlight_delay_ms: u32,
    pub highlight_hold_ms: u32,
    pub focusable_selector: String,
}

impl Default for AccessibilityConfig {
    fn default() -> Self {
        Self {
            skip_link_label: "Saltar al contenido principal".to_string(),
            main_content_id: "main-content".to_string(),
            main_content_selectors: vec!["main".to_string(), ".hero-section".to_string()],
            cta_selector: r##"a[href="#pipedrive-form"]"##.to_string(),
            form_section_id: "pipedrive-form".to_string(),
            highlight_delay_ms: 500,
            highlight_hold_ms: 300,
            focusable_selector: r#"a, button, input, select, textarea, [tabindex]:not([tabindex="-1"])"#
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerConfig {
    pub detection: DetectionConfig,
    pub tracking: TrackingConfig,
    pub submission: SubmissionConfig,
    pub toast: ToastConfig,
    pub effects: EffectsConfig,
    pub accessibility: AccessibilityConfig,
}

impl TrackerConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub fn from_js(value: JsValue) -> Result<Self> {
        serde_wasm_bindgen::from_value(value).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Reads `window.landingTrackerConfig`, falling back to defaults when it
    /// is absent or malformed.
    pub fn from_window() -> Self {
        let Some(window) = web_sys::window() else {
            return Self::default();
        };
        let raw = web_sys::js_sys::Reflect::get(&window, &JsValue::from_str(CONFIG_GLOBAL))
            .unwrap_or(JsValue::UNDEFINED);
        if !raw.is_object() {
            return Self::default();
        }
        match Self::from_js(raw) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring {}: {}", CONFIG_GLOBAL, e);
                Self::default()
            }
        }
    }
}
