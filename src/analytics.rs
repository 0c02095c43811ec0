use std::collections::BTreeMap;
use std::rc::Rc;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::js_sys::{Function, Reflect};

pub const PAGE_VIEW: &str = "page_view";
pub const FORM_FIELD_FOCUS: &str = "form_field_focus";
pub const FORM_FIELD_BLUR: &str = "form_field_blur";
pub const FORM_FIELD_INPUT: &str = "form_field_input";
pub const FORM_SUBMIT_CLICK: &str = "form_submit_click";
pub const FORM_SUBMIT_SUCCESS: &str = "form_submit_success";
pub const FORM_SUBMIT_ERROR: &str = "form_submit_error";
pub const FORM_LOAD_TIME: &str = "form_load_time";
pub const CTA_BUTTON_CLICK: &str = "cta_button_click";
pub const JAVASCRIPT_ERROR: &str = "javascript_error";
pub const UNHANDLED_REJECTION: &str = "unhandled_promise_rejection";
pub const LCP: &str = "lcp";
pub const FID: &str = "fid";

/// Event parameters; values are kept as JSON so they reach `gtag` unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventParams(BTreeMap<String, Value>);

impl EventParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_js(&self) -> JsValue {
        let serializer = serde_wasm_bindgen::Serializer::json_compatible();
        self.serialize(&serializer).unwrap_or(JsValue::UNDEFINED)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsEvent {
    pub name: String,
    pub params: EventParams,
}

/// Where tracked events end up.
pub trait EventSink {
    fn send(&self, event: &AnalyticsEvent);
}

/// Forwards to the page's `gtag(...)` when one is installed.
pub struct GtagSink;

impl EventSink for GtagSink {
    fn send(&self, event: &AnalyticsEvent) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let gtag = Reflect::get(&window, &JsValue::from_str("gtag")).unwrap_or(JsValue::UNDEFINED);
        if let Some(gtag) = gtag.dyn_ref::<Function>() {
            if let Err(e) = gtag.call3(
                &JsValue::NULL,
                &JsValue::from_str("event"),
                &JsValue::from_str(&event.name),
                &event.params.to_js(),
            ) {
                warn!("gtag rejected {}: {:?}", event.name, e);
            }
        }
    }
}

#[derive(Clone)]
pub struct Analytics {
    sink: Rc<dyn EventSink>,
}

impl Analytics {
    pub fn gtag() -> Self {
        Self::with_sink(Rc::new(GtagSink))
    }

    pub fn with_sink(sink: Rc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Best effort: nothing is buffered or retried.
    pub fn track(&self, name: &str, params: EventParams) {
        let event = AnalyticsEvent {
            name: name.to_string(),
            params,
        };
        self.sink.send(&event);
        info!(
            "Event tracked: {} {}",
            event.name,
            serde_json::to_string(&event.params).unwrap_or_default()
        );
    }
}


#[cfg(test)]
mod tests {
    use super::testing::recording;
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn params_serialize_as_flat_object() {
        let params = EventParams::new()
            .with("field_name", "email")
            .with("has_value", true)
            .with("lineno", 42);

        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({ "field_name": "email", "has_value": true, "lineno": 42 })
        );
    }

    #[test]
    fn later_values_replace_earlier_ones() {
        let params = EventParams::new().with("target", "a").with("target", "b");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("target"), Some(&json!("b")));
    }

    #[test]
    fn params_accept_arbitrary_objects() {
        let params: EventParams =
            serde_json::from_value(json!({ "label": "hero", "value": 3.5 })).unwrap();
        assert_eq!(params.get("value"), Some(&json!(3.5)));
    }

    #[test]
    fn track_hands_every_event_to_the_sink() {
        let (analytics, sink) = recording();
        analytics.track(PAGE_VIEW, EventParams::new().with("page_title", "Home"));
        analytics.track(CTA_BUTTON_CLICK, EventParams::new());

        assert_eq!(sink.names(), vec![PAGE_VIEW, CTA_BUTTON_CLICK]);
        assert_eq!(
            sink.events.borrow()[0].params.get("page_title"),
            Some(&json!("Home"))
        );
    }
}
