//! Page-level reporting: page views, uncaught errors and Core Web Vitals.

use log::{error, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::js_sys::{Array, Object, Reflect};
use web_sys::{
    Document, ErrorEvent, PerformanceObserver, PerformanceObserverEntryList,
    PerformanceObserverInit, PromiseRejectionEvent,
};

use crate::analytics::{self, Analytics, EventParams};
use crate::dom::{self, Listener};
use crate::error::Result;

pub fn error_params(message: Option<String>, filename: &str, lineno: u32) -> EventParams {
    EventParams::new()
        .with(
            "message",
            message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Unknown error".to_string()),
        )
        .with("filename", filename)
        .with("lineno", lineno)
}

pub fn rejection_params(reason: Option<String>) -> EventParams {
    EventParams::new().with(
        "reason",
        reason.unwrap_or_else(|| "Unknown reason".to_string()),
    )
}

/// `(event name, value)` for a performance entry this module reports on.
pub fn vital(entry_type: &str, start_time: f64, processing_start: Option<f64>) -> Option<(&'static str, f64)> {
    match entry_type {
        "largest-contentful-paint" => Some((analytics::LCP, start_time)),
        "first-input" => processing_start.map(|start| (analytics::FID, start - start_time)),
        _ => None,
    }
}

pub fn track_page_view(document: &Document, analytics: &Analytics) {
    let location = dom::window()
        .ok()
        .and_then(|window| window.location().href().ok())
        .unwrap_or_default();
    analytics.track(
        analytics::PAGE_VIEW,
        EventParams::new()
            .with("page_title", document.title())
            .with("page_location", location),
    );
}

fn describe(value: &JsValue) -> Option<String> {
    if value.is_undefined() || value.is_null() {
        return None;
    }
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<web_sys::js_sys::Error>()
                .map(|err| String::from(err.message()))
        })
        .or_else(|| Some(String::from(Object::from(value.clone()).to_string())))
}

/// Reports uncaught errors and rejected promises. Nothing is re-thrown.
pub struct ErrorReporting {
    _error: Listener,
    _rejection: Listener,
}

impl ErrorReporting {
    pub fn install(analytics: &Analytics) -> Result<Self> {
        let window = dom::window()?;

        let on_error = {
            let analytics = analytics.clone();
            Listener::new(&window, "error", move |event| {
                let Some(event) = event.dyn_ref::<ErrorEvent>() else {
                    return;
                };
                let failure = event.error();
                error!("JavaScript error: {:?}", failure);
                let message = describe(&failure).or_else(|| Some(event.message()));
                analytics.track(
                    analytics::JAVASCRIPT_ERROR,
                    error_params(message, &event.filename(), event.lineno()),
                );
            })?
        };

        let on_rejection = {
            let analytics = analytics.clone();
            Listener::new(&window, "unhandledrejection", move |event| {
                let Some(event) = event.dyn_ref::<PromiseRejectionEvent>() else {
                    return;
                };
                let reason = event.reason();
                error!("Unhandled promise rejection: {:?}", reason);
                analytics.track(analytics::UNHANDLED_REJECTION, rejection_params(describe(&reason)));
            })?
        };

        Ok(Self {
            _error: on_error,
            _rejection: on_rejection,
        })
    }
}

/// Largest contentful paint and first input delay, where supported.
pub struct WebVitals {
    observer: PerformanceObserver,
    _callback: Closure<dyn FnMut(PerformanceObserverEntryList, PerformanceObserver)>,
}

impl WebVitals {
    pub fn install(analytics: &Analytics) -> Result<Option<Self>> {
        let window = dom::window()?;
        if !Reflect::has(&window, &JsValue::from_str("PerformanceObserver")).unwrap_or(false) {
            warn!("PerformanceObserver unsupported, skipping web vitals");
            return Ok(None);
        }

        let analytics = analytics.clone();
        let callback = Closure::wrap(Box::new(
            move |list: PerformanceObserverEntryList, _observer: PerformanceObserver| {
                for entry in list.get_entries().iter() {
                    let Ok(entry) = entry.dyn_into::<web_sys::PerformanceEntry>() else {
                        continue;
                    };
                    let processing_start = Reflect::get(&entry, &JsValue::from_str("processingStart"))
                        .ok()
                        .and_then(|value| value.as_f64());
                    if let Some((name, value)) =
                        vital(&entry.entry_type(), entry.start_time(), processing_start)
                    {
                        analytics.track(name, EventParams::new().with("value", value));
                    }
                }
            },
        )
            as Box<dyn FnMut(PerformanceObserverEntryList, PerformanceObserver)>);

        let observer = PerformanceObserver::new(callback.as_ref().unchecked_ref())?;
        let entry_types = Array::of2(
            &JsValue::from_str("largest-contentful-paint"),
            &JsValue::from_str("first-input"),
        );
        let init = Object::new();
        Reflect::set(&init, &JsValue::from_str("entryTypes"), &entry_types)?;
        observer.observe(init.unchecked_ref::<PerformanceObserverInit>());

        Ok(Some(Self {
            observer,
            _callback: callback,
        }))
    }
}

impl Drop for WebVitals {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

/// Everything installed at module load; lives for the whole page.
pub struct Monitoring {
    _errors: Option<ErrorReporting>,
    _vitals: Option<WebVitals>,
}

impl Monitoring {
    pub fn install(analytics: &Analytics) -> Self {
        let errors = ErrorReporting::install(analytics)
            .map_err(|e| warn!("Error reporting unavailable: {}", e))
            .ok();
        let vitals = WebVitals::install(analytics)
            .map_err(|e| warn!("Web vitals unavailable: {}", e))
            .ok()
            .flatten();
        Self {
            _errors: errors,
            _vitals: vitals,
        }
    }
}
