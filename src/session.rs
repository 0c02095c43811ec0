//! One page load worth of instrumentation.
//!
//! `Session::start` runs every initializer in a fixed order and keeps what
//! they return. Dropping the session (or calling `teardown`) removes all
//! listeners, disconnects all observers, cancels pending timers and aborts
//! form detection, so a fresh session can be started on the same document.

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::{abortable, AbortHandle};
use log::{debug, info, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::spawn_local;
use web_sys::js_sys::Reflect;
use web_sys::{Document, Window};

use crate::accessibility::Accessibility;
use crate::analytics::{self, Analytics, EventParams};
use crate::config::TrackerConfig;
use crate::detector::{self, Detection};
use crate::dom::{self, Listener};
use crate::effects::{Parallax, Reveal};
use crate::error::Result;
use crate::modal::{self, SuccessModal};
use crate::monitoring;
use crate::presenter::Presenter;
use crate::submission::{self, SubmissionCycle, SubmissionFlow, SubmissionWatch};
use crate::tracker::{self, FormTracking};

pub const CLOSE_MODAL_GLOBAL: &str = "closeSuccessModal";
pub const TRACK_EVENT_GLOBAL: &str = "trackEvent";

/// Class added to the form container as soon as the session starts.
const LOADED_CLASS: &str = "loaded";

fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|window| window.performance())
        .map(|performance| performance.now())
        .unwrap_or(0.0)
}

/// Functions published on `window` for inline handlers in the page markup.
struct Globals {
    window: Window,
    _close: Closure<dyn Fn()>,
    _track: Closure<dyn Fn(JsValue, JsValue)>,
}

impl Globals {
    fn install(modal_id: &str, analytics: &Analytics, flow: &SubmissionFlow) -> Result<Self> {
        let window = dom::window()?;

        let close = {
            let modal_id = modal_id.to_string();
            let flow = flow.clone();
            Closure::wrap(Box::new(move || {
                if let Ok(document) = dom::document() {
                    modal::close_by_id(&document, &modal_id);
                }
                flow.restart();
            }) as Box<dyn Fn()>)
        };

        let track = {
            let analytics = analytics.clone();
            Closure::wrap(Box::new(move |name: JsValue, params: JsValue| {
                let Some(name) = name.as_string() else {
                    warn!("{} called without an event name", TRACK_EVENT_GLOBAL);
                    return;
                };
                let params = if params.is_undefined() || params.is_null() {
                    EventParams::new()
                } else {
                    serde_wasm_bindgen::from_value(params).unwrap_or_else(|e| {
                        warn!("Dropping unreadable parameters for {}: {}", name, e);
                        EventParams::new()
                    })
                };
                analytics.track(&name, params);
            }) as Box<dyn Fn(JsValue, JsValue)>)
        };

        Reflect::set(&window, &JsValue::from_str(CLOSE_MODAL_GLOBAL), close.as_ref())?;
        Reflect::set(&window, &JsValue::from_str(TRACK_EVENT_GLOBAL), track.as_ref())?;

        Ok(Self {
            window,
            _close: close,
            _track: track,
        })
    }
}

impl Drop for Globals {
    fn drop(&mut self) {
        for name in [CLOSE_MODAL_GLOBAL, TRACK_EVENT_GLOBAL] {
            let _ = Reflect::delete_property(&self.window, &JsValue::from_str(name));
        }
    }
}

/// Logs a failed initializer and carries on without it.
fn optional<T>(what: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Skipping {}: {}", what, e);
            None
        }
    }
}

pub struct Session {
    config: Rc<TrackerConfig>,
    analytics: Analytics,
    flow: SubmissionFlow,
    modal: Option<Rc<SuccessModal>>,
    _reveal: Option<Reveal>,
    _parallax: Option<Parallax>,
    _accessibility: Option<Accessibility>,
    _message: Option<Listener>,
    _globals: Option<Globals>,
    watches: Rc<RefCell<Vec<SubmissionWatch>>>,
    tracked: Rc<RefCell<Vec<FormTracking>>>,
    detection: Option<AbortHandle>,
}

impl Session {
    pub fn start(config: TrackerConfig, analytics: Analytics) -> Result<Self> {
        let document = dom::document()?;
        let config = Rc::new(config);
        let started_at = now_ms();

        // Animations
        let reveal = optional("fade-in effects", Reveal::start(&document, &config.effects));

        // Form tracking
        let cycle = Rc::new(RefCell::new(SubmissionCycle::new()));
        let on_modal_close: Rc<dyn Fn()> = {
            let cycle = cycle.clone();
            Rc::new(move || cycle.borrow_mut().restart())
        };
        let modal = optional(
            "success modal",
            SuccessModal::install(&document, &config.submission.modal_id, on_modal_close),
        )
        .flatten()
        .map(Rc::new);
        let presenter = Presenter::new(
            analytics.clone(),
            modal.clone(),
            config.toast,
            &config.tracking.form_type,
        );
        let flow = SubmissionFlow::with_cycle(cycle, move |outcome| presenter.present(outcome));
        let message = optional(
            "submission message listener",
            submission::listen_for_message(&flow, &config.submission.message_type),
        );
        let watches = Rc::new(RefCell::new(Vec::new()));
        let tracked = Rc::new(RefCell::new(Vec::new()));
        let detection = Self::spawn_detection(
            &document,
            &config,
            &analytics,
            &flow,
            &watches,
            &tracked,
            started_at,
        );

        // Scroll effects
        let parallax = optional("parallax", Parallax::start(&config.effects));

        // Accessibility
        let accessibility = optional(
            "accessibility helpers",
            Accessibility::install(&document, &config.accessibility, &analytics),
        );

        // Embedded form container
        let container = document
            .query_selector(&config.detection.container_selector)
            .ok()
            .flatten();
        if let Some(container) = container {
            let _ = container.class_list().add_1(LOADED_CLASS);
            if let Some(watch) = optional(
                "container watch",
                SubmissionWatch::start(
                    &container,
                    &flow,
                    &config.submission.success_selector,
                    &config.submission.error_selector,
                ),
            ) {
                watches.borrow_mut().push(watch);
            }
        }

        let globals = optional(
            "global functions",
            Globals::install(&config.submission.modal_id, &analytics, &flow),
        );

        monitoring::track_page_view(&document, &analytics);
        info!("Landing page instrumentation started");

        Ok(Self {
            config,
            analytics,
            flow,
            modal,
            _reveal: reveal,
            _parallax: parallax,
            _accessibility: accessibility,
            _message: message,
            _globals: globals,
            watches,
            tracked,
            detection: Some(detection),
        })
    }

    fn spawn_detection(
        document: &Document,
        config: &Rc<TrackerConfig>,
        analytics: &Analytics,
        flow: &SubmissionFlow,
        watches: &Rc<RefCell<Vec<SubmissionWatch>>>,
        tracked: &Rc<RefCell<Vec<FormTracking>>>,
        started_at: f64,
    ) -> AbortHandle {
        let document = document.clone();
        let config = config.clone();
        let analytics = analytics.clone();
        let flow = flow.clone();
        let watches = watches.clone();
        let tracked = tracked.clone();

        let task = async move {
            let found = match detector::detect(&document, &config.detection).await {
                Ok(Detection::Found(found)) => found,
                Ok(Detection::TimedOut) => return,
                Err(e) => {
                    warn!("Form detection failed: {}", e);
                    return;
                }
            };
            info!("Embedded form detected");
            analytics.track(
                analytics::FORM_LOAD_TIME,
                EventParams::new().with("value", now_ms() - started_at),
            );

            let Some(form) = detector::trackable_form(&found) else {
                debug!("Embedded widget has no form element to track");
                return;
            };
            let on_submit_click: Rc<dyn Fn()> = {
                let flow = flow.clone();
                Rc::new(move || flow.restart())
            };
            match tracker::attach(&form, &analytics, &config.tracking, on_submit_click) {
                Ok(Some(tracking)) => tracked.borrow_mut().push(tracking),
                Ok(None) => {}
                Err(e) => warn!("Could not track form: {}", e),
            }

            // Without a container, outcome markers are looked for in the form itself.
            if watches.borrow().is_empty() {
                let watch = SubmissionWatch::start(
                    &form,
                    &flow,
                    &config.submission.success_selector,
                    &config.submission.error_selector,
                );
                if let Some(watch) = optional("form watch", watch) {
                    watches.borrow_mut().push(watch);
                }
            }
        };

        let (task, handle) = abortable(task);
        spawn_local(async move {
            let _ = task.await;
        });
        handle
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    pub fn submissions(&self) -> &SubmissionFlow {
        &self.flow
    }

    pub fn modal(&self) -> Option<&SuccessModal> {
        self.modal.as_deref()
    }

    /// Number of forms currently instrumented.
    pub fn tracked_forms(&self) -> usize {
        self.tracked.borrow().len()
    }

    pub fn teardown(self) {
        drop(self);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(detection) = self.detection.take() {
            detection.abort();
        }
        self.tracked.borrow_mut().clear();
        self.watches.borrow_mut().clear();
        debug!("Landing page instrumentation torn down");
    }
}
