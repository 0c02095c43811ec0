//! Instrumentation for the lead-capture landing page: reveal and parallax
//! effects, accessibility helpers, and analytics for the embedded Pipedrive
//! form, including its submission outcome.

use std::cell::RefCell;

use log::{debug, info};
use wasm_bindgen::prelude::*;

pub mod accessibility;
pub mod analytics;
pub mod config;
pub mod detector;
pub mod dom;
pub mod effects;
pub mod error;
pub mod modal;
pub mod monitoring;
pub mod presenter;
pub mod session;
pub mod submission;
pub mod timing;
pub mod tracker;
pub mod components {
    pub mod toast;
}

pub use analytics::{Analytics, EventParams};
pub use config::TrackerConfig;
pub use error::{Error, Result};
pub use session::Session;

thread_local! {
    static SESSION: RefCell<Option<Session>> = RefCell::new(None);
    static MONITORING: RefCell<Option<monitoring::Monitoring>> = RefCell::new(None);
}

fn boot() {
    teardown();
    let config = TrackerConfig::from_window();
    match Session::start(config, Analytics::gtag()) {
        Ok(session) => SESSION.with(|slot| *slot.borrow_mut() = Some(session)),
        Err(e) => log::error!("Landing page instrumentation failed to start: {}", e),
    }
}

/// Error reporting and web vitals start as soon as the module loads, before
/// the document is parsed, and live for the whole page.
fn install_monitoring() {
    if MONITORING.with(|slot| slot.borrow().is_some()) {
        return;
    }
    let monitoring = monitoring::Monitoring::install(&Analytics::gtag());
    MONITORING.with(|slot| *slot.borrow_mut() = Some(monitoring));
}

/// Entry point called by the page's loader once the module is instantiated.
#[wasm_bindgen]
pub fn start() -> std::result::Result<(), JsValue> {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(config::log_level()).is_err() {
        debug!("Console logger already installed");
    }

    info!("Starting landing page instrumentation");
    install_monitoring();

    let document = dom::document()?;
    if document.ready_state() == "loading" {
        let on_ready = Closure::once_into_js(boot);
        document.add_event_listener_with_callback("DOMContentLoaded", on_ready.unchecked_ref())?;
    } else {
        boot();
    }
    Ok(())
}

/// Releases every listener, observer and timer of the running session.
#[wasm_bindgen]
pub fn teardown() {
    if let Some(session) = SESSION.with(|slot| slot.borrow_mut().take()) {
        session.teardown();
    }
}
