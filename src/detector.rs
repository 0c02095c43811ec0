//! Waits for the embedded widget to render its form.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::channel::oneshot;
use futures::FutureExt;
use gloo_timers::callback::Timeout;
use gloo_timers::future::TimeoutFuture;
use log::{debug, info};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::js_sys::Array;
use web_sys::{Document, Element, MutationObserver, MutationObserverInit};

use crate::config::DetectionConfig;
use crate::dom;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// The first element matching one of the candidate selectors.
    Found(Element),
    TimedOut,
}

/// The form to instrument for a detected widget element: the element itself
/// when it is a `<form>`, otherwise the first form inside it.
pub fn trackable_form(found: &Element) -> Option<Element> {
    if found.tag_name().eq_ignore_ascii_case("form") {
        Some(found.clone())
    } else {
        found.query_selector("form").ok().flatten()
    }
}

struct ObserverGuard {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(Array, MutationObserver)>,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

/// Resolves once any candidate selector matches, or with `TimedOut` after
/// `timeout_ms`. A probe runs `settle_ms` after the first mutation of a burst;
/// mutations while it is pending join it rather than push it back, so a page
/// that never stops changing is still probed. Nothing keeps watching after
/// the future completes or is dropped.
pub async fn detect(document: &Document, config: &DetectionConfig) -> Result<Detection> {
    if let Some(found) = dom::first_match(document, &config.selectors) {
        debug!("Embedded form already present");
        return Ok(Detection::Found(found));
    }

    let (sender, receiver) = oneshot::channel::<Element>();
    let sender = Rc::new(RefCell::new(Some(sender)));
    let settle: Rc<RefCell<Option<Timeout>>> = Rc::new(RefCell::new(None));
    let pending = Rc::new(Cell::new(false));

    let callback = {
        let document = document.clone();
        let selectors = config.selectors.clone();
        let settle_ms = config.settle_ms;
        Closure::wrap(Box::new(move |_records: Array, _observer: MutationObserver| {
            if pending.replace(true) {
                return;
            }
            let document = document.clone();
            let selectors = selectors.clone();
            let sender = sender.clone();
            let pending = pending.clone();
            let probe = Timeout::new(settle_ms, move || {
                pending.set(false);
                if let Some(found) = dom::first_match(&document, &selectors) {
                    if let Some(sender) = sender.borrow_mut().take() {
                        let _ = sender.send(found);
                    }
                }
            });
            *settle.borrow_mut() = Some(probe);
        }) as Box<dyn FnMut(Array, MutationObserver)>)
    };

    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    let root = document
        .body()
        .map(Into::into)
        .or_else(|| document.document_element())
        .ok_or(Error::MissingGlobal("body"))?;
    observer.observe_with_options(&root, &init)?;
    let _guard = ObserverGuard {
        observer,
        _callback: callback,
    };

    let found = receiver.fuse();
    let timeout = TimeoutFuture::new(config.timeout_ms).fuse();
    futures::pin_mut!(found, timeout);
    let detection = futures::select! {
        element = found => match element {
            Ok(element) => Detection::Found(element),
            Err(_) => Detection::TimedOut,
        },
        _ = timeout => {
            info!("Stopped checking for embedded form after {} ms", config.timeout_ms);
            Detection::TimedOut
        }
    };
    Ok(detection)
}
