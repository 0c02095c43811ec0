use std::rc::Rc;

use log::{debug, info};
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, KeyboardEvent};

use crate::dom::Listener;
use crate::error::Result;

const HIDDEN: &str = "hidden";
const SHOWN: [&str; 2] = ["flex", "modal-enter"];

pub fn is_dismiss_key(key: &str) -> bool {
    key == "Escape"
}

pub fn open(modal: &Element) -> Result<()> {
    let classes = modal.class_list();
    classes.remove_1(HIDDEN)?;
    classes.add_2(SHOWN[0], SHOWN[1])?;
    Ok(())
}

pub fn close(modal: &Element) -> Result<()> {
    let classes = modal.class_list();
    classes.add_1(HIDDEN)?;
    classes.remove_2(SHOWN[0], SHOWN[1])?;
    Ok(())
}

pub fn is_open(modal: &Element) -> bool {
    !modal.class_list().contains(HIDDEN)
}

/// Closes the modal with the given id, if the page has one.
pub fn close_by_id(document: &Document, id: &str) {
    if let Some(modal) = document.get_element_by_id(id) {
        if close(&modal).is_ok() {
            debug!("Success modal closed");
        }
    }
}

fn dismiss(modal: &Element, on_close: &dyn Fn()) {
    if close(modal).is_ok() {
        on_close();
    }
}

/// The page's success modal with its dismissal handlers installed.
/// `on_close` runs after every dismissal, whichever way it happened.
pub struct SuccessModal {
    element: Element,
    on_close: Rc<dyn Fn()>,
    _backdrop: Listener,
    _escape: Listener,
}

impl SuccessModal {
    /// Returns `None` when the page has no element with `id`.
    pub fn install(document: &Document, id: &str, on_close: Rc<dyn Fn()>) -> Result<Option<Self>> {
        let Some(element) = document.get_element_by_id(id) else {
            info!("No #{} on this page, success modal disabled", id);
            return Ok(None);
        };

        let backdrop = {
            let modal = element.clone();
            let on_close = on_close.clone();
            Listener::new(&element, "click", move |event| {
                let on_backdrop = event
                    .target()
                    .and_then(|target| target.dyn_into::<Element>().ok())
                    .map_or(false, |target| target == modal);
                if on_backdrop {
                    dismiss(&modal, on_close.as_ref());
                }
            })?
        };

        let escape = {
            let modal = element.clone();
            let on_close = on_close.clone();
            Listener::new(document, "keydown", move |event| {
                let Some(event) = event.dyn_ref::<KeyboardEvent>() else {
                    return;
                };
                if is_dismiss_key(&event.key()) && is_open(&modal) {
                    dismiss(&modal, on_close.as_ref());
                }
            })?
        };

        Ok(Some(Self {
            element,
            on_close,
            _backdrop: backdrop,
            _escape: escape,
        }))
    }

    pub fn open(&self) -> Result<()> {
        open(&self.element)
    }

    pub fn close(&self) -> Result<()> {
        close(&self.element)?;
        (self.on_close)();
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        is_open(&self.element)
    }
}
