//! Thin helpers over `web-sys` shared by every initializer.

use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, EventTarget, HtmlElement, Node, NodeList, Window};

use crate::error::{Error, Result};

pub fn window() -> Result<Window> {
    web_sys::window().ok_or(Error::MissingGlobal("window"))
}

pub fn document() -> Result<Document> {
    window()?.document().ok_or(Error::MissingGlobal("document"))
}

pub fn body() -> Result<HtmlElement> {
    document()?.body().ok_or(Error::MissingGlobal("body"))
}

/// Every element under `root` (a document or an element) matching `selector`.
pub fn query_all(root: &Node, selector: &str) -> Result<Vec<Element>> {
    let list = if let Some(element) = root.dyn_ref::<Element>() {
        element.query_selector_all(selector)?
    } else if let Some(document) = root.dyn_ref::<Document>() {
        document.query_selector_all(selector)?
    } else {
        return Ok(Vec::new());
    };
    Ok(elements(&list))
}

pub fn elements(list: &NodeList) -> Vec<Element> {
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

/// First element matching any selector, trying selectors in order.
pub fn first_match(document: &Document, selectors: &[String]) -> Option<Element> {
    selectors
        .iter()
        .find_map(|selector| document.query_selector(selector).ok().flatten())
}

/// An event listener that is removed again when dropped.
pub struct Listener {
    target: EventTarget,
    event: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl Listener {
    pub fn new<F>(target: &EventTarget, event: &'static str, handler: F) -> Result<Self>
    where
        F: FnMut(Event) + 'static,
    {
        let callback = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
        target.add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            event,
            callback,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.event, self.callback.as_ref().unchecked_ref());
    }
}
