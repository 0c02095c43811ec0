use std::cell::Cell;
use std::rc::Rc;

use log::debug;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::js_sys::Array;
use web_sys::{
    Document, HtmlElement, IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit,
};

use crate::config::EffectsConfig;
use crate::dom::{self, Listener};
use crate::error::Result;
use crate::timing::FrameGate;

pub fn parallax_offset(scrolled: f64, speed: f64) -> f64 {
    -(scrolled * speed)
}

pub fn translate_y(offset: f64) -> String {
    format!("translateY({}px)", offset)
}

/// Fades elements in the first time they scroll into view.
pub struct Reveal {
    observer: IntersectionObserver,
    _callback: Closure<dyn FnMut(Array, IntersectionObserver)>,
}

impl Reveal {
    pub fn start(document: &Document, config: &EffectsConfig) -> Result<Self> {
        let class = config.reveal_class.clone();
        let callback = Closure::wrap(Box::new(move |entries: Array, observer: IntersectionObserver| {
            for entry in entries.iter() {
                let Ok(entry) = entry.dyn_into::<IntersectionObserverEntry>() else {
                    continue;
                };
                if entry.is_intersecting() {
                    let target = entry.target();
                    let _ = target.class_list().add_1(&class);
                    // One reveal per element; re-entering the viewport does nothing.
                    observer.unobserve(&target);
                }
            }
        }) as Box<dyn FnMut(Array, IntersectionObserver)>);

        let init = IntersectionObserverInit::new();
        init.set_threshold(&JsValue::from_f64(config.reveal_threshold));
        init.set_root_margin(&config.reveal_root_margin);
        let observer =
            IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init)?;

        let targets = dom::query_all(document, &config.reveal_selector)?;
        for target in &targets {
            observer.observe(target);
        }
        debug!("Observing {} elements for fade-in", targets.len());

        Ok(Self {
            observer,
            _callback: callback,
        })
    }
}

impl Drop for Reveal {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

/// Moves decorative elements against the scroll direction, at most once per
/// animation frame.
pub struct Parallax {
    _scroll: Listener,
    gate: FrameGate,
    request: Rc<Cell<Option<i32>>>,
    _frame: Rc<Closure<dyn FnMut()>>,
}

impl Parallax {
    pub fn start(config: &EffectsConfig) -> Result<Self> {
        let window = dom::window()?;
        let gate = FrameGate::new();
        let request = Rc::new(Cell::new(None));

        let frame = {
            let window = window.clone();
            let gate = gate.clone();
            let request = request.clone();
            let selector = config.parallax_selector.clone();
            let speed = config.parallax_speed;
            Closure::wrap(Box::new(move || {
                let scrolled = window.scroll_y().unwrap_or(0.0);
                let transform = translate_y(parallax_offset(scrolled, speed));
                if let Some(document) = window.document() {
                    for element in dom::query_all(&document, &selector).unwrap_or_default() {
                        if let Some(element) = element.dyn_ref::<HtmlElement>() {
                            let _ = element.style().set_property("transform", &transform);
                        }
                    }
                }
                request.set(None);
                gate.release();
            }) as Box<dyn FnMut()>)
        };
        let frame = Rc::new(frame);

        let scroll = {
            let scroll_window = window.clone();
            let gate = gate.clone();
            let request = request.clone();
            let frame = frame.clone();
            Listener::new(&window, "scroll", move |_| {
                if !gate.try_acquire() {
                    return;
                }
                let callback: &Closure<dyn FnMut()> = &frame;
                match scroll_window.request_animation_frame(callback.as_ref().unchecked_ref()) {
                    Ok(id) => request.set(Some(id)),
                    Err(_) => gate.release(),
                }
            })?
        };

        Ok(Self {
            _scroll: scroll,
            gate,
            request,
            _frame: frame,
        })
    }

    pub fn frame_pending(&self) -> bool {
        self.gate.is_ticking()
    }
}

impl Drop for Parallax {
    fn drop(&mut self) {
        if let (Some(id), Some(window)) = (self.request.take(), web_sys::window()) {
            let _ = window.cancel_animation_frame(id);
        }
    }
}
