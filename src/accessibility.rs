use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use log::debug;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, HtmlElement, HtmlInputElement, KeyboardEvent, ScrollBehavior,
    ScrollIntoViewOptions, ScrollLogicalPosition,
};

use crate::analytics::{self, Analytics, EventParams};
use crate::config::AccessibilityConfig;
use crate::dom::{self, Listener};
use crate::error::Result;

const SKIP_LINK_CLASS: &str = "sr-only focus:not-sr-only focus:absolute focus:top-4 focus:left-4 bg-blue-600 text-white px-4 py-2 rounded z-50";

pub fn is_activation_key(key: &str) -> bool {
    matches!(key, "Enter" | " ")
}

/// Whether Enter/Space on this control should be turned into a click.
/// Controls that take typed text keep both keys for themselves.
pub fn takes_activation(tag: &str, input_type: Option<&str>) -> bool {
    match tag.to_ascii_lowercase().as_str() {
        "textarea" | "select" => false,
        "input" => matches!(
            input_type.map(str::to_ascii_lowercase).as_deref(),
            Some("checkbox" | "radio" | "submit" | "button" | "reset" | "image" | "file")
        ),
        _ => true,
    }
}

fn accepts_activation(element: &Element) -> bool {
    let input_type = element.dyn_ref::<HtmlInputElement>().map(|input| input.type_());
    takes_activation(&element.tag_name(), input_type.as_deref())
}

/// Adds the skip link as the first child of `<body>` unless one exists.
pub fn inject_skip_link(document: &Document, config: &AccessibilityConfig) -> Result<()> {
    let href = format!("#{}", config.main_content_id);
    if document
        .query_selector(&format!(r#"body > a[href="{}"]"#, href))?
        .is_some()
    {
        return Ok(());
    }

    let link = document.create_element("a")?;
    link.set_attribute("href", &href)?;
    link.set_text_content(Some(&config.skip_link_label));
    link.set_class_name(SKIP_LINK_CLASS);
    let body = dom::body()?;
    body.insert_before(&link, body.first_child().as_ref())?;
    Ok(())
}

/// Gives the primary content region a stable id when it has none.
pub fn mark_main_content(document: &Document, config: &AccessibilityConfig) {
    let main = config
        .main_content_selectors
        .iter()
        .find_map(|selector| document.query_selector(selector).ok().flatten());
    if let Some(main) = main {
        if main.id().is_empty() {
            main.set_id(&config.main_content_id);
        }
    }
}

const PULSED: &str = "scale(1.02)";
const RESTING: &str = "scale(1)";

/// Timers of the CTA highlight and the section it has scaled up, if any.
#[derive(Default)]
struct Pulse {
    grow: Option<Timeout>,
    settle: Option<Timeout>,
    scaled: Option<HtmlElement>,
}

impl Pulse {
    /// Cancels pending steps and puts a scaled section back to rest.
    fn reset(&mut self) {
        self.grow.take();
        self.settle.take();
        if let Some(section) = self.scaled.take() {
            let _ = section.style().set_property("transform", RESTING);
        }
    }
}

fn highlight(slot: &Rc<RefCell<Pulse>>, section: &HtmlElement, config: &AccessibilityConfig) {
    slot.borrow_mut().reset();

    let weak = Rc::downgrade(slot);
    let section = section.clone();
    let hold_ms = config.highlight_hold_ms;
    let grow = Timeout::new(config.highlight_delay_ms, move || {
        let Some(slot) = weak.upgrade() else {
            return;
        };
        let style = section.style();
        let _ = style.set_property("transform", PULSED);
        let _ = style.set_property("transition", "transform 0.3s ease-in-out");

        let settle = {
            let weak = Rc::downgrade(&slot);
            let section = section.clone();
            Timeout::new(hold_ms, move || {
                let _ = section.style().set_property("transform", RESTING);
                if let Some(slot) = weak.upgrade() {
                    slot.borrow_mut().scaled = None;
                }
            })
        };
        let mut pulse = slot.borrow_mut();
        pulse.scaled = Some(section.clone());
        pulse.settle = Some(settle);
    });
    slot.borrow_mut().grow = Some(grow);
}

/// Page-level accessibility behaviour installed once per session.
pub struct Accessibility {
    _listeners: Vec<Listener>,
    pulse: Rc<RefCell<Pulse>>,
}

impl Accessibility {
    pub fn install(
        document: &Document,
        config: &AccessibilityConfig,
        analytics: &Analytics,
    ) -> Result<Self> {
        inject_skip_link(document, config)?;
        mark_main_content(document, config);

        let mut listeners = Vec::new();
        let pulse: Rc<RefCell<Pulse>> = Rc::new(RefCell::new(Pulse::default()));

        if let Some(cta) = document.query_selector(&config.cta_selector)? {
            let document = document.clone();
            let config = config.clone();
            let analytics = analytics.clone();
            let pulse = pulse.clone();
            let label = cta.text_content().unwrap_or_default().trim().to_string();
            listeners.push(Listener::new(&cta, "click", move |event| {
                event.prevent_default();
                let Some(section) = document
                    .get_element_by_id(&config.form_section_id)
                    .and_then(|section| section.dyn_into::<HtmlElement>().ok())
                else {
                    return;
                };

                let options = ScrollIntoViewOptions::new();
                options.set_behavior(ScrollBehavior::Smooth);
                options.set_block(ScrollLogicalPosition::Center);
                section.scroll_into_view_with_scroll_into_view_options(&options);

                highlight(&pulse, &section, &config);

                analytics.track(
                    analytics::CTA_BUTTON_CLICK,
                    EventParams::new()
                        .with("button_text", label.as_str())
                        .with("target", config.form_section_id.as_str()),
                );
            })?);
        }

        // Delegated so that controls rendered later by the widget are covered too.
        let focusable = config.focusable_selector.clone();
        listeners.push(Listener::new(document, "keydown", move |event| {
            let Some(key_event) = event.dyn_ref::<KeyboardEvent>() else {
                return;
            };
            if !is_activation_key(&key_event.key()) {
                return;
            }
            let Some(control) = event
                .target()
                .and_then(|target| target.dyn_into::<Element>().ok())
                .and_then(|target| target.closest(&focusable).ok().flatten())
            else {
                return;
            };
            if !accepts_activation(&control) {
                return;
            }
            if let Some(control) = control.dyn_ref::<HtmlElement>() {
                event.prevent_default();
                control.click();
            }
        })?);

        debug!("Accessibility helpers installed");
        Ok(Self {
            _listeners: listeners,
            pulse,
        })
    }
}

impl Drop for Accessibility {
    fn drop(&mut self) {
        self.pulse.borrow_mut().reset();
    }
}
