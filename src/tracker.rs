//! Observes how visitors fill in the embedded form. Listeners here only
//! report; they never cancel or alter the widget's own handling.

use std::rc::Rc;

use log::{debug, info};
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement};

use crate::analytics::{self, Analytics, EventParams};
use crate::config::TrackingConfig;
use crate::dom::{self, Listener};
use crate::error::Result;
use crate::timing::Debouncer;

/// Set on a form once its listeners are attached.
pub const ATTACHED_ATTR: &str = "data-lead-tracking";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSnapshot {
    pub name: String,
    pub kind: String,
    pub has_value: bool,
}

impl FieldSnapshot {
    pub fn new(name: &str, kind: &str, value: &str) -> Self {
        let name = if name.is_empty() { kind } else { name };
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            has_value: !value.is_empty(),
        }
    }

    /// Reads the current state of an `input`, `select` or `textarea`.
    pub fn read(field: &Element) -> Option<Self> {
        if let Some(input) = field.dyn_ref::<HtmlInputElement>() {
            Some(Self::new(&input.name(), &input.type_(), &input.value()))
        } else if let Some(select) = field.dyn_ref::<HtmlSelectElement>() {
            Some(Self::new(&select.name(), &select.type_(), &select.value()))
        } else {
            field
                .dyn_ref::<HtmlTextAreaElement>()
                .map(|area| Self::new(&area.name(), &area.type_(), &area.value()))
        }
    }

    pub fn identity(&self) -> EventParams {
        EventParams::new()
            .with("field_name", self.name.as_str())
            .with("field_type", self.kind.as_str())
    }

    pub fn with_value(&self) -> EventParams {
        self.identity().with("has_value", self.has_value)
    }
}

/// Listeners attached to one form; dropping it detaches them.
pub struct FormTracking {
    form: Element,
    _listeners: Vec<Listener>,
    debouncers: Vec<Debouncer>,
}

impl FormTracking {
    pub fn form(&self) -> &Element {
        &self.form
    }
}

impl Drop for FormTracking {
    fn drop(&mut self) {
        for debouncer in &self.debouncers {
            debouncer.cancel();
        }
        let _ = self.form.remove_attribute(ATTACHED_ATTR);
    }
}

pub fn is_attached(form: &Element) -> bool {
    form.has_attribute(ATTACHED_ATTR)
}

/// Attaches field and submit tracking to `form`. Returns `None` when the form
/// is already tracked.
pub fn attach(
    form: &Element,
    analytics: &Analytics,
    config: &TrackingConfig,
    on_submit_click: Rc<dyn Fn()>,
) -> Result<Option<FormTracking>> {
    if is_attached(form) {
        debug!("Form already tracked, skipping");
        return Ok(None);
    }

    let mut listeners = Vec::new();
    let mut debouncers = Vec::new();

    for field in dom::query_all(form, &config.field_selector)? {
        let focus = {
            let field = field.clone();
            let analytics = analytics.clone();
            move |_| {
                if let Some(snapshot) = FieldSnapshot::read(&field) {
                    analytics.track(analytics::FORM_FIELD_FOCUS, snapshot.identity());
                }
            }
        };
        listeners.push(Listener::new(&field, "focus", focus)?);

        let blur = {
            let field = field.clone();
            let analytics = analytics.clone();
            move |_| {
                if let Some(snapshot) = FieldSnapshot::read(&field) {
                    analytics.track(analytics::FORM_FIELD_BLUR, snapshot.with_value());
                }
            }
        };
        listeners.push(Listener::new(&field, "blur", blur)?);

        let debouncer = Debouncer::new(config.input_debounce_ms);
        let input = {
            let field = field.clone();
            let analytics = analytics.clone();
            let debouncer = debouncer.clone();
            move |_| {
                let field = field.clone();
                let analytics = analytics.clone();
                debouncer.call(move || {
                    if let Some(snapshot) = FieldSnapshot::read(&field) {
                        analytics.track(analytics::FORM_FIELD_INPUT, snapshot.with_value());
                    }
                });
            }
        };
        listeners.push(Listener::new(&field, "input", input)?);
        debouncers.push(debouncer);
    }

    if let Some(submit) = form.query_selector(&config.submit_selector)? {
        let analytics = analytics.clone();
        let form_type = config.form_type.clone();
        listeners.push(Listener::new(&submit, "click", move |_| {
            on_submit_click();
            analytics.track(
                analytics::FORM_SUBMIT_CLICK,
                EventParams::new().with("form_type", form_type.as_str()),
            );
        })?);
    }

    form.set_attribute(ATTACHED_ATTR, "attached")?;
    info!("Tracking {} form listeners", listeners.len());

    Ok(Some(FormTracking {
        form: form.clone(),
        _listeners: listeners,
        debouncers,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn unnamed_fields_fall_back_to_type() {
        let snapshot = FieldSnapshot::new("", "tel", "");
        assert_eq!(snapshot.name, "tel");
        assert_eq!(snapshot.kind, "tel");
        assert!(!snapshot.has_value);
    }

    #[test]
    fn focus_payload_omits_value_state() {
        let params = FieldSnapshot::new("email", "email", "abc").identity();
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({ "field_name": "email", "field_type": "email" })
        );
    }

    #[test]
    fn blur_and_input_payload_report_value_presence() {
        let filled = FieldSnapshot::new("email", "text", "abc").with_value();
        assert_eq!(filled.get("has_value"), Some(&json!(true)));

        let empty = FieldSnapshot::new("comments", "textarea", "").with_value();
        assert_eq!(
            serde_json::to_value(&empty).unwrap(),
            json!({ "field_name": "comments", "field_type": "textarea", "has_value": false })
        );
    }

    #[test]
    fn whitespace_counts_as_a_value() {
        assert!(FieldSnapshot::new("name", "text", " ").has_value);
    }
}
