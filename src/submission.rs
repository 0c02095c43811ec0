//! Infers whether the embedded widget accepted a submission.
//!
//! The widget offers no callback, so three sources are consulted: a window
//! message from the widget, and success or error marker nodes appearing under
//! the form container. All of them feed [`SubmissionCycle::apply`], which is
//! the only place phases change. Success takes precedence: an error can be
//! superseded by a later success, never the other way round, and each outcome
//! is reported at most once per cycle. A submit click or closing the success
//! modal opens a new cycle. The widget posts one message per accepted
//! submission, so a message arriving after a message-decided success is a new
//! submission and opens its own cycle.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;
use serde::Deserialize;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::js_sys::Array;
use web_sys::{Element, MessageEvent, MutationObserver, MutationObserverInit, MutationRecord};

use crate::dom::{self, Listener};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// The widget posted its "submitted" message.
    Submitted,
    SuccessMarker,
    ErrorMarker(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Watching,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error { message: String },
}

#[derive(Debug)]
pub struct SubmissionCycle {
    phase: Phase,
    by_message: bool,
}

impl Default for SubmissionCycle {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionCycle {
    pub fn new() -> Self {
        Self {
            phase: Phase::Watching,
            by_message: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn restart(&mut self) {
        self.phase = Phase::Watching;
        self.by_message = false;
    }

    pub fn apply(&mut self, signal: Signal) -> Option<Outcome> {
        match (self.phase, signal) {
            (Phase::Succeeded, Signal::Submitted) if self.by_message => {
                self.restart();
                self.succeed(true)
            }
            (Phase::Succeeded, _) => None,
            (_, Signal::Submitted) => self.succeed(true),
            (_, Signal::SuccessMarker) => self.succeed(false),
            (Phase::Watching, Signal::ErrorMarker(message)) => {
                self.phase = Phase::Failed;
                Some(Outcome::Error { message })
            }
            (Phase::Failed, Signal::ErrorMarker(_)) => None,
        }
    }

    fn succeed(&mut self, by_message: bool) -> Option<Outcome> {
        self.phase = Phase::Succeeded;
        self.by_message = by_message;
        Some(Outcome::Success)
    }
}

/// Shared handle every signal source reports into.
#[derive(Clone)]
pub struct SubmissionFlow {
    cycle: Rc<RefCell<SubmissionCycle>>,
    on_outcome: Rc<dyn Fn(Outcome)>,
}

impl SubmissionFlow {
    pub fn new<F>(on_outcome: F) -> Self
    where
        F: Fn(Outcome) + 'static,
    {
        Self::with_cycle(Rc::new(RefCell::new(SubmissionCycle::new())), on_outcome)
    }

    /// Reports into a cycle that other owners (the success modal) may restart.
    pub fn with_cycle<F>(cycle: Rc<RefCell<SubmissionCycle>>, on_outcome: F) -> Self
    where
        F: Fn(Outcome) + 'static,
    {
        Self {
            cycle,
            on_outcome: Rc::new(on_outcome),
        }
    }

    pub fn signal(&self, signal: Signal) {
        debug!("Submission signal: {:?}", signal);
        let outcome = self.cycle.borrow_mut().apply(signal);
        if let Some(outcome) = outcome {
            (self.on_outcome)(outcome);
        }
    }

    pub fn restart(&self) {
        self.cycle.borrow_mut().restart();
    }

    pub fn phase(&self) -> Phase {
        self.cycle.borrow().phase()
    }
}

#[derive(Debug, Deserialize)]
struct WidgetMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// True when `data` is an object whose `type` equals `expected`.
pub fn is_submitted_message(data: JsValue, expected: &str) -> bool {
    if !data.is_object() {
        return false;
    }
    serde_wasm_bindgen::from_value::<WidgetMessage>(data)
        .map(|message| message.kind.as_deref() == Some(expected))
        .unwrap_or(false)
}

/// Listens for the widget's cross-context "submitted" message.
pub fn listen_for_message(flow: &SubmissionFlow, message_type: &str) -> Result<Listener> {
    let window = dom::window()?;
    let flow = flow.clone();
    let message_type = message_type.to_string();
    Listener::new(&window, "message", move |event| {
        let Some(event) = event.dyn_ref::<MessageEvent>() else {
            return;
        };
        if is_submitted_message(event.data(), &message_type) {
            flow.signal(Signal::Submitted);
        }
    })
}

/// Finds a marker among the nodes a mutation batch added.
fn added_marker(records: &Array, selector: &str) -> Option<Element> {
    records
        .iter()
        .filter_map(|record| record.dyn_into::<MutationRecord>().ok())
        .find_map(|record| {
            let added = record.added_nodes();
            if added.length() == 0 {
                return None;
            }
            let from_added = dom::elements(&added).into_iter().find_map(|element| {
                if element.matches(selector).unwrap_or(false) {
                    Some(element)
                } else {
                    element.query_selector(selector).ok().flatten()
                }
            });
            // Text swapped into an existing marker shows up as a non-element addition.
            from_added.or_else(|| {
                record
                    .target()
                    .and_then(|node| node.dyn_into::<Element>().ok())
                    .and_then(|target| target.closest(selector).ok().flatten())
            })
        })
}

/// Watches one subtree for success and error markers.
pub struct SubmissionWatch {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(Array, MutationObserver)>,
}

impl SubmissionWatch {
    pub fn start(
        root: &Element,
        flow: &SubmissionFlow,
        success_selector: &str,
        error_selector: &str,
    ) -> Result<Self> {
        let flow = flow.clone();
        let success_selector = success_selector.to_string();
        let error_selector = error_selector.to_string();
        let callback = Closure::wrap(Box::new(move |records: Array, _observer: MutationObserver| {
            if added_marker(&records, &success_selector).is_some() {
                flow.signal(Signal::SuccessMarker);
            }
            if let Some(marker) = added_marker(&records, &error_selector) {
                flow.signal(Signal::ErrorMarker(marker.text_content().unwrap_or_default()));
            }
        }) as Box<dyn FnMut(Array, MutationObserver)>);

        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        observer.observe_with_options(root, &init)?;

        Ok(Self {
            observer,
            _callback: callback,
        })
    }
}

impl Drop for SubmissionWatch {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn error(message: &str) -> Signal {
        Signal::ErrorMarker(message.to_string())
    }

    #[test]
    fn message_success_absorbs_its_marker() {
        let mut cycle = SubmissionCycle::new();
        assert_eq!(cycle.apply(Signal::Submitted), Some(Outcome::Success));
        assert_eq!(cycle.apply(Signal::SuccessMarker), None);
        assert_eq!(cycle.phase(), Phase::Succeeded);
    }

    #[test]
    fn every_message_is_its_own_submission() {
        let mut cycle = SubmissionCycle::new();
        assert_eq!(cycle.apply(Signal::Submitted), Some(Outcome::Success));
        assert_eq!(cycle.apply(Signal::Submitted), Some(Outcome::Success));
        assert_eq!(cycle.apply(error("Invalid phone")), None);
        assert_eq!(cycle.phase(), Phase::Succeeded);
    }

    #[test]
    fn message_after_marker_success_is_the_same_submission() {
        let mut cycle = SubmissionCycle::new();
        assert_eq!(cycle.apply(Signal::SuccessMarker), Some(Outcome::Success));
        assert_eq!(cycle.apply(Signal::Submitted), None);
        assert_eq!(cycle.apply(Signal::SuccessMarker), None);
    }

    #[test]
    fn restart_after_success_reports_the_next_one() {
        let mut cycle = SubmissionCycle::new();
        cycle.apply(Signal::SuccessMarker);
        cycle.restart();
        assert_eq!(cycle.apply(Signal::SuccessMarker), Some(Outcome::Success));
    }

    #[test]
    fn flow_reports_two_messages_twice() {
        let successes = Rc::new(RefCell::new(0));
        let flow = {
            let successes = successes.clone();
            SubmissionFlow::new(move |outcome| {
                if outcome == Outcome::Success {
                    *successes.borrow_mut() += 1;
                }
            })
        };
        flow.signal(Signal::Submitted);
        flow.signal(Signal::Submitted);
        assert_eq!(*successes.borrow(), 2);
    }

    #[test]
    fn error_after_success_is_ignored() {
        let mut cycle = SubmissionCycle::new();
        cycle.apply(Signal::SuccessMarker);
        assert_eq!(cycle.apply(error("Invalid phone")), None);
        assert_eq!(cycle.phase(), Phase::Succeeded);
    }

    #[test]
    fn success_supersedes_an_earlier_error() {
        let mut cycle = SubmissionCycle::new();
        assert_eq!(
            cycle.apply(error("Invalid phone")),
            Some(Outcome::Error {
                message: "Invalid phone".to_string()
            })
        );
        assert_eq!(cycle.apply(error("Invalid phone")), None);
        assert_eq!(cycle.apply(Signal::Submitted), Some(Outcome::Success));
        assert_eq!(cycle.phase(), Phase::Succeeded);
    }

    #[test]
    fn restart_opens_a_new_cycle() {
        let mut cycle = SubmissionCycle::new();
        cycle.apply(error("Required field"));
        cycle.restart();
        assert_eq!(cycle.phase(), Phase::Watching);
        assert_eq!(
            cycle.apply(error("Invalid email")),
            Some(Outcome::Error {
                message: "Invalid email".to_string()
            })
        );
    }

    #[test]
    fn flow_runs_side_effects_per_transition() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let flow = {
            let seen = seen.clone();
            SubmissionFlow::new(move |outcome| seen.borrow_mut().push(outcome))
        };

        flow.signal(error("Invalid phone"));
        flow.signal(error("Invalid phone"));
        flow.signal(Signal::SuccessMarker);
        flow.signal(Signal::SuccessMarker);

        assert_eq!(
            *seen.borrow(),
            vec![
                Outcome::Error {
                    message: "Invalid phone".to_string()
                },
                Outcome::Success,
            ]
        );
        assert_eq!(flow.phase(), Phase::Succeeded);
    }

    #[test]
    fn side_effects_may_signal_again() {
        // An outcome handler that feeds back into the flow must not hit a held borrow.
        let slot: Rc<RefCell<Option<SubmissionFlow>>> = Rc::new(RefCell::new(None));
        let flow = {
            let slot = slot.clone();
            SubmissionFlow::new(move |_| {
                if let Some(flow) = slot.borrow().as_ref() {
                    flow.signal(Signal::SuccessMarker);
                }
            })
        };
        *slot.borrow_mut() = Some(flow.clone());

        flow.signal(Signal::Submitted);
        assert_eq!(flow.phase(), Phase::Succeeded);
        slot.borrow_mut().take();
    }
}
