use std::rc::Rc;

use log::{error, info, warn};
use web_sys::{ScrollBehavior, ScrollToOptions};

use crate::analytics::{self, Analytics, EventParams};
use crate::components::toast;
use crate::config::ToastConfig;
use crate::dom;
use crate::modal::SuccessModal;
use crate::submission::Outcome;

/// Turns submission outcomes into what the visitor sees and what gets tracked.
pub struct Presenter {
    analytics: Analytics,
    modal: Option<Rc<SuccessModal>>,
    toast: ToastConfig,
    form_type: String,
}

impl Presenter {
    pub fn new(
        analytics: Analytics,
        modal: Option<Rc<SuccessModal>>,
        toast: ToastConfig,
        form_type: &str,
    ) -> Self {
        Self {
            analytics,
            modal,
            toast,
            form_type: form_type.to_string(),
        }
    }

    pub fn present(&self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.success(),
            Outcome::Error { message } => self.failure(&message),
        }
    }

    fn success(&self) {
        info!("Form submitted successfully");
        self.analytics.track(
            analytics::FORM_SUBMIT_SUCCESS,
            EventParams::new().with("form_type", self.form_type.as_str()),
        );

        if let Some(modal) = &self.modal {
            if let Err(e) = modal.open() {
                warn!("Could not open success modal: {}", e);
            }
        }

        if let Ok(window) = dom::window() {
            let options = ScrollToOptions::new();
            options.set_top(0.0);
            options.set_behavior(ScrollBehavior::Smooth);
            window.scroll_to_with_scroll_to_options(&options);
        }
    }

    fn failure(&self, message: &str) {
        error!("Form submission error: {}", message);
        self.analytics.track(
            analytics::FORM_SUBMIT_ERROR,
            EventParams::new()
                .with("form_type", self.form_type.as_str())
                .with("error_message", message),
        );

        if let Err(e) = toast::show(message, self.toast) {
            warn!("Could not show error notification: {}", e);
        }
    }
}
