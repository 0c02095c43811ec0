use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use yew::prelude::*;
use yew::AppHandle;

use crate::config::ToastConfig;
use crate::dom;
use crate::error::Result;

/// Lifecycle of an error toast. Each stage lasts `delay_ms` before `next`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastStage {
    Entering,
    Visible,
    Leaving,
    Removed,
}

impl ToastStage {
    pub fn next(self) -> Self {
        match self {
            ToastStage::Entering => ToastStage::Visible,
            ToastStage::Visible => ToastStage::Leaving,
            ToastStage::Leaving | ToastStage::Removed => ToastStage::Removed,
        }
    }

    pub fn delay_ms(self, config: &ToastConfig) -> Option<u32> {
        match self {
            ToastStage::Entering => Some(config.enter_delay_ms),
            // Lifetime counts from insertion, so the entry delay is already spent.
            ToastStage::Visible => Some(config.lifetime_ms.saturating_sub(config.enter_delay_ms)),
            ToastStage::Leaving => Some(config.exit_ms),
            ToastStage::Removed => None,
        }
    }

    pub fn offscreen(self) -> bool {
        matches!(self, ToastStage::Entering | ToastStage::Leaving)
    }
}

#[derive(Properties, PartialEq, Clone)]
pub struct ErrorToastProps {
    pub message: String,
    pub timings: ToastConfig,
    pub on_removed: Callback<()>,
}

#[function_component(ErrorToast)]
pub fn error_toast(props: &ErrorToastProps) -> Html {
    let stage = use_state(|| ToastStage::Entering);

    {
        let stage_setter = stage.setter();
        let timings = props.timings;
        let on_removed = props.on_removed.clone();
        use_effect_with_deps(
            move |current: &ToastStage| {
                let current = *current;
                let timeout = match current.delay_ms(&timings) {
                    Some(delay) => Some(Timeout::new(delay, move || {
                        stage_setter.set(current.next());
                    })),
                    None => {
                        on_removed.emit(());
                        None
                    }
                };
                move || drop(timeout) // A stage change or unmount cancels the pending step
            },
            *stage,
        );
    }

    let dismiss = {
        let stage = stage.clone();
        Callback::from(move |_: MouseEvent| stage.set(ToastStage::Removed))
    };

    if *stage == ToastStage::Removed {
        return html! {};
    }

    let slide = (*stage).offscreen().then(|| "translate-x-full");

    html! {
        <div
            role="alert"
            data-toast="error"
            class={classes!(
                "fixed", "top-4", "right-4", "bg-red-500", "text-white", "px-6", "py-4",
                "rounded-lg", "shadow-lg", "z-50", "transform", "transition-transform",
                "duration-300", slide
            )}
        >
            <div class="flex items-center space-x-3">
                <svg class="w-6 h-6" fill="currentColor" viewBox="0 0 20 20">
                    <path fill-rule="evenodd" clip-rule="evenodd"
                        d="M18 10a8 8 0 11-16 0 8 8 0 0116 0zm-7 4a1 1 0 11-2 0 1 1 0 012 0zm-1-9a1 1 0 00-1 1v4a1 1 0 102 0V6a1 1 0 00-1-1z" />
                </svg>
                <span class="toast-message">{ props.message.clone() }</span>
                <button type="button" aria-label="Cerrar" class="ml-4 hover:text-red-200" onclick={dismiss}>
                    <svg class="w-5 h-5" fill="currentColor" viewBox="0 0 20 20">
                        <path fill-rule="evenodd" clip-rule="evenodd"
                            d="M4.293 4.293a1 1 0 011.414 0L10 8.586l4.293-4.293a1 1 0 111.414 1.414L11.414 10l4.293 4.293a1 1 0 01-1.414 1.414L10 11.414l-4.293 4.293a1 1 0 01-1.414-1.414L8.586 10 4.293 5.707a1 1 0 010-1.414z" />
                    </svg>
                </button>
            </div>
        </div>
    }
}

/// Mounts a toast in a fresh node at the end of `<body>`; the node is removed
/// together with the toast.
pub fn show(message: &str, timings: ToastConfig) -> Result<()> {
    let document = dom::document()?;
    let host = document.create_element("div")?;
    dom::body()?.append_child(&host)?;

    let app: Rc<RefCell<Option<AppHandle<ErrorToast>>>> = Rc::new(RefCell::new(None));
    let on_removed = {
        let app = app.clone();
        let host = host.clone();
        Callback::from(move |_: ()| {
            let app = app.clone();
            let host = host.clone();
            // Unmount outside the component's own render cycle.
            Timeout::new(0, move || {
                if let Some(handle) = app.borrow_mut().take() {
                    handle.destroy();
                }
                host.remove();
            })
            .forget();
        })
    };

    let props = ErrorToastProps {
        message: message.to_string(),
        timings,
        on_removed,
    };
    let handle = yew::Renderer::<ErrorToast>::with_root_and_props(host, props).render();
    *app.borrow_mut() = Some(handle);
    Ok(())
}
