use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};

/// Failures raised while wiring the page. None of them are shown to the visitor.
#[derive(Debug, Error)]
pub enum Error {
    #[error("javascript error: {0}")]
    Js(String),

    #[error("missing global: {0}")]
    MissingGlobal(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<JsValue> for Error {
    fn from(value: JsValue) -> Self {
        let message = value
            .as_string()
            .or_else(|| {
                value
                    .dyn_ref::<web_sys::js_sys::Error>()
                    .map(|err| String::from(err.message()))
            })
            .unwrap_or_else(|| format!("{:?}", value));
        Error::Js(message)
    }
}

impl From<Error> for JsValue {
    fn from(err: Error) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
