use std::ffi::NulError;

/// Errors raised while hosting the Mono runtime.
#[derive(Debug, thiserror::Error)]
pub enum MonoError {
    #[error("Failed to initialize Mono: {0}")]
    Initialization(String),
    #[error("Unable to load assembly {path}")]
    AssemblyLoad { path: String },
    #[error("Unable to load image from assembly")]
    ImageLoad,
    #[error("Could not find method {type_name}.{method_name} in assembly")]
    MethodNotFound {
        type_name: String,
        method_name: String,
    },
    #[error("Failed to call method{}", exception_suffix(.exception))]
    Invocation { exception: Option<String> },
    #[error("Failed to convert result to int")]
    ResultConversion,
    #[error("Only the root domain is supported, requested domain {0:?}")]
    NotImplemented(String),
    #[error("The Mono runtime is not initialized")]
    NotInitialized,
    #[error("The Mono runtime was released; handles created before the release are no longer valid")]
    RuntimeReleased,
    #[error("Buffer of {0} bytes does not fit the int32 size argument")]
    BufferTooLarge(usize),
    #[error("String passed to Mono contains an interior nul byte")]
    InvalidString(#[from] NulError),
}

fn exception_suffix(exception: &Option<String>) -> String {
    match exception {
        Some(message) => format!(": {}", message),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, MonoError>;
