//! C ABI over [`packndocs_core::Runtime`] for the iOS and Android shells.
//!
//! Every call exchanges UTF-8 JSON. Strings returned to the host are owned by
//! the host and go back through `pd_free_c_string`.

use std::{
    ffi::{c_char, c_void, CStr, CString},
    ptr,
    str::Utf8Error,
    sync::{Arc, Mutex},
};

use packndocs_core::{InvokeError, InvokeResponse, Runtime};
use serde_json::Value;
use tracing::{debug, error};

type PdEventCallback = unsafe extern "C" fn(event_json: *const c_char, user_data: *mut c_void);

const DEFAULT_LOG_FILTER: &str = "packndocs_core=info";

/// Host function plus the opaque pointer it wants handed back.
#[derive(Clone, Copy)]
struct HostListener {
    callback: PdEventCallback,
    user_data: usize,
}

impl HostListener {
    fn deliver(self, envelope: &Value) {
        let Ok(text) = CString::new(envelope.to_string()) else {
            error!("event envelope contains NUL; dropped");
            return;
        };
        unsafe { (self.callback)(text.as_ptr(), self.user_data as *mut c_void) };
    }
}

type ListenerSlot = Arc<Mutex<Option<HostListener>>>;

fn current_listener(slot: &ListenerSlot) -> Option<HostListener> {
    *slot.lock().expect("host listener slot poisoned")
}

fn replace_listener(slot: &ListenerSlot, listener: Option<HostListener>) {
    *slot.lock().expect("host listener slot poisoned") = listener;
}

#[repr(C)]
pub struct PdRuntimeHandle {
    runtime: Runtime,
    listener: ListenerSlot,
}

/// First call wins; a subscriber the host installed earlier is left alone.
fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

/// `Ok(None)` for a null pointer.
unsafe fn borrow_str<'a>(raw: *const c_char) -> Result<Option<&'a str>, Utf8Error> {
    if raw.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(raw).to_str().map(Some)
}

fn failure(code: &str, message: impl Into<String>) -> String {
    let response = InvokeResponse {
        ok: false,
        data: None,
        error: Some(InvokeError::new(code, message)),
    };
    serde_json::to_string(&response).unwrap_or_else(|_| {
        r#"{"ok":false,"error":{"code":"internal","message":"failed to encode error"}}"#.to_string()
    })
}

fn hand_over(text: String) -> *mut c_char {
    match CString::new(text) {
        Ok(text) => text.into_raw(),
        Err(_) => match CString::new(failure("internal", "response contains NUL")) {
            Ok(text) => text.into_raw(),
            Err(_) => ptr::null_mut(),
        },
    }
}

/// A null or empty config selects the defaults. Returns null when the config
/// is not UTF-8 or the runtime cannot start; the reason is logged.
#[no_mangle]
pub unsafe extern "C" fn pd_runtime_new(config_json: *const c_char) -> *mut PdRuntimeHandle {
    init_logging();

    let config = match borrow_str(config_json) {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            error!(error = %err, "runtime config is not UTF-8");
            return ptr::null_mut();
        }
    };

    let runtime = match Runtime::new(config) {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %format!("{err:#}"), "runtime failed to start");
            return ptr::null_mut();
        }
    };

    let listener = ListenerSlot::default();
    let slot = Arc::clone(&listener);
    runtime.set_event_callback(move |_event, envelope| {
        if let Some(host) = current_listener(&slot) {
            host.deliver(envelope);
        }
    });

    debug!("runtime handle created");
    Box::into_raw(Box::new(PdRuntimeHandle { runtime, listener }))
}

#[no_mangle]
pub unsafe extern "C" fn pd_runtime_free(handle: *mut PdRuntimeHandle) {
    if handle.is_null() {
        return;
    }
    let handle = Box::from_raw(handle);
    handle.runtime.clear_event_callback();
    replace_listener(&handle.listener, None);
}

/// A null `callback` stops event delivery.
#[no_mangle]
pub unsafe extern "C" fn pd_set_event_callback(
    handle: *mut PdRuntimeHandle,
    callback: Option<PdEventCallback>,
    user_data: *mut c_void,
) {
    let Some(handle) = handle.as_ref() else {
        return;
    };
    let listener = callback.map(|callback| HostListener {
        callback,
        user_data: user_data as usize,
    });
    replace_listener(&handle.listener, listener);
}

/// Runs one JSON command and returns the JSON response.
#[no_mangle]
pub unsafe extern "C" fn pd_invoke_json(
    handle: *mut PdRuntimeHandle,
    request_json: *const c_char,
) -> *mut c_char {
    let Some(handle) = handle.as_ref() else {
        return hand_over(failure("invalid_handle", "runtime handle is null"));
    };

    let response = match borrow_str(request_json) {
        Ok(Some(request)) => handle.runtime.invoke_json(request),
        Ok(None) => failure("invalid_request", "request is null"),
        Err(err) => failure("invalid_request", format!("request is not UTF-8: {err}")),
    };
    hand_over(response)
}

#[no_mangle]
pub unsafe extern "C" fn pd_free_c_string(text: *mut c_char) {
    if !text.is_null() {
        drop(CString::from_raw(text));
    }
}
