use lazy_static::lazy_static;
use renderdoc::{RenderDoc, V110};
use std::{ffi::c_void, ptr::null, sync::Mutex};

lazy_static! {
    static ref RENDERDOC: Option<Mutex<RenderDoc<V110>>> =
        RenderDoc::<V110>::new().ok().map(Mutex::new);
}

/// True when the process was launched from RenderDoc.
pub fn renderdoc_attached() -> bool {
    RENDERDOC.is_some()
}

/// Runs `function` inside a RenderDoc frame capture when `enabled` and
/// RenderDoc is attached. Otherwise just runs it.
pub fn capture_if<F, R>(enabled: bool, function: F) -> R
where
    F: FnOnce() -> R,
{
    let mut renderdoc = RENDERDOC
        .as_ref()
        .filter(|_| enabled)
        .and_then(|r| r.lock().ok());

    if let Some(doc) = renderdoc.as_mut() {
        doc.start_frame_capture(null::<c_void>(), null::<c_void>());
    }

    let result = function();

    if let Some(doc) = renderdoc.as_mut() {
        doc.end_frame_capture(null::<c_void>(), null::<c_void>());
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_capture_still_runs_the_closure() {
        assert_eq!(capture_if(false, || 7), 7);
    }

    #[test]
    fn enabled_capture_without_renderdoc_is_transparent() {
        if !renderdoc_attached() {
            assert_eq!(capture_if(true, || "ran"), "ran");
        }
    }
}
