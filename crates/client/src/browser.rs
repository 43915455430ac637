//! Browser bindings
//!
//! The thin web-sys layer: page identity, navigation-timing snapshot,
//! heap-memory probe, the sendBeacon teardown primitive, and the
//! page-teardown hook. Everything here degrades to `None`/no-op when the
//! browser withholds an API.

use std::sync::Arc;

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;

use crate::tracer::JourneyTracer;
use crate::vitals::{MemoryInfo, PageTimings, VitalsHandle};

/// User agent, URL and referrer of the current page
pub fn page_identity() -> (String, String, String) {
    let Some(window) = web_sys::window() else {
        return (String::new(), String::new(), String::new());
    };

    let user_agent = window.navigator().user_agent().unwrap_or_default();
    let url = window.location().href().unwrap_or_default();
    let referrer = window
        .document()
        .map(|document| document.referrer())
        .unwrap_or_default();

    (user_agent, url, referrer)
}

/// Snapshot the page-load navigation timings
pub fn page_timings() -> Option<PageTimings> {
    let performance = web_sys::window()?.performance()?;
    let entry = performance.get_entries_by_type("navigation").get(0);
    let timing: web_sys::PerformanceNavigationTiming = entry.dyn_into().ok()?;

    let fetch_start = timing.fetch_start();
    Some(PageTimings {
        redirect_ms: timing.redirect_end() - timing.redirect_start(),
        dns_ms: timing.domain_lookup_end() - timing.domain_lookup_start(),
        connect_ms: timing.connect_end() - timing.connect_start(),
        response_ms: timing.response_end() - timing.response_start(),
        dom_ready_ms: timing.dom_content_loaded_event_end() - fetch_start,
        load_ms: timing.load_event_end() - fetch_start,
    })
}

/// Read the non-standard `performance.memory` heap counters, if exposed
pub fn memory_info() -> Option<MemoryInfo> {
    let performance = web_sys::window()?.performance()?;
    let memory = js_sys::Reflect::get(performance.as_ref(), &"memory".into()).ok()?;
    if memory.is_undefined() {
        return None;
    }

    let read = |key: &str| {
        js_sys::Reflect::get(&memory, &key.into())
            .ok()
            .and_then(|value| value.as_f64())
    };

    Some(MemoryInfo {
        used_js_heap_size: read("usedJSHeapSize")?,
        total_js_heap_size: read("totalJSHeapSize")?,
    })
}

/// Hand a payload to `navigator.sendBeacon`
///
/// Returns whether the browser accepted the payload for delivery; the
/// actual transmission happens after the page context may already be gone.
pub fn send_beacon(url: &str, body: &str) -> bool {
    let Some(window) = web_sys::window() else {
        return false;
    };

    let parts = js_sys::Array::new();
    parts.push(&wasm_bindgen::JsValue::from_str(body));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type("application/json");

    let Ok(blob) = web_sys::Blob::new_with_str_sequence_and_options(&parts, &options) else {
        return false;
    };

    window
        .navigator()
        .send_beacon_with_opt_blob(url, Some(&blob))
        .unwrap_or(false)
}

/// Start the passive web-vitals observers feeding the tracer's handle
///
/// The layout-shift and first-input fields are read through `Reflect`
/// because their interfaces are not exposed by stable web-sys bindings.
pub fn install_vitals_observers(vitals: &VitalsHandle) {
    let lcp = vitals.clone();
    observe_entries("largest-contentful-paint", move |entry| {
        lcp.record_lcp(entry.start_time());
    });

    let fid = vitals.clone();
    observe_entries("first-input", move |entry| {
        let processing_start = js_sys::Reflect::get(entry.as_ref(), &"processingStart".into())
            .ok()
            .and_then(|value| value.as_f64());
        if let Some(processing_start) = processing_start {
            fid.record_fid(processing_start - entry.start_time());
        }
    });

    let cls = vitals.clone();
    observe_entries("layout-shift", move |entry| {
        let had_recent_input = js_sys::Reflect::get(entry.as_ref(), &"hadRecentInput".into())
            .ok()
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        if had_recent_input {
            return;
        }
        if let Some(value) = js_sys::Reflect::get(entry.as_ref(), &"value".into())
            .ok()
            .and_then(|value| value.as_f64())
        {
            cls.record_layout_shift(value);
        }
    });
}

fn observe_entries(entry_type: &str, callback: impl Fn(web_sys::PerformanceEntry) + 'static) {
    let closure = Closure::<dyn FnMut(web_sys::PerformanceObserverEntryList)>::new(
        move |list: web_sys::PerformanceObserverEntryList| {
            for entry in list.get_entries().iter() {
                if let Ok(entry) = entry.dyn_into::<web_sys::PerformanceEntry>() {
                    callback(entry);
                }
            }
        },
    );

    let Ok(observer) = web_sys::PerformanceObserver::new(closure.as_ref().unchecked_ref()) else {
        return;
    };

    let init = web_sys::PerformanceObserverInit::new();
    init.set_entry_types(&js_sys::Array::of1(&wasm_bindgen::JsValue::from_str(
        entry_type,
    )));
    observer.observe(&init);
    closure.forget();
}

/// Finalize open journeys and drain the queue when the page goes away
///
/// `pagehide` fires on both navigation and tab close; `beforeunload` is not
/// reliable on mobile.
pub fn install_teardown_hook(tracer: Arc<JourneyTracer>) {
    let Some(window) = web_sys::window() else {
        return;
    };

    let closure = Closure::<dyn FnMut()>::new(move || {
        tracer.teardown();
    });
    if window
        .add_event_listener_with_callback("pagehide", closure.as_ref().unchecked_ref())
        .is_ok()
    {
        closure.forget();
    }
}
