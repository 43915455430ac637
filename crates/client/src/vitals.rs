//! Page timing and web-vitals snapshots
//!
//! Page-load timings are captured once per page and stamped onto every
//! journey at start. Web vitals accumulate over the page's lifetime through
//! passive observers feeding a [`VitalsHandle`]; the snapshot is attached
//! when a journey ends.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use waypoint_core::model::AttrMap;
use waypoint_core::score::{CLS_ATTR, FID_ATTR, LCP_ATTR};

/// Page-load timing durations in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PageTimings {
    pub redirect_ms: f64,
    pub dns_ms: f64,
    pub connect_ms: f64,
    pub response_ms: f64,
    pub dom_ready_ms: f64,
    pub load_ms: f64,
}

impl PageTimings {
    /// Merge the timings into a journey attribute map
    pub fn apply_to(&self, attrs: &mut AttrMap) {
        attrs.insert("page.redirect_ms".to_string(), self.redirect_ms.into());
        attrs.insert("page.dns_ms".to_string(), self.dns_ms.into());
        attrs.insert("page.connect_ms".to_string(), self.connect_ms.into());
        attrs.insert("page.response_ms".to_string(), self.response_ms.into());
        attrs.insert("page.dom_ready_ms".to_string(), self.dom_ready_ms.into());
        attrs.insert("page.load_ms".to_string(), self.load_ms.into());
    }
}

/// Web-vitals observations collected so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WebVitals {
    /// Largest contentful paint, milliseconds
    pub lcp: Option<f64>,
    /// First input delay, milliseconds
    pub fid: Option<f64>,
    /// Cumulative layout shift, unitless
    pub cls: Option<f64>,
}

impl WebVitals {
    /// Merge the available observations into a journey attribute map
    pub fn apply_to(&self, attrs: &mut AttrMap) {
        if let Some(lcp) = self.lcp {
            attrs.insert(LCP_ATTR.to_string(), lcp.into());
        }
        if let Some(fid) = self.fid {
            attrs.insert(FID_ATTR.to_string(), fid.into());
        }
        if let Some(cls) = self.cls {
            attrs.insert(CLS_ATTR.to_string(), cls.into());
        }
    }
}

/// JS heap usage, when the browser exposes it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub used_js_heap_size: f64,
    pub total_js_heap_size: f64,
}

impl MemoryInfo {
    pub fn apply_to(&self, attrs: &mut AttrMap) {
        attrs.insert(
            "memory.used_js_heap_size".to_string(),
            self.used_js_heap_size.into(),
        );
        attrs.insert(
            "memory.total_js_heap_size".to_string(),
            self.total_js_heap_size.into(),
        );
    }
}

#[derive(Debug, Default)]
struct VitalsState {
    vitals: WebVitals,
    memory: Option<MemoryInfo>,
}

/// Shared accumulator fed by passive page observers
#[derive(Clone, Default)]
pub struct VitalsHandle {
    state: Arc<Mutex<VitalsState>>,
}

impl VitalsHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest largest-contentful-paint candidate
    pub fn record_lcp(&self, value_ms: f64) {
        if let Ok(mut state) = self.state.lock() {
            state.vitals.lcp = Some(value_ms);
        }
    }

    /// Record first input delay; only the first observation counts
    pub fn record_fid(&self, value_ms: f64) {
        if let Ok(mut state) = self.state.lock() {
            if state.vitals.fid.is_none() {
                state.vitals.fid = Some(value_ms);
            }
        }
    }

    /// Accumulate a layout-shift contribution
    pub fn record_layout_shift(&self, value: f64) {
        if let Ok(mut state) = self.state.lock() {
            state.vitals.cls = Some(state.vitals.cls.unwrap_or(0.0) + value);
        }
    }

    /// Record current heap usage
    pub fn record_memory(&self, memory: MemoryInfo) {
        if let Ok(mut state) = self.state.lock() {
            state.memory = Some(memory);
        }
    }

    /// Snapshot the current observations
    pub fn snapshot(&self) -> (WebVitals, Option<MemoryInfo>) {
        self.state
            .lock()
            .map(|state| (state.vitals, state.memory))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_shift_accumulates() {
        let handle = VitalsHandle::new();
        handle.record_layout_shift(0.05);
        handle.record_layout_shift(0.02);
        let (vitals, _) = handle.snapshot();
        assert!((vitals.cls.unwrap() - 0.07).abs() < 1e-9);
    }

    #[test]
    fn test_fid_keeps_first_observation() {
        let handle = VitalsHandle::new();
        handle.record_fid(80.0);
        handle.record_fid(300.0);
        let (vitals, _) = handle.snapshot();
        assert_eq!(vitals.fid, Some(80.0));
    }

    #[test]
    fn test_apply_skips_missing_vitals() {
        let mut attrs = AttrMap::new();
        WebVitals {
            lcp: Some(1200.0),
            fid: None,
            cls: None,
        }
        .apply_to(&mut attrs);
        assert!(attrs.contains_key(LCP_ATTR));
        assert!(!attrs.contains_key(FID_ATTR));
    }
}
