//! WebAssembly bindings for the rhythm engine.
//!
//! The browser owns rendering and sound; the engine decides when and which
//! note to trigger. `advance` therefore returns the due triggers as plain
//! JS objects for the page's audio layer to play, and `patterns` returns
//! the geometry a canvas renderer needs (bits, color, highlight state).

use wasm_bindgen::prelude::*;

use crate::session::Session;
use crate::transport::TransportConfig;

/// Initialize panic hook for better error messages in the browser console.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// A session handle that can be driven from JavaScript.
#[wasm_bindgen]
pub struct JsSession {
    inner: Session,
}

#[wasm_bindgen]
impl JsSession {
    /// Create a session. `steps_per_second` of 0 or less selects the
    /// default rate.
    #[wasm_bindgen(constructor)]
    pub fn new(steps_per_second: f64) -> JsSession {
        let config = if steps_per_second > 0.0 {
            TransportConfig { steps_per_second }
        } else {
            TransportConfig::default()
        };
        JsSession {
            inner: Session::new(config),
        }
    }

    /// Create a randomized pattern; returns its position.
    #[wasm_bindgen(js_name = addPattern)]
    pub fn add_pattern(&mut self) -> usize {
        self.inner.add_pattern()
    }

    /// Dispose and remove the pattern at `index`.
    #[wasm_bindgen(js_name = removePattern)]
    pub fn remove_pattern(&mut self, index: usize) -> Result<(), JsError> {
        self.inner
            .remove_pattern(index)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = setOns)]
    pub fn set_ons(&mut self, index: usize, ons: u32) -> Result<(), JsError> {
        self.inner
            .set_ons(index, ons)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = setOffs)]
    pub fn set_offs(&mut self, index: usize, offs: u32) -> Result<(), JsError> {
        self.inner
            .set_offs(index, offs)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = setRotation)]
    pub fn set_rotation(&mut self, index: usize, rotation: i32) -> Result<(), JsError> {
        self.inner
            .set_rotation(index, rotation)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = setNote)]
    pub fn set_note(&mut self, index: usize, note_index: usize) -> Result<(), JsError> {
        self.inner
            .set_note(index, note_index)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = toggleMute)]
    pub fn toggle_mute(&mut self, index: usize) -> Result<(), JsError> {
        self.inner
            .toggle_mute(index)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// The global start action.
    #[wasm_bindgen]
    pub fn start(&mut self) {
        self.inner.start();
    }

    /// Pump the clock to `now` (seconds since the page's transport zero)
    /// and return the audible triggers as an array of
    /// `{pattern, step, time, note, frequency}` objects.
    #[wasm_bindgen]
    pub fn advance(&mut self, now: f64) -> Result<JsValue, JsError> {
        let triggers: Vec<serde_json::Value> = self
            .inner
            .advance(now)
            .into_iter()
            .map(|t| {
                serde_json::json!({
                    "pattern": t.pattern,
                    "step": t.step,
                    "time": t.time,
                    "note": t.note.name(),
                    "frequency": t.note.frequency(),
                })
            })
            .collect();
        serde_wasm_bindgen::to_value(&triggers).map_err(|e| JsError::new(&e.to_string()))
    }

    /// Render geometry for every pattern, in bank order: an array of
    /// `{steps, currentStep, color, note, muted, flashing}` objects.
    #[wasm_bindgen]
    pub fn patterns(&self) -> Result<JsValue, JsError> {
        let transport = self.inner.transport();
        let now = transport.now();
        let shapes: Vec<serde_json::Value> = self
            .inner
            .bank()
            .iter()
            .map(|p| {
                serde_json::json!({
                    "steps": p.steps(),
                    "currentStep": p.step_index(transport),
                    "color": p.color().as_hex(),
                    "note": p.note().name(),
                    "muted": p.is_muted(),
                    "flashing": p.is_flashing(now),
                })
            })
            .collect();
        serde_wasm_bindgen::to_value(&shapes).map_err(|e| JsError::new(&e.to_string()))
    }

    /// Whether the shared clock has been started.
    #[wasm_bindgen(js_name = isStarted)]
    pub fn is_started(&self) -> bool {
        self.inner.transport().is_started()
    }

    /// Number of patterns in the bank.
    #[wasm_bindgen(js_name = patternCount)]
    pub fn pattern_count(&self) -> usize {
        self.inner.bank().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let mut session = JsSession::new(0.0);
        let i = session.add_pattern();
        session.start();
        assert!(session.is_started());
        assert_eq!(session.pattern_count(), 1);
        session.remove_pattern(i).unwrap();
        assert_eq!(session.pattern_count(), 0);
    }
}
