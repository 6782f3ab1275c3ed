use std::collections::HashSet;

use winit::keyboard::KeyCode;

/// Keyboard state for the current frame.
#[derive(Debug, Default, Clone)]
pub struct InputState {
    held: HashSet<KeyCode>,
    hit: HashSet<KeyCode>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: KeyCode) {
        if self.held.insert(key) {
            self.hit.insert(key);
        }
    }

    pub fn release(&mut self, key: KeyCode) {
        self.held.remove(&key);
    }

    pub fn key_held(&self, key: KeyCode) -> bool {
        self.held.contains(&key)
    }

    /// True only on the frame the key went down.
    pub fn key_hit(&self, key: KeyCode) -> bool {
        self.hit.contains(&key)
    }

    pub fn end_frame(&mut self) {
        self.hit.clear();
    }

    /// Signed axis from a pair of keys: +1 for `positive`, -1 for `negative`.
    pub fn axis(&self, positive: KeyCode, negative: KeyCode) -> f32 {
        let mut value = 0.0;
        if self.key_held(positive) {
            value += 1.0;
        }
        if self.key_held(negative) {
            value -= 1.0;
        }
        value
    }
}

/// Key bindings for turning and moving a model. Both groups share `.` and
/// `,` for moving, so those keys move every controlled model at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelKeys {
    pub turn_up: KeyCode,
    pub turn_down: KeyCode,
    pub turn_left: KeyCode,
    pub turn_right: KeyCode,
    pub turn_cw: KeyCode,
    pub turn_ccw: KeyCode,
    pub forward: KeyCode,
    pub backward: KeyCode,
}

impl ModelKeys {
    pub const PRIMARY: ModelKeys = ModelKeys {
        turn_up: KeyCode::KeyI,
        turn_down: KeyCode::KeyK,
        turn_left: KeyCode::KeyJ,
        turn_right: KeyCode::KeyL,
        turn_cw: KeyCode::KeyU,
        turn_ccw: KeyCode::KeyO,
        forward: KeyCode::Period,
        backward: KeyCode::Comma,
    };

    pub const SECONDARY: ModelKeys = ModelKeys {
        turn_up: KeyCode::KeyT,
        turn_down: KeyCode::KeyG,
        turn_left: KeyCode::KeyF,
        turn_right: KeyCode::KeyH,
        turn_cw: KeyCode::KeyR,
        turn_ccw: KeyCode::KeyY,
        forward: KeyCode::Period,
        backward: KeyCode::Comma,
    };
}

/// Key bindings for the free-flying camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraKeys {
    pub turn_up: KeyCode,
    pub turn_down: KeyCode,
    pub turn_left: KeyCode,
    pub turn_right: KeyCode,
    pub forward: KeyCode,
    pub backward: KeyCode,
    pub left: KeyCode,
    pub right: KeyCode,
}

impl Default for CameraKeys {
    fn default() -> Self {
        Self {
            turn_up: KeyCode::ArrowUp,
            turn_down: KeyCode::ArrowDown,
            turn_left: KeyCode::ArrowLeft,
            turn_right: KeyCode::ArrowRight,
            forward: KeyCode::KeyW,
            backward: KeyCode::KeyS,
            left: KeyCode::KeyA,
            right: KeyCode::KeyD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_lasts_one_frame_and_needs_release() {
        let mut input = InputState::new();
        input.press(KeyCode::KeyP);
        assert!(input.key_hit(KeyCode::KeyP));
        input.end_frame();
        assert!(!input.key_hit(KeyCode::KeyP));
        assert!(input.key_held(KeyCode::KeyP));

        // Auto-repeat does not re-trigger a hit.
        input.press(KeyCode::KeyP);
        assert!(!input.key_hit(KeyCode::KeyP));

        input.release(KeyCode::KeyP);
        input.press(KeyCode::KeyP);
        assert!(input.key_hit(KeyCode::KeyP));
    }

    #[test]
    fn opposing_keys_cancel() {
        let mut input = InputState::new();
        input.press(KeyCode::KeyW);
        input.press(KeyCode::KeyS);
        assert_eq!(input.axis(KeyCode::KeyW, KeyCode::KeyS), 0.0);
        input.release(KeyCode::KeyS);
        assert_eq!(input.axis(KeyCode::KeyW, KeyCode::KeyS), 1.0);
    }
}
