//! Key actions and pointer input.

use super::Engine;
use crate::input::KeyAction;

const STRENGTH_STEP: f32 = 0.05;

impl Engine {
    /// Look up `key` (a winit `KeyCode` debug name such as `"KeyR"`) in the
    /// configured bindings and apply its action. Returns the action so the
    /// host can react to [`KeyAction::Quit`].
    pub fn handle_key(&mut self, key: &str) -> Option<KeyAction> {
        let action = self.options.keybindings.lookup(key)?;
        self.execute(action);
        Some(action)
    }

    /// Apply one action to the tunables or the pipeline.
    pub fn execute(&mut self, action: KeyAction) {
        match action {
            KeyAction::ReloadShaders => {
                let failures = self.reload_shaders();
                if failures > 0 {
                    log::warn!("{failures} program(s) kept their previous version");
                }
                return;
            }
            KeyAction::BloomUp => {
                let _ = self.params.step("bloomIterations", 1.0);
            }
            KeyAction::BloomDown => {
                let _ = self.params.step("bloomIterations", -1.0);
            }
            KeyAction::BloomStronger => {
                let _ = self.params.step("bloomStrength", STRENGTH_STEP);
            }
            KeyAction::BloomWeaker => {
                let _ = self.params.step("bloomStrength", -STRENGTH_STEP);
            }
            KeyAction::ToggleToneMapping => {
                let _ = self.params.toggle("tonemappingEnabled");
            }
            KeyAction::ToggleDisk => {
                let _ = self.params.toggle("adiskEnabled");
            }
            KeyAction::ToggleLensing => {
                let _ = self.params.toggle("gravitationalLensing");
            }
            KeyAction::ToggleMouseControl => {
                let _ = self.params.toggle("mouseControl");
            }
            KeyAction::CycleView => {
                // orbit → front → top → orbit
                let (front, top) = match (
                    self.params.enabled("frontView"),
                    self.params.enabled("topView"),
                ) {
                    (false, false) => (1.0, 0.0),
                    (true, _) => (0.0, 1.0),
                    (false, true) => (0.0, 0.0),
                };
                let _ = self.params.set("frontView", front);
                let _ = self.params.set("topView", top);
            }
            KeyAction::ResetParams => self.params.reset(),
            KeyAction::Quit => return,
        }
        log::info!("{action:?}: {}", self.describe_params());
    }

    fn describe_params(&self) -> String {
        format!(
            "bloomIterations={} bloomStrength={:.2} tonemapping={} disk={} lensing={}",
            self.params.bloom_iterations(),
            self.params.get("bloomStrength").unwrap_or_default(),
            self.params.enabled("tonemappingEnabled"),
            self.params.enabled("adiskEnabled"),
            self.params.enabled("gravitationalLensing"),
        )
    }

    /// Record a cursor move in window pixels.
    pub fn handle_cursor(&mut self, x: f64, y: f64) {
        let (render_w, render_h) = self.resources.size();
        let scale = [
            render_w as f32 / self.context.width().max(1) as f32,
            render_h as f32 / self.context.height().max(1) as f32,
        ];
        self.pointer.moved(x, y, scale);
    }
}

#[cfg(test)]
mod tests {
    use crate::assets::ProceduralAssets;
    use crate::engine::Engine;
    use crate::input::KeyAction;
    use crate::options::Options;
    use crate::shader::BuiltinShaders;

    fn engine() -> Option<Engine> {
        let mut options = Options::default();
        options.display.width = 16;
        options.display.height = 16;
        let assets = ProceduralAssets {
            face_size: 4,
            seed: 1,
        };
        Engine::headless_with(options, &assets, Box::new(BuiltinShaders)).ok()
    }

    #[test]
    fn keys_edit_tunables_within_bounds() {
        let Some(mut engine) = engine() else {
            return;
        };
        assert_eq!(engine.handle_key("KeyT"), Some(KeyAction::ToggleToneMapping));
        assert!(!engine.params().enabled("tonemappingEnabled"));

        for _ in 0..20 {
            let _ = engine.handle_key("BracketRight");
        }
        assert_eq!(engine.params().bloom_iterations(), 8);
        for _ in 0..20 {
            let _ = engine.handle_key("Minus");
        }
        assert_eq!(engine.params().get("bloomStrength"), Some(0.0));

        assert_eq!(engine.handle_key("Backspace"), Some(KeyAction::ResetParams));
        assert!(engine.params().enabled("tonemappingEnabled"));
        assert_eq!(engine.handle_key("KeyQ"), None);
    }

    #[test]
    fn view_cycles_through_three_states() {
        let Some(mut engine) = engine() else {
            return;
        };
        let view = |e: &Engine| (e.params().enabled("frontView"), e.params().enabled("topView"));
        engine.execute(KeyAction::CycleView);
        assert_eq!(view(&engine), (true, false));
        engine.execute(KeyAction::CycleView);
        assert_eq!(view(&engine), (false, true));
        engine.execute(KeyAction::CycleView);
        assert_eq!(view(&engine), (false, false));
    }

    #[test]
    fn reload_keeps_programs_valid() {
        let Some(mut engine) = engine() else {
            return;
        };
        assert_eq!(engine.handle_key("KeyR"), Some(KeyAction::ReloadShaders));
        assert!(engine.render_offscreen().complete());
    }
}
