//! Runtime tunables: one registry of `{name, default, min, max}`
//! descriptors, read by the key-binding layer and by the frame graph.

use std::collections::BTreeMap;

use crate::error::HorizonError;
use crate::uniform::UniformBag;

/// Which pass a tunable is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamPass {
    /// The ray-marched main pass.
    Main,
    /// Bloom composite.
    Composite,
    /// Tone mapping.
    Tonemap,
    /// Read by the frame graph itself, never bound.
    Pipeline,
}

/// How a tunable is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamWidget {
    /// On/off, stored as 0.0 / 1.0.
    Toggle,
    /// Continuous.
    Slider,
    /// Integer steps.
    Steps,
}

/// One tunable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDescriptor {
    /// Uniform name.
    pub name: &'static str,
    /// Consuming pass.
    pub pass: ParamPass,
    /// Editing style.
    pub widget: ParamWidget,
    /// Initial value.
    pub default: f32,
    /// Lower bound.
    pub min: f32,
    /// Upper bound.
    pub max: f32,
}

impl ParamDescriptor {
    const fn toggle(name: &'static str, default: bool) -> Self {
        Self {
            name,
            pass: ParamPass::Main,
            widget: ParamWidget::Toggle,
            default: if default { 1.0 } else { 0.0 },
            min: 0.0,
            max: 1.0,
        }
    }

    const fn slider(name: &'static str, default: f32, min: f32, max: f32) -> Self {
        Self {
            name,
            pass: ParamPass::Main,
            widget: ParamWidget::Slider,
            default,
            min,
            max,
        }
    }

    const fn on(mut self, pass: ParamPass) -> Self {
        self.pass = pass;
        self
    }

    const fn steps(mut self) -> Self {
        self.widget = ParamWidget::Steps;
        self
    }

    /// Clamp (and for toggles and steps, round) `value` into range.
    #[must_use]
    pub fn sanitize(&self, value: f32) -> f32 {
        let clamped = if value.is_nan() {
            self.default
        } else {
            value.clamp(self.min, self.max)
        };
        match self.widget {
            ParamWidget::Toggle => {
                if clamped >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            ParamWidget::Steps => clamped.round(),
            ParamWidget::Slider => clamped,
        }
    }
}

/// Every tunable, in display order.
pub const PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::toggle("gravitationalLensing", true),
    ParamDescriptor::toggle("renderBlackHole", true),
    ParamDescriptor::toggle("mouseControl", true),
    ParamDescriptor::slider("cameraRoll", 0.0, -180.0, 180.0),
    ParamDescriptor::toggle("frontView", false),
    ParamDescriptor::toggle("topView", false),
    ParamDescriptor::toggle("adiskEnabled", true),
    ParamDescriptor::toggle("adiskParticle", true),
    ParamDescriptor::slider("adiskDensityV", 2.0, 0.0, 10.0),
    ParamDescriptor::slider("adiskDensityH", 4.0, 0.0, 10.0),
    ParamDescriptor::slider("adiskHeight", 0.55, 0.0, 1.0),
    ParamDescriptor::slider("adiskLit", 0.25, 0.0, 4.0),
    ParamDescriptor::slider("adiskNoiseLOD", 5.0, 1.0, 12.0),
    ParamDescriptor::slider("adiskNoiseScale", 0.8, 0.0, 10.0),
    ParamDescriptor::slider("adiskSpeed", 0.5, 0.0, 1.0),
    ParamDescriptor::slider("bloomIterations", 4.0, 1.0, 8.0)
        .steps()
        .on(ParamPass::Pipeline),
    ParamDescriptor::slider("bloomStrength", 0.1, 0.0, 1.0)
        .on(ParamPass::Composite),
    ParamDescriptor::toggle("tonemappingEnabled", true).on(ParamPass::Tonemap),
    ParamDescriptor::slider("gamma", 2.5, 1.0, 4.0).on(ParamPass::Tonemap),
];

/// Look up a descriptor by name.
#[must_use]
pub fn descriptor(name: &str) -> Option<&'static ParamDescriptor> {
    PARAMS.iter().find(|d| d.name == name)
}

/// Current value of every tunable in [`PARAMS`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParamValues {
    values: Vec<f32>,
}

impl Default for ParamValues {
    fn default() -> Self {
        Self {
            values: PARAMS.iter().map(|d| d.default).collect(),
        }
    }
}

impl ParamValues {
    /// All defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with configured overrides applied (and sanitized).
    ///
    /// # Errors
    ///
    /// [`HorizonError::OptionsParse`] for a name not in the registry.
    pub fn with_overrides(
        overrides: &BTreeMap<String, f32>,
    ) -> Result<Self, HorizonError> {
        let mut values = Self::new();
        for (name, &value) in overrides {
            if values.set(name, value).is_none() {
                return Err(HorizonError::OptionsParse(format!(
                    "unknown parameter '{name}'"
                )));
            }
        }
        Ok(values)
    }

    fn index(name: &str) -> Option<usize> {
        PARAMS.iter().position(|d| d.name == name)
    }

    /// Current value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f32> {
        Self::index(name).map(|i| self.values[i])
    }

    /// Whether a toggle is on. Unknown names read as off.
    #[must_use]
    pub fn enabled(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| v >= 0.5)
    }

    /// Store a sanitized value; returns what was stored.
    pub fn set(&mut self, name: &str, value: f32) -> Option<f32> {
        let i = Self::index(name)?;
        self.values[i] = PARAMS[i].sanitize(value);
        Some(self.values[i])
    }

    /// Flip a toggle; returns the new state.
    pub fn toggle(&mut self, name: &str) -> Option<bool> {
        let on = !self.enabled(name);
        self.set(name, if on { 1.0 } else { 0.0 }).map(|v| v >= 0.5)
    }

    /// Add `delta` and clamp; returns the new value.
    pub fn step(&mut self, name: &str, delta: f32) -> Option<f32> {
        let current = self.get(name)?;
        self.set(name, current + delta)
    }

    /// Restore every default.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Active bloom depth.
    #[must_use]
    pub fn bloom_iterations(&self) -> usize {
        self.get("bloomIterations").map_or(1, |v| v.max(1.0) as usize)
    }

    /// Insert every tunable bound to `pass` into `bag`.
    pub fn fill_bag(&self, pass: ParamPass, bag: &mut UniformBag) {
        for (descriptor, &value) in PARAMS.iter().zip(&self.values) {
            if descriptor.pass == pass {
                let _ = bag.insert(descriptor.name, value);
            }
        }
    }

    /// Descriptors paired with current values.
    pub fn iter(&self) -> impl Iterator<Item = (&'static ParamDescriptor, f32)> + '_ {
        PARAMS.iter().zip(self.values.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uniform::UniformValue;

    #[test]
    fn registry_defaults_lie_within_bounds() {
        for d in PARAMS {
            assert!(d.min <= d.default && d.default <= d.max, "{}", d.name);
            assert_eq!(d.sanitize(d.default), d.default, "{}", d.name);
        }
        let mut names: Vec<_> = PARAMS.iter().map(|d| d.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), PARAMS.len());
    }

    #[test]
    fn set_clamps_and_rounds() {
        let mut values = ParamValues::new();
        assert_eq!(values.set("gamma", 9.0), Some(4.0));
        assert_eq!(values.set("bloomIterations", 2.6), Some(3.0));
        assert_eq!(values.set("adiskEnabled", 0.2), Some(0.0));
        assert_eq!(values.set("cameraRoll", f32::NAN), Some(0.0));
        assert_eq!(values.set("nope", 1.0), None);
        assert_eq!(values.bloom_iterations(), 3);
    }

    #[test]
    fn toggle_and_reset() {
        let mut values = ParamValues::new();
        assert_eq!(values.toggle("tonemappingEnabled"), Some(false));
        assert!(!values.enabled("tonemappingEnabled"));
        let strength = values.step("bloomStrength", 0.05).unwrap();
        assert!((strength - 0.15).abs() < 1e-6);
        values.reset();
        assert_eq!(values, ParamValues::new());
    }

    #[test]
    fn fill_bag_selects_by_pass() {
        let values = ParamValues::new();
        let mut main = UniformBag::new();
        values.fill_bag(ParamPass::Main, &mut main);
        assert_eq!(main.len(), 15);
        assert_eq!(main.get("adiskHeight"), Some(UniformValue::Float(0.55)));
        assert!(main.get("gamma").is_none());
        assert!(main.get("bloomIterations").is_none());

        let mut tonemap = UniformBag::new();
        values.fill_bag(ParamPass::Tonemap, &mut tonemap);
        assert_eq!(tonemap.len(), 2);
    }

    #[test]
    fn overrides_reject_unknown_names() {
        let mut overrides = BTreeMap::new();
        let _ = overrides.insert("gamma".to_owned(), 2.2);
        assert_eq!(
            ParamValues::with_overrides(&overrides).unwrap().get("gamma"),
            Some(2.2)
        );
        let _ = overrides.insert("gravatationalLensing".to_owned(), 0.0);
        assert!(ParamValues::with_overrides(&overrides).is_err());
    }
}
