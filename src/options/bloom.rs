use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[schemars(title = "Bloom", inline)]
#[serde(default)]
/// Bloom pyramid allocation.
pub struct BloomOptions {
    /// Levels allocated at setup. The active depth (`bloomIterations`) can
    /// be changed at runtime but never exceeds this.
    #[schemars(title = "Max Levels", range(min = 1, max = 8))]
    pub max_levels: usize,
}

impl Default for BloomOptions {
    fn default() -> Self {
        Self { max_levels: 6 }
    }
}
