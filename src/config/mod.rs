//! Training configuration: values, persistence and the typed parameter view.

mod params;
mod store;
mod value;

pub use params::{
    defaults, seed_value, TrainingParams, BATCH_SIZE, DOWNSAMPLE_METHOD, LEARNING_RATE, PATCH_SIZE,
    RELAXED_KEYS, SCALE, SEED,
};
pub use store::{
    config_path, exists, merge, save, validate_subset, ConfigStore, LoadOptions,
    DEFAULT_CONFIG_NAME,
};
pub use value::{ConfigValue, Configuration};
