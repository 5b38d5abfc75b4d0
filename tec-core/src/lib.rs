pub mod channels;
pub mod config;
pub mod conversion;
pub mod settings;
pub mod validation;

pub use channels::{ChannelId, ParseChannelError, CHANNEL_COUNT};
pub use config::{ChannelSelection, RawRunFields, RunConfig};
pub use conversion::{resistance_to_temperature, temperature_to_resistance, ConversionError};
pub use settings::{load_bench_settings, BenchSettings, SettingsError};
pub use validation::{validate, Field, ValidationError};
