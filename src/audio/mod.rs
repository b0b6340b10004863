//! Audio handling: WAV I/O, format conversion and the dub/background mixer.

pub mod buffer;
pub mod resample;
pub mod stretch;
pub mod synchronizer;
pub mod trim;
pub mod wav;

pub use buffer::AudioBuffer;
pub use synchronizer::{AudioSynchronizer, DurationPlan, MixReport, SyncConfig, stretch_ratio};
pub use wav::{read_wav, write_wav};
