// Purpose: one streaming voice per held key, and the registry that owns them.
// This layer sits between the dispatcher and the audio device.

pub mod registry;
pub mod voice;

pub use registry::{Reap, VoiceRegistry};
pub use voice::{VoiceExit, VoiceHandle, VoiceReport, VoiceSettings};
