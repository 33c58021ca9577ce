// Purpose - external interfaces: audio device, keyboard, pitch math

pub mod audio;
pub mod input;
pub mod scale;
pub mod terminal;

#[cfg(test)]
pub(crate) mod testing;
