/// A model descriptor finished loading on the loader thread
#[derive(Debug)]
pub struct LoadModelMessage<D> {
    /// Model index the descriptor belongs to
    pub index: u32,
    /// The freshly created descriptor
    pub descriptor: D,
}

/// A model index was released by its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveModelMessage {
    /// Model index to release
    pub index: u32,
}

/// The descriptor for an already released index could not be created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadFailedMessage {
    /// Model index whose load was abandoned
    pub index: u32,
}

/// Index notices applied by the render thread in the order they were queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseMessage {
    /// The owner released the index
    Removed(RemoveModelMessage),
    /// No load will ever arrive for the index
    LoadFailed(LoadFailedMessage),
}
