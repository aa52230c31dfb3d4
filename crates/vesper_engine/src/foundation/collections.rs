//! Registration handles
//!
//! Registries hand out slot map keys instead of raw identities so that a
//! removed entry can never be confused with a later one at the same address.

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Handle returned when an actor is registered with the simulation loop
    pub struct ActorId;

    /// Handle returned when a physical engine is registered with the simulation loop
    pub struct EngineId;
}
