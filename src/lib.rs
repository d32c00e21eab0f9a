// Configuration loading
pub mod config;

// Vessel entity and merge engine
pub mod vessel;

// Region model and membership index
pub mod regions;

// Durable vessel storage (blocking and async variants)
pub mod store;

// In-memory state service
pub mod state;

// AIS stream client
pub mod stream;

pub use vessel::Vessel;
