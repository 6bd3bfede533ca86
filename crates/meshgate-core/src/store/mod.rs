// ── Device storage ──

mod collection;
pub mod registry;

pub use registry::DeviceRegistry;
