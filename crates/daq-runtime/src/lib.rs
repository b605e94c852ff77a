#![doc = "Acquisition runtime for the radar data logger."]

pub mod acquisition;
pub mod realtime;
pub mod tick;
pub mod toggle;

pub use acquisition::*;
pub use realtime::*;
pub use tick::*;
pub use toggle::*;
