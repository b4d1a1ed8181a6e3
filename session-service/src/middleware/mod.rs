pub mod cookies;
pub mod device;
pub mod gate;

pub use device::{client_device, ClientDevice};
pub use gate::{gate_middleware, CurrentSession, GateLayerState};
