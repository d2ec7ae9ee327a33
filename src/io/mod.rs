pub mod devices;
pub mod loader;

pub use devices::{DeviceError, DeviceRequest, RequestLog};
pub use loader::{load_script, parse_script, Script, ScriptError, ScriptEvent};
