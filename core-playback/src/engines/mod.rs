//! Native engine adapters, one per bridge player surface

pub mod desktop;
pub mod framework;
pub mod session;

pub use desktop::DesktopEngine;
pub use framework::FrameworkEngine;
pub use session::SessionEngine;
