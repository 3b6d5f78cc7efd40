pub mod ble;
pub mod capture;
pub mod events;
pub mod status;
pub mod tcp;
pub mod traits;
pub mod web;

pub use ble::BleAdapter;
pub use capture::CaptureFeed;
pub use events::SERVICE_UUID;
pub use status::StatusBoard;
pub use tcp::{TcpLink, WebListener};
pub use traits::event_channel;
pub use web::WebApi;
