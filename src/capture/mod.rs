pub mod api;
pub mod command;
pub mod file;
pub mod session;
pub mod types;

pub use api::FrameSource;
pub use command::CommandFrameSource;
pub use file::FileFrameSource;
pub use session::CaptureSession;
pub use types::{CaptureError, CaptureInfo, Frame};
