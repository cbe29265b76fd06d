// hostbook - SSH 主机目录与自动发现

pub mod constants;
pub mod error;
pub mod models;
pub mod services;
pub mod ssh;

pub use error::{DirectoryError, ErrorKind, Result};
pub use models::{HostId, HostProfile, NewHost};
pub use services::HostDirectory;
