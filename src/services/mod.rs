// 服务模块

pub mod directory;
pub mod discovery;
pub mod host_store;
pub mod storage;

pub use directory::HostDirectory;
pub use host_store::HostStore;
