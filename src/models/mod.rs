// 数据模型模块

pub mod discovery;
pub mod host;
pub mod settings;

pub use discovery::{DiscoveryCandidate, EvidenceSource, IdentityKey};
pub use host::{join_tags, normalize_port, parse_tags, HostId, HostProfile, NewHost};
pub use settings::{AppSettings, DiscoverySettings, StorageSettings};
