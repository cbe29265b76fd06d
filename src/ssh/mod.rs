// SSH 连接参数模块
//
// 模块结构:
// - config: 由主机档案生成外部 ssh 客户端参数 (SshConfig, AuthMethod)

pub mod config;

// 公开导出
pub use config::{check_key_file, AuthMethod, SshConfig};
