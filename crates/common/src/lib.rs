pub mod certno;
pub mod config;
pub mod entities;
pub mod error;
pub mod models;

// ============ 重新导出常用类型 ============

// 错误处理
pub use error::{MedError, Result as MedResult};

// 配置相关
pub use config::AppConfig;

// 证书编号
pub use certno::{NumberGenerator, NumberSource};

// 兼容性别名（Result 是更常用的名称）
pub use error::Result;
