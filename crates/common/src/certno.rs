//! 证书编号生成与格式校验
//!
//! 编号格式：`PREFIX-YYMM-XXXXXX`。`YYMM` 为签发年月（两位年 + 两位月），
//! 后缀为固定长度的随机字符，字母表剔除了易混淆字符（0/O、1/I/L）。
//! 生成器本身无共享状态：随机源与时钟都由调用方注入，
//! 便于测试替换为确定性实现。
//!
//! 生成是"避撞但非防撞"的——唯一性最终由账本的唯一索引保证，
//! 发证服务捕获冲突后重新生成。

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;

/// 随机后缀长度
pub const SUFFIX_LEN: usize = 6;

/// 后缀字母表（31 字符，无 0/O/1/I/L）
pub const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// 证书编号生成器
///
/// 持有部署级前缀；每次调用产生一个新编号。
#[derive(Debug, Clone)]
pub struct NumberGenerator {
    prefix: String,
}

impl NumberGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 以当前时间和线程随机源生成编号
    pub fn generate(&self) -> String {
        self.generate_with(Utc::now(), &mut rand::thread_rng())
    }

    /// 以指定时间和随机源生成编号（测试用确定性入口）
    pub fn generate_with(&self, now: DateTime<Utc>, rng: &mut impl Rng) -> String {
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect();
        format!(
            "{}-{:02}{:02}-{}",
            self.prefix,
            now.year() % 100,
            now.month(),
            suffix
        )
    }
}

/// 发证服务使用的编号来源抽象
///
/// 生产实现是 [`NumberGenerator`]；测试可注入确定性序列，
/// 驱动冲突重试与重试耗尽路径。
pub trait NumberSource: Send + Sync {
    fn next_number(&self) -> String;
}

impl NumberSource for NumberGenerator {
    fn next_number(&self) -> String {
        self.generate()
    }
}

/// 校验字符串是否符合编号的字面格式
///
/// 纯字符串检查，不访问存储。验证服务用它在查询账本之前快速拒绝
/// 畸形输入。校验放宽到 `[0-9A-Z]` 全集而非生成字母表，
/// 避免拒绝历史部署签发的编号。
pub fn is_well_formed(prefix: &str, s: &str) -> bool {
    let Some(rest) = s.strip_prefix(prefix) else {
        return false;
    };
    let Some(rest) = rest.strip_prefix('-') else {
        return false;
    };
    let Some((stamp, suffix)) = rest.split_once('-') else {
        return false;
    };
    stamp.len() == 4
        && stamp.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == SUFFIX_LEN
        && suffix
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
}
