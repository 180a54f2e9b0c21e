//! 退避调度 - 业务能力层
//!
//! 只负责"算等多久"能力，不关心流程
//!
//! 任务轮询和单条请求重试共用同一套退避计算，
//! 保证两条路径在高负载下的增长/抖动/封顶行为一致。

use std::time::Duration;

use rand::Rng;

/// 指数退避上限，2^5 = 32 倍基础间隔后不再增长
const MAX_EXPONENT: u32 = 5;

/// 抖动幅度，±30%
const JITTER_RATIO: f64 = 0.3;

/// 退避调度器
///
/// 无状态的纯计算：`base * 2^min(attempt, 5)`，
/// 在 ±30% 范围内均匀抖动，最后以 `cap` 封顶。
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    /// 基础间隔
    pub base: Duration,
    /// 单步等待上限
    pub cap: Duration,
}

impl Backoff {
    /// 创建退避调度器
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// 计算第 `attempt` 次重试前的等待时长
    ///
    /// # 参数
    /// - `attempt`: 重试次数，从 0 开始，每次失败的轮询或重试后加 1
    ///
    /// # 返回
    /// 返回抖动并封顶后的等待时长
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(MAX_EXPONENT);
        let raw = self.base.as_secs_f64() * f64::from(1u32 << exponent);

        let jittered = raw * rand::thread_rng().gen_range(1.0 - JITTER_RATIO..=1.0 + JITTER_RATIO);

        Duration::from_secs_f64(jittered.min(self.cap.as_secs_f64()))
    }
}

/// 重试策略
///
/// 任务轮询和并发派发共同消费的值对象：
/// 重试预算 + 退避计算。叶子函数返回 `Result`，
/// 哨兵值转换只发生在汇总边界。
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 最大重试次数
    pub max_attempts: u32,
    /// 退避调度器
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// 创建重试策略
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_within_jitter_bounds() {
        // base=3s, cap=25s, attempt=0: 3 * 2^0 = 3，抖动后落在 [2.1, 3.9]
        let backoff = Backoff::new(Duration::from_secs(3), Duration::from_secs(25));

        for _ in 0..64 {
            let secs = backoff.next_delay(0).as_secs_f64();
            assert!(secs >= 2.1 - 1e-6, "过短: {}", secs);
            assert!(secs <= 3.9 + 1e-6, "过长: {}", secs);
        }
    }

    #[test]
    fn test_large_attempt_capped_exactly() {
        // base=3s, attempt=10: 指数冻结在 5，3 * 32 = 96，
        // 抖动下界 67.2 仍远超 cap=25，封顶后恒等于 25
        let backoff = Backoff::new(Duration::from_secs(3), Duration::from_secs(25));

        for _ in 0..64 {
            assert_eq!(backoff.next_delay(10), Duration::from_secs(25));
        }
    }

    #[test]
    fn test_exponent_frozen_after_five() {
        // attempt=5 和 attempt=9 的取值区间相同
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(3600));

        for _ in 0..64 {
            let secs = backoff.next_delay(9).as_secs_f64();
            // 100ms * 32 = 3.2s，抖动后 [2.24, 4.16]
            assert!(secs >= 2.24 - 1e-6);
            assert!(secs <= 4.16 + 1e-6);
        }
    }

    #[test]
    fn test_delay_never_exceeds_cap() {
        let backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(10));

        for attempt in 0..16 {
            for _ in 0..16 {
                assert!(backoff.next_delay(attempt) <= Duration::from_secs(10));
            }
        }
    }
}
