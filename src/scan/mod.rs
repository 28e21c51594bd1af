//! 扫描调度模块
//!
//! - [`orchestrator`] - 扫描模式状态机与连接门控
//! - [`limiter`] - 熄屏连接尝试限流
//! - [`timer`] - 定时器序号与 tokio 定时器
//! - [`memory`] - 测试与演示用的内存协作方

pub mod limiter;
pub mod memory;
pub mod orchestrator;
pub mod timer;

pub use limiter::ConnectionAttemptLimiter;
pub use orchestrator::{resolve_mode, Action, ModeInputs, OrchestratorStatus, ScanMode, ScanOrchestrator};
pub use timer::{TimerFired, TimerKind};
