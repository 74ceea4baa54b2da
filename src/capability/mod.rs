//! 能力层：编排器触达外部世界的唯一通道
//!
//! 数据源 / 偏好提取 / 起草-预算-解释 均以 trait 对象注入，携带声明式超时与幂等标记；
//! 失败统一为 CapabilityFailure（retryable + HTTP 风格分类）。Mock 实现供测试与演示使用。

pub mod failure;
pub mod mock;
pub mod traits;

pub use failure::{CapabilityFailure, FailureClass};
pub use mock::{FailingSource, FlakySource, GreedyDrafter, MockExtractor, StaticSource};
pub use traits::{
    call_with_timeout, DataSource, DraftInput, PreferenceExtractor, ResearchQuery, TripDrafter,
};
