//! Tessera Monomorphization Core
//!
//! 单态化的纯数据部分，不涉及 IR：
//!
//! - [`mangling`] - 类型到标识符安全字符串的确定性编码
//! - [`substitute`] - 泛型参数替换
//! - [`record`] - 每个实例键的状态机（Requested → InProgress → Complete）
//! - [`queue`] - 延迟生成函数体的 FIFO 工作队列

pub mod mangling;
pub mod queue;
pub mod record;
pub mod substitute;

pub use mangling::{mangle_type, AliasTable, Mangler, NoAliases};
pub use queue::{BodySource, GenerationQueue, LambdaBody, PendingGeneration};
pub use record::{Claim, GenerationState, InstanceTable, MonomorphizationRecord};
pub use substitute::Substitution;
