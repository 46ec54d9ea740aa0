//! Monomorphization Records
//!
//! 每个实例（按修饰名作键）一条记录，显式状态机：
//!
//! ```text
//! (absent) --request--> Requested --begin--> InProgress --complete--> Complete
//! (absent) ----------------begin-----------> InProgress
//! ```
//!
//! `InProgress` 期间再次 `begin` 不会重新进入替换，这就是自引用泛型的断环点。

use indexmap::IndexMap;
use tessera_syntax::TypeRef;

/// 生成状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    /// 已被引用，函数体在队列中等待
    Requested,
    /// 正在生成布局或函数体
    InProgress,
    /// 名称与布局已稳定
    Complete,
}

/// 单条单态化记录
#[derive(Debug, Clone, PartialEq)]
pub struct MonomorphizationRecord {
    pub base: String,
    pub args: Vec<TypeRef>,
    pub mangled: String,
    pub state: GenerationState,
}

/// `begin` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// 调用方获得生成权，记录已置为 InProgress
    Fresh,
    /// 已在生成或已完成，直接复用名称
    Existing(GenerationState),
}

/// 单态化记录表（保持插入顺序）
#[derive(Debug, Default)]
pub struct InstanceTable {
    records: IndexMap<String, MonomorphizationRecord>,
}

impl InstanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个待生成的实例；返回 true 表示首次登记
    pub fn request(&mut self, base: &str, args: &[TypeRef], mangled: &str) -> bool {
        if self.records.contains_key(mangled) {
            return false;
        }
        self.records.insert(
            mangled.to_string(),
            MonomorphizationRecord {
                base: base.to_string(),
                args: args.to_vec(),
                mangled: mangled.to_string(),
                state: GenerationState::Requested,
            },
        );
        true
    }

    /// 尝试开始生成
    pub fn begin(&mut self, base: &str, args: &[TypeRef], mangled: &str) -> Claim {
        match self.records.get_mut(mangled) {
            Some(record) => match record.state {
                GenerationState::Requested => {
                    record.state = GenerationState::InProgress;
                    Claim::Fresh
                }
                state => Claim::Existing(state),
            },
            None => {
                self.records.insert(
                    mangled.to_string(),
                    MonomorphizationRecord {
                        base: base.to_string(),
                        args: args.to_vec(),
                        mangled: mangled.to_string(),
                        state: GenerationState::InProgress,
                    },
                );
                Claim::Fresh
            }
        }
    }

    /// 标记完成
    pub fn complete(&mut self, mangled: &str) {
        if let Some(record) = self.records.get_mut(mangled) {
            record.state = GenerationState::Complete;
        }
    }

    pub fn state(&self, mangled: &str) -> Option<GenerationState> {
        self.records.get(mangled).map(|r| r.state)
    }

    pub fn get(&self, mangled: &str) -> Option<&MonomorphizationRecord> {
        self.records.get(mangled)
    }

    /// 按登记顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &MonomorphizationRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 某个模板的全部实例
    pub fn instances_of<'a>(&'a self, base: &'a str) -> impl Iterator<Item = &'a MonomorphizationRecord> {
        self.records.values().filter(move |r| r.base == base)
    }
}
