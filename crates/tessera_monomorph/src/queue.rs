//! Pending Generations
//!
//! 延迟生成的函数体工作队列。函数体发射途中触发的实例化只入队，
//! 由驱动在两个顶层声明之间按 FIFO 顺序排空。

use std::collections::VecDeque;

use tessera_syntax::{Param, SourceLocation, Stmt, TypeRef};

use crate::substitute::Substitution;

/// 被提升的 lambda
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaBody {
    pub params: Vec<Param>,
    pub captures: Vec<Param>,
    pub body: Vec<Stmt>,
    pub return_type: TypeRef,
    /// 捕获环境的结构体名
    pub env_type: String,
    pub location: SourceLocation,
}

/// 函数体来源
#[derive(Debug, Clone, PartialEq)]
pub enum BodySource {
    /// 泛型自由函数模板
    Function { template: String },
    /// 具体类型（结构体或枚举）上的方法
    Method { owner: String, method: String },
    Lambda(Box<LambdaBody>),
}

/// 一项待生成的函数体
#[derive(Debug, Clone, PartialEq)]
pub struct PendingGeneration {
    /// 最终符号名
    pub symbol: String,
    pub source: BodySource,
    /// 发射函数体时使用的替换表
    pub substitution: Substitution,
}

/// FIFO 工作队列
#[derive(Debug, Default)]
pub struct GenerationQueue {
    items: VecDeque<PendingGeneration>,
}

impl GenerationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: PendingGeneration) {
        tracing::trace!(symbol = %item.symbol, "queued body generation");
        self.items.push_back(item);
    }

    pub fn pop(&mut self) -> Option<PendingGeneration> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingGeneration> {
        self.items.iter()
    }

    /// 队列中的符号（按出队顺序）
    pub fn symbols(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.symbol.as_str()).collect()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.items.iter().any(|item| item.symbol == symbol)
    }
}
