//! Statements

use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::location::SourceLocation;
use crate::types::TypeRef;

/// 语句
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    Let {
        name: String,
        ty: TypeRef,
        #[serde(default)]
        value: Option<Expr>,
        #[serde(default)]
        location: SourceLocation,
    },
    Expr(Expr),
    Return {
        #[serde(default)]
        value: Option<Expr>,
        #[serde(default)]
        location: SourceLocation,
    },
    If {
        condition: Expr,
        then_block: Vec<Stmt>,
        #[serde(default)]
        else_block: Option<Vec<Stmt>>,
        #[serde(default)]
        location: SourceLocation,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
        #[serde(default)]
        location: SourceLocation,
    },
    Break {
        #[serde(default)]
        location: SourceLocation,
    },
    Continue {
        #[serde(default)]
        location: SourceLocation,
    },
    /// 整数 switch；分支结束后跳到 switch 之后，不贯穿
    Switch {
        scrutinee: Expr,
        cases: Vec<SwitchCase>,
        #[serde(default)]
        default: Option<Vec<Stmt>>,
        #[serde(default)]
        location: SourceLocation,
    },
    Block(Vec<Stmt>),
}

/// switch 的一个分支，值为整数常量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub value: i64,
    pub body: Vec<Stmt>,
}

impl Stmt {
    pub fn let_(name: impl Into<String>, ty: TypeRef, value: Expr) -> Self {
        Stmt::Let {
            name: name.into(),
            ty,
            value: Some(value),
            location: SourceLocation::default(),
        }
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Stmt::Return {
            value,
            location: SourceLocation::default(),
        }
    }

    /// 语句位置；表达式语句取表达式的位置
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Stmt::Let { location, .. }
            | Stmt::Return { location, .. }
            | Stmt::If { location, .. }
            | Stmt::While { location, .. }
            | Stmt::Switch { location, .. }
            | Stmt::Break { location }
            | Stmt::Continue { location } => Some(location),
            Stmt::Expr(expr) => Some(&expr.location),
            Stmt::Block(_) => None,
        }
    }
}
