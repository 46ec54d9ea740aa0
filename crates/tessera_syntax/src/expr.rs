//! Expressions
//!
//! 每个表达式都带有类型检查器给出的类型 `ty`

use serde::{Deserialize, Serialize};

use crate::decl::Param;
use crate::location::SourceLocation;
use crate::stmt::Stmt;
use crate::types::TypeRef;

/// 字面量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Null,
}

/// 二元运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And, // 短路
    Or,  // 短路
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }
}

/// 一元运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Not,
    Deref,
    AddressOf,
}

/// 结构体字面量中的字段初始化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInit {
    pub name: String,
    pub value: Expr,
}

/// match 分支；`variant` 为 None 表示通配
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchArm {
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub bindings: Vec<String>,
    pub body: Expr,
}

/// 表达式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: TypeRef,
    #[serde(default)]
    pub location: SourceLocation,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: TypeRef) -> Self {
        Self {
            kind,
            ty,
            location: SourceLocation::default(),
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    pub fn int(value: i64) -> Self {
        Self::new(ExprKind::Literal(Literal::Int(value)), TypeRef::i32())
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ExprKind::Literal(Literal::Bool(value)), TypeRef::bool())
    }

    pub fn var(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(ExprKind::Variable(name.into()), ty)
    }

    pub fn member(object: Expr, field: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(
            ExprKind::Member {
                object: Box::new(object),
                field: field.into(),
            },
            ty,
        )
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, ty: TypeRef) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        )
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expr>, ty: TypeRef) -> Self {
        Self::new(
            ExprKind::Call {
                callee: callee.into(),
                generic_args: Vec::new(),
                args,
            },
            ty,
        )
    }

    pub fn method_call(
        receiver: Expr,
        method: impl Into<String>,
        args: Vec<Expr>,
        ty: TypeRef,
    ) -> Self {
        Self::new(
            ExprKind::MethodCall {
                receiver: Box::new(receiver),
                method: method.into(),
                generic_args: Vec::new(),
                args,
            },
            ty,
        )
    }
}

/// 表达式种类
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprKind {
    Literal(Literal),
    /// 局部变量；找不到局部变量时按函数引用处理
    Variable(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// 按名称调用：局部闭包、函数或外部函数
    Call {
        callee: String,
        #[serde(default)]
        generic_args: Vec<TypeRef>,
        args: Vec<Expr>,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        #[serde(default)]
        generic_args: Vec<TypeRef>,
        args: Vec<Expr>,
    },
    /// `Owner::method(args)`，不经过虚表
    StaticCall {
        owner: TypeRef,
        method: String,
        #[serde(default)]
        generic_args: Vec<TypeRef>,
        args: Vec<Expr>,
    },
    /// 调用闭包值
    ClosureCall {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// 把具名函数当作闭包值
    FunctionRef {
        name: String,
        #[serde(default)]
        generic_args: Vec<TypeRef>,
    },
    Member {
        object: Box<Expr>,
        field: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    TupleIndex {
        object: Box<Expr>,
        index: usize,
    },
    /// 结构体字面量，类型取自 `Expr::ty`
    StructLiteral {
        fields: Vec<FieldInit>,
    },
    TupleLiteral(Vec<Expr>),
    /// 数组字面量，数组类型取自 `Expr::ty`
    ArrayLiteral(Vec<Expr>),
    /// 枚举变体构造，类型取自 `Expr::ty`；负载按声明顺序
    EnumVariant {
        variant: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
    },
    Lambda {
        params: Vec<Param>,
        body: Vec<Stmt>,
        #[serde(default)]
        captures: Vec<Param>,
    },
    /// `condition ? then_value : else_value`，只求值选中的一侧
    Ternary {
        condition: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
    },
    /// 转换为 `Expr::ty`
    Cast {
        value: Box<Expr>,
    },
    Sizeof(TypeRef),
}
