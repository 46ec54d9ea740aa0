//! Tessera Syntax
//!
//! 类型检查之后的输入模型：类型引用 [`TypeRef`]、声明、语句与表达式。
//! 每个表达式节点都已携带解析好的类型，后端只负责解析/替换/修饰，从不推断类型。

pub mod decl;
pub mod expr;
pub mod location;
pub mod stmt;
pub mod types;

pub use decl::{
    Decl, EnumDecl, EnumVariant, ExternDecl, FunctionDecl, Module, Param, StructDecl, StructField,
    TypeAliasDecl, VariantPayload,
};
pub use expr::{BinaryOp, Expr, ExprKind, FieldInit, Literal, MatchArm, UnaryOp};
pub use location::SourceLocation;
pub use stmt::{Stmt, SwitchCase};
pub use types::{DeclKind, Primitive, TypeRef};
