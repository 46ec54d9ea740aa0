//! Declarations
//!
//! 顶层声明：结构体、枚举、函数、外部函数与类型别名

use serde::{Deserialize, Serialize};

use crate::location::SourceLocation;
use crate::stmt::Stmt;
use crate::types::TypeRef;

/// 函数参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// 函数或方法声明
///
/// 方法（非 `is_static`）隐式接收 `this: Owner*`，`params` 中不包含它。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    #[serde(default)]
    pub generic_params: Vec<String>,
    #[serde(default)]
    pub params: Vec<Param>,
    pub return_type: TypeRef,
    #[serde(default)]
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub location: SourceLocation,
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>, params: Vec<Param>, return_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            generic_params: Vec::new(),
            params,
            return_type,
            body: Vec::new(),
            is_static: false,
            location: SourceLocation::default(),
        }
    }

    pub fn with_generics(mut self, params: &[&str]) -> Self {
        self.generic_params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_body(mut self, body: Vec<Stmt>) -> Self {
        self.body = body;
        self
    }

    pub fn into_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// 是否占用虚表槽位：非泛型的实例方法
    pub fn is_virtual(&self) -> bool {
        !self.is_generic() && !self.is_static
    }

    pub fn param_types(&self) -> Vec<TypeRef> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }
}

/// 结构体字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    pub ty: TypeRef,
}

impl StructField {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// 结构体声明
///
/// 有泛型参数的是模板，永远不会直接布局；单态化产生的具体声明没有泛型参数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: String,
    #[serde(default)]
    pub generic_params: Vec<String>,
    #[serde(default)]
    pub parent: Option<TypeRef>,
    #[serde(default)]
    pub fields: Vec<StructField>,
    #[serde(default)]
    pub methods: Vec<FunctionDecl>,
    #[serde(default)]
    pub location: SourceLocation,
}

impl StructDecl {
    pub fn new(name: impl Into<String>, fields: Vec<StructField>) -> Self {
        Self {
            name: name.into(),
            generic_params: Vec::new(),
            parent: None,
            fields,
            methods: Vec::new(),
            location: SourceLocation::default(),
        }
    }

    pub fn with_generics(mut self, params: &[&str]) -> Self {
        self.generic_params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_parent(mut self, parent: TypeRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_method(mut self, method: FunctionDecl) -> Self {
        self.methods.push(method);
        self
    }

    pub fn is_template(&self) -> bool {
        !self.generic_params.is_empty()
    }

    pub fn method(&self, name: &str) -> Option<&FunctionDecl> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// 枚举变体的负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantPayload {
    Tuple(Vec<TypeRef>),
    Struct(Vec<StructField>),
}

/// 枚举变体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumVariant {
    pub name: String,
    #[serde(default)]
    pub payload: Option<VariantPayload>,
}

impl EnumVariant {
    pub fn unit(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: None,
        }
    }

    pub fn tuple(name: impl Into<String>, types: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            payload: Some(VariantPayload::Tuple(types)),
        }
    }

    /// 负载字段类型（按声明顺序）
    pub fn payload_types(&self) -> Vec<TypeRef> {
        match &self.payload {
            None => Vec::new(),
            Some(VariantPayload::Tuple(types)) => types.clone(),
            Some(VariantPayload::Struct(fields)) => fields.iter().map(|f| f.ty.clone()).collect(),
        }
    }
}

/// 枚举声明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    #[serde(default)]
    pub generic_params: Vec<String>,
    pub variants: Vec<EnumVariant>,
    #[serde(default)]
    pub methods: Vec<FunctionDecl>,
    #[serde(default)]
    pub location: SourceLocation,
}

impl EnumDecl {
    pub fn new(name: impl Into<String>, variants: Vec<EnumVariant>) -> Self {
        Self {
            name: name.into(),
            generic_params: Vec::new(),
            variants,
            methods: Vec::new(),
            location: SourceLocation::default(),
        }
    }

    pub fn with_generics(mut self, params: &[&str]) -> Self {
        self.generic_params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn is_template(&self) -> bool {
        !self.generic_params.is_empty()
    }
}

/// 外部函数声明（不修饰名称，不带闭包环境参数）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    pub return_type: TypeRef,
    #[serde(default)]
    pub variadic: bool,
    #[serde(default)]
    pub location: SourceLocation,
}

/// 类型别名
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAliasDecl {
    pub name: String,
    #[serde(default)]
    pub generic_params: Vec<String>,
    pub target: TypeRef,
    #[serde(default)]
    pub location: SourceLocation,
}

impl TypeAliasDecl {
    pub fn new(name: impl Into<String>, target: TypeRef) -> Self {
        Self {
            name: name.into(),
            generic_params: Vec::new(),
            target,
            location: SourceLocation::default(),
        }
    }
}

/// 顶层声明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decl {
    Struct(StructDecl),
    Enum(EnumDecl),
    Function(FunctionDecl),
    Extern(ExternDecl),
    TypeAlias(TypeAliasDecl),
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Struct(d) => &d.name,
            Decl::Enum(d) => &d.name,
            Decl::Function(d) => &d.name,
            Decl::Extern(d) => &d.name,
            Decl::TypeAlias(d) => &d.name,
        }
    }
}

/// 一个已通过类型检查的模块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub decls: Vec<Decl>,
}

impl Module {
    pub fn new(name: impl Into<String>, decls: Vec<Decl>) -> Self {
        Self {
            name: name.into(),
            decls,
        }
    }
}
