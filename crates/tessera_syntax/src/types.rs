//! Type References
//!
//! 源语言类型的语言无关表示。构造后不可变，替换总是产生新值。

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// 规范化后的基础类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    Void,
    String, // 字节指针
    Null,   // 空指针字面量的类型
}

impl Primitive {
    /// 把源码里的基础类型别名规范化
    ///
    /// 注意 `float` 是 64 位浮点，只有显式的 `f32` 才是 32 位。
    pub fn from_name(name: &str) -> Option<Self> {
        let prim = match name {
            "int" | "i32" => Self::I32,
            "uint" | "u32" => Self::U32,
            "char" | "i8" => Self::I8,
            "uchar" | "u8" | "byte" => Self::U8,
            "short" | "i16" => Self::I16,
            "ushort" | "u16" => Self::U16,
            "long" | "i64" => Self::I64,
            "ulong" | "u64" => Self::U64,
            "float" | "double" | "f64" => Self::F64,
            "f32" => Self::F32,
            "bool" | "i1" => Self::Bool,
            "void" => Self::Void,
            "string" => Self::String,
            "null" | "nullptr" => Self::Null,
            _ => return None,
        };
        Some(prim)
    }

    /// 规范名称
    pub fn name(self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Bool => "bool",
            Self::Void => "void",
            Self::String => "string",
            Self::Null => "null",
        }
    }

    /// 整数位宽（bool 为 1），非整数返回 None
    pub fn int_bits(self) -> Option<u32> {
        match self {
            Self::I8 | Self::U8 => Some(8),
            Self::I16 | Self::U16 => Some(16),
            Self::I32 | Self::U32 => Some(32),
            Self::I64 | Self::U64 => Some(64),
            Self::Bool => Some(1),
            _ => None,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::I8
                | Self::I16
                | Self::I32
                | Self::I64
                | Self::U8
                | Self::U16
                | Self::U32
                | Self::U64
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, Self::U8 | Self::U16 | Self::U32 | Self::U64 | Self::Bool)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

/// 命名类型已知的声明种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    Struct,
    Enum,
}

/// 类型引用
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    /// 基础类型
    Primitive(Primitive),
    /// `inner` 后跟 `depth` 层指针
    Pointer { inner: Box<TypeRef>, depth: u32 },
    /// 多维数组，`dims` 从外到内
    Array { inner: Box<TypeRef>, dims: Vec<u64> },
    /// 元组
    Tuple(Vec<TypeRef>),
    /// 函数类型（降级为闭包）
    Function {
        params: Vec<TypeRef>,
        ret: Box<TypeRef>,
        #[serde(default)]
        variadic: bool,
    },
    /// 结构体/枚举/别名/泛型参数
    Named {
        name: String,
        #[serde(default)]
        generic_args: Vec<TypeRef>,
        #[serde(default)]
        resolved: Option<DeclKind>,
    },
}

impl TypeRef {
    pub fn primitive(prim: Primitive) -> Self {
        Self::Primitive(prim)
    }

    pub fn i32() -> Self {
        Self::Primitive(Primitive::I32)
    }

    pub fn i64() -> Self {
        Self::Primitive(Primitive::I64)
    }

    pub fn bool() -> Self {
        Self::Primitive(Primitive::Bool)
    }

    pub fn void() -> Self {
        Self::Primitive(Primitive::Void)
    }

    pub fn string() -> Self {
        Self::Primitive(Primitive::String)
    }

    /// 不带泛型参数的命名类型（也用于泛型参数 `T`）
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            generic_args: Vec::new(),
            resolved: None,
        }
    }

    /// 泛型实例引用，例如 `Pair<i32, bool>`
    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        Self::Named {
            name: name.into(),
            generic_args: args,
            resolved: None,
        }
    }

    /// 指针；嵌套的指针层数会合并
    pub fn pointer(inner: TypeRef, depth: u32) -> Self {
        if depth == 0 {
            return inner;
        }
        match inner {
            Self::Pointer {
                inner,
                depth: inner_depth,
            } => Self::Pointer {
                inner,
                depth: inner_depth + depth,
            },
            other => Self::Pointer {
                inner: Box::new(other),
                depth,
            },
        }
    }

    /// 数组；`inner` 本身是数组时外层维度在前
    pub fn array(inner: TypeRef, dims: Vec<u64>) -> Self {
        if dims.is_empty() {
            return inner;
        }
        match inner {
            Self::Array {
                inner,
                dims: inner_dims,
            } => {
                let mut merged = dims;
                merged.extend(inner_dims);
                Self::Array {
                    inner,
                    dims: merged,
                }
            }
            other => Self::Array {
                inner: Box::new(other),
                dims,
            },
        }
    }

    pub fn function(params: Vec<TypeRef>, ret: TypeRef) -> Self {
        Self::Function {
            params,
            ret: Box::new(ret),
            variadic: false,
        }
    }

    /// 设置命名类型的声明种类提示
    pub fn with_kind(self, kind: DeclKind) -> Self {
        match self {
            Self::Named {
                name, generic_args, ..
            } => Self::Named {
                name,
                generic_args,
                resolved: Some(kind),
            },
            other => other,
        }
    }

    /// 基础类型（包括写成命名类型的别名，如 `int`）
    pub fn as_primitive(&self) -> Option<Primitive> {
        match self {
            Self::Primitive(p) => Some(*p),
            Self::Named {
                name, generic_args, ..
            } if generic_args.is_empty() => Primitive::from_name(name),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        self.as_primitive() == Some(Primitive::Void)
    }

    /// 去掉一层指针；`string` 视为 `i8*`
    pub fn pointee(&self) -> Option<TypeRef> {
        match self {
            Self::Pointer { inner, depth } => {
                Some(Self::pointer((**inner).clone(), depth.saturating_sub(1)))
            }
            Self::Primitive(Primitive::String) => Some(Self::Primitive(Primitive::I8)),
            _ => None,
        }
    }

    /// 命名类型的名称与泛型实参
    pub fn as_named(&self) -> Option<(&str, &[TypeRef])> {
        match self {
            Self::Named {
                name, generic_args, ..
            } if Primitive::from_name(name).is_none() || !generic_args.is_empty() => {
                Some((name.as_str(), generic_args.as_slice()))
            }
            _ => None,
        }
    }

    /// 是否为无符号整数（用于选择比较/除法/扩展指令）
    pub fn is_unsigned(&self) -> bool {
        self.as_primitive().is_some_and(Primitive::is_unsigned)
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(p) => write!(f, "{}", p.name()),
            TypeRef::Pointer { inner, depth } => {
                write!(f, "{}", inner)?;
                for _ in 0..*depth {
                    write!(f, "*")?;
                }
                Ok(())
            }
            TypeRef::Array { inner, dims } => {
                write!(f, "{}", inner)?;
                for dim in dims {
                    write!(f, "[{}]", dim)?;
                }
                Ok(())
            }
            TypeRef::Tuple(elems) => {
                write!(f, "(")?;
                write_list(f, elems)?;
                write!(f, ")")
            }
            TypeRef::Function {
                params,
                ret,
                variadic,
            } => {
                write!(f, "fn(")?;
                write_list(f, params)?;
                if *variadic {
                    write!(f, ", ...")?;
                }
                write!(f, ") -> {}", ret)
            }
            TypeRef::Named {
                name, generic_args, ..
            } => {
                write!(f, "{}", name)?;
                if !generic_args.is_empty() {
                    write!(f, "<")?;
                    write_list(f, generic_args)?;
                    write!(f, ">")?;
                }
                Ok(())
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[TypeRef]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}
