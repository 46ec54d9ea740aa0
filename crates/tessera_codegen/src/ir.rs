//! Target IR Types
//!
//! 目标 IR 的类型描述符，`Display` 输出文本形式

use std::fmt;

/// 目标类型
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrType {
    Void,
    /// iN
    Int(u32),
    Float,
    Double,
    Ptr(Box<IrType>),
    /// [N x T]
    Array(u64, Box<IrType>),
    /// %struct.Name
    Struct(String),
    /// %enum.Name
    Enum(String),
    /// 前向声明的不透明类型，打印为 %struct.Name
    Opaque(String),
    /// 匿名聚合 { a, b }
    Anon(Vec<IrType>),
    /// 函数类型（非指针）
    Func {
        ret: Box<IrType>,
        params: Vec<IrType>,
        variadic: bool,
    },
}

impl IrType {
    pub fn i1() -> Self {
        IrType::Int(1)
    }

    pub fn i8() -> Self {
        IrType::Int(8)
    }

    pub fn i32() -> Self {
        IrType::Int(32)
    }

    pub fn i64() -> Self {
        IrType::Int(64)
    }

    /// i8*，不透明字节指针
    pub fn i8_ptr() -> Self {
        IrType::Ptr(Box::new(IrType::i8()))
    }

    pub fn ptr_to(self) -> Self {
        IrType::Ptr(Box::new(self))
    }

    /// 闭包：{ ret (i8*, params...)*, i8* }
    pub fn closure(ret: IrType, params: Vec<IrType>, variadic: bool) -> Self {
        IrType::Anon(vec![
            IrType::code_pointer(ret, params, variadic),
            IrType::i8_ptr(),
        ])
    }

    /// 闭包代码指针：第一个参数是环境指针
    pub fn code_pointer(ret: IrType, params: Vec<IrType>, variadic: bool) -> Self {
        let mut all = Vec::with_capacity(params.len() + 1);
        all.push(IrType::i8_ptr());
        all.extend(params);
        IrType::Func {
            ret: Box::new(ret),
            params: all,
            variadic,
        }
        .ptr_to()
    }

    pub fn is_void(&self) -> bool {
        matches!(self, IrType::Void)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, IrType::Ptr(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, IrType::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, IrType::Float | IrType::Double)
    }

    /// 结构体、枚举、数组与匿名聚合
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            IrType::Struct(_) | IrType::Enum(_) | IrType::Opaque(_) | IrType::Anon(_) | IrType::Array(..)
        )
    }

    pub fn pointee(&self) -> Option<&IrType> {
        match self {
            IrType::Ptr(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn int_bits(&self) -> Option<u32> {
        match self {
            IrType::Int(bits) => Some(*bits),
            _ => None,
        }
    }

    /// 该类型的零值常量
    pub fn zero_value(&self) -> String {
        match self {
            IrType::Int(_) => "0".to_string(),
            IrType::Float | IrType::Double => "0.0".to_string(),
            IrType::Ptr(_) => "null".to_string(),
            _ => "zeroinitializer".to_string(),
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => write!(f, "void"),
            IrType::Int(bits) => write!(f, "i{}", bits),
            IrType::Float => write!(f, "float"),
            IrType::Double => write!(f, "double"),
            IrType::Ptr(inner) => write!(f, "{}*", inner),
            IrType::Array(len, elem) => write!(f, "[{} x {}]", len, elem),
            IrType::Struct(name) | IrType::Opaque(name) => write!(f, "%struct.{}", name),
            IrType::Enum(name) => write!(f, "%enum.{}", name),
            IrType::Anon(fields) => {
                if fields.is_empty() {
                    return write!(f, "{{}}");
                }
                write!(f, "{{ ")?;
                write_joined(f, fields)?;
                write!(f, " }}")
            }
            IrType::Func {
                ret,
                params,
                variadic,
            } => {
                write!(f, "{} (", ret)?;
                write_joined(f, params)?;
                if *variadic {
                    if params.is_empty() {
                        write!(f, "...")?;
                    } else {
                        write!(f, ", ...")?;
                    }
                }
                write!(f, ")")
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, types: &[IrType]) -> fmt::Result {
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", ty)?;
    }
    Ok(())
}

/// 生成的值：操作数文本与其类型
#[derive(Debug, Clone, PartialEq)]
pub struct CodegenValue {
    pub value: String,
    pub ty: IrType,
}

impl CodegenValue {
    pub fn new(value: impl Into<String>, ty: IrType) -> Self {
        Self {
            value: value.into(),
            ty,
        }
    }

    /// void 调用等没有结果的表达式
    pub fn void() -> Self {
        Self {
            value: String::new(),
            ty: IrType::Void,
        }
    }

    /// `ty value`，用作指令操作数
    pub fn typed(&self) -> String {
        format!("{} {}", self.ty, self.value)
    }
}

/// LLVM 字符串常量转义：可打印 ASCII 原样保留，其余写成 \XX
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        if (0x20..0x7f).contains(&byte) && byte != b'"' && byte != b'\\' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("\\{:02X}", byte));
        }
    }
    out
}

/// 浮点常量用十六进制位模式，避免十进制精度问题
pub fn float_literal(value: f64, ty: &IrType) -> String {
    let bits = match ty {
        // float 常量也以 double 位模式书写，但必须可精确表示
        IrType::Float => (value as f32 as f64).to_bits(),
        _ => value.to_bits(),
    };
    format!("0x{:016X}", bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(IrType::i8_ptr().to_string(), "i8*");
        assert_eq!(
            IrType::Array(3, Box::new(IrType::i32())).to_string(),
            "[3 x i32]"
        );
        assert_eq!(IrType::Struct("Pair_i32_i1".into()).to_string(), "%struct.Pair_i32_i1");
        assert_eq!(IrType::Enum("Shape".into()).to_string(), "%enum.Shape");
        assert_eq!(
            IrType::Anon(vec![IrType::i32(), IrType::i1()]).to_string(),
            "{ i32, i1 }"
        );
    }

    #[test]
    fn test_closure_shape() {
        let closure = IrType::closure(IrType::i32(), vec![IrType::i32()], false);
        assert_eq!(closure.to_string(), "{ i32 (i8*, i32)*, i8* }");
    }

    #[test]
    fn test_variadic_func() {
        let printf = IrType::Func {
            ret: Box::new(IrType::i32()),
            params: vec![IrType::i8_ptr()],
            variadic: true,
        };
        assert_eq!(printf.to_string(), "i32 (i8*, ...)");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("hi\n"), "hi\\0A");
        assert_eq!(escape_string("a\"b"), "a\\22b");
    }

    #[test]
    fn test_float_literal() {
        assert_eq!(float_literal(1.0, &IrType::Double), "0x3FF0000000000000");
    }
}
