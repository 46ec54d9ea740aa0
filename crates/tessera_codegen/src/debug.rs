//! Debug Metadata Interface
//!
//! 发射器只通过这个窄接口请求调试元数据，元数据的内部表示由实现方决定。
//! 返回的编号以 `!N` 形式引用。

use tessera_syntax::SourceLocation;

use crate::context::CodegenContext;
use crate::ir::IrType;

/// DWARF 基础类型编码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DwarfEncoding {
    Signed,
    Unsigned,
    Float,
    Boolean,
    Address,
}

/// 结构体成员描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugMember {
    pub name: String,
    pub type_id: u32,
    pub offset_bits: u64,
    pub size_bits: u64,
}

/// 调试信息收集器
pub trait DebugInfoSink {
    fn file_id(&mut self, path: &str) -> u32;
    fn basic_type(&mut self, name: &str, size_bits: u64, encoding: DwarfEncoding) -> u32;
    fn pointer_type(&mut self, pointee: u32) -> u32;
    fn struct_type(
        &mut self,
        name: &str,
        size_bits: u64,
        file: u32,
        line: u32,
        members: &[DebugMember],
    ) -> u32;
    fn array_type(&mut self, element: u32, count: u64, size_bits: u64) -> u32;
    fn location(&mut self, line: u32, column: u32, scope: u32) -> u32;
    fn subprogram(&mut self, name: &str, line: u32, file: u32, type_id: u32) -> u32;
    /// 追加在模块末尾的元数据行
    fn metadata_lines(&self) -> Vec<String>;
}

impl CodegenContext {
    /// 目标类型对应的调试类型编号
    pub(crate) fn debug_type(&mut self, ty: &IrType) -> Option<u32> {
        if !self.debug_enabled() {
            return None;
        }
        if let IrType::Struct(name) | IrType::Enum(name) = ty {
            if let Some(id) = self.debug_types.get(name) {
                return Some(*id);
            }
        }
        let size_bits = self.size_of(ty).map(|s| s * 8).unwrap_or(0);
        let element = match ty {
            IrType::Ptr(inner) => Some(self.debug_type(inner).unwrap_or(0)),
            IrType::Array(_, inner) => Some(self.debug_type(inner).unwrap_or(0)),
            _ => None,
        };
        let sink = self.debug.as_mut()?;
        let id = match ty {
            IrType::Int(1) => sink.basic_type("bool", 8, DwarfEncoding::Boolean),
            IrType::Int(bits) => {
                sink.basic_type(&format!("i{}", bits), u64::from(*bits), DwarfEncoding::Signed)
            }
            IrType::Float => sink.basic_type("float", 32, DwarfEncoding::Float),
            IrType::Double => sink.basic_type("double", 64, DwarfEncoding::Float),
            IrType::Ptr(_) => sink.pointer_type(element.unwrap_or(0)),
            IrType::Array(count, _) => sink.array_type(element.unwrap_or(0), *count, size_bits),
            other => sink.basic_type(&other.to_string(), size_bits, DwarfEncoding::Address),
        };
        Some(id)
    }

    /// 结构体定义时登记调试类型
    pub(crate) fn debug_struct(
        &mut self,
        name: &str,
        fields: &[(String, IrType)],
        location: &SourceLocation,
    ) {
        if !self.debug_enabled() {
            return;
        }
        let mut members = Vec::with_capacity(fields.len());
        let mut offset = 0u64;
        let mut max_align = 1u64;
        for (field, ty) in fields {
            let (size, align) = self.size_align(ty).unwrap_or((0, 1));
            max_align = max_align.max(align);
            offset = crate::layout::align_to(offset, align);
            let type_id = self.debug_type(ty).unwrap_or(0);
            members.push(DebugMember {
                name: field.clone(),
                type_id,
                offset_bits: offset * 8,
                size_bits: size * 8,
            });
            offset += size;
        }
        if let Some(sink) = self.debug.as_mut() {
            let file = sink.file_id(&location.file);
            let size_bits = crate::layout::align_to(offset, max_align) * 8;
            let id = sink.struct_type(name, size_bits, file, location.line, &members);
            self.debug_types.insert(name.to_string(), id);
        }
    }

    /// 函数开始时登记子程序
    pub(crate) fn debug_subprogram(
        &mut self,
        name: &str,
        ret: &IrType,
        location: &SourceLocation,
    ) -> Option<u32> {
        if !self.debug_enabled() {
            return None;
        }
        let type_id = self.debug_type(ret).unwrap_or(0);
        let sink = self.debug.as_mut()?;
        let file = sink.file_id(&location.file);
        Some(sink.subprogram(name, location.line, file, type_id))
    }

    pub(crate) fn debug_location(&mut self, location: &SourceLocation, scope: u32) -> Option<u32> {
        if !self.debug_enabled() || location.is_unknown() {
            return None;
        }
        let sink = self.debug.as_mut()?;
        Some(sink.location(location.line, location.column, scope))
    }
}
