//! Memory Layout
//!
//! 结构体槽位顺序：继承字段 ++ 可选的虚表指针 ++ 自身字段 ++ 存活标志（永远最后）。
//! 枚举：`{ i32 tag, [N x i8] data }`，N 为最大变体负载；全是单元变体时省略 data。

use indexmap::IndexMap;
use tessera_monomorph::Substitution;
use tessera_syntax::{StructField, TypeRef};
use tracing::debug;

use crate::context::CodegenContext;
use crate::error::{CodegenError, CodegenResult};
use crate::ir::IrType;

/// 虚表指针字段名
pub const VTABLE_FIELD: &str = "__vtable__";
/// 存活标志字段名
pub const LIVENESS_FIELD: &str = "__null_bit__";
/// 指针宽度（字节）
pub const POINTER_SIZE: u64 = 8;

/// 结构体布局：字段名 -> 槽位
#[derive(Debug, Clone, PartialEq)]
pub struct StructLayout {
    pub name: String,
    slots: IndexMap<String, usize>,
    field_types: Vec<IrType>,
}

impl StructLayout {
    fn new(name: &str, fields: Vec<(String, IrType)>) -> Self {
        let mut slots = IndexMap::new();
        let mut field_types = Vec::with_capacity(fields.len());
        for (i, (field, ty)) in fields.into_iter().enumerate() {
            slots.insert(field, i);
            field_types.push(ty);
        }
        Self {
            name: name.to_string(),
            slots,
            field_types,
        }
    }

    pub fn slot(&self, field: &str) -> Option<usize> {
        self.slots.get(field).copied()
    }

    pub fn field_type(&self, slot: usize) -> Option<&IrType> {
        self.field_types.get(slot)
    }

    pub fn field_types(&self) -> &[IrType] {
        &self.field_types
    }

    /// 按槽位顺序的字段名
    pub fn field_names(&self) -> Vec<&str> {
        self.slots.keys().map(String::as_str).collect()
    }

    /// 存活标志之前的字段数
    pub fn field_count(&self) -> usize {
        self.field_types.len() - 1
    }

    pub fn liveness_slot(&self) -> usize {
        self.field_count()
    }

    pub fn vtable_slot(&self) -> Option<usize> {
        self.slot(VTABLE_FIELD)
    }

    /// `%struct.Name = type { ... }`
    pub fn type_definition(&self) -> String {
        format!(
            "%struct.{} = type {}",
            self.name,
            IrType::Anon(self.field_types.clone())
        )
    }

    /// 去掉存活标志的字段（供子类继承）
    fn inherited_fields(&self) -> Vec<(String, IrType)> {
        self.slots
            .keys()
            .zip(&self.field_types)
            .filter(|(name, _)| name.as_str() != LIVENESS_FIELD)
            .map(|(name, ty)| (name.clone(), ty.clone()))
            .collect()
    }
}

/// 枚举变体布局
#[derive(Debug, Clone, PartialEq)]
pub struct VariantLayout {
    pub tag: u32,
    pub payload: Vec<IrType>,
    /// 负载字段的源类型，供 match 绑定使用
    pub source_types: Vec<TypeRef>,
    /// 负载按对齐打包后的大小
    pub size: u64,
}

impl VariantLayout {
    /// 负载视图类型，用于把 data 转换后访问
    pub fn payload_type(&self) -> IrType {
        IrType::Anon(self.payload.clone())
    }
}

/// 枚举布局
#[derive(Debug, Clone, PartialEq)]
pub struct EnumLayout {
    pub name: String,
    pub variants: IndexMap<String, VariantLayout>,
    pub data_size: u64,
}

impl EnumLayout {
    pub fn variant(&self, name: &str) -> Option<&VariantLayout> {
        self.variants.get(name)
    }

    pub fn has_data(&self) -> bool {
        self.data_size > 0
    }

    pub fn field_types(&self) -> Vec<IrType> {
        let mut fields = vec![IrType::i32()];
        if self.has_data() {
            fields.push(IrType::Array(self.data_size, Box::new(IrType::i8())));
        }
        fields
    }

    pub fn data_type(&self) -> IrType {
        IrType::Array(self.data_size, Box::new(IrType::i8()))
    }

    /// `%enum.Name = type { ... }`
    pub fn type_definition(&self) -> String {
        format!("%enum.{} = type {}", self.name, IrType::Anon(self.field_types()))
    }
}

pub fn align_to(offset: u64, align: u64) -> u64 {
    if align <= 1 {
        return offset;
    }
    offset.div_ceil(align) * align
}

impl CodegenContext {
    /// 结构体布局（必要时先计算）
    pub fn struct_layout(&mut self, name: &str) -> CodegenResult<StructLayout> {
        self.define_struct(name)?;
        self.struct_layouts
            .get(name)
            .cloned()
            .ok_or_else(|| CodegenError::UnresolvedType {
                name: name.to_string(),
                context: "struct layout".to_string(),
            })
    }

    /// 枚举布局（必要时先计算）
    pub fn enum_layout(&mut self, name: &str) -> CodegenResult<EnumLayout> {
        self.define_enum(name)?;
        self.enum_layouts
            .get(name)
            .cloned()
            .ok_or_else(|| CodegenError::UnresolvedType {
                name: name.to_string(),
                context: "enum layout".to_string(),
            })
    }

    /// 计算具体结构体的布局并发射类型定义与虚表
    pub(crate) fn define_struct(&mut self, name: &str) -> CodegenResult<()> {
        if self.struct_layouts.contains_key(name) {
            return Ok(());
        }
        let decl = self
            .structs
            .get(name)
            .cloned()
            .ok_or_else(|| CodegenError::UnresolvedType {
                name: name.to_string(),
                context: "struct declaration".to_string(),
            })?;
        if decl.is_template() {
            return Err(CodegenError::GenericTemplate(name.to_string()));
        }
        if !self.defining.insert(name.to_string()) {
            return Err(CodegenError::UnresolvedType {
                name: name.to_string(),
                context: "struct contains itself by value".to_string(),
            });
        }
        let result = self.compute_struct_layout(name, decl.parent.as_ref(), &decl.fields);
        self.defining.remove(name);
        let fields = result?;

        let layout = StructLayout::new(name, fields.clone());
        debug!(
            name,
            slots = layout.field_types().len(),
            "struct layout computed"
        );
        self.type_defs.push(layout.type_definition());
        self.struct_layouts.insert(name.to_string(), layout);
        self.debug_struct(name, &fields, &decl.location);

        if !self.vtable_layout(name)?.is_empty() {
            self.emit_vtable(name)?;
        }
        Ok(())
    }

    fn compute_struct_layout(
        &mut self,
        name: &str,
        parent: Option<&TypeRef>,
        own_fields: &[StructField],
    ) -> CodegenResult<Vec<(String, IrType)>> {
        let mut fields = match parent {
            Some(parent) => {
                let parent_name = self.parent_struct_name(parent)?;
                self.struct_layout(&parent_name)?.inherited_fields()
            }
            None => Vec::new(),
        };

        let has_vtable = !self.vtable_layout(name)?.is_empty();
        if has_vtable && !fields.iter().any(|(f, _)| f == VTABLE_FIELD) {
            fields.push((VTABLE_FIELD.to_string(), IrType::i8_ptr()));
        }

        let none = Substitution::new();
        for field in own_fields {
            let ty = self.resolve_type(&field.ty, &none).map_err(|e| match e {
                CodegenError::UnresolvedType { name: missing, .. } => CodegenError::UnresolvedType {
                    name: missing,
                    context: format!("field '{}' of '{}'", field.name, name),
                },
                other => other,
            })?;
            self.define_embedded(&ty)?;
            fields.push((field.name.clone(), ty));
        }

        fields.push((LIVENESS_FIELD.to_string(), IrType::i1()));
        Ok(fields)
    }

    /// 按值嵌入的结构体与枚举先完成布局；正在布局的类型再次出现即为按值自包含。
    /// 指针只引用类型名，不进入
    fn define_embedded(&mut self, ty: &IrType) -> CodegenResult<()> {
        match ty {
            IrType::Struct(name) => self.define_struct(name),
            IrType::Enum(name) => self.define_enum(name),
            IrType::Array(_, elem) => self.define_embedded(elem),
            IrType::Anon(fields) => fields.iter().try_for_each(|f| self.define_embedded(f)),
            _ => Ok(()),
        }
    }

    /// 计算具体枚举的布局并发射类型定义
    pub(crate) fn define_enum(&mut self, name: &str) -> CodegenResult<()> {
        if self.enum_layouts.contains_key(name) {
            return Ok(());
        }
        let decl = self
            .enums
            .get(name)
            .cloned()
            .ok_or_else(|| CodegenError::UnresolvedType {
                name: name.to_string(),
                context: "enum declaration".to_string(),
            })?;
        if decl.is_template() {
            return Err(CodegenError::GenericTemplate(name.to_string()));
        }
        if !self.defining.insert(name.to_string()) {
            return Err(CodegenError::UnresolvedType {
                name: name.to_string(),
                context: "enum contains itself by value".to_string(),
            });
        }

        let none = Substitution::new();
        let mut variants = IndexMap::new();
        let mut data_size = 0;
        let mut failure = None;
        for (tag, variant) in decl.variants.iter().enumerate() {
            let source_types = variant.payload_types();
            let payload = match source_types
                .iter()
                .map(|t| self.resolve_type(t, &none))
                .collect::<CodegenResult<Vec<_>>>()
            {
                Ok(payload) => payload,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            };
            let size = match self.packed_size(&payload) {
                Ok(size) => size,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            };
            data_size = data_size.max(size);
            variants.insert(
                variant.name.clone(),
                VariantLayout {
                    tag: tag as u32,
                    payload,
                    source_types,
                    size,
                },
            );
        }
        self.defining.remove(name);
        if let Some(e) = failure {
            return Err(e);
        }

        let layout = EnumLayout {
            name: name.to_string(),
            variants,
            data_size,
        };
        debug!(name, data_size, "enum layout computed");
        self.type_defs.push(layout.type_definition());
        self.enum_layouts.insert(name.to_string(), layout);
        Ok(())
    }

    /// 字段逐个按自身对齐打包后的大小（不做尾部取整）
    pub fn packed_size(&mut self, fields: &[IrType]) -> CodegenResult<u64> {
        let mut offset = 0;
        for ty in fields {
            let (size, align) = self.size_align(ty)?;
            offset = align_to(offset, align) + size;
        }
        Ok(offset)
    }

    /// 按结构体规则计算（大小, 对齐）
    pub fn aggregate_size_align(&mut self, fields: &[IrType]) -> CodegenResult<(u64, u64)> {
        let mut offset = 0;
        let mut max_align = 1;
        for ty in fields {
            let (size, align) = self.size_align(ty)?;
            offset = align_to(offset, align) + size;
            max_align = max_align.max(align);
        }
        Ok((align_to(offset, max_align), max_align))
    }

    /// 目标类型的（大小, 对齐），单位字节
    pub fn size_align(&mut self, ty: &IrType) -> CodegenResult<(u64, u64)> {
        match ty {
            IrType::Void => Ok((0, 1)),
            IrType::Int(bits) => {
                let bytes = u64::from(bits.div_ceil(8)).max(1);
                Ok((bytes, bytes))
            }
            IrType::Float => Ok((4, 4)),
            IrType::Double => Ok((8, 8)),
            IrType::Ptr(_) => Ok((POINTER_SIZE, POINTER_SIZE)),
            IrType::Array(len, elem) => {
                let (size, align) = self.size_align(elem)?;
                Ok((len * size, align))
            }
            IrType::Anon(fields) => self.aggregate_size_align(fields),
            IrType::Struct(name) => {
                let layout = self.struct_layout(name)?;
                self.aggregate_size_align(layout.field_types())
            }
            IrType::Enum(name) => {
                let layout = self.enum_layout(name)?;
                self.aggregate_size_align(&layout.field_types())
            }
            IrType::Opaque(name) => Err(CodegenError::UnresolvedType {
                name: name.clone(),
                context: "size of an opaque type".to_string(),
            }),
            IrType::Func { .. } => Err(CodegenError::Unsupported(
                "size of a bare function type".to_string(),
            )),
        }
    }

    /// `sizeof`：按对齐取整后的字节数
    pub fn size_of(&mut self, ty: &IrType) -> CodegenResult<u64> {
        self.size_align(ty).map(|(size, _)| size)
    }

    /// 源类型的位宽
    pub fn size_in_bits(&mut self, ty: &TypeRef, subst: &Substitution) -> CodegenResult<u64> {
        let ir = self.resolve_type(ty, subst)?;
        Ok(self.size_of(&ir)? * 8)
    }
}
