//! Type Resolution
//!
//! 把源语言的 `TypeRef` 解析为目标类型，并应用当前的泛型替换表。
//! 带实参的命名类型交给单态化引擎取得具体名称。

use tessera_monomorph::Substitution;
use tessera_syntax::{DeclKind, Primitive, TypeRef};
use tracing::trace;

use crate::context::CodegenContext;
use crate::error::{CodegenError, CodegenResult};
use crate::ir::IrType;

/// 解析深度上限，用于发现循环别名
pub const MAX_RESOLVE_DEPTH: usize = 200;

/// 基础类型的目标表示
pub fn primitive_type(prim: Primitive) -> IrType {
    match prim {
        Primitive::I8 | Primitive::U8 => IrType::Int(8),
        Primitive::I16 | Primitive::U16 => IrType::Int(16),
        Primitive::I32 | Primitive::U32 => IrType::Int(32),
        Primitive::I64 | Primitive::U64 => IrType::Int(64),
        Primitive::F32 => IrType::Float,
        Primitive::F64 => IrType::Double,
        Primitive::Bool => IrType::Int(1),
        Primitive::Void => IrType::Void,
        Primitive::String | Primitive::Null => IrType::i8_ptr(),
    }
}

impl CodegenContext {
    /// 解析类型
    pub fn resolve_type(&mut self, ty: &TypeRef, subst: &Substitution) -> CodegenResult<IrType> {
        if self.resolve_depth >= MAX_RESOLVE_DEPTH {
            return Err(CodegenError::TypeResolutionRecursion {
                name: ty.to_string(),
                depth: MAX_RESOLVE_DEPTH,
            });
        }
        self.resolve_depth += 1;
        let result = self.resolve_inner(ty, subst);
        self.resolve_depth -= 1;
        result
    }

    fn resolve_inner(&mut self, ty: &TypeRef, subst: &Substitution) -> CodegenResult<IrType> {
        trace!(ty = %ty, "resolve");
        match ty {
            TypeRef::Primitive(prim) => Ok(primitive_type(*prim)),

            TypeRef::Pointer { inner, depth } => {
                let mut base = self.resolve_type(inner, subst)?;
                // void* 在目标 IR 中写作 i8*
                if base.is_void() {
                    base = IrType::i8();
                }
                for _ in 0..*depth {
                    base = base.ptr_to();
                }
                Ok(base)
            }

            // dims 从外到内，所以从最内层开始包装
            TypeRef::Array { inner, dims } => {
                let mut elem = self.resolve_type(inner, subst)?;
                for dim in dims.iter().rev() {
                    elem = IrType::Array(*dim, Box::new(elem));
                }
                Ok(elem)
            }

            TypeRef::Tuple(elems) => {
                let fields = elems
                    .iter()
                    .map(|e| self.resolve_type(e, subst))
                    .collect::<CodegenResult<Vec<_>>>()?;
                Ok(IrType::Anon(fields))
            }

            TypeRef::Function {
                params,
                ret,
                variadic,
            } => {
                let ret = self.resolve_type(ret, subst)?;
                let params = params
                    .iter()
                    .map(|p| self.resolve_type(p, subst))
                    .collect::<CodegenResult<Vec<_>>>()?;
                Ok(IrType::closure(ret, params, *variadic))
            }

            TypeRef::Named {
                name,
                generic_args,
                resolved,
            } => self.resolve_named(name, generic_args, *resolved, subst),
        }
    }

    fn resolve_named(
        &mut self,
        name: &str,
        generic_args: &[TypeRef],
        hint: Option<DeclKind>,
        subst: &Substitution,
    ) -> CodegenResult<IrType> {
        if generic_args.is_empty() {
            if let Some(prim) = Primitive::from_name(name) {
                return Ok(primitive_type(prim));
            }
            if subst.is_self_mapped(name) {
                // 仍在模板体内：T ↦ T 解析为前向声明的不透明类型
                self.declare_opaque(name);
                return Ok(IrType::Opaque(name.to_string()));
            }
            if let Some(mapped) = subst.get(name) {
                let mapped = mapped.clone();
                return self.resolve_type(&mapped, subst);
            }
        }

        let args = subst.apply_all(generic_args);
        let kind = match hint {
            Some(kind) if self.has_decl(name, kind) => Some(kind),
            _ => self.lookup_kind(name),
        };

        match kind {
            Some(DeclKind::Struct) => {
                if args.is_empty() {
                    return Ok(IrType::Struct(name.to_string()));
                }
                let concrete = self.instantiate_struct(name, &args, &Substitution::new())?;
                Ok(IrType::Struct(concrete))
            }
            Some(DeclKind::Enum) => {
                if args.is_empty() {
                    return Ok(IrType::Enum(name.to_string()));
                }
                let concrete = self.instantiate_enum(name, &args, &Substitution::new())?;
                Ok(IrType::Enum(concrete))
            }
            None => {
                let Some(alias) = self.aliases.get(name).cloned() else {
                    return Err(CodegenError::UnresolvedType {
                        name: name.to_string(),
                        context: "no struct, enum or alias with this name".to_string(),
                    });
                };
                if alias.generic_params.len() != args.len() {
                    return Err(CodegenError::GenericArity {
                        decl: alias.name,
                        expected: alias.generic_params.len(),
                        got: args.len(),
                    });
                }
                let target = Substitution::from_params(&alias.generic_params, &args)
                    .apply(&alias.target);
                self.resolve_type(&target, subst)
            }
        }
    }

    fn has_decl(&self, name: &str, kind: DeclKind) -> bool {
        match kind {
            DeclKind::Struct => self.structs.contains_key(name),
            DeclKind::Enum => self.enums.contains_key(name),
        }
    }

    /// 按结构体、枚举的顺序查找声明种类
    pub(crate) fn lookup_kind(&self, name: &str) -> Option<DeclKind> {
        if self.structs.contains_key(name) {
            Some(DeclKind::Struct)
        } else if self.enums.contains_key(name) {
            Some(DeclKind::Enum)
        } else {
            None
        }
    }

    /// 解析并要求得到结构体，返回具体结构体名
    pub(crate) fn resolve_struct_name(
        &mut self,
        ty: &TypeRef,
        subst: &Substitution,
    ) -> CodegenResult<String> {
        match self.resolve_type(ty, subst)? {
            IrType::Struct(name) => Ok(name),
            other => Err(CodegenError::UnresolvedType {
                name: ty.to_string(),
                context: format!("expected a struct, found '{}'", other),
            }),
        }
    }
}
