//! Generic Substitution
//!
//! 泛型参数 → 具体类型的映射，以及对字段、变体、方法签名的深度替换。
//! 替换从不修改输入，总是返回新值。

use rustc_hash::FxHashMap;
use tessera_syntax::{
    EnumDecl, EnumVariant, FunctionDecl, Param, StructDecl, StructField, TypeRef, VariantPayload,
};

/// 泛型替换表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitution {
    map: FxHashMap<String, TypeRef>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按位置把参数映射到实参；多余的一方被忽略（元数由调用方检查）
    pub fn from_params(params: &[String], args: &[TypeRef]) -> Self {
        let map = params
            .iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect();
        Self { map }
    }

    pub fn insert(&mut self, param: impl Into<String>, ty: TypeRef) {
        self.map.insert(param.into(), ty);
    }

    pub fn get(&self, param: &str) -> Option<&TypeRef> {
        self.map.get(param)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// 合并另一张表，`other` 中的映射优先
    pub fn extended(&self, other: &Substitution) -> Substitution {
        let mut merged = self.clone();
        for (k, v) in &other.map {
            merged.map.insert(k.clone(), v.clone());
        }
        merged
    }

    /// 去掉被内层泛型参数遮蔽的映射
    pub fn without(&self, shadowed: &[String]) -> Substitution {
        let map = self
            .map
            .iter()
            .filter(|(k, _)| !shadowed.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Substitution { map }
    }

    /// `T ↦ T`：仍处于模板体内部
    pub fn is_self_mapped(&self, param: &str) -> bool {
        matches!(
            self.map.get(param),
            Some(TypeRef::Named { name, generic_args, .. }) if name == param && generic_args.is_empty()
        )
    }

    /// 替换一个类型；指针/数组包装与被替换类型的包装合并
    pub fn apply(&self, ty: &TypeRef) -> TypeRef {
        if self.is_empty() {
            return ty.clone();
        }
        match ty {
            TypeRef::Primitive(_) => ty.clone(),
            TypeRef::Pointer { inner, depth } => TypeRef::pointer(self.apply(inner), *depth),
            TypeRef::Array { inner, dims } => TypeRef::array(self.apply(inner), dims.clone()),
            TypeRef::Tuple(elems) => TypeRef::Tuple(elems.iter().map(|e| self.apply(e)).collect()),
            TypeRef::Function {
                params,
                ret,
                variadic,
            } => TypeRef::Function {
                params: params.iter().map(|p| self.apply(p)).collect(),
                ret: Box::new(self.apply(ret)),
                variadic: *variadic,
            },
            TypeRef::Named {
                name,
                generic_args,
                resolved,
            } => {
                if generic_args.is_empty() {
                    if let Some(mapped) = self.map.get(name) {
                        return mapped.clone();
                    }
                }
                TypeRef::Named {
                    name: name.clone(),
                    generic_args: generic_args.iter().map(|a| self.apply(a)).collect(),
                    resolved: *resolved,
                }
            }
        }
    }

    pub fn apply_all(&self, types: &[TypeRef]) -> Vec<TypeRef> {
        types.iter().map(|t| self.apply(t)).collect()
    }

    /// 替换方法/函数签名；函数体保持原样，发射时再按替换表解析
    pub fn apply_signature(&self, func: &FunctionDecl) -> FunctionDecl {
        let local = self.without(&func.generic_params);
        FunctionDecl {
            params: func
                .params
                .iter()
                .map(|p| Param::new(p.name.clone(), local.apply(&p.ty)))
                .collect(),
            return_type: local.apply(&func.return_type),
            ..func.clone()
        }
    }

    /// 生成具体结构体声明
    pub fn apply_struct(&self, decl: &StructDecl, concrete_name: &str) -> StructDecl {
        StructDecl {
            name: concrete_name.to_string(),
            generic_params: Vec::new(),
            parent: decl.parent.as_ref().map(|p| self.apply(p)),
            fields: decl
                .fields
                .iter()
                .map(|f| StructField::new(f.name.clone(), self.apply(&f.ty)))
                .collect(),
            methods: decl.methods.iter().map(|m| self.apply_signature(m)).collect(),
            location: decl.location.clone(),
        }
    }

    /// 生成具体枚举声明
    pub fn apply_enum(&self, decl: &EnumDecl, concrete_name: &str) -> EnumDecl {
        EnumDecl {
            name: concrete_name.to_string(),
            generic_params: Vec::new(),
            variants: decl
                .variants
                .iter()
                .map(|v| EnumVariant {
                    name: v.name.clone(),
                    payload: v.payload.as_ref().map(|p| match p {
                        VariantPayload::Tuple(types) => VariantPayload::Tuple(self.apply_all(types)),
                        VariantPayload::Struct(fields) => VariantPayload::Struct(
                            fields
                                .iter()
                                .map(|f| StructField::new(f.name.clone(), self.apply(&f.ty)))
                                .collect(),
                        ),
                    }),
                })
                .collect(),
            methods: decl.methods.iter().map(|m| self.apply_signature(m)).collect(),
            location: decl.location.clone(),
        }
    }
}
