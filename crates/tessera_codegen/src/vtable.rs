//! Virtual Dispatch Tables
//!
//! 单继承下的虚表槽位分配：父类槽位在前，覆盖保持原槽位，新方法追加到末尾。

use tessera_monomorph::Substitution;
use tessera_syntax::{FunctionDecl, TypeRef};
use tracing::debug;

use crate::context::CodegenContext;
use crate::error::{CodegenError, CodegenResult};
use crate::ir::IrType;

impl CodegenContext {
    /// 结构体的虚表布局（方法名按槽位排列），按结构体缓存
    pub fn vtable_layout(&mut self, name: &str) -> CodegenResult<Vec<String>> {
        if let Some(layout) = self.vtable_layouts.get(name) {
            return Ok(layout.clone());
        }
        let decl = self
            .structs
            .get(name)
            .cloned()
            .ok_or_else(|| CodegenError::UnresolvedType {
                name: name.to_string(),
                context: "vtable owner".to_string(),
            })?;

        let mut slots = match &decl.parent {
            Some(parent) => {
                let parent_name = self.parent_struct_name(parent)?;
                self.vtable_layout(&parent_name)?
            }
            None => Vec::new(),
        };
        for method in decl.methods.iter().filter(|m| m.is_virtual()) {
            if !slots.contains(&method.name) {
                slots.push(method.name.clone());
            }
        }

        debug!(name, slots = ?slots, "vtable layout");
        self.vtable_layouts.insert(name.to_string(), slots.clone());
        Ok(slots)
    }

    /// 方法的槽位下标
    pub fn vtable_slot(&mut self, owner: &str, method: &str) -> CodegenResult<Option<usize>> {
        Ok(self
            .vtable_layout(owner)?
            .iter()
            .position(|m| m == method))
    }

    /// 沿继承链向上查找定义该方法的最具体结构体
    pub fn find_method_owner(
        &mut self,
        name: &str,
        method: &str,
    ) -> CodegenResult<Option<(String, FunctionDecl)>> {
        let mut current = name.to_string();
        loop {
            let decl = self
                .structs
                .get(&current)
                .cloned()
                .ok_or_else(|| CodegenError::UnresolvedType {
                    name: current.clone(),
                    context: "method lookup".to_string(),
                })?;
            if let Some(found) = decl.method(method) {
                return Ok(Some((current, found.clone())));
            }
            match &decl.parent {
                Some(parent) => current = self.parent_struct_name(parent)?,
                None => return Ok(None),
            }
        }
    }

    /// 与 `find_method_owner` 相同，找不到时报错
    pub fn lookup_method(
        &mut self,
        name: &str,
        method: &str,
    ) -> CodegenResult<(String, FunctionDecl)> {
        if self.enums.contains_key(name) {
            return self
                .enums
                .get(name)
                .and_then(|e| e.methods.iter().find(|m| m.name == method))
                .map(|m| (name.to_string(), m.clone()))
                .ok_or_else(|| CodegenError::MissingMethod {
                    owner: name.to_string(),
                    method: method.to_string(),
                });
        }
        self.find_method_owner(name, method)?
            .ok_or_else(|| CodegenError::MissingMethod {
                owner: name.to_string(),
                method: method.to_string(),
            })
    }

    /// 父类引用解析为具体结构体名
    pub(crate) fn parent_struct_name(&mut self, parent: &TypeRef) -> CodegenResult<String> {
        self.resolve_struct_name(parent, &Substitution::new())
    }

    /// 方法符号名
    pub fn method_symbol(&self, owner: &str, method: &FunctionDecl, generic_args: &[TypeRef]) -> String {
        self.mangler()
            .method_name(owner, &method.name, &method.param_types(), generic_args)
    }

    /// 方法的函数类型：(i8* env, Owner* this, params...)；静态方法没有 this
    pub(crate) fn method_fn_type(
        &mut self,
        owner: &str,
        method: &FunctionDecl,
        subst: &Substitution,
    ) -> CodegenResult<IrType> {
        let ret = self.resolve_type(&method.return_type, subst)?;
        let mut params = vec![IrType::i8_ptr()];
        if !method.is_static {
            params.push(self.owner_ir_type(owner).ptr_to());
        }
        for param in &method.params {
            params.push(self.resolve_type(&param.ty, subst)?);
        }
        Ok(IrType::Func {
            ret: Box::new(ret),
            params,
            variadic: false,
        })
    }

    /// 方法所属类型的目标表示
    pub(crate) fn owner_ir_type(&self, owner: &str) -> IrType {
        if self.enums.contains_key(owner) {
            IrType::Enum(owner.to_string())
        } else {
            IrType::Struct(owner.to_string())
        }
    }

    /// 发射 `@Name_vtable` 常量
    pub(crate) fn emit_vtable(&mut self, name: &str) -> CodegenResult<()> {
        let slots = self.vtable_layout(name)?;
        let mut entries = Vec::with_capacity(slots.len());
        for method in &slots {
            let (owner, decl) = self.find_method_owner(name, method)?.ok_or_else(|| {
                CodegenError::MissingMethod {
                    owner: name.to_string(),
                    method: method.clone(),
                }
            })?;
            let symbol = self.method_symbol(&owner, &decl, &[]);
            let fn_ty = self.method_fn_type(&owner, &decl, &Substitution::new())?;
            entries.push(format!("i8* bitcast ({}* @{} to i8*)", fn_ty, symbol));
        }
        debug!(name, entries = entries.len(), "emit vtable");
        self.constants.push(format!(
            "{} = constant [{} x i8*] [{}]",
            vtable_global(name),
            entries.len(),
            entries.join(", ")
        ));
        Ok(())
    }
}

/// 虚表全局变量名
pub fn vtable_global(name: &str) -> String {
    format!("@{}_vtable", name)
}
