//! Method Call Code Generation
//!
//! 非泛型实例方法经虚表分派；泛型方法、静态方法与枚举方法直接调用。

use tessera_monomorph::Substitution;
use tessera_syntax::{Expr, FunctionDecl, TypeRef};
use tracing::trace;

use crate::error::{CodegenError, CodegenResult};
use crate::function::FunctionGenerator;
use crate::ir::{CodegenValue, IrType};

impl FunctionGenerator<'_> {
    /// receiver.method(args)
    pub(crate) fn gen_method_call(
        &mut self,
        receiver: &Expr,
        method: &str,
        generic_args: &[TypeRef],
        args: &[Expr],
    ) -> CodegenResult<CodegenValue> {
        let receiver_ty = self.resolve(&receiver.ty)?;
        let (owner, this_ptr) = match receiver_ty {
            IrType::Ptr(inner) => match *inner {
                IrType::Struct(name) | IrType::Enum(name) => {
                    let pointer = self.generate_expr(receiver)?;
                    (name, pointer.value)
                }
                other => return Err(no_methods(&other.ptr_to(), method)),
            },
            IrType::Struct(name) | IrType::Enum(name) => {
                let place = self.address_of(receiver, true)?;
                (name, place.ptr)
            }
            other => return Err(no_methods(&other, method)),
        };

        let (decl_owner, decl) = self.ctx.lookup_method(&owner, method)?;
        if decl.is_static {
            return self.call_method_direct(&decl_owner, &decl, generic_args, None, args);
        }

        let this = self.upcast(&owner, &this_ptr, &decl_owner);
        let virtual_call = decl.is_virtual() && !self.ctx.enums.contains_key(&owner);
        if virtual_call {
            self.call_virtual(&owner, &this_ptr, &decl_owner, &decl, this, args)
        } else {
            self.call_method_direct(&decl_owner, &decl, generic_args, Some(this), args)
        }
    }

    /// Owner::method(args)
    pub(crate) fn gen_static_call(
        &mut self,
        owner: &TypeRef,
        method: &str,
        generic_args: &[TypeRef],
        args: &[Expr],
    ) -> CodegenResult<CodegenValue> {
        let owner_name = match self.resolve(owner)? {
            IrType::Struct(name) | IrType::Enum(name) => name,
            other => return Err(no_methods(&other, method)),
        };
        let (decl_owner, decl) = self.ctx.lookup_method(&owner_name, method)?;
        if !decl.is_static {
            return Err(CodegenError::Unsupported(format!(
                "instance method '{}::{}' called without a receiver",
                owner_name, method
            )));
        }
        self.call_method_direct(&decl_owner, &decl, generic_args, None, args)
    }

    /// 直接调用方法符号
    fn call_method_direct(
        &mut self,
        owner: &str,
        decl: &FunctionDecl,
        generic_args: &[TypeRef],
        this: Option<CodegenValue>,
        args: &[Expr],
    ) -> CodegenResult<CodegenValue> {
        let (symbol, subst) = if decl.is_generic() {
            self.ctx
                .instantiate_method(owner, decl, generic_args, &self.subst)?
        } else {
            (self.ctx.method_symbol(owner, decl, &[]), Substitution::new())
        };
        let params = decl
            .params
            .iter()
            .map(|p| self.ctx.resolve_type(&p.ty, &subst))
            .collect::<CodegenResult<Vec<_>>>()?;
        let ret = self.ctx.resolve_type(&decl.return_type, &subst)?;

        let mut values: Vec<CodegenValue> = this.into_iter().collect();
        values.extend(self.gen_args(args, &params)?);
        Ok(self.emit_call(&ret, &format!("@{}", symbol), Some("i8* null"), &values))
    }

    /// 经虚表调用：取虚表指针 → 取槽位 → 转为函数指针
    fn call_virtual(
        &mut self,
        owner: &str,
        this_ptr: &str,
        decl_owner: &str,
        decl: &FunctionDecl,
        this: CodegenValue,
        args: &[Expr],
    ) -> CodegenResult<CodegenValue> {
        let layout = self.ctx.struct_layout(owner)?;
        let missing = || CodegenError::MissingMethod {
            owner: owner.to_string(),
            method: decl.name.clone(),
        };
        let vtable_field = layout.vtable_slot().ok_or_else(missing)?;
        let slot = self.ctx.vtable_slot(owner, &decl.name)?.ok_or_else(missing)?;
        let fn_ty = self
            .ctx
            .method_fn_type(decl_owner, decl, &Substitution::new())?;
        trace!(owner, method = %decl.name, slot, "virtual call");

        let struct_ty = IrType::Struct(owner.to_string());
        let field = self.reg();
        self.emit(format!(
            "{} = getelementptr inbounds {}, {}* {}, i32 0, i32 {}",
            field, struct_ty, struct_ty, this_ptr, vtable_field
        ));
        let vtable = self.load(&IrType::i8_ptr(), &field);
        let table = self.reg();
        self.emit(format!("{} = bitcast i8* {} to i8**", table, vtable));
        let entry = self.reg();
        self.emit(format!(
            "{} = getelementptr inbounds i8*, i8** {}, i32 {}",
            entry, table, slot
        ));
        let raw = self.load(&IrType::i8_ptr(), &entry);
        let function = self.reg();
        self.emit(format!("{} = bitcast i8* {} to {}*", function, raw, fn_ty));

        let params = decl
            .params
            .iter()
            .map(|p| self.ctx.resolve_type(&p.ty, &Substitution::new()))
            .collect::<CodegenResult<Vec<_>>>()?;
        let ret = self.ctx.resolve_type(&decl.return_type, &Substitution::new())?;
        let mut values = vec![this];
        values.extend(self.gen_args(args, &params)?);
        Ok(self.emit_call(&ret, &function, Some("i8* null"), &values))
    }

    /// 把 `Owner*` 转成声明方法的祖先类型指针
    fn upcast(&mut self, owner: &str, pointer: &str, target: &str) -> CodegenValue {
        let owner_ty = self.ctx.owner_ir_type(owner).ptr_to();
        if owner == target {
            return CodegenValue::new(pointer, owner_ty);
        }
        let target_ty = self.ctx.owner_ir_type(target).ptr_to();
        let reg = self.reg();
        self.emit(format!(
            "{} = bitcast {} {} to {}",
            reg, owner_ty, pointer, target_ty
        ));
        CodegenValue::new(reg, target_ty)
    }
}

fn no_methods(ty: &IrType, method: &str) -> CodegenError {
    CodegenError::MissingMethod {
        owner: ty.to_string(),
        method: method.to_string(),
    }
}
