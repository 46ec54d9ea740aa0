//! Enum Construction and Match
//!
//! 变体值在栈上构造：写 tag，再把 data 转成负载视图逐字段写入。
//! match 按 tag 做 switch；没有通配分支时默认分支调用 panic。

use rustc_hash::FxHashSet;
use tessera_syntax::{Expr, MatchArm, TypeRef};

use crate::error::{CodegenError, CodegenResult};
use crate::expr::Place;
use crate::function::{FunctionGenerator, Local};
use crate::ir::{CodegenValue, IrType};
use crate::layout::{EnumLayout, VariantLayout};
use crate::runtime::PANIC;

impl FunctionGenerator<'_> {
    pub(crate) fn gen_enum_variant(
        &mut self,
        variant: &str,
        args: &[Expr],
        ty: &TypeRef,
    ) -> CodegenResult<CodegenValue> {
        let (name, layout) = self.enum_of(ty)?;
        let info = variant_of(&layout, &name, variant)?;
        if info.payload.len() != args.len() {
            return Err(CodegenError::Unsupported(format!(
                "variant '{}::{}' takes {} values, got {}",
                name,
                variant,
                info.payload.len(),
                args.len()
            )));
        }

        let enum_ty = IrType::Enum(name);
        let slot = self.alloca(&enum_ty);
        let tag_ptr = self.reg();
        self.emit(format!(
            "{} = getelementptr inbounds {}, {}* {}, i32 0, i32 0",
            tag_ptr, enum_ty, enum_ty, slot
        ));
        self.emit(format!("store i32 {}, i32* {}", info.tag, tag_ptr));

        if !args.is_empty() {
            let payload = self.payload_view(&enum_ty, &layout, &slot, &info);
            for (i, (arg, field_ty)) in args.iter().zip(&info.payload).enumerate() {
                let value = self.generate_expr(arg)?;
                let value = self.coerce(value, &arg.ty, field_ty)?;
                let field = self.payload_field(&info, &payload, i);
                self.store(&value, &field);
            }
        }

        let value = self.load(&enum_ty, &slot);
        Ok(CodegenValue::new(value, enum_ty))
    }

    pub(crate) fn gen_match(
        &mut self,
        scrutinee: &Expr,
        arms: &[MatchArm],
        result_ty: &TypeRef,
    ) -> CodegenResult<CodegenValue> {
        let base: Place = self.aggregate_base(scrutinee)?;
        let name = match &base.ty {
            IrType::Enum(name) => name.clone(),
            other => {
                return Err(CodegenError::Unsupported(format!(
                    "match on '{}'",
                    other
                )))
            }
        };
        let layout = self.ctx.enum_layout(&name)?;
        let enum_ty = base.ty.clone();
        let result_ir = self.resolve(result_ty)?;
        let result_slot = if result_ir.is_void() {
            None
        } else {
            Some(self.alloca(&result_ir))
        };

        let tag_ptr = self.reg();
        self.emit(format!(
            "{} = getelementptr inbounds {}, {}* {}, i32 0, i32 0",
            tag_ptr, enum_ty, enum_ty, base.ptr
        ));
        let tag = self.load(&IrType::i32(), &tag_ptr);

        let end_label = self.label("match.end");
        let default_label = self.label("match.default");
        let mut cases = Vec::new();
        let mut seen = FxHashSet::default();
        let mut wildcard = None;
        let mut arm_labels = Vec::with_capacity(arms.len());
        for arm in arms {
            let label = self.label("match.arm");
            match &arm.variant {
                Some(variant) => {
                    let info = variant_of(&layout, &name, variant)?;
                    // 重复的变体只取第一个分支
                    if seen.insert(info.tag) {
                        cases.push(format!("i32 {}, label %{}", info.tag, label));
                    }
                }
                None => {
                    if wildcard.is_none() {
                        wildcard = Some(label.clone());
                    }
                }
            }
            arm_labels.push(label);
        }
        let default_target = wildcard.clone().unwrap_or_else(|| default_label.clone());
        self.terminate(format!(
            "switch i32 {}, label %{} [ {} ]",
            tag,
            default_target,
            cases.join(" ")
        ));

        for (arm, label) in arms.iter().zip(&arm_labels) {
            self.start_block(label);
            let saved = self.locals.clone();
            if let Some(variant) = &arm.variant {
                let info = variant_of(&layout, &name, variant)?;
                self.bind_payload(&enum_ty, &layout, &base.ptr, &info, &arm.bindings)?;
            }
            let value = self.generate_expr(&arm.body);
            self.locals = saved;
            let value = value?;
            if let Some(slot) = &result_slot {
                if !self.is_terminated() {
                    let value = self.coerce(value, &arm.body.ty, &result_ir)?;
                    self.store(&value, slot);
                }
            }
            if !self.is_terminated() {
                self.terminate(format!("br label %{}", end_label));
            }
        }

        if wildcard.is_none() {
            self.start_block(&default_label);
            let message = self
                .ctx
                .string_pointer(&format!("non-exhaustive match on {}", name));
            self.emit(format!("call void @{}(i8* {})", PANIC, message));
            self.terminate("unreachable");
        }

        self.start_block(&end_label);
        match result_slot {
            Some(slot) => {
                let value = self.load(&result_ir, &slot);
                Ok(CodegenValue::new(value, result_ir))
            }
            None => Ok(CodegenValue::void()),
        }
    }

    /// 把变体负载字段复制到以绑定名命名的局部变量
    fn bind_payload(
        &mut self,
        enum_ty: &IrType,
        layout: &EnumLayout,
        base: &str,
        info: &VariantLayout,
        bindings: &[String],
    ) -> CodegenResult<()> {
        if bindings.is_empty() || info.payload.is_empty() {
            return Ok(());
        }
        if bindings.len() > info.payload.len() {
            return Err(CodegenError::Unsupported(format!(
                "{} bindings for a payload of {} values",
                bindings.len(),
                info.payload.len()
            )));
        }
        let payload = self.payload_view(enum_ty, layout, base, info);
        for (i, binding) in bindings.iter().enumerate() {
            if binding == "_" {
                continue;
            }
            let field_ty = info.payload[i].clone();
            let field = self.payload_field(info, &payload, i);
            let value = self.load(&field_ty, &field);
            let slot = self.alloca(&field_ty);
            self.emit(format!(
                "store {} {}, {}* {}",
                field_ty, value, field_ty, slot
            ));
            let source_ty = info
                .source_types
                .get(i)
                .cloned()
                .unwrap_or_else(TypeRef::void);
            self.locals.insert(
                binding.clone(),
                Local {
                    ptr: slot,
                    ty: source_ty,
                    ir: field_ty,
                },
            );
        }
        Ok(())
    }

    /// data 字段转换为负载结构指针
    fn payload_view(
        &mut self,
        enum_ty: &IrType,
        layout: &EnumLayout,
        base: &str,
        info: &VariantLayout,
    ) -> String {
        let data = self.reg();
        self.emit(format!(
            "{} = getelementptr inbounds {}, {}* {}, i32 0, i32 1",
            data, enum_ty, enum_ty, base
        ));
        let view = self.reg();
        self.emit(format!(
            "{} = bitcast {}* {} to {}*",
            view,
            layout.data_type(),
            data,
            info.payload_type()
        ));
        view
    }

    fn payload_field(&mut self, info: &VariantLayout, view: &str, index: usize) -> String {
        let payload_ty = info.payload_type();
        let reg = self.reg();
        self.emit(format!(
            "{} = getelementptr inbounds {}, {}* {}, i32 0, i32 {}",
            reg, payload_ty, payload_ty, view, index
        ));
        reg
    }

    /// 解析为具体枚举
    fn enum_of(&mut self, ty: &TypeRef) -> CodegenResult<(String, EnumLayout)> {
        match self.resolve(ty)? {
            IrType::Enum(name) => {
                let layout = self.ctx.enum_layout(&name)?;
                Ok((name, layout))
            }
            other => Err(CodegenError::Unsupported(format!(
                "enum variant of non-enum type '{}'",
                other
            ))),
        }
    }
}

fn variant_of(layout: &EnumLayout, owner: &str, variant: &str) -> CodegenResult<VariantLayout> {
    layout
        .variant(variant)
        .cloned()
        .ok_or_else(|| CodegenError::UnknownVariant {
            owner: owner.to_string(),
            variant: variant.to_string(),
        })
}
