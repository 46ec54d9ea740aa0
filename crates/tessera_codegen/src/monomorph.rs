//! Monomorphization Engine
//!
//! 按需实例化泛型结构体、枚举、函数与泛型方法。
//!
//! 类型实例：替换字段与签名、以修饰名登记具体声明、立即计算布局，
//! 方法体只入队，不在这里发射。函数与泛型方法只登记并入队。

use tessera_monomorph::{BodySource, Claim, PendingGeneration, Substitution};
use tessera_syntax::{FunctionDecl, TypeRef};
use tracing::debug;

use crate::context::CodegenContext;
use crate::error::{CodegenError, CodegenResult};

impl CodegenContext {
    /// 实例化泛型结构体，返回具体名称
    pub fn instantiate_struct(
        &mut self,
        base: &str,
        args: &[TypeRef],
        context: &Substitution,
    ) -> CodegenResult<String> {
        let args = context.apply_all(args);
        let template = self
            .structs
            .get(base)
            .cloned()
            .ok_or_else(|| CodegenError::UnresolvedType {
                name: base.to_string(),
                context: "generic struct template".to_string(),
            })?;
        if is_identity(&template.generic_params, &args) {
            return Ok(base.to_string());
        }
        check_arity(base, &template.generic_params, &args)?;

        let mangled = self.mangler().generic_name(base, &args);
        if let Claim::Existing(state) = self.instances.begin(base, &args, &mangled) {
            debug!(%mangled, ?state, "struct instance reused");
            return Ok(mangled);
        }
        debug!(base, %mangled, "instantiate struct");

        let subst = Substitution::from_params(&template.generic_params, &args);
        let concrete = subst.apply_struct(&template, &mangled);
        let methods = concrete.methods.clone();
        self.structs.insert(mangled.clone(), concrete);
        self.owner_substitutions.insert(mangled.clone(), subst.clone());

        self.define_struct(&mangled)?;
        self.queue_methods(&mangled, &methods, &subst);
        self.instances.complete(&mangled);
        Ok(mangled)
    }

    /// 实例化泛型枚举，返回具体名称
    pub fn instantiate_enum(
        &mut self,
        base: &str,
        args: &[TypeRef],
        context: &Substitution,
    ) -> CodegenResult<String> {
        let args = context.apply_all(args);
        let template = self
            .enums
            .get(base)
            .cloned()
            .ok_or_else(|| CodegenError::UnresolvedType {
                name: base.to_string(),
                context: "generic enum template".to_string(),
            })?;
        if is_identity(&template.generic_params, &args) {
            return Ok(base.to_string());
        }
        check_arity(base, &template.generic_params, &args)?;

        let mangled = self.mangler().generic_name(base, &args);
        if let Claim::Existing(state) = self.instances.begin(base, &args, &mangled) {
            debug!(%mangled, ?state, "enum instance reused");
            return Ok(mangled);
        }
        debug!(base, %mangled, "instantiate enum");

        let subst = Substitution::from_params(&template.generic_params, &args);
        let concrete = subst.apply_enum(&template, &mangled);
        let methods = concrete.methods.clone();
        self.enums.insert(mangled.clone(), concrete);
        self.owner_substitutions.insert(mangled.clone(), subst.clone());

        self.define_enum(&mangled)?;
        self.queue_methods(&mangled, &methods, &subst);
        self.instances.complete(&mangled);
        Ok(mangled)
    }

    /// 请求泛型函数的一个实例，返回符号名；函数体入队
    pub fn instantiate_function(
        &mut self,
        name: &str,
        generic_args: &[TypeRef],
        context: &Substitution,
    ) -> CodegenResult<String> {
        let decl = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| CodegenError::UndefinedFunction(name.to_string()))?;
        let args = context.apply_all(generic_args);
        check_arity(name, &decl.generic_params, &args)?;

        let subst = Substitution::from_params(&decl.generic_params, &args);
        let params = subst.apply_all(&decl.param_types());
        let symbol = self.mangler().function_name(name, &params, &args);
        if self.instances.request(name, &args, &symbol) {
            debug!(name, %symbol, "instantiate function");
            self.pending.push(PendingGeneration {
                symbol: symbol.clone(),
                source: BodySource::Function {
                    template: name.to_string(),
                },
                substitution: subst,
            });
        }
        Ok(symbol)
    }

    /// 请求泛型方法的一个实例，键为 (所属类型, 方法名, 方法实参)
    ///
    /// 返回符号名与发射函数体所需的完整替换表
    pub fn instantiate_method(
        &mut self,
        owner: &str,
        method: &FunctionDecl,
        generic_args: &[TypeRef],
        context: &Substitution,
    ) -> CodegenResult<(String, Substitution)> {
        let args = context.apply_all(generic_args);
        check_arity(
            &format!("{}.{}", owner, method.name),
            &method.generic_params,
            &args,
        )?;

        let method_subst = Substitution::from_params(&method.generic_params, &args);
        let subst = self.owner_substitution(owner).extended(&method_subst);
        let params = subst.apply_all(&method.param_types());
        let symbol = self
            .mangler()
            .method_name(owner, &method.name, &params, &args);
        let key = format!("{}.{}", owner, method.name);
        if self.instances.request(&key, &args, &symbol) {
            debug!(owner, method = %method.name, %symbol, "instantiate generic method");
            self.pending.push(PendingGeneration {
                symbol: symbol.clone(),
                source: BodySource::Method {
                    owner: owner.to_string(),
                    method: method.name.clone(),
                },
                substitution: subst.clone(),
            });
        }
        Ok((symbol, subst))
    }

    /// 具体类型的非泛型方法全部入队
    pub(crate) fn queue_methods(
        &mut self,
        owner: &str,
        methods: &[FunctionDecl],
        subst: &Substitution,
    ) {
        for method in methods.iter().filter(|m| !m.is_generic()) {
            let symbol = self.method_symbol(owner, method, &[]);
            let key = format!("{}.{}", owner, method.name);
            if self.instances.request(&key, &[], &symbol) {
                self.pending.push(PendingGeneration {
                    symbol,
                    source: BodySource::Method {
                        owner: owner.to_string(),
                        method: method.name.clone(),
                    },
                    substitution: subst.clone(),
                });
            }
        }
    }

    /// 非泛型函数的符号名；`main` 不修饰
    pub fn function_symbol(&self, decl: &FunctionDecl) -> String {
        if decl.name == "main" {
            return decl.name.clone();
        }
        self.mangler()
            .function_name(&decl.name, &decl.param_types(), &[])
    }

    /// 发射方法体时使用的替换表
    pub(crate) fn owner_substitution(&self, owner: &str) -> Substitution {
        self.owner_substitutions
            .get(owner)
            .cloned()
            .unwrap_or_default()
    }
}

/// 实参恰好是模板自己的参数
fn is_identity(params: &[String], args: &[TypeRef]) -> bool {
    !params.is_empty()
        && params.len() == args.len()
        && params.iter().zip(args).all(|(param, arg)| {
            matches!(arg.as_named(), Some((name, rest)) if name == param && rest.is_empty())
        })
}

fn check_arity(decl: &str, params: &[String], args: &[TypeRef]) -> CodegenResult<()> {
    if params.len() != args.len() {
        return Err(CodegenError::GenericArity {
            decl: decl.to_string(),
            expected: params.len(),
            got: args.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CodegenOptions;
    use crate::ir::IrType;
    use pretty_assertions::assert_eq;
    use tessera_monomorph::GenerationState;
    use tessera_syntax::{EnumDecl, EnumVariant, Param, StructDecl, StructField};

    fn ctx() -> CodegenContext {
        CodegenContext::new(CodegenOptions::default())
    }

    fn boxed() -> StructDecl {
        StructDecl::new("Box", vec![StructField::new("value", TypeRef::named("T"))])
            .with_generics(&["T"])
    }

    #[test]
    fn test_identity_short_circuit() {
        let mut ctx = ctx();
        ctx.structs.insert("Box".into(), boxed());
        let name = ctx
            .instantiate_struct("Box", &[TypeRef::named("T")], &Substitution::new())
            .unwrap();
        assert_eq!(name, "Box");
        assert!(ctx.instances().is_empty());
        assert!(ctx.type_definitions().is_empty());
    }

    #[test]
    fn test_instantiation_is_deduplicated() {
        let mut ctx = ctx();
        ctx.structs.insert("Box".into(), boxed());
        let first = ctx
            .instantiate_struct("Box", &[TypeRef::i32()], &Substitution::new())
            .unwrap();
        let second = ctx
            .instantiate_struct("Box", &[TypeRef::named("int")], &Substitution::new())
            .unwrap();
        assert_eq!(first, "Box_i32");
        assert_eq!(first, second);
        assert_eq!(
            ctx.type_definitions(),
            &["%struct.Box_i32 = type { i32, i1 }".to_string()]
        );
        assert_eq!(ctx.instances().state("Box_i32"), Some(GenerationState::Complete));
    }

    #[test]
    fn test_context_substitution_applies_first() {
        let mut ctx = ctx();
        ctx.structs.insert("Box".into(), boxed());
        let outer = Substitution::from_params(&["U".into()], &[TypeRef::bool()]);
        let name = ctx
            .instantiate_struct("Box", &[TypeRef::named("U")], &outer)
            .unwrap();
        assert_eq!(name, "Box_i1");
    }

    #[test]
    fn test_self_referential_generic_terminates() {
        let mut ctx = ctx();
        let node = StructDecl::new(
            "Node",
            vec![
                StructField::new("value", TypeRef::named("T")),
                StructField::new(
                    "next",
                    TypeRef::pointer(TypeRef::generic("Node", vec![TypeRef::named("T")]), 1),
                ),
            ],
        )
        .with_generics(&["T"]);
        ctx.structs.insert("Node".into(), node);

        let name = ctx
            .instantiate_struct("Node", &[TypeRef::i32()], &Substitution::new())
            .unwrap();
        assert_eq!(name, "Node_i32");
        let defs: Vec<_> = ctx
            .type_definitions()
            .iter()
            .filter(|d| d.starts_with("%struct.Node_i32 = type"))
            .collect();
        assert_eq!(defs.len(), 1);

        let layout = ctx.struct_layout("Node_i32").unwrap();
        let next = layout.slot("next").unwrap();
        assert_eq!(
            layout.field_type(next),
            Some(&IrType::Struct("Node_i32".into()).ptr_to())
        );
    }

    #[test]
    fn test_arity_mismatch() {
        let mut ctx = ctx();
        ctx.structs.insert(
            "Pair".into(),
            StructDecl::new(
                "Pair",
                vec![
                    StructField::new("a", TypeRef::named("A")),
                    StructField::new("b", TypeRef::named("B")),
                ],
            )
            .with_generics(&["A", "B"]),
        );
        let err = ctx
            .instantiate_struct("Pair", &[TypeRef::i32()], &Substitution::new())
            .unwrap_err();
        match err {
            CodegenError::GenericArity { decl, expected, got } => {
                assert_eq!(decl, "Pair");
                assert_eq!(expected, 2);
                assert_eq!(got, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_methods_are_queued_not_emitted() {
        let mut ctx = ctx();
        let get = FunctionDecl::new("get", vec![], TypeRef::named("T"));
        let map = FunctionDecl::new("map", vec![], TypeRef::named("U")).with_generics(&["U"]);
        ctx.structs
            .insert("Box".into(), boxed().with_method(get).with_method(map));

        ctx.instantiate_struct("Box", &[TypeRef::i64()], &Substitution::new())
            .unwrap();
        // 只有非泛型方法入队
        assert_eq!(ctx.pending().symbols(), vec!["Box_i64_get"]);
        assert!(ctx.function_defs.is_empty());
        assert_eq!(
            ctx.instances().state("Box_i64_get"),
            Some(GenerationState::Requested)
        );
    }

    #[test]
    fn test_generic_function_requested_once() {
        let mut ctx = ctx();
        ctx.functions.insert(
            "identity".into(),
            FunctionDecl::new(
                "identity",
                vec![Param::new("x", TypeRef::named("T"))],
                TypeRef::named("T"),
            )
            .with_generics(&["T"]),
        );
        let none = Substitution::new();
        let a = ctx.instantiate_function("identity", &[TypeRef::i32()], &none).unwrap();
        let b = ctx.instantiate_function("identity", &[TypeRef::i32()], &none).unwrap();
        let c = ctx.instantiate_function("identity", &[TypeRef::bool()], &none).unwrap();
        assert_eq!(a, "identity_i32_i32");
        assert_eq!(a, b);
        assert_eq!(c, "identity_i1_i1");
        assert_eq!(ctx.pending().symbols(), vec!["identity_i32_i32", "identity_i1_i1"]);
    }

    #[test]
    fn test_generic_method_keyed_by_owner() {
        let mut ctx = ctx();
        let map = FunctionDecl::new("map", vec![Param::new("u", TypeRef::named("U"))], TypeRef::named("U"))
            .with_generics(&["U"]);
        ctx.structs.insert("Box".into(), boxed().with_method(map));
        let owner = ctx
            .instantiate_struct("Box", &[TypeRef::i32()], &Substitution::new())
            .unwrap();
        let decl = ctx.structs[&owner].method("map").cloned().unwrap();
        let (symbol, subst) = ctx
            .instantiate_method(&owner, &decl, &[TypeRef::bool()], &Substitution::new())
            .unwrap();
        assert_eq!(symbol, "Box_i32_map_i1_i1");
        assert_eq!(subst.get("T"), Some(&TypeRef::i32()));
        assert_eq!(subst.get("U"), Some(&TypeRef::bool()));
        assert!(ctx.pending().contains("Box_i32_map_i1_i1"));
    }

    #[test]
    fn test_generic_enum() {
        let mut ctx = ctx();
        ctx.enums.insert(
            "Option".into(),
            EnumDecl::new(
                "Option",
                vec![
                    EnumVariant::tuple("Some", vec![TypeRef::named("T")]),
                    EnumVariant::unit("None"),
                ],
            )
            .with_generics(&["T"]),
        );
        let ty = ctx
            .resolve_type(
                &TypeRef::generic("Option", vec![TypeRef::i64()]),
                &Substitution::new(),
            )
            .unwrap();
        assert_eq!(ty, IrType::Enum("Option_i64".into()));
        assert!(ctx
            .type_definitions()
            .contains(&"%enum.Option_i64 = type { i32, [8 x i8] }".to_string()));
    }

    #[test]
    fn test_main_is_not_mangled() {
        let ctx = ctx();
        let main = FunctionDecl::new("main", vec![], TypeRef::i32());
        let helper = FunctionDecl::new("add", vec![Param::new("a", TypeRef::i32())], TypeRef::i32());
        assert_eq!(ctx.function_symbol(&main), "main");
        assert_eq!(ctx.function_symbol(&helper), "add_i32");
    }
}
