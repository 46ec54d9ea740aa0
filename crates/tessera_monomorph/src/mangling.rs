//! Name Mangling for Monomorphization
//!
//! 负责将类型转换为唯一的、可作标识符的字符串。
//! 规则：
//! - 基础类型先规范化: int -> i32, float -> double, string -> i8_ptr
//! - 每层指针追加 `_ptr`，每个数组维度追加 `_arr_N_`
//! - 泛型实例化: Name_Arg1_Arg2 (e.g., Pair<int, bool> -> Pair_i32_i1)
//! - 嵌套在其他类型里的泛型实参表用 `_T` ... `_E` 包住，
//!   这样 `Box<i32*>` (Box_T_i32_ptr_E) 与 `Box<i32>*` (Box_T_i32_E_ptr) 不同
//! - 别名展开为目标类型
//! - `.` 替换为 `_`；名字里含 `_` 或与保留记号同形时加长度前缀 (`A_B` -> `3A_B`)

use rustc_hash::FxHashMap;
use tessera_syntax::{Primitive, TypeAliasDecl, TypeRef};

use crate::substitute::Substitution;

/// 别名展开深度上限，超过后按名称原样编码
const MAX_ALIAS_DEPTH: usize = 200;

/// 别名查询
pub trait AliasTable {
    fn alias(&self, name: &str) -> Option<&TypeAliasDecl>;
}

impl AliasTable for FxHashMap<String, TypeAliasDecl> {
    fn alias(&self, name: &str) -> Option<&TypeAliasDecl> {
        self.get(name)
    }
}

/// 空别名表
pub struct NoAliases;

impl AliasTable for NoAliases {
    fn alias(&self, _name: &str) -> Option<&TypeAliasDecl> {
        None
    }
}

/// 不考虑别名的类型编码
pub fn mangle_type(ty: &TypeRef) -> String {
    Mangler::new(&NoAliases).mangle(ty)
}

/// 基础类型的编码
pub fn mangle_primitive(prim: Primitive) -> &'static str {
    match prim {
        Primitive::I8 => "i8",
        Primitive::I16 => "i16",
        Primitive::I32 => "i32",
        Primitive::I64 => "i64",
        Primitive::U8 => "u8",
        Primitive::U16 => "u16",
        Primitive::U32 => "u32",
        Primitive::U64 => "u64",
        Primitive::F32 => "float",
        Primitive::F64 => "double",
        Primitive::Bool => "i1",
        Primitive::Void => "void",
        Primitive::String => "i8_ptr",
        Primitive::Null => "null",
    }
}

/// 带别名表的名称修饰器
pub struct Mangler<'a, A: AliasTable + ?Sized> {
    aliases: &'a A,
}

impl<'a, A: AliasTable + ?Sized> Mangler<'a, A> {
    pub fn new(aliases: &'a A) -> Self {
        Self { aliases }
    }

    /// 编码一个类型
    pub fn mangle(&self, ty: &TypeRef) -> String {
        self.mangle_at(ty, 0)
    }

    /// 泛型实体名: `Base_arg1_arg2`；无实参时为 `Base`
    pub fn generic_name(&self, base: &str, args: &[TypeRef]) -> String {
        let mut name = sanitize(base);
        for arg in args {
            name.push('_');
            name.push_str(&self.mangle(arg));
        }
        name
    }

    /// 函数符号名: `name_param1_param2[_garg...]`
    pub fn function_name(&self, name: &str, params: &[TypeRef], generic_args: &[TypeRef]) -> String {
        let mut symbol = sanitize(name);
        for ty in params.iter().chain(generic_args) {
            symbol.push('_');
            symbol.push_str(&self.mangle(ty));
        }
        symbol
    }

    /// 方法符号名: `Owner_method[_params...][_gargs...]`
    pub fn method_name(
        &self,
        owner: &str,
        method: &str,
        params: &[TypeRef],
        generic_args: &[TypeRef],
    ) -> String {
        self.function_name(&format!("{}_{}", owner, method), params, generic_args)
    }

    fn mangle_at(&self, ty: &TypeRef, depth: usize) -> String {
        match ty {
            TypeRef::Primitive(prim) => mangle_primitive(*prim).to_string(),

            // 每层指针一个 `_ptr`
            TypeRef::Pointer { inner, depth: levels } => {
                let mut out = self.mangle_at(inner, depth);
                for _ in 0..*levels {
                    out.push_str("_ptr");
                }
                out
            }

            // [3][4]T -> T_arr_3__arr_4_
            TypeRef::Array { inner, dims } => {
                let mut out = self.mangle_at(inner, depth);
                for dim in dims {
                    out.push_str(&format!("_arr_{}_", dim));
                }
                out
            }

            TypeRef::Tuple(elems) => {
                let mut out = format!("tup{}", elems.len());
                for elem in elems {
                    out.push('_');
                    out.push_str(&self.mangle_at(elem, depth));
                }
                out
            }

            // fn(i32, i1) -> void  =>  fn2_i32_i1_ret_void
            TypeRef::Function {
                params,
                ret,
                variadic,
            } => {
                let mut out = format!("fn{}", params.len());
                for param in params {
                    out.push('_');
                    out.push_str(&self.mangle_at(param, depth));
                }
                out.push_str("_ret_");
                out.push_str(&self.mangle_at(ret, depth));
                if *variadic {
                    out.push_str("_va");
                }
                out
            }

            TypeRef::Named {
                name, generic_args, ..
            } => {
                if generic_args.is_empty() {
                    if let Some(prim) = Primitive::from_name(name) {
                        return mangle_primitive(prim).to_string();
                    }
                }
                if depth < MAX_ALIAS_DEPTH {
                    if let Some(alias) = self.aliases.alias(name) {
                        let target = if alias.generic_params.is_empty() {
                            alias.target.clone()
                        } else {
                            Substitution::from_params(&alias.generic_params, generic_args)
                                .apply(&alias.target)
                        };
                        return self.mangle_at(&target, depth + 1);
                    }
                }
                let mut out = name_token(name);
                if !generic_args.is_empty() {
                    out.push_str("_T");
                    for arg in generic_args {
                        out.push('_');
                        out.push_str(&self.mangle_at(arg, depth));
                    }
                    out.push_str("_E");
                }
                out
            }
        }
    }
}

/// 限定名中的 `.` 不能出现在标识符里
fn sanitize(name: &str) -> String {
    name.replace('.', "_")
}

/// 类型编码里作结构记号的词
const RESERVED: &[&str] = &["ptr", "arr", "ret", "va", "T", "E"];

/// 类型位置上的名字。可能与记号或分隔符混淆的名字写成 `<长度><名字>`，
/// 数字开头的记号不会与其他任何记号相同
fn name_token(name: &str) -> String {
    let plain = sanitize(name);
    if is_plain_token(&plain) {
        plain
    } else {
        format!("{}{}", plain.len(), plain)
    }
}

fn is_plain_token(token: &str) -> bool {
    let mut chars = token.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    starts_alpha
        && token.chars().all(|c| c.is_ascii_alphanumeric())
        && !RESERVED.contains(&token)
        && !is_counted_keyword(token, "tup")
        && !is_counted_keyword(token, "fn")
        && Primitive::from_name(token).is_none()
}

/// `tup3`、`fn2` 这类带元数的记号
fn is_counted_keyword(token: &str, keyword: &str) -> bool {
    token
        .strip_prefix(keyword)
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mangle_basic() {
        assert_eq!(mangle_type(&TypeRef::i32()), "i32");
        assert_eq!(mangle_type(&TypeRef::bool()), "i1");
        assert_eq!(mangle_type(&TypeRef::string()), "i8_ptr");
        assert_eq!(mangle_type(&TypeRef::named("MyStruct")), "MyStruct");
    }

    #[test]
    fn test_aliases_mangle_identically() {
        assert_eq!(mangle_type(&TypeRef::named("int")), mangle_type(&TypeRef::i32()));
        assert_eq!(mangle_type(&TypeRef::named("uint")), "u32");
        assert_ne!(mangle_type(&TypeRef::named("uint")), mangle_type(&TypeRef::i32()));
    }

    #[test]
    fn test_float_mangles_as_double() {
        // float 是 64 位
        assert_eq!(mangle_type(&TypeRef::named("float")), "double");
        assert_eq!(mangle_type(&TypeRef::named("f32")), "float");
    }

    #[test]
    fn test_pointer_and_array_suffixes() {
        let ptr = TypeRef::pointer(TypeRef::named("Node"), 2);
        assert_eq!(mangle_type(&ptr), "Node_ptr_ptr");

        let arr = TypeRef::array(TypeRef::i32(), vec![3, 4]);
        assert_eq!(mangle_type(&arr), "i32_arr_3__arr_4_");

        // 指针数组与数组指针不同
        let arr_of_ptr = TypeRef::array(TypeRef::pointer(TypeRef::i32(), 1), vec![2]);
        let ptr_to_arr = TypeRef::pointer(TypeRef::array(TypeRef::i32(), vec![2]), 1);
        assert_ne!(mangle_type(&arr_of_ptr), mangle_type(&ptr_to_arr));
    }

    #[test]
    fn test_mangle_nested_generic() {
        let ty = TypeRef::generic(
            "Vec",
            vec![TypeRef::generic("Box", vec![TypeRef::named("int")])],
        );
        assert_eq!(mangle_type(&ty), "Vec_T_Box_T_i32_E_E");

        let mangler = Mangler::new(&NoAliases);
        assert_eq!(
            mangler.generic_name("Vec", &[TypeRef::generic("Box", vec![TypeRef::i32()])]),
            "Vec_Box_T_i32_E"
        );
    }

    #[test]
    fn test_qualified_names() {
        assert_eq!(mangle_type(&TypeRef::named("geo.Point")), "9geo_Point");
        assert_eq!(sanitize("geo.Point"), "geo_Point");
    }

    #[test]
    fn test_pointer_binds_to_the_type_it_wraps() {
        let mangler = Mangler::new(&NoAliases);
        let box_of_ptr = TypeRef::generic("Box", vec![TypeRef::pointer(TypeRef::i32(), 1)]);
        let ptr_to_box = TypeRef::pointer(TypeRef::generic("Box", vec![TypeRef::i32()]), 1);

        assert_eq!(mangler.mangle(&box_of_ptr), "Box_T_i32_ptr_E");
        assert_eq!(mangler.mangle(&ptr_to_box), "Box_T_i32_E_ptr");
        assert_ne!(
            mangler.generic_name("Holder", &[box_of_ptr.clone()]),
            mangler.generic_name("Holder", &[ptr_to_box.clone()])
        );
        assert_ne!(
            mangler.function_name("take", &[box_of_ptr], &[]),
            mangler.function_name("take", &[ptr_to_box], &[])
        );

        let arr_in_box = TypeRef::generic("Box", vec![TypeRef::array(TypeRef::i32(), vec![2])]);
        let box_in_arr = TypeRef::array(TypeRef::generic("Box", vec![TypeRef::i32()]), vec![2]);
        assert_ne!(mangler.mangle(&arr_in_box), mangler.mangle(&box_in_arr));
    }

    #[test]
    fn test_underscores_in_names_do_not_shift_arguments() {
        let mangler = Mangler::new(&NoAliases);
        let left = mangler.generic_name("Pair", &[TypeRef::named("A_B"), TypeRef::named("C")]);
        let right = mangler.generic_name("Pair", &[TypeRef::named("A"), TypeRef::named("B_C")]);
        assert_eq!(left, "Pair_3A_B_C");
        assert_eq!(right, "Pair_A_3B_C");
        assert_ne!(left, right);
    }

    #[test]
    fn test_names_shaped_like_markers_are_prefixed() {
        // 名为 E 的类型不能被当成实参表的结尾
        let one = TypeRef::generic("Box", vec![TypeRef::named("E")]);
        let two = TypeRef::generic("Box", vec![TypeRef::named("E"), TypeRef::named("E")]);
        assert_eq!(mangle_type(&one), "Box_T_1E_E");
        assert_ne!(mangle_type(&one), mangle_type(&two));

        assert_eq!(mangle_type(&TypeRef::named("ptr")), "3ptr");
        assert_eq!(mangle_type(&TypeRef::named("tup2")), "4tup2");
        assert_eq!(mangle_type(&TypeRef::named("fnord")), "fnord");
        assert_ne!(
            mangle_type(&TypeRef::pointer(TypeRef::named("X"), 1)),
            mangle_type(&TypeRef::Tuple(vec![TypeRef::named("X"), TypeRef::named("ptr")]))
        );
    }

    #[test]
    fn test_function_types_do_not_collide() {
        let a = TypeRef::function(vec![TypeRef::i32()], TypeRef::void());
        let b = TypeRef::function(vec![], TypeRef::i32());
        assert_eq!(mangle_type(&a), "fn1_i32_ret_void");
        assert_ne!(mangle_type(&a), mangle_type(&b));
    }

    #[test]
    fn test_alias_expands_with_use_site_suffix() {
        let mut aliases = FxHashMap::default();
        aliases.insert(
            "Handle".to_string(),
            TypeAliasDecl::new("Handle", TypeRef::generic("Box", vec![TypeRef::i32()])),
        );
        let mangler = Mangler::new(&aliases);
        assert_eq!(mangler.mangle(&TypeRef::named("Handle")), "Box_T_i32_E");
        assert_eq!(
            mangler.mangle(&TypeRef::pointer(TypeRef::named("Handle"), 1)),
            "Box_T_i32_E_ptr"
        );
    }

    #[test]
    fn test_generic_alias() {
        let mut aliases = FxHashMap::default();
        let mut twin = TypeAliasDecl::new(
            "Twin",
            TypeRef::generic("Pair", vec![TypeRef::named("T"), TypeRef::named("T")]),
        );
        twin.generic_params = vec!["T".to_string()];
        aliases.insert("Twin".to_string(), twin);

        let mangler = Mangler::new(&aliases);
        let ty = TypeRef::generic("Twin", vec![TypeRef::bool()]);
        assert_eq!(mangler.mangle(&ty), "Pair_T_i1_i1_E");
    }

    #[test]
    fn test_function_and_method_names() {
        let mangler = Mangler::new(&NoAliases);
        assert_eq!(
            mangler.function_name("add", &[TypeRef::i32(), TypeRef::i32()], &[]),
            "add_i32_i32"
        );
        assert_eq!(
            mangler.function_name("identity", &[TypeRef::i64()], &[TypeRef::i64()]),
            "identity_i64_i64"
        );
        assert_eq!(mangler.method_name("Point", "len", &[], &[]), "Point_len");
        assert_eq!(
            mangler.generic_name("Pair", &[TypeRef::i32(), TypeRef::bool()]),
            "Pair_i32_i1"
        );
        assert_eq!(mangler.generic_name("Pair", &[]), "Pair");
    }

    #[test]
    fn test_mangle_deterministic() {
        let mut ty = TypeRef::i32();
        for _ in 0..20 {
            ty = TypeRef::generic("Vec", vec![ty]);
        }

        let m1 = mangle_type(&ty);
        let m2 = mangle_type(&ty);
        assert_eq!(m1, m2);
    }

    #[test]
    fn test_cyclic_alias_terminates() {
        let mut aliases = FxHashMap::default();
        aliases.insert("A".to_string(), TypeAliasDecl::new("A", TypeRef::named("B")));
        aliases.insert("B".to_string(), TypeAliasDecl::new("B", TypeRef::named("A")));
        let mangler = Mangler::new(&aliases);
        let mangled = mangler.mangle(&TypeRef::named("A"));
        assert!(mangled == "A" || mangled == "B");
    }
}
