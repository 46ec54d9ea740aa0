//! 函数体降级：闭包、枚举与 match、控制流、错误与调试信息

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::*;
use tessera_codegen::{
    compile_to_ir, compile_with_debug_sink, CodegenError, CodegenOptions, DebugInfoSink,
    DebugMember, DwarfEncoding,
};
use tessera_syntax::*;

fn closure_ty() -> TypeRef {
    TypeRef::function(vec![TypeRef::i32()], TypeRef::i32())
}

#[test]
fn test_lambda_with_captures() {
    // int k = 5; fn(int) -> int f = |x| x + k; return f(2);
    let lambda = Expr::new(
        ExprKind::Lambda {
            params: vec![Param::new("x", TypeRef::i32())],
            body: vec![Stmt::ret(Some(Expr::binary(
                BinaryOp::Add,
                Expr::var("x", TypeRef::i32()),
                Expr::var("k", TypeRef::i32()),
                TypeRef::i32(),
            )))],
            captures: vec![Param::new("k", TypeRef::i32())],
        },
        closure_ty(),
    );
    let ir = compile(vec![main_fn(vec![
        Stmt::let_("k", TypeRef::i32(), Expr::int(5)),
        Stmt::let_("f", closure_ty(), lambda),
        Stmt::ret(Some(Expr::call("f", vec![Expr::int(2)], TypeRef::i32()))),
    ])]);

    assert!(ir.contains("%struct.main_lambda_0_env = type { i32 }"));
    assert!(ir.contains("call i8* @malloc(i64 4)"));
    assert!(ir.contains(
        "insertvalue { i32 (i8*, i32)*, i8* } undef, i32 (i8*, i32)* @main_lambda_0, 0"
    ));
    assert!(ir.contains("extractvalue { i32 (i8*, i32)*, i8* } "));
    assert!(ir.contains("define i32 @main_lambda_0(i8* %__env, i32 %x.arg)"));
    assert!(ir.contains("bitcast i8* %__env to %struct.main_lambda_0_env*"));
    // lambda 体在外层函数之后生成
    assert!(define_pos(&ir, "main") < define_pos(&ir, "main_lambda_0"));
}

#[test]
fn test_lambda_without_captures_uses_null_env() {
    let lambda = Expr::new(
        ExprKind::Lambda {
            params: vec![Param::new("x", TypeRef::i32())],
            body: vec![Stmt::ret(Some(Expr::var("x", TypeRef::i32())))],
            captures: vec![],
        },
        closure_ty(),
    );
    let ir = compile(vec![main_fn(vec![
        Stmt::let_("f", closure_ty(), lambda),
        Stmt::ret(Some(Expr::int(0))),
    ])]);

    assert!(!ir.contains("main_lambda_0_env"));
    assert!(ir.contains(", i8* null, 1"));
}

#[test]
fn test_function_reference_as_closure() {
    let double = FunctionDecl::new("double_it", vec![Param::new("x", TypeRef::i32())], TypeRef::i32())
        .with_body(vec![Stmt::ret(Some(Expr::binary(
            BinaryOp::Add,
            Expr::var("x", TypeRef::i32()),
            Expr::var("x", TypeRef::i32()),
            TypeRef::i32(),
        )))]);
    let reference = Expr::new(
        ExprKind::FunctionRef {
            name: "double_it".to_string(),
            generic_args: vec![],
        },
        closure_ty(),
    );
    let call = Expr::new(
        ExprKind::ClosureCall {
            callee: Box::new(Expr::var("f", closure_ty())),
            args: vec![Expr::int(4)],
        },
        TypeRef::i32(),
    );
    let ir = compile(vec![
        Decl::Function(double),
        main_fn(vec![Stmt::let_("f", closure_ty(), reference), Stmt::ret(Some(call))]),
    ]);

    assert!(ir.contains("i32 (i8*, i32)* @double_it_i32, 0"));
    assert!(ir.contains(", i8* null, 1"));
}

fn shape() -> Decl {
    Decl::Enum(EnumDecl::new(
        "Shape",
        vec![
            EnumVariant::tuple("Circle", vec![TypeRef::i32()]),
            EnumVariant::tuple("Square", vec![TypeRef::i32(), TypeRef::i32()]),
            EnumVariant::unit("Empty"),
        ],
    ))
}

fn shape_ty() -> TypeRef {
    TypeRef::named("Shape").with_kind(DeclKind::Enum)
}

fn arm(variant: Option<&str>, bindings: &[&str], body: Expr) -> MatchArm {
    MatchArm {
        variant: variant.map(str::to_string),
        bindings: bindings.iter().map(|b| b.to_string()).collect(),
        body,
    }
}

fn area_fn(arms: Vec<MatchArm>) -> Decl {
    let matched = Expr::new(
        ExprKind::Match {
            scrutinee: Box::new(Expr::var("s", shape_ty())),
            arms,
        },
        TypeRef::i32(),
    );
    Decl::Function(
        FunctionDecl::new("area", vec![Param::new("s", shape_ty())], TypeRef::i32())
            .with_body(vec![Stmt::ret(Some(matched))]),
    )
}

#[test]
fn test_enum_construction() {
    let square = Expr::new(
        ExprKind::EnumVariant {
            variant: "Square".to_string(),
            args: vec![Expr::int(2), Expr::int(3)],
        },
        shape_ty(),
    );
    let ir = compile(vec![
        shape(),
        main_fn(vec![
            Stmt::let_("s", shape_ty(), square),
            Stmt::ret(Some(Expr::int(0))),
        ]),
    ]);

    assert!(ir.contains("%enum.Shape = type { i32, [8 x i8] }"));
    assert!(ir.contains("store i32 1, i32* "));
    assert!(ir.contains("bitcast [8 x i8]* "));
    assert!(ir.contains(" to { i32, i32 }*"));
    assert!(ir.contains("store i32 3, i32* "));
}

#[test]
fn test_non_exhaustive_match_panics() {
    let w = || Expr::var("w", TypeRef::i32());
    let h = || Expr::var("h", TypeRef::i32());
    let ir = compile(vec![
        shape(),
        area_fn(vec![
            arm(Some("Circle"), &["r"], Expr::var("r", TypeRef::i32())),
            arm(
                Some("Square"),
                &["w", "h"],
                Expr::binary(BinaryOp::Mul, w(), h(), TypeRef::i32()),
            ),
            // 重复的分支不会产生重复的 case
            arm(Some("Circle"), &["_"], Expr::int(0)),
        ]),
        main_fn(vec![Stmt::ret(Some(Expr::int(0)))]),
    ]);

    assert!(ir.contains("define i32 @area_Shape(i8* %__env, %enum.Shape %s.arg)"));
    assert!(ir.contains("switch i32 "));
    assert!(ir.contains("[ i32 0, label %match.arm.2 i32 1, label %match.arm.3 ]"));
    assert_eq!(ir.matches("i32 0, label %match.arm").count(), 1);
    assert!(ir.contains("c\"non-exhaustive match on Shape\\00\""));
    assert!(ir.contains("call void @__tessera_panic(i8* getelementptr inbounds"));
    assert!(ir.contains("mul i32"));
}

#[test]
fn test_wildcard_arm_becomes_default() {
    let ir = compile(vec![
        shape(),
        area_fn(vec![
            arm(Some("Circle"), &["r"], Expr::var("r", TypeRef::i32())),
            arm(None, &[], Expr::int(0)),
        ]),
        main_fn(vec![Stmt::ret(Some(Expr::int(0)))]),
    ]);

    assert!(ir.contains(", label %match.arm.3 [ i32 0, label %match.arm.2 ]"));
    assert!(!ir.contains("non-exhaustive"));
}

#[test]
fn test_while_with_break_and_continue() {
    let i = || Expr::var("i", TypeRef::i32());
    let body = vec![
        Stmt::Expr(Expr::new(
            ExprKind::Assign {
                target: Box::new(i()),
                value: Box::new(Expr::binary(BinaryOp::Add, i(), Expr::int(1), TypeRef::i32())),
            },
            TypeRef::i32(),
        )),
        Stmt::If {
            condition: Expr::binary(BinaryOp::Gt, i(), Expr::int(10), TypeRef::bool()),
            then_block: vec![Stmt::Break {
                location: SourceLocation::default(),
            }],
            else_block: Some(vec![Stmt::Continue {
                location: SourceLocation::default(),
            }]),
            location: SourceLocation::default(),
        },
    ];
    let ir = compile(vec![main_fn(vec![
        Stmt::let_("i", TypeRef::i32(), Expr::int(0)),
        Stmt::While {
            condition: Expr::bool(true),
            body,
            location: SourceLocation::default(),
        },
        Stmt::ret(Some(i())),
    ])]);

    assert!(ir.contains("while.cond.0:"));
    assert!(ir.contains("br i1 true, label %while.body.1, label %while.end.2"));
    assert!(ir.contains("icmp sgt i32"));
    assert!(ir.contains("br label %while.end.2"));
    assert!(ir.contains("br label %while.cond.0"));
}

fn point() -> Decl {
    Decl::Struct(StructDecl::new(
        "Point",
        vec![StructField::new("x", TypeRef::i32())],
    ))
}

fn null_of(ty: TypeRef) -> Expr {
    Expr::new(ExprKind::Literal(Literal::Null), ty)
}

#[test]
fn test_struct_null_checks_read_liveness_flag() {
    let point_ty = || TypeRef::named("Point");
    let p = || Expr::var("p", point_ty());
    let q = || Expr::var("q", point_ty());
    let ir = compile(vec![
        point(),
        main_fn(vec![
            Stmt::let_("p", point_ty(), struct_lit(point_ty(), vec![("x", Expr::int(1))])),
            Stmt::let_("q", point_ty(), null_of(point_ty())),
            Stmt::let_(
                "dead",
                TypeRef::bool(),
                Expr::binary(BinaryOp::Eq, p(), null_of(point_ty()), TypeRef::bool()),
            ),
            Stmt::let_(
                "alive",
                TypeRef::bool(),
                Expr::binary(BinaryOp::Ne, null_of(point_ty()), q(), TypeRef::bool()),
            ),
            expr_stmt(Expr::new(
                ExprKind::Assign {
                    target: Box::new(p()),
                    value: Box::new(null_of(point_ty())),
                },
                point_ty(),
            )),
            Stmt::ret(Some(Expr::int(0))),
        ]),
    ]);

    assert!(ir.contains("%struct.Point = type { i32, i1 }"));
    // 字面量置位，null 全零
    assert!(ir.contains("i1 1, 1"));
    assert_eq!(
        ir.matches("store %struct.Point zeroinitializer, %struct.Point* ").count(),
        2
    );
    assert_eq!(ir.matches("extractvalue %struct.Point %t").count(), 2);
    assert!(ir.contains("icmp eq i1 %t"));
    assert!(ir.contains("icmp ne i1 %t"));
    assert!(!ir.contains("comparison of"));
}

#[test]
fn test_struct_pointer_compares_against_null() {
    let ptr_ty = || TypeRef::pointer(TypeRef::named("Point"), 1);
    let ir = compile(vec![
        point(),
        main_fn(vec![
            Stmt::let_("p", ptr_ty(), null_of(ptr_ty())),
            Stmt::let_(
                "empty",
                TypeRef::bool(),
                Expr::binary(
                    BinaryOp::Eq,
                    Expr::var("p", ptr_ty()),
                    null_of(ptr_ty()),
                    TypeRef::bool(),
                ),
            ),
            Stmt::ret(Some(Expr::int(0))),
        ]),
    ]);

    assert!(ir.contains("store %struct.Point* null, %struct.Point** "));
    assert!(ir.contains("icmp eq %struct.Point* %t"));
    assert!(ir.contains(", null"));
}

fn ternary(condition: Expr, then_value: Expr, else_value: Expr, ty: TypeRef) -> Expr {
    Expr::new(
        ExprKind::Ternary {
            condition: Box::new(condition),
            then_value: Box::new(then_value),
            else_value: Box::new(else_value),
        },
        ty,
    )
}

fn assign_i32(name: &str, value: i64) -> Stmt {
    expr_stmt(Expr::new(
        ExprKind::Assign {
            target: Box::new(Expr::var(name, TypeRef::i32())),
            value: Box::new(Expr::int(value)),
        },
        TypeRef::i32(),
    ))
}

#[test]
fn test_ternary_merges_with_phi() {
    let flag = || Expr::var("flag", TypeRef::bool());
    let inner = ternary(flag(), Expr::int(1), Expr::int(2), TypeRef::i32());
    let ir = compile(vec![main_fn(vec![
        Stmt::let_("flag", TypeRef::bool(), Expr::bool(true)),
        Stmt::let_(
            "x",
            TypeRef::i32(),
            ternary(flag(), inner, Expr::int(3), TypeRef::i32()),
        ),
        Stmt::ret(Some(Expr::var("x", TypeRef::i32()))),
    ])]);

    assert!(ir.contains(", label %ternary.then.0, label %ternary.else.1"));
    assert!(ir.contains("phi i32 [ 1, %ternary.then.3 ], [ 2, %ternary.else.4 ]"));
    // 外层的 then 前驱是内层的汇合块
    assert!(ir.contains(", %ternary.end.5 ], [ 3, %ternary.else.1 ]"));
    assert!(ir.contains("ternary.end.2:"));
}

#[test]
fn test_array_literal_builds_aggregate() {
    let ir = compile(vec![main_fn(vec![
        Stmt::let_(
            "a",
            TypeRef::array(TypeRef::i32(), vec![3]),
            Expr::new(
                ExprKind::ArrayLiteral(vec![Expr::int(1), Expr::int(2), Expr::int(3)]),
                TypeRef::array(TypeRef::i32(), vec![3]),
            ),
        ),
        Stmt::let_(
            "wide",
            TypeRef::array(TypeRef::i64(), vec![1]),
            Expr::new(
                ExprKind::ArrayLiteral(vec![Expr::int(7)]),
                TypeRef::array(TypeRef::i64(), vec![1]),
            ),
        ),
        Stmt::ret(Some(Expr::int(0))),
    ])]);

    assert!(ir.contains("insertvalue [3 x i32] undef, i32 1, 0"));
    assert!(ir.contains(", i32 3, 2"));
    assert!(ir.contains("store [3 x i32] %t"));
    assert!(ir.contains("sext i32 7 to i64"));
    assert!(ir.contains("insertvalue [1 x i64] undef, i64 %t"));
}

#[test]
fn test_array_literal_length_mismatch() {
    let module = Module::new(
        "m",
        vec![main_fn(vec![expr_stmt(Expr::new(
            ExprKind::ArrayLiteral(vec![Expr::int(1), Expr::int(2)]),
            TypeRef::array(TypeRef::i32(), vec![3]),
        ))])],
    );
    let err = compile_to_ir(&module, CodegenOptions::default()).expect_err("length mismatch");
    assert!(matches!(err.root(), CodegenError::Unsupported(msg) if msg.contains("2 element(s)")));
}

#[test]
fn test_switch_without_fallthrough() {
    let r = || Expr::var("r", TypeRef::i32());
    let ir = compile(vec![main_fn(vec![
        Stmt::let_("n", TypeRef::i32(), Expr::int(2)),
        Stmt::let_("r", TypeRef::i32(), Expr::int(0)),
        Stmt::Switch {
            scrutinee: Expr::var("n", TypeRef::i32()),
            cases: vec![
                SwitchCase {
                    value: 1,
                    body: vec![assign_i32("r", 10)],
                },
                SwitchCase {
                    value: 2,
                    body: vec![Stmt::ret(Some(r()))],
                },
                // 重复值不进入跳转表
                SwitchCase {
                    value: 1,
                    body: vec![assign_i32("r", 11)],
                },
            ],
            default: Some(vec![assign_i32("r", 30)]),
            location: SourceLocation::default(),
        },
        Stmt::ret(Some(r())),
    ])]);

    assert!(ir.contains(
        ", label %switch.default.1 [ i32 1, label %switch.case.2 i32 2, label %switch.case.3 ]"
    ));
    assert!(ir.contains("switch.case.4:"));
    // case 1、重复的 case 与 default 各跳一次，case 2 已返回
    assert_eq!(ir.matches("br label %switch.end.0").count(), 3);
    assert!(ir.contains("switch.end.0:"));
}

#[test]
fn test_break_inside_switch_leaves_enclosing_loop() {
    let ir = compile(vec![main_fn(vec![
        Stmt::let_("n", TypeRef::i32(), Expr::int(1)),
        Stmt::While {
            condition: Expr::bool(true),
            body: vec![Stmt::Switch {
                scrutinee: Expr::var("n", TypeRef::i32()),
                cases: vec![SwitchCase {
                    value: 1,
                    body: vec![Stmt::Break {
                        location: SourceLocation::default(),
                    }],
                }],
                default: None,
                location: SourceLocation::default(),
            }],
            location: SourceLocation::default(),
        },
        Stmt::ret(Some(Expr::int(0))),
    ])]);

    assert!(ir.contains(", label %switch.end.3 [ i32 1, label %switch.case.4 ]"));
    assert!(ir.contains("switch.case.4:\n  br label %while.end.2"));
    assert!(ir.contains("br label %while.cond.0"));
}

#[test]
fn test_unsigned_division() {
    let u32_ty = || TypeRef::primitive(Primitive::U32);
    let div = FunctionDecl::new(
        "div",
        vec![Param::new("a", u32_ty()), Param::new("b", u32_ty())],
        u32_ty(),
    )
    .with_body(vec![Stmt::ret(Some(Expr::binary(
        BinaryOp::Div,
        Expr::var("a", u32_ty()),
        Expr::var("b", u32_ty()),
        u32_ty(),
    )))]);
    let ir = compile(vec![Decl::Function(div)]);

    assert!(ir.contains("define i32 @div_u32_u32("));
    assert!(ir.contains("udiv i32"));
}

#[test]
fn test_extern_variadic_call() {
    let printf = ExternDecl {
        name: "printf".to_string(),
        params: vec![Param::new("fmt", TypeRef::string())],
        return_type: TypeRef::i32(),
        variadic: true,
        location: SourceLocation::default(),
    };
    let hello = Expr::new(
        ExprKind::Literal(Literal::String("n=%d\n".to_string())),
        TypeRef::string(),
    );
    let ir = compile(vec![
        Decl::Extern(printf),
        main_fn(vec![
            expr_stmt(Expr::call("printf", vec![hello, Expr::int(3)], TypeRef::i32())),
            Stmt::ret(None),
        ]),
    ]);

    assert_eq!(ir.matches("declare i32 @printf(i8*, ...)").count(), 1);
    assert!(ir.contains("call i32 (i8*, ...) @printf(i8* getelementptr inbounds ([6 x i8]"));
    assert!(ir.contains(", i32 3)"));
    assert!(ir.contains("c\"n=%d\\0A\\00\""));
}

#[test]
fn test_assign_to_call_result_is_invalid_lvalue() {
    let make = FunctionDecl::new("make", vec![], TypeRef::i32())
        .with_body(vec![Stmt::ret(Some(Expr::int(1)))]);
    let assign = Expr::new(
        ExprKind::Assign {
            target: Box::new(Expr::call("make", vec![], TypeRef::i32())),
            value: Box::new(Expr::int(2)),
        },
        TypeRef::i32(),
    )
    .at(SourceLocation::new("m.json", 9, 3));
    let module = Module::new(
        "m",
        vec![Decl::Function(make), main_fn(vec![expr_stmt(assign)])],
    );

    let err = compile_to_ir(&module, CodegenOptions::default()).expect_err("not addressable");
    assert!(matches!(err.root(), CodegenError::InvalidLValue(_)));
    assert_eq!(err.location().map(|l| (l.line, l.column)), Some((9, 3)));
    assert_eq!(err.code(), "E0104");
}

#[test]
fn test_break_outside_loop() {
    let module = Module::new(
        "m",
        vec![main_fn(vec![Stmt::Break {
            location: SourceLocation::new("m.json", 2, 1),
        }])],
    );
    let err = compile_to_ir(&module, CodegenOptions::default()).expect_err("break outside loop");
    assert!(matches!(
        err.root(),
        CodegenError::LoopControlOutsideLoop("break")
    ));
    assert!(err.to_string().starts_with("m.json:2:1:"));
}

#[test]
fn test_undefined_variable() {
    let module = Module::new(
        "m",
        vec![main_fn(vec![Stmt::ret(Some(Expr::var("ghost", TypeRef::i32())))])],
    );
    let err = compile_to_ir(&module, CodegenOptions::default()).expect_err("ghost is undefined");
    assert!(matches!(err.root(), CodegenError::UndefinedVariable(name) if name == "ghost"));
}

/// 记录调用的调试信息收集器
#[derive(Clone, Default)]
struct RecordingSink {
    calls: Rc<RefCell<Vec<String>>>,
}

impl RecordingSink {
    fn record(&mut self, call: String) -> u32 {
        let mut calls = self.calls.borrow_mut();
        calls.push(call);
        calls.len() as u32
    }
}

impl DebugInfoSink for RecordingSink {
    fn file_id(&mut self, path: &str) -> u32 {
        self.record(format!("file {}", path))
    }
    fn basic_type(&mut self, name: &str, size_bits: u64, _encoding: DwarfEncoding) -> u32 {
        self.record(format!("basic {} {}", name, size_bits))
    }
    fn pointer_type(&mut self, pointee: u32) -> u32 {
        self.record(format!("pointer {}", pointee))
    }
    fn struct_type(
        &mut self,
        name: &str,
        size_bits: u64,
        _file: u32,
        _line: u32,
        members: &[DebugMember],
    ) -> u32 {
        self.record(format!("struct {} {} {}", name, size_bits, members.len()))
    }
    fn array_type(&mut self, element: u32, count: u64, _size_bits: u64) -> u32 {
        self.record(format!("array {} {}", element, count))
    }
    fn location(&mut self, line: u32, column: u32, _scope: u32) -> u32 {
        self.record(format!("location {}:{}", line, column))
    }
    fn subprogram(&mut self, name: &str, line: u32, _file: u32, _type_id: u32) -> u32 {
        self.record(format!("subprogram {} {}", name, line))
    }
    fn metadata_lines(&self) -> Vec<String> {
        vec!["!llvm.dbg.cu = !{}".to_string()]
    }
}

#[test]
fn test_debug_sink_receives_calls() {
    let point = StructDecl {
        location: SourceLocation::new("m.json", 1, 1),
        ..StructDecl::new(
            "Point",
            vec![
                StructField::new("x", TypeRef::i32()),
                StructField::new("y", TypeRef::i32()),
            ],
        )
    };
    let main = FunctionDecl {
        location: SourceLocation::new("m.json", 5, 1),
        ..FunctionDecl::new("main", vec![], int()).with_body(vec![Stmt::Return {
            value: Some(Expr::int(0)),
            location: SourceLocation::new("m.json", 6, 5),
        }])
    };
    let module = Module::new("m", vec![Decl::Struct(point), Decl::Function(main)]);

    let sink = RecordingSink::default();
    let calls = Rc::clone(&sink.calls);
    let mut options = CodegenOptions::new("m");
    options.debug_info = true;
    let ir = compile_with_debug_sink(&module, options, Box::new(sink)).expect("compilation failed");

    let calls = calls.borrow();
    assert!(calls.iter().any(|c| c == "struct Point 96 3"));
    assert!(calls.iter().any(|c| c == "subprogram main 5"));
    assert!(calls.iter().any(|c| c == "location 6:5"));
    assert!(ir.contains("ret i32 0, !dbg !"));
    assert!(ir.trim_end().ends_with("!llvm.dbg.cu = !{}"));
}

#[test]
fn test_debug_sink_ignored_when_disabled() {
    let module = Module::new("m", vec![main_fn(vec![Stmt::Return {
        value: Some(Expr::int(0)),
        location: SourceLocation::new("m.json", 2, 5),
    }])]);
    let sink = RecordingSink::default();
    let calls = Rc::clone(&sink.calls);
    let ir = compile_with_debug_sink(&module, CodegenOptions::new("m"), Box::new(sink))
        .expect("compilation failed");

    assert!(calls.borrow().is_empty());
    assert!(!ir.contains("!dbg"));
}
