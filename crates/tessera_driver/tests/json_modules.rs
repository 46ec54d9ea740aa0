//! 从 JSON 加载类型检查后的模块并编译

use std::io::Write;

use pretty_assertions::assert_eq;
use tessera_driver::{compile_file, load_module_from_str, CompileError, CompileOptions};

const BOX_MODULE: &str = r#"{
  "name": "boxes",
  "decls": [
    { "struct": {
        "name": "Box",
        "generic_params": ["T"],
        "fields": [ { "name": "value", "ty": { "named": { "name": "T" } } } ],
        "methods": [ {
          "name": "get",
          "return_type": { "named": { "name": "T" } },
          "body": [ { "return": { "value": {
            "kind": { "member": {
              "object": {
                "kind": { "variable": "this" },
                "ty": { "pointer": {
                  "inner": { "named": { "name": "Box", "generic_args": [ { "named": { "name": "T" } } ] } },
                  "depth": 1
                } }
              },
              "field": "value"
            } },
            "ty": { "named": { "name": "T" } }
          } } } ]
        } ]
    } },
    { "function": {
        "name": "main",
        "return_type": { "named": { "name": "int" } },
        "body": [
          { "let": {
              "name": "b",
              "ty": { "named": { "name": "Box", "generic_args": [ { "primitive": "i32" } ] } },
              "value": {
                "kind": { "struct_literal": { "fields": [
                  { "name": "value", "value": { "kind": { "literal": { "int": 9 } }, "ty": { "primitive": "i32" } } }
                ] } },
                "ty": { "named": { "name": "Box", "generic_args": [ { "primitive": "i32" } ] } }
              },
              "location": { "file": "boxes.json", "line": 3, "column": 5 }
          } },
          { "return": { "value": {
              "kind": { "method_call": {
                "receiver": {
                  "kind": { "variable": "b" },
                  "ty": { "named": { "name": "Box", "generic_args": [ { "primitive": "i32" } ] } }
                },
                "method": "get",
                "args": []
              } },
              "ty": { "primitive": "i32" }
          } } }
        ]
    } }
  ]
}"#;

#[test]
fn test_compile_generic_module_from_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .expect("temp file");
    file.write_all(BOX_MODULE.as_bytes()).expect("write module");

    let output = compile_file(file.path(), &CompileOptions::default()).expect("compilation failed");

    let names: Vec<_> = output
        .instantiations
        .iter()
        .map(|r| r.mangled.as_str())
        .collect();
    assert_eq!(names, vec!["Box_i32", "Box_i32_get"]);
    assert!(output.ir.contains("; ModuleID = 'boxes'"));
    assert!(output.ir.contains("%struct.Box_i32 = type { i8*, i32, i1 }"));
    assert!(output.ir.contains("define i32 @Box_i32_get(i8* %__env, %struct.Box_i32* %this)"));
    assert!(output.ir.contains("@Box_i32_vtable = constant [1 x i8*]"));
    assert!(output.warnings.is_empty());
}

#[test]
fn test_loaded_module_shape() {
    let module = load_module_from_str(BOX_MODULE).expect("valid module");
    assert_eq!(module.name, "boxes");
    assert_eq!(module.decls.len(), 2);
    assert_eq!(module.decls[0].name(), "Box");
}

#[test]
fn test_invalid_json() {
    let err = load_module_from_str(r#"{ "name": "x", "decls": [ { "struct": 3 } ] }"#)
        .expect_err("struct payload must be an object");
    assert!(matches!(err, CompileError::Json(_)));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = compile_file(dir.path().join("absent.json"), &CompileOptions::default())
        .expect_err("file does not exist");
    assert!(matches!(err, CompileError::Io(_)));
}

#[test]
fn test_codegen_error_surfaces_with_location() {
    let json = r#"{
      "name": "bad",
      "decls": [ { "function": {
        "name": "main",
        "return_type": { "primitive": "i32" },
        "body": [ { "break": { "location": { "file": "bad.json", "line": 4, "column": 9 } } } ]
      } } ]
    }"#;
    let module = load_module_from_str(json).expect("valid module");
    let err = tessera_driver::compile_module(&module, &CompileOptions::default())
        .expect_err("break outside loop");
    match err {
        CompileError::Codegen(inner) => {
            assert_eq!(inner.code(), "E0108");
            assert_eq!(inner.location().map(|l| l.line), Some(4));
        }
        other => panic!("unexpected error: {}", other),
    }
}

const CONTROL_MODULE: &str = r#"{
  "name": "control",
  "decls": [ { "function": {
    "name": "main",
    "return_type": { "primitive": "i32" },
    "body": [
      { "let": { "name": "n", "ty": { "primitive": "i32" },
          "value": { "kind": { "literal": { "int": 2 } }, "ty": { "primitive": "i32" } } } },
      { "let": { "name": "a", "ty": { "array": { "inner": { "primitive": "i32" }, "dims": [2] } },
          "value": {
            "kind": { "array_literal": [
              { "kind": { "variable": "n" }, "ty": { "primitive": "i32" } },
              { "kind": { "literal": { "int": 5 } }, "ty": { "primitive": "i32" } }
            ] },
            "ty": { "array": { "inner": { "primitive": "i32" }, "dims": [2] } }
          } } },
      { "switch": {
          "scrutinee": { "kind": { "variable": "n" }, "ty": { "primitive": "i32" } },
          "cases": [ { "value": 2, "body": [ { "return": { "value": {
            "kind": { "ternary": {
              "condition": { "kind": { "literal": { "bool": true } }, "ty": { "primitive": "bool" } },
              "then_value": { "kind": { "literal": { "int": 1 } }, "ty": { "primitive": "i32" } },
              "else_value": { "kind": { "literal": { "int": 0 } }, "ty": { "primitive": "i32" } }
            } },
            "ty": { "primitive": "i32" }
          } } } ] } ],
          "default": [ { "return": { "value": {
            "kind": { "literal": { "int": 7 } }, "ty": { "primitive": "i32" } } } } ]
      } },
      { "return": { "value": { "kind": { "literal": { "int": 0 } }, "ty": { "primitive": "i32" } } } }
    ]
  } } ]
}"#;

#[test]
fn test_switch_ternary_and_array_literal_from_json() {
    let module = load_module_from_str(CONTROL_MODULE).expect("valid module");
    let output = tessera_driver::compile_module(&module, &CompileOptions::default())
        .expect("compilation failed");

    assert!(output.ir.contains("insertvalue [2 x i32] undef, i32 %t"));
    assert!(output.ir.contains(", label %switch.default.1 [ i32 2, label %switch.case.2 ]"));
    assert!(output.ir.contains("br i1 true, label %ternary.then.3, label %ternary.else.4"));
    assert!(output.ir.contains("phi i32 [ 1, %ternary.then.3 ], [ 0, %ternary.else.4 ]"));
    assert!(output.ir.contains("ret i32 7"));
}
