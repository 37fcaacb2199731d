//! End-to-end runs from source units to emitted C# files

use pretty_assertions::assert_eq;
use sharpen_codegen::writer::MANIFEST_FILE;
use sharpen_codegen::{
    CSharpEmitter, CancelToken, Codegen, PipelineError, TranspileOutcome, Transpiler,
};
use sharpen_core::diagnostics::{DiagnosticCode, DiagnosticSink};
use sharpen_core::source::{
    BinaryOp, ClassDecl, ClassMember, ConstructorDecl, Declaration, Expr, FunctionDecl,
    ImportBinding, MethodDecl, Param, PropertyDecl, SourceUnit, Span, Stmt, TypeRef, VarKind,
    VariableDecl, Visibility,
};
use sharpen_core::TranspileConfig;

fn config() -> TranspileConfig {
    TranspileConfig::builder()
        .root_namespace("My.App")
        .source_root("src")
        .build()
        .unwrap()
}

fn class(path: &str, name: &str, type_params: &[&str], members: Vec<ClassMember>) -> SourceUnit {
    SourceUnit::new(
        path,
        vec![Declaration::Class(ClassDecl {
            name: name.to_string(),
            span: Span::new(1, 14),
            type_params: type_params.iter().map(|s| s.to_string()).collect(),
            extends: None,
            members,
        })],
    )
}

fn property(name: &str, ty: TypeRef) -> ClassMember {
    ClassMember::Property(PropertyDecl {
        name: name.to_string(),
        span: Span::new(2, 5),
        ty: Some(ty),
        init: None,
        visibility: Visibility::Public,
        is_static: false,
        is_readonly: false,
        optional: false,
    })
}

fn binary_function(name: &str, op: BinaryOp, line: u32) -> Declaration {
    Declaration::Function(FunctionDecl {
        name: name.to_string(),
        span: Span::new(line, 17),
        type_params: vec![],
        params: vec![
            Param::new("a", TypeRef::Number),
            Param::new("b", TypeRef::Number),
        ],
        return_type: Some(TypeRef::Number),
        body: vec![Stmt::Return(Some(Expr::binary(
            op,
            Expr::ident("a"),
            Expr::ident("b"),
        )))],
        is_async: false,
    })
}

fn user_unit() -> SourceUnit {
    let constructor = ClassMember::Constructor(ConstructorDecl {
        span: Span::new(2, 5),
        params: vec![
            Param::new("name", TypeRef::String).as_property(Visibility::Public, false),
            Param::new("age", TypeRef::Number).as_property(Visibility::Private, true),
        ],
        body: vec![],
    });
    let greet = ClassMember::Method(MethodDecl {
        name: "greet".to_string(),
        span: Span::new(3, 5),
        type_params: vec![],
        params: vec![],
        return_type: Some(TypeRef::String),
        body: vec![Stmt::Return(Some(Expr::Template {
            quasis: vec!["Hello, ".to_string(), String::new()],
            exprs: vec![Expr::member(Expr::This, "name")],
        }))],
        visibility: Visibility::Public,
        is_static: false,
        is_async: false,
    });
    class("src/models/User.ts", "User", &[], vec![constructor, greet])
}

fn math_unit() -> SourceUnit {
    SourceUnit::new(
        "src/utils/math.ts",
        vec![
            binary_function("add", BinaryOp::Add, 1),
            binary_function("multiply", BinaryOp::Mul, 5),
            Declaration::Variable(VariableDecl {
                name: "PI".to_string(),
                span: Span::new(9, 14),
                kind: VarKind::Const,
                ty: None,
                init: Some(Expr::Number(3.14159)),
            }),
        ],
    )
}

#[test]
fn test_user_class_end_to_end() {
    let config = config();
    let outcome = Transpiler::new(&config).transpile(&[user_unit()]).unwrap();

    assert!(outcome.is_success(), "{:?}", outcome.diagnostics);
    let file = outcome.file("models/User.cs").unwrap();
    assert_eq!(
        file.contents,
        r#"// <auto-generated from="models/User.ts" />
// Generated: 1970-01-01T00:00:00Z

using Sharpen.Runtime;

namespace My.App.models
{
    public class User
    {
        public string name { get; set; }

        private double age { get; }

        public User(string name, double age)
        {
            this.name = name;
            this.age = age;
        }

        public string greet()
        {
            return $"Hello, {this.name}";
        }
    }
}
"#
    );
}

#[test]
fn test_loose_exports_become_static_class() {
    let config = config();
    let outcome = Transpiler::new(&config).transpile(&[math_unit()]).unwrap();

    assert!(outcome.is_success());
    let file = outcome.file("utils/math.cs").unwrap();
    assert!(file.contents.contains("namespace My.App.utils\n{\n    public static class math\n"));
    assert!(file
        .contents
        .contains("        public static double add(double a, double b)\n        {\n            return a + b;\n        }\n"));
    assert!(file
        .contents
        .contains("            return a * b;\n"));
    assert!(file
        .contents
        .contains("        public static readonly double PI = 3.14159;\n"));
}

#[test]
fn test_case_collision_rejects_subtree_only() {
    let config = config();
    let units = vec![
        class("src/Models/User.ts", "User", &[], vec![]),
        class("src/models/Post.ts", "Post", &[], vec![]),
        math_unit(),
    ];
    let outcome = Transpiler::new(&config).transpile(&units).unwrap();

    assert!(!outcome.is_success());
    let collisions: Vec<&str> = outcome
        .diagnostics
        .iter()
        .filter(|d| d.code == DiagnosticCode::CaseCollision)
        .map(|d| d.file.as_str())
        .collect();
    assert!(collisions.contains(&"Models/User.ts"));
    assert!(collisions.contains(&"models/Post.ts"));

    assert!(outcome.file("Models/User.cs").is_none());
    assert!(outcome.file("models/Post.cs").is_none());
    assert!(outcome.file("utils/math.cs").is_some());
}

#[test]
fn test_mixed_export_is_not_emitted() {
    let config = config();
    let mut mixed = class("src/Widget.ts", "Widget", &[], vec![]);
    mixed.exports.push(binary_function("helper", BinaryOp::Add, 7));

    let outcome = Transpiler::new(&config)
        .transpile(&[mixed, math_unit()])
        .unwrap();

    let mixed: Vec<_> = outcome
        .diagnostics
        .iter()
        .filter(|d| d.code == DiagnosticCode::MixedExportAmbiguity)
        .collect();
    assert_eq!(mixed.len(), 1);
    assert_eq!(mixed[0].file, "Widget.ts");
    assert!(outcome.file("Widget.cs").is_none());
    assert!(outcome.file("utils/math.cs").is_some());
}

#[test]
fn test_generic_instantiation_emitted_once() {
    let config = config();
    let container_of_number = TypeRef::generic("Container", vec![TypeRef::Number]);
    let units = vec![
        class(
            "src/util/Container.ts",
            "Container",
            &["T"],
            vec![property("value", TypeRef::named("T"))],
        ),
        class("src/a.ts", "a", &[], vec![property("box", container_of_number.clone())])
            .with_import(ImportBinding::new("Container", "util/Container.ts")),
        class("src/b.ts", "b", &[], vec![property("box", container_of_number)])
            .with_import(ImportBinding::new("Container", "util/Container.ts")),
    ];
    let outcome = Transpiler::new(&config).transpile(&units).unwrap();
    assert!(outcome.is_success(), "{:?}", outcome.diagnostics);

    let paths: Vec<String> = outcome
        .files
        .iter()
        .map(|f| f.path.display().to_string().replace('\\', "/"))
        .collect();
    assert_eq!(
        paths,
        vec!["a.cs", "b.cs", "util/Container.cs", "util/Container_number.cs"]
    );

    let support = outcome.file("util/Container_number.cs").unwrap();
    assert!(support.contents.contains("    public class Container_number\n"));
    assert!(support.contents.contains("public double value { get; set; }"));

    let a = outcome.file("a.cs").unwrap();
    assert!(a.contents.contains("using My.App.util;"));
    assert!(a.contents.contains("public Container_number box { get; set; }"));
}

fn emitted_paths(outcome: &TranspileOutcome) -> Vec<String> {
    outcome
        .files
        .iter()
        .map(|f| f.path.display().to_string().replace('\\', "/"))
        .collect()
}

#[test]
fn test_clashing_instantiation_drops_requesting_file() {
    let config = config();
    let units = vec![
        class(
            "src/util/Container.ts",
            "Container",
            &["T"],
            vec![property("value", TypeRef::named("T"))],
        ),
        class(
            "src/util/Container_number.ts",
            "Container_number",
            &[],
            vec![property("other", TypeRef::String)],
        ),
        class(
            "src/a.ts",
            "a",
            &[],
            vec![property("box", TypeRef::generic("Container", vec![TypeRef::Number]))],
        )
        .with_import(ImportBinding::new("Container", "util/Container.ts")),
    ];
    let outcome = Transpiler::new(&config).transpile(&units).unwrap();

    assert!(!outcome.is_success());
    let clashes: Vec<&str> = outcome
        .diagnostics
        .iter()
        .filter(|d| d.code == DiagnosticCode::GenericNameClash)
        .map(|d| d.file.as_str())
        .collect();
    assert_eq!(clashes, vec!["a.ts", "util/Container.ts"]);

    assert!(outcome.file("a.cs").is_none());
    let user_class = outcome.file("util/Container_number.cs").unwrap();
    assert!(user_class.contents.contains("public string other { get; set; }"));
    assert!(!user_class.contents.contains("public double value"));
}

#[test]
fn test_expansion_limit_drops_requesting_file() {
    let config = TranspileConfig::builder()
        .root_namespace("My.App")
        .source_root("src")
        .max_generic_depth(2)
        .build()
        .unwrap();
    let units = vec![
        class(
            "src/util/Node.ts",
            "Node",
            &["T"],
            vec![property(
                "next",
                TypeRef::generic("Node", vec![TypeRef::array(TypeRef::named("T"))]),
            )],
        ),
        class(
            "src/a.ts",
            "a",
            &[],
            vec![property("head", TypeRef::generic("Node", vec![TypeRef::Number]))],
        )
        .with_import(ImportBinding::new("Node", "util/Node.ts")),
        class("src/b.ts", "b", &[], vec![property("title", TypeRef::String)]),
    ];
    let outcome = Transpiler::new(&config).transpile(&units).unwrap();

    assert!(!outcome.is_success());
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.code == DiagnosticCode::GenericExpansionLimit && d.file == "a.ts"));
    assert_eq!(emitted_paths(&outcome), vec!["b.cs", "util/Node.cs"]);
}

#[test]
fn test_output_is_independent_of_input_order() {
    let config = config();
    let units = vec![
        user_unit(),
        math_unit(),
        class("src/models/Post.ts", "Post", &[], vec![property("title", TypeRef::String)]),
    ];
    let mut reversed = units.clone();
    reversed.reverse();

    let forward = Transpiler::new(&config).transpile(&units).unwrap();
    let backward = Transpiler::new(&config).transpile(&reversed).unwrap();
    assert_eq!(forward.files, backward.files);
    assert_eq!(forward.diagnostics, backward.diagnostics);
}

#[test]
fn test_codegen_trait_renders_lowered_file() {
    let config = config();
    let outcome = Transpiler::new(&config).transpile(&[user_unit()]).unwrap();
    let expected = &outcome.file("models/User.cs").unwrap().contents;

    let assignment =
        sharpen_core::path_resolver::resolve_path(&user_unit().path, &config).unwrap();
    let table = sharpen_core::symbols::SymbolTable::build([(
        assignment.clone(),
        sharpen_core::shape::classify(&user_unit(), &assignment),
    )]);
    let certification = table.detect_collisions(&config);
    let index = sharpen_core::symbols::ProjectIndex::build(certification.certified());
    let certified = certification.get("models/User.ts").unwrap();
    let lowered =
        sharpen_core::lowering::lower_file(&user_unit(), certified, &index, &config).unwrap();

    let mut emitter = CSharpEmitter::new(&config);
    let mut sink = DiagnosticSink::new();
    let rendered = emitter.generate(&lowered.file, &mut sink).unwrap();
    assert_eq!(&rendered, expected);
}

#[test]
fn test_build_publishes_tree() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("generated");
    let config = config();

    let outcome = Transpiler::new(&config)
        .build(&[user_unit(), math_unit()], &out)
        .unwrap();

    assert!(out.join("models/User.cs").is_file());
    assert!(out.join("utils/math.cs").is_file());
    assert!(out.join(MANIFEST_FILE).is_file());
    let manifest = outcome.manifest.unwrap();
    assert_eq!(manifest.files.len(), 2);
    assert_eq!(manifest.generated_at, "1970-01-01T00:00:00Z");
}

#[test]
fn test_cancelled_build_publishes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("generated");
    let config = config();
    let token = CancelToken::new();
    token.cancel();

    let result = Transpiler::new(&config)
        .with_cancel_token(token)
        .build(&[user_unit()], &out);
    assert!(matches!(result, Err(PipelineError::Cancelled)));
    assert!(!out.exists());
}
