use super::*;
use crate::ir::{IrBinaryOp, IrLiteral, IrSwitchSection, IrTemplatePart};
use crate::path_resolver::resolve_path;
use crate::shape::classify;
use crate::source::{
    AccessorDecl, AccessorKind, BinaryOp, ConstructorDecl, ImportBinding, MethodDecl, ObjectProp,
    PropertyDecl, SwitchCase, Visibility as SourceVisibility,
};
use crate::symbols::SymbolTable;
use pretty_assertions::assert_eq;
use std::path::Path;

fn config() -> TranspileConfig {
    TranspileConfig::builder()
        .root_namespace("My.App")
        .source_root("src")
        .build()
        .unwrap()
}

fn lower(units: &[SourceUnit], path: &str) -> LoweredFile {
    let config = config();
    let table = SymbolTable::build(units.iter().map(|unit| {
        let assignment = resolve_path(&unit.path, &config).unwrap();
        let shape = classify(unit, &assignment);
        (assignment, shape)
    }));
    let certification = table.detect_collisions(&config);
    assert!(certification.diagnostics().is_empty());
    let index = ProjectIndex::build(certification.certified());

    let unit = units
        .iter()
        .find(|u| u.display_path() == format!("src/{}", path))
        .unwrap();
    let certified = certification.get(path).unwrap();
    lower_file(unit, certified, &index, &config).unwrap()
}

fn function(name: &str, params: Vec<Param>, return_type: Option<TypeRef>, body: Vec<Stmt>) -> FunctionDecl {
    FunctionDecl {
        name: name.to_string(),
        span: Span::new(1, 1),
        type_params: vec![],
        params,
        return_type,
        body,
        is_async: false,
    }
}

fn method(name: &str, return_type: Option<TypeRef>, body: Vec<Stmt>) -> ClassMember {
    ClassMember::Method(MethodDecl {
        name: name.to_string(),
        span: Span::new(4, 5),
        type_params: vec![],
        params: vec![],
        return_type,
        body,
        visibility: SourceVisibility::Public,
        is_static: false,
        is_async: false,
    })
}

fn class_unit(path: &str, name: &str, members: Vec<ClassMember>) -> SourceUnit {
    SourceUnit::new(
        path,
        vec![Declaration::Class(ClassDecl {
            name: name.to_string(),
            span: Span::new(1, 14),
            type_params: vec![],
            extends: None,
            members,
        })],
    )
}

fn body_of(file: &LoweredFile, name: &str) -> Vec<IrStatement> {
    file.file
        .class
        .members
        .iter()
        .find_map(|m| match m {
            IrMember::Method(method) if method.name == name => Some(method.body.clone()),
            _ => None,
        })
        .unwrap()
}

fn method_of<'f>(file: &'f LoweredFile, name: &str) -> &'f IrMethod {
    file.file
        .class
        .members
        .iter()
        .find_map(|m| match m {
            IrMember::Method(method) if method.name == name => Some(method),
            _ => None,
        })
        .unwrap()
}

fn let_decl(name: &str, ty: Option<TypeRef>, init: Option<Expr>) -> Stmt {
    Stmt::VarDecl {
        kind: VarKind::Let,
        name: name.to_string(),
        ty,
        init,
    }
}

fn runtime(name: &str) -> IrType {
    IrType::named(name, Some("Sharpen.Runtime"))
}

#[test]
fn test_user_class_with_parameter_properties() {
    let greet = method(
        "greet",
        Some(TypeRef::String),
        vec![Stmt::Return(Some(Expr::Template {
            quasis: vec!["Hello, ".to_string(), String::new()],
            exprs: vec![Expr::member(Expr::This, "name")],
        }))],
    );
    let constructor = ClassMember::Constructor(ConstructorDecl {
        span: Span::new(2, 5),
        params: vec![
            Param::new("name", TypeRef::String).as_property(SourceVisibility::Public, false),
            Param::new("age", TypeRef::Number).as_property(SourceVisibility::Private, true),
        ],
        body: vec![],
    });
    let units = vec![class_unit("src/models/User.ts", "User", vec![constructor, greet])];
    let lowered = lower(&units, "models/User.ts");
    let file = &lowered.file;

    assert_eq!(file.namespace, "My.App.models");
    assert_eq!(file.output_path, Path::new("models/User.cs"));
    assert_eq!(file.class.kind, ClassKind::Regular);

    let names: Vec<&str> = file.class.members.iter().map(IrMember::name).collect();
    assert_eq!(names, vec!["name", "age", "constructor", "greet"]);

    match &file.class.members[1] {
        IrMember::Property(age) => {
            assert_eq!(age.ty, IrType::Double);
            assert_eq!(age.visibility, Visibility::Private);
            assert!(age.is_readonly);
        }
        other => panic!("expected property, got {:?}", other),
    }
    match &file.class.members[2] {
        IrMember::Constructor(ctor) => {
            assert_eq!(ctor.params.len(), 2);
            assert_eq!(
                ctor.body[0],
                IrStatement::Expr(IrExpression::assign(
                    IrExpression::member(IrExpression::This, "name"),
                    IrExpression::ident("name"),
                ))
            );
        }
        other => panic!("expected constructor, got {:?}", other),
    }

    let greet = method_of(&lowered, "greet");
    assert_eq!(greet.return_type, IrType::String);
    assert_eq!(
        greet.body,
        vec![IrStatement::Return(Some(IrExpression::Template(vec![
            IrTemplatePart::Text("Hello, ".to_string()),
            IrTemplatePart::Expr(IrExpression::member(IrExpression::This, "name")),
        ])))]
    );
}

#[test]
fn test_loose_exports_lower_to_static_container() {
    let add = function(
        "add",
        vec![Param::new("a", TypeRef::Number), Param::new("b", TypeRef::Number)],
        Some(TypeRef::Number),
        vec![Stmt::Return(Some(Expr::binary(
            BinaryOp::Add,
            Expr::ident("a"),
            Expr::ident("b"),
        )))],
    );
    let pi = VariableDecl {
        name: "PI".to_string(),
        span: Span::new(9, 14),
        kind: VarKind::Const,
        ty: None,
        init: Some(Expr::Number(3.14159)),
    };
    let units = vec![SourceUnit::new(
        "src/utils/math.ts",
        vec![Declaration::Function(add), Declaration::Variable(pi)],
    )];
    let lowered = lower(&units, "utils/math.ts");
    let class = &lowered.file.class;

    assert_eq!(class.name, "math");
    assert!(class.is_static());

    let add = method_of(&lowered, "add");
    assert!(add.is_static);
    assert_eq!(add.return_type, IrType::Double);
    assert_eq!(
        add.body,
        vec![IrStatement::Return(Some(IrExpression::binary(
            IrBinaryOp::Add,
            IrExpression::ident("a"),
            IrExpression::ident("b"),
        )))]
    );

    match &class.members[1] {
        IrMember::Property(pi) => {
            assert!(pi.is_static && pi.is_readonly);
            assert_eq!(pi.ty, IrType::Double);
            assert_eq!(pi.init, Some(IrExpression::number(3.14159)));
        }
        other => panic!("expected property, got {:?}", other),
    }
}

#[test]
fn test_accessor_is_unsupported_but_siblings_lower() {
    let accessor = ClassMember::Accessor(AccessorDecl {
        name: "fullName".to_string(),
        span: Span::new(3, 5),
        accessor: AccessorKind::Get,
        is_static: false,
    });
    let units = vec![class_unit(
        "src/Person.ts",
        "Person",
        vec![accessor, method("describe", Some(TypeRef::String), vec![Stmt::Return(Some(Expr::string("p")))])],
    )];
    let lowered = lower(&units, "Person.ts");

    let unsupported: Vec<_> = lowered.file.class.unsupported().collect();
    assert_eq!(unsupported.len(), 1);
    assert_eq!(unsupported[0].code, DiagnosticCode::UnsupportedAccessor);
    assert_eq!(unsupported[0].span, Span::new(3, 5));
    assert!(unsupported[0].message.contains("get fullName"));
    assert_eq!(method_of(&lowered, "describe").return_type, IrType::String);
}

#[test]
fn test_function_valued_fields_are_rejected() {
    let handler = ClassMember::Property(PropertyDecl {
        name: "onClick".to_string(),
        span: Span::new(2, 5),
        ty: None,
        init: Some(Expr::Arrow {
            params: vec![],
            return_type: None,
            body: ArrowBody::Expr(Box::new(Expr::Number(1.0))),
            is_async: false,
        }),
        visibility: SourceVisibility::Public,
        is_static: false,
        is_readonly: false,
        optional: false,
    });
    let holder = VariableDecl {
        name: "handlers".to_string(),
        span: Span::new(1, 1),
        kind: VarKind::Let,
        ty: None,
        init: Some(Expr::Object(vec![ObjectProp {
            key: "run".to_string(),
            value: Expr::Arrow {
                params: vec![],
                return_type: None,
                body: ArrowBody::Block(vec![]),
                is_async: false,
            },
        }])),
    };

    let units = vec![class_unit("src/Button.ts", "Button", vec![handler])];
    let unsupported: Vec<_> = lower(&units, "Button.ts")
        .file
        .class
        .unsupported()
        .map(|u| u.code)
        .collect();
    assert_eq!(unsupported, vec![DiagnosticCode::UnsupportedClosureField]);

    let units = vec![SourceUnit::new("src/registry.ts", vec![Declaration::Variable(holder)])];
    let lowered = lower(&units, "registry.ts");
    assert_eq!(lowered.file.class.unsupported().count(), 1);
}

#[test]
fn test_function_values_inside_bodies_are_kept() {
    let handlers = let_decl(
        "handlers",
        None,
        Some(Expr::Object(vec![ObjectProp {
            key: "run".to_string(),
            value: Expr::Arrow {
                params: vec![],
                return_type: None,
                body: ArrowBody::Expr(Box::new(Expr::Number(1.0))),
                is_async: false,
            },
        }])),
    );
    let units = vec![class_unit(
        "src/Button.ts",
        "Button",
        vec![method("wire", None, vec![handlers.clone()])],
    )];
    let lowered = lower(&units, "Button.ts");
    assert_eq!(lowered.file.class.unsupported().count(), 0);
    assert_eq!(body_of(&lowered, "wire").len(), 1);

    let setup = function("setup", vec![], None, vec![handlers]);
    let units = vec![SourceUnit::new("src/events.ts", vec![Declaration::Function(setup)])];
    let lowered = lower(&units, "events.ts");
    assert_eq!(lowered.file.class.unsupported().count(), 0);
    assert_eq!(method_of(&lowered, "setup").name, "setup");
}

#[test]
fn test_imported_container_member_resolves_through_index() {
    let add = function(
        "add",
        vec![Param::new("a", TypeRef::Number)],
        Some(TypeRef::Number),
        vec![Stmt::Return(Some(Expr::ident("a")))],
    );
    let run = function(
        "run",
        vec![],
        None,
        vec![Stmt::Return(Some(Expr::call(Expr::ident("add"), vec![Expr::Number(2.0)])))],
    );
    let units = vec![
        // the consumer sorts first so resolution cannot depend on visit order
        SourceUnit::new("src/app/main.ts", vec![Declaration::Function(run)])
            .with_import(ImportBinding::new("add", "utils/math.ts")),
        SourceUnit::new("src/utils/math.ts", vec![Declaration::Function(add)]),
    ];
    let lowered = lower(&units, "app/main.ts");

    let math = IrType::named("math", Some("My.App.utils"));
    assert_eq!(
        body_of(&lowered, "run"),
        vec![IrStatement::Return(Some(IrExpression::call(
            IrExpression::member(IrExpression::TypeName(math), "add"),
            vec![IrExpression::number(2.0)],
        )))]
    );
    assert!(lowered.file.references.contains("My.App.utils"));
    assert!(!lowered.file.references.contains("My.App.app"));
}

#[test]
fn test_external_import_records_namespace() {
    let config = TranspileConfig::builder()
        .root_namespace("My.App")
        .external_namespace("lodash", "Lodash.Net")
        .build()
        .unwrap();
    let run = function(
        "run",
        vec![],
        None,
        vec![Stmt::Expr(Expr::call(Expr::ident("chunk"), vec![]))],
    );
    let unit = SourceUnit::new("tools.ts", vec![Declaration::Function(run)])
        .with_import(ImportBinding::new("chunk", "lodash"));

    let assignment = resolve_path(&unit.path, &config).unwrap();
    let shape = classify(&unit, &assignment);
    let certification = SymbolTable::build([(assignment, shape)]).detect_collisions(&config);
    let index = ProjectIndex::build(certification.certified());
    let lowered = lower_file(&unit, certification.get("tools.ts").unwrap(), &index, &config).unwrap();

    assert!(lowered.file.references.contains("Lodash.Net"));
}

#[test]
fn test_switch_fallthrough_becomes_goto_case() {
    let call = |name: &str| Stmt::Expr(Expr::call(Expr::ident(name), vec![]));
    let switch = Stmt::Switch {
        discriminant: Expr::ident("code"),
        cases: vec![
            SwitchCase {
                test: Some(Expr::Number(1.0)),
                body: vec![],
            },
            SwitchCase {
                test: Some(Expr::Number(2.0)),
                body: vec![call("low")],
            },
            SwitchCase {
                test: Some(Expr::Number(3.0)),
                body: vec![call("mid"), Stmt::Break],
            },
            SwitchCase {
                test: None,
                body: vec![call("other")],
            },
        ],
    };
    let route = function("route", vec![Param::new("code", TypeRef::Number)], None, vec![switch]);
    let units = vec![SourceUnit::new("src/router.ts", vec![Declaration::Function(route)])];
    let lowered = lower(&units, "router.ts");

    let call_ir = |name: &str| IrStatement::Expr(IrExpression::call(IrExpression::ident(name), vec![]));
    let expected = vec![
        IrSwitchSection {
            labels: vec![Some(IrExpression::number(1.0)), Some(IrExpression::number(2.0))],
            body: vec![call_ir("low"), IrStatement::GotoCase(Some(IrExpression::number(3.0)))],
        },
        IrSwitchSection {
            labels: vec![Some(IrExpression::number(3.0))],
            body: vec![call_ir("mid"), IrStatement::Break],
        },
        IrSwitchSection {
            labels: vec![None],
            body: vec![call_ir("other"), IrStatement::Break],
        },
    ];
    match &body_of(&lowered, "route")[0] {
        IrStatement::Switch { sections, .. } => assert_eq!(sections, &expected),
        other => panic!("expected switch, got {:?}", other),
    }
    assert_eq!(method_of(&lowered, "route").return_type, IrType::Void);
}

#[test]
fn test_fallthrough_into_non_constant_label_is_refused() {
    let call = |name: &str| Stmt::Expr(Expr::call(Expr::ident(name), vec![]));
    let switch = Stmt::Switch {
        discriminant: Expr::ident("code"),
        cases: vec![
            SwitchCase {
                test: Some(Expr::Number(1.0)),
                body: vec![call("low")],
            },
            SwitchCase {
                test: Some(Expr::ident("limit")),
                body: vec![call("high"), Stmt::Break],
            },
        ],
    };
    let route = function("route", vec![Param::new("code", TypeRef::Number)], None, vec![switch]);
    let ping = function("ping", vec![], None, vec![call("pong")]);
    let units = vec![SourceUnit::new(
        "src/router.ts",
        vec![Declaration::Function(route), Declaration::Function(ping)],
    )];
    let lowered = lower(&units, "router.ts");

    let unsupported: Vec<_> = lowered.file.class.unsupported().collect();
    assert_eq!(unsupported.len(), 1);
    assert_eq!(unsupported[0].name, "route");
    assert_eq!(unsupported[0].code, DiagnosticCode::UnsupportedConstruct);
    assert_eq!(unsupported[0].span, Span::new(1, 1));
    assert!(unsupported[0].message.contains("not a constant"));
    assert_eq!(body_of(&lowered, "ping").len(), 1);
    assert!(lowered
        .file
        .class
        .members
        .iter()
        .all(|m| !matches!(m, IrMember::Method(method) if method.name == "route")));
}

#[test]
fn test_conditions_use_truthiness_unless_boolean() {
    let body = vec![
        Stmt::If {
            cond: Expr::ident("name"),
            then: vec![Stmt::Return(Some(Expr::Bool(true)))],
            otherwise: None,
        },
        Stmt::Return(Some(Expr::binary(
            BinaryOp::StrictEq,
            Expr::ident("name"),
            Expr::Undefined,
        ))),
    ];
    let check = function("check", vec![Param::new("name", TypeRef::String)], None, body);
    let units = vec![SourceUnit::new("src/checks.ts", vec![Declaration::Function(check)])];
    let lowered = lower(&units, "checks.ts");
    let body = body_of(&lowered, "check");

    match &body[0] {
        IrStatement::If { cond, .. } => assert_eq!(
            cond,
            &IrExpression::static_call(runtime("JsRuntime"), "Truthy", vec![IrExpression::ident("name")])
        ),
        other => panic!("expected if, got {:?}", other),
    }
    assert_eq!(
        body[1],
        IrStatement::Return(Some(IrExpression::binary(
            IrBinaryOp::Eq,
            IrExpression::ident("name"),
            IrExpression::Literal(IrLiteral::Null),
        )))
    );
    assert_eq!(method_of(&lowered, "check").return_type, IrType::Bool);
}

#[test]
fn test_for_in_iterates_runtime_keys() {
    let body = vec![Stmt::ForIn {
        name: "key".to_string(),
        object: Expr::ident("settings"),
        body: vec![Stmt::Expr(Expr::call(
            Expr::member(Expr::ident("console"), "log"),
            vec![Expr::ident("key"), Expr::Index {
                object: Box::new(Expr::ident("settings")),
                index: Box::new(Expr::ident("key")),
            }],
        ))],
    }];
    let dump = function("dump", vec![Param::untyped("settings")], None, body);
    let units = vec![SourceUnit::new("src/dump.ts", vec![Declaration::Function(dump)])];
    let lowered = lower(&units, "dump.ts");

    match &body_of(&lowered, "dump")[0] {
        IrStatement::ForEach { name, iterable, body } => {
            assert_eq!(name, "key");
            assert_eq!(
                iterable,
                &IrExpression::static_call(runtime("JsRuntime"), "Keys", vec![IrExpression::ident("settings")])
            );
            match &body[0] {
                IrStatement::Expr(IrExpression::Call { args, .. }) => {
                    assert!(matches!(
                        &args[0],
                        IrExpression::Call { args, .. } if args.len() == 3
                    ));
                }
                other => panic!("expected console call, got {:?}", other),
            }
        }
        other => panic!("expected foreach, got {:?}", other),
    }
    assert!(lowered.file.references.contains("System"));
}

#[test]
fn test_throwing_a_string_wraps_it() {
    let fail = function(
        "fail",
        vec![],
        Some(TypeRef::Void),
        vec![Stmt::Throw(Expr::string("boom"))],
    );
    let units = vec![SourceUnit::new("src/errors.ts", vec![Declaration::Function(fail)])];
    let lowered = lower(&units, "errors.ts");
    assert_eq!(
        body_of(&lowered, "fail"),
        vec![IrStatement::Throw(IrExpression::New {
            ty: runtime("JsError"),
            args: vec![IrExpression::string("boom")],
        })]
    );
}

#[test]
fn test_constant_object_literal_synthesizes_record() {
    let defaults = VariableDecl {
        name: "defaults".to_string(),
        span: Span::new(1, 14),
        kind: VarKind::Const,
        ty: None,
        init: Some(Expr::Object(vec![
            ObjectProp {
                key: "port".to_string(),
                value: Expr::Number(8080.0),
            },
            ObjectProp {
                key: "host".to_string(),
                value: Expr::string("localhost"),
            },
        ])),
    };
    let units = vec![SourceUnit::new("src/settings.ts", vec![Declaration::Variable(defaults)])];
    let lowered = lower(&units, "settings.ts");
    let members = &lowered.file.class.members;

    match &members[0] {
        IrMember::Record(record) => {
            assert_eq!(record.name, "DefaultsShape");
            assert_eq!(
                record.fields,
                vec![("port".to_string(), IrType::Double), ("host".to_string(), IrType::String)]
            );
        }
        other => panic!("expected record, got {:?}", other),
    }
    match &members[1] {
        IrMember::Property(property) => {
            assert_eq!(property.ty, IrType::named("DefaultsShape", None));
            assert!(matches!(property.init, Some(IrExpression::New { ref args, .. }) if args.len() == 2));
        }
        other => panic!("expected property, got {:?}", other),
    }
}

#[test]
fn test_dynamic_object_literal_stays_explicit() {
    let body = vec![
        let_decl("key", None, Some(Expr::string("a"))),
        Stmt::Return(Some(Expr::Object(vec![ObjectProp {
            key: "value".to_string(),
            value: Expr::ident("key"),
        }]))),
    ];
    let make = function("make", vec![], None, body);
    let units = vec![SourceUnit::new("src/factory.ts", vec![Declaration::Function(make)])];
    let lowered = lower(&units, "factory.ts");

    let make = method_of(&lowered, "make");
    assert_eq!(make.return_type, runtime("JsObject"));
    assert!(matches!(
        &make.body[1],
        IrStatement::Return(Some(IrExpression::Object(props))) if props.len() == 1
    ));
}

#[test]
fn test_async_return_wraps_in_task() {
    let mut load = function(
        "load",
        vec![],
        Some(TypeRef::generic("Promise", vec![TypeRef::Number])),
        vec![Stmt::Return(Some(Expr::Number(1.0)))],
    );
    load.is_async = true;
    let mut save = function("save", vec![], None, vec![]);
    save.is_async = true;

    let units = vec![SourceUnit::new(
        "src/store.ts",
        vec![Declaration::Function(load), Declaration::Function(save)],
    )];
    let lowered = lower(&units, "store.ts");

    let load = method_of(&lowered, "load");
    assert!(load.is_async);
    assert_eq!(load.return_type.to_string(), "Task<double>");
    assert_eq!(method_of(&lowered, "save").return_type.to_string(), "Task");
    assert!(lowered.file.references.contains("System.Threading.Tasks"));
}

#[test]
fn test_undefined_takes_declared_default() {
    let optional = TypeRef::Union(vec![TypeRef::Number, TypeRef::Undefined]);
    let body = vec![
        let_decl("limit", Some(optional), Some(Expr::Undefined)),
        let_decl("anything", None, Some(Expr::Null)),
        let_decl("count", None, Some(Expr::Number(0.0))),
    ];
    let setup = function("setup", vec![], None, body);
    let units = vec![SourceUnit::new("src/limits.ts", vec![Declaration::Function(setup)])];
    let body = body_of(&lower(&units, "limits.ts"), "setup");

    let nullable = IrType::nullable(IrType::Double);
    assert_eq!(
        body[0],
        IrStatement::Local {
            name: "limit".to_string(),
            ty: Some(nullable.clone()),
            init: Some(IrExpression::Default(Some(nullable))),
        }
    );
    assert!(matches!(&body[1], IrStatement::Local { ty: Some(IrType::Object), .. }));
    assert!(matches!(&body[2], IrStatement::Local { ty: None, .. }));
}

#[test]
fn test_concrete_generic_use_records_instantiation() {
    let container = SourceUnit::new(
        "src/util/Container.ts",
        vec![Declaration::Class(ClassDecl {
            name: "Container".to_string(),
            span: Span::new(1, 14),
            type_params: vec!["T".to_string()],
            extends: None,
            members: vec![],
        })],
    );
    let body = vec![
        Stmt::VarDecl {
            kind: VarKind::Const,
            name: "c".to_string(),
            ty: None,
            init: Some(Expr::new_object("Container", vec![TypeRef::Number], vec![])),
        },
        Stmt::Return(Some(Expr::ident("c"))),
    ];
    let make = function("make", vec![], None, body);
    let units = vec![
        container,
        SourceUnit::new("src/app/boxes.ts", vec![Declaration::Function(make)])
            .with_import(ImportBinding::new("Container", "util/Container.ts")),
    ];
    let lowered = lower(&units, "app/boxes.ts");

    let canonical: Vec<_> = lowered.instantiations.iter().map(|i| i.canonical.as_str()).collect();
    assert_eq!(canonical, vec!["Container_number"]);
    assert_eq!(
        method_of(&lowered, "make").return_type,
        IrType::named("Container_number", Some("My.App.util"))
    );
}

#[test]
fn test_super_call_lifts_to_base_arguments() {
    let constructor = ClassMember::Constructor(ConstructorDecl {
        span: Span::new(2, 5),
        params: vec![Param::new("message", TypeRef::String)],
        body: vec![
            Stmt::Expr(Expr::call(Expr::Super, vec![Expr::ident("message")])),
            Stmt::Expr(Expr::assign(Expr::member(Expr::This, "code"), Expr::Number(1.0))),
        ],
    });
    let code = ClassMember::Property(PropertyDecl {
        name: "code".to_string(),
        span: Span::new(1, 30),
        ty: Some(TypeRef::Number),
        init: None,
        visibility: SourceVisibility::Public,
        is_static: false,
        is_readonly: false,
        optional: false,
    });
    let units = vec![SourceUnit::new(
        "src/AppError.ts",
        vec![Declaration::Class(ClassDecl {
            name: "AppError".to_string(),
            span: Span::new(1, 14),
            type_params: vec![],
            extends: Some(TypeRef::named("Error")),
            members: vec![code, constructor],
        })],
    )];
    let lowered = lower(&units, "AppError.ts");
    let class = &lowered.file.class;

    assert_eq!(class.base, Some(IrType::system("Exception")));
    match &class.members[1] {
        IrMember::Constructor(ctor) => {
            assert_eq!(ctor.base_args, Some(vec![IrExpression::ident("message")]));
            assert_eq!(ctor.body.len(), 1);
        }
        other => panic!("expected constructor, got {:?}", other),
    }
}
