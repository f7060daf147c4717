#[cfg(test)]
/// Parser unit tests.
///
/// These cover the statement forms emitted by the generator and the semicolon-insertion rules.
mod tests {
    use super::*;
    use crate::lexer;

    fn parse_str(source: &str) -> Result<Program, Vec<ScriptError>> {
        let tokens = lexer::lex(source).map_err(|_| vec![])?;
        parse(&tokens)
    }

    #[test]
    fn test_parse_namespace_assignment() {
        let program = parse_str("a.b.c.Main = function (args) { alert('x'); };").unwrap();
        assert_eq!(program.body.len(), 1);
        match &program.body[0].node {
            Stmt::Expr(expr) => match &expr.node {
                Expr::Assign { op, target, value } => {
                    assert_eq!(*op, AssignOp::Assign);
                    assert!(matches!(&target.node, Expr::Member(_, name) if name == "Main"));
                    assert!(matches!(&value.node, Expr::Function(f) if f.params == vec!["args".to_string()]));
                }
                other => panic!("Expected assignment, got {:?}", other),
            },
            other => panic!("Expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_semicolons_are_optional_across_lines() {
        let program = parse_str("var a = 1\nvar b = 2\nalert(a + b)").unwrap();
        assert_eq!(program.body.len(), 3);
    }

    #[test]
    fn test_missing_semicolon_on_same_line_is_an_error() {
        let errors = parse_str("var a = 1 var b = 2").unwrap_err();
        assert!(errors[0].to_string().contains("Expected ';'"));
    }

    #[test]
    fn test_return_followed_by_newline_returns_undefined() {
        let program = parse_str("function f() {\n  return\n  42\n}").unwrap();
        match &program.body[0].node {
            Stmt::Function(decl) => {
                assert_eq!(decl.body.len(), 2);
                assert!(matches!(decl.body[0].node, Stmt::Return(None)));
            }
            other => panic!("Expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_new_with_member_callee_and_trailing_call() {
        let program = parse_str("new a.b.DTO(1).getX()").unwrap();
        match &program.body[0].node {
            Stmt::Expr(expr) => match &expr.node {
                Expr::Call(callee, args) => {
                    assert!(args.is_empty());
                    match &callee.node {
                        Expr::Member(object, name) => {
                            assert_eq!(name, "getX");
                            assert!(matches!(&object.node, Expr::New(_, args) if args.len() == 1));
                        }
                        other => panic!("Expected member, got {:?}", other),
                    }
                }
                other => panic!("Expected call, got {:?}", other),
            },
            other => panic!("Expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_for_in_and_classic_for() {
        let program = parse_str("for (var k in o) {}\nfor (var i = 0; i < 3; i++) {}").unwrap();
        assert!(matches!(&program.body[0].node, Stmt::ForIn { name, .. } if name == "k"));
        assert!(matches!(&program.body[1].node, Stmt::For { init: Some(_), test: Some(_), update: Some(_), .. }));
    }

    #[test]
    fn test_try_requires_catch_or_finally() {
        let errors = parse_str("try { x() }").unwrap_err();
        assert!(errors[0].to_string().contains("Expected 'catch' or 'finally'"));
    }

    #[test]
    fn test_object_literal_keys() {
        let program = parse_str("var o = { name: 1, 'quoted': 2, 3: 4, new: 5 };").unwrap();
        match &program.body[0].node {
            Stmt::Var(_, decls) => match &decls[0].init.as_ref().unwrap().node {
                Expr::Object(props) => {
                    let keys: Vec<&str> = props.iter().map(|(k, _)| k.as_str()).collect();
                    assert_eq!(keys, vec!["name", "quoted", "3", "new"]);
                }
                other => panic!("Expected object, got {:?}", other),
            },
            other => panic!("Expected var, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_assignment_target() {
        let errors = parse_str("1 = 2;").unwrap_err();
        assert!(errors[0].to_string().contains("Invalid assignment target"));
    }

    #[test]
    fn test_recovery_reports_multiple_errors() {
        let errors = parse_str("var = 1;\nvar ok = 2;\nvar = 3;").unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_deep_nesting_is_rejected_not_overflowed() {
        let source = format!("{}1{}", "(".repeat(5_000), ")".repeat(5_000));
        let errors = parse_str(&source).unwrap_err();
        assert!(errors[0].to_string().contains("Nesting too deep"));
    }
}
