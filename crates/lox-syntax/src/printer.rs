//! Parenthesised dumps of syntax trees, for debugging.

use lox_common::stack;

use crate::ast::{Expr, ExprLiteral, ExprS, Stmt, StmtFun, StmtS};

pub fn print_stmt(stmt_s: &StmtS) -> String {
    stack::ensure_sufficient_stack(|| stmt_to_string(stmt_s))
}

fn stmt_to_string(stmt_s: &StmtS) -> String {
    let (stmt, _) = stmt_s;
    match stmt {
        Stmt::Block(block) => parenthesize("Block", block.stmts.iter().map(print_stmt)),
        Stmt::Class(class) => {
            let name = match &class.super_ {
                Some(super_) => format!("ClassDecl {} < {}", class.name.0, var_name(super_)),
                None => format!("ClassDecl {}", class.name.0),
            };
            parenthesize(&name, class.methods.iter().map(|method| print_fun(method)))
        }
        Stmt::Expr(expr) => parenthesize("Stmt", [print_expr(&expr.value)]),
        Stmt::Fun(fun) => print_fun(fun),
        Stmt::If(if_) => {
            let mut parts = vec![print_expr(&if_.cond), print_stmt(&if_.then)];
            parts.extend(if_.else_.as_ref().map(print_stmt));
            parenthesize("If", parts)
        }
        Stmt::Print(print) => parenthesize("Print", [print_expr(&print.value)]),
        Stmt::Return(return_) => parenthesize("Return", return_.value.as_ref().map(print_expr)),
        Stmt::Var(var) => {
            parenthesize(&format!("VarDecl {}", var.name.0), var.value.as_ref().map(print_expr))
        }
        Stmt::While(while_) => {
            let cond = parenthesize("Stmt", [print_expr(&while_.cond)]);
            parenthesize("While", [cond, print_stmt(&while_.body)])
        }
    }
}

pub fn print_expr(expr_s: &ExprS) -> String {
    stack::ensure_sufficient_stack(|| expr_to_string(expr_s))
}

fn expr_to_string(expr_s: &ExprS) -> String {
    let (expr, _) = expr_s;
    match expr {
        Expr::Assign(assign) => {
            parenthesize(&format!("Assign {}", assign.var.name), [print_expr(&assign.value)])
        }
        Expr::Call(call) => parenthesize(
            "FnCall",
            std::iter::once(print_expr(&call.callee)).chain(call.args.iter().map(print_expr)),
        ),
        Expr::Get(get) => parenthesize(&format!("Get {}", get.name.0), [print_expr(&get.object)]),
        Expr::Grouping(group) => parenthesize("Group", [print_expr(&group.value)]),
        Expr::Infix(infix) => {
            parenthesize(&infix.op.to_string(), [print_expr(&infix.lt), print_expr(&infix.rt)])
        }
        Expr::Literal(ExprLiteral::Nil) => "nil".to_string(),
        Expr::Literal(ExprLiteral::Bool(bool)) => format!("'{bool}'"),
        Expr::Literal(ExprLiteral::Number(number)) => format!("'{number}'"),
        Expr::Literal(ExprLiteral::String(string)) => format!("'{string}'"),
        Expr::Logical(logical) => parenthesize(
            &logical.op.to_string(),
            [print_expr(&logical.lt), print_expr(&logical.rt)],
        ),
        Expr::Prefix(prefix) => parenthesize(&prefix.op.to_string(), [print_expr(&prefix.rt)]),
        Expr::Set(set) => format!(
            "(Set {} on {} to {})",
            set.name.0,
            print_expr(&set.object),
            print_expr(&set.value)
        ),
        Expr::Super(super_) => format!("(Super {})", super_.name.0),
        Expr::This(_) => "(This)".to_string(),
        Expr::Var(var) => format!("(Var {})", var.var.name),
    }
}

fn print_fun(fun: &StmtFun) -> String {
    let mut name = format!("FnDecl '{}'", fun.name.0);
    for (param, _) in &fun.params {
        name.push_str(&format!(" '{param}'"));
    }
    parenthesize(&name, [parenthesize("Body", fun.body.iter().map(print_stmt))])
}

fn var_name(expr_s: &ExprS) -> &str {
    match &expr_s.0 {
        Expr::Var(var) => &var.var.name,
        _ => "?",
    }
}

fn parenthesize(name: &str, parts: impl IntoIterator<Item = String>) -> String {
    let mut output = format!("({name}");
    for part in parts {
        output.push(' ');
        output.push_str(&part);
    }
    output.push(')');
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::lexer::Scanner;
    use crate::parser::Parser;

    use pretty_assertions::assert_eq;

    fn dump(source: &str) -> Vec<String> {
        let (tokens, _) = Scanner::new(source).scan();
        let (program, errors) = Parser::new(tokens).parse();
        assert!(errors.is_empty(), "{errors:?}");
        program.stmts.iter().map(print_stmt).collect()
    }

    #[test]
    fn print_literals() {
        let exp =
            vec!["(Print nil)", "(Print 'true')", "(Print '2.5')", "(Print 'hi')", "(Print '3')"];
        assert_eq!(exp, dump(r#"print nil; print true; print 2.5; print "hi"; print 3.0;"#));
    }

    #[test]
    fn print_declarations() {
        let exp = vec![
            "(VarDecl a)",
            "(FnDecl 'f' 'a' 'b' (Body (Return (+ (Var a) (Var b)))))",
            "(Return)",
        ];
        assert_eq!(exp, dump("var a; fun f(a, b) { return a + b; } return;"));
    }
}
