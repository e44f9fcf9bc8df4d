//! The semantic analyzer
//!
//! A single syntax-directed pass over the parse tree. For each node it
//! analyzes the children left to right, applies the static checks, and
//! builds the resolved AST node. Name bindings and the loop/function
//! flags are threaded through the [`Context`] stack; analysis stops at
//! the first violated check.

use std::collections::HashSet;
use std::rc::Rc;

use super::ast::{Entity, Expression, Function, Program, Statement, Variable};
use super::context::Context;
use super::stdlib::standard_library;
use super::types::{Field, FunctionType, StructType, Type};
use crate::errors::{CarlosError, CarlosResult, SourceSpan};
use crate::parser::{self, BinaryOp, ElseBranch, ExprKind, StmtKind, TypeExprKind, UnaryOp};

/// The analyzer driver
pub struct Analyzer {
    context: Context,
}

impl Analyzer {
    /// Create an analyzer with the standard library in its root context
    pub fn new() -> Self {
        Self {
            context: Context::with_prelude(standard_library()),
        }
    }

    /// Analyze a whole program
    pub fn analyze_program(mut self, program: &parser::Program) -> CarlosResult<Program> {
        let statements = self.analyze_statements(&program.statements)?;
        Ok(Program { statements })
    }

    fn analyze_statements(&mut self, statements: &[parser::Stmt]) -> CarlosResult<Vec<Statement>> {
        statements
            .iter()
            .map(|s| self.analyze_statement(s))
            .collect()
    }

    // ==================== Statements ====================

    fn analyze_statement(&mut self, stmt: &parser::Stmt) -> CarlosResult<Statement> {
        match &stmt.kind {
            StmtKind::VarDecl {
                constant,
                name,
                initializer,
            } => {
                let initializer = self.analyze_expression(initializer)?;
                let variable = Rc::new(Variable::new(&name.name, *constant, initializer.ty()));
                self.context
                    .add(&name.name, Entity::Variable(variable.clone()), name.span)?;
                Ok(Statement::VariableDeclaration {
                    variable,
                    initializer,
                })
            }

            StmtKind::TypeDecl { name, fields } => {
                // Bind the struct before resolving its fields so that a
                // field may reach the struct through optional or array
                // wrappers.
                let struct_type = Rc::new(StructType::new(&name.name));
                self.context.add(
                    &name.name,
                    Entity::Type(Type::Struct(struct_type.clone())),
                    name.span,
                )?;
                let mut resolved = Vec::new();
                for field in fields {
                    resolved.push(Field::new(&field.name.name, self.resolve_type(&field.ty)?));
                }
                *struct_type.fields.borrow_mut() = resolved;
                must_have_distinct_fields(&struct_type, stmt.span)?;
                must_not_be_self_containing(&struct_type, stmt.span)?;
                Ok(Statement::TypeDeclaration { struct_type })
            }

            StmtKind::FunDecl {
                name,
                params,
                return_type,
                body,
            } => {
                // The full function type is resolved before the body is
                // analyzed, so the function can call itself.
                let param_types = params
                    .iter()
                    .map(|p| self.resolve_type(&p.ty))
                    .collect::<CarlosResult<Vec<_>>>()?;
                let return_type = match return_type {
                    Some(t) => self.resolve_type(t)?,
                    None => Type::Void,
                };
                let function = Rc::new(Function::new(
                    &name.name,
                    Rc::new(FunctionType::new(param_types.clone(), return_type)),
                ));
                self.context
                    .add(&name.name, Entity::Function(function.clone()), name.span)?;

                self.context.enter(Some(false), Some(function.clone()));
                let mut variables = Vec::new();
                for (param, ty) in params.iter().zip(param_types) {
                    let variable = Rc::new(Variable::new(&param.name.name, false, ty));
                    self.context.add(
                        &param.name.name,
                        Entity::Variable(variable.clone()),
                        param.name.span,
                    )?;
                    variables.push(variable);
                }
                let body = self.analyze_statements(body);
                self.context.exit();

                Ok(Statement::FunctionDeclaration {
                    function,
                    params: variables,
                    body: body?,
                })
            }

            StmtKind::Increment { target } => {
                let span = target.span;
                let target = self.analyze_expression(target)?;
                must_have_integer_type(&target, span)?;
                Ok(Statement::Increment { target })
            }

            StmtKind::Decrement { target } => {
                let span = target.span;
                let target = self.analyze_expression(target)?;
                must_have_integer_type(&target, span)?;
                Ok(Statement::Decrement { target })
            }

            StmtKind::Assignment { target, source } => {
                let target_span = target.span;
                let source_span = source.span;
                let target = self.analyze_expression(target)?;
                let source = self.analyze_expression(source)?;
                must_be_assignable(&source, &target.ty(), source_span)?;
                must_not_be_read_only(&target, target_span)?;
                Ok(Statement::Assignment { target, source })
            }

            StmtKind::Call(expr) => {
                let call = self.analyze_expression(expr)?;
                Ok(Statement::Call(call))
            }

            StmtKind::Break => {
                if !self.context.in_loop() {
                    return Err(CarlosError::analysis(
                        "Break can only appear in a loop",
                        stmt.span,
                    ));
                }
                Ok(Statement::Break)
            }

            StmtKind::Return(Some(expr)) => {
                let Some(function) = self.context.function() else {
                    return Err(CarlosError::analysis(
                        "Return can only appear in a function",
                        stmt.span,
                    ));
                };
                if matches!(function.ty.return_type, Type::Void) {
                    return Err(CarlosError::analysis(
                        "Cannot return a value from this function",
                        stmt.span,
                    ));
                }
                let span = expr.span;
                let expression = self.analyze_expression(expr)?;
                must_be_assignable(&expression, &function.ty.return_type, span)?;
                Ok(Statement::Return { expression })
            }

            StmtKind::Return(None) => {
                let Some(function) = self.context.function() else {
                    return Err(CarlosError::analysis(
                        "Return can only appear in a function",
                        stmt.span,
                    ));
                };
                if !matches!(function.ty.return_type, Type::Void) {
                    return Err(CarlosError::analysis(
                        "Something should be returned",
                        stmt.span,
                    ));
                }
                Ok(Statement::ShortReturn)
            }

            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                let test_span = test.span;
                let test = self.analyze_expression(test)?;
                must_have_boolean_type(&test, test_span)?;

                self.context.enter(None, None);
                let consequent = self.analyze_statements(consequent);
                self.context.exit();
                let consequent = consequent?;

                match alternate {
                    ElseBranch::None => Ok(Statement::ShortIf { test, consequent }),
                    ElseBranch::Block(statements) => {
                        self.context.enter(None, None);
                        let alternate = self.analyze_statements(statements);
                        self.context.exit();
                        Ok(Statement::If {
                            test,
                            consequent,
                            alternate: alternate?,
                        })
                    }
                    // A trailing `else if` shares the enclosing scope.
                    ElseBranch::If(nested) => {
                        let alternate = vec![self.analyze_statement(nested)?];
                        Ok(Statement::If {
                            test,
                            consequent,
                            alternate,
                        })
                    }
                }
            }

            StmtKind::While { test, body } => {
                let test_span = test.span;
                let test = self.analyze_expression(test)?;
                must_have_boolean_type(&test, test_span)?;
                self.context.enter(Some(true), None);
                let body = self.analyze_statements(body);
                self.context.exit();
                Ok(Statement::While { test, body: body? })
            }

            StmtKind::Repeat { count, body } => {
                let count_span = count.span;
                let count = self.analyze_expression(count)?;
                must_have_integer_type(&count, count_span)?;
                self.context.enter(Some(true), None);
                let body = self.analyze_statements(body);
                self.context.exit();
                Ok(Statement::Repeat { count, body: body? })
            }

            StmtKind::ForRange {
                iterator,
                low,
                op,
                high,
                body,
            } => {
                let low_span = low.span;
                let high_span = high.span;
                let low = self.analyze_expression(low)?;
                must_have_integer_type(&low, low_span)?;
                let high = self.analyze_expression(high)?;
                must_have_integer_type(&high, high_span)?;

                let variable = Rc::new(Variable::new(&iterator.name, true, Type::Int));
                self.context.enter(Some(true), None);
                let body = self
                    .context
                    .add(&iterator.name, Entity::Variable(variable.clone()), iterator.span)
                    .and_then(|()| self.analyze_statements(body));
                self.context.exit();

                Ok(Statement::ForRange {
                    iterator: variable,
                    low,
                    op: *op,
                    high,
                    body: body?,
                })
            }

            StmtKind::ForEach {
                iterator,
                collection,
                body,
            } => {
                let collection_span = collection.span;
                let collection = self.analyze_expression(collection)?;
                let element = array_base(&collection, collection_span)?;

                let variable = Rc::new(Variable::new(&iterator.name, true, element));
                self.context.enter(Some(true), None);
                let body = self
                    .context
                    .add(&iterator.name, Entity::Variable(variable.clone()), iterator.span)
                    .and_then(|()| self.analyze_statements(body));
                self.context.exit();

                Ok(Statement::ForEach {
                    iterator: variable,
                    collection,
                    body: body?,
                })
            }
        }
    }

    // ==================== Types ====================

    /// Resolve a type expression to a type
    fn resolve_type(&mut self, ty: &parser::TypeExpr) -> CarlosResult<Type> {
        match &ty.kind {
            TypeExprKind::Named(ident) => {
                let entity = self.context.lookup(&ident.name, ident.span)?;
                match entity {
                    Entity::Type(t) => Ok(t),
                    _ => Err(CarlosError::analysis("Type expected", ident.span)),
                }
            }
            TypeExprKind::Optional(inner) => Ok(Type::optional(self.resolve_type(inner)?)),
            TypeExprKind::Array(inner) => Ok(Type::array(self.resolve_type(inner)?)),
            TypeExprKind::Function {
                param_types,
                return_type,
            } => {
                let param_types = param_types
                    .iter()
                    .map(|t| self.resolve_type(t))
                    .collect::<CarlosResult<Vec<_>>>()?;
                let return_type = self.resolve_type(return_type)?;
                Ok(Type::function(param_types, return_type))
            }
        }
    }

    // ==================== Expressions ====================

    fn analyze_expression(&mut self, expr: &parser::Expr) -> CarlosResult<Expression> {
        match &expr.kind {
            ExprKind::Integer(n) => Ok(Expression::IntLiteral(*n)),
            ExprKind::Float(x) => Ok(Expression::FloatLiteral(*x)),
            ExprKind::String(s) => Ok(Expression::StringLiteral(s.clone())),
            ExprKind::Bool(b) => Ok(Expression::BooleanLiteral(*b)),

            ExprKind::Id(ident) => {
                let entity = self.context.lookup(&ident.name, ident.span)?;
                Ok(match entity {
                    Entity::Variable(v) => Expression::Variable(v),
                    Entity::Function(f) => Expression::Function(f),
                    Entity::Type(t) => Expression::TypeRef(t),
                })
            }

            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let test_span = test.span;
                let test = self.analyze_expression(test)?;
                must_have_boolean_type(&test, test_span)?;
                let consequent = self.analyze_expression(consequent)?;
                let alternate = self.analyze_expression(alternate)?;
                must_both_have_same_type(&consequent, &alternate, expr.span)?;
                let ty = consequent.ty();
                Ok(Expression::Conditional {
                    test: Box::new(test),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                    ty,
                })
            }

            ExprKind::Binary { op, left, right } => {
                let left_span = left.span;
                let right_span = right.span;
                let left = self.analyze_expression(left)?;
                let right = self.analyze_expression(right)?;

                let ty = match op {
                    BinaryOp::UnwrapElse => {
                        let base = optional_base(&left, left_span)?;
                        must_be_assignable(&right, &base, right_span)?;
                        left.ty()
                    }
                    BinaryOp::Or | BinaryOp::And => {
                        must_have_boolean_type(&left, left_span)?;
                        must_have_boolean_type(&right, right_span)?;
                        Type::Boolean
                    }
                    BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::BitAnd => {
                        must_have_integer_type(&left, left_span)?;
                        must_have_integer_type(&right, right_span)?;
                        Type::Int
                    }
                    BinaryOp::Shl | BinaryOp::Shr => {
                        must_have_integer_type(&left, left_span)?;
                        must_have_integer_type(&right, right_span)?;
                        Type::Int
                    }
                    BinaryOp::Add => {
                        must_have_numeric_or_string_type(&left, left_span)?;
                        must_both_have_same_type(&left, &right, expr.span)?;
                        left.ty()
                    }
                    BinaryOp::Sub
                    | BinaryOp::Mul
                    | BinaryOp::Div
                    | BinaryOp::Rem
                    | BinaryOp::Pow => {
                        must_have_numeric_type(&left, left_span)?;
                        must_both_have_same_type(&left, &right, expr.span)?;
                        left.ty()
                    }
                    BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                        must_have_numeric_or_string_type(&left, left_span)?;
                        must_both_have_same_type(&left, &right, expr.span)?;
                        Type::Boolean
                    }
                    BinaryOp::Eq | BinaryOp::Ne => {
                        must_both_have_same_type(&left, &right, expr.span)?;
                        Type::Boolean
                    }
                };

                Ok(Expression::Binary {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                    ty,
                })
            }

            ExprKind::Unary { op, operand } => {
                let operand_span = operand.span;
                let operand = self.analyze_expression(operand)?;
                let ty = match op {
                    UnaryOp::Neg => {
                        must_have_numeric_type(&operand, operand_span)?;
                        operand.ty()
                    }
                    UnaryOp::Not => {
                        must_have_boolean_type(&operand, operand_span)?;
                        Type::Boolean
                    }
                    UnaryOp::Len => {
                        array_base(&operand, operand_span)?;
                        Type::Int
                    }
                    UnaryOp::Some => Type::optional(operand.ty()),
                    UnaryOp::Random => array_base(&operand, operand_span)?,
                };
                Ok(Expression::Unary {
                    op: *op,
                    operand: Box::new(operand),
                    ty,
                })
            }

            ExprKind::EmptyOptional(ty) => {
                let base = self.resolve_type(ty)?;
                Ok(Expression::EmptyOptional { base })
            }

            ExprKind::EmptyArray(ty) => {
                let element = self.resolve_type(ty)?;
                Ok(Expression::EmptyArray { element })
            }

            ExprKind::ArrayLit(elements) => {
                let elements = elements
                    .iter()
                    .map(|e| self.analyze_expression(e))
                    .collect::<CarlosResult<Vec<_>>>()?;
                must_all_have_same_type(&elements, expr.span)?;
                let ty = Type::array(elements[0].ty());
                Ok(Expression::ArrayLiteral { elements, ty })
            }

            ExprKind::Subscript { array, index } => {
                let array_span = array.span;
                let index_span = index.span;
                let array = self.analyze_expression(array)?;
                let ty = array_base(&array, array_span)?;
                let index = self.analyze_expression(index)?;
                must_have_integer_type(&index, index_span)?;
                Ok(Expression::Subscript {
                    array: Box::new(array),
                    index: Box::new(index),
                    ty,
                })
            }

            ExprKind::Member {
                object,
                field,
                optional_chain,
            } => {
                let object_span = object.span;
                let object = self.analyze_expression(object)?;
                let struct_type = if *optional_chain {
                    optional_struct_of(&object, object_span)?
                } else {
                    struct_of(&object, object_span)?
                };
                let Some(member) = struct_type.field(&field.name) else {
                    return Err(CarlosError::analysis("No such field", field.span));
                };
                let ty = if *optional_chain {
                    Type::optional(member.ty)
                } else {
                    member.ty
                };
                Ok(Expression::Member {
                    object: Box::new(object),
                    field: field.name.clone(),
                    optional_chain: *optional_chain,
                    ty,
                })
            }

            ExprKind::Call { callee, args } => {
                let callee_span = callee.span;
                let callee = self.analyze_expression(callee)?;

                // A struct name in callee position is a constructor call.
                if let Expression::TypeRef(Type::Struct(struct_type)) = &callee {
                    let fields = struct_type.fields.borrow().clone();
                    if args.len() != fields.len() {
                        return Err(CarlosError::analysis(
                            format!(
                                "{} argument(s) required but {} passed",
                                fields.len(),
                                args.len()
                            ),
                            expr.span,
                        ));
                    }
                    let mut analyzed = Vec::new();
                    for (arg, field) in args.iter().zip(fields.iter()) {
                        let span = arg.span;
                        let arg = self.analyze_expression(arg)?;
                        must_be_assignable(&arg, &field.ty, span)?;
                        analyzed.push(arg);
                    }
                    return Ok(Expression::ConstructorCall {
                        struct_type: struct_type.clone(),
                        args: analyzed,
                    });
                }

                let Type::Function(function_type) = callee.ty() else {
                    return Err(CarlosError::analysis(
                        "Call of non-function or non-constructor",
                        callee_span,
                    ));
                };
                if args.len() != function_type.param_types.len() {
                    return Err(CarlosError::analysis(
                        format!(
                            "{} argument(s) required but {} passed",
                            function_type.param_types.len(),
                            args.len()
                        ),
                        expr.span,
                    ));
                }
                let mut analyzed = Vec::new();
                for (arg, param_type) in args.iter().zip(function_type.param_types.iter()) {
                    let span = arg.span;
                    let arg = self.analyze_expression(arg)?;
                    must_be_assignable(&arg, param_type, span)?;
                    analyzed.push(arg);
                }
                Ok(Expression::FunctionCall {
                    callee: Box::new(callee),
                    args: analyzed,
                    ty: function_type.return_type.clone(),
                })
            }
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

// ==================== Checks ====================

fn must_have_numeric_type(e: &Expression, span: SourceSpan) -> CarlosResult<()> {
    if e.ty().is_numeric() {
        Ok(())
    } else {
        Err(CarlosError::analysis("Number expected", span))
    }
}

fn must_have_numeric_or_string_type(e: &Expression, span: SourceSpan) -> CarlosResult<()> {
    if e.ty().is_numeric_or_string() {
        Ok(())
    } else {
        Err(CarlosError::analysis("Number or string expected", span))
    }
}

fn must_have_boolean_type(e: &Expression, span: SourceSpan) -> CarlosResult<()> {
    if matches!(e.ty(), Type::Boolean) {
        Ok(())
    } else {
        Err(CarlosError::analysis("Boolean expected", span))
    }
}

fn must_have_integer_type(e: &Expression, span: SourceSpan) -> CarlosResult<()> {
    if matches!(e.ty(), Type::Int) {
        Ok(())
    } else {
        Err(CarlosError::analysis("Integer expected", span))
    }
}

/// Require an array type and return its element type
fn array_base(e: &Expression, span: SourceSpan) -> CarlosResult<Type> {
    match e.ty() {
        Type::Array(base) => Ok(*base),
        _ => Err(CarlosError::analysis("Array expected", span)),
    }
}

/// Require an optional type and return its base type
fn optional_base(e: &Expression, span: SourceSpan) -> CarlosResult<Type> {
    match e.ty() {
        Type::Optional(base) => Ok(*base),
        _ => Err(CarlosError::analysis("Optional expected", span)),
    }
}

/// Require a struct type and return it
fn struct_of(e: &Expression, span: SourceSpan) -> CarlosResult<Rc<StructType>> {
    match e.ty() {
        Type::Struct(s) => Ok(s),
        _ => Err(CarlosError::analysis("Struct expected", span)),
    }
}

/// Require an optional-of-struct type and return the struct
fn optional_struct_of(e: &Expression, span: SourceSpan) -> CarlosResult<Rc<StructType>> {
    if let Type::Optional(base) = e.ty() {
        if let Type::Struct(s) = *base {
            return Ok(s);
        }
    }
    Err(CarlosError::analysis("Optional struct expected", span))
}

fn must_both_have_same_type(a: &Expression, b: &Expression, span: SourceSpan) -> CarlosResult<()> {
    if a.ty().is_equivalent_to(&b.ty()) {
        Ok(())
    } else {
        Err(CarlosError::analysis(
            "Operands do not have the same type",
            span,
        ))
    }
}

fn must_all_have_same_type(elements: &[Expression], span: SourceSpan) -> CarlosResult<()> {
    let first = elements[0].ty();
    if elements[1..].iter().all(|e| e.ty().is_equivalent_to(&first)) {
        Ok(())
    } else {
        Err(CarlosError::analysis(
            "Not all elements have the same type",
            span,
        ))
    }
}

fn must_be_assignable(e: &Expression, target: &Type, span: SourceSpan) -> CarlosResult<()> {
    let source = e.ty();
    if source.is_assignable_to(target) {
        Ok(())
    } else {
        Err(CarlosError::analysis(
            format!(
                "Cannot assign a {} to a {}",
                source.description(),
                target.description()
            ),
            span,
        ))
    }
}

fn must_not_be_read_only(target: &Expression, span: SourceSpan) -> CarlosResult<()> {
    if let Expression::Variable(v) = target {
        if v.read_only {
            return Err(CarlosError::analysis(
                format!("Cannot assign to constant {}", v.name),
                span,
            ));
        }
    }
    Ok(())
}

fn must_have_distinct_fields(struct_type: &StructType, span: SourceSpan) -> CarlosResult<()> {
    let fields = struct_type.fields.borrow();
    let names: HashSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    if names.len() == fields.len() {
        Ok(())
    } else {
        Err(CarlosError::analysis("Fields must be distinct", span))
    }
}

/// A struct may not contain itself directly; recursion through optional
/// or array wrappers is fine because those types are not the struct
fn must_not_be_self_containing(struct_type: &Rc<StructType>, span: SourceSpan) -> CarlosResult<()> {
    let direct = struct_type
        .fields
        .borrow()
        .iter()
        .any(|f| matches!(&f.ty, Type::Struct(s) if Rc::ptr_eq(s, struct_type)));
    if direct {
        Err(CarlosError::analysis(
            "Struct type must not be recursive",
            span,
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::parser::Parser;

    fn analyze_src(source: &str) -> CarlosResult<Program> {
        let program = Parser::new(source).parse().expect("parse failed");
        analyze(&program)
    }

    fn assert_accepts(source: &str) {
        if let Err(e) = analyze_src(source) {
            panic!("expected {:?} to analyze, got: {}", source, e.message());
        }
    }

    fn assert_rejects(source: &str, expected: &str) {
        match analyze_src(source) {
            Ok(_) => panic!("expected {:?} to be rejected", source),
            Err(e) => assert_eq!(e.message(), expected, "for source {:?}", source),
        }
    }

    #[test]
    fn test_accepts_valid_programs() {
        let programs = [
            "const x = 1; let y = \"false\";",
            "struct S {x: int} let y = S(1); print(y.x);",
            "function square(x: int): int { return x * x; } \
             function compose(): (int)->int { return square; }",
            "let a = [](of int); let b = [1]; a = b;",
            "for i in 0..<10 { print(i << 2); }",
            "for i in 5...1 { print(i); }",
            "let x = 1; x++; x--;",
            "print(1 + 2 * 3 ** 2);",
            "print(1.0 + 2.5);",
            "print(\"a\" + \"b\");",
            "print(\"a\" < \"b\");",
            "print(1 | 2 ^ 3 & 4);",
            "print(true && false || true && false);",
            "print(-1.0); print(!false); print(#[1, 2, 3]);",
            "print(some 5);",
            "print(random [1, 2, 3]);",
            "let o = some 3; print(o ?? 0);",
            "print(true ? 1 : 2);",
            "let s = [\"a\", \"b\"]; for t in s { print(t); }",
            "repeat 3 { let k = 1; print(k); }",
            "while false { break; }",
            "let a = [1, 2]; print(a[1]);",
            "function f() { return; }",
            "function f(x: float?): float? { return x ?? 3.0; }",
            "function f(x: int) { x = 2; } f(1);",
            "print(sin(π) + cos(0.0));",
            "print(hypot(3.0, 4.0));",
            "print(bytes(\"abc\")); print(codepoints(\"abc\"));",
            "struct S { z: S? } let s = S(no S);",
            "struct T { xs: [T] } let t = T([](of T));",
            "if true { print(1); } else if false { print(2); } else { print(3); }",
            "function even(n: int): boolean { return n % 2 == 0; }",
            "function f(): void { print(1); }",
            "let x = 1; function g() { print(x); }",
            "function fib(n: int): int { if n < 2 { return n; } return fib(n - 1) + fib(n - 2); }",
            // Equivalent array types compare with ==; the rule asks only
            // for operand equivalence.
            "print([1] == [1, 2]);",
            "print(no int == no int);",
        ];
        for program in programs {
            assert_accepts(program);
        }
    }

    #[test]
    fn test_rejects_invalid_programs() {
        let cases = [
            ("let x = 1; let x = 1;", "Identifier x already declared"),
            ("print(x);", "Identifier x not declared"),
            ("const x = 1; x = 2;", "Cannot assign to constant x"),
            ("let x = 1; x = true;", "Cannot assign a boolean to a int"),
            (
                "function f(x: int) {} f(1, 2);",
                "1 argument(s) required but 2 passed",
            ),
            (
                "function f(x: int) {} f();",
                "1 argument(s) required but 0 passed",
            ),
            (
                "function f(x: int, y: (boolean)->void): int { return 1; } \
                 function g(z: boolean): int { return 5; } \
                 f(2, g);",
                "Cannot assign a (boolean)->int to a (boolean)->void",
            ),
            (
                "while true { function f() { break; } }",
                "Break can only appear in a loop",
            ),
            ("print(1 ?? 2);", "Optional expected"),
            ("break;", "Break can only appear in a loop"),
            ("return;", "Return can only appear in a function"),
            ("return 1;", "Return can only appear in a function"),
            (
                "function f() { return 1; }",
                "Cannot return a value from this function",
            ),
            (
                "function f(): int { return; }",
                "Something should be returned",
            ),
            ("let x = false; x++;", "Integer expected"),
            ("repeat \"1\" {}", "Integer expected"),
            ("if 1 { print(1); }", "Boolean expected"),
            ("while 1 { print(1); }", "Boolean expected"),
            ("for i in 1..<true { print(i); }", "Integer expected"),
            ("for i in 100 { print(i); }", "Array expected"),
            ("print(false || 1);", "Boolean expected"),
            ("print(false + 1);", "Number or string expected"),
            ("print(false - 1);", "Number expected"),
            ("print(false ** 1);", "Number expected"),
            ("print(false < 1);", "Number or string expected"),
            ("print(1 + 1.0);", "Operands do not have the same type"),
            ("print(2 == 2.0);", "Operands do not have the same type"),
            ("print(true ? 1 : 2.0);", "Operands do not have the same type"),
            ("print(1 ? 1 : 2);", "Boolean expected"),
            ("print(-true);", "Number expected"),
            ("print(!\"hello\");", "Boolean expected"),
            ("print(#false);", "Array expected"),
            ("print(random 3);", "Array expected"),
            ("let a = [1]; print(a[false]);", "Integer expected"),
            ("let a = 1; print(a[0]);", "Array expected"),
            ("print([3, 3.0]);", "Not all elements have the same type"),
            (
                "let o = some 2; print(o ?? 3.0);",
                "Cannot assign a float to a int",
            ),
            (
                "let x = 1; while true { let x = 1; }",
                "Identifier x already declared",
            ),
            ("let π = 3;", "Identifier π already declared"),
            ("let print = 1;", "Identifier print already declared"),
            ("let x = 1; print(x());", "Call of non-function or non-constructor"),
            ("print(sin(true));", "Cannot assign a boolean to a float"),
            ("let x = 1; function f(y: x) {}", "Type expected"),
            ("let x = 1; function f(): x { return 1; }", "Type expected"),
            ("let x = 1; struct S { y: x }", "Type expected"),
            ("function f(y: Q) {}", "Identifier Q not declared"),
            ("struct S { x: boolean x: int }", "Fields must be distinct"),
            ("struct S { s: S }", "Struct type must not be recursive"),
            ("struct S { x: int } let y = S(1); print(y.z);", "No such field"),
            ("let x = 1; print(x.f);", "Struct expected"),
            (
                "struct S { x: int } let y = S(1); print(y?.x);",
                "Optional struct expected",
            ),
            (
                "struct S { x: int } let y = S(true);",
                "Cannot assign a boolean to a int",
            ),
            (
                "struct S { x: int } let y = S(1, 2);",
                "1 argument(s) required but 2 passed",
            ),
            (
                "let a = [](of int); let b = [](of float); a = b;",
                "Cannot assign a [float] to a [int]",
            ),
            // Arrays and optionals are invariant even though int flows
            // into int?.
            (
                "let a = [1]; let b = [some 1]; a = b;",
                "Cannot assign a [int?] to a [int]",
            ),
        ];
        for (source, expected) in cases {
            assert_rejects(source, expected);
        }
    }

    #[test]
    fn test_declaration_types_and_mutability() {
        let program = analyze_src("const x = 1; let y = \"false\";").unwrap();
        let Statement::VariableDeclaration { variable, .. } = &program.statements[0] else {
            panic!("expected declaration");
        };
        assert!(variable.read_only);
        assert_eq!(variable.ty.description(), "int");
        let Statement::VariableDeclaration { variable, .. } = &program.statements[1] else {
            panic!("expected declaration");
        };
        assert!(!variable.read_only);
        assert_eq!(variable.ty.description(), "string");
    }

    #[test]
    fn test_identifiers_resolve_to_their_declaration() {
        let program = analyze_src("let x = 1; print(x);").unwrap();
        let Statement::VariableDeclaration { variable, .. } = &program.statements[0] else {
            panic!("expected declaration");
        };
        let Statement::Call(Expression::FunctionCall { args, .. }) = &program.statements[1] else {
            panic!("expected call statement");
        };
        let Expression::Variable(used) = &args[0] else {
            panic!("expected resolved variable reference");
        };
        assert!(Rc::ptr_eq(variable, used));
    }

    #[test]
    fn test_constructor_call_shape() {
        let program = analyze_src("struct S { x: int } let y = S(1); print(y.x);").unwrap();
        let Statement::TypeDeclaration { struct_type } = &program.statements[0] else {
            panic!("expected type declaration");
        };
        assert_eq!(struct_type.field("x").unwrap().ty.description(), "int");

        let Statement::VariableDeclaration { variable, initializer } = &program.statements[1]
        else {
            panic!("expected declaration");
        };
        let Expression::ConstructorCall {
            struct_type: constructed,
            ..
        } = initializer
        else {
            panic!("expected constructor call");
        };
        assert!(Rc::ptr_eq(struct_type, constructed));
        assert_eq!(variable.ty.description(), "S");

        let Statement::Call(Expression::FunctionCall { args, .. }) = &program.statements[2] else {
            panic!("expected call statement");
        };
        assert_eq!(args[0].ty().description(), "int");
    }

    #[test]
    fn test_function_value_return_type() {
        let program = analyze_src(
            "function square(x: int): int { return x * x; } \
             function compose(): (int)->int { return square; }",
        )
        .unwrap();
        let Statement::FunctionDeclaration { function, .. } = &program.statements[1] else {
            panic!("expected function declaration");
        };
        assert_eq!(function.ty.return_type.description(), "(int)->int");
    }

    #[test]
    fn test_for_range_iterator() {
        let program = analyze_src("for i in 0..<10 { print(i << 2); }").unwrap();
        let Statement::ForRange { iterator, op, .. } = &program.statements[0] else {
            panic!("expected for-range statement");
        };
        assert!(iterator.read_only);
        assert_eq!(iterator.ty.description(), "int");
        assert_eq!(op.as_str(), "..<");
    }

    #[test]
    fn test_iterator_not_visible_outside_loop() {
        assert_rejects(
            "for i in 0..<10 { print(i); } print(i);",
            "Identifier i not declared",
        );
    }

    #[test]
    fn test_iterator_is_read_only() {
        assert_rejects(
            "for i in 0..<10 { i = 1; }",
            "Cannot assign to constant i",
        );
    }

    #[test]
    fn test_unwrap_else_stays_optional() {
        let program = analyze_src("let o = some 3; let p = o ?? 0;").unwrap();
        let Statement::VariableDeclaration { variable, initializer } = &program.statements[1]
        else {
            panic!("expected declaration");
        };
        assert_eq!(variable.ty.description(), "int?");
        let Expression::Binary { op, .. } = initializer else {
            panic!("expected binary expression");
        };
        assert_eq!(op.as_str(), "??");
    }

    #[test]
    fn test_logical_operators_fold_left() {
        let program = analyze_src("print(true && false && true);").unwrap();
        let Statement::Call(Expression::FunctionCall { args, .. }) = &program.statements[0] else {
            panic!("expected call statement");
        };
        let Expression::Binary { op, left, ty, .. } = &args[0] else {
            panic!("expected binary expression");
        };
        assert_eq!(op.as_str(), "&&");
        assert_eq!(ty.description(), "boolean");
        assert!(matches!(**left, Expression::Binary { .. }));
    }

    #[test]
    fn test_optional_chain_member_type() {
        let program =
            analyze_src("struct S { x: int } let y = some S(1); print(y?.x ?? 0);").unwrap();
        let Statement::Call(Expression::FunctionCall { args, .. }) = &program.statements[2] else {
            panic!("expected call statement");
        };
        let Expression::Binary { left, .. } = &args[0] else {
            panic!("expected binary expression");
        };
        let Expression::Member {
            optional_chain, ty, ..
        } = &**left
        else {
            panic!("expected member expression");
        };
        assert!(*optional_chain);
        assert_eq!(ty.description(), "int?");
    }

    #[test]
    fn test_string_literal_keeps_quotes() {
        let program = analyze_src("let s = \"hi\\n\";").unwrap();
        let Statement::VariableDeclaration { initializer, .. } = &program.statements[0] else {
            panic!("expected declaration");
        };
        let Expression::StringLiteral(raw) = initializer else {
            panic!("expected string literal");
        };
        assert_eq!(raw, "\"hi\\n\"");
    }

    #[test]
    fn test_else_if_shares_scope_with_else_block_scoped() {
        // The trailing if is analyzed in the enclosing scope, so a name
        // declared there still collides with the outer declaration...
        assert_rejects(
            "let x = 1; if true { print(1); } else if false { let x = 2; }",
            "Identifier x already declared",
        );
        // ...while both branch bodies get fresh scopes for fresh names.
        assert_accepts(
            "if true { let t = 1; print(t); } else { let t = 2; print(t); }",
        );
    }

    #[test]
    fn test_first_error_wins() {
        // Both the addition and the unwrap are ill-typed; the leftmost
        // failure is the one reported.
        let err = analyze_src("print((false + 1) ?? (1 ?? 2));").unwrap_err();
        assert_eq!(err.message(), "Number or string expected");
    }

    #[test]
    fn test_determinism() {
        let source = "struct S { z: S? } \
                      function f(n: int): int { return n; } \
                      let xs = [S(no S), S(some S(no S))]; \
                      for s in xs { print(s.z); }";
        let first = format!("{:?}", analyze_src(source).unwrap());
        let second = format!("{:?}", analyze_src(source).unwrap());
        assert_eq!(first, second);
    }
}
