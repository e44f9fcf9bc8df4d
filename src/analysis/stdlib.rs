//! Standard-library bindings for the root context
//!
//! Type names are ordinary identifiers in Carlos, so the primitives are
//! bound here alongside the built-in constants and functions. All of
//! these participate in the normal no-shadowing rule.

use std::rc::Rc;

use super::ast::{Entity, Function, Variable};
use super::types::{FunctionType, Type};

fn function(name: &str, param_types: Vec<Type>, return_type: Type) -> (String, Entity) {
    let ty = Rc::new(FunctionType::new(param_types, return_type));
    (
        name.to_string(),
        Entity::Function(Rc::new(Function::new(name, ty))),
    )
}

/// The bindings installed into the root context before analysis
pub fn standard_library() -> Vec<(String, Entity)> {
    vec![
        ("int".to_string(), Entity::Type(Type::Int)),
        ("float".to_string(), Entity::Type(Type::Float)),
        ("boolean".to_string(), Entity::Type(Type::Boolean)),
        ("string".to_string(), Entity::Type(Type::String)),
        ("void".to_string(), Entity::Type(Type::Void)),
        ("any".to_string(), Entity::Type(Type::Any)),
        (
            "π".to_string(),
            Entity::Variable(Rc::new(Variable::new("π", true, Type::Float))),
        ),
        function("print", vec![Type::Any], Type::Void),
        function("sin", vec![Type::Float], Type::Float),
        function("cos", vec![Type::Float], Type::Float),
        function("exp", vec![Type::Float], Type::Float),
        function("ln", vec![Type::Float], Type::Float),
        function("hypot", vec![Type::Float, Type::Float], Type::Float),
        function("bytes", vec![Type::String], Type::array(Type::Int)),
        function("codepoints", vec![Type::String], Type::array(Type::Int)),
    ]
}
