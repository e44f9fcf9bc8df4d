//! Type representation for semantic analysis
//!
//! These are the resolved types attached to every expression in the
//! analyzed AST. Primitives are unit variants, so there is exactly one
//! canonical value per primitive and equivalence is plain discriminant
//! equality. Struct types are nominal: two struct types are equivalent
//! only when they are the same declaration (`Rc` identity).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A resolved type
#[derive(Debug, Clone)]
pub enum Type {
    Boolean,
    Int,
    Float,
    String,
    Void,
    /// The type of entities that are themselves types (struct names
    /// referenced as values)
    Meta,
    /// Accepts any source type in assignability; used only in
    /// standard-library signatures
    Any,
    /// Array type: `[T]`
    Array(Box<Type>),
    /// Optional type: `T?`
    Optional(Box<Type>),
    /// Function type: `(T1,...,Tn)->R`
    Function(Rc<FunctionType>),
    /// Struct type, shared with the declaration that created it
    Struct(Rc<StructType>),
}

/// The type of a function: parameter types and a return type
#[derive(Debug, Clone)]
pub struct FunctionType {
    pub param_types: Vec<Type>,
    pub return_type: Type,
}

impl FunctionType {
    pub fn new(param_types: Vec<Type>, return_type: Type) -> Self {
        Self {
            param_types,
            return_type,
        }
    }
}

/// A user-declared struct type
///
/// Fields live behind a `RefCell` because a struct type is bound in scope
/// *before* its field list is resolved, so that fields may reach the
/// struct itself through optional or array wrappers.
pub struct StructType {
    pub name: String,
    pub fields: RefCell<Vec<Field>>,
}

impl StructType {
    /// Create a struct type with no fields yet (filled in after binding)
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: RefCell::new(Vec::new()),
        }
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<Field> {
        self.fields.borrow().iter().find(|f| f.name == name).cloned()
    }

    /// Number of fields
    pub fn field_count(&self) -> usize {
        self.fields.borrow().len()
    }
}

// Struct types can be recursive through optional/array wrappers, so the
// derived Debug would not terminate. Print the name and field summaries.
impl fmt::Debug for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self
            .fields
            .borrow()
            .iter()
            .map(|field| format!("{}: {}", field.name, field.ty.description()))
            .collect();
        write!(f, "StructType({} {{{}}})", self.name, fields.join(", "))
    }
}

/// A field of a struct type
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl Type {
    /// Create an array type
    pub fn array(base: Type) -> Self {
        Type::Array(Box::new(base))
    }

    /// Create an optional type
    pub fn optional(base: Type) -> Self {
        Type::Optional(Box::new(base))
    }

    /// Create a function type
    pub fn function(param_types: Vec<Type>, return_type: Type) -> Self {
        Type::Function(Rc::new(FunctionType::new(param_types, return_type)))
    }

    /// Check if this is `int` or `float`
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    /// Check if this is `int`, `float`, or `string`
    pub fn is_numeric_or_string(&self) -> bool {
        matches!(self, Type::Int | Type::Float | Type::String)
    }

    /// The textual form used in error messages
    pub fn description(&self) -> String {
        match self {
            Type::Boolean => "boolean".to_string(),
            Type::Int => "int".to_string(),
            Type::Float => "float".to_string(),
            Type::String => "string".to_string(),
            Type::Void => "void".to_string(),
            Type::Meta => "type".to_string(),
            Type::Any => "any".to_string(),
            Type::Array(base) => format!("[{}]", base.description()),
            Type::Optional(base) => format!("{}?", base.description()),
            Type::Function(f) => {
                let params: Vec<String> =
                    f.param_types.iter().map(|t| t.description()).collect();
                format!("({})->{}", params.join(","), f.return_type.description())
            }
            Type::Struct(s) => s.name.clone(),
        }
    }

    /// Structural-or-nominal type equivalence
    ///
    /// Primitives and structs are equivalent only to themselves; arrays
    /// and optionals are equivalent when their bases are; function types
    /// are structurally equivalent.
    pub fn is_equivalent_to(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Boolean, Type::Boolean)
            | (Type::Int, Type::Int)
            | (Type::Float, Type::Float)
            | (Type::String, Type::String)
            | (Type::Void, Type::Void)
            | (Type::Meta, Type::Meta)
            | (Type::Any, Type::Any) => true,
            (Type::Array(a), Type::Array(b)) => a.is_equivalent_to(b),
            (Type::Optional(a), Type::Optional(b)) => a.is_equivalent_to(b),
            (Type::Function(a), Type::Function(b)) => {
                a.param_types.len() == b.param_types.len()
                    && a.return_type.is_equivalent_to(&b.return_type)
                    && a.param_types
                        .iter()
                        .zip(b.param_types.iter())
                        .all(|(x, y)| x.is_equivalent_to(y))
            }
            (Type::Struct(a), Type::Struct(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Check if a value of this type may flow into a slot of type `target`
    ///
    /// Arrays, optionals, structs, and primitives are invariant: assignable
    /// only when equivalent. Function types are covariant in the return
    /// type and contravariant in the parameter types. The target `any`
    /// accepts every source type.
    pub fn is_assignable_to(&self, target: &Type) -> bool {
        if matches!(target, Type::Any) {
            return true;
        }
        match (self, target) {
            (Type::Function(f), Type::Function(g)) => {
                f.param_types.len() == g.param_types.len()
                    && f.return_type.is_assignable_to(&g.return_type)
                    && g.param_types
                        .iter()
                        .zip(f.param_types.iter())
                        .all(|(gp, fp)| gp.is_assignable_to(fp))
            }
            _ => self.is_equivalent_to(target),
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.is_equivalent_to(other)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptions() {
        assert_eq!(Type::Int.description(), "int");
        assert_eq!(Type::array(Type::Int).description(), "[int]");
        assert_eq!(Type::optional(Type::Float).description(), "float?");
        assert_eq!(
            Type::array(Type::optional(Type::Int)).description(),
            "[int?]"
        );
        assert_eq!(
            Type::function(vec![Type::Boolean], Type::Void).description(),
            "(boolean)->void"
        );
        assert_eq!(
            Type::function(vec![Type::Int, Type::Int], Type::Int).description(),
            "(int,int)->int"
        );
        assert_eq!(Type::Struct(Rc::new(StructType::new("S"))).description(), "S");
    }

    #[test]
    fn test_primitive_equivalence() {
        assert!(Type::Int.is_equivalent_to(&Type::Int));
        assert!(!Type::Int.is_equivalent_to(&Type::Float));
        assert!(!Type::Int.is_equivalent_to(&Type::optional(Type::Int)));
    }

    #[test]
    fn test_compound_equivalence() {
        assert!(Type::array(Type::Int).is_equivalent_to(&Type::array(Type::Int)));
        assert!(!Type::array(Type::Int).is_equivalent_to(&Type::array(Type::Float)));
        assert!(Type::optional(Type::String).is_equivalent_to(&Type::optional(Type::String)));
    }

    #[test]
    fn test_function_equivalence_is_structural() {
        let f = Type::function(vec![Type::Int], Type::Int);
        let g = Type::function(vec![Type::Int], Type::Int);
        let h = Type::function(vec![Type::Float], Type::Int);
        assert!(f.is_equivalent_to(&g));
        assert!(!f.is_equivalent_to(&h));
    }

    #[test]
    fn test_struct_equivalence_is_nominal() {
        let s = Rc::new(StructType::new("S"));
        let t = Rc::new(StructType::new("S"));
        assert!(Type::Struct(s.clone()).is_equivalent_to(&Type::Struct(s.clone())));
        // Same name, different declaration: not equivalent.
        assert!(!Type::Struct(s).is_equivalent_to(&Type::Struct(t)));
    }

    #[test]
    fn test_invariance() {
        // int is assignable to int?, but [int] is not assignable to [int?].
        assert!(!Type::Int.is_assignable_to(&Type::optional(Type::Int)));
        assert!(!Type::array(Type::Int).is_assignable_to(&Type::array(Type::optional(Type::Int))));
        assert!(!Type::optional(Type::Int).is_assignable_to(&Type::optional(Type::Float)));
    }

    #[test]
    fn test_any_accepts_everything() {
        assert!(Type::Int.is_assignable_to(&Type::Any));
        assert!(Type::array(Type::String).is_assignable_to(&Type::Any));
        assert!(Type::function(vec![], Type::Void).is_assignable_to(&Type::Any));
        // But any is not assignable to concrete types.
        assert!(!Type::Any.is_assignable_to(&Type::Int));
    }

    #[test]
    fn test_function_variance() {
        // (boolean)->int is NOT assignable to (boolean)->void: returns differ.
        let g = Type::function(vec![Type::Boolean], Type::Int);
        let expected = Type::function(vec![Type::Boolean], Type::Void);
        assert!(!g.is_assignable_to(&expected));

        // Covariant return: (int)->int assignable to (int)->any.
        let f = Type::function(vec![Type::Int], Type::Int);
        let to = Type::function(vec![Type::Int], Type::Any);
        assert!(f.is_assignable_to(&to));

        // Contravariant parameters: (any)->void assignable to (int)->void.
        let wide = Type::function(vec![Type::Any], Type::Void);
        let narrow = Type::function(vec![Type::Int], Type::Void);
        assert!(wide.is_assignable_to(&narrow));
        assert!(!narrow.is_assignable_to(&wide));
    }

    #[test]
    fn test_two_phase_struct_fields() {
        let s = Rc::new(StructType::new("Node"));
        assert_eq!(s.field_count(), 0);
        *s.fields.borrow_mut() = vec![
            Field::new("value", Type::Int),
            Field::new("next", Type::optional(Type::Struct(s.clone()))),
        ];
        assert_eq!(s.field_count(), 2);
        assert_eq!(s.field("next").unwrap().ty.description(), "Node?");
        assert!(s.field("missing").is_none());
    }
}
