use std::fmt;

use serde::{Deserialize, Serialize};

/// The type lattice used from normalization onward.
///
/// `Unknown` is the top element: it unifies with anything, collapsing to
/// whatever it's unified against. `Int` only unifies with itself. `Fn`
/// unifies component-wise against another `Fn` of the same arity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Unknown,
    Int,
    Fn(Box<Type>, Box<Type>),
}

impl Type {
    pub fn func(arg: Type, ret: Type) -> Type {
        Type::Fn(Box::new(arg), Box::new(ret))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    /// Unifies two types, returning the most specific type compatible with
    /// both. `Unknown` is the identity element; mismatched head symbols or
    /// arities are an error.
    pub fn unify(a: Type, b: Type) -> Result<Type, String> {
        match (a, b) {
            (Type::Unknown, other) | (other, Type::Unknown) => Ok(other),
            (Type::Int, Type::Int) => Ok(Type::Int),
            (Type::Fn(a_arg, a_ret), Type::Fn(b_arg, b_ret)) => {
                let arg = Type::unify(*a_arg, *b_arg)?;
                let ret = Type::unify(*a_ret, *b_ret)?;
                Ok(Type::func(arg, ret))
            },
            (a, b) => Err(format!("can't unify `{}` with `{}`", a, b)),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unknown => write!(f, "?"),
            Type::Int => write!(f, "Int"),
            Type::Fn(arg, ret) => write!(f, "({} -> {})", arg, ret),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_unifies_with_int() {
        assert_eq!(Type::unify(Type::Unknown, Type::Int), Ok(Type::Int));
        assert_eq!(Type::unify(Type::Int, Type::Unknown), Ok(Type::Int));
    }

    #[test]
    fn int_unifies_with_int() {
        assert_eq!(Type::unify(Type::Int, Type::Int), Ok(Type::Int));
    }

    #[test]
    fn int_does_not_unify_with_fn() {
        assert!(Type::unify(Type::Int, Type::func(Type::Int, Type::Int)).is_err());
    }

    #[test]
    fn fn_unifies_componentwise() {
        let a = Type::func(Type::Unknown, Type::Int);
        let b = Type::func(Type::Int, Type::Unknown);
        assert_eq!(Type::unify(a, b), Ok(Type::func(Type::Int, Type::Int)));
    }
}
