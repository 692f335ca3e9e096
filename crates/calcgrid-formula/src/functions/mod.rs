//! Built-in functions
//!
//! Every function here is pure: it sees only its evaluated arguments. The
//! `value()` reference reader is handled by the evaluator itself because it
//! needs its argument unevaluated.

pub mod date;
pub mod math;
pub mod text;

use crate::error::FormulaResult;
use calcgrid_core::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Function implementation signature
pub type FunctionImpl = fn(&[Value]) -> FormulaResult<Value>;

/// Function definition
pub struct FunctionDef {
    /// Function name (lowercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

/// Function registry
pub struct FunctionRegistry {
    functions: HashMap<&'static str, FunctionDef>,
}

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

/// The shared registry of built-in functions
pub fn registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        registry.register_math_functions();
        registry.register_text_functions();
        registry.register_date_functions();

        registry
    }

    /// Look up a function by name (case-sensitive)
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    /// Names of all registered functions, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    fn register_math_functions(&mut self) {
        self.register(FunctionDef {
            name: "sum",
            min_args: 0,
            max_args: None,
            implementation: math::fn_sum,
        });
        self.register(FunctionDef {
            name: "min",
            min_args: 1,
            max_args: None,
            implementation: math::fn_min,
        });
        self.register(FunctionDef {
            name: "max",
            min_args: 1,
            max_args: None,
            implementation: math::fn_max,
        });
        self.register(FunctionDef {
            name: "abs",
            min_args: 1,
            max_args: Some(1),
            implementation: math::fn_abs,
        });
        self.register(FunctionDef {
            name: "round",
            min_args: 1,
            max_args: Some(2),
            implementation: math::fn_round,
        });
        self.register(FunctionDef {
            name: "number",
            min_args: 1,
            max_args: Some(1),
            implementation: math::fn_number,
        });
    }

    fn register_text_functions(&mut self) {
        self.register(FunctionDef {
            name: "len",
            min_args: 1,
            max_args: Some(1),
            implementation: text::fn_len,
        });
        self.register(FunctionDef {
            name: "string",
            min_args: 1,
            max_args: Some(1),
            implementation: text::fn_string,
        });
    }

    fn register_date_functions(&mut self) {
        self.register(FunctionDef {
            name: "date",
            min_args: 3,
            max_args: Some(6),
            implementation: date::fn_date,
        });
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
