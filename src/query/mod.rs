//! Query construction for workboard requests: filter compilation and
//! count/data query assembly. Everything here is pure string + parameter
//! building; execution lives in the workboard service.

pub mod assembler;
pub mod compiler;

use serde_json::Value;

/// A predicate or query fragment plus its bound parameters. Positional
/// placeholders are numbered globally across the final query, so builders
/// thread a starting index through every fragment they produce.
#[derive(Debug, Clone, Default)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlFragment {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self { sql: sql.into(), params }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Allocates positional parameter placeholders and collects their values.
#[derive(Debug)]
pub struct ParamBinder {
    params: Vec<Value>,
    index: usize,
}

impl ParamBinder {
    pub fn new(starting_index: usize) -> Self {
        Self { params: vec![], index: starting_index }
    }

    /// Bind one value, returning its `$N` placeholder.
    pub fn push(&mut self, value: Value) -> String {
        self.params.push(value);
        self.index += 1;
        format!("${}", self.index)
    }

    pub fn into_params(self) -> Vec<Value> {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn binder_numbers_from_starting_index() {
        let mut binder = ParamBinder::new(2);
        assert_eq!(binder.push(json!("a")), "$3");
        assert_eq!(binder.push(json!(1)), "$4");
        assert_eq!(binder.into_params(), vec![json!("a"), json!(1)]);
    }
}
