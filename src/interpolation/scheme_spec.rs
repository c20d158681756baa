//! Parsed scheme selections such as `"Gauss linearUpwind grad(U)"`.

use std::fmt;

use crate::error::{FvError, Result};

/// A scheme name followed by its whitespace-separated arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemeSpec {
    name: String,
    args: Vec<String>,
}

impl SchemeSpec {
    /// Split a selection into name and arguments.
    pub fn parse(selection: &str) -> Result<Self> {
        let mut tokens = selection.split_whitespace().map(str::to_string);
        let name = tokens
            .next()
            .ok_or_else(|| FvError::InvalidConfig("empty scheme selection".into()))?;
        Ok(Self {
            name,
            args: tokens.collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn arg(&self, i: usize) -> Option<&str> {
        self.args.get(i).map(String::as_str)
    }

    /// Argument `i` as a number.
    pub fn scalar_arg(&self, i: usize, what: &str) -> Result<f64> {
        let token = self.arg(i).ok_or_else(|| {
            FvError::InvalidConfig(format!("scheme '{}' needs a {what}", self.name))
        })?;
        token.parse().map_err(|_| {
            FvError::InvalidConfig(format!(
                "scheme '{}': {what} '{token}' is not a number",
                self.name
            ))
        })
    }

    /// The arguments as a selection of their own (`"Gauss linear"` -> `"linear"`).
    pub fn rest(&self) -> Result<SchemeSpec> {
        if self.args.is_empty() {
            return Err(FvError::InvalidConfig(format!(
                "scheme '{}' needs a sub-scheme",
                self.name
            )));
        }
        Ok(Self {
            name: self.args[0].clone(),
            args: self.args[1..].to_vec(),
        })
    }
}

impl fmt::Display for SchemeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for a in &self.args {
            write!(f, " {a}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_selection() {
        let spec = SchemeSpec::parse("  Gauss   linearUpwind grad(U) ").unwrap();
        assert_eq!(spec.name(), "Gauss");
        assert_eq!(spec.args(), ["linearUpwind", "grad(U)"]);
        let inner = spec.rest().unwrap();
        assert_eq!(inner.to_string(), "linearUpwind grad(U)");
        assert!(inner.rest().unwrap().rest().is_err());
    }

    #[test]
    fn test_scalar_arguments() {
        let spec = SchemeSpec::parse("limitedLinear 0.5").unwrap();
        assert_eq!(spec.scalar_arg(0, "coefficient").unwrap(), 0.5);
        assert!(spec.scalar_arg(1, "coefficient").is_err());
        assert!(SchemeSpec::parse("Gamma x").unwrap().scalar_arg(0, "k").is_err());
        assert!(SchemeSpec::parse("   ").is_err());
    }
}
