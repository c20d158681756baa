//! Text form of field values.
//!
//! Scalars are printed with the shortest representation that parses back to
//! the same bits; tensor-rank values as parenthesised component lists.

use crate::boundary::PatchValue;
use crate::io::dictionary::Token;
use crate::types::FieldValue;

/// Shortest round-trip text for a scalar.
pub fn format_scalar(x: f64) -> String {
    let a = x.abs();
    if x == 0.0 || !x.is_finite() || (1e-5..1e15).contains(&a) {
        format!("{x}")
    } else {
        format!("{x:e}")
    }
}

/// Text for one value: `1.5` or `(1 0 0)`.
pub fn format_value<T: FieldValue>(v: &T) -> String {
    if T::N_COMPONENTS == 1 {
        return format_scalar(v.component(0));
    }
    let parts: Vec<String> = (0..T::N_COMPONENTS)
        .map(|c| format_scalar(v.component(c)))
        .collect();
    format!("({})", parts.join(" "))
}

/// `uniform v` when all values agree, otherwise a `nonuniform List<type>`.
pub fn format_field<T: FieldValue>(values: &[T]) -> String {
    let same_bits = |a: &T, b: &T| {
        (0..T::N_COMPONENTS).all(|c| a.component(c).to_bits() == b.component(c).to_bits())
    };
    match values.first() {
        Some(first) if values.iter().all(|v| same_bits(v, first)) => {
            format!("uniform {}", format_value(first))
        }
        _ => format_list(values),
    }
}

/// Always-explicit `nonuniform List<type> n ( ... )` form.
pub fn format_list<T: FieldValue>(values: &[T]) -> String {
    let mut out = format!("nonuniform List<{}> \n{}\n(\n", T::TYPE_NAME, values.len());
    for v in values {
        out.push_str(&format_value(v));
        out.push('\n');
    }
    out.push(')');
    out
}

/// Text for a [`PatchValue`].
pub fn format_patch_value<T: FieldValue>(value: &PatchValue<T>) -> String {
    match value {
        PatchValue::Uniform(v) => format!("uniform {}", format_value(v)),
        PatchValue::NonUniform(values) => format_list(values),
    }
}

/// Parse one value from the front of `tokens`, returning it and the tokens used.
pub fn parse_value<T: FieldValue>(tokens: &[Token]) -> Option<(T, usize)> {
    if T::N_COMPONENTS == 1 {
        let x = tokens.first()?.as_number()?;
        return Some((T::from_fn(|_| x), 1));
    }
    if !tokens.first()?.is_punct('(') {
        return None;
    }
    let mut comps = Vec::with_capacity(T::N_COMPONENTS);
    for t in tokens.iter().skip(1).take(T::N_COMPONENTS) {
        comps.push(t.as_number()?);
    }
    if comps.len() != T::N_COMPONENTS || !tokens.get(T::N_COMPONENTS + 1)?.is_punct(')') {
        return None;
    }
    Some((T::from_fn(|c| comps[c]), T::N_COMPONENTS + 2))
}

/// Parse `uniform v` or `nonuniform List<type> n ( ... )` for a patch or field of size `n`.
pub fn parse_patch_value<T: FieldValue>(
    tokens: &[Token],
    n: usize,
) -> std::result::Result<PatchValue<T>, String> {
    let kind = tokens
        .first()
        .and_then(Token::as_word)
        .ok_or_else(|| "expected 'uniform' or 'nonuniform'".to_string())?;
    match kind {
        "uniform" => {
            let (v, used) = parse_value::<T>(&tokens[1..])
                .ok_or_else(|| format!("expected a {} after 'uniform'", T::TYPE_NAME))?;
            if used + 1 != tokens.len() {
                return Err("trailing tokens after uniform value".into());
            }
            Ok(PatchValue::Uniform(v))
        }
        "nonuniform" => {
            let list_type = format!("List<{}>", T::TYPE_NAME);
            let mut rest = &tokens[1..];
            if rest.first().and_then(Token::as_word) == Some(list_type.as_str()) {
                rest = &rest[1..];
            } else {
                return Err(format!("expected '{list_type}'"));
            }
            let count = rest
                .first()
                .and_then(Token::as_number)
                .filter(|c| *c >= 0.0 && c.fract() == 0.0)
                .ok_or_else(|| "expected list size".to_string())? as usize;
            if count != n {
                return Err(format!("list has {count} entries, expected {n}"));
            }
            rest = &rest[1..];
            if !rest.first().is_some_and(|t| t.is_punct('(')) {
                return Err("expected '('".into());
            }
            rest = &rest[1..];
            let mut values = Vec::with_capacity(count);
            for i in 0..count {
                let (v, used) = parse_value::<T>(rest)
                    .ok_or_else(|| format!("bad {} at list entry {i}", T::TYPE_NAME))?;
                values.push(v);
                rest = &rest[used..];
            }
            match rest {
                [t] if t.is_punct(')') => Ok(PatchValue::NonUniform(values)),
                _ => Err("expected ')' closing the list".into()),
            }
        }
        other => Err(format!("expected 'uniform' or 'nonuniform', found '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::dictionary::tokenize;
    use crate::types::{Tensor, Vector};

    fn toks(text: &str) -> Vec<Token> {
        tokenize(text).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_scalar_text_round_trips_bits() {
        for x in [0.1, 1.0 / 3.0, -2.5e-300, 6.02214076e23, 1e-7, 123456.789, -0.0] {
            let text = format_scalar(x);
            let back: f64 = text.parse().unwrap();
            assert_eq!(back.to_bits(), x.to_bits(), "{text}");
        }
        assert_eq!(format_scalar(1.0), "1");
        assert_eq!(format_scalar(1e-7), "1e-7");
    }

    #[test]
    fn test_uniform_detection_compares_bits() {
        assert_eq!(format_field(&[0.5, 0.5]), "uniform 0.5");
        assert!(format_field(&[0.0, -0.0, 0.0]).starts_with("nonuniform List<scalar>"));
        assert!(format_field(&[f64::NAN, f64::NAN]).starts_with("uniform"));
        let v = [Vector::new(1.0, 0.0, 0.0), Vector::new(1.0, -0.0, 0.0)];
        assert!(format_field(&v).starts_with("nonuniform List<vector>"));
    }

    #[test]
    fn test_vector_value_text() {
        let v = Vector::new(1.0, -0.5, 0.0);
        assert_eq!(format_value(&v), "(1 -0.5 0)");
        let (back, used) = parse_value::<Vector>(&toks("(1 -0.5 0)")).unwrap();
        assert_eq!(back, v);
        assert_eq!(used, 5);
        assert!(parse_value::<Vector>(&toks("(1 2)")).is_none());
        assert!(parse_value::<Tensor>(&toks("(1 2 3)")).is_none());
    }

    #[test]
    fn test_list_parsing() {
        let text = format_field(&[1.0, 2.0, 3.0]);
        let parsed = parse_patch_value::<f64>(&toks(&text), 3).unwrap();
        assert_eq!(parsed, PatchValue::NonUniform(vec![1.0, 2.0, 3.0]));
        assert!(parse_patch_value::<f64>(&toks(&text), 4).is_err());
        let uni = parse_patch_value::<Vector>(&toks("uniform (0 0 1)"), 7).unwrap();
        assert_eq!(uni, PatchValue::Uniform(Vector::Z));
        assert!(parse_patch_value::<f64>(&toks("sometimes 1"), 1).is_err());
    }
}
