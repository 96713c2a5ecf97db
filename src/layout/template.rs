//! Shape templates: patterns such as `T,B,F` or `T,B,H,W,C` that describe
//! which `(T, B, ...)` shapes a consumer accepts.

use super::LayoutError;
use std::fmt;
use std::str::FromStr;

type Result<T> = std::result::Result<T, LayoutError>;

/// `T`, `B` and one feature axis, the smallest rank of the convention.
const MIN_RANK: usize = 3;

/// One entry of a [`ShapeTemplate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dim {
    /// Sequence length, any non-zero size.
    Time,
    /// Batch size, any non-zero size.
    Batch,
    /// Exactly this size.
    Fixed(usize),
    /// Any size; the label is only used for display (`F`, `H`, `W`, ...).
    Any(char),
    /// Trailing axes of any size (`...`). Only valid last. `T,B,...` still
    /// needs at least one feature axis.
    Rest,
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Time => f.write_str("T"),
            Dim::Batch => f.write_str("B"),
            Dim::Fixed(n) => write!(f, "{}", n),
            Dim::Any(label) => write!(f, "{}", label),
            Dim::Rest => f.write_str("..."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeTemplate {
    dims: Vec<Dim>,
}

impl ShapeTemplate {
    /// Creates a template. It must start with `T, B` and describe at least
    /// one more axis; `T`, `B` and `...` may not appear anywhere else.
    pub fn new(dims: Vec<Dim>) -> Result<Self> {
        let rendered = render(&dims);
        let invalid = |reason: &str| LayoutError::InvalidTemplate {
            template: rendered.clone(),
            reason: reason.to_string(),
        };

        if dims.len() < 2 || dims[0] != Dim::Time || dims[1] != Dim::Batch {
            return Err(invalid("templates must start with T,B"));
        }
        if dims.len() < MIN_RANK {
            return Err(invalid("at least one axis must follow T,B"));
        }
        for (i, dim) in dims.iter().enumerate().skip(2) {
            match dim {
                Dim::Time | Dim::Batch => {
                    return Err(invalid("T and B may only appear as the first two axes"));
                }
                Dim::Rest if i + 1 != dims.len() => {
                    return Err(invalid("'...' must be the last entry"));
                }
                _ => {}
            }
        }

        Ok(Self { dims })
    }

    /// `T,B,F`: sequences of flat feature vectors.
    pub fn sequence() -> Self {
        Self {
            dims: vec![Dim::Time, Dim::Batch, Dim::Any('F')],
        }
    }

    /// `T,B,H,W,C`: channel-last images.
    pub fn image() -> Self {
        Self {
            dims: vec![
                Dim::Time,
                Dim::Batch,
                Dim::Any('H'),
                Dim::Any('W'),
                Dim::Any('C'),
            ],
        }
    }

    /// `T,B,...`: anything following the convention.
    pub fn any() -> Self {
        Self {
            dims: vec![Dim::Time, Dim::Batch, Dim::Rest],
        }
    }

    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    /// The exact rank this template accepts, `None` if it ends in `...`.
    pub fn fixed_rank(&self) -> Option<usize> {
        match self.dims.last() {
            Some(Dim::Rest) => None,
            _ => Some(self.dims.len()),
        }
    }

    pub fn matches(&self, shape: &[usize]) -> bool {
        let (dims, open) = match self.dims.split_last() {
            Some((Dim::Rest, head)) => (head, true),
            _ => (self.dims.as_slice(), false),
        };

        if shape.len() < dims.len().max(MIN_RANK) || (!open && shape.len() != dims.len()) {
            return false;
        }

        dims.iter().zip(shape).all(|(dim, &size)| match dim {
            Dim::Time | Dim::Batch => size > 0,
            Dim::Fixed(n) => size == *n,
            Dim::Any(_) | Dim::Rest => true,
        })
    }

    /// Like [`matches`](Self::matches), but reports which dataset failed.
    pub fn check(&self, name: &str, shape: &[usize]) -> Result<()> {
        if self.matches(shape) {
            Ok(())
        } else {
            Err(LayoutError::TemplateMismatch {
                name: name.to_string(),
                shape: shape.to_vec(),
                template: self.to_string(),
            })
        }
    }
}

fn render(dims: &[Dim]) -> String {
    dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(",")
}

impl fmt::Display for ShapeTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.dims))
    }
}

impl FromStr for ShapeTemplate {
    type Err = LayoutError;

    /// Parses comma separated entries: `T`, `B`, `...`, a number, or a
    /// single letter for a free axis. Whitespace and surrounding parentheses
    /// are ignored.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('(').trim_end_matches(')');
        let mut dims = Vec::new();

        for token in trimmed.split(',').map(str::trim) {
            let dim = match token {
                "T" => Dim::Time,
                "B" => Dim::Batch,
                "..." => Dim::Rest,
                t if !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()) => {
                    let n = t.parse().map_err(|_| LayoutError::InvalidTemplate {
                        template: s.to_string(),
                        reason: format!("axis size '{}' is out of range", t),
                    })?;
                    Dim::Fixed(n)
                }
                t if t.chars().count() == 1 && t.chars().all(|c| c.is_ascii_alphabetic()) => {
                    // Checked above: exactly one character.
                    Dim::Any(t.chars().next().unwrap_or('_'))
                }
                t => {
                    return Err(LayoutError::InvalidTemplate {
                        template: s.to_string(),
                        reason: format!("unrecognized entry '{}'", t),
                    })
                }
            };
            dims.push(dim);
        }

        Self::new(dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::TensorLayout;

    #[test]
    fn test_parse_and_display() {
        let t: ShapeTemplate = "T, B, H, W, C".parse().unwrap();
        assert_eq!(t, ShapeTemplate::image());
        assert_eq!(t.to_string(), "T,B,H,W,C");

        let t: ShapeTemplate = "(T,B,784)".parse().unwrap();
        assert_eq!(t.dims()[2], Dim::Fixed(784));
        assert_eq!(t.fixed_rank(), Some(3));

        let t: ShapeTemplate = "T,B,...".parse().unwrap();
        assert_eq!(t, ShapeTemplate::any());
        assert_eq!(t.fixed_rank(), None);
    }

    #[test]
    fn test_invalid_templates() {
        assert!("B,T,F".parse::<ShapeTemplate>().is_err());
        assert!("T,B,...,F".parse::<ShapeTemplate>().is_err());
        assert!("T,B,T".parse::<ShapeTemplate>().is_err());
        assert!("T,B,feature".parse::<ShapeTemplate>().is_err());
        assert!("T".parse::<ShapeTemplate>().is_err());
        assert!("T,B".parse::<ShapeTemplate>().is_err());
    }

    #[test]
    fn test_any_agrees_with_layout() {
        let any = ShapeTemplate::any();
        for shape in [&[3usize, 2][..], &[3, 2, 1], &[1, 4, 5, 5, 3], &[0, 2, 1]] {
            assert_eq!(any.matches(shape), TensorLayout::from_shape(shape).is_ok());
        }
    }

    #[test]
    fn test_matches() {
        let seq = ShapeTemplate::sequence();
        assert!(seq.matches(&[4, 5, 3]));
        assert!(!seq.matches(&[4, 5, 3, 1]));
        assert!(!seq.matches(&[0, 5, 3]));

        let mnist: ShapeTemplate = "T,B,784".parse().unwrap();
        assert!(mnist.matches(&[1, 60000, 784]));
        assert!(!mnist.matches(&[1, 60000, 783]));

        let any = ShapeTemplate::any();
        assert!(!any.matches(&[1, 2]));
        assert!(any.matches(&[1, 2, 1]));
        assert!(any.matches(&[1, 50000, 32, 32, 3]));
    }

    #[test]
    fn test_check_reports_name() {
        let err = ShapeTemplate::image().check("images", &[1, 2, 3]).unwrap_err();
        match err {
            LayoutError::TemplateMismatch { name, template, .. } => {
                assert_eq!(name, "images");
                assert_eq!(template, "T,B,H,W,C");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
