//! Design construction for `response ~ factor + (1 | outer:inner)`.
//!
//! - the fixed factor is treatment-coded: intercept plus one indicator column
//!   per non-reference level
//! - random-intercept groups are the distinct `(outer, inner)` pairs, i.e.
//!   (mouse, field of view); an inner id reused under a second outer id breaks
//!   the nesting and is rejected
//!
//! Levels and groups are kept in sorted order so the design, and therefore the
//! fit, does not depend on row order.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};

use crate::error::AnalysisError;

/// One random-intercept group and the rows that belong to it.
#[derive(Debug, Clone)]
pub struct Group {
    pub outer: String,
    pub inner: String,
    pub rows: Vec<usize>,
}

/// Treatment-coded fixed factor.
#[derive(Debug, Clone)]
pub struct Factor {
    /// Reference level first, then the remaining levels in sorted order.
    pub levels: Vec<String>,
    /// Level index per row.
    pub codes: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct MixedDesign {
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
    pub column_names: Vec<String>,
    pub groups: Vec<Group>,
    pub factor: Factor,
}

impl MixedDesign {
    pub fn n_obs(&self) -> usize {
        self.y.len()
    }

    pub fn n_fixed(&self) -> usize {
        self.x.ncols()
    }

    /// Same response and groups with the fixed factor dropped.
    pub fn intercept_only(&self) -> MixedDesign {
        MixedDesign {
            x: DMatrix::from_element(self.n_obs(), 1, 1.0),
            y: self.y.clone(),
            column_names: vec![INTERCEPT.to_string()],
            groups: self.groups.clone(),
            factor: self.factor.clone(),
        }
    }
}

pub const INTERCEPT: &str = "(Intercept)";

pub fn encode_factor<S: AsRef<str>>(
    values: &[S],
    reference: Option<&str>,
) -> Result<Factor, AnalysisError> {
    let mut levels: Vec<String> = values.iter().map(|v| v.as_ref().to_string()).collect();
    levels.sort();
    levels.dedup();

    if let Some(reference) = reference {
        let Some(pos) = levels.iter().position(|l| l == reference) else {
            return Err(AnalysisError::InvalidConfig(format!(
                "reference level '{reference}' is not among the observed levels {levels:?}"
            )));
        };
        let level = levels.remove(pos);
        levels.insert(0, level);
    }

    let index: BTreeMap<&str, usize> = levels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();
    let codes = values.iter().map(|v| index[v.as_ref()]).collect();

    Ok(Factor { levels, codes })
}

/// Check that every inner id belongs to exactly one outer id.
pub fn validate_nesting<S: AsRef<str>>(outer: &[S], inner: &[S]) -> Result<(), AnalysisError> {
    let mut owner: BTreeMap<&str, &str> = BTreeMap::new();
    for (o, i) in outer.iter().zip(inner.iter()) {
        let (o, i) = (o.as_ref(), i.as_ref());
        match owner.get(i) {
            Some(&first) if first != o => {
                return Err(AnalysisError::InvalidGrouping {
                    field_of_view: i.to_string(),
                    first_mouse: first.to_string(),
                    second_mouse: o.to_string(),
                });
            }
            Some(_) => {}
            None => {
                owner.insert(i, o);
            }
        }
    }
    Ok(())
}

pub fn build_design<S: AsRef<str>>(
    response: &[f64],
    fixed: &[S],
    outer: &[S],
    inner: &[S],
    factor_name: &str,
    reference: Option<&str>,
) -> Result<MixedDesign, AnalysisError> {
    let n = response.len();
    for (what, len) in [
        ("fixed factor", fixed.len()),
        ("outer grouping factor", outer.len()),
        ("inner grouping factor", inner.len()),
    ] {
        if len != n {
            return Err(AnalysisError::LengthMismatch {
                what,
                expected: n,
                got: len,
            });
        }
    }
    if n == 0 {
        return Err(AnalysisError::InsufficientData { needed: 1, got: 0 });
    }
    if let Some(i) = response.iter().position(|v| !v.is_finite()) {
        return Err(AnalysisError::NonFiniteInput(format!(
            "response at row {i} is {}",
            response[i]
        )));
    }

    validate_nesting(outer, inner)?;

    let factor = encode_factor(fixed, reference)?;
    if factor.levels.len() < 2 {
        return Err(AnalysisError::SingularFit(format!(
            "fixed factor '{factor_name}' has a single observed level {:?}; its effect is not estimable",
            factor.levels
        )));
    }

    let mut by_group: BTreeMap<(&str, &str), Vec<usize>> = BTreeMap::new();
    for (row, (o, i)) in outer.iter().zip(inner.iter()).enumerate() {
        by_group.entry((o.as_ref(), i.as_ref())).or_default().push(row);
    }
    let groups: Vec<Group> = by_group
        .into_iter()
        .map(|((o, i), rows)| Group {
            outer: o.to_string(),
            inner: i.to_string(),
            rows,
        })
        .collect();

    if groups.len() < 2 {
        return Err(AnalysisError::SingularFit(format!(
            "random intercept needs at least 2 mouse:field_of_view groups, found {}",
            groups.len()
        )));
    }
    if groups.len() == n {
        return Err(AnalysisError::SingularFit(format!(
            "every one of the {n} groups has a single observation; the random intercept is confounded with the residual"
        )));
    }

    let p = factor.levels.len();
    if n <= p {
        return Err(AnalysisError::SingularFit(format!(
            "{n} observations cannot support {p} fixed-effect coefficients plus variance components"
        )));
    }

    let mut x = DMatrix::<f64>::zeros(n, p);
    for (row, &code) in factor.codes.iter().enumerate() {
        x[(row, 0)] = 1.0;
        if code > 0 {
            x[(row, code)] = 1.0;
        }
    }

    let mut column_names = vec![INTERCEPT.to_string()];
    for level in &factor.levels[1..] {
        column_names.push(format!("{factor_name}[{level}]"));
    }

    Ok(MixedDesign {
        x,
        y: DVector::from_column_slice(response),
        column_names,
        groups,
        factor,
    })
}
