//! Formatted terminal output for fitted models.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{FitResult, MixedEffectsResult, TuningGroupKey};
use crate::fit::TuningMetrics;
use crate::report::PointResidual;

/// Format one tuning-curve fit (parameters, diagnostics, optional metrics).
pub fn format_fit_summary(
    key: &TuningGroupKey,
    fit: &FitResult,
    metrics: Option<&TuningMetrics>,
) -> String {
    let d = &fit.diagnostics;
    let mut out = String::new();

    out.push_str(&format!("=== erf tuning fit: {key} ===\n"));
    out.push_str("Model: a*(erf(x/b) - c*erf(x/d)) + e\n");
    out.push_str(&format!("- params [a, b, c, d, e]: {}\n", fmt_vec(&fit.parameters)));
    if let Some(se) = &d.param_std_errors {
        out.push_str(&format!("- std errors            : {}\n", fmt_vec(se)));
    }
    out.push_str(&format!(
        "- SSE={:.6} RMSE={:.6} R2={}\n",
        d.sse,
        d.rmse,
        d.r_squared
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| "n/a".to_string())
    ));
    out.push_str(&format!(
        "- solver: {:?} after {} evaluations / {} steps (candidate {} of {}, {} converged)\n",
        d.termination,
        d.evaluations,
        d.iterations,
        d.chosen_candidate,
        d.candidates_tried,
        d.candidates_converged
    ));
    if let Some(m) = metrics {
        out.push_str(&format!(
            "- preferred size={:.3} peak={:.4} at-max={:.4} SI={}\n",
            m.preferred_size,
            m.peak_response,
            m.response_at_max,
            m.suppression_index
                .map(|v| format!("{v:.4}"))
                .unwrap_or_else(|| "n/a".to_string())
        ));
    }
    for w in &d.warnings {
        out.push_str(&format!("  warning: {w}\n"));
    }

    out
}

/// Format a mixed-effects fit as a coefficient table plus variance components.
pub fn format_mixed_summary(result: &MixedEffectsResult) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "=== Linear mixed model ({}) ===\n",
        result.method.display_name()
    ));
    out.push_str(&format!(
        "Observations: {} | groups (mouse:field_of_view): {} | reference: {}\n",
        result.n_obs, result.n_groups, result.reference_level
    ));
    out.push_str(&format!(
        "logLik={:.4} AIC={:.4} BIC={:.4}\n\n",
        result.log_likelihood, result.aic, result.bic
    ));

    out.push_str(
        format!(
            "{:<32} {:>12} {:>12} {:>10} {:>12}\n",
            "term", "estimate", "std.error", "z", "p"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<32} {:-<12} {:-<12} {:-<10} {:-<12}\n",
            "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');
    for fe in &result.fixed_effects {
        let stars = if fe.significant { " *" } else { "" };
        out.push_str(&format!(
            "{:<32} {:>12.6} {:>12.6} {:>10.3} {:>12.4e}{stars}\n",
            truncate(&fe.name, 32),
            fe.estimate,
            fe.std_error,
            fe.z_value,
            fe.p_value
        ));
    }

    out.push_str("\nVariance components:\n");
    out.push_str(&format!(
        "- mouse:field_of_view (Intercept): {:.6} (sd {:.6})\n",
        result.random_effect_variance,
        result.random_effect_variance.sqrt()
    ));
    out.push_str(&format!(
        "- residual                       : {:.6} (sd {:.6})\n",
        result.residual_variance,
        result.residual_variance.sqrt()
    ));
    for w in &result.warnings {
        out.push_str(&format!("  warning: {w}\n"));
    }

    out
}

/// Format per-point residuals of a tuning fit.
pub fn format_residual_table(rows: &[PointResidual]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>10} {:>12} {:>12} {:>12}\n",
            "size", "y_obs", "y_fit", "residual"
        )
        .trim_end(),
    );
    out.push('\n');
    for r in rows {
        out.push_str(&format!(
            "{:>10.3} {:>12.4} {:>12.4} {:>12.4}\n",
            r.stimulus_size, r.observed, r.fitted, r.residual
        ));
    }
    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
