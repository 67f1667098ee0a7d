//! GROUP BY resolution

use crate::influxql::{Dimension, Expr};

use super::error::{TranslateError, TranslateResult};

/// What the GROUP BY clause asks for
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Grouping {
    /// Argument of `time(...)`, as written
    pub window: Option<String>,
    /// Tag names in clause order
    pub tags: Vec<String>,
    /// `GROUP BY *` was given
    pub wildcard: bool,
}

/// Split dimensions into the lookbehind window, plain tags and the wildcard flag
///
/// When several `time(...)` dimensions are given the last one wins.
pub fn resolve_group(dimensions: &[Dimension]) -> TranslateResult<Grouping> {
    let mut grouping = Grouping::default();

    for dim in dimensions {
        match &dim.expr {
            Expr::Call { name, args } if name == "time" => {
                let [arg] = args.as_slice() else {
                    return Err(TranslateError::Arity {
                        name: name.clone(),
                        expected: 1,
                        found: args.len(),
                    });
                };
                let window = arg.to_string();
                if window.is_empty() {
                    continue;
                }
                if let Some(previous) = grouping.window.replace(window) {
                    tracing::warn!(
                        previous = %previous,
                        window = ?grouping.window,
                        "multiple time() dimensions, using the last"
                    );
                }
            }
            Expr::VarRef(tag) => grouping.tags.push(tag.clone()),
            Expr::Wildcard => grouping.wildcard = true,
            other => return Err(TranslateError::UnsupportedDimension(other.to_string())),
        }
    }

    tracing::debug!(
        window = ?grouping.window,
        tags = ?grouping.tags,
        wildcard = grouping.wildcard,
        "resolved grouping"
    );
    Ok(grouping)
}
