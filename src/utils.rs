use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};

/// Render a LabelSelector in the list-selector syntax understood by the API server.
///
/// Returns `None` if the selector is empty or uses an operator we don't know, since
/// listing with an empty selector would match every pod in the namespace.
pub fn selector_string(selector: &LabelSelector) -> Option<String> {
    let mut terms = Vec::new();

    if let Some(labels) = &selector.match_labels {
        terms.extend(labels.iter().map(|(k, v)| format!("{}={}", k, v)));
    }

    if let Some(expressions) = &selector.match_expressions {
        for expr in expressions {
            terms.push(expression_string(expr)?);
        }
    }

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(","))
    }
}

fn expression_string(expr: &LabelSelectorRequirement) -> Option<String> {
    let values = || expr.values.as_deref().unwrap_or_default().join(",");
    match expr.operator.as_str() {
        "In" => Some(format!("{} in ({})", expr.key, values())),
        "NotIn" => Some(format!("{} notin ({})", expr.key, values())),
        "Exists" => Some(expr.key.clone()),
        "DoesNotExist" => Some(format!("!{}", expr.key)),
        _ => None,
    }
}
