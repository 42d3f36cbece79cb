//! Canonical signatures for declaration nodes.
//!
//! Every function here is total: a node of an unexpected shape still yields
//! text, never an error.

use super::{DeclNode, ParamKind, ParamNode};

/// Render one parameter the way it appears in a signature
pub fn render_parameter(param: &ParamNode) -> String {
    let prefix = match param.kind {
        ParamKind::VarPositional => "*",
        ParamKind::VarKeyword => "**",
        ParamKind::KeywordOnlyMarker | ParamKind::PositionalOnlyMarker => {
            return param.name.clone();
        }
        ParamKind::Regular => "",
    };

    let mut rendered = format!("{}{}", prefix, param.name);
    match (&param.annotation, &param.default) {
        (Some(ty), Some(default)) => {
            rendered.push_str(&format!(": {} = {}", ty, default));
        }
        (Some(ty), None) => rendered.push_str(&format!(": {}", ty)),
        (None, Some(default)) => rendered.push_str(&format!("={}", default)),
        (None, None) => {}
    }
    rendered
}

/// Arguments in declaration order, separators left out
pub fn argument_list(node: &DeclNode) -> Vec<String> {
    node.params
        .iter()
        .flatten()
        .filter(|p| !p.is_separator())
        .map(render_parameter)
        .collect()
}

/// `[async ]def name[type params](params)[ -> Return]`
pub fn function_signature(node: &DeclNode) -> String {
    let async_prefix = if node.is_async() { "async " } else { "" };
    let name = node.name.as_deref().unwrap_or_default();

    let params = node
        .params
        .iter()
        .flatten()
        .map(render_parameter)
        .collect::<Vec<_>>()
        .join(", ");

    let return_str = node
        .returns
        .as_ref()
        .map(|r| format!(" -> {}", r))
        .unwrap_or_default();

    let type_params = node.type_params.as_deref().unwrap_or_default();

    format!(
        "{}def {}{}({}){}",
        async_prefix, name, type_params, params, return_str
    )
}

/// Decorator lines followed by the class header
pub fn record_signature(node: &DeclNode) -> String {
    let mut lines: Vec<String> = node.decorators.iter().map(|d| format!("@{}", d)).collect();
    let header = if node.header_text.is_empty() {
        format!("class {}", node.name.as_deref().unwrap_or_default())
    } else {
        node.header_text.clone()
    };
    lines.push(header);
    lines.join("\n")
}
