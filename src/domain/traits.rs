// ============================================================
// Domain — Core Traits
// ============================================================
// Framework-free abstractions. The Burn-facing trait for
// models (ModelNode) lives next to the model in nodes::model,
// since it cannot be expressed without Burn types.

/// A configuration-holding wrapper around one component of a
/// training loop: a data source, a model, a loss or an optimizer.
pub trait Node {
    /// The name the node was configured with (e.g. "Adam", "IrisNet").
    fn name(&self) -> &str;

    /// Which slot of the exec this node fills.
    fn kind(&self) -> NodeKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Data,
    Model,
    Loss,
    Optimizer,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Model => "model",
            Self::Loss => "loss",
            Self::Optimizer => "optimizer",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts a CamelCase node name to the snake_case used for file
/// names: `LeNet5` → `le_net5`, `MyMLPModel` → `my_mlp_model`.
pub fn underscore(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' {
            out.push('_');
            continue;
        }
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}
