use serde::Deserialize;

/// What an execution backend can do with an ensemble. Checked at the top
/// of operations that depend on it instead of matching on backend names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Boolean masking and gather over whole columns.
    pub supports_masking: bool,
    /// Whether `num_active`/`num_lost` are kept up to date.
    pub has_exact_counts: bool,
}

/// The execution backend an ensemble lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Cpu,
    Cuda,
    OpenCl,
}

impl Default for Context {
    fn default() -> Self {
        Context::Cpu
    }
}

impl Context {
    pub fn capabilities(self) -> Capabilities {
        match self {
            Context::Cpu => Capabilities {
                supports_masking: true,
                has_exact_counts: true,
            },
            // device reductions are skipped, counters stay unknown
            Context::Cuda => Capabilities {
                supports_masking: true,
                has_exact_counts: false,
            },
            Context::OpenCl => Capabilities {
                supports_masking: false,
                has_exact_counts: false,
            },
        }
    }
}
