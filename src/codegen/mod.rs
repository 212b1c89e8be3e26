/// Code generation for HDI server stubs - C output

pub mod accessor;
pub mod c_fragments;
pub mod c_header;
pub mod c_server_stubs;
pub mod output;

pub use crate::error::CodegenError;
pub use accessor::{accessor_for, CallbackAccessor, KernelAccessor, UserAccessor};

/// Execution context the generated stub targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Mode {
    /// Privileged, in-kernel: direct calls, no remote-service objects
    Kernel,
    /// Unprivileged user-space service host
    User,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Kernel => write!(f, "kernel"),
            Mode::User => write!(f, "user"),
        }
    }
}

/// Settings fixed for a whole generation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub mode: Mode,
    /// Directory the user-mode accessor loads implementation libraries from
    pub driver_lib_dir: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            mode: Mode::User,
            driver_lib_dir: "/vendor/lib".to_string(),
        }
    }
}

impl GeneratorConfig {
    pub fn kernel() -> Self {
        Self {
            mode: Mode::Kernel,
            ..Self::default()
        }
    }
}

/// Interface name without a leading `I` marker (`ISensor` -> `Sensor`)
pub fn base_name(name: &str) -> &str {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some('I'), Some(second)) if second.is_ascii_uppercase() => &name[1..],
        _ => name,
    }
}

/// C struct tag of an interface's method table
pub fn iface_struct(name: &str) -> String {
    format!("I{}", base_name(name))
}

/// `ReadState` -> `read_state`, `HDMIPort` -> `hdmi_port`
pub fn to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_lower)
            {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

pub fn to_upper_snake(name: &str) -> String {
    to_snake(name).to_ascii_uppercase()
}

/// `SensorCallback` -> `sensorCallback`
pub fn lower_camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Local a user stub declares while decoding a callback of `interface`
pub fn remote_local(interface: &str) -> String {
    format!("{}Remote", lower_camel(base_name(interface)))
}
