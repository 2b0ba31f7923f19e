//! Symbol resolution port: maps an input symbol to the ticker the history
//! provider understands (typically the symbol plus a venue suffix).

use crate::domain::universe::SymbolInput;

pub trait SymbolResolver: Send + Sync {
    /// `None` when the symbol cannot be resolved.
    fn resolve(&self, input: &SymbolInput) -> Option<String>;
}

/// Uses the pre-resolved fetch symbol when present, else the bare symbol.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughResolver;

impl SymbolResolver for PassthroughResolver {
    fn resolve(&self, input: &SymbolInput) -> Option<String> {
        Some(
            input
                .fetch_symbol
                .clone()
                .unwrap_or_else(|| input.symbol.clone()),
        )
    }
}
