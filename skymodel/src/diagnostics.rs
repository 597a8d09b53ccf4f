//! Non-fatal substitutions made while evaluating emission.
//!
//! Each recorded [`Diagnostic`] is also emitted through `log::warn!`, so a
//! caller that ignores the sink still sees the substitution in its logs.
//! A diagnostic already present in the sink is neither recorded nor logged
//! again.

use std::fmt;

use log::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Several frequencies were given without a bandpass profile
    TopHatBandpass { component: String, n_freqs: usize },
    /// Point sources were deposited into single pixels with no beam
    UnsmoothedPointSources { component: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::TopHatBandpass { component, n_freqs } => write!(
                f,
                "{component}: no bandpass given for {n_freqs} frequencies, assuming a top-hat profile"
            ),
            Diagnostic::UnsmoothedPointSources { component } => write!(
                f,
                "{component}: no beam FWHM given, point sources are deposited without smoothing"
            ),
        }
    }
}

/// Collects diagnostics for the caller to inspect or ignore.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if self.entries.contains(&diagnostic) {
            return;
        }
        warn!("{diagnostic}");
        self.entries.push(diagnostic);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
