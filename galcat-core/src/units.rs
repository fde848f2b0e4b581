// src/units.rs
// Recognition of unit strings attached to value entries

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parsed unit: base symbols with integer powers, in the order written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    components: Vec<(String, i32)>,
}

impl Unit {
    pub fn components(&self) -> &[(String, i32)] {
        &self.components
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (symbol, power) in &self.components {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            if *power == 1 {
                write!(f, "{}", symbol)?;
            } else {
                write!(f, "{}{}", symbol, power)?;
            }
        }
        Ok(())
    }
}

/// A value with a recognized unit attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// Physical quantity kind of a base symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Angle,
    Length,
    Time,
    Mass,
    Magnitude,
    Temperature,
    Energy,
    Power,
    Frequency,
    SpectralFluxDensity,
    Luminosity,
    Dimensionless,
}

const ASTRONOMY_UNITS: &[(&str, Dimension)] = &[
    ("deg", Dimension::Angle),
    ("rad", Dimension::Angle),
    ("arcmin", Dimension::Angle),
    ("arcsec", Dimension::Angle),
    ("mas", Dimension::Angle),
    ("hourangle", Dimension::Angle),
    ("m", Dimension::Length),
    ("cm", Dimension::Length),
    ("km", Dimension::Length),
    ("AU", Dimension::Length),
    ("au", Dimension::Length),
    ("lyr", Dimension::Length),
    ("pc", Dimension::Length),
    ("kpc", Dimension::Length),
    ("Mpc", Dimension::Length),
    ("Gpc", Dimension::Length),
    ("Rsun", Dimension::Length),
    ("s", Dimension::Time),
    ("min", Dimension::Time),
    ("h", Dimension::Time),
    ("d", Dimension::Time),
    ("yr", Dimension::Time),
    ("Myr", Dimension::Time),
    ("Gyr", Dimension::Time),
    ("g", Dimension::Mass),
    ("kg", Dimension::Mass),
    ("Msun", Dimension::Mass),
    ("solMass", Dimension::Mass),
    ("mag", Dimension::Magnitude),
    ("K", Dimension::Temperature),
    ("J", Dimension::Energy),
    ("erg", Dimension::Energy),
    ("eV", Dimension::Energy),
    ("W", Dimension::Power),
    ("Hz", Dimension::Frequency),
    ("Jy", Dimension::SpectralFluxDensity),
    ("mJy", Dimension::SpectralFluxDensity),
    ("Lsun", Dimension::Luminosity),
    ("solLum", Dimension::Luminosity),
    ("dex", Dimension::Dimensionless),
    ("%", Dimension::Dimensionless),
];

/// Symbol table deciding which unit strings are recognizable.
///
/// Accepts products and quotients of known symbols with integer powers:
/// `km / s`, `km/s`, `mag arcsec-2`, `Msun pc^-3`, `erg s**-1`.
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    symbols: AHashMap<String, Dimension>,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        let symbols = ASTRONOMY_UNITS
            .iter()
            .map(|(symbol, dim)| (symbol.to_string(), *dim))
            .collect();
        UnitRegistry { symbols }
    }
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry without any symbols
    pub fn empty() -> Self {
        UnitRegistry {
            symbols: AHashMap::new(),
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>, dimension: Dimension) -> Self {
        self.symbols.insert(symbol.into(), dimension);
        self
    }

    pub fn dimension(&self, symbol: &str) -> Option<Dimension> {
        self.symbols.get(symbol).copied()
    }

    pub fn is_recognized(&self, unit: &str) -> bool {
        self.parse(unit).is_some()
    }

    /// Parse a unit string; `None` when any symbol is unknown
    pub fn parse(&self, unit: &str) -> Option<Unit> {
        let trimmed = unit.trim();
        if trimmed.is_empty() {
            return None;
        }

        let normalized = trimmed.replace("**", "^");
        let mut components = Vec::new();
        for (i, group) in normalized.split('/').enumerate() {
            let sign = if i == 0 { 1 } else { -1 };
            let terms: Vec<&str> = group
                .split(|c: char| c.is_whitespace() || c == '*')
                .filter(|t| !t.is_empty())
                .collect();
            if terms.is_empty() {
                return None;
            }
            for term in terms {
                let (symbol, power) = self.parse_term(term)?;
                components.push((symbol, power * sign));
            }
        }
        Some(Unit { components })
    }

    fn parse_term(&self, term: &str) -> Option<(String, i32)> {
        let (symbol, exponent) = if let Some((s, e)) = term.split_once('^') {
            (s, Some(e))
        } else {
            let split_at = term
                .char_indices()
                .find(|(_, c)| c.is_ascii_digit() || *c == '-' || *c == '+')
                .map(|(i, _)| i)
                .unwrap_or(term.len());
            let (s, e) = term.split_at(split_at);
            (s, (!e.is_empty()).then_some(e))
        };

        let power = match exponent {
            Some(e) => e.trim_matches(|c| c == '(' || c == ')').parse::<i32>().ok()?,
            None => 1,
        };
        if power == 0 || !self.symbols.contains_key(symbol) {
            return None;
        }
        Some((symbol.to_string(), power))
    }

    /// Attach `unit` to `value` when recognized
    pub fn quantity(&self, value: f64, unit: &str) -> Option<Quantity> {
        self.parse(unit).map(|unit| Quantity { value, unit })
    }
}
