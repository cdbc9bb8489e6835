use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid or unsupported element symbol: '{0}'")]
pub struct ParseElementError(String);

/// Chemical elements commonly produced by reactive MD simulations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Element {
    H = 1,
    He,
    Li,
    Be,
    B,
    C,
    N,
    O,
    F,
    Ne,
    Na,
    Mg,
    Al,
    Si,
    P,
    S,
    Cl,
    Ar,
    K,
    Ca,
    Sc,
    Ti,
    V,
    Cr,
    Mn,
    Fe,
    Co,
    Ni,
    Cu,
    Zn,
    Ga,
    Ge,
    As,
    Se,
    Br,
    Kr = 36,
}

impl Element {
    /// Nuclear charge Z, the default per-element descriptor weight.
    #[inline]
    pub fn atomic_number(&self) -> u8 {
        *self as u8
    }

    /// Covalent radius in Å (Cordero 2008), used by the built-in
    /// distance-based bond perceiver.
    pub fn covalent_radius(&self) -> f64 {
        match self {
            Element::H => 0.31,
            Element::He => 0.28,
            Element::Li => 1.28,
            Element::Be => 0.96,
            Element::B => 0.84,
            Element::C => 0.76,
            Element::N => 0.71,
            Element::O => 0.66,
            Element::F => 0.57,
            Element::Ne => 0.58,
            Element::Na => 1.66,
            Element::Mg => 1.41,
            Element::Al => 1.21,
            Element::Si => 1.11,
            Element::P => 1.07,
            Element::S => 1.05,
            Element::Cl => 1.02,
            Element::Ar => 1.06,
            Element::K => 2.03,
            Element::Ca => 1.76,
            Element::Sc => 1.70,
            Element::Ti => 1.60,
            Element::V => 1.53,
            Element::Cr => 1.39,
            Element::Mn => 1.39,
            Element::Fe => 1.32,
            Element::Co => 1.26,
            Element::Ni => 1.24,
            Element::Cu => 1.32,
            Element::Zn => 1.22,
            Element::Ga => 1.22,
            Element::Ge => 1.20,
            Element::As => 1.19,
            Element::Se => 1.20,
            Element::Br => 1.20,
            Element::Kr => 1.16,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Element::H => "H",
            Element::He => "He",
            Element::Li => "Li",
            Element::Be => "Be",
            Element::B => "B",
            Element::C => "C",
            Element::N => "N",
            Element::O => "O",
            Element::F => "F",
            Element::Ne => "Ne",
            Element::Na => "Na",
            Element::Mg => "Mg",
            Element::Al => "Al",
            Element::Si => "Si",
            Element::P => "P",
            Element::S => "S",
            Element::Cl => "Cl",
            Element::Ar => "Ar",
            Element::K => "K",
            Element::Ca => "Ca",
            Element::Sc => "Sc",
            Element::Ti => "Ti",
            Element::V => "V",
            Element::Cr => "Cr",
            Element::Mn => "Mn",
            Element::Fe => "Fe",
            Element::Co => "Co",
            Element::Ni => "Ni",
            Element::Cu => "Cu",
            Element::Zn => "Zn",
            Element::Ga => "Ga",
            Element::Ge => "Ge",
            Element::As => "As",
            Element::Se => "Se",
            Element::Br => "Br",
            Element::Kr => "Kr",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Element {
    type Err = ParseElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_symbol(s);
        let elem = match normalized.as_str() {
            "H" => Element::H,
            "He" => Element::He,
            "Li" => Element::Li,
            "Be" => Element::Be,
            "B" => Element::B,
            "C" => Element::C,
            "N" => Element::N,
            "O" => Element::O,
            "F" => Element::F,
            "Ne" => Element::Ne,
            "Na" => Element::Na,
            "Mg" => Element::Mg,
            "Al" => Element::Al,
            "Si" => Element::Si,
            "P" => Element::P,
            "S" => Element::S,
            "Cl" => Element::Cl,
            "Ar" => Element::Ar,
            "K" => Element::K,
            "Ca" => Element::Ca,
            "Sc" => Element::Sc,
            "Ti" => Element::Ti,
            "V" => Element::V,
            "Cr" => Element::Cr,
            "Mn" => Element::Mn,
            "Fe" => Element::Fe,
            "Co" => Element::Co,
            "Ni" => Element::Ni,
            "Cu" => Element::Cu,
            "Zn" => Element::Zn,
            "Ga" => Element::Ga,
            "Ge" => Element::Ge,
            "As" => Element::As,
            "Se" => Element::Se,
            "Br" => Element::Br,
            "Kr" => Element::Kr,
            _ => return Err(ParseElementError(s.to_string())),
        };
        Ok(elem)
    }
}

fn normalize_symbol(s: &str) -> String {
    let trimmed = s.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
        None => String::new(),
    }
}
