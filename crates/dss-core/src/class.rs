//! Element classes known to the engine and references to single elements.

use crate::error::{DssError, DssResult};
use core::fmt;
use core::str::FromStr;

/// Kind of circuit element, replacing class-name string dispatch.
///
/// Every variant maps to the class name the engine understands. Classes this
/// crate has no dedicated handling for are carried in [`ElementClass::Other`]
/// and reached through the engine's generic "active class" selection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(into = "String", try_from = "String")
)]
pub enum ElementClass {
    Load,
    PV,
    Generator,
    Line,
    Transformer,
    Capacitor,
    RegControl,
    CapControl,
    Storage,
    /// Any other engine class, stored lower-case.
    Other(String),
}

impl ElementClass {
    /// Class name as written in engine scripts (`Load.671`, `Transformer.xfm1`).
    pub fn dss_name(&self) -> &str {
        match self {
            Self::Load => "Load",
            Self::PV => "PVSystem",
            Self::Generator => "Generator",
            Self::Line => "Line",
            Self::Transformer => "Transformer",
            Self::Capacitor => "Capacitor",
            Self::RegControl => "RegControl",
            Self::CapControl => "CapControl",
            Self::Storage => "Storage",
            Self::Other(name) => name,
        }
    }

    /// Short label used in summaries ("Load", "PV", "Xfmr", ...).
    pub fn label(&self) -> &str {
        match self {
            Self::PV => "PV",
            Self::Transformer => "Xfmr",
            other => other.dss_name(),
        }
    }

    /// Two-terminal power-delivery classes. Their power and current arrays
    /// hold one block per terminal.
    pub fn is_branch(&self) -> bool {
        matches!(self, Self::Line | Self::Transformer | Self::Capacitor)
    }

    /// Classes whose kW/kvar setpoints are written directly.
    pub fn accepts_setpoints(&self) -> bool {
        matches!(self, Self::Load | Self::PV | Self::Generator)
    }
}

impl FromStr for ElementClass {
    type Err = DssError;

    fn from_str(s: &str) -> DssResult<Self> {
        let trimmed = s.trim();
        let class = match trimmed.to_ascii_lowercase().as_str() {
            "" => {
                return Err(DssError::UnknownClass {
                    name: s.to_string(),
                });
            }
            "load" => Self::Load,
            "pv" | "pvsystem" => Self::PV,
            "generator" => Self::Generator,
            "line" => Self::Line,
            "xfmr" | "transformer" => Self::Transformer,
            "capacitor" => Self::Capacitor,
            "regcontrol" => Self::RegControl,
            "capcontrol" => Self::CapControl,
            "storage" => Self::Storage,
            other => Self::Other(other.to_string()),
        };
        Ok(class)
    }
}

impl TryFrom<String> for ElementClass {
    type Error = DssError;

    fn try_from(value: String) -> DssResult<Self> {
        value.parse()
    }
}

impl From<ElementClass> for String {
    fn from(class: ElementClass) -> Self {
        class.dss_name().to_string()
    }
}

impl fmt::Display for ElementClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dss_name())
    }
}

/// A `(class, name)` pair naming one element. Names are lower-cased, which
/// is how the engine reports them back after selection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub class: ElementClass,
    pub name: String,
}

impl ElementRef {
    pub fn new(class: ElementClass, name: impl AsRef<str>) -> Self {
        Self {
            class,
            name: name.as_ref().trim().to_ascii_lowercase(),
        }
    }

    /// Parse `Class.name` as printed by the engine's element listings.
    pub fn parse_full_name(full: &str) -> DssResult<Self> {
        let (class, name) = full.split_once('.').ok_or(DssError::InvalidArg {
            what: "element name must look like Class.name",
        })?;
        if name.is_empty() {
            return Err(DssError::InvalidArg {
                what: "element name is empty",
            });
        }
        Ok(Self::new(class.parse()?, name))
    }

    /// `Class.name`, the form used in edit commands.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.class.dss_name(), self.name)
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.class, self.name)
    }
}
