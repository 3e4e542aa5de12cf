use thiserror::Error;

pub type DssResult<T> = Result<T, DssError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DssError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Unknown element class: {name:?}")]
    UnknownClass { name: String },
}
