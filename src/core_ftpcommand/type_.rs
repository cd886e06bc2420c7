use std::fmt;

/// Representation type negotiated with `TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    Ascii,
    Binary,
    /// Nothing sent yet on this control connection.
    #[default]
    Unknown,
}

impl TransferMode {
    /// The `TYPE` argument, `None` for [`TransferMode::Unknown`].
    pub fn type_code(self) -> Option<&'static str> {
        match self {
            TransferMode::Ascii => Some("A"),
            TransferMode::Binary => Some("I"),
            TransferMode::Unknown => None,
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_code().unwrap_or("?"))
    }
}
