use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// A branching entry names an alias that does not exist in the table.
    UnresolvedAlias { alias: String, index: usize },
    /// An instruction fetch went outside instruction memory. The program
    /// image does not encode a behavior for this; the machine aborts.
    FetchOutOfRange { pc: u32, len: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnresolvedAlias { alias, index } => write!(
                f,
                "unknown alias {} in microcode entry {}",
                alias, index
            ),
            Error::FetchOutOfRange { pc, len } => write!(
                f,
                "instruction fetch at {} outside instruction memory of {} words",
                pc, len
            ),
        }
    }
}

impl StdError for Error {}
