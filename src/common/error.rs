use std::{error::Error, fmt};

use crate::trade::Phase;

#[derive(Debug)]
pub enum EscrowError {
    Simple(String),
    TaskFailed { task: &'static str, cause: String },
    Timeout(String),
    NoMatchingRule { phase: Phase, stimulus: String },
    UnexpectedPeer(String),
    WriteOnceViolation(&'static str),
    Rejected(String),
    Io(std::io::Error),
    StrumParsing(strum::ParseError),
    SerdesJson(serde_json::Error),
    Secp256k1(secp256k1::Error),
    MpscSend(String),
    OneshotRecv(String),
    TaskJoin(String),
}

impl Error for EscrowError {}

impl fmt::Display for EscrowError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let error_string = match self {
            EscrowError::Simple(msg) => format!("Escrow-Error | Other - {}", msg),
            EscrowError::TaskFailed { task, cause } => {
                format!("Escrow-Error | TaskFailed - {} failed: {}", task, cause)
            }
            EscrowError::Timeout(msg) => format!("Escrow-Error | Timeout - {}", msg),
            EscrowError::NoMatchingRule { phase, stimulus } => {
                format!(
                    "Escrow-Error | NoMatchingRule - {} not accepted in phase {}",
                    stimulus, phase
                )
            }
            EscrowError::UnexpectedPeer(msg) => {
                format!("Escrow-Error | UnexpectedPeer - {}", msg)
            }
            EscrowError::WriteOnceViolation(artifact) => {
                format!(
                    "Escrow-Error | WriteOnceViolation - {} already set to a different value",
                    artifact
                )
            }
            EscrowError::Rejected(msg) => format!("Escrow-Error | Rejected - {}", msg),
            EscrowError::Io(err) => format!("Escrow-Error | IoError - {}", err),
            EscrowError::StrumParsing(err) => {
                format!("Escrow-Error | StrumParseError - {}", err)
            }
            EscrowError::SerdesJson(err) => {
                format!("Escrow-Error | SerdesJsonError - {}", err)
            }
            EscrowError::Secp256k1(err) => format!("Escrow-Error | Secp256k1Error - {}", err),
            EscrowError::MpscSend(msg) => format!("Escrow-Error | MpscSendError - {}", msg),
            EscrowError::OneshotRecv(msg) => {
                format!("Escrow-Error | OneshotRecvError - {}", msg)
            }
            EscrowError::TaskJoin(msg) => format!("Escrow-Error | TaskJoinError - {}", msg),
        };
        write!(f, "{}", error_string)
    }
}

impl From<std::io::Error> for EscrowError {
    fn from(e: std::io::Error) -> EscrowError {
        EscrowError::Io(e)
    }
}

impl From<strum::ParseError> for EscrowError {
    fn from(e: strum::ParseError) -> EscrowError {
        EscrowError::StrumParsing(e)
    }
}

impl From<serde_json::Error> for EscrowError {
    fn from(e: serde_json::Error) -> EscrowError {
        EscrowError::SerdesJson(e)
    }
}

impl From<secp256k1::Error> for EscrowError {
    fn from(e: secp256k1::Error) -> EscrowError {
        EscrowError::Secp256k1(e)
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for EscrowError {
    fn from(e: tokio::sync::mpsc::error::SendError<T>) -> EscrowError {
        EscrowError::MpscSend(e.to_string())
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for EscrowError {
    fn from(e: tokio::sync::oneshot::error::RecvError) -> EscrowError {
        EscrowError::OneshotRecv(e.to_string())
    }
}

impl From<tokio::task::JoinError> for EscrowError {
    fn from(e: tokio::task::JoinError) -> EscrowError {
        EscrowError::TaskJoin(e.to_string())
    }
}
