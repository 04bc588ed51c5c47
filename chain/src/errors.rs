use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error(transparent)]
    Core(#[from] core_types::CoreError),
    #[error(transparent)]
    State(#[from] state::StateError),
    #[error("block has no transactions")]
    EmptyBlock,
    #[error("block's first transaction must be the block reward")]
    MissingBlockReward,
    #[error("checksum after connect-then-disconnect does not match the pre-block checksum")]
    RoundTripChecksumMismatch,
}

pub type ChainResult<T> = Result<T, ChainError>;
