use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error(transparent)]
    Store(#[from] store::StoreError),
}

pub type StateResult<T> = Result<T, StateError>;
