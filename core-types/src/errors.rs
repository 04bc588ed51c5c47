use thiserror::Error;

/// Flat error enum shared by the connect/disconnect dispatch, the matching
/// engine, and the access-group handlers. Kept in `core-types` rather than
/// split per-crate so that `txn::dispatch` can return a single error type
/// regardless of which sub-mutator raised it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    // -- Signature & derived-key policy --
    #[error("transaction signature does not verify against its public key")]
    InvalidTransactionSignature,
    #[error("an input's public key differs from the transaction's public key")]
    InputWithPublicKeyDifferentFromTxnPublicKey,
    #[error("derived key is not authorized for this operation")]
    DerivedKeyNotAuthorized,

    // -- Block reward --
    #[error("block reward transactions may not carry a signature")]
    BlockRewardTxnNotAllowedToHaveSignature,
    #[error("block reward transactions may not carry inputs")]
    BlockRewardTxnNotAllowedToHaveInputs,
    #[error("cumulative block reward exceeds the maximum allowed for this height")]
    BlockRewardExceedsMaxAllowed,

    // -- Orders & matching engine --
    #[error("an order's buying coin and selling coin must differ")]
    CannotBuyAndSellSameCoin,
    #[error("invalid order operation type")]
    InvalidOperationType,
    #[error("invalid order fill type")]
    InvalidFillType,
    #[error("invalid exchange rate: {0}")]
    InvalidExchangeRate(String),
    #[error("invalid order quantity")]
    InvalidQuantity,
    #[error("total cost overflows a 256-bit unsigned integer")]
    TotalCostOverflowsUint256,
    #[error("total cost is less than one nano of the selling coin")]
    TotalCostIsLessThanOneNano,
    #[error("insufficient DESO to open this order")]
    InsufficientDESOToOpenOrder,
    #[error("insufficient DAO coin units to open this order")]
    InsufficientDAOCoinsToOpenOrder,
    #[error("an order may not match against the same transactor's own order")]
    MatchingOwnOrder,
    #[error("fill-or-kill order could not be fully filled immediately")]
    FillOrKillOrderUnfulfilled,
    #[error("order to cancel was not found")]
    ToCancelNotFound,
    #[error("order to cancel does not belong to the requesting transactor")]
    ToCancelNotYours,
    #[error("fee is below the minimum required transaction fee")]
    FeeNanosBelowMinTxFee,
    #[error("transaction spends more DESO than it is allowed to")]
    OverspendingDESO,
    #[error("a declared bidder input no longer exists")]
    BidderInputNoLongerExists,
    #[error("the creator of the buying DAO coin has no profile")]
    BuyingDAOCoinCreatorMissingProfile,

    // -- Global params --
    #[error("signer is not one of the current update-authority public keys")]
    UpdateGlobalParamsUnauthorized,

    // -- Access groups --
    #[error("access group does not exist")]
    GroupDoesntExist,
    #[error("member already exists in this access group")]
    MemberAlreadyExists,
    #[error("member does not exist or has been removed")]
    MemberDoesntExistOrIsDeleted,
    #[error("members list cannot be empty")]
    MembersListCannotBeEmpty,
    #[error("members list contains a duplicate member public key")]
    MemberListDuplicateMember,
    #[error("member's encrypted key cannot be empty")]
    MemberEncryptedKeyCannotBeEmpty,
    #[error("removing a member must not carry an encrypted key")]
    MemberRemoveEncryptedKeyNotEmpty,
    #[error("removing a member must not carry extra data")]
    MemberRemoveExtraDataNotEmpty,
    #[error("owner cannot add themselves to their own group under the same name")]
    MemberCantAddOwnerBySameGroup,
    #[error("group name cannot be the all-zeros reserved name")]
    NameCannotBeZeros,
    #[error("operation type is not supported")]
    OperationTypeNotSupported,
    #[error("enumeration exceeded its bounded recursion depth")]
    EnumerationRecursionLimit,
    #[error("previous members list does not match the group's recorded state")]
    PrevMembersListIsIncorrect,

    // -- Generic / encoding --
    #[error("malformed key or value encoding: {0}")]
    Encoding(String),
    #[error("entry not found for key")]
    NotFound,
}

pub type CoreResult<T> = Result<T, CoreError>;
