use thiserror::Error;

/// Errors raised by the intent registry intake surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("round id does not match the current round")]
    InvalidRoundId,

    #[error("intake window has closed for the current round")]
    IntakeWindowClosed,

    #[error("intake window must be positive and no longer than the round")]
    InvalidRoundConfig,

    #[error("trader address is zero")]
    InvalidTrader,

    #[error("protected data handle is zero")]
    InvalidProtectedData,

    #[error("commitment is zero")]
    InvalidCommitment,

    #[error("array length mismatch: {handles} handles vs {commitments} commitments")]
    ArrayLengthMismatch { handles: usize, commitments: usize },

    #[error("intent already registered for this round")]
    IntentAlreadyRegistered,

    #[error("caller is not the registry owner")]
    NotOwner,

    #[error(transparent)]
    Round(#[from] RootRegistryError),
}

/// Errors raised by the root registry state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RootRegistryError {
    #[error("round is closed")]
    RoundClosed,

    #[error("round is not closed yet")]
    RoundNotClosed,

    #[error("root already posted for this round")]
    RootAlreadySet,

    #[error("intent already submitted for this round")]
    IntentAlreadySubmitted,

    #[error("protected data handle is zero")]
    InvalidProtectedData,

    #[error("root must be non-zero")]
    InvalidRoot,

    #[error("validity deadline must be in the future")]
    InvalidValidUntil,

    #[error("root is locked for this round")]
    RootLocked,

    #[error("no root posted for this round")]
    RootNotSet,

    #[error("caller is not the bound matcher")]
    NotMatcher,

    #[error("caller is not the registry owner")]
    NotOwner,
}

/// Errors raised by the redemption hook callbacks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    #[error("hook data payload is absent or malformed")]
    InvalidHookData,

    #[error("caller is neither the trader nor an allowed caller")]
    UnauthorizedCaller,

    #[error("swap params do not match the redeemed match")]
    InvalidSwapParams,

    #[error("no root posted for this round")]
    RootNotSet,

    #[error("round root has expired")]
    RootExpired,

    #[error("match has expired")]
    MatchExpired,

    #[error("match already redeemed")]
    MatchAlreadyUsed,

    #[error("leaf already redeemed")]
    LeafAlreadyUsed,

    #[error("merkle proof does not verify against the round root")]
    InvalidProof,

    #[error("leaf signature does not recover to the tee signer")]
    InvalidSignature,

    #[error("swap output below the enforced minimum")]
    MinAmountOutNotMet,

    #[error("tee signer address must be non-zero")]
    InvalidTeeSigner,

    #[error("caller is not the hook owner")]
    NotOwner,
}

/// Fatal matching engine failures. Eligibility drops are never errors — they
/// surface as diagnostics on the result instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("integer overflow during {0}")]
    Overflow(&'static str),

    #[error("leaf signing failed: {0}")]
    Signing(String),
}

/// Errors raised by the private match distribution surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributionError {
    #[error("no artifact published for this round")]
    UnknownRound,

    #[error("challenge signature does not recover to the claimed address")]
    InvalidSignature,

    #[error("challenge timestamp outside the allowed window")]
    StaleTimestamp,

    #[error("access header is missing or malformed")]
    MalformedHeader,
}
