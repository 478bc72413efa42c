//! # Write-Once Guard
//!
//! The two checks every evidence write passes through before it reaches a
//! store:
//!
//! 1. [`ensure_write_once`] — once a sealed field holds a value, a write may
//!    leave it alone or repeat the same value, nothing else.
//! 2. [`ensure_canonical_payload`] — the canonical settlement JSON may only
//!    appear when the record is (or is becoming) FINAL, and once present it
//!    is byte-for-byte immutable.
//!
//! Both are pure functions over the existing and proposed state, so a store
//! can run them inside its atomic conditional update.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{IntegrityError, WriteOnceReason};
use crate::hash::Sha256Hex;

/// Wire name of the sealed canonical payload field.
pub const CANONICAL_PAYLOAD_FIELD: &str = "settlementPayloadCanonicalJson";

/// A proposed change to one optional field.
///
/// Deserializes from an optional JSON key with `#[serde(default)]`:
/// key absent → `Unchanged`, `null` → `Clear`, value → `Set`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldPatch<T> {
    /// The write does not touch this field.
    #[default]
    Unchanged,
    /// The write removes the current value.
    Clear,
    /// The write stores this value.
    Set(T),
}

impl<T> FieldPatch<T> {
    /// Build a patch from an optional value: `None` leaves the field alone.
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Self::Unchanged, Self::Set)
    }

    /// The proposed value, if this patch sets one.
    pub fn as_set(&self) -> Option<&T> {
        match self {
            Self::Set(v) => Some(v),
            Self::Unchanged | Self::Clear => None,
        }
    }

    /// Apply the patch to the current value.
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Self::Unchanged => current,
            Self::Clear => None,
            Self::Set(v) => Some(v),
        }
    }

    /// Transform the proposed value, keeping `Unchanged`/`Clear` as they are.
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<FieldPatch<U>, E> {
        Ok(match self {
            Self::Unchanged => FieldPatch::Unchanged,
            Self::Clear => FieldPatch::Clear,
            Self::Set(v) => FieldPatch::Set(f(v)?),
        })
    }
}

impl FieldPatch<String> {
    /// Trim a text patch; an empty string is a clear.
    pub fn normalized_text(self) -> Self {
        match self {
            Self::Set(v) => {
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    Self::Clear
                } else {
                    Self::Set(trimmed.to_string())
                }
            }
            other => other,
        }
    }

    /// Validate a hash patch through the hash format validator.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::InvalidHashFormat`] naming `field`.
    pub fn into_hash(self, field: &str) -> Result<FieldPatch<Sha256Hex>, IntegrityError> {
        self.normalized_text()
            .try_map(|v| Sha256Hex::parse(&v, field))
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldPatch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Self::Set(v),
            None => Self::Clear,
        })
    }
}

/// Reject a write that would clear or change a sealed field.
///
/// # Errors
///
/// Returns [`IntegrityError::WriteOnceViolation`] with `cannot_clear` or
/// `cannot_change`.
pub fn ensure_write_once<T: PartialEq>(
    field: &str,
    existing: Option<&T>,
    next: &FieldPatch<T>,
) -> Result<(), IntegrityError> {
    let Some(current) = existing else {
        return Ok(());
    };
    let reason = match next {
        FieldPatch::Unchanged => return Ok(()),
        FieldPatch::Set(v) if v == current => return Ok(()),
        FieldPatch::Set(_) => WriteOnceReason::CannotChange,
        FieldPatch::Clear => WriteOnceReason::CannotClear,
    };
    Err(IntegrityError::WriteOnceViolation {
        field: field.to_string(),
        reason,
    })
}

/// Lifecycle status of a freight settlement record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    /// Being assembled; no sealed fields required.
    Draft,
    /// Sealed: hashes and canonical payload are immutable.
    Final,
    /// Withdrawn. Sealed fields are kept as they were.
    Void,
}

impl SettlementStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Final => "FINAL",
            Self::Void => "VOID",
        }
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// DRAFT → DRAFT/FINAL/VOID, FINAL → FINAL/VOID, VOID → VOID.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, _) | (Self::Final, Self::Final | Self::Void) | (Self::Void, Self::Void)
        )
    }

    /// # Errors
    ///
    /// Returns [`IntegrityError::InvalidStatusTransition`] when
    /// [`can_transition_to`](Self::can_transition_to) is false.
    pub fn ensure_transition(self, next: Self) -> Result<(), IntegrityError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(IntegrityError::InvalidStatusTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SettlementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "DRAFT" => Ok(Self::Draft),
            "FINAL" => Ok(Self::Final),
            "VOID" => Ok(Self::Void),
            other => Err(format!("unknown settlement status {other:?}")),
        }
    }
}

/// Gate writes of the canonical settlement payload.
///
/// - An existing payload may only be re-submitted byte-identical.
/// - A first payload requires `next_status == FINAL`, coming from no record,
///   a DRAFT record, or a FINAL record that has no payload yet.
///
/// # Errors
///
/// [`IntegrityError::WriteOnceViolation`] when an existing payload would be
/// changed or cleared; [`IntegrityError::CanonicalPayloadRequiresFinal`] when
/// a first payload arrives outside FINAL.
pub fn ensure_canonical_payload(
    existing_payload: Option<&str>,
    existing_status: Option<SettlementStatus>,
    next_payload: &FieldPatch<String>,
    next_status: SettlementStatus,
) -> Result<(), IntegrityError> {
    let violation = |reason| IntegrityError::WriteOnceViolation {
        field: CANONICAL_PAYLOAD_FIELD.to_string(),
        reason,
    };

    match existing_payload.filter(|p| !p.is_empty()) {
        Some(current) => match next_payload {
            FieldPatch::Unchanged => Ok(()),
            FieldPatch::Set(p) if p == current => Ok(()),
            FieldPatch::Set(p) if p.is_empty() => Err(violation(WriteOnceReason::CannotClear)),
            FieldPatch::Set(_) => Err(violation(WriteOnceReason::CannotChange)),
            FieldPatch::Clear => Err(violation(WriteOnceReason::CannotClear)),
        },
        None => match next_payload {
            FieldPatch::Set(p) if !p.is_empty() => {
                let prior_allows = matches!(
                    existing_status,
                    None | Some(SettlementStatus::Draft | SettlementStatus::Final)
                );
                if next_status == SettlementStatus::Final && prior_allows {
                    Ok(())
                } else {
                    Err(IntegrityError::CanonicalPayloadRequiresFinal {
                        status: next_status.as_str().to_string(),
                    })
                }
            }
            _ => Ok(()),
        },
    }
}
