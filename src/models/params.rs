//! Validation of request parameters.
//!
//! Every check runs, and a rejected request reports all of its problems at
//! once rather than the first one found.

use crate::core::StateError;
use crate::timing::TransitionTime;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// Why a request was dropped.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParamViolation {
    #[error("parameter length {found} is not one of {expected:?}")]
    Length {
        expected: Vec<usize>,
        found: usize,
    },

    #[error(transparent)]
    Prohibited(#[from] StateError),

    #[error("transition time {0:#04x} uses the reserved step count")]
    ReservedTransitionTime(u8),

    #[error("a move needs a non-zero transition time")]
    ZeroMoveTransition,
}

type Check = Validation<(), NonEmptyVec<ParamViolation>>;

fn check<T>(result: &Result<T, ParamViolation>) -> Check {
    match result {
        Ok(_) => Validation::success(()),
        Err(violation) => Validation::fail(violation.clone()),
    }
}

fn collect(checks: Vec<Check>) -> Result<(), Vec<ParamViolation>> {
    match Validation::all_vec(checks).map(|_| ()) {
        Validation::Success(_) => Ok(()),
        Validation::Failure(errors) => Err(errors.iter().cloned().collect()),
    }
}

/// Optional transition time and delay trailing a Set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub transition: TransitionTime,
    pub delay_units: u8,
}

/// A decoded Set carrying a transaction id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionalSet<T> {
    pub value: T,
    pub tid: u8,
    /// `None` when the request relies on the default transition time
    pub timing: Option<Timing>,
}

fn length(params: &[u8], expected: &[usize]) -> Result<(), ParamViolation> {
    if expected.contains(&params.len()) {
        Ok(())
    } else {
        Err(ParamViolation::Length {
            expected: expected.to_vec(),
            found: params.len(),
        })
    }
}

fn transition(raw: u8) -> Result<TransitionTime, ParamViolation> {
    let time = TransitionTime::from_raw(raw);
    if time.is_unknown() {
        Err(ParamViolation::ReservedTransitionTime(raw))
    } else {
        Ok(time)
    }
}

/// Decode `value, tid, [transition, delay]` where the value takes `value_len` bytes.
pub fn transactional<T>(
    params: &[u8],
    value_len: usize,
    decode: impl FnOnce(&[u8]) -> Result<T, StateError>,
) -> Result<TransactionalSet<T>, Vec<ParamViolation>> {
    length(params, &[value_len + 1, value_len + 3]).map_err(|v| vec![v])?;

    let value = decode(&params[..value_len]).map_err(ParamViolation::from);
    let tid = params[value_len];
    let timing = match params.get(value_len + 1..) {
        Some([raw, delay_units]) => transition(*raw).map(|transition| {
            Some(Timing {
                transition,
                delay_units: *delay_units,
            })
        }),
        _ => Ok(None),
    };

    collect(vec![check(&value), check(&timing)])?;
    match (value, timing) {
        (Ok(value), Ok(timing)) => Ok(TransactionalSet { value, tid, timing }),
        (Err(v), _) | (_, Err(v)) => Err(vec![v]),
    }
}

/// Decode a Level Move: like a Set, but an explicit transition time must be non-zero.
pub fn movement(params: &[u8]) -> Result<TransactionalSet<i16>, Vec<ParamViolation>> {
    let set = transactional(params, 2, |raw| Ok(i16::from_le_bytes([raw[0], raw[1]])))?;
    match set.timing {
        Some(timing) if timing.transition.steps() == 0 => {
            Err(vec![ParamViolation::ZeroMoveTransition])
        }
        _ => Ok(set),
    }
}

/// Decode a single-byte Set without transaction id.
pub fn single<T>(
    params: &[u8],
    decode: impl FnOnce(u8) -> Result<T, ParamViolation>,
) -> Result<T, Vec<ParamViolation>> {
    length(params, &[1]).map_err(|v| vec![v])?;
    decode(params[0]).map_err(|v| vec![v])
}

/// Decode a Default Transition Time Set.
pub fn default_transition(params: &[u8]) -> Result<TransitionTime, Vec<ParamViolation>> {
    single(params, transition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OnOff;

    fn onoff(params: &[u8]) -> Result<TransactionalSet<OnOff>, Vec<ParamViolation>> {
        transactional(params, 1, |raw| OnOff::try_from(raw[0]))
    }

    #[test]
    fn short_form_has_no_timing() {
        let set = onoff(&[0x01, 0x05]).unwrap();
        assert_eq!(set.value, OnOff::On);
        assert_eq!(set.tid, 5);
        assert_eq!(set.timing, None);
    }

    #[test]
    fn long_form_carries_timing() {
        let set = onoff(&[0x00, 0x07, 0x02, 0x0A]).unwrap();
        assert_eq!(
            set.timing,
            Some(Timing {
                transition: TransitionTime::from_raw(0x02),
                delay_units: 0x0A
            })
        );
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert_eq!(
            onoff(&[0x01, 0x05, 0x02]),
            Err(vec![ParamViolation::Length {
                expected: vec![2, 4],
                found: 3
            }])
        );
    }

    #[test]
    fn all_problems_are_reported_together() {
        let violations = onoff(&[0x02, 0x05, 0x3F, 0x00]).unwrap_err();
        assert_eq!(violations.len(), 2);
        assert!(violations
            .iter()
            .any(|v| matches!(v, ParamViolation::Prohibited(_))));
        assert!(violations
            .iter()
            .any(|v| matches!(v, ParamViolation::ReservedTransitionTime(0x3F))));
    }

    #[test]
    fn move_rejects_explicit_zero_transition() {
        assert_eq!(
            movement(&[0x10, 0x00, 0x01, 0x00, 0x00]),
            Err(vec![ParamViolation::ZeroMoveTransition])
        );
        assert_eq!(movement(&[0x10, 0x00, 0x01]).unwrap().value, 16);
    }

    #[test]
    fn default_transition_rejects_unknown() {
        assert_eq!(
            default_transition(&[0x7F]),
            Err(vec![ParamViolation::ReservedTransitionTime(0x7F)])
        );
        assert_eq!(default_transition(&[0x45]), Ok(TransitionTime::from_raw(0x45)));
    }
}
