//! Generic OnOff server.

use super::params;
use super::{MessageContext, MessageOutcome};
use crate::core::{ElementId, ModelKind, OnOff, StateValue};
use crate::engine::Engine;

impl Engine {
    pub(super) fn handle_onoff_set(
        &mut self,
        ctx: MessageContext,
        params: &[u8],
        ack: bool,
    ) -> MessageOutcome {
        match params::transactional(params, 1, |raw| OnOff::try_from(raw[0])) {
            Ok(set) => self.process_set(
                ctx,
                ModelKind::GenOnOff,
                params::TransactionalSet {
                    value: StateValue::OnOff(set.value),
                    tid: set.tid,
                    timing: set.timing,
                },
                ack,
            ),
            Err(violations) => MessageOutcome::Dropped(violations),
        }
    }

    /// Present OnOff state of `element`.
    pub fn onoff(&self, element: ElementId) -> Option<OnOff> {
        match self.present(element, ModelKind::GenOnOff)? {
            StateValue::OnOff(state) => Some(state),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ElementBuilder;
    use crate::models::{ModelMessage, ParamViolation};

    fn set(params: &[u8]) -> ModelMessage {
        ModelMessage::Set {
            model: ModelKind::GenOnOff,
            params: params.to_vec(),
            ack: true,
        }
    }

    fn engine() -> Engine {
        Engine::builder()
            .element(ElementBuilder::new().model(ModelKind::GenOnOff))
            .build()
            .unwrap()
    }

    #[test]
    fn prohibited_state_is_dropped() {
        let mut engine = engine();
        let outcome = engine.handle_message(MessageContext::new(0, 0x0001), set(&[0x02, 0x01]));
        assert!(matches!(
            outcome,
            MessageOutcome::Dropped(ref v) if matches!(v.as_slice(), [ParamViolation::Prohibited(_)])
        ));
        assert_eq!(engine.onoff(0), Some(OnOff::Off));
    }

    #[test]
    fn reserved_transition_time_is_dropped() {
        let mut engine = engine();
        let outcome =
            engine.handle_message(MessageContext::new(0, 0x0001), set(&[0x01, 0x01, 0xFF, 0x00]));
        assert_eq!(
            outcome,
            MessageOutcome::Dropped(vec![ParamViolation::ReservedTransitionTime(0xFF)])
        );
    }

    #[test]
    fn repeated_transaction_is_ignored_until_it_expires() {
        let mut engine = engine();
        let ctx = MessageContext::new(0, 0x1201);

        assert_eq!(engine.handle_message(ctx, set(&[0x01, 0x05])), MessageOutcome::Accepted);
        engine.set_state(0, OnOff::Off.into(), 0, 0);
        assert_eq!(engine.handle_message(ctx, set(&[0x01, 0x05])), MessageOutcome::Duplicate);
        assert_eq!(engine.onoff(0), Some(OnOff::Off));

        engine.advance(6_000);
        assert_eq!(engine.handle_message(ctx, set(&[0x01, 0x05])), MessageOutcome::Accepted);
        assert_eq!(engine.onoff(0), Some(OnOff::On));
    }
}
