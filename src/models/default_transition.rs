//! Generic Default Transition Time server.

use super::params;
use super::{MessageContext, MessageOutcome};
use crate::engine::Engine;

impl Engine {
    pub(super) fn handle_default_transition_set(
        &mut self,
        ctx: MessageContext,
        params: &[u8],
        ack: bool,
    ) -> MessageOutcome {
        match params::default_transition(params) {
            Ok(time) => self.store_state(ctx, time.into(), ack),
            Err(violations) => MessageOutcome::Dropped(violations),
        }
    }
}
