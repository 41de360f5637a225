//! Generic Level server: absolute, relative and continuous changes.

use super::params;
use super::{MessageContext, MessageOutcome};
use crate::core::{ElementId, Level, ModelKind, ModelState, StateValue, UpdateSource};
use crate::descriptor::{Motion, PendingAck};
use crate::engine::Engine;
use crate::timer::TimerId;
use tracing::debug;

/// Speed of a Level Move: `step` added every `interval_ms`.
///
/// ```rust
/// use meshstate::models::MoveParams;
///
/// // +500 per second, updated every 100 ms
/// assert_eq!(MoveParams::new(500, 1_000, 100), MoveParams { step: 50, interval_ms: 100 });
///
/// // Too slow for the update interval: one unit at a time, less often
/// assert_eq!(MoveParams::new(4, 2_000, 100), MoveParams { step: 1, interval_ms: 500 });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveParams {
    pub step: i32,
    pub interval_ms: u32,
}

impl MoveParams {
    /// Move by `delta` every `transition_ms`, updating every `update_ms`.
    pub fn new(delta: i16, transition_ms: u32, update_ms: u32) -> Self {
        let step = i64::from(delta) * i64::from(update_ms) / i64::from(transition_ms.max(1));
        if step != 0 {
            let saturated = if step < 0 { i32::MIN } else { i32::MAX };
            return Self {
                step: i32::try_from(step).unwrap_or(saturated),
                interval_ms: update_ms,
            };
        }
        let magnitude = u32::from(delta.unsigned_abs()).max(1);
        Self {
            step: i32::from(delta.signum()),
            interval_ms: (transition_ms / magnitude).max(1),
        }
    }
}

impl From<MoveParams> for Motion {
    fn from(params: MoveParams) -> Self {
        Motion {
            step: params.step,
            interval_ms: params.interval_ms,
        }
    }
}

impl Engine {
    pub(super) fn handle_level_set(
        &mut self,
        ctx: MessageContext,
        params: &[u8],
        ack: bool,
    ) -> MessageOutcome {
        match params::transactional(params, 2, |raw| Ok(Level(i16::from_le_bytes([raw[0], raw[1]])))) {
            Ok(set) => self.process_set(
                ctx,
                ModelKind::GenLevel,
                params::TransactionalSet {
                    value: StateValue::Level(set.value),
                    tid: set.tid,
                    timing: set.timing,
                },
                ack,
            ),
            Err(violations) => MessageOutcome::Dropped(violations),
        }
    }

    /// Relative change. Repeats of one transaction adjust the same origin
    /// instead of being rejected, so a client can stream a dimmer drag.
    pub(super) fn handle_level_delta_set(
        &mut self,
        ctx: MessageContext,
        params: &[u8],
        ack: bool,
    ) -> MessageOutcome {
        let set = match params::transactional(params, 4, |raw| {
            Ok(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
        }) {
            Ok(set) => set,
            Err(violations) => return MessageOutcome::Dropped(violations),
        };
        let (transition_ms, delay_units) = self.request_timing(ctx.element, set.timing);
        let timeout = self.config.dedup_timeout_ms;
        let model = ModelKind::GenLevel;

        let Some(descriptor) = self
            .elements
            .get_mut(usize::from(ctx.element))
            .and_then(|e| e.models.get_mut(&model))
        else {
            return MessageOutcome::NoSuchModel;
        };

        let continuing = descriptor.filter.matches(ctx.src, set.tid);
        let origin = match (continuing, descriptor.delta_origin) {
            (true, Some(origin)) => origin,
            _ => descriptor.present,
        };
        descriptor.delta_origin = Some(origin);
        descriptor.filter.remember(
            ctx.src,
            set.tid,
            self.timers.as_mut(),
            TimerId::transaction(ctx.element, model),
            timeout,
        );
        descriptor.pending_ack = ack.then_some(PendingAck {
            dst: ctx.src,
            app_key_index: ctx.app_key_index,
            unicast: ctx.unicast,
        });

        let target = origin.with_linear_value(
            origin
                .linear_value()
                .unwrap_or_default()
                .saturating_add(set.value),
        );
        debug!(element = ctx.element, delta = set.value, continuing, ?origin, ?target, "level delta");

        self.begin(
            ctx.element,
            model,
            target,
            transition_ms,
            delay_units,
            UpdateSource::Client,
            None,
        );
        self.reply_unless_delayed(ctx, model);
        MessageOutcome::Accepted
    }

    /// Continuous change towards the end of the level range.
    pub(super) fn handle_level_move_set(
        &mut self,
        ctx: MessageContext,
        params: &[u8],
        ack: bool,
    ) -> MessageOutcome {
        let set = match params::movement(params) {
            Ok(set) => set,
            Err(violations) => return MessageOutcome::Dropped(violations),
        };
        let (transition_ms, delay_units) = self.request_timing(ctx.element, set.timing);
        let model = ModelKind::GenLevel;
        if !self.accept_transaction(ctx, model, set.tid, ack) {
            return MessageOutcome::Duplicate;
        }

        if set.value == 0 {
            self.halt(ctx.element, model);
        } else if transition_ms > 0 {
            let speed = MoveParams::new(set.value, transition_ms, self.config.move_interval_ms);
            let bound = if set.value < 0 { Level::MIN } else { Level::MAX };
            debug!(element = ctx.element, step = speed.step, interval_ms = speed.interval_ms, "level move");
            self.begin(
                ctx.element,
                model,
                bound.into(),
                speed.interval_ms,
                delay_units,
                UpdateSource::Client,
                Some(speed.into()),
            );
        }
        self.reply_unless_delayed(ctx, model);
        MessageOutcome::Accepted
    }

    /// Present Level state of `element`.
    pub fn level(&self, element: ElementId) -> Option<Level> {
        match self.present(element, ModelKind::GenLevel)? {
            StateValue::Level(level) => Some(level),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ElementBuilder;
    use crate::models::ModelMessage;
    use crate::status::StatusReport;
    use crate::timing::TransitionTime;

    fn engine() -> Engine {
        Engine::builder()
            .element(ElementBuilder::new().model(ModelKind::GenLevel))
            .build()
            .unwrap()
    }

    fn delta(value: i32, tid: u8) -> ModelMessage {
        let mut params = value.to_le_bytes().to_vec();
        params.push(tid);
        ModelMessage::LevelDeltaSet { params, ack: false }
    }

    fn movement(value: i16, tid: u8, transition: u8) -> ModelMessage {
        let mut params = value.to_le_bytes().to_vec();
        params.extend_from_slice(&[tid, transition, 0x00]);
        ModelMessage::LevelMoveSet { params, ack: false }
    }

    #[test]
    fn set_moves_to_absolute_level() {
        let mut engine = engine();
        let outcome = engine.handle_message(
            MessageContext::new(0, 0x0002),
            ModelMessage::Set {
                model: ModelKind::GenLevel,
                params: vec![0x18, 0xFC, 0x01],
                ack: false,
            },
        );
        assert_eq!(outcome, MessageOutcome::Accepted);
        assert_eq!(engine.level(0), Some(Level(-1_000)));
    }

    #[test]
    fn delta_within_one_transaction_is_relative_to_its_origin() {
        let mut engine = engine();
        engine.set_state(0, Level(100).into(), 0, 0);
        let ctx = MessageContext::new(0, 0x0002);

        engine.handle_message(ctx, delta(50, 1));
        assert_eq!(engine.level(0), Some(Level(150)));

        engine.handle_message(ctx, delta(80, 1));
        assert_eq!(engine.level(0), Some(Level(180)));

        engine.handle_message(ctx, delta(10, 2));
        assert_eq!(engine.level(0), Some(Level(190)));
    }

    #[test]
    fn delta_clamps_to_level_range() {
        let mut engine = engine();
        engine.set_state(0, Level(32_000).into(), 0, 0);
        engine.handle_message(MessageContext::new(0, 0x0002), delta(5_000, 1));
        assert_eq!(engine.level(0), Some(Level::MAX));
    }

    #[test]
    fn extreme_deltas_saturate_instead_of_wrapping() {
        let mut engine = engine();
        let ctx = MessageContext::new(0, 0x0002);

        engine.set_state(0, Level(32_000).into(), 0, 0);
        engine.handle_message(ctx, delta(i32::MAX, 1));
        assert_eq!(engine.level(0), Some(Level::MAX));

        engine.set_state(0, Level(-100).into(), 0, 0);
        engine.handle_message(ctx, delta(i32::MIN, 2));
        assert_eq!(engine.level(0), Some(Level::MIN));
    }

    #[test]
    fn move_runs_until_the_range_end() {
        let mut engine = engine();
        engine.set_state(0, Level(32_000).into(), 0, 0);

        // +1000 per 100 ms
        engine.handle_message(MessageContext::new(0, 0x0002), movement(1_000, 1, 0x01));
        let report = engine.build_status(0, ModelKind::GenLevel).unwrap();
        assert_eq!(report.remaining, Some(TransitionTime::UNKNOWN));
        assert_eq!(report.target, Some(Level::MAX.into()));

        engine.advance(100);
        assert_eq!(engine.level(0), Some(Level(32_767)));
        assert_eq!(
            engine.build_status(0, ModelKind::GenLevel),
            Some(StatusReport::settled(Level::MAX.into()))
        );
    }

    #[test]
    fn move_steps_downwards() {
        let mut engine = engine();
        engine.handle_message(MessageContext::new(0, 0x0002), movement(-200, 1, 0x0A));

        engine.advance(300);
        assert_eq!(engine.level(0), Some(Level(-60)));
        assert!(engine.descriptor(0, ModelKind::GenLevel).unwrap().is_moving());
    }

    #[test]
    fn zero_delta_move_stops() {
        let mut engine = engine();
        let ctx = MessageContext::new(0, 0x0002);
        engine.handle_message(ctx, movement(1_000, 1, 0x01));
        engine.advance(200);

        engine.handle_message(ctx, movement(0, 2, 0x01));
        let stopped = engine.level(0);
        engine.advance(1_000);

        assert_eq!(stopped, Some(Level(2_000)));
        assert_eq!(engine.level(0), stopped);
        assert!(engine.descriptor(0, ModelKind::GenLevel).unwrap().is_idle());
    }

    #[test]
    fn move_speed_is_rounded_to_whole_units() {
        assert_eq!(MoveParams::new(-30, 1_000, 100), MoveParams { step: -3, interval_ms: 100 });
        assert_eq!(MoveParams::new(-2, 1_000, 100), MoveParams { step: -1, interval_ms: 500 });
    }

    #[test]
    fn move_speed_saturates_for_huge_update_intervals() {
        assert_eq!(MoveParams::new(i16::MAX, 1, u32::MAX).step, i32::MAX);
        assert_eq!(MoveParams::new(i16::MIN, 1, u32::MAX).step, i32::MIN);
    }

    #[test]
    fn saturated_move_step_lands_on_the_range_end() {
        let config = crate::config::EngineConfig {
            move_interval_ms: u32::MAX,
            ..Default::default()
        };
        let mut engine = Engine::builder()
            .config(config)
            .element(ElementBuilder::new().model(ModelKind::GenLevel).initial(Level(-5).into()))
            .build()
            .unwrap();

        engine.handle_message(MessageContext::new(0, 0x0002), movement(i16::MIN, 1, 0x01));
        engine.advance(u64::from(u32::MAX));
        assert_eq!(engine.level(0), Some(Level::MIN));
    }
}
