//! Render command boundary.
//!
//! The simulation never draws anything. It describes what changed as
//! [`RenderCommand`]s with a per-entity sequence number; a renderer on the
//! other side of the worker boundary feeds them through a
//! [`RenderReconciler`] to drop anything that arrives out of order.

use std::collections::BTreeMap;

use crate::member::{Camp, MemberKind};
use crate::types::{Frame, MemberId, Vec3};

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")
)]
pub enum RenderKind {
    Spawn {
        name: String,
        camp: Camp,
        member_kind: MemberKind,
        position: Vec3,
    },
    Destroy,
    MoveStart {
        from: Vec3,
        to: Vec3,
        speed: f64,
    },
    MoveStop {
        position: Vec3,
    },
    Face {
        direction: Vec3,
    },
    Teleport {
        position: Vec3,
    },
    SetName {
        name: String,
    },
    SetProps {
        props: BTreeMap<String, f64>,
    },
    /// Full state for an entity; replaces whatever the renderer holds.
    Reconcile {
        position: Vec3,
        props: BTreeMap<String, f64>,
    },
    Action {
        name: String,
        phase: String,
    },
    Batch {
        commands: Vec<RenderCommand>,
    },
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct RenderCommand {
    pub entity_id: MemberId,
    pub seq: u64,
    /// Logical time in milliseconds.
    pub ts: f64,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub kind: RenderKind,
}

/// Buffers render commands and numbers them per entity.
#[derive(Clone, Debug)]
pub struct RenderEmitter {
    frame_millis: f64,
    seqs: BTreeMap<MemberId, u64>,
    buffer: Vec<RenderCommand>,
}

impl RenderEmitter {
    pub fn new(frame_millis: f64) -> Self {
        Self {
            frame_millis,
            seqs: BTreeMap::new(),
            buffer: Vec::new(),
        }
    }

    pub fn emit(&mut self, entity_id: MemberId, frame: Frame, kind: RenderKind) {
        let command = self.command(entity_id, frame, kind);
        self.buffer.push(command);
    }

    /// Wraps several changes of one entity into a single `batch` command.
    pub fn emit_batch(&mut self, entity_id: MemberId, frame: Frame, kinds: Vec<RenderKind>) {
        let commands = kinds
            .into_iter()
            .map(|kind| self.command(entity_id, frame, kind))
            .collect();
        self.emit(entity_id, frame, RenderKind::Batch { commands });
    }

    pub fn drain(&mut self) -> Vec<RenderCommand> {
        std::mem::take(&mut self.buffer)
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn command(&mut self, entity_id: MemberId, frame: Frame, kind: RenderKind) -> RenderCommand {
        let seq = self.seqs.entry(entity_id).or_insert(0);
        *seq += 1;
        RenderCommand {
            entity_id,
            seq: *seq,
            ts: frame.0 as f64 * self.frame_millis,
            kind,
        }
    }
}

/// Renderer-side filter that rejects stale commands.
#[derive(Clone, Debug, Default)]
pub struct RenderReconciler {
    applied: BTreeMap<MemberId, u64>,
    rejected: u64,
}

impl RenderReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `command` when its `seq` is newer than the last one applied
    /// for the same entity.
    pub fn accept(&mut self, command: &RenderCommand) -> bool {
        let last = self.applied.entry(command.entity_id).or_insert(0);
        if command.seq <= *last {
            self.rejected += 1;
            return false;
        }
        *last = command.seq;
        true
    }

    pub fn last_seq(&self, entity_id: MemberId) -> Option<u64> {
        self.applied.get(&entity_id).copied()
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_are_per_entity() {
        let mut emitter = RenderEmitter::new(1000.0 / 60.0);
        emitter.emit(MemberId(1), Frame(0), RenderKind::Destroy);
        emitter.emit(MemberId(2), Frame(0), RenderKind::Destroy);
        emitter.emit(MemberId(1), Frame(60), RenderKind::Destroy);
        let seqs: Vec<_> = emitter.drain().iter().map(|c| (c.entity_id.0, c.seq)).collect();
        assert_eq!(seqs, vec![(1, 1), (2, 1), (1, 2)]);
        assert_eq!(emitter.pending(), 0);
    }

    #[test]
    fn reconciler_drops_stale_commands() {
        let mut emitter = RenderEmitter::new(10.0);
        for f in 0..3 {
            emitter.emit(
                MemberId(7),
                Frame(f),
                RenderKind::Teleport {
                    position: Vec3::new(f as f64, 0.0, 0.0),
                },
            );
        }
        let commands = emitter.drain();
        assert_eq!(commands[2].ts, 20.0);

        let mut reconciler = RenderReconciler::new();
        assert!(reconciler.accept(&commands[0]));
        assert!(reconciler.accept(&commands[2]));
        assert!(!reconciler.accept(&commands[1]));
        assert!(!reconciler.accept(&commands[2]));
        assert_eq!(reconciler.last_seq(MemberId(7)), Some(3));
        assert_eq!(reconciler.rejected(), 2);
    }

    #[test]
    fn batch_takes_a_sequence_after_its_parts() {
        let mut emitter = RenderEmitter::new(10.0);
        emitter.emit_batch(
            MemberId(1),
            Frame(1),
            vec![
                RenderKind::SetName { name: "a".into() },
                RenderKind::MoveStop {
                    position: Vec3::ZERO,
                },
            ],
        );
        let commands = emitter.drain();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].seq, 3);
    }
}
