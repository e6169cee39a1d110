//! Segmented packet reassembly
//!
//! Each stream identifier runs a small `{idle, accumulating}` state machine
//! over its packets in arrival order:
//!
//! | flag         | idle                | accumulating                       |
//! |--------------|---------------------|------------------------------------|
//! | UNSEGMENTED  | emit unchanged      | emit unchanged                     |
//! | START        | open accumulation   | ignored (duplicate start)          |
//! | CONTINUATION | ignored (orphan)    | append payload, add data length    |
//! | END          | ignored (orphan)    | append, emit as UNSEGMENTED, idle  |
//!
//! Ignored packets are logged and counted, never raised. The reassembled
//! `data_length_field` is the sum of the segments' encoded length values.

use crate::types::{RawPacket, SequenceFlags};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Counters for packets the reassembler merged or ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblyStats {
    /// Logical packets produced from START..END groups
    pub reassembled: usize,
    pub duplicate_starts: usize,
    pub orphan_segments: usize,
    /// Groups still open when the input ended
    pub unterminated: usize,
}

#[derive(Debug, Default)]
enum SegmentState {
    #[default]
    Idle,
    Accumulating(RawPacket),
}

#[derive(Debug, Default)]
struct StreamAssembly {
    state: SegmentState,
    output: Vec<RawPacket>,
}

/// Folds START/CONTINUATION/END groups into single logical packets.
///
/// Output is grouped per stream identifier in order of first appearance;
/// within a stream, packets keep their arrival order.
#[derive(Debug, Default)]
pub struct SegmentReassembler {
    order: Vec<u16>,
    streams: HashMap<u16, StreamAssembly>,
    stats: ReassemblyStats,
}

impl SegmentReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassemble a whole framed dump.
    pub fn reassemble(packets: impl IntoIterator<Item = RawPacket>) -> (Vec<RawPacket>, ReassemblyStats) {
        let mut reassembler = Self::new();
        for packet in packets {
            reassembler.push(packet);
        }
        reassembler.finish()
    }

    /// Feed the next packet in arrival order.
    pub fn push(&mut self, packet: RawPacket) {
        let apid = packet.apid;
        let assembly = self.streams.entry(apid).or_insert_with(|| {
            self.order.push(apid);
            StreamAssembly::default()
        });

        match (packet.sequence_flags, &mut assembly.state) {
            (SequenceFlags::Unsegmented, _) => assembly.output.push(packet),
            (SequenceFlags::Start, SegmentState::Idle) => {
                assembly.state = SegmentState::Accumulating(packet);
            }
            (SequenceFlags::Start, SegmentState::Accumulating(_)) => {
                warn!(
                    "apid {}: ignoring duplicate START (count {}) at byte {:#x}",
                    packet.apid_hex(),
                    packet.sequence_count,
                    packet.byte_offset
                );
                self.stats.duplicate_starts += 1;
            }
            (SequenceFlags::Continuation | SequenceFlags::End, SegmentState::Idle) => {
                warn!(
                    "apid {}: ignoring orphan {:?} (count {}) at byte {:#x}",
                    packet.apid_hex(),
                    packet.sequence_flags,
                    packet.sequence_count,
                    packet.byte_offset
                );
                self.stats.orphan_segments += 1;
            }
            (SequenceFlags::Continuation, SegmentState::Accumulating(group)) => {
                append_segment(group, &packet);
            }
            (SequenceFlags::End, SegmentState::Accumulating(group)) => {
                append_segment(group, &packet);
                if let SegmentState::Accumulating(mut logical) = std::mem::take(&mut assembly.state) {
                    logical.sequence_flags = SequenceFlags::Unsegmented;
                    assembly.output.push(logical);
                    self.stats.reassembled += 1;
                }
            }
        }
    }

    /// Emit the logical packets. Groups without an END are dropped.
    pub fn finish(self) -> (Vec<RawPacket>, ReassemblyStats) {
        let mut stats = self.stats;
        let mut streams = self.streams;
        let mut packets = Vec::new();

        for apid in self.order {
            let Some(assembly) = streams.remove(&apid) else {
                continue;
            };
            if let SegmentState::Accumulating(open) = assembly.state {
                warn!(
                    "apid {}: dropping segment group started at byte {:#x} without END",
                    open.apid_hex(),
                    open.byte_offset
                );
                stats.unterminated += 1;
            }
            packets.extend(assembly.output);
        }

        debug!(
            "Reassembly produced {} logical packets ({} merged, {} duplicate starts, {} orphans)",
            packets.len(),
            stats.reassembled,
            stats.duplicate_starts,
            stats.orphan_segments
        );
        (packets, stats)
    }
}

fn append_segment(group: &mut RawPacket, segment: &RawPacket) {
    group.payload.append(&segment.payload);
    group.data_length_field = group.data_length_field.saturating_add(segment.data_length_field);
}
