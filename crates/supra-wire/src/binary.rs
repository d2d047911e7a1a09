//! Legacy fixed-width binary encoding
//!
//! Two files. The header file carries the layout and everything variable
//! width; the body file is a flat array of fixed-size state records indexed
//! by state ID, so a state can be rewritten in place without touching its
//! neighbors.
//!
//! Header layout (all integers little-endian):
//! - Byte 0: type tag
//! - Bytes 1-8: state count (u64)
//! - Bytes 9-12: event capacity (u32)
//! - Bytes 13-20: state capacity (u64)
//! - Bytes 21-24: transition capacity (u32)
//! - Bytes 25-28: label length (u32)
//! - Bytes 29-36: initial state (u64, 0 = none)
//! - Bytes 37-40: controller count (u32)
//! - Bytes 41-44: event count (u32)
//! - Per event: `2*n` attribute bytes, label length (u32), label bytes
//! - Special-transition sections, each a u32 count plus fixed-width records
//!
//! Body layout: one record per state slot `1..=stateCapacity`:
//! - Byte 0: flags (exists, marked, enablement, disablement)
//! - Label field, zero-padded to the label length
//! - `transitionCapacity` records of event (u32) + target (u64); a zero
//!   event marks an empty slot
//!
//! A zero-filled record is an absent state. Any capacity change requires a
//! full rewrite, done as an atomic resize transaction: write to a temp file
//! in the destination directory, then persist over the target.

use std::fs;
use std::io::Write;
use std::path::Path;

use bytes::BufMut;
use supra_automata::{
    Automaton, AutomatonKind, CommunicationData, DisablementData, NashCommunicationData,
    TransitionRef, UStructureData,
};
use supra_core::{CommunicationRole, EventId, StateId, SupraError, SupraResult};
use tracing::debug;

/// Fixed part of the header file
pub const FIXED_HEADER_SIZE: usize = 45;

const FLAG_EXISTS: u8 = 0x01;
const FLAG_MARKED: u8 = 0x02;
const FLAG_ENABLEMENT: u8 = 0x04;
const FLAG_DISABLEMENT: u8 = 0x08;

/// Capacities governing the body record size
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BodyLayout {
    state_capacity: u64,
    transition_capacity: u32,
    label_length: u32,
}

impl BodyLayout {
    fn for_automaton(aut: &Automaton) -> Self {
        let transition_capacity = aut
            .states()
            .map(|s| s.transitions.len())
            .max()
            .unwrap_or(0) as u32;
        let label_length = aut
            .states()
            .map(|s| s.label.len())
            .max()
            .unwrap_or(0)
            .max(1) as u32;
        BodyLayout {
            state_capacity: aut.max_state_id().max(1),
            transition_capacity,
            label_length,
        }
    }

    fn record_size(&self) -> usize {
        1 + self.label_length as usize + self.transition_capacity as usize * 12
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> SupraResult<&'a [u8]> {
        if self.buf.len() - self.pos < n {
            return Err(SupraError::BufferTooShort {
                expected: self.pos + n,
                actual: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> SupraResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> SupraResult<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().map_err(
            |_| SupraError::InvalidWireFormat("u32 field".into()),
        )?))
    }

    fn u64(&mut self) -> SupraResult<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().map_err(
            |_| SupraError::InvalidWireFormat("u64 field".into()),
        )?))
    }

    fn f64(&mut self) -> SupraResult<f64> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().map_err(
            |_| SupraError::InvalidWireFormat("f64 field".into()),
        )?))
    }
}

fn put_transition_ref(buf: &mut Vec<u8>, t: &TransitionRef) {
    buf.put_u64_le(t.source.0);
    buf.put_u32_le(t.event.0);
    buf.put_u64_le(t.target.0);
}

fn read_transition_ref(cursor: &mut Cursor<'_>) -> SupraResult<TransitionRef> {
    let source = StateId::new(cursor.u64()?);
    let event = EventId::new(cursor.u32()?);
    let target = StateId::new(cursor.u64()?);
    Ok(TransitionRef::new(source, event, target))
}

fn put_ref_section(buf: &mut Vec<u8>, refs: &[TransitionRef]) {
    buf.put_u32_le(refs.len() as u32);
    for t in refs {
        put_transition_ref(buf, t);
    }
}

fn read_ref_section(cursor: &mut Cursor<'_>) -> SupraResult<Vec<TransitionRef>> {
    let count = cursor.u32()?;
    (0..count).map(|_| read_transition_ref(cursor)).collect()
}

fn read_roles(cursor: &mut Cursor<'_>, n: usize) -> SupraResult<Vec<CommunicationRole>> {
    cursor
        .take(n)?
        .iter()
        .map(|&b| {
            CommunicationRole::from_byte(b)
                .ok_or_else(|| SupraError::InvalidWireFormat(format!("unknown role byte {b}")))
        })
        .collect()
}

/// Encode an automaton into header and body buffers.
pub fn encode_files(aut: &Automaton) -> SupraResult<(Vec<u8>, Vec<u8>)> {
    let layout = BodyLayout::for_automaton(aut);
    let n = aut.n_controllers();

    let mut header = Vec::with_capacity(FIXED_HEADER_SIZE);
    header.put_u8(aut.kind().type_byte());
    header.put_u64_le(aut.n_states() as u64);
    header.put_u32_le(aut.n_events() as u32);
    header.put_u64_le(layout.state_capacity);
    header.put_u32_le(layout.transition_capacity);
    header.put_u32_le(layout.label_length);
    header.put_u64_le(aut.initial().map_or(0, |id| id.0));
    header.put_u32_le(n as u32);
    header.put_u32_le(aut.n_events() as u32);

    for event in aut.events() {
        for &observable in &event.observable {
            header.put_u8(observable as u8);
        }
        for &controllable in &event.controllable {
            header.put_u8(controllable as u8);
        }
        header.put_u32_le(event.label.len() as u32);
        header.extend_from_slice(event.label.as_bytes());
    }

    put_ref_section(&mut header, aut.bad_transitions());
    if let Some(data) = aut.ustructure_data() {
        put_ref_section(&mut header, &data.unconditional_violations);
        put_ref_section(&mut header, &data.conditional_violations);

        header.put_u32_le(data.potential_communications.len() as u32);
        for comm in &data.potential_communications {
            put_transition_ref(&mut header, &comm.transition);
            for &role in &comm.roles {
                header.put_u8(role.to_byte());
            }
        }
        put_ref_section(&mut header, &data.invalid_communications);

        header.put_u32_le(data.nash_communications.len() as u32);
        for comm in &data.nash_communications {
            put_transition_ref(&mut header, &comm.transition);
            for &role in &comm.roles {
                header.put_u8(role.to_byte());
            }
            header.put_f64_le(comm.cost);
            header.put_f64_le(comm.probability);
        }

        header.put_u32_le(data.disablement_decisions.len() as u32);
        for decision in &data.disablement_decisions {
            put_transition_ref(&mut header, &decision.transition);
            for &controller in &decision.controllers {
                header.put_u8(controller as u8);
            }
        }
        put_ref_section(&mut header, &data.suppressed_transitions);
    }

    let record_size = layout.record_size();
    let mut body = vec![0u8; layout.state_capacity as usize * record_size];
    for state in aut.states() {
        let offset = (state.id.0 - 1) as usize * record_size;
        let record = &mut body[offset..offset + record_size];

        let mut flags = FLAG_EXISTS;
        if state.marked {
            flags |= FLAG_MARKED;
        }
        if state.enablement {
            flags |= FLAG_ENABLEMENT;
        }
        if state.disablement {
            flags |= FLAG_DISABLEMENT;
        }
        record[0] = flags;
        record[1..1 + state.label.len()].copy_from_slice(state.label.as_bytes());

        let transitions_at = 1 + layout.label_length as usize;
        for (i, transition) in state.transitions.iter().enumerate() {
            let at = transitions_at + i * 12;
            record[at..at + 4].copy_from_slice(&transition.event.to_bytes());
            record[at + 4..at + 12].copy_from_slice(&transition.target.to_bytes());
        }
    }

    Ok((header, body))
}

/// Decode an automaton from header and body buffers.
pub fn decode_files(header: &[u8], body: &[u8]) -> SupraResult<Automaton> {
    let mut cursor = Cursor::new(header);

    let type_tag = cursor.u8()?;
    let n_states = cursor.u64()?;
    let _event_capacity = cursor.u32()?;
    let state_capacity = cursor.u64()?;
    let transition_capacity = cursor.u32()?;
    let label_length = cursor.u32()?;
    let initial = cursor.u64()?;
    let n_controllers = cursor.u32()? as usize;
    let n_events = cursor.u32()?;

    let mut aut = Automaton::new(n_controllers);
    for _ in 0..n_events {
        let attributes = cursor.take(2 * n_controllers)?;
        let observable: Vec<bool> = attributes[..n_controllers].iter().map(|&b| b != 0).collect();
        let controllable: Vec<bool> =
            attributes[n_controllers..].iter().map(|&b| b != 0).collect();
        let label_len = cursor.u32()? as usize;
        let label = String::from_utf8(cursor.take(label_len)?.to_vec())
            .map_err(|_| SupraError::InvalidWireFormat("event label not UTF-8".into()))?;
        aut.add_event(label, observable, controllable)?;
    }

    let bad_transitions = read_ref_section(&mut cursor)?;
    let data = if type_tag != 0 {
        let unconditional_violations = read_ref_section(&mut cursor)?;
        let conditional_violations = read_ref_section(&mut cursor)?;

        let comm_count = cursor.u32()?;
        let mut potential_communications = Vec::with_capacity(comm_count as usize);
        for _ in 0..comm_count {
            let transition = read_transition_ref(&mut cursor)?;
            let roles = read_roles(&mut cursor, n_controllers)?;
            potential_communications.push(CommunicationData::new(transition, roles));
        }
        let invalid_communications = read_ref_section(&mut cursor)?;

        let nash_count = cursor.u32()?;
        let mut nash_communications = Vec::with_capacity(nash_count as usize);
        for _ in 0..nash_count {
            let transition = read_transition_ref(&mut cursor)?;
            let roles = read_roles(&mut cursor, n_controllers)?;
            let cost = cursor.f64()?;
            let probability = cursor.f64()?;
            nash_communications.push(NashCommunicationData {
                transition,
                roles,
                cost,
                probability,
            });
        }

        let decision_count = cursor.u32()?;
        let mut disablement_decisions = Vec::with_capacity(decision_count as usize);
        for _ in 0..decision_count {
            let transition = read_transition_ref(&mut cursor)?;
            let controllers = cursor.take(n_controllers)?.iter().map(|&b| b != 0).collect();
            disablement_decisions.push(DisablementData {
                transition,
                controllers,
            });
        }
        let suppressed_transitions = read_ref_section(&mut cursor)?;

        Some(UStructureData {
            unconditional_violations,
            conditional_violations,
            potential_communications,
            invalid_communications,
            nash_communications,
            disablement_decisions,
            suppressed_transitions,
        })
    } else {
        None
    };

    // Body: first pass creates states, second wires transitions so forward
    // references resolve.
    let record_size = 1 + label_length as usize + transition_capacity as usize * 12;
    let expected = state_capacity as usize * record_size;
    if body.len() < expected {
        return Err(SupraError::BufferTooShort {
            expected,
            actual: body.len(),
        });
    }

    let mut records = Vec::new();
    for slot in 1..=state_capacity {
        let offset = (slot - 1) as usize * record_size;
        let record = &body[offset..offset + record_size];
        let flags = record[0];
        if flags & FLAG_EXISTS == 0 {
            continue;
        }
        if flags & FLAG_ENABLEMENT != 0 && flags & FLAG_DISABLEMENT != 0 {
            return Err(SupraError::InvalidWireFormat(format!(
                "state {slot} is both an enablement and a disablement configuration"
            )));
        }
        let label_field = &record[1..1 + label_length as usize];
        let end = label_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(label_field.len());
        let label = String::from_utf8(label_field[..end].to_vec())
            .map_err(|_| SupraError::InvalidWireFormat("state label not UTF-8".into()))?;
        aut.add_state_with_id(StateId::new(slot), label, flags & FLAG_MARKED != 0)?;
        if let Some(state) = aut.state_mut(StateId::new(slot)) {
            state.enablement = flags & FLAG_ENABLEMENT != 0;
            state.disablement = flags & FLAG_DISABLEMENT != 0;
        }
        records.push((StateId::new(slot), offset));
    }
    for (id, offset) in records {
        let transitions_at = offset + 1 + label_length as usize;
        for i in 0..transition_capacity as usize {
            let at = transitions_at + i * 12;
            let event = EventId::from_bytes(body[at..at + 4].try_into().map_err(|_| {
                SupraError::InvalidWireFormat("transition record".into())
            })?);
            if event.is_none() {
                continue;
            }
            let target = StateId::from_bytes(body[at + 4..at + 12].try_into().map_err(
                |_| SupraError::InvalidWireFormat("transition record".into()),
            )?);
            aut.add_transition(id, event, target)?;
        }
    }

    if aut.n_states() as u64 != n_states {
        return Err(SupraError::InvalidWireFormat(format!(
            "header claims {n_states} states, body holds {}",
            aut.n_states()
        )));
    }
    if initial != 0 {
        aut.set_initial(StateId::new(initial))?;
    }
    for t in bad_transitions {
        aut.mark_transition_bad(t.source, t.event, t.target)?;
    }
    match (type_tag, data) {
        (0, None) => {}
        (1, Some(data)) => aut.set_kind(AutomatonKind::UStructure(data)),
        (2, Some(data)) => aut.set_kind(AutomatonKind::Pruned(data)),
        (other, _) => {
            return Err(SupraError::InvalidWireFormat(format!(
                "unknown automaton type tag {other}"
            )));
        }
    }
    Ok(aut)
}

/// Replace a file's contents through a temp file in the same directory.
fn atomic_write(path: &Path, contents: &[u8]) -> SupraResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| SupraError::Io(e.error))?;
    Ok(())
}

/// Write the header and body files, each replaced atomically.
pub fn save_to_files(aut: &Automaton, header_path: &Path, body_path: &Path) -> SupraResult<()> {
    let (header, body) = encode_files(aut)?;
    atomic_write(header_path, &header)?;
    atomic_write(body_path, &body)?;
    debug!(
        header_bytes = header.len(),
        body_bytes = body.len(),
        "saved automaton"
    );
    Ok(())
}

/// Load an automaton previously written by [`save_to_files`].
pub fn load_from_files(header_path: &Path, body_path: &Path) -> SupraResult<Automaton> {
    let header = fs::read(header_path)?;
    let body = fs::read(body_path)?;
    decode_files(&header, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> Automaton {
        let mut aut = Automaton::new(2);
        let a = aut
            .add_event("a", vec![true, false], vec![true, false])
            .unwrap();
        let b = aut
            .add_event("b", vec![false, true], vec![false, true])
            .unwrap();
        let s1 = aut.add_state("first", false);
        let s2 = aut.add_state("second", true);
        aut.set_initial(s1).unwrap();
        aut.add_transition(s1, a, s2).unwrap();
        aut.add_transition(s1, b, s1).unwrap();
        aut.add_transition(s2, b, s1).unwrap();
        aut.mark_transition_bad(s1, a, s2).unwrap();
        aut
    }

    fn sample_ustructure() -> Automaton {
        let mut aut = sample();
        let t = TransitionRef::new(StateId::new(1), EventId::new(1), StateId::new(2));
        let data = UStructureData {
            unconditional_violations: vec![t],
            conditional_violations: Vec::new(),
            potential_communications: vec![CommunicationData::new(
                t,
                vec![CommunicationRole::Sender, CommunicationRole::Receiver],
            )],
            invalid_communications: Vec::new(),
            nash_communications: vec![NashCommunicationData {
                transition: t,
                roles: vec![CommunicationRole::None, CommunicationRole::Sender],
                cost: 1.5,
                probability: 0.25,
            }],
            disablement_decisions: vec![DisablementData {
                transition: t,
                controllers: vec![true, false],
            }],
            suppressed_transitions: Vec::new(),
        };
        aut.set_kind(AutomatonKind::UStructure(data));
        aut
    }

    #[test]
    fn test_binary_roundtrip_plain() {
        let aut = sample();
        let (header, body) = encode_files(&aut).unwrap();
        assert_eq!(decode_files(&header, &body).unwrap(), aut);
    }

    #[test]
    fn test_binary_roundtrip_ustructure() {
        let aut = sample_ustructure();
        let (header, body) = encode_files(&aut).unwrap();
        assert_eq!(decode_files(&header, &body).unwrap(), aut);
    }

    #[test]
    fn test_sparse_state_ids() {
        let mut aut = Automaton::new(1);
        let a = aut.add_event("a", vec![true], vec![false]).unwrap();
        aut.add_state_with_id(StateId::new(2), "x", false).unwrap();
        aut.add_state_with_id(StateId::new(5), "y", true).unwrap();
        aut.set_initial(StateId::new(5)).unwrap();
        aut.add_transition(StateId::new(2), a, StateId::new(5))
            .unwrap();

        let (header, body) = encode_files(&aut).unwrap();
        // Slots 1, 3, 4 are zero-filled.
        let restored = decode_files(&header, &body).unwrap();
        assert_eq!(restored, aut);
    }

    #[test]
    fn test_truncated_header_rejected() {
        let (header, body) = encode_files(&sample()).unwrap();
        assert!(matches!(
            decode_files(&header[..10], &body),
            Err(SupraError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_truncated_body_rejected() {
        let (header, body) = encode_files(&sample()).unwrap();
        assert!(matches!(
            decode_files(&header, &body[..body.len() - 1]),
            Err(SupraError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_conflicting_configuration_flags_rejected() {
        let (header, body) = encode_files(&sample()).unwrap();
        let mut body = body;
        body[0] |= FLAG_ENABLEMENT | FLAG_DISABLEMENT;
        assert!(matches!(
            decode_files(&header, &body),
            Err(SupraError::InvalidWireFormat(_))
        ));
    }

    #[test]
    fn test_state_count_mismatch_rejected() {
        let (header, body) = encode_files(&sample()).unwrap();
        let mut body = body;
        // Clear the exists flag of state 1.
        body[0] = 0;
        assert!(matches!(
            decode_files(&header, &body),
            Err(SupraError::InvalidWireFormat(_))
        ));
    }

    #[test]
    fn test_save_and_load_files() {
        let dir = tempfile::tempdir().unwrap();
        let header_path = dir.path().join("sample.hdr");
        let body_path = dir.path().join("sample.bdy");

        let aut = sample_ustructure();
        save_to_files(&aut, &header_path, &body_path).unwrap();
        assert_eq!(load_from_files(&header_path, &body_path).unwrap(), aut);

        // Rewriting in place goes through the temp-file replacement.
        let smaller = sample();
        save_to_files(&smaller, &header_path, &body_path).unwrap();
        assert_eq!(load_from_files(&header_path, &body_path).unwrap(), smaller);
    }

    proptest! {
        #[test]
        fn prop_flags_roundtrip(marked in any::<bool>(), enablement in any::<bool>()) {
            let mut aut = Automaton::new(1);
            aut.add_event("a", vec![true], vec![true]).unwrap();
            let s = aut.add_state("s", marked);
            if let Some(state) = aut.state_mut(s) {
                state.enablement = enablement;
                state.disablement = !enablement;
            }
            let (header, body) = encode_files(&aut).unwrap();
            let restored = decode_files(&header, &body).unwrap();
            let state = restored.state(s).unwrap();
            prop_assert_eq!(state.marked, marked);
            prop_assert_eq!(state.enablement, enablement);
            prop_assert_eq!(state.disablement, !enablement);
        }
    }
}
