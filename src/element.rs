//! The Chip instruction set: one element per grid cell.
//!
//! An element answers lateral `poll` requests from its neighbors
//! (a combinational 0/1 read on one of its sides) and, for the
//! stateful kinds, performs one `poll_internal` commit per clock
//! cycle in the board's priority order. All per-cycle state lives
//! in `Cell`s so that the mutually recursive poll chains only ever
//! need a shared reference to the board.

use std::cell::Cell;

use crate::board::Board;

/// Grid directions. `Up`/`Down` cross layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dir {
    North,
    South,
    East,
    West,
    Up,
    Down,
}

impl Dir {
    pub fn opposite(self) -> Dir {
        match self {
            Dir::North => Dir::South,
            Dir::South => Dir::North,
            Dir::East => Dir::West,
            Dir::West => Dir::East,
            Dir::Up => Dir::Down,
            Dir::Down => Dir::Up,
        }
    }

    /// Offset applied to `(x, y, z)`. North is -y, up is -z.
    pub fn offset(self) -> (isize, isize, isize) {
        match self {
            Dir::North => (0, -1, 0),
            Dir::South => (0, 1, 0),
            Dir::East => (1, 0, 0),
            Dir::West => (-1, 0, 0),
            Dir::Up => (0, 0, -1),
            Dir::Down => (0, 0, 1),
        }
    }

    fn lateral_index(self) -> Option<usize> {
        match self {
            Dir::North => Some(0),
            Dir::South => Some(1),
            Dir::West => Some(2),
            Dir::East => Some(3),
            _ => None,
        }
    }
}

use Dir::{Down, East, North, South, Up, West};

/// Poll order used by the internal-poll kinds.
const LATERAL: [Dir; 4] = [North, South, West, East];

/// Storage control flavor: `9` drives the write control, `8` the read control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageFlavor {
    Read,
    Write,
}

/// `K` caches and rebroadcasts the other three sides; `k` caches the
/// straight-through side only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheMode {
    Broadcast,
    Feed,
}

const SLEEP_RAMP: [f64; 5] = [0.0, 0.1, 0.25, 0.5, 1.0];

/// The behavior of one cell, flavor data included. State cells are
/// per-element and survive for the whole run; the memoized kinds
/// compare their stamp against the board age to stay cycle-local.
#[derive(Clone, Debug)]
pub enum Behavior {
    Empty,
    Wire { sides: &'static [Dir] },
    WireSpecial { order: &'static [Dir; 4] },
    Diode { from: Dir, to: Dir },
    Source,
    Pulse,
    Random { age: Cell<u64>, value: Cell<u8> },
    InBit { index: usize },
    OutBit { index: usize },
    Adder { out: Dir, input: Dir },
    And { out: Dir, input: Dir },
    Or { out: Dir, input: Dir },
    Xor { out: Dir, input: Dir },
    Not { out: Dir, input: Dir },
    Switch { trigger: u8 },
    Cache { mode: CacheMode, ages: [Cell<u64>; 4], values: [Cell<u8>; 4] },
    Delay { out: Dir, input: Dir, age: Cell<u64>, curr: Cell<u8>, next: Cell<u8> },
    Memory { out: Dir, input: Dir, value: Cell<u8> },
    Control { bits: u8 },
    Debug,
    Sleep,
    Pause { scale: f64 },
    StorageControl { flavor: StorageFlavor },
    StorageBit { index: usize },
    Pin,
    Bookmark { state: Cell<u8>, mark: Cell<u64> },
}

impl Behavior {
    pub fn random() -> Behavior {
        Behavior::Random { age: Cell::new(0), value: Cell::new(0) }
    }

    pub fn cache(mode: CacheMode) -> Behavior {
        Behavior::Cache {
            mode,
            ages: Default::default(),
            values: Default::default(),
        }
    }

    pub fn delay(out: Dir, input: Dir) -> Behavior {
        Behavior::Delay {
            out,
            input,
            age: Cell::new(0),
            curr: Cell::new(0),
            next: Cell::new(0),
        }
    }

    pub fn memory(out: Dir, input: Dir) -> Behavior {
        Behavior::Memory { out, input, value: Cell::new(0) }
    }

    pub fn bookmark() -> Behavior {
        Behavior::Bookmark { state: Cell::new(0), mark: Cell::new(0) }
    }

    /// Class name shown in the `--help` element table and in registry
    /// conflict reports.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Behavior::Empty => "Empty",
            Behavior::Wire { .. } => "Wire",
            Behavior::WireSpecial { .. } => "WireSpecial",
            Behavior::Diode { .. } => "Diode",
            Behavior::Source => "Source",
            Behavior::Pulse => "Pulse",
            Behavior::Random { .. } => "Random",
            Behavior::InBit { .. } => "InBit",
            Behavior::OutBit { .. } => "OutBit",
            Behavior::Adder { .. } => "Adder",
            Behavior::And { .. } => "And",
            Behavior::Or { .. } => "Or",
            Behavior::Xor { .. } => "Xor",
            Behavior::Not { .. } => "Not",
            Behavior::Switch { .. } => "Switch",
            Behavior::Cache { .. } => "Cache",
            Behavior::Delay { .. } => "Delay",
            Behavior::Memory { .. } => "Memory",
            Behavior::Control { .. } => "Control",
            Behavior::Debug => "Debug",
            Behavior::Sleep => "Sleep",
            Behavior::Pause { .. } => "Pause",
            Behavior::StorageControl { .. } => "StorageControl",
            Behavior::StorageBit { .. } => "StorageBit",
            Behavior::Pin => "Pin",
            Behavior::Bookmark { .. } => "Bookmark",
        }
    }

    /// Firing group for the once-per-cycle internal poll, or `None`
    /// for purely combinational kinds. Lower fires earlier; storage
    /// prepare/finalize bracket the whole list on the board side.
    pub(crate) fn priority_group(&self) -> Option<usize> {
        match self {
            Behavior::StorageControl { .. } => Some(0),
            Behavior::StorageBit { .. } => Some(1),
            Behavior::Memory { .. } => Some(2),
            Behavior::Sleep => Some(3),
            Behavior::Pause { .. } => Some(4),
            Behavior::Delay { .. } => Some(5),
            Behavior::Bookmark { .. } => Some(6),
            Behavior::Control { .. } => Some(7),
            Behavior::OutBit { .. } => Some(8),
            Behavior::Debug => Some(9),
            _ => None,
        }
    }
}

/// The number of internal-poll firing groups.
pub(crate) const PRIORITY_GROUPS: usize = 10;

/// One parsed grid cell.
pub struct Element {
    pub behavior: Behavior,
    /// Canonical display glyph (`+` parses to `┼`, `x` to `×`, ...).
    pub lexeme: char,
    pub x: usize,
    pub y: usize,
    pub z: usize,
    /// Diagnostic poll counter driving the heatmap; not semantic.
    pub calls: Cell<u64>,
}

impl Element {
    pub fn new(behavior: Behavior, lexeme: char, x: usize, y: usize, z: usize) -> Element {
        Element { behavior, lexeme, x, y, z, calls: Cell::new(0) }
    }

    pub fn is_storage_bit(&self) -> bool {
        matches!(self.behavior, Behavior::StorageBit { .. })
    }

    fn is_pin(&self) -> bool {
        matches!(self.behavior, Behavior::Pin)
    }

    fn add_debug(&self, board: &Board, message: String) {
        board.add_debug(self.lexeme, self.z, self.y, self.x, message);
    }

    /// Poll the neighbor in `dir`, asking for the side that faces us.
    /// Off-grid reads 0, an unconnected side reads 0, and the soft
    /// recursion cap reads 0 with an overflow diagnostic.
    pub fn poll_neighbor(&self, board: &Board, dir: Dir) -> u8 {
        let Some(neighbor) = board.neighbor(self, dir) else {
            return 0;
        };
        board.stats.poll_neighbor.bump();
        if !board.enter_poll() {
            self.add_debug(board, "Giving up due to stack overflow".to_string());
            return 0;
        }
        let value = neighbor.poll(board, dir.opposite());
        board.exit_poll();
        match value {
            Some(v) => {
                neighbor.calls.set(neighbor.calls.get() + 1);
                v
            }
            None => 0,
        }
    }

    /// Short-circuit OR over the four lateral neighbors.
    fn or_lateral(&self, board: &Board) -> u8 {
        for dir in LATERAL {
            if self.poll_neighbor(board, dir) == 1 {
                return 1;
            }
        }
        0
    }

    /// Combinational read on `side`. `None` means no connection there.
    pub fn poll(&self, board: &Board, side: Dir) -> Option<u8> {
        match &self.behavior {
            Behavior::Empty => None,

            Behavior::Wire { sides } => {
                if !sides.contains(&side) {
                    return None;
                }
                let mut value = 0;
                for &dir in sides.iter() {
                    if dir != side {
                        value = value | self.poll_neighbor(board, dir);
                    }
                    if value == 1 {
                        break;
                    }
                }
                Some(value)
            }

            Behavior::WireSpecial { order } => {
                let i = order.iter().position(|&d| d == side)?;
                Some(self.poll_neighbor(board, order[i ^ 1]))
            }

            Behavior::Diode { from, to } => {
                if side == *to {
                    Some(self.poll_neighbor(board, *from))
                } else {
                    None
                }
            }

            Behavior::Source => side.lateral_index().map(|_| 1),

            Behavior::Pulse => {
                // Age zero is the setup cycle, so pulse at age one.
                side.lateral_index().map(|_| u8::from(board.age() == 1))
            }

            Behavior::Random { age, value } => {
                side.lateral_index()?;
                if age.get() != board.age() {
                    value.set(rand::random::<bool>() as u8);
                    age.set(board.age());
                }
                Some(value.get())
            }

            Behavior::InBit { index } => {
                side.lateral_index()?;
                Some(board.read_bit(*index))
            }

            Behavior::Adder { out, input } => {
                if side == *out {
                    Some(self.poll_neighbor(board, North) ^ self.poll_neighbor(board, *input))
                } else if side == South {
                    // Carry.
                    if self.poll_neighbor(board, North) == 1 {
                        Some(self.poll_neighbor(board, *input))
                    } else {
                        Some(0)
                    }
                } else {
                    None
                }
            }

            Behavior::And { out, input } => {
                if side == *out {
                    let a = self.or_vertical(board);
                    if a == 1 {
                        Some(self.poll_neighbor(board, *input))
                    } else {
                        Some(0)
                    }
                } else {
                    self.pass_through(board, side)
                }
            }

            Behavior::Or { out, input } => {
                if side == *out {
                    let a = self.or_vertical(board);
                    if a == 1 {
                        Some(1)
                    } else {
                        Some(self.poll_neighbor(board, *input))
                    }
                } else {
                    self.pass_through(board, side)
                }
            }

            Behavior::Xor { out, input } => {
                if side == *out {
                    let a = self.or_vertical(board);
                    Some(a ^ self.poll_neighbor(board, *input))
                } else {
                    self.pass_through(board, side)
                }
            }

            Behavior::Not { out, input } => {
                if side == *out {
                    Some(1 - self.poll_neighbor(board, *input))
                } else {
                    None
                }
            }

            Behavior::Switch { trigger } => match side {
                North | South => self.pass_through(board, side),
                West | East => {
                    let a = self.or_vertical(board);
                    if a == *trigger {
                        Some(self.poll_neighbor(board, side.opposite()))
                    } else {
                        Some(0)
                    }
                }
                _ => None,
            },

            Behavior::Cache { mode, ages, values } => {
                side.lateral_index()?;
                let mut out = 0;
                for dir in cache_sources(*mode, side) {
                    let i = dir.lateral_index().unwrap_or(0);
                    if ages[i].get() != board.age() {
                        ages[i].set(board.age());
                        values[i].set(self.poll_neighbor(board, dir));
                        board.stats.cache_miss.bump();
                    } else {
                        board.stats.cache_hit.bump();
                    }
                    out = out | values[i].get();
                }
                Some(out)
            }

            Behavior::Delay { out, age, curr, next, .. } => {
                if side == South || side == *out {
                    if age.get() == board.age() {
                        Some(curr.get())
                    } else {
                        Some(next.get())
                    }
                } else {
                    None
                }
            }

            Behavior::Memory { out, value, .. } => {
                if side == *out {
                    // A read re-runs the latch so writes earlier in the
                    // same cycle are visible.
                    self.poll_internal(board);
                    Some(value.get())
                } else {
                    self.pass_through(board, side)
                }
            }

            Behavior::StorageBit { index } => {
                side.lateral_index()?;
                Some(board.read_storage_bit(*index))
            }

            Behavior::Pin => Some(self.poll_pin(board, side)),

            // Internal-poll kinds present no combinational sides.
            Behavior::OutBit { .. }
            | Behavior::Control { .. }
            | Behavior::Debug
            | Behavior::Sleep
            | Behavior::Pause { .. }
            | Behavior::StorageControl { .. }
            | Behavior::Bookmark { .. } => None,
        }
    }

    /// North answers with south and vice versa; other sides are open.
    fn pass_through(&self, board: &Board, side: Dir) -> Option<u8> {
        match side {
            North => Some(self.poll_neighbor(board, South)),
            South => Some(self.poll_neighbor(board, North)),
            _ => None,
        }
    }

    fn or_vertical(&self, board: &Board) -> u8 {
        if self.poll_neighbor(board, North) == 1 {
            1
        } else {
            self.poll_neighbor(board, South)
        }
    }

    /// Pins connect to non-pins always, and to other pins only when
    /// the glyph matches across layers or differs within a layer.
    fn poll_pin(&self, board: &Board, side: Dir) -> u8 {
        let mut value = 0;
        for dir in [Up, Down] {
            if value == 1 {
                break;
            }
            if dir == side {
                continue;
            }
            let linked = match board.neighbor(self, dir) {
                Some(n) => !n.is_pin() || n.lexeme == self.lexeme,
                None => true,
            };
            if linked {
                value = value | self.poll_neighbor(board, dir);
            }
        }
        for dir in LATERAL {
            if value == 1 {
                break;
            }
            if dir == side {
                continue;
            }
            let linked = match board.neighbor(self, dir) {
                Some(n) => !n.is_pin() || n.lexeme != self.lexeme,
                None => true,
            };
            if linked {
                value = value | self.poll_neighbor(board, dir);
            }
        }
        value
    }

    /// Once-per-cycle commit for the registered kinds. Safe to call
    /// again within a cycle only where a kind says so (`Memory`).
    pub fn poll_internal(&self, board: &Board) {
        match &self.behavior {
            Behavior::OutBit { index } => {
                if board.check_status(Board::WRITE_HOLD) != 0 {
                    // Held output is dropped anyway; skip the polling.
                    return;
                }
                let value = self.or_lateral(board);
                board.write_bit(*index, value);
            }

            Behavior::Control { bits } => {
                if board.check_status(*bits) == *bits {
                    // Already raised this cycle, nothing to learn.
                    return;
                }
                if self.or_lateral(board) == 1 {
                    board.add_status(*bits);
                }
            }

            Behavior::Debug => {
                let value = self.or_lateral(board);
                self.add_debug(board, value.to_string());
            }

            Behavior::Sleep => {
                let idx: usize = LATERAL
                    .iter()
                    .map(|&d| self.poll_neighbor(board, d) as usize)
                    .sum();
                board.add_sleep(SLEEP_RAMP[idx]);
            }

            Behavior::Pause { scale } => {
                if self.or_lateral(board) == 1 {
                    let mut peek: u32 = 0;
                    for i in (0..8).rev() {
                        peek = (peek << 1) | board.read_storage_bit(i) as u32;
                    }
                    board.add_sleep(peek as f64 * scale);
                }
            }

            Behavior::StorageControl { flavor } => {
                let value = self.or_lateral(board);
                board.set_storage_control(*flavor, board.index_of(self.x, self.y, self.z), value);
            }

            Behavior::StorageBit { index } => {
                // The write control is latched before this group fires.
                if board.storage_control_active(StorageFlavor::Write) {
                    let mut value = 0;
                    for dir in LATERAL {
                        // Adjacent storage bits read 0 to avoid self-loops.
                        let same_kind = board
                            .neighbor(self, dir)
                            .is_some_and(|n| n.is_storage_bit());
                        if !same_kind && self.poll_neighbor(board, dir) == 1 {
                            value = 1;
                            break;
                        }
                    }
                    board.write_storage_bit(*index, value);
                }
            }

            Behavior::Memory { out: _, input, value } => {
                if self.or_vertical(board) == 1 {
                    value.set(self.poll_neighbor(board, *input));
                }
            }

            Behavior::Delay { input, age, curr, next, .. } => {
                if age.get() != board.age() {
                    curr.set(next.get());
                    age.set(board.age());
                    let latched = if self.poll_neighbor(board, North) == 1 {
                        1
                    } else {
                        self.poll_neighbor(board, *input)
                    };
                    next.set(latched);
                }
            }

            Behavior::Bookmark { state, mark } => {
                let value = self.or_lateral(board);
                if state.get() != value {
                    state.set(value);
                    if value == 1 {
                        mark.set(board.age());
                    } else {
                        let distance = board.age() + 1 - mark.get();
                        board.set_jump(-(distance as i64));
                    }
                }
            }

            _ => {}
        }
    }
}

fn cache_sources(mode: CacheMode, side: Dir) -> Vec<Dir> {
    match mode {
        // The other three, in n/s/e/w order.
        CacheMode::Broadcast => [North, South, East, West]
            .into_iter()
            .filter(|&d| d != side)
            .collect(),
        CacheMode::Feed => match side.lateral_index() {
            Some(_) => vec![side.opposite()],
            None => Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, StorageMode};
    use crate::lexeme::Registry;
    use crate::parser;

    fn board(spec: &str) -> Board {
        let registry = Registry::build().expect("registry is consistent");
        let (layout, warnings) = parser::parse(spec, &registry);
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
        Board::new(layout, &registry, StorageMode::Stack)
    }

    fn run_byte(board: &mut Board, byte: u8) -> u8 {
        let result = board.run(crate::driver::byte_to_bits(byte));
        crate::driver::bits_to_byte(&result.outbits)
    }

    #[test]
    fn test_source_drives_outbit() {
        let mut b = board("*-a");
        assert_eq!(run_byte(&mut b, 0x00), 0x01);
        assert_eq!(run_byte(&mut b, 0xFF), 0x01);
    }

    #[test]
    fn test_empty_does_not_conduct() {
        let mut b = board("* a");
        assert_eq!(run_byte(&mut b, 0xFF), 0x00);
    }

    #[test]
    fn test_inbit_echo() {
        let mut b = board("Aa\nBb\nCc\nDd\nEe\nFf\nGg\nHh");
        assert_eq!(run_byte(&mut b, 0x48), 0x48);
        assert_eq!(run_byte(&mut b, 0x69), 0x69);
        assert_eq!(run_byte(&mut b, 0x00), 0x00);
    }

    #[test]
    fn test_pulse_fires_only_on_first_cycle() {
        let mut b = board("!-a");
        assert_eq!(run_byte(&mut b, 0), 0x01);
        assert_eq!(run_byte(&mut b, 0), 0x00);
        assert_eq!(run_byte(&mut b, 0), 0x00);
    }

    #[test]
    fn test_diode_conducts_one_way() {
        // Forward: `→` carries its west neighbor to its east side.
        let mut b = board("*→a");
        assert_eq!(run_byte(&mut b, 0), 0x01);
        // Facing away: `←` only answers on its west side.
        let mut b = board("*←a");
        assert_eq!(run_byte(&mut b, 0), 0x00);
    }

    #[test]
    fn test_not_gate() {
        // A feeds the inverter, output on its east side.
        let mut b = board("A~a");
        assert_eq!(run_byte(&mut b, 0x00), 0x01);
        assert_eq!(run_byte(&mut b, 0x01), 0x00);
    }

    #[test]
    fn test_and_gate_truth_table() {
        // B on top, A on the west input, result east.
        let mut b = board(" B\nA]a");
        assert_eq!(run_byte(&mut b, 0b00), 0x00);
        assert_eq!(run_byte(&mut b, 0b01), 0x00);
        assert_eq!(run_byte(&mut b, 0b10), 0x00);
        assert_eq!(run_byte(&mut b, 0b11), 0x01);
    }

    #[test]
    fn test_or_gate_truth_table() {
        let mut b = board(" B\nA)a");
        assert_eq!(run_byte(&mut b, 0b00), 0x00);
        assert_eq!(run_byte(&mut b, 0b01), 0x01);
        assert_eq!(run_byte(&mut b, 0b10), 0x01);
        assert_eq!(run_byte(&mut b, 0b11), 0x01);
    }

    #[test]
    fn test_xor_gate_truth_table() {
        let mut b = board(" B\nA}a");
        assert_eq!(run_byte(&mut b, 0b00), 0x00);
        assert_eq!(run_byte(&mut b, 0b01), 0x01);
        assert_eq!(run_byte(&mut b, 0b10), 0x01);
        assert_eq!(run_byte(&mut b, 0b11), 0x00);
    }

    #[test]
    fn test_adder_sum_and_carry() {
        // North bit B, west bit A; sum on the east side, carry south.
        let mut b = board(" B\nA#a\n `b");
        assert_eq!(run_byte(&mut b, 0b00), 0b00);
        assert_eq!(run_byte(&mut b, 0b01), 0b01);
        assert_eq!(run_byte(&mut b, 0b10), 0b01);
        assert_eq!(run_byte(&mut b, 0b11), 0b10);
    }

    #[test]
    fn test_switch_closed_when_trigger_matches() {
        // B gates A through `/` (closed on 1) to the output.
        let mut b = board(" B\nA/a");
        assert_eq!(run_byte(&mut b, 0b01), 0x00);
        assert_eq!(run_byte(&mut b, 0b11), 0x01);
        assert_eq!(run_byte(&mut b, 0b10), 0x00);
        // `\` is closed on 0 instead.
        let mut b = board(" B\nA\\a");
        assert_eq!(run_byte(&mut b, 0b01), 0x01);
        assert_eq!(run_byte(&mut b, 0b11), 0x00);
    }

    #[test]
    fn test_delay_returns_previous_cycle() {
        let mut b = board("A-Z-a");
        assert_eq!(run_byte(&mut b, 0xFF), 0x00);
        assert_eq!(run_byte(&mut b, 0x00), 0x01);
        assert_eq!(run_byte(&mut b, 0x00), 0x00);
    }

    #[test]
    fn test_memory_latches_while_enabled() {
        // B enables the latch from the north, A is the datum.
        let mut b = board(" B\nAMa");
        assert_eq!(run_byte(&mut b, 0b11), 0x01);
        // Disabled: holds the stored 1 regardless of A.
        assert_eq!(run_byte(&mut b, 0b00), 0x01);
        assert_eq!(run_byte(&mut b, 0b01), 0x01);
        // Re-enabled with A low: stores 0.
        assert_eq!(run_byte(&mut b, 0b10), 0x00);
        assert_eq!(run_byte(&mut b, 0b00), 0x00);
    }

    #[test]
    fn test_wire_cross_is_two_independent_paths() {
        // Vertical path: A over the cross, output below.
        // Horizontal path: B into the cross, output east.
        let spec = " A \nBxb\n a ";
        let mut b = board(spec);
        assert_eq!(run_byte(&mut b, 0b01), 0b01);
        assert_eq!(run_byte(&mut b, 0b10), 0b10);
        assert_eq!(run_byte(&mut b, 0b11), 0b11);
    }

    #[test]
    fn test_wire_corner_turns() {
        let mut b = board("A.\n a");
        // `.` joins south and west: the input turns the corner.
        assert_eq!(run_byte(&mut b, 0b01), 0b01);
        assert_eq!(run_byte(&mut b, 0b00), 0b00);
    }

    #[test]
    fn test_swap_wires_pair_perpendicular_sides() {
        // `«` pairs n<->w: reading its west side returns its north neighbor.
        let mut b = board(" A\na«");
        assert_eq!(run_byte(&mut b, 0b01), 0b01);
        assert_eq!(run_byte(&mut b, 0b00), 0b00);
        // `»` pairs s<->w: reading its south side returns its west neighbor.
        let mut b = board("A»\n a");
        assert_eq!(run_byte(&mut b, 0b01), 0b01);
    }

    #[test]
    fn test_cache_feed_passes_straight_through() {
        let mut b = board("Aka");
        assert_eq!(run_byte(&mut b, 0b01), 0b01);
        assert_eq!(run_byte(&mut b, 0b00), 0b00);
    }

    #[test]
    fn test_cache_broadcast_ors_other_sides() {
        let mut b = board(" A\nBKa");
        assert_eq!(run_byte(&mut b, 0b01), 0b01);
        assert_eq!(run_byte(&mut b, 0b10), 0b01);
        assert_eq!(run_byte(&mut b, 0b00), 0b00);
    }

    #[test]
    fn test_cache_memoizes_within_a_cycle() {
        let mut b = board("?Ka\n `b");
        for _ in 0..32 {
            let result = b.run([0; 8]);
            // Both outputs read the random source through the cache in
            // the same cycle and must agree.
            assert_eq!(result.outbits[0], result.outbits[1]);
        }
    }

    #[test]
    fn test_storage_bit_reads_head_unconditionally() {
        // No read control anywhere: the head is still visible.
        let mut b = board("0-a");
        let result = b.run([0; 8]);
        assert_eq!(result.outbits[0], 0);
        // Push a word with bit 0 set, then observe it on the next cycle.
        let mut b = board("!9\n\n!0\n0-a");
        b.run([0; 8]);
        assert_eq!(b.storage_len(), 1);
        let result = b.run([0; 8]);
        assert_eq!(result.outbits[0], 1);
    }

    #[test]
    fn test_pin_bridges_layers() {
        // Same glyph on two layers: the source on layer 0 reaches the
        // output on layer 1 through the pin pair.
        let mut b = board("*O\n=\n O\n a");
        assert_eq!(run_byte(&mut b, 0), 0x01);
        // Different glyphs across layers do not connect.
        let mut b = board("*O\n=\n o\n a");
        assert_eq!(run_byte(&mut b, 0), 0x00);
    }

    #[test]
    fn test_pin_same_layer_needs_different_glyph() {
        let mut b = board("*Oo-a");
        assert_eq!(run_byte(&mut b, 0), 0x01);
        let mut b = board("*OO-a");
        assert_eq!(run_byte(&mut b, 0), 0x00);
    }

    #[test]
    fn test_control_terminate() {
        let mut b = board("*-t");
        let result = b.run([0; 8]);
        assert_ne!(result.status & Board::TERMINATE, 0);
        assert_eq!(result.status & Board::WRITE_HOLD, 0);
    }

    #[test]
    fn test_control_t_raises_write_hold_too() {
        let mut b = board("*-T");
        let result = b.run([0; 8]);
        assert_ne!(result.status & Board::TERMINATE, 0);
        assert_ne!(result.status & Board::WRITE_HOLD, 0);
    }

    #[test]
    fn test_write_hold_suppresses_outbit() {
        // S raises WRITE_HOLD before the output group fires.
        let mut b = board("*-S\n*-a");
        let result = b.run([0; 8]);
        assert_ne!(result.status & Board::WRITE_HOLD, 0);
        assert_eq!(result.outbits, [0; 8]);
    }

    #[test]
    fn test_sleep_ramp_indexed_by_active_neighbors() {
        let mut b = board("*$*");
        let result = b.run([0; 8]);
        assert!((result.sleep - 0.25).abs() < 1e-9);
        let mut b = board("*$");
        let result = b.run([0; 8]);
        assert!((result.sleep - 0.1).abs() < 1e-9);
        let mut b = board(" $ ");
        let result = b.run([0; 8]);
        assert_eq!(result.sleep, 0.0);
    }

    #[test]
    fn test_pause_scales_storage_head() {
        // Cycle 1 pushes 0x03; cycle 2 the pause reads it via the head.
        let mut b = board("!9\n\n!0\n!1\n\n*P");
        let r1 = b.run([0; 8]);
        assert_eq!(r1.sleep, 0.0);
        let r2 = b.run([0; 8]);
        assert!((r2.sleep - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_bookmark_requests_backward_jump() {
        let mut b = board("AV");
        assert_eq!(b.run(crate::driver::byte_to_bits(0)).jump, None);
        assert_eq!(b.run(crate::driver::byte_to_bits(0)).jump, None);
        // Rising edge at age 3.
        assert_eq!(b.run(crate::driver::byte_to_bits(1)).jump, None);
        assert_eq!(b.run(crate::driver::byte_to_bits(1)).jump, None);
        // Falling edge at age 5: distance 5 + 1 - 3.
        assert_eq!(b.run(crate::driver::byte_to_bits(0)).jump, Some(-3));
        assert_eq!(b.run(crate::driver::byte_to_bits(0)).jump, None);
    }

    #[test]
    fn test_debug_element_reports_value() {
        let mut b = board("*X");
        let result = b.run([0; 8]);
        assert_eq!(result.debug.len(), 1);
        assert_eq!(result.debug[0].lexeme, 'X');
        assert_eq!(result.debug[0].message, "1");
    }

    #[test]
    fn test_feedback_ring_hits_the_poll_cap() {
        // A closed wire ring has no driver; the recursion cap unwinds
        // it to 0 instead of overflowing the stack.
        let mut b = board(",.\n`+a");
        let result = b.run([0; 8]);
        assert_eq!(result.outbits, [0; 8]);
        assert!(b.stats.poll_overflow.get() > 0);
        // The overflow leaves a breadcrumb in the cycle's debug records.
        assert!(result
            .debug
            .iter()
            .any(|d| d.message.contains("stack overflow")));
    }
}
