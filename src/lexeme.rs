//! The lexeme registry: the total mapping from every glyph the
//! language accepts to the element it builds.
//!
//! Several kinds accept an ASCII alias alongside the box-drawing
//! glyph (`+` for `┼`, `x` for `×`, `L` for `«`); both parse to the
//! same element and display as the canonical form.

use std::collections::{BTreeMap, HashMap};

use crate::element::Dir::{East, North, South, West};
use crate::element::{Behavior, CacheMode, Dir, StorageFlavor};
use crate::board::Board;

/// What a glyph builds: the canonical display form plus a prototype
/// behavior cloned into every element parsed from it.
pub struct Template {
    pub display: char,
    pub behavior: Behavior,
}

pub struct Registry {
    map: HashMap<char, Template>,
}

const NSWE: &[Dir] = &[North, South, West, East];
const NS: &[Dir] = &[North, South];
const EW: &[Dir] = &[East, West];
const NWE: &[Dir] = &[North, West, East];
const SWE: &[Dir] = &[South, West, East];
const NSE: &[Dir] = &[North, South, East];
const NSW: &[Dir] = &[North, South, West];
const NE: &[Dir] = &[North, East];
const NW: &[Dir] = &[North, West];
const SE: &[Dir] = &[South, East];
const SW: &[Dir] = &[South, West];

const CROSS: &[Dir; 4] = &[North, South, East, West];
const SWAP_NW: &[Dir; 4] = &[North, West, South, East];
const SWAP_NE: &[Dir; 4] = &[North, East, South, West];

/// Every registration: the glyphs claiming an element, its canonical
/// display form, and the prototype behavior.
fn registrations() -> Vec<(&'static str, char, Behavior)> {
    let mut entries = vec![
        (" ", ' ', Behavior::Empty),
        // Wires, box-drawing canonical with ASCII aliases.
        ("+┼", '┼', Behavior::Wire { sides: NSWE }),
        ("|│", '│', Behavior::Wire { sides: NS }),
        ("-─", '─', Behavior::Wire { sides: EW }),
        ("^┴", '┴', Behavior::Wire { sides: NWE }),
        ("v┬", '┬', Behavior::Wire { sides: SWE }),
        (">├", '├', Behavior::Wire { sides: NSE }),
        ("<┤", '┤', Behavior::Wire { sides: NSW }),
        ("`└", '└', Behavior::Wire { sides: NE }),
        ("'┘", '┘', Behavior::Wire { sides: NW }),
        (",┌", '┌', Behavior::Wire { sides: SE }),
        (".┐", '┐', Behavior::Wire { sides: SW }),
        ("×x", '×', Behavior::WireSpecial { order: CROSS }),
        ("«L", '«', Behavior::WireSpecial { order: SWAP_NW }),
        ("»R", '»', Behavior::WireSpecial { order: SWAP_NE }),
        ("→", '→', Behavior::Diode { from: West, to: East }),
        ("←", '←', Behavior::Diode { from: East, to: West }),
        ("↓", '↓', Behavior::Diode { from: North, to: South }),
        ("↑", '↑', Behavior::Diode { from: South, to: North }),
        ("*", '*', Behavior::Source),
        ("!", '!', Behavior::Pulse),
        ("?", '?', Behavior::random()),
        // Gates: the mirrored glyph swaps the output and input sides.
        ("#", '#', Behavior::Adder { out: East, input: West }),
        ("@", '@', Behavior::Adder { out: West, input: East }),
        ("]", ']', Behavior::And { out: East, input: West }),
        ("[", '[', Behavior::And { out: West, input: East }),
        (")", ')', Behavior::Or { out: East, input: West }),
        ("(", '(', Behavior::Or { out: West, input: East }),
        ("}", '}', Behavior::Xor { out: East, input: West }),
        ("{", '{', Behavior::Xor { out: West, input: East }),
        ("⌐~", '⌐', Behavior::Not { out: East, input: West }),
        ("¬÷", '¬', Behavior::Not { out: West, input: East }),
        ("/", '/', Behavior::Switch { trigger: 1 }),
        ("\\", '\\', Behavior::Switch { trigger: 0 }),
        ("K", 'K', Behavior::cache(CacheMode::Broadcast)),
        ("k", 'k', Behavior::cache(CacheMode::Feed)),
        ("Z", 'Z', Behavior::delay(East, West)),
        ("z", 'z', Behavior::delay(West, East)),
        ("M", 'M', Behavior::memory(East, West)),
        ("m", 'm', Behavior::memory(West, East)),
        ("T", 'T', Behavior::Control { bits: Board::WRITE_HOLD | Board::TERMINATE }),
        ("t", 't', Behavior::Control { bits: Board::TERMINATE }),
        ("S", 'S', Behavior::Control { bits: Board::WRITE_HOLD }),
        ("s", 's', Behavior::Control { bits: Board::READ_HOLD }),
        ("X", 'X', Behavior::Debug),
        ("$", '$', Behavior::Sleep),
        ("P", 'P', Behavior::Pause { scale: 1.0 }),
        ("p", 'p', Behavior::Pause { scale: 1.0 / 256.0 }),
        ("9", '9', Behavior::StorageControl { flavor: StorageFlavor::Write }),
        ("8", '8', Behavior::StorageControl { flavor: StorageFlavor::Read }),
        ("O", 'O', Behavior::Pin),
        ("o", 'o', Behavior::Pin),
        ("V", 'V', Behavior::bookmark()),
    ];
    for (index, glyph) in "ABCDEFGH".chars().enumerate() {
        entries.push((&STATIC_IN[index..index + 1], glyph, Behavior::InBit { index }));
    }
    for (index, glyph) in "abcdefgh".chars().enumerate() {
        entries.push((&STATIC_OUT[index..index + 1], glyph, Behavior::OutBit { index }));
    }
    for (index, glyph) in "01234567".chars().enumerate() {
        entries.push((&STATIC_STORE[index..index + 1], glyph, Behavior::StorageBit { index }));
    }
    entries
}

const STATIC_IN: &str = "ABCDEFGH";
const STATIC_OUT: &str = "abcdefgh";
const STATIC_STORE: &str = "01234567";

impl Registry {
    /// Build and validate the registry. A glyph claimed by two
    /// different kinds is a startup error, never a runtime one.
    pub fn build() -> Result<Registry, Vec<String>> {
        let mut map: HashMap<char, Template> = HashMap::new();
        let mut errors = Vec::new();
        for (glyphs, display, behavior) in registrations() {
            for glyph in glyphs.chars() {
                if let Some(previous) = map.get(&glyph) {
                    if previous.behavior.kind_name() != behavior.kind_name() {
                        errors.push(format!(
                            "the lexeme '{}' is claimed by both {} and {}",
                            glyph,
                            previous.behavior.kind_name(),
                            behavior.kind_name(),
                        ));
                    }
                    continue;
                }
                map.insert(glyph, Template { display, behavior: behavior.clone() });
            }
        }
        if errors.is_empty() {
            Ok(Registry { map })
        } else {
            Err(errors)
        }
    }

    pub fn get(&self, glyph: char) -> Option<&Template> {
        self.map.get(&glyph)
    }

    pub fn contains(&self, glyph: char) -> bool {
        self.map.contains_key(&glyph)
    }

    /// The `supported elements` table appended to `--help`.
    pub fn element_table(&self) -> String {
        let mut by_kind: BTreeMap<&'static str, Vec<char>> = BTreeMap::new();
        for (glyph, template) in &self.map {
            by_kind.entry(template.behavior.kind_name()).or_default().push(*glyph);
        }
        let justify = by_kind.keys().map(|name| name.len()).max().unwrap_or(0) + 2;
        let mut out = String::from("supported elements:\n");
        out.push_str(&format!("  {:justify$}Lexemes\n", "Type"));
        for (name, mut glyphs) in by_kind {
            glyphs.sort();
            let list: Vec<String> = glyphs.iter().map(|g| g.to_string()).collect();
            out.push_str(&format!("  {:justify$}{}\n", name, list.join(" ")));
        }
        out
    }
}
