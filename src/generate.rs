//! Input byte generation for the `-g XX` template.
//!
//! Each template position is a fixed hex digit, or `I` (count up),
//! `J` (count down), or `K` (random). The low nibble advances every
//! generated byte, the high nibble every sixteen.

use rand::Rng;

#[derive(Clone, Copy, Debug)]
enum Slot {
    Fixed(u8),
    Up,
    Down,
    Random,
}

impl Slot {
    fn parse(c: char) -> Result<Slot, String> {
        match c {
            'I' => Ok(Slot::Up),
            'J' => Ok(Slot::Down),
            'K' => Ok(Slot::Random),
            _ => match c.to_digit(16) {
                Some(d) => Ok(Slot::Fixed(d as u8)),
                None => Err(format!("'{c}' is not a hex digit or one of 'I', 'J', 'K'")),
            },
        }
    }

    fn value(self, counter: u8) -> u8 {
        match self {
            Slot::Fixed(d) => d,
            Slot::Up => counter,
            Slot::Down => 15 - counter,
            Slot::Random => rand::thread_rng().gen_range(0..16),
        }
    }
}

/// Generates one byte per exhausted-input cycle. Counting starts at
/// the end of stdin and wraps every 256 bytes.
#[derive(Clone, Debug)]
pub struct Generator {
    high: Slot,
    low: Slot,
    age: u8,
}

impl Generator {
    /// Parse a two-position template such as `00`, `FF`, `I5`, or `KK`.
    /// Case insensitive.
    pub fn from_template(template: &str) -> Result<Generator, String> {
        let upper = template.to_uppercase();
        let mut chars = upper.chars();
        let (Some(h), Some(l), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(format!("generator template '{template}' must be exactly two characters"));
        };
        Ok(Generator { high: Slot::parse(h)?, low: Slot::parse(l)?, age: 0 })
    }

    pub fn next_byte(&mut self) -> u8 {
        let high = self.high.value((self.age >> 4) & 15);
        let low = self.low.value(self.age & 15);
        self.age = self.age.wrapping_add(1);
        (high << 4) | low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn take(generator: &mut Generator, n: usize) -> Vec<u8> {
        (0..n).map(|_| generator.next_byte()).collect()
    }

    #[test]
    fn test_fixed_template_repeats() {
        let mut g = Generator::from_template("FF").expect("valid template");
        assert_eq!(take(&mut g, 3), vec![0xFF, 0xFF, 0xFF]);
        let mut g = Generator::from_template("00").expect("valid template");
        assert_eq!(take(&mut g, 2), vec![0x00, 0x00]);
    }

    #[test]
    fn test_case_insensitive() {
        let mut g = Generator::from_template("aB").expect("valid template");
        assert_eq!(g.next_byte(), 0xAB);
    }

    #[test]
    fn test_low_nibble_counts_up_every_byte() {
        let mut g = Generator::from_template("0I").expect("valid template");
        let bytes = take(&mut g, 18);
        assert_eq!(&bytes[..4], &[0x00, 0x01, 0x02, 0x03]);
        assert_eq!(bytes[15], 0x0F);
        // Wraps after sixteen.
        assert_eq!(bytes[16], 0x00);
        assert_eq!(bytes[17], 0x01);
    }

    #[test]
    fn test_high_nibble_counts_up_every_sixteen() {
        let mut g = Generator::from_template("I5").expect("valid template");
        let bytes = take(&mut g, 33);
        assert_eq!(bytes[0], 0x05);
        assert_eq!(bytes[15], 0x05);
        assert_eq!(bytes[16], 0x15);
        assert_eq!(bytes[32], 0x25);
    }

    #[test]
    fn test_count_down_mirrors_count_up() {
        let mut g = Generator::from_template("0J").expect("valid template");
        let bytes = take(&mut g, 3);
        assert_eq!(bytes, vec![0x0F, 0x0E, 0x0D]);
    }

    #[test]
    fn test_counting_wraps_at_256() {
        let mut g = Generator::from_template("II").expect("valid template");
        let bytes = take(&mut g, 257);
        assert_eq!(bytes[255], 0xFF);
        assert_eq!(bytes[256], 0x00);
    }

    #[test]
    fn test_random_nibble_stays_in_range() {
        let mut g = Generator::from_template("0K").expect("valid template");
        for _ in 0..64 {
            assert!(g.next_byte() <= 0x0F);
        }
    }

    #[test]
    fn test_bad_templates_rejected() {
        assert!(Generator::from_template("G0").is_err());
        assert!(Generator::from_template("0").is_err());
        assert!(Generator::from_template("000").is_err());
        assert!(Generator::from_template("").is_err());
    }
}
