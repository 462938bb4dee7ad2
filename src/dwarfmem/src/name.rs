//! Composed names
//!
//! A name in memory is seven consecutive word ids (`0xFFFFFFFF` = empty
//! slot). Each id is resolved through a [`WordLookup`] and the parts are
//! joined as "The <first> <second> <adjective> <fourth> <fifth> <noun> of
//! <verb>".

use crate::driver::MemoryDriver;
use crate::instance::ProcessInstance;
use crate::VirtAddr;

use serde::Deserialize;
use std::collections::HashMap;

/// Word id marking an unused slot
pub const NO_WORD: u32 = 0xFFFF_FFFF;

/// The forms of one language word
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Word {
    pub id: u32,
    pub base: String,
    pub noun: String,
    pub plural_noun: String,
    pub adjective: String,
    pub verb: String,
    pub present_participle_verb: String,
}

/// Resolves word ids to words
pub trait WordLookup {
    fn word(&self, id: u32) -> Option<&Word>;
}

impl WordLookup for HashMap<u32, Word> {
    fn word(&self, id: u32) -> Option<&Word> {
        self.get(&id)
    }
}

/// Word table loaded from TOML:
///
/// ```toml
/// [[word]]
/// id = 1748
/// base = "boat"
/// noun = "boat"
/// plural_noun = "boats"
/// ```
#[derive(Debug, Clone, Default)]
pub struct WordTable {
    words: HashMap<u32, Word>,
}

#[derive(Deserialize)]
struct WordFile {
    #[serde(default)]
    word: Vec<Word>,
}

impl WordTable {
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let file: WordFile = toml::from_str(contents)?;
        let words = file.word.into_iter().map(|w| (w.id, w)).collect();
        Ok(Self { words })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl WordLookup for WordTable {
    fn word(&self, id: u32) -> Option<&Word> {
        self.words.get(&id)
    }
}

/// Upper-case the first character
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl<D: MemoryDriver> ProcessInstance<D> {
    /// Resolve the word id stored at `address`
    pub fn read_dwarf_word<'w, W: WordLookup>(
        &mut self,
        address: VirtAddr,
        words: &'w W,
    ) -> Option<&'w Word> {
        let id = self.read_int(address) as u32;
        if id == NO_WORD {
            return None;
        }
        let word = words.word(id);
        if word.is_none() {
            tracing::debug!("unknown word id {} at {:#x}", id, address);
        }
        word
    }

    /// Compose the seven-word name at `address`
    pub fn read_dwarf_name<W: WordLookup>(&mut self, address: VirtAddr, words: &W) -> String {
        let mut result = String::from("The");
        let push = |part: &str, result: &mut String| {
            result.push(' ');
            result.push_str(&capitalize(part));
        };

        if let Some(w) = self.read_dwarf_word(address, words) {
            push(&w.base, &mut result);
        }
        if let Some(w) = self.read_dwarf_word(address + 0x04, words) {
            push(&w.base, &mut result);
        }
        if let Some(w) = self.read_dwarf_word(address + 0x08, words) {
            push(&w.adjective, &mut result);
        }
        if let Some(w) = self.read_dwarf_word(address + 0x0C, words) {
            push(&w.base, &mut result);
        }
        if let Some(w) = self.read_dwarf_word(address + 0x10, words) {
            push(&w.base, &mut result);
        }

        let mut singular = false;
        if let Some(w) = self.read_dwarf_word(address + 0x14, words) {
            if w.plural_noun.is_empty() {
                push(&w.noun, &mut result);
                singular = true;
            } else {
                push(&w.plural_noun, &mut result);
            }
        }

        if let Some(w) = self.read_dwarf_word(address + 0x18, words) {
            let part = match (w.verb.is_empty(), singular) {
                (false, true) => &w.verb,
                (false, false) => &w.present_participle_verb,
                (true, true) => &w.noun,
                (true, false) => &w.plural_noun,
            };
            result.push_str(" of");
            push(part, &mut result);
        }

        result.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::MockDriver;
    use crate::instance::tests::instance;

    const WORDS: &str = r#"
[[word]]
id = 1
base = "urist"

[[word]]
id = 2
adjective = "golden"

[[word]]
id = 3
noun = "axe"
plural_noun = "axes"

[[word]]
id = 4
noun = "hammer"

[[word]]
id = 5
verb = "dig"
present_participle_verb = "digging"

[[word]]
id = 6
noun = "stone"
plural_noun = "stones"
"#;

    fn name_at(ids: [u32; 7]) -> String {
        let mut driver = MockDriver::new().with_zeroed(0x1000, 0x20);
        for (i, id) in ids.iter().enumerate() {
            driver.plant_u32(0x1000 + i as VirtAddr * 4, *id);
        }
        let words = WordTable::from_toml_str(WORDS).unwrap();
        instance(driver).read_dwarf_name(0x1000, &words)
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("urist"), "Urist");
        assert_eq!(capitalize("éa"), "Éa");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_word_table() {
        let words = WordTable::from_toml_str(WORDS).unwrap();
        assert_eq!(words.len(), 6);
        assert_eq!(words.word(3).unwrap().plural_noun, "axes");
        assert!(words.word(99).is_none());
    }

    #[test]
    fn test_plural_noun_takes_participle() {
        let name = name_at([NO_WORD, NO_WORD, 2, NO_WORD, NO_WORD, 3, 5]);
        assert_eq!(name, "The Golden Axes of Digging");
    }

    #[test]
    fn test_singular_noun_takes_verb() {
        let name = name_at([NO_WORD, NO_WORD, NO_WORD, NO_WORD, NO_WORD, 4, 5]);
        assert!(name.ends_with("of Dig"), "{}", name);
    }

    #[test]
    fn test_trailing_noun_without_verb() {
        assert_eq!(
            name_at([1, NO_WORD, NO_WORD, NO_WORD, NO_WORD, 4, 6]),
            "The Urist Hammer of Stone"
        );
        assert_eq!(
            name_at([NO_WORD, NO_WORD, NO_WORD, NO_WORD, NO_WORD, 3, 6]),
            "The Axes of Stones"
        );
    }

    #[test]
    fn test_empty_and_unknown_slots() {
        assert_eq!(name_at([NO_WORD; 7]), "The");
        assert_eq!(name_at([77, NO_WORD, NO_WORD, NO_WORD, NO_WORD, NO_WORD, NO_WORD]), "The");
    }
}
