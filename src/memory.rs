//! Data memory of the machine.

use crate::Word;
use isa::DataWord;
use std::collections::HashMap;

/// Sparse word-addressed memory. Reading an address that was never written
/// returns 0, which is how reserved buffers appear zero-initialized without
/// materializing every word.
pub struct DataMemory {
    words: HashMap<Word, Word>,
}

impl DataMemory {
    /// Builds the memory preloaded with the image's data words at
    /// addresses 0, 1, 2, …
    pub fn new(image: &[DataWord]) -> DataMemory {
        let words = image
            .iter()
            .enumerate()
            .map(|(address, word)| (address as Word, word.value))
            .collect();

        DataMemory { words }
    }

    pub fn read(&self, address: Word) -> Word {
        self.words.get(&address).cloned().unwrap_or(0)
    }

    pub fn write(&mut self, address: Word, value: Word) {
        self.words.insert(address, value);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn absent_address_reads_zero() {
        let memory = DataMemory::new(&[]);
        assert_eq!(memory.read(12345), 0);
    }

    #[test]
    fn image_words_are_preloaded() {
        let image = vec![
            DataWord {
                value: 104,
                identifier: Some(String::from("hi")),
            },
            DataWord {
                value: 105,
                identifier: None,
            },
            DataWord {
                value: 0,
                identifier: None,
            },
        ];

        let memory = DataMemory::new(&image);

        assert_eq!(memory.read(0), 104);
        assert_eq!(memory.read(1), 105);
        assert_eq!(memory.read(2), 0);
    }

    #[test]
    fn write_then_read() {
        let mut memory = DataMemory::new(&[]);

        memory.write(4095, 77);

        assert_eq!(memory.read(4095), 77);
        assert_eq!(memory.read(4094), 0);
    }
}
