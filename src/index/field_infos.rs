use std::collections::HashMap;

use crate::core::error::{Error, Result};
use crate::core::types::{Document, TermVector};
use crate::storage::directory::Directory;

const INDEXED: u8 = 0x1;
const STORE_TERM_VECTOR: u8 = 0x2;
const STORE_POSITIONS: u8 = 0x4;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub number: u32,
    pub indexed: bool,
    pub term_vector: TermVector,
}

impl FieldInfo {
    pub fn stores_term_vector(&self) -> bool {
        self.term_vector != TermVector::No
    }

    fn flags(&self) -> u8 {
        let mut flags = if self.indexed { INDEXED } else { 0 };
        match self.term_vector {
            TermVector::No => {}
            TermVector::Yes => flags |= STORE_TERM_VECTOR,
            TermVector::WithPositions => flags |= STORE_TERM_VECTOR | STORE_POSITIONS,
        }
        flags
    }
}

fn term_vector_from_flags(flags: u8) -> TermVector {
    if flags & STORE_POSITIONS != 0 {
        TermVector::WithPositions
    } else if flags & STORE_TERM_VECTOR != 0 {
        TermVector::Yes
    } else {
        TermVector::No
    }
}

/// Field names of a segment. A field's number is its insertion order.
#[derive(Debug, Clone, Default)]
pub struct FieldInfos {
    by_number: Vec<FieldInfo>,
    by_name: HashMap<String, u32>,
}

impl FieldInfos {
    pub fn new() -> Self {
        FieldInfos::default()
    }

    /// Adds a field or widens an existing one. Term vectors are only kept
    /// for indexed fields.
    pub fn add(&mut self, name: &str, indexed: bool, term_vector: TermVector) {
        let term_vector = if indexed { term_vector } else { TermVector::No };
        match self.by_name.get(name) {
            Some(&number) => {
                let info = &mut self.by_number[number as usize];
                info.indexed |= indexed;
                info.term_vector = info.term_vector.max(term_vector);
            }
            None => {
                let number = self.by_number.len() as u32;
                self.by_number.push(FieldInfo {
                    name: name.to_string(),
                    number,
                    indexed,
                    term_vector,
                });
                self.by_name.insert(name.to_string(), number);
            }
        }
    }

    pub fn add_document(&mut self, doc: &Document) {
        for field in &doc.fields {
            self.add(&field.name, field.indexed, field.term_vector);
        }
    }

    pub fn add_all(&mut self, other: &FieldInfos) {
        for info in other.iter() {
            self.add(&info.name, info.indexed, info.term_vector);
        }
    }

    pub fn has_vectors(&self) -> bool {
        self.by_number.iter().any(FieldInfo::stores_term_vector)
    }

    pub fn number(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn by_number(&self, number: u32) -> Option<&FieldInfo> {
        self.by_number.get(number as usize)
    }

    pub fn by_name(&self, name: &str) -> Option<&FieldInfo> {
        self.number(name).and_then(|n| self.by_number(n))
    }

    pub fn name(&self, number: u32) -> Option<&str> {
        self.by_number(number).map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.by_number.iter()
    }

    pub fn write(&self, directory: &dyn Directory, file: &str) -> Result<()> {
        let mut out = directory.create_output(file)?;
        out.write_vint(self.by_number.len() as u32)?;
        for info in &self.by_number {
            out.write_string(&info.name)?;
            out.write_byte(info.flags())?;
        }
        out.close()
    }

    pub fn read(directory: &dyn Directory, file: &str) -> Result<Self> {
        let mut input = directory.open_input(file)?;
        let count = input.read_vint()?;
        let mut infos = FieldInfos::new();
        for _ in 0..count {
            let name = input.read_string()?;
            let flags = input.read_byte()?;
            if infos.number(&name).is_some() {
                return Err(Error::corruption(format!("duplicate field {} in {}", name, file)));
            }
            infos.add(&name, flags & INDEXED != 0, term_vector_from_flags(flags));
        }
        Ok(infos)
    }
}
