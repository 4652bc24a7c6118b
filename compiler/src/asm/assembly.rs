//! Assembling item streams into linkable bytecode.

use super::item::{AssemblyItem, Opcode, TagId};
use std::collections::BTreeMap;

/// A symbolic placeholder for a library address left in the bytecode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    /// Byte offset of the 20-byte hole.
    pub offset: usize,
    pub symbol: String,
}

/// A byte sequence plus its unresolved link references. The object is
/// "sealed" (safe to hash) once no references remain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkerObject {
    pub bytecode: Vec<u8>,
    pub link_references: Vec<LinkRef>,
}

impl LinkerObject {
    pub fn is_sealed(&self) -> bool {
        self.link_references.is_empty()
    }

    /// Fill in library addresses; resolved references are removed.
    pub fn link(&mut self, addresses: &BTreeMap<String, [u8; 20]>) {
        let references = std::mem::take(&mut self.link_references);
        for reference in references {
            if let Some(address) = addresses.get(&reference.symbol) {
                self.bytecode[reference.offset..reference.offset + 20]
                    .copy_from_slice(address);
            } else {
                self.link_references.push(reference);
            }
        }
    }
}

/// An item stream with nested sub-assemblies. Sub-assembly bytecode is
/// appended after the parent's own code, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assembly {
    pub items: Vec<AssemblyItem>,
    pub subs: Vec<Assembly>,
}

impl Assembly {
    /// Total assembled length, own code plus sub-assemblies.
    pub fn total_len(&self) -> usize {
        self.own_len() + self.subs.iter().map(Assembly::total_len).sum::<usize>()
    }

    fn own_len(&self) -> usize {
        self.items.iter().map(AssemblyItem::width).sum()
    }

    /// Assemble into bytecode, resolving tags, sub-assembly offsets and
    /// immutable data offsets, and collecting link references.
    ///
    /// # Panics
    ///
    /// Panics if a push target does not fit in 16 bits or a tag has no
    /// definition, both of which are code generator bugs.
    pub fn assemble(&self) -> LinkerObject {
        let own_len = self.own_len();
        let total_len = self.total_len();
        assert!(total_len < 0x10000, "assembled object exceeds 16-bit offsets");

        let mut sub_offsets = vec![];
        let mut cursor = own_len;
        for sub in &self.subs {
            sub_offsets.push(cursor);
            cursor += sub.total_len();
        }

        let mut tag_positions: BTreeMap<TagId, usize> = BTreeMap::new();
        let mut position = 0;
        for item in &self.items {
            if let AssemblyItem::Tag(tag) = item {
                let previous = tag_positions.insert(*tag, position);
                assert!(previous.is_none(), "tag defined twice");
            }
            position += item.width();
        }

        let mut object = LinkerObject::default();
        let push2 = |bytes: &mut Vec<u8>, value: usize| {
            bytes.push(0x61);
            bytes.extend_from_slice(&(value as u16).to_be_bytes());
        };

        for item in &self.items {
            match item {
                AssemblyItem::Op(op) => object.bytecode.push(op.byte()),
                AssemblyItem::Push(value) => {
                    if value.is_empty() {
                        object.bytecode.extend_from_slice(&[0x60, 0x00]);
                    } else {
                        assert!(value.len() <= 32, "push value too wide");
                        object.bytecode.push(0x60 + value.len() as u8 - 1);
                        object.bytecode.extend_from_slice(value);
                    }
                }
                AssemblyItem::PushTag(tag) => {
                    let target = *tag_positions
                        .get(tag)
                        .unwrap_or_else(|| panic!("undefined tag{}", tag.0));
                    push2(&mut object.bytecode, target);
                }
                AssemblyItem::Tag(_) => object.bytecode.push(Opcode::JumpDest.byte()),
                AssemblyItem::PushSubSize(idx) => {
                    push2(&mut object.bytecode, self.subs[*idx].total_len());
                }
                AssemblyItem::PushSubOffset(idx) => {
                    push2(&mut object.bytecode, sub_offsets[*idx]);
                }
                AssemblyItem::PushLibraryAddress(symbol) => {
                    object.bytecode.push(0x73);
                    object.link_references.push(LinkRef {
                        offset: object.bytecode.len(),
                        symbol: symbol.clone(),
                    });
                    object.bytecode.extend_from_slice(&[0u8; 20]);
                }
                AssemblyItem::PushImmutable(idx) => {
                    // immutable values trail the fully assembled object
                    push2(&mut object.bytecode, total_len + 32 * idx);
                }
            }
        }
        debug_assert_eq!(object.bytecode.len(), own_len);

        for sub in &self.subs {
            let assembled = sub.assemble();
            let base = object.bytecode.len();
            object.bytecode.extend_from_slice(&assembled.bytecode);
            object
                .link_references
                .extend(assembled.link_references.into_iter().map(|reference| LinkRef {
                    offset: base + reference.offset,
                    symbol: reference.symbol,
                }));
        }

        object
    }

    /// A conservative peephole pass: drops push-then-pop pairs and double
    /// negations in front of conditional jumps.
    pub fn optimize(&mut self) {
        for sub in &mut self.subs {
            sub.optimize();
        }
        let mut items: Vec<AssemblyItem> = Vec::with_capacity(self.items.len());
        let mut index = 0;
        while index < self.items.len() {
            let item = &self.items[index];
            let next = self.items.get(index + 1);

            let is_push = matches!(
                item,
                AssemblyItem::Push(_)
                    | AssemblyItem::PushTag(_)
                    | AssemblyItem::PushSubSize(_)
                    | AssemblyItem::PushSubOffset(_)
                    | AssemblyItem::PushImmutable(_)
            );
            if is_push && next == Some(&AssemblyItem::Op(Opcode::Pop)) {
                index += 2;
                continue;
            }

            if *item == AssemblyItem::Op(Opcode::IsZero)
                && next == Some(&AssemblyItem::Op(Opcode::IsZero))
                && matches!(self.items.get(index + 2), Some(AssemblyItem::PushTag(_)))
                && self.items.get(index + 3) == Some(&AssemblyItem::Op(Opcode::JumpI))
            {
                index += 2;
                continue;
            }

            items.push(item.clone());
            index += 1;
        }
        self.items = items;
    }
}

#[cfg(test)]
mod tests {
    use super::{Assembly, AssemblyItem, LinkerObject, Opcode, TagId};
    use std::collections::BTreeMap;

    #[test]
    fn tags_resolve_to_jumpdests() {
        let assembly = Assembly {
            items: vec![
                AssemblyItem::PushTag(TagId(0)),
                AssemblyItem::Op(Opcode::Jump),
                AssemblyItem::Tag(TagId(0)),
                AssemblyItem::Op(Opcode::Stop),
            ],
            subs: vec![],
        };
        let object = assembly.assemble();
        // PUSH2 0x0004 JUMP JUMPDEST STOP
        assert_eq!(object.bytecode, vec![0x61, 0x00, 0x04, 0x56, 0x5b, 0x00]);
        assert!(object.is_sealed());
    }

    #[test]
    fn sub_assembly_offsets_and_linking() {
        let sub = Assembly {
            items: vec![
                AssemblyItem::PushLibraryAddress("NameReg".to_string()),
                AssemblyItem::Op(Opcode::Pop),
            ],
            subs: vec![],
        };
        let assembly = Assembly {
            items: vec![
                AssemblyItem::PushSubSize(0),
                AssemblyItem::PushSubOffset(0),
                AssemblyItem::Op(Opcode::Stop),
            ],
            subs: vec![sub],
        };
        let object = assembly.assemble();
        // own code is 7 bytes; the sub starts right after
        assert_eq!(&object.bytecode[..7], &[0x61, 0x00, 0x16, 0x61, 0x00, 0x07, 0x00]);
        assert_eq!(object.link_references.len(), 1);
        assert_eq!(object.link_references[0].offset, 8);
        assert!(!object.is_sealed());

        let mut linked: LinkerObject = object;
        let mut addresses = BTreeMap::new();
        addresses.insert("NameReg".to_string(), [0x11u8; 20]);
        linked.link(&addresses);
        assert!(linked.is_sealed());
        assert_eq!(linked.bytecode[8], 0x11);
    }

    #[test]
    fn peephole_drops_push_pop() {
        let mut assembly = Assembly {
            items: vec![
                AssemblyItem::Push(vec![0x01]),
                AssemblyItem::Op(Opcode::Pop),
                AssemblyItem::Op(Opcode::Stop),
            ],
            subs: vec![],
        };
        assembly.optimize();
        assert_eq!(assembly.items, vec![AssemblyItem::Op(Opcode::Stop)]);
    }
}
