//! Assembly items: the unit of output of the code generator, assembled
//! into bytecode in a second pass.

use serde::Serialize;
use std::fmt;

/// A jump target, resolved to a byte offset at assembly time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TagId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyItem {
    Op(Opcode),
    /// Push a literal value (minimal big-endian bytes; empty means zero).
    Push(Vec<u8>),
    PushTag(TagId),
    /// A jump destination.
    Tag(TagId),
    /// Push the assembled byte length of the n-th sub-assembly.
    PushSubSize(usize),
    /// Push the offset of the n-th sub-assembly inside the parent.
    PushSubOffset(usize),
    /// Push a 20-byte placeholder recorded as an unresolved link reference.
    PushLibraryAddress(String),
    /// Push the code offset of the n-th immutable value in the trailing
    /// data segment of this assembly.
    PushImmutable(usize),
}

impl AssemblyItem {
    /// Byte width of the encoded item. Tag and size pushes use `PUSH2`.
    pub fn width(&self) -> usize {
        match self {
            AssemblyItem::Op(_) => 1,
            AssemblyItem::Push(bytes) => 1 + bytes.len().max(1),
            AssemblyItem::PushTag(_)
            | AssemblyItem::PushSubSize(_)
            | AssemblyItem::PushSubOffset(_)
            | AssemblyItem::PushImmutable(_) => 3,
            AssemblyItem::Tag(_) => 1,
            AssemblyItem::PushLibraryAddress(_) => 21,
        }
    }

    pub fn is_tag(&self) -> bool {
        matches!(self, AssemblyItem::Tag(_))
    }

    /// The tag carried by a `Tag` or `PushTag` item.
    pub fn data(&self) -> Option<TagId> {
        match self {
            AssemblyItem::Tag(tag) | AssemblyItem::PushTag(tag) => Some(*tag),
            _ => None,
        }
    }
}

impl fmt::Display for AssemblyItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblyItem::Op(op) => write!(f, "{:?}", op),
            AssemblyItem::Push(bytes) => {
                if bytes.is_empty() {
                    write!(f, "PUSH 0x0")
                } else {
                    write!(f, "PUSH 0x{}", hex::encode(bytes))
                }
            }
            AssemblyItem::PushTag(tag) => write!(f, "PUSH [tag{}]", tag.0),
            AssemblyItem::Tag(tag) => write!(f, "tag{}:", tag.0),
            AssemblyItem::PushSubSize(idx) => write!(f, "PUSH #[sub{}]", idx),
            AssemblyItem::PushSubOffset(idx) => write!(f, "PUSH [sub{}]", idx),
            AssemblyItem::PushLibraryAddress(name) => write!(f, "PUSHLIB \"{}\"", name),
            AssemblyItem::PushImmutable(idx) => write!(f, "PUSH immutable({})", idx),
        }
    }
}

macro_rules! opcodes {
    ($($name:ident = ($byte:expr, $ins:expr, $outs:expr),)*) => {
        /// VM instructions used by the code generator, with their byte
        /// encodings and stack effects.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($name,)*
        }

        impl Opcode {
            pub fn byte(self) -> u8 {
                match self {
                    $(Opcode::$name => $byte,)*
                }
            }

            /// Values popped from the stack.
            pub fn inputs(self) -> usize {
                match self {
                    $(Opcode::$name => $ins,)*
                }
            }

            /// Values pushed onto the stack.
            pub fn outputs(self) -> usize {
                match self {
                    $(Opcode::$name => $outs,)*
                }
            }
        }
    };
}

opcodes! {
    Stop = (0x00, 0, 0),
    Add = (0x01, 2, 1),
    Mul = (0x02, 2, 1),
    Sub = (0x03, 2, 1),
    Div = (0x04, 2, 1),
    Sdiv = (0x05, 2, 1),
    Mod = (0x06, 2, 1),
    Smod = (0x07, 2, 1),
    Exp = (0x0a, 2, 1),
    Lt = (0x10, 2, 1),
    Gt = (0x11, 2, 1),
    Slt = (0x12, 2, 1),
    Sgt = (0x13, 2, 1),
    Eq = (0x14, 2, 1),
    IsZero = (0x15, 1, 1),
    And = (0x16, 2, 1),
    Or = (0x17, 2, 1),
    Xor = (0x18, 2, 1),
    Not = (0x19, 1, 1),
    Byte = (0x1a, 2, 1),
    Shl = (0x1b, 2, 1),
    Shr = (0x1c, 2, 1),
    Sar = (0x1d, 2, 1),
    Keccak256 = (0x20, 2, 1),
    Address = (0x30, 0, 1),
    Balance = (0x31, 1, 1),
    Origin = (0x32, 0, 1),
    Caller = (0x33, 0, 1),
    CallValue = (0x34, 0, 1),
    CallDataLoad = (0x35, 1, 1),
    CallDataSize = (0x36, 0, 1),
    CallDataCopy = (0x37, 3, 0),
    CodeSize = (0x38, 0, 1),
    CodeCopy = (0x39, 3, 0),
    GasPrice = (0x3a, 0, 1),
    ReturnDataSize = (0x3d, 0, 1),
    ReturnDataCopy = (0x3e, 3, 0),
    Timestamp = (0x42, 0, 1),
    Number = (0x43, 0, 1),
    GasLimit = (0x45, 0, 1),
    ChainId = (0x46, 0, 1),
    Pop = (0x50, 1, 0),
    MLoad = (0x51, 1, 1),
    MStore = (0x52, 2, 0),
    MStore8 = (0x53, 2, 0),
    SLoad = (0x54, 1, 1),
    SStore = (0x55, 2, 0),
    Jump = (0x56, 1, 0),
    JumpI = (0x57, 2, 0),
    MSize = (0x59, 0, 1),
    Gas = (0x5a, 0, 1),
    JumpDest = (0x5b, 0, 0),
    Dup1 = (0x80, 1, 2),
    Dup2 = (0x81, 2, 3),
    Swap1 = (0x90, 2, 2),
    Log0 = (0xa0, 2, 0),
    Log1 = (0xa1, 3, 0),
    Create = (0xf0, 3, 1),
    Call = (0xf1, 7, 1),
    Return = (0xf3, 2, 0),
    DelegateCall = (0xf4, 6, 1),
    StaticCall = (0xfa, 6, 1),
    Revert = (0xfd, 2, 0),
    Invalid = (0xfe, 0, 0),
    SelfDestruct = (0xff, 1, 0),
}

/// Look up an IR builtin by its lower-case name.
pub fn opcode_by_name(name: &str) -> Option<Opcode> {
    use Opcode::*;
    let op = match name {
        "stop" => Stop,
        "add" => Add,
        "mul" => Mul,
        "sub" => Sub,
        "div" => Div,
        "sdiv" => Sdiv,
        "mod" => Mod,
        "smod" => Smod,
        "exp" => Exp,
        "lt" => Lt,
        "gt" => Gt,
        "slt" => Slt,
        "sgt" => Sgt,
        "eq" => Eq,
        "iszero" => IsZero,
        "and" => And,
        "or" => Or,
        "xor" => Xor,
        "not" => Not,
        "byte" => Byte,
        "shl" => Shl,
        "shr" => Shr,
        "sar" => Sar,
        "keccak256" => Keccak256,
        "address" => Address,
        "balance" => Balance,
        "origin" => Origin,
        "caller" => Caller,
        "callvalue" => CallValue,
        "calldataload" => CallDataLoad,
        "calldatasize" => CallDataSize,
        "calldatacopy" => CallDataCopy,
        "codesize" => CodeSize,
        "codecopy" => CodeCopy,
        "gasprice" => GasPrice,
        "returndatasize" => ReturnDataSize,
        "returndatacopy" => ReturnDataCopy,
        "timestamp" => Timestamp,
        "number" => Number,
        "gaslimit" => GasLimit,
        "chainid" => ChainId,
        "pop" => Pop,
        "mload" => MLoad,
        "mstore" => MStore,
        "mstore8" => MStore8,
        "sload" => SLoad,
        "sstore" => SStore,
        "msize" => MSize,
        "gas" => Gas,
        "log0" => Log0,
        "log1" => Log1,
        "create" => Create,
        "call" => Call,
        "return" => Return,
        "delegatecall" => DelegateCall,
        "staticcall" => StaticCall,
        "revert" => Revert,
        "invalid" => Invalid,
        "selfdestruct" => SelfDestruct,
        _ => return None,
    };
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::{opcode_by_name, AssemblyItem, Opcode, TagId};

    #[test]
    fn widths() {
        assert_eq!(AssemblyItem::Op(Opcode::Add).width(), 1);
        assert_eq!(AssemblyItem::Push(vec![0x80]).width(), 2);
        assert_eq!(AssemblyItem::Push(vec![]).width(), 2);
        assert_eq!(AssemblyItem::PushTag(TagId(3)).width(), 3);
        assert_eq!(AssemblyItem::PushLibraryAddress("L".into()).width(), 21);
    }

    #[test]
    fn lookup() {
        assert_eq!(opcode_by_name("mstore"), Some(Opcode::MStore));
        assert_eq!(opcode_by_name("datasize"), None);
        assert_eq!(Opcode::MStore.inputs(), 2);
        assert_eq!(Opcode::Create.outputs(), 1);
    }
}
