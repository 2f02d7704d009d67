//! Opcode byte assignments and the expansion/reserved classification table.
//!
//! The table is a declarative set of ranges, not a `match` buried inside the
//! interpreter: whether an opcode is reserved-for-expansion is a property of
//! the byte value alone, and whether that matters (fail vs. no-op) is a
//! property of the surrounding container's version (strict vs. lenient).

pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;

pub const OP_NOP: u8 = 0x61;
pub const OP_VERIFY: u8 = 0x62;
pub const OP_FAIL: u8 = 0x63;
pub const OP_CHECKPREDICATE: u8 = 0x64;

pub const OP_IF: u8 = 0x65;
pub const OP_NOTIF: u8 = 0x66;
pub const OP_ELSE: u8 = 0x67;
pub const OP_ENDIF: u8 = 0x68;

pub const OP_DUP: u8 = 0x70;
pub const OP_DROP: u8 = 0x71;
pub const OP_SWAP: u8 = 0x72;
pub const OP_OVER: u8 = 0x73;
pub const OP_ROT: u8 = 0x74;
pub const OP_PICK: u8 = 0x75;
pub const OP_ROLL: u8 = 0x76;
pub const OP_DEPTH: u8 = 0x77;
pub const OP_TOALTSTACK: u8 = 0x78;
pub const OP_FROMALTSTACK: u8 = 0x79;
pub const OP_CAT: u8 = 0x7a;

pub const OP_AND: u8 = 0x80;
pub const OP_OR: u8 = 0x81;
pub const OP_XOR: u8 = 0x82;
pub const OP_NOT: u8 = 0x83;
pub const OP_EQUAL: u8 = 0x84;

pub const OP_ADD: u8 = 0x90;
pub const OP_SUB: u8 = 0x91;
pub const OP_MUL: u8 = 0x92;
pub const OP_DIV: u8 = 0x93;
pub const OP_MOD: u8 = 0x94;
pub const OP_NEGATE: u8 = 0x95;
pub const OP_ABS: u8 = 0x96;
pub const OP_LESSTHAN: u8 = 0x97;
pub const OP_GREATERTHAN: u8 = 0x98;
pub const OP_LESSTHANOREQUAL: u8 = 0x99;
pub const OP_GREATERTHANOREQUAL: u8 = 0x9a;
pub const OP_MIN: u8 = 0x9b;
pub const OP_MAX: u8 = 0x9c;
pub const OP_NUMEQUAL: u8 = 0x9d;

pub const OP_SHA3: u8 = 0xa0;
pub const OP_SHA256: u8 = 0xa1;
pub const OP_CHECKSIG: u8 = 0xa2;
pub const OP_CHECKMULTISIG: u8 = 0xa3;
pub const OP_TXSIGHASH: u8 = 0xa4;
pub const OP_BLOCKSIGHASH: u8 = 0xa5;

pub const OP_ASSET: u8 = 0xb0;
pub const OP_AMOUNT: u8 = 0xb1;
pub const OP_PROGRAM: u8 = 0xb2;
pub const OP_MINTIME: u8 = 0xb3;
pub const OP_MAXTIME: u8 = 0xb4;
pub const OP_INDEX: u8 = 0xb5;
pub const OP_REFDATAHASH: u8 = 0xb6;
pub const OP_FINDOUTPUT: u8 = 0xb7;

/// `0xf0..=0xff` is reserved for future opcodes. Under a strict container
/// version they fail; under a lenient one they no-op, so that adding real
/// semantics to one of these bytes later is a soft fork.
pub fn is_expansion_opcode(op: u8) -> bool {
    (0xf0..=0xff).contains(&op)
}

/// Push cost: `8 + len(data)`. Pops refund the identical amount so a
/// value's lifetime on the stack is gas-neutral.
pub fn push_cost(data_len: usize) -> u64 {
    8 + data_len as u64
}

/// Per-opcode base cost for non-push operations. Composite opcodes
/// (hashing, signature checks, CHECKPREDICATE) charge more than simple
/// stack/arithmetic ops.
pub fn op_cost(op: u8) -> u64 {
    match op {
        OP_SHA3 | OP_SHA256 => 16,
        OP_CHECKSIG => 256,
        OP_CHECKMULTISIG => 256,
        OP_TXSIGHASH | OP_BLOCKSIGHASH => 64,
        OP_CHECKPREDICATE => 128,
        OP_FINDOUTPUT => 64,
        _ => 1,
    }
}
