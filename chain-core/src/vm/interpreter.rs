//! The deterministic stack interpreter.
//!
//! `execute` begins with `arguments[]` pushed onto the stack bottom-to-top,
//! then runs `program`. Success requires the final top-of-stack to be true
//! and no failure to have been raised along the way (a raised `VmError` is
//! this engine's rendering of "non-zero exit code").

use super::context::VmContext;
use super::number::{is_true, ScriptNum};
use super::opcode::*;
use crate::error::VmError;
use crate::hash::sha3_256;
use ed25519_dalek::{PublicKey, Signature};

pub fn execute(
    program: &[u8],
    arguments: &[Vec<u8>],
    ctx: &VmContext,
    run_limit: u64,
    max_depth: u32,
    strict: bool,
) -> Result<(), VmError> {
    let mut interp = Interpreter::new(run_limit, max_depth, strict);
    for arg in arguments {
        interp.push(arg.clone())?;
    }
    interp.run(program, ctx)?;
    match interp.stack.last() {
        Some(top) if is_true(top) => Ok(()),
        Some(_) => Err(VmError::FalseResult),
        None => Err(VmError::FalseResult),
    }
}

struct Interpreter {
    stack: Vec<Vec<u8>>,
    alt_stack: Vec<Vec<u8>>,
    remaining: u64,
    depth: u32,
    max_depth: u32,
    strict: bool,
}

/// One nesting level of `IF`/`NOTIF` branch tracking: whether this level is
/// currently executing, and whether an `ELSE` has already been seen for it.
struct Branch {
    executing: bool,
    seen_else: bool,
}

impl Interpreter {
    fn new(run_limit: u64, max_depth: u32, strict: bool) -> Self {
        Interpreter {
            stack: Vec::new(),
            alt_stack: Vec::new(),
            remaining: run_limit,
            depth: 0,
            max_depth,
            strict,
        }
    }

    fn charge(&mut self, cost: u64) -> Result<(), VmError> {
        self.remaining = self.remaining.checked_sub(cost).ok_or(VmError::RunLimitExceeded)?;
        Ok(())
    }

    fn refund(&mut self, amount: u64) {
        self.remaining += amount;
    }

    fn push(&mut self, item: Vec<u8>) -> Result<(), VmError> {
        self.charge(push_cost(item.len()))?;
        self.stack.push(item);
        Ok(())
    }

    fn pop(&mut self) -> Result<Vec<u8>, VmError> {
        let item = self.stack.pop().ok_or(VmError::StackUnderflow)?;
        self.refund(push_cost(item.len()));
        Ok(item)
    }

    fn pop_num(&mut self) -> Result<ScriptNum, VmError> {
        let bytes = self.pop()?;
        ScriptNum::from_bytes(&bytes, self.strict)
    }

    fn push_num(&mut self, n: ScriptNum) -> Result<(), VmError> {
        self.push(n.to_bytes())
    }

    fn push_bool(&mut self, b: bool) -> Result<(), VmError> {
        self.push(if b { vec![1] } else { Vec::new() })
    }

    fn currently_executing(&self, branches: &[Branch]) -> bool {
        branches.iter().all(|b| b.executing)
    }

    fn run(&mut self, program: &[u8], ctx: &VmContext) -> Result<(), VmError> {
        let mut pc = 0usize;
        let mut branches: Vec<Branch> = Vec::new();

        while pc < program.len() {
            let op = program[pc];
            pc += 1;

            // Direct push: 0x01..=0x4b pushes the following N bytes.
            if (0x01..=0x4b).contains(&op) {
                let n = op as usize;
                let data = read_slice(program, &mut pc, n)?;
                if self.currently_executing(&branches) {
                    self.push(data.to_vec())?;
                }
                continue;
            }
            if op == 0x00 {
                if self.currently_executing(&branches) {
                    self.push(Vec::new())?;
                }
                continue;
            }
            match op {
                OP_PUSHDATA1 => {
                    let n = read_u8(program, &mut pc)? as usize;
                    let data = read_slice(program, &mut pc, n)?;
                    if self.currently_executing(&branches) {
                        self.push(data.to_vec())?;
                    }
                    continue;
                }
                OP_PUSHDATA2 => {
                    let n = read_u16_le(program, &mut pc)? as usize;
                    let data = read_slice(program, &mut pc, n)?;
                    if self.currently_executing(&branches) {
                        self.push(data.to_vec())?;
                    }
                    continue;
                }
                OP_PUSHDATA4 => {
                    let n = read_u32_le(program, &mut pc)? as usize;
                    let data = read_slice(program, &mut pc, n)?;
                    if self.currently_executing(&branches) {
                        self.push(data.to_vec())?;
                    }
                    continue;
                }
                _ => {}
            }

            if !self.currently_executing(&branches) {
                // Still must track IF/NOTIF/ELSE/ENDIF structure while
                // skipping so matching is correct.
                match op {
                    OP_IF | OP_NOTIF => branches.push(Branch {
                        executing: false,
                        seen_else: false,
                    }),
                    OP_ELSE => {
                        let b = branches.last_mut().ok_or(VmError::StackUnderflow)?;
                        if b.seen_else {
                            return Err(VmError::StackUnderflow);
                        }
                        b.seen_else = true;
                    }
                    OP_ENDIF => {
                        branches.pop().ok_or(VmError::StackUnderflow)?;
                    }
                    _ => {}
                }
                self.charge(op_cost(op))?;
                continue;
            }

            self.charge(op_cost(op))?;

            match op {
                OP_1NEGATE => self.push_num(ScriptNum(-1))?,
                OP_1..=OP_16 => self.push_num(ScriptNum((op - OP_1 + 1) as i64))?,
                OP_NOP => {}
                OP_VERIFY => {
                    let top = self.pop()?;
                    if !is_true(&top) {
                        return Err(VmError::FalseResult);
                    }
                }
                OP_FAIL => return Err(VmError::FalseResult),

                OP_IF | OP_NOTIF => {
                    let cond_bytes = self.pop()?;
                    let mut cond = is_true(&cond_bytes);
                    if op == OP_NOTIF {
                        cond = !cond;
                    }
                    branches.push(Branch {
                        executing: cond,
                        seen_else: false,
                    });
                }
                OP_ELSE => {
                    let b = branches.last_mut().ok_or(VmError::StackUnderflow)?;
                    if b.seen_else {
                        return Err(VmError::StackUnderflow);
                    }
                    b.executing = !b.executing;
                    b.seen_else = true;
                }
                OP_ENDIF => {
                    branches.pop().ok_or(VmError::StackUnderflow)?;
                }

                OP_DUP => {
                    let top = self.stack.last().ok_or(VmError::StackUnderflow)?.clone();
                    self.push(top)?;
                }
                OP_DROP => {
                    self.pop()?;
                }
                OP_SWAP => {
                    let len = self.stack.len();
                    if len < 2 {
                        return Err(VmError::StackUnderflow);
                    }
                    self.stack.swap(len - 1, len - 2);
                }
                OP_OVER => {
                    let len = self.stack.len();
                    if len < 2 {
                        return Err(VmError::StackUnderflow);
                    }
                    let item = self.stack[len - 2].clone();
                    self.push(item)?;
                }
                OP_ROT => {
                    let len = self.stack.len();
                    if len < 3 {
                        return Err(VmError::StackUnderflow);
                    }
                    self.stack.swap(len - 3, len - 2);
                    self.stack.swap(len - 2, len - 1);
                }
                OP_PICK | OP_ROLL => {
                    let n = self.pop_num()?.value();
                    if n < 0 || n as usize >= self.stack.len() {
                        return Err(VmError::StackUnderflow);
                    }
                    let idx = self.stack.len() - 1 - n as usize;
                    let item = if op == OP_PICK {
                        self.stack[idx].clone()
                    } else {
                        self.stack.remove(idx)
                    };
                    self.push(item)?;
                }
                OP_DEPTH => {
                    let n = self.stack.len() as i64;
                    self.push_num(ScriptNum(n))?;
                }
                OP_TOALTSTACK => {
                    let item = self.pop()?;
                    self.alt_stack.push(item);
                }
                OP_FROMALTSTACK => {
                    let item = self.alt_stack.pop().ok_or(VmError::StackUnderflow)?;
                    self.push(item)?;
                }
                OP_CAT => {
                    let b = self.pop()?;
                    let mut a = self.pop()?;
                    a.extend_from_slice(&b);
                    self.push(a)?;
                }

                OP_AND | OP_OR | OP_XOR => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    if a.len() != b.len() {
                        return Err(VmError::BadNumericEncoding);
                    }
                    let out: Vec<u8> = a
                        .iter()
                        .zip(b.iter())
                        .map(|(x, y)| match op {
                            OP_AND => x & y,
                            OP_OR => x | y,
                            _ => x ^ y,
                        })
                        .collect();
                    self.push(out)?;
                }
                OP_NOT => {
                    let top = self.pop()?;
                    self.push_bool(!is_true(&top))?;
                }
                OP_EQUAL => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push_bool(a == b)?;
                }

                OP_ADD | OP_SUB | OP_MUL | OP_DIV | OP_MOD | OP_MIN | OP_MAX | OP_LESSTHAN
                | OP_GREATERTHAN | OP_LESSTHANOREQUAL | OP_GREATERTHANOREQUAL | OP_NUMEQUAL => {
                    let b = self.pop_num()?.value();
                    let a = self.pop_num()?.value();
                    match op {
                        OP_ADD => self.push_num(ScriptNum(
                            a.checked_add(b).ok_or(VmError::BadNumericEncoding)?,
                        ))?,
                        OP_SUB => self.push_num(ScriptNum(
                            a.checked_sub(b).ok_or(VmError::BadNumericEncoding)?,
                        ))?,
                        OP_MUL => self.push_num(ScriptNum(
                            a.checked_mul(b).ok_or(VmError::BadNumericEncoding)?,
                        ))?,
                        OP_DIV => {
                            if b == 0 {
                                return Err(VmError::DivisionByZero);
                            }
                            self.push_num(ScriptNum(a / b))?
                        }
                        OP_MOD => {
                            if b == 0 {
                                return Err(VmError::DivisionByZero);
                            }
                            self.push_num(ScriptNum(a % b))?
                        }
                        OP_MIN => self.push_num(ScriptNum(a.min(b)))?,
                        OP_MAX => self.push_num(ScriptNum(a.max(b)))?,
                        OP_LESSTHAN => self.push_bool(a < b)?,
                        OP_GREATERTHAN => self.push_bool(a > b)?,
                        OP_LESSTHANOREQUAL => self.push_bool(a <= b)?,
                        OP_GREATERTHANOREQUAL => self.push_bool(a >= b)?,
                        OP_NUMEQUAL => self.push_bool(a == b)?,
                        _ => unreachable!(),
                    }
                }
                OP_NEGATE => {
                    let a = self.pop_num()?.value();
                    self.push_num(ScriptNum(a.checked_neg().ok_or(VmError::BadNumericEncoding)?))?
                }
                OP_ABS => {
                    let a = self.pop_num()?.value();
                    self.push_num(ScriptNum(a.checked_abs().ok_or(VmError::BadNumericEncoding)?))?
                }

                OP_SHA3 => {
                    let a = self.pop()?;
                    self.push(sha3_256(&[&a]).as_bytes().to_vec())?;
                }
                OP_SHA256 => {
                    let a = self.pop()?;
                    use sha2::{Digest, Sha256};
                    let digest = Sha256::digest(&a);
                    self.push(digest.to_vec())?;
                }
                OP_CHECKSIG => {
                    let pubkey_bytes = self.pop()?;
                    let msg = self.pop()?;
                    let sig_bytes = self.pop()?;
                    self.push_bool(verify_ed25519(&pubkey_bytes, &msg, &sig_bytes))?;
                }
                OP_CHECKMULTISIG => {
                    let npub = self.pop_num()?.value();
                    if npub < 0 {
                        return Err(VmError::BadNumericEncoding);
                    }
                    let mut pubkeys = Vec::with_capacity(npub as usize);
                    for _ in 0..npub {
                        pubkeys.push(self.pop()?);
                    }
                    pubkeys.reverse(); // restore push order: pubkeys[0] is checked first
                    let msg = self.pop()?;
                    let nsig = self.pop_num()?.value();
                    if nsig < 0 {
                        return Err(VmError::BadNumericEncoding);
                    }
                    let mut sigs = Vec::with_capacity(nsig as usize);
                    for _ in 0..nsig {
                        sigs.push(self.pop()?);
                    }
                    sigs.reverse();
                    self.push_bool(check_multisig(&sigs, &pubkeys, &msg))?;
                }
                OP_TXSIGHASH => {
                    let tx_ctx = match ctx {
                        VmContext::Tx(t) => t,
                        VmContext::Block(_) => return Err(VmError::NoTxContext),
                    };
                    let hash_type_byte = self.pop_num()?.value();
                    if !(0..=255).contains(&hash_type_byte) {
                        return Err(VmError::UnsupportedHashType(0));
                    }
                    let hash = tx_ctx.tx_sighash(hash_type_byte as u8)?;
                    self.push(hash.as_bytes().to_vec())?;
                }
                OP_BLOCKSIGHASH => {
                    let block_ctx = match ctx {
                        VmContext::Block(b) => b,
                        VmContext::Tx(_) => return Err(VmError::NoBlockContext),
                    };
                    self.push(block_ctx.block_sighash().as_bytes().to_vec())?;
                }

                OP_ASSET => {
                    let tx_ctx = tx_ctx_of(ctx)?;
                    self.push(tx_ctx.asset_id().0.as_bytes().to_vec())?;
                }
                OP_AMOUNT => {
                    let tx_ctx = tx_ctx_of(ctx)?;
                    self.push_num(ScriptNum(tx_ctx.amount() as i64))?;
                }
                OP_PROGRAM => {
                    let tx_ctx = tx_ctx_of(ctx)?;
                    self.push(tx_ctx.program().to_vec())?;
                }
                OP_MINTIME => {
                    let tx_ctx = tx_ctx_of(ctx)?;
                    self.push_num(ScriptNum(tx_ctx.min_time_ms() as i64))?;
                }
                OP_MAXTIME => {
                    let tx_ctx = tx_ctx_of(ctx)?;
                    self.push_num(ScriptNum(tx_ctx.max_time_ms() as i64))?;
                }
                OP_INDEX => {
                    let tx_ctx = tx_ctx_of(ctx)?;
                    self.push_num(ScriptNum(tx_ctx.index() as i64))?;
                }
                OP_REFDATAHASH => {
                    let tx_ctx = tx_ctx_of(ctx)?;
                    self.push(tx_ctx.ref_data_hash().as_bytes().to_vec())?;
                }
                OP_FINDOUTPUT => {
                    let tx_ctx = tx_ctx_of(ctx)?;
                    let program_bytes = self.pop()?;
                    let vm_version = self.pop_num()?.value() as u64;
                    let asset_bytes = self.pop()?;
                    let amount = self.pop_num()?.value() as u64;
                    let ref_hash_bytes = self.pop()?;
                    let asset = crate::asset::AssetId(bytes_to_hash(&asset_bytes)?);
                    let ref_hash = bytes_to_hash(&ref_hash_bytes)?;
                    let found = tx_ctx.find_output(ref_hash, amount, asset, vm_version, &program_bytes);
                    self.push_bool(found)?;
                }

                OP_CHECKPREDICATE => {
                    if self.depth + 1 > self.max_depth {
                        return Err(VmError::NestedDepthExceeded);
                    }
                    let nargs = self.pop_num()?.value();
                    if nargs < 0 {
                        return Err(VmError::BadNumericEncoding);
                    }
                    let predicate = self.pop()?;
                    let mut args = Vec::with_capacity(nargs as usize);
                    for _ in 0..nargs {
                        args.push(self.pop()?);
                    }
                    args.reverse();
                    let mut nested = Interpreter {
                        stack: Vec::new(),
                        alt_stack: Vec::new(),
                        remaining: self.remaining,
                        depth: self.depth + 1,
                        max_depth: self.max_depth,
                        strict: self.strict,
                    };
                    for a in args {
                        nested.push(a)?;
                    }
                    let result = nested.run(&predicate, ctx);
                    self.remaining = nested.remaining;
                    let ok = match result {
                        Ok(()) => matches!(nested.stack.last(), Some(top) if is_true(top)),
                        Err(VmError::RunLimitExceeded) => return Err(VmError::RunLimitExceeded),
                        Err(_) => false,
                    };
                    self.push_bool(ok)?;
                }

                _ if is_expansion_opcode(op) => {
                    if self.strict {
                        return Err(VmError::ReservedOpcode(op));
                    }
                    // lenient: no-op
                }
                _ => return Err(VmError::UnknownOpcode(op)),
            }
        }

        if !branches.is_empty() {
            return Err(VmError::StackUnderflow);
        }
        Ok(())
    }
}

fn tx_ctx_of<'a, 'b>(ctx: &'b VmContext<'a>) -> Result<&'b super::context::TxVmContext<'a>, VmError> {
    match ctx {
        VmContext::Tx(t) => Ok(t),
        VmContext::Block(_) => Err(VmError::NoTxContext),
    }
}

fn bytes_to_hash(bytes: &[u8]) -> Result<crate::hash::Hash, VmError> {
    if bytes.len() != 32 {
        return Err(VmError::BadNumericEncoding);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(bytes);
    Ok(crate::hash::Hash(out))
}

fn verify_ed25519(pubkey_bytes: &[u8], msg: &[u8], sig_bytes: &[u8]) -> bool {
    let Ok(pubkey) = PublicKey::from_bytes(pubkey_bytes) else {
        return false;
    };
    let Ok(sig) = Signature::from_bytes(sig_bytes) else {
        return false;
    };
    pubkey.verify_strict(msg, &sig).is_ok()
}

/// `m`-of-`n` multisig: every provided signature must match a distinct
/// pubkey, in the pubkeys' order, but not every pubkey needs a signature.
fn check_multisig(sigs: &[Vec<u8>], pubkeys: &[Vec<u8>], msg: &[u8]) -> bool {
    let mut pk_iter = pubkeys.iter();
    'sig: for sig in sigs {
        for pk in pk_iter.by_ref() {
            if verify_ed25519(pk, msg, sig) {
                continue 'sig;
            }
        }
        return false;
    }
    true
}

fn read_u8(program: &[u8], pc: &mut usize) -> Result<u8, VmError> {
    let b = *program.get(*pc).ok_or(VmError::StackUnderflow)?;
    *pc += 1;
    Ok(b)
}

fn read_u16_le(program: &[u8], pc: &mut usize) -> Result<u16, VmError> {
    let bytes = read_slice(program, pc, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32_le(program: &[u8], pc: &mut usize) -> Result<u32, VmError> {
    let bytes = read_slice(program, pc, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_slice<'a>(program: &'a [u8], pc: &mut usize, n: usize) -> Result<&'a [u8], VmError> {
    let end = pc.checked_add(n).ok_or(VmError::StackUnderflow)?;
    let slice = program.get(*pc..end).ok_or(VmError::StackUnderflow)?;
    *pc = end;
    Ok(slice)
}
