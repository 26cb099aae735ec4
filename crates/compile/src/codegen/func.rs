//! Per-function analysis and body emission.
//!
//! The binary format wants every local declared up front, while source-level
//! locals can appear anywhere in a body, so each function gets two passes: a
//! pre-order collection pass that assigns dense indices to every declared
//! local, then the emission pass that writes the code bytes. Scoping is flat
//! within a function, so the tables here are rebuilt per function rather
//! than stacked.

use std::collections::HashMap;

use crate::ast::{Arena, BinOp, Node, NodeId, NodeList, ValType};
use crate::codegen::module::Module;
use crate::codegen::writer::Writer;
use crate::error::{Error, Result};

const OP_BLOCK: u8 = 0x02;
const OP_LOOP: u8 = 0x03;
const OP_IF: u8 = 0x04;
const OP_ELSE: u8 = 0x05;
const OP_END: u8 = 0x0B;
const OP_BR: u8 = 0x0C;
const OP_BR_IF: u8 = 0x0D;
const OP_CALL: u8 = 0x10;
const OP_DROP: u8 = 0x1A;
const OP_LOCAL_GET: u8 = 0x20;
const OP_LOCAL_SET: u8 = 0x21;
const OP_I32_CONST: u8 = 0x41;
const OP_F64_CONST: u8 = 0x44;
const OP_I32_EQZ: u8 = 0x45;

/// The result-type byte of a block that leaves nothing on the stack.
const TYPE_VOID: u8 = 0x40;

/// A named slot in the function's flat scope.
#[derive(Clone, Copy, Debug)]
struct Local {
    index: u32,
    ty: ValType,
}

/// Compiles one function definition into a framed code-section entry.
pub(crate) fn emit_function<'src>(
    module: &Module<'src>,
    arena: &Arena<'src>,
    node: NodeId,
) -> Result<Vec<u8>> {
    let Node::Func {
        params,
        result,
        body,
        ..
    } = arena.get(node)
    else {
        unreachable!("definition list only holds function nodes");
    };

    let mut emitter = FuncEmitter {
        module,
        arena,
        locals: HashMap::new(),
        local_types: Vec::new(),
        param_count: 0,
        code: Writer::new(),
    };

    for param in arena.params(params) {
        emitter.declare_param(param.name, param.ty)?;
    }

    for &child in arena.list(body) {
        emitter.collect_locals(child)?;
    }

    emitter.emit_frame(body, result)?;
    emitter.finish()
}

struct FuncEmitter<'a, 'src> {
    module: &'a Module<'src>,
    arena: &'a Arena<'src>,
    locals: HashMap<&'src str, Local>,
    /// Types of the non-parameter locals in declaration order, run-length
    /// encoded into the local groups of the framed body.
    local_types: Vec<ValType>,
    param_count: u32,
    code: Writer,
}

impl<'a, 'src> FuncEmitter<'a, 'src> {
    fn declare_param(&mut self, name: &'src str, ty: ValType) -> Result<()> {
        let index = self.param_count;
        if self.locals.insert(name, Local { index, ty }).is_some() {
            return Err(Error::DuplicateDefinition);
        }
        self.param_count += 1;
        Ok(())
    }

    fn declare_local(&mut self, name: &'src str, ty: ValType) -> Result<()> {
        let index = self
            .param_count
            .checked_add(self.local_types.len() as u32)
            .ok_or(Error::Overflow)?;
        if self.locals.insert(name, Local { index, ty }).is_some() {
            return Err(Error::DuplicateDefinition);
        }
        self.local_types.push(ty);
        Ok(())
    }

    fn local(&self, name: &str) -> Result<Local> {
        self.locals.get(name).copied().ok_or(Error::UndefinedVariable)
    }

    /// Pre-order pass assigning dense indices to every local declared in the
    /// body, however deeply nested. Only declarations have a side effect;
    /// after this pass the table is complete and emission never inserts.
    fn collect_locals(&mut self, id: NodeId) -> Result<()> {
        match self.arena.get(id) {
            Node::Local { name, ty, init } => {
                self.declare_local(name, ty)?;
                self.collect_locals(init)
            }
            Node::Binary { lhs, rhs, .. } => {
                self.collect_locals(lhs)?;
                self.collect_locals(rhs)
            }
            Node::Call { args, .. } => self.collect_list(args),
            Node::If {
                condition,
                then,
                otherwise,
            } => {
                self.collect_locals(condition)?;
                self.collect_locals(then)?;
                match otherwise {
                    Some(otherwise) => self.collect_locals(otherwise),
                    None => Ok(()),
                }
            }
            Node::Block(children) => self.collect_list(children),
            Node::Assign { value, .. } => self.collect_locals(value),
            Node::While { condition, body } => {
                self.collect_locals(condition)?;
                self.collect_list(body)
            }
            Node::Load { addr, .. } => self.collect_locals(addr),
            Node::Store { addr, value, .. } => {
                self.collect_locals(addr)?;
                self.collect_locals(value)
            }
            Node::Int(_) | Node::Float(_) | Node::Ident(_) => Ok(()),
            Node::Func { .. } | Node::Export(_) | Node::Import { .. } => {
                unreachable!("declarations cannot appear in expression position")
            }
        }
    }

    fn collect_list(&mut self, list: NodeList) -> Result<()> {
        for &child in self.arena.list(list) {
            self.collect_locals(child)?;
        }
        Ok(())
    }

    /// Computes the value type an expression leaves on the stack, or `None`
    /// for void. Pure; drives operator dispatch and the drop discipline.
    fn type_of(&self, id: NodeId) -> Result<Option<ValType>> {
        Ok(match self.arena.get(id) {
            Node::Int(_) => Some(ValType::I32),
            Node::Float(_) => Some(ValType::F64),
            Node::Ident(name) => Some(self.local(name)?.ty),
            Node::Binary { op, lhs, .. } => {
                if op.is_comparison() {
                    Some(ValType::I32)
                } else {
                    self.type_of(lhs)?
                }
            }
            Node::Call { callee, .. } => self.module.function(callee)?.signature.result,
            Node::If {
                then, otherwise, ..
            } => match otherwise {
                Some(_) => self.type_of(then)?,
                None => None,
            },
            Node::Block(children) => match self.arena.list(children).last() {
                Some(&last) => self.type_of(last)?,
                None => None,
            },
            Node::Load { ty, .. } => Some(ty),
            Node::Local { .. } | Node::Assign { .. } | Node::While { .. } | Node::Store { .. } => {
                None
            }
            Node::Func { .. } | Node::Export(_) | Node::Import { .. } => {
                unreachable!("declarations cannot appear in expression position")
            }
        })
    }

    /// Both operands of a binary operator must agree on a value type, which
    /// then selects the opcode.
    fn operand_type(&self, lhs: NodeId, rhs: NodeId) -> Result<ValType> {
        match (self.type_of(lhs)?, self.type_of(rhs)?) {
            (Some(left), Some(right)) if left == right => Ok(left),
            _ => Err(Error::TypeMismatch),
        }
    }

    /// Emits an expression required to be `i32`: a condition or an address.
    fn emit_i32(&mut self, id: NodeId) -> Result<()> {
        if self.type_of(id)? != Some(ValType::I32) {
            return Err(Error::TypeMismatch);
        }
        self.emit_expr(id)
    }

    /// Emits an expression and discards its value, keeping the stack
    /// balanced in void context.
    fn emit_dropped(&mut self, id: NodeId) -> Result<()> {
        let produced = self.type_of(id)?;
        self.emit_expr(id)?;
        if produced.is_some() {
            self.code.byte(OP_DROP)?;
        }
        Ok(())
    }

    fn emit_expr(&mut self, id: NodeId) -> Result<()> {
        match self.arena.get(id) {
            Node::Int(value) => {
                // Integer literals are i32-typed; a wider value would encode
                // an `i32.const` no validator accepts.
                if i32::try_from(value).is_err() {
                    return Err(Error::Overflow);
                }
                self.code.byte(OP_I32_CONST)?;
                self.code.sleb128(value)
            }
            Node::Float(value) => {
                self.code.byte(OP_F64_CONST)?;
                self.code.f64(value)
            }
            Node::Ident(name) => {
                let local = self.local(name)?;
                self.code.byte(OP_LOCAL_GET)?;
                self.code.uleb128(local.index)
            }
            Node::Binary { op, lhs, rhs } => {
                let operand = self.operand_type(lhs, rhs)?;
                self.emit_expr(lhs)?;
                self.emit_expr(rhs)?;
                self.code.byte(binary_opcode(op, operand)?)
            }
            Node::Call { callee, args } => {
                let entry = self.module.function(callee)?.clone();
                let args = self.arena.list(args);
                if args.len() != entry.signature.params.len() {
                    return Err(Error::TypeMismatch);
                }
                for (&arg, &param) in args.iter().zip(&entry.signature.params) {
                    if self.type_of(arg)? != Some(param) {
                        return Err(Error::TypeMismatch);
                    }
                    self.emit_expr(arg)?;
                }
                self.code.byte(OP_CALL)?;
                self.code.uleb128(entry.index)
            }
            Node::If {
                condition,
                then,
                otherwise,
            } => {
                self.emit_i32(condition)?;
                match otherwise {
                    Some(otherwise) => {
                        let then_type = self.type_of(then)?;
                        if then_type != self.type_of(otherwise)? {
                            return Err(Error::TypeMismatch);
                        }
                        self.code.byte(OP_IF)?;
                        self.code.byte(then_type.map_or(TYPE_VOID, ValType::tag))?;
                        self.emit_expr(then)?;
                        self.code.byte(OP_ELSE)?;
                        self.emit_expr(otherwise)?;
                        self.code.byte(OP_END)
                    }
                    None => {
                        // Statement form: the branch value, if any, is
                        // discarded inside the block.
                        self.code.byte(OP_IF)?;
                        self.code.byte(TYPE_VOID)?;
                        self.emit_dropped(then)?;
                        self.code.byte(OP_END)
                    }
                }
            }
            Node::Block(children) => {
                let children = self.arena.list(children);
                if let Some((&last, rest)) = children.split_last() {
                    for &child in rest {
                        self.emit_dropped(child)?;
                    }
                    self.emit_expr(last)?;
                }
                Ok(())
            }
            Node::Local { name, ty, init } => {
                if self.type_of(init)? != Some(ty) {
                    return Err(Error::TypeMismatch);
                }
                self.emit_expr(init)?;
                let local = self.local(name)?;
                self.code.byte(OP_LOCAL_SET)?;
                self.code.uleb128(local.index)
            }
            Node::Assign { name, value } => {
                let local = self.local(name)?;
                if self.type_of(value)? != Some(local.ty) {
                    return Err(Error::TypeMismatch);
                }
                self.emit_expr(value)?;
                self.code.byte(OP_LOCAL_SET)?;
                self.code.uleb128(local.index)
            }
            Node::While { condition, body } => {
                // block        ;; branch target for exiting the loop
                //   loop       ;; branch target for the next iteration
                //     <condition> i32.eqz br_if 1
                //     <body, every value dropped>
                //     br 0
                //   end
                // end
                self.code.byte(OP_BLOCK)?;
                self.code.byte(TYPE_VOID)?;
                self.code.byte(OP_LOOP)?;
                self.code.byte(TYPE_VOID)?;
                self.emit_i32(condition)?;
                self.code.byte(OP_I32_EQZ)?;
                self.code.byte(OP_BR_IF)?;
                self.code.uleb128(1)?;
                for &child in self.arena.list(body) {
                    self.emit_dropped(child)?;
                }
                self.code.byte(OP_BR)?;
                self.code.uleb128(0)?;
                self.code.byte(OP_END)?;
                self.code.byte(OP_END)
            }
            Node::Load { ty, addr } => {
                self.emit_i32(addr)?;
                self.code.byte(load_opcode(ty))?;
                self.code.uleb128(ty.alignment())?;
                self.code.uleb128(0)
            }
            Node::Store { ty, addr, value } => {
                self.emit_i32(addr)?;
                if self.type_of(value)? != Some(ty) {
                    return Err(Error::TypeMismatch);
                }
                self.emit_expr(value)?;
                self.code.byte(store_opcode(ty))?;
                self.code.uleb128(ty.alignment())?;
                self.code.uleb128(0)
            }
            Node::Func { .. } | Node::Export(_) | Node::Import { .. } => {
                unreachable!("declarations cannot appear in expression position")
            }
        }
    }

    /// Emits the function body under the block drop discipline: every
    /// non-void non-terminal child is dropped, and the terminal child must
    /// produce the declared return type. A function that returns nothing
    /// discards a non-void terminal value instead.
    fn emit_frame(&mut self, body: NodeList, result: Option<ValType>) -> Result<()> {
        match self.arena.list(body).split_last() {
            Some((&last, rest)) => {
                for &child in rest {
                    self.emit_dropped(child)?;
                }
                match result {
                    Some(expected) => {
                        if self.type_of(last)? != Some(expected) {
                            return Err(Error::TypeMismatch);
                        }
                        self.emit_expr(last)?;
                    }
                    None => self.emit_dropped(last)?,
                }
            }
            None => {
                if result.is_some() {
                    return Err(Error::TypeMismatch);
                }
            }
        }
        self.code.byte(OP_END)
    }

    /// Frames the finished body: total length prefix, run-length-encoded
    /// local groups for the non-parameter locals, then the code bytes.
    fn finish(self) -> Result<Vec<u8>> {
        let mut groups: Vec<(u32, ValType)> = Vec::new();
        for &ty in &self.local_types {
            match groups.last_mut() {
                Some((count, group)) if *group == ty => *count += 1,
                _ => groups.push((1, ty)),
            }
        }

        let mut body = Writer::new();
        body.uleb128(groups.len() as u32)?;
        for (count, ty) in groups {
            body.uleb128(count)?;
            body.byte(ty.tag())?;
        }
        body.bytes(self.code.as_slice())?;

        let mut framed = Writer::new();
        framed.uleb128(u32::try_from(body.len()).map_err(|_| Error::Overflow)?)?;
        framed.bytes(body.as_slice())?;
        Ok(framed.into_bytes())
    }
}

/// Operator dispatch: the opcode is chosen by the operand value type.
/// Floating-point operands have no bitwise, remainder, or shift forms.
fn binary_opcode(op: BinOp, ty: ValType) -> Result<u8> {
    use BinOp::*;
    use ValType::*;

    Ok(match (ty, op) {
        (I32, Add) => 0x6A,
        (I32, Sub) => 0x6B,
        (I32, Mul) => 0x6C,
        (I32, Div) => 0x6D,
        (I32, Rem) => 0x6F,
        (I32, And) => 0x71,
        (I32, Or) => 0x72,
        (I32, Xor) => 0x73,
        (I32, Shl) => 0x74,
        (I32, Shr) => 0x75,
        (I32, Eq) => 0x46,
        (I32, Ne) => 0x47,
        (I32, Lt) => 0x48,
        (I32, Gt) => 0x4A,
        (I32, Le) => 0x4C,
        (I32, Ge) => 0x4E,
        (I64, Add) => 0x7C,
        (I64, Sub) => 0x7D,
        (I64, Mul) => 0x7E,
        (I64, Div) => 0x7F,
        (I64, Rem) => 0x81,
        (I64, And) => 0x83,
        (I64, Or) => 0x84,
        (I64, Xor) => 0x85,
        (I64, Shl) => 0x86,
        (I64, Shr) => 0x87,
        (I64, Eq) => 0x51,
        (I64, Ne) => 0x52,
        (I64, Lt) => 0x53,
        (I64, Gt) => 0x55,
        (I64, Le) => 0x57,
        (I64, Ge) => 0x59,
        (F32, Add) => 0x92,
        (F32, Sub) => 0x93,
        (F32, Mul) => 0x94,
        (F32, Div) => 0x95,
        (F32, Eq) => 0x5B,
        (F32, Ne) => 0x5C,
        (F32, Lt) => 0x5D,
        (F32, Gt) => 0x5E,
        (F32, Le) => 0x5F,
        (F32, Ge) => 0x60,
        (F64, Add) => 0xA0,
        (F64, Sub) => 0xA1,
        (F64, Mul) => 0xA2,
        (F64, Div) => 0xA3,
        (F64, Eq) => 0x61,
        (F64, Ne) => 0x62,
        (F64, Lt) => 0x63,
        (F64, Gt) => 0x64,
        (F64, Le) => 0x65,
        (F64, Ge) => 0x66,
        (F32 | F64, Rem | And | Or | Xor | Shl | Shr) => {
            return Err(Error::UnsupportedOperator)
        }
    })
}

fn load_opcode(ty: ValType) -> u8 {
    match ty {
        ValType::I32 => 0x28,
        ValType::I64 => 0x29,
        ValType::F32 => 0x2A,
        ValType::F64 => 0x2B,
    }
}

fn store_opcode(ty: ValType) -> u8 {
    match ty {
        ValType::I32 => 0x36,
        ValType::I64 => 0x37,
        ValType::F32 => 0x38,
        ValType::F64 => 0x39,
    }
}
